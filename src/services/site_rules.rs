//! Site-eligibility policy: decides whether the current page's domain
//! qualifies for highlighting under the include/exclude/all website rules.

use crate::types::settings::{SettingsSnapshot, WebsiteRule};

/// Lowercases a hostname and strips a leading `www.` prefix.
pub fn normalize_host(hostname: &str) -> String {
    let lowered = hostname.to_ascii_lowercase();
    lowered
        .strip_prefix("www.")
        .map(str::to_string)
        .unwrap_or(lowered)
}

/// Exact domain equality, or `current` being a subdomain of `rule`
/// (e.g. `sub.example.com` matches `example.com`).
pub fn domain_matches(current: &str, rule: &str) -> bool {
    if current == rule {
        return true;
    }
    current.len() > rule.len() && current.ends_with(rule) && {
        let boundary = current.len() - rule.len() - 1;
        current.as_bytes()[boundary] == b'.'
    }
}

/// Resolves the snapshot's website rule against the current hostname.
/// An unknown hostname is never eligible.
pub fn should_highlight_on(settings: &SettingsSnapshot, hostname: Option<&str>) -> bool {
    let Some(hostname) = hostname else {
        return false;
    };
    let current = normalize_host(hostname);

    match settings.website_rule {
        WebsiteRule::All => true,
        WebsiteRule::Include => settings
            .include_websites
            .iter()
            .any(|rule| domain_matches(&current, rule)),
        WebsiteRule::Exclude => !settings
            .exclude_websites
            .iter()
            .any(|rule| domain_matches(&current, rule)),
    }
}
