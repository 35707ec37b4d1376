use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Maximum length of a highlight phrase, in characters.
pub const MAX_WORD_LEN: usize = 500;

/// Maximum length of a word-list name, in characters.
pub const MAX_LIST_NAME_LEN: usize = 100;

/// Fallback highlight background used when a list carries no usable color.
pub const DEFAULT_LIST_COLOR: &str = "#ffd700";

/// A single highlight target phrase inside a word list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct WordEntry {
    pub text: String,
    pub enabled: bool,
}

impl Default for WordEntry {
    fn default() -> Self {
        Self {
            text: String::new(),
            enabled: true,
        }
    }
}

impl WordEntry {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            enabled: true,
        }
    }
}

/// Visual style applied to every match from one word list.
///
/// String fields are raw CSS values and are sanitized at render time;
/// pixel fields are clamped to [0, 100] at render time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct StyleSpec {
    pub background_color: String,
    pub color: String,
    pub font_weight: String,
    pub font_style: String,
    pub text_decoration: String,
    pub text_transform: String,
    pub border_width: u32,
    pub border_style: String,
    pub border_color: String,
    pub padding_top: u32,
    pub padding_right: u32,
    pub padding_bottom: u32,
    pub padding_left: u32,
    pub border_radius: u32,
}

impl Default for StyleSpec {
    fn default() -> Self {
        Self {
            background_color: DEFAULT_LIST_COLOR.to_string(),
            color: "#000000".to_string(),
            font_weight: "normal".to_string(),
            font_style: "normal".to_string(),
            text_decoration: "none".to_string(),
            text_transform: "none".to_string(),
            border_width: 0,
            border_style: "none".to_string(),
            border_color: "#000000".to_string(),
            padding_top: 1,
            padding_right: 2,
            padding_bottom: 1,
            padding_left: 2,
            border_radius: 2,
        }
    }
}

/// A named, styled, enable-able collection of highlight target phrases.
///
/// Owned by the settings store; the highlighting core only reads it.
/// `color` is the legacy single-color field older payloads carry instead of
/// a full `styles` object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct WordList {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub color: String,
    pub styles: Option<StyleSpec>,
    pub words: Vec<WordEntry>,
}

impl Default for WordList {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            enabled: true,
            color: DEFAULT_LIST_COLOR.to_string(),
            styles: None,
            words: Vec::new(),
        }
    }
}

impl WordList {
    /// Returns the effective style for this list, falling back to the legacy
    /// `color` field as the background when no `styles` object is present.
    pub fn resolved_style(&self) -> StyleSpec {
        match &self.styles {
            Some(styles) => styles.clone(),
            None => StyleSpec {
                background_color: if self.color.is_empty() {
                    DEFAULT_LIST_COLOR.to_string()
                } else {
                    self.color.clone()
                },
                ..StyleSpec::default()
            },
        }
    }
}

/// Policy deciding which sites qualify for highlighting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WebsiteRule {
    All,
    Include,
    Exclude,
}

impl Default for WebsiteRule {
    fn default() -> Self {
        WebsiteRule::All
    }
}

/// A highlight phrase paired with the style of the list it came from.
///
/// The flattened form the match engine consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightWord {
    pub text: String,
    pub style: StyleSpec,
}

/// Immutable snapshot of the settings the highlighting core consumes.
///
/// `Default` is the safe fallback used whenever the store is unreachable or
/// a payload is malformed: highlighting effectively disabled, keyboard
/// shortcuts enabled, every site eligible.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsSnapshot {
    pub enable_highlighting: bool,
    pub case_sensitive: bool,
    pub whole_words_only: bool,
    pub word_lists: Vec<WordList>,
    pub website_rule: WebsiteRule,
    pub include_websites: Vec<String>,
    pub exclude_websites: Vec<String>,
    pub enable_keyboard_shortcuts: bool,
}

impl Default for SettingsSnapshot {
    fn default() -> Self {
        Self {
            enable_highlighting: false,
            case_sensitive: false,
            whole_words_only: false,
            word_lists: Vec::new(),
            website_rule: WebsiteRule::All,
            include_websites: Vec::new(),
            exclude_websites: Vec::new(),
            enable_keyboard_shortcuts: true,
        }
    }
}

impl SettingsSnapshot {
    /// The snapshot a freshly-created store starts with: highlighting on,
    /// nothing configured yet.
    pub fn first_run() -> Self {
        Self {
            enable_highlighting: true,
            ..Self::default()
        }
    }

    /// Flattens enabled words from enabled lists, paired with each list's
    /// resolved style. Word text is trimmed; empty entries are dropped.
    pub fn highlight_words(&self) -> Vec<HighlightWord> {
        let mut words = Vec::new();
        for list in &self.word_lists {
            if !list.enabled {
                continue;
            }
            let style = list.resolved_style();
            for word in &list.words {
                let text = word.text.trim();
                if word.enabled && !text.is_empty() {
                    words.push(HighlightWord {
                        text: text.to_string(),
                        style: style.clone(),
                    });
                }
            }
        }
        words
    }

    /// Leniently normalizes an arbitrary JSON value into a snapshot.
    ///
    /// Absent or malformed fields resolve to safe defaults instead of
    /// erroring: unknown website rules fall back to `all`, non-string
    /// website entries are dropped, word text is trimmed and clamped to
    /// [`MAX_WORD_LEN`] characters, and lists missing an id get a fresh
    /// UUID so the popup can address them.
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };

        let bool_or = |key: &str, fallback: bool| -> bool {
            obj.get(key).and_then(Value::as_bool).unwrap_or(fallback)
        };

        let string_vec = |key: &str| -> Vec<String> {
            obj.get(key)
                .and_then(Value::as_array)
                .map(|arr| {
                    arr.iter()
                        .filter_map(Value::as_str)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default()
        };

        let website_rule = match obj.get("websiteRule").and_then(Value::as_str) {
            Some("include") => WebsiteRule::Include,
            Some("exclude") => WebsiteRule::Exclude,
            _ => WebsiteRule::All,
        };

        let word_lists = obj
            .get("wordLists")
            .and_then(Value::as_array)
            .map(|lists| lists.iter().filter_map(sanitize_word_list).collect())
            .unwrap_or_default();

        Self {
            enable_highlighting: bool_or("enableHighlighting", false),
            case_sensitive: bool_or("caseSensitive", false),
            whole_words_only: bool_or("wholeWordsOnly", false),
            word_lists,
            website_rule,
            include_websites: string_vec("includeWebsites"),
            exclude_websites: string_vec("excludeWebsites"),
            enable_keyboard_shortcuts: bool_or("enableKeyboardShortcuts", true),
        }
    }
}

fn clamp_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn sanitize_word_list(value: &Value) -> Option<WordList> {
    let obj = value.as_object()?;
    let name = obj.get("name").and_then(Value::as_str)?;

    let id = obj
        .get("id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let color = obj
        .get("color")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_LIST_COLOR)
        .to_string();

    let styles = obj
        .get("styles")
        .filter(|v| v.is_object())
        .and_then(|v| serde_json::from_value(v.clone()).ok());

    let words = obj
        .get("words")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|w| {
                    let word = w.as_object()?;
                    let text = word.get("text").and_then(Value::as_str)?.trim();
                    if text.is_empty() {
                        return None;
                    }
                    Some(WordEntry {
                        text: clamp_chars(text, MAX_WORD_LEN),
                        enabled: word.get("enabled").and_then(Value::as_bool).unwrap_or(true),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Some(WordList {
        id,
        name: clamp_chars(name, MAX_LIST_NAME_LEN),
        enabled: obj.get("enabled").and_then(Value::as_bool).unwrap_or(true),
        color,
        styles,
        words,
    })
}
