pub mod change_watcher;
pub mod dom_painter;
pub mod highlight_session;
pub mod match_engine;
pub mod settings_store;
pub mod site_rules;
