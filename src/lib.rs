//! wordlight: the content-side text highlighting engine of a word-highlighter
//! browser extension.
//!
//! This library crate exposes all modules for use by the embedder and
//! integration tests. The page DOM is an in-memory [`dom::Document`]; the
//! browser-specific collaborators (settings store, host context, message
//! transport) are injected behind traits.

pub mod dom;
pub mod message_handler;
pub mod services;
pub mod types;
