pub mod api;
pub mod catalog;
pub mod events;
pub mod models;
pub mod views;

/// Device storage key holding a visitor's spark picks as a JSON list.
pub const VISITOR_SELECTIONS_KEY: &str = "visitorSelections";

/// Default number of sparks a user may pick.
pub const DEFAULT_MAX_SELECTIONS: usize = 2;

/// Post and reply bodies are capped at this many characters.
pub const MAX_CONTENT_CHARS: usize = 1000;
