//! Chat assistant domain - prompt rules and response post-processing

mod config;
mod sanitize;
mod summary;
mod tokens;

pub use config::AssistantConfig;
pub use sanitize::clean_response;
pub use summary::{parse_summary, PostSummary, SUMMARY_LINES, SUMMARY_TAGS};
pub use tokens::estimate_tokens;

/// Category used when a chat request does not name one
pub const DEFAULT_CATEGORY: &str = "chat";

/// Instruction sent with every assistant generation
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "Give the user a direct, clear answer. Do not include internal notes or system messages.";
