pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod inspect;
pub mod mount;
pub mod network;
pub mod paths;
pub mod platform;
pub mod relay;
pub mod translate;

// Re-export core types for convenience
pub use config::Config;
pub use error::TranslateError;
pub use platform::{HandlerTables, Platform};
pub use translate::{Translation, Translator};
