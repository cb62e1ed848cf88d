pub mod runtime;

pub use runtime::cmd_runtime;
