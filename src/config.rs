//! Process-wide settings for relaying commands.

use std::path::PathBuf;

use tracing::debug;

use crate::paths;

/// Lima instance commands are relayed into by default.
pub const DEFAULT_INSTANCE: &str = "nerdvm";

pub const ENV_INSTANCE: &str = "NERDVM_INSTANCE";
pub const ENV_GATEWAY: &str = "NERDVM_GATEWAY";
pub const ENV_HOME: &str = "NERDVM_HOME";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Name of the Lima instance hosting the runtime.
    pub instance_name: String,

    /// Overrides the platform's address for `host-gateway`.
    pub vm_gateway: Option<String>,

    /// Root of nerdvm's data; Lima's home lives below it.
    pub root_dir: PathBuf,

    /// Binary that opens a shell in the VM.
    pub lima_binary: String,

    /// Runtime binary invoked inside the VM.
    pub runtime_binary: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            instance_name: DEFAULT_INSTANCE.to_string(),
            vm_gateway: None,
            root_dir: paths::default_root_dir(),
            lima_binary: "limactl".to_string(),
            runtime_binary: "nerdctl".to_string(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with `NERDVM_*` variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(instance) = lookup(ENV_INSTANCE).filter(|v| !v.is_empty()) {
            config.instance_name = instance;
        }
        if let Some(gateway) = lookup(ENV_GATEWAY).filter(|v| !v.is_empty()) {
            config.vm_gateway = Some(gateway);
        }
        if let Some(home) = lookup(ENV_HOME).filter(|v| !v.is_empty()) {
            config.root_dir = PathBuf::from(home);
        }
        debug!(?config, "loaded configuration");
        config
    }

    pub fn instance_name(mut self, name: impl Into<String>) -> Self {
        self.instance_name = name.into();
        self
    }

    pub fn vm_gateway(mut self, gateway: impl Into<String>) -> Self {
        self.vm_gateway = Some(gateway.into());
        self
    }

    pub fn root_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.root_dir = dir.into();
        self
    }

    pub fn lima_binary(mut self, binary: impl Into<String>) -> Self {
        self.lima_binary = binary.into();
        self
    }

    pub fn runtime_binary(mut self, binary: impl Into<String>) -> Self {
        self.runtime_binary = binary.into();
        self
    }
}
