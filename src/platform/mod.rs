//! Host platform detection and the per-platform behavior it selects.
//!
//! Every platform's tables can be built on any host, so tests exercise the
//! Windows and macOS rewrites from Linux CI.

pub mod darwin;
pub mod handlers;
pub mod linux;
pub mod tables;
pub mod windows;

use std::fmt;

use crate::mount::MountPolicy;

pub use tables::{ArgHandler, CommandHandler, HandlerContext, HandlerTables};

/// Gateway of Lima's user-mode network, where the macOS host answers.
pub const LIMA_SLIRP_GATEWAY: &str = "192.168.5.2";

/// Editor server directories whose host trees need permission repair.
const VSCODE_SERVER_DIRS: &[&str] = &[".vscode-server"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// macOS host, runtime inside a Lima VM.
    Darwin,
    /// Windows host, runtime inside a WSL2 distribution driven through Lima.
    Windows,
    /// Linux host, runtime runs natively.
    Linux,
}

impl Platform {
    pub fn detect() -> Self {
        #[cfg(target_os = "macos")]
        return Platform::Darwin;

        #[cfg(target_os = "windows")]
        return Platform::Windows;

        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        return Platform::Linux;
    }

    /// Handler tables for this platform.
    pub fn tables(self) -> HandlerTables {
        match self {
            Platform::Darwin => darwin::tables(),
            Platform::Windows => windows::tables(),
            Platform::Linux => linux::tables(),
        }
    }

    /// Address `host-gateway` resolves to when no override is configured.
    ///
    /// On Linux the runtime resolves the sentinel itself. WSL has no fixed
    /// gateway, so Windows relies on configuration.
    pub fn default_gateway(self) -> Option<&'static str> {
        match self {
            Platform::Darwin => Some(LIMA_SLIRP_GATEWAY),
            Platform::Windows | Platform::Linux => None,
        }
    }

    pub fn mount_policy(self) -> MountPolicy {
        match self {
            Platform::Darwin | Platform::Windows => MountPolicy::new(VSCODE_SERVER_DIRS),
            Platform::Linux => MountPolicy::new(&[]),
        }
    }

    /// Whether commands are relayed through `limactl shell`.
    pub fn uses_vm(self) -> bool {
        !matches!(self, Platform::Linux)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Darwin => write!(f, "darwin"),
            Platform::Windows => write!(f, "windows"),
            Platform::Linux => write!(f, "linux"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_matches_target() {
        let platform = Platform::detect();
        if cfg!(target_os = "macos") {
            assert_eq!(platform, Platform::Darwin);
        } else if cfg!(target_os = "windows") {
            assert_eq!(platform, Platform::Windows);
        } else {
            assert_eq!(platform, Platform::Linux);
        }
    }

    #[test]
    fn test_default_gateway() {
        assert_eq!(Platform::Darwin.default_gateway(), Some("192.168.5.2"));
        assert_eq!(Platform::Linux.default_gateway(), None);
        assert_eq!(Platform::Windows.default_gateway(), None);
    }

    #[test]
    fn test_uses_vm() {
        assert!(Platform::Darwin.uses_vm());
        assert!(Platform::Windows.uses_vm());
        assert!(!Platform::Linux.uses_vm());
    }
}
