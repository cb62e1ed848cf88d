use std::collections::HashMap;

use crate::error::Result;
use crate::mount::MountPolicy;

use super::{handlers, Platform};

/// What a handler may consult while rewriting arguments.
pub struct HandlerContext<'a> {
    pub platform: Platform,
    /// Address `host-gateway` resolves to, if the platform has one.
    pub gateway: Option<&'a str>,
    pub mount_policy: MountPolicy,
    /// Working directory of the user, in host syntax.
    pub cwd: &'a str,
    /// Lookup into the host environment.
    pub host_env: &'a (dyn Fn(&str) -> Option<String> + Send + Sync),
}

/// Rewrites one flag value. `None` drops the flag from the relayed command.
pub type ArgHandler = fn(&HandlerContext<'_>, &str) -> Result<Option<String>>;

/// Builds the whole argument list of a command, replacing the per-flag pass.
pub type CommandHandler = fn(&HandlerContext<'_>, &[String]) -> Result<Vec<String>>;

/// Runtime commands accepted at the top level.
pub const SUPPORTED_COMMANDS: &[&str] = &[
    "build", "builder", "commit", "compose", "container", "cp", "create", "events", "exec",
    "history", "image", "images", "info", "inspect", "kill", "load", "login", "logout", "logs",
    "network", "pause", "port", "ps", "pull", "push", "restart", "rm", "rmi", "run", "save",
    "start", "stats", "stop", "system", "tag", "top", "unpause", "update", "volume", "wait",
];

/// Top-level commands that take a subcommand as their first argument.
pub const COMMAND_GROUPS: &[&str] = &[
    "builder", "compose", "container", "image", "network", "system", "volume",
];

const SHARED_ALIASES: &[(&str, &str)] = &[
    ("run", "container run"),
    ("create", "container create"),
    ("exec", "container exec"),
    ("cp", "container cp"),
    ("logs", "container logs"),
    ("ps", "container ls"),
    ("build", "image build"),
    ("images", "image ls"),
    ("pull", "image pull"),
    ("push", "image push"),
    ("save", "image save"),
    ("load", "image load"),
    ("tag", "image tag"),
    ("rmi", "image rm"),
];

/// Per-platform lookup tables consulted by the translator.
///
/// Tables are immutable once built; a miss means "no platform-specific
/// behavior" and the argument is passed through.
#[derive(Clone, Default)]
pub struct HandlerTables {
    aliases: HashMap<&'static str, &'static str>,
    arg_handlers: HashMap<&'static str, HashMap<&'static str, ArgHandler>>,
    command_handlers: HashMap<&'static str, CommandHandler>,
}

impl HandlerTables {
    /// Empty tables: every command and flag passes through.
    pub fn new() -> Self {
        Self::default()
    }

    /// Aliases and handlers every platform carries.
    pub fn shared() -> Self {
        let mut tables = Self::new();
        for &(from, to) in SHARED_ALIASES {
            tables = tables.with_alias(from, to);
        }
        tables
            .with_arg_handler("container run", &["--mount"], handlers::handle_mount)
            .with_arg_handler("container create", &["--mount"], handlers::handle_mount)
            .with_arg_handler("container run", &["--add-host"], handlers::handle_add_host)
            .with_arg_handler("container create", &["--add-host"], handlers::handle_add_host)
            .with_arg_handler("image build", &["--add-host"], handlers::handle_add_host)
            .with_arg_handler("container run", &["-e", "--env"], handlers::handle_env)
            .with_arg_handler("container create", &["-e", "--env"], handlers::handle_env)
            .with_arg_handler("container exec", &["-e", "--env"], handlers::handle_env)
    }

    pub fn with_alias(mut self, from: &'static str, to: &'static str) -> Self {
        self.aliases.insert(from, to);
        self
    }

    /// Register `handler` for each of `flags` of `command`, replacing any
    /// earlier registration.
    pub fn with_arg_handler(
        mut self,
        command: &'static str,
        flags: &[&'static str],
        handler: ArgHandler,
    ) -> Self {
        let entry = self.arg_handlers.entry(command).or_default();
        for &flag in flags {
            entry.insert(flag, handler);
        }
        self
    }

    pub fn with_command_handler(mut self, command: &'static str, handler: CommandHandler) -> Self {
        self.command_handlers.insert(command, handler);
        self
    }

    pub fn alias(&self, command: &str) -> Option<&'static str> {
        self.aliases.get(command).copied()
    }

    pub fn arg_handler(&self, command: &str, flag: &str) -> Option<ArgHandler> {
        self.arg_handlers.get(command)?.get(flag).copied()
    }

    pub fn command_handler(&self, command: &str) -> Option<CommandHandler> {
        self.command_handlers.get(command).copied()
    }
}

impl std::fmt::Debug for HandlerTables {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut commands: Vec<_> = self.arg_handlers.keys().collect();
        commands.sort();
        let mut overrides: Vec<_> = self.command_handlers.keys().collect();
        overrides.sort();
        f.debug_struct("HandlerTables")
            .field("aliases", &self.aliases.len())
            .field("arg_handlers", &commands)
            .field("command_handlers", &overrides)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upper(_: &HandlerContext<'_>, value: &str) -> Result<Option<String>> {
        Ok(Some(value.to_uppercase()))
    }

    #[test]
    fn test_empty_tables_miss() {
        let tables = HandlerTables::new();
        assert!(tables.alias("run").is_none());
        assert!(tables.arg_handler("container run", "--mount").is_none());
        assert!(tables.command_handler("image build").is_none());
    }

    #[test]
    fn test_shared_aliases() {
        let tables = HandlerTables::shared();
        assert_eq!(tables.alias("run"), Some("container run"));
        assert_eq!(tables.alias("build"), Some("image build"));
        assert_eq!(tables.alias("ps"), Some("container ls"));
        assert!(tables.alias("inspect").is_none());
    }

    #[test]
    fn test_shared_handlers_registered() {
        let tables = HandlerTables::shared();
        assert!(tables.arg_handler("container run", "--mount").is_some());
        assert!(tables.arg_handler("container create", "--add-host").is_some());
        assert!(tables.arg_handler("container exec", "-e").is_some());
        assert!(tables.arg_handler("container exec", "--mount").is_none());
    }

    #[test]
    fn test_later_registration_wins() {
        let tables = HandlerTables::new()
            .with_arg_handler("container run", &["--mount"], handlers::handle_mount)
            .with_arg_handler("container run", &["--mount"], upper);
        let handler = tables.arg_handler("container run", "--mount").unwrap();

        let env = |_: &str| -> Option<String> { None };
        let ctx = HandlerContext {
            platform: Platform::Linux,
            gateway: None,
            mount_policy: MountPolicy::new(&[]),
            cwd: "/",
            host_env: &env,
        };
        assert_eq!(handler(&ctx, "src=/a").unwrap(), Some("SRC=/A".to_string()));
    }

    #[test]
    fn test_groups_are_supported_commands() {
        for group in COMMAND_GROUPS {
            assert!(SUPPORTED_COMMANDS.contains(group), "{} missing", group);
        }
        for (alias, _) in SHARED_ALIASES {
            assert!(SUPPORTED_COMMANDS.contains(alias), "{} missing", alias);
        }
    }
}
