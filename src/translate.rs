//! Turns a user command into the invocation relayed to the runtime.
//!
//! Lookup order for a command's arguments:
//! 1. the platform's command handler, which rebuilds the whole list;
//! 2. the platform's per-flag handler for `(command, flag)`;
//! 3. passthrough.
//!
//! Translation is all-or-nothing: any handler error aborts before anything
//! is executed.

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Result, TranslateError};
use crate::paths;
use crate::platform::tables::{COMMAND_GROUPS, SUPPORTED_COMMANDS};
use crate::platform::{windows, ArgHandler, HandlerContext, HandlerTables, Platform};
use crate::relay::Invocation;

/// Flags of `run`/`create`/`exec` that take no value.
const BOOLEAN_FLAGS: &[&str] = &[
    "-d",
    "--detach",
    "-i",
    "--interactive",
    "-t",
    "--tty",
    "-P",
    "--publish-all",
    "-q",
    "--quiet",
    "-h",
    "--help",
    "--rm",
    "--privileged",
    "--init",
    "--read-only",
    "--oom-kill-disable",
    "--sig-proxy",
    "--no-healthcheck",
    "--rootfs",
    "--disable-content-trust",
];
const BOOLEAN_SHORTS: &str = "ditPqh";

/// How far into the argument list flags are rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagScan {
    /// Every flag, wherever it appears.
    All,
    /// Up to the first positional argument. Everything after the image or
    /// container name belongs to the command run inside the container.
    UntilPositional,
}

fn is_flag(arg: &str) -> bool {
    arg.len() > 1 && arg.starts_with('-')
}

fn takes_value(flag: &str) -> bool {
    if BOOLEAN_FLAGS.contains(&flag) {
        return false;
    }
    // Bundled short flags such as `-it`.
    let bundled = flag
        .strip_prefix('-')
        .filter(|rest| !rest.starts_with('-') && rest.len() > 1)
        .is_some_and(|rest| rest.chars().all(|c| BOOLEAN_SHORTS.contains(c)));
    !bundled
}

/// Rewrite the flags of `args` with the handlers `lookup` returns.
///
/// A handled flag keeps the form the user wrote it in (`--flag=value` or
/// `--flag value`); a handler returning `None` removes the flag.
pub fn rewrite_flags(
    ctx: &HandlerContext<'_>,
    args: &[String],
    lookup: &dyn Fn(&str) -> Option<ArgHandler>,
    scan: FlagScan,
) -> Result<Vec<String>> {
    let mut out = Vec::with_capacity(args.len());
    let mut i = 0;

    while i < args.len() {
        let arg = args[i].as_str();
        if arg == "--" {
            out.extend_from_slice(&args[i..]);
            break;
        }
        if !is_flag(arg) {
            if scan == FlagScan::UntilPositional {
                out.extend_from_slice(&args[i..]);
                break;
            }
            out.push(arg.to_string());
            i += 1;
            continue;
        }

        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag, Some(value)),
            None => (arg, None),
        };
        i += 1;

        let Some(handler) = lookup(flag) else {
            out.push(arg.to_string());
            if scan == FlagScan::UntilPositional && inline.is_none() && takes_value(flag) {
                if let Some(value) = args.get(i) {
                    out.push(value.clone());
                    i += 1;
                }
            }
            continue;
        };

        let value = match inline {
            Some(value) => value,
            None => {
                let value = args.get(i).ok_or_else(|| TranslateError::MissingValue {
                    flag: flag.to_string(),
                })?;
                i += 1;
                value.as_str()
            }
        };

        match handler(ctx, value)? {
            Some(rewritten) if inline.is_some() => out.push(format!("{}={}", flag, rewritten)),
            Some(rewritten) => {
                out.push(flag.to_string());
                out.push(rewritten);
            }
            None => debug!(flag = %flag, "dropped flag"),
        }
    }

    Ok(out)
}

fn scan_for(command: &str) -> FlagScan {
    match command {
        "container run" | "container create" | "container exec" => FlagScan::UntilPositional,
        _ => FlagScan::All,
    }
}

/// Whether the captured output of `command` must go through the inspect
/// reconstructor: JSON container inspection without a custom `--format`.
pub fn needs_reconstruction(command: &str, args: &[String]) -> bool {
    if command != "inspect" && command != "container inspect" {
        return false;
    }

    let mut inspect_type: Option<&str> = None;
    for (i, arg) in args.iter().enumerate() {
        if arg == "--format" || arg == "-f" || arg.starts_with("--format=") || arg.starts_with("-f=")
        {
            return false;
        }
        if arg == "--type" {
            inspect_type = args.get(i + 1).map(String::as_str);
        } else if let Some(kind) = arg.strip_prefix("--type=") {
            inspect_type = Some(kind);
        }
    }
    matches!(inspect_type, None | Some("container"))
}

/// Result of translating one user command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    /// Canonical command name, e.g. `container run`.
    pub command: String,
    pub invocation: Invocation,
    /// The relayed stdout must be captured and reconstructed.
    pub reconstruct_output: bool,
}

type HostEnv = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

pub struct Translator {
    platform: Platform,
    tables: HandlerTables,
    config: Config,
    cwd: String,
    host_env: HostEnv,
}

impl Translator {
    pub fn new(platform: Platform, tables: HandlerTables, config: Config) -> Self {
        let cwd = std::env::current_dir()
            .map(|dir| dir.display().to_string())
            .unwrap_or_else(|_| ".".to_string());
        Self {
            platform,
            tables,
            config,
            cwd,
            host_env: Box::new(|key: &str| std::env::var(key).ok()),
        }
    }

    /// Translator for the platform this binary runs on.
    pub fn for_host(config: Config) -> Self {
        let platform = Platform::detect();
        let tables = platform.tables();
        debug!(platform = %platform, ?tables, "selected handler tables");
        Self::new(platform, tables, config)
    }

    pub fn with_cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = cwd.into();
        self
    }

    pub fn with_host_env(
        mut self,
        lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.host_env = Box::new(lookup);
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    fn gateway(&self) -> Option<&str> {
        self.config
            .vm_gateway
            .as_deref()
            .or(self.platform.default_gateway())
    }

    fn context(&self) -> HandlerContext<'_> {
        HandlerContext {
            platform: self.platform,
            gateway: self.gateway(),
            mount_policy: self.platform.mount_policy(),
            cwd: &self.cwd,
            host_env: &*self.host_env,
        }
    }

    /// Canonical command name and the arguments that follow it.
    fn resolve_command<'a>(
        &self,
        command: &str,
        args: &'a [String],
    ) -> Result<(String, &'a [String])> {
        if !SUPPORTED_COMMANDS.contains(&command) {
            return Err(TranslateError::UnknownCommand(command.to_string()));
        }
        if COMMAND_GROUPS.contains(&command) {
            if let Some((sub, rest)) = args.split_first() {
                if !is_flag(sub) {
                    return Ok((format!("{} {}", command, sub), rest));
                }
            }
            return Ok((command.to_string(), args));
        }
        let canonical = self.tables.alias(command).unwrap_or(command);
        Ok((canonical.to_string(), args))
    }

    pub fn translate(&self, command: &str, args: &[String]) -> Result<Translation> {
        let (canonical, rest) = self.resolve_command(command, args)?;
        let ctx = self.context();

        let rewritten = match self.tables.command_handler(&canonical) {
            Some(handler) => {
                debug!(command = %canonical, "using platform command handler");
                handler(&ctx, rest)?
            }
            None => rewrite_flags(
                &ctx,
                rest,
                &|flag: &str| self.tables.arg_handler(&canonical, flag),
                scan_for(&canonical),
            )?,
        };

        let reconstruct_output = needs_reconstruction(&canonical, rest);
        let invocation = self.invocation(&canonical, rewritten);
        debug!(platform = %self.platform, command = %invocation, "translated command");

        Ok(Translation {
            command: canonical,
            invocation,
            reconstruct_output,
        })
    }

    /// Prefix that enters the VM, then the runtime command.
    fn invocation(&self, command: &str, args: Vec<String>) -> Invocation {
        let runtime = self.config.runtime_binary.clone();
        let instance = self.config.instance_name.clone();

        let (program, mut argv) = match self.platform {
            Platform::Darwin => (
                self.config.lima_binary.clone(),
                vec!["shell".to_string(), instance, "sudo".to_string(), "-E".to_string(), runtime],
            ),
            Platform::Windows => {
                let mut argv = vec!["shell".to_string()];
                match windows::to_wsl_path(&self.cwd, &self.cwd) {
                    Ok(workdir) => argv.extend(["--workdir".to_string(), workdir]),
                    Err(e) => warn!("not forwarding working directory: {}", e),
                }
                argv.extend([instance, "sudo".to_string(), "-E".to_string(), runtime]);
                (self.config.lima_binary.clone(), argv)
            }
            Platform::Linux => ("sudo".to_string(), vec!["-E".to_string(), runtime]),
        };

        argv.extend(command.split(' ').map(str::to_string));
        argv.extend(args);

        let env = if self.platform.uses_vm() {
            let lima_home = paths::lima_home(&self.config.root_dir);
            vec![("LIMA_HOME".to_string(), lima_home.display().to_string())]
        } else {
            Vec::new()
        };

        Invocation {
            program,
            args: argv,
            env,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    fn translator(platform: Platform) -> Translator {
        let config = Config::new().root_dir("/home/dev/.nerdvm");
        Translator::new(platform, platform.tables(), config)
            .with_cwd("/home/dev/proj")
            .with_host_env(|key| (key == "API_KEY").then(|| "k-123".to_string()))
    }

    /// Arguments after the runtime binary.
    fn relayed(t: &Translation) -> Vec<String> {
        let args = &t.invocation.args;
        let pos = args.iter().position(|a| a == "nerdctl").unwrap();
        args[pos + 1..].to_vec()
    }

    #[test]
    fn test_darwin_prefix_and_env() {
        let t = translator(Platform::Darwin)
            .translate("ps", &strings(&["-a"]))
            .unwrap();
        assert_eq!(t.command, "container ls");
        assert_eq!(t.invocation.program, "limactl");
        assert_eq!(
            t.invocation.args,
            strings(&["shell", "nerdvm", "sudo", "-E", "nerdctl", "container", "ls", "-a"])
        );
        assert_eq!(
            t.invocation.env,
            vec![("LIMA_HOME".to_string(), "/home/dev/.nerdvm/lima/data".to_string())]
        );
    }

    #[test]
    fn test_linux_prefix() {
        let t = translator(Platform::Linux)
            .translate("images", &[])
            .unwrap();
        assert_eq!(t.invocation.program, "sudo");
        assert_eq!(t.invocation.args, strings(&["-E", "nerdctl", "image", "ls"]));
        assert!(t.invocation.env.is_empty());
    }

    #[test]
    fn test_windows_prefix_forwards_workdir() {
        let t = translator(Platform::Windows)
            .with_cwd("C:\\Users\\dev\\proj")
            .translate("info", &[])
            .unwrap();
        assert_eq!(
            t.invocation.args,
            strings(&[
                "shell",
                "--workdir",
                "/mnt/c/Users/dev/proj",
                "nerdvm",
                "sudo",
                "-E",
                "nerdctl",
                "info",
            ])
        );
    }

    #[test]
    fn test_unknown_command() {
        let err = translator(Platform::Linux).translate("frobnicate", &[]).unwrap_err();
        assert!(matches!(err, TranslateError::UnknownCommand(c) if c == "frobnicate"));
    }

    #[test]
    fn test_group_subcommand() {
        let t = translator(Platform::Darwin)
            .translate("container", &strings(&["run", "--mount", "source=/a,target=/b", "alpine"]))
            .unwrap();
        assert_eq!(t.command, "container run");
        assert_eq!(
            relayed(&t),
            strings(&[
                "container",
                "run",
                "--mount",
                "source=/a,target=/b,options=rbind,exec,rw",
                "alpine",
            ])
        );
    }

    #[test]
    fn test_run_rewrites_mount_inline() {
        let t = translator(Platform::Darwin)
            .translate("run", &strings(&["--rm", "--mount=src=/x,dst=/y,options=ro", "alpine"]))
            .unwrap();
        assert_eq!(
            relayed(&t),
            strings(&["container", "run", "--rm", "--mount=src=/x,dst=/y,options=ro,exec,rw", "alpine"])
        );
    }

    #[test]
    fn test_run_resolves_add_host_on_darwin() {
        let t = translator(Platform::Darwin)
            .translate("run", &strings(&["--add-host", "host.internal:host-gateway", "alpine"]))
            .unwrap();
        assert!(relayed(&t).contains(&"host.internal:192.168.5.2".to_string()));
    }

    #[test]
    fn test_configured_gateway_overrides_platform() {
        let config = Config::new().vm_gateway("10.1.2.3");
        let t = Translator::new(Platform::Windows, Platform::Windows.tables(), config)
            .with_cwd("C:\\w")
            .translate("run", &strings(&["--add-host=gw:host-gateway", "alpine"]))
            .unwrap();
        assert!(relayed(&t).contains(&"--add-host=gw:10.1.2.3".to_string()));
    }

    #[test]
    fn test_env_forwarding() {
        let t = translator(Platform::Linux)
            .translate("run", &strings(&["-e", "API_KEY", "-e", "UNSET", "--env=A=1", "alpine"]))
            .unwrap();
        assert_eq!(
            relayed(&t),
            strings(&["container", "run", "-e", "API_KEY=k-123", "--env=A=1", "alpine"])
        );
    }

    #[test]
    fn test_container_command_is_not_rewritten() {
        let args = strings(&["-it", "--name", "box", "alpine", "sh", "-c", "env -e X", "-e", "HOME"]);
        let t = translator(Platform::Linux).translate("run", &args).unwrap();
        let mut expected = strings(&["container", "run"]);
        expected.extend(args);
        assert_eq!(relayed(&t), expected);
    }

    #[test]
    fn test_value_of_unhandled_flag_is_not_positional() {
        let t = translator(Platform::Linux)
            .translate("run", &strings(&["--name", "web", "-e", "API_KEY", "nginx"]))
            .unwrap();
        assert_eq!(
            relayed(&t),
            strings(&["container", "run", "--name", "web", "-e", "API_KEY=k-123", "nginx"])
        );
    }

    #[test]
    fn test_missing_flag_value() {
        let err = translator(Platform::Linux)
            .translate("run", &strings(&["--mount"]))
            .unwrap_err();
        assert!(matches!(err, TranslateError::MissingValue { flag } if flag == "--mount"));
    }

    #[test]
    fn test_malformed_mount_aborts() {
        let err = translator(Platform::Darwin)
            .translate("run", &strings(&["--mount", "=bad", "alpine"]))
            .unwrap_err();
        assert!(matches!(err, TranslateError::MalformedMount { .. }));
    }

    #[test]
    fn test_empty_tables_pass_through() {
        let t = Translator::new(Platform::Linux, HandlerTables::new(), Config::new())
            .translate("run", &strings(&["--mount", "source=/a", "alpine"]))
            .unwrap();
        assert_eq!(t.command, "run");
        assert_eq!(relayed(&t), strings(&["run", "--mount", "source=/a", "alpine"]));
    }

    #[test]
    fn test_command_handler_overrides_flag_handlers() {
        fn reverse(_: &HandlerContext<'_>, args: &[String]) -> Result<Vec<String>> {
            Ok(args.iter().rev().cloned().collect())
        }
        let tables = HandlerTables::shared().with_command_handler("container run", reverse);
        let t = Translator::new(Platform::Linux, tables, Config::new())
            .translate("run", &strings(&["--mount", "source=/a", "alpine"]))
            .unwrap();
        assert_eq!(
            relayed(&t),
            strings(&["container", "run", "alpine", "source=/a", "--mount"])
        );
    }

    #[test]
    fn test_double_dash_stops_rewriting() {
        let t = translator(Platform::Linux)
            .translate("build", &strings(&["-t", "app", "--", "--add-host", "x:host-gateway"]))
            .unwrap();
        assert_eq!(
            relayed(&t),
            strings(&["image", "build", "-t", "app", "--", "--add-host", "x:host-gateway"])
        );
    }

    #[test]
    fn test_needs_reconstruction() {
        assert!(needs_reconstruction("inspect", &strings(&["web"])));
        assert!(needs_reconstruction("container inspect", &strings(&["a", "b"])));
        assert!(needs_reconstruction("inspect", &strings(&["--type", "container", "web"])));
        assert!(!needs_reconstruction("inspect", &strings(&["--type=image", "alpine"])));
        assert!(!needs_reconstruction("inspect", &strings(&["--format", "{{.Id}}", "web"])));
        assert!(!needs_reconstruction("container inspect", &strings(&["-f={{.Id}}", "web"])));
        assert!(!needs_reconstruction("image inspect", &strings(&["alpine"])));
    }

    #[test]
    fn test_boolean_flag_does_not_swallow_image() {
        let t = translator(Platform::Linux)
            .translate(
                "run",
                &strings(&["--no-healthcheck", "alpine", "-e", "API_KEY"]),
            )
            .unwrap();
        assert_eq!(
            relayed(&t),
            strings(&["container", "run", "--no-healthcheck", "alpine", "-e", "API_KEY"])
        );

        let t = translator(Platform::Linux)
            .translate("run", &strings(&["--rootfs", "/srv/root", "-e", "API_KEY", "/bin/sh"]))
            .unwrap();
        assert_eq!(
            relayed(&t),
            strings(&["container", "run", "--rootfs", "/srv/root", "-e", "API_KEY", "/bin/sh"])
        );
    }

    #[test]
    fn test_takes_value() {
        assert!(takes_value("--name"));
        assert!(takes_value("-p"));
        assert!(!takes_value("-d"));
        assert!(!takes_value("-it"));
        assert!(!takes_value("--rm"));
        assert!(!takes_value("--no-healthcheck"));
        assert!(!takes_value("--rootfs"));
        assert!(takes_value("-ip"));
    }
}
