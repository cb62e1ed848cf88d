//! Windows: the runtime lives in a WSL2 distribution, so every host path the
//! user passes has to be rewritten into its `/mnt/<drive>/...` form.

use crate::error::{Result, TranslateError};
use crate::mount::{self, MountSpec};
use crate::translate::{rewrite_flags, FlagScan};

use super::{handlers, ArgHandler, HandlerContext, HandlerTables};

pub fn tables() -> HandlerTables {
    HandlerTables::shared()
        .with_arg_handler("container run", &["--mount"], handle_mount)
        .with_arg_handler("container create", &["--mount"], handle_mount)
        .with_arg_handler("container run", &["-v", "--volume"], handle_volume)
        .with_arg_handler("container create", &["-v", "--volume"], handle_volume)
        .with_arg_handler("container run", &["--env-file"], handle_file_path)
        .with_arg_handler("container create", &["--env-file"], handle_file_path)
        .with_arg_handler("image save", &["-o", "--output"], handle_file_path)
        .with_arg_handler("image load", &["-i", "--input"], handle_file_path)
        .with_command_handler("image build", handle_image_build)
        .with_command_handler("container cp", handle_container_cp)
}

/// Drive letter of `C:\...`, `C:/...` or a bare `C:`.
fn drive_letter(path: &str) -> Option<char> {
    let bytes = path.as_bytes();
    let letter = *bytes.first()?;
    if !letter.is_ascii_alphabetic() || bytes.get(1) != Some(&b':') {
        return None;
    }
    match bytes.get(2) {
        None | Some(b'\\') | Some(b'/') => Some(letter.to_ascii_lowercase() as char),
        _ => None,
    }
}

/// Convert a host path into the path WSL mounts it at.
///
/// Relative paths are resolved against `cwd`; paths already in POSIX form
/// are left alone.
pub fn to_wsl_path(cwd: &str, path: &str) -> Result<String> {
    if path.starts_with("\\\\") {
        return Err(TranslateError::InvalidPath {
            path: path.to_string(),
            reason: "UNC paths cannot be mounted into the VM".to_string(),
        });
    }
    if path.starts_with('/') {
        return Ok(path.to_string());
    }

    let absolute = if drive_letter(path).is_some() {
        path.to_string()
    } else {
        format!("{}\\{}", cwd, path)
    };
    let Some(drive) = drive_letter(&absolute) else {
        return Err(TranslateError::InvalidPath {
            path: path.to_string(),
            reason: format!("working directory {:?} is not a Windows path", cwd),
        });
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in absolute[2..].split(['\\', '/']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let mut out = format!("/mnt/{}", drive);
    for segment in segments {
        out.push('/');
        out.push_str(segment);
    }
    Ok(out)
}

fn looks_like_host_path(s: &str) -> bool {
    drive_letter(s).is_some() || s.starts_with('.') || s.contains('\\')
}

/// `--mount`: normalize against the host path, then point the runtime at
/// the WSL path.
fn handle_mount(ctx: &HandlerContext<'_>, value: &str) -> Result<Option<String>> {
    let spec = MountSpec::parse(value)?;
    let mut spec = mount::normalize(spec, &ctx.mount_policy)?;
    if let Some(source) = spec.source().map(str::to_string) {
        spec.set_source(to_wsl_path(ctx.cwd, &source)?);
    }
    Ok(Some(spec.to_string()))
}

/// `-v HOST:CONTAINER[:OPTS]`: convert the host half; named volumes pass.
fn handle_volume(ctx: &HandlerContext<'_>, value: &str) -> Result<Option<String>> {
    let split_at = if drive_letter(value).is_some() {
        value[2..].find(':').map(|i| i + 2)
    } else {
        value.find(':')
    };
    let Some(split_at) = split_at else {
        return Ok(Some(value.to_string()));
    };

    let (host, rest) = value.split_at(split_at);
    if !looks_like_host_path(host) {
        return Ok(Some(value.to_string()));
    }
    Ok(Some(format!("{}{}", to_wsl_path(ctx.cwd, host)?, rest)))
}

fn handle_file_path(ctx: &HandlerContext<'_>, value: &str) -> Result<Option<String>> {
    if value == "-" {
        return Ok(Some(value.to_string()));
    }
    to_wsl_path(ctx.cwd, value).map(Some)
}

/// Convert the path-valued keys of a `key=value,...` option.
fn convert_keys(ctx: &HandlerContext<'_>, value: &str, keys: &[&str]) -> Result<String> {
    value
        .split(',')
        .map(|token| match token.split_once('=') {
            Some((key, path)) if keys.contains(&key) => {
                Ok(format!("{}={}", key, to_wsl_path(ctx.cwd, path)?))
            }
            _ => Ok(token.to_string()),
        })
        .collect::<Result<Vec<_>>>()
        .map(|tokens| tokens.join(","))
}

/// `build -o type=local,dest=PATH`
fn handle_build_output(ctx: &HandlerContext<'_>, value: &str) -> Result<Option<String>> {
    if !value.contains('=') {
        return handle_file_path(ctx, value);
    }
    convert_keys(ctx, value, &["dest"]).map(Some)
}

/// `build --secret id=ID,src=PATH`
fn handle_build_secret(ctx: &HandlerContext<'_>, value: &str) -> Result<Option<String>> {
    convert_keys(ctx, value, &["src", "source"]).map(Some)
}

fn build_flag(flag: &str) -> Option<ArgHandler> {
    match flag {
        "-f" | "--file" | "--iidfile" => Some(handle_file_path as ArgHandler),
        "-o" | "--output" => Some(handle_build_output as ArgHandler),
        "--secret" => Some(handle_build_secret as ArgHandler),
        "--add-host" => Some(handlers::handle_add_host as ArgHandler),
        _ => None,
    }
}

/// Flags of `image build` that take no value.
const BUILD_BOOLEAN_FLAGS: &[&str] = &["--no-cache", "--pull", "--rm", "-q", "--quiet", "-h", "--help"];

/// Index of the build context: the first argument that is neither a flag
/// nor the value of one. Flags may come after the context.
fn build_context_index(args: &[String]) -> Option<usize> {
    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        if arg == "--" {
            return (i + 1 < args.len()).then_some(i + 1);
        }
        if arg.len() > 1 && arg.starts_with('-') {
            if !arg.contains('=') && !BUILD_BOOLEAN_FLAGS.contains(&arg) {
                i += 1;
            }
            i += 1;
            continue;
        }
        return Some(i);
    }
    None
}

/// `image build`: rewrite the path flags, then the build context.
fn handle_image_build(ctx: &HandlerContext<'_>, args: &[String]) -> Result<Vec<String>> {
    let mut out = rewrite_flags(ctx, args, &build_flag, FlagScan::All)?;
    if let Some(index) = build_context_index(&out) {
        let context = &mut out[index];
        let remote = context.contains("://") || context.starts_with("git@");
        // `-` reads the build definition from stdin.
        if context.as_str() != "-" && !remote {
            *context = to_wsl_path(ctx.cwd, context)?;
        }
    }
    Ok(out)
}

/// `container cp SRC DST`: the side that is not `container:path` is a host path.
fn handle_container_cp(ctx: &HandlerContext<'_>, args: &[String]) -> Result<Vec<String>> {
    args.iter()
        .map(|arg| {
            let container_ref = drive_letter(arg).is_none() && arg.contains(':');
            if arg.starts_with('-') || container_ref {
                Ok(arg.clone())
            } else {
                to_wsl_path(ctx.cwd, arg)
            }
        })
        .collect()
}
