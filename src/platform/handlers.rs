//! Flag handlers shared by every platform.

use tracing::debug;

use crate::error::Result;
use crate::mount::{self, MountSpec};
use crate::network;

use super::HandlerContext;

/// `--mount`: normalize the options of bind mounts.
pub fn handle_mount(ctx: &HandlerContext<'_>, value: &str) -> Result<Option<String>> {
    let spec = MountSpec::parse(value)?;
    let spec = mount::normalize(spec, &ctx.mount_policy)?;
    Ok(Some(spec.to_string()))
}

/// `--add-host NAME:ADDR`: resolve `host-gateway` to the VM gateway.
pub fn handle_add_host(ctx: &HandlerContext<'_>, value: &str) -> Result<Option<String>> {
    network::resolve_host_entry(value, ctx.gateway).map(Some)
}

/// `-e KEY`: forward the host's value of `KEY`, or drop the flag when unset.
///
/// `-e KEY=VALUE` is forwarded as written.
pub fn handle_env(ctx: &HandlerContext<'_>, value: &str) -> Result<Option<String>> {
    if value.contains('=') {
        return Ok(Some(value.to_string()));
    }
    match (ctx.host_env)(value) {
        Some(host_value) => Ok(Some(format!("{}={}", value, host_value))),
        None => {
            debug!(key = %value, "environment variable not set on host, dropping");
            Ok(None)
        }
    }
}
