use tracing::debug;

use crate::error::{Result, TranslateError};

/// Address that stands for "the host, as seen from inside the VM".
pub const HOST_GATEWAY: &str = "host-gateway";

/// Resolve `host[:port]`, replacing the `host-gateway` sentinel with `gateway`.
///
/// Addresses with any other host, or resolved on a platform without a gateway,
/// are returned unchanged. The port is kept verbatim.
pub fn resolve_address(addr: &str, gateway: Option<&str>) -> Result<String> {
    let (host, port) = match addr.split_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (addr, None),
    };
    if host.is_empty() {
        return Err(TranslateError::MalformedAddress(addr.to_string()));
    }

    if host != HOST_GATEWAY {
        return Ok(addr.to_string());
    }
    let Some(gateway) = gateway else {
        debug!("no VM gateway configured, leaving {:?} for the runtime", addr);
        return Ok(addr.to_string());
    };

    debug!(r#"resolving special address "{}" to {:?}"#, HOST_GATEWAY, gateway);
    Ok(match port {
        Some(port) => format!("{}:{}", gateway, port),
        None => gateway.to_string(),
    })
}

/// Resolve the address half of an `--add-host NAME:ADDR` value.
///
/// `ADDR` is a bare IP (possibly IPv6, so it may contain colons) and carries
/// no port: only the exact sentinel is replaced.
pub fn resolve_host_entry(entry: &str, gateway: Option<&str>) -> Result<String> {
    let Some((name, addr)) = entry.split_once(':') else {
        return Err(TranslateError::MalformedAddress(entry.to_string()));
    };
    if name.is_empty() || addr.is_empty() {
        return Err(TranslateError::MalformedAddress(entry.to_string()));
    }
    if addr != HOST_GATEWAY {
        return Ok(entry.to_string());
    }
    let Some(gateway) = gateway else {
        debug!("no VM gateway configured, leaving {:?} for the runtime", entry);
        return Ok(entry.to_string());
    };
    debug!(host = %name, address = %gateway, "resolved host entry");
    Ok(format!("{}:{}", name, gateway))
}
