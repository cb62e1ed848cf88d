//! Bind-mount specifications and option normalization.
//!
//! A mount is written in the runtime's flat syntax,
//! `type=bind,source=/a,destination=/b,options=rbind,exec,rw`. Bare tokens
//! following `options=` belong to the options list; any other bare token
//! (`readonly`) is kept as a flag.

pub mod repair;

use std::fmt;
use std::path::Path;

use tracing::debug;

use crate::error::{Result, TranslateError};

/// Options set on a bind mount that carries none.
pub const DEFAULT_OPTIONS: &str = "rbind,exec,rw";

/// Tokens every bind mount must carry, appended in this order when missing.
pub const REQUIRED_OPTIONS: &[&str] = &["exec", "rw"];

const OPTIONS_KEY: &str = "options";

/// One `--mount` value, keys kept in the order the user wrote them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountSpec {
    entries: Vec<(String, Option<String>)>,
}

impl MountSpec {
    pub fn parse(s: &str) -> Result<Self> {
        if s.trim().is_empty() {
            return Err(TranslateError::MalformedMount {
                spec: s.to_string(),
                reason: "empty specification".to_string(),
            });
        }

        let mut entries: Vec<(String, Option<String>)> = Vec::new();
        for token in s.split(',') {
            match token.split_once('=') {
                Some((key, value)) => {
                    let key = key.trim();
                    if key.is_empty() {
                        return Err(TranslateError::MalformedMount {
                            spec: s.to_string(),
                            reason: format!("token {:?} has no key", token),
                        });
                    }
                    entries.push((key.to_string(), Some(value.to_string())));
                }
                None => match entries.last_mut() {
                    Some((key, Some(value))) if key == OPTIONS_KEY && !token.is_empty() => {
                        value.push(',');
                        value.push_str(token);
                    }
                    _ if token.is_empty() => {
                        return Err(TranslateError::MalformedMount {
                            spec: s.to_string(),
                            reason: "empty token".to_string(),
                        });
                    }
                    _ => entries.push((token.to_string(), None)),
                },
            }
        }

        Ok(Self { entries })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_deref())
    }

    /// Replace the value of `key` in place, or append it at the end.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = Some(value),
            None => self.entries.push((key.to_string(), Some(value))),
        }
    }

    /// Host side of the mount, under either of its spellings.
    pub fn source(&self) -> Option<&str> {
        self.get("source").or_else(|| self.get("src"))
    }

    pub fn set_source(&mut self, value: impl Into<String>) {
        let key = if self.get("source").is_some() || self.get("src").is_none() {
            "source"
        } else {
            "src"
        };
        self.set(key, value);
    }

    pub fn options(&self) -> Option<&str> {
        self.get(OPTIONS_KEY)
    }

    /// Guarantee the required option tokens without touching the others.
    ///
    /// Returns true when the options changed.
    pub fn ensure_options(&mut self, defaults: &str, required: &[&str]) -> bool {
        let Some(current) = self.options() else {
            self.set(OPTIONS_KEY, defaults);
            return true;
        };

        let present: Vec<&str> = current.split(',').collect();
        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|token| !present.contains(token))
            .collect();
        if missing.is_empty() {
            return false;
        }

        let mut updated = current.to_string();
        for token in missing {
            if !updated.is_empty() {
                updated.push(',');
            }
            updated.push_str(token);
        }
        self.set(OPTIONS_KEY, updated);
        true
    }
}

impl fmt::Display for MountSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            match value {
                Some(value) => write!(f, "{}={}", key, value)?,
                None => f.write_str(key)?,
            }
        }
        Ok(())
    }
}

/// What a platform demands of bind mounts.
#[derive(Debug, Clone, Copy)]
pub struct MountPolicy {
    pub default_options: &'static str,
    pub required_options: &'static [&'static str],
    /// Directory names whose host trees get their permissions repaired.
    pub sensitive_dirs: &'static [&'static str],
}

impl MountPolicy {
    pub const fn new(sensitive_dirs: &'static [&'static str]) -> Self {
        Self {
            default_options: DEFAULT_OPTIONS,
            required_options: REQUIRED_OPTIONS,
            sensitive_dirs,
        }
    }

    fn is_sensitive(&self, source: &str) -> bool {
        Path::new(source).components().any(|c| {
            self.sensitive_dirs
                .iter()
                .any(|dir| c.as_os_str() == std::ffi::OsStr::new(dir))
        })
    }
}

/// Normalize a mount: fix its options and, for sensitive sources, repair
/// host permissions before the runtime sees the mount.
///
/// Mounts without a host source (tmpfs, named volumes) are returned untouched.
pub fn normalize(mut spec: MountSpec, policy: &MountPolicy) -> Result<MountSpec> {
    let Some(source) = spec.source().map(str::to_string) else {
        return Ok(spec);
    };

    if spec.ensure_options(policy.default_options, policy.required_options) {
        debug!(
            source = %source,
            options = spec.options().unwrap_or_default(),
            "normalized mount options"
        );
    }

    if policy.is_sensitive(&source) {
        repair::repair_tree(Path::new(&source))?;
    }

    Ok(spec)
}
