use std::fmt;

use tracing::debug;

use crate::error::{AgentError, Result};

/// Longest interface name the kernel accepts (`IFNAMSIZ - 1`).
const MAX_IFNAME_LEN: usize = 15;

/// A network interface resolved to its kernel index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceHandle {
    name: String,
    index: u32,
}

impl InterfaceHandle {
    pub fn new(name: impl Into<String>, index: u32) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Display for InterfaceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (ifindex {})", self.name, self.index)
    }
}

/// Turns an interface name into an [`InterfaceHandle`].
pub trait InterfaceResolver {
    fn resolve(&self, name: &str) -> Result<InterfaceHandle>;
}

/// Resolver backed by `if_nametoindex(3)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

impl InterfaceResolver for SystemResolver {
    fn resolve(&self, name: &str) -> Result<InterfaceHandle> {
        validate_name(name)?;
        let index = nix::net::if_::if_nametoindex(name).map_err(|e| {
            debug!("if_nametoindex({}) failed: {}", name, e);
            AgentError::InterfaceNotFound(name.to_string())
        })?;
        Ok(InterfaceHandle::new(name, index))
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_IFNAME_LEN || name.contains(['\0', '/']) {
        return Err(AgentError::InterfaceNotFound(name.to_string()));
    }
    Ok(())
}
