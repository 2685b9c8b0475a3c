use thiserror::Error;

/// Every failure the agent can report.
///
/// Only `LookupFailed` is recoverable; everything else ends the process
/// before the poll loop starts (see [`AgentError::is_fatal`]).
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid IPv4 address {input:?}: {reason}")]
    InvalidAddress { input: String, reason: String },

    #[error("insufficient privileges: {0}")]
    Permission(String),

    #[error("failed to load inspection program: {0}")]
    Load(String),

    #[error("network interface not found: {0}")]
    InterfaceNotFound(String),

    #[error("failed to attach inspection program to interface '{interface}': {reason}")]
    AttachFailed { interface: String, reason: String },

    #[error("counter lookup failed: {0}")]
    LookupFailed(String),

    #[error("failed to detach inspection program: {0}")]
    DetachFailed(String),

    #[error("failed to install signal handler: {0}")]
    Signal(#[from] std::io::Error),
}

impl AgentError {
    pub(crate) fn invalid_address(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this error must terminate the agent.
    ///
    /// Lookup failures are reported per tick and detach failures during
    /// release are logged, neither stops the process on its own.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            AgentError::LookupFailed(_) | AgentError::DetachFailed(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_failure_is_recoverable() {
        assert!(!AgentError::LookupFailed("map gone".into()).is_fatal());
        assert!(!AgentError::DetachFailed("ENOENT".into()).is_fatal());
    }

    #[test]
    fn test_startup_failures_are_fatal() {
        let errors = [
            AgentError::Config("bad".into()),
            AgentError::invalid_address("1.2.3", "expected 4 octets"),
            AgentError::Permission("EPERM".into()),
            AgentError::Load("missing object".into()),
            AgentError::InterfaceNotFound("eth9".into()),
            AgentError::AttachFailed {
                interface: "eth0".into(),
                reason: "busy".into(),
            },
        ];
        for err in &errors {
            assert!(err.is_fatal(), "{err} should be fatal");
        }
    }

    #[test]
    fn test_attach_failed_message_names_interface() {
        let err = AgentError::AttachFailed {
            interface: "eth0".into(),
            reason: "device or resource busy".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'eth0'"));
        assert!(msg.contains("busy"));
    }
}
