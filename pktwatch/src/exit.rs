//! Process exit codes.

use crate::error::AgentError;

pub mod codes {
    /// Clean shutdown after a signal.
    pub const SUCCESS: i32 = 0;
    /// Bad configuration, including an unparsable target address.
    pub const CONFIG: i32 = 1;
    /// Could not lift resource limits.
    pub const PERMISSION: i32 = 2;
    /// Inspection program failed to load.
    pub const LOAD: i32 = 3;
    /// Configured interface does not exist.
    pub const NO_INTERFACE: i32 = 4;
    /// Kernel refused the attachment.
    pub const ATTACH: i32 = 5;
    /// Anything else that ended the run early.
    pub const RUNTIME: i32 = 6;
}

pub fn exit_code(error: &AgentError) -> i32 {
    match error {
        AgentError::Config(_) | AgentError::InvalidAddress { .. } => codes::CONFIG,
        AgentError::Permission(_) => codes::PERMISSION,
        AgentError::Load(_) => codes::LOAD,
        AgentError::InterfaceNotFound(_) => codes::NO_INTERFACE,
        AgentError::AttachFailed { .. } => codes::ATTACH,
        AgentError::LookupFailed(_) | AgentError::DetachFailed(_) | AgentError::Signal(_) => {
            codes::RUNTIME
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_startup_failures_are_nonzero_and_distinct() {
        let errors = [
            AgentError::Config("missing target".into()),
            AgentError::Permission("EPERM".into()),
            AgentError::Load("no object".into()),
            AgentError::InterfaceNotFound("eth9".into()),
            AgentError::AttachFailed {
                interface: "eth0".into(),
                reason: "busy".into(),
            },
        ];
        let mut seen: Vec<i32> = errors.iter().map(exit_code).collect();
        assert!(seen.iter().all(|&c| c != codes::SUCCESS));
        seen.dedup();
        assert_eq!(seen.len(), errors.len());
    }

    #[test]
    fn test_exit_code_invalid_address() {
        let err = crate::key::TargetKey::encode("1.2.3").unwrap_err();
        assert_eq!(exit_code(&err), codes::CONFIG);
    }

    #[test]
    fn test_exit_code_signal_install() {
        let err = AgentError::from(std::io::Error::other("boom"));
        assert_eq!(exit_code(&err), codes::RUNTIME);
    }
}
