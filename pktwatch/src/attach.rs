use tracing::{debug, warn};

use crate::error::{AgentError, Result};
use crate::iface::{InterfaceHandle, InterfaceResolver};
use crate::key::TargetKey;
use crate::program::InspectionProgram;
use crate::table::{CounterReading, CounterTable};

/// Sole owner of the program-to-interface binding.
///
/// The binding is created by [`acquire`](Self::acquire) and torn down by the
/// first call to [`release`](Self::release). `Drop` releases as well, so the
/// binding cannot outlive the manager on any exit path. The program itself
/// is dropped (closed) right after the manager.
pub struct AttachmentManager<P: InspectionProgram> {
    program: P,
    interface: InterfaceHandle,
    link: Option<P::Link>,
}

impl<P: InspectionProgram> AttachmentManager<P> {
    /// Resolve `interface_name` and bind `program` to its ingress hook.
    ///
    /// Resolution happens first, so an unknown name never reaches the
    /// kernel. On any failure `program` is dropped here and therefore closed.
    pub fn acquire<R>(mut program: P, interface_name: &str, resolver: &R) -> Result<Self>
    where
        R: InterfaceResolver + ?Sized,
    {
        let interface = resolver.resolve(interface_name)?;
        let link = program.attach(&interface)?;
        debug!("inspection program attached to {}", interface);

        Ok(Self {
            program,
            interface,
            link: Some(link),
        })
    }

    pub fn interface(&self) -> &InterfaceHandle {
        &self.interface
    }

    pub fn is_live(&self) -> bool {
        self.link.is_some()
    }

    /// Unbind the program. Returns `true` only for the call that actually
    /// released a live binding; every later call is a no-op.
    ///
    /// Detach errors are logged and otherwise ignored.
    pub fn release(&mut self) -> bool {
        let Some(link) = self.link.take() else {
            return false;
        };
        match self.program.detach(link) {
            Ok(()) => debug!("inspection program detached from {}", self.interface),
            Err(e) => warn!("releasing attachment on {}: {}", self.interface, e),
        }
        true
    }
}

impl<P: InspectionProgram> CounterTable for AttachmentManager<P> {
    fn lookup(&self, key: TargetKey) -> Result<CounterReading> {
        if !self.is_live() {
            return Err(AgentError::LookupFailed("attachment released".into()));
        }
        self.program.lookup(key)
    }
}

impl<P: InspectionProgram> Drop for AttachmentManager<P> {
    fn drop(&mut self) {
        if self.release() {
            debug!("attachment on {} released on drop", self.interface);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockProgram, MockResolver};

    #[test]
    fn test_acquire_binds_resolved_interface() {
        let program = MockProgram::new();
        let probe = program.probe();
        let resolver = MockResolver::new().with_interface("eth0", 2);

        let manager = AttachmentManager::acquire(program, "eth0", &resolver).unwrap();

        assert!(manager.is_live());
        assert_eq!(manager.interface(), &InterfaceHandle::new("eth0", 2));
        assert_eq!(probe.attach_calls(), 1);
        assert_eq!(probe.attached_to(), Some(InterfaceHandle::new("eth0", 2)));
    }

    #[test]
    fn test_acquire_unknown_interface_never_attaches() {
        let program = MockProgram::new();
        let probe = program.probe();
        let resolver = MockResolver::new().with_interface("eth0", 2);

        let result = AttachmentManager::acquire(program, "eth9", &resolver);

        assert!(matches!(result, Err(AgentError::InterfaceNotFound(ref n)) if n == "eth9"));
        assert_eq!(probe.attach_calls(), 0);
        assert_eq!(probe.detach_calls(), 0);
        assert!(probe.is_closed());
    }

    #[test]
    fn test_acquire_attach_failure_closes_program() {
        let program = MockProgram::new().fail_attach("device or resource busy");
        let probe = program.probe();
        let resolver = MockResolver::new().with_interface("eth0", 2);

        let result = AttachmentManager::acquire(program, "eth0", &resolver);

        match result {
            Err(AgentError::AttachFailed { interface, reason }) => {
                assert_eq!(interface, "eth0");
                assert!(reason.contains("busy"));
            }
            Err(other) => panic!("expected AttachFailed, got {other}"),
            Ok(_) => panic!("attach should have failed"),
        }
        assert_eq!(probe.detach_calls(), 0);
        assert!(probe.is_closed());
    }

    #[test]
    fn test_release_is_idempotent() {
        let program = MockProgram::new();
        let probe = program.probe();
        let resolver = MockResolver::new().with_interface("eth0", 2);
        let mut manager = AttachmentManager::acquire(program, "eth0", &resolver).unwrap();

        assert!(manager.release());
        assert!(!manager.release());
        assert!(!manager.is_live());
        assert_eq!(probe.detach_calls(), 1);

        drop(manager);
        assert_eq!(probe.detach_calls(), 1);
        assert!(probe.is_closed());
    }

    #[test]
    fn test_drop_releases_live_attachment() {
        let program = MockProgram::new();
        let probe = program.probe();
        let resolver = MockResolver::new().with_interface("eth0", 2);
        let manager = AttachmentManager::acquire(program, "eth0", &resolver).unwrap();

        drop(manager);

        assert_eq!(probe.detach_calls(), 1);
        assert!(probe.is_closed());
    }

    #[test]
    fn test_release_survives_detach_error() {
        let program = MockProgram::new().fail_detach("no such link");
        let probe = program.probe();
        let resolver = MockResolver::new().with_interface("eth0", 2);
        let mut manager = AttachmentManager::acquire(program, "eth0", &resolver).unwrap();

        assert!(manager.release());
        assert!(!manager.release());
        assert_eq!(probe.detach_calls(), 1);
    }

    #[test]
    fn test_lookup_after_release_fails() {
        let key = TargetKey::encode("10.0.0.1").unwrap();
        let program = MockProgram::new().with_count(key, 7);
        let resolver = MockResolver::new().with_interface("eth0", 2);
        let mut manager = AttachmentManager::acquire(program, "eth0", &resolver).unwrap();

        assert_eq!(manager.lookup(key).unwrap(), CounterReading::Observed(7));
        manager.release();
        assert!(matches!(
            manager.lookup(key),
            Err(AgentError::LookupFailed(_))
        ));
    }

    #[test]
    fn test_lookup_missing_key_is_not_an_error() {
        let key = TargetKey::encode("10.0.0.1").unwrap();
        let resolver = MockResolver::new().with_interface("eth0", 2);
        let manager = AttachmentManager::acquire(MockProgram::new(), "eth0", &resolver).unwrap();

        assert_eq!(manager.lookup(key).unwrap(), CounterReading::NotYetObserved);
    }
}
