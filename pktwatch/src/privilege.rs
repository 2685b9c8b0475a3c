use nix::sys::resource::{getrlimit, setrlimit, Resource, RLIM_INFINITY};
use tracing::debug;

use crate::error::{AgentError, Result};

/// Lift the locked-memory limit so the kernel accepts our maps.
///
/// Kernels before 5.11 charge BPF maps against `RLIMIT_MEMLOCK`. Newer
/// kernels use memcg accounting and ignore it. Safe to call more than once.
pub fn ensure_capability() -> Result<()> {
    if memlock_unlimited() {
        debug!("memlock rlimit already unlimited");
        return Ok(());
    }

    setrlimit(Resource::RLIMIT_MEMLOCK, RLIM_INFINITY, RLIM_INFINITY).map_err(|e| {
        AgentError::Permission(format!(
            "removing memlock rlimit: {e} (requires CAP_SYS_RESOURCE, or run as root)"
        ))
    })?;
    debug!("memlock rlimit removed");
    Ok(())
}

fn memlock_unlimited() -> bool {
    matches!(
        getrlimit(Resource::RLIMIT_MEMLOCK),
        Ok((soft, hard)) if soft == RLIM_INFINITY && hard == RLIM_INFINITY
    )
}
