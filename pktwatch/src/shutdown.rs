use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing::debug;

use crate::error::Result;

/// SIGINT/SIGTERM listener.
///
/// Handlers are installed by [`install`](Self::install) so a failure there
/// is a startup error. [`recv`](Self::recv) then resolves on whichever
/// signal arrives first.
pub struct ShutdownSignal {
    interrupt: Signal,
    terminate: Signal,
}

impl ShutdownSignal {
    pub fn install() -> Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    pub async fn recv(mut self) {
        tokio::select! {
            _ = self.interrupt.recv() => debug!("received SIGINT"),
            _ = self.terminate.recv() => debug!("received SIGTERM"),
        }
    }
}
