use std::future::Future;
use std::time::Duration;

use tracing::info;

use crate::attach::AttachmentManager;
use crate::config::Config;
use crate::error::Result;
use crate::iface::InterfaceResolver;
use crate::key::TargetKey;
use crate::poll::{PollLoop, PollSummary, ReportSink};
use crate::program::{InspectionProgram, ProgramLoader};

/// Everything the agent holds while it runs.
///
/// Built by [`start`](Self::start), owned by the entry point and lent to the
/// poll loop. Dropping it releases the attachment (if still live) and then
/// closes the program.
pub struct Agent<P: InspectionProgram> {
    key: TargetKey,
    poll_interval: Duration,
    attachment: AttachmentManager<P>,
}

impl<P: InspectionProgram> Agent<P> {
    /// Validate config, load the program and attach it.
    ///
    /// Steps run in order and stop at the first failure. Anything acquired
    /// before the failure is dropped on the way out: a loaded program is
    /// closed, nothing is left attached.
    pub fn start<L, R>(config: &Config, loader: &L, resolver: &R) -> Result<Self>
    where
        L: ProgramLoader<Program = P>,
        R: InterfaceResolver + ?Sized,
    {
        let key = config.validate()?;
        let program = loader.load()?;
        let attachment = AttachmentManager::acquire(program, &config.interface, resolver)?;

        info!(
            "counting packets from {} on {}",
            key,
            attachment.interface().name()
        );
        Ok(Self {
            key,
            poll_interval: config.poll_interval(),
            attachment,
        })
    }

    pub fn key(&self) -> TargetKey {
        self.key
    }

    pub fn attachment(&self) -> &AttachmentManager<P> {
        &self.attachment
    }

    /// Run the poll loop until `shutdown` resolves.
    pub async fn run<S, F>(&mut self, sink: S, shutdown: F) -> PollSummary
    where
        S: ReportSink,
        F: Future<Output = ()>,
    {
        PollLoop::new(&mut self.attachment, self.key, self.poll_interval, sink)
            .run(shutdown)
            .await
    }
}
