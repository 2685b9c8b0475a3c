//! In-memory stand-ins for the kernel side, used by the unit and
//! integration tests.
//!
//! [`MockProgram`] behaves like a loaded inspection program without touching
//! the kernel. Its counters are inspected through a [`MockProbe`], which
//! stays valid after the program has been moved into an
//! `AttachmentManager` or dropped.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{AgentError, Result};
use crate::iface::{InterfaceHandle, InterfaceResolver};
use crate::key::TargetKey;
use crate::poll::{Report, ReportSink};
use crate::program::{InspectionProgram, ProgramLoader};
use crate::table::{CounterReading, CounterTable};

#[derive(Debug, Default)]
struct MockState {
    attach_calls: usize,
    detach_calls: usize,
    lookups: usize,
    closed: bool,
    attached_to: Option<InterfaceHandle>,
    script: VecDeque<std::result::Result<CounterReading, String>>,
    counts: HashMap<u32, u64>,
    attach_error: Option<String>,
    detach_error: Option<String>,
}

type Shared = Arc<Mutex<MockState>>;

fn lock(state: &Shared) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fake inspection program backed by a plain hash map.
#[derive(Debug, Default)]
pub struct MockProgram {
    state: Shared,
}

impl MockProgram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for inspecting calls made on this program.
    pub fn probe(&self) -> MockProbe {
        MockProbe {
            state: self.state.clone(),
        }
    }

    /// Seed a steady counter value for `key`.
    pub fn with_count(self, key: TargetKey, count: u64) -> Self {
        lock(&self.state).counts.insert(key.value(), count);
        self
    }

    /// Queue readings returned by successive lookups, ahead of the seeded
    /// counters.
    pub fn with_readings<I>(self, readings: I) -> Self
    where
        I: IntoIterator<Item = CounterReading>,
    {
        lock(&self.state).script.extend(readings.into_iter().map(Ok));
        self
    }

    /// Queue a lookup that fails with `reason`.
    pub fn with_lookup_failure(self, reason: &str) -> Self {
        lock(&self.state).script.push_back(Err(reason.to_string()));
        self
    }

    pub fn fail_attach(self, reason: &str) -> Self {
        lock(&self.state).attach_error = Some(reason.to_string());
        self
    }

    pub fn fail_detach(self, reason: &str) -> Self {
        lock(&self.state).detach_error = Some(reason.to_string());
        self
    }
}

impl CounterTable for MockProgram {
    fn lookup(&self, key: TargetKey) -> Result<CounterReading> {
        let mut state = lock(&self.state);
        state.lookups += 1;
        if let Some(next) = state.script.pop_front() {
            return next.map_err(AgentError::LookupFailed);
        }
        Ok(match state.counts.get(&key.value()) {
            Some(&n) => CounterReading::Observed(n),
            None => CounterReading::NotYetObserved,
        })
    }
}

impl InspectionProgram for MockProgram {
    type Link = usize;

    fn attach(&mut self, interface: &InterfaceHandle) -> Result<usize> {
        let mut state = lock(&self.state);
        state.attach_calls += 1;
        let failed = |reason: String| AgentError::AttachFailed {
            interface: interface.name().to_string(),
            reason,
        };
        if let Some(reason) = state.attach_error.clone() {
            return Err(failed(reason));
        }
        if state.attached_to.is_some() {
            return Err(failed("program already attached".into()));
        }
        state.attached_to = Some(interface.clone());
        Ok(state.attach_calls)
    }

    fn detach(&mut self, _link: usize) -> Result<()> {
        let mut state = lock(&self.state);
        state.detach_calls += 1;
        state.attached_to = None;
        match state.detach_error.clone() {
            Some(reason) => Err(AgentError::DetachFailed(reason)),
            None => Ok(()),
        }
    }
}

impl Drop for MockProgram {
    fn drop(&mut self) {
        lock(&self.state).closed = true;
    }
}

/// Read-only view of a [`MockProgram`]'s call history.
#[derive(Debug, Clone)]
pub struct MockProbe {
    state: Shared,
}

impl MockProbe {
    pub fn attach_calls(&self) -> usize {
        lock(&self.state).attach_calls
    }

    pub fn detach_calls(&self) -> usize {
        lock(&self.state).detach_calls
    }

    pub fn lookups(&self) -> usize {
        lock(&self.state).lookups
    }

    pub fn attached_to(&self) -> Option<InterfaceHandle> {
        lock(&self.state).attached_to.clone()
    }

    /// Whether the program has been dropped.
    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }
}

/// Hands out a single prepared [`MockProgram`], or a load error.
#[derive(Debug)]
pub struct MockLoader {
    program: Mutex<Option<MockProgram>>,
    error: Option<String>,
}

impl MockLoader {
    pub fn new(program: MockProgram) -> Self {
        Self {
            program: Mutex::new(Some(program)),
            error: None,
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            program: Mutex::new(None),
            error: Some(reason.to_string()),
        }
    }
}

impl ProgramLoader for MockLoader {
    type Program = MockProgram;

    fn load(&self) -> Result<MockProgram> {
        if let Some(reason) = &self.error {
            return Err(AgentError::Load(reason.clone()));
        }
        self.program
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| AgentError::Load("program already loaded".into()))
    }
}

/// Resolver over a fixed name -> index table.
#[derive(Debug, Default, Clone)]
pub struct MockResolver {
    interfaces: HashMap<String, u32>,
}

impl MockResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interface(mut self, name: &str, index: u32) -> Self {
        self.interfaces.insert(name.to_string(), index);
        self
    }
}

impl InterfaceResolver for MockResolver {
    fn resolve(&self, name: &str) -> Result<InterfaceHandle> {
        self.interfaces
            .get(name)
            .map(|&index| InterfaceHandle::new(name, index))
            .ok_or_else(|| AgentError::InterfaceNotFound(name.to_string()))
    }
}

/// Sink that keeps every report for later assertions. Clones share storage.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    reports: Arc<Mutex<Vec<Report>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<Report> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Reports rendered the way they are logged, e.g. `"5"` or
    /// `"not observed"`.
    pub fn lines(&self) -> Vec<String> {
        self.reports().iter().map(ToString::to_string).collect()
    }
}

impl ReportSink for RecordingSink {
    fn report(&mut self, report: &Report) {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(report.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_program_scripted_then_seeded() {
        let key = TargetKey::encode("1.2.3.4").unwrap();
        let program = MockProgram::new()
            .with_count(key, 9)
            .with_readings([CounterReading::NotYetObserved])
            .with_lookup_failure("map gone");

        assert_eq!(program.lookup(key).unwrap(), CounterReading::NotYetObserved);
        assert!(matches!(program.lookup(key), Err(AgentError::LookupFailed(_))));
        assert_eq!(program.lookup(key).unwrap(), CounterReading::Observed(9));
        assert_eq!(program.probe().lookups(), 3);
    }

    #[test]
    fn test_mock_program_refuses_second_attach() {
        let mut program = MockProgram::new();
        let eth0 = InterfaceHandle::new("eth0", 2);
        program.attach(&eth0).unwrap();
        assert!(matches!(
            program.attach(&eth0),
            Err(AgentError::AttachFailed { .. })
        ));
    }

    #[test]
    fn test_mock_loader_hands_out_once() {
        let loader = MockLoader::new(MockProgram::new());
        assert!(loader.load().is_ok());
        assert!(matches!(loader.load(), Err(AgentError::Load(_))));
    }

    #[test]
    fn test_mock_probe_sees_close() {
        let program = MockProgram::new();
        let probe = program.probe();
        assert!(!probe.is_closed());
        drop(program);
        assert!(probe.is_closed());
    }
}
