//! The kernel-side inspection program, seen from userspace.
//!
//! The agent only needs four things from the compiled XDP object: load it,
//! attach it to an interface, detach it, and read its counter map. Those are
//! the [`ProgramLoader`] and [`InspectionProgram`] traits. [`AyaLoader`] and
//! [`AyaProgram`] implement them with aya; the poll loop and attachment
//! manager only see the traits.

use std::path::{Path, PathBuf};

use aya::maps::{HashMap as AyaHashMap, MapError};
use aya::programs::xdp::XdpLinkId;
use aya::programs::{Xdp, XdpFlags};
use aya::Ebpf;
use clap::ValueEnum;
use serde::Deserialize;
use tracing::debug;

use pktwatch_common::{AddrKey, PacketCount, COUNTER_MAP, PROGRAM_NAME};

use crate::error::{AgentError, Result};
use crate::iface::InterfaceHandle;
use crate::key::TargetKey;
use crate::table::{CounterReading, CounterTable};

/// Loads the inspection program. Dropping the returned program closes it.
pub trait ProgramLoader {
    type Program: InspectionProgram;

    fn load(&self) -> Result<Self::Program>;
}

/// A loaded inspection program that can be bound to one interface.
pub trait InspectionProgram: CounterTable {
    /// Identifies a live attachment so it can be detached later.
    type Link;

    /// Bind to the ingress hook of `interface`. Must fail rather than
    /// replace a program that is already attached there.
    fn attach(&mut self, interface: &InterfaceHandle) -> Result<Self::Link>;

    fn detach(&mut self, link: Self::Link) -> Result<()>;
}

/// Which XDP hook flavour to request from the kernel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum XdpMode {
    /// Let the kernel pick (native if the driver supports it).
    #[default]
    Default,
    /// Generic XDP in the network stack.
    Skb,
    /// Native XDP in the driver.
    Driver,
    /// Offloaded to the NIC.
    Hw,
}

impl XdpMode {
    /// Mode bits only. aya attaches through a BPF link on newer kernels,
    /// which rejects any other flag with EINVAL and already refuses to
    /// replace an existing program (EBUSY).
    fn flags(self) -> XdpFlags {
        match self {
            XdpMode::Default => XdpFlags::default(),
            XdpMode::Skb => XdpFlags::SKB_MODE,
            XdpMode::Driver => XdpFlags::DRV_MODE,
            XdpMode::Hw => XdpFlags::HW_MODE,
        }
    }
}

/// Loads the compiled XDP object from disk.
#[derive(Debug, Clone)]
pub struct AyaLoader {
    path: PathBuf,
    mode: XdpMode,
}

impl AyaLoader {
    pub fn new(path: impl Into<PathBuf>, mode: XdpMode) -> Self {
        Self {
            path: path.into(),
            mode,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProgramLoader for AyaLoader {
    type Program = AyaProgram;

    fn load(&self) -> Result<AyaProgram> {
        let mut bpf = Ebpf::load_file(&self.path)
            .map_err(|e| AgentError::Load(format!("{}: {e}", self.path.display())))?;

        let program: &mut Xdp = bpf
            .program_mut(PROGRAM_NAME)
            .ok_or_else(|| AgentError::Load(format!("program {PROGRAM_NAME} not found")))?
            .try_into()
            .map_err(|e| AgentError::Load(format!("program {PROGRAM_NAME} is not XDP: {e}")))?;
        program
            .load()
            .map_err(|e| AgentError::Load(format!("kernel rejected {PROGRAM_NAME}: {e}")))?;

        if bpf.map(COUNTER_MAP).is_none() {
            return Err(AgentError::Load(format!("map {COUNTER_MAP} not found")));
        }

        debug!("loaded {} from {}", PROGRAM_NAME, self.path.display());
        Ok(AyaProgram {
            bpf,
            mode: self.mode,
        })
    }
}

/// The loaded XDP object. Dropping it closes every program and map fd.
pub struct AyaProgram {
    bpf: Ebpf,
    mode: XdpMode,
}

impl AyaProgram {
    fn xdp_mut(&mut self) -> std::result::Result<&mut Xdp, String> {
        self.bpf
            .program_mut(PROGRAM_NAME)
            .ok_or_else(|| format!("program {PROGRAM_NAME} not found"))?
            .try_into()
            .map_err(|e| format!("{e}"))
    }
}

impl InspectionProgram for AyaProgram {
    type Link = XdpLinkId;

    fn attach(&mut self, interface: &InterfaceHandle) -> Result<XdpLinkId> {
        let flags = self.mode.flags();
        let attach_failed = |reason: String| AgentError::AttachFailed {
            interface: interface.name().to_string(),
            reason,
        };
        self.xdp_mut()
            .map_err(attach_failed)?
            .attach_to_if_index(interface.index(), flags)
            .map_err(|e| attach_failed(e.to_string()))
    }

    fn detach(&mut self, link: XdpLinkId) -> Result<()> {
        self.xdp_mut()
            .map_err(AgentError::DetachFailed)?
            .detach(link)
            .map_err(|e| AgentError::DetachFailed(e.to_string()))
    }
}

impl CounterTable for AyaProgram {
    fn lookup(&self, key: TargetKey) -> Result<CounterReading> {
        let map = self
            .bpf
            .map(COUNTER_MAP)
            .ok_or_else(|| AgentError::LookupFailed(format!("map {COUNTER_MAP} not found")))?;
        let counts = AyaHashMap::<_, AddrKey, PacketCount>::try_from(map)
            .map_err(|e| AgentError::LookupFailed(format!("map {COUNTER_MAP}: {e}")))?;

        match counts.get(&key.value(), 0) {
            Ok(count) => Ok(CounterReading::Observed(count)),
            Err(MapError::KeyNotFound) => Ok(CounterReading::NotYetObserved),
            Err(e) => Err(AgentError::LookupFailed(e.to_string())),
        }
    }
}
