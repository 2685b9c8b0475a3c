//! pktwatch: attach an XDP counter to an interface and report how many
//! packets one IPv4 address has sent.

pub mod agent;
pub mod attach;
pub mod config;
pub mod error;
pub mod exit;
pub mod iface;
pub mod key;
pub mod mock;
pub mod poll;
pub mod privilege;
pub mod program;
pub mod shutdown;
pub mod table;

pub use agent::Agent;
pub use error::{AgentError, Result};
pub use key::TargetKey;
