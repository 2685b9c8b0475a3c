#![cfg_attr(not(test), no_std)]

//! Names and layout shared by the XDP program and the userspace agent.
//!
//! The counter map is a plain `HashMap<u32, u64>`. The key is the IPv4
//! source address exactly as it sits in the packet (network byte order)
//! reinterpreted as a native-endian `u32`, so on a little-endian host the
//! first octet ends up in the least-significant byte. Userspace has to build
//! its lookup keys the same way.

/// Name of the XDP program inside the compiled object.
pub const PROGRAM_NAME: &str = "pktwatch";

/// Name of the per-address packet counter map.
pub const COUNTER_MAP: &str = "PKT_COUNT";

/// Maximum number of distinct source addresses tracked by the kernel side.
///
/// Entries are never evicted. Once this many sources have been seen, a new
/// address gets no entry and reads as not observed until the program is
/// reloaded, even while packets from it keep arriving.
pub const MAX_TRACKED_ADDRS: u32 = 16 * 1024;

/// Counter map key: IPv4 source address, wire order read as native `u32`.
pub type AddrKey = u32;

/// Counter map value: packets seen from that address.
pub type PacketCount = u64;
