#![no_std]
#![no_main]

use aya_ebpf::{
    bindings::{xdp_action, BPF_NOEXIST},
    macros::{map, xdp},
    maps::HashMap,
    programs::XdpContext,
};
use core::{
    ptr,
    sync::atomic::{AtomicU64, Ordering},
};
use network_types::{
    eth::{EthHdr, EtherType},
    ip::Ipv4Hdr,
};
use pktwatch_common::{AddrKey, PacketCount, MAX_TRACKED_ADDRS};

#[no_mangle]
#[link_section = "license"]
pub static _license: [u8; 4] = *b"GPL\0";

#[map]
static PKT_COUNT: HashMap<AddrKey, PacketCount> =
    HashMap::with_max_entries(MAX_TRACKED_ADDRS, 0);

/// XDP entry point: counts every IPv4 packet by source address.
///
/// The program never drops anything. All non-IPv4 or truncated frames are
/// passed through untouched.
#[xdp]
pub fn pktwatch(ctx: XdpContext) -> u32 {
    let data = ctx.data();
    let data_end = ctx.data_end();

    // -- Ethernet ----------------------------------------------------------
    let eth_end = data + EthHdr::LEN;
    if eth_end > data_end {
        return xdp_action::XDP_PASS;
    }
    let eth_hdr = data as *const EthHdr;
    let ether_type = unsafe { ptr::read_unaligned(ptr::addr_of!((*eth_hdr).ether_type)) };
    if ether_type != EtherType::Ipv4 {
        return xdp_action::XDP_PASS;
    }

    // -- IPv4 --------------------------------------------------------------
    if eth_end + Ipv4Hdr::LEN > data_end {
        return xdp_action::XDP_PASS;
    }
    let ip_hdr = eth_end as *const Ipv4Hdr;
    // Kept in wire order: userspace builds its keys to match.
    let key: AddrKey = unsafe { ptr::read_unaligned(ptr::addr_of!((*ip_hdr).src_addr)) };

    // -- Count -------------------------------------------------------------
    if let Some(count) = PKT_COUNT.get_ptr_mut(&key) {
        unsafe { AtomicU64::from_ptr(count) }.fetch_add(1, Ordering::Relaxed);
    } else if PKT_COUNT.insert(&key, &1u64, BPF_NOEXIST as u64).is_err() {
        // Either another CPU created the entry first, or the map is full
        // (MAX_TRACKED_ADDRS) and this source is not counted.
        if let Some(count) = PKT_COUNT.get_ptr_mut(&key) {
            unsafe { AtomicU64::from_ptr(count) }.fetch_add(1, Ordering::Relaxed);
        }
    }

    xdp_action::XDP_PASS
}

#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    unsafe { core::hint::unreachable_unchecked() }
}
