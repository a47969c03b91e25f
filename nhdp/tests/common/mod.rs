//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

#![allow(dead_code)]

use std::net::SocketAddr;

use bytes::Bytes;
use nhdp::instance::Instance;
use nhdp::link::LinkStatus;
use nhdp::packet::consts::{
    ADDRTLV_LINK_METRIC, ADDRTLV_LINK_STATUS, ADDRTLV_LOCAL_IF, ADDRTLV_MPR,
    ADDRTLV_OTHER_NEIGHB, MSGTLV_MPR_WILLING, MSGTLV_VALIDITY_TIME,
};
use nhdp::packet::tlv::timetlv_encode;
use nhdp::packet::{HelloMsg, RxContext, Tlv, TlvBlock};
use nhdp_utils::addr::Addr;
use nhdp_utils::time::ManualClock;

pub const IF0: &str = "if0";
pub const IF0_ADDR: &str = "192.168.0.1";

//
// Instance construction.
//

pub fn test_instance(now: u64) -> (Instance, ManualClock) {
    let clock = ManualClock::new(now);
    let mut instance = Instance::new("test", Box::new(clock.clone()));
    instance.interface_add(IF0);
    instance
        .interface_addr_add(IF0, addr(IF0_ADDR))
        .expect("interface registered above");
    (instance, clock)
}

//
// Message construction.
//

pub fn addr(text: &str) -> Addr {
    Addr::from(text.parse::<std::net::IpAddr>().unwrap())
}

pub fn src(text: &str) -> SocketAddr {
    if text.contains(':') {
        format!("[{text}]:269").parse().unwrap()
    } else {
        format!("{text}:269").parse().unwrap()
    }
}

pub fn ctx(source: &str) -> RxContext {
    RxContext::new(IF0.to_owned(), src(source))
}

pub fn vtime_tlv(ms: u64) -> Tlv {
    Tlv::new(
        MSGTLV_VALIDITY_TIME,
        0,
        Bytes::copy_from_slice(&[timetlv_encode(ms)]),
    )
}

pub fn willingness_tlv(value: u8) -> Tlv {
    Tlv::new(MSGTLV_MPR_WILLING, 0, Bytes::copy_from_slice(&[value]))
}

pub fn local_if_tlv(value: u8) -> Tlv {
    Tlv::new(ADDRTLV_LOCAL_IF, 0, Bytes::copy_from_slice(&[value]))
}

pub fn this_if() -> Tlv {
    local_if_tlv(0)
}

pub fn other_if() -> Tlv {
    local_if_tlv(1)
}

pub fn link_status_tlv(value: u8) -> Tlv {
    Tlv::new(ADDRTLV_LINK_STATUS, 0, Bytes::copy_from_slice(&[value]))
}

pub fn status_lost() -> Tlv {
    link_status_tlv(0)
}

pub fn status_symmetric() -> Tlv {
    link_status_tlv(1)
}

pub fn status_heard() -> Tlv {
    link_status_tlv(2)
}

pub fn other_neigh_symmetric() -> Tlv {
    Tlv::new(ADDRTLV_OTHER_NEIGHB, 0, Bytes::copy_from_slice(&[1]))
}

pub fn mpr_tlv(value: u8) -> Tlv {
    Tlv::new(ADDRTLV_MPR, 0, Bytes::copy_from_slice(&[value]))
}

pub fn link_metric_tlv(ext: u8, value: [u8; 2]) -> Tlv {
    Tlv::new(ADDRTLV_LINK_METRIC, ext, Bytes::copy_from_slice(&value))
}

// A v4 HELLO carrying the given validity time and tagged addresses.
pub fn hello(vtime: u64, addrs: Vec<(Addr, Vec<Tlv>)>) -> HelloMsg {
    hello_with_tlvs(vec![vtime_tlv(vtime)], addrs)
}

pub fn hello_with_tlvs(
    msg_tlvs: Vec<Tlv>,
    addrs: Vec<(Addr, Vec<Tlv>)>,
) -> HelloMsg {
    HelloMsg::new(
        4,
        None,
        TlvBlock::from(msg_tlvs),
        addrs
            .into_iter()
            .map(|(addr, tlvs)| (addr, TlvBlock::from(tlvs)))
            .collect(),
    )
}

//
// State inspection.
//

// Returns the only link on the given interface.
pub fn single_link(instance: &Instance, ifname: &str) -> nhdp::collections::LinkIndex {
    let iface = instance.arenas.interfaces.get_by_name(ifname).unwrap();
    assert_eq!(iface.links.len(), 1);
    iface.links[0]
}

pub fn link_status_on(instance: &Instance, ifname: &str) -> LinkStatus {
    let link_idx = single_link(instance, ifname);
    instance.arenas.links[link_idx].status
}

// Renders the database into a canonical, comparable form. Timer
// deadlines are included, so two snapshots only match when the timers
// agree as well.
pub fn snapshot(instance: &Instance) -> Vec<String> {
    let arenas = &instance.arenas;
    let timers = &instance.state.timers;
    let mut lines = Vec::new();

    for (_, nbr) in arenas.neighbors.iter() {
        let addrs: Vec<_> = nbr
            .addrs
            .iter()
            .map(|(addr, naddr_idx)| {
                let naddr = &arenas.neighbor_addrs[*naddr_idx];
                let deadline = naddr
                    .lost_timer
                    .and_then(|handle| timers.due(handle));
                format!("{addr}(lost={} until={:?})", naddr.lost, deadline)
            })
            .collect();
        lines.push(format!(
            "neighbor id={} originator={:?} sym_links={} flooding_will={} addrs={:?}",
            nbr.id, nbr.originator, nbr.symmetric_links,
            nbr.flooding_willingness, addrs,
        ));
    }

    for (_, link) in arenas.links.iter() {
        let deadline = |handle: Option<nhdp_utils::timer::TimerHandle>| {
            handle.and_then(|handle| timers.due(handle))
        };
        let laddrs: Vec<_> = link.addrs.keys().map(Addr::to_string).collect();
        let two_hops: Vec<_> = link
            .two_hops
            .iter()
            .map(|(addr, th_idx)| {
                let two_hop = &arenas.two_hops[*th_idx];
                format!(
                    "{addr}(same_if={} until={:?})",
                    two_hop.same_interface,
                    deadline(two_hop.vtime_timer),
                )
            })
            .collect();
        lines.push(format!(
            "link id={} iface={} status={} sym={:?} heard={:?} vtime={:?} \
             laddrs={laddrs:?} two_hops={two_hops:?}",
            link.id,
            arenas.interfaces[link.iface].name,
            link.status,
            deadline(link.sym_timer),
            deadline(link.heard_timer),
            deadline(link.vtime_timer),
        ));
    }

    lines.sort();
    lines
}

// Checks the cross-index invariants that must hold between processing
// sessions.
pub fn check_invariants(instance: &Instance) {
    let arenas = &instance.arenas;
    let state = &instance.state;
    let timers = &state.timers;

    // Global address index and per-neighbor address sets agree.
    for (naddr_idx, naddr) in arenas.neighbor_addrs.iter() {
        assert_eq!(state.neighbor_addrs.get_by_addr(&naddr.addr), Some(naddr_idx));
        let nbr = &arenas.neighbors[naddr.neighbor];
        assert_eq!(nbr.addrs.get(&naddr.addr), Some(&naddr_idx));
    }
    for (nbr_idx, nbr) in arenas.neighbors.iter() {
        for (addr, naddr_idx) in &nbr.addrs {
            let naddr = &arenas.neighbor_addrs[*naddr_idx];
            assert_eq!(naddr.addr, *addr);
            assert_eq!(naddr.neighbor, nbr_idx);
        }
    }

    for (link_idx, link) in arenas.links.iter() {
        // Address inclusion: every link address is a neighbor address
        // of the owning neighbor.
        let nbr = &arenas.neighbors[link.neighbor];
        for (addr, la_idx) in &link.addrs {
            assert_eq!(arenas.link_addrs[*la_idx].link, link_idx);
            assert!(
                nbr.addrs.contains_key(addr),
                "link address {addr} missing from neighbor address set",
            );
        }
        assert!(nbr.links.contains(&link_idx));

        // Timer ordering while all three run.
        let sym = link.sym_timer.and_then(|handle| timers.due(handle));
        let heard = link.heard_timer.and_then(|handle| timers.due(handle));
        let vtime = link.vtime_timer.and_then(|handle| timers.due(handle));
        if let (Some(sym), Some(heard), Some(vtime)) = (sym, heard, vtime) {
            assert!(sym <= heard && heard <= vtime);
        }
    }

    // Lost addresses have no live link address anywhere.
    for (_, naddr) in arenas.neighbor_addrs.iter() {
        if naddr.lost {
            for (_, laddr) in arenas.link_addrs.iter() {
                assert_ne!(laddr.addr, naddr.addr);
            }
        }
    }

    // Symmetric link counters match reality.
    for (_, nbr) in arenas.neighbors.iter() {
        let symmetric = nbr
            .links
            .iter()
            .filter(|link_idx| {
                arenas.links[**link_idx].status == LinkStatus::Symmetric
            })
            .count() as u32;
        assert_eq!(nbr.symmetric_links, symmetric);
    }
}
