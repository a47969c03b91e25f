//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

// Neighborhood database mutations. Every function here leaves all
// cross-indexes (global address tree, per-interface link address tree,
// ownership lists) consistent before returning; partial updates never
// escape.

use nhdp_utils::addr::Addr;

use crate::collections::{
    InterfaceIndex, LinkAddrIndex, LinkIndex, NeighborAddrIndex, NeighborIndex,
    TwoHopIndex,
};
use crate::debug::Debug;
use crate::error::Error;
use crate::events::TimerEvent;
use crate::hysteresis::LinkHysteresis;
use crate::instance::{InstanceArenas, InstanceState, LinkListener};
use crate::link::{LinkAddr, LinkStatus};

// ===== neighbors =====

pub fn neighbor_add(
    state: &mut InstanceState,
    arenas: &mut InstanceArenas,
) -> NeighborIndex {
    let (nbr_idx, nbr) = state.neighbors.insert(&mut arenas.neighbors);
    Debug::NeighborCreate(nbr.id).log();
    nbr_idx
}

// Removes a neighbor together with everything it owns: links, link
// addresses, two-hop entries and neighbor addresses.
pub fn neighbor_remove(
    state: &mut InstanceState,
    arenas: &mut InstanceArenas,
    listeners: &mut [Box<dyn LinkListener>],
    nbr_idx: NeighborIndex,
) {
    // Remove owned links.
    let links = arenas.neighbors[nbr_idx].links.clone();
    for link_idx in links {
        link_remove(state, arenas, listeners, link_idx);
    }

    // Remove owned addresses.
    let naddrs: Vec<_> =
        arenas.neighbors[nbr_idx].addrs.values().copied().collect();
    for naddr_idx in naddrs {
        let naddr = &mut arenas.neighbor_addrs[naddr_idx];
        if let Some(handle) = naddr.lost_timer.take() {
            state.timers.cancel(handle);
        }
        Debug::NeighborAddrDelete(&naddr.addr).log();
        state
            .neighbor_addrs
            .delete(&mut arenas.neighbor_addrs, naddr_idx);
    }

    // Break the dualstack pairing.
    neighbor_disconnect_dualstack(arenas, nbr_idx);

    Debug::NeighborDelete(arenas.neighbors[nbr_idx].id).log();
    state.neighbors.delete(&mut arenas.neighbors, nbr_idx);
}

pub fn neighbor_addr_add(
    state: &mut InstanceState,
    arenas: &mut InstanceArenas,
    nbr_idx: NeighborIndex,
    addr: Addr,
) -> Result<NeighborAddrIndex, Error> {
    if let Some(naddr_idx) = state.neighbor_addrs.get_by_addr(&addr) {
        if arenas.neighbor_addrs[naddr_idx].neighbor == nbr_idx {
            return Ok(naddr_idx);
        }
        // The caller must resolve the identity conflict first.
        return Err(Error::AddressConflict(addr));
    }

    let (naddr_idx, naddr) =
        state
            .neighbor_addrs
            .insert(&mut arenas.neighbor_addrs, nbr_idx, addr);
    Debug::NeighborAddrCreate(&naddr.addr).log();
    arenas.neighbors[nbr_idx].addrs.insert(addr, naddr_idx);
    Ok(naddr_idx)
}

// Re-parents an address to another neighbor, preserving the global
// index entry.
pub fn neighbor_addr_move(
    arenas: &mut InstanceArenas,
    target_idx: NeighborIndex,
    naddr_idx: NeighborAddrIndex,
) {
    let naddr = &mut arenas.neighbor_addrs[naddr_idx];
    let old_idx = naddr.neighbor;
    let addr = naddr.addr;
    naddr.neighbor = target_idx;

    arenas.neighbors[old_idx].addrs.remove(&addr);
    arenas.neighbors[target_idx].addrs.insert(addr, naddr_idx);
}

pub fn neighbor_addr_remove(
    state: &mut InstanceState,
    arenas: &mut InstanceArenas,
    naddr_idx: NeighborAddrIndex,
) {
    let naddr = &mut arenas.neighbor_addrs[naddr_idx];
    let nbr_idx = naddr.neighbor;
    let addr = naddr.addr;
    if let Some(handle) = naddr.lost_timer.take() {
        state.timers.cancel(handle);
    }
    Debug::NeighborAddrDelete(&addr).log();

    arenas.neighbors[nbr_idx].addrs.remove(&addr);
    state
        .neighbor_addrs
        .delete(&mut arenas.neighbor_addrs, naddr_idx);
}

// Marks an address as lost; it stays advertised as LOST until the
// deadline, then is forgotten.
pub fn neighbor_addr_set_lost(
    state: &mut InstanceState,
    arenas: &mut InstanceArenas,
    naddr_idx: NeighborAddrIndex,
    deadline: u64,
) {
    let naddr = &mut arenas.neighbor_addrs[naddr_idx];
    naddr.lost = true;
    if let Some(handle) = naddr.lost_timer.take() {
        state.timers.cancel(handle);
    }
    naddr.lost_timer = Some(
        state
            .timers
            .schedule(deadline, TimerEvent::NeighborAddrLostElapsed(naddr.id)),
    );
    Debug::NeighborAddrLost(&naddr.addr, deadline).log();
}

pub fn neighbor_addr_not_lost(
    state: &mut InstanceState,
    arenas: &mut InstanceArenas,
    naddr_idx: NeighborAddrIndex,
) {
    let naddr = &mut arenas.neighbor_addrs[naddr_idx];
    naddr.lost = false;
    if let Some(handle) = naddr.lost_timer.take() {
        state.timers.cancel(handle);
    }
}

pub fn neighbor_set_originator(
    state: &mut InstanceState,
    arenas: &mut InstanceArenas,
    nbr_idx: NeighborIndex,
    originator: Option<Addr>,
) {
    state
        .neighbors
        .set_originator(&mut arenas.neighbors, nbr_idx, originator);
}

pub fn neighbor_connect_dualstack(
    arenas: &mut InstanceArenas,
    a_idx: NeighborIndex,
    b_idx: NeighborIndex,
) {
    if a_idx == b_idx {
        return;
    }
    neighbor_disconnect_dualstack(arenas, a_idx);
    neighbor_disconnect_dualstack(arenas, b_idx);
    arenas.neighbors[a_idx].dualstack_partner = Some(b_idx);
    arenas.neighbors[b_idx].dualstack_partner = Some(a_idx);
}

pub fn neighbor_disconnect_dualstack(
    arenas: &mut InstanceArenas,
    nbr_idx: NeighborIndex,
) {
    if let Some(partner_idx) = arenas.neighbors[nbr_idx].dualstack_partner.take()
        && let Some(partner) = arenas.neighbors.get_mut(partner_idx)
    {
        partner.dualstack_partner = None;
    }
}

// ===== links =====

pub fn link_add(
    state: &mut InstanceState,
    arenas: &mut InstanceArenas,
    iface_idx: InterfaceIndex,
    nbr_idx: NeighborIndex,
) -> LinkIndex {
    let (link_idx, link) =
        state.links.insert(&mut arenas.links, iface_idx, nbr_idx);
    Debug::LinkCreate(link.id).log();
    arenas.interfaces[iface_idx].links.push(link_idx);
    arenas.neighbors[nbr_idx].links.push(link_idx);
    link_idx
}

// Removes a link together with its addresses and two-hop entries. The
// owning neighbor is left alone; callers decide about garbage
// collection.
pub fn link_remove(
    state: &mut InstanceState,
    arenas: &mut InstanceArenas,
    listeners: &mut [Box<dyn LinkListener>],
    link_idx: LinkIndex,
) {
    for listener in listeners.iter_mut() {
        listener.link_removed(&arenas.links[link_idx]);
    }

    // Stop the validity timers.
    let link = &mut arenas.links[link_idx];
    for handle in [
        link.sym_timer.take(),
        link.heard_timer.take(),
        link.vtime_timer.take(),
    ]
    .into_iter()
    .flatten()
    {
        state.timers.cancel(handle);
    }

    // Remove owned two-hop entries.
    let two_hops: Vec<_> =
        arenas.links[link_idx].two_hops.values().copied().collect();
    for th_idx in two_hops {
        link_2hop_remove(state, arenas, th_idx);
    }

    // Remove owned link addresses.
    let iface_idx = arenas.links[link_idx].iface;
    let laddrs: Vec<_> = arenas.links[link_idx].addrs.values().copied().collect();
    for la_idx in laddrs {
        let addr = arenas.link_addrs[la_idx].addr;
        arenas.interfaces[iface_idx].link_addr_tree.remove(&addr);
        arenas.link_addrs.remove(la_idx);
    }

    // Unlink from the interface and the neighbor.
    let nbr_idx = arenas.links[link_idx].neighbor;
    let was_symmetric = arenas.links[link_idx].status == LinkStatus::Symmetric;
    arenas.interfaces[iface_idx]
        .links
        .retain(|idx| *idx != link_idx);
    if let Some(nbr) = arenas.neighbors.get_mut(nbr_idx) {
        nbr.links.retain(|idx| *idx != link_idx);
        if was_symmetric {
            nbr.symmetric_links -= 1;
        }
    }

    // Break the dualstack pairing.
    link_disconnect_dualstack(arenas, link_idx);

    Debug::LinkDelete(arenas.links[link_idx].id).log();
    state.links.delete(&mut arenas.links, link_idx);

    arenas.interfaces[iface_idx].update_status(&arenas.links);
}

// Re-parents a link to another neighbor, keeping the symmetric link
// counters of both sides correct.
pub fn link_set_neighbor(
    arenas: &mut InstanceArenas,
    link_idx: LinkIndex,
    nbr_idx: NeighborIndex,
) {
    let link = &mut arenas.links[link_idx];
    let old_idx = link.neighbor;
    if old_idx == nbr_idx {
        return;
    }
    link.neighbor = nbr_idx;
    let was_symmetric = link.status == LinkStatus::Symmetric;

    let old_nbr = &mut arenas.neighbors[old_idx];
    old_nbr.links.retain(|idx| *idx != link_idx);
    if was_symmetric {
        old_nbr.symmetric_links -= 1;
    }
    let new_nbr = &mut arenas.neighbors[nbr_idx];
    new_nbr.links.push(link_idx);
    if was_symmetric {
        new_nbr.symmetric_links += 1;
    }
}

pub fn link_get_by_originator(
    arenas: &InstanceArenas,
    iface_idx: InterfaceIndex,
    originator: &Addr,
) -> Option<LinkIndex> {
    arenas.interfaces[iface_idx]
        .links
        .iter()
        .copied()
        .find(|link_idx| {
            let nbr_idx = arenas.links[*link_idx].neighbor;
            arenas.neighbors[nbr_idx].originator.as_ref() == Some(originator)
        })
}

pub fn link_connect_dualstack(
    arenas: &mut InstanceArenas,
    a_idx: LinkIndex,
    b_idx: LinkIndex,
) {
    if a_idx == b_idx {
        return;
    }
    link_disconnect_dualstack(arenas, a_idx);
    link_disconnect_dualstack(arenas, b_idx);
    arenas.links[a_idx].dualstack_partner = Some(b_idx);
    arenas.links[b_idx].dualstack_partner = Some(a_idx);
}

pub fn link_disconnect_dualstack(
    arenas: &mut InstanceArenas,
    link_idx: LinkIndex,
) {
    if let Some(partner_idx) = arenas.links[link_idx].dualstack_partner.take()
        && let Some(partner) = arenas.links.get_mut(partner_idx)
    {
        partner.dualstack_partner = None;
    }
}

// ===== link timers =====

pub fn link_set_sym_time(
    state: &mut InstanceState,
    arenas: &mut InstanceArenas,
    link_idx: LinkIndex,
    deadline: u64,
) {
    let link = &mut arenas.links[link_idx];
    if let Some(handle) = link.sym_timer.take() {
        state.timers.cancel(handle);
    }
    link.sym_timer = Some(
        state
            .timers
            .schedule(deadline, TimerEvent::LinkSymElapsed(link.id)),
    );
}

pub fn link_stop_sym_time(
    state: &mut InstanceState,
    arenas: &mut InstanceArenas,
    link_idx: LinkIndex,
) {
    let link = &mut arenas.links[link_idx];
    if let Some(handle) = link.sym_timer.take() {
        state.timers.cancel(handle);
    }
}

pub fn link_set_heard_time(
    state: &mut InstanceState,
    arenas: &mut InstanceArenas,
    link_idx: LinkIndex,
    deadline: u64,
) {
    let link = &mut arenas.links[link_idx];
    if let Some(handle) = link.heard_timer.take() {
        state.timers.cancel(handle);
    }
    link.heard_timer = Some(
        state
            .timers
            .schedule(deadline, TimerEvent::LinkHeardElapsed(link.id)),
    );
}

pub fn link_set_vtime(
    state: &mut InstanceState,
    arenas: &mut InstanceArenas,
    link_idx: LinkIndex,
    deadline: u64,
) {
    let link = &mut arenas.links[link_idx];
    if let Some(handle) = link.vtime_timer.take() {
        state.timers.cancel(handle);
    }
    link.vtime_timer = Some(
        state
            .timers
            .schedule(deadline, TimerEvent::LinkExpired(link.id)),
    );
}

// Recomputes the link status, maintains the neighbor's symmetric link
// count and the interface flooding flag, and notifies the listeners on
// a transition.
pub fn link_update_status(
    state: &mut InstanceState,
    arenas: &mut InstanceArenas,
    hysteresis: &dyn LinkHysteresis,
    listeners: &mut [Box<dyn LinkListener>],
    link_idx: LinkIndex,
    now: u64,
) {
    let link = &arenas.links[link_idx];
    let old = link.status;
    let new = link.calculate_status(now, &state.timers, hysteresis);
    if new == old {
        return;
    }

    Debug::LinkStatusChange(link.id, old, new).log();
    arenas.links[link_idx].status = new;

    let nbr_idx = arenas.links[link_idx].neighbor;
    let nbr = &mut arenas.neighbors[nbr_idx];
    if new == LinkStatus::Symmetric {
        nbr.symmetric_links += 1;
    } else if old == LinkStatus::Symmetric {
        nbr.symmetric_links -= 1;
    }

    let iface_idx = arenas.links[link_idx].iface;
    arenas.interfaces[iface_idx].update_status(&arenas.links);

    let link = &arenas.links[link_idx];
    for listener in listeners.iter_mut() {
        listener.link_status_changed(link, old);
    }
}

// ===== link addresses =====

pub fn link_addr_add(
    arenas: &mut InstanceArenas,
    link_idx: LinkIndex,
    addr: Addr,
) -> LinkAddrIndex {
    let la_idx = arenas.link_addrs.insert(LinkAddr::new(addr, link_idx));
    arenas.links[link_idx].addrs.insert(addr, la_idx);
    let iface_idx = arenas.links[link_idx].iface;
    arenas.interfaces[iface_idx].link_addr_tree.insert(addr, la_idx);
    la_idx
}

// Re-parents a link address to another link on the same interface.
pub fn link_addr_move(
    arenas: &mut InstanceArenas,
    target_idx: LinkIndex,
    la_idx: LinkAddrIndex,
) {
    let laddr = &mut arenas.link_addrs[la_idx];
    let old_idx = laddr.link;
    let addr = laddr.addr;
    laddr.link = target_idx;

    arenas.links[old_idx].addrs.remove(&addr);
    arenas.links[target_idx].addrs.insert(addr, la_idx);
}

pub fn link_addr_remove(
    arenas: &mut InstanceArenas,
    la_idx: LinkAddrIndex,
) {
    let laddr = &arenas.link_addrs[la_idx];
    let link_idx = laddr.link;
    let addr = laddr.addr;

    arenas.links[link_idx].addrs.remove(&addr);
    let iface_idx = arenas.links[link_idx].iface;
    arenas.interfaces[iface_idx].link_addr_tree.remove(&addr);
    arenas.link_addrs.remove(la_idx);
}

// ===== two-hop neighborhood =====

pub fn link_2hop_get(
    arenas: &InstanceArenas,
    link_idx: LinkIndex,
    addr: &Addr,
) -> Option<TwoHopIndex> {
    arenas.links[link_idx].two_hops.get(addr).copied()
}

pub fn link_2hop_add(
    state: &mut InstanceState,
    arenas: &mut InstanceArenas,
    link_idx: LinkIndex,
    addr: Addr,
    deadline: u64,
) -> TwoHopIndex {
    let (th_idx, _) = state.two_hops.insert(&mut arenas.two_hops, link_idx, addr);
    let th_id = arenas.two_hops[th_idx].id;
    arenas.two_hops[th_idx].vtime_timer = Some(
        state
            .timers
            .schedule(deadline, TimerEvent::TwoHopExpired(th_id)),
    );
    Debug::TwoHopCreate(&addr).log();
    arenas.links[link_idx].two_hops.insert(addr, th_idx);
    th_idx
}

pub fn link_2hop_set_vtime(
    state: &mut InstanceState,
    arenas: &mut InstanceArenas,
    th_idx: TwoHopIndex,
    deadline: u64,
) {
    let two_hop = &mut arenas.two_hops[th_idx];
    if let Some(handle) = two_hop.vtime_timer.take() {
        state.timers.cancel(handle);
    }
    two_hop.vtime_timer = Some(
        state
            .timers
            .schedule(deadline, TimerEvent::TwoHopExpired(two_hop.id)),
    );
}

pub fn link_2hop_remove(
    state: &mut InstanceState,
    arenas: &mut InstanceArenas,
    th_idx: TwoHopIndex,
) {
    let two_hop = &mut arenas.two_hops[th_idx];
    let link_idx = two_hop.link;
    let addr = two_hop.addr;
    if let Some(handle) = two_hop.vtime_timer.take() {
        state.timers.cancel(handle);
    }
    Debug::TwoHopDelete(&addr).log();

    if let Some(link) = arenas.links.get_mut(link_idx) {
        link.two_hops.remove(&addr);
    }
    state.two_hops.delete(&mut arenas.two_hops, th_idx);
}
