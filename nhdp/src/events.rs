//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use serde::{Deserialize, Serialize};

use crate::collections::{LinkId, NeighborAddrId, TwoHopId};
use crate::db;
use crate::domain;
use crate::error::Error;
use crate::instance::Instance;

// Timer expiries drive all state transitions that are not caused by a
// received HELLO.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum TimerEvent {
    // Symmetric window elapsed; the link falls back to heard.
    LinkSymElapsed(LinkId),
    // Heard window elapsed; the link falls back to lost.
    LinkHeardElapsed(LinkId),
    // Validity elapsed; the link is destroyed.
    LinkExpired(LinkId),
    // A lost neighbor address is forgotten.
    NeighborAddrLostElapsed(NeighborAddrId),
    // A two-hop entry expired.
    TwoHopExpired(TwoHopId),
}

// ===== timer expiry =====

pub(crate) fn process_timer_event(
    instance: &mut Instance,
    event: TimerEvent,
) -> Result<(), Error> {
    let now = instance.clock.now_ms();
    let Instance {
        state,
        arenas,
        domains,
        hysteresis,
        listeners,
        ..
    } = instance;

    match event {
        TimerEvent::LinkSymElapsed(link_id)
        | TimerEvent::LinkHeardElapsed(link_id) => {
            let (link_idx, link) =
                state.links.get_mut_by_id(&mut arenas.links, link_id)?;
            match event {
                TimerEvent::LinkSymElapsed(_) => link.sym_timer = None,
                _ => link.heard_timer = None,
            }
            let nbr_idx = link.neighbor;
            db::link_update_status(
                state,
                arenas,
                hysteresis.as_ref(),
                listeners,
                link_idx,
                now,
            );
            domain::neighbor_changed(
                domains,
                &mut arenas.neighbors[nbr_idx],
                &arenas.links,
            );
        }
        TimerEvent::LinkExpired(link_id) => {
            let (link_idx, link) =
                state.links.get_mut_by_id(&mut arenas.links, link_id)?;
            link.vtime_timer = None;
            let nbr_idx = link.neighbor;
            db::link_remove(state, arenas, listeners, link_idx);

            // A neighbor without links no longer exists for us.
            if arenas.neighbors[nbr_idx].links.is_empty() {
                db::neighbor_remove(state, arenas, listeners, nbr_idx);
            }
        }
        TimerEvent::NeighborAddrLostElapsed(naddr_id) => {
            let (naddr_idx, naddr) = state
                .neighbor_addrs
                .get_mut_by_id(&mut arenas.neighbor_addrs, naddr_id)?;
            naddr.lost_timer = None;
            let nbr_idx = naddr.neighbor;
            db::neighbor_addr_remove(state, arenas, naddr_idx);

            let nbr = &arenas.neighbors[nbr_idx];
            if nbr.links.is_empty() && nbr.addrs.is_empty() {
                db::neighbor_remove(state, arenas, listeners, nbr_idx);
            }
        }
        TimerEvent::TwoHopExpired(th_id) => {
            let (th_idx, two_hop) = state
                .two_hops
                .get_mut_by_id(&mut arenas.two_hops, th_id)?;
            two_hop.vtime_timer = None;
            db::link_2hop_remove(state, arenas, th_idx);
        }
    }

    Ok(())
}
