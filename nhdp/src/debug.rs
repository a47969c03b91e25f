//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use nhdp_utils::addr::Addr;
use tracing::{debug, debug_span};

use crate::collections::{LinkId, NeighborId};
use crate::link::LinkStatus;
use crate::packet::{HelloMsg, RxContext};

// NHDP debug messages.
#[derive(Debug)]
pub enum Debug<'a> {
    // Instances
    InstanceCreate,
    // Interfaces
    InterfaceCreate(&'a str),
    // Neighbors
    NeighborCreate(NeighborId),
    NeighborDelete(NeighborId),
    NeighborAddrCreate(&'a Addr),
    NeighborAddrLost(&'a Addr, u64),
    NeighborAddrDelete(&'a Addr),
    NeighborConflict,
    // Links
    LinkCreate(LinkId),
    LinkDelete(LinkId),
    LinkStatusChange(LinkId, LinkStatus, LinkStatus),
    LinkConflict,
    // Two-hop neighborhood
    TwoHopCreate(&'a Addr),
    TwoHopDelete(&'a Addr),
    // Network
    HelloRx(&'a RxContext, &'a HelloMsg),
}

// ===== impl Debug =====

impl Debug<'_> {
    // Log debug message using the tracing API.
    pub(crate) fn log(&self) {
        match self {
            Debug::InstanceCreate => {
                debug!("{}", self);
            }
            Debug::InterfaceCreate(name) => {
                debug_span!("interface", %name).in_scope(|| {
                    debug!("{}", self);
                })
            }
            Debug::NeighborCreate(nbr_id) | Debug::NeighborDelete(nbr_id) => {
                debug_span!("neighbor", id = %nbr_id).in_scope(|| {
                    debug!("{}", self);
                })
            }
            Debug::NeighborAddrCreate(addr)
            | Debug::NeighborAddrDelete(addr) => {
                debug!(%addr, "{}", self);
            }
            Debug::NeighborAddrLost(addr, deadline) => {
                debug!(%addr, %deadline, "{}", self);
            }
            Debug::NeighborConflict | Debug::LinkConflict => {
                debug!("{}", self);
            }
            Debug::LinkCreate(link_id) | Debug::LinkDelete(link_id) => {
                debug_span!("link", id = %link_id).in_scope(|| {
                    debug!("{}", self);
                })
            }
            Debug::LinkStatusChange(link_id, old, new) => {
                debug_span!("link", id = %link_id).in_scope(|| {
                    debug!(%old, %new, "{}", self);
                })
            }
            Debug::TwoHopCreate(addr) | Debug::TwoHopDelete(addr) => {
                debug!(%addr, "{}", self);
            }
            Debug::HelloRx(ctx, msg) => {
                debug_span!("network").in_scope(|| {
                    debug_span!("input").in_scope(|| {
                        let data = serde_json::to_string(&msg).unwrap();
                        debug!(interface = %ctx.ifname, source = %ctx.src, %data, "{}", self);
                    })
                })
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::InstanceCreate => {
                write!(f, "instance created")
            }
            Debug::InterfaceCreate(..) => {
                write!(f, "interface created")
            }
            Debug::NeighborCreate(..) => {
                write!(f, "neighbor created")
            }
            Debug::NeighborDelete(..) => {
                write!(f, "neighbor deleted")
            }
            Debug::NeighborAddrCreate(..) => {
                write!(f, "neighbor address created")
            }
            Debug::NeighborAddrLost(..) => {
                write!(f, "neighbor address marked as lost")
            }
            Debug::NeighborAddrDelete(..) => {
                write!(f, "neighbor address deleted")
            }
            Debug::NeighborConflict => {
                write!(f, "conflict between neighbor addresses")
            }
            Debug::LinkCreate(..) => {
                write!(f, "link created")
            }
            Debug::LinkDelete(..) => {
                write!(f, "link deleted")
            }
            Debug::LinkStatusChange(..) => {
                write!(f, "link status changed")
            }
            Debug::LinkConflict => {
                write!(f, "conflict between link addresses")
            }
            Debug::TwoHopCreate(..) => {
                write!(f, "two-hop neighbor created")
            }
            Debug::TwoHopDelete(..) => {
                write!(f, "two-hop neighbor deleted")
            }
            Debug::HelloRx(..) => {
                write!(f, "HELLO message")
            }
        }
    }
}
