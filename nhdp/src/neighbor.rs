//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;

use nhdp_utils::addr::Addr;
use nhdp_utils::timer::TimerHandle;

use crate::collections::{
    LinkIndex, NeighborAddrId, NeighborAddrIndex, NeighborId, NeighborIndex,
};
use crate::domain::NeighborDomainData;
use crate::packet::consts::MAXIMUM_DOMAINS;

// The abstract identity of a remote router: the set of addresses it has
// advertised as its own, across all links on all local interfaces.
#[derive(Debug)]
pub struct Neighbor {
    pub id: NeighborId,
    // Links towards this neighbor, one per local interface at most.
    pub links: Vec<LinkIndex>,
    // Addresses owned by this neighbor, cross-indexed globally.
    pub addrs: BTreeMap<Addr, NeighborAddrIndex>,
    // Originator address the neighbor identifies itself with in
    // topology messages. Unset until learned from a HELLO.
    pub originator: Option<Addr>,
    // Willingness to flood on behalf of other routers.
    pub flooding_willingness: u8,
    pub local_is_flooding_mpr: bool,
    // Number of links in Symmetric status.
    pub symmetric_links: u32,
    // Sibling neighbor entry of the other address family, mutual.
    pub dualstack_partner: Option<NeighborIndex>,
    pub domains: [NeighborDomainData; MAXIMUM_DOMAINS],
}

// One address attributed to a neighbor. The address is a globally
// unique key: no two neighbors may claim the same address.
#[derive(Debug)]
pub struct NeighborAddr {
    pub id: NeighborAddrId,
    pub addr: Addr,
    pub neighbor: NeighborIndex,
    // A lost address is still advertised as LOST in outgoing HELLOs
    // until the timer below fires and the address is forgotten.
    pub lost: bool,
    pub lost_timer: Option<TimerHandle>,
    // Scratch mark, only meaningful while a HELLO is being processed.
    pub might_be_removed: bool,
}

// ===== impl Neighbor =====

impl Neighbor {
    pub(crate) fn new(id: NeighborId) -> Neighbor {
        Neighbor {
            id,
            links: Vec::new(),
            addrs: Default::default(),
            originator: None,
            flooding_willingness: 0,
            local_is_flooding_mpr: false,
            symmetric_links: 0,
            dualstack_partner: None,
            domains: Default::default(),
        }
    }

    pub fn is_symmetric(&self) -> bool {
        self.symmetric_links > 0
    }
}

// ===== impl NeighborAddr =====

impl NeighborAddr {
    pub(crate) fn new(
        id: NeighborAddrId,
        addr: Addr,
        neighbor: NeighborIndex,
    ) -> NeighborAddr {
        NeighborAddr {
            id,
            addr,
            neighbor,
            lost: false,
            lost_timer: None,
            might_be_removed: false,
        }
    }
}
