//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::net::SocketAddr;

use nhdp_utils::addr::{Addr, MacAddr};
use nhdp_utils::timer::{TimerHandle, TimerWheel};
use serde::{Deserialize, Serialize};

use crate::collections::{
    InterfaceIndex, LinkAddrIndex, LinkId, LinkIndex, NeighborIndex, TwoHopId,
    TwoHopIndex,
};
use crate::domain::{LinkDomainData, TwoHopDomainData};
use crate::events::TimerEvent;
use crate::hysteresis::{HysteresisData, LinkHysteresis};
use crate::packet::consts::MAXIMUM_DOMAINS;

// A (local interface, remote neighbor) relation, tracked through the
// three RFC 6130 validity timers.
#[derive(Debug)]
pub struct Link {
    pub id: LinkId,
    pub iface: InterfaceIndex,
    pub neighbor: NeighborIndex,
    // Addresses the neighbor advertised for this link's interface.
    pub addrs: BTreeMap<Addr, LinkAddrIndex>,
    // Symmetric two-hop neighborhood reachable through this link.
    pub two_hops: BTreeMap<Addr, TwoHopIndex>,
    // Socket address the last HELLO arrived from.
    pub if_addr: Option<SocketAddr>,
    pub remote_mac: Option<MacAddr>,
    // While sym_timer runs the link is symmetric; while heard_timer
    // runs it is at least heard; when vtime_timer fires the link is
    // destroyed.
    pub sym_timer: Option<TimerHandle>,
    pub heard_timer: Option<TimerHandle>,
    pub vtime_timer: Option<TimerHandle>,
    // Validity and interval time advertised by the peer, milliseconds.
    pub rx_vtime: u64,
    pub rx_itime: u64,
    pub status: LinkStatus,
    pub hysteresis: HysteresisData,
    // Sibling link of the other address family, mutual.
    pub dualstack_partner: Option<LinkIndex>,
    pub domains: [LinkDomainData; MAXIMUM_DOMAINS],
}

// RFC 6130 link status.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum LinkStatus {
    Pending,
    Lost,
    Heard,
    Symmetric,
}

// An address that appeared with LOCAL_IF = THIS_IF on this link.
#[derive(Debug)]
pub struct LinkAddr {
    pub addr: Addr,
    pub link: LinkIndex,
    // Scratch mark, only meaningful while a HELLO is being processed.
    pub might_be_removed: bool,
}

// An address reachable in two hops through one specific link.
#[derive(Debug)]
pub struct TwoHop {
    pub id: TwoHopId,
    pub addr: Addr,
    pub link: LinkIndex,
    // Whether the neighbor heard this address on the interface the
    // link is on, rather than on another of its interfaces.
    pub same_interface: bool,
    pub vtime_timer: Option<TimerHandle>,
    pub domains: [TwoHopDomainData; MAXIMUM_DOMAINS],
}

// ===== global functions =====

// Derives the link status from the validity timers and the hysteresis
// verdict. Deadlines are absolute milliseconds; `None` stands for an
// inactive timer.
pub fn link_status(
    now: u64,
    sym_deadline: Option<u64>,
    heard_deadline: Option<u64>,
    pending: bool,
    lost: bool,
) -> LinkStatus {
    if pending {
        LinkStatus::Pending
    } else if lost {
        LinkStatus::Lost
    } else if sym_deadline.is_some_and(|deadline| deadline > now) {
        LinkStatus::Symmetric
    } else if heard_deadline.is_some_and(|deadline| deadline > now) {
        LinkStatus::Heard
    } else {
        LinkStatus::Lost
    }
}

// ===== impl Link =====

impl Link {
    pub(crate) fn new(
        id: LinkId,
        iface: InterfaceIndex,
        neighbor: NeighborIndex,
    ) -> Link {
        Link {
            id,
            iface,
            neighbor,
            addrs: Default::default(),
            two_hops: Default::default(),
            if_addr: None,
            remote_mac: None,
            sym_timer: None,
            heard_timer: None,
            vtime_timer: None,
            rx_vtime: 0,
            rx_itime: 0,
            status: LinkStatus::Pending,
            hysteresis: Default::default(),
            dualstack_partner: None,
            domains: Default::default(),
        }
    }

    // Recomputes the status this link should be in right now, without
    // committing it.
    pub(crate) fn calculate_status(
        &self,
        now: u64,
        timers: &TimerWheel<TimerEvent>,
        hysteresis: &dyn LinkHysteresis,
    ) -> LinkStatus {
        let sym = self.sym_timer.and_then(|handle| timers.due(handle));
        let heard = self.heard_timer.and_then(|handle| timers.due(handle));
        link_status(
            now,
            sym,
            heard,
            hysteresis.is_pending(self),
            hysteresis.is_lost(self),
        )
    }
}

// ===== impl LinkStatus =====

impl std::fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkStatus::Pending => write!(f, "pending"),
            LinkStatus::Lost => write!(f, "lost"),
            LinkStatus::Heard => write!(f, "heard"),
            LinkStatus::Symmetric => write!(f, "symmetric"),
        }
    }
}

// ===== impl LinkAddr =====

impl LinkAddr {
    pub(crate) fn new(addr: Addr, link: LinkIndex) -> LinkAddr {
        LinkAddr {
            addr,
            link,
            might_be_removed: false,
        }
    }
}

// ===== impl TwoHop =====

impl TwoHop {
    pub(crate) fn new(id: TwoHopId, addr: Addr, link: LinkIndex) -> TwoHop {
        TwoHop {
            id,
            addr,
            link,
            same_interface: false,
            vtime_timer: None,
            domains: Default::default(),
        }
    }
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_from_timers() {
        let now = 10_000;
        assert_eq!(
            link_status(now, Some(16_000), Some(16_000), false, false),
            LinkStatus::Symmetric
        );
        assert_eq!(
            link_status(now, None, Some(16_000), false, false),
            LinkStatus::Heard
        );
        assert_eq!(
            link_status(now, Some(9_000), Some(16_000), false, false),
            LinkStatus::Heard
        );
        assert_eq!(
            link_status(now, None, Some(10_000), false, false),
            LinkStatus::Lost
        );
        assert_eq!(link_status(now, None, None, false, false), LinkStatus::Lost);
    }

    #[test]
    fn status_hysteresis_overrides() {
        let now = 10_000;
        // Pending sticks regardless of the timers.
        assert_eq!(
            link_status(now, Some(16_000), Some(16_000), true, false),
            LinkStatus::Pending
        );
        assert_eq!(
            link_status(now, Some(16_000), Some(16_000), false, true),
            LinkStatus::Lost
        );
    }
}
