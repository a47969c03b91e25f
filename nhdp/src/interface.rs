//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet};

use nhdp_utils::addr::{Addr, AddrFamily};
use serde::Deserialize;

use crate::collections::{
    Arena, InterfaceId, InterfaceIndex, LinkAddrIndex, LinkIndex,
};
use crate::link::{Link, LinkStatus};

// Default hold times, three times the default HELLO interval (RFC 6130).
pub const DFLT_HELLO_INTERVAL: u64 = 2000;
pub const DFLT_HELLO_VALIDITY: u64 = 6000;
pub const DFLT_L_HOLD_TIME: u64 = 6000;
pub const DFLT_N_HOLD_TIME: u64 = 6000;

// The local view of one of this node's network interfaces.
#[derive(Debug)]
pub struct Interface {
    pub index: InterfaceIndex,
    pub id: InterfaceId,
    pub name: String,
    pub config: InterfaceCfg,
    // Addresses owned by this interface.
    pub addrs: BTreeSet<Addr>,
    // Links on this interface.
    pub links: Vec<LinkIndex>,
    // All link addresses advertised by neighbors on this interface.
    pub link_addr_tree: BTreeMap<Addr, LinkAddrIndex>,
    // Whether this interface currently takes part in flooding.
    pub flooding: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct InterfaceCfg {
    pub hello_interval: u64,
    pub hello_validity: u64,
    // Grace period an expired symmetric link stays advertised.
    pub l_hold_time: u64,
    // Grace period a vanished neighbor address is advertised as LOST.
    pub n_hold_time: u64,
    pub ipv4_active: bool,
    pub ipv6_active: bool,
}

// ===== impl Interface =====

impl Interface {
    pub(crate) fn new(
        index: InterfaceIndex,
        id: InterfaceId,
        name: String,
    ) -> Interface {
        Interface {
            index,
            id,
            name,
            config: Default::default(),
            addrs: Default::default(),
            links: Vec::new(),
            link_addr_tree: Default::default(),
            flooding: false,
        }
    }

    // Whether HELLOs of the given address family are processed on this
    // interface.
    pub fn family_active(&self, family: AddrFamily) -> bool {
        match family {
            AddrFamily::Ipv4 => self.config.ipv4_active,
            AddrFamily::Ipv6 => self.config.ipv6_active,
            _ => false,
        }
    }

    // Returns the link address entry for the given address, if any
    // neighbor advertised it on this interface.
    pub fn link_addr_get(&self, addr: &Addr) -> Option<LinkAddrIndex> {
        self.link_addr_tree.get(addr).copied()
    }

    // Recomputes the flooding flag from the current link statuses.
    pub(crate) fn update_status(&mut self, links: &Arena<Link>) {
        self.flooding = self
            .links
            .iter()
            .any(|link_idx| links[*link_idx].status == LinkStatus::Symmetric);
    }
}

// ===== impl InterfaceCfg =====

impl Default for InterfaceCfg {
    fn default() -> InterfaceCfg {
        InterfaceCfg {
            hello_interval: DFLT_HELLO_INTERVAL,
            hello_validity: DFLT_HELLO_VALIDITY,
            l_hold_time: DFLT_L_HOLD_TIME,
            n_hold_time: DFLT_N_HOLD_TIME,
            ipv4_active: true,
            ipv6_active: true,
        }
    }
}
