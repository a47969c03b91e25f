//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use nhdp_utils::addr::Addr;
use nhdp_utils::time::Clock;
use nhdp_utils::timer::TimerWheel;
use serde::Deserialize;

use crate::collections::{
    Arena, Interfaces, Links, NeighborAddrs, Neighbors, TwoHops,
};
use crate::debug::Debug;
use crate::domain::{Domains, HopCountMetric};
use crate::error::Error;
use crate::events::{self, TimerEvent};
use crate::hysteresis::{LinkHysteresis, NoopHysteresis};
use crate::interface::{Interface, InterfaceCfg};
use crate::link::{Link, LinkAddr, LinkStatus, TwoHop};
use crate::neighbor::{Neighbor, NeighborAddr};
use crate::packet::{HelloMsg, RxContext};
use crate::reader;

// One NHDP protocol instance: configuration, the neighborhood database
// and the timers driving it. All state lives here; nothing is global.
#[derive(Debug)]
pub struct Instance {
    pub name: String,
    pub config: InstanceCfg,
    pub clock: Box<dyn Clock>,
    pub state: InstanceState,
    pub arenas: InstanceArenas,
    pub domains: Domains,
    pub hysteresis: Box<dyn LinkHysteresis>,
    pub listeners: Vec<Box<dyn LinkListener>>,
}

#[derive(Debug, Default)]
pub struct InstanceState {
    pub neighbors: Neighbors,
    pub neighbor_addrs: NeighborAddrs,
    pub links: Links,
    pub two_hops: TwoHops,
    pub timers: TimerWheel<TimerEvent>,
}

#[derive(Debug, Default)]
pub struct InstanceArenas {
    pub interfaces: Interfaces,
    pub neighbors: Arena<Neighbor>,
    pub neighbor_addrs: Arena<NeighborAddr>,
    pub links: Arena<Link>,
    pub link_addrs: Arena<LinkAddr>,
    pub two_hops: Arena<TwoHop>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct InstanceCfg {
    // Configuration applied to newly registered interfaces.
    pub interface: InterfaceCfg,
}

// Observer of link lifecycle events, registered by the subsystems that
// consume the neighborhood (MPR selection, topology advertisement).
pub trait LinkListener: std::fmt::Debug + Send {
    fn link_status_changed(&mut self, link: &Link, old: LinkStatus) {
        let _ = (link, old);
    }

    fn link_removed(&mut self, link: &Link) {
        let _ = link;
    }
}

// ===== impl Instance =====

impl Instance {
    pub fn new(name: &str, clock: Box<dyn Clock>) -> Instance {
        let mut domains = Domains::default();
        domains
            .add(0, Box::new(HopCountMetric))
            .expect("empty domain registry rejected the default domain");

        let instance = Instance {
            name: name.to_owned(),
            config: Default::default(),
            clock,
            state: Default::default(),
            arenas: Default::default(),
            domains,
            hysteresis: Box::new(NoopHysteresis),
            listeners: Vec::new(),
        };
        Debug::InstanceCreate.log();
        instance
    }

    pub fn now(&self) -> u64 {
        self.clock.now_ms()
    }

    // Registers a local interface and applies the instance-wide
    // interface defaults.
    pub fn interface_add(&mut self, ifname: &str) -> &mut Interface {
        let config = self.config.interface.clone();
        let iface = self.arenas.interfaces.insert(ifname);
        iface.config = config;
        Debug::InterfaceCreate(ifname).log();
        iface
    }

    // Registers a locally owned address on an interface.
    pub fn interface_addr_add(
        &mut self,
        ifname: &str,
        addr: Addr,
    ) -> Result<(), Error> {
        let iface = self
            .arenas
            .interfaces
            .get_by_name(ifname)
            .ok_or_else(|| Error::InterfaceNotFound(ifname.to_owned()))?;
        let iface_idx = iface.index;
        self.arenas.interfaces.addr_add(iface_idx, addr);
        Ok(())
    }

    pub fn interface_addr_remove(
        &mut self,
        ifname: &str,
        addr: &Addr,
    ) -> Result<(), Error> {
        let iface = self
            .arenas
            .interfaces
            .get_by_name(ifname)
            .ok_or_else(|| Error::InterfaceNotFound(ifname.to_owned()))?;
        let iface_idx = iface.index;
        self.arenas.interfaces.addr_remove(iface_idx, addr);
        Ok(())
    }

    pub fn listener_add(&mut self, listener: Box<dyn LinkListener>) {
        self.listeners.push(listener);
    }

    // Feeds one decoded HELLO through the two-pass reader.
    pub fn process_hello(
        &mut self,
        ctx: &RxContext,
        msg: &HelloMsg,
    ) -> Result<(), Error> {
        reader::process_hello(self, ctx, msg)
    }

    // Runs every timer whose deadline has been reached. Each expiry is
    // fully committed before the next one fires.
    pub fn poll_timers(&mut self) {
        loop {
            let now = self.clock.now_ms();
            let Some(event) = self.state.timers.pop_due(now) else {
                break;
            };
            if let Err(error) = events::process_timer_event(self, event) {
                error.log();
            }
        }
    }
}
