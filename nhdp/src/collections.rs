//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, HashMap};

use generational_arena::Index;
use nhdp_utils::addr::Addr;

use crate::error::Error;
use crate::interface::Interface;
use crate::link::{Link, TwoHop};
use crate::neighbor::{Neighbor, NeighborAddr};

pub type ObjectId = u32;

pub type InterfaceId = ObjectId;
pub type InterfaceIndex = Index;
pub type NeighborId = ObjectId;
pub type NeighborIndex = Index;
pub type NeighborAddrId = ObjectId;
pub type NeighborAddrIndex = Index;
pub type LinkId = ObjectId;
pub type LinkIndex = Index;
pub type LinkAddrIndex = Index;
pub type TwoHopId = ObjectId;
pub type TwoHopIndex = Index;

#[derive(Debug)]
pub struct Arena<T>(generational_arena::Arena<T>);

#[derive(Debug, Default)]
pub struct Interfaces {
    arena: Arena<Interface>,
    name_tree: BTreeMap<String, InterfaceIndex>,
    // Locally owned addresses across all interfaces.
    addr_tree: BTreeMap<Addr, InterfaceIndex>,
    next_id: InterfaceId,
}

#[derive(Debug, Default)]
pub struct Neighbors {
    id_tree: HashMap<NeighborId, NeighborIndex>,
    originator_tree: BTreeMap<Addr, NeighborIndex>,
    next_id: NeighborId,
}

#[derive(Debug, Default)]
pub struct NeighborAddrs {
    id_tree: HashMap<NeighborAddrId, NeighborAddrIndex>,
    // Global address index: each address belongs to at most one
    // neighbor.
    addr_tree: BTreeMap<Addr, NeighborAddrIndex>,
    next_id: NeighborAddrId,
}

#[derive(Debug, Default)]
pub struct Links {
    id_tree: HashMap<LinkId, LinkIndex>,
    next_id: LinkId,
}

#[derive(Debug, Default)]
pub struct TwoHops {
    id_tree: HashMap<TwoHopId, TwoHopIndex>,
    next_id: TwoHopId,
}

// ===== impl Arena =====

impl<T> Arena<T> {
    pub(crate) fn insert(&mut self, value: T) -> Index {
        self.0.insert(value)
    }

    pub(crate) fn insert_with(
        &mut self,
        create: impl FnOnce(Index) -> T,
    ) -> Index {
        self.0.insert_with(create)
    }

    pub(crate) fn remove(&mut self, index: Index) -> Option<T> {
        self.0.remove(index)
    }

    pub fn get(&self, index: Index) -> Option<&T> {
        self.0.get(index)
    }

    pub fn get_mut(&mut self, index: Index) -> Option<&mut T> {
        self.0.get_mut(index)
    }

    pub fn contains(&self, index: Index) -> bool {
        self.0.contains(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Index, &T)> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Index, &mut T)> {
        self.0.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Arena<T> {
        Arena(Default::default())
    }
}

impl<T> std::ops::Index<Index> for Arena<T> {
    type Output = T;

    fn index(&self, index: Index) -> &Self::Output {
        &self.0[index]
    }
}

impl<T> std::ops::IndexMut<Index> for Arena<T> {
    fn index_mut(&mut self, index: Index) -> &mut Self::Output {
        &mut self.0[index]
    }
}

// ===== impl Interfaces =====

impl Interfaces {
    pub(crate) fn insert(&mut self, ifname: &str) -> &mut Interface {
        // Create and insert interface into the arena.
        self.next_id += 1;
        let iface_idx = self.arena.insert_with(|index| {
            Interface::new(index, self.next_id, ifname.to_owned())
        });

        // Link interface to different collections.
        let iface = &mut self.arena[iface_idx];
        if self
            .name_tree
            .insert(iface.name.clone(), iface_idx)
            .is_some()
        {
            panic!("interface name={} already exists", iface.name);
        }

        iface
    }

    // Returns a reference to the interface corresponding to the given
    // name.
    pub fn get_by_name(&self, ifname: &str) -> Option<&Interface> {
        self.name_tree
            .get(ifname)
            .copied()
            .map(|iface_idx| &self.arena[iface_idx])
    }

    // Returns a mutable reference to the interface corresponding to the
    // given name.
    pub fn get_mut_by_name(&mut self, ifname: &str) -> Option<&mut Interface> {
        self.name_tree
            .get(ifname)
            .copied()
            .map(move |iface_idx| &mut self.arena[iface_idx])
    }

    // Registers a locally owned address on the given interface.
    pub(crate) fn addr_add(&mut self, iface_idx: InterfaceIndex, addr: Addr) {
        self.arena[iface_idx].addrs.insert(addr);
        self.addr_tree.insert(addr, iface_idx);
    }

    pub(crate) fn addr_remove(
        &mut self,
        iface_idx: InterfaceIndex,
        addr: &Addr,
    ) {
        self.arena[iface_idx].addrs.remove(addr);
        self.addr_tree.remove(addr);
    }

    // Looks up the owner of a locally owned address, across all
    // interfaces.
    pub fn addr_global_get(&self, addr: &Addr) -> Option<InterfaceIndex> {
        self.addr_tree.get(addr).copied()
    }

    // Returns an iterator visiting all interfaces, ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = &Interface> {
        self.name_tree
            .values()
            .map(|iface_idx| &self.arena[*iface_idx])
    }
}

impl std::ops::Index<InterfaceIndex> for Interfaces {
    type Output = Interface;

    fn index(&self, index: InterfaceIndex) -> &Self::Output {
        &self.arena[index]
    }
}

impl std::ops::IndexMut<InterfaceIndex> for Interfaces {
    fn index_mut(&mut self, index: InterfaceIndex) -> &mut Self::Output {
        &mut self.arena[index]
    }
}

// ===== impl Neighbors =====

impl Neighbors {
    pub(crate) fn insert<'a>(
        &mut self,
        arena: &'a mut Arena<Neighbor>,
    ) -> (NeighborIndex, &'a mut Neighbor) {
        // Create and insert neighbor into the arena.
        self.next_id += 1;
        let nbr_idx = arena.insert(Neighbor::new(self.next_id));

        // Link neighbor to different collections.
        let nbr = &mut arena[nbr_idx];
        self.id_tree.insert(nbr.id, nbr_idx);

        (nbr_idx, nbr)
    }

    pub(crate) fn delete(
        &mut self,
        arena: &mut Arena<Neighbor>,
        nbr_idx: NeighborIndex,
    ) {
        let nbr = &mut arena[nbr_idx];

        // Unlink neighbor from different collections.
        self.id_tree.remove(&nbr.id);
        if let Some(originator) = nbr.originator.take() {
            self.originator_tree.remove(&originator);
        }

        // Remove neighbor from the arena.
        arena.remove(nbr_idx);
    }

    // Returns a reference to the neighbor corresponding to the given
    // ID.
    pub fn get_by_id<'a>(
        &self,
        arena: &'a Arena<Neighbor>,
        id: NeighborId,
    ) -> Result<(NeighborIndex, &'a Neighbor), Error> {
        self.id_tree
            .get(&id)
            .copied()
            .map(|nbr_idx| (nbr_idx, &arena[nbr_idx]))
            .filter(|(_, nbr)| nbr.id == id)
            .ok_or(Error::NeighborIdNotFound(id))
    }

    // Returns a mutable reference to the neighbor corresponding to the
    // given ID.
    pub fn get_mut_by_id<'a>(
        &mut self,
        arena: &'a mut Arena<Neighbor>,
        id: NeighborId,
    ) -> Result<(NeighborIndex, &'a mut Neighbor), Error> {
        self.id_tree
            .get(&id)
            .copied()
            .map(move |nbr_idx| (nbr_idx, &mut arena[nbr_idx]))
            .filter(|(_, nbr)| nbr.id == id)
            .ok_or(Error::NeighborIdNotFound(id))
    }

    // Returns the neighbor that identifies itself with the given
    // originator address.
    pub fn get_by_originator(&self, addr: &Addr) -> Option<NeighborIndex> {
        self.originator_tree.get(addr).copied()
    }

    // Rebinds the neighbor's originator address. An unset or
    // unspecified address clears the binding. A binding another
    // neighbor holds on the new address is released first.
    pub(crate) fn set_originator(
        &mut self,
        arena: &mut Arena<Neighbor>,
        nbr_idx: NeighborIndex,
        originator: Option<Addr>,
    ) {
        let originator = originator.filter(|addr| !addr.is_unspecified());

        if let Some(old) = arena[nbr_idx].originator.take() {
            self.originator_tree.remove(&old);
        }
        if let Some(addr) = originator {
            if let Some(other_idx) = self.originator_tree.insert(addr, nbr_idx)
                && other_idx != nbr_idx
            {
                arena[other_idx].originator = None;
            }
            arena[nbr_idx].originator = Some(addr);
        }
    }
}

// ===== impl NeighborAddrs =====

impl NeighborAddrs {
    pub(crate) fn insert<'a>(
        &mut self,
        arena: &'a mut Arena<NeighborAddr>,
        nbr_idx: NeighborIndex,
        addr: Addr,
    ) -> (NeighborAddrIndex, &'a mut NeighborAddr) {
        // Create and insert address into the arena.
        self.next_id += 1;
        let naddr_idx =
            arena.insert(NeighborAddr::new(self.next_id, addr, nbr_idx));

        // Link address to different collections.
        let naddr = &mut arena[naddr_idx];
        self.id_tree.insert(naddr.id, naddr_idx);
        if self.addr_tree.insert(addr, naddr_idx).is_some() {
            panic!("neighbor address {addr} already indexed");
        }

        (naddr_idx, naddr)
    }

    pub(crate) fn delete(
        &mut self,
        arena: &mut Arena<NeighborAddr>,
        naddr_idx: NeighborAddrIndex,
    ) {
        let naddr = &mut arena[naddr_idx];

        // Unlink address from different collections.
        self.id_tree.remove(&naddr.id);
        self.addr_tree.remove(&naddr.addr);

        // Remove address from the arena.
        arena.remove(naddr_idx);
    }

    // Returns the owner entry of the given address, whichever neighbor
    // it belongs to.
    pub fn get_by_addr(&self, addr: &Addr) -> Option<NeighborAddrIndex> {
        self.addr_tree.get(addr).copied()
    }

    // Returns a mutable reference to the address entry corresponding to
    // the given ID.
    pub fn get_mut_by_id<'a>(
        &mut self,
        arena: &'a mut Arena<NeighborAddr>,
        id: NeighborAddrId,
    ) -> Result<(NeighborAddrIndex, &'a mut NeighborAddr), Error> {
        self.id_tree
            .get(&id)
            .copied()
            .map(move |naddr_idx| (naddr_idx, &mut arena[naddr_idx]))
            .filter(|(_, naddr)| naddr.id == id)
            .ok_or(Error::NeighborAddrIdNotFound(id))
    }
}

// ===== impl Links =====

impl Links {
    pub(crate) fn insert<'a>(
        &mut self,
        arena: &'a mut Arena<Link>,
        iface_idx: InterfaceIndex,
        nbr_idx: NeighborIndex,
    ) -> (LinkIndex, &'a mut Link) {
        // Create and insert link into the arena.
        self.next_id += 1;
        let link_idx = arena.insert(Link::new(self.next_id, iface_idx, nbr_idx));

        // Link to different collections.
        let link = &mut arena[link_idx];
        self.id_tree.insert(link.id, link_idx);

        (link_idx, link)
    }

    pub(crate) fn delete(&mut self, arena: &mut Arena<Link>, link_idx: LinkIndex) {
        let link = &arena[link_idx];

        // Unlink from different collections.
        self.id_tree.remove(&link.id);

        // Remove link from the arena.
        arena.remove(link_idx);
    }

    // Returns a mutable reference to the link corresponding to the
    // given ID.
    pub fn get_mut_by_id<'a>(
        &mut self,
        arena: &'a mut Arena<Link>,
        id: LinkId,
    ) -> Result<(LinkIndex, &'a mut Link), Error> {
        self.id_tree
            .get(&id)
            .copied()
            .map(move |link_idx| (link_idx, &mut arena[link_idx]))
            .filter(|(_, link)| link.id == id)
            .ok_or(Error::LinkIdNotFound(id))
    }
}

// ===== impl TwoHops =====

impl TwoHops {
    pub(crate) fn insert<'a>(
        &mut self,
        arena: &'a mut Arena<TwoHop>,
        link_idx: LinkIndex,
        addr: Addr,
    ) -> (TwoHopIndex, &'a mut TwoHop) {
        // Create and insert entry into the arena.
        self.next_id += 1;
        let th_idx = arena.insert(TwoHop::new(self.next_id, addr, link_idx));

        // Link entry to different collections.
        let two_hop = &mut arena[th_idx];
        self.id_tree.insert(two_hop.id, th_idx);

        (th_idx, two_hop)
    }

    pub(crate) fn delete(
        &mut self,
        arena: &mut Arena<TwoHop>,
        th_idx: TwoHopIndex,
    ) {
        let two_hop = &arena[th_idx];

        // Unlink entry from different collections.
        self.id_tree.remove(&two_hop.id);

        // Remove entry from the arena.
        arena.remove(th_idx);
    }

    // Returns a mutable reference to the entry corresponding to the
    // given ID.
    pub fn get_mut_by_id<'a>(
        &mut self,
        arena: &'a mut Arena<TwoHop>,
        id: TwoHopId,
    ) -> Result<(TwoHopIndex, &'a mut TwoHop), Error> {
        self.id_tree
            .get(&id)
            .copied()
            .map(move |th_idx| (th_idx, &mut arena[th_idx]))
            .filter(|(_, two_hop)| two_hop.id == id)
            .ok_or(Error::TwoHopIdNotFound(id))
    }
}
