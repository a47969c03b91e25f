//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use smallvec::SmallVec;

use crate::collections::Arena;
use crate::error::Error;
use crate::link::{Link, LinkStatus, TwoHop};
use crate::neighbor::Neighbor;
use crate::packet::consts::{
    LinkMetricFlags, MAXIMUM_DOMAINS, METRIC_INFINITE, MprFlags,
    WILLINGNESS_MASK, WILLINGNESS_NEVER, WILLINGNESS_SHIFT,
};
use crate::packet::tlv::metric_decode;
use crate::packet::Tlv;

// A routing topology, identified on the wire by a one-byte TLV type
// extension. The first registered domain is the default domain.
#[derive(Debug)]
pub struct Domain {
    pub index: usize,
    pub ext: u8,
    pub metric: Box<dyn DomainMetric>,
}

// Registry of routing domains, bounded by MAXIMUM_DOMAINS.
#[derive(Debug, Default)]
pub struct Domains {
    list: Vec<Domain>,
}

// Link metric plugin attached to a domain. Metric measurement itself
// happens outside the HELLO receive path; the plugin only tells the
// reader how to treat received metric TLVs.
pub trait DomainMetric: std::fmt::Debug + Send {
    fn name(&self) -> &'static str;

    // When set, received LINK_METRIC TLVs of this domain are left to
    // the plugin and the reader skips the default decoding.
    fn no_default_handling(&self) -> bool {
        false
    }
}

// Trivial metric treating every symmetric link alike.
#[derive(Debug, Default)]
pub struct HopCountMetric;

// Per-neighbor domain state.
#[derive(Clone, Copy, Debug)]
pub struct NeighborDomainData {
    pub willingness: u8,
    // Whether the neighbor selected this router as routing MPR.
    pub local_is_mpr: bool,
    pub metric_out: u32,
}

// Per-link domain state.
#[derive(Clone, Copy, Debug)]
pub struct LinkDomainData {
    pub metric_out: u32,
}

// Per-two-hop domain state.
#[derive(Clone, Copy, Debug)]
pub struct TwoHopDomainData {
    pub metric_in: u32,
    pub metric_out: u32,
}

// Willingness values collected from one HELLO, committed to the
// neighbor only when the message survives both passes.
#[derive(Debug, Default)]
pub struct WillingnessBuf {
    pub flooding: Option<u8>,
    pub domains: [Option<u8>; MAXIMUM_DOMAINS],
}

// ===== impl Domains =====

impl Domains {
    // Registers a new domain, returning its index.
    pub fn add(
        &mut self,
        ext: u8,
        metric: Box<dyn DomainMetric>,
    ) -> Result<usize, Error> {
        if self.by_ext(ext).is_some() {
            return Err(Error::DomainExists(ext));
        }
        if self.list.len() >= MAXIMUM_DOMAINS {
            return Err(Error::DomainLimitReached(ext));
        }
        let index = self.list.len();
        self.list.push(Domain { index, ext, metric });
        Ok(index)
    }

    pub fn by_ext(&self, ext: u8) -> Option<&Domain> {
        self.list.iter().find(|domain| domain.ext == ext)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Domain> {
        self.list.iter()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

// ===== impl DomainMetric for HopCountMetric =====

impl DomainMetric for HopCountMetric {
    fn name(&self) -> &'static str {
        "hopcount"
    }
}

// ===== impl Default for domain data =====

impl Default for NeighborDomainData {
    fn default() -> NeighborDomainData {
        NeighborDomainData {
            willingness: WILLINGNESS_NEVER,
            local_is_mpr: false,
            metric_out: METRIC_INFINITE,
        }
    }
}

impl Default for LinkDomainData {
    fn default() -> LinkDomainData {
        LinkDomainData {
            metric_out: METRIC_INFINITE,
        }
    }
}

impl Default for TwoHopDomainData {
    fn default() -> TwoHopDomainData {
        TwoHopDomainData {
            metric_in: METRIC_INFINITE,
            metric_out: METRIC_INFINITE,
        }
    }
}

// ===== global functions =====

// Extracts the list of domain extensions a multi-topology HELLO carries
// willingness and MPR information for. Absent TLV means the HELLO uses
// the single default domain.
pub(crate) fn process_mprtypes_tlv(
    tlv: Option<&Tlv>,
) -> SmallVec<[u8; MAXIMUM_DOMAINS]> {
    let mut mprtypes = SmallVec::new();
    if let Some(tlv) = tlv {
        for ext in tlv.value.iter().take(MAXIMUM_DOMAINS) {
            mprtypes.push(*ext);
        }
    }
    mprtypes
}

// Extracts willingness values into the session buffer.
//
// Without MPR_TYPES the single value byte carries the flooding
// willingness in the high nibble and the default-domain routing
// willingness in the low nibble. With MPR_TYPES each listed domain gets
// one nibble, high nibble first.
pub(crate) fn process_willingness_tlv(
    domains: &Domains,
    mprtypes: &[u8],
    tlv: Option<&Tlv>,
    buf: &mut WillingnessBuf,
) {
    let Some(tlv) = tlv else {
        return;
    };
    if tlv.value.is_empty() {
        return;
    }

    if mprtypes.is_empty() {
        buf.flooding = Some(tlv.value[0] >> WILLINGNESS_SHIFT);
        buf.domains[0] = Some(tlv.value[0] & WILLINGNESS_MASK);
        return;
    }

    for (pos, ext) in mprtypes.iter().enumerate() {
        let Some(byte) = tlv.value.get(pos / 2) else {
            break;
        };
        let will = if pos % 2 == 0 {
            byte >> WILLINGNESS_SHIFT
        } else {
            byte & WILLINGNESS_MASK
        };
        if let Some(domain) = domains.by_ext(*ext) {
            buf.domains[domain.index] = Some(will);
        }
    }
}

// Applies a received MPR TLV to the neighbor: one value byte per listed
// domain (or a single byte for the default domain), with the flooding
// selection taken from the first byte.
pub(crate) fn process_mpr_tlv(
    domains: &Domains,
    mprtypes: &[u8],
    neighbor: &mut Neighbor,
    tlv: Option<&Tlv>,
) {
    let Some(tlv) = tlv else {
        return;
    };
    if tlv.value.is_empty() {
        return;
    }

    let first = MprFlags::from_bits_truncate(tlv.value[0]);
    neighbor.local_is_flooding_mpr = first.contains(MprFlags::FLOODING);

    if mprtypes.is_empty() {
        neighbor.domains[0].local_is_mpr = first.contains(MprFlags::ROUTING);
        return;
    }

    for (pos, ext) in mprtypes.iter().enumerate() {
        let Some(byte) = tlv.value.get(pos) else {
            break;
        };
        let flags = MprFlags::from_bits_truncate(*byte);
        if let Some(domain) = domains.by_ext(*ext) {
            neighbor.domains[domain.index].local_is_mpr =
                flags.contains(MprFlags::ROUTING);
        }
    }
}

// Applies a LINK_METRIC TLV to the link and its neighbor. The remote's
// incoming metric is this router's outgoing metric.
pub(crate) fn process_metric_linktlv(
    domain: &Domain,
    link: &mut Link,
    neighbor: &mut Neighbor,
    value: &[u8],
) {
    if value.len() < 2 {
        return;
    }
    let flags = LinkMetricFlags::from_bits_truncate(value[0]);
    let metric = metric_decode(u16::from_be_bytes([value[0], value[1]]));

    if flags.contains(LinkMetricFlags::INCOMING_LINK) {
        link.domains[domain.index].metric_out = metric;
    }
    if flags.contains(LinkMetricFlags::INCOMING_NEIGH) {
        neighbor.domains[domain.index].metric_out = metric;
    }
}

// Applies a LINK_METRIC TLV to a two-hop entry. No direction reversal
// here: the TLV describes the link between the neighbor and the two-hop
// node.
pub(crate) fn process_metric_2hoptlv(
    domain: &Domain,
    two_hop: &mut TwoHop,
    value: &[u8],
) {
    if value.len() < 2 {
        return;
    }
    let flags = LinkMetricFlags::from_bits_truncate(value[0]);
    let metric = metric_decode(u16::from_be_bytes([value[0], value[1]]));

    if flags.contains(LinkMetricFlags::INCOMING_NEIGH) {
        two_hop.domains[domain.index].metric_in = metric;
    }
    if flags.contains(LinkMetricFlags::OUTGOING_NEIGH) {
        two_hop.domains[domain.index].metric_out = metric;
    }
}

// Commits the willingness values collected from a HELLO.
pub(crate) fn store_willingness(
    domains: &Domains,
    neighbor: &mut Neighbor,
    buf: &WillingnessBuf,
) {
    if let Some(flooding) = buf.flooding {
        neighbor.flooding_willingness = flooding;
    }
    for domain in domains.iter() {
        if let Some(will) = buf.domains[domain.index] {
            neighbor.domains[domain.index].willingness = will;
        }
    }
}

// Recomputes the neighbor's per-domain outgoing metric as the best
// metric among its symmetric links.
pub(crate) fn neighbor_changed(
    domains: &Domains,
    neighbor: &mut Neighbor,
    links: &Arena<Link>,
) {
    for domain in domains.iter() {
        let best = neighbor
            .links
            .iter()
            .map(|link_idx| &links[*link_idx])
            .filter(|link| link.status == LinkStatus::Symmetric)
            .map(|link| link.domains[domain.index].metric_out)
            .min()
            .unwrap_or(METRIC_INFINITE);
        let data = &mut neighbor.domains[domain.index];
        if data.metric_out == METRIC_INFINITE || best != METRIC_INFINITE {
            data.metric_out = best;
        }
    }
}
