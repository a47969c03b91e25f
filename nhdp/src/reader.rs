//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

// Two-pass HELLO processing (RFC 6130 section 12).
//
// Pass 1 only observes: it detects which known neighbor and link the
// message belongs to and whether the sender hears us. Pass 2 commits:
// it re-parents addresses, resolves identity conflicts, maintains the
// two-hop set and reconciles the validity timers. The RFC 5444 parser
// drives the passes through the consumer callbacks below; between
// messages no scratch state survives.

use std::collections::HashMap;
use std::net::SocketAddr;

use nhdp_utils::addr::{Addr, AddrFamily, MacAddr};
use num_traits::FromPrimitive;
use smallvec::SmallVec;

use crate::collections::{
    InterfaceIndex, LinkAddrIndex, LinkIndex, NeighborAddrIndex, NeighborIndex,
    TwoHopIndex,
};
use crate::db;
use crate::debug::Debug;
use crate::domain::{self, NeighborDomainData, WillingnessBuf};
use crate::error::{Error, MessageError};
use crate::instance::Instance;
use crate::link::LinkStatus;
use crate::packet::consts::{
    ADDRTLV_LINK_METRIC, ADDRTLV_LINK_STATUS, ADDRTLV_LOCAL_IF, ADDRTLV_MPR,
    ADDRTLV_OTHER_NEIGHB, LINKSTATUS_BITMASK, LOCALIF_BITMASK, LocalIf,
    MAXIMUM_DOMAINS, METRIC_INFINITE, MSGTLV_INTERVAL_TIME, MSGTLV_IPV4_ORIGINATOR,
    MSGTLV_MAC, MSGTLV_MPR_TYPES, MSGTLV_MPR_TYPES_EXT, MSGTLV_MPR_WILLING,
    MSGTLV_VALIDITY_TIME, OTHERNEIGHB_SYMMETRIC, TlvLinkStatus,
};
use crate::packet::tlv::timetlv_decode;
use crate::packet::{
    ConsumerResult, ConsumerTemplate, HelloMsg, RxContext, TlvBlock, TlvFilter,
};

// Consumer orders; pass 2 runs strictly after pass 1.
pub const HELLO_PASS1_ORDER: i32 = 0;
pub const HELLO_PASS2_ORDER: i32 = 1;

// Scratch state of one HELLO processing session. Dropped when the
// message is done; nothing here outlives the two passes.
#[derive(Debug)]
pub struct HelloSession {
    pub iface: InterfaceIndex,
    pub family: AddrFamily,
    pub src: SocketAddr,
    pub originator: Option<Addr>,

    pub neighbor: Option<NeighborIndex>,
    pub link: Option<LinkIndex>,

    pub originator_v4: Option<Addr>,
    pub remote_mac: Option<MacAddr>,

    pub naddr_conflict: bool,
    pub laddr_conflict: bool,
    pub link_heard: bool,
    pub link_lost: bool,
    pub has_thisif: bool,
    pub originator_in_addrblk: bool,

    pub vtime: u64,
    pub itime: u64,

    pub mprtypes: SmallVec<[u8; MAXIMUM_DOMAINS]>,
    pub willingness: WillingnessBuf,

    // How many addresses of this message still bind an existing
    // neighbor/link to its identity. Signed: the address synthesized
    // from the packet source was never counted in pass 1.
    neighbor_counts: HashMap<NeighborIndex, i32>,
    link_counts: HashMap<LinkIndex, i32>,

    // Objects allocated in this session, released again if the message
    // is dropped. Adopted objects are never listed here.
    created_neighbor: bool,
    created_link: bool,
    created_naddrs: Vec<NeighborAddrIndex>,
    created_laddrs: Vec<LinkAddrIndex>,
    created_two_hops: Vec<TwoHopIndex>,
}

// ===== consumer registration =====

static HELLO_MESSAGE_TLVS: [TlvFilter; 6] = [
    TlvFilter {
        typ: MSGTLV_VALIDITY_TIME,
        ext: 0,
        match_ext: true,
        mandatory: true,
        min_length: 1,
    },
    TlvFilter {
        typ: MSGTLV_INTERVAL_TIME,
        ext: 0,
        match_ext: true,
        mandatory: false,
        min_length: 1,
    },
    TlvFilter {
        typ: MSGTLV_MPR_WILLING,
        ext: 0,
        match_ext: true,
        mandatory: false,
        min_length: 1,
    },
    TlvFilter {
        typ: MSGTLV_MPR_TYPES,
        ext: MSGTLV_MPR_TYPES_EXT,
        match_ext: true,
        mandatory: false,
        min_length: 1,
    },
    TlvFilter {
        typ: MSGTLV_IPV4_ORIGINATOR,
        ext: 0,
        match_ext: true,
        mandatory: false,
        min_length: 4,
    },
    TlvFilter {
        typ: MSGTLV_MAC,
        ext: 0,
        match_ext: true,
        mandatory: false,
        min_length: 6,
    },
];

static HELLO_ADDRESS_PASS1_TLVS: [TlvFilter; 2] = [
    TlvFilter {
        typ: ADDRTLV_LOCAL_IF,
        ext: 0,
        match_ext: true,
        mandatory: false,
        min_length: 1,
    },
    TlvFilter {
        typ: ADDRTLV_LINK_STATUS,
        ext: 0,
        match_ext: true,
        mandatory: false,
        min_length: 1,
    },
];

static HELLO_ADDRESS_PASS2_TLVS: [TlvFilter; 5] = [
    TlvFilter {
        typ: ADDRTLV_LOCAL_IF,
        ext: 0,
        match_ext: true,
        mandatory: false,
        min_length: 1,
    },
    TlvFilter {
        typ: ADDRTLV_LINK_STATUS,
        ext: 0,
        match_ext: true,
        mandatory: false,
        min_length: 1,
    },
    TlvFilter {
        typ: ADDRTLV_OTHER_NEIGHB,
        ext: 0,
        match_ext: true,
        mandatory: false,
        min_length: 1,
    },
    TlvFilter {
        typ: ADDRTLV_MPR,
        ext: 0,
        match_ext: false,
        mandatory: false,
        min_length: 1,
    },
    TlvFilter {
        typ: ADDRTLV_LINK_METRIC,
        ext: 0,
        match_ext: false,
        mandatory: false,
        min_length: 2,
    },
];

// The four consumer registrations the reader asks the RFC 5444 parser
// for, in registration order.
pub fn consumer_templates() -> [ConsumerTemplate; 4] {
    use crate::packet::consts::MessageType;
    let hello = MessageType::Hello as u8;
    [
        ConsumerTemplate {
            msg_type: hello,
            order: HELLO_PASS1_ORDER,
            address_block: false,
            filters: &HELLO_MESSAGE_TLVS,
        },
        ConsumerTemplate {
            msg_type: hello,
            order: HELLO_PASS1_ORDER,
            address_block: true,
            filters: &HELLO_ADDRESS_PASS1_TLVS,
        },
        ConsumerTemplate {
            msg_type: hello,
            order: HELLO_PASS2_ORDER,
            address_block: false,
            filters: &[],
        },
        ConsumerTemplate {
            msg_type: hello,
            order: HELLO_PASS2_ORDER,
            address_block: true,
            filters: &HELLO_ADDRESS_PASS2_TLVS,
        },
    ]
}

// ===== phase 0: message entry =====

// Consumes the message TLV block and opens a fresh session. Everything
// that can reject the whole message without touching the database
// happens here.
pub fn message_tlvs(
    instance: &mut Instance,
    ctx: &RxContext,
    addr_len: u8,
    originator: Option<Addr>,
    tlvs: &TlvBlock,
) -> Result<HelloSession, MessageError> {
    let family = match addr_len {
        4 => AddrFamily::Ipv4,
        16 => AddrFamily::Ipv6,
        _ => return Err(MessageError::UnsupportedAddressLength(addr_len)),
    };

    let iface = instance
        .arenas
        .interfaces
        .get_by_name(&ctx.ifname)
        .ok_or_else(|| MessageError::NoInterface(ctx.ifname.clone()))?;
    if !iface.family_active(family) {
        return Err(MessageError::NoInterface(ctx.ifname.clone()));
    }
    let iface_idx = iface.index;

    // HELLO is single-hop, so the time TLVs carry exactly one value.
    let vtime_tlv = tlvs
        .get(MSGTLV_VALIDITY_TIME, 0)
        .ok_or(MessageError::MissingValidityTime)?;
    let vtime = timetlv_decode(vtime_tlv.single_value()?);
    let itime = match tlvs.get(MSGTLV_INTERVAL_TIME, 0) {
        Some(tlv) => timetlv_decode(tlv.single_value()?),
        None => 0,
    };

    let mprtypes = domain::process_mprtypes_tlv(
        tlvs.get(MSGTLV_MPR_TYPES, MSGTLV_MPR_TYPES_EXT),
    );
    let mut willingness = WillingnessBuf::default();
    domain::process_willingness_tlv(
        &instance.domains,
        &mprtypes,
        tlvs.get(MSGTLV_MPR_WILLING, 0),
        &mut willingness,
    );

    // IPv4 originator of a dual-stack IPv6 HELLO.
    let originator_v4 = match tlvs.get(MSGTLV_IPV4_ORIGINATOR, 0) {
        Some(tlv) => {
            let value = tlv.value_checked(4)?;
            Some(Addr::from_binary(AddrFamily::Ipv4, &value[..4])?)
        }
        None => None,
    };

    let remote_mac = match tlvs.get(MSGTLV_MAC, 0) {
        Some(tlv) => {
            let value = tlv.value_checked(6)?;
            Some(MacAddr::from_slice(&value[..6])?)
        }
        None => None,
    };

    Ok(HelloSession {
        iface: iface_idx,
        family,
        src: ctx.src,
        originator,
        neighbor: None,
        link: None,
        originator_v4,
        remote_mac,
        naddr_conflict: false,
        laddr_conflict: false,
        link_heard: false,
        link_lost: false,
        has_thisif: false,
        originator_in_addrblk: false,
        vtime,
        itime,
        mprtypes,
        willingness,
        neighbor_counts: HashMap::new(),
        link_counts: HashMap::new(),
        created_neighbor: false,
        created_link: false,
        created_naddrs: Vec::new(),
        created_laddrs: Vec::new(),
        created_two_hops: Vec::new(),
    })
}

// Constraint violation reported by the parser.
pub fn failed_constraints(ctx: &RxContext) -> ConsumerResult {
    let error = Error::HelloInputError(
        ctx.ifname.clone(),
        ctx.src,
        MessageError::FailedConstraints,
    );
    error.log();
    ConsumerResult::DropMessage(MessageError::FailedConstraints)
}

// ===== phase 1: per-address detection =====

// First address pass: no database mutation, only detection of the
// situation this HELLO puts us in.
pub fn address_pass1(
    instance: &mut Instance,
    session: &mut HelloSession,
    addr: &Addr,
    tlvs: &TlvBlock,
) -> ConsumerResult {
    let local_if = match read_local_if(tlvs) {
        Ok(value) => value,
        Err(error) => return ConsumerResult::DropMessage(error),
    };
    let link_status = match read_link_status(tlvs) {
        Ok(value) => value,
        Err(error) => return ConsumerResult::DropMessage(error),
    };

    // An originator that also shows up in the address block loses its
    // special role (RFC 6130 section 12.5.2).
    if !session.originator_in_addrblk
        && session.originator.as_ref() == Some(addr)
    {
        session.originator_in_addrblk = true;
    }

    if local_if.is_some() {
        // Track which known neighbor claims this address.
        if let Some(naddr_idx) =
            instance.state.neighbor_addrs.get_by_addr(addr)
        {
            let nbr_idx = instance.arenas.neighbor_addrs[naddr_idx].neighbor;
            *session.neighbor_counts.entry(nbr_idx).or_insert(0) += 1;

            if !session.naddr_conflict {
                match session.neighbor {
                    None => session.neighbor = Some(nbr_idx),
                    Some(current) if current != nbr_idx => {
                        Debug::NeighborConflict.log();
                        session.neighbor = None;
                        session.naddr_conflict = true;
                    }
                    _ => (),
                }
            }
        }
    }

    if local_if == Some(LocalIf::ThisIf) {
        // Track which known link on this interface claims this address.
        if let Some(la_idx) =
            instance.arenas.interfaces[session.iface].link_addr_get(addr)
        {
            let link_idx = instance.arenas.link_addrs[la_idx].link;
            *session.link_counts.entry(link_idx).or_insert(0) += 1;

            if !session.laddr_conflict {
                match session.link {
                    None => session.link = Some(link_idx),
                    Some(current) if current != link_idx => {
                        Debug::LinkConflict.log();
                        session.link = None;
                        session.laddr_conflict = true;
                    }
                    _ => (),
                }
            }
        }

        session.has_thisif = true;
    }

    // The neighbor tells us whether it hears this node.
    if let Some(status) = link_status
        && instance.arenas.interfaces[session.iface].addrs.contains(addr)
    {
        if status == TlvLinkStatus::Lost as u8 {
            session.link_lost = true;
        } else {
            session.link_heard = true;
        }
    }

    ConsumerResult::Okay
}

// ===== phase 1 end: adoption and allocation =====

pub fn pass1_end(
    instance: &mut Instance,
    ctx: &RxContext,
    session: &mut HelloSession,
    dropped: bool,
) -> ConsumerResult {
    if dropped {
        cleanup_error(instance, session);
        return ConsumerResult::Okay;
    }

    // Let the originator identify the neighbor when the address block
    // did not.
    if let Some(originator) = session.originator
        && !session.originator_in_addrblk
        && !originator.is_unspecified()
    {
        handle_originator(instance, session, &originator);
    }

    // Adopt or allocate the neighbor.
    match session.neighbor {
        None => {
            let nbr_idx =
                db::neighbor_add(&mut instance.state, &mut instance.arenas);
            session.neighbor = Some(nbr_idx);
            session.created_neighbor = true;
        }
        Some(nbr_idx) => {
            // Addresses not repeated by this HELLO are on their way
            // out; only the message's address family is affected.
            let addr_len = session.family.length();
            let arenas = &mut instance.arenas;
            for (addr, naddr_idx) in &arenas.neighbors[nbr_idx].addrs {
                if addr.length() == addr_len {
                    arenas.neighbor_addrs[*naddr_idx].might_be_removed = true;
                }
            }
        }
    }
    let nbr_idx = session.neighbor.unwrap();

    // Adopt or allocate the link.
    match session.link {
        None => {
            let link_idx = db::link_add(
                &mut instance.state,
                &mut instance.arenas,
                session.iface,
                nbr_idx,
            );
            session.link = Some(link_idx);
            session.created_link = true;
        }
        Some(link_idx) => {
            let arenas = &mut instance.arenas;
            for la_idx in arenas.links[link_idx].addrs.values() {
                arenas.link_addrs[*la_idx].might_be_removed = true;
            }

            // An adopted link follows the neighbor this message
            // identified; its addresses are re-parented in pass 2.
            db::link_set_neighbor(arenas, link_idx, nbr_idx);
        }
    }
    let link_idx = session.link.unwrap();

    // Remember where the packet came from.
    let link = &mut instance.arenas.links[link_idx];
    link.if_addr = Some(session.src);
    if let Some(mac) = session.remote_mac {
        link.remote_mac = Some(mac);
    }

    // A peer that advertises no THIS_IF address still has one: the
    // source address of the packet itself.
    if !session.has_thisif {
        let addr = Addr::from(session.src.ip());
        if let ConsumerResult::DropMessage(error) =
            pass2_process_localif(instance, session, &addr, LocalIf::ThisIf)
        {
            return ConsumerResult::DropMessage(error);
        }
    }

    let link = &mut instance.arenas.links[link_idx];
    link.rx_vtime = session.vtime;
    link.rx_itime = session.itime;

    let hysteresis = &*instance.hysteresis;
    hysteresis.update(&mut instance.arenas.links[link_idx], ctx);

    // Dualstack reconciliation.
    if let Some(originator) = session.originator {
        if let Some(originator_v4) = session.originator_v4 {
            if let Some(nbr2_idx) =
                instance.state.neighbors.get_by_originator(&originator_v4)
            {
                db::neighbor_connect_dualstack(
                    &mut instance.arenas,
                    nbr_idx,
                    nbr2_idx,
                );
            }
            if let Some(link2_idx) = db::link_get_by_originator(
                &instance.arenas,
                session.iface,
                &originator_v4,
            ) {
                db::link_connect_dualstack(
                    &mut instance.arenas,
                    link_idx,
                    link2_idx,
                );
            }
        } else if originator.family() == AddrFamily::Ipv6 {
            // IPv6 HELLO without an IPv4 originator: any previous
            // pairing is stale.
            db::neighbor_disconnect_dualstack(&mut instance.arenas, nbr_idx);
            db::link_disconnect_dualstack(&mut instance.arenas, link_idx);
        }
    }

    ConsumerResult::Okay
}

// Originator-based neighbor identification (RFC 6130 section 12.5).
fn handle_originator(
    instance: &mut Instance,
    session: &mut HelloSession,
    originator: &Addr,
) {
    let Some(nbr_idx) = instance.state.neighbors.get_by_originator(originator)
    else {
        return;
    };

    if session.neighbor == Some(nbr_idx) {
        return;
    }

    if session.neighbor.is_none() && !session.naddr_conflict {
        // Take the neighbor selected by the originator.
        session.neighbor = Some(nbr_idx);
        return;
    }

    if session.neighbor_counts.get(&nbr_idx).copied().unwrap_or(0) > 0 {
        // Still bound to addresses of this message; the address pass
        // will clean it up.
        return;
    }

    // Release the originator so it can be rebound to the neighbor this
    // message identifies.
    db::neighbor_set_originator(
        &mut instance.state,
        &mut instance.arenas,
        nbr_idx,
        None,
    );
}

// ===== phase 2: per-address commit =====

// Handles one LOCAL_IF-tagged address: creates or re-parents the link
// and neighbor address entries so they hang off the objects this
// message identified.
fn pass2_process_localif(
    instance: &mut Instance,
    session: &mut HelloSession,
    addr: &Addr,
    local_if: LocalIf,
) -> ConsumerResult {
    let Instance {
        state,
        arenas,
        listeners,
        ..
    } = instance;

    if local_if == LocalIf::ThisIf {
        match arenas.interfaces[session.iface].link_addr_get(addr) {
            None => {
                let link_idx = session.link.unwrap();
                let la_idx = db::link_addr_add(arenas, link_idx, *addr);
                session.created_laddrs.push(la_idx);
            }
            Some(la_idx) => {
                let owner_idx = arenas.link_addrs[la_idx].link;
                let count =
                    session.link_counts.entry(owner_idx).or_insert(0);
                *count -= 1;
                let count = *count;

                let link_idx = session.link.unwrap();
                if owner_idx != link_idx {
                    db::link_addr_move(arenas, link_idx, la_idx);
                    if count == 0 {
                        // No address left to process, the old link is
                        // an empty shell.
                        db::link_remove(state, arenas, listeners, owner_idx);
                    }
                }

                arenas.link_addrs[la_idx].might_be_removed = false;
            }
        }
    }

    match state.neighbor_addrs.get_by_addr(addr) {
        None => {
            let nbr_idx = session.neighbor.unwrap();
            if let Ok(naddr_idx) =
                db::neighbor_addr_add(state, arenas, nbr_idx, *addr)
            {
                session.created_naddrs.push(naddr_idx);
            }
        }
        Some(naddr_idx) => {
            let owner_idx = arenas.neighbor_addrs[naddr_idx].neighbor;
            let count = session.neighbor_counts.entry(owner_idx).or_insert(0);
            *count -= 1;
            let count = *count;

            let nbr_idx = session.neighbor.unwrap();
            if owner_idx != nbr_idx {
                db::neighbor_addr_move(arenas, nbr_idx, naddr_idx);
                if count == 0 {
                    // All of the old neighbor's addresses in this
                    // message moved away; its identity is void.
                    db::neighbor_remove(state, arenas, listeners, owner_idx);
                }
            }

            arenas.neighbor_addrs[naddr_idx].might_be_removed = false;
            db::neighbor_addr_not_lost(state, arenas, naddr_idx);
        }
    }

    ConsumerResult::Okay
}

// Second address pass: updates the database.
pub fn address_pass2(
    instance: &mut Instance,
    session: &mut HelloSession,
    addr: &Addr,
    tlvs: &TlvBlock,
) -> ConsumerResult {
    let local_if = match read_local_if(tlvs) {
        Ok(value) => value,
        Err(error) => return ConsumerResult::DropMessage(error),
    };
    let link_status = match read_link_status(tlvs) {
        Ok(value) => value,
        Err(error) => return ConsumerResult::DropMessage(error),
    };
    let other_neigh = match tlvs.get(ADDRTLV_OTHER_NEIGHB, 0) {
        Some(tlv) => match tlv.single_value() {
            Ok(value) => Some(value & OTHERNEIGHB_SYMMETRIC),
            Err(error) => return ConsumerResult::DropMessage(error),
        },
        None => None,
    };

    if let Some(local_if) = local_if {
        let result = pass2_process_localif(instance, session, addr, local_if);
        if result != ConsumerResult::Okay {
            return result;
        }
    }

    if link_status.is_none() && other_neigh.is_none() {
        return ConsumerResult::Okay;
    }

    if instance.arenas.interfaces[session.iface].addrs.contains(addr) {
        // The neighbor talks about this node itself: MPR selection,
        // willingness and the metrics of the link between us.
        process_domainspecific_linkdata(instance, session, tlvs);
    } else if instance.arenas.interfaces.addr_global_get(addr).is_some() {
        // Address of another of our interfaces; not a two-hop node.
    } else if link_status == Some(TlvLinkStatus::Symmetric as u8)
        || other_neigh == Some(OTHERNEIGHB_SYMMETRIC)
    {
        let link_idx = session.link.unwrap();
        let now = instance.clock.now_ms();
        let deadline = now + session.vtime;

        let th_idx =
            match db::link_2hop_get(&instance.arenas, link_idx, addr) {
                Some(th_idx) => {
                    db::link_2hop_set_vtime(
                        &mut instance.state,
                        &mut instance.arenas,
                        th_idx,
                        deadline,
                    );
                    th_idx
                }
                None => {
                    let th_idx = db::link_2hop_add(
                        &mut instance.state,
                        &mut instance.arenas,
                        link_idx,
                        *addr,
                        deadline,
                    );
                    session.created_two_hops.push(th_idx);
                    th_idx
                }
            };

        instance.arenas.two_hops[th_idx].same_interface =
            link_status == Some(TlvLinkStatus::Symmetric as u8);
        process_domainspecific_2hopdata(instance, th_idx, tlvs);
    } else if let Some(th_idx) =
        db::link_2hop_get(&instance.arenas, session.link.unwrap(), addr)
    {
        // The neighbor no longer reaches this address.
        db::link_2hop_remove(&mut instance.state, &mut instance.arenas, th_idx);
    }

    ConsumerResult::Okay
}

// Applies MPR, willingness-related and metric TLVs attached to one of
// this node's own addresses.
fn process_domainspecific_linkdata(
    instance: &mut Instance,
    session: &mut HelloSession,
    tlvs: &TlvBlock,
) {
    let Instance {
        arenas, domains, ..
    } = instance;
    let link_idx = session.link.unwrap();
    let nbr_idx = session.neighbor.unwrap();

    // Everything a HELLO is expected to re-state is reset first.
    let nbr = &mut arenas.neighbors[nbr_idx];
    nbr.local_is_flooding_mpr = false;
    for domain in domains.iter() {
        nbr.domains[domain.index] = NeighborDomainData::default();
        arenas.links[link_idx].domains[domain.index].metric_out =
            METRIC_INFINITE;
    }

    domain::process_mpr_tlv(
        domains,
        &session.mprtypes,
        nbr,
        tlvs.get(ADDRTLV_MPR, 0),
    );

    for tlv in tlvs.iter_type(ADDRTLV_LINK_METRIC) {
        if let Some(domain) = domains.by_ext(tlv.ext)
            && !domain.metric.no_default_handling()
        {
            domain::process_metric_linktlv(
                domain,
                &mut arenas.links[link_idx],
                &mut arenas.neighbors[nbr_idx],
                &tlv.value,
            );
        }
    }
}

// Applies metric TLVs to a two-hop entry.
fn process_domainspecific_2hopdata(
    instance: &mut Instance,
    th_idx: TwoHopIndex,
    tlvs: &TlvBlock,
) {
    let Instance {
        arenas, domains, ..
    } = instance;
    let two_hop = &mut arenas.two_hops[th_idx];

    for domain in domains.iter() {
        if !domain.metric.no_default_handling() {
            two_hop.domains[domain.index] = Default::default();
        }
    }

    for tlv in tlvs.iter_type(ADDRTLV_LINK_METRIC) {
        if let Some(domain) = domains.by_ext(tlv.ext)
            && !domain.metric.no_default_handling()
        {
            domain::process_metric_2hoptlv(domain, two_hop, &tlv.value);
        }
    }
}

// ===== phase 2 end: commit and timer reconciliation =====

pub fn pass2_end(
    instance: &mut Instance,
    session: &mut HelloSession,
    dropped: bool,
) -> ConsumerResult {
    if dropped {
        cleanup_error(instance, session);
        return ConsumerResult::Okay;
    }

    let link_idx = session.link.unwrap();
    let nbr_idx = session.neighbor.unwrap();
    let now = instance.clock.now_ms();

    let Instance {
        state,
        arenas,
        domains,
        hysteresis,
        listeners,
        ..
    } = instance;

    // Link addresses this HELLO did not repeat are gone immediately.
    let leftovers: Vec<_> = arenas.links[link_idx]
        .addrs
        .values()
        .copied()
        .filter(|la_idx| arenas.link_addrs[*la_idx].might_be_removed)
        .collect();
    for la_idx in leftovers {
        db::link_addr_remove(arenas, la_idx);
    }

    // Neighbor addresses this HELLO did not repeat enter the LOST
    // grace period; two-hop entries keyed by them go away with the
    // address (RFC 6130 section 12.6.1).
    let n_hold_time = arenas.interfaces[session.iface].config.n_hold_time;
    let leftovers: Vec<_> = arenas.neighbors[nbr_idx]
        .addrs
        .iter()
        .map(|(addr, naddr_idx)| (*addr, *naddr_idx))
        .filter(|(_, naddr_idx)| {
            arenas.neighbor_addrs[*naddr_idx].might_be_removed
        })
        .collect();
    for (addr, naddr_idx) in leftovers {
        db::neighbor_addr_set_lost(
            state,
            arenas,
            naddr_idx,
            now + n_hold_time,
        );
        if let Some(th_idx) = db::link_2hop_get(arenas, link_idx, &addr) {
            db::link_2hop_remove(state, arenas, th_idx);
        }
    }

    let l_hold_time = arenas.interfaces[session.iface].config.l_hold_time;

    // RFC 6130 section 12.5.4: update the link timers.
    if session.link_heard {
        // We have been heard, the link is symmetric.
        db::link_set_sym_time(state, arenas, link_idx, now + session.vtime);
    } else if session.link_lost {
        let sym_active = arenas.links[link_idx]
            .sym_timer
            .is_some_and(|handle| state.timers.is_active(handle));
        if sym_active {
            db::link_stop_sym_time(state, arenas, link_idx);

            // Do not destroy the link right away; keep it around for
            // the hold period if it would still be heard.
            let status = arenas.links[link_idx].calculate_status(
                now,
                &state.timers,
                hysteresis.as_ref(),
            );
            if status == LinkStatus::Heard {
                db::link_set_vtime(state, arenas, link_idx, now + l_hold_time);
            }
        }
    }

    // The link stays heard at least as long as it stays symmetric and
    // at least for the advertised validity time.
    let sym_deadline = arenas.links[link_idx]
        .sym_timer
        .and_then(|handle| state.timers.due(handle));
    let mut t = now + session.vtime;
    if let Some(deadline) = sym_deadline
        && deadline > t
    {
        t = deadline;
    }
    db::link_set_heard_time(state, arenas, link_idx, t);

    // Pending links get no hold-time extension.
    if arenas.links[link_idx].status != LinkStatus::Pending {
        t += l_hold_time;
    }
    let vtime_deadline = arenas.links[link_idx]
        .vtime_timer
        .and_then(|handle| state.timers.due(handle));
    if vtime_deadline.is_none_or(|deadline| t > deadline) {
        db::link_set_vtime(state, arenas, link_idx, t);
    }

    // Commit the identity and the per-domain data.
    db::neighbor_set_originator(state, arenas, nbr_idx, session.originator);
    domain::store_willingness(
        domains,
        &mut arenas.neighbors[nbr_idx],
        &session.willingness,
    );
    domain::neighbor_changed(
        domains,
        &mut arenas.neighbors[nbr_idx],
        &arenas.links,
    );
    arenas.interfaces[session.iface].update_status(&arenas.links);
    db::link_update_status(
        state,
        arenas,
        hysteresis.as_ref(),
        listeners,
        link_idx,
        now,
    );

    ConsumerResult::Okay
}

// ===== error path =====

// Releases every object this session allocated. Adopted objects stay;
// the database ends up exactly as it was at session entry.
pub fn cleanup_error(instance: &mut Instance, session: &mut HelloSession) {
    let Instance {
        state,
        arenas,
        listeners,
        ..
    } = instance;

    for th_idx in std::mem::take(&mut session.created_two_hops) {
        if arenas.two_hops.contains(th_idx) {
            db::link_2hop_remove(state, arenas, th_idx);
        }
    }
    for la_idx in std::mem::take(&mut session.created_laddrs) {
        if arenas.link_addrs.contains(la_idx) {
            db::link_addr_remove(arenas, la_idx);
        }
    }
    if session.created_link
        && let Some(link_idx) = session.link
        && arenas.links.contains(link_idx)
    {
        db::link_remove(state, arenas, listeners, link_idx);
    }
    for naddr_idx in std::mem::take(&mut session.created_naddrs) {
        if arenas.neighbor_addrs.contains(naddr_idx) {
            db::neighbor_addr_remove(state, arenas, naddr_idx);
        }
    }
    if session.created_neighbor
        && let Some(nbr_idx) = session.neighbor
        && arenas.neighbors.contains(nbr_idx)
    {
        db::neighbor_remove(state, arenas, listeners, nbr_idx);
    }

    session.link = None;
    session.neighbor = None;
    session.created_link = false;
    session.created_neighbor = false;
}

// ===== driver =====

// Sequences the consumer callbacks for one decoded HELLO the same way
// the RFC 5444 parser would: message TLVs, pass-1 addresses, pass-1
// end, pass-2 addresses, pass-2 end, with the end callbacks seeing the
// dropped flag when an earlier callback failed.
pub fn process_hello(
    instance: &mut Instance,
    ctx: &RxContext,
    msg: &HelloMsg,
) -> Result<(), Error> {
    Debug::HelloRx(ctx, msg).log();

    let mut session = match message_tlvs(
        instance,
        ctx,
        msg.addr_len,
        msg.originator,
        &msg.tlvs,
    ) {
        Ok(session) => session,
        Err(error) => return Err(drop_message(ctx, error)),
    };

    let mut failure = None;

    for (addr, tlvs) in &msg.addrs {
        match address_pass1(instance, &mut session, addr, tlvs) {
            ConsumerResult::Okay | ConsumerResult::DropAddress => (),
            ConsumerResult::DropMessage(error) => {
                failure = Some(error);
                break;
            }
        }
    }

    match failure {
        None => {
            if let ConsumerResult::DropMessage(error) =
                pass1_end(instance, ctx, &mut session, false)
            {
                failure = Some(error);
            }
        }
        Some(_) => {
            pass1_end(instance, ctx, &mut session, true);
        }
    }

    if failure.is_none() {
        for (addr, tlvs) in &msg.addrs {
            match address_pass2(instance, &mut session, addr, tlvs) {
                ConsumerResult::Okay | ConsumerResult::DropAddress => (),
                ConsumerResult::DropMessage(error) => {
                    failure = Some(error);
                    break;
                }
            }
        }
    }

    if let Some(error) = failure {
        pass2_end(instance, &mut session, true);
        return Err(drop_message(ctx, error));
    }
    if let ConsumerResult::DropMessage(error) =
        pass2_end(instance, &mut session, false)
    {
        cleanup_error(instance, &mut session);
        return Err(drop_message(ctx, error));
    }

    Ok(())
}

fn drop_message(ctx: &RxContext, reason: MessageError) -> Error {
    let error = Error::HelloInputError(ctx.ifname.clone(), ctx.src, reason);
    error.log();
    error
}

// ===== helpers =====

fn read_local_if(tlvs: &TlvBlock) -> Result<Option<LocalIf>, MessageError> {
    match tlvs.get(ADDRTLV_LOCAL_IF, 0) {
        Some(tlv) => {
            let value = tlv.single_value()? & LOCALIF_BITMASK;
            Ok(LocalIf::from_u8(value))
        }
        None => Ok(None),
    }
}

// Returns the masked LINK_STATUS value. Values outside the assigned
// range still count as "present" for the heard/lost detection, matching
// the bitmask treatment of RFC 6130 consumers.
fn read_link_status(tlvs: &TlvBlock) -> Result<Option<u8>, MessageError> {
    match tlvs.get(ADDRTLV_LINK_STATUS, 0) {
        Some(tlv) => Ok(Some(tlv.single_value()? & LINKSTATUS_BITMASK)),
        None => Ok(None),
    }
}
