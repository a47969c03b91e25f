//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use bitflags::bitflags;
use num_derive::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};

// IANA registered protocol/port numbers and multicast groups for MANET
// control traffic (RFC 5498).
pub const MANET_IPPROTO: u8 = 138;
pub const MANET_UDP_PORT: u16 = 269;
pub const MANET_MULTICAST_V4: std::net::Ipv4Addr =
    std::net::Ipv4Addr::new(224, 0, 0, 109);
pub const MANET_MULTICAST_V6: std::net::Ipv6Addr =
    std::net::Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 0x6d);

// Globally assigned RFC 5444 message types.
//
// IANA registry:
// https://www.iana.org/assignments/manet-parameters
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[derive(FromPrimitive, ToPrimitive)]
#[derive(Deserialize, Serialize)]
pub enum MessageType {
    // RFC 6130 (NHDP)
    Hello = 0,
    // RFC 7181 (OLSRv2)
    Tc = 1,
}

// Message TLV types consumed by the HELLO reader.
//
// MPR_WILLING and MPR_TYPES share type 7 and are told apart by the type
// extension, so plain constants are used instead of an enum.
pub const MSGTLV_INTERVAL_TIME: u8 = 0; // RFC 5497
pub const MSGTLV_VALIDITY_TIME: u8 = 1; // RFC 5497
pub const MSGTLV_MPR_WILLING: u8 = 7; // RFC 7181, ext 0
pub const MSGTLV_MPR_TYPES: u8 = 7; // multi-topology draft, ext 1
pub const MSGTLV_MPR_TYPES_EXT: u8 = 1;
pub const MSGTLV_IPV4_ORIGINATOR: u8 = 226;
pub const MSGTLV_MAC: u8 = 227;

// Address TLV types consumed by the HELLO reader.
pub const ADDRTLV_LOCAL_IF: u8 = 2; // RFC 6130
pub const ADDRTLV_LINK_STATUS: u8 = 3; // RFC 6130
pub const ADDRTLV_OTHER_NEIGHB: u8 = 4; // RFC 6130
pub const ADDRTLV_LINK_METRIC: u8 = 7; // RFC 7181
pub const ADDRTLV_MPR: u8 = 8; // RFC 7181

// Value bits of the LOCAL_IF address TLV.
pub const LOCALIF_BITMASK: u8 = 0x01;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[derive(FromPrimitive, ToPrimitive)]
#[derive(Deserialize, Serialize)]
pub enum LocalIf {
    ThisIf = 0,
    OtherIf = 1,
}

// Value bits of the LINK_STATUS address TLV.
pub const LINKSTATUS_BITMASK: u8 = 0x03;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[derive(FromPrimitive, ToPrimitive)]
#[derive(Deserialize, Serialize)]
pub enum TlvLinkStatus {
    Lost = 0,
    Symmetric = 1,
    Heard = 2,
}

// Value bits of the OTHER_NEIGHB address TLV.
pub const OTHERNEIGHB_SYMMETRIC: u8 = 0x01;

bitflags! {
    // Value bits of the MPR address TLV.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    #[serde(transparent)]
    pub struct MprFlags: u8 {
        const FLOODING = 0x01;
        const ROUTING = 0x02;
    }
}

bitflags! {
    // Direction selector in the first value byte of the LINK_METRIC
    // address TLV.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    #[serde(transparent)]
    pub struct LinkMetricFlags: u8 {
        const INCOMING_LINK = 0x80;
        const OUTGOING_LINK = 0x40;
        const INCOMING_NEIGH = 0x20;
        const OUTGOING_NEIGH = 0x10;
    }
}

// MPR willingness values (RFC 7181).
pub const WILLINGNESS_NEVER: u8 = 0;
pub const WILLINGNESS_DEFAULT: u8 = 7;
pub const WILLINGNESS_ALWAYS: u8 = 15;
pub const WILLINGNESS_MASK: u8 = 0x0f;
pub const WILLINGNESS_SHIFT: u8 = 4;

// Maximum encodable link metric, used as "no metric known" (RFC 7181).
pub const METRIC_INFINITE: u32 = 0xffff00;

// Upper bound on concurrently registered routing domains
// (multi-topology draft).
pub const MAXIMUM_DOMAINS: usize = 8;
