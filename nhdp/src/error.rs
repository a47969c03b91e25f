//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::SocketAddr;

use nhdp_utils::addr::{Addr, AddrError};
use tracing::{info, info_span, warn};

use crate::collections::{LinkId, NeighborAddrId, NeighborId, TwoHopId};

// NHDP errors.
#[derive(Debug)]
pub enum Error {
    // Inter-task communication
    InterfaceNotFound(String),
    NeighborIdNotFound(NeighborId),
    NeighborAddrIdNotFound(NeighborAddrId),
    LinkIdNotFound(LinkId),
    TwoHopIdNotFound(TwoHopId),
    // Database constraints
    AddressConflict(Addr),
    DomainExists(u8),
    DomainLimitReached(u8),
    // Message input
    HelloInputError(String, SocketAddr, MessageError),
}

// Reasons a received HELLO is dropped.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MessageError {
    UnsupportedAddressLength(u8),
    NoInterface(String),
    MissingValidityTime,
    BadTlvLength(u8, usize),
    BadAddress(AddrError),
    FailedConstraints,
}

// ===== impl Error =====

impl Error {
    pub(crate) fn log(&self) {
        match self {
            Error::InterfaceNotFound(name) => {
                warn!(%name, "{}", self);
            }
            Error::NeighborIdNotFound(nbr_id) => {
                warn!(?nbr_id, "{}", self);
            }
            Error::NeighborAddrIdNotFound(naddr_id) => {
                warn!(?naddr_id, "{}", self);
            }
            Error::LinkIdNotFound(link_id) => {
                warn!(?link_id, "{}", self);
            }
            Error::TwoHopIdNotFound(th_id) => {
                warn!(?th_id, "{}", self);
            }
            Error::AddressConflict(addr) => {
                warn!(%addr, "{}", self);
            }
            Error::DomainExists(ext) | Error::DomainLimitReached(ext) => {
                warn!(%ext, "{}", self);
            }
            Error::HelloInputError(ifname, source, error) => {
                // Dropped HELLOs are expected operational events, not
                // faults.
                info_span!("interface", name = %ifname, %source).in_scope(
                    || {
                        info!(reason = %error, "{}", self);
                    },
                )
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InterfaceNotFound(..) => {
                write!(f, "interface not found")
            }
            Error::NeighborIdNotFound(..) => {
                write!(f, "neighbor ID not found")
            }
            Error::NeighborAddrIdNotFound(..) => {
                write!(f, "neighbor address ID not found")
            }
            Error::LinkIdNotFound(..) => {
                write!(f, "link ID not found")
            }
            Error::TwoHopIdNotFound(..) => {
                write!(f, "two-hop entry ID not found")
            }
            Error::AddressConflict(..) => {
                write!(f, "address already owned by another neighbor")
            }
            Error::DomainExists(..) => {
                write!(f, "domain extension already registered")
            }
            Error::DomainLimitReached(..) => {
                write!(f, "too many routing domains")
            }
            Error::HelloInputError(..) => {
                write!(f, "dropped HELLO message")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::HelloInputError(_, _, error) => Some(error),
            _ => None,
        }
    }
}

// ===== impl MessageError =====

impl std::fmt::Display for MessageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageError::UnsupportedAddressLength(addr_len) => {
                write!(f, "unsupported address length {addr_len}")
            }
            MessageError::NoInterface(ifname) => {
                write!(f, "no active interface {ifname}")
            }
            MessageError::MissingValidityTime => {
                write!(f, "missing VALIDITY_TIME TLV")
            }
            MessageError::BadTlvLength(typ, len) => {
                write!(f, "TLV type {typ} with invalid length {len}")
            }
            MessageError::BadAddress(error) => error.fmt(f),
            MessageError::FailedConstraints => {
                write!(f, "message failed parser constraints")
            }
        }
    }
}

impl std::error::Error for MessageError {}

impl From<AddrError> for MessageError {
    fn from(error: AddrError) -> MessageError {
        MessageError::BadAddress(error)
    }
}
