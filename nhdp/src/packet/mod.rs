//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod consts;
pub mod tlv;

use std::net::SocketAddr;

use bytes::Bytes;
use derive_new::new;
use nhdp_utils::addr::Addr;
use serde::{Deserialize, Serialize};

use crate::error::MessageError;

// One TLV as delivered by the RFC 5444 parser: type, type extension and
// raw value octets.
#[derive(Clone, Debug, Eq, PartialEq, new)]
#[derive(Deserialize, Serialize)]
pub struct Tlv {
    pub typ: u8,
    pub ext: u8,
    pub value: Bytes,
}

// The set of TLVs attached to a message or to a single address.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct TlvBlock(pub Vec<Tlv>);

// A decoded HELLO as the external RFC 5444 parser presents it: the
// message header fields the reader consumes, the message TLV block and
// the flattened address blocks with their TLVs.
#[derive(Clone, Debug, new)]
#[derive(Deserialize, Serialize)]
pub struct HelloMsg {
    pub addr_len: u8,
    pub originator: Option<Addr>,
    pub tlvs: TlvBlock,
    pub addrs: Vec<(Addr, TlvBlock)>,
}

// Receive-path context supplied by the packet socket layer.
#[derive(Clone, Debug, new)]
pub struct RxContext {
    pub ifname: String,
    pub src: SocketAddr,
}

// Outcome of a single consumer callback, mirroring the result codes the
// RFC 5444 parser understands.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConsumerResult {
    Okay,
    DropAddress,
    DropMessage(MessageError),
}

// One TLV the consumer asks the parser to collect.
#[derive(Clone, Copy, Debug)]
pub struct TlvFilter {
    pub typ: u8,
    pub ext: u8,
    pub match_ext: bool,
    pub mandatory: bool,
    pub min_length: usize,
}

// Registration template for one tlvblock consumer. Consumers with a
// higher order run after lower ones for the same message.
#[derive(Clone, Copy, Debug)]
pub struct ConsumerTemplate {
    pub msg_type: u8,
    pub order: i32,
    pub address_block: bool,
    pub filters: &'static [TlvFilter],
}

// ===== impl TlvBlock =====

impl TlvBlock {
    // Returns the first TLV with the given type and type extension.
    pub fn get(&self, typ: u8, ext: u8) -> Option<&Tlv> {
        self.0.iter().find(|tlv| tlv.typ == typ && tlv.ext == ext)
    }

    // Returns the first TLV with the given type, any extension.
    pub fn get_type(&self, typ: u8) -> Option<&Tlv> {
        self.0.iter().find(|tlv| tlv.typ == typ)
    }

    // Iterates over all TLVs with the given type.
    pub fn iter_type(&self, typ: u8) -> impl Iterator<Item = &Tlv> {
        self.0.iter().filter(move |tlv| tlv.typ == typ)
    }

    pub fn push(&mut self, tlv: Tlv) {
        self.0.push(tlv);
    }
}

impl From<Vec<Tlv>> for TlvBlock {
    fn from(tlvs: Vec<Tlv>) -> TlvBlock {
        TlvBlock(tlvs)
    }
}

// ===== impl Tlv =====

impl Tlv {
    // Returns the value, checked against a minimum length.
    pub fn value_checked(&self, min_length: usize) -> Result<&[u8], MessageError> {
        if self.value.len() < min_length {
            return Err(MessageError::BadTlvLength(self.typ, self.value.len()));
        }
        Ok(&self.value)
    }

    // Returns the first value octet of a single-value TLV.
    pub fn single_value(&self) -> Result<u8, MessageError> {
        self.value_checked(1).map(|value| value[0])
    }
}
