//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use enum_as_inner::EnumAsInner;
use ipnetwork::IpNetwork;
use num_derive::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};

// Address family of an `Addr` value.
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
#[derive(FromPrimitive, ToPrimitive)]
#[derive(Deserialize, Serialize)]
pub enum AddrFamily {
    #[default]
    Unspec = 0,
    Ipv4 = 1,
    Ipv6 = 2,
    Mac48 = 3,
}

// 48-bit MAC address (IEEE EUI-48 format).
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct MacAddr([u8; 6]);

// Network-layer or link-layer address value.
//
// Covers the address lengths that may appear in neighbor-discovery
// messages (4, 16 and 6 bytes) plus an unspecified sentinel, with a
// total order so values can key ordered maps.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
#[derive(EnumAsInner)]
pub enum Addr {
    #[default]
    Unspec,
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    Mac48(MacAddr),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AddrError {
    BadLength(AddrFamily, usize),
    BadFamily(AddrFamily),
}

// ===== impl AddrFamily =====

impl AddrFamily {
    // Returns the binary length of addresses of this family.
    pub const fn length(&self) -> usize {
        match self {
            AddrFamily::Unspec => 0,
            AddrFamily::Ipv4 => 4,
            AddrFamily::Ipv6 => 16,
            AddrFamily::Mac48 => 6,
        }
    }
}

impl std::fmt::Display for AddrFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddrFamily::Unspec => write!(f, "unspec"),
            AddrFamily::Ipv4 => write!(f, "ipv4"),
            AddrFamily::Ipv6 => write!(f, "ipv6"),
            AddrFamily::Mac48 => write!(f, "mac48"),
        }
    }
}

// ===== impl MacAddr =====

impl MacAddr {
    pub const LENGTH: usize = 6;
    pub const BROADCAST: Self = Self([0xff; 6]);

    pub fn as_bytes(&self) -> [u8; 6] {
        self.0
    }

    pub fn from_slice(buf: &[u8]) -> Result<Self, AddrError> {
        let bytes: [u8; 6] = buf
            .try_into()
            .map_err(|_| AddrError::BadLength(AddrFamily::Mac48, buf.len()))?;
        Ok(MacAddr(bytes))
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(bytes: [u8; 6]) -> Self {
        MacAddr(bytes)
    }
}

impl std::fmt::Display for MacAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5],
        ))
    }
}

// ===== impl Addr =====

impl Addr {
    // Returns the address family of this value.
    pub fn family(&self) -> AddrFamily {
        match self {
            Addr::Unspec => AddrFamily::Unspec,
            Addr::Ipv4(_) => AddrFamily::Ipv4,
            Addr::Ipv6(_) => AddrFamily::Ipv6,
            Addr::Mac48(_) => AddrFamily::Mac48,
        }
    }

    pub fn length(&self) -> usize {
        self.family().length()
    }

    pub fn is_unspecified(&self) -> bool {
        matches!(self, Addr::Unspec)
    }

    // Parses an address of the given family from its binary form.
    pub fn from_binary(
        family: AddrFamily,
        buf: &[u8],
    ) -> Result<Self, AddrError> {
        if buf.len() != family.length() {
            return Err(AddrError::BadLength(family, buf.len()));
        }
        match family {
            AddrFamily::Unspec => Err(AddrError::BadFamily(family)),
            AddrFamily::Ipv4 => {
                let bytes: [u8; 4] = buf.try_into().unwrap();
                Ok(Addr::Ipv4(Ipv4Addr::from(bytes)))
            }
            AddrFamily::Ipv6 => {
                let bytes: [u8; 16] = buf.try_into().unwrap();
                Ok(Addr::Ipv6(Ipv6Addr::from(bytes)))
            }
            AddrFamily::Mac48 => Ok(Addr::Mac48(MacAddr::from_slice(buf)?)),
        }
    }

    // Parses an address from its binary form, inferring the family from
    // the buffer length.
    pub fn from_binary_any(buf: &[u8]) -> Result<Self, AddrError> {
        let family = match buf.len() {
            4 => AddrFamily::Ipv4,
            6 => AddrFamily::Mac48,
            16 => AddrFamily::Ipv6,
            len => return Err(AddrError::BadLength(AddrFamily::Unspec, len)),
        };
        Self::from_binary(family, buf)
    }

    // Emits the binary form of this address.
    pub fn bytes(&self) -> Vec<u8> {
        match self {
            Addr::Unspec => Vec::new(),
            Addr::Ipv4(addr) => addr.octets().to_vec(),
            Addr::Ipv6(addr) => addr.octets().to_vec(),
            Addr::Mac48(addr) => addr.as_bytes().to_vec(),
        }
    }

    // Checks whether this address is contained in the given prefix.
    //
    // Link-layer and unspecified addresses are never contained.
    pub fn covered_by(&self, prefix: &IpNetwork) -> bool {
        match (self, prefix) {
            (Addr::Ipv4(addr), IpNetwork::V4(net)) => net.contains(*addr),
            (Addr::Ipv6(addr), IpNetwork::V6(net)) => net.contains(*addr),
            _ => false,
        }
    }
}

impl From<IpAddr> for Addr {
    fn from(addr: IpAddr) -> Addr {
        match addr {
            IpAddr::V4(addr) => Addr::Ipv4(addr),
            IpAddr::V6(addr) => Addr::Ipv6(addr),
        }
    }
}

impl From<Ipv4Addr> for Addr {
    fn from(addr: Ipv4Addr) -> Addr {
        Addr::Ipv4(addr)
    }
}

impl From<Ipv6Addr> for Addr {
    fn from(addr: Ipv6Addr) -> Addr {
        Addr::Ipv6(addr)
    }
}

impl From<MacAddr> for Addr {
    fn from(addr: MacAddr) -> Addr {
        Addr::Mac48(addr)
    }
}

impl std::fmt::Display for Addr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Addr::Unspec => write!(f, "unspec"),
            Addr::Ipv4(addr) => addr.fmt(f),
            Addr::Ipv6(addr) => addr.fmt(f),
            Addr::Mac48(addr) => addr.fmt(f),
        }
    }
}

// ===== impl AddrError =====

impl std::fmt::Display for AddrError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddrError::BadLength(family, len) => {
                write!(f, "invalid {family} address length: {len}")
            }
            AddrError::BadFamily(family) => {
                write!(f, "invalid address family: {family}")
            }
        }
    }
}

impl std::error::Error for AddrError {}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_by_family() {
        let addr = Addr::from_binary(AddrFamily::Ipv4, &[10, 0, 0, 1]);
        assert_eq!(addr, Ok(Addr::Ipv4(Ipv4Addr::new(10, 0, 0, 1))));
        assert_eq!(addr.unwrap().bytes(), vec![10, 0, 0, 1]);

        assert_eq!(
            Addr::from_binary(AddrFamily::Ipv4, &[10, 0, 0]),
            Err(AddrError::BadLength(AddrFamily::Ipv4, 3))
        );
        assert_eq!(
            Addr::from_binary(AddrFamily::Unspec, &[]),
            Err(AddrError::BadFamily(AddrFamily::Unspec))
        );
    }

    #[test]
    fn parse_by_length() {
        assert_eq!(
            Addr::from_binary_any(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]),
            Ok(Addr::Mac48(MacAddr::from([
                0x00, 0x11, 0x22, 0x33, 0x44, 0x55
            ])))
        );
        assert_eq!(
            Addr::from_binary_any(&[1, 2, 3, 4, 5]),
            Err(AddrError::BadLength(AddrFamily::Unspec, 5))
        );
    }

    #[test]
    fn prefix_containment() {
        let net: IpNetwork = "10.0.0.0/24".parse().unwrap();
        assert!(Addr::from(Ipv4Addr::new(10, 0, 0, 99)).covered_by(&net));
        assert!(!Addr::from(Ipv4Addr::new(10, 0, 1, 1)).covered_by(&net));
        assert!(!Addr::Unspec.covered_by(&net));
    }

    #[test]
    fn display() {
        assert_eq!(
            Addr::from(Ipv4Addr::new(10, 0, 0, 1)).to_string(),
            "10.0.0.1"
        );
        assert_eq!(
            Addr::Mac48(MacAddr::from([0, 0x11, 0x22, 0x33, 0x44, 0x55]))
                .to_string(),
            "00:11:22:33:44:55"
        );
        assert_eq!(Addr::Unspec.to_string(), "unspec");
    }
}
