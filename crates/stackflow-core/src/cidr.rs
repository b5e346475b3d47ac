//! IPv4 CIDR value object
//!
//! Address blocks stay as literal strings in the model; they are parsed
//! into [`Ipv4Cidr`] when the stack is validated.

use crate::error::{Result, StackError};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// IPv4 address block in CIDR notation (e.g. `10.0.0.0/16`)
///
/// Invariants:
/// - prefix length is 0-32
/// - no host bits are set (`10.0.1.5/24` is rejected)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Cidr {
    network: Ipv4Addr,
    prefix_len: u8,
}

impl Ipv4Cidr {
    pub fn new(network: Ipv4Addr, prefix_len: u8) -> Result<Self> {
        if prefix_len > 32 {
            return Err(StackError::InvalidCidr(format!(
                "{}/{}: prefix length must be 0-32",
                network, prefix_len
            )));
        }

        if u32::from(network) & !mask(prefix_len) != 0 {
            return Err(StackError::InvalidCidr(format!(
                "{}/{}: host bits are set",
                network, prefix_len
            )));
        }

        Ok(Self {
            network,
            prefix_len,
        })
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Whether `other` lies entirely inside this block
    pub fn contains(&self, other: &Ipv4Cidr) -> bool {
        other.prefix_len >= self.prefix_len
            && u32::from(other.network) & mask(self.prefix_len) == u32::from(self.network)
    }

    pub fn overlaps(&self, other: &Ipv4Cidr) -> bool {
        self.contains(other) || other.contains(self)
    }
}

fn mask(prefix_len: u8) -> u32 {
    match prefix_len {
        0 => 0,
        n => u32::MAX << (32 - u32::from(n)),
    }
}

impl FromStr for Ipv4Cidr {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self> {
        let (addr, prefix) = s
            .split_once('/')
            .ok_or_else(|| StackError::InvalidCidr(format!("{}: missing prefix length", s)))?;

        let network = Ipv4Addr::from_str(addr)
            .map_err(|_| StackError::InvalidCidr(format!("{}: invalid IPv4 address", s)))?;
        let prefix_len = prefix
            .parse::<u8>()
            .map_err(|_| StackError::InvalidCidr(format!("{}: invalid prefix length", s)))?;

        Self::new(network, prefix_len)
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}
