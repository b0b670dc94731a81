//! Device and peer addresses.
//!
//! Addresses are stored the way the controller hands them over: byte 0 is
//! the least significant. The human-readable form reverses that order.

use core::fmt::{self, Write};

use heapless::String;

/// `XX:XX:XX:XX:XX:XX`
pub const ADDR_STR_LEN: usize = 17;

pub type AddrString = String<ADDR_STR_LEN>;

/// Own/peer address type as understood by the link layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum AddrKind {
    #[default]
    Public = 0,
    Random = 1,
    /// Resolvable private address, public identity fallback.
    RpaPublic = 2,
    /// Resolvable private address, random identity fallback.
    RpaRandom = 3,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Address {
    pub kind: AddrKind,
    pub bytes: [u8; 6],
}

impl Address {
    pub const fn new(kind: AddrKind, bytes: [u8; 6]) -> Self {
        Self { kind, bytes }
    }

    pub fn to_addr_string(&self) -> AddrString {
        format_address(&self.bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_address(f, &self.bytes)
    }
}

/// Render `bytes` as colon-separated uppercase hex, most significant first.
pub fn format_address(bytes: &[u8; 6]) -> AddrString {
    let mut s = AddrString::new();
    // 17 chars always fit.
    let _ = write_address(&mut s, bytes);
    s
}

fn write_address<W: Write>(w: &mut W, bytes: &[u8; 6]) -> fmt::Result {
    for (i, b) in bytes.iter().rev().enumerate() {
        if i > 0 {
            w.write_char(':')?;
        }
        write!(w, "{:02X}", b)?;
    }
    Ok(())
}
