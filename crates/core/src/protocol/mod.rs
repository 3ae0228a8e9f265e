//! RTP and RTCP wire formats (RFC 3550) and the RTP/RTCP classifier.
//!
//! This module handles the binary packet layer — parsing RTP fixed headers,
//! walking RTCP compound packets, and deciding which of the two protocols a
//! UDP datagram carries when both share one port (RFC 5761).
//!
//! ## Layout
//!
//! | Module | Format | RFC |
//! |--------|--------|-----|
//! | [`rtp`] | RTP fixed header, CSRC list, extension block | [RFC 3550 §5.1](https://tools.ietf.org/html/rfc3550#section-5.1) |
//! | [`rtcp`] | RTCP common header, SR/RR, SDES, BYE, feedback | [RFC 3550 §6](https://tools.ietf.org/html/rfc3550#section-6) |
//! | [`demux`] | RTP vs RTCP multiplexing heuristic | [RFC 5761 §4](https://tools.ietf.org/html/rfc5761#section-4) |
//!
//! All multi-byte fields are network byte order. Conversion goes through
//! the [`be_u16`]/[`be_u32`] read helpers and [`put_u16`]/[`put_u32`] write
//! helpers below — there is no host-endianness branching anywhere in the
//! crate.

pub mod demux;
pub mod rtcp;
pub mod rtp;

pub use demux::{PacketClass, classify};
pub use rtcp::{CompoundPacket, RtcpPacket};
pub use rtp::{RtpHeader, RtpPacket};

/// Read a big-endian u16 at `at`, or `None` past the end of `buf`.
#[inline]
pub(crate) fn be_u16(buf: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_be_bytes([*buf.get(at)?, *buf.get(at + 1)?]))
}

/// Read a big-endian u32 at `at`, or `None` past the end of `buf`.
#[inline]
pub(crate) fn be_u32(buf: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_be_bytes([
        *buf.get(at)?,
        *buf.get(at + 1)?,
        *buf.get(at + 2)?,
        *buf.get(at + 3)?,
    ]))
}

/// Append a u16 in network byte order.
#[inline]
pub(crate) fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Append a u32 in network byte order.
#[inline]
pub(crate) fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn be_readers_in_bounds() {
        let buf = [0x12, 0x34, 0x56, 0x78, 0x9A];
        assert_eq!(be_u16(&buf, 0), Some(0x1234));
        assert_eq!(be_u16(&buf, 3), Some(0x789A));
        assert_eq!(be_u32(&buf, 1), Some(0x3456789A));
    }

    #[test]
    fn be_readers_out_of_bounds() {
        let buf = [0x12, 0x34, 0x56];
        assert_eq!(be_u16(&buf, 2), None);
        assert_eq!(be_u32(&buf, 0), None);
    }

    #[test]
    fn writers_round_trip() {
        let mut out = Vec::new();
        put_u16(&mut out, 0xABCD);
        put_u32(&mut out, 0x01020304);
        assert_eq!(out, [0xAB, 0xCD, 0x01, 0x02, 0x03, 0x04]);
        assert_eq!(be_u16(&out, 0), Some(0xABCD));
        assert_eq!(be_u32(&out, 2), Some(0x01020304));
    }
}
