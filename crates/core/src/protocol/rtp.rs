use crate::error::{HeaderErrorKind, Result, RtpError};
use crate::protocol::{be_u16, be_u32, put_u16, put_u32};

/// Length of the RTP fixed header (RFC 3550 §5.1).
pub const MIN_HEADER_LEN: usize = 12;

/// Parsed RTP fixed header (RFC 3550 §5.1).
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |V=2|P|X|  CC   |M|     PT      |       Sequence Number         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           Timestamp                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                             SSRC                              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |            CSRC identifiers (0..15 × 32 bits)                 |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// When X is set, a header extension follows the CSRC list: a 16-bit
/// profile identifier, a 16-bit length in 32-bit words, then that many
/// words of data (RFC 3550 §5.3.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpHeader {
    /// Padding flag — trailing padding octets follow the payload.
    pub padding: bool,
    /// Marker bit; video profiles set it on the last packet of a frame.
    pub marker: bool,
    /// RTP payload type (7-bit, RFC 3551).
    pub payload_type: u8,
    /// 16-bit wrapping sequence number.
    pub sequence_number: u16,
    /// Media clock timestamp (90 kHz for video).
    pub timestamp: u32,
    /// Synchronization source identifier.
    pub ssrc: u32,
    /// Contributing source identifiers (up to 15).
    pub csrc: Vec<u32>,
}

/// RTP header extension carried between the CSRC list and the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extension<'a> {
    /// Profile-defined identifier.
    pub profile: u16,
    /// Extension data, a whole number of 32-bit words.
    pub data: &'a [u8],
}

/// A parsed RTP packet borrowing from the datagram it was read from.
///
/// `payload` is a sub-slice of the input — the fixed header, CSRC list,
/// extension block, and trailing padding are all excluded without copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket<'a> {
    pub header: RtpHeader,
    /// Header extension, when the X bit was set.
    pub extension: Option<Extension<'a>>,
    /// Codec payload bytes, handed verbatim to the depacketizer.
    pub payload: &'a [u8],
}

impl<'a> RtpPacket<'a> {
    /// Parse an RTP datagram.
    ///
    /// Fails with [`RtpError::MalformedHeader`] when the datagram is
    /// shorter than 12 bytes, the version is not 2, or the CSRC list,
    /// extension block, or padding count runs past the end.
    pub fn parse(datagram: &'a [u8]) -> Result<Self> {
        let malformed = |kind| RtpError::MalformedHeader { kind };

        if datagram.len() < MIN_HEADER_LEN {
            return Err(malformed(HeaderErrorKind::Truncated));
        }

        let b0 = datagram[0];
        if b0 >> 6 != 2 {
            return Err(malformed(HeaderErrorKind::BadVersion));
        }
        let padding = b0 & 0x20 != 0;
        let has_extension = b0 & 0x10 != 0;
        let csrc_count = (b0 & 0x0F) as usize;

        let b1 = datagram[1];
        let marker = b1 & 0x80 != 0;
        let payload_type = b1 & 0x7F;

        // Fixed fields are in bounds after the length check above.
        let sequence_number = u16::from_be_bytes([datagram[2], datagram[3]]);
        let timestamp = u32::from_be_bytes([datagram[4], datagram[5], datagram[6], datagram[7]]);
        let ssrc = u32::from_be_bytes([datagram[8], datagram[9], datagram[10], datagram[11]]);

        let mut offset = MIN_HEADER_LEN;
        let mut csrc = Vec::with_capacity(csrc_count);
        for _ in 0..csrc_count {
            let id = be_u32(datagram, offset).ok_or(malformed(HeaderErrorKind::TruncatedCsrcList))?;
            csrc.push(id);
            offset += 4;
        }

        let extension = if has_extension {
            let profile =
                be_u16(datagram, offset).ok_or(malformed(HeaderErrorKind::TruncatedExtension))?;
            let words =
                be_u16(datagram, offset + 2).ok_or(malformed(HeaderErrorKind::TruncatedExtension))?;
            let data_len = words as usize * 4;
            let data = datagram
                .get(offset + 4..offset + 4 + data_len)
                .ok_or(malformed(HeaderErrorKind::TruncatedExtension))?;
            offset += 4 + data_len;
            Some(Extension { profile, data })
        } else {
            None
        };

        let mut end = datagram.len();
        if padding {
            let pad = datagram[end - 1] as usize;
            if pad == 0 || pad > end - offset {
                return Err(malformed(HeaderErrorKind::BadPadding));
            }
            end -= pad;
        }

        Ok(Self {
            header: RtpHeader {
                padding,
                marker,
                payload_type,
                sequence_number,
                timestamp,
                ssrc,
                csrc,
            },
            extension,
            payload: &datagram[offset..end],
        })
    }
}

impl RtpHeader {
    /// Serialize the fixed header and CSRC list.
    ///
    /// The extension bit is set when `extension` carries data; the caller
    /// appends the profile, word length, extension words, and payload.
    pub fn write(&self, has_extension: bool) -> Vec<u8> {
        let mut out = Vec::with_capacity(MIN_HEADER_LEN + self.csrc.len() * 4);
        out.push(
            (2 << 6)
                | ((self.padding as u8) << 5)
                | ((has_extension as u8) << 4)
                | (self.csrc.len() as u8 & 0x0F),
        );
        out.push(((self.marker as u8) << 7) | (self.payload_type & 0x7F));
        put_u16(&mut out, self.sequence_number);
        put_u32(&mut out, self.timestamp);
        put_u32(&mut out, self.ssrc);
        for id in &self.csrc {
            put_u32(&mut out, *id);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_header() -> RtpHeader {
        RtpHeader {
            padding: false,
            marker: true,
            payload_type: 96,
            sequence_number: 4660,
            timestamp: 90_000,
            ssrc: 0xAABBCCDD,
            csrc: Vec::new(),
        }
    }

    fn datagram(header: &RtpHeader, payload: &[u8]) -> Vec<u8> {
        let mut out = header.write(false);
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn parse_fixed_header() {
        let buf = datagram(&make_header(), &[0xDE, 0xAD]);
        let packet = RtpPacket::parse(&buf).unwrap();
        assert!(packet.header.marker);
        assert_eq!(packet.header.payload_type, 96);
        assert_eq!(packet.header.sequence_number, 4660);
        assert_eq!(packet.header.timestamp, 90_000);
        assert_eq!(packet.header.ssrc, 0xAABBCCDD);
        assert_eq!(packet.payload, &[0xDE, 0xAD]);
    }

    #[test]
    fn reject_short_datagram() {
        let err = RtpPacket::parse(&[0x80; 11]).unwrap_err();
        assert!(matches!(
            err,
            RtpError::MalformedHeader {
                kind: HeaderErrorKind::Truncated
            }
        ));
    }

    #[test]
    fn reject_bad_version() {
        let mut buf = datagram(&make_header(), &[]);
        buf[0] = 0x40 | (buf[0] & 0x3F);
        let err = RtpPacket::parse(&buf).unwrap_err();
        assert!(matches!(
            err,
            RtpError::MalformedHeader {
                kind: HeaderErrorKind::BadVersion
            }
        ));
    }

    #[test]
    fn parse_csrc_list() {
        let mut header = make_header();
        header.csrc = vec![0x11111111, 0x22222222, 0x33333333];
        let buf = datagram(&header, &[0x01]);
        let packet = RtpPacket::parse(&buf).unwrap();
        assert_eq!(packet.header.csrc, header.csrc);
        assert_eq!(packet.payload, &[0x01]);
    }

    #[test]
    fn reject_truncated_csrc_list() {
        let mut buf = make_header().write(false);
        buf[0] |= 0x02; // CC = 2, but no CSRC words follow
        let err = RtpPacket::parse(&buf).unwrap_err();
        assert!(matches!(
            err,
            RtpError::MalformedHeader {
                kind: HeaderErrorKind::TruncatedCsrcList
            }
        ));
    }

    #[test]
    fn parse_extension_block() {
        let mut buf = make_header().write(true);
        put_u16(&mut buf, 0xBEDE);
        put_u16(&mut buf, 2);
        buf.extend_from_slice(&[0xA0, 0xA1, 0xA2, 0xA3, 0xB0, 0xB1, 0xB2, 0xB3]);
        buf.extend_from_slice(&[0x55, 0x66]);

        let packet = RtpPacket::parse(&buf).unwrap();
        let ext = packet.extension.unwrap();
        assert_eq!(ext.profile, 0xBEDE);
        assert_eq!(ext.data.len(), 8);
        assert_eq!(packet.payload, &[0x55, 0x66]);
    }

    #[test]
    fn reject_truncated_extension() {
        let mut buf = make_header().write(true);
        put_u16(&mut buf, 0xBEDE);
        put_u16(&mut buf, 4); // claims 16 bytes, none follow
        let err = RtpPacket::parse(&buf).unwrap_err();
        assert!(matches!(
            err,
            RtpError::MalformedHeader {
                kind: HeaderErrorKind::TruncatedExtension
            }
        ));
    }

    #[test]
    fn padding_stripped_from_payload() {
        let mut header = make_header();
        header.padding = true;
        let mut buf = header.write(false);
        buf.extend_from_slice(&[0x10, 0x20, 0x30]);
        buf.extend_from_slice(&[0x00, 0x00, 0x00, 0x04]); // 4 padding octets
        let packet = RtpPacket::parse(&buf).unwrap();
        assert_eq!(packet.payload, &[0x10, 0x20, 0x30]);
    }

    #[test]
    fn reject_padding_count_of_zero() {
        let mut header = make_header();
        header.padding = true;
        let mut buf = header.write(false);
        buf.extend_from_slice(&[0x10, 0x00]);
        let err = RtpPacket::parse(&buf).unwrap_err();
        assert!(matches!(
            err,
            RtpError::MalformedHeader {
                kind: HeaderErrorKind::BadPadding
            }
        ));
    }

    #[test]
    fn reject_padding_larger_than_payload() {
        let mut header = make_header();
        header.padding = true;
        let mut buf = header.write(false);
        buf.extend_from_slice(&[0x10, 0xFF]);
        let err = RtpPacket::parse(&buf).unwrap_err();
        assert!(matches!(
            err,
            RtpError::MalformedHeader {
                kind: HeaderErrorKind::BadPadding
            }
        ));
    }

    // Every legal CSRC count with an extension block yields a payload slice
    // byte-identical to the datagram's payload region.
    #[test]
    fn payload_slice_exact_for_all_csrc_counts() {
        let payload = [0xC0, 0xC1, 0xC2, 0xC3, 0xC4];
        for count in 0..=15u32 {
            let mut header = make_header();
            header.csrc = (0..count).collect();

            let mut buf = header.write(true);
            put_u16(&mut buf, 0x1000);
            put_u16(&mut buf, 1);
            buf.extend_from_slice(&[0xEE; 4]);
            let payload_offset = buf.len();
            buf.extend_from_slice(&payload);

            let packet = RtpPacket::parse(&buf).unwrap();
            assert_eq!(packet.header.csrc.len(), count as usize);
            assert_eq!(packet.payload, &buf[payload_offset..]);
        }
    }

    #[test]
    fn write_parse_round_trip() {
        let mut header = make_header();
        header.csrc = vec![7, 8];
        let buf = datagram(&header, &[1, 2, 3]);
        let packet = RtpPacket::parse(&buf).unwrap();
        assert_eq!(packet.header, header);
    }
}
