use crate::error::{Result, RtcpErrorKind, RtpError};
use crate::protocol::be_u32;

/// Length of the RTCP common header (RFC 3550 §6.4.1).
pub const COMMON_HEADER_LEN: usize = 4;

/// Length of one reception report block (RFC 3550 §6.4.1).
pub const REPORT_BLOCK_LEN: usize = 24;

/// Length of the sender-info section of an SR (RFC 3550 §6.4.1).
pub const SENDER_INFO_LEN: usize = 20;

/// RTCP packet types carried in the second byte of the common header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtcpPacketType {
    /// Sender report (200).
    SenderReport,
    /// Receiver report (201).
    ReceiverReport,
    /// Source description (202).
    SourceDescription,
    /// Goodbye (203).
    Bye,
    /// Application-defined (204).
    App,
    /// Transport-layer feedback, RFC 4585 (205).
    TransportFeedback,
    /// Payload-specific feedback, RFC 4585 (206).
    PayloadFeedback,
}

impl RtcpPacketType {
    /// Map the wire byte to a known packet type.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            200 => Some(Self::SenderReport),
            201 => Some(Self::ReceiverReport),
            202 => Some(Self::SourceDescription),
            203 => Some(Self::Bye),
            204 => Some(Self::App),
            205 => Some(Self::TransportFeedback),
            206 => Some(Self::PayloadFeedback),
            _ => None,
        }
    }
}

/// RTCP common header (RFC 3550 §6.4.1).
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |V=2|P|    RC   |      PT       |             length            |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// `count` is the reception-report or source count; for the feedback types
/// 205/206 the same five bits carry the feedback message type instead
/// (RFC 4585 §6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtcpHeader {
    pub padding: bool,
    /// RC / SC, or FMT for packet types 205 and 206.
    pub count: u8,
    /// Raw packet-type byte.
    pub packet_type: u8,
    /// Packet length in 32-bit words minus one.
    pub length_words: u16,
}

impl RtcpHeader {
    /// Parse the 4-byte common header.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < COMMON_HEADER_LEN {
            return Err(RtpError::MalformedRtcp {
                kind: RtcpErrorKind::Truncated,
            });
        }
        if buf[0] >> 6 != 2 {
            return Err(RtpError::MalformedRtcp {
                kind: RtcpErrorKind::BadVersion,
            });
        }
        Ok(Self {
            padding: buf[0] & 0x20 != 0,
            count: buf[0] & 0x1F,
            packet_type: buf[1],
            length_words: u16::from_be_bytes([buf[2], buf[3]]),
        })
    }

    /// Total packet length in bytes, header included.
    pub fn packet_len(&self) -> usize {
        (self.length_words as usize + 1) * 4
    }
}

/// One reception report block (RFC 3550 §6.4.1).
///
/// ```text
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                 SSRC_n (SSRC of source)                       |  0
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// | fraction lost |       cumulative number of packets lost       |  4
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |           extended highest sequence number received           |  8
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                      interarrival jitter                      | 12
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                         last SR (LSR)                         | 16
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                   delay since last SR (DLSR)                  | 20
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportBlock {
    pub ssrc: u32,
    pub fraction_lost: u8,
    /// Signed 24-bit cumulative loss, sign-extended.
    pub packets_lost: i32,
    pub highest_sequence: u32,
    pub jitter: u32,
    pub last_sr: u32,
    pub delay_since_last_sr: u32,
}

impl ReportBlock {
    /// Parse a 24-byte report block.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < REPORT_BLOCK_LEN {
            return Err(RtpError::MalformedRtcp {
                kind: RtcpErrorKind::Truncated,
            });
        }
        let lost_raw = u32::from_be_bytes([0, buf[5], buf[6], buf[7]]);
        let packets_lost = if lost_raw & 0x0080_0000 != 0 {
            (lost_raw | 0xFF00_0000) as i32
        } else {
            lost_raw as i32
        };
        Ok(Self {
            ssrc: u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            fraction_lost: buf[4],
            packets_lost,
            highest_sequence: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
            jitter: u32::from_be_bytes([buf[12], buf[13], buf[14], buf[15]]),
            last_sr: u32::from_be_bytes([buf[16], buf[17], buf[18], buf[19]]),
            delay_since_last_sr: u32::from_be_bytes([buf[20], buf[21], buf[22], buf[23]]),
        })
    }
}

/// Sender-info section of an SR (RFC 3550 §6.4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderInfo {
    pub ntp_seconds: u32,
    pub ntp_fraction: u32,
    pub rtp_timestamp: u32,
    pub packet_count: u32,
    pub octet_count: u32,
}

/// Sender report (RFC 3550 §6.4.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderReport {
    pub ssrc: u32,
    pub info: SenderInfo,
    pub reports: Vec<ReportBlock>,
}

/// Receiver report (RFC 3550 §6.4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverReport {
    pub ssrc: u32,
    pub reports: Vec<ReportBlock>,
}

/// Goodbye packet (RFC 3550 §6.6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bye {
    pub ssrcs: Vec<u32>,
    /// Optional length-prefixed reason text.
    pub reason: Option<String>,
}

/// One packet inside an RTCP compound datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RtcpPacket {
    SenderReport(SenderReport),
    ReceiverReport(ReceiverReport),
    /// SDES, reduced to the chunk SSRCs — item text is not retained.
    SourceDescription { ssrcs: Vec<u32> },
    Bye(Bye),
    /// RTPFB (205) or PSFB (206), RFC 4585 §6.1.
    Feedback {
        packet_type: RtcpPacketType,
        /// Feedback message type from the count field.
        fmt: u8,
        sender_ssrc: u32,
        media_ssrc: u32,
    },
    /// Recognized header, payload not interpreted.
    Other { packet_type: u8 },
}

/// A parsed RTCP compound datagram (RFC 3550 §6.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundPacket {
    pub packets: Vec<RtcpPacket>,
}

impl CompoundPacket {
    /// Walk the word-length-delimited chunks of a compound datagram.
    ///
    /// Fails with [`RtpError::MalformedRtcp`] when a chunk header is bad or
    /// its declared length runs past the datagram end; chunk *bodies* are
    /// parsed leniently (a truncated SDES item list terminates the chunk).
    pub fn parse(datagram: &[u8]) -> Result<Self> {
        let mut packets = Vec::new();
        let mut offset = 0;

        while offset < datagram.len() {
            let header = RtcpHeader::parse(&datagram[offset..])?;
            let total = header.packet_len();
            let chunk = datagram
                .get(offset + COMMON_HEADER_LEN..offset + total)
                .ok_or(RtpError::MalformedRtcp {
                    kind: RtcpErrorKind::BadLength,
                })?;

            // Padding is only legal on the last packet of the compound;
            // strip it from whichever chunk carries the flag.
            let body = if header.padding {
                let pad = chunk.last().copied().unwrap_or(0) as usize;
                if pad == 0 || pad > chunk.len() {
                    return Err(RtpError::MalformedRtcp {
                        kind: RtcpErrorKind::BadLength,
                    });
                }
                &chunk[..chunk.len() - pad]
            } else {
                chunk
            };

            packets.push(parse_body(&header, body));
            offset += total;
        }

        Ok(Self { packets })
    }
}

fn parse_body(header: &RtcpHeader, body: &[u8]) -> RtcpPacket {
    match RtcpPacketType::from_u8(header.packet_type) {
        Some(RtcpPacketType::SenderReport) => parse_sender_report(header, body),
        Some(RtcpPacketType::ReceiverReport) => parse_receiver_report(header, body),
        Some(RtcpPacketType::SourceDescription) => RtcpPacket::SourceDescription {
            ssrcs: parse_sdes_ssrcs(header, body),
        },
        Some(RtcpPacketType::Bye) => RtcpPacket::Bye(parse_bye(header, body)),
        Some(pt @ (RtcpPacketType::TransportFeedback | RtcpPacketType::PayloadFeedback)) => {
            match (be_u32(body, 0), be_u32(body, 4)) {
                (Some(sender_ssrc), Some(media_ssrc)) => RtcpPacket::Feedback {
                    packet_type: pt,
                    fmt: header.count,
                    sender_ssrc,
                    media_ssrc,
                },
                _ => RtcpPacket::Other {
                    packet_type: header.packet_type,
                },
            }
        }
        _ => RtcpPacket::Other {
            packet_type: header.packet_type,
        },
    }
}

fn parse_report_blocks(count: u8, buf: &[u8]) -> Vec<ReportBlock> {
    let mut reports = Vec::with_capacity(count as usize);
    for i in 0..count as usize {
        let at = i * REPORT_BLOCK_LEN;
        match buf.get(at..at + REPORT_BLOCK_LEN).map(ReportBlock::parse) {
            Some(Ok(block)) => reports.push(block),
            // Count overruns the chunk: keep what parsed.
            _ => break,
        }
    }
    reports
}

fn parse_sender_report(header: &RtcpHeader, body: &[u8]) -> RtcpPacket {
    let Some(ssrc) = be_u32(body, 0) else {
        return RtcpPacket::Other {
            packet_type: header.packet_type,
        };
    };
    let info = SenderInfo {
        ntp_seconds: be_u32(body, 4).unwrap_or(0),
        ntp_fraction: be_u32(body, 8).unwrap_or(0),
        rtp_timestamp: be_u32(body, 12).unwrap_or(0),
        packet_count: be_u32(body, 16).unwrap_or(0),
        octet_count: be_u32(body, 20).unwrap_or(0),
    };
    let blocks_at = 4 + SENDER_INFO_LEN;
    let reports = parse_report_blocks(header.count, body.get(blocks_at..).unwrap_or(&[]));
    RtcpPacket::SenderReport(SenderReport {
        ssrc,
        info,
        reports,
    })
}

fn parse_receiver_report(header: &RtcpHeader, body: &[u8]) -> RtcpPacket {
    let Some(ssrc) = be_u32(body, 0) else {
        return RtcpPacket::Other {
            packet_type: header.packet_type,
        };
    };
    let reports = parse_report_blocks(header.count, body.get(4..).unwrap_or(&[]));
    RtcpPacket::ReceiverReport(ReceiverReport { ssrc, reports })
}

fn parse_bye(header: &RtcpHeader, body: &[u8]) -> Bye {
    let mut ssrcs = Vec::with_capacity(header.count as usize);
    let mut offset = 0;
    for _ in 0..header.count {
        match be_u32(body, offset) {
            Some(ssrc) => {
                ssrcs.push(ssrc);
                offset += 4;
            }
            None => break,
        }
    }

    let reason = match body.get(offset) {
        Some(&len) if len > 0 => body
            .get(offset + 1..offset + 1 + len as usize)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    };

    Bye { ssrcs, reason }
}

/// Walk SDES chunks collecting each chunk's SSRC (RFC 3550 §6.5).
///
/// Items are skipped, not retained; a malformed item list terminates the
/// walk without error.
fn parse_sdes_ssrcs(header: &RtcpHeader, body: &[u8]) -> Vec<u32> {
    let mut ssrcs = Vec::with_capacity(header.count as usize);
    let mut offset = 0;
    for _ in 0..header.count {
        let Some(ssrc) = be_u32(body, offset) else {
            break;
        };
        ssrcs.push(ssrc);
        offset += 4;

        // Item list: (type, length, text)* terminated by a zero type,
        // then padded to the next 32-bit boundary.
        loop {
            match body.get(offset) {
                None => return ssrcs,
                Some(0) => {
                    offset += 1;
                    offset += (4 - offset % 4) % 4;
                    break;
                }
                Some(_) => {
                    let Some(&len) = body.get(offset + 1) else {
                        return ssrcs;
                    };
                    offset += 2 + len as usize;
                }
            }
        }
    }
    ssrcs
}
