//! Wire frame codec for decrypted packet payloads.
//!
//! Two dialects share one frame set: gQUIC frames use big-endian
//! fixed-width fields with flag-encoded widths for STREAM and ACK, IETF
//! frames are varint-based. The version routes to the right parser.
//!
//! Frame data is copied out of the payload buffer: the decrypted scratch
//! buffer goes back to the pool as soon as the unpacker returns, so
//! frames cannot borrow from it.

use alloc::string::String;
use alloc::vec::Vec;

use crate::error::Error;
use crate::packet::Version;
use crate::varint::PacketNumberLen;

/// A single parsed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Ping,
    Ack(AckFrame),
    Stream(StreamFrame),
    Crypto(CryptoFrame),
    RstStream(RstStreamFrame),
    ConnectionClose(ConnectionCloseFrame),
    ApplicationClose(ConnectionCloseFrame),
    GoAway(GoAwayFrame),
    MaxData(u64),
    MaxStreamData { stream_id: u64, maximum: u64 },
    MaxStreamId(u64),
    Blocked { offset: u64 },
    StreamBlocked { stream_id: u64, offset: u64 },
    StreamIdBlocked(u64),
    NewConnectionId(NewConnectionIdFrame),
    StopSending { stream_id: u64, error_code: u16 },
    StopWaiting { least_unacked: u64 },
    PathChallenge([u8; 8]),
    PathResponse([u8; 8]),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckFrame {
    pub largest_acked: u64,
    /// Microseconds. gQUIC carries a ufloat16, IETF a varint scaled by the
    /// default ack-delay exponent.
    pub ack_delay_us: u64,
    /// Acknowledged ranges, largest first. Never empty.
    pub ranges: Vec<AckRange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckRange {
    pub smallest: u64,
    pub largest: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFrame {
    pub stream_id: u64,
    pub offset: u64,
    pub data: Vec<u8>,
    pub fin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptoFrame {
    pub offset: u64,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RstStreamFrame {
    pub stream_id: u64,
    pub error_code: u32,
    pub final_offset: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionCloseFrame {
    pub error_code: u32,
    pub reason_phrase: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoAwayFrame {
    pub error_code: u32,
    pub last_good_stream: u64,
    pub reason_phrase: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConnectionIdFrame {
    pub sequence: u64,
    pub connection_id: u64,
    pub stateless_reset_token: [u8; 16],
}

/// Parse the next frame from `buf`.
///
/// Returns `None` when the buffer is exhausted (or holds only padding).
/// `packet_number` and `pn_len` feed the gQUIC STOP_WAITING delta.
/// On success the second tuple element is the bytes consumed.
pub fn parse_next_frame(
    buf: &[u8],
    packet_number: u64,
    pn_len: PacketNumberLen,
    version: Version,
) -> Result<Option<(Frame, usize)>, Error> {
    if version.uses_ietf_frame_format() {
        parse_ietf_frame(buf)
    } else {
        parse_gquic_frame(buf, packet_number, pn_len)
    }
}

// ---------------------------------------------------------------------------
// IETF frames
// ---------------------------------------------------------------------------

fn parse_ietf_frame(buf: &[u8]) -> Result<Option<(Frame, usize)>, Error> {
    let mut r = Reader::new(buf);
    // PADDING is a single zero byte; swallow runs of it.
    while r.peek() == Some(0x00) {
        r.skip(1)?;
    }
    let type_byte = match r.read_u8() {
        Ok(b) => b,
        Err(_) => return Ok(None),
    };

    let frame = match type_byte {
        0x01 => {
            let stream_id = r.read_varint()?;
            let error_code = r.read_u16()?;
            let final_offset = r.read_varint()?;
            Frame::RstStream(RstStreamFrame {
                stream_id,
                error_code: u32::from(error_code),
                final_offset,
            })
        }
        0x02 | 0x03 => {
            let error_code = u32::from(r.read_u16()?);
            let reason_len = r.read_varint()? as usize;
            let reason = r.read_bytes(reason_len)?;
            let close = ConnectionCloseFrame {
                error_code,
                reason_phrase: String::from_utf8_lossy(reason).into_owned(),
            };
            if type_byte == 0x02 {
                Frame::ConnectionClose(close)
            } else {
                Frame::ApplicationClose(close)
            }
        }
        0x04 => Frame::MaxData(r.read_varint()?),
        0x05 => Frame::MaxStreamData {
            stream_id: r.read_varint()?,
            maximum: r.read_varint()?,
        },
        0x06 => Frame::MaxStreamId(r.read_varint()?),
        0x07 => Frame::Ping,
        0x08 => Frame::Blocked { offset: r.read_varint()? },
        0x09 => Frame::StreamBlocked {
            stream_id: r.read_varint()?,
            offset: r.read_varint()?,
        },
        0x0a => Frame::StreamIdBlocked(r.read_varint()?),
        0x0b => {
            let sequence = r.read_varint()?;
            let connection_id = r.read_u64()?;
            let token = r.read_bytes(16)?;
            let mut stateless_reset_token = [0u8; 16];
            stateless_reset_token.copy_from_slice(token);
            Frame::NewConnectionId(NewConnectionIdFrame {
                sequence,
                connection_id,
                stateless_reset_token,
            })
        }
        0x0c => Frame::StopSending {
            stream_id: r.read_varint()?,
            error_code: r.read_u16()?,
        },
        0x0d => Frame::Ack(parse_ietf_ack(&mut r)?),
        0x0e => Frame::PathChallenge(r.read_array()?),
        0x0f => Frame::PathResponse(r.read_array()?),
        0x10..=0x17 => {
            let fin = type_byte & 0x01 != 0;
            let has_len = type_byte & 0x02 != 0;
            let has_offset = type_byte & 0x04 != 0;
            let stream_id = r.read_varint()?;
            let offset = if has_offset { r.read_varint()? } else { 0 };
            let data = if has_len {
                let len = r.read_varint()? as usize;
                r.read_bytes(len)?.to_vec()
            } else {
                r.read_rest().to_vec()
            };
            Frame::Stream(StreamFrame { stream_id, offset, data, fin })
        }
        0x18 => {
            let offset = r.read_varint()?;
            let len = r.read_varint()? as usize;
            let data = r.read_bytes(len)?.to_vec();
            Frame::Crypto(CryptoFrame { offset, data })
        }
        _ => return Err(Error::InvalidFrameData("unknown frame type")),
    };
    Ok(Some((frame, r.pos)))
}

/// Default ack-delay exponent applied to the wire value.
const ACK_DELAY_EXPONENT: u32 = 3;

fn parse_ietf_ack(r: &mut Reader<'_>) -> Result<AckFrame, Error> {
    let largest_acked = r.read_varint()?;
    let delay = r.read_varint()?;
    let num_blocks = r.read_varint()?;
    let first_block = r.read_varint()?;

    let mut smallest = largest_acked
        .checked_sub(first_block)
        .ok_or(Error::InvalidFrameData("invalid first ACK range"))?;
    let mut ranges = Vec::with_capacity(1 + num_blocks as usize);
    ranges.push(AckRange { smallest, largest: largest_acked });

    for _ in 0..num_blocks {
        let gap = r.read_varint()?;
        let block = r.read_varint()?;
        let largest = smallest
            .checked_sub(gap)
            .and_then(|v| v.checked_sub(2))
            .ok_or(Error::InvalidFrameData("invalid ACK range gap"))?;
        smallest = largest
            .checked_sub(block)
            .ok_or(Error::InvalidFrameData("invalid ACK range length"))?;
        ranges.push(AckRange { smallest, largest });
    }

    Ok(AckFrame {
        largest_acked,
        ack_delay_us: delay << ACK_DELAY_EXPONENT,
        ranges,
    })
}

// ---------------------------------------------------------------------------
// gQUIC frames
// ---------------------------------------------------------------------------

fn parse_gquic_frame(
    buf: &[u8],
    packet_number: u64,
    pn_len: PacketNumberLen,
) -> Result<Option<(Frame, usize)>, Error> {
    let mut r = Reader::new(buf);
    let type_byte = match r.read_u8() {
        Ok(b) => b,
        Err(_) => return Ok(None),
    };
    // PADDING fills the rest of the packet.
    if type_byte == 0x00 {
        return Ok(None);
    }
    if type_byte & 0x80 != 0 {
        return parse_gquic_stream(&mut r, type_byte).map(|f| Some((f, r.pos)));
    }
    if type_byte & 0x40 != 0 {
        let frame = parse_gquic_ack(&mut r, type_byte)?;
        return Ok(Some((Frame::Ack(frame), r.pos)));
    }

    let frame = match type_byte {
        0x01 => {
            let stream_id = u64::from(r.read_u32()?);
            let final_offset = r.read_u64()?;
            let error_code = r.read_u32()?;
            Frame::RstStream(RstStreamFrame { stream_id, error_code, final_offset })
        }
        0x02 => {
            let error_code = r.read_u32()?;
            let reason_len = r.read_u16()? as usize;
            let reason = r.read_bytes(reason_len)?;
            Frame::ConnectionClose(ConnectionCloseFrame {
                error_code,
                reason_phrase: String::from_utf8_lossy(reason).into_owned(),
            })
        }
        0x03 => {
            let error_code = r.read_u32()?;
            let last_good_stream = u64::from(r.read_u32()?);
            let reason_len = r.read_u16()? as usize;
            let reason = r.read_bytes(reason_len)?;
            Frame::GoAway(GoAwayFrame {
                error_code,
                last_good_stream,
                reason_phrase: String::from_utf8_lossy(reason).into_owned(),
            })
        }
        0x04 => {
            // WINDOW_UPDATE on stream 0 is the connection-level limit.
            let stream_id = u64::from(r.read_u32()?);
            let byte_offset = r.read_u64()?;
            if stream_id == 0 {
                Frame::MaxData(byte_offset)
            } else {
                Frame::MaxStreamData { stream_id, maximum: byte_offset }
            }
        }
        0x05 => {
            let stream_id = u64::from(r.read_u32()?);
            if stream_id == 0 {
                Frame::Blocked { offset: 0 }
            } else {
                Frame::StreamBlocked { stream_id, offset: 0 }
            }
        }
        0x06 => {
            let delta = r.read_uintn(pn_len.len())?;
            let least_unacked = packet_number
                .checked_sub(delta)
                .ok_or(Error::InvalidFrameData("invalid STOP_WAITING delta"))?;
            Frame::StopWaiting { least_unacked }
        }
        0x07 => Frame::Ping,
        _ => return Err(Error::InvalidFrameData("unknown frame type")),
    };
    Ok(Some((frame, r.pos)))
}

/// Stream frame type byte: `1fdoooss` -- FIN, data-length-present, 3 bits
/// of offset width, 2 bits of stream ID width.
fn parse_gquic_stream(r: &mut Reader<'_>, type_byte: u8) -> Result<Frame, Error> {
    let fin = type_byte & 0x40 != 0;
    let data_len_present = type_byte & 0x20 != 0;
    let mut offset_len = ((type_byte & 0x1c) >> 2) as usize;
    if offset_len != 0 {
        offset_len += 1;
    }
    let stream_id_len = (type_byte & 0x03) as usize + 1;

    let stream_id = r.read_uintn(stream_id_len)?;
    let offset = r.read_uintn(offset_len)?;
    let data = if data_len_present {
        let len = r.read_u16()? as usize;
        r.read_bytes(len)?.to_vec()
    } else {
        r.read_rest().to_vec()
    };
    Ok(Frame::Stream(StreamFrame { stream_id, offset, data, fin }))
}

/// ACK frame type byte: `01ntllmm` -- n: has missing ranges, ll: width of
/// the largest-acked field, mm: width of the ack-block lengths.
fn parse_gquic_ack(r: &mut Reader<'_>, type_byte: u8) -> Result<AckFrame, Error> {
    let has_missing_ranges = type_byte & 0x20 != 0;
    let largest_len = match (type_byte & 0x0c) >> 2 {
        0 => 1,
        n => 2 * n as usize,
    };
    let block_len = match type_byte & 0x03 {
        0 => 1,
        n => 2 * n as usize,
    };

    let largest_acked = r.read_uintn(largest_len)?;
    let ack_delay_us = ufloat16_to_u64(r.read_u16()?);

    let num_blocks = if has_missing_ranges {
        let n = r.read_u8()?;
        if n == 0 {
            return Err(Error::InvalidFrameData("invalid number of ACK blocks"));
        }
        n
    } else {
        0
    };

    let first_block = r.read_uintn(block_len)?;
    if first_block == 0 || first_block > largest_acked + 1 {
        return Err(Error::InvalidFrameData("invalid first ACK range"));
    }
    let mut smallest = largest_acked + 1 - first_block;
    let mut ranges = Vec::with_capacity(1 + num_blocks as usize);
    ranges.push(AckRange { smallest, largest: largest_acked });

    // Gap 0 continues the previous block (lengths wider than one field);
    // a zero-length block accumulates its gap into the next one.
    let mut pending_gap = 0u64;
    for _ in 0..num_blocks {
        let gap = u64::from(r.read_u8()?);
        let block = r.read_uintn(block_len)?;
        if gap == 0 && pending_gap == 0 {
            smallest = smallest
                .checked_sub(block)
                .ok_or(Error::InvalidFrameData("invalid ACK range length"))?;
            if let Some(last) = ranges.last_mut() {
                last.smallest = smallest;
            }
            continue;
        }
        pending_gap += gap;
        if block == 0 {
            continue;
        }
        let largest = smallest
            .checked_sub(pending_gap)
            .and_then(|v| v.checked_sub(1))
            .ok_or(Error::InvalidFrameData("invalid ACK range gap"))?;
        if block > largest + 1 {
            return Err(Error::InvalidFrameData("invalid ACK range length"));
        }
        smallest = largest + 1 - block;
        ranges.push(AckRange { smallest, largest });
        pending_gap = 0;
    }

    // Timestamp section: parsed and discarded.
    let num_timestamps = r.read_u8()?;
    if num_timestamps > 0 {
        // Delta from largest acked (1 byte) and time since (4 bytes).
        r.skip(5)?;
        // Each further entry: delta (1 byte) and time delta (2 bytes).
        r.skip(3 * (num_timestamps as usize - 1))?;
    }

    Ok(AckFrame { largest_acked, ack_delay_us, ranges })
}

/// gQUIC's 16-bit floating point: 11-bit mantissa, 5-bit exponent.
fn ufloat16_to_u64(value: u16) -> u64 {
    const MANTISSA_BITS: u16 = 11;
    let mut res = u64::from(value);
    if res >= 1 << (MANTISSA_BITS + 1) {
        let exponent = (value >> MANTISSA_BITS) - 1;
        res -= u64::from(exponent) << MANTISSA_BITS;
        res <<= exponent;
    }
    res
}

// ---------------------------------------------------------------------------
// Byte reader
// ---------------------------------------------------------------------------

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    fn skip(&mut self, n: usize) -> Result<(), Error> {
        if self.buf.len() - self.pos < n {
            return Err(Error::Eof);
        }
        self.pos += n;
        Ok(())
    }

    fn read_u8(&mut self) -> Result<u8, Error> {
        let b = *self.buf.get(self.pos).ok_or(Error::Eof)?;
        self.pos += 1;
        Ok(b)
    }

    fn read_u16(&mut self) -> Result<u16, Error> {
        let v = crate::varint::read_u16(&self.buf[self.pos..])?;
        self.pos += 2;
        Ok(v)
    }

    fn read_u32(&mut self) -> Result<u32, Error> {
        let v = crate::varint::read_u32(&self.buf[self.pos..])?;
        self.pos += 4;
        Ok(v)
    }

    fn read_u64(&mut self) -> Result<u64, Error> {
        let v = crate::varint::read_u64(&self.buf[self.pos..])?;
        self.pos += 8;
        Ok(v)
    }

    fn read_uintn(&mut self, n: usize) -> Result<u64, Error> {
        let v = crate::varint::read_uintn(&self.buf[self.pos..], n)?;
        self.pos += n;
        Ok(v)
    }

    fn read_varint(&mut self) -> Result<u64, Error> {
        let (v, consumed) = crate::varint::read_varint(&self.buf[self.pos..])?;
        self.pos += consumed;
        Ok(v)
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], Error> {
        if self.buf.len() - self.pos < n {
            return Err(Error::Eof);
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn read_rest(&mut self) -> &'a [u8] {
        let out = &self.buf[self.pos..];
        self.pos = self.buf.len();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::varint::write_varint;
    use alloc::vec;
    use alloc::vec::Vec;

    const IETF: Version = Version::DRAFT_13;
    const GQUIC: Version = Version::GQUIC_39;
    const PN: u64 = 0x1337;
    const PN_LEN: PacketNumberLen = PacketNumberLen::Two;

    fn parse_one(buf: &[u8], version: Version) -> (Frame, usize) {
        parse_next_frame(buf, PN, PN_LEN, version).unwrap().unwrap()
    }

    fn varint(v: u64) -> Vec<u8> {
        let mut out = Vec::new();
        write_varint(&mut out, v);
        out
    }

    // -- IETF dialect --

    #[test]
    fn ietf_ping_and_padding() {
        let (frame, consumed) = parse_one(&[0x07], IETF);
        assert_eq!(frame, Frame::Ping);
        assert_eq!(consumed, 1);

        // Padding before the frame is swallowed.
        let (frame, consumed) = parse_one(&[0x00, 0x00, 0x07], IETF);
        assert_eq!(frame, Frame::Ping);
        assert_eq!(consumed, 3);

        // Only padding: no frame.
        assert_eq!(parse_next_frame(&[0x00; 4], PN, PN_LEN, IETF).unwrap(), None);
        assert_eq!(parse_next_frame(&[], PN, PN_LEN, IETF).unwrap(), None);
    }

    #[test]
    fn ietf_crypto() {
        let mut buf = vec![0x18];
        buf.extend_from_slice(&varint(0xdecafbad));
        buf.extend_from_slice(&varint(6));
        buf.extend_from_slice(b"foobar");
        let (frame, consumed) = parse_one(&buf, IETF);
        assert_eq!(consumed, buf.len());
        assert_eq!(
            frame,
            Frame::Crypto(CryptoFrame { offset: 0xdecafbad, data: b"foobar".to_vec() })
        );

        for i in 1..buf.len() {
            assert_eq!(parse_next_frame(&buf[..i], PN, PN_LEN, IETF), Err(Error::Eof));
        }
    }

    #[test]
    fn ietf_stream_with_offset_and_len() {
        let mut buf = vec![0x10 | 0x04 | 0x02 | 0x01];
        buf.extend_from_slice(&varint(0x42)); // stream id
        buf.extend_from_slice(&varint(0x1000)); // offset
        buf.extend_from_slice(&varint(3)); // length
        buf.extend_from_slice(b"abc");
        buf.push(0x07); // following frame
        let (frame, consumed) = parse_one(&buf, IETF);
        assert_eq!(consumed, buf.len() - 1);
        assert_eq!(
            frame,
            Frame::Stream(StreamFrame {
                stream_id: 0x42,
                offset: 0x1000,
                data: b"abc".to_vec(),
                fin: true,
            })
        );
    }

    #[test]
    fn ietf_stream_without_len_takes_rest() {
        let mut buf = vec![0x10];
        buf.extend_from_slice(&varint(7));
        buf.extend_from_slice(b"rest of packet");
        let (frame, consumed) = parse_one(&buf, IETF);
        assert_eq!(consumed, buf.len());
        assert_eq!(
            frame,
            Frame::Stream(StreamFrame {
                stream_id: 7,
                offset: 0,
                data: b"rest of packet".to_vec(),
                fin: false,
            })
        );
    }

    #[test]
    fn ietf_ack_single_range() {
        let mut buf = vec![0x0d];
        buf.extend_from_slice(&varint(100)); // largest
        buf.extend_from_slice(&varint(2)); // delay
        buf.extend_from_slice(&varint(0)); // no extra blocks
        buf.extend_from_slice(&varint(10)); // first block
        let (frame, _) = parse_one(&buf, IETF);
        assert_eq!(
            frame,
            Frame::Ack(AckFrame {
                largest_acked: 100,
                ack_delay_us: 16,
                ranges: vec![AckRange { smallest: 90, largest: 100 }],
            })
        );
    }

    #[test]
    fn ietf_ack_multiple_ranges() {
        let mut buf = vec![0x0d];
        buf.extend_from_slice(&varint(100)); // largest
        buf.extend_from_slice(&varint(0)); // delay
        buf.extend_from_slice(&varint(1)); // one extra block
        buf.extend_from_slice(&varint(0)); // first block: just 100
        buf.extend_from_slice(&varint(3)); // gap
        buf.extend_from_slice(&varint(5)); // block length
        let (frame, _) = parse_one(&buf, IETF);
        // gap 3 below 100: largest of next range = 100 - 3 - 2 = 95
        assert_eq!(
            frame,
            Frame::Ack(AckFrame {
                largest_acked: 100,
                ack_delay_us: 0,
                ranges: vec![
                    AckRange { smallest: 100, largest: 100 },
                    AckRange { smallest: 90, largest: 95 },
                ],
            })
        );
    }

    #[test]
    fn ietf_ack_invalid_first_range() {
        let mut buf = vec![0x0d];
        buf.extend_from_slice(&varint(5)); // largest
        buf.extend_from_slice(&varint(0));
        buf.extend_from_slice(&varint(0));
        buf.extend_from_slice(&varint(10)); // first block > largest
        assert!(matches!(
            parse_next_frame(&buf, PN, PN_LEN, IETF),
            Err(Error::InvalidFrameData(_))
        ));
    }

    #[test]
    fn ietf_connection_and_application_close() {
        for (type_byte, is_app) in [(0x02u8, false), (0x03, true)] {
            let mut buf = vec![type_byte];
            buf.extend_from_slice(&0x000au16.to_be_bytes());
            buf.extend_from_slice(&varint(5));
            buf.extend_from_slice(b"gone!");
            let (frame, consumed) = parse_one(&buf, IETF);
            assert_eq!(consumed, buf.len());
            let expected = ConnectionCloseFrame {
                error_code: 0x0a,
                reason_phrase: String::from("gone!"),
            };
            if is_app {
                assert_eq!(frame, Frame::ApplicationClose(expected));
            } else {
                assert_eq!(frame, Frame::ConnectionClose(expected));
            }
        }
    }

    #[test]
    fn ietf_new_connection_id() {
        let mut buf = vec![0x0b];
        buf.extend_from_slice(&varint(7)); // sequence
        buf.extend_from_slice(&0xdead_beef_cafe_1337u64.to_be_bytes());
        buf.extend_from_slice(&[0xaa; 16]);
        let (frame, consumed) = parse_one(&buf, IETF);
        assert_eq!(consumed, buf.len());
        assert_eq!(
            frame,
            Frame::NewConnectionId(NewConnectionIdFrame {
                sequence: 7,
                connection_id: 0xdead_beef_cafe_1337,
                stateless_reset_token: [0xaa; 16],
            })
        );
    }

    #[test]
    fn ietf_flow_control_frames() {
        let mut buf = vec![0x04];
        buf.extend_from_slice(&varint(0x5000));
        assert_eq!(parse_one(&buf, IETF).0, Frame::MaxData(0x5000));

        let mut buf = vec![0x05];
        buf.extend_from_slice(&varint(4));
        buf.extend_from_slice(&varint(0x2000));
        assert_eq!(
            parse_one(&buf, IETF).0,
            Frame::MaxStreamData { stream_id: 4, maximum: 0x2000 }
        );

        let mut buf = vec![0x0c];
        buf.extend_from_slice(&varint(8));
        buf.extend_from_slice(&0x0007u16.to_be_bytes());
        assert_eq!(
            parse_one(&buf, IETF).0,
            Frame::StopSending { stream_id: 8, error_code: 7 }
        );
    }

    #[test]
    fn ietf_path_challenge_response() {
        let mut buf = vec![0x0e];
        buf.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(parse_one(&buf, IETF).0, Frame::PathChallenge([1, 2, 3, 4, 5, 6, 7, 8]));
        buf[0] = 0x0f;
        assert_eq!(parse_one(&buf, IETF).0, Frame::PathResponse([1, 2, 3, 4, 5, 6, 7, 8]));
    }

    #[test]
    fn ietf_unknown_type_rejected() {
        assert!(matches!(
            parse_next_frame(&[0x1f], PN, PN_LEN, IETF),
            Err(Error::InvalidFrameData(_))
        ));
    }

    // -- gQUIC dialect --

    #[test]
    fn gquic_simple_frames() {
        assert_eq!(parse_one(&[0x07], GQUIC).0, Frame::Ping);
        // Padding ends the frame sequence.
        assert_eq!(parse_next_frame(&[0x00, 0xff], PN, PN_LEN, GQUIC).unwrap(), None);
    }

    #[test]
    fn gquic_rst_stream() {
        let mut buf = vec![0x01];
        buf.extend_from_slice(&0x42u32.to_be_bytes());
        buf.extend_from_slice(&0x1000u64.to_be_bytes());
        buf.extend_from_slice(&0x0bu32.to_be_bytes());
        let (frame, consumed) = parse_one(&buf, GQUIC);
        assert_eq!(consumed, buf.len());
        assert_eq!(
            frame,
            Frame::RstStream(RstStreamFrame {
                stream_id: 0x42,
                error_code: 0x0b,
                final_offset: 0x1000,
            })
        );
    }

    #[test]
    fn gquic_connection_close() {
        let mut buf = vec![0x02];
        buf.extend_from_slice(&0x0cu32.to_be_bytes());
        buf.extend_from_slice(&4u16.to_be_bytes());
        buf.extend_from_slice(b"bye!");
        let (frame, _) = parse_one(&buf, GQUIC);
        assert_eq!(
            frame,
            Frame::ConnectionClose(ConnectionCloseFrame {
                error_code: 0x0c,
                reason_phrase: String::from("bye!"),
            })
        );
    }

    #[test]
    fn gquic_goaway() {
        let mut buf = vec![0x03];
        buf.extend_from_slice(&0x09u32.to_be_bytes());
        buf.extend_from_slice(&0x11u32.to_be_bytes());
        buf.extend_from_slice(&2u16.to_be_bytes());
        buf.extend_from_slice(b"no");
        let (frame, _) = parse_one(&buf, GQUIC);
        assert_eq!(
            frame,
            Frame::GoAway(GoAwayFrame {
                error_code: 9,
                last_good_stream: 0x11,
                reason_phrase: String::from("no"),
            })
        );
    }

    #[test]
    fn gquic_window_update_maps_by_stream() {
        let mut buf = vec![0x04];
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf.extend_from_slice(&0x8000u64.to_be_bytes());
        assert_eq!(parse_one(&buf, GQUIC).0, Frame::MaxData(0x8000));

        let mut buf = vec![0x04];
        buf.extend_from_slice(&5u32.to_be_bytes());
        buf.extend_from_slice(&0x4000u64.to_be_bytes());
        assert_eq!(
            parse_one(&buf, GQUIC).0,
            Frame::MaxStreamData { stream_id: 5, maximum: 0x4000 }
        );
    }

    #[test]
    fn gquic_blocked_maps_by_stream() {
        let mut buf = vec![0x05];
        buf.extend_from_slice(&0u32.to_be_bytes());
        assert_eq!(parse_one(&buf, GQUIC).0, Frame::Blocked { offset: 0 });

        let mut buf = vec![0x05];
        buf.extend_from_slice(&3u32.to_be_bytes());
        assert_eq!(
            parse_one(&buf, GQUIC).0,
            Frame::StreamBlocked { stream_id: 3, offset: 0 }
        );
    }

    #[test]
    fn gquic_stop_waiting() {
        // Delta is as wide as the packet number; PN = 0x1337, delta = 0x37.
        let buf = [0x06, 0x00, 0x37];
        let (frame, consumed) = parse_one(&buf, GQUIC);
        assert_eq!(consumed, 3);
        assert_eq!(frame, Frame::StopWaiting { least_unacked: 0x1300 });

        // Delta larger than the packet number is malformed.
        let buf = [0x06, 0x20, 0x00];
        assert!(matches!(
            parse_next_frame(&buf, PN, PN_LEN, GQUIC),
            Err(Error::InvalidFrameData(_))
        ));
    }

    #[test]
    fn gquic_stream_with_data_length() {
        // FIN, data length present, 2-byte offset, 1-byte stream id.
        let mut buf = vec![0x80 | 0x40 | 0x20 | 0x04 | 0x00];
        buf.push(0x2a); // stream id
        buf.extend_from_slice(&0x0100u16.to_be_bytes()); // offset
        buf.extend_from_slice(&3u16.to_be_bytes()); // data length
        buf.extend_from_slice(b"xyz");
        buf.push(0x07); // following frame
        let (frame, consumed) = parse_one(&buf, GQUIC);
        assert_eq!(consumed, buf.len() - 1);
        assert_eq!(
            frame,
            Frame::Stream(StreamFrame {
                stream_id: 0x2a,
                offset: 0x100,
                data: b"xyz".to_vec(),
                fin: true,
            })
        );
    }

    #[test]
    fn gquic_stream_without_data_length_takes_rest() {
        // No offset, 1-byte stream id, no data length.
        let mut buf = vec![0x80];
        buf.push(0x07); // stream id
        buf.extend_from_slice(b"everything else");
        let (frame, consumed) = parse_one(&buf, GQUIC);
        assert_eq!(consumed, buf.len());
        assert_eq!(
            frame,
            Frame::Stream(StreamFrame {
                stream_id: 7,
                offset: 0,
                data: b"everything else".to_vec(),
                fin: false,
            })
        );
    }

    #[test]
    fn gquic_ack_single_block() {
        // 2-byte largest acked (ll=01), 2-byte block length (mm=01).
        let mut buf = vec![0x40 | 0x04 | 0x01];
        buf.extend_from_slice(&0x1234u16.to_be_bytes()); // largest acked
        buf.extend_from_slice(&0u16.to_be_bytes()); // delay
        buf.extend_from_slice(&0x0010u16.to_be_bytes()); // first block
        buf.push(0); // no timestamps
        let (frame, consumed) = parse_one(&buf, GQUIC);
        assert_eq!(consumed, buf.len());
        assert_eq!(
            frame,
            Frame::Ack(AckFrame {
                largest_acked: 0x1234,
                ack_delay_us: 0,
                ranges: vec![AckRange { smallest: 0x1234 - 0x10 + 1, largest: 0x1234 }],
            })
        );
    }

    #[test]
    fn gquic_ack_with_missing_ranges() {
        // Missing ranges bit, 2-byte largest, 2-byte blocks.
        let mut buf = vec![0x40 | 0x20 | 0x04 | 0x01];
        buf.extend_from_slice(&100u16.to_be_bytes()); // largest acked
        buf.extend_from_slice(&0u16.to_be_bytes()); // delay
        buf.push(1); // one more block
        buf.extend_from_slice(&10u16.to_be_bytes()); // first block: 91..=100
        buf.push(5); // gap of 5
        buf.extend_from_slice(&20u16.to_be_bytes()); // block: 66..=85
        buf.push(0); // no timestamps
        let (frame, consumed) = parse_one(&buf, GQUIC);
        assert_eq!(consumed, buf.len());
        assert_eq!(
            frame,
            Frame::Ack(AckFrame {
                largest_acked: 100,
                ack_delay_us: 0,
                ranges: vec![
                    AckRange { smallest: 91, largest: 100 },
                    AckRange { smallest: 66, largest: 85 },
                ],
            })
        );
    }

    #[test]
    fn gquic_ack_skips_timestamps() {
        let mut buf = vec![0x40];
        buf.push(50); // largest acked, 1 byte
        buf.extend_from_slice(&0u16.to_be_bytes()); // delay
        buf.push(10); // first block
        buf.push(2); // two timestamps
        buf.extend_from_slice(&[0u8; 5]); // first: delta + time since
        buf.extend_from_slice(&[0u8; 3]); // second: delta + time delta
        buf.push(0x07); // following frame
        let (frame, consumed) = parse_one(&buf, GQUIC);
        assert_eq!(consumed, buf.len() - 1);
        assert!(matches!(frame, Frame::Ack(_)));
    }

    #[test]
    fn gquic_unknown_type_rejected() {
        assert!(matches!(
            parse_next_frame(&[0x0c], PN, PN_LEN, GQUIC),
            Err(Error::InvalidFrameData(_))
        ));
    }

    #[test]
    fn ufloat16_decoding() {
        // Values below 2^12 are literal.
        assert_eq!(ufloat16_to_u64(0), 0);
        assert_eq!(ufloat16_to_u64(4095), 4095);
        // 0x1000: exponent 1, mantissa 0 -> (0x1000 - 0x800) << 1 = 0x1000.
        assert_eq!(ufloat16_to_u64(0x1000), 0x1000);
        // Maximum: exponent 30.
        assert_eq!(ufloat16_to_u64(0xffff), ((1u64 << 12) - 1) << 30);
    }
}
