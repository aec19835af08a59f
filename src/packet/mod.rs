//! Packet header types and codecs.
//!
//! Two header families share this module: the legacy gQUIC Public Header
//! and the IETF long/short headers. The first byte of a datagram is
//! ambiguous between them until the version is known, so the parse entry
//! points take the sender's perspective and decide from flag bits alone.
//! Encryption and decryption live in [`crate::crypto`]; the unpacking
//! pipeline that ties the two together is in [`unpack`].

pub mod long_header;
pub mod number;
pub mod public_header;
pub mod short_header;
pub mod unpack;

use alloc::vec::Vec;

use crate::error::Error;
use crate::varint::{read_varint_packet_number, varint_len, PacketNumberLen};

/// Connection ID length in Short Headers and Public Headers.
pub const CONNECTION_ID_LEN: usize = 8;

/// Length of the gQUIC diversification nonce.
pub const DIVERSIFICATION_NONCE_LEN: usize = 32;

/// A QUIC version number.
///
/// Value 0 marks a Version Negotiation packet. gQUIC versions are ASCII
/// tags of the form `Q0xy`; everything else parses as an IETF version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version(pub u32);

impl Version {
    /// The version field of a Version Negotiation packet.
    pub const NEGOTIATION: Version = Version(0);
    /// gQUIC version 39 ("Q039").
    pub const GQUIC_39: Version = Version(0x5130_3339);
    /// gQUIC version 43 ("Q043").
    pub const GQUIC_43: Version = Version(0x5130_3433);
    /// IETF QUIC draft 13.
    pub const DRAFT_13: Version = Version(0xff00_000d);

    /// Versions this endpoint speaks.
    pub const SUPPORTED: [Version; 3] = [Version::GQUIC_39, Version::GQUIC_43, Version::DRAFT_13];

    pub fn is_known(self) -> bool {
        Version::SUPPORTED.contains(&self)
    }

    /// gQUIC version tags start with ASCII "Q0".
    pub fn is_gquic(self) -> bool {
        self.0 >> 16 == 0x5130
    }

    /// Whether packet numbers carry the varint length tag in their high
    /// bits (IETF) rather than a fixed width from header flags (gQUIC).
    pub fn uses_varint_packet_numbers(self) -> bool {
        !self.is_gquic()
    }

    /// Whether the payload uses the varint-based IETF frame layout.
    pub fn uses_ietf_frame_format(self) -> bool {
        !self.is_gquic()
    }
}

/// Which endpoint of the connection we are, or a packet was sent by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Perspective {
    Client,
    Server,
}

/// Long Header packet types. The wire value occupies the low 7 bits of
/// the type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LongType {
    ZeroRtt = 0x7c,
    Handshake = 0x7d,
    Retry = 0x7e,
    Initial = 0x7f,
}

impl LongType {
    pub fn from_byte(b: u8) -> Result<Self, Error> {
        match b {
            0x7c => Ok(LongType::ZeroRtt),
            0x7d => Ok(LongType::Handshake),
            0x7e => Ok(LongType::Retry),
            0x7f => Ok(LongType::Initial),
            _ => Err(Error::InvalidPacketType(b)),
        }
    }
}

/// A parsed packet header.
///
/// Headers are short-lived: they borrow the datagram they were parsed
/// from and are discarded once the packet is unpacked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Header<'a> {
    Public(PublicHeader<'a>),
    Long(LongHeader<'a>),
    Short(ShortHeader<'a>),
    VersionNegotiation(VersionNegotiationHeader<'a>),
}

/// gQUIC Public Header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicHeader<'a> {
    pub dest_conn_id: &'a [u8],
    pub src_conn_id: &'a [u8],
    pub omit_conn_id: bool,
    pub version_flag: bool,
    pub reset_flag: bool,
    /// Only set for version-bearing packets sent by the client.
    pub version: Version,
    /// 32 bytes when present (server to client only), empty otherwise.
    pub diversification_nonce: &'a [u8],
    /// Header length in the original datagram, excluding the packet number.
    /// Filled in by the parser.
    pub parsed_len: usize,
}

/// IETF Long Header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongHeader<'a> {
    pub long_type: LongType,
    pub version: Version,
    pub dest_conn_id: &'a [u8],
    pub src_conn_id: &'a [u8],
    /// Length of packet number plus payload, from the Length field.
    pub length: u64,
    /// Filled in by the parser.
    pub parsed_len: usize,
}

/// IETF Short Header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortHeader<'a> {
    pub dest_conn_id: &'a [u8],
    pub key_phase: u8,
    /// Filled in by the parser.
    pub parsed_len: usize,
}

/// Version Negotiation packet, either dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionNegotiationHeader<'a> {
    pub dest_conn_id: &'a [u8],
    pub src_conn_id: &'a [u8],
    pub supported_versions: Vec<Version>,
}

impl<'a> Header<'a> {
    /// Bytes of the datagram the header occupies, excluding the packet
    /// number. This is where packet-number parsing picks up and what
    /// anchors the AEAD associated data.
    pub fn parsed_len(&self) -> usize {
        match self {
            Header::Public(h) => h.parsed_len,
            Header::Long(h) => h.parsed_len,
            Header::Short(h) => h.parsed_len,
            Header::VersionNegotiation(_) => 0,
        }
    }

    pub fn dest_conn_id(&self) -> &'a [u8] {
        match self {
            Header::Public(h) => h.dest_conn_id,
            Header::Long(h) => h.dest_conn_id,
            Header::Short(h) => h.dest_conn_id,
            Header::VersionNegotiation(h) => h.dest_conn_id,
        }
    }

    /// Serialize the header followed by the packet number.
    ///
    /// Version Negotiation packets are built with the `compose_*` helpers
    /// instead; writing one through here is rejected.
    pub fn write(
        &self,
        out: &mut Vec<u8>,
        pn: u64,
        pn_len: PacketNumberLen,
        perspective: Perspective,
    ) -> Result<(), Error> {
        match self {
            Header::Public(h) => public_header::write_public_header(h, out, pn, pn_len, perspective),
            Header::Long(h) => long_header::write_long_header(h, out, pn, pn_len),
            Header::Short(h) => short_header::write_short_header(h, out, pn, pn_len),
            Header::VersionNegotiation(_) => Err(Error::InvalidPacketHeader(
                "version negotiation packets are composed, not written",
            )),
        }
    }

    /// Exact number of bytes [`Header::write`] will produce.
    pub fn length(&self, pn_len: PacketNumberLen, perspective: Perspective) -> Result<usize, Error> {
        match self {
            Header::Public(h) => Ok(public_header::public_header_length(h, pn_len, perspective)),
            Header::Long(h) => Ok(1 + 4
                + 1
                + h.dest_conn_id.len()
                + h.src_conn_id.len()
                + varint_len(h.length)
                + pn_len.len()),
            Header::Short(h) => Ok(1 + h.dest_conn_id.len() + pn_len.len()),
            Header::VersionNegotiation(_) => Err(Error::InvalidPacketHeader(
                "version negotiation packets are composed, not written",
            )),
        }
    }
}

/// Parse a header from a packet the client sent.
///
/// In an IETF header either the long header bit `0x80` is set or bit
/// `0x08` is clear; a client-sent Public Header always has `0x80` clear
/// and the connection ID flag `0x08` set.
pub fn parse_sent_by_client(buf: &[u8]) -> Result<(Header<'_>, usize), Error> {
    let type_byte = *buf.first().ok_or(Error::Eof)?;
    let is_public = type_byte & 0x88 == 0x08;
    parse(buf, Perspective::Client, is_public)
}

/// Parse a header from a packet the server sent.
pub fn parse_sent_by_server(buf: &[u8]) -> Result<(Header<'_>, usize), Error> {
    let type_byte = *buf.first().ok_or(Error::Eof)?;
    let is_public = if type_byte & 0x80 != 0 {
        // IETF Long Header or Version Negotiation.
        false
    } else if type_byte & 0xcf == 0x09 {
        // gQUIC Version Negotiation: version flag and connection ID flag,
        // no packet number bits.
        true
    } else {
        // gQUIC never uses 6-byte packet numbers, so the packet number
        // bits are never both set in a Public Header.
        type_byte & 0x30 != 0x30
    };
    parse(buf, Perspective::Server, is_public)
}

fn parse(buf: &[u8], sent_by: Perspective, is_public: bool) -> Result<(Header<'_>, usize), Error> {
    if is_public {
        return public_header::parse_public_header(buf, sent_by);
    }
    let type_byte = *buf.first().ok_or(Error::Eof)?;
    if type_byte & 0x80 != 0 {
        long_header::parse_long_header(buf)
    } else {
        short_header::parse_short_header(buf)
    }
}

/// Read the truncated packet number that follows a parsed header.
///
/// gQUIC packet numbers are fixed-width, selected by the public flag
/// byte; IETF packet numbers self-describe their width.
pub fn read_packet_number(
    buf: &[u8],
    first_byte: u8,
    version: Version,
) -> Result<(u64, PacketNumberLen), Error> {
    if version.uses_varint_packet_numbers() {
        read_varint_packet_number(buf)
    } else {
        public_header::read_public_packet_number(buf, first_byte)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn connection_id() -> [u8; 8] {
        [1, 2, 3, 4, 5, 6, 7, 8]
    }

    #[test]
    fn short_header_not_mistaken_for_public_header() {
        // A Short Header's first byte looks like gQUIC public flags
        // unless the packet number bits are inspected.
        let cid = connection_id();
        let hdr = Header::Short(ShortHeader {
            dest_conn_id: &cid,
            key_phase: 1,
            parsed_len: 0,
        });
        let mut buf = Vec::new();
        hdr.write(&mut buf, 1, PacketNumberLen::One, Perspective::Client).unwrap();

        let (parsed, _) = parse_sent_by_client(&buf).unwrap();
        match parsed {
            Header::Short(h) => assert_eq!(h.key_phase, 1),
            other => panic!("expected short header, got {other:?}"),
        }
    }

    #[test]
    fn short_header_not_mistaken_for_version_negotiation() {
        let cid = connection_id();
        let hdr = Header::Short(ShortHeader {
            dest_conn_id: &cid,
            key_phase: 0,
            parsed_len: 0,
        });
        let mut buf = Vec::new();
        hdr.write(&mut buf, 1, PacketNumberLen::One, Perspective::Server).unwrap();

        let (parsed, _) = parse_sent_by_server(&buf).unwrap();
        assert!(matches!(parsed, Header::Short(_)));
    }

    #[test]
    fn long_header_parsed_for_unknown_version() {
        let cid = connection_id();
        let hdr = Header::Long(LongHeader {
            long_type: LongType::ZeroRtt,
            version: Version(0x1234),
            dest_conn_id: &cid,
            src_conn_id: &cid,
            length: 0x42,
            parsed_len: 0,
        });
        let mut buf = Vec::new();
        hdr.write(&mut buf, 1, PacketNumberLen::One, Perspective::Client).unwrap();

        let (parsed, _) = parse_sent_by_client(&buf).unwrap();
        match parsed {
            Header::Long(h) => {
                assert_eq!(h.long_type, LongType::ZeroRtt);
                assert_eq!(h.version, Version(0x1234));
            }
            other => panic!("expected long header, got {other:?}"),
        }
    }

    #[test]
    fn public_header_recognized_when_version_unknown() {
        let cid = connection_id();
        let hdr = Header::Public(PublicHeader {
            dest_conn_id: &cid,
            src_conn_id: &cid,
            omit_conn_id: false,
            version_flag: true,
            reset_flag: false,
            version: Version::GQUIC_39,
            diversification_nonce: &[],
            parsed_len: 0,
        });
        let mut buf = Vec::new();
        hdr.write(&mut buf, 1, PacketNumberLen::One, Perspective::Client).unwrap();

        let (parsed, _) = parse_sent_by_client(&buf).unwrap();
        match parsed {
            Header::Public(h) => {
                assert_eq!(h.version, Version::GQUIC_39);
                assert_eq!(h.dest_conn_id, &cid);
            }
            other => panic!("expected public header, got {other:?}"),
        }
    }

    #[test]
    fn read_packet_number_dispatches_on_version() {
        // IETF: varint-encoded, self-describing width.
        let mut buf = Vec::new();
        crate::varint::write_varint_packet_number(&mut buf, 0x1337, PacketNumberLen::Two);
        let (pn, pn_len) = read_packet_number(&buf, 0xff, Version::DRAFT_13).unwrap();
        assert_eq!((pn, pn_len), (0x1337, PacketNumberLen::Two));

        // gQUIC: fixed width from the flag byte (0x10 = 2 bytes).
        let (pn, pn_len) = read_packet_number(&[0x13, 0x37], 0x18, Version::GQUIC_39).unwrap();
        assert_eq!((pn, pn_len), (0x1337, PacketNumberLen::Two));
    }

    #[test]
    fn header_length_matches_write_for_all_variants() {
        let cid = connection_id();
        let long = Header::Long(LongHeader {
            long_type: LongType::Initial,
            version: Version::DRAFT_13,
            dest_conn_id: &cid,
            src_conn_id: &cid,
            length: 0x1337,
            parsed_len: 0,
        });
        let short = Header::Short(ShortHeader {
            dest_conn_id: &cid,
            key_phase: 0,
            parsed_len: 0,
        });
        let public = Header::Public(PublicHeader {
            dest_conn_id: &cid,
            src_conn_id: &cid,
            omit_conn_id: false,
            version_flag: false,
            reset_flag: false,
            version: Version::GQUIC_39,
            diversification_nonce: &[],
            parsed_len: 0,
        });

        for hdr in [long, short, public] {
            for pn_len in [PacketNumberLen::One, PacketNumberLen::Two, PacketNumberLen::Four] {
                let mut buf = Vec::new();
                hdr.write(&mut buf, 0x12, pn_len, Perspective::Client).unwrap();
                assert_eq!(
                    buf.len(),
                    hdr.length(pn_len, Perspective::Client).unwrap(),
                    "length oracle mismatch for {hdr:?} pn_len {pn_len:?}"
                );
            }
        }
    }

    #[test]
    fn version_properties() {
        assert!(Version::GQUIC_39.is_gquic());
        assert!(Version::GQUIC_43.is_gquic());
        assert!(!Version::DRAFT_13.is_gquic());
        assert!(Version::DRAFT_13.uses_varint_packet_numbers());
        assert!(!Version::GQUIC_39.uses_varint_packet_numbers());
        assert!(Version::DRAFT_13.is_known());
        assert!(!Version(0x1234).is_known());
    }
}
