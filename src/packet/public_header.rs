//! gQUIC Public Header parsing and serialization.
//!
//! The first byte is a bitfield of public flags: `0x01` version present,
//! `0x02` public reset, `0x04` diversification nonce present, `0x08`
//! connection ID present, `0x30` packet number length.

use alloc::vec::Vec;

use crate::error::Error;
use crate::packet::{
    Header, Perspective, PublicHeader, Version, VersionNegotiationHeader, CONNECTION_ID_LEN,
    DIVERSIFICATION_NONCE_LEN,
};
use crate::varint::{read_u32, read_uintn, PacketNumberLen};

/// Parse a Public Header. `sent_by` is the perspective of the peer that
/// sent the packet: a server parsing a client packet passes
/// [`Perspective::Client`].
pub fn parse_public_header(
    buf: &[u8],
    sent_by: Perspective,
) -> Result<(Header<'_>, usize), Error> {
    let flags = *buf.first().ok_or(Error::Eof)?;
    let reset_flag = flags & 0x02 > 0;
    let version_flag = flags & 0x01 > 0;

    let omit_conn_id = flags & 0x08 == 0;
    if omit_conn_id && sent_by == Perspective::Client {
        return Err(Error::InvalidPacketHeader(
            "receiving packets with omitted ConnectionID is not supported",
        ));
    }

    let mut pos = 1;
    let mut conn_id: &[u8] = &[];
    if !omit_conn_id {
        if buf.len() < pos + CONNECTION_ID_LEN {
            return Err(Error::Eof);
        }
        conn_id = &buf[pos..pos + CONNECTION_ID_LEN];
        pos += CONNECTION_ID_LEN;
        if conn_id.iter().all(|&b| b == 0) {
            return Err(Error::InvalidPacketHeader("connection ID cannot be 0"));
        }
    }

    // Contrary to what the gQUIC wire spec says, the 0x04 bit only
    // signals a diversification nonce for packets sent by the server.
    let mut diversification_nonce: &[u8] = &[];
    if sent_by == Perspective::Server && flags & 0x04 > 0 && !version_flag && !reset_flag {
        if buf.len() < pos + DIVERSIFICATION_NONCE_LEN {
            return Err(Error::Eof);
        }
        diversification_nonce = &buf[pos..pos + DIVERSIFICATION_NONCE_LEN];
        pos += DIVERSIFICATION_NONCE_LEN;
    }

    let mut version = Version::NEGOTIATION;
    if !reset_flag && version_flag {
        if sent_by == Perspective::Server {
            // Version negotiation packet: the rest is the version list.
            let list = &buf[pos..];
            if list.is_empty() {
                return Err(Error::InvalidVersionNegotiationPacket("empty version list"));
            }
            if list.len() % 4 != 0 {
                return Err(Error::InvalidVersionNegotiationPacket(
                    "version list not a multiple of 4 bytes",
                ));
            }
            let supported_versions = list
                .chunks_exact(4)
                .map(|c| Version(u32::from_be_bytes([c[0], c[1], c[2], c[3]])))
                .collect();
            log::debug!("parsed gQUIC Version Negotiation packet: conn id {:02x?}", conn_id);
            return Ok((
                Header::VersionNegotiation(VersionNegotiationHeader {
                    dest_conn_id: conn_id,
                    src_conn_id: conn_id,
                    supported_versions,
                }),
                buf.len(),
            ));
        }
        // Sent by the client: a single proposed version.
        version = Version(read_u32(&buf[pos..])?);
        pos += 4;
    }

    log::debug!(
        "parsed Public Header: conn id {:02x?}, version {:#x}, nonce {} bytes",
        conn_id,
        version.0,
        diversification_nonce.len()
    );
    Ok((
        Header::Public(PublicHeader {
            dest_conn_id: conn_id,
            src_conn_id: conn_id,
            omit_conn_id,
            version_flag,
            reset_flag,
            version,
            diversification_nonce,
            parsed_len: pos,
        }),
        pos,
    ))
}

/// Read the fixed-width packet number that follows a Public Header.
/// The width comes from bits 4-5 of the public flag byte.
pub fn read_public_packet_number(
    buf: &[u8],
    flags: u8,
) -> Result<(u64, PacketNumberLen), Error> {
    let pn_len = match flags & 0x30 {
        0x00 => PacketNumberLen::One,
        0x10 => PacketNumberLen::Two,
        0x20 => PacketNumberLen::Four,
        _ => return Err(Error::InvalidPacketNumberLen),
    };
    let pn = read_uintn(buf, pn_len.len())?;
    Ok((pn, pn_len))
}

/// Serialize a Public Header followed by the packet number.
pub(crate) fn write_public_header(
    h: &PublicHeader<'_>,
    out: &mut Vec<u8>,
    pn: u64,
    pn_len: PacketNumberLen,
    perspective: Perspective,
) -> Result<(), Error> {
    if h.version_flag && perspective == Perspective::Server {
        return Err(Error::InvalidPacketHeader(
            "PublicHeader: Writing of Version Negotiation Packets not supported",
        ));
    }
    if h.reset_flag {
        return Err(Error::InvalidPacketHeader(
            "PublicHeader: Writing of Public Reset Packets not supported",
        ));
    }
    if h.dest_conn_id != h.src_conn_id {
        return Err(Error::MismatchedPublicConnectionIds);
    }
    if h.dest_conn_id.len() != CONNECTION_ID_LEN {
        return Err(Error::WrongPublicConnectionIdLen(h.dest_conn_id.len()));
    }

    let mut flags = 0u8;
    if h.version_flag {
        flags |= 0x01;
    }
    if !h.omit_conn_id {
        flags |= 0x08;
    }
    if !h.diversification_nonce.is_empty() {
        if h.diversification_nonce.len() != DIVERSIFICATION_NONCE_LEN {
            return Err(Error::InvalidPacketHeader("invalid diversification nonce length"));
        }
        flags |= 0x04;
    }
    flags |= match pn_len {
        PacketNumberLen::One => 0x00,
        PacketNumberLen::Two => 0x10,
        PacketNumberLen::Four => 0x20,
    };
    out.push(flags);

    if !h.omit_conn_id {
        out.extend_from_slice(h.dest_conn_id);
    }
    if h.version_flag && perspective == Perspective::Client {
        out.extend_from_slice(&h.version.0.to_be_bytes());
    }
    out.extend_from_slice(h.diversification_nonce);

    match pn_len {
        PacketNumberLen::One => out.push(pn as u8),
        PacketNumberLen::Two => out.extend_from_slice(&(pn as u16).to_be_bytes()),
        PacketNumberLen::Four => out.extend_from_slice(&(pn as u32).to_be_bytes()),
    }
    Ok(())
}

/// Exact length [`write_public_header`] produces for this header.
pub(crate) fn public_header_length(
    h: &PublicHeader<'_>,
    pn_len: PacketNumberLen,
    perspective: Perspective,
) -> usize {
    let mut length = 1; // public flags
    if !h.omit_conn_id {
        length += CONNECTION_ID_LEN;
    }
    if h.version_flag && perspective == Perspective::Client {
        length += 4;
    }
    length += h.diversification_nonce.len();
    length + pn_len.len()
}

/// Build a gQUIC Version Negotiation packet, sent by the server.
pub fn compose_gquic_version_negotiation(conn_id: &[u8], versions: &[Version]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + conn_id.len() + 4 * (versions.len() + 1));
    out.push(0x01 | 0x08);
    out.extend_from_slice(conn_id);
    out.extend_from_slice(&crate::packet::long_header::RESERVED_VERSION.0.to_be_bytes());
    for v in versions {
        out.extend_from_slice(&v.0.to_be_bytes());
    }
    out
}
