//! IETF Long Header parsing and serialization, including Version
//! Negotiation packets.

use alloc::vec::Vec;

use crate::error::Error;
use crate::packet::{
    Header, LongHeader, LongType, Version, VersionNegotiationHeader, CONNECTION_ID_LEN,
};
use crate::varint::{read_u32, read_varint, write_varint, write_varint_packet_number, PacketNumberLen};

/// Reserved version included in Version Negotiation packets so peers do
/// not ossify on the supported-version list.
pub const RESERVED_VERSION: Version = Version(0x1a2a_3a4a);

/// Parse a Long Header. The caller has already checked that the high bit
/// of the first byte is set.
///
/// Returns the header and the number of bytes consumed (for Version
/// Negotiation packets, the whole buffer).
pub fn parse_long_header(buf: &[u8]) -> Result<(Header<'_>, usize), Error> {
    let type_byte = *buf.first().ok_or(Error::Eof)?;
    let version = Version(read_u32(&buf[1..])?);
    let conn_id_lens = *buf.get(5).ok_or(Error::Eof)?;
    let (dcil, scil) = decode_conn_id_lens(conn_id_lens);

    let mut pos = 6;
    if buf.len() < pos + dcil + scil {
        return Err(Error::Eof);
    }
    let dest_conn_id = &buf[pos..pos + dcil];
    pos += dcil;
    let src_conn_id = &buf[pos..pos + scil];
    pos += scil;

    if version == Version::NEGOTIATION {
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
        log::debug!(
            "parsed Version Negotiation packet: dcid {:02x?}, scid {:02x?}",
            dest_conn_id,
            src_conn_id
        );
        return Ok((
            Header::VersionNegotiation(VersionNegotiationHeader {
                dest_conn_id,
                src_conn_id,
                supported_versions,
            }),
            buf.len(),
        ));
    }

    let (length, consumed) = read_varint(&buf[pos..])?;
    pos += consumed;
    let long_type = LongType::from_byte(type_byte & 0x7f)?;

    log::debug!(
        "parsed Long Header: type {:?}, version {:#x}, dcid {:02x?}, scid {:02x?}, length {}",
        long_type,
        version.0,
        dest_conn_id,
        src_conn_id,
        length
    );
    Ok((
        Header::Long(LongHeader {
            long_type,
            version,
            dest_conn_id,
            src_conn_id,
            length,
            parsed_len: pos,
        }),
        pos,
    ))
}

/// Serialize a Long Header followed by the packet number.
pub(crate) fn write_long_header(
    h: &LongHeader<'_>,
    out: &mut Vec<u8>,
    pn: u64,
    pn_len: PacketNumberLen,
) -> Result<(), Error> {
    if h.src_conn_id.len() != CONNECTION_ID_LEN {
        return Err(Error::WrongSrcConnectionIdLen {
            len: h.src_conn_id.len(),
            expected: CONNECTION_ID_LEN,
        });
    }
    out.push(0x80 | h.long_type as u8);
    out.extend_from_slice(&h.version.0.to_be_bytes());
    out.push(encode_conn_id_lens(h.dest_conn_id, h.src_conn_id)?);
    out.extend_from_slice(h.dest_conn_id);
    out.extend_from_slice(h.src_conn_id);
    write_varint(out, h.length);
    write_varint_packet_number(out, pn, pn_len);
    Ok(())
}

/// Build an IETF Version Negotiation packet.
pub fn compose_version_negotiation(
    dest_conn_id: &[u8],
    src_conn_id: &[u8],
    versions: &[Version],
) -> Result<Vec<u8>, Error> {
    let mut out = Vec::with_capacity(6 + dest_conn_id.len() + src_conn_id.len() + 4 * (versions.len() + 1));
    out.push(0x80);
    out.extend_from_slice(&Version::NEGOTIATION.0.to_be_bytes());
    out.push(encode_conn_id_lens(dest_conn_id, src_conn_id)?);
    out.extend_from_slice(dest_conn_id);
    out.extend_from_slice(src_conn_id);
    out.extend_from_slice(&RESERVED_VERSION.0.to_be_bytes());
    for v in versions {
        out.extend_from_slice(&v.0.to_be_bytes());
    }
    Ok(out)
}

/// Each nibble encodes a connection ID length: 0 means absent, otherwise
/// `nibble + 3` bytes.
fn decode_conn_id_lens(encoded: u8) -> (usize, usize) {
    (decode_single_len(encoded >> 4), decode_single_len(encoded & 0x0f))
}

fn decode_single_len(encoded: u8) -> usize {
    if encoded == 0 {
        0
    } else {
        encoded as usize + 3
    }
}

fn encode_conn_id_lens(dest: &[u8], src: &[u8]) -> Result<u8, Error> {
    let dcil = encode_single_len(dest.len())?;
    let scil = encode_single_len(src.len())?;
    Ok(dcil << 4 | scil)
}

fn encode_single_len(len: usize) -> Result<u8, Error> {
    if len == 0 {
        return Ok(0);
    }
    if !(4..=18).contains(&len) {
        return Err(Error::InvalidConnectionIdLen(len));
    }
    Ok((len - 3) as u8)
}
