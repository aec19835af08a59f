//! IETF Short Header parsing and serialization.
//!
//! The destination connection ID carries no length on the wire; this
//! endpoint uses 8-byte connection IDs, so the parser reads exactly that.

use alloc::vec::Vec;

use crate::error::Error;
use crate::packet::{Header, ShortHeader, CONNECTION_ID_LEN};
use crate::varint::{write_varint_packet_number, PacketNumberLen};

/// Parse a Short Header. The caller has already checked that the high bit
/// of the first byte is clear.
pub fn parse_short_header(buf: &[u8]) -> Result<(Header<'_>, usize), Error> {
    let type_byte = *buf.first().ok_or(Error::Eof)?;
    if buf.len() < 1 + CONNECTION_ID_LEN {
        return Err(Error::Eof);
    }
    let dest_conn_id = &buf[1..1 + CONNECTION_ID_LEN];
    // Bits 2 and 3 must be set, bit 4 must be unset.
    if type_byte & 0x38 != 0x30 {
        return Err(Error::InvalidPacketHeader("invalid bits 3, 4 and 5"));
    }
    let key_phase = (type_byte & 0x40) >> 6;
    log::debug!("parsed Short Header: dcid {:02x?}, key phase {}", dest_conn_id, key_phase);
    Ok((
        Header::Short(ShortHeader {
            dest_conn_id,
            key_phase,
            parsed_len: 1 + CONNECTION_ID_LEN,
        }),
        1 + CONNECTION_ID_LEN,
    ))
}

/// Serialize a Short Header followed by the packet number.
pub(crate) fn write_short_header(
    h: &ShortHeader<'_>,
    out: &mut Vec<u8>,
    pn: u64,
    pn_len: PacketNumberLen,
) -> Result<(), Error> {
    let mut type_byte = 0x30u8;
    type_byte |= (h.key_phase & 0x01) << 6;
    out.push(type_byte);
    out.extend_from_slice(h.dest_conn_id);
    write_varint_packet_number(out, pn, pn_len);
    Ok(())
}
