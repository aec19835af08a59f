//! The receive pipeline: header to packet number to plaintext to frames.
//!
//! A connection owns one unpacker per dialect. Unpacking is pure CPU
//! work: parse the truncated packet number, reconstruct the full one,
//! authenticate and decrypt the payload with the header bytes as
//! associated data, then parse frames in wire order. The plaintext lives
//! in a pooled scratch buffer that is released on every exit path;
//! frames copy their data out before that happens.

use alloc::vec::Vec;

use crate::crypto::key_derivation::{derive_aes_keys, new_null_aead, TlsExporter};
use crate::crypto::protected::ProtectedAead;
use crate::crypto::EncryptionLevel;
use crate::error::Error;
use crate::frame::{parse_next_frame, Frame};
use crate::packet::number::infer_packet_number;
use crate::packet::{public_header, Header, Perspective, Version};
use crate::pool;
use crate::varint::{write_varint_packet_number, PacketNumberLen};

/// The result of a successful unpack. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnpackedPacket {
    pub packet_number: u64,
    pub encryption_level: EncryptionLevel,
    /// Frames in on-the-wire order.
    pub frames: Vec<Frame>,
}

/// One encryption level's opener, as the IETF unpacker sees it.
pub trait Opener {
    fn open(
        &self,
        dst: &mut Vec<u8>,
        src: &[u8],
        packet_number: u64,
        associated_data: &[u8],
    ) -> Result<usize, Error>;

    fn decrypt_packet_number(&self, data: &[u8]) -> Result<(u64, PacketNumberLen), Error>;
}

impl Opener for ProtectedAead {
    fn open(
        &self,
        dst: &mut Vec<u8>,
        src: &[u8],
        packet_number: u64,
        associated_data: &[u8],
    ) -> Result<usize, Error> {
        ProtectedAead::open(self, dst, src, packet_number, associated_data)
    }

    fn decrypt_packet_number(&self, data: &[u8]) -> Result<(u64, PacketNumberLen), Error> {
        ProtectedAead::decrypt_packet_number(self, data)
    }
}

/// The gQUIC crypto setup: one opener that works its way down the
/// installed levels and reports which one succeeded.
pub trait GquicOpener {
    fn open(
        &self,
        dst: &mut Vec<u8>,
        src: &[u8],
        packet_number: u64,
        associated_data: &[u8],
    ) -> Result<(usize, EncryptionLevel), Error>;
}

/// Hands the IETF unpacker the opener for each header shape. The
/// handshake opener exists from the first packet; the 1-RTT opener only
/// after the TLS handshake completes.
pub trait OpeningManager {
    type Opener: Opener;

    fn handshake_opener(&self) -> &Self::Opener;
    fn one_rtt_opener(&self) -> Result<&Self::Opener, Error>;
}

/// Keys for one connection, per encryption epoch. New epochs replace the
/// whole opener; nothing is mutated in place.
pub struct OpenerSet {
    handshake: ProtectedAead,
    one_rtt: Option<ProtectedAead>,
}

impl OpenerSet {
    /// Set up the handshake epoch from the client's initial connection ID.
    pub fn new(connection_id: &[u8], perspective: Perspective) -> Result<Self, Error> {
        Ok(OpenerSet {
            handshake: new_null_aead(connection_id, perspective)?,
            one_rtt: None,
        })
    }

    /// Re-derive the handshake keys. Used when the server settles on a
    /// different connection ID than the client's initial choice.
    pub fn install_handshake_keys(
        &mut self,
        connection_id: &[u8],
        perspective: Perspective,
    ) -> Result<(), Error> {
        self.handshake = new_null_aead(connection_id, perspective)?;
        Ok(())
    }

    /// Install the 1-RTT keys from the completed TLS handshake.
    pub fn install_1rtt_keys<T: TlsExporter + ?Sized>(
        &mut self,
        tls: &T,
        perspective: Perspective,
    ) -> Result<(), Error> {
        self.one_rtt = Some(derive_aes_keys(tls, perspective)?);
        Ok(())
    }

    pub fn has_1rtt_keys(&self) -> bool {
        self.one_rtt.is_some()
    }

    /// The sealer for outgoing packets at the current highest epoch.
    pub fn sealer(&self) -> &ProtectedAead {
        self.one_rtt.as_ref().unwrap_or(&self.handshake)
    }
}

impl OpeningManager for OpenerSet {
    type Opener = ProtectedAead;

    fn handshake_opener(&self) -> &ProtectedAead {
        &self.handshake
    }

    fn one_rtt_opener(&self) -> Result<&ProtectedAead, Error> {
        self.one_rtt.as_ref().ok_or(Error::Crypto("no 1-RTT opener"))
    }
}

/// Unpacker for gQUIC packets.
pub struct GquicUnpacker<A> {
    aead: A,
    largest_rcvd_pn: u64,
    version: Version,
    decryption_failures: u64,
}

impl<A: GquicOpener> GquicUnpacker<A> {
    pub fn new(aead: A, version: Version) -> Self {
        GquicUnpacker { aead, largest_rcvd_pn: 0, version, decryption_failures: 0 }
    }

    /// Largest packet number any successful unpack has produced.
    pub fn largest_received_packet_number(&self) -> u64 {
        self.largest_rcvd_pn
    }

    /// Failed decryptions so far; upstream uses this for stateless-reset
    /// thresholds.
    pub fn decryption_failures(&self) -> u64 {
        self.decryption_failures
    }

    /// Unpack one packet. `data` is the whole datagram the header was
    /// parsed from.
    pub fn unpack(&mut self, hdr: &Header<'_>, data: &[u8]) -> Result<UnpackedPacket, Error> {
        let public = match hdr {
            Header::Public(h) => h,
            _ => {
                return Err(Error::InvalidPacketHeader(
                    "gQUIC unpacker needs a Public Header",
                ))
            }
        };
        let flags = *data.first().ok_or(Error::Eof)?;
        let rest = data.get(public.parsed_len..).ok_or(Error::Eof)?;
        let (wire_pn, pn_len) = public_header::read_public_packet_number(rest, flags)?;
        let packet_number =
            infer_packet_number(pn_len, self.largest_rcvd_pn, wire_pn, self.version);

        let payload_offset = public.parsed_len + pn_len.len();
        let payload = &data[payload_offset..];

        let mut scratch = pool::acquire();
        let (len, encryption_level) = match self.aead.open(
            &mut scratch,
            payload,
            packet_number,
            &data[..payload_offset],
        ) {
            Ok(v) => v,
            Err(e) => {
                self.decryption_failures += 1;
                return Err(wrap_decryption_error(e));
            }
        };

        self.largest_rcvd_pn = self.largest_rcvd_pn.max(packet_number);
        let frames = parse_frames(&scratch[..len], packet_number, pn_len, self.version)?;
        log::trace!(
            "unpacked gQUIC packet {} at level {}: {} frames",
            packet_number,
            encryption_level,
            frames.len()
        );
        Ok(UnpackedPacket { packet_number, encryption_level, frames })
    }
}

/// Unpacker for IETF packets.
pub struct IetfUnpacker<M> {
    openers: M,
    largest_rcvd_pn: u64,
    version: Version,
    decryption_failures: u64,
}

impl<M: OpeningManager> IetfUnpacker<M> {
    pub fn new(openers: M, version: Version) -> Self {
        IetfUnpacker { openers, largest_rcvd_pn: 0, version, decryption_failures: 0 }
    }

    pub fn largest_received_packet_number(&self) -> u64 {
        self.largest_rcvd_pn
    }

    pub fn decryption_failures(&self) -> u64 {
        self.decryption_failures
    }

    pub fn openers(&self) -> &M {
        &self.openers
    }

    /// Access to the key manager, for installing new epochs.
    pub fn openers_mut(&mut self) -> &mut M {
        &mut self.openers
    }

    /// Unpack one packet. `data` is the whole datagram the header was
    /// parsed from; the packet number octets in it are still masked.
    pub fn unpack(&mut self, hdr: &Header<'_>, data: &[u8]) -> Result<UnpackedPacket, Error> {
        let (parsed_len, is_long) = match hdr {
            Header::Long(h) => (h.parsed_len, true),
            Header::Short(h) => (h.parsed_len, false),
            _ => {
                return Err(Error::InvalidPacketHeader(
                    "cannot unpack a version negotiation or public header packet",
                ))
            }
        };
        let version = self.version;
        let largest = self.largest_rcvd_pn;

        // A Short Header packet arriving before the 1-RTT keys exist is
        // not decryptable yet; upstream may buffer and retry.
        let (opener, encryption_level) = if is_long {
            (self.openers.handshake_opener(), EncryptionLevel::Unencrypted)
        } else {
            (self.openers.one_rtt_opener()?, EncryptionLevel::ForwardSecure)
        };

        let pn_data = data.get(parsed_len..).ok_or(Error::Eof)?;
        let (wire_pn, pn_len) = opener.decrypt_packet_number(pn_data)?;
        let packet_number = infer_packet_number(pn_len, largest, wire_pn, version);

        let payload_offset = parsed_len + pn_len.len();
        if data.len() < payload_offset {
            return Err(Error::Eof);
        }
        // The sealer authenticated the header with the cleartext packet
        // number, so rebuild the associated data with the unmasked octets.
        let mut associated_data = Vec::with_capacity(payload_offset);
        associated_data.extend_from_slice(&data[..parsed_len]);
        write_varint_packet_number(&mut associated_data, wire_pn, pn_len);

        let mut scratch = pool::acquire();
        let len = match opener.open(
            &mut scratch,
            &data[payload_offset..],
            packet_number,
            &associated_data,
        ) {
            Ok(n) => n,
            Err(e) => {
                self.decryption_failures += 1;
                return Err(wrap_decryption_error(e));
            }
        };

        self.largest_rcvd_pn = largest.max(packet_number);
        let frames = parse_frames(&scratch[..len], packet_number, pn_len, version)?;
        log::trace!(
            "unpacked IETF packet {} at level {}: {} frames",
            packet_number,
            encryption_level,
            frames.len()
        );
        Ok(UnpackedPacket { packet_number, encryption_level, frames })
    }
}

/// Read frames from a decrypted payload until it is exhausted.
fn parse_frames(
    decrypted: &[u8],
    packet_number: u64,
    pn_len: PacketNumberLen,
    version: Version,
) -> Result<Vec<Frame>, Error> {
    if decrypted.is_empty() {
        return Err(Error::MissingPayload);
    }
    let mut frames = Vec::with_capacity(2);
    let mut rest = decrypted;
    while !rest.is_empty() {
        match parse_next_frame(rest, packet_number, pn_len, version)? {
            None => break,
            Some((frame, consumed)) => {
                frames.push(frame);
                rest = &rest[consumed..];
            }
        }
    }
    Ok(frames)
}

/// Anything that goes wrong between sampling and tag verification is a
/// decryption failure to the session above; inner detail is preserved
/// for logs only.
fn wrap_decryption_error(e: Error) -> Error {
    match e {
        Error::DecryptionFailure(_) | Error::PnSamplingOffset(_) => e,
        Error::Eof => Error::DecryptionFailure("unexpected end of packet"),
        _ => Error::DecryptionFailure("AEAD open failed"),
    }
}
