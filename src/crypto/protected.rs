//! The AEAD the unpacker consumes: payload protection plus packet-number
//! encryption behind one contract.
//!
//! `data` in the packet-number operations always starts at the first
//! packet-number octet, i.e. just past the header, and runs to the end of
//! the packet.

use alloc::vec::Vec;

use crate::crypto::aead::AeadAesGcm;
use crate::crypto::pn_cipher::PnCipher;
use crate::error::Error;
use crate::varint::{read_varint_packet_number, PacketNumberLen};

/// Offset of the CTR sample window from the start of the packet number.
///
/// Fixed at 4 (the widest possible packet number) so the window never
/// depends on the still-unknown packet number length.
const SAMPLE_OFFSET: usize = 4;

/// AEAD with packet-number crypto.
pub struct ProtectedAead {
    aead: AeadAesGcm,
    pn: PnCipher,
}

impl ProtectedAead {
    pub fn new(aead: AeadAesGcm, pn: PnCipher) -> Self {
        ProtectedAead { aead, pn }
    }

    /// See [`AeadAesGcm::seal`].
    pub fn seal(
        &self,
        dst: &mut Vec<u8>,
        plain: &[u8],
        packet_number: u64,
        associated_data: &[u8],
    ) -> Result<(), Error> {
        self.aead.seal(dst, plain, packet_number, associated_data)
    }

    /// See [`AeadAesGcm::open`].
    pub fn open(
        &self,
        dst: &mut Vec<u8>,
        src: &[u8],
        packet_number: u64,
        associated_data: &[u8],
    ) -> Result<usize, Error> {
        self.aead.open(dst, src, packet_number, associated_data)
    }

    pub fn overhead(&self) -> usize {
        self.aead.overhead()
    }

    /// Mask the packet number in place.
    ///
    /// `data[..pn_len]` must hold the cleartext varint-encoded packet number
    /// and the rest of `data` the already-sealed payload the sample is
    /// drawn from.
    pub fn encrypt_packet_number(
        &self,
        data: &mut [u8],
        pn_len: PacketNumberLen,
    ) -> Result<(), Error> {
        let iv = self.sample(data)?;
        self.pn.encrypt(&mut data[..pn_len.len()], &iv)
    }

    /// Recover the packet number from the head of `data`.
    ///
    /// The width is unknown until after decryption, so the leading 4 bytes
    /// are unmasked into a scratch copy and the width read from the two
    /// leading bits of the result. The wire bytes are not modified.
    pub fn decrypt_packet_number(&self, data: &[u8]) -> Result<(u64, PacketNumberLen), Error> {
        let iv = self.sample(data)?;
        let mut scratch = [0u8; 4];
        scratch.copy_from_slice(&data[..4]);
        self.pn.decrypt(&mut scratch, &iv)?;
        read_varint_packet_number(&scratch)
    }

    /// The CTR IV: `iv_size` bytes of ciphertext sampled [`SAMPLE_OFFSET`]
    /// bytes past the packet number start. If the packet is too short the
    /// window shifts left to end at the last byte; a window that would
    /// start before the packet number is an error.
    fn sample(&self, data: &[u8]) -> Result<[u8; 16], Error> {
        let sample_len = self.pn.iv_size();
        let mut offset = SAMPLE_OFFSET as isize;
        if SAMPLE_OFFSET + sample_len > data.len() {
            offset = data.len() as isize - sample_len as isize;
        }
        if offset < 0 {
            return Err(Error::PnSamplingOffset(offset));
        }
        let offset = offset as usize;
        let mut iv = [0u8; 16];
        iv.copy_from_slice(&data[offset..offset + sample_len]);
        Ok(iv)
    }
}
