//! The packet layer of a QUIC endpoint: wire-format header codecs for the
//! legacy gQUIC Public Header and the IETF long/short headers,
//! authenticated packet protection with packet-number encryption, and the
//! per-connection pipeline that turns a received datagram into parsed
//! frames at a known encryption level.
//!
//! The TLS handshake, stream multiplexing, loss recovery and the UDP
//! socket all live elsewhere: this crate consumes a [`TlsExporter`] and
//! produces [`UnpackedPacket`]s.
//!
//! [`TlsExporter`]: crypto::TlsExporter
//! [`UnpackedPacket`]: packet::unpack::UnpackedPacket

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

#[cfg(any(test, feature = "std"))]
extern crate std;

extern crate alloc;

pub mod crypto;
pub mod error;
pub mod frame;
pub mod packet;
pub mod pool;
pub mod varint;

pub use error::{Error, ErrorCode};
pub use packet::unpack::{
    GquicOpener, GquicUnpacker, IetfUnpacker, Opener, OpenerSet, OpeningManager, UnpackedPacket,
};
pub use packet::{parse_sent_by_client, parse_sent_by_server, Header, Perspective, Version};
pub use varint::PacketNumberLen;
