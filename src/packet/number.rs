//! Reconstruction of full packet numbers from their truncated wire form.

use crate::packet::Version;
use crate::varint::PacketNumberLen;

/// Infer the full packet number from the truncated wire value.
///
/// Picks the candidate congruent to `wire_pn` modulo the wire width that
/// lies closest to `largest + 1`. Ties go to the larger candidate: a
/// future packet is more likely than a retransmit from outside the window.
///
/// gQUIC packet numbers use the full 8/16/32 bits of their encoding;
/// varint packet numbers give two bits to the length tag, leaving
/// 7/14/30.
pub fn infer_packet_number(
    pn_len: PacketNumberLen,
    largest: u64,
    wire_pn: u64,
    version: Version,
) -> u64 {
    let bits = if version.uses_varint_packet_numbers() {
        match pn_len {
            PacketNumberLen::One => 7,
            PacketNumberLen::Two => 14,
            PacketNumberLen::Four => 30,
        }
    } else {
        match pn_len {
            PacketNumberLen::One => 8,
            PacketNumberLen::Two => 16,
            PacketNumberLen::Four => 32,
        }
    };
    let epoch_delta = 1u64 << bits;
    let expected = largest + 1;
    let epoch = largest & !(epoch_delta - 1);
    let prev_epoch_begin = epoch.saturating_sub(epoch_delta);
    let next_epoch_begin = epoch + epoch_delta;
    closest_to(
        expected,
        epoch + wire_pn,
        closest_to(expected, prev_epoch_begin + wire_pn, next_epoch_begin + wire_pn),
    )
}

fn closest_to(target: u64, a: u64, b: u64) -> u64 {
    if distance(target, a) < distance(target, b) {
        a
    } else {
        b
    }
}

fn distance(a: u64, b: u64) -> u64 {
    if a < b {
        b - a
    } else {
        a - b
    }
}
