// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Time-ordered document identifiers.
//!
//! Ids are 24 lowercase hex characters: 4 bytes of big-endian Unix seconds
//! followed by 8 random bytes. Lexical order therefore matches creation
//! order, which is what cursor pagination over clubs relies on.

use ring::rand::{SecureRandom, SystemRandom};

const ID_LEN: usize = 24;

/// Generate a new id stamped with the current time.
pub fn new_object_id() -> String {
    object_id_at(chrono::Utc::now().timestamp())
}

/// Generate an id stamped with the given Unix time.
pub fn object_id_at(unix_secs: i64) -> String {
    let secs = u32::try_from(unix_secs.max(0)).unwrap_or(u32::MAX);
    let mut random = [0u8; 8];
    if SystemRandom::new().fill(&mut random).is_err() {
        // Fall back to clock entropy; ids only need to be unique, not secret.
        let nanos = chrono::Utc::now().timestamp_subsec_nanos() as u64;
        random = (nanos ^ (unix_secs as u64).rotate_left(17)).to_be_bytes();
    }
    format!("{:08x}{}", secs, hex::encode(random))
}

/// Whether `raw` is a well-formed id.
pub fn is_object_id(raw: &str) -> bool {
    raw.len() == ID_LEN && raw.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
