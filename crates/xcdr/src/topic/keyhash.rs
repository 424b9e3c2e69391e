// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The 16-byte DDS instance key hash.
//!
//! The hash is derived from the sorted-key serialization of a sample:
//! Basic CDR, big-endian, key members in ascending member-id order at every
//! level. Serializations of at most 16 bytes are used directly,
//! zero-padded; longer ones are replaced by their 128-bit MD5 digest, per
//! DDS-XTypes.

use super::{write, CdrStreamable};
use crate::cdr::endian::Endianness;
use crate::cdr::{CdrStream, CdrVersion, KeyMode, Result};

/// Compute the DDS key hash of one sample.
pub fn key_hash<T: CdrStreamable>(value: &T) -> Result<[u8; 16]> {
    let mut sizing = CdrStream::for_size(CdrVersion::Basic);
    sizing.set_key_mode(KeyMode::Sorted);
    write(&mut sizing, value, KeyMode::Sorted)?;
    let size = sizing.position();

    let mut serialized = vec![0u8; size];
    let mut stream = CdrStream::for_write(CdrVersion::Basic, Endianness::Big, &mut serialized);
    write(&mut stream, value, KeyMode::Sorted)?;

    let mut hash = [0u8; 16];
    if size <= 16 {
        hash[..size].copy_from_slice(&serialized);
    } else {
        use md5::{Digest, Md5};
        let mut hasher = Md5::new();
        hasher.update(&serialized);
        hash.copy_from_slice(&hasher.finalize());
    }
    Ok(hash)
}

/// The raw sorted-key serialization a hash is derived from; exposed for
/// canonicality checks and tests.
pub fn key_serialization<T: CdrStreamable>(value: &T) -> Result<Vec<u8>> {
    let mut sizing = CdrStream::for_size(CdrVersion::Basic);
    write(&mut sizing, value, KeyMode::Sorted)?;
    let size = sizing.position();
    let mut serialized = vec![0u8; size];
    let mut stream = CdrStream::for_write(CdrVersion::Basic, Endianness::Big, &mut serialized);
    write(&mut stream, value, KeyMode::Sorted)?;
    Ok(serialized)
}
