// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fuzz target for CDR deserialization.
//!
//! Feeds arbitrary bytes to the stream primitives and both extended
//! framings. None of these operations may panic on any input.

#![no_main]

use libfuzzer_sys::fuzz_target;
use xcdr::{CdrStream, CdrVersion, Endianness, KeyMode};

fuzz_target!(|data: &[u8]| {
    // Low-level scalar and container reads must fail cleanly on any input.
    for version in [CdrVersion::Basic, CdrVersion::Xcdr1, CdrVersion::Xcdr2] {
        for endianness in [Endianness::Big, Endianness::Little] {
            let mut is = CdrStream::for_read(version, endianness, data);
            let _ = is.read_scalar::<u32>();
            let _ = is.read_scalar::<f64>();
            let _ = is.read_string(0);
            let mut seq: Vec<u32> = Vec::new();
            let _ = is.read_scalar_seq(&mut seq, 16);

            let mut is = CdrStream::for_read(version, endianness, data);
            while is.bytes_remaining() > 0 {
                if is.read_scalar::<u8>().is_err() {
                    break;
                }
            }
        }
    }

    // Mutable-body framing: headers parsed from the wire must be either
    // consumed or rejected, never trusted into a panic.
    let mut records = vec![xcdr::EntityProperty::root(xcdr::Extensibility::Mutable)];
    records.push(xcdr::EntityProperty::new(
        1,
        1,
        false,
        xcdr::BitBound::B32,
        xcdr::Extensibility::Final,
        false,
    ));
    let props = xcdr::PropertyList::finish(records, &xcdr::KeyEndpoints::new());
    for version in [CdrVersion::Xcdr1, CdrVersion::Xcdr2] {
        let mut is = CdrStream::for_read(version, Endianness::Little, data);
        is.set_key_mode(KeyMode::NotKey);
        if is.start_struct(props.root()).is_ok() {
            let mut seen = xcdr::MemberIdSet::new();
            let mut guard = 0usize;
            let mut entity = is.first_entity(props.root());
            while let Ok(Some(member)) = entity {
                guard += 1;
                if guard > 4096 {
                    break;
                }
                let ok = if member.prop().ignore {
                    is.skip_entity(member.prop()).is_ok()
                } else {
                    is.start_member(member.prop(), true).is_ok()
                        && is.read_scalar::<u32>().is_ok()
                        && is.finish_member(member.prop(), true, &mut seen).is_ok()
                };
                if !ok {
                    break;
                }
                entity = is.next_entity(props.root(), &member);
            }
            let _ = is.finish_struct(props.root(), &seen);
        }
    }
});
