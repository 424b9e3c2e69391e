// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # XCDR - DDS-XTypes serialization core
//!
//! The serialization engine behind a DDS language binding: three
//! wire-compatible CDR encodings (plain CDR, XCDR version 1, XCDR
//! version 2) driven by per-type entity-property trees, with the topic
//! traits and sertype bridge a DDS runtime consumes.
//!
//! ## Layers
//!
//! ```text
//! +--------------------------------------------------------------+
//! |  sertype bridge: encapsulation, encoding selection,          |
//! |  key hash, type registry                    (topic::sertype) |
//! +--------------------------------------------------------------+
//! |  topic traits + streaming entry points             (topic)   |
//! +--------------------------------------------------------------+
//! |  CDR stream engine: alignment, endianness, DHEADER /         |
//! |  EMHEADER / PID framing, entity navigation          (cdr)    |
//! +--------------------------------------------------------------+
//! |  entity-property trees: member ids, keys, extensibility      |
//! |  (props)                                                     |
//! +--------------------------------------------------------------+
//! ```
//!
//! Types, their streamer functions and their property-tree builders are
//! emitted from IDL by the companion `xcdr-gen` tool; this crate contains
//! everything those emissions plug into.
//!
//! ## Example
//!
//! ```rust,ignore
//! use xcdr::topic::sertype::{CdrEncoding, SerType};
//! use xcdr::KeyMode;
//!
//! let sertype = SerType::<SensorReading>::new();
//! let bytes = sertype.serialize(&sample, CdrEncoding::Xcdr2, KeyMode::NotKey)?;
//! let round_tripped = sertype.deserialize(&bytes, KeyMode::NotKey)?;
//! assert_eq!(sample, round_tripped);
//! ```

pub mod cdr;
pub mod props;
pub mod topic;

pub use cdr::endian::Endianness;
pub use cdr::{CdrError, CdrStream, CdrVersion, Entity, KeyMode, Mode, Result, SerializationStatus};
pub use props::{
    BitBound, EntityProperty, Extensibility, KeyEndpoints, MemberIdSet, Node, PropertyList,
};
pub use topic::sertype::{CdrEncoding, DataState, LoanedChunk, SerType, TypeRegistry};
pub use topic::{
    max_size, read, stream_size, write, AllowableEncodings, CdrStreamable, TopicType,
    ENCODING_XCDR1, ENCODING_XCDR2,
};

#[cfg(feature = "keyhash")]
pub use topic::keyhash::key_hash;
