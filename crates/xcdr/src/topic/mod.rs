// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Topic-type traits and the streaming entry points generated code plugs
//! into.

#[cfg(feature = "keyhash")]
pub mod keyhash;
pub mod sertype;

use crate::cdr::{CdrStream, CdrVersion, KeyMode, Result};
use crate::props::{EntityProperty, Extensibility, KeyEndpoints, Node, PropertyList};

/// Bitmask of data representations a type may be published with.
pub type AllowableEncodings = u16;

/// XCDR version 1 (and plain CDR) data representation.
pub const ENCODING_XCDR1: AllowableEncodings = 0x0001;
/// XCDR version 2 data representation.
pub const ENCODING_XCDR2: AllowableEncodings = 0x0002;

/// Compile-time constants the runtime needs for one topic type.
///
/// Implementations are emitted by the code generator for every
/// non-`@nested` struct and union.
pub trait TopicType {
    /// Fully qualified type name, `::`-separated.
    const TYPE_NAME: &'static str;
    const EXTENSIBILITY: Extensibility = Extensibility::Final;
    /// No member of the type is a key.
    const IS_KEYLESS: bool = false;
    /// No strings, sequences, optionals or external members anywhere.
    const IS_SELF_CONTAINED: bool = true;
    const ALLOWABLE_ENCODINGS: AllowableEncodings = ENCODING_XCDR1 | ENCODING_XCDR2;

    /// Opaque TypeInfo blob for type discovery, when one was generated.
    #[must_use]
    fn type_info() -> Option<&'static [u8]> {
        None
    }

    /// Opaque TypeMap blob for type discovery, when one was generated.
    #[must_use]
    fn type_map() -> Option<&'static [u8]> {
        None
    }
}

/// Streaming contract emitted per generated type.
///
/// The write pass doubles as the sizing pass: running `write_cdr` on a
/// cursor-only stream yields the exact serialized length. The max pass is
/// value-independent and saturates on unbounded members.
pub trait CdrStreamable: Default {
    /// The finished property tree, built once per process.
    fn properties() -> &'static PropertyList;

    /// Raw declaration-order records; input to [`PropertyList::finish`].
    fn member_properties() -> Vec<EntityProperty>;

    /// Declared key paths; empty for keyless or implicitly keyed types.
    #[must_use]
    fn key_endpoints() -> KeyEndpoints {
        KeyEndpoints::new()
    }

    /// Serialize (write stream) or account for (sizing stream) `self`.
    fn write_cdr(&self, os: &mut CdrStream<'_>, node: Node<'_>) -> Result<()>;

    /// Deserialize into `self` from a read stream.
    fn read_cdr(&mut self, is: &mut CdrStream<'_>, node: Node<'_>) -> Result<()>;

    /// Account for the worst-case serialized size on a Max stream.
    fn max_cdr(xs: &mut CdrStream<'_>, node: Node<'_>) -> Result<()>;
}

/// Serialize `value` into `stream` with the given key mode.
pub fn write<T: CdrStreamable>(
    stream: &mut CdrStream<'_>,
    value: &T,
    key_mode: KeyMode,
) -> Result<()> {
    stream.set_key_mode(key_mode);
    value.write_cdr(stream, T::properties().root())
}

/// Deserialize from `stream` into `value` with the given key mode.
pub fn read<T: CdrStreamable>(
    stream: &mut CdrStream<'_>,
    value: &mut T,
    key_mode: KeyMode,
) -> Result<()> {
    stream.set_key_mode(key_mode);
    value.read_cdr(stream, T::properties().root())
}

/// Exact serialized size of `value` under `version`, via a cursor-only
/// pass.
pub fn stream_size<T: CdrStreamable>(
    value: &T,
    version: CdrVersion,
    key_mode: KeyMode,
) -> Result<usize> {
    let mut stream = CdrStream::for_size(version);
    stream.set_key_mode(key_mode);
    value.write_cdr(&mut stream, T::properties().root())?;
    Ok(stream.position())
}

/// Worst-case serialized size of any value of `T` under `version`, or
/// `None` when unbounded members make the size unlimited.
pub fn max_size<T: CdrStreamable>(version: CdrVersion, key_mode: KeyMode) -> Result<Option<usize>> {
    let mut stream = CdrStream::for_max(version);
    stream.set_key_mode(key_mode);
    T::max_cdr(&mut stream, T::properties().root())?;
    if stream.is_saturated() {
        Ok(None)
    } else {
        Ok(Some(stream.position()))
    }
}
