// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The sertype bridge: encapsulation headers, encoding selection and the
//! byte-buffer operations the runtime invokes per topic type, plus the
//! process-wide type registry.

use super::{
    read, stream_size, write, AllowableEncodings, CdrStreamable, TopicType, ENCODING_XCDR1,
    ENCODING_XCDR2,
};
use crate::cdr::endian::Endianness;
use crate::cdr::{CdrError, CdrStream, CdrVersion, KeyMode, Result};
use crate::props::Extensibility;
use dashmap::DashMap;
use std::borrow::Cow;
use std::marker::PhantomData;
use std::sync::OnceLock;

/// Data representation selected for one serialization.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CdrEncoding {
    Xcdr1,
    Xcdr2,
}

impl CdrEncoding {
    #[must_use]
    pub const fn bit(self) -> AllowableEncodings {
        match self {
            CdrEncoding::Xcdr1 => ENCODING_XCDR1,
            CdrEncoding::Xcdr2 => ENCODING_XCDR2,
        }
    }

    #[must_use]
    pub const fn version(self) -> CdrVersion {
        match self {
            CdrEncoding::Xcdr1 => CdrVersion::Xcdr1,
            CdrEncoding::Xcdr2 => CdrVersion::Xcdr2,
        }
    }
}

/// Length of the CDR encapsulation header preceding every payload.
pub const ENCAPSULATION_LEN: usize = 4;

// Representation identifiers of the encapsulation header.
const REPR_CDR_BE: u16 = 0x0000;
const REPR_CDR_LE: u16 = 0x0001;
const REPR_XCDR1_PL_BE: u16 = 0x0006;
const REPR_XCDR1_PL_LE: u16 = 0x0007;
const REPR_XCDR2_BE: u16 = 0x0010;
const REPR_XCDR2_LE: u16 = 0x0011;
const REPR_XCDR2_PL_BE: u16 = 0x0012;
const REPR_XCDR2_PL_LE: u16 = 0x0013;
const REPR_XCDR2_DELIMITED_BE: u16 = 0x0014;
const REPR_XCDR2_DELIMITED_LE: u16 = 0x0015;

fn representation_id(encoding: CdrEncoding, ext: Extensibility, endianness: Endianness) -> u16 {
    let big = endianness == Endianness::Big;
    match (encoding, ext) {
        (CdrEncoding::Xcdr1, Extensibility::Mutable) => {
            if big {
                REPR_XCDR1_PL_BE
            } else {
                REPR_XCDR1_PL_LE
            }
        }
        (CdrEncoding::Xcdr1, _) => {
            if big {
                REPR_CDR_BE
            } else {
                REPR_CDR_LE
            }
        }
        (CdrEncoding::Xcdr2, Extensibility::Final) => {
            if big {
                REPR_XCDR2_BE
            } else {
                REPR_XCDR2_LE
            }
        }
        (CdrEncoding::Xcdr2, Extensibility::Appendable) => {
            if big {
                REPR_XCDR2_DELIMITED_BE
            } else {
                REPR_XCDR2_DELIMITED_LE
            }
        }
        (CdrEncoding::Xcdr2, Extensibility::Mutable) => {
            if big {
                REPR_XCDR2_PL_BE
            } else {
                REPR_XCDR2_PL_LE
            }
        }
    }
}

fn decode_representation(id: u16) -> Result<(CdrVersion, Endianness)> {
    match id {
        REPR_CDR_BE | REPR_XCDR1_PL_BE => Ok((CdrVersion::Xcdr1, Endianness::Big)),
        REPR_CDR_LE | REPR_XCDR1_PL_LE => Ok((CdrVersion::Xcdr1, Endianness::Little)),
        REPR_XCDR2_BE | REPR_XCDR2_PL_BE | REPR_XCDR2_DELIMITED_BE => {
            Ok((CdrVersion::Xcdr2, Endianness::Big))
        }
        REPR_XCDR2_LE | REPR_XCDR2_PL_LE | REPR_XCDR2_DELIMITED_LE => {
            Ok((CdrVersion::Xcdr2, Endianness::Little))
        }
        other => Err(CdrError::InvalidArgument(format!(
            "unknown representation identifier {:#06x}",
            other
        ))),
    }
}

/// State of a chunk loaned from the shared-memory transport.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DataState {
    /// The chunk holds a constructed sample; no deserialization needed.
    Raw,
    /// The chunk holds serialized bytes.
    Serialized,
}

/// A loaned chunk, tagged with its [`DataState`].
pub enum LoanedChunk<'a, T> {
    Raw(&'a T),
    Serialized(&'a [u8]),
}

impl<T> LoanedChunk<'_, T> {
    #[must_use]
    pub fn data_state(&self) -> DataState {
        match self {
            LoanedChunk::Raw(_) => DataState::Raw,
            LoanedChunk::Serialized(_) => DataState::Serialized,
        }
    }
}

/// Serializer handle for one topic type.
///
/// Stateless apart from the preferred write endianness; operations may run
/// concurrently on distinct samples.
pub struct SerType<T> {
    endianness: Endianness,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for SerType<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SerType<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_endianness(Endianness::native())
    }

    #[must_use]
    pub fn with_endianness(endianness: Endianness) -> Self {
        SerType {
            endianness,
            _marker: PhantomData,
        }
    }
}

impl<T: TopicType + CdrStreamable> SerType<T> {
    fn check_encoding(encoding: CdrEncoding) -> Result<()> {
        if T::ALLOWABLE_ENCODINGS & encoding.bit() == 0 {
            return Err(CdrError::InvalidArgument(format!(
                "encoding {:?} not allowed for {}",
                encoding,
                T::TYPE_NAME
            )));
        }
        Ok(())
    }

    /// Serialize a sample: 4-byte encapsulation header plus payload, sized
    /// by a cursor pass first.
    pub fn serialize(
        &self,
        sample: &T,
        encoding: CdrEncoding,
        key_mode: KeyMode,
    ) -> Result<Vec<u8>> {
        Self::check_encoding(encoding)?;
        let payload = stream_size(sample, encoding.version(), key_mode)?;
        let mut out = vec![0u8; ENCAPSULATION_LEN + payload];
        let id = representation_id(encoding, T::EXTENSIBILITY, self.endianness);
        out[0..2].copy_from_slice(&id.to_be_bytes());
        // options: reserved, zero on write
        let mut stream =
            CdrStream::for_write(encoding.version(), self.endianness, &mut out[ENCAPSULATION_LEN..]);
        write(&mut stream, sample, key_mode)?;
        Ok(out)
    }

    /// Validate the encapsulation header and deserialize a sample.
    pub fn deserialize(&self, bytes: &[u8], key_mode: KeyMode) -> Result<T> {
        if bytes.len() < ENCAPSULATION_LEN {
            return Err(CdrError::InvalidArgument(
                "payload shorter than the encapsulation header".into(),
            ));
        }
        let id = u16::from_be_bytes([bytes[0], bytes[1]]);
        let (version, endianness) = decode_representation(id)?;
        let padding_hint = bytes[3] & 0x03;
        log::trace!(
            "deserialize {}: representation {:#06x}, padding hint {}",
            T::TYPE_NAME,
            id,
            padding_hint
        );
        let mut value = T::default();
        let mut stream = CdrStream::for_read(version, endianness, &bytes[ENCAPSULATION_LEN..]);
        read(&mut stream, &mut value, key_mode)?;
        Ok(value)
    }

    /// Size of the encapsulated serialization of `sample`.
    pub fn serialized_size(
        &self,
        sample: &T,
        encoding: CdrEncoding,
        key_mode: KeyMode,
    ) -> Result<usize> {
        Self::check_encoding(encoding)?;
        Ok(ENCAPSULATION_LEN + stream_size(sample, encoding.version(), key_mode)?)
    }

    /// Resolve a loaned chunk into a sample, skipping deserialization for
    /// raw chunks.
    pub fn sample_from_chunk<'c>(
        &self,
        chunk: LoanedChunk<'c, T>,
        key_mode: KeyMode,
    ) -> Result<Cow<'c, T>>
    where
        T: Clone,
    {
        match chunk {
            LoanedChunk::Raw(sample) => Ok(Cow::Borrowed(sample)),
            LoanedChunk::Serialized(bytes) => Ok(Cow::Owned(self.deserialize(bytes, key_mode)?)),
        }
    }

    /// The 16-byte DDS instance key hash of `sample`.
    #[cfg(feature = "keyhash")]
    pub fn key_hash(&self, sample: &T) -> Result<[u8; 16]> {
        super::keyhash::key_hash(sample)
    }
}

/// Everything the runtime records about one registered topic type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeRegistration {
    pub type_name: &'static str,
    pub extensibility: Extensibility,
    pub is_keyless: bool,
    pub is_self_contained: bool,
    pub allowable_encodings: AllowableEncodings,
    pub type_info: Option<&'static [u8]>,
    pub type_map: Option<&'static [u8]>,
}

/// Process-wide registry of topic types, keyed by type name.
///
/// Built lazily, idempotent per entry, cleared on runtime shutdown.
#[derive(Default)]
pub struct TypeRegistry {
    entries: DashMap<&'static str, TypeRegistration>,
}

impl TypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        TypeRegistry::default()
    }

    /// The process-wide registry instance.
    pub fn global() -> &'static TypeRegistry {
        static REGISTRY: OnceLock<TypeRegistry> = OnceLock::new();
        REGISTRY.get_or_init(TypeRegistry::new)
    }

    /// Register a topic type. Re-registration with identical traits is a
    /// no-op; conflicting traits under one name are rejected.
    pub fn register<T: TopicType>(&self) -> Result<()> {
        let name = T::TYPE_NAME;
        if name.is_empty() || !name.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) {
            return Err(CdrError::InvalidArgument(format!(
                "type name {:?} is not in the ASCII subset",
                name
            )));
        }
        let registration = TypeRegistration {
            type_name: name,
            extensibility: T::EXTENSIBILITY,
            is_keyless: T::IS_KEYLESS,
            is_self_contained: T::IS_SELF_CONTAINED,
            allowable_encodings: T::ALLOWABLE_ENCODINGS,
            type_info: T::type_info(),
            type_map: T::type_map(),
        };
        if let Some(existing) = self.entries.get(name) {
            if *existing == registration {
                return Ok(());
            }
            return Err(CdrError::InvalidArgument(format!(
                "type name {} already registered with different traits",
                name
            )));
        }
        log::debug!("registered topic type {}", name);
        self.entries.insert(name, registration);
        Ok(())
    }

    #[must_use]
    pub fn lookup(&self, type_name: &str) -> Option<TypeRegistration> {
        self.entries
            .get(type_name)
            .map(|entry| entry.value().clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every registration; called when the runtime shuts down.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

/// Associate a generated topic type with the process-wide registry.
#[macro_export]
macro_rules! register_topic_type {
    ($ty:ty) => {
        $crate::topic::sertype::TypeRegistry::global().register::<$ty>()
    };
}
