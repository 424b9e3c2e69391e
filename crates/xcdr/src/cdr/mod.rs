// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! CDR stream engine: three wire-compatible encoding versions over one
//! state machine.
//!
//! The stream reads, writes and sizes user data as on-the-wire byte buffers
//! with strict alignment, endianness conversion and DDS-XTypes extensibility
//! framing:
//!
//! - [`CdrVersion::Basic`]: plain CDR, final types only, 8-byte max alignment
//! - [`CdrVersion::Xcdr1`]: parameter-list (PID) framing for mutable types
//!   and optional members, 8-byte max alignment
//! - [`CdrVersion::Xcdr2`]: DHEADER/EMHEADER framing, 4-byte max alignment
//!
//! Errors are sticky: the first failure poisons the stream until
//! [`stream::CdrStream::reset`] is called.

pub mod endian;
mod framing;
mod nav;
pub mod stream;

pub use endian::Endianness;
pub use nav::Entity;
pub use stream::CdrStream;

use std::fmt;

/// Encoding version of a CDR stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CdrVersion {
    Basic,
    Xcdr1,
    Xcdr2,
}

impl CdrVersion {
    /// Maximum alignment boundary of this encoding version.
    #[must_use]
    pub const fn max_align(self) -> usize {
        match self {
            CdrVersion::Basic | CdrVersion::Xcdr1 => 8,
            CdrVersion::Xcdr2 => 4,
        }
    }
}

/// Operation the stream is currently performing.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Serialize into the supplied buffer.
    Write,
    /// Deserialize from the supplied buffer.
    Read,
    /// Advance the cursor only, yielding the exact serialized size.
    Move,
    /// Advance the cursor to the worst-case size; saturates on unbounded
    /// members.
    Max,
}

/// Which members are streamed, and in which order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KeyMode {
    /// All members, in declaration order.
    NotKey,
    /// Key members only, in declaration order.
    Unsorted,
    /// Key members only, in ascending member-id order (key-hash layout).
    Sorted,
}

impl KeyMode {
    /// True for the two key-only modes.
    #[must_use]
    pub const fn is_key(self) -> bool {
        matches!(self, KeyMode::Unsorted | KeyMode::Sorted)
    }
}

/// Sticky error flags accumulated by a stream.
///
/// Once any bit is set every subsequent operation fails with the error of
/// the first bit until the stream is reset.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SerializationStatus(u16);

impl SerializationStatus {
    pub const READ_BOUND_EXCEEDED: u16 = 0x0001;
    pub const WRITE_BOUND_EXCEEDED: u16 = 0x0002;
    pub const ILLEGAL_FIELD_VALUE: u16 = 0x0004;
    pub const MUST_UNDERSTAND_FAIL: u16 = 0x0008;
    pub const INVALID_PL_ENTRY: u16 = 0x0010;
    pub const INVALID_DL_ENTRY: u16 = 0x0020;

    #[must_use]
    pub const fn is_clear(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn contains(self, bit: u16) -> bool {
        self.0 & bit != 0
    }

    pub fn insert(&mut self, bit: u16) {
        self.0 |= bit;
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    /// The error corresponding to the lowest set bit, if any.
    #[must_use]
    pub fn first_error(self) -> Option<CdrError> {
        if self.contains(Self::READ_BOUND_EXCEEDED) {
            Some(CdrError::ReadBoundExceeded)
        } else if self.contains(Self::WRITE_BOUND_EXCEEDED) {
            Some(CdrError::WriteBoundExceeded)
        } else if self.contains(Self::ILLEGAL_FIELD_VALUE) {
            Some(CdrError::IllegalFieldValue)
        } else if self.contains(Self::MUST_UNDERSTAND_FAIL) {
            Some(CdrError::MustUnderstandFail)
        } else if self.contains(Self::INVALID_PL_ENTRY) {
            Some(CdrError::InvalidPlEntry)
        } else if self.contains(Self::INVALID_DL_ENTRY) {
            Some(CdrError::InvalidDlEntry)
        } else {
            None
        }
    }
}

/// Error raised by CDR stream operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CdrError {
    /// The cursor would cross the buffer bound while reading.
    ReadBoundExceeded,
    /// The cursor would cross the buffer bound while writing, or a bounded
    /// container holds more entries than its bound allows.
    WriteBoundExceeded,
    /// A feature unsupported by the selected encoding version was streamed
    /// (optional member or bitmask under Basic CDR, non-final type under
    /// Basic CDR outside the key-hash path).
    IllegalFieldValue,
    /// An unknown member arrived flagged must-understand, or a required
    /// member was absent when a mutable body closed.
    MustUnderstandFail,
    /// A malformed XCDR1 parameter-list header.
    InvalidPlEntry,
    /// A malformed XCDR2 delimiter, or a body overrunning its frame.
    InvalidDlEntry,
    /// API misuse: invalid encoding selection, discriminator/label mismatch
    /// on a union setter, malformed encapsulation header.
    InvalidArgument(String),
}

impl CdrError {
    /// The sticky status bit recorded for this error, if it is a wire error.
    #[must_use]
    pub fn status_bit(&self) -> Option<u16> {
        match self {
            CdrError::ReadBoundExceeded => Some(SerializationStatus::READ_BOUND_EXCEEDED),
            CdrError::WriteBoundExceeded => Some(SerializationStatus::WRITE_BOUND_EXCEEDED),
            CdrError::IllegalFieldValue => Some(SerializationStatus::ILLEGAL_FIELD_VALUE),
            CdrError::MustUnderstandFail => Some(SerializationStatus::MUST_UNDERSTAND_FAIL),
            CdrError::InvalidPlEntry => Some(SerializationStatus::INVALID_PL_ENTRY),
            CdrError::InvalidDlEntry => Some(SerializationStatus::INVALID_DL_ENTRY),
            CdrError::InvalidArgument(_) => None,
        }
    }
}

impl fmt::Display for CdrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CdrError::ReadBoundExceeded => write!(f, "read crossed the buffer bound"),
            CdrError::WriteBoundExceeded => write!(f, "write crossed the buffer bound"),
            CdrError::IllegalFieldValue => {
                write!(f, "field not representable in the selected CDR version")
            }
            CdrError::MustUnderstandFail => write!(f, "must-understand member not handled"),
            CdrError::InvalidPlEntry => write!(f, "invalid parameter-list entry"),
            CdrError::InvalidDlEntry => write!(f, "invalid delimiter header"),
            CdrError::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
        }
    }
}

impl std::error::Error for CdrError {}

/// Convenient alias for stream results.
pub type Result<T> = core::result::Result<T, CdrError>;

/// Fixed-size scalar transferable by the stream.
///
/// Sealed over the arithmetic types and `bool`; `bool` is transferred as a
/// single byte holding `0x00` or `0x01`.
pub trait CdrScalar: Copy + Default {
    const SIZE: usize;

    /// Encode into `out` (exactly `SIZE` bytes) in the given byte order.
    fn encode(self, endianness: Endianness, out: &mut [u8]);

    /// Decode from `raw` (exactly `SIZE` bytes) in the given byte order.
    fn decode(endianness: Endianness, raw: &[u8]) -> Self;
}

/// Generate `CdrScalar` impls for the arithmetic types: native-order byte
/// transfer with a conditional swap against the stream's order.
macro_rules! impl_cdr_scalar {
    ($ty:ty) => {
        impl CdrScalar for $ty {
            const SIZE: usize = std::mem::size_of::<$ty>();

            fn encode(self, endianness: Endianness, out: &mut [u8]) {
                let value = endian::transfer_and_swap(self, endianness.swapped());
                out.copy_from_slice(&value.to_ne_bytes());
            }

            fn decode(endianness: Endianness, raw: &[u8]) -> Self {
                let mut bytes = [0u8; std::mem::size_of::<$ty>()];
                bytes.copy_from_slice(raw);
                endian::transfer_and_swap(<$ty>::from_ne_bytes(bytes), endianness.swapped())
            }
        }
    };
}

impl_cdr_scalar!(u8);
impl_cdr_scalar!(i8);
impl_cdr_scalar!(u16);
impl_cdr_scalar!(i16);
impl_cdr_scalar!(u32);
impl_cdr_scalar!(i32);
impl_cdr_scalar!(u64);
impl_cdr_scalar!(i64);
impl_cdr_scalar!(f32);
impl_cdr_scalar!(f64);

impl CdrScalar for bool {
    const SIZE: usize = 1;

    fn encode(self, _endianness: Endianness, out: &mut [u8]) {
        out[0] = u8::from(self);
    }

    fn decode(_endianness: Endianness, raw: &[u8]) -> Self {
        raw[0] != 0
    }
}
