// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Entity navigation: hands the generated switchboxes one member at a
//! time.
//!
//! Outside mutable bodies members come from the property tree in the order
//! the key mode dictates. Inside a mutable body being read, members come
//! from the wire: each PID header or EMHEADER is parsed, matched against
//! the parent's members, and unknown ids are surfaced as ignore-flagged
//! stand-ins for [`CdrStream::skip_entity`](super::CdrStream::skip_entity).

use super::framing::{
    EM_FLAG_MUST_UNDERSTAND, EM_ID_MASK, EM_LC_SHIFT, PID_EXTENDED, PID_EXT_FLAG_MUST_UNDERSTAND,
    PID_EXT_ID_MASK, PID_FLAG_IMPL_EXTENSION, PID_FLAG_MUST_UNDERSTAND, PID_LIST_END, PID_MASK,
};
use super::stream::Frame;
use super::{CdrError, CdrScalar, CdrStream, CdrVersion, Mode, Result};
use crate::props::{EntityProperty, Extensibility, Node};

/// One member handed to a generated switchbox.
#[derive(Copy, Clone)]
pub enum Entity<'p> {
    /// A member of the local type.
    Known(Node<'p>),
    /// A wire member the local type does not declare.
    Unknown(EntityProperty),
}

impl<'p> Entity<'p> {
    #[must_use]
    pub fn member_id(&self) -> u32 {
        self.prop().member_id
    }

    #[must_use]
    pub fn prop(&self) -> &EntityProperty {
        match self {
            Entity::Known(node) => node.prop(),
            Entity::Unknown(prop) => prop,
        }
    }

    /// Tree node of a known member, for recursing into nested types.
    #[must_use]
    pub fn node(&self) -> Option<Node<'p>> {
        match self {
            Entity::Known(node) => Some(*node),
            Entity::Unknown(_) => None,
        }
    }
}

impl<'a> CdrStream<'a> {
    /// First member of `node` in the current mode, or `None` for an empty
    /// body.
    pub fn first_entity<'p>(&mut self, node: Node<'p>) -> Result<Option<Entity<'p>>> {
        if self.reads_member_headers(node) {
            return self.read_member_header(node);
        }
        if self.mode == Mode::Read && self.frame_exhausted() {
            return Ok(None);
        }
        Ok(node.first_entity(self.key_mode).map(Entity::Known))
    }

    /// Member following `current` under `node`, or `None` when the body is
    /// done.
    pub fn next_entity<'p>(
        &mut self,
        node: Node<'p>,
        current: &Entity<'p>,
    ) -> Result<Option<Entity<'p>>> {
        if self.reads_member_headers(node) {
            return self.read_member_header(node);
        }
        if self.mode == Mode::Read && self.frame_exhausted() {
            return Ok(None);
        }
        match current {
            Entity::Known(member) => Ok(member.next_entity(self.key_mode).map(Entity::Known)),
            Entity::Unknown(_) => Ok(None),
        }
    }

    fn reads_member_headers(&self, node: Node<'_>) -> bool {
        self.mode == Mode::Read
            && self.version != CdrVersion::Basic
            && node.prop().ext == Extensibility::Mutable
    }

    /// True when the innermost delimited frame has no bytes left; trailing
    /// wire content belongs to a newer version of the type.
    fn frame_exhausted(&self) -> bool {
        self.innermost_read_end()
            .is_some_and(|end| self.position >= end)
    }

    fn read_member_header<'p>(&mut self, node: Node<'p>) -> Result<Option<Entity<'p>>> {
        match self.version {
            CdrVersion::Xcdr1 => self.read_pid_entity(node),
            CdrVersion::Xcdr2 => self.read_em_entity(node),
            CdrVersion::Basic => Ok(None),
        }
    }

    fn read_pid_entity<'p>(&mut self, node: Node<'p>) -> Result<Option<Entity<'p>>> {
        self.align(4, false)?;
        let flags_pid = self.read_scalar::<u16>()?;
        let short_length = self.read_scalar::<u16>()?;
        let pid = flags_pid & PID_MASK;
        if pid == PID_LIST_END {
            if short_length != 0 {
                return Err(self.fail(CdrError::InvalidPlEntry));
            }
            return Ok(None);
        }
        let implementation_extension = flags_pid & PID_FLAG_IMPL_EXTENSION != 0;
        let (member_id, must_understand, length) = if pid == PID_EXTENDED {
            if short_length != 8 {
                return Err(self.fail(CdrError::InvalidPlEntry));
            }
            let extended_id = self.read_scalar::<u32>()?;
            let length = self.read_scalar::<u32>()? as usize;
            (
                extended_id & PID_EXT_ID_MASK,
                extended_id & PID_EXT_FLAG_MUST_UNDERSTAND != 0,
                length,
            )
        } else {
            (
                u32::from(pid),
                flags_pid & PID_FLAG_MUST_UNDERSTAND != 0,
                usize::from(short_length),
            )
        };
        if length > self.bytes_remaining() {
            return Err(self.fail(CdrError::InvalidPlEntry));
        }
        self.frames.push(Frame::MemberRead {
            end: self.position + length,
        });
        Ok(Some(self.resolve_member(
            node,
            member_id,
            must_understand,
            implementation_extension,
        )))
    }

    fn read_em_entity<'p>(&mut self, node: Node<'p>) -> Result<Option<Entity<'p>>> {
        if self.frame_exhausted() {
            return Ok(None);
        }
        self.align(4, false)?;
        let header = self.read_scalar::<u32>()?;
        let must_understand = header & EM_FLAG_MUST_UNDERSTAND != 0;
        let length_code = (header >> EM_LC_SHIFT) & 0x7;
        let member_id = header & EM_ID_MASK;

        let end = match length_code {
            0..=3 => {
                let length = 1usize << length_code;
                self.position + length
            }
            4 => {
                let length = self.read_scalar::<u32>()? as usize;
                self.position.saturating_add(length)
            }
            // 5..=7: NEXTINT overlaps the member's own length field and
            // stays in the stream for the member read to consume.
            _ => {
                let endianness = self.stream_endianness;
                let raw = self.peek_bytes(4).map_err(|err| self.fail(err))?;
                let count = u32::decode(endianness, raw) as usize;
                let unit = match length_code {
                    5 => 1,
                    6 => 4,
                    _ => 8,
                };
                let Some(length) = count.checked_mul(unit) else {
                    return Err(self.fail(CdrError::InvalidPlEntry));
                };
                self.position.saturating_add(4).saturating_add(length)
            }
        };
        if end > self.position.saturating_add(self.bytes_remaining()) {
            return Err(self.fail(CdrError::InvalidPlEntry));
        }
        self.frames.push(Frame::MemberRead { end });
        Ok(Some(self.resolve_member(node, member_id, must_understand, false)))
    }

    fn resolve_member<'p>(
        &self,
        node: Node<'p>,
        member_id: u32,
        must_understand: bool,
        implementation_extension: bool,
    ) -> Entity<'p> {
        match node.find_member(member_id) {
            Some(member) => Entity::Known(member),
            None => Entity::Unknown(EntityProperty::unknown(
                member_id,
                must_understand,
                implementation_extension,
            )),
        }
    }
}
