// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Extensibility framing: DHEADER delimiters, XCDR2 EMHEADERs and XCDR1
//! parameter-list (PID) headers, with the back-patching both write sides
//! need.
//!
//! Wire layouts follow DDS-XTypes 1.3. All headers are written in the
//! stream's byte order.

use super::stream::{Frame, SATURATED};
use super::{CdrError, CdrScalar, CdrStream, CdrVersion, KeyMode, Mode, Result};
use crate::props::{BitBound, EntityProperty, Extensibility, MemberIdSet, Node};

/// XCDR1 reserved parameter ids and flags.
pub(crate) const PID_EXTENDED: u16 = 0x3F01;
pub(crate) const PID_LIST_END: u16 = 0x3F02;
pub(crate) const PID_FLAG_IMPL_EXTENSION: u16 = 0x8000;
pub(crate) const PID_FLAG_MUST_UNDERSTAND: u16 = 0x4000;
pub(crate) const PID_MASK: u16 = 0x3FFF;
/// Largest member id the short PID form can carry.
pub(crate) const PID_SHORT_ID_MAX: u32 = 0x3F00;
pub(crate) const PID_EXT_FLAG_MUST_UNDERSTAND: u32 = 0x4000_0000;
pub(crate) const PID_EXT_ID_MASK: u32 = 0x0FFF_FFFF;

/// XCDR2 EMHEADER layout.
pub(crate) const EM_FLAG_MUST_UNDERSTAND: u32 = 0x8000_0000;
pub(crate) const EM_LC_SHIFT: u32 = 28;
pub(crate) const EM_ID_MASK: u32 = 0x0FFF_FFFF;
pub(crate) const EM_LC_NEXTINT: u32 = 4;

impl<'a> CdrStream<'a> {
    /// Open a constructed type body: validates version support and emits or
    /// consumes the DHEADER of appendable/mutable bodies under XCDR2.
    pub fn start_struct(&mut self, node: Node<'_>) -> Result<()> {
        self.check_status()?;
        let prop = node.prop();
        match self.version {
            CdrVersion::Basic => {
                // The key-hash (Sorted) path serializes every type through
                // the basic stream without framing.
                if prop.ext != Extensibility::Final && self.key_mode != KeyMode::Sorted {
                    return Err(self.fail(CdrError::IllegalFieldValue));
                }
                self.frames.push(Frame::Plain);
                Ok(())
            }
            CdrVersion::Xcdr1 => {
                self.frames.push(Frame::Plain);
                Ok(())
            }
            CdrVersion::Xcdr2 => {
                if prop.ext == Extensibility::Final {
                    self.frames.push(Frame::Plain);
                    Ok(())
                } else {
                    self.push_delimited()
                }
            }
        }
    }

    /// Close a constructed type body: back-patches the DHEADER, writes the
    /// XCDR1 PID-list terminator, skips forward-compatible growth and, for
    /// mutable reads, checks that every required member was seen.
    pub fn finish_struct(&mut self, node: Node<'_>, seen: &MemberIdSet) -> Result<()> {
        self.check_status()?;
        let prop = node.prop();
        if self.version == CdrVersion::Xcdr1 && prop.ext == Extensibility::Mutable {
            match self.mode {
                Mode::Write | Mode::Move | Mode::Max => {
                    self.align(4, true)?;
                    self.write_pid_half(PID_FLAG_MUST_UNDERSTAND | PID_LIST_END)?;
                    self.write_pid_half(0)?;
                }
                Mode::Read => self.check_struct_completeness(node, seen)?,
            }
        }
        if self.version == CdrVersion::Xcdr2
            && prop.ext == Extensibility::Mutable
            && self.mode == Mode::Read
        {
            self.check_struct_completeness(node, seen)?;
        }
        self.pop_delimited()
    }

    /// Open one member: optional presence handling and, inside mutable
    /// bodies, the member header. Returns whether the member value is
    /// present and must be streamed.
    pub fn start_member(&mut self, prop: &EntityProperty, present: bool) -> Result<bool> {
        self.check_status()?;
        match self.version {
            CdrVersion::Basic => {
                if prop.is_optional && self.key_mode != KeyMode::Sorted {
                    return Err(self.fail(CdrError::IllegalFieldValue));
                }
                self.frames.push(Frame::BareMember);
                Ok(present)
            }
            CdrVersion::Xcdr1 => self.start_member_v1(prop, present),
            CdrVersion::Xcdr2 => self.start_member_v2(prop, present),
        }
    }

    fn start_member_v1(&mut self, prop: &EntityProperty, present: bool) -> Result<bool> {
        let mutable_parent = prop.parent_ext == Extensibility::Mutable;
        match self.mode {
            Mode::Write | Mode::Move | Mode::Max => {
                if mutable_parent {
                    if prop.is_optional && !present {
                        // absent optionals are simply left out of the list
                        self.frames.push(Frame::BareMember);
                        return Ok(false);
                    }
                    self.write_pid_header(prop)?;
                    Ok(true)
                } else if prop.is_optional {
                    // optionals outside mutable bodies are PID-framed; an
                    // absent value patches to a length-0 sentinel header
                    self.write_pid_header(prop)?;
                    Ok(present)
                } else {
                    self.frames.push(Frame::BareMember);
                    Ok(present)
                }
            }
            Mode::Read => {
                if mutable_parent {
                    // header already consumed by entity navigation
                    Ok(true)
                } else if prop.is_optional {
                    self.read_pid_optional_header()
                } else {
                    self.frames.push(Frame::BareMember);
                    Ok(true)
                }
            }
        }
    }

    fn start_member_v2(&mut self, prop: &EntityProperty, present: bool) -> Result<bool> {
        let mutable_parent = prop.parent_ext == Extensibility::Mutable;
        match self.mode {
            Mode::Write | Mode::Move | Mode::Max => {
                if mutable_parent {
                    if prop.is_optional && !present {
                        self.frames.push(Frame::BareMember);
                        return Ok(false);
                    }
                    self.write_em_header(prop)?;
                    Ok(true)
                } else {
                    if prop.is_optional {
                        self.write_scalar(u8::from(present))?;
                    }
                    self.frames.push(Frame::BareMember);
                    Ok(present)
                }
            }
            Mode::Read => {
                if mutable_parent {
                    Ok(true)
                } else {
                    let present = if prop.is_optional {
                        self.read_scalar::<u8>()? != 0
                    } else {
                        true
                    };
                    self.frames.push(Frame::BareMember);
                    Ok(present)
                }
            }
        }
    }

    /// Close one member: back-patch its length header (write) or jump to
    /// its recorded end (read), and record it as seen.
    pub fn finish_member(
        &mut self,
        prop: &EntityProperty,
        present: bool,
        seen: &mut MemberIdSet,
    ) -> Result<()> {
        self.check_status()?;
        let Some(frame) = self.frames.pop() else {
            return Err(CdrError::InvalidArgument("unbalanced member frame".into()));
        };
        match frame {
            Frame::BareMember => {}
            Frame::PidWrite {
                length_pos,
                extended,
                data_start,
            } => {
                let length = self.position.saturating_sub(data_start);
                if extended {
                    self.patch_scalar_at(length_pos, length as u32)?;
                } else {
                    if length > usize::from(u16::MAX) {
                        return Err(self.fail(CdrError::InvalidPlEntry));
                    }
                    self.patch_scalar_at(length_pos, length as u16)?;
                }
            }
            Frame::EmWrite {
                nextint_pos,
                data_start,
            } => {
                let length = self.position.saturating_sub(data_start);
                self.patch_scalar_at(nextint_pos, length as u32)?;
            }
            Frame::MemberRead { end } => {
                if self.position > end {
                    let err = match self.version {
                        CdrVersion::Xcdr2 => CdrError::InvalidDlEntry,
                        _ => CdrError::InvalidPlEntry,
                    };
                    return Err(self.fail(err));
                }
                self.position = end;
            }
            _ => {
                return Err(CdrError::InvalidArgument("unbalanced member frame".into()));
            }
        }
        if self.mode == Mode::Read && present && !prop.ignore {
            seen.insert(prop.member_id);
        }
        Ok(())
    }

    /// Skip a member the local type does not know. Rejects members flagged
    /// must-understand.
    pub fn skip_entity(&mut self, prop: &EntityProperty) -> Result<()> {
        self.check_status()?;
        if prop.ignore && prop.must_understand {
            return Err(self.fail(CdrError::MustUnderstandFail));
        }
        if matches!(self.frames.last(), Some(Frame::MemberRead { .. })) {
            if let Some(Frame::MemberRead { end }) = self.frames.pop() {
                self.position = end;
            }
        }
        Ok(())
    }

    /// Open a collection body. Under XCDR2 non-primitive element content is
    /// framed by a DHEADER; primitive content is tightly packed.
    pub fn start_consecutive(&mut self, primitive: bool) -> Result<()> {
        self.check_status()?;
        if self.version == CdrVersion::Xcdr2 && !primitive {
            self.push_delimited()
        } else {
            self.frames.push(Frame::Plain);
            Ok(())
        }
    }

    /// Close a collection body opened with [`CdrStream::start_consecutive`].
    pub fn finish_consecutive(&mut self) -> Result<()> {
        self.check_status()?;
        self.pop_delimited()
    }

    // ------------------------------------------------------------------
    // DHEADER frames
    // ------------------------------------------------------------------

    fn push_delimited(&mut self) -> Result<()> {
        self.align(4, true)?;
        match self.mode {
            Mode::Write => {
                let header_pos = self.position;
                self.put_bytes(&[0u8; 4])?;
                self.frames.push(Frame::DelimitedWrite { header_pos });
                Ok(())
            }
            Mode::Read => {
                let length = self.read_scalar::<u32>()? as usize;
                if length > self.bytes_remaining() {
                    return Err(self.fail(CdrError::InvalidDlEntry));
                }
                let end = self.position + length;
                self.frames.push(Frame::DelimitedRead { end });
                Ok(())
            }
            Mode::Move | Mode::Max => {
                self.advance(4);
                self.frames.push(Frame::DelimitedSize);
                Ok(())
            }
        }
    }

    fn pop_delimited(&mut self) -> Result<()> {
        let Some(frame) = self.frames.pop() else {
            return Err(CdrError::InvalidArgument("unbalanced frame stack".into()));
        };
        match frame {
            Frame::Plain | Frame::DelimitedSize => Ok(()),
            Frame::DelimitedWrite { header_pos } => {
                let body_len = (self.position - header_pos - 4) as u32;
                self.patch_scalar_at(header_pos, body_len)
            }
            Frame::DelimitedRead { end } => {
                if self.position > end {
                    return Err(self.fail(CdrError::InvalidDlEntry));
                }
                // unread remainder is forward-compatible growth
                self.position = end;
                Ok(())
            }
            _ => Err(CdrError::InvalidArgument("unbalanced frame stack".into())),
        }
    }

    /// End of the innermost read frame bounding the cursor, if any.
    pub(crate) fn innermost_read_end(&self) -> Option<usize> {
        self.frames.iter().rev().find_map(|frame| match frame {
            Frame::DelimitedRead { end } | Frame::MemberRead { end } => Some(*end),
            _ => None,
        })
    }

    // ------------------------------------------------------------------
    // XCDR1 PID headers
    // ------------------------------------------------------------------

    fn write_pid_half(&mut self, half: u16) -> Result<()> {
        let mut raw = [0u8; 2];
        half.encode(self.stream_endianness, &mut raw);
        self.put_bytes(&raw)
    }

    /// Emit the PID header for one member. Members of known fixed size use
    /// the short form; everything else uses the PID-extended form whose
    /// 32-bit length is patched on finish.
    fn write_pid_header(&mut self, prop: &EntityProperty) -> Result<()> {
        self.align(4, true)?;
        let must_understand = prop.must_understand || prop.is_key;
        let extended = prop.bit_bound == BitBound::Unset || prop.member_id > PID_SHORT_ID_MAX;
        if extended {
            self.write_pid_half(PID_FLAG_MUST_UNDERSTAND | PID_EXTENDED)?;
            self.write_pid_half(8)?;
            let mut id = prop.member_id & PID_EXT_ID_MASK;
            if must_understand {
                id |= PID_EXT_FLAG_MUST_UNDERSTAND;
            }
            let mut raw = [0u8; 4];
            id.encode(self.stream_endianness, &mut raw);
            self.put_bytes(&raw)?;
            let length_pos = self.position;
            self.put_bytes(&[0u8; 4])?;
            self.frames.push(Frame::PidWrite {
                length_pos,
                extended: true,
                data_start: self.position,
            });
        } else {
            let mut flags_pid = (prop.member_id as u16) & PID_MASK;
            if must_understand {
                flags_pid |= PID_FLAG_MUST_UNDERSTAND;
            }
            self.write_pid_half(flags_pid)?;
            let length_pos = self.position;
            self.put_bytes(&[0u8; 2])?;
            self.frames.push(Frame::PidWrite {
                length_pos,
                extended: false,
                data_start: self.position,
            });
        }
        Ok(())
    }

    /// Parse the PID header framing an optional member outside a mutable
    /// body; a length of zero is the absent-value sentinel.
    fn read_pid_optional_header(&mut self) -> Result<bool> {
        self.align(4, false)?;
        let flags_pid = self.read_scalar::<u16>()?;
        let short_length = self.read_scalar::<u16>()?;
        let length = if flags_pid & PID_MASK == PID_EXTENDED {
            if short_length != 8 {
                return Err(self.fail(CdrError::InvalidPlEntry));
            }
            let _extended_id = self.read_scalar::<u32>()?;
            self.read_scalar::<u32>()? as usize
        } else {
            usize::from(short_length)
        };
        if length == 0 {
            self.frames.push(Frame::BareMember);
            return Ok(false);
        }
        if length > self.bytes_remaining() {
            return Err(self.fail(CdrError::InvalidPlEntry));
        }
        self.frames.push(Frame::MemberRead {
            end: self.position + length,
        });
        Ok(true)
    }

    // ------------------------------------------------------------------
    // XCDR2 EMHEADERs
    // ------------------------------------------------------------------

    /// Emit the EMHEADER for one mutable member. The writer always uses
    /// LC = 4 (NEXTINT) and patches the length on finish.
    fn write_em_header(&mut self, prop: &EntityProperty) -> Result<()> {
        self.align(4, true)?;
        let mut header = (EM_LC_NEXTINT << EM_LC_SHIFT) | (prop.member_id & EM_ID_MASK);
        if prop.must_understand || prop.is_key {
            header |= EM_FLAG_MUST_UNDERSTAND;
        }
        let mut raw = [0u8; 4];
        header.encode(self.stream_endianness, &mut raw);
        self.put_bytes(&raw)?;
        let nextint_pos = self.position;
        self.put_bytes(&[0u8; 4])?;
        self.frames.push(Frame::EmWrite {
            nextint_pos,
            data_start: self.position,
        });
        Ok(())
    }

    fn patch_scalar_at<T: CdrScalar>(&mut self, at: usize, value: T) -> Result<()> {
        if self.position == SATURATED {
            return Ok(());
        }
        let mut raw = [0u8; 8];
        value.encode(self.stream_endianness, &mut raw[..T::SIZE]);
        self.patch_bytes(at, &raw[..T::SIZE])
    }

    /// Every member that is required in the current key mode must have
    /// been seen while the body was read. Key members are required only
    /// when declared (or in the key-only modes, whose streams carry
    /// exactly the key members); keys implied by keylessness stay
    /// tolerant of mutable evolution.
    fn check_struct_completeness(&mut self, node: Node<'_>, seen: &MemberIdSet) -> Result<()> {
        let keys_required = self.key_mode.is_key() || node.has_explicit_keys();
        let mut cursor = node.first_entity(self.key_mode);
        while let Some(member) = cursor {
            let prop = member.prop();
            let required = prop.must_understand || (prop.is_key && keys_required);
            if required && !prop.is_optional && !seen.contains(&prop.member_id) {
                return Err(self.fail(CdrError::MustUnderstandFail));
            }
            cursor = member.next_entity(self.key_mode);
        }
        Ok(())
    }
}
