// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-type entity-property trees.
//!
//! Every topic type carries a descriptor of its structural tree: one
//! [`EntityProperty`] record per member, stored flat in declaration order
//! with index links instead of pointers. The stream engine walks this tree
//! to locate members, drive declaration-order versus member-id ordering,
//! honor keys declared through annotations or a keylist, and resolve
//! mutable-struct member headers during read.
//!
//! Generated code produces the raw record vector and the key-endpoint map;
//! [`PropertyList::finish`] fuses them once per type, cached behind a
//! `OnceLock` in the generated `properties()` function. Finished lists never
//! mutate.

use crate::cdr::KeyMode;
use std::collections::{BTreeMap, BTreeSet};

/// Extensibility of a constructed type.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Extensibility {
    #[default]
    Final,
    Appendable,
    Mutable,
}

/// Minimal bit width able to represent an entity.
///
/// Unset for anything but primitive-sized entities and bit-bounded
/// enums/bitmasks.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum BitBound {
    #[default]
    Unset,
    B8,
    B16,
    B32,
    B64,
}

impl BitBound {
    /// Holder size in bytes; 0 when unset.
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            BitBound::Unset => 0,
            BitBound::B8 => 1,
            BitBound::B16 => 2,
            BitBound::B32 => 4,
            BitBound::B64 => 8,
        }
    }

    /// Bit bound of a primitive with the given byte size.
    #[must_use]
    pub const fn for_size(size: usize) -> Self {
        match size {
            1 => BitBound::B8,
            2 => BitBound::B16,
            4 => BitBound::B32,
            8 => BitBound::B64,
            _ => BitBound::Unset,
        }
    }
}

/// Members that were seen while reading a struct body.
pub type MemberIdSet = BTreeSet<u32>;

/// One node of a type's structural tree.
///
/// Link fields are indices into the owning [`PropertyList`] vector; they are
/// populated by [`PropertyList::finish`] and meaningless before that.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EntityProperty {
    /// Member id; the global field by which the entity is identified.
    pub member_id: u32,
    /// Nesting level from the root (root itself is 0).
    pub depth: u32,
    /// Extensibility of the entity itself.
    pub ext: Extensibility,
    /// Extensibility of the entity's parent.
    pub parent_ext: Extensibility,
    /// Bit bound for primitive-sized entities and bounded enums/bitmasks.
    pub bit_bound: BitBound,
    /// Discard the whole sample when the reader cannot handle this member.
    pub must_understand: bool,
    /// Set when the entity (or any member of it) needs XTypes support.
    pub xtypes_necessary: bool,
    /// XCDR1 parameter-list headers may carry this on read; never written.
    pub implementation_extension: bool,
    /// The member is unknown to the local type and must be skipped.
    pub ignore: bool,
    /// The member may be absent on the wire.
    pub is_optional: bool,
    /// The member participates in the key.
    pub is_key: bool,

    pub parent: Option<u32>,
    pub first_member: Option<u32>,
    pub next_on_level: Option<u32>,
    pub prev_on_level: Option<u32>,
    pub first_unsorted_key: Option<u32>,
    pub next_unsorted_key: Option<u32>,
    pub prev_unsorted_key: Option<u32>,
    pub first_sorted_key: Option<u32>,
    pub next_sorted_key: Option<u32>,
    pub prev_sorted_key: Option<u32>,
}

impl EntityProperty {
    /// Record for one member, as generated property builders push them.
    #[must_use]
    pub fn new(
        depth: u32,
        member_id: u32,
        is_optional: bool,
        bit_bound: BitBound,
        ext: Extensibility,
        must_understand: bool,
    ) -> Self {
        EntityProperty {
            member_id,
            depth,
            ext,
            bit_bound,
            must_understand,
            xtypes_necessary: ext != Extensibility::Final || is_optional,
            is_optional,
            ..EntityProperty::default()
        }
    }

    /// The synthetic root record carrying the type's extensibility.
    #[must_use]
    pub fn root(ext: Extensibility) -> Self {
        let mut prop = EntityProperty::new(0, 0, false, BitBound::Unset, ext, true);
        prop.must_understand = true;
        prop
    }

    /// A stand-in for a member id found on the wire but absent from the
    /// local type; always skipped, rejected when flagged must-understand.
    #[must_use]
    pub fn unknown(member_id: u32, must_understand: bool, implementation_extension: bool) -> Self {
        EntityProperty {
            member_id,
            must_understand,
            implementation_extension,
            ignore: true,
            ..EntityProperty::default()
        }
    }

    fn clear_links(&mut self) {
        self.parent = None;
        self.first_member = None;
        self.next_on_level = None;
        self.prev_on_level = None;
        self.first_unsorted_key = None;
        self.next_unsorted_key = None;
        self.prev_unsorted_key = None;
        self.first_sorted_key = None;
        self.next_sorted_key = None;
        self.prev_sorted_key = None;
    }
}

/// Set of key paths declared for a type, as member-id paths.
///
/// A nested map; an empty sub-map marks a leaf key endpoint. Populated from
/// `@key` annotations (single-id paths) or a keylist (full paths), consumed
/// once by [`PropertyList::finish`].
#[derive(Clone, Debug, Default)]
pub struct KeyEndpoints {
    branches: BTreeMap<u32, KeyEndpoints>,
}

impl KeyEndpoints {
    #[must_use]
    pub fn new() -> Self {
        KeyEndpoints::default()
    }

    /// Register one key path, from outermost member id to the endpoint.
    pub fn add_key_endpoint(&mut self, path: &[u32]) {
        if let Some((&head, rest)) = path.split_first() {
            self.branches.entry(head).or_default().add_key_endpoint(rest);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    fn get(&self, member_id: u32) -> Option<&KeyEndpoints> {
        self.branches.get(&member_id)
    }

    fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.branches.keys().copied()
    }
}

/// Finished, immutable property tree of one type.
#[derive(Clone, Debug)]
pub struct PropertyList {
    entries: Vec<EntityProperty>,
    /// Keys were declared (annotations or keylist) rather than implied by
    /// keylessness; implied keys are not required on read.
    explicit_keys: bool,
}

impl PropertyList {
    /// Fuse raw declaration-order records and the key-endpoint map into a
    /// finished tree.
    ///
    /// Steps: structural links by depth walk, sibling links, key flags
    /// (keyless types key every member recursively; otherwise flags
    /// propagate down the endpoint paths, preserving the key structure of
    /// nested types at path leaves), unsorted key lists in declaration
    /// order, sorted key lists by stable sort on ascending member id, and
    /// a bottom-up `xtypes_necessary` sweep.
    #[must_use]
    pub fn finish(records: Vec<EntityProperty>, keys: &KeyEndpoints) -> Self {
        let mut entries = records;
        if entries.is_empty() {
            entries.push(EntityProperty::root(Extensibility::Final));
        }
        link_structure(&mut entries);
        if keys.is_empty() {
            set_key_values(&mut entries, 0);
        } else {
            apply_endpoints(&mut entries, 0, keys);
        }
        link_key_lists(&mut entries);
        propagate_xtypes(&mut entries);
        log::trace!(
            "finished property tree: {} entries, keyed: {}",
            entries.len(),
            entries[0].first_unsorted_key.is_some()
        );
        PropertyList {
            entries,
            explicit_keys: !keys.is_empty(),
        }
    }

    /// True when the key members were declared rather than implied.
    #[must_use]
    pub fn has_explicit_keys(&self) -> bool {
        self.explicit_keys
    }

    #[must_use]
    pub fn root(&self) -> Node<'_> {
        Node { list: self, idx: 0 }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entry(&self, idx: u32) -> &EntityProperty {
        &self.entries[idx as usize]
    }

    pub(crate) fn node(&self, idx: u32) -> Node<'_> {
        Node { list: self, idx }
    }

    /// Append the finished tree of a nested type under the member record at
    /// the end of `records`, adjusting depths and dropping stale links.
    ///
    /// Key flags of the nested tree are preserved; the outer
    /// [`PropertyList::finish`] relies on them to expand nested key
    /// endpoints.
    pub fn append_nested(records: &mut Vec<EntityProperty>, nested: &PropertyList) {
        let base_depth = records.last().map_or(0, |member| member.depth);
        for entry in nested.entries.iter().skip(1) {
            let mut copy = *entry;
            copy.depth += base_depth;
            copy.clear_links();
            records.push(copy);
        }
    }
}

/// Handle to one node of a finished tree.
#[derive(Copy, Clone)]
pub struct Node<'p> {
    list: &'p PropertyList,
    idx: u32,
}

impl<'p> Node<'p> {
    #[must_use]
    pub fn prop(&self) -> &'p EntityProperty {
        self.list.entry(self.idx)
    }

    /// Whether the owning tree's keys were declared rather than implied.
    #[must_use]
    pub fn has_explicit_keys(&self) -> bool {
        self.list.has_explicit_keys()
    }

    /// First member under this node for the given key mode.
    #[must_use]
    pub fn first_entity(&self, key_mode: KeyMode) -> Option<Node<'p>> {
        let prop = self.prop();
        let first = match key_mode {
            KeyMode::NotKey => prop.first_member,
            KeyMode::Unsorted => prop.first_unsorted_key,
            KeyMode::Sorted => prop.first_sorted_key,
        };
        first.map(|idx| self.list.node(idx))
    }

    /// Next sibling of this node for the given key mode.
    #[must_use]
    pub fn next_entity(&self, key_mode: KeyMode) -> Option<Node<'p>> {
        let prop = self.prop();
        let next = match key_mode {
            KeyMode::NotKey => prop.next_on_level,
            KeyMode::Unsorted => prop.next_unsorted_key,
            KeyMode::Sorted => prop.next_sorted_key,
        };
        next.map(|idx| self.list.node(idx))
    }

    /// Member of this node with the given id, in declaration order.
    #[must_use]
    pub fn find_member(&self, member_id: u32) -> Option<Node<'p>> {
        let mut cursor = self.first_entity(KeyMode::NotKey);
        while let Some(node) = cursor {
            if node.prop().member_id == member_id {
                return Some(node);
            }
            cursor = node.next_entity(KeyMode::NotKey);
        }
        None
    }

    /// All direct members in declaration order.
    pub fn members(&self) -> impl Iterator<Item = Node<'p>> + '_ {
        let mut cursor = self.first_entity(KeyMode::NotKey);
        std::iter::from_fn(move || {
            let node = cursor?;
            cursor = node.next_entity(KeyMode::NotKey);
            Some(node)
        })
    }
}

fn link_structure(entries: &mut [EntityProperty]) {
    // Ancestor chain by depth; records arrive in depth-first declaration
    // order with the root at index 0.
    let mut stack: Vec<usize> = vec![0];
    let mut last_child: Vec<Option<usize>> = vec![None; entries.len()];

    for i in 1..entries.len() {
        let depth = entries[i].depth as usize;
        debug_assert!(depth >= 1 && depth <= stack.len());
        stack.truncate(depth);
        let parent = stack[depth - 1];
        entries[i].parent = Some(parent as u32);
        entries[i].parent_ext = entries[parent].ext;
        if let Some(prev) = last_child[parent] {
            entries[prev].next_on_level = Some(i as u32);
            entries[i].prev_on_level = Some(prev as u32);
        } else {
            entries[parent].first_member = Some(i as u32);
        }
        last_child[parent] = Some(i);
        stack.push(i);
    }
}

fn members_of(entries: &[EntityProperty], node: usize) -> Vec<usize> {
    let mut out = Vec::new();
    let mut cursor = entries[node].first_member;
    while let Some(idx) = cursor {
        out.push(idx as usize);
        cursor = entries[idx as usize].next_on_level;
    }
    out
}

/// Mark members of a key endpoint. A node whose members already carry key
/// flags (a nested type with its own declared keys) keeps them; otherwise
/// every member becomes a key. Recurses through flagged members.
fn set_key_values(entries: &mut [EntityProperty], node: usize) {
    let members = members_of(entries, node);
    let has_keys = members.iter().any(|&m| entries[m].is_key);
    for member in members {
        if has_keys {
            if entries[member].is_key {
                set_key_values(entries, member);
            }
        } else {
            entries[member].is_key = true;
            set_key_values(entries, member);
        }
    }
}

/// Propagate declared key paths down the tree. Interior path nodes replace
/// whatever flags their level carried; leaf endpoints expand through
/// `set_key_values`.
fn apply_endpoints(entries: &mut [EntityProperty], node: usize, keys: &KeyEndpoints) {
    if keys.is_empty() {
        set_key_values(entries, node);
        return;
    }
    let members = members_of(entries, node);
    for &member in &members {
        entries[member].is_key = false;
    }
    for id in keys.ids() {
        let Some(&member) = members.iter().find(|&&m| entries[m].member_id == id) else {
            log::warn!("key endpoint names unknown member id {}", id);
            continue;
        };
        entries[member].is_key = true;
        if let Some(sub) = keys.get(id) {
            apply_endpoints(entries, member, sub);
        }
    }
}

fn link_key_lists(entries: &mut [EntityProperty]) {
    for node in 0..entries.len() {
        if entries[node].first_member.is_none() {
            continue;
        }
        let keyed: Vec<usize> = members_of(entries, node)
            .into_iter()
            .filter(|&m| entries[m].is_key)
            .collect();

        link_chain(entries, node, &keyed, KeyChain::Unsorted);

        let mut sorted = keyed;
        sorted.sort_by_key(|&m| entries[m].member_id);
        link_chain(entries, node, &sorted, KeyChain::Sorted);
    }
}

#[derive(Copy, Clone)]
enum KeyChain {
    Unsorted,
    Sorted,
}

fn link_chain(entries: &mut [EntityProperty], node: usize, chain: &[usize], kind: KeyChain) {
    let first = chain.first().map(|&m| m as u32);
    match kind {
        KeyChain::Unsorted => entries[node].first_unsorted_key = first,
        KeyChain::Sorted => entries[node].first_sorted_key = first,
    }
    for pair in chain.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        match kind {
            KeyChain::Unsorted => {
                entries[prev].next_unsorted_key = Some(next as u32);
                entries[next].prev_unsorted_key = Some(prev as u32);
            }
            KeyChain::Sorted => {
                entries[prev].next_sorted_key = Some(next as u32);
                entries[next].prev_sorted_key = Some(prev as u32);
            }
        }
    }
}

fn propagate_xtypes(entries: &mut [EntityProperty]) {
    // Parents precede children in the vector, so one reverse sweep settles
    // the whole tree.
    for i in (1..entries.len()).rev() {
        if entries[i].xtypes_necessary {
            if let Some(parent) = entries[i].parent {
                entries[parent as usize].xtypes_necessary = true;
            }
        }
    }
}
