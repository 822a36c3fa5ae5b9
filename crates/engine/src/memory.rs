//! Symbolic memory object model (C3).
//!
//! `MemoryObject` is a fixed-identity allocation; `ObjectState` is one
//! state's view of its bytes, kept in one of three exclusive caches per
//! byte - concrete, known-symbolic, or "lives only in the update list" -
//! with `unflushedMask` tracking which cached bytes have not yet been
//! pushed into `updates`. Grounded on KLEE's `Memory.cpp`, translated from
//! its three parallel bitvector/array caches into two `BTreeSet<u64>`
//! masks plus a `SparseStorage<u8>` and a `BTreeMap<u64, ExprId>`.
//!
//! Cache invariant (checked by `debug_assert!`, matching §7's "any broken
//! invariant in §3 is fatal"): at every byte, at most one of
//! `{concrete, known-symbolic}` holds, and `unflushed(i) => concrete(i) ||
//! known_symbolic(i)`.

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use symex_expr::array::{Array, ArraySource};
use symex_expr::expr::{constant, constant_u64, Expr, ExprKind};
use symex_expr::update_list::{self, UpdateList, UpdateListId, UpdateNode};
use symex_expr::{ConstantValue, ExprId, Width};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

/// Byte order used by `read`/`write`'s wide-access byte decomposition.
/// LLVM IR itself is target-endianness-agnostic; the core fixes one choice
/// since nothing here talks to a real target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

/// Attached capability used by the type-based-alias policy
/// (`isAccessibleFrom`). Opaque beyond equality; the (excluded) C++ type
/// system assigns these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeCapability(pub u32);

#[derive(Debug, Clone)]
pub struct MemoryObject {
    pub id: ObjectId,
    pub size: ExprId,
    pub address: ExprId,
    pub allocation_site: Option<String>,
    pub allocator: Option<ObjectId>,
    pub is_user_specified: bool,
}

impl MemoryObject {
    pub fn new(id: ObjectId, size: ExprId, address: ExprId, allocation_site: Option<String>) -> Self {
        Self { id, size, address, allocation_site, allocator: None, is_user_specified: false }
    }

    /// A fixed object defined at a concrete address (testable scenario S3).
    pub fn define_fixed(id: ObjectId, address: u64, size: u64) -> Self {
        Self {
            id,
            size: constant_u64(64, size),
            address: constant_u64(64, address),
            allocation_site: None,
            allocator: None,
            is_user_specified: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ObjectState {
    object: ObjectId,
    size_bytes: u64,
    concrete_store: symex_expr::SparseStorage<u8>,
    concrete_mask: BTreeSet<u64>,
    known_symbolics: BTreeMap<u64, ExprId>,
    unflushed_mask: BTreeSet<u64>,
    updates: UpdateListId,
    dynamic_type: Option<TypeCapability>,
    copy_on_write_owner: u64,
}

impl ObjectState {
    /// A fresh, fully-unknown object state over `size_bytes` bytes, rooted
    /// at a brand-new `Uninitialized` array.
    pub fn new_uninitialized(object: ObjectId, size_bytes: u64) -> Self {
        let array = Array::create(constant_u64(64, size_bytes), 32, 8, ArraySource::Uninitialized);
        Self {
            object,
            size_bytes,
            concrete_store: symex_expr::SparseStorage::new(0),
            concrete_mask: BTreeSet::new(),
            known_symbolics: BTreeMap::new(),
            unflushed_mask: BTreeSet::new(),
            updates: UpdateList::root(array),
            dynamic_type: None,
            copy_on_write_owner: 0,
        }
    }

    /// A fully symbolic object state (the array identity *is* the
    /// object's contents - used when `klee_make_symbolic` targets a fresh
    /// allocation).
    pub fn new_symbolic(object: ObjectId, size_bytes: u64, name: impl Into<String>, version: u32) -> Self {
        let array = Array::create(
            constant_u64(64, size_bytes),
            32,
            8,
            ArraySource::MakeSymbolic { name: name.into(), version },
        );
        Self {
            object,
            size_bytes,
            concrete_store: symex_expr::SparseStorage::new(0),
            concrete_mask: BTreeSet::new(),
            known_symbolics: BTreeMap::new(),
            unflushed_mask: BTreeSet::new(),
            updates: UpdateList::root(array),
            dynamic_type: None,
            copy_on_write_owner: 0,
        }
    }

    pub fn object(&self) -> ObjectId {
        self.object
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn dynamic_type(&self) -> Option<TypeCapability> {
        self.dynamic_type
    }

    pub fn set_dynamic_type(&mut self, ty: TypeCapability) {
        self.dynamic_type = Some(ty);
    }

    pub fn copy_on_write_owner(&self) -> u64 {
        self.copy_on_write_owner
    }

    pub fn set_copy_on_write_owner(&mut self, owner: u64) {
        self.copy_on_write_owner = owner;
    }

    fn is_byte_concrete(&self, offset: u64) -> bool {
        self.concrete_mask.contains(&offset)
    }

    fn is_byte_known_symbolic(&self, offset: u64) -> bool {
        self.known_symbolics.contains_key(&offset)
    }

    fn check_invariant(&self, offset: u64) {
        debug_assert!(
            !(self.is_byte_concrete(offset) && self.is_byte_known_symbolic(offset)),
            "byte {offset} is both concrete and known-symbolic"
        );
        if self.unflushed_mask.contains(&offset) {
            debug_assert!(
                self.is_byte_concrete(offset) || self.is_byte_known_symbolic(offset),
                "byte {offset} marked unflushed without a cached value"
            );
        }
    }

    /// Push every dirty cached byte into `updates`, in ascending offset
    /// order (so replay order matches write order), then clear
    /// `unflushedMask`. Read-only from the caller's point of view: the
    /// concrete/known-symbolic caches are untouched, only promoted into
    /// the update list so a subsequent symbolic read sees them.
    pub fn flush_for_read(&mut self) {
        let dirty: Vec<u64> = self.unflushed_mask.iter().copied().collect();
        for offset in dirty {
            let value = if self.is_byte_concrete(offset) {
                constant(ConstantValue::new(8, *self.concrete_store.load(offset) as u128))
            } else {
                debug_assert!(self.is_byte_known_symbolic(offset), "invalid bit set in unflushedMask");
                self.known_symbolics[&offset]
            };
            let index = constant_u64(32, offset);
            self.updates = UpdateList::extend(self.updates, index, value);
        }
        self.unflushed_mask.clear();
    }

    /// Flush, then clear the concrete and known-symbolic caches at every
    /// offset - a symbolic-index write may touch any byte, so nothing
    /// cached stays trustworthy.
    pub fn flush_for_write(&mut self) {
        self.flush_for_read();
        self.concrete_mask.clear();
        self.known_symbolics.clear();
    }

    pub fn read8_const(&self, offset: u64) -> ExprId {
        if self.is_byte_concrete(offset) {
            constant(ConstantValue::new(8, *self.concrete_store.load(offset) as u128))
        } else if let Some(&value) = self.known_symbolics.get(&offset) {
            value
        } else {
            debug_assert!(!self.unflushed_mask.contains(&offset), "unflushed byte without a cached value");
            update_list::read(self.updates, constant_u64(32, offset), 8)
        }
    }

    pub fn read8_symbolic(&mut self, offset: ExprId) -> ExprId {
        debug_assert!(Expr::get(offset).as_constant().is_none(), "constant offset passed to the symbolic read path");
        self.flush_for_read();
        let zext = symex_expr::expr::cast(symex_expr::expr::CastOp::ZExt, offset, 32)
            .expect("offset widens to Int32 without violating cast typing");
        update_list::read(self.updates, zext, 8)
    }

    pub fn write8_const(&mut self, offset: u64, value: ExprId) {
        self.check_invariant(offset);
        match Expr::get(value).as_constant() {
            Some(c) => {
                self.concrete_store.store(offset, c.value as u8);
                self.known_symbolics.remove(&offset);
                self.concrete_mask.insert(offset);
            }
            None => {
                self.known_symbolics.insert(offset, value);
                self.concrete_mask.remove(&offset);
            }
        }
        self.unflushed_mask.insert(offset);
    }

    /// A write at a symbolic offset invalidates every cached byte (any of
    /// them might be the one being overwritten), so it flushes first and
    /// then appends unconditionally to the update list.
    pub fn write8_symbolic(&mut self, offset: ExprId, value: ExprId) {
        self.flush_for_write();
        let zext = symex_expr::expr::cast(symex_expr::expr::CastOp::ZExt, offset, 32)
            .expect("offset widens to Int32 without violating cast typing");
        self.updates = UpdateList::extend(self.updates, zext, value);
    }

    /// Decompose a `width`-bit read into bytes per `endian`, building a
    /// `Concat` chain. `width` must be a multiple of 8 (bool reads go
    /// through a single-bit `Extract` on the caller's side, per §4.3).
    pub fn read(&mut self, offset_bytes: u64, width: Width, endian: Endianness) -> ExprId {
        debug_assert_eq!(width % 8, 0, "read width must be a whole number of bytes");
        let nbytes = width / 8;
        let bytes: Vec<ExprId> = (0..nbytes).map(|i| self.read8_const(offset_bytes + i as u64)).collect();
        concat_bytes(&bytes, endian)
    }

    pub fn write(&mut self, offset_bytes: u64, value: ExprId, endian: Endianness) {
        let width = Expr::get(value).width;
        debug_assert_eq!(width % 8, 0, "write width must be a whole number of bytes");
        let nbytes = width / 8;
        for i in 0..nbytes {
            let byte = symex_expr::expr::extract(value, i * 8, 8).expect("byte-aligned extract of a write value");
            let offset = byte_offset(offset_bytes, i, nbytes, endian);
            self.write8_const(offset, byte);
        }
    }

    /// Materialize the update list lazily on first symbolic access:
    /// collapse the concrete/known-symbolic caches into a fresh
    /// `ConstantSource` array (falling back to an `Uninitialized` root for
    /// a symbolic-size object, since a dense constant table needs a known
    /// size), then replay any writes still only in `updates` on top.
    pub fn materialize_update_list(&mut self) -> UpdateListId {
        self.flush_for_write();
        if Expr::get(self.object_size()).as_constant().is_none() {
            return self.updates;
        }
        let mut storage: symex_expr::SparseStorage<u8> = symex_expr::SparseStorage::new(0);
        let mut writes = Vec::new();
        self.collect_update_chain(self.updates, &mut writes);
        writes.reverse();
        for (index, value) in &writes {
            if let (Some(idx), Some(val)) = (Expr::get(*index).as_constant(), Expr::get(*value).as_constant()) {
                storage.store(idx.value as u64, val.value as u8);
            }
        }
        let array = Array::create(self.object_size(), 32, 8, ArraySource::Constant(storage));
        let mut list = UpdateList::root(array);
        for (index, value) in writes.iter().rev() {
            if Expr::get(*index).as_constant().is_some() && Expr::get(*value).as_constant().is_some() {
                continue;
            }
            list = UpdateList::extend(list, *index, *value);
        }
        self.updates = list;
        self.updates
    }

    fn object_size(&self) -> ExprId {
        constant_u64(64, self.size_bytes)
    }

    fn collect_update_chain(&self, list: UpdateListId, out: &mut Vec<(ExprId, ExprId)>) {
        match UpdateList::get(list).node {
            UpdateNode::Root(_) => {}
            UpdateNode::Write { index, value, rest } => {
                out.push((index, value));
                self.collect_update_chain(rest, out);
            }
        }
    }

    /// `true` unless a strict type-based alias policy is enabled - the
    /// default capability model treats `char *` access as universally
    /// permitted, per §4.3.
    pub fn is_accessible_from(&self, capability: Option<TypeCapability>, strict_tbaa: bool) -> bool {
        if !strict_tbaa {
            return true;
        }
        match (self.dynamic_type, capability) {
            (Some(declared), Some(requested)) => declared == requested,
            _ => true,
        }
    }
}

fn concat_bytes(bytes: &[ExprId], endian: Endianness) -> ExprId {
    let ordered: Vec<ExprId> = match endian {
        Endianness::Little => bytes.iter().rev().copied().collect(),
        Endianness::Big => bytes.to_vec(),
    };
    let mut iter = ordered.into_iter();
    let mut acc = iter.next().expect("read width is at least one byte");
    for next in iter {
        acc = symex_expr::expr::concat(acc, next);
    }
    acc
}

fn byte_offset(base: u64, byte_index: u32, total_bytes: u32, endian: Endianness) -> u64 {
    match endian {
        Endianness::Little => base + byte_index as u64,
        Endianness::Big => base + (total_bytes - 1 - byte_index) as u64,
    }
}

/// A mapping MO -> ObjectState, shared copy-on-write across forked states
/// (C8's "address space"). Cloning an `AddressSpace` is O(1) - it bumps
/// `Rc` counts on every entry - and `get_mut` deep-copies only the one
/// `ObjectState` actually being written to, stamping it with `owner` so a
/// later writer under the same owner skips the copy.
#[derive(Debug, Clone, Default)]
pub struct AddressSpace {
    objects: Rc<BTreeMap<ObjectId, Rc<ObjectState>>>,
    metadata: Rc<BTreeMap<ObjectId, Rc<MemoryObject>>>,
}

impl AddressSpace {
    pub fn new() -> Self {
        Self { objects: Rc::new(BTreeMap::new()), metadata: Rc::new(BTreeMap::new()) }
    }

    pub fn bind(&mut self, mo: MemoryObject, state: ObjectState) {
        let id = mo.id;
        Rc::make_mut(&mut self.objects).insert(id, Rc::new(state));
        Rc::make_mut(&mut self.metadata).insert(id, Rc::new(mo));
    }

    pub fn unbind(&mut self, id: ObjectId) {
        Rc::make_mut(&mut self.objects).remove(&id);
        Rc::make_mut(&mut self.metadata).remove(&id);
    }

    pub fn object_state(&self, id: ObjectId) -> Option<&ObjectState> {
        self.objects.get(&id).map(|rc| rc.as_ref())
    }

    pub fn memory_object(&self, id: ObjectId) -> Option<&MemoryObject> {
        self.metadata.get(&id).map(|rc| rc.as_ref())
    }

    /// Mutable access to one object's state, deep-copying it (not the
    /// whole map) the first time `owner` writes to it.
    pub fn object_state_mut(&mut self, id: ObjectId, owner: u64) -> Option<&mut ObjectState> {
        let entry = Rc::make_mut(&mut self.objects).get_mut(&id)?;
        if entry.copy_on_write_owner() != owner {
            let mut copied = entry.as_ref().clone();
            copied.set_copy_on_write_owner(owner);
            *entry = Rc::new(copied);
        }
        Some(Rc::make_mut(entry))
    }

    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.objects.keys().copied()
    }
}
