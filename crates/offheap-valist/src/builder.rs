//! Staging and serialization of variadic argument lists.
//!
//! Arguments are validated as they are added and serialized in one pass by
//! [`VaListBuilder::build`]. The buffer and every out-of-line struct copy
//! are carved from one unbounded arena over the builder's scope, so they
//! live exactly as long as that scope.

use std::marker::PhantomData;

use smallvec::SmallVec;

use offheap_alloc::{ArenaAllocator, SegmentAllocator};
use offheap_core::{Carrier, MemoryAddress, MemoryError, MemoryLayout, Region, ResourceScope};

use crate::abi::{classify_struct, TypeClass, VaAbi};
use crate::arg::{SimpleVaArg, VaValue};
use crate::list::VaList;

/// Inline capacity for staged arguments; longer lists spill to the heap.
const INLINE_ARGS: usize = 8;

/// Accumulates arguments for one variadic list.
///
/// `build` consumes the builder, so a builder produces at most one list.
pub struct VaListBuilder<A: VaAbi> {
    scope: ResourceScope,
    args: SmallVec<[SimpleVaArg; INLINE_ARGS]>,
    abi: PhantomData<fn() -> A>,
}

impl<A: VaAbi> VaListBuilder<A> {
    /// A builder whose list will be owned by `scope`.
    pub fn new(scope: &ResourceScope) -> Result<Self, MemoryError> {
        scope.check_valid_state()?;
        Ok(Self {
            scope: scope.clone(),
            args: SmallVec::new(),
            abi: PhantomData,
        })
    }

    /// Scope the built list will belong to.
    pub fn scope(&self) -> &ResourceScope {
        &self.scope
    }

    /// Number of staged arguments.
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// Whether nothing has been staged yet.
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Staged arguments in append order.
    pub fn args(&self) -> &[SimpleVaArg] {
        &self.args
    }

    fn push(&mut self, layout: &MemoryLayout, value: VaValue) -> Result<&mut Self, MemoryError> {
        value.carrier().check_layout(layout, A::ADDRESS_WIDTH)?;
        self.args.push(SimpleVaArg::new(layout.clone(), value));
        Ok(self)
    }

    /// Append a 32-bit integer.
    pub fn varg_from_int(&mut self, layout: &MemoryLayout, value: i32) -> Result<&mut Self, MemoryError> {
        self.push(layout, VaValue::Int(value))
    }

    /// Append a 64-bit integer.
    pub fn varg_from_long(&mut self, layout: &MemoryLayout, value: i64) -> Result<&mut Self, MemoryError> {
        self.push(layout, VaValue::Long(value))
    }

    /// Append a double.
    pub fn varg_from_double(&mut self, layout: &MemoryLayout, value: f64) -> Result<&mut Self, MemoryError> {
        self.push(layout, VaValue::Double(value))
    }

    /// Append an address. `layout` must be as wide as the ABI's addresses.
    pub fn varg_from_address(&mut self, layout: &MemoryLayout, value: MemoryAddress) -> Result<&mut Self, MemoryError> {
        self.push(layout, VaValue::Address(value))
    }

    /// Append a struct passed by value.
    ///
    /// `value` must be exactly as large as `layout`. Its contents are read
    /// when the list is built, not now.
    pub fn varg_from_segment(&mut self, layout: &MemoryLayout, value: &Region) -> Result<&mut Self, MemoryError> {
        Carrier::Segment.check_layout(layout, A::ADDRESS_WIDTH)?;
        if value.byte_size() != layout.byte_size() {
            return Err(MemoryError::LayoutMismatch {
                expected: layout.byte_size(),
                actual: value.byte_size(),
            });
        }
        classify_struct::<A>(layout)?;
        value.check_valid_state()?;
        self.push(layout, VaValue::Segment(value.clone()))
    }

    /// Serialize the staged arguments into a list owned by the scope.
    ///
    /// With nothing staged this is [`VaList::empty`] and allocates nothing.
    pub fn build(self) -> Result<VaList<A>, MemoryError> {
        if self.args.is_empty() {
            return Ok(VaList::empty());
        }
        let slots = self.args.len() as u64;
        let size = A::SLOT_SIZE.checked_mul(slots).ok_or(MemoryError::InvalidArgument {
            reason: format!("{slots} variadic slots overflow the address space"),
        })?;
        let arena = ArenaAllocator::unbounded(&self.scope)?;
        let buffer = arena.allocate(size, A::SLOT_SIZE)?;
        for (index, arg) in self.args.iter().enumerate() {
            let slot = buffer.slice(index as u64 * A::SLOT_SIZE, A::SLOT_SIZE)?;
            write_slot::<A>(&slot, arg, &arena)?;
        }
        Ok(VaList::from_buffer(buffer, self.scope))
    }
}

fn write_slot<A: VaAbi>(slot: &Region, arg: &SimpleVaArg, arena: &ArenaAllocator) -> Result<(), MemoryError> {
    let layout = arg.layout();
    match arg.value() {
        VaValue::Int(v) => slot.set(layout, 0, *v),
        VaValue::Long(v) => slot.set(layout, 0, *v),
        VaValue::Double(v) => slot.set(layout, 0, *v),
        VaValue::Address(v) => slot.set_address(layout, 0, *v),
        VaValue::Segment(src) => match classify_struct::<A>(layout)? {
            TypeClass::StructReference => {
                let copy = arena.allocate_layout(layout)?;
                copy.copy_from(src)?;
                slot.set_address(&A::address_layout(), 0, copy.address())
            }
            _ => slot.slice(0, layout.byte_size())?.copy_from(src),
        },
    }
}
