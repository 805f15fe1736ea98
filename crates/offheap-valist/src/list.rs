//! The read cursor over a variadic argument buffer.
//!
//! A list holds the unread tail of its buffer. Every successful `varg_as_*`
//! call consumes exactly one slot, however narrow the value it decoded;
//! a failed call consumes nothing. All reads go through the tail region,
//! so they fail with a liveness error once the owning scope has closed.

use std::fmt;
use std::marker::PhantomData;

use offheap_alloc::SegmentAllocator;
use offheap_core::{Carrier, MemoryAddress, MemoryError, MemoryLayout, Region, ResourceScope};

use crate::abi::{classify_struct, TypeClass, VaAbi};
use crate::builder::VaListBuilder;

#[derive(Clone)]
struct Cursor {
    start: MemoryAddress,
    remaining: Region,
    /// Set for lists adopted from native code; their struct pointers are
    /// trusted rather than resolved against the scope.
    foreign: bool,
}

impl Cursor {
    /// The `len` bytes a by-reference slot points at.
    fn referenced(&self, scope: &ResourceScope, addr: MemoryAddress, len: u64) -> Result<Region, MemoryError> {
        if let Some(region) = scope.resolve(addr.to_raw(), len)? {
            return Ok(region);
        }
        if self.foreign {
            return adopt(addr, len, scope);
        }
        Err(MemoryError::InvalidArgument {
            reason: format!("struct argument at {addr} is not owned by scope {}", scope.id()),
        })
    }
}

#[allow(unsafe_code)]
fn adopt(addr: MemoryAddress, len: u64, scope: &ResourceScope) -> Result<Region, MemoryError> {
    // SAFETY: only reached for lists built by `VaList::of_address`, whose
    // caller guarantees that every struct the list references is valid for
    // the scope's lifetime.
    unsafe { Region::of_address(addr, len, scope) }
}

/// A variadic argument list for the ABI `A`.
pub struct VaList<A: VaAbi> {
    scope: ResourceScope,
    /// `None` for the empty list.
    cursor: Option<Cursor>,
    abi: PhantomData<fn() -> A>,
}

impl<A: VaAbi> VaList<A> {
    /// The canonical empty list.
    ///
    /// Its address is null, it belongs to the global scope, reading or
    /// skipping fails with `Unsupported` and copying yields another empty
    /// list.
    pub fn empty() -> Self {
        Self {
            scope: ResourceScope::global(),
            cursor: None,
            abi: PhantomData,
        }
    }

    /// A builder for a list owned by `scope`.
    pub fn builder(scope: &ResourceScope) -> Result<VaListBuilder<A>, MemoryError> {
        VaListBuilder::new(scope)
    }

    /// Build a list owned by `scope` from a sequence of builder calls.
    ///
    /// ```
    /// use offheap_core::{MemoryAddress, ResourceScope};
    /// use offheap_valist::win64::{C_INT, C_POINTER};
    /// use offheap_valist::{VaList, Win64};
    ///
    /// let scope = ResourceScope::confined();
    /// let mut list = VaList::<Win64>::make(&scope, |b| {
    ///     b.varg_from_int(&C_INT, 7)?.varg_from_address(&C_POINTER, MemoryAddress(0x1000))?;
    ///     Ok(())
    /// })
    /// .unwrap();
    /// assert_eq!(list.varg_as_int(&C_INT).unwrap(), 7);
    /// assert_eq!(list.varg_as_address(&C_POINTER).unwrap(), MemoryAddress(0x1000));
    /// ```
    pub fn make<F>(scope: &ResourceScope, actions: F) -> Result<Self, MemoryError>
    where
        F: FnOnce(&mut VaListBuilder<A>) -> Result<(), MemoryError>,
    {
        let mut builder = VaListBuilder::new(scope)?;
        actions(&mut builder)?;
        builder.build()
    }

    /// Adopt a list produced by native code.
    ///
    /// The list has no known end; reading past its last argument reads
    /// whatever follows it.
    ///
    /// # Safety
    ///
    /// `addr` must point at a live variadic list laid out for `A`, valid for
    /// as long as `scope` is alive. Every struct argument passed by
    /// reference must likewise stay valid, because reads copy through the
    /// stored pointers.
    #[allow(unsafe_code)]
    pub unsafe fn of_address(addr: MemoryAddress, scope: &ResourceScope) -> Result<Self, MemoryError> {
        if addr.is_null() {
            return Err(MemoryError::InvalidArgument {
                reason: "variadic list address is null".to_string(),
            });
        }
        let len = (usize::MAX as u64).saturating_sub(addr.to_raw());
        // SAFETY: forwarded from this function's contract.
        let remaining = unsafe { Region::of_address(addr, len, scope)? };
        Ok(Self {
            scope: scope.clone(),
            cursor: Some(Cursor {
                start: addr,
                remaining,
                foreign: true,
            }),
            abi: PhantomData,
        })
    }

    pub(crate) fn from_buffer(buffer: Region, scope: ResourceScope) -> Self {
        Self {
            scope,
            cursor: Some(Cursor {
                start: buffer.address(),
                remaining: buffer,
                foreign: false,
            }),
            abi: PhantomData,
        }
    }

    /// Scope owning the list.
    pub fn scope(&self) -> &ResourceScope {
        &self.scope
    }

    /// Address of the next unread slot; null for the empty list.
    ///
    /// This is the value handed to native code expecting a `va_list`.
    pub fn address(&self) -> MemoryAddress {
        self.cursor
            .as_ref()
            .map_or(MemoryAddress::NULL, |cursor| cursor.remaining.address())
    }

    /// Bytes consumed since the start of the list.
    pub fn position(&self) -> u64 {
        self.cursor.as_ref().map_or(0, |cursor| {
            cursor.remaining.address().to_raw() - cursor.start.to_raw()
        })
    }

    /// Whether this is the empty list.
    pub fn is_empty_list(&self) -> bool {
        self.cursor.is_none()
    }

    /// Decode the next slot with `decode` and advance past it.
    fn read<T>(
        &mut self,
        carrier: Carrier,
        layout: &MemoryLayout,
        decode: impl FnOnce(&Cursor, &ResourceScope, &Region) -> Result<T, MemoryError>,
    ) -> Result<T, MemoryError> {
        let cursor = self.cursor.as_mut().ok_or_else(empty_list)?;
        carrier.check_layout(layout, A::ADDRESS_WIDTH)?;
        let slot = cursor.remaining.slice(0, A::SLOT_SIZE)?;
        let value = decode(&*cursor, &self.scope, &slot)?;
        cursor.remaining = cursor.remaining.slice_from(A::SLOT_SIZE)?;
        Ok(value)
    }

    /// Read the next argument as a 32-bit integer.
    pub fn varg_as_int(&mut self, layout: &MemoryLayout) -> Result<i32, MemoryError> {
        self.read(Carrier::Int, layout, |_, _, slot| slot.get(layout, 0))
    }

    /// Read the next argument as a 64-bit integer.
    pub fn varg_as_long(&mut self, layout: &MemoryLayout) -> Result<i64, MemoryError> {
        self.read(Carrier::Long, layout, |_, _, slot| slot.get(layout, 0))
    }

    /// Read the next argument as a double.
    pub fn varg_as_double(&mut self, layout: &MemoryLayout) -> Result<f64, MemoryError> {
        self.read(Carrier::Double, layout, |_, _, slot| slot.get(layout, 0))
    }

    /// Read the next argument as an address.
    pub fn varg_as_address(&mut self, layout: &MemoryLayout) -> Result<MemoryAddress, MemoryError> {
        self.read(Carrier::Address, layout, |_, _, slot| slot.get_address(layout, 0))
    }

    /// Read the next argument as a struct, copying it into memory obtained
    /// from `allocator`.
    ///
    /// The struct is classified exactly as the builder classified it: by
    /// reference reads follow the slot's pointer, in-register reads copy
    /// the slot's leading bytes.
    pub fn varg_as_segment(
        &mut self,
        layout: &MemoryLayout,
        allocator: &dyn SegmentAllocator,
    ) -> Result<Region, MemoryError> {
        self.read(Carrier::Segment, layout, |cursor, scope, slot| {
            let size = layout.byte_size();
            let src = match classify_struct::<A>(layout)? {
                TypeClass::StructReference => {
                    let addr = slot.get_address(&A::address_layout(), 0)?;
                    cursor.referenced(scope, addr, size)?
                }
                _ => slot.slice(0, size)?,
            };
            let copy = allocator.allocate_layout(layout)?;
            copy.copy_from(&src)?;
            Ok(copy)
        })
    }

    /// Read the next argument as a struct allocated directly under `scope`.
    pub fn varg_as_segment_in(&mut self, layout: &MemoryLayout, scope: &ResourceScope) -> Result<Region, MemoryError> {
        self.varg_as_segment(layout, scope)
    }

    /// Advance past one slot per layout without decoding anything.
    pub fn skip(&mut self, layouts: &[MemoryLayout]) -> Result<(), MemoryError> {
        let cursor = self.cursor.as_mut().ok_or_else(empty_list)?;
        let count = layouts.len() as u64;
        let bytes = A::SLOT_SIZE.checked_mul(count).ok_or(MemoryError::InvalidArgument {
            reason: format!("skipping {count} slots overflows the address space"),
        })?;
        cursor.remaining = cursor.remaining.slice_from(bytes)?;
        Ok(())
    }

    /// An independent cursor starting at the current position.
    ///
    /// Fails once the owning scope has closed.
    pub fn copy(&self) -> Result<Self, MemoryError> {
        let Some(cursor) = &self.cursor else {
            return Ok(Self::empty());
        };
        cursor.remaining.check_valid_state()?;
        Ok(Self {
            scope: self.scope.clone(),
            cursor: Some(cursor.clone()),
            abi: PhantomData,
        })
    }
}

fn empty_list() -> MemoryError {
    MemoryError::Unsupported {
        reason: "the empty variadic list has no arguments".to_string(),
    }
}

impl<A: VaAbi> fmt::Debug for VaList<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaList")
            .field("abi", &A::NAME)
            .field("scope", &self.scope.id())
            .field("address", &self.address())
            .field("position", &self.position())
            .finish()
    }
}
