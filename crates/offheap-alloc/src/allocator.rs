//! The segment allocator contract and its typed helpers.
//!
//! [`SegmentAllocator`] has one required method, [`SegmentAllocator::allocate`].
//! Everything else is derived from it: the layout-driven defaults live on the
//! trait itself, the generic typed helpers on [`AllocateExt`], which is
//! blanket-implemented so they are also available on `dyn SegmentAllocator`.

use offheap_core::{AddressWidth, Carrier, MemoryAddress, MemoryError, MemoryLayout, Primitive, Region, ResourceScope};

/// Hands out regions of native memory.
pub trait SegmentAllocator {
    /// Allocate `size` bytes aligned to `align`.
    ///
    /// `align` must be a non-zero power of two. Fails with `OutOfMemory`
    /// when the allocator's capacity is exhausted.
    fn allocate(&self, size: u64, align: u64) -> Result<Region, MemoryError>;

    /// Allocate `size` bytes with alignment 1.
    fn allocate_bytes(&self, size: u64) -> Result<Region, MemoryError> {
        self.allocate(size, 1)
    }

    /// Allocate a region sized and aligned for `layout`.
    fn allocate_layout(&self, layout: &MemoryLayout) -> Result<Region, MemoryError> {
        self.allocate(layout.byte_size(), layout.byte_alignment())
    }

    /// Allocate a region for `count` elements of `element`.
    fn allocate_array_of(&self, element: &MemoryLayout, count: u64) -> Result<Region, MemoryError> {
        let sequence = MemoryLayout::sequence(count, element.clone())?;
        self.allocate_layout(&sequence)
    }
}

impl<A: SegmentAllocator + ?Sized> SegmentAllocator for &A {
    fn allocate(&self, size: u64, align: u64) -> Result<Region, MemoryError> {
        (**self).allocate(size, align)
    }
}

/// Allocates directly under the scope; every call is one native block.
impl SegmentAllocator for ResourceScope {
    fn allocate(&self, size: u64, align: u64) -> Result<Region, MemoryError> {
        check_request(size, align)?;
        self.allocate_native(size, align)
    }
}

/// Validate an allocation request.
pub fn check_request(size: u64, align: u64) -> Result<(), MemoryError> {
    if !align.is_power_of_two() {
        return Err(MemoryError::InvalidArgument {
            reason: format!("alignment must be a power of two (got {align})"),
        });
    }
    if size > i64::MAX as u64 {
        return Err(MemoryError::InvalidArgument {
            reason: format!("allocation size {size} is out of range"),
        });
    }
    Ok(())
}

/// Allocate-and-initialise helpers built on [`SegmentAllocator::allocate`].
pub trait AllocateExt: SegmentAllocator {
    /// Allocate a region for `layout` and store `value` in it.
    ///
    /// `layout` must be a value layout whose size matches `T`.
    fn allocate_value<T: Primitive>(&self, layout: &MemoryLayout, value: T) -> Result<Region, MemoryError> {
        T::CARRIER.check_layout(layout, AddressWidth::native())?;
        let region = self.allocate_layout(layout)?;
        region.set(layout, 0, value)?;
        Ok(region)
    }

    /// Allocate a region for `layout` and store the address `value` in it.
    ///
    /// `layout` must be the size of a host address.
    fn allocate_address(&self, layout: &MemoryLayout, value: MemoryAddress) -> Result<Region, MemoryError> {
        Carrier::Address.check_layout(layout, AddressWidth::native())?;
        let region = self.allocate_layout(layout)?;
        region.set_address(layout, 0, value)?;
        Ok(region)
    }

    /// Allocate an array of `element` and copy `values` into it.
    ///
    /// Elements are byte-swapped when `element` is not in native order.
    fn allocate_array<T: Primitive>(&self, element: &MemoryLayout, values: &[T]) -> Result<Region, MemoryError> {
        T::CARRIER.check_layout(element, AddressWidth::native())?;
        let region = self.allocate_array_of(element, values.len() as u64)?;
        let mut bytes = vec![0u8; values.len() * T::SIZE];
        for (value, out) in values.iter().zip(bytes.chunks_exact_mut(T::SIZE)) {
            value.encode(element.order(), out);
        }
        region.write_bytes(0, &bytes)?;
        Ok(region)
    }

    /// Allocate an array of addresses and copy `values` into it.
    fn allocate_address_array(&self, element: &MemoryLayout, values: &[MemoryAddress]) -> Result<Region, MemoryError> {
        let width = AddressWidth::native();
        Carrier::Address.check_layout(element, width)?;
        let region = self.allocate_array_of(element, values.len() as u64)?;
        let size = width.bytes() as usize;
        let mut bytes = vec![0u8; values.len() * size];
        for (value, out) in values.iter().zip(bytes.chunks_exact_mut(size)) {
            value.encode(width, element.order(), out)?;
        }
        region.write_bytes(0, &bytes)?;
        Ok(region)
    }
}

impl<A: SegmentAllocator + ?Sized> AllocateExt for A {}
