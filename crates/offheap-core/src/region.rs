//! Bounds- and liveness-checked views over native memory.
//!
//! Every access first checks the owning scope (ownership, then liveness)
//! and then the bounds, in that order. The scope stays pinned through its
//! acquire counter until the copy finishes, so it cannot be closed and
//! freed underneath an access. Accesses are unaligned reads and writes, so
//! a value layout may be placed at any offset.
//!
//! Regions are plain views: cloning or slicing one never copies memory, and
//! two regions may alias. Concurrent writes to overlapping bytes from
//! different threads are the caller's responsibility, as they are for the
//! native code sharing the memory.

#![allow(unsafe_code)]

use std::fmt;
use std::ptr;

use crate::error::MemoryError;
use crate::id::ScopeId;
use crate::layout::MemoryLayout;
use crate::scope::{ResourceScope, ScopeGuard, ScopeRef};
use crate::value::{AddressWidth, Carrier, MemoryAddress, Primitive};

/// A contiguous span of native memory tagged with its owning scope.
#[derive(Clone)]
pub struct Region {
    addr: usize,
    len: u64,
    scope: ScopeRef,
}

// SAFETY: a Region is an address range plus a scope link. All dereferences
// go through `span`, which checks thread confinement, then pins the scope
// open for as long as the returned `ScopeGuard` lives. A concurrent
// `close()` fails with `ScopeAcquired` while the pin is held, so the block
// cannot be freed during the access from any thread.
unsafe impl Send for Region {}
// SAFETY: see above; `&Region` exposes the same checked accessors.
unsafe impl Sync for Region {}

impl Region {
    pub(crate) fn from_raw(addr: usize, len: u64, scope: ScopeRef) -> Self {
        Self { addr, len, scope }
    }

    /// View `len` bytes of foreign memory at `addr` under `scope`.
    ///
    /// # Safety
    ///
    /// `[addr, addr + len)` must be valid for reads and writes for as long
    /// as `scope` is alive, and must not be freed by anyone else meanwhile.
    pub unsafe fn of_address(addr: MemoryAddress, len: u64, scope: &ResourceScope) -> Result<Self, MemoryError> {
        scope.check_valid_state()?;
        let addr = usize::try_from(addr.to_raw())
            .map_err(|_| MemoryError::invalid(format!("address {addr} exceeds the host pointer width")))?;
        Ok(Self::from_raw(addr, len, scope.scope_ref()))
    }

    /// Base address.
    pub fn address(&self) -> MemoryAddress {
        MemoryAddress(self.addr as u64)
    }

    /// Length in bytes.
    pub fn byte_size(&self) -> u64 {
        self.len
    }

    /// Id of the owning scope.
    pub fn scope_id(&self) -> ScopeId {
        self.scope.id()
    }

    /// Whether the region was allocated under `scope`.
    pub fn belongs_to(&self, scope: &ResourceScope) -> bool {
        self.scope.is(scope)
    }

    /// Whether the owning scope is alive.
    pub fn is_alive(&self) -> bool {
        self.scope.is_alive()
    }

    /// Fail unless the owning scope is alive and accessible from here.
    pub fn check_valid_state(&self) -> Result<(), MemoryError> {
        self.scope.check_valid_state()
    }

    /// A sub-region sharing this region's scope.
    pub fn slice(&self, offset: u64, len: u64) -> Result<Region, MemoryError> {
        self.check_valid_state()?;
        self.check_bounds(offset, len)?;
        Ok(Self::from_raw(self.addr + offset as usize, len, self.scope.clone()))
    }

    /// The tail of this region starting at `offset`.
    pub fn slice_from(&self, offset: u64) -> Result<Region, MemoryError> {
        let len = self.len.checked_sub(offset).ok_or(MemoryError::OutOfBounds {
            offset,
            len: 0,
            size: self.len,
        })?;
        self.slice(offset, len)
    }

    fn check_bounds(&self, offset: u64, len: u64) -> Result<(), MemoryError> {
        let oob = MemoryError::OutOfBounds {
            offset,
            len,
            size: self.len,
        };
        if offset > self.len || len > self.len - offset {
            return Err(oob);
        }
        // Regions viewing foreign memory may claim lengths past the address
        // space; reject spans that would wrap.
        let end = (self.addr as u64).checked_add(offset).and_then(|a| a.checked_add(len));
        match end {
            Some(end) if end <= usize::MAX as u64 => Ok(()),
            _ => Err(oob),
        }
    }

    /// Checked pointer to `len` bytes at `offset`.
    ///
    /// The pointer is only valid while the returned guard is alive.
    fn span(&self, offset: u64, len: u64) -> Result<(ScopeGuard, *mut u8), MemoryError> {
        let pin = self.scope.acquire()?;
        self.check_bounds(offset, len)?;
        Ok((pin, (self.addr + offset as usize) as *mut u8))
    }

    /// Copy `out.len()` bytes starting at `offset` into `out`.
    pub fn read_bytes(&self, offset: u64, out: &mut [u8]) -> Result<(), MemoryError> {
        let (_pin, src) = self.span(offset, out.len() as u64)?;
        // SAFETY: span checked bounds and pins the scope until `_pin`
        // drops; `out` is a distinct Rust allocation so the ranges cannot
        // overlap.
        unsafe { ptr::copy_nonoverlapping(src, out.as_mut_ptr(), out.len()) };
        Ok(())
    }

    /// Copy `bytes` into this region starting at `offset`.
    pub fn write_bytes(&self, offset: u64, bytes: &[u8]) -> Result<(), MemoryError> {
        let (_pin, dst) = self.span(offset, bytes.len() as u64)?;
        // SAFETY: span checked bounds and pins the scope until `_pin`
        // drops; `bytes` is Rust memory distinct from native blocks.
        unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len()) };
        Ok(())
    }

    /// Read a primitive at `offset` through `layout`.
    pub fn get<T: Primitive>(&self, layout: &MemoryLayout, offset: u64) -> Result<T, MemoryError> {
        T::CARRIER.check_layout(layout, AddressWidth::native())?;
        let mut buf = [0u8; 8];
        let bytes = &mut buf[..T::SIZE];
        self.read_bytes(offset, bytes)?;
        Ok(T::decode(bytes, layout.order()))
    }

    /// Write a primitive at `offset` through `layout`.
    pub fn set<T: Primitive>(&self, layout: &MemoryLayout, offset: u64, value: T) -> Result<(), MemoryError> {
        T::CARRIER.check_layout(layout, AddressWidth::native())?;
        let mut buf = [0u8; 8];
        let bytes = &mut buf[..T::SIZE];
        value.encode(layout.order(), bytes);
        self.write_bytes(offset, bytes)
    }

    /// Read an address at `offset`. The width is taken from the layout size.
    pub fn get_address(&self, layout: &MemoryLayout, offset: u64) -> Result<MemoryAddress, MemoryError> {
        let width = address_width_of(layout)?;
        let mut buf = [0u8; 8];
        let bytes = &mut buf[..width.bytes() as usize];
        self.read_bytes(offset, bytes)?;
        Ok(MemoryAddress::decode(bytes, width, layout.order()))
    }

    /// Write an address at `offset`. The width is taken from the layout size.
    pub fn set_address(&self, layout: &MemoryLayout, offset: u64, value: MemoryAddress) -> Result<(), MemoryError> {
        let width = address_width_of(layout)?;
        let mut buf = [0u8; 8];
        let bytes = &mut buf[..width.bytes() as usize];
        value.encode(width, layout.order(), bytes)?;
        self.write_bytes(offset, bytes)
    }

    /// Copy all of `src` to the start of this region.
    ///
    /// The ranges may overlap.
    pub fn copy_from(&self, src: &Region) -> Result<(), MemoryError> {
        let (_src_pin, from) = src.span(0, src.len)?;
        let (_dst_pin, to) = self.span(0, src.len)?;
        // SAFETY: both spans are checked and both scopes pinned for the
        // copy; `ptr::copy` tolerates overlap.
        unsafe { ptr::copy(from, to, src.len as usize) };
        Ok(())
    }

    /// Set every byte to `value`.
    pub fn fill(&self, value: u8) -> Result<(), MemoryError> {
        let (_pin, dst) = self.span(0, self.len)?;
        // SAFETY: span checked bounds and pins the scope until `_pin` drops.
        unsafe { ptr::write_bytes(dst, value, self.len as usize) };
        Ok(())
    }

    /// Copy the contents into a new vector.
    pub fn to_vec(&self) -> Result<Vec<u8>, MemoryError> {
        let len = usize::try_from(self.len).map_err(|_| MemoryError::OutOfBounds {
            offset: 0,
            len: self.len,
            size: self.len,
        })?;
        let mut out = vec![0u8; len];
        self.read_bytes(0, &mut out)?;
        Ok(out)
    }
}

fn address_width_of(layout: &MemoryLayout) -> Result<AddressWidth, MemoryError> {
    if !layout.is_value() {
        return Err(MemoryError::invalid(format!(
            "{:?} carrier requires a value layout",
            Carrier::Address
        )));
    }
    match layout.byte_size() {
        4 => Ok(AddressWidth::Bits32),
        8 => Ok(AddressWidth::Bits64),
        other => Err(MemoryError::Unsupported {
            reason: format!("unsupported pointer size {other}"),
        }),
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("address", &self.address())
            .field("len", &self.len)
            .field("scope", &self.scope.id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::layout::ByteOrder;

    fn layout(size: u64) -> MemoryLayout {
        MemoryLayout::native_value(size).unwrap()
    }

    #[test]
    fn set_then_get_round_trip() {
        let scope = ResourceScope::confined();
        let region = scope.allocate_native(16, 8).unwrap();
        region.set(&layout(4), 0, 42i32).unwrap();
        region.set(&layout(8), 8, 2.5f64).unwrap();
        assert_eq!(region.get::<i32>(&layout(4), 0).unwrap(), 42);
        assert_eq!(region.get::<f64>(&layout(8), 8).unwrap(), 2.5);
    }

    #[test]
    fn big_endian_layout_swaps_bytes() {
        let scope = ResourceScope::confined();
        let region = scope.allocate_native(4, 4).unwrap();
        let be = layout(4).with_order(ByteOrder::BigEndian);
        region.set(&be, 0, 0x0A0B_0C0Di32).unwrap();
        assert_eq!(region.to_vec().unwrap(), vec![0x0A, 0x0B, 0x0C, 0x0D]);
        assert_eq!(region.get::<i32>(&be, 0).unwrap(), 0x0A0B_0C0D);
    }

    #[test]
    fn unaligned_access_is_allowed() {
        let scope = ResourceScope::confined();
        let region = scope.allocate_native(16, 8).unwrap();
        region.set(&layout(8), 3, -7i64).unwrap();
        assert_eq!(region.get::<i64>(&layout(8), 3).unwrap(), -7);
    }

    #[test]
    fn out_of_bounds_access_fails() {
        let scope = ResourceScope::confined();
        let region = scope.allocate_native(8, 8).unwrap();
        let err = region.get::<i64>(&layout(8), 1).unwrap_err();
        assert_eq!(
            err,
            MemoryError::OutOfBounds {
                offset: 1,
                len: 8,
                size: 8
            }
        );
        assert!(region.slice(4, 5).is_err());
        assert!(region.slice_from(9).is_err());
    }

    #[test]
    fn layout_size_must_match_carrier() {
        let scope = ResourceScope::confined();
        let region = scope.allocate_native(8, 8).unwrap();
        let err = region.set(&layout(8), 0, 1i32).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentMismatch);
    }

    #[test]
    fn slices_share_scope_and_memory() {
        let scope = ResourceScope::confined();
        let region = scope.allocate_native(16, 8).unwrap();
        let tail = region.slice_from(8).unwrap();
        tail.set(&layout(4), 0, 9i32).unwrap();
        assert_eq!(region.get::<i32>(&layout(4), 8).unwrap(), 9);
        assert_eq!(tail.scope_id(), region.scope_id());
        assert!(tail.belongs_to(&scope));
    }

    #[test]
    fn every_operation_fails_after_close() {
        let scope = ResourceScope::confined();
        let region = scope.allocate_native(16, 8).unwrap();
        let slice = region.slice(0, 8).unwrap();
        scope.close().unwrap();
        assert!(!region.is_alive());
        let closed = MemoryError::AlreadyClosed { scope: scope.id() };
        assert_eq!(region.get::<i32>(&layout(4), 0).unwrap_err(), closed);
        assert_eq!(region.set(&layout(4), 0, 1i32).unwrap_err(), closed);
        assert_eq!(region.fill(0).unwrap_err(), closed);
        assert_eq!(region.to_vec().unwrap_err(), closed);
        assert_eq!(region.slice(0, 4).unwrap_err(), closed);
        assert_eq!(slice.copy_from(&region).unwrap_err(), closed);
    }

    #[test]
    fn confined_region_rejects_other_threads() {
        let scope = ResourceScope::confined();
        let region = scope.allocate_native(8, 8).unwrap();
        let err = std::thread::spawn(move || region.get::<i64>(&layout(8), 0))
            .join()
            .unwrap()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Ownership);
    }

    #[test]
    fn address_round_trip_by_layout_width() {
        let scope = ResourceScope::confined();
        let region = scope.allocate_native(16, 8).unwrap();
        region.set_address(&layout(8), 0, MemoryAddress(0x1000)).unwrap();
        region.set_address(&layout(4), 8, MemoryAddress(0x2000)).unwrap();
        assert_eq!(region.get_address(&layout(8), 0).unwrap(), MemoryAddress(0x1000));
        assert_eq!(region.get_address(&layout(4), 8).unwrap(), MemoryAddress(0x2000));
        let err = region.get_address(&layout(2), 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn copy_fill_and_to_vec() {
        let scope = ResourceScope::confined();
        let a = scope.allocate_native(4, 1).unwrap();
        let b = scope.allocate_native(8, 1).unwrap();
        a.fill(0xAB).unwrap();
        b.copy_from(&a).unwrap();
        assert_eq!(b.to_vec().unwrap(), vec![0xAB, 0xAB, 0xAB, 0xAB, 0, 0, 0, 0]);
        assert!(a.copy_from(&b).is_err(), "destination too small");
    }

    #[test]
    fn of_address_views_foreign_memory() {
        let scope = ResourceScope::confined();
        let owned = scope.allocate_native(8, 8).unwrap();
        owned.set(&layout(8), 0, 77i64).unwrap();
        let view = unsafe { Region::of_address(owned.address(), 8, &scope) }.unwrap();
        assert_eq!(view.get::<i64>(&layout(8), 0).unwrap(), 77);
    }
}
