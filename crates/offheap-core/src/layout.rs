//! Memory layouts consumed by allocators and variadic lists.
//!
//! Layouts describe size, alignment and byte order of native data. They are
//! read-only inputs here: this module only builds them and answers queries,
//! it never decides how a platform lays out its C types (see the platform
//! layout tables in `offheap-valist`).

use crate::error::MemoryError;

/// Byte order of a value layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    /// Least significant byte first.
    LittleEndian,
    /// Most significant byte first.
    BigEndian,
}

impl ByteOrder {
    /// Byte order of the host.
    pub const fn native() -> Self {
        if cfg!(target_endian = "little") {
            Self::LittleEndian
        } else {
            Self::BigEndian
        }
    }

    /// Whether this is the host byte order.
    pub fn is_native(self) -> bool {
        self == Self::native()
    }
}

/// Structural description of a [`MemoryLayout`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LayoutShape {
    /// A scalar or address value.
    Value,
    /// Unused filler bytes.
    Padding,
    /// `count` repetitions of `element`.
    Sequence {
        /// Number of elements.
        count: u64,
        /// Element layout.
        element: Box<MemoryLayout>,
    },
    /// Members laid out one after another.
    Struct(Vec<MemoryLayout>),
    /// Members overlapping at offset zero.
    Union(Vec<MemoryLayout>),
}

/// Size, alignment, byte order and shape of a piece of native memory.
///
/// Group layouts (`Struct`, `Union`) do not insert padding on their own:
/// callers add explicit [`MemoryLayout::padding`] members where the platform
/// requires them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryLayout {
    size: u64,
    align: u64,
    order: ByteOrder,
    shape: LayoutShape,
}

impl MemoryLayout {
    /// Native-order 1-byte value.
    pub const BITS_8: MemoryLayout = MemoryLayout::scalar(1, ByteOrder::native());
    /// Native-order 2-byte value.
    pub const BITS_16: MemoryLayout = MemoryLayout::scalar(2, ByteOrder::native());
    /// Native-order 4-byte value.
    pub const BITS_32: MemoryLayout = MemoryLayout::scalar(4, ByteOrder::native());
    /// Native-order 8-byte value.
    pub const BITS_64: MemoryLayout = MemoryLayout::scalar(8, ByteOrder::native());

    /// A naturally aligned scalar layout, usable in constants.
    ///
    /// # Panics
    ///
    /// Panics (at compile time in a const context) unless `size` is 1, 2, 4 or 8.
    pub const fn scalar(size: u64, order: ByteOrder) -> Self {
        assert!(
            matches!(size, 1 | 2 | 4 | 8),
            "scalar layouts are 1, 2, 4 or 8 bytes"
        );
        Self {
            size,
            align: size,
            order,
            shape: LayoutShape::Value,
        }
    }

    /// A naturally aligned value layout of `size` bytes in the given order.
    ///
    /// `size` must be a power of two; use [`MemoryLayout::with_alignment`]
    /// for under-aligned values.
    pub fn value(size: u64, order: ByteOrder) -> Result<Self, MemoryError> {
        if !size.is_power_of_two() {
            return Err(MemoryError::invalid(format!(
                "value layout size must be a power of two (got {size})"
            )));
        }
        Ok(Self {
            size,
            align: size,
            order,
            shape: LayoutShape::Value,
        })
    }

    /// A native-order value layout of `size` bytes.
    pub fn native_value(size: u64) -> Result<Self, MemoryError> {
        Self::value(size, ByteOrder::native())
    }

    /// `size` bytes of padding with alignment 1.
    pub fn padding(size: u64) -> Self {
        Self {
            size,
            align: 1,
            order: ByteOrder::native(),
            shape: LayoutShape::Padding,
        }
    }

    /// A sequence of `count` elements.
    pub fn sequence(count: u64, element: MemoryLayout) -> Result<Self, MemoryError> {
        let size = element.size.checked_mul(count).ok_or_else(|| {
            MemoryError::invalid(format!(
                "sequence of {count} x {} bytes overflows",
                element.size
            ))
        })?;
        Ok(Self {
            size,
            align: element.align,
            order: element.order,
            shape: LayoutShape::Sequence {
                count,
                element: Box::new(element),
            },
        })
    }

    /// A struct whose size is the sum of its members' sizes and whose
    /// alignment is the largest member alignment.
    pub fn structure(members: Vec<MemoryLayout>) -> Result<Self, MemoryError> {
        let mut size = 0u64;
        for m in &members {
            size = size
                .checked_add(m.size)
                .ok_or_else(|| MemoryError::invalid("struct layout size overflows"))?;
        }
        let align = members.iter().map(|m| m.align).max().unwrap_or(1);
        Ok(Self {
            size,
            align,
            order: ByteOrder::native(),
            shape: LayoutShape::Struct(members),
        })
    }

    /// A union whose size is its largest member and whose alignment is the
    /// largest member alignment.
    pub fn union(members: Vec<MemoryLayout>) -> Self {
        let size = members.iter().map(|m| m.size).max().unwrap_or(0);
        let align = members.iter().map(|m| m.align).max().unwrap_or(1);
        Self {
            size,
            align,
            order: ByteOrder::native(),
            shape: LayoutShape::Union(members),
        }
    }

    /// The same layout with a different alignment.
    pub fn with_alignment(mut self, align: u64) -> Result<Self, MemoryError> {
        if !align.is_power_of_two() {
            return Err(MemoryError::invalid(format!(
                "alignment must be a power of two (got {align})"
            )));
        }
        self.align = align;
        Ok(self)
    }

    /// The same layout with a different byte order.
    pub fn with_order(mut self, order: ByteOrder) -> Self {
        self.order = order;
        self
    }

    /// Size in bytes.
    pub fn byte_size(&self) -> u64 {
        self.size
    }

    /// Alignment in bytes.
    pub fn byte_alignment(&self) -> u64 {
        self.align
    }

    /// Byte order.
    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// Structural shape.
    pub fn shape(&self) -> &LayoutShape {
        &self.shape
    }

    /// Whether this is a scalar/address value layout.
    pub fn is_value(&self) -> bool {
        matches!(self.shape, LayoutShape::Value)
    }

    /// Whether this is a struct or union layout.
    pub fn is_group(&self) -> bool {
        matches!(self.shape, LayoutShape::Struct(_) | LayoutShape::Union(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int() -> MemoryLayout {
        MemoryLayout::native_value(4).unwrap()
    }

    #[test]
    fn value_is_naturally_aligned() {
        let l = MemoryLayout::native_value(8).unwrap();
        assert_eq!(l.byte_size(), 8);
        assert_eq!(l.byte_alignment(), 8);
        assert!(l.is_value());
        assert!(!l.is_group());
    }

    #[test]
    fn value_rejects_odd_size() {
        assert!(MemoryLayout::native_value(3).is_err());
    }

    #[test]
    fn struct_sums_sizes_and_takes_max_alignment() {
        let l = MemoryLayout::structure(vec![
            MemoryLayout::native_value(1).unwrap(),
            MemoryLayout::padding(3),
            int(),
            MemoryLayout::native_value(8).unwrap(),
        ])
        .unwrap();
        assert_eq!(l.byte_size(), 16);
        assert_eq!(l.byte_alignment(), 8);
        assert!(l.is_group());
    }

    #[test]
    fn union_takes_largest_member() {
        let l = MemoryLayout::union(vec![int(), MemoryLayout::native_value(2).unwrap()]);
        assert_eq!(l.byte_size(), 4);
        assert!(l.is_group());
    }

    #[test]
    fn sequence_multiplies_and_detects_overflow() {
        let l = MemoryLayout::sequence(10, int()).unwrap();
        assert_eq!(l.byte_size(), 40);
        assert_eq!(l.byte_alignment(), 4);
        assert!(MemoryLayout::sequence(u64::MAX, int()).is_err());
    }

    #[test]
    fn with_alignment_validates_power_of_two() {
        assert_eq!(int().with_alignment(1).unwrap().byte_alignment(), 1);
        assert!(int().with_alignment(6).is_err());
    }

    #[test]
    fn scalar_constants_are_native_values() {
        assert_eq!(MemoryLayout::BITS_32, int());
        assert_eq!(MemoryLayout::BITS_64.byte_alignment(), 8);
        let be = MemoryLayout::scalar(2, ByteOrder::BigEndian);
        assert_eq!(be.order(), ByteOrder::BigEndian);
    }

    #[test]
    #[should_panic(expected = "scalar layouts")]
    fn scalar_rejects_odd_size() {
        let _ = MemoryLayout::scalar(3, ByteOrder::native());
    }

    #[test]
    fn native_order_matches_target() {
        let expected = if cfg!(target_endian = "little") {
            ByteOrder::LittleEndian
        } else {
            ByteOrder::BigEndian
        };
        assert_eq!(ByteOrder::native(), expected);
        assert!(int().order().is_native());
    }
}
