//! Carriers, primitive value codecs and native addresses.
//!
//! A [`Carrier`] names the Rust-side representation a native value is read
//! into or written from. Every access pairs a carrier with a
//! [`MemoryLayout`]; [`Carrier::check_layout`] is the single place the pair
//! is validated.

use std::fmt;

use crate::error::MemoryError;
use crate::layout::{ByteOrder, MemoryLayout};

/// The Rust-side representation of a native value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Carrier {
    /// 1-byte integer.
    Byte,
    /// 2-byte unsigned character.
    Char,
    /// 2-byte signed integer.
    Short,
    /// 4-byte integer.
    Int,
    /// 4-byte IEEE float.
    Float,
    /// 8-byte integer.
    Long,
    /// 8-byte IEEE float.
    Double,
    /// A native address whose width is set by the platform.
    Address,
    /// A struct or union passed by value.
    Segment,
}

impl Carrier {
    /// Natural size of a primitive carrier, `None` for `Address` and `Segment`.
    pub fn primitive_size(self) -> Option<u64> {
        match self {
            Self::Byte => Some(1),
            Self::Char | Self::Short => Some(2),
            Self::Int | Self::Float => Some(4),
            Self::Long | Self::Double => Some(8),
            Self::Address | Self::Segment => None,
        }
    }

    /// Validate that `layout` can carry this carrier on a platform with the
    /// given address width.
    pub fn check_layout(self, layout: &MemoryLayout, width: AddressWidth) -> Result<(), MemoryError> {
        match self {
            Self::Segment => {
                if !layout.is_group() {
                    return Err(MemoryError::invalid(
                        "segment carrier requires a struct or union layout",
                    ));
                }
                Ok(())
            }
            Self::Address => {
                if !layout.is_value() {
                    return Err(MemoryError::invalid("address carrier requires a value layout"));
                }
                check_size(width.bytes(), layout.byte_size())
            }
            primitive => {
                if !layout.is_value() {
                    return Err(MemoryError::invalid(format!(
                        "{primitive:?} carrier requires a value layout"
                    )));
                }
                // primitive_size is Some for every remaining variant.
                check_size(primitive.primitive_size().unwrap_or(0), layout.byte_size())
            }
        }
    }
}

fn check_size(expected: u64, actual: u64) -> Result<(), MemoryError> {
    if expected != actual {
        return Err(MemoryError::LayoutMismatch { expected, actual });
    }
    Ok(())
}

mod sealed {
    pub trait Sealed {}
}

/// A fixed-size numeric type that can be stored in native memory.
///
/// Implemented for `i8`, `u8`, `i16`, `u16`, `i32`, `u32`, `f32`, `i64`,
/// `u64` and `f64`. Sealed.
pub trait Primitive: Copy + fmt::Debug + PartialEq + Send + Sync + sealed::Sealed + 'static {
    /// The carrier this type reads and writes as.
    const CARRIER: Carrier;
    /// Size in bytes.
    const SIZE: usize;

    /// Encode into `out` (exactly `SIZE` bytes) in the given byte order.
    fn encode(self, order: ByteOrder, out: &mut [u8]);

    /// Decode from `bytes` (exactly `SIZE` bytes) in the given byte order.
    fn decode(bytes: &[u8], order: ByteOrder) -> Self;
}

macro_rules! impl_primitive {
    ($($ty:ty => $carrier:ident),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl Primitive for $ty {
                const CARRIER: Carrier = Carrier::$carrier;
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn encode(self, order: ByteOrder, out: &mut [u8]) {
                    let bytes = match order {
                        ByteOrder::LittleEndian => self.to_le_bytes(),
                        ByteOrder::BigEndian => self.to_be_bytes(),
                    };
                    out.copy_from_slice(&bytes);
                }

                fn decode(bytes: &[u8], order: ByteOrder) -> Self {
                    let mut buf = [0u8; std::mem::size_of::<$ty>()];
                    buf.copy_from_slice(bytes);
                    match order {
                        ByteOrder::LittleEndian => <$ty>::from_le_bytes(buf),
                        ByteOrder::BigEndian => <$ty>::from_be_bytes(buf),
                    }
                }
            }
        )*
    };
}

impl_primitive! {
    i8 => Byte,
    u8 => Byte,
    i16 => Short,
    u16 => Char,
    i32 => Int,
    u32 => Int,
    f32 => Float,
    i64 => Long,
    u64 => Long,
    f64 => Double,
}

/// Width of a native address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AddressWidth {
    /// 32-bit addresses.
    Bits32,
    /// 64-bit addresses.
    Bits64,
}

impl AddressWidth {
    /// Map a bit count to a width. Only 32 and 64 are modelled.
    pub fn from_bits(bits: u32) -> Result<Self, MemoryError> {
        match bits {
            32 => Ok(Self::Bits32),
            64 => Ok(Self::Bits64),
            other => Err(MemoryError::unsupported(format!(
                "address width of {other} bits"
            ))),
        }
    }

    /// Width of a host pointer.
    pub const fn native() -> Self {
        if cfg!(target_pointer_width = "32") {
            Self::Bits32
        } else {
            Self::Bits64
        }
    }

    /// Size of an address in bytes.
    pub fn bytes(self) -> u64 {
        match self {
            Self::Bits32 => 4,
            Self::Bits64 => 8,
        }
    }

    /// Size of an address in bits.
    pub fn bits(self) -> u32 {
        match self {
            Self::Bits32 => 32,
            Self::Bits64 => 64,
        }
    }
}

/// A raw native address.
///
/// Addresses are plain numbers: holding one grants no access. Use
/// [`Region::of_address`](crate::region::Region::of_address) to view the
/// memory behind it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemoryAddress(pub u64);

impl MemoryAddress {
    /// The null address.
    pub const NULL: MemoryAddress = MemoryAddress(0);

    /// The raw numeric value.
    pub fn to_raw(self) -> u64 {
        self.0
    }

    /// Whether this is the null address.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// This address displaced by `offset` bytes.
    pub fn add_offset(self, offset: u64) -> Result<Self, MemoryError> {
        self.0
            .checked_add(offset)
            .map(Self)
            .ok_or_else(|| MemoryError::invalid("address arithmetic overflows"))
    }

    /// Encode into `out` (exactly `width.bytes()` bytes).
    ///
    /// Fails if the address does not fit a 32-bit width.
    pub fn encode(self, width: AddressWidth, order: ByteOrder, out: &mut [u8]) -> Result<(), MemoryError> {
        match width {
            AddressWidth::Bits32 => {
                let narrow = u32::try_from(self.0).map_err(|_| {
                    MemoryError::invalid(format!("address {self} does not fit in 32 bits"))
                })?;
                narrow.encode(order, out);
            }
            AddressWidth::Bits64 => self.0.encode(order, out),
        }
        Ok(())
    }

    /// Decode from `bytes` (exactly `width.bytes()` bytes).
    pub fn decode(bytes: &[u8], width: AddressWidth, order: ByteOrder) -> Self {
        match width {
            AddressWidth::Bits32 => Self(u64::from(u32::decode(bytes, order))),
            AddressWidth::Bits64 => Self(u64::decode(bytes, order)),
        }
    }
}

impl fmt::Display for MemoryAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<u64> for MemoryAddress {
    fn from(v: u64) -> Self {
        Self(v)
    }
}
