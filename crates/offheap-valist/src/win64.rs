//! The Windows x64 variadic convention.
//!
//! Every argument occupies one 8-byte slot. Structs of exactly 1, 2, 4 or
//! 8 bytes travel in the slot; any other struct is copied out of line and
//! the slot holds its address.

use offheap_core::{AddressWidth, ByteOrder, Carrier, MemoryLayout};

use crate::abi::{TypeClass, VaAbi};

/// `char`.
pub const C_CHAR: MemoryLayout = MemoryLayout::scalar(1, ByteOrder::LittleEndian);
/// `short`.
pub const C_SHORT: MemoryLayout = MemoryLayout::scalar(2, ByteOrder::LittleEndian);
/// `int`.
pub const C_INT: MemoryLayout = MemoryLayout::scalar(4, ByteOrder::LittleEndian);
/// `long`, which stays 32 bits wide on this platform.
pub const C_LONG: MemoryLayout = MemoryLayout::scalar(4, ByteOrder::LittleEndian);
/// `long long`.
pub const C_LONG_LONG: MemoryLayout = MemoryLayout::scalar(8, ByteOrder::LittleEndian);
/// `float`.
pub const C_FLOAT: MemoryLayout = MemoryLayout::scalar(4, ByteOrder::LittleEndian);
/// `double`.
pub const C_DOUBLE: MemoryLayout = MemoryLayout::scalar(8, ByteOrder::LittleEndian);
/// Any pointer type.
pub const C_POINTER: MemoryLayout = MemoryLayout::scalar(8, ByteOrder::LittleEndian);

/// Windows x64 policy marker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Win64;

impl VaAbi for Win64 {
    const NAME: &'static str = "win64";
    const SLOT_SIZE: u64 = 8;
    const ADDRESS_WIDTH: AddressWidth = AddressWidth::Bits64;

    fn classify(carrier: Carrier, layout: &MemoryLayout) -> TypeClass {
        match carrier {
            Carrier::Segment => match layout.byte_size() {
                1 | 2 | 4 | 8 => TypeClass::StructRegister,
                _ => TypeClass::StructReference,
            },
            Carrier::Address => TypeClass::Pointer,
            Carrier::Float | Carrier::Double => TypeClass::Float,
            _ => TypeClass::Integer,
        }
    }

    fn address_layout() -> MemoryLayout {
        C_POINTER
    }
}
