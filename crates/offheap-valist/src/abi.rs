//! The per-ABI policy the builder and the cursor are generic over.

use offheap_core::{AddressWidth, Carrier, MemoryError, MemoryLayout};

/// How one variadic argument travels in its slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeClass {
    /// Integer scalar, widened to the slot.
    Integer,
    /// Floating-point scalar.
    Float,
    /// Native address.
    Pointer,
    /// Struct whose bytes are stored in the slot itself.
    StructRegister,
    /// Struct stored out of line; the slot holds its address.
    StructReference,
}

impl TypeClass {
    /// Whether this class describes a struct argument.
    pub fn is_struct(self) -> bool {
        matches!(self, Self::StructRegister | Self::StructReference)
    }
}

/// Slot geometry and classification rules of one calling convention.
///
/// Implementations are zero-sized markers; everything is associated.
pub trait VaAbi: Send + Sync + 'static {
    /// Short name used in error messages.
    const NAME: &'static str;

    /// Width of one variadic slot in bytes.
    const SLOT_SIZE: u64;

    /// Width of a native address.
    const ADDRESS_WIDTH: AddressWidth;

    /// Classify an argument of `carrier` described by `layout`.
    ///
    /// The builder and the cursor both call this; a list is only readable
    /// because both sides agree on the answer.
    fn classify(carrier: Carrier, layout: &MemoryLayout) -> TypeClass;

    /// The layout a slot address is stored with.
    fn address_layout() -> MemoryLayout;
}

/// Classify a struct argument, rejecting in-register structs that would
/// spill past their slot.
pub(crate) fn classify_struct<A: VaAbi>(layout: &MemoryLayout) -> Result<TypeClass, MemoryError> {
    match A::classify(Carrier::Segment, layout) {
        TypeClass::StructRegister if layout.byte_size() > A::SLOT_SIZE => Err(MemoryError::Unsupported {
            reason: format!(
                "{}: in-register struct of {} bytes exceeds the {}-byte slot",
                A::NAME,
                layout.byte_size(),
                A::SLOT_SIZE
            ),
        }),
        class if class.is_struct() => Ok(class),
        class => Err(MemoryError::Unsupported {
            reason: format!("{}: struct layout classified as {class:?}", A::NAME),
        }),
    }
}
