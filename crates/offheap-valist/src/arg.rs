//! Staged arguments awaiting serialization.

use offheap_core::{Carrier, MemoryAddress, MemoryLayout, Region};

/// The value of one staged argument.
#[derive(Clone, Debug)]
pub enum VaValue {
    /// 32-bit integer.
    Int(i32),
    /// 64-bit integer.
    Long(i64),
    /// Double-precision float.
    Double(f64),
    /// Native address.
    Address(MemoryAddress),
    /// Struct contents, copied at build time.
    Segment(Region),
}

impl VaValue {
    /// Carrier this value is written with.
    pub fn carrier(&self) -> Carrier {
        match self {
            Self::Int(_) => Carrier::Int,
            Self::Long(_) => Carrier::Long,
            Self::Double(_) => Carrier::Double,
            Self::Address(_) => Carrier::Address,
            Self::Segment(_) => Carrier::Segment,
        }
    }
}

/// One argument: a layout-checked value waiting for its slot.
#[derive(Clone, Debug)]
pub struct SimpleVaArg {
    layout: MemoryLayout,
    value: VaValue,
}

impl SimpleVaArg {
    /// Callers validate `layout` against the value's carrier first.
    pub(crate) fn new(layout: MemoryLayout, value: VaValue) -> Self {
        Self { layout, value }
    }

    /// Declared layout.
    pub fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    /// Staged value.
    pub fn value(&self) -> &VaValue {
        &self.value
    }

    /// Carrier of the staged value.
    pub fn carrier(&self) -> Carrier {
        self.value.carrier()
    }
}
