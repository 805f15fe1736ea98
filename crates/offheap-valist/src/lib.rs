//! Variadic argument lists laid out the way a native calling convention
//! expects them.
//!
//! A [`VaListBuilder`] stages typed arguments and serializes them into one
//! scope-owned buffer of fixed-width slots. A [`VaList`] walks such a buffer
//! (or one produced by native code) front to back. Slot width, address
//! width and struct classification come from a [`VaAbi`] policy; [`Win64`]
//! is the policy shipped here.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod abi;
pub mod arg;
pub mod builder;
pub mod list;
pub mod win64;

pub use abi::{TypeClass, VaAbi};
pub use arg::{SimpleVaArg, VaValue};
pub use builder::VaListBuilder;
pub use list::VaList;
pub use win64::Win64;
