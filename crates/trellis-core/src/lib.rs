//! # trellis-core
//!
//! Shared instruction model for the trellis x86 decoder. This crate defines
//! the machine-mode, register, operand and decoded-instruction types that the
//! decoding engine produces and that downstream consumers (formatters,
//! analysis passes, test harnesses) operate on.
//!
//! The types here are deliberately free of decoding logic: they describe the
//! *result* of a decode, not the process.

pub mod instruction;
pub mod mode;
pub mod operand;
pub mod register;

pub use instruction::{AvxInfo, Instruction, RoundingMode};
pub use mode::{MachineMode, StackWidth};
pub use operand::{BroadcastMode, Immediate, MemoryRef, Operand};
pub use register::{Register, RegisterClass};
