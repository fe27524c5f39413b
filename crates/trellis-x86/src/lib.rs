//! # trellis-x86
//!
//! A table-driven x86/x86-64 instruction decoder.
//!
//! The engine classifies a raw byte stream into a typed
//! [`Instruction`](trellis_core::Instruction) by walking an immutable decision
//! trie: each trie node dispatches on one property of the partially decoded
//! instruction (opcode byte, opcode map, machine mode, mandatory prefix,
//! ModR/M fields, effective operand/address size, W/L/L'/b bits) until a
//! terminal node selects an instruction definition, which is then materialized
//! into concrete operands.
//!
//! Fields that not every path needs (ModR/M, SIB, displacement) are decoded
//! lazily, at most once per call, when a trie node or operand first asks for
//! them.
//!
//! ```
//! use trellis_core::{MachineMode, StackWidth};
//! use trellis_x86::Decoder;
//!
//! let decoder = Decoder::new(MachineMode::Long64, StackWidth::Width64).unwrap();
//! let insn = decoder.decode(&[0x48, 0x01, 0xd8]).unwrap(); // add rax, rbx
//! assert_eq!(insn.mnemonic, "add");
//! assert_eq!(insn.length, 3);
//! ```

mod context;
mod decoder;
mod definition;
mod modrm;
mod operands;
mod prefix;
mod table;
mod trie;

pub mod error;

pub use decoder::{DecodeIter, Decoder};
pub use error::DecodeError;
pub use trie::FilterKind;

// Re-export the output model so most consumers need only this crate.
pub use trellis_core::{
    AvxInfo, BroadcastMode, Immediate, Instruction, MachineMode, MemoryRef, Operand, Register,
    RegisterClass, RoundingMode, StackWidth,
};
