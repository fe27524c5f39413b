//! Decode error types.
//!
//! Malformed input is an expected outcome for arbitrary byte streams, so every
//! failure is a typed value carrying enough context (byte offset, dispatch
//! point) for the caller to act on. The engine never retries or recovers.

use thiserror::Error;
use trellis_core::{MachineMode, StackWidth};

use crate::trie::FilterKind;

/// Error type for instruction decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Buffer exhausted before a structurally required field was fully read.
    #[error("truncated instruction at offset {offset}: need {needed} bytes, have {available}")]
    InsufficientLength {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Conflicting prefix combination (e.g. REX together with VEX).
    #[error("malformed prefix at offset {offset}: {reason}")]
    MalformedPrefix { offset: usize, reason: &'static str },

    /// Reserved or forbidden bit pattern inside a prefix.
    #[error("invalid prefix encoding at offset {offset}: {reason}")]
    InvalidPrefixEncoding { offset: usize, reason: &'static str },

    /// Trie traversal reached the explicit "no instruction" sentinel.
    #[error("unrecognized instruction at offset {offset} (while dispatching on {filter:?})")]
    UnrecognizedInstruction { offset: usize, filter: FilterKind },

    /// An operand's resolved encoding violates architectural constraints.
    #[error("illegal operand state at offset {offset}: {reason}")]
    IllegalOperandState { offset: usize, reason: &'static str },

    /// The instruction would exceed the architectural 15-byte limit.
    #[error("instruction exceeds 15 bytes (read at offset {offset})")]
    InstructionTooLong { offset: usize },

    /// The requested mode/stack-width combination does not exist.
    #[error("unsupported mode: {mode:?} with {stack_width:?}")]
    UnsupportedMode {
        mode: MachineMode,
        stack_width: StackWidth,
    },
}

impl DecodeError {
    /// Creates an InsufficientLength error.
    pub fn insufficient(offset: usize, needed: usize, available: usize) -> Self {
        Self::InsufficientLength {
            offset,
            needed,
            available,
        }
    }

    /// Creates a MalformedPrefix error.
    pub fn malformed_prefix(offset: usize, reason: &'static str) -> Self {
        Self::MalformedPrefix { offset, reason }
    }

    /// Creates an InvalidPrefixEncoding error.
    pub fn invalid_prefix(offset: usize, reason: &'static str) -> Self {
        Self::InvalidPrefixEncoding { offset, reason }
    }

    /// Creates an IllegalOperandState error.
    pub fn illegal_operand(offset: usize, reason: &'static str) -> Self {
        Self::IllegalOperandState { offset, reason }
    }

    /// Creates an InstructionTooLong error.
    pub fn too_long(offset: usize) -> Self {
        Self::InstructionTooLong { offset }
    }

    /// Returns true if the error indicates a truncated buffer.
    pub fn is_truncation(&self) -> bool {
        matches!(self, Self::InsufficientLength { .. })
    }
}
