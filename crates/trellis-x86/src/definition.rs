//! Instruction definitions and the definition store.
//!
//! A definition is the compact schema a terminal trie node points at: the
//! mnemonic, up to five operand definitions and the EVEX semantics needed to
//! interpret the prefix bits for this particular instruction. Definitions are
//! data - materializing them against a decode context happens in
//! [`crate::operands`].

use trellis_core::BroadcastMode;

/// Maximum number of operands a definition may carry.
pub const MAX_OPERANDS: usize = 5;

/// Semantic type of an operand: which register file, memory variant or
/// immediate interpretation the operand's raw bits select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticType {
    /// General-purpose register of fixed width.
    Gpr8,
    Gpr16,
    Gpr32,
    Gpr64,
    /// Vector register (mm/xmm/ymm/zmm by width).
    Vr64,
    Vr128,
    Vr256,
    Vr512,
    SegmentReg,
    ControlReg,
    DebugReg,
    MaskReg,
    BoundReg,
    /// Plain memory operand; `width` in bits, 0 = effective operand width.
    /// Register-direct ModR/M forms are an [`IllegalOperandState`]
    /// for this type.
    ///
    /// [`IllegalOperandState`]: crate::DecodeError::IllegalOperandState
    Mem { width: u16 },
    /// EVEX broadcast memory: one `element`-bit scalar replicated.
    MemBroadcast { element: u16, mode: BroadcastMode },
    /// VSIB gather/scatter memory: vector index of `index_width` bits,
    /// `element`-bit elements.
    MemVsib { element: u16, index_width: u16 },
    /// Sign-extended immediate.
    Imm8,
    Imm16,
    Imm32,
    /// 64-bit immediate, not extended.
    Imm64,
    /// Zero-extended 8-bit immediate.
    Imm8U,
    /// Sign-extended relative branch offset.
    Rel8,
    Rel16,
    Rel32,
    /// Far pointer `ptr16:16` / `ptr16:32`.
    Ptr1616,
    Ptr1632,
    /// Direct memory offset (`moffs`): an address-width-wide absolute
    /// address; access `width` in bits, 0 = effective operand width.
    Moffs { width: u16 },
    /// Implicit fixed general-purpose register.
    FixedGpr { id: u16, width: u16 },
    /// Implicit fixed segment register.
    FixedSegment { id: u16 },
    /// The literal constant 1 (shift-by-one forms).
    Const1,
}

/// Where in the instruction an operand's value is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandEncoding {
    /// ModR/M.reg, extended by REX.R / VEX.R / EVEX.R'R.
    ModrmReg,
    /// ModR/M.rm (register or memory form), extended by B/X bits.
    ModrmRm,
    /// Low 3 bits of the opcode byte, extended by REX.B.
    OpcodeBits,
    /// VEX/EVEX.vvvv, extended by EVEX.v'.
    Vvvv,
    /// Immediate / displacement bytes after the addressing fields.
    Immediate,
    /// Not encoded; the operand is implied by the definition.
    Implicit,
}

/// How the instruction accesses the operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandAccess {
    Read,
    Write,
    ReadWrite,
    /// Read or written depending on runtime state (e.g. CMOVcc destinations).
    Conditional,
}

/// One operand schema entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperandDef {
    pub semantic: SemanticType,
    pub encoding: OperandEncoding,
    pub access: OperandAccess,
}

impl OperandDef {
    pub const fn new(
        semantic: SemanticType,
        encoding: OperandEncoding,
        access: OperandAccess,
    ) -> Self {
        Self {
            semantic,
            encoding,
            access,
        }
    }
}

/// How EVEX.b is interpreted for one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvexBFunctionality {
    /// The bit is not meaningful here.
    #[default]
    None,
    /// Memory forms: broadcast a scalar element.
    Broadcast,
    /// Register forms: static rounding control (implies SAE).
    RoundingControl,
    /// Register forms: suppress all exceptions.
    SuppressAllExceptions,
}

/// A complete instruction definition.
#[derive(Debug, Clone)]
pub struct InstructionDef {
    pub mnemonic: &'static str,
    /// Ordered operand schemas, at most [`MAX_OPERANDS`].
    pub operands: Vec<OperandDef>,
    pub evex_b: EvexBFunctionality,
    /// Whether EVEX opmask (aaa) semantics apply.
    pub has_mask: bool,
    /// Whether EVEX zeroing (z) semantics apply.
    pub has_zeroing: bool,
}

impl InstructionDef {
    pub fn new(mnemonic: &'static str, operands: Vec<OperandDef>) -> Self {
        assert!(operands.len() <= MAX_OPERANDS);
        Self {
            mnemonic,
            operands,
            evex_b: EvexBFunctionality::None,
            has_mask: false,
            has_zeroing: false,
        }
    }

    pub fn with_evex_b(mut self, evex_b: EvexBFunctionality) -> Self {
        self.evex_b = evex_b;
        self
    }

    pub fn with_mask(mut self) -> Self {
        self.has_mask = true;
        self.has_zeroing = true;
        self
    }
}

/// Append-only at build time, read-only afterwards; terminal trie nodes hold
/// indices into this store.
#[derive(Debug, Default)]
pub struct DefinitionStore {
    defs: Vec<InstructionDef>,
}

impl DefinitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a definition, returning its index.
    pub fn push(&mut self, def: InstructionDef) -> u16 {
        let index = self.defs.len();
        assert!(index <= u16::MAX as usize, "definition store overflow");
        self.defs.push(def);
        index as u16
    }

    /// O(1) lookup. The trie guarantees indices are in range.
    pub fn get(&self, index: u16) -> &InstructionDef {
        &self.defs[index as usize]
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}
