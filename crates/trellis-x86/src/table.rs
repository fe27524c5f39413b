//! Instruction table data.
//!
//! Declares the decision trie paths and instruction definitions for the
//! supported instruction subset. The tables are built once, on first use, and
//! shared process-wide; a malformed table entry panics during this one-time
//! build, never during decoding.
//!
//! Path layout convention: every path starts with the opcode byte, an XOP
//! gate and (for non-XOP encodings) the encoding/map dispatch, followed by
//! whatever narrower filters the opcode needs, in the fixed order
//! mode, mandatory prefix, ModR/M.mod, ModR/M.reg, ModR/M.rm, operand size,
//! address size, W, L, L', b. Opcodes omit filters they do not dispatch on.

use std::sync::OnceLock;

use trellis_core::BroadcastMode;

use crate::definition::{
    DefinitionStore, EvexBFunctionality, InstructionDef, OperandAccess, OperandDef,
    OperandEncoding, SemanticType,
};
use crate::trie::{FilterKind, ModBuckets, Trie, TrieBuilder};

use OperandAccess::{Conditional, Read, ReadWrite, Write};
use OperandEncoding::{Immediate, Implicit, ModrmReg, ModrmRm, OpcodeBits, Vvvv};
use SemanticType::*;

/// The immutable decode tables: the trie and the definitions its terminals
/// reference.
pub(crate) struct Tables {
    pub trie: Trie,
    pub defs: DefinitionStore,
}

static TABLES: OnceLock<Tables> = OnceLock::new();

/// Returns the process-wide tables, building them on first use.
pub(crate) fn tables() -> &'static Tables {
    TABLES.get_or_init(build)
}

/// A trie path under construction.
#[derive(Clone)]
struct Path {
    steps: Vec<(FilterKind, usize)>,
}

impl Path {
    /// A one-byte-map legacy opcode.
    fn one_byte(opcode: u8) -> Self {
        Self {
            steps: vec![
                (FilterKind::Opcode, opcode as usize),
                (FilterKind::XopMap, 0),
                (FilterKind::VexMap, 0),
            ],
        }
    }

    /// A 0F-map legacy opcode.
    fn two_byte(opcode: u8) -> Self {
        Self {
            steps: vec![
                (FilterKind::Opcode, opcode as usize),
                (FilterKind::XopMap, 0),
                (FilterKind::VexMap, 1),
            ],
        }
    }

    /// A VEX-encoded opcode in map 1-3.
    fn vex(opcode: u8, map: usize) -> Self {
        Self {
            steps: vec![
                (FilterKind::Opcode, opcode as usize),
                (FilterKind::XopMap, 0),
                (FilterKind::VexMap, 4 + map),
            ],
        }
    }

    /// An EVEX-encoded opcode in map 1-3.
    fn evex(opcode: u8, map: usize) -> Self {
        Self {
            steps: vec![
                (FilterKind::Opcode, opcode as usize),
                (FilterKind::XopMap, 0),
                (FilterKind::VexMap, 8 + map),
            ],
        }
    }

    /// An XOP-encoded opcode in map 8-10.
    fn xop(opcode: u8, map: usize) -> Self {
        Self {
            steps: vec![
                (FilterKind::Opcode, opcode as usize),
                (FilterKind::XopMap, map - 7),
            ],
        }
    }

    fn step(mut self, kind: FilterKind, index: usize) -> Self {
        self.steps.push((kind, index));
        self
    }

    /// Machine mode bucket: 0 = 16-bit, 1 = 32-bit, 2 = 64-bit.
    fn mode(self, index: usize) -> Self {
        self.step(FilterKind::Mode, index)
    }

    /// Mandatory prefix slot: 0 = none, 1 = 66, 2 = F3, 3 = F2.
    fn mandatory(self, slot: usize) -> Self {
        self.step(FilterKind::MandatoryPrefix, slot)
    }

    /// ModR/M memory form (mod != 11).
    fn mem(self) -> Self {
        self.step(FilterKind::ModrmMod(ModBuckets::Coarse), 0)
    }

    /// ModR/M register-direct form (mod == 11).
    fn reg_form(self) -> Self {
        self.step(FilterKind::ModrmMod(ModBuckets::Coarse), 1)
    }

    /// Raw ModR/M.mod value.
    fn modrm_mod(self, value: usize) -> Self {
        self.step(FilterKind::ModrmMod(ModBuckets::Fine), value)
    }

    fn modrm_reg(self, value: usize) -> Self {
        self.step(FilterKind::ModrmReg, value)
    }

    fn modrm_rm(self, value: usize) -> Self {
        self.step(FilterKind::ModrmRm, value)
    }

    /// Effective operand width bucket: 0 = 16, 1 = 32, 2 = 64.
    fn osz(self, index: usize) -> Self {
        self.step(FilterKind::OperandSize, index)
    }

    /// Effective address width bucket: 0 = 16, 1 = 32, 2 = 64.
    fn asz(self, index: usize) -> Self {
        self.step(FilterKind::AddressSize, index)
    }

    fn w(self, bit: usize) -> Self {
        self.step(FilterKind::RexW, bit)
    }

    fn l(self, bit: usize) -> Self {
        self.step(FilterKind::VexL, bit)
    }

    fn l2(self, bit: usize) -> Self {
        self.step(FilterKind::EvexL2, bit)
    }

    fn b(self, bit: usize) -> Self {
        self.step(FilterKind::EvexB, bit)
    }
}

struct TableBuilder {
    trie: TrieBuilder,
    defs: DefinitionStore,
}

impl TableBuilder {
    fn new() -> Self {
        Self {
            trie: TrieBuilder::new(),
            defs: DefinitionStore::new(),
        }
    }

    fn add(&mut self, path: Path, def: InstructionDef) {
        let operand_count = def.operands.len() as u8;
        let id = self.defs.push(def);
        self.trie.insert(&path.steps, id, operand_count);
    }
}

const fn o(semantic: SemanticType, encoding: OperandEncoding, access: OperandAccess) -> OperandDef {
    OperandDef::new(semantic, encoding, access)
}

/// GPR semantic per operand-size bucket.
const GPR_BY_OSZ: [SemanticType; 3] = [Gpr16, Gpr32, Gpr64];
/// Full-width immediate per operand-size bucket (64-bit takes imm32,
/// sign-extended).
const IMMZ_BY_OSZ: [SemanticType; 3] = [Imm16, Imm32, Imm32];
/// Full-width relative offset per operand-size bucket.
const RELZ_BY_OSZ: [SemanticType; 3] = [Rel16, Rel32, Rel32];
/// Vector register semantic per L'L length bucket.
const VR_BY_LEN: [SemanticType; 3] = [Vr128, Vr256, Vr512];
const WIDTH_BY_OSZ: [u16; 3] = [16, 32, 64];

/// L'L step pair for a vector length bucket (128/256/512).
const fn len_bits(len: usize) -> (usize, usize) {
    match len {
        0 => (0, 0),
        1 => (1, 0),
        _ => (0, 1),
    }
}

fn build() -> Tables {
    let mut t = TableBuilder::new();
    one_byte_alu(&mut t);
    immediate_groups(&mut t);
    shift_groups(&mut t);
    mov_family(&mut t);
    stack_ops(&mut t);
    control_flow(&mut t);
    group5(&mut t);
    system_ops(&mut t);
    moffs_forms(&mut t);
    sse_family(&mut t);
    vex_family(&mut t);
    evex_family(&mut t);
    xop_family(&mut t);
    Tables {
        trie: t.trie.finish(),
        defs: t.defs,
    }
}

/// The classic one-byte ALU block: eight operations, six encodings each.
fn one_byte_alu(t: &mut TableBuilder) {
    const OPS: [(&str, u8); 8] = [
        ("add", 0x00),
        ("or", 0x08),
        ("adc", 0x10),
        ("sbb", 0x18),
        ("and", 0x20),
        ("sub", 0x28),
        ("xor", 0x30),
        ("cmp", 0x38),
    ];
    for (mnemonic, base) in OPS {
        // cmp only reads its destination.
        let dst = if base == 0x38 { Read } else { ReadWrite };
        t.add(
            Path::one_byte(base),
            InstructionDef::new(mnemonic, vec![o(Gpr8, ModrmRm, dst), o(Gpr8, ModrmReg, Read)]),
        );
        t.add(
            Path::one_byte(base + 2),
            InstructionDef::new(mnemonic, vec![o(Gpr8, ModrmReg, dst), o(Gpr8, ModrmRm, Read)]),
        );
        t.add(
            Path::one_byte(base + 4),
            InstructionDef::new(
                mnemonic,
                vec![
                    o(FixedGpr { id: 0, width: 8 }, Implicit, dst),
                    o(Imm8, Immediate, Read),
                ],
            ),
        );
        for i in 0..3 {
            let g = GPR_BY_OSZ[i];
            t.add(
                Path::one_byte(base + 1).osz(i),
                InstructionDef::new(mnemonic, vec![o(g, ModrmRm, dst), o(g, ModrmReg, Read)]),
            );
            t.add(
                Path::one_byte(base + 3).osz(i),
                InstructionDef::new(mnemonic, vec![o(g, ModrmReg, dst), o(g, ModrmRm, Read)]),
            );
            t.add(
                Path::one_byte(base + 5).osz(i),
                InstructionDef::new(
                    mnemonic,
                    vec![
                        o(
                            FixedGpr {
                                id: 0,
                                width: WIDTH_BY_OSZ[i],
                            },
                            Implicit,
                            dst,
                        ),
                        o(IMMZ_BY_OSZ[i], Immediate, Read),
                    ],
                ),
            );
        }
    }
}

/// Immediate group 1 (0x80-0x83): the ALU operation lives in ModR/M.reg.
fn immediate_groups(t: &mut TableBuilder) {
    const OPS: [&str; 8] = ["add", "or", "adc", "sbb", "and", "sub", "xor", "cmp"];
    for (reg, mnemonic) in OPS.into_iter().enumerate() {
        let dst = if reg == 7 { Read } else { ReadWrite };
        t.add(
            Path::one_byte(0x80).modrm_reg(reg),
            InstructionDef::new(mnemonic, vec![o(Gpr8, ModrmRm, dst), o(Imm8, Immediate, Read)]),
        );
        // 0x82 aliases 0x80 outside long mode only.
        for mode in 0..2 {
            t.add(
                Path::one_byte(0x82).mode(mode).modrm_reg(reg),
                InstructionDef::new(
                    mnemonic,
                    vec![o(Gpr8, ModrmRm, dst), o(Imm8, Immediate, Read)],
                ),
            );
        }
        for i in 0..3 {
            let g = GPR_BY_OSZ[i];
            t.add(
                Path::one_byte(0x81).modrm_reg(reg).osz(i),
                InstructionDef::new(
                    mnemonic,
                    vec![o(g, ModrmRm, dst), o(IMMZ_BY_OSZ[i], Immediate, Read)],
                ),
            );
            t.add(
                Path::one_byte(0x83).modrm_reg(reg).osz(i),
                InstructionDef::new(mnemonic, vec![o(g, ModrmRm, dst), o(Imm8, Immediate, Read)]),
            );
        }
    }
}

/// Shift/rotate group 2 (0xC0/0xC1, 0xD0-0xD3). ModR/M.reg 6 is reserved.
fn shift_groups(t: &mut TableBuilder) {
    const OPS: [Option<&str>; 8] = [
        Some("rol"),
        Some("ror"),
        Some("rcl"),
        Some("rcr"),
        Some("shl"),
        Some("shr"),
        None,
        Some("sar"),
    ];
    let cl = FixedGpr { id: 1, width: 8 };
    for (reg, op) in OPS.into_iter().enumerate() {
        let Some(mnemonic) = op else { continue };
        t.add(
            Path::one_byte(0xC0).modrm_reg(reg),
            InstructionDef::new(
                mnemonic,
                vec![o(Gpr8, ModrmRm, ReadWrite), o(Imm8U, Immediate, Read)],
            ),
        );
        t.add(
            Path::one_byte(0xD0).modrm_reg(reg),
            InstructionDef::new(
                mnemonic,
                vec![o(Gpr8, ModrmRm, ReadWrite), o(Const1, Implicit, Read)],
            ),
        );
        t.add(
            Path::one_byte(0xD2).modrm_reg(reg),
            InstructionDef::new(
                mnemonic,
                vec![o(Gpr8, ModrmRm, ReadWrite), o(cl, Implicit, Read)],
            ),
        );
        for i in 0..3 {
            let g = GPR_BY_OSZ[i];
            t.add(
                Path::one_byte(0xC1).modrm_reg(reg).osz(i),
                InstructionDef::new(
                    mnemonic,
                    vec![o(g, ModrmRm, ReadWrite), o(Imm8U, Immediate, Read)],
                ),
            );
            t.add(
                Path::one_byte(0xD1).modrm_reg(reg).osz(i),
                InstructionDef::new(
                    mnemonic,
                    vec![o(g, ModrmRm, ReadWrite), o(Const1, Implicit, Read)],
                ),
            );
            t.add(
                Path::one_byte(0xD3).modrm_reg(reg).osz(i),
                InstructionDef::new(mnemonic, vec![o(g, ModrmRm, ReadWrite), o(cl, Implicit, Read)]),
            );
        }
    }
}

/// MOV/XCHG/LEA and the segment and immediate MOV forms.
fn mov_family(t: &mut TableBuilder) {
    t.add(
        Path::one_byte(0x88),
        InstructionDef::new("mov", vec![o(Gpr8, ModrmRm, Write), o(Gpr8, ModrmReg, Read)]),
    );
    t.add(
        Path::one_byte(0x8A),
        InstructionDef::new("mov", vec![o(Gpr8, ModrmReg, Write), o(Gpr8, ModrmRm, Read)]),
    );
    t.add(
        Path::one_byte(0x86),
        InstructionDef::new(
            "xchg",
            vec![o(Gpr8, ModrmRm, ReadWrite), o(Gpr8, ModrmReg, ReadWrite)],
        ),
    );
    t.add(
        Path::one_byte(0x8E),
        InstructionDef::new(
            "mov",
            vec![o(SegmentReg, ModrmReg, Write), o(Gpr16, ModrmRm, Read)],
        ),
    );
    // The segment-register store is 16 bits regardless of operand size; only
    // the register-direct form widens the destination.
    t.add(
        Path::one_byte(0x8C).mem(),
        InstructionDef::new(
            "mov",
            vec![
                o(Mem { width: 16 }, ModrmRm, Write),
                o(SegmentReg, ModrmReg, Read),
            ],
        ),
    );
    for i in 0..3 {
        let g = GPR_BY_OSZ[i];
        t.add(
            Path::one_byte(0x89).osz(i),
            InstructionDef::new("mov", vec![o(g, ModrmRm, Write), o(g, ModrmReg, Read)]),
        );
        t.add(
            Path::one_byte(0x8B).osz(i),
            InstructionDef::new("mov", vec![o(g, ModrmReg, Write), o(g, ModrmRm, Read)]),
        );
        t.add(
            Path::one_byte(0x87).osz(i),
            InstructionDef::new("xchg", vec![o(g, ModrmRm, ReadWrite), o(g, ModrmReg, ReadWrite)]),
        );
        t.add(
            Path::one_byte(0x8C).reg_form().osz(i),
            InstructionDef::new("mov", vec![o(g, ModrmRm, Write), o(SegmentReg, ModrmReg, Read)]),
        );
        t.add(
            Path::one_byte(0x8D).osz(i),
            InstructionDef::new(
                "lea",
                vec![o(g, ModrmReg, Write), o(Mem { width: 0 }, ModrmRm, Read)],
            ),
        );
    }
    // MOV r, imm with the register in the opcode byte.
    for n in 0..8 {
        t.add(
            Path::one_byte(0xB0 + n),
            InstructionDef::new("mov", vec![o(Gpr8, OpcodeBits, Write), o(Imm8U, Immediate, Read)]),
        );
        for i in 0..3 {
            // REX.W selects the full 64-bit immediate form.
            let imm = [Imm16, Imm32, Imm64][i];
            t.add(
                Path::one_byte(0xB8 + n).osz(i),
                InstructionDef::new(
                    "mov",
                    vec![o(GPR_BY_OSZ[i], OpcodeBits, Write), o(imm, Immediate, Read)],
                ),
            );
        }
    }
}

/// PUSH/POP with the register in the opcode byte. In long mode the operand
/// defaults to 64 bits: the 32-bit operand-size bucket is unreachable there
/// without an override, so both the 32- and 64-bit buckets map to the
/// 64-bit register.
fn stack_ops(t: &mut TableBuilder) {
    for n in 0..8 {
        for mode in 0..2 {
            for i in 0..2 {
                let g = GPR_BY_OSZ[i];
                t.add(
                    Path::one_byte(0x50 + n).mode(mode).osz(i),
                    InstructionDef::new("push", vec![o(g, OpcodeBits, Read)]),
                );
                t.add(
                    Path::one_byte(0x58 + n).mode(mode).osz(i),
                    InstructionDef::new("pop", vec![o(g, OpcodeBits, Write)]),
                );
            }
        }
        for (i, g) in [(0, Gpr16), (1, Gpr64), (2, Gpr64)] {
            t.add(
                Path::one_byte(0x50 + n).mode(2).osz(i),
                InstructionDef::new("push", vec![o(g, OpcodeBits, Read)]),
            );
            t.add(
                Path::one_byte(0x58 + n).mode(2).osz(i),
                InstructionDef::new("pop", vec![o(g, OpcodeBits, Write)]),
            );
        }
    }
}

/// Relative branches, conditional branches and the short loop forms.
fn control_flow(t: &mut TableBuilder) {
    const CC: [&str; 16] = [
        "jo", "jno", "jb", "jnb", "jz", "jnz", "jbe", "jnbe", "js", "jns", "jp", "jnp", "jl",
        "jnl", "jle", "jnle",
    ];
    for (n, mnemonic) in CC.into_iter().enumerate() {
        t.add(
            Path::one_byte(0x70 + n as u8),
            InstructionDef::new(mnemonic, vec![o(Rel8, Immediate, Read)]),
        );
        for i in 0..3 {
            t.add(
                Path::two_byte(0x80 + n as u8).osz(i),
                InstructionDef::new(mnemonic, vec![o(RELZ_BY_OSZ[i], Immediate, Read)]),
            );
        }
    }
    for i in 0..3 {
        t.add(
            Path::one_byte(0xE8).osz(i),
            InstructionDef::new("call", vec![o(RELZ_BY_OSZ[i], Immediate, Read)]),
        );
        t.add(
            Path::one_byte(0xE9).osz(i),
            InstructionDef::new("jmp", vec![o(RELZ_BY_OSZ[i], Immediate, Read)]),
        );
    }
    t.add(
        Path::one_byte(0xEB),
        InstructionDef::new("jmp", vec![o(Rel8, Immediate, Read)]),
    );
    // Direct far branches; removed from long mode.
    for (opcode, mnemonic) in [(0x9A, "call"), (0xEA, "jmp")] {
        for mode in 0..2 {
            for (i, ptr) in [(0, Ptr1616), (1, Ptr1632)] {
                t.add(
                    Path::one_byte(opcode).mode(mode).osz(i),
                    InstructionDef::new(mnemonic, vec![o(ptr, Immediate, Read)]),
                );
            }
        }
    }
    // The rCX-is-zero branch reads the address-size register.
    for (i, mnemonic) in [(0, "jcxz"), (1, "jecxz"), (2, "jrcxz")] {
        t.add(
            Path::one_byte(0xE3).asz(i),
            InstructionDef::new(mnemonic, vec![o(Rel8, Immediate, Read)]),
        );
    }
    t.add(Path::one_byte(0xC3), InstructionDef::new("ret", vec![]));
    t.add(Path::one_byte(0xCC), InstructionDef::new("int3", vec![]));
    t.add(Path::one_byte(0xF4), InstructionDef::new("hlt", vec![]));
    t.add(Path::one_byte(0x90), InstructionDef::new("nop", vec![]));
}

/// Group 5 (0xFF): inc/dec keep the operand-size rules everywhere; the
/// near branches and push default to 64 bits in long mode.
fn group5(t: &mut TableBuilder) {
    for mode in 0..2 {
        for i in 0..2 {
            let g = GPR_BY_OSZ[i];
            t.add(
                Path::one_byte(0xFF).mode(mode).modrm_reg(0).osz(i),
                InstructionDef::new("inc", vec![o(g, ModrmRm, ReadWrite)]),
            );
            t.add(
                Path::one_byte(0xFF).mode(mode).modrm_reg(1).osz(i),
                InstructionDef::new("dec", vec![o(g, ModrmRm, ReadWrite)]),
            );
            t.add(
                Path::one_byte(0xFF).mode(mode).modrm_reg(2).osz(i),
                InstructionDef::new("call", vec![o(g, ModrmRm, Read)]),
            );
            t.add(
                Path::one_byte(0xFF).mode(mode).modrm_reg(4).osz(i),
                InstructionDef::new("jmp", vec![o(g, ModrmRm, Read)]),
            );
            t.add(
                Path::one_byte(0xFF).mode(mode).modrm_reg(6).osz(i),
                InstructionDef::new("push", vec![o(g, ModrmRm, Read)]),
            );
        }
    }
    for i in 0..3 {
        let g = GPR_BY_OSZ[i];
        t.add(
            Path::one_byte(0xFF).mode(2).modrm_reg(0).osz(i),
            InstructionDef::new("inc", vec![o(g, ModrmRm, ReadWrite)]),
        );
        t.add(
            Path::one_byte(0xFF).mode(2).modrm_reg(1).osz(i),
            InstructionDef::new("dec", vec![o(g, ModrmRm, ReadWrite)]),
        );
    }
    t.add(
        Path::one_byte(0xFF).mode(2).modrm_reg(2),
        InstructionDef::new("call", vec![o(Gpr64, ModrmRm, Read)]),
    );
    t.add(
        Path::one_byte(0xFF).mode(2).modrm_reg(4),
        InstructionDef::new("jmp", vec![o(Gpr64, ModrmRm, Read)]),
    );
    for (i, g) in [(0, Gpr16), (1, Gpr64), (2, Gpr64)] {
        t.add(
            Path::one_byte(0xFF).mode(2).modrm_reg(6).osz(i),
            InstructionDef::new("push", vec![o(g, ModrmRm, Read)]),
        );
    }
}

fn system_ops(t: &mut TableBuilder) {
    t.add(
        Path::two_byte(0x05).mode(2),
        InstructionDef::new("syscall", vec![]),
    );
    // 0F 01 register-direct forms are distinguished by ModR/M.rm.
    t.add(
        Path::two_byte(0x01).mode(2).modrm_mod(3).modrm_reg(7).modrm_rm(0),
        InstructionDef::new("swapgs", vec![]),
    );
    t.add(
        Path::two_byte(0x01).mode(2).modrm_mod(3).modrm_reg(7).modrm_rm(1),
        InstructionDef::new("rdtscp", vec![]),
    );
}

/// Accumulator moves with a direct, address-width-wide offset.
fn moffs_forms(t: &mut TableBuilder) {
    let al = FixedGpr { id: 0, width: 8 };
    t.add(
        Path::one_byte(0xA0),
        InstructionDef::new(
            "mov",
            vec![o(al, Implicit, Write), o(Moffs { width: 8 }, Immediate, Read)],
        ),
    );
    t.add(
        Path::one_byte(0xA2),
        InstructionDef::new(
            "mov",
            vec![o(Moffs { width: 8 }, Immediate, Write), o(al, Implicit, Read)],
        ),
    );
    for i in 0..3 {
        let acc = FixedGpr {
            id: 0,
            width: WIDTH_BY_OSZ[i],
        };
        t.add(
            Path::one_byte(0xA1).osz(i),
            InstructionDef::new(
                "mov",
                vec![o(acc, Implicit, Write), o(Moffs { width: 0 }, Immediate, Read)],
            ),
        );
        t.add(
            Path::one_byte(0xA3).osz(i),
            InstructionDef::new(
                "mov",
                vec![o(Moffs { width: 0 }, Immediate, Write), o(acc, Implicit, Read)],
            ),
        );
    }
}

/// Legacy SSE forms where the mandatory prefix picks the instruction.
fn sse_family(t: &mut TableBuilder) {
    // 0F 10/11: full-width moves, plus the scalar forms whose memory
    // operand narrows to the element width.
    t.add(
        Path::two_byte(0x10).mandatory(0),
        InstructionDef::new("movups", vec![o(Vr128, ModrmReg, Write), o(Vr128, ModrmRm, Read)]),
    );
    t.add(
        Path::two_byte(0x10).mandatory(1),
        InstructionDef::new("movupd", vec![o(Vr128, ModrmReg, Write), o(Vr128, ModrmRm, Read)]),
    );
    t.add(
        Path::two_byte(0x11).mandatory(0),
        InstructionDef::new("movups", vec![o(Vr128, ModrmRm, Write), o(Vr128, ModrmReg, Read)]),
    );
    t.add(
        Path::two_byte(0x11).mandatory(1),
        InstructionDef::new("movupd", vec![o(Vr128, ModrmRm, Write), o(Vr128, ModrmReg, Read)]),
    );
    for (slot, mnemonic, width) in [(2, "movss", 32), (3, "movsd", 64)] {
        t.add(
            Path::two_byte(0x10).mandatory(slot).mem(),
            InstructionDef::new(
                mnemonic,
                vec![o(Vr128, ModrmReg, Write), o(Mem { width }, ModrmRm, Read)],
            ),
        );
        t.add(
            Path::two_byte(0x10).mandatory(slot).reg_form(),
            InstructionDef::new(mnemonic, vec![o(Vr128, ModrmReg, Write), o(Vr128, ModrmRm, Read)]),
        );
        t.add(
            Path::two_byte(0x11).mandatory(slot).mem(),
            InstructionDef::new(
                mnemonic,
                vec![o(Mem { width }, ModrmRm, Write), o(Vr128, ModrmReg, Read)],
            ),
        );
        t.add(
            Path::two_byte(0x11).mandatory(slot).reg_form(),
            InstructionDef::new(mnemonic, vec![o(Vr128, ModrmRm, Write), o(Vr128, ModrmReg, Read)]),
        );
    }

    for i in 0..3 {
        let g = GPR_BY_OSZ[i];
        t.add(
            Path::two_byte(0xB6).osz(i),
            InstructionDef::new("movzx", vec![o(g, ModrmReg, Write), o(Gpr8, ModrmRm, Read)]),
        );
        t.add(
            Path::two_byte(0xB7).osz(i),
            InstructionDef::new("movzx", vec![o(g, ModrmReg, Write), o(Gpr16, ModrmRm, Read)]),
        );
        t.add(
            Path::two_byte(0xAF).osz(i),
            InstructionDef::new("imul", vec![o(g, ModrmReg, ReadWrite), o(g, ModrmRm, Read)]),
        );
    }

    // 0F 6E/7E: W picks the GPR half, the mandatory prefix picks the
    // MMX or XMM register file.
    for (slot, vr) in [(0, Vr64), (1, Vr128)] {
        for (bit, mnemonic, g) in [(0, "movd", Gpr32), (1, "movq", Gpr64)] {
            t.add(
                Path::two_byte(0x6E).mandatory(slot).w(bit),
                InstructionDef::new(mnemonic, vec![o(vr, ModrmReg, Write), o(g, ModrmRm, Read)]),
            );
            t.add(
                Path::two_byte(0x7E).mandatory(slot).w(bit),
                InstructionDef::new(mnemonic, vec![o(g, ModrmRm, Write), o(vr, ModrmReg, Read)]),
            );
        }
    }
    t.add(
        Path::two_byte(0x7E).mandatory(2).mem(),
        InstructionDef::new(
            "movq",
            vec![o(Vr128, ModrmReg, Write), o(Mem { width: 64 }, ModrmRm, Read)],
        ),
    );
    t.add(
        Path::two_byte(0x7E).mandatory(2).reg_form(),
        InstructionDef::new("movq", vec![o(Vr128, ModrmReg, Write), o(Vr128, ModrmRm, Read)]),
    );
}

fn vex_family(t: &mut TableBuilder) {
    for (slot, mnemonic) in [(0, "vmovups"), (1, "vmovupd")] {
        for (bit, vr) in [(0, Vr128), (1, Vr256)] {
            t.add(
                Path::vex(0x10, 1).mandatory(slot).l(bit),
                InstructionDef::new(mnemonic, vec![o(vr, ModrmReg, Write), o(vr, ModrmRm, Read)]),
            );
            t.add(
                Path::vex(0x11, 1).mandatory(slot).l(bit),
                InstructionDef::new(mnemonic, vec![o(vr, ModrmRm, Write), o(vr, ModrmReg, Read)]),
            );
        }
    }
    // Scalar forms: the register-direct variant takes a non-destructive
    // source in vvvv, the memory variant does not.
    for (slot, mnemonic, width) in [(2, "vmovss", 32), (3, "vmovsd", 64)] {
        t.add(
            Path::vex(0x10, 1).mandatory(slot).mem(),
            InstructionDef::new(
                mnemonic,
                vec![o(Vr128, ModrmReg, Write), o(Mem { width }, ModrmRm, Read)],
            ),
        );
        t.add(
            Path::vex(0x10, 1).mandatory(slot).reg_form(),
            InstructionDef::new(
                mnemonic,
                vec![
                    o(Vr128, ModrmReg, Write),
                    o(Vr128, Vvvv, Read),
                    o(Vr128, ModrmRm, Read),
                ],
            ),
        );
        t.add(
            Path::vex(0x11, 1).mandatory(slot).mem(),
            InstructionDef::new(
                mnemonic,
                vec![o(Mem { width }, ModrmRm, Write), o(Vr128, ModrmReg, Read)],
            ),
        );
        t.add(
            Path::vex(0x11, 1).mandatory(slot).reg_form(),
            InstructionDef::new(
                mnemonic,
                vec![
                    o(Vr128, ModrmRm, Write),
                    o(Vr128, Vvvv, Read),
                    o(Vr128, ModrmReg, Read),
                ],
            ),
        );
    }

    t.add(
        Path::vex(0x77, 1).mandatory(0).l(0),
        InstructionDef::new("vzeroupper", vec![]),
    );
    t.add(
        Path::vex(0x77, 1).mandatory(0).l(1),
        InstructionDef::new("vzeroall", vec![]),
    );

    for (slot, mnemonic) in [(0, "vaddps"), (1, "vaddpd")] {
        for (bit, vr) in [(0, Vr128), (1, Vr256)] {
            t.add(
                Path::vex(0x58, 1).mandatory(slot).l(bit),
                InstructionDef::new(
                    mnemonic,
                    vec![o(vr, ModrmReg, Write), o(vr, Vvvv, Read), o(vr, ModrmRm, Read)],
                ),
            );
        }
    }
}

fn evex_family(t: &mut TableBuilder) {
    for (slot, mnemonic, element) in [(0usize, "vaddps", 32u16), (1, "vaddpd", 64)] {
        for len in 0..3 {
            let vr = VR_BY_LEN[len];
            let (l, l2) = len_bits(len);
            let vector = InstructionDef::new(
                mnemonic,
                vec![o(vr, ModrmReg, Write), o(vr, Vvvv, Read), o(vr, ModrmRm, Read)],
            )
            .with_mask();
            t.add(
                Path::evex(0x58, 1).mandatory(slot).reg_form().b(0).l(l).l2(l2),
                vector.clone(),
            );
            t.add(
                Path::evex(0x58, 1).mandatory(slot).mem().b(0).l(l).l2(l2),
                vector,
            );
            let mode = match (element, len) {
                (32, 0) => BroadcastMode::To4,
                (32, 1) => BroadcastMode::To8,
                (32, _) => BroadcastMode::To16,
                (_, 0) => BroadcastMode::To2,
                (_, 1) => BroadcastMode::To4,
                _ => BroadcastMode::To8,
            };
            t.add(
                Path::evex(0x58, 1).mandatory(slot).mem().b(1).l(l).l2(l2),
                InstructionDef::new(
                    mnemonic,
                    vec![
                        o(vr, ModrmReg, Write),
                        o(vr, Vvvv, Read),
                        o(MemBroadcast { element, mode }, ModrmRm, Read),
                    ],
                )
                .with_mask()
                .with_evex_b(EvexBFunctionality::Broadcast),
            );
        }
        // Register forms with EVEX.b set repurpose L'L as static rounding;
        // operands are always full width.
        t.add(
            Path::evex(0x58, 1).mandatory(slot).reg_form().b(1),
            InstructionDef::new(
                mnemonic,
                vec![
                    o(Vr512, ModrmReg, Write),
                    o(Vr512, Vvvv, Read),
                    o(Vr512, ModrmRm, Read),
                ],
            )
            .with_mask()
            .with_evex_b(EvexBFunctionality::RoundingControl),
        );
    }

    // VSIB gather; memory forms only.
    for len in 0..3 {
        let vr = VR_BY_LEN[len];
        let (l, l2) = len_bits(len);
        t.add(
            Path::evex(0x92, 2).mandatory(1).mem().w(0).l(l).l2(l2),
            InstructionDef::new(
                "vgatherdps",
                // Destination lanes update only where the mask is set.
                vec![
                    o(vr, ModrmReg, Conditional),
                    o(
                        MemVsib {
                            element: 32,
                            index_width: [128u16, 256, 512][len],
                        },
                        ModrmRm,
                        Read,
                    ),
                ],
            )
            .with_mask(),
        );
    }
}

/// XOP map 9 group 1: BMI-style operations writing through vvvv.
fn xop_family(t: &mut TableBuilder) {
    const OPS: [Option<&str>; 8] = [
        None,
        Some("blcfill"),
        Some("blsfill"),
        Some("blcs"),
        Some("tzmsk"),
        Some("blcic"),
        Some("blsic"),
        Some("t1mskc"),
    ];
    for (reg, op) in OPS.into_iter().enumerate() {
        let Some(mnemonic) = op else { continue };
        for (bit, g) in [(0, Gpr32), (1, Gpr64)] {
            t.add(
                Path::xop(0x01, 9).modrm_reg(reg).w(bit),
                InstructionDef::new(mnemonic, vec![o(g, Vvvv, Write), o(g, ModrmRm, Read)]),
            );
        }
    }
}
