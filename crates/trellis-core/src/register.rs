//! x86 register representation.

/// Register file a register belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RegisterClass {
    /// General purpose registers (al/ax/eax/rax, ...).
    General,
    /// Vector registers (mm, xmm, ymm, zmm) - distinguished by width.
    Vector,
    /// Segment registers (es, cs, ss, ds, fs, gs).
    Segment,
    /// Control registers (cr0-cr15).
    Control,
    /// Debug registers (dr0-dr15).
    Debug,
    /// Opmask registers (k0-k7).
    Mask,
    /// Bound registers (bnd0-bnd3).
    Bound,
    /// Instruction pointer (ip/eip/rip).
    InstructionPointer,
}

/// A concrete x86 register.
///
/// Registers are identified by class, numeric id and width in bits. For the
/// general-purpose file the id follows the hardware encoding (rax=0, rcx=1,
/// ..., r15=15); the four legacy high-byte registers ah/ch/dh/bh occupy
/// ids 16-19 in the 8-bit width so they stay distinct from spl/bpl/sil/dil.
/// Segment register ids follow the hardware segment encoding
/// (es=0, cs=1, ss=2, ds=3, fs=4, gs=5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Register {
    /// Register file.
    pub class: RegisterClass,
    /// Id within the file (hardware encoding order).
    pub id: u16,
    /// Width in bits. Vector registers use 64/128/256/512 for mm/xmm/ymm/zmm.
    pub width: u16,
}

/// Id of the first high-byte GPR (ah) in the 8-bit register file.
pub const HIGH_BYTE_BASE: u16 = 16;

impl Register {
    /// Creates a register.
    pub fn new(class: RegisterClass, id: u16, width: u16) -> Self {
        Self { class, id, width }
    }

    /// Creates a general-purpose register.
    pub fn gpr(id: u16, width: u16) -> Self {
        Self::new(RegisterClass::General, id, width)
    }

    /// Creates a vector register of the given width (64/128/256/512 bits).
    pub fn vector(id: u16, width: u16) -> Self {
        Self::new(RegisterClass::Vector, id, width)
    }

    /// Creates a segment register from its hardware encoding (es=0 .. gs=5).
    pub fn segment(id: u16) -> Self {
        Self::new(RegisterClass::Segment, id, 16)
    }

    /// Creates an opmask register (k0-k7).
    pub fn mask(id: u16) -> Self {
        Self::new(RegisterClass::Mask, id, 64)
    }

    /// Creates the instruction pointer at the given width.
    pub fn instruction_pointer(width: u16) -> Self {
        Self::new(RegisterClass::InstructionPointer, 0, width)
    }

    /// Returns the canonical name of this register.
    pub fn name(&self) -> &'static str {
        match self.class {
            RegisterClass::General => gpr_name(self.id, self.width),
            RegisterClass::Vector => vector_name(self.id, self.width),
            RegisterClass::Segment => seg_name(self.id),
            RegisterClass::Control => indexed_name(&CR_NAMES, self.id),
            RegisterClass::Debug => indexed_name(&DR_NAMES, self.id),
            RegisterClass::Mask => indexed_name(&K_NAMES, self.id),
            RegisterClass::Bound => indexed_name(&BND_NAMES, self.id),
            RegisterClass::InstructionPointer => match self.width {
                16 => "ip",
                32 => "eip",
                _ => "rip",
            },
        }
    }
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

const GPR64_NAMES: [&str; 16] = [
    "rax", "rcx", "rdx", "rbx", "rsp", "rbp", "rsi", "rdi", "r8", "r9", "r10", "r11", "r12", "r13",
    "r14", "r15",
];

const GPR32_NAMES: [&str; 16] = [
    "eax", "ecx", "edx", "ebx", "esp", "ebp", "esi", "edi", "r8d", "r9d", "r10d", "r11d", "r12d",
    "r13d", "r14d", "r15d",
];

const GPR16_NAMES: [&str; 16] = [
    "ax", "cx", "dx", "bx", "sp", "bp", "si", "di", "r8w", "r9w", "r10w", "r11w", "r12w", "r13w",
    "r14w", "r15w",
];

const GPR8_NAMES: [&str; 20] = [
    "al", "cl", "dl", "bl", "spl", "bpl", "sil", "dil", "r8b", "r9b", "r10b", "r11b", "r12b",
    "r13b", "r14b", "r15b", "ah", "ch", "dh", "bh",
];

const SEG_NAMES: [&str; 6] = ["es", "cs", "ss", "ds", "fs", "gs"];

const K_NAMES: [&str; 8] = ["k0", "k1", "k2", "k3", "k4", "k5", "k6", "k7"];

const BND_NAMES: [&str; 4] = ["bnd0", "bnd1", "bnd2", "bnd3"];

const CR_NAMES: [&str; 16] = [
    "cr0", "cr1", "cr2", "cr3", "cr4", "cr5", "cr6", "cr7", "cr8", "cr9", "cr10", "cr11", "cr12",
    "cr13", "cr14", "cr15",
];

const DR_NAMES: [&str; 16] = [
    "dr0", "dr1", "dr2", "dr3", "dr4", "dr5", "dr6", "dr7", "dr8", "dr9", "dr10", "dr11", "dr12",
    "dr13", "dr14", "dr15",
];

fn gpr_name(id: u16, width: u16) -> &'static str {
    let id = id as usize;
    match width {
        8 => GPR8_NAMES.get(id).copied().unwrap_or("badreg"),
        16 => GPR16_NAMES.get(id).copied().unwrap_or("badreg"),
        32 => GPR32_NAMES.get(id).copied().unwrap_or("badreg"),
        64 => GPR64_NAMES.get(id).copied().unwrap_or("badreg"),
        _ => "badreg",
    }
}

fn vector_name(id: u16, width: u16) -> &'static str {
    const MM: [&str; 8] = ["mm0", "mm1", "mm2", "mm3", "mm4", "mm5", "mm6", "mm7"];
    const XMM: [&str; 32] = [
        "xmm0", "xmm1", "xmm2", "xmm3", "xmm4", "xmm5", "xmm6", "xmm7", "xmm8", "xmm9", "xmm10",
        "xmm11", "xmm12", "xmm13", "xmm14", "xmm15", "xmm16", "xmm17", "xmm18", "xmm19", "xmm20",
        "xmm21", "xmm22", "xmm23", "xmm24", "xmm25", "xmm26", "xmm27", "xmm28", "xmm29", "xmm30",
        "xmm31",
    ];
    const YMM: [&str; 32] = [
        "ymm0", "ymm1", "ymm2", "ymm3", "ymm4", "ymm5", "ymm6", "ymm7", "ymm8", "ymm9", "ymm10",
        "ymm11", "ymm12", "ymm13", "ymm14", "ymm15", "ymm16", "ymm17", "ymm18", "ymm19", "ymm20",
        "ymm21", "ymm22", "ymm23", "ymm24", "ymm25", "ymm26", "ymm27", "ymm28", "ymm29", "ymm30",
        "ymm31",
    ];
    const ZMM: [&str; 32] = [
        "zmm0", "zmm1", "zmm2", "zmm3", "zmm4", "zmm5", "zmm6", "zmm7", "zmm8", "zmm9", "zmm10",
        "zmm11", "zmm12", "zmm13", "zmm14", "zmm15", "zmm16", "zmm17", "zmm18", "zmm19", "zmm20",
        "zmm21", "zmm22", "zmm23", "zmm24", "zmm25", "zmm26", "zmm27", "zmm28", "zmm29", "zmm30",
        "zmm31",
    ];
    let id = id as usize;
    match width {
        64 => MM.get(id & 0x7).copied().unwrap_or("badreg"),
        128 => XMM.get(id).copied().unwrap_or("badreg"),
        256 => YMM.get(id).copied().unwrap_or("badreg"),
        512 => ZMM.get(id).copied().unwrap_or("badreg"),
        _ => "badreg",
    }
}

fn seg_name(id: u16) -> &'static str {
    SEG_NAMES.get(id as usize).copied().unwrap_or("badreg")
}

fn indexed_name(names: &'static [&'static str], id: u16) -> &'static str {
    names.get(id as usize).copied().unwrap_or("badreg")
}

/// Hardware segment encodings.
pub mod seg {
    pub const ES: u16 = 0;
    pub const CS: u16 = 1;
    pub const SS: u16 = 2;
    pub const DS: u16 = 3;
    pub const FS: u16 = 4;
    pub const GS: u16 = 5;
}

/// General-purpose register encodings.
pub mod gpr {
    pub const RAX: u16 = 0;
    pub const RCX: u16 = 1;
    pub const RDX: u16 = 2;
    pub const RBX: u16 = 3;
    pub const RSP: u16 = 4;
    pub const RBP: u16 = 5;
    pub const RSI: u16 = 6;
    pub const RDI: u16 = 7;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpr_names_follow_width() {
        assert_eq!(Register::gpr(0, 64).name(), "rax");
        assert_eq!(Register::gpr(0, 32).name(), "eax");
        assert_eq!(Register::gpr(0, 16).name(), "ax");
        assert_eq!(Register::gpr(0, 8).name(), "al");
        assert_eq!(Register::gpr(12, 64).name(), "r12");
    }

    #[test]
    fn high_byte_registers_are_distinct() {
        assert_eq!(Register::gpr(4, 8).name(), "spl");
        assert_eq!(Register::gpr(HIGH_BYTE_BASE, 8).name(), "ah");
        assert_eq!(Register::gpr(HIGH_BYTE_BASE + 3, 8).name(), "bh");
    }

    #[test]
    fn vector_names_follow_width() {
        assert_eq!(Register::vector(3, 128).name(), "xmm3");
        assert_eq!(Register::vector(3, 256).name(), "ymm3");
        assert_eq!(Register::vector(31, 512).name(), "zmm31");
    }
}
