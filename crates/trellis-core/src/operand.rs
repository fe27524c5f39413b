//! Decoded operand types.

use crate::Register;

/// A concrete, decoded instruction operand.
///
/// The variant itself carries the addressing-mode metadata: a register-direct
/// operand is `Register`, a memory operand is `Memory` and never the other way
/// around, so consumers can match on the variant without inspecting flags.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operand {
    /// Register operand.
    Register(Register),
    /// Immediate value.
    Immediate(Immediate),
    /// Memory reference.
    Memory(MemoryRef),
    /// Relative branch offset. The final target is `instruction end + offset`;
    /// resolving it against a load address is the consumer's job.
    Relative {
        /// Signed displacement from the end of the instruction.
        offset: i64,
        /// Encoded width of the displacement in bits.
        width: u8,
    },
    /// Far pointer (`ptr16:16` / `ptr16:32`).
    FarPointer {
        /// Segment selector.
        selector: u16,
        /// Offset within the segment.
        offset: u32,
        /// Encoded width of the offset in bits.
        width: u8,
    },
}

impl Operand {
    /// Creates a register operand.
    pub fn reg(reg: Register) -> Self {
        Self::Register(reg)
    }

    /// Creates a signed immediate operand.
    pub fn imm(value: i64, width: u8) -> Self {
        Self::Immediate(Immediate {
            value,
            width,
            signed: true,
        })
    }

    /// Creates an unsigned immediate operand.
    pub fn imm_unsigned(value: u64, width: u8) -> Self {
        Self::Immediate(Immediate {
            value: value as i64,
            width,
            signed: false,
        })
    }

    /// Returns true if this is a register operand.
    pub fn is_register(&self) -> bool {
        matches!(self, Self::Register(_))
    }

    /// Returns true if this is a memory operand.
    pub fn is_memory(&self) -> bool {
        matches!(self, Self::Memory(_))
    }

    /// Returns true if this is an immediate operand.
    pub fn is_immediate(&self) -> bool {
        matches!(self, Self::Immediate(_))
    }
}

/// Immediate value operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Immediate {
    /// The value, sign-extended to i64. Unsigned 64-bit values are stored
    /// bit-identically; use [`Immediate::as_u64`].
    pub value: i64,
    /// Encoded width in bits.
    pub width: u8,
    /// Whether the encoding is sign-extended.
    pub signed: bool,
}

impl Immediate {
    /// The value reinterpreted as unsigned.
    pub fn as_u64(&self) -> u64 {
        self.value as u64
    }
}

/// Broadcast factor for an EVEX-embedded broadcast memory operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BroadcastMode {
    To2,
    To4,
    To8,
    To16,
}

impl BroadcastMode {
    /// The replication factor.
    pub fn factor(&self) -> u8 {
        match self {
            Self::To2 => 2,
            Self::To4 => 4,
            Self::To8 => 8,
            Self::To16 => 16,
        }
    }
}

impl std::fmt::Display for BroadcastMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "1to{}", self.factor())
    }
}

/// Memory reference operand: `seg:[base + index*scale + disp]`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemoryRef {
    /// Effective segment (override if one was given, architectural default
    /// otherwise).
    pub segment: Register,
    /// Base register, if any.
    pub base: Option<Register>,
    /// Index register, if any. A vector register for VSIB forms.
    pub index: Option<Register>,
    /// Scale factor for the index (1, 2, 4 or 8).
    pub scale: u8,
    /// Sign-extended displacement.
    pub displacement: i64,
    /// Access width in bits (per broadcast element for broadcast forms).
    pub width: u16,
    /// Broadcast replication, for EVEX broadcast forms.
    pub broadcast: Option<BroadcastMode>,
}

impl MemoryRef {
    /// Creates an absolute reference (displacement only).
    pub fn absolute(segment: Register, displacement: i64, width: u16) -> Self {
        Self {
            segment,
            base: None,
            index: None,
            scale: 1,
            displacement,
            width,
            broadcast: None,
        }
    }

    /// Returns true if the reference uses neither base nor index register.
    pub fn is_absolute(&self) -> bool {
        self.base.is_none() && self.index.is_none()
    }
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Register(reg) => write!(f, "{reg}"),
            Self::Immediate(imm) => {
                if imm.signed && imm.value < 0 {
                    write!(f, "-{:#x}", imm.value.unsigned_abs())
                } else {
                    write!(f, "{:#x}", imm.as_u64())
                }
            }
            Self::Memory(mem) => {
                write!(f, "{}:[", mem.segment)?;
                let mut wrote = false;
                if let Some(base) = &mem.base {
                    write!(f, "{base}")?;
                    wrote = true;
                }
                if let Some(index) = &mem.index {
                    if wrote {
                        write!(f, "+")?;
                    }
                    write!(f, "{index}")?;
                    if mem.scale > 1 {
                        write!(f, "*{}", mem.scale)?;
                    }
                    wrote = true;
                }
                if mem.displacement != 0 || !wrote {
                    if mem.displacement < 0 {
                        write!(f, "-{:#x}", mem.displacement.unsigned_abs())?;
                    } else {
                        if wrote {
                            write!(f, "+")?;
                        }
                        write!(f, "{:#x}", mem.displacement)?;
                    }
                }
                write!(f, "]")?;
                if let Some(bcst) = &mem.broadcast {
                    write!(f, "{{{bcst}}}")?;
                }
                Ok(())
            }
            Self::Relative { offset, .. } => {
                if *offset < 0 {
                    write!(f, "$-{:#x}", offset.unsigned_abs())
                } else {
                    write!(f, "$+{offset:#x}")
                }
            }
            Self::FarPointer {
                selector, offset, ..
            } => write!(f, "{selector:#x}:{offset:#x}"),
        }
    }
}
