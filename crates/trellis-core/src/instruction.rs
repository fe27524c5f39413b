//! Decoded-instruction record.

use crate::{Operand, Register};

/// Rounding mode selected by an EVEX rounding-control register form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RoundingMode {
    NearestEven,
    Down,
    Up,
    TowardZero,
}

/// AVX-512 decoration decoded from an EVEX prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AvxInfo {
    /// Opmask register (k1-k7), when the instruction is masked.
    pub mask: Option<Register>,
    /// Zeroing-masking (`{z}`) rather than merging.
    pub zeroing: bool,
    /// Static rounding (`{rn-sae}` etc.), register forms only.
    pub rounding: Option<RoundingMode>,
    /// Suppress-all-exceptions (`{sae}`).
    pub suppress_all_exceptions: bool,
}

impl AvxInfo {
    /// Returns true if no decoration is present.
    pub fn is_empty(&self) -> bool {
        self.mask.is_none()
            && !self.zeroing
            && self.rounding.is_none()
            && !self.suppress_all_exceptions
    }
}

/// A fully decoded instruction.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Instruction {
    /// Mnemonic (e.g. "add", "vaddps").
    pub mnemonic: String,
    /// Total encoded length in bytes, prefixes included.
    pub length: usize,
    /// Operands in definition order (destination first).
    pub operands: Vec<Operand>,
    /// Effective operand width in bits after overrides.
    pub operand_width: u16,
    /// Effective address width in bits after overrides.
    pub address_width: u16,
    /// LOCK prefix present and meaningful.
    pub lock: bool,
    /// REP/REPE prefix present (and not consumed as a mandatory prefix).
    pub rep: bool,
    /// REPNE prefix present (and not consumed as a mandatory prefix).
    pub repne: bool,
    /// AVX-512 decoration, empty for non-EVEX instructions.
    pub avx: AvxInfo,
}

impl Instruction {
    /// Number of operands.
    pub fn operand_count(&self) -> usize {
        self.operands.len()
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.lock {
            write!(f, "lock ")?;
        }
        if self.rep {
            write!(f, "rep ")?;
        }
        if self.repne {
            write!(f, "repne ")?;
        }
        write!(f, "{}", self.mnemonic)?;
        for (i, op) in self.operands.iter().enumerate() {
            if i == 0 {
                write!(f, " {op}")?;
            } else {
                write!(f, ", {op}")?;
            }
            if i == 0 {
                if let Some(mask) = &self.avx.mask {
                    write!(f, " {{{mask}}}")?;
                    if self.avx.zeroing {
                        write!(f, " {{z}}")?;
                    }
                }
            }
        }
        if let Some(r) = &self.avx.rounding {
            let s = match r {
                RoundingMode::NearestEven => "rn-sae",
                RoundingMode::Down => "rd-sae",
                RoundingMode::Up => "ru-sae",
                RoundingMode::TowardZero => "rz-sae",
            };
            write!(f, " {{{s}}}")?;
        } else if self.avx.suppress_all_exceptions {
            write!(f, " {{sae}}")?;
        }
        Ok(())
    }
}
