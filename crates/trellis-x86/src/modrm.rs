//! ModR/M and SIB byte fields.
//!
//! Both structs carry the raw 3-bit hardware fields; REX/VEX/EVEX widening to
//! full register indices happens during operand materialization, because the
//! decision trie dispatches on the raw values.

/// Decoded ModR/M byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModRm {
    /// Addressing mode (2 bits).
    pub mod_: u8,
    /// Register / opcode-extension field (raw 3 bits).
    pub reg: u8,
    /// Register-or-memory field (raw 3 bits).
    pub rm: u8,
}

impl ModRm {
    /// Splits a ModR/M byte.
    pub fn parse(byte: u8) -> Self {
        Self {
            mod_: byte >> 6,
            reg: (byte >> 3) & 0x7,
            rm: byte & 0x7,
        }
    }

    /// Returns true if the rm field selects a register (mod=11).
    pub fn is_register(&self) -> bool {
        self.mod_ == 0b11
    }

    /// Returns true if a SIB byte follows, given the effective address width.
    /// 16-bit addressing has no SIB forms.
    pub fn needs_sib(&self, address_width: u16) -> bool {
        address_width != 16 && !self.is_register() && self.rm == 0b100
    }
}

/// Decoded SIB byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sib {
    /// log2 of the index scale (raw 2 bits).
    pub scale: u8,
    /// Index register (raw 3 bits).
    pub index: u8,
    /// Base register (raw 3 bits).
    pub base: u8,
}

impl Sib {
    /// Splits a SIB byte.
    pub fn parse(byte: u8) -> Self {
        Self {
            scale: byte >> 6,
            index: (byte >> 3) & 0x7,
            base: byte & 0x7,
        }
    }

    /// The scale factor (1, 2, 4 or 8).
    pub fn scale_factor(&self) -> u8 {
        1 << self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modrm_fields_split() {
        let m = ModRm::parse(0xC0);
        assert_eq!((m.mod_, m.reg, m.rm), (3, 0, 0));
        assert!(m.is_register());

        let m = ModRm::parse(0x5C);
        assert_eq!((m.mod_, m.reg, m.rm), (1, 3, 4));
        assert!(m.needs_sib(64));
        assert!(!m.needs_sib(16));
    }

    #[test]
    fn sib_scale_factor() {
        assert_eq!(Sib::parse(0xC0).scale_factor(), 8);
        assert_eq!(Sib::parse(0x00).scale_factor(), 1);
    }
}
