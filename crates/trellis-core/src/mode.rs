//! Machine-mode and stack-width identification.

/// Processor operating mode the decoder is configured for.
///
/// The mode determines the default operand and address widths and which
/// prefixes are legal (REX bytes only exist in 64-bit mode, for example).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MachineMode {
    /// Real-address mode (16-bit defaults).
    Real16,
    /// 16-bit protected mode.
    Legacy16,
    /// 32-bit protected mode.
    Legacy32,
    /// 64-bit long mode.
    Long64,
}

impl MachineMode {
    /// Default operand width in bits for this mode, before any override.
    pub fn default_operand_width(&self) -> u16 {
        match self {
            Self::Real16 | Self::Legacy16 => 16,
            // Long mode defaults to 32-bit operands; 64-bit requires REX.W.
            Self::Legacy32 | Self::Long64 => 32,
        }
    }

    /// Default address width in bits for this mode, before any override.
    pub fn default_address_width(&self) -> u16 {
        match self {
            Self::Real16 | Self::Legacy16 => 16,
            Self::Legacy32 => 32,
            Self::Long64 => 64,
        }
    }

    /// Returns true for 64-bit long mode.
    pub fn is_long(&self) -> bool {
        matches!(self, Self::Long64)
    }

    /// Returns the mode's name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Real16 => "real16",
            Self::Legacy16 => "legacy16",
            Self::Legacy32 => "legacy32",
            Self::Long64 => "long64",
        }
    }
}

/// Stack width the decoder is configured for.
///
/// Must agree with the machine mode; the decoder constructor rejects
/// combinations the architecture does not define.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StackWidth {
    Width16,
    Width32,
    Width64,
}

impl StackWidth {
    /// The width in bits.
    pub fn bits(&self) -> u16 {
        match self {
            Self::Width16 => 16,
            Self::Width32 => 32,
            Self::Width64 => 64,
        }
    }
}
