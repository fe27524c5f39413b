//! Prefix extraction.
//!
//! Parses the legacy prefix run and the REX/VEX/XOP/EVEX prefix families
//! without consuming anything past what is structurally required. Conflicting
//! same-class legacy prefixes follow the architectural last-one-wins rule;
//! mixing REX with a vector prefix is a hard decode error.

use trellis_core::register::seg;
use trellis_core::{MachineMode, Register};

use crate::error::DecodeError;

/// Repeat-group prefix (group 1, 0xF2/0xF3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    /// REP/REPE (0xF3).
    Rep,
    /// REPNE (0xF2).
    Repne,
}

/// Segment-override prefix (group 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentOverride {
    Es,
    Cs,
    Ss,
    Ds,
    Fs,
    Gs,
}

impl SegmentOverride {
    /// The overridden segment register.
    pub fn register(&self) -> Register {
        let id = match self {
            Self::Es => seg::ES,
            Self::Cs => seg::CS,
            Self::Ss => seg::SS,
            Self::Ds => seg::DS,
            Self::Fs => seg::FS,
            Self::Gs => seg::GS,
        };
        Register::segment(id)
    }
}

/// REX prefix fields (64-bit mode only).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rex {
    /// 64-bit operand size.
    pub w: bool,
    /// Extends ModR/M.reg.
    pub r: bool,
    /// Extends SIB.index.
    pub x: bool,
    /// Extends ModR/M.rm, SIB.base or the opcode register field.
    pub b: bool,
}

impl Rex {
    /// Parses a REX byte (0x40-0x4F).
    pub fn from_byte(byte: u8) -> Self {
        Self {
            w: byte & 0x08 != 0,
            r: byte & 0x04 != 0,
            x: byte & 0x02 != 0,
            b: byte & 0x01 != 0,
        }
    }
}

/// VEX prefix fields. Also used for XOP, which shares the 3-byte layout with a
/// different escape byte and map namespace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Vex {
    /// Extension bits, already un-inverted (true = extend).
    pub r: bool,
    pub x: bool,
    pub b: bool,
    /// Opcode extension / 64-bit operand size.
    pub w: bool,
    /// Non-destructive source register, already un-inverted (0-15).
    pub vvvv: u8,
    /// Vector length (false = 128-bit, true = 256-bit).
    pub l: bool,
    /// Implied mandatory prefix (0=none, 1=66, 2=F3, 3=F2).
    pub pp: u8,
    /// Opcode map (VEX: 1-3 aliasing 0F/0F38/0F3A; XOP: 8-10).
    pub map: u8,
}

impl Vex {
    /// Parses the payload byte of a 2-byte VEX prefix (0xC5).
    pub fn from_2byte(b1: u8) -> Self {
        Self {
            r: b1 & 0x80 == 0,
            x: false,
            b: false,
            w: false,
            vvvv: (!b1 >> 3) & 0x0F,
            l: b1 & 0x04 != 0,
            pp: b1 & 0x03,
            map: 1, // 2-byte VEX implies the 0F map
        }
    }

    /// Parses the payload bytes of a 3-byte VEX (0xC4) or XOP (0x8F) prefix.
    pub fn from_3byte(b1: u8, b2: u8) -> Self {
        Self {
            r: b1 & 0x80 == 0,
            x: b1 & 0x40 == 0,
            b: b1 & 0x20 == 0,
            w: b2 & 0x80 != 0,
            vvvv: (!b2 >> 3) & 0x0F,
            l: b2 & 0x04 != 0,
            pp: b2 & 0x03,
            map: b1 & 0x1F,
        }
    }
}

/// EVEX prefix fields (0x62, 4 bytes total).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Evex {
    /// Extension bits, already un-inverted.
    pub r: bool,
    pub x: bool,
    pub b: bool,
    /// High-16 register extension for ModR/M.reg.
    pub r2: bool,
    /// Opcode map (1-3, shared with VEX numbering).
    pub map: u8,
    pub w: bool,
    /// Non-destructive source register, already un-inverted (0-15; combined
    /// with `v2` for 0-31).
    pub vvvv: u8,
    /// Implied mandatory prefix (0=none, 1=66, 2=F3, 3=F2).
    pub pp: u8,
    /// Zeroing-masking.
    pub z: bool,
    /// Vector length bits L'L.
    pub l2: bool,
    pub l: bool,
    /// Broadcast / rounding-control / SAE bit; interpretation is
    /// per-definition.
    pub bcst: bool,
    /// High-16 extension for vvvv and the VSIB index.
    pub v2: bool,
    /// Opmask register selector.
    pub aaa: u8,
}

impl Evex {
    /// Parses the three payload bytes following 0x62, validating reserved
    /// bits.
    pub fn from_bytes(offset: usize, p0: u8, p1: u8, p2: u8) -> Result<Self, DecodeError> {
        if p0 & 0x0C != 0 {
            return Err(DecodeError::invalid_prefix(
                offset,
                "reserved bits set in EVEX byte 1",
            ));
        }
        if p1 & 0x04 == 0 {
            return Err(DecodeError::invalid_prefix(
                offset,
                "reserved bit cleared in EVEX byte 2",
            ));
        }
        let map = p0 & 0x03;
        if map == 0 {
            return Err(DecodeError::invalid_prefix(offset, "EVEX map 0 is reserved"));
        }
        Ok(Self {
            r: p0 & 0x80 == 0,
            x: p0 & 0x40 == 0,
            b: p0 & 0x20 == 0,
            r2: p0 & 0x10 == 0,
            map,
            w: p1 & 0x80 != 0,
            vvvv: (!p1 >> 3) & 0x0F,
            pp: p1 & 0x03,
            z: p2 & 0x80 != 0,
            l2: p2 & 0x40 != 0,
            l: p2 & 0x20 != 0,
            bcst: p2 & 0x10 != 0,
            v2: p2 & 0x08 == 0,
            aaa: p2 & 0x07,
        })
    }
}

/// One of the mutually exclusive vector prefix families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorPrefix {
    Vex(Vex),
    Xop(Vex),
    Evex(Evex),
}

/// The accumulated prefix state of one instruction.
#[derive(Debug, Clone, Default)]
pub struct Prefixes {
    /// LOCK (0xF0).
    pub lock: bool,
    /// Repeat group; last one wins.
    pub repeat: Option<Repeat>,
    /// Segment override; last one wins.
    pub segment: Option<SegmentOverride>,
    /// Operand-size override (0x66) seen.
    pub operand_size: bool,
    /// Address-size override (0x67) seen.
    pub address_size: bool,
    /// Set when the trie resolved 0x66 as a mandatory prefix, removing its
    /// size-override meaning for this instruction.
    pub mandatory_66: bool,
    /// Set when the trie resolved F2/F3 as a mandatory prefix.
    pub mandatory_repeat: bool,
    /// REX prefix (64-bit mode only).
    pub rex: Option<Rex>,
    /// VEX/XOP/EVEX prefix.
    pub vector: Option<VectorPrefix>,
}

impl Prefixes {
    /// Parses the prefix run at the start of `bytes`.
    ///
    /// Returns the accumulated prefixes and the number of bytes consumed; the
    /// next byte is the first opcode (or escape) byte.
    pub fn parse(bytes: &[u8], mode: MachineMode) -> Result<(Self, usize), DecodeError> {
        let mut prefixes = Self::default();
        let mut offset = 0;

        loop {
            let Some(&byte) = bytes.get(offset) else {
                // An instruction cannot consist of prefixes alone; the caller
                // reports the missing opcode byte.
                return Ok((prefixes, offset));
            };

            match byte {
                0xF0 => prefixes.lock = true,
                0xF2 => prefixes.repeat = Some(Repeat::Repne),
                0xF3 => prefixes.repeat = Some(Repeat::Rep),

                0x26 => prefixes.segment = Some(SegmentOverride::Es),
                0x2E => prefixes.segment = Some(SegmentOverride::Cs),
                0x36 => prefixes.segment = Some(SegmentOverride::Ss),
                0x3E => prefixes.segment = Some(SegmentOverride::Ds),
                0x64 => prefixes.segment = Some(SegmentOverride::Fs),
                0x65 => prefixes.segment = Some(SegmentOverride::Gs),

                0x66 => prefixes.operand_size = true,
                0x67 => prefixes.address_size = true,

                // REX is only a prefix in 64-bit mode (INC/DEC opcodes
                // elsewhere). It must immediately precede the opcode; the
                // check below rejects anything else that follows it. This is
                // stricter than hardware, which silently ignores a non-final
                // REX instead of faulting.
                0x40..=0x4F if mode.is_long() => {
                    prefixes.rex = Some(Rex::from_byte(byte));
                    offset += 1;
                    if let Some(&next) = bytes.get(offset) {
                        if is_vector_escape(next, bytes.get(offset + 1), mode) {
                            return Err(DecodeError::malformed_prefix(
                                offset,
                                "REX followed by a VEX/XOP/EVEX prefix",
                            ));
                        }
                        if matches!(next, 0x40..=0x4F) || is_legacy_prefix(next) {
                            return Err(DecodeError::malformed_prefix(
                                offset,
                                "REX must be the last prefix",
                            ));
                        }
                    }
                    return Ok((prefixes, offset));
                }

                // 2-byte VEX.
                0xC5 if vector_payload_follows(byte, bytes.get(offset + 1), mode) => {
                    prefixes.reject_vector_conflicts(offset)?;
                    let b1 = require(bytes, offset, offset + 1)?;
                    prefixes.vector = Some(VectorPrefix::Vex(Vex::from_2byte(b1)));
                    return Ok((prefixes, offset + 2));
                }

                // 3-byte VEX.
                0xC4 if vector_payload_follows(byte, bytes.get(offset + 1), mode) => {
                    prefixes.reject_vector_conflicts(offset)?;
                    let b1 = require(bytes, offset, offset + 1)?;
                    let b2 = require(bytes, offset, offset + 2)?;
                    let vex = Vex::from_3byte(b1, b2);
                    if vex.map == 0 || vex.map > 3 {
                        return Err(DecodeError::invalid_prefix(
                            offset,
                            "reserved VEX opcode map",
                        ));
                    }
                    prefixes.vector = Some(VectorPrefix::Vex(vex));
                    return Ok((prefixes, offset + 3));
                }

                // XOP shares the 3-byte VEX layout behind the 0x8F escape; a
                // map value below 8 means this is really POP r/m.
                0x8F if xop_payload_follows(bytes.get(offset + 1)) => {
                    prefixes.reject_vector_conflicts(offset)?;
                    let b1 = require(bytes, offset, offset + 1)?;
                    let b2 = require(bytes, offset, offset + 2)?;
                    let xop = Vex::from_3byte(b1, b2);
                    if xop.map > 10 {
                        return Err(DecodeError::invalid_prefix(
                            offset,
                            "reserved XOP opcode map",
                        ));
                    }
                    prefixes.vector = Some(VectorPrefix::Xop(xop));
                    return Ok((prefixes, offset + 3));
                }

                // EVEX.
                0x62 if vector_payload_follows(byte, bytes.get(offset + 1), mode) => {
                    prefixes.reject_vector_conflicts(offset)?;
                    let p0 = require(bytes, offset, offset + 1)?;
                    let p1 = require(bytes, offset, offset + 2)?;
                    let p2 = require(bytes, offset, offset + 3)?;
                    let evex = Evex::from_bytes(offset, p0, p1, p2)?;
                    prefixes.vector = Some(VectorPrefix::Evex(evex));
                    return Ok((prefixes, offset + 4));
                }

                _ => return Ok((prefixes, offset)),
            }

            offset += 1;
        }
    }

    /// Rejects legacy prefixes that may not precede a vector prefix.
    fn reject_vector_conflicts(&self, offset: usize) -> Result<(), DecodeError> {
        if self.lock {
            return Err(DecodeError::malformed_prefix(
                offset,
                "LOCK combined with a vector prefix",
            ));
        }
        if self.operand_size || self.repeat.is_some() {
            return Err(DecodeError::malformed_prefix(
                offset,
                "66/F2/F3 combined with a vector prefix",
            ));
        }
        Ok(())
    }

    /// Effective W bit from REX, VEX, XOP or EVEX.
    pub fn w_bit(&self) -> bool {
        match &self.vector {
            Some(VectorPrefix::Vex(v)) | Some(VectorPrefix::Xop(v)) => v.w,
            Some(VectorPrefix::Evex(e)) => e.w,
            None => self.rex.map(|r| r.w).unwrap_or(false),
        }
    }

    /// Extension bit for ModR/M.reg.
    pub fn ext_r(&self) -> bool {
        match &self.vector {
            Some(VectorPrefix::Vex(v)) | Some(VectorPrefix::Xop(v)) => v.r,
            Some(VectorPrefix::Evex(e)) => e.r,
            None => self.rex.map(|r| r.r).unwrap_or(false),
        }
    }

    /// Extension bit for SIB.index.
    pub fn ext_x(&self) -> bool {
        match &self.vector {
            Some(VectorPrefix::Vex(v)) | Some(VectorPrefix::Xop(v)) => v.x,
            Some(VectorPrefix::Evex(e)) => e.x,
            None => self.rex.map(|r| r.x).unwrap_or(false),
        }
    }

    /// Extension bit for ModR/M.rm, SIB.base and opcode-embedded registers.
    pub fn ext_b(&self) -> bool {
        match &self.vector {
            Some(VectorPrefix::Vex(v)) | Some(VectorPrefix::Xop(v)) => v.b,
            Some(VectorPrefix::Evex(e)) => e.b,
            None => self.rex.map(|r| r.b).unwrap_or(false),
        }
    }

    /// Vector length bit L (VEX.L or EVEX.L).
    pub fn l_bit(&self) -> bool {
        match &self.vector {
            Some(VectorPrefix::Vex(v)) | Some(VectorPrefix::Xop(v)) => v.l,
            Some(VectorPrefix::Evex(e)) => e.l,
            None => false,
        }
    }

    /// The EVEX payload, if this instruction is EVEX-encoded.
    pub fn evex(&self) -> Option<&Evex> {
        match &self.vector {
            Some(VectorPrefix::Evex(e)) => Some(e),
            _ => None,
        }
    }

    /// The non-destructive source register selector (vvvv, extended by
    /// EVEX.v' when present).
    pub fn vvvv(&self) -> u8 {
        match &self.vector {
            Some(VectorPrefix::Vex(v)) | Some(VectorPrefix::Xop(v)) => v.vvvv,
            Some(VectorPrefix::Evex(e)) => e.vvvv | ((e.v2 as u8) << 4),
            None => 0,
        }
    }

    /// True if REX or any extension applies to 8-bit register naming
    /// (selects spl/bpl/sil/dil over ah/ch/dh/bh).
    pub fn rex_like(&self) -> bool {
        self.rex.is_some() || self.vector.is_some()
    }
}

fn is_legacy_prefix(byte: u8) -> bool {
    matches!(
        byte,
        0xF0 | 0xF2 | 0xF3 | 0x26 | 0x2E | 0x36 | 0x3E | 0x64 | 0x65 | 0x66 | 0x67
    )
}

/// In 64-bit mode C4/C5/62 always introduce a vector prefix. In 16/32-bit
/// modes they are LES/LDS/BOUND unless the next byte's top two bits are 11
/// (an impossible ModR/M for those opcodes).
fn vector_payload_follows(escape: u8, next: Option<&u8>, mode: MachineMode) -> bool {
    debug_assert!(matches!(escape, 0xC4 | 0xC5 | 0x62));
    match next {
        Some(&b) => mode.is_long() || b & 0xC0 == 0xC0,
        // Let the prefix parser report the truncation with the right offset.
        None => true,
    }
}

/// 0x8F introduces XOP only when the embedded map field selects map 8-10;
/// otherwise the byte is the POP r/m opcode.
fn xop_payload_follows(next: Option<&u8>) -> bool {
    match next {
        Some(&b) => b & 0x1F >= 8,
        None => false,
    }
}

fn is_vector_escape(byte: u8, next: Option<&u8>, mode: MachineMode) -> bool {
    match byte {
        0xC4 | 0xC5 | 0x62 => vector_payload_follows(byte, next, mode),
        0x8F => xop_payload_follows(next),
        _ => false,
    }
}

fn require(bytes: &[u8], start: usize, index: usize) -> Result<u8, DecodeError> {
    bytes
        .get(index)
        .copied()
        .ok_or_else(|| DecodeError::insufficient(start, index + 1, bytes.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_segment_override_wins() {
        let (p, len) = Prefixes::parse(&[0x2E, 0x36, 0x90], MachineMode::Long64).unwrap();
        assert_eq!(p.segment, Some(SegmentOverride::Ss));
        assert_eq!(len, 2);
    }

    #[test]
    fn rex_fields() {
        let (p, len) = Prefixes::parse(&[0x4D, 0x01], MachineMode::Long64).unwrap();
        let rex = p.rex.unwrap();
        assert!(rex.w && rex.r && rex.b && !rex.x);
        assert_eq!(len, 1);
    }

    #[test]
    fn rex_outside_long_mode_is_an_opcode() {
        let (p, len) = Prefixes::parse(&[0x48, 0x01], MachineMode::Legacy32).unwrap();
        assert!(p.rex.is_none());
        assert_eq!(len, 0);
    }

    #[test]
    fn rex_before_vex_is_malformed() {
        let err = Prefixes::parse(&[0x48, 0xC5, 0xF8, 0x10], MachineMode::Long64).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedPrefix { .. }));
    }

    #[test]
    fn rex_before_a_legacy_prefix_is_malformed() {
        let err = Prefixes::parse(&[0x48, 0x66, 0x01], MachineMode::Long64).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedPrefix { .. }));
        let err = Prefixes::parse(&[0x48, 0x41, 0x01], MachineMode::Long64).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedPrefix { .. }));
    }

    #[test]
    fn two_byte_vex_decodes_inverted_fields() {
        // C5 F8: r=1(un-inverted false->0?) -> vvvv=0b1111 inverted to 0, L=0, pp=0
        let (p, len) = Prefixes::parse(&[0xC5, 0xF8, 0x10], MachineMode::Long64).unwrap();
        match p.vector.unwrap() {
            VectorPrefix::Vex(v) => {
                assert!(!v.r);
                assert_eq!(v.vvvv, 0);
                assert!(!v.l);
                assert_eq!(v.pp, 0);
                assert_eq!(v.map, 1);
            }
            other => panic!("expected VEX, got {other:?}"),
        }
        assert_eq!(len, 2);
    }

    #[test]
    fn c5_in_legacy_mode_is_lds_when_modrm_is_memory() {
        // Next byte 0x00 has mod=00, so 0xC5 stays an opcode in 32-bit mode.
        let (p, len) = Prefixes::parse(&[0xC5, 0x00], MachineMode::Legacy32).unwrap();
        assert!(p.vector.is_none());
        assert_eq!(len, 0);
    }

    #[test]
    fn xop_map_below_8_is_pop() {
        let (p, len) = Prefixes::parse(&[0x8F, 0xC0], MachineMode::Long64).unwrap();
        assert!(p.vector.is_none());
        assert_eq!(len, 0);
    }

    #[test]
    fn evex_reserved_bits_rejected() {
        // p0 with bit 2 set.
        let err =
            Prefixes::parse(&[0x62, 0xF5, 0x7C, 0x48, 0x58], MachineMode::Long64).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidPrefixEncoding { .. }));
    }

    #[test]
    fn truncated_vex_reports_insufficient_length() {
        let err = Prefixes::parse(&[0xC4, 0x01], MachineMode::Long64).unwrap_err();
        assert!(err.is_truncation());
    }
}
