//! Per-call decode state.
//!
//! A `DecodeContext` owns the cursor into the input buffer and every field
//! extracted so far. Prefixes, map and opcode are established up front;
//! ModR/M, SIB and displacement are decoded on demand - the first trie node or
//! operand that needs them triggers the read, and the result is cached for the
//! rest of the call.

use trellis_core::MachineMode;

use crate::error::DecodeError;
use crate::modrm::{ModRm, Sib};
use crate::prefix::{Prefixes, VectorPrefix};

/// Architectural upper bound on total instruction length in bytes. Any read
/// that would push the cursor past this bound fails, no matter how much input
/// remains.
pub(crate) const MAX_INSTRUCTION_LENGTH: usize = 15;

/// Opcode namespace an opcode byte is interpreted within.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeMap {
    /// One-byte opcodes.
    Default,
    /// 0F escape / VEX.mmmmm=1 / EVEX.mm=1.
    Map0F,
    /// 0F 38 escape / map 2.
    Map0F38,
    /// 0F 3A escape / map 3.
    Map0F3A,
    /// XOP maps 8-10.
    Xop8,
    Xop9,
    XopA,
}

/// Cached SIB/displacement fields of a memory-form ModR/M.
#[derive(Debug, Clone, Copy, Default)]
pub struct Addressing {
    /// SIB byte, when the rm encoding requires one.
    pub sib: Option<Sib>,
    /// Raw displacement, sign-extended. EVEX compressed-displacement scaling
    /// is interpretation, applied during materialization.
    pub disp: i64,
    /// Encoded displacement width in bits (0 = none).
    pub disp_width: u8,
}

/// Transient state of a single decode call.
pub struct DecodeContext<'a> {
    bytes: &'a [u8],
    /// Next unread byte.
    pub cursor: usize,
    pub mode: MachineMode,
    pub prefixes: Prefixes,
    pub map: OpcodeMap,
    pub opcode: u8,
    modrm: Option<ModRm>,
    addressing: Option<Addressing>,
}

impl<'a> DecodeContext<'a> {
    /// Creates a context; prefixes and opcode are established by
    /// [`DecodeContext::extract_leading_fields`].
    pub fn new(bytes: &'a [u8], mode: MachineMode) -> Self {
        Self {
            bytes,
            cursor: 0,
            mode,
            prefixes: Prefixes::default(),
            map: OpcodeMap::Default,
            opcode: 0,
            modrm: None,
            addressing: None,
        }
    }

    /// Parses prefixes, resolves the opcode map and fetches the opcode byte.
    pub fn extract_leading_fields(&mut self) -> Result<(), DecodeError> {
        let (prefixes, consumed) = Prefixes::parse(self.bytes, self.mode)?;
        self.prefixes = prefixes;
        self.cursor = consumed;

        match &self.prefixes.vector {
            Some(VectorPrefix::Vex(v)) => {
                self.map = match v.map {
                    1 => OpcodeMap::Map0F,
                    2 => OpcodeMap::Map0F38,
                    _ => OpcodeMap::Map0F3A,
                };
            }
            Some(VectorPrefix::Xop(x)) => {
                self.map = match x.map {
                    8 => OpcodeMap::Xop8,
                    9 => OpcodeMap::Xop9,
                    _ => OpcodeMap::XopA,
                };
            }
            Some(VectorPrefix::Evex(e)) => {
                self.map = match e.map {
                    1 => OpcodeMap::Map0F,
                    2 => OpcodeMap::Map0F38,
                    _ => OpcodeMap::Map0F3A,
                };
            }
            None => {
                // Legacy escape bytes select the map.
                if self.peek()? == 0x0F {
                    self.cursor += 1;
                    match self.peek()? {
                        0x38 => {
                            self.cursor += 1;
                            self.map = OpcodeMap::Map0F38;
                        }
                        0x3A => {
                            self.cursor += 1;
                            self.map = OpcodeMap::Map0F3A;
                        }
                        _ => self.map = OpcodeMap::Map0F,
                    }
                }
            }
        }

        self.opcode = self.read_u8()?;
        Ok(())
    }

    fn peek(&self) -> Result<u8, DecodeError> {
        if self.cursor >= MAX_INSTRUCTION_LENGTH {
            return Err(DecodeError::too_long(self.cursor));
        }
        self.bytes
            .get(self.cursor)
            .copied()
            .ok_or_else(|| DecodeError::insufficient(self.cursor, self.cursor + 1, self.bytes.len()))
    }

    /// Reads one byte, advancing the cursor.
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let byte = self.peek()?;
        self.cursor += 1;
        Ok(byte)
    }

    /// Reads a little-endian u16, advancing the cursor.
    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        let bytes = self.read_array::<2>()?;
        Ok(u16::from_le_bytes(bytes))
    }

    /// Reads a little-endian u32, advancing the cursor.
    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let bytes = self.read_array::<4>()?;
        Ok(u32::from_le_bytes(bytes))
    }

    /// Reads a little-endian u64, advancing the cursor.
    pub fn read_u64(&mut self) -> Result<u64, DecodeError> {
        let bytes = self.read_array::<8>()?;
        Ok(u64::from_le_bytes(bytes))
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let end = self.cursor + N;
        if end > MAX_INSTRUCTION_LENGTH {
            return Err(DecodeError::too_long(self.cursor));
        }
        let slice = self
            .bytes
            .get(self.cursor..end)
            .ok_or_else(|| DecodeError::insufficient(self.cursor, end, self.bytes.len()))?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        self.cursor = end;
        Ok(out)
    }

    /// The ModR/M byte, read and cached on first use.
    pub fn modrm(&mut self) -> Result<ModRm, DecodeError> {
        if let Some(m) = self.modrm {
            return Ok(m);
        }
        let m = ModRm::parse(self.read_u8()?);
        self.modrm = Some(m);
        Ok(m)
    }

    /// SIB and displacement for a memory-form ModR/M, read and cached on
    /// first use. Must not be called before [`DecodeContext::modrm`].
    pub fn addressing(&mut self) -> Result<Addressing, DecodeError> {
        if let Some(a) = self.addressing {
            return Ok(a);
        }
        let modrm = self.modrm()?;
        let mut fields = Addressing::default();

        if !modrm.is_register() {
            let asz = self.effective_address_width();
            if modrm.needs_sib(asz) {
                fields.sib = Some(Sib::parse(self.read_u8()?));
            }

            fields.disp_width = match (asz, modrm.mod_) {
                (16, 0b00) if modrm.rm == 0b110 => 16,
                (_, 0b00) if asz != 16 && modrm.rm == 0b101 => 32,
                (_, 0b00) => match fields.sib {
                    // SIB with base=101 and mod=00 drops the base but keeps a
                    // 32-bit displacement.
                    Some(sib) if sib.base == 0b101 => 32,
                    _ => 0,
                },
                (_, 0b01) => 8,
                (16, 0b10) => 16,
                (_, 0b10) => 32,
                _ => 0,
            };

            fields.disp = match fields.disp_width {
                8 => self.read_u8()? as i8 as i64,
                16 => self.read_u16()? as i16 as i64,
                32 => self.read_u32()? as i32 as i64,
                _ => 0,
            };
        }

        self.addressing = Some(fields);
        Ok(fields)
    }

    /// Effective operand width in bits after 0x66 and REX/VEX/EVEX.W.
    ///
    /// A 0x66 byte the trie resolved as a mandatory prefix no longer acts as
    /// an override.
    pub fn effective_operand_width(&self) -> u16 {
        if self.mode.is_long() && self.prefixes.w_bit() {
            return 64;
        }
        let overridden = self.prefixes.operand_size && !self.prefixes.mandatory_66;
        match (self.mode.default_operand_width(), overridden) {
            (16, false) => 16,
            (16, true) => 32,
            (_, false) => 32,
            (_, true) => 16,
        }
    }

    /// Effective address width in bits after 0x67.
    pub fn effective_address_width(&self) -> u16 {
        match (self.mode.default_address_width(), self.prefixes.address_size) {
            (16, false) => 16,
            (16, true) => 32,
            (32, false) => 32,
            (32, true) => 16,
            (64, true) => 32,
            _ => 64,
        }
    }

    /// Total number of input bytes available.
    pub fn available(&self) -> usize {
        self.bytes.len()
    }
}
