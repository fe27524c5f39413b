//! Decoder entry points.

use trellis_core::{AvxInfo, Instruction, MachineMode, Register, RoundingMode, StackWidth};

use crate::context::DecodeContext;
use crate::definition::{EvexBFunctionality, InstructionDef};
use crate::error::DecodeError;
use crate::operands;
use crate::prefix::Repeat;
use crate::table;

/// A configured x86 instruction decoder.
///
/// A decoder is immutable and carries no per-call state; the same instance
/// can decode from any number of threads concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoder {
    mode: MachineMode,
    stack_width: StackWidth,
}

impl Decoder {
    /// Creates a decoder for the given machine mode and stack width.
    ///
    /// Only architecturally valid combinations are accepted: 16-bit modes pair
    /// with a 16-bit stack, 32-bit protected mode with a 16- or 32-bit stack,
    /// and long mode with a 64-bit stack.
    pub fn new(mode: MachineMode, stack_width: StackWidth) -> Result<Self, DecodeError> {
        let valid = match mode {
            MachineMode::Real16 | MachineMode::Legacy16 => stack_width == StackWidth::Width16,
            MachineMode::Legacy32 => {
                matches!(stack_width, StackWidth::Width16 | StackWidth::Width32)
            }
            MachineMode::Long64 => stack_width == StackWidth::Width64,
        };
        if !valid {
            return Err(DecodeError::UnsupportedMode { mode, stack_width });
        }
        Ok(Self { mode, stack_width })
    }

    /// Creates a 64-bit long mode decoder.
    pub fn long64() -> Self {
        Self {
            mode: MachineMode::Long64,
            stack_width: StackWidth::Width64,
        }
    }

    /// Creates a 32-bit protected mode decoder.
    pub fn legacy32() -> Self {
        Self {
            mode: MachineMode::Legacy32,
            stack_width: StackWidth::Width32,
        }
    }

    /// Creates a 16-bit real mode decoder.
    pub fn real16() -> Self {
        Self {
            mode: MachineMode::Real16,
            stack_width: StackWidth::Width16,
        }
    }

    pub fn mode(&self) -> MachineMode {
        self.mode
    }

    pub fn stack_width(&self) -> StackWidth {
        self.stack_width
    }

    /// Decodes the instruction at the start of `bytes`.
    ///
    /// Trailing bytes beyond the instruction are ignored; the consumed length
    /// is reported in [`Instruction::length`].
    pub fn decode(&self, bytes: &[u8]) -> Result<Instruction, DecodeError> {
        let mut ctx = DecodeContext::new(bytes, self.mode);
        ctx.extract_leading_fields()?;

        let tables = table::tables();
        let (def_id, operand_count) = tables.trie.walk(&mut ctx)?;
        let def = tables.defs.get(def_id);
        debug_assert_eq!(def.operands.len(), operand_count as usize);

        let operands = operands::materialize(def, &mut ctx)?;
        let avx = avx_info(def, &mut ctx)?;

        let prefixes = &ctx.prefixes;
        let rep = matches!(prefixes.repeat, Some(Repeat::Rep)) && !prefixes.mandatory_repeat;
        let repne = matches!(prefixes.repeat, Some(Repeat::Repne)) && !prefixes.mandatory_repeat;

        Ok(Instruction {
            mnemonic: def.mnemonic.to_string(),
            length: ctx.cursor,
            operands,
            operand_width: ctx.effective_operand_width(),
            address_width: ctx.effective_address_width(),
            lock: prefixes.lock,
            rep,
            repne,
            avx,
        })
    }

    /// Returns an iterator decoding instructions back to back.
    ///
    /// After a decode failure the iterator reports the error and resynchronizes
    /// by skipping a single byte, so it always makes progress.
    pub fn decode_all<'a>(&self, bytes: &'a [u8]) -> DecodeIter<'a> {
        DecodeIter {
            decoder: *self,
            bytes,
            offset: 0,
        }
    }
}

/// Extracts the AVX-512 decoration (mask, zeroing, rounding, SAE) and checks
/// it against what the selected definition permits.
fn avx_info(def: &InstructionDef, ctx: &mut DecodeContext<'_>) -> Result<AvxInfo, DecodeError> {
    let Some(evex) = ctx.prefixes.evex() else {
        return Ok(AvxInfo::default());
    };
    let (aaa, z, bcst, l, l2) = (evex.aaa, evex.z, evex.bcst, evex.l, evex.l2);

    let mut avx = AvxInfo::default();
    if aaa != 0 {
        if !def.has_mask {
            return Err(DecodeError::illegal_operand(
                ctx.cursor,
                "masking is not permitted here",
            ));
        }
        avx.mask = Some(Register::mask(aaa as u16));
    }
    if z {
        if !def.has_zeroing {
            return Err(DecodeError::illegal_operand(
                ctx.cursor,
                "zeroing-masking is not permitted here",
            ));
        }
        if aaa == 0 {
            return Err(DecodeError::illegal_operand(
                ctx.cursor,
                "zeroing-masking requires an opmask",
            ));
        }
        avx.zeroing = true;
    }
    if bcst {
        match def.evex_b {
            // A broadcast shows up on the memory operand itself.
            EvexBFunctionality::Broadcast => {}
            EvexBFunctionality::RoundingControl => {
                if !ctx.modrm()?.is_register() {
                    return Err(DecodeError::illegal_operand(
                        ctx.cursor,
                        "static rounding requires a register form",
                    ));
                }
                // L'L repurposed as the rounding mode; SAE is implied.
                avx.rounding = Some(match (l2, l) {
                    (false, false) => RoundingMode::NearestEven,
                    (false, true) => RoundingMode::Down,
                    (true, false) => RoundingMode::Up,
                    (true, true) => RoundingMode::TowardZero,
                });
            }
            EvexBFunctionality::SuppressAllExceptions => {
                if !ctx.modrm()?.is_register() {
                    return Err(DecodeError::illegal_operand(
                        ctx.cursor,
                        "SAE requires a register form",
                    ));
                }
                avx.suppress_all_exceptions = true;
            }
            EvexBFunctionality::None => {
                return Err(DecodeError::illegal_operand(
                    ctx.cursor,
                    "EVEX.b is not permitted here",
                ));
            }
        }
    }
    Ok(avx)
}

/// Iterator over consecutive instructions in a byte slice.
///
/// Yields `(offset, result)` pairs. See [`Decoder::decode_all`].
pub struct DecodeIter<'a> {
    decoder: Decoder,
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for DecodeIter<'a> {
    type Item = (usize, Result<Instruction, DecodeError>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.bytes.len() {
            return None;
        }
        let start = self.offset;
        let result = self.decoder.decode(&self.bytes[start..]);
        match &result {
            Ok(insn) => self.offset += insn.length,
            Err(_) => self.offset += 1,
        }
        Some((start, result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_stack_width() {
        let err = Decoder::new(MachineMode::Long64, StackWidth::Width32).unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedMode { .. }));
        assert!(Decoder::new(MachineMode::Legacy32, StackWidth::Width16).is_ok());
    }

    #[test]
    fn iterator_resynchronizes_after_errors() {
        let decoder = Decoder::long64();
        // 0x90 nop, then a byte with no definition, then another nop.
        let bytes = [0x90, 0x06, 0x90];
        let out: Vec<_> = decoder.decode_all(&bytes).collect();
        assert_eq!(out.len(), 3);
        assert!(out[0].1.is_ok());
        assert!(out[1].1.is_err());
        assert!(out[2].1.is_ok());
        assert_eq!(out[2].0, 2);
    }
}
