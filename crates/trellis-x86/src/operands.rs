//! Operand materialization.
//!
//! Turns an instruction definition's operand schemas plus the extracted
//! decode context into concrete operand values: full register indices after
//! prefix extension bits, memory references with resolved base/index/segment,
//! immediates at their declared widths. Output order follows definition
//! order; a failed operand fails the whole decode with no partial results.

use trellis_core::register::{gpr, HIGH_BYTE_BASE};
use trellis_core::{MemoryRef, Operand, Register, RegisterClass};

use crate::context::DecodeContext;
use crate::definition::{InstructionDef, OperandDef, OperandEncoding, SemanticType};
use crate::error::DecodeError;

/// Materializes every operand of `def` in declaration order.
pub(crate) fn materialize(
    def: &InstructionDef,
    ctx: &mut DecodeContext<'_>,
) -> Result<Vec<Operand>, DecodeError> {
    let mut operands = Vec::with_capacity(def.operands.len());
    for op in &def.operands {
        operands.push(materialize_one(op, ctx)?);
    }
    Ok(operands)
}

fn materialize_one(op: &OperandDef, ctx: &mut DecodeContext<'_>) -> Result<Operand, DecodeError> {
    match op.encoding {
        OperandEncoding::ModrmReg => {
            let modrm = ctx.modrm()?;
            let mut id = modrm.reg as u16;
            if ctx.prefixes.ext_r() {
                id |= 0x8;
            }
            if is_vector(op.semantic) {
                if let Some(evex) = ctx.prefixes.evex() {
                    if evex.r2 {
                        id |= 0x10;
                    }
                }
            }
            Ok(Operand::Register(register_for(op.semantic, id, ctx)?))
        }

        OperandEncoding::ModrmRm => {
            let modrm = ctx.modrm()?;
            if modrm.is_register() {
                if !is_register_capable(op.semantic) {
                    return Err(DecodeError::illegal_operand(
                        ctx.cursor,
                        "memory operand required",
                    ));
                }
                let mut id = modrm.rm as u16;
                if ctx.prefixes.ext_b() {
                    id |= 0x8;
                }
                if is_vector(op.semantic) && ctx.prefixes.evex().map(|e| e.x).unwrap_or(false) {
                    // EVEX.X becomes bit 4 of the register id in
                    // register-direct forms.
                    id |= 0x10;
                }
                Ok(Operand::Register(register_for(op.semantic, id, ctx)?))
            } else {
                if !is_memory_capable(op.semantic) {
                    return Err(DecodeError::illegal_operand(
                        ctx.cursor,
                        "register operand required",
                    ));
                }
                memory_operand(op, ctx)
            }
        }

        OperandEncoding::OpcodeBits => {
            let mut id = (ctx.opcode & 0x7) as u16;
            if ctx.prefixes.ext_b() {
                id |= 0x8;
            }
            Ok(Operand::Register(register_for(op.semantic, id, ctx)?))
        }

        OperandEncoding::Vvvv => {
            let id = ctx.prefixes.vvvv() as u16;
            Ok(Operand::Register(register_for(op.semantic, id, ctx)?))
        }

        OperandEncoding::Immediate => immediate_operand(op, ctx),

        OperandEncoding::Implicit => implicit_operand(op, ctx),
    }
}

/// Builds the register value for a register-class semantic type.
fn register_for(
    semantic: SemanticType,
    id: u16,
    ctx: &DecodeContext<'_>,
) -> Result<Register, DecodeError> {
    let reg = match semantic {
        SemanticType::Gpr8 => gpr8(id, ctx.prefixes.rex_like()),
        SemanticType::Gpr16 => Register::gpr(id, 16),
        SemanticType::Gpr32 => Register::gpr(id, 32),
        SemanticType::Gpr64 => Register::gpr(id, 64),
        SemanticType::Vr64 => Register::vector(id & 0x7, 64),
        SemanticType::Vr128 => Register::vector(id, 128),
        SemanticType::Vr256 => Register::vector(id, 256),
        SemanticType::Vr512 => Register::vector(id, 512),
        SemanticType::SegmentReg => {
            if id > 5 {
                return Err(DecodeError::illegal_operand(
                    ctx.cursor,
                    "no such segment register",
                ));
            }
            Register::segment(id)
        }
        SemanticType::ControlReg => Register::new(RegisterClass::Control, id, machine_width(ctx)),
        SemanticType::DebugReg => Register::new(RegisterClass::Debug, id, machine_width(ctx)),
        SemanticType::MaskReg => Register::mask(id & 0x7),
        SemanticType::BoundReg => {
            if id > 3 {
                return Err(DecodeError::illegal_operand(
                    ctx.cursor,
                    "no such bound register",
                ));
            }
            Register::new(RegisterClass::Bound, id, 128)
        }
        _ => {
            return Err(DecodeError::illegal_operand(
                ctx.cursor,
                "register encoding for a non-register operand",
            ))
        }
    };
    Ok(reg)
}

/// 8-bit GPR naming: without any REX-like prefix, encodings 4-7 select the
/// legacy high-byte registers ah/ch/dh/bh.
fn gpr8(id: u16, rex_like: bool) -> Register {
    if !rex_like && (4..8).contains(&id) {
        Register::gpr(HIGH_BYTE_BASE + (id - 4), 8)
    } else {
        Register::gpr(id, 8)
    }
}

fn machine_width(ctx: &DecodeContext<'_>) -> u16 {
    if ctx.mode.is_long() {
        64
    } else {
        32
    }
}

fn is_vector(semantic: SemanticType) -> bool {
    matches!(
        semantic,
        SemanticType::Vr64 | SemanticType::Vr128 | SemanticType::Vr256 | SemanticType::Vr512
    )
}

fn is_register_capable(semantic: SemanticType) -> bool {
    matches!(
        semantic,
        SemanticType::Gpr8
            | SemanticType::Gpr16
            | SemanticType::Gpr32
            | SemanticType::Gpr64
            | SemanticType::Vr64
            | SemanticType::Vr128
            | SemanticType::Vr256
            | SemanticType::Vr512
            | SemanticType::SegmentReg
            | SemanticType::ControlReg
            | SemanticType::DebugReg
            | SemanticType::MaskReg
            | SemanticType::BoundReg
    )
}

fn is_memory_capable(semantic: SemanticType) -> bool {
    matches!(
        semantic,
        SemanticType::Gpr8
            | SemanticType::Gpr16
            | SemanticType::Gpr32
            | SemanticType::Gpr64
            | SemanticType::Vr64
            | SemanticType::Vr128
            | SemanticType::Vr256
            | SemanticType::Vr512
            | SemanticType::BoundReg
            | SemanticType::Mem { .. }
            | SemanticType::MemBroadcast { .. }
            | SemanticType::MemVsib { .. }
    )
}

/// Memory access width in bits for a ModR/M memory form.
fn mem_width(semantic: SemanticType, ctx: &DecodeContext<'_>) -> u16 {
    match semantic {
        SemanticType::Gpr8 => 8,
        SemanticType::Gpr16 => 16,
        SemanticType::Gpr32 => 32,
        SemanticType::Gpr64 => 64,
        SemanticType::Vr64 => 64,
        SemanticType::Vr128 | SemanticType::BoundReg => 128,
        SemanticType::Vr256 => 256,
        SemanticType::Vr512 => 512,
        SemanticType::Mem { width: 0 } => ctx.effective_operand_width(),
        SemanticType::Mem { width } => width,
        SemanticType::MemBroadcast { element, .. } => element,
        SemanticType::MemVsib { element, .. } => element,
        _ => ctx.effective_operand_width(),
    }
}

/// Builds a memory operand from the cached ModR/M, SIB and displacement.
fn memory_operand(op: &OperandDef, ctx: &mut DecodeContext<'_>) -> Result<Operand, DecodeError> {
    let modrm = ctx.modrm()?;
    let fields = ctx.addressing()?;
    let asz = ctx.effective_address_width();

    let mut base: Option<Register> = None;
    let mut index: Option<Register> = None;
    let mut scale: u8 = 1;

    let vsib = matches!(op.semantic, SemanticType::MemVsib { .. });

    if asz == 16 {
        if vsib {
            return Err(DecodeError::illegal_operand(
                ctx.cursor,
                "VSIB requires 32- or 64-bit addressing",
            ));
        }
        // Fixed 16-bit base/index pairs.
        let (b, i): (Option<u16>, Option<u16>) = match modrm.rm {
            0 => (Some(gpr::RBX), Some(gpr::RSI)),
            1 => (Some(gpr::RBX), Some(gpr::RDI)),
            2 => (Some(gpr::RBP), Some(gpr::RSI)),
            3 => (Some(gpr::RBP), Some(gpr::RDI)),
            4 => (Some(gpr::RSI), None),
            5 => (Some(gpr::RDI), None),
            // rm=6 with mod=00 is a bare disp16.
            6 if modrm.mod_ == 0 => (None, None),
            6 => (Some(gpr::RBP), None),
            _ => (Some(gpr::RBX), None),
        };
        base = b.map(|id| Register::gpr(id, 16));
        index = i.map(|id| Register::gpr(id, 16));
    } else {
        let reg_width = asz;
        if let Some(sib) = fields.sib {
            if vsib {
                let mut id = sib.index as u16;
                if ctx.prefixes.ext_x() {
                    id |= 0x8;
                }
                if ctx.prefixes.evex().map(|e| e.v2).unwrap_or(false) {
                    id |= 0x10;
                }
                let index_width = match op.semantic {
                    SemanticType::MemVsib { index_width, .. } => index_width,
                    _ => unreachable!(),
                };
                index = Some(Register::vector(id, index_width));
                scale = sib.scale_factor();
            } else {
                let mut id = sib.index as u16;
                if ctx.prefixes.ext_x() {
                    id |= 0x8;
                }
                // Index encoding 4 (with no extension) means "no index".
                if id != 0b100 {
                    index = Some(Register::gpr(id, reg_width));
                    scale = sib.scale_factor();
                }
            }
            // Base 101 with mod=00 drops the base in favor of disp32.
            if !(sib.base == 0b101 && modrm.mod_ == 0) {
                let mut id = sib.base as u16;
                if ctx.prefixes.ext_b() {
                    id |= 0x8;
                }
                base = Some(Register::gpr(id, reg_width));
            }
        } else if vsib {
            return Err(DecodeError::illegal_operand(
                ctx.cursor,
                "VSIB addressing requires a SIB byte",
            ));
        } else if modrm.mod_ == 0 && modrm.rm == 0b101 {
            // RIP-relative in long mode, absolute disp32 otherwise.
            if ctx.mode.is_long() {
                base = Some(Register::instruction_pointer(64));
            }
        } else {
            let mut id = modrm.rm as u16;
            if ctx.prefixes.ext_b() {
                id |= 0x8;
            }
            base = Some(Register::gpr(id, reg_width));
        }
    }

    let width = mem_width(op.semantic, ctx);

    // EVEX compressed displacement: an 8-bit displacement is implicitly
    // scaled by the memory access width.
    let mut displacement = fields.disp;
    if ctx.prefixes.evex().is_some() && fields.disp_width == 8 {
        displacement *= (width / 8).max(1) as i64;
    }

    let segment = effective_segment(ctx, base);
    let broadcast = match op.semantic {
        SemanticType::MemBroadcast { mode, .. } => Some(mode),
        _ => None,
    };

    Ok(Operand::Memory(MemoryRef {
        segment,
        base,
        index,
        scale,
        displacement,
        width,
        broadcast,
    }))
}

/// Segment override if present, else the architectural default (SS for
/// rSP/rBP-based references, DS otherwise).
fn effective_segment(ctx: &DecodeContext<'_>, base: Option<Register>) -> Register {
    if let Some(seg) = &ctx.prefixes.segment {
        return seg.register();
    }
    let stack_based = matches!(
        base,
        Some(Register {
            class: RegisterClass::General,
            id: 4..=5,
            ..
        })
    );
    if stack_based {
        Register::segment(trellis_core::register::seg::SS)
    } else {
        Register::segment(trellis_core::register::seg::DS)
    }
}

fn immediate_operand(op: &OperandDef, ctx: &mut DecodeContext<'_>) -> Result<Operand, DecodeError> {
    let operand = match op.semantic {
        SemanticType::Imm8 => Operand::imm(ctx.read_u8()? as i8 as i64, 8),
        SemanticType::Imm8U => Operand::imm_unsigned(ctx.read_u8()? as u64, 8),
        SemanticType::Imm16 => Operand::imm(ctx.read_u16()? as i16 as i64, 16),
        SemanticType::Imm32 => Operand::imm(ctx.read_u32()? as i32 as i64, 32),
        SemanticType::Imm64 => Operand::imm_unsigned(ctx.read_u64()?, 64),
        SemanticType::Rel8 => Operand::Relative {
            offset: ctx.read_u8()? as i8 as i64,
            width: 8,
        },
        SemanticType::Rel16 => Operand::Relative {
            offset: ctx.read_u16()? as i16 as i64,
            width: 16,
        },
        SemanticType::Rel32 => Operand::Relative {
            offset: ctx.read_u32()? as i32 as i64,
            width: 32,
        },
        SemanticType::Ptr1616 => {
            let offset = ctx.read_u16()? as u32;
            let selector = ctx.read_u16()?;
            Operand::FarPointer {
                selector,
                offset,
                width: 16,
            }
        }
        SemanticType::Ptr1632 => {
            let offset = ctx.read_u32()?;
            let selector = ctx.read_u16()?;
            Operand::FarPointer {
                selector,
                offset,
                width: 32,
            }
        }
        SemanticType::Moffs { width } => {
            let offset = match ctx.effective_address_width() {
                16 => ctx.read_u16()? as i64,
                32 => ctx.read_u32()? as i64,
                _ => ctx.read_u64()? as i64,
            };
            let segment = effective_segment(ctx, None);
            let width = if width == 0 {
                ctx.effective_operand_width()
            } else {
                width
            };
            Operand::Memory(MemoryRef::absolute(segment, offset, width))
        }
        _ => {
            return Err(DecodeError::illegal_operand(
                ctx.cursor,
                "immediate encoding for a non-immediate operand",
            ))
        }
    };
    Ok(operand)
}

fn implicit_operand(op: &OperandDef, ctx: &DecodeContext<'_>) -> Result<Operand, DecodeError> {
    let operand = match op.semantic {
        SemanticType::FixedGpr { id, width } => Operand::Register(Register::gpr(id, width)),
        SemanticType::FixedSegment { id } => Operand::Register(Register::segment(id)),
        SemanticType::Const1 => Operand::imm_unsigned(1, 8),
        _ => {
            return Err(DecodeError::illegal_operand(
                ctx.cursor,
                "implicit encoding for an encoded operand",
            ))
        }
    };
    Ok(operand)
}
