//! End-to-end decode tests over hand-assembled byte sequences.

use trellis_core::register::{seg, HIGH_BYTE_BASE};
use trellis_x86::{
    BroadcastMode, DecodeError, Decoder, MachineMode, MemoryRef, Operand, Register, RoundingMode,
    StackWidth,
};

fn long() -> Decoder {
    Decoder::long64()
}

fn legacy() -> Decoder {
    Decoder::legacy32()
}

fn real() -> Decoder {
    Decoder::real16()
}

#[test]
fn add_register_register_with_rex_w() {
    let insn = long().decode(&[0x48, 0x01, 0xd8]).unwrap();
    assert_eq!(insn.mnemonic, "add");
    assert_eq!(insn.length, 3);
    assert_eq!(insn.operand_width, 64);
    assert_eq!(
        insn.operands,
        vec![
            Operand::reg(Register::gpr(0, 64)),
            Operand::reg(Register::gpr(3, 64)),
        ]
    );
}

#[test]
fn shortest_alu_form_is_two_bytes() {
    let insn = long().decode(&[0x00, 0xc0]).unwrap();
    assert_eq!(insn.mnemonic, "add");
    assert_eq!(insn.length, 2);
    assert_eq!(
        insn.operands,
        vec![
            Operand::reg(Register::gpr(0, 8)),
            Operand::reg(Register::gpr(0, 8)),
        ]
    );
}

#[test]
fn high_byte_registers_without_rex() {
    // add ah, bh
    let insn = long().decode(&[0x00, 0xfc]).unwrap();
    assert_eq!(
        insn.operands,
        vec![
            Operand::reg(Register::gpr(HIGH_BYTE_BASE, 8)),
            Operand::reg(Register::gpr(HIGH_BYTE_BASE + 3, 8)),
        ]
    );
    // With any REX the same encoding selects spl/dil.
    let insn = long().decode(&[0x40, 0x00, 0xfc]).unwrap();
    assert_eq!(
        insn.operands,
        vec![
            Operand::reg(Register::gpr(4, 8)),
            Operand::reg(Register::gpr(7, 8)),
        ]
    );
}

#[test]
fn trailing_bytes_are_ignored() {
    let insn = long().decode(&[0x90, 0x01, 0x02, 0x03]).unwrap();
    assert_eq!(insn.mnemonic, "nop");
    assert_eq!(insn.length, 1);
}

#[test]
fn decoded_length_allows_exact_redecode() {
    let bytes = [0x48, 0x8b, 0x05, 0x78, 0x56, 0x34, 0x12, 0x90];
    let first = long().decode(&bytes).unwrap();
    let again = long().decode(&bytes[..first.length]).unwrap();
    assert_eq!(first, again);
}

#[test]
fn truncation_is_reported_at_every_stage() {
    // Empty input, prefix only, missing ModR/M, missing displacement,
    // missing immediate, truncated EVEX payload.
    for bytes in [
        &[][..],
        &[0x66][..],
        &[0x48, 0x01][..],
        &[0x48, 0x8b, 0x05, 0x78][..],
        &[0xb8, 0x01, 0x02][..],
        &[0x62, 0xf1][..],
    ] {
        let err = long().decode(bytes).unwrap_err();
        assert!(err.is_truncation(), "{bytes:02x?} -> {err}");
    }
}

#[test]
fn fifteen_byte_length_limit() {
    // A redundant prefix run can push any instruction over the limit.
    let mut bytes = vec![0x2E; 20];
    bytes.push(0x90);
    let err = long().decode(&bytes).unwrap_err();
    assert!(matches!(err, DecodeError::InstructionTooLong { .. }));
    assert!(!err.is_truncation());

    // Exactly 15 bytes is still legal: 5 prefix bytes, REX.W, b8, imm64.
    let mut bytes = vec![0x2E; 5];
    bytes.extend_from_slice(&[0x48, 0xb8]);
    bytes.extend_from_slice(&[0u8; 8]);
    let insn = long().decode(&bytes).unwrap();
    assert_eq!(insn.length, 15);

    // One more prefix tips it over.
    let mut bytes = vec![0x2E; 6];
    bytes.extend_from_slice(&[0x48, 0xb8]);
    bytes.extend_from_slice(&[0u8; 8]);
    let err = long().decode(&bytes).unwrap_err();
    assert!(matches!(err, DecodeError::InstructionTooLong { .. }));
}

#[test]
fn sixteen_bit_addressing_forms() {
    // add [bx+si], al
    let insn = real().decode(&[0x00, 0x00]).unwrap();
    assert_eq!(
        insn.operands[0],
        Operand::Memory(MemoryRef {
            segment: Register::segment(seg::DS),
            base: Some(Register::gpr(3, 16)),
            index: Some(Register::gpr(6, 16)),
            scale: 1,
            displacement: 0,
            width: 8,
            broadcast: None,
        })
    );

    // add [bp+0x10], al - bp-based defaults to ss.
    let insn = real().decode(&[0x00, 0x46, 0x10]).unwrap();
    match &insn.operands[0] {
        Operand::Memory(m) => {
            assert_eq!(m.base, Some(Register::gpr(5, 16)));
            assert_eq!(m.index, None);
            assert_eq!(m.displacement, 0x10);
            assert_eq!(m.segment, Register::segment(seg::SS));
        }
        other => panic!("expected memory, got {other:?}"),
    }

    // add [0x1234], al - mod=00 rm=110 is a bare disp16.
    let insn = real().decode(&[0x00, 0x06, 0x34, 0x12]).unwrap();
    match &insn.operands[0] {
        Operand::Memory(m) => {
            assert!(m.is_absolute());
            assert_eq!(m.displacement, 0x1234);
        }
        other => panic!("expected memory, got {other:?}"),
    }
}

#[test]
fn every_modrm_mod_value_addresses_correctly() {
    // add [rax], al / add [rax+0x10], al / add [rax+0x12345678], al /
    // add al, al: same opcode, all four mod values.
    let insn = long().decode(&[0x00, 0x00]).unwrap();
    match &insn.operands[0] {
        Operand::Memory(m) => {
            assert_eq!(m.base, Some(Register::gpr(0, 64)));
            assert_eq!(m.displacement, 0);
        }
        other => panic!("expected memory, got {other:?}"),
    }

    let insn = long().decode(&[0x00, 0x40, 0x10]).unwrap();
    assert_eq!(insn.length, 3);
    match &insn.operands[0] {
        Operand::Memory(m) => assert_eq!(m.displacement, 0x10),
        other => panic!("expected memory, got {other:?}"),
    }

    let insn = long().decode(&[0x00, 0x80, 0x78, 0x56, 0x34, 0x12]).unwrap();
    assert_eq!(insn.length, 6);
    match &insn.operands[0] {
        Operand::Memory(m) => assert_eq!(m.displacement, 0x12345678),
        other => panic!("expected memory, got {other:?}"),
    }

    let insn = long().decode(&[0x00, 0xc0]).unwrap();
    assert!(insn.operands[0].is_register());
}

#[test]
fn sib_addressing_with_scale() {
    // add eax, [ebp+ecx*4+0x10]
    let insn = legacy().decode(&[0x03, 0x44, 0x8d, 0x10]).unwrap();
    assert_eq!(
        insn.operands[1],
        Operand::Memory(MemoryRef {
            segment: Register::segment(seg::SS),
            base: Some(Register::gpr(5, 32)),
            index: Some(Register::gpr(1, 32)),
            scale: 4,
            displacement: 0x10,
            width: 32,
            broadcast: None,
        })
    );
}

#[test]
fn sib_with_no_base_and_no_index() {
    // mov rax, fs:[0x12345678]
    let insn = long()
        .decode(&[0x64, 0x48, 0x8b, 0x04, 0x25, 0x78, 0x56, 0x34, 0x12])
        .unwrap();
    match &insn.operands[1] {
        Operand::Memory(m) => {
            assert!(m.is_absolute());
            assert_eq!(m.displacement, 0x12345678);
            assert_eq!(m.segment, Register::segment(seg::FS));
        }
        other => panic!("expected memory, got {other:?}"),
    }
}

#[test]
fn rip_relative_in_long_mode_only() {
    let bytes = [0x48, 0x03, 0x05, 0x78, 0x56, 0x34, 0x12];
    let insn = long().decode(&bytes).unwrap();
    match &insn.operands[1] {
        Operand::Memory(m) => {
            assert_eq!(
                m.base,
                Some(Register::instruction_pointer(64)),
                "mod=00 rm=101 is rip-relative in long mode"
            );
            assert_eq!(m.displacement, 0x12345678);
        }
        other => panic!("expected memory, got {other:?}"),
    }

    // The same encoding (minus REX) is absolute disp32 in 32-bit mode.
    let insn = legacy().decode(&bytes[1..]).unwrap();
    match &insn.operands[1] {
        Operand::Memory(m) => assert!(m.is_absolute()),
        other => panic!("expected memory, got {other:?}"),
    }
}

#[test]
fn operand_size_override_both_directions() {
    let insn = real().decode(&[0x01, 0xc0]).unwrap();
    assert_eq!(insn.operand_width, 16);
    let insn = real().decode(&[0x66, 0x01, 0xc0]).unwrap();
    assert_eq!(insn.operand_width, 32);
    let insn = long().decode(&[0x66, 0x01, 0xc0]).unwrap();
    assert_eq!(insn.operand_width, 16);
    assert_eq!(insn.operands[0], Operand::reg(Register::gpr(0, 16)));
}

#[test]
fn segment_register_stores_are_sixteen_bits() {
    // mov [rax], es: always a 16-bit store, even under REX.W.
    let insn = long().decode(&[0x48, 0x8c, 0x00]).unwrap();
    match &insn.operands[0] {
        Operand::Memory(m) => assert_eq!(m.width, 16),
        other => panic!("expected memory, got {other:?}"),
    }
    assert_eq!(insn.operands[1], Operand::Register(Register::segment(seg::ES)));

    // The register-direct form keeps the effective operand width.
    let insn = long().decode(&[0x48, 0x8c, 0xc0]).unwrap();
    assert_eq!(insn.operands[0], Operand::Register(Register::gpr(0, 64)));
    let insn = long().decode(&[0x8c, 0xc0]).unwrap();
    assert_eq!(insn.operands[0], Operand::Register(Register::gpr(0, 32)));
}

#[test]
fn lea_requires_a_memory_operand() {
    let err = long().decode(&[0x48, 0x8d, 0xc0]).unwrap_err();
    assert!(matches!(err, DecodeError::IllegalOperandState { .. }));

    let insn = long().decode(&[0x48, 0x8d, 0x03]).unwrap();
    assert_eq!(insn.mnemonic, "lea");
    assert!(insn.operands[1].is_memory());
}

#[test]
fn lock_and_rep_are_surfaced() {
    let insn = long().decode(&[0xf0, 0x01, 0x03]).unwrap();
    assert!(insn.lock);

    // F3 before nop stays a repeat prefix; 0x90 has no mandatory-prefix
    // dispatch.
    let insn = long().decode(&[0xf3, 0x90]).unwrap();
    assert_eq!(insn.mnemonic, "nop");
    assert!(insn.rep);
}

#[test]
fn mandatory_prefixes_are_consumed() {
    // F3 0F 10: movss, and the F3 is not reported as rep.
    let insn = long().decode(&[0xf3, 0x0f, 0x10, 0xc1]).unwrap();
    assert_eq!(insn.mnemonic, "movss");
    assert!(!insn.rep);
    assert_eq!(
        insn.operands,
        vec![
            Operand::reg(Register::vector(0, 128)),
            Operand::reg(Register::vector(1, 128)),
        ]
    );

    // 66 0F 10: movupd, and the 66 no longer affects the operand width.
    let insn = long().decode(&[0x66, 0x0f, 0x10, 0x01]).unwrap();
    assert_eq!(insn.mnemonic, "movupd");
    assert_eq!(insn.operand_width, 32);
    match &insn.operands[1] {
        Operand::Memory(m) => assert_eq!(m.width, 128),
        other => panic!("expected memory, got {other:?}"),
    }

    // Scalar load from memory narrows to the element width.
    let insn = long().decode(&[0xf2, 0x0f, 0x10, 0x02]).unwrap();
    assert_eq!(insn.mnemonic, "movsd");
    match &insn.operands[1] {
        Operand::Memory(m) => assert_eq!(m.width, 64),
        other => panic!("expected memory, got {other:?}"),
    }
}

#[test]
fn push_defaults_to_64_bit_in_long_mode() {
    let insn = long().decode(&[0x50]).unwrap();
    assert_eq!(insn.operands[0], Operand::reg(Register::gpr(0, 64)));
    let insn = long().decode(&[0x66, 0x50]).unwrap();
    assert_eq!(insn.operands[0], Operand::reg(Register::gpr(0, 16)));
    // REX.B reaches r8.
    let insn = long().decode(&[0x41, 0x50]).unwrap();
    assert_eq!(insn.operands[0], Operand::reg(Register::gpr(8, 64)));

    let insn = legacy().decode(&[0x50]).unwrap();
    assert_eq!(insn.operands[0], Operand::reg(Register::gpr(0, 32)));
}

#[test]
fn mov_imm64_with_rex_w() {
    let insn = long()
        .decode(&[0x49, 0xb8, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88])
        .unwrap();
    assert_eq!(insn.mnemonic, "mov");
    assert_eq!(insn.length, 10);
    assert_eq!(insn.operands[0], Operand::reg(Register::gpr(8, 64)));
    match &insn.operands[1] {
        Operand::Immediate(imm) => {
            assert_eq!(imm.as_u64(), 0x8877665544332211);
            assert_eq!(imm.width, 64);
        }
        other => panic!("expected immediate, got {other:?}"),
    }
}

#[test]
fn relative_branches_sign_extend() {
    let insn = long().decode(&[0x75, 0xfe]).unwrap();
    assert_eq!(insn.mnemonic, "jnz");
    assert_eq!(insn.operands[0], Operand::Relative { offset: -2, width: 8 });

    let insn = long().decode(&[0xe8, 0x00, 0x00, 0x00, 0x80]).unwrap();
    assert_eq!(insn.mnemonic, "call");
    assert_eq!(
        insn.operands[0],
        Operand::Relative {
            offset: -0x80000000,
            width: 32
        }
    );

    let insn = real().decode(&[0x0f, 0x84, 0x10, 0x00]).unwrap();
    assert_eq!(insn.mnemonic, "jz");
    assert_eq!(insn.operands[0], Operand::Relative { offset: 0x10, width: 16 });
}

#[test]
fn rcx_zero_branch_follows_address_size() {
    assert_eq!(long().decode(&[0xe3, 0x00]).unwrap().mnemonic, "jrcxz");
    assert_eq!(long().decode(&[0x67, 0xe3, 0x00]).unwrap().mnemonic, "jecxz");
    assert_eq!(legacy().decode(&[0xe3, 0x00]).unwrap().mnemonic, "jecxz");
    assert_eq!(real().decode(&[0xe3, 0x00]).unwrap().mnemonic, "jcxz");
}

#[test]
fn far_jump_carries_a_far_pointer() {
    let insn = legacy()
        .decode(&[0xea, 0x78, 0x56, 0x34, 0x12, 0x08, 0x00])
        .unwrap();
    assert_eq!(insn.mnemonic, "jmp");
    assert_eq!(
        insn.operands[0],
        Operand::FarPointer {
            selector: 0x0008,
            offset: 0x12345678,
            width: 32,
        }
    );
    // Removed in long mode.
    assert!(long().decode(&[0xea, 0x78, 0x56, 0x34, 0x12, 0x08, 0x00]).is_err());
}

#[test]
fn moffs_offset_is_address_width_wide() {
    let insn = long()
        .decode(&[0xa1, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x08])
        .unwrap();
    assert_eq!(insn.mnemonic, "mov");
    assert_eq!(insn.length, 9);
    assert_eq!(insn.operands[0], Operand::reg(Register::gpr(0, 32)));
    match &insn.operands[1] {
        Operand::Memory(m) => {
            assert!(m.is_absolute());
            assert_eq!(m.displacement, 0x0877665544332211);
            assert_eq!(m.width, 32);
        }
        other => panic!("expected memory, got {other:?}"),
    }

    let insn = real().decode(&[0xa0, 0x34, 0x12]).unwrap();
    assert_eq!(insn.length, 3);
    match &insn.operands[1] {
        Operand::Memory(m) => assert_eq!(m.width, 8),
        other => panic!("expected memory, got {other:?}"),
    }
}

#[test]
fn mode_gated_opcodes() {
    // syscall exists in long mode only.
    assert_eq!(long().decode(&[0x0f, 0x05]).unwrap().mnemonic, "syscall");
    assert!(matches!(
        legacy().decode(&[0x0f, 0x05]).unwrap_err(),
        DecodeError::UnrecognizedInstruction { .. }
    ));

    // 0x82 aliases the 0x80 immediate group outside long mode.
    assert_eq!(legacy().decode(&[0x82, 0xc0, 0x01]).unwrap().mnemonic, "add");
    assert!(long().decode(&[0x82, 0xc0, 0x01]).is_err());
}

#[test]
fn modrm_rm_distinguished_system_forms() {
    assert_eq!(long().decode(&[0x0f, 0x01, 0xf8]).unwrap().mnemonic, "swapgs");
    assert_eq!(long().decode(&[0x0f, 0x01, 0xf9]).unwrap().mnemonic, "rdtscp");
    assert!(long().decode(&[0x0f, 0x01, 0xfa]).is_err());
}

#[test]
fn group_dispatch_on_modrm_reg() {
    // 0x83 /5 = sub r/m, imm8 (sign-extended).
    let insn = long().decode(&[0x48, 0x83, 0xec, 0x20]).unwrap();
    assert_eq!(insn.mnemonic, "sub");
    assert_eq!(insn.operands[0], Operand::reg(Register::gpr(4, 64)));
    assert_eq!(insn.operands[1], Operand::imm(0x20, 8));

    // 0xd3 /4 = shl r/m, cl.
    let insn = long().decode(&[0xd3, 0xe0]).unwrap();
    assert_eq!(insn.mnemonic, "shl");
    assert_eq!(insn.operands[1], Operand::reg(Register::gpr(1, 8)));

    // 0xc0 /6 is reserved.
    assert!(long().decode(&[0xc0, 0xf0, 0x01]).is_err());
}

#[test]
fn movd_movq_follow_the_w_bit() {
    let insn = long().decode(&[0x66, 0x0f, 0x6e, 0xc0]).unwrap();
    assert_eq!(insn.mnemonic, "movd");
    assert_eq!(
        insn.operands,
        vec![
            Operand::reg(Register::vector(0, 128)),
            Operand::reg(Register::gpr(0, 32)),
        ]
    );

    let insn = long().decode(&[0x66, 0x48, 0x0f, 0x6e, 0xc0]).unwrap();
    assert_eq!(insn.mnemonic, "movq");
    assert_eq!(insn.operands[1], Operand::reg(Register::gpr(0, 64)));

    // No 66: the MMX register file.
    let insn = long().decode(&[0x0f, 0x6e, 0xc0]).unwrap();
    assert_eq!(insn.operands[0], Operand::reg(Register::vector(0, 64)));
}

#[test]
fn vex_three_operand_form() {
    // vaddps xmm0, xmm1, xmm2
    let insn = long().decode(&[0xc5, 0xf0, 0x58, 0xc2]).unwrap();
    assert_eq!(insn.mnemonic, "vaddps");
    assert_eq!(insn.length, 4);
    assert_eq!(
        insn.operands,
        vec![
            Operand::reg(Register::vector(0, 128)),
            Operand::reg(Register::vector(1, 128)),
            Operand::reg(Register::vector(2, 128)),
        ]
    );

    // VEX.L selects ymm.
    let insn = long().decode(&[0xc5, 0xf4, 0x58, 0xc2]).unwrap();
    assert_eq!(insn.operands[0], Operand::reg(Register::vector(0, 256)));
}

#[test]
fn vex_l_distinguishes_vzeroupper_and_vzeroall() {
    assert_eq!(long().decode(&[0xc5, 0xf8, 0x77]).unwrap().mnemonic, "vzeroupper");
    assert_eq!(long().decode(&[0xc5, 0xfc, 0x77]).unwrap().mnemonic, "vzeroall");
}

#[test]
fn vex_in_legacy_mode_needs_a_register_modrm() {
    // 0xC5 with mod!=11 in the next byte is LDS, which this table does not
    // define, and must not be parsed as VEX.
    let err = legacy().decode(&[0xc5, 0x00]).unwrap_err();
    assert!(matches!(err, DecodeError::UnrecognizedInstruction { .. }));
    // With mod=11 it is VEX.
    let insn = legacy().decode(&[0xc5, 0xf0, 0x58, 0xc2]).unwrap();
    assert_eq!(insn.mnemonic, "vaddps");
}

#[test]
fn evex_length_and_masking() {
    // vaddps zmm0, zmm1, zmm2
    let insn = long().decode(&[0x62, 0xf1, 0x74, 0x48, 0x58, 0xc2]).unwrap();
    assert_eq!(insn.mnemonic, "vaddps");
    assert_eq!(insn.operands[0], Operand::reg(Register::vector(0, 512)));
    assert!(insn.avx.is_empty());

    // vaddps zmm0 {k1} {z}, zmm1, zmm2
    let insn = long().decode(&[0x62, 0xf1, 0x74, 0xc9, 0x58, 0xc2]).unwrap();
    assert_eq!(insn.avx.mask, Some(Register::mask(1)));
    assert!(insn.avx.zeroing);
}

#[test]
fn evex_broadcast_memory_form() {
    // vaddps zmm0, zmm1, dword [rdx] {1to16}
    let insn = long().decode(&[0x62, 0xf1, 0x74, 0x58, 0x58, 0x02]).unwrap();
    match &insn.operands[2] {
        Operand::Memory(m) => {
            assert_eq!(m.broadcast, Some(BroadcastMode::To16));
            assert_eq!(m.width, 32);
        }
        other => panic!("expected memory, got {other:?}"),
    }
    assert!(insn.avx.rounding.is_none());
}

#[test]
fn evex_compressed_displacement() {
    // vaddps zmm0, zmm1, [rdx+0x40]: disp8 of 1 scales by the 64-byte
    // access width.
    let insn = long()
        .decode(&[0x62, 0xf1, 0x74, 0x48, 0x58, 0x42, 0x01])
        .unwrap();
    match &insn.operands[2] {
        Operand::Memory(m) => assert_eq!(m.displacement, 64),
        other => panic!("expected memory, got {other:?}"),
    }

    // In the broadcast form the element width scales the displacement.
    let insn = long()
        .decode(&[0x62, 0xf1, 0x74, 0x58, 0x58, 0x42, 0x01])
        .unwrap();
    match &insn.operands[2] {
        Operand::Memory(m) => assert_eq!(m.displacement, 4),
        other => panic!("expected memory, got {other:?}"),
    }
}

#[test]
fn evex_rounding_control_register_form() {
    // EVEX.b with a register ModR/M: L'L turns into the rounding mode and
    // the operands widen to 512 bits.
    let insn = long().decode(&[0x62, 0xf1, 0x74, 0x18, 0x58, 0xc2]).unwrap();
    assert_eq!(insn.avx.rounding, Some(RoundingMode::NearestEven));
    assert_eq!(insn.operands[0], Operand::reg(Register::vector(0, 512)));

    let insn = long().decode(&[0x62, 0xf1, 0x74, 0x78, 0x58, 0xc2]).unwrap();
    assert_eq!(insn.avx.rounding, Some(RoundingMode::TowardZero));
}

#[test]
fn evex_reserved_bits_reject() {
    let err = long()
        .decode(&[0x62, 0xf5, 0x74, 0x48, 0x58, 0xc2])
        .unwrap_err();
    assert!(matches!(err, DecodeError::InvalidPrefixEncoding { .. }));
}

#[test]
fn vsib_gather() {
    // vgatherdps xmm0 {k1}, [rax+xmm1*1]
    let insn = long()
        .decode(&[0x62, 0xf2, 0x7d, 0x09, 0x92, 0x04, 0x08])
        .unwrap();
    assert_eq!(insn.mnemonic, "vgatherdps");
    assert_eq!(insn.avx.mask, Some(Register::mask(1)));
    match &insn.operands[1] {
        Operand::Memory(m) => {
            assert_eq!(m.base, Some(Register::gpr(0, 64)));
            assert_eq!(m.index, Some(Register::vector(1, 128)));
            assert_eq!(m.scale, 1);
        }
        other => panic!("expected memory, got {other:?}"),
    }
}

#[test]
fn xop_map_dispatch() {
    // blcfill eax, ebx (XOP map 9, /1, writes through vvvv).
    let insn = long().decode(&[0x8f, 0xe9, 0x78, 0x01, 0xcb]).unwrap();
    assert_eq!(insn.mnemonic, "blcfill");
    assert_eq!(
        insn.operands,
        vec![
            Operand::reg(Register::gpr(0, 32)),
            Operand::reg(Register::gpr(3, 32)),
        ]
    );

    // 8F with a map field below 8 is not XOP; this table leaves POP r/m
    // undefined, so the walk reaches the sentinel instead of a bogus match.
    assert!(matches!(
        long().decode(&[0x8f, 0xc0]).unwrap_err(),
        DecodeError::UnrecognizedInstruction { .. }
    ));
}

#[test]
fn segment_override_applies_to_memory() {
    let insn = long().decode(&[0x65, 0x48, 0x8b, 0x03]).unwrap();
    match &insn.operands[1] {
        Operand::Memory(m) => assert_eq!(m.segment, Register::segment(seg::GS)),
        other => panic!("expected memory, got {other:?}"),
    }
}

#[test]
fn unsupported_mode_pairings_are_rejected() {
    assert!(Decoder::new(MachineMode::Real16, StackWidth::Width32).is_err());
    assert!(Decoder::new(MachineMode::Long64, StackWidth::Width16).is_err());
    assert!(Decoder::new(MachineMode::Legacy32, StackWidth::Width16).is_ok());
    assert!(Decoder::new(MachineMode::Legacy32, StackWidth::Width32).is_ok());
}

#[test]
fn decode_all_walks_a_function_body() {
    // push rbp; mov rbp, rsp; sub rsp, 0x20; pop rbp; ret
    let bytes = [
        0x55, 0x48, 0x89, 0xe5, 0x48, 0x83, 0xec, 0x20, 0x5d, 0xc3,
    ];
    let decoded: Vec<_> = long()
        .decode_all(&bytes)
        .map(|(off, res)| (off, res.unwrap().mnemonic))
        .collect();
    assert_eq!(
        decoded,
        vec![
            (0, "push".to_string()),
            (1, "mov".to_string()),
            (4, "sub".to_string()),
            (8, "pop".to_string()),
            (9, "ret".to_string()),
        ]
    );
}
