//! Display-list register writes.
//!
//! A BP write is `0x61` followed by one word whose top byte is the
//! register number and whose low 24 bits are the value. An XF write is
//! `0x10`, a u16 holding the word count minus one, a u16 start address,
//! then the words.

use crate::binary::Out;

pub const LOAD_BP_REG: u8 = 0x61;
pub const LOAD_XF_REG: u8 = 0x10;

/// BP register numbers.
pub mod reg {
    pub const GEN_MODE: u8 = 0x00;
    pub const IND_MTXA0: u8 = 0x06;
    pub const IND_MTXB0: u8 = 0x07;
    pub const IND_MTXC0: u8 = 0x08;
    pub const IND_CMD0: u8 = 0x10;
    pub const RAS1_SS0: u8 = 0x25;
    pub const RAS1_SS1: u8 = 0x26;
    pub const RAS1_IREF: u8 = 0x27;
    pub const RAS1_TREF0: u8 = 0x28;
    pub const SU_SSIZE0: u8 = 0x30;
    pub const SU_TSIZE0: u8 = 0x31;
    pub const PE_ZMODE: u8 = 0x40;
    pub const PE_CMODE0: u8 = 0x41;
    pub const PE_CMODE1: u8 = 0x42;
    pub const PE_CONTROL: u8 = 0x43;
    pub const TX_LOADTLUT0: u8 = 0x64;
    pub const TX_LOADTLUT1: u8 = 0x65;
    pub const TEV_COLOR_ENV0: u8 = 0xC0;
    pub const TEV_ALPHA_ENV0: u8 = 0xC1;
    pub const TEV_REGISTERL0: u8 = 0xE0;
    pub const TEV_REGISTERH0: u8 = 0xE1;
    pub const TEV_FOG_PARAM0: u8 = 0xEE;
    pub const TEV_FOG_PARAM1: u8 = 0xEF;
    pub const TEV_FOG_PARAM2: u8 = 0xF0;
    pub const TEV_FOG_PARAM3: u8 = 0xF1;
    pub const TEV_FOG_COLOR: u8 = 0xF2;
    pub const TEV_ALPHAFUNC: u8 = 0xF3;
    pub const TEV_KSEL0: u8 = 0xF6;
    pub const BP_MASK: u8 = 0xFE;

    const TEX_BANK: [u8; 8] = [0x00, 0x01, 0x02, 0x03, 0x20, 0x21, 0x22, 0x23];

    /// Per texture-unit registers live in two banks of four.
    pub fn tx_setmode0(unit: usize) -> u8 { 0x80 + TEX_BANK[unit] }
    pub fn tx_setmode1(unit: usize) -> u8 { 0x84 + TEX_BANK[unit] }
    pub fn tx_setimage0(unit: usize) -> u8 { 0x88 + TEX_BANK[unit] }
    pub fn tx_setimage3(unit: usize) -> u8 { 0x94 + TEX_BANK[unit] }
    pub fn tx_settlut(unit: usize) -> u8 { 0x98 + TEX_BANK[unit] }
}

/// XF register addresses.
pub mod xf {
    pub const LIGHT0: u16 = 0x0600;
    pub const LIGHT_STRIDE: u16 = 0x10;
    pub const NUM_COLORS: u16 = 0x1009;
    pub const AMBIENT0: u16 = 0x100A;
    pub const MATERIAL0: u16 = 0x100C;
    pub const COLOR0_CONTROL: u16 = 0x100E;
    pub const ALPHA0_CONTROL: u16 = 0x1010;
    pub const DUAL_TEX: u16 = 0x1012;
    pub const NUM_TEXGENS: u16 = 0x103F;
    pub const TEXGEN0: u16 = 0x1040;
    pub const POST_TEXGEN0: u16 = 0x1050;

    /// Address of texture matrix memory for a texgen matrix slot value.
    pub fn matrix_address(slot: u8) -> u16 {
        slot as u16 * 4
    }
}

pub fn write_bp(out: &mut Out, reg: u8, value: u32) {
    out.write_bytes(&[LOAD_BP_REG]);
    out.write_bytes(&(((reg as u32) << 24) | (value & 0x00FF_FFFF)).to_be_bytes());
}

/// Restricts the next BP write to the bits in `mask`.
pub fn write_bp_mask(out: &mut Out, mask: u32) {
    write_bp(out, reg::BP_MASK, mask)
}

pub fn write_xf(out: &mut Out, address: u16, words: &[u32]) {
    debug_assert!(!words.is_empty() && words.len() <= 0x10000);
    out.write_bytes(&[LOAD_XF_REG]);
    out.write_bytes(&((words.len() - 1) as u16).to_be_bytes());
    out.write_bytes(&address.to_be_bytes());
    for w in words {
        out.write_bytes(&w.to_be_bytes());
    }
}

pub fn write_xf_f32(out: &mut Out, address: u16, values: &[f32]) {
    let words: Vec<u32> = values.iter().map(|x| x.to_bits()).collect();
    write_xf(out, address, &words)
}

/// Parsed form of one display-list command, used to inspect what was
/// built.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Bp { reg: u8, value: u32 },
    Xf { address: u16, words: Vec<u32> },
    Nop,
}

/// Splits a display list into commands. Returns `None` on an unknown
/// opcode or truncated command.
pub fn parse_commands(mut bytes: &[u8]) -> Option<Vec<Command>> {
    let mut cmds = vec![];
    while let Some((&op, rest)) = bytes.split_first() {
        match op {
            0x00 => {
                cmds.push(Command::Nop);
                bytes = rest;
            }
            LOAD_BP_REG => {
                if rest.len() < 4 { return None; }
                let word = u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]);
                cmds.push(Command::Bp { reg: (word >> 24) as u8, value: word & 0xFF_FFFF });
                bytes = &rest[4..];
            }
            LOAD_XF_REG => {
                if rest.len() < 4 { return None; }
                let count = u16::from_be_bytes([rest[0], rest[1]]) as usize + 1;
                let address = u16::from_be_bytes([rest[2], rest[3]]);
                let rest = &rest[4..];
                if rest.len() < 4 * count { return None; }
                let words = rest[..4 * count].chunks(4)
                    .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
                    .collect();
                cmds.push(Command::Xf { address, words });
                bytes = &rest[4 * count..];
            }
            _ => return None,
        }
    }
    Some(cmds)
}

#[test]
fn test() {
    let mut out = Out::new();
    write_bp(&mut out, reg::tx_setmode0(5), 0x123456);
    write_xf(&mut out, xf::NUM_TEXGENS, &[2]);
    assert_eq!(out.bytes(), &[
        0x61, 0xA1, 0x12, 0x34, 0x56,
        0x10, 0x00, 0x00, 0x10, 0x3F, 0, 0, 0, 2,
    ]);
    let cmds = parse_commands(out.bytes()).unwrap();
    assert_eq!(cmds, vec![
        Command::Bp { reg: 0xA1, value: 0x123456 },
        Command::Xf { address: 0x103F, words: vec![2] },
    ]);
    assert_eq!(parse_commands(&[0x61, 0]), None);
}
