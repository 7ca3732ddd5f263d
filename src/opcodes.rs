//! The 256-entry opcode table driving both decode/dispatch in `cpu.rs` and
//! disassembly in `profiler.rs`. Grounded on `original_source/src/sim65.c`'s
//! `next()` switch and its `print_curr_ins` disassembly tables (which name
//! every byte, official and not). Flat table + match is the idiomatic
//! 6502 approach (`sim65.c` itself is a `switch (ins)` over the full byte),
//! unlike the bit-pattern "specificity" decoder the teacher crate used for
//! the 68000's far larger instruction space.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddrMode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    Indirect,
    IndirectX,
    IndirectY,
    Relative,
}

impl AddrMode {
    pub fn operand_len(self) -> u16 {
        use AddrMode::*;
        match self {
            Implied | Accumulator => 0,
            Immediate | ZeroPage | ZeroPageX | ZeroPageY | IndirectX | IndirectY | Relative => 1,
            Absolute | AbsoluteX | AbsoluteY | Indirect => 2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum Mnemonic {
    ADC, AND, ASL, BCC, BCS, BEQ, BIT, BMI, BNE, BPL, BRK, BVC, BVS, CLC, CLD,
    CLI, CLV, CMP, CPX, CPY, DEC, DEX, DEY, EOR, INC, INX, INY, JMP, JSR, LDA,
    LDX, LDY, LSR, NOP, ORA, PHA, PHP, PLA, PLP, ROL, ROR, RTI, RTS, SBC, SEC,
    SED, SEI, STA, STX, STY, TAX, TAY, TSX, TXA, TXS, TYA,
    /// An undocumented opcode known to behave as a no-op of its decoded
    /// length (the "no-op class explicitly enumerated" §4.B allows).
    XNop,
    /// An undocumented opcode with real side effects this simulator does
    /// not implement (non-goal: "undocumented-opcode fidelity beyond
    /// NOP-like decoding"). Executing one raises `InvalidIns`.
    Illegal,
}

#[derive(Clone, Copy, Debug)]
pub struct OpcodeInfo {
    pub mnemonic: Mnemonic,
    pub mode: AddrMode,
    pub cycles: u8,
    /// Whether this is one of the read-class addressing modes that takes
    /// +1 cycle when the effective address crosses a page boundary.
    pub page_penalty: bool,
    pub documented: bool,
    /// Lowercase mnemonic text for undocumented opcodes, used only by the
    /// disassembler (§4.G).
    pub undoc_name: Option<&'static str>,
}

macro_rules! op {
    (nop, $mode:ident, $c:expr) => {
        OpcodeInfo { mnemonic: Mnemonic::XNop, mode: AddrMode::$mode, cycles: $c, page_penalty: false, documented: false, undoc_name: Some("nop") }
    };
    (illegal, $name:expr, $mode:ident, $c:expr) => {
        OpcodeInfo { mnemonic: Mnemonic::Illegal, mode: AddrMode::$mode, cycles: $c, page_penalty: false, documented: false, undoc_name: Some($name) }
    };
    (illegal, $name:expr, $mode:ident, $c:expr, pp) => {
        OpcodeInfo { mnemonic: Mnemonic::Illegal, mode: AddrMode::$mode, cycles: $c, page_penalty: true, documented: false, undoc_name: Some($name) }
    };
    ($m:ident, $mode:ident, $c:expr) => {
        OpcodeInfo { mnemonic: Mnemonic::$m, mode: AddrMode::$mode, cycles: $c, page_penalty: false, documented: true, undoc_name: None }
    };
    ($m:ident, $mode:ident, $c:expr, pp) => {
        OpcodeInfo { mnemonic: Mnemonic::$m, mode: AddrMode::$mode, cycles: $c, page_penalty: true, documented: true, undoc_name: None }
    };
}

pub const OPCODES: [OpcodeInfo; 256] = [
    /* 00 */ op!(BRK, Implied, 7),
    /* 01 */ op!(ORA, IndirectX, 6),
    /* 02 */ op!(illegal, "kil", Implied, 2),
    /* 03 */ op!(illegal, "slo", IndirectX, 8),
    /* 04 */ op!(nop, ZeroPage, 3),
    /* 05 */ op!(ORA, ZeroPage, 3),
    /* 06 */ op!(ASL, ZeroPage, 5),
    /* 07 */ op!(illegal, "slo", ZeroPage, 5),
    /* 08 */ op!(PHP, Implied, 3),
    /* 09 */ op!(ORA, Immediate, 2),
    /* 0A */ op!(ASL, Accumulator, 2),
    /* 0B */ op!(illegal, "anc", Immediate, 2),
    /* 0C */ op!(nop, Absolute, 4),
    /* 0D */ op!(ORA, Absolute, 4),
    /* 0E */ op!(ASL, Absolute, 6),
    /* 0F */ op!(illegal, "slo", Absolute, 6),

    /* 10 */ op!(BPL, Relative, 2),
    /* 11 */ op!(ORA, IndirectY, 5, pp),
    /* 12 */ op!(illegal, "kil", Implied, 2),
    /* 13 */ op!(illegal, "slo", IndirectY, 8),
    /* 14 */ op!(nop, ZeroPageX, 4),
    /* 15 */ op!(ORA, ZeroPageX, 4),
    /* 16 */ op!(ASL, ZeroPageX, 6),
    /* 17 */ op!(illegal, "slo", ZeroPageX, 6),
    /* 18 */ op!(CLC, Implied, 2),
    /* 19 */ op!(ORA, AbsoluteY, 4, pp),
    /* 1A */ op!(nop, Implied, 2),
    /* 1B */ op!(illegal, "slo", AbsoluteY, 7),
    /* 1C */ op!(nop, AbsoluteX, 4),
    /* 1D */ op!(ORA, AbsoluteX, 4, pp),
    /* 1E */ op!(ASL, AbsoluteX, 7),
    /* 1F */ op!(illegal, "slo", AbsoluteX, 7),

    /* 20 */ op!(JSR, Absolute, 6),
    /* 21 */ op!(AND, IndirectX, 6),
    /* 22 */ op!(illegal, "kil", Implied, 2),
    /* 23 */ op!(illegal, "rla", IndirectX, 8),
    /* 24 */ op!(BIT, ZeroPage, 3),
    /* 25 */ op!(AND, ZeroPage, 3),
    /* 26 */ op!(ROL, ZeroPage, 5),
    /* 27 */ op!(illegal, "rla", ZeroPage, 5),
    /* 28 */ op!(PLP, Implied, 4),
    /* 29 */ op!(AND, Immediate, 2),
    /* 2A */ op!(ROL, Accumulator, 2),
    /* 2B */ op!(illegal, "anc", Immediate, 2),
    /* 2C */ op!(BIT, Absolute, 4),
    /* 2D */ op!(AND, Absolute, 4),
    /* 2E */ op!(ROL, Absolute, 6),
    /* 2F */ op!(illegal, "rla", Absolute, 6),

    /* 30 */ op!(BMI, Relative, 2),
    /* 31 */ op!(AND, IndirectY, 5, pp),
    /* 32 */ op!(illegal, "kil", Implied, 2),
    /* 33 */ op!(illegal, "rla", IndirectY, 8),
    /* 34 */ op!(nop, ZeroPageX, 4),
    /* 35 */ op!(AND, ZeroPageX, 4),
    /* 36 */ op!(ROL, ZeroPageX, 6),
    /* 37 */ op!(illegal, "rla", ZeroPageX, 6),
    /* 38 */ op!(SEC, Implied, 2),
    /* 39 */ op!(AND, AbsoluteY, 4, pp),
    /* 3A */ op!(nop, Implied, 2),
    /* 3B */ op!(illegal, "rla", AbsoluteY, 7),
    /* 3C */ op!(nop, AbsoluteX, 4),
    /* 3D */ op!(AND, AbsoluteX, 4, pp),
    /* 3E */ op!(ROL, AbsoluteX, 7),
    /* 3F */ op!(illegal, "rla", AbsoluteX, 7),

    /* 40 */ op!(RTI, Implied, 6),
    /* 41 */ op!(EOR, IndirectX, 6),
    /* 42 */ op!(illegal, "kil", Implied, 2),
    /* 43 */ op!(illegal, "sre", IndirectX, 8),
    /* 44 */ op!(nop, ZeroPage, 3),
    /* 45 */ op!(EOR, ZeroPage, 3),
    /* 46 */ op!(LSR, ZeroPage, 5),
    /* 47 */ op!(illegal, "sre", ZeroPage, 5),
    /* 48 */ op!(PHA, Implied, 3),
    /* 49 */ op!(EOR, Immediate, 2),
    /* 4A */ op!(LSR, Accumulator, 2),
    /* 4B */ op!(illegal, "alr", Immediate, 2),
    /* 4C */ op!(JMP, Absolute, 3),
    /* 4D */ op!(EOR, Absolute, 4),
    /* 4E */ op!(LSR, Absolute, 6),
    /* 4F */ op!(illegal, "sre", Absolute, 6),

    /* 50 */ op!(BVC, Relative, 2),
    /* 51 */ op!(EOR, IndirectY, 5, pp),
    /* 52 */ op!(illegal, "kil", Implied, 2),
    /* 53 */ op!(illegal, "sre", IndirectY, 8),
    /* 54 */ op!(nop, ZeroPageX, 4),
    /* 55 */ op!(EOR, ZeroPageX, 4),
    /* 56 */ op!(LSR, ZeroPageX, 6),
    /* 57 */ op!(illegal, "sre", ZeroPageX, 6),
    /* 58 */ op!(CLI, Implied, 2),
    /* 59 */ op!(EOR, AbsoluteY, 4, pp),
    /* 5A */ op!(nop, Implied, 2),
    /* 5B */ op!(illegal, "sre", AbsoluteY, 7),
    /* 5C */ op!(nop, AbsoluteX, 4),
    /* 5D */ op!(EOR, AbsoluteX, 4, pp),
    /* 5E */ op!(LSR, AbsoluteX, 7),
    /* 5F */ op!(illegal, "sre", AbsoluteX, 7),

    /* 60 */ op!(RTS, Implied, 6),
    /* 61 */ op!(ADC, IndirectX, 6),
    /* 62 */ op!(illegal, "kil", Implied, 2),
    /* 63 */ op!(illegal, "rra", IndirectX, 8),
    /* 64 */ op!(nop, ZeroPage, 3),
    /* 65 */ op!(ADC, ZeroPage, 3),
    /* 66 */ op!(ROR, ZeroPage, 5),
    /* 67 */ op!(illegal, "rra", ZeroPage, 5),
    /* 68 */ op!(PLA, Implied, 4),
    /* 69 */ op!(ADC, Immediate, 2),
    /* 6A */ op!(ROR, Accumulator, 2),
    /* 6B */ op!(illegal, "arr", Immediate, 2),
    /* 6C */ op!(JMP, Indirect, 5),
    /* 6D */ op!(ADC, Absolute, 4),
    /* 6E */ op!(ROR, Absolute, 6),
    /* 6F */ op!(illegal, "rra", Absolute, 6),

    /* 70 */ op!(BVS, Relative, 2),
    /* 71 */ op!(ADC, IndirectY, 5, pp),
    /* 72 */ op!(illegal, "kil", Implied, 2),
    /* 73 */ op!(illegal, "rra", IndirectY, 8),
    /* 74 */ op!(nop, ZeroPageX, 4),
    /* 75 */ op!(ADC, ZeroPageX, 4),
    /* 76 */ op!(ROR, ZeroPageX, 6),
    /* 77 */ op!(illegal, "rra", ZeroPageX, 6),
    /* 78 */ op!(SEI, Implied, 2),
    /* 79 */ op!(ADC, AbsoluteY, 4, pp),
    /* 7A */ op!(nop, Implied, 2),
    /* 7B */ op!(illegal, "rra", AbsoluteY, 7),
    /* 7C */ op!(nop, AbsoluteX, 4),
    /* 7D */ op!(ADC, AbsoluteX, 4, pp),
    /* 7E */ op!(ROR, AbsoluteX, 7),
    /* 7F */ op!(illegal, "rra", AbsoluteX, 7),

    /* 80 */ op!(nop, Immediate, 2),
    /* 81 */ op!(STA, IndirectX, 6),
    /* 82 */ op!(nop, Immediate, 2),
    /* 83 */ op!(illegal, "sax", IndirectX, 6),
    /* 84 */ op!(STY, ZeroPage, 3),
    /* 85 */ op!(STA, ZeroPage, 3),
    /* 86 */ op!(STX, ZeroPage, 3),
    /* 87 */ op!(illegal, "sax", ZeroPage, 3),
    /* 88 */ op!(DEY, Implied, 2),
    /* 89 */ op!(nop, Immediate, 2),
    /* 8A */ op!(TXA, Implied, 2),
    /* 8B */ op!(illegal, "xaa", Immediate, 2),
    /* 8C */ op!(STY, Absolute, 4),
    /* 8D */ op!(STA, Absolute, 4),
    /* 8E */ op!(STX, Absolute, 4),
    /* 8F */ op!(illegal, "sax", Absolute, 4),

    /* 90 */ op!(BCC, Relative, 2),
    /* 91 */ op!(STA, IndirectY, 6),
    /* 92 */ op!(illegal, "kil", Implied, 2),
    /* 93 */ op!(illegal, "ahx", IndirectY, 6),
    /* 94 */ op!(STY, ZeroPageX, 4),
    /* 95 */ op!(STA, ZeroPageX, 4),
    /* 96 */ op!(STX, ZeroPageY, 4),
    /* 97 */ op!(illegal, "sax", ZeroPageY, 4),
    /* 98 */ op!(TYA, Implied, 2),
    /* 99 */ op!(STA, AbsoluteY, 5),
    /* 9A */ op!(TXS, Implied, 2),
    /* 9B */ op!(illegal, "tas", AbsoluteY, 5),
    /* 9C */ op!(illegal, "shy", AbsoluteX, 5),
    /* 9D */ op!(STA, AbsoluteX, 5),
    /* 9E */ op!(illegal, "shx", AbsoluteY, 5),
    /* 9F */ op!(illegal, "ahx", AbsoluteY, 5),

    /* A0 */ op!(LDY, Immediate, 2),
    /* A1 */ op!(LDA, IndirectX, 6),
    /* A2 */ op!(LDX, Immediate, 2),
    /* A3 */ op!(illegal, "lax", IndirectX, 6),
    /* A4 */ op!(LDY, ZeroPage, 3),
    /* A5 */ op!(LDA, ZeroPage, 3),
    /* A6 */ op!(LDX, ZeroPage, 3),
    /* A7 */ op!(illegal, "lax", ZeroPage, 3),
    /* A8 */ op!(TAY, Implied, 2),
    /* A9 */ op!(LDA, Immediate, 2),
    /* AA */ op!(TAX, Implied, 2),
    /* AB */ op!(illegal, "lax", Immediate, 2),
    /* AC */ op!(LDY, Absolute, 4),
    /* AD */ op!(LDA, Absolute, 4),
    /* AE */ op!(LDX, Absolute, 4),
    /* AF */ op!(illegal, "lax", Absolute, 4),

    /* B0 */ op!(BCS, Relative, 2),
    /* B1 */ op!(LDA, IndirectY, 5, pp),
    /* B2 */ op!(illegal, "kil", Implied, 2),
    /* B3 */ op!(illegal, "lax", IndirectY, 5, pp),
    /* B4 */ op!(LDY, ZeroPageX, 4),
    /* B5 */ op!(LDA, ZeroPageX, 4),
    /* B6 */ op!(LDX, ZeroPageY, 4),
    /* B7 */ op!(illegal, "lax", ZeroPageY, 4),
    /* B8 */ op!(CLV, Implied, 2),
    /* B9 */ op!(LDA, AbsoluteY, 4, pp),
    /* BA */ op!(TSX, Implied, 2),
    /* BB */ op!(illegal, "las", AbsoluteY, 4, pp),
    /* BC */ op!(LDY, AbsoluteX, 4, pp),
    /* BD */ op!(LDA, AbsoluteX, 4, pp),
    /* BE */ op!(LDX, AbsoluteY, 4, pp),
    /* BF */ op!(illegal, "lax", AbsoluteY, 4, pp),

    /* C0 */ op!(CPY, Immediate, 2),
    /* C1 */ op!(CMP, IndirectX, 6),
    /* C2 */ op!(nop, Immediate, 2),
    /* C3 */ op!(illegal, "dcp", IndirectX, 8),
    /* C4 */ op!(CPY, ZeroPage, 3),
    /* C5 */ op!(CMP, ZeroPage, 3),
    /* C6 */ op!(DEC, ZeroPage, 5),
    /* C7 */ op!(illegal, "dcp", ZeroPage, 5),
    /* C8 */ op!(INY, Implied, 2),
    /* C9 */ op!(CMP, Immediate, 2),
    /* CA */ op!(DEX, Implied, 2),
    /* CB */ op!(illegal, "axs", Immediate, 2),
    /* CC */ op!(CPY, Absolute, 4),
    /* CD */ op!(CMP, Absolute, 4),
    /* CE */ op!(DEC, Absolute, 6),
    /* CF */ op!(illegal, "dcp", Absolute, 6),

    /* D0 */ op!(BNE, Relative, 2),
    /* D1 */ op!(CMP, IndirectY, 5, pp),
    /* D2 */ op!(illegal, "kil", Implied, 2),
    /* D3 */ op!(illegal, "dcp", IndirectY, 8),
    /* D4 */ op!(nop, ZeroPageX, 4),
    /* D5 */ op!(CMP, ZeroPageX, 4),
    /* D6 */ op!(DEC, ZeroPageX, 6),
    /* D7 */ op!(illegal, "dcp", ZeroPageX, 6),
    /* D8 */ op!(CLD, Implied, 2),
    /* D9 */ op!(CMP, AbsoluteY, 4, pp),
    /* DA */ op!(nop, Implied, 2),
    /* DB */ op!(illegal, "dcp", AbsoluteY, 7),
    /* DC */ op!(nop, AbsoluteX, 4),
    /* DD */ op!(CMP, AbsoluteX, 4, pp),
    /* DE */ op!(DEC, AbsoluteX, 7),
    /* DF */ op!(illegal, "dcp", AbsoluteX, 7),

    /* E0 */ op!(CPX, Immediate, 2),
    /* E1 */ op!(SBC, IndirectX, 6),
    /* E2 */ op!(nop, Immediate, 2),
    /* E3 */ op!(illegal, "isc", IndirectX, 8),
    /* E4 */ op!(CPX, ZeroPage, 3),
    /* E5 */ op!(SBC, ZeroPage, 3),
    /* E6 */ op!(INC, ZeroPage, 5),
    /* E7 */ op!(illegal, "isc", ZeroPage, 5),
    /* E8 */ op!(INX, Implied, 2),
    /* E9 */ op!(SBC, Immediate, 2),
    /* EA */ op!(NOP, Implied, 2),
    /* EB */ op!(nop, Immediate, 2),
    /* EC */ op!(CPX, Absolute, 4),
    /* ED */ op!(SBC, Absolute, 4),
    /* EE */ op!(INC, Absolute, 6),
    /* EF */ op!(illegal, "isc", Absolute, 6),

    /* F0 */ op!(BEQ, Relative, 2),
    /* F1 */ op!(SBC, IndirectY, 5, pp),
    /* F2 */ op!(illegal, "kil", Implied, 2),
    /* F3 */ op!(illegal, "isc", IndirectY, 8),
    /* F4 */ op!(nop, ZeroPageX, 4),
    /* F5 */ op!(SBC, ZeroPageX, 4),
    /* F6 */ op!(INC, ZeroPageX, 6),
    /* F7 */ op!(illegal, "isc", ZeroPageX, 6),
    /* F8 */ op!(SED, Implied, 2),
    /* F9 */ op!(SBC, AbsoluteY, 4, pp),
    /* FA */ op!(nop, Implied, 2),
    /* FB */ op!(illegal, "isc", AbsoluteY, 7),
    /* FC */ op!(nop, AbsoluteX, 4),
    /* FD */ op!(SBC, AbsoluteX, 4, pp),
    /* FE */ op!(INC, AbsoluteX, 7),
    /* FF */ op!(illegal, "isc", AbsoluteX, 7),
];

pub fn mnemonic_text(info: &OpcodeInfo) -> String {
    if info.documented {
        format!("{:?}", info.mnemonic).to_uppercase()
    } else {
        info.undoc_name.unwrap_or("???").to_string()
    }
}
