/// The instruction set (`spec.md` §4.6, §6), assigned stable numeric
/// identifiers in the order listed there. Operand widths: 1 byte for
/// local/upvalue/constant/argcount indices, 2 bytes big-endian for jump
/// offsets; `CLOSURE` additionally carries a trailing variable-length table
/// of `(is_local: u8, index: u8)` pairs sized by the function's upvalue
/// count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    Constant = 0,
    Nil = 1,
    True = 2,
    False = 3,
    Pop = 4,
    GetLocal = 5,
    SetLocal = 6,
    GetGlobal = 7,
    SetGlobal = 8,
    DefineGlobal = 9,
    GetUpvalue = 10,
    SetUpvalue = 11,
    GetProperty = 12,
    SetProperty = 13,
    GetSuper = 14,
    Equal = 15,
    Greater = 16,
    Less = 17,
    Add = 18,
    Subtract = 19,
    Multiply = 20,
    Divide = 21,
    Not = 22,
    Negate = 23,
    Print = 24,
    Jump = 25,
    JumpIfFalse = 26,
    Loop = 27,
    Call = 28,
    Invoke = 29,
    SuperInvoke = 30,
    Closure = 31,
    CloseUpvalue = 32,
    Return = 33,
    Class = 34,
    Inherit = 35,
    Method = 36,
    BuildList = 37,
    IndexSubscr = 38,
    StoreSubscr = 39,
}

impl OpCode {
    pub const COUNT: u8 = 40;
}

#[derive(Debug, thiserror::Error)]
#[error("invalid opcode byte {0}")]
pub struct InvalidOpcode(pub u8);

impl TryFrom<u8> for OpCode {
    type Error = InvalidOpcode;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        use OpCode::*;
        Ok(match byte {
            0 => Constant,
            1 => Nil,
            2 => True,
            3 => False,
            4 => Pop,
            5 => GetLocal,
            6 => SetLocal,
            7 => GetGlobal,
            8 => SetGlobal,
            9 => DefineGlobal,
            10 => GetUpvalue,
            11 => SetUpvalue,
            12 => GetProperty,
            13 => SetProperty,
            14 => GetSuper,
            15 => Equal,
            16 => Greater,
            17 => Less,
            18 => Add,
            19 => Subtract,
            20 => Multiply,
            21 => Divide,
            22 => Not,
            23 => Negate,
            24 => Print,
            25 => Jump,
            26 => JumpIfFalse,
            27 => Loop,
            28 => Call,
            29 => Invoke,
            30 => SuperInvoke,
            31 => Closure,
            32 => CloseUpvalue,
            33 => Return,
            34 => Class,
            35 => Inherit,
            36 => Method,
            37 => BuildList,
            38 => IndexSubscr,
            39 => StoreSubscr,
            other => return Err(InvalidOpcode(other)),
        })
    }
}
