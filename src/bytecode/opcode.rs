/// Opcodes for the VM

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    // Loads
    LoadConstant = 0x00,  // Reserved, no contract yet
    LoadNull = 0x01,      // Push null
    LoadBoolean = 0x02,   // Push boolean literal (1 operand)
    LoadIntval = 0x03,    // Push integer literal (1 operand)
    LoadFloatval = 0x04,  // Push float literal (1 operand)
    LoadStringval = 0x05, // Push interpolated string (1 operand)
    LoadVar = 0x06,       // Push variable (slot, name)
    LoadFunction = 0x07,  // Push compiled function (1 operand)
    LoadList = 0x08,      // Bundle n values into a list (1 operand)
    LoadArray = 0x09,     // Bundle n values into an array (1 operand)
    LoadMember = 0x0A,    // Index into a container

    // Stores and stack manipulation
    StoreMember = 0x10,   // Write into a container
    Assign = 0x11,        // Bind top value to variable (slot, name)
    DiscardTop = 0x12,    // Drop top value
    Dup = 0x13,           // Duplicate top value

    // Control flow
    Jump = 0x20,          // Unconditional jump (1 operand)
    JumpIfFalse = 0x21,   // Jump if top value is falsy (1 operand)
    Return = 0x22,        // Leave the current program
    Call = 0x23,          // Invoke callee with argument list

    // IO operations
    Print = 0x30,         // Print top value

    // Comparison and logic
    Eq = 0x40,
    Gt = 0x41,
    Ge = 0x42,
    Lt = 0x43,
    Le = 0x44,
    And = 0x45,
    Or = 0x46,

    // Arithmetic
    Add = 0x50,
    Sub = 0x51,
    Mul = 0x52,
    Div = 0x53,
    Mod = 0x54,           // Reserved, no contract yet

    // Unary
    Not = 0x60,
    Incr = 0x61,
    Decr = 0x62,
}

/// Every opcode with its mnemonic, in byte order.
pub const OPCODE_TABLE: &[(OpCode, &str)] = &[
    (OpCode::LoadConstant, "LOAD_CONSTANT"),
    (OpCode::LoadNull, "LOAD_NULL"),
    (OpCode::LoadBoolean, "LOAD_BOOLEAN"),
    (OpCode::LoadIntval, "LOAD_INTVAL"),
    (OpCode::LoadFloatval, "LOAD_FLOATVAL"),
    (OpCode::LoadStringval, "LOAD_STRINGVAL"),
    (OpCode::LoadVar, "LOAD_VAR"),
    (OpCode::LoadFunction, "LOAD_FUNCTION"),
    (OpCode::LoadList, "LOAD_LIST"),
    (OpCode::LoadArray, "LOAD_ARRAY"),
    (OpCode::LoadMember, "LOAD_MEMBER"),
    (OpCode::StoreMember, "STORE_MEMBER"),
    (OpCode::Assign, "ASSIGN"),
    (OpCode::DiscardTop, "DISCARD_TOP"),
    (OpCode::Dup, "DUP"),
    (OpCode::Jump, "JUMP"),
    (OpCode::JumpIfFalse, "JUMP_IF_FALSE"),
    (OpCode::Return, "RETURN"),
    (OpCode::Call, "CALL"),
    (OpCode::Print, "PRINT"),
    (OpCode::Eq, "EQ"),
    (OpCode::Gt, "GT"),
    (OpCode::Ge, "GE"),
    (OpCode::Lt, "LT"),
    (OpCode::Le, "LE"),
    (OpCode::And, "AND"),
    (OpCode::Or, "OR"),
    (OpCode::Add, "ADD"),
    (OpCode::Sub, "SUB"),
    (OpCode::Mul, "MUL"),
    (OpCode::Div, "DIV"),
    (OpCode::Mod, "MOD"),
    (OpCode::Not, "NOT"),
    (OpCode::Incr, "INCR"),
    (OpCode::Decr, "DECR"),
];

impl OpCode {
    /// Convert a byte to an opcode
    pub fn from_byte(byte: u8) -> Option<Self> {
        OPCODE_TABLE
            .iter()
            .find(|(opcode, _)| *opcode as u8 == byte)
            .map(|(opcode, _)| *opcode)
    }

    /// Look up an opcode by its mnemonic
    pub fn from_name(name: &str) -> Option<Self> {
        OPCODE_TABLE
            .iter()
            .find(|(_, mnemonic)| *mnemonic == name)
            .map(|(opcode, _)| *opcode)
    }

    /// Convert an opcode to a byte
    pub fn to_byte(&self) -> u8 {
        *self as u8
    }

    /// The mnemonic used in disassembly and diagnostics
    pub fn name(&self) -> &'static str {
        OPCODE_TABLE
            .iter()
            .find(|(opcode, _)| opcode == self)
            .map(|(_, mnemonic)| *mnemonic)
            .unwrap_or("UNKNOWN")
    }

    /// Whether the opcode decides the next program counter itself
    pub fn is_control_transfer(&self) -> bool {
        matches!(self, OpCode::Jump | OpCode::JumpIfFalse)
    }

    /// Reserved opcodes fault when reached
    pub fn is_reserved(&self) -> bool {
        matches!(self, OpCode::LoadConstant | OpCode::Mod)
    }
}

impl TryFrom<u8> for OpCode {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        OpCode::from_byte(byte).ok_or(byte)
    }
}

impl From<OpCode> for u8 {
    fn from(opcode: OpCode) -> Self {
        opcode.to_byte()
    }
}
