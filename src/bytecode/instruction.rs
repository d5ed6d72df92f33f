use std::fmt;
use std::sync::Arc;
use crate::bytecode::{FunctionCode, OpCode, StringTemplate};

/// A single bytecode instruction with its compile-time operands
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Runs against the frame, then execution continues at pc + 1
    Op(Op),
    /// Decides the next program counter
    Branch(Branch),
    /// Ends the current program, yielding the top of stack or null
    Return,
}

/// Effect-only instructions
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    LoadNull,
    LoadBoolean(bool),
    LoadInt(i64),
    LoadFloat(f64),
    LoadString(StringTemplate),
    LoadVar { slot: usize, name: String },
    LoadFunction(Arc<FunctionCode>),
    LoadList(usize),
    LoadArray(usize),
    LoadMember,
    StoreMember,
    Assign { slot: usize, name: String },
    DiscardTop,
    Dup,
    Print,
    Call,
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
    Not,
    Incr,
    Decr,
    LoadConstant,
    Mod,
}

/// Control-transfer instructions; targets are absolute instruction indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Jump(usize),
    JumpIfFalse(usize),
}

impl Branch {
    pub fn target(&self) -> usize {
        match self {
            Branch::Jump(target) | Branch::JumpIfFalse(target) => *target,
        }
    }
}

impl Op {
    pub fn opcode(&self) -> OpCode {
        match self {
            Op::LoadNull => OpCode::LoadNull,
            Op::LoadBoolean(_) => OpCode::LoadBoolean,
            Op::LoadInt(_) => OpCode::LoadIntval,
            Op::LoadFloat(_) => OpCode::LoadFloatval,
            Op::LoadString(_) => OpCode::LoadStringval,
            Op::LoadVar { .. } => OpCode::LoadVar,
            Op::LoadFunction(_) => OpCode::LoadFunction,
            Op::LoadList(_) => OpCode::LoadList,
            Op::LoadArray(_) => OpCode::LoadArray,
            Op::LoadMember => OpCode::LoadMember,
            Op::StoreMember => OpCode::StoreMember,
            Op::Assign { .. } => OpCode::Assign,
            Op::DiscardTop => OpCode::DiscardTop,
            Op::Dup => OpCode::Dup,
            Op::Print => OpCode::Print,
            Op::Call => OpCode::Call,
            Op::Eq => OpCode::Eq,
            Op::Gt => OpCode::Gt,
            Op::Ge => OpCode::Ge,
            Op::Lt => OpCode::Lt,
            Op::Le => OpCode::Le,
            Op::And => OpCode::And,
            Op::Or => OpCode::Or,
            Op::Add => OpCode::Add,
            Op::Sub => OpCode::Sub,
            Op::Mul => OpCode::Mul,
            Op::Div => OpCode::Div,
            Op::Not => OpCode::Not,
            Op::Incr => OpCode::Incr,
            Op::Decr => OpCode::Decr,
            Op::LoadConstant => OpCode::LoadConstant,
            Op::Mod => OpCode::Mod,
        }
    }
}

impl Instruction {
    pub fn opcode(&self) -> OpCode {
        match self {
            Instruction::Op(op) => op.opcode(),
            Instruction::Branch(Branch::Jump(_)) => OpCode::Jump,
            Instruction::Branch(Branch::JumpIfFalse(_)) => OpCode::JumpIfFalse,
            Instruction::Return => OpCode::Return,
        }
    }

    pub fn jump(target: usize) -> Self {
        Instruction::Branch(Branch::Jump(target))
    }

    pub fn jump_if_false(target: usize) -> Self {
        Instruction::Branch(Branch::JumpIfFalse(target))
    }
}

impl From<Op> for Instruction {
    fn from(op: Op) -> Self {
        Instruction::Op(op)
    }
}

impl From<Branch> for Instruction {
    fn from(branch: Branch) -> Self {
        Instruction::Branch(branch)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.opcode().name();
        match self {
            Op::LoadBoolean(value) => write!(f, "{} {}", name, value),
            Op::LoadInt(value) => write!(f, "{} {}", name, value),
            Op::LoadFloat(value) => write!(f, "{} {}", name, value),
            Op::LoadString(template) => write!(f, "{} {}", name, template.text()),
            Op::LoadVar { slot, name: var } | Op::Assign { slot, name: var } => {
                write!(f, "{} {}, {}", name, slot, var)
            }
            Op::LoadFunction(function) => write!(f, "{} {}", name, function.name),
            Op::LoadList(count) | Op::LoadArray(count) => write!(f, "{} {}", name, count),
            _ => write!(f, "{}", name),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Op(op) => write!(f, "{}", op),
            Instruction::Branch(branch) => write!(f, "{} {}", self.opcode().name(), branch.target()),
            Instruction::Return => write!(f, "{}", OpCode::Return.name()),
        }
    }
}
