mod instruction;
mod opcode;
mod parser;
mod template;

pub use instruction::{Branch, Instruction, Op};
pub use opcode::{OpCode, OPCODE_TABLE};
pub use parser::{Parser, ParseError, MAGIC, VERSION_MAJOR};
pub use template::{StringTemplate, VarReference};

use std::fmt::Write;

/// An ordered instruction sequence; jump operands index into it
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub name: String,
    pub instructions: Vec<Instruction>,
}

impl Program {
    pub fn new(name: &str, instructions: Vec<Instruction>) -> Self {
        Self {
            name: name.to_string(),
            instructions,
        }
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn get(&self, pc: usize) -> Option<&Instruction> {
        self.instructions.get(pc)
    }
}

/// A declared parameter of a compiled function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub slot: usize,
    pub name: String,
}

impl Param {
    pub fn new(slot: usize, name: &str) -> Self {
        Self {
            slot,
            name: name.to_string(),
        }
    }
}

/// A compiled function body together with its parameter metadata
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCode {
    pub name: String,
    pub params: Vec<Param>,
    pub program: Program,
}

impl FunctionCode {
    pub fn new(name: &str, params: Vec<Param>, program: Program) -> Self {
        Self {
            name: name.to_string(),
            params,
            program,
        }
    }
}

/// Render a program, and any functions it loads, one instruction per line
pub fn disassemble(program: &Program) -> String {
    let mut out = String::new();
    disassemble_into(&mut out, program, 0);
    out
}

fn disassemble_into(out: &mut String, program: &Program, depth: usize) {
    let indent = "  ".repeat(depth);
    let _ = writeln!(out, "{}== {} ==", indent, program.name);
    for (pc, instruction) in program.instructions.iter().enumerate() {
        let _ = write!(out, "{}{:04} {}", indent, pc, instruction);
        match instruction {
            Instruction::Op(Op::LoadString(template)) if template.has_references() => {
                let _ = write!(out, "    ; {} reference(s)", template.references().len());
            }
            _ if instruction.opcode().is_reserved() => {
                let _ = write!(out, "    ; reserved");
            }
            _ => {}
        }
        out.push('\n');
        if let Instruction::Op(Op::LoadFunction(function)) = instruction {
            disassemble_into(out, &function.program, depth + 1);
        }
    }
}
