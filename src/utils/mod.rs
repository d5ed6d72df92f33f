//! Utility functions for the pith runtime

use std::fs::File;
use std::io::{self, BufWriter, Write, Error as IoError};
use std::path::Path;
use std::sync::Arc;
use byteorder::{BigEndian, WriteBytesExt};
use parking_lot::Mutex;
use crate::bytecode::{
    Branch, FunctionCode, Instruction, Op, Param, Program, StringTemplate, MAGIC, VERSION_MAJOR,
};

/// Writes a program to a file
pub fn write_bytecode<P: AsRef<Path>>(program: &Program, path: P) -> Result<(), IoError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    encode_program(program, &mut writer)?;
    writer.flush()
}

/// Encodes a program, header included, into any writer
pub fn encode_program<W: Write>(program: &Program, writer: &mut W) -> Result<(), IoError> {
    writer.write_u32::<BigEndian>(MAGIC)?;
    writer.write_u8(VERSION_MAJOR)?; // Major version
    writer.write_u8(0)?; // Minor version
    writer.write_u16::<BigEndian>(0)?; // Patch version

    write_program(program, writer)
}

fn write_program<W: Write>(program: &Program, writer: &mut W) -> Result<(), IoError> {
    write_string(writer, &program.name)?;
    write_len(writer, program.instructions.len())?;
    for instruction in &program.instructions {
        write_instruction(instruction, writer)?;
    }
    Ok(())
}

fn write_instruction<W: Write>(instruction: &Instruction, writer: &mut W) -> Result<(), IoError> {
    writer.write_u8(instruction.opcode().into())?;

    match instruction {
        Instruction::Branch(Branch::Jump(target)) | Instruction::Branch(Branch::JumpIfFalse(target)) => {
            write_len(writer, *target)
        }
        Instruction::Return => Ok(()),
        Instruction::Op(op) => match op {
            Op::LoadBoolean(value) => writer.write_u8(*value as u8),
            Op::LoadInt(value) => writer.write_i64::<BigEndian>(*value),
            Op::LoadFloat(value) => writer.write_f64::<BigEndian>(*value),
            Op::LoadString(template) => write_template(template, writer),
            Op::LoadVar { slot, name } | Op::Assign { slot, name } => {
                write_len(writer, *slot)?;
                write_string(writer, name)
            }
            Op::LoadFunction(function) => write_function(function, writer),
            Op::LoadList(count) | Op::LoadArray(count) => write_len(writer, *count),
            _ => Ok(()),
        },
    }
}

fn write_template<W: Write>(template: &StringTemplate, writer: &mut W) -> Result<(), IoError> {
    write_string(writer, template.text())?;
    write_len(writer, template.references().len())?;
    for reference in template.references() {
        write_string(writer, &reference.search)?;
        write_string(writer, &reference.name)?;
        write_len(writer, reference.keys.len())?;
        for key in &reference.keys {
            write_string(writer, key)?;
        }
    }
    Ok(())
}

fn write_function<W: Write>(function: &FunctionCode, writer: &mut W) -> Result<(), IoError> {
    write_string(writer, &function.name)?;
    write_len(writer, function.params.len())?;
    for Param { slot, name } in &function.params {
        write_len(writer, *slot)?;
        write_string(writer, name)?;
    }
    write_program(&function.program, writer)
}

fn write_string<W: Write>(writer: &mut W, s: &str) -> Result<(), IoError> {
    write_len(writer, s.len())?;
    writer.write_all(s.as_bytes())
}

fn write_len<W: Write>(writer: &mut W, len: usize) -> Result<(), IoError> {
    let len = u32::try_from(len)
        .map_err(|_| IoError::new(io::ErrorKind::InvalidData, format!("{} does not fit in u32", len)))?;
    writer.write_u32::<BigEndian>(len)
}

/// In-memory output sink that can be cloned and inspected after execution
#[derive(Clone, Default, Debug)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded as UTF-8
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).to_string()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn load_var(slot: usize, name: &str) -> Instruction {
    Op::LoadVar { slot, name: name.to_string() }.into()
}

fn assign(slot: usize, name: &str) -> Instruction {
    Op::Assign { slot, name: name.to_string() }.into()
}

fn string(text: &str) -> Instruction {
    Op::LoadString(StringTemplate::parse(text)).into()
}

/// Generate a simple demonstration program
///
/// Prints `fact(5) = 120`, a greeting built from an array, and a countdown,
/// then returns 120.
pub fn generate_demo_program() -> Program {
    // function fact(n) { if (n <= 1) return 1; return n * fact(n - 1); }
    let fact = Program::new("fact", vec![
        /* 00 */ load_var(0, "n"),
        /* 01 */ Op::LoadInt(1).into(),
        /* 02 */ Op::Le.into(),
        /* 03 */ Instruction::jump_if_false(6),
        /* 04 */ Op::LoadInt(1).into(),
        /* 05 */ Instruction::Return,
        /* 06 */ load_var(0, "n"),
        /* 07 */ load_var(0, "n"),
        /* 08 */ Op::LoadInt(1).into(),
        /* 09 */ Op::Sub.into(),
        /* 10 */ Op::LoadList(1).into(),
        /* 11 */ load_var(1, "fact"), // resolved from the caller's functions
        /* 12 */ Op::Call.into(),
        /* 13 */ Op::Mul.into(),
        /* 14 */ Instruction::Return,
    ]);
    let fact = FunctionCode::new("fact", vec![Param::new(0, "n")], fact);

    Program::new("demo", vec![
        /* 00 */ Op::LoadFunction(Arc::new(fact)).into(),
        /* 01 */ assign(0, "fact"),
        /* 02 */ Op::LoadInt(5).into(),
        /* 03 */ Op::LoadList(1).into(),
        /* 04 */ load_var(0, "fact"),
        /* 05 */ Op::Call.into(),
        /* 06 */ assign(1, "result"),
        /* 07 */ string("fact(5) = $result\n"),
        /* 08 */ Op::Print.into(),
        /* 09 */ string("Ada"),
        /* 10 */ string("Grace"),
        /* 11 */ Op::LoadArray(2).into(),
        /* 12 */ assign(2, "names"),
        /* 13 */ Op::LoadInt(1).into(),
        /* 14 */ assign(3, "i"),
        /* 15 */ string("Hello {$names[$i]} and $names[0]!\n"),
        /* 16 */ Op::Print.into(),
        /* 17 */ Op::LoadInt(3).into(),
        /* 18 */ assign(4, "k"),
        // while (k > 0) { print k; k--; }
        /* 19 */ load_var(4, "k"),
        /* 20 */ Op::LoadInt(0).into(),
        /* 21 */ Op::Gt.into(),
        /* 22 */ Instruction::jump_if_false(29),
        /* 23 */ load_var(4, "k"),
        /* 24 */ Op::Print.into(),
        /* 25 */ load_var(4, "k"),
        /* 26 */ Op::Decr.into(),
        /* 27 */ assign(4, "k"),
        /* 28 */ Instruction::jump(19),
        /* 29 */ string("\n"),
        /* 30 */ Op::Print.into(),
        /* 31 */ load_var(1, "result"),
        /* 32 */ Instruction::Return,
    ])
}
