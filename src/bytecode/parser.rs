use std::io::{Error as IoError, Read};
use std::sync::Arc;
use byteorder::{ReadBytesExt, BigEndian};
use thiserror::Error;
use crate::bytecode::{
    Branch, FunctionCode, Instruction, Op, OpCode, Param, Program, StringTemplate, VarReference,
};

/// "PITH" in ASCII
pub const MAGIC: u32 = 0x50495448;
pub const VERSION_MAJOR: u8 = 1;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    IoError(#[from] IoError),

    #[error("Invalid bytecode format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported bytecode version: {0}")]
    UnsupportedVersion(u8),

    #[error("Unknown opcode: {0:#04x}")]
    UnknownOpcode(u8),
}

pub struct Parser;

impl Parser {
    /// Parse bytecode from a reader (file, memory buffer, etc.)
    pub fn parse<R: Read>(reader: &mut R) -> Result<Program, ParseError> {
        let magic = reader.read_u32::<BigEndian>()?;
        if magic != MAGIC {
            return Err(ParseError::InvalidFormat("Invalid magic number".to_string()));
        }

        let version = reader.read_u8()?;
        if version != VERSION_MAJOR {
            return Err(ParseError::UnsupportedVersion(version));
        }
        let _minor_version = reader.read_u8()?;
        let _patch_version = reader.read_u16::<BigEndian>()?;

        Self::read_program(reader)
    }

    fn read_program<R: Read>(reader: &mut R) -> Result<Program, ParseError> {
        let name = Self::read_string(reader)?;
        let count = reader.read_u32::<BigEndian>()? as usize;

        let mut instructions = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            instructions.push(Self::read_instruction(reader)?);
        }

        Ok(Program { name, instructions })
    }

    fn read_instruction<R: Read>(reader: &mut R) -> Result<Instruction, ParseError> {
        let byte = reader.read_u8()?;
        let opcode = OpCode::from_byte(byte).ok_or(ParseError::UnknownOpcode(byte))?;

        let op = match opcode {
            OpCode::Jump => return Ok(Branch::Jump(Self::read_index(reader)?).into()),
            OpCode::JumpIfFalse => return Ok(Branch::JumpIfFalse(Self::read_index(reader)?).into()),
            OpCode::Return => return Ok(Instruction::Return),

            OpCode::LoadConstant => Op::LoadConstant,
            OpCode::LoadNull => Op::LoadNull,
            OpCode::LoadBoolean => Op::LoadBoolean(reader.read_u8()? != 0),
            OpCode::LoadIntval => Op::LoadInt(reader.read_i64::<BigEndian>()?),
            OpCode::LoadFloatval => Op::LoadFloat(reader.read_f64::<BigEndian>()?),
            OpCode::LoadStringval => Op::LoadString(Self::read_template(reader)?),
            OpCode::LoadVar => {
                let slot = Self::read_index(reader)?;
                let name = Self::read_string(reader)?;
                Op::LoadVar { slot, name }
            }
            OpCode::LoadFunction => Op::LoadFunction(Arc::new(Self::read_function(reader)?)),
            OpCode::LoadList => Op::LoadList(Self::read_index(reader)?),
            OpCode::LoadArray => Op::LoadArray(Self::read_index(reader)?),
            OpCode::LoadMember => Op::LoadMember,
            OpCode::StoreMember => Op::StoreMember,
            OpCode::Assign => {
                let slot = Self::read_index(reader)?;
                let name = Self::read_string(reader)?;
                Op::Assign { slot, name }
            }
            OpCode::DiscardTop => Op::DiscardTop,
            OpCode::Dup => Op::Dup,
            OpCode::Call => Op::Call,
            OpCode::Print => Op::Print,
            OpCode::Eq => Op::Eq,
            OpCode::Gt => Op::Gt,
            OpCode::Ge => Op::Ge,
            OpCode::Lt => Op::Lt,
            OpCode::Le => Op::Le,
            OpCode::And => Op::And,
            OpCode::Or => Op::Or,
            OpCode::Add => Op::Add,
            OpCode::Sub => Op::Sub,
            OpCode::Mul => Op::Mul,
            OpCode::Div => Op::Div,
            OpCode::Mod => Op::Mod,
            OpCode::Not => Op::Not,
            OpCode::Incr => Op::Incr,
            OpCode::Decr => Op::Decr,
        };

        Ok(Instruction::Op(op))
    }

    fn read_template<R: Read>(reader: &mut R) -> Result<StringTemplate, ParseError> {
        let text = Self::read_string(reader)?;
        let count = reader.read_u32::<BigEndian>()? as usize;

        let mut references = Vec::with_capacity(count.min(256));
        for _ in 0..count {
            let search = Self::read_string(reader)?;
            let name = Self::read_string(reader)?;
            let key_count = reader.read_u32::<BigEndian>()? as usize;
            let mut keys = Vec::with_capacity(key_count.min(256));
            for _ in 0..key_count {
                keys.push(Self::read_string(reader)?);
            }
            references.push(VarReference { search, name, keys });
        }

        Ok(StringTemplate::new(&text, references))
    }

    fn read_function<R: Read>(reader: &mut R) -> Result<FunctionCode, ParseError> {
        let name = Self::read_string(reader)?;
        let param_count = reader.read_u32::<BigEndian>()? as usize;

        let mut params = Vec::with_capacity(param_count.min(256));
        for _ in 0..param_count {
            let slot = Self::read_index(reader)?;
            let name = Self::read_string(reader)?;
            params.push(Param { slot, name });
        }

        let program = Self::read_program(reader)?;
        Ok(FunctionCode { name, params, program })
    }

    fn read_index<R: Read>(reader: &mut R) -> Result<usize, ParseError> {
        Ok(reader.read_u32::<BigEndian>()? as usize)
    }

    fn read_string<R: Read>(reader: &mut R) -> Result<String, ParseError> {
        let len = reader.read_u32::<BigEndian>()? as usize;
        let mut bytes = Vec::new();
        (&mut *reader).take(len as u64).read_to_end(&mut bytes)?;
        if bytes.len() != len {
            return Err(ParseError::InvalidFormat(format!(
                "String truncated: expected {} bytes, found {}",
                len,
                bytes.len()
            )));
        }
        Ok(String::from_utf8_lossy(&bytes).to_string())
    }
}
