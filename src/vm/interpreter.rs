use std::io::{self, Write};
use std::sync::Arc;
use parking_lot::Mutex;
use crate::bytecode::{Branch, Instruction, Op, Program};
use crate::vm::operators;
use crate::vm::{interpolate, Array, Frame, Value, VMError, VMResult};

type OutputSink = Box<dyn Write + Send>;

/// The Virtual Machine that executes bytecode instructions
#[derive(Clone)]
pub struct VM {
    output: Arc<Mutex<OutputSink>>,
    stack_trace_enabled: bool,
}

impl Default for VM {
    fn default() -> Self {
        Self::new()
    }
}

impl VM {
    /// A VM printing to stdout
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }

    /// A VM printing to `writer`
    pub fn with_output<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            output: Arc::new(Mutex::new(Box::new(writer))),
            stack_trace_enabled: false,
        }
    }

    /// Enable or disable stack tracing
    pub fn set_stack_trace(&mut self, enabled: bool) {
        self.stack_trace_enabled = enabled;
    }

    /// Write to the output sink used by PRINT
    pub fn write_output(&self, text: &str) -> VMResult<()> {
        self.output.lock().write_all(text.as_bytes())?;
        Ok(())
    }

    pub fn flush(&self) -> VMResult<()> {
        self.output.lock().flush()?;
        Ok(())
    }

    /// Execute `program` against `frame` until RETURN or the end of the program
    pub fn execute(&self, program: &Program, frame: &mut Frame) -> VMResult<Value> {
        if self.stack_trace_enabled {
            println!("\nEntering {} ({} instructions)", program.name, program.len());
        }

        let mut pc = 0;
        while let Some(instruction) = program.get(pc) {
            if self.stack_trace_enabled {
                println!("\n[{}@{}] {}", program.name, pc, instruction);
                println!("{}", frame.dump_stack());
            }

            let next = match instruction {
                Instruction::Return => {
                    let value = frame.pop().unwrap_or(Value::Null);
                    if self.stack_trace_enabled {
                        println!("RETURN from {}: {:?}", program.name, value);
                    }
                    return Ok(value);
                }
                Instruction::Branch(branch) => self.branch(branch, frame, pc, program.len()),
                Instruction::Op(op) => self.eval(op, frame).map(|()| pc + 1),
            };

            pc = next.map_err(|e| e.at(&program.name, pc, instruction))?;
        }

        if self.stack_trace_enabled {
            println!("\n{} fell off the end", program.name);
        }
        Ok(Value::Null)
    }

    /// Compute the pc following a control transfer
    fn branch(&self, branch: &Branch, frame: &mut Frame, pc: usize, len: usize) -> VMResult<usize> {
        let taken = match branch {
            Branch::Jump(_) => true,
            Branch::JumpIfFalse(_) => !frame.pop()?.is_true(),
        };

        if !taken {
            return Ok(pc + 1);
        }
        let target = branch.target();
        if target > len {
            return Err(VMError::InvalidProgramCounter(target));
        }
        Ok(target)
    }

    /// Execute a single effect-only instruction
    pub fn eval(&self, op: &Op, frame: &mut Frame) -> VMResult<()> {
        match op {
            Op::LoadConstant | Op::Mod => {
                return Err(VMError::NotImplemented(op.opcode().name()));
            }

            Op::LoadNull => frame.push(Value::Null),
            Op::LoadBoolean(b) => frame.push(Value::Boolean(*b)),
            Op::LoadInt(i) => frame.push(Value::Integer(*i)),
            Op::LoadFloat(f) => frame.push(Value::Float(*f)),
            Op::LoadString(template) => {
                let text = interpolate(template, frame)?;
                frame.push(Value::String(text));
            }
            Op::LoadVar { slot, name } => {
                let value = frame
                    .get_var(name, Some(*slot))
                    .ok_or_else(|| VMError::UnboundVariable(name.clone()))?;
                frame.push(value);
            }
            Op::LoadFunction(function) => frame.push(Value::CodeFunction(function.clone())),
            Op::LoadList(count) => {
                let values = frame.pop_n(*count)?;
                frame.push(Value::list(values));
            }
            Op::LoadArray(count) => {
                let values = frame.pop_n(*count)?;
                frame.push(Value::Array(Array::from_values(values)));
            }

            Op::LoadMember => {
                let container = frame.pop()?;
                let key = frame.pop()?;
                frame.push(container.get(&key.to_display_string())?);
            }
            Op::StoreMember => {
                let container = frame.pop()?;
                let key = frame.pop()?;
                let value = frame.pop()?;
                container.put(&key.to_display_string(), value)?;
                frame.push(container);
            }
            Op::Assign { slot, name } => {
                let value = frame.pop()?;
                frame.set_var(*slot, name, value);
            }
            Op::DiscardTop => {
                frame.pop()?;
            }
            Op::Dup => {
                let value = frame.top()?.clone();
                frame.push(value);
            }

            Op::Print => {
                let value = frame.pop()?;
                self.write_output(&value.to_display_string())?;
            }
            Op::Call => {
                let callee = frame.pop()?;
                let args = frame.pop()?.to_sequence()?;
                let result = self.call(&callee, args, frame)?;
                frame.push(result);
            }

            Op::Eq => self.compare(frame, |l, r| Ok(operators::compare_eq(l, r)))?,
            Op::Gt => self.compare(frame, operators::compare_gt)?,
            Op::Ge => self.compare(frame, operators::compare_ge)?,
            Op::Lt => self.compare(frame, operators::compare_lt)?,
            Op::Le => self.compare(frame, operators::compare_le)?,
            // Both operands are already evaluated; nothing to short-circuit
            Op::And => self.compare(frame, |l, r| Ok(l.is_true() && r.is_true()))?,
            Op::Or => self.compare(frame, |l, r| Ok(l.is_true() || r.is_true()))?,

            Op::Add => self.arithmetic(frame, operators::add)?,
            Op::Sub => self.arithmetic(frame, operators::subtract)?,
            Op::Mul => self.arithmetic(frame, operators::multiply)?,
            Op::Div => self.arithmetic(frame, operators::divide)?,

            Op::Not => {
                let value = frame.pop()?;
                frame.push(Value::Boolean(!value.is_true()));
            }
            Op::Incr => {
                let value = frame.pop()?;
                frame.push(operators::increment(&value)?);
            }
            Op::Decr => {
                let value = frame.pop()?;
                frame.push(operators::decrement(&value)?);
            }
        }
        Ok(())
    }

    /// Invoke `callee` synchronously, with `caller` as the calling context
    pub fn call(&self, callee: &Value, args: Vec<Value>, caller: &Frame) -> VMResult<Value> {
        if self.stack_trace_enabled {
            println!("CALL {:?} with {} argument(s)", callee, args.len());
        }
        callee.call(self, args, caller)
    }

    fn compare<F>(&self, frame: &mut Frame, predicate: F) -> VMResult<()>
    where
        F: Fn(&Value, &Value) -> VMResult<bool>,
    {
        let right = frame.pop()?;
        let left = frame.pop()?;
        frame.push(Value::Boolean(predicate(&left, &right)?));
        Ok(())
    }

    fn arithmetic<F>(&self, frame: &mut Frame, operation: F) -> VMResult<()>
    where
        F: Fn(&Value, &Value) -> VMResult<Value>,
    {
        let right = frame.pop()?;
        let left = frame.pop()?;
        frame.push(operation(&left, &right)?);
        Ok(())
    }
}
