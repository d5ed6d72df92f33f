use rustc_hash::FxHashMap;
use crate::bytecode::FunctionCode;
use crate::vm::{VMError, VMResult, Value};

#[derive(Debug, Clone)]
struct Binding {
    name: String,
    value: Value,
}

/// The per-invocation execution context: operand stack plus variable bindings
#[derive(Debug, Default)]
pub struct Frame {
    stack: Vec<Value>,
    slots: Vec<Option<Binding>>,
    /// Name to slot index; the fallback when a slot does not carry the name
    names: FxHashMap<String, usize>,
    /// Function values visible from the calling frames, read-only
    functions: FxHashMap<String, Value>,
}

impl Frame {
    pub fn new() -> Self {
        Self {
            stack: Vec::with_capacity(64),
            ..Self::default()
        }
    }

    /// Build the frame for invoking `function` from `caller`
    ///
    /// Parameters are bound in order; missing arguments bind Null and extra
    /// arguments are ignored.
    pub fn for_call(function: &FunctionCode, args: Vec<Value>, caller: &Frame) -> Self {
        let mut frame = Frame::new();
        frame.functions = caller.visible_functions();

        let mut args = args.into_iter();
        for param in &function.params {
            let value = args.next().unwrap_or(Value::Null);
            frame.set_var(param.slot, &param.name, value);
        }
        frame
    }

    /// Push a value onto the stack
    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// Pop a value from the stack
    pub fn pop(&mut self) -> VMResult<Value> {
        self.stack.pop().ok_or(VMError::StackUnderflow)
    }

    /// Pop `count` values, returned in the order they were pushed.
    /// The stack is left untouched on underflow.
    pub fn pop_n(&mut self, count: usize) -> VMResult<Vec<Value>> {
        if count > self.stack.len() {
            return Err(VMError::StackUnderflow);
        }
        let at = self.stack.len() - count;
        Ok(self.stack.split_off(at))
    }

    /// Peek at the top value on the stack without removing it
    pub fn top(&self) -> VMResult<&Value> {
        self.stack.last().ok_or(VMError::StackUnderflow)
    }

    pub fn current_depth(&self) -> usize {
        self.stack.len()
    }

    /// Resolve a variable, trying the slot first when one is given
    pub fn get_var(&self, name: &str, slot: Option<usize>) -> Option<Value> {
        if let Some(binding) = slot.and_then(|slot| self.binding(slot)) {
            if binding.name == name {
                return Some(binding.value.clone());
            }
        }

        self.names
            .get(name)
            .and_then(|index| self.binding(*index))
            .map(|binding| binding.value.clone())
            .or_else(|| self.functions.get(name).cloned())
    }

    /// Bind `value` to `name`, creating or overwriting the binding
    pub fn set_var(&mut self, slot: usize, name: &str, value: Value) {
        let index = match self.names.get(name) {
            Some(index) => *index,
            None => match self.binding(slot) {
                // slot taken by another name
                Some(other) if other.name != name => self.slots.len().max(slot + 1),
                _ => slot,
            },
        };

        if self.slots.len() <= index {
            self.slots.resize(index + 1, None);
        }
        self.slots[index] = Some(Binding {
            name: name.to_string(),
            value,
        });
        self.names.insert(name.to_string(), index);
    }

    /// Function-valued bindings a callee of this frame can see by name
    pub fn visible_functions(&self) -> FxHashMap<String, Value> {
        let mut functions = self.functions.clone();
        for binding in self.slots.iter().flatten() {
            if binding.value.is_callable() {
                functions.insert(binding.name.clone(), binding.value.clone());
            }
        }
        functions
    }

    /// Render the stack, top first
    pub fn dump_stack(&self) -> String {
        let mut out = format!("STACK (depth={}):", self.stack.len());
        for (i, value) in self.stack.iter().enumerate().rev() {
            out.push_str(&format!("\n  {}: {:?}", i, value));
        }
        out
    }

    fn binding(&self, index: usize) -> Option<&Binding> {
        self.slots.get(index).and_then(Option::as_ref)
    }
}
