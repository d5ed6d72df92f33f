use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;
use std::thread::LocalKey;
use indexmap::IndexMap;
use parking_lot::RwLock;
use crate::bytecode::FunctionCode;
use crate::vm::{Frame, VMError, VMResult, VM};

/// Ordered string-keyed map with reference semantics: every clone sees `put`
#[derive(Clone, Default)]
pub struct Array(Arc<RwLock<IndexMap<String, Value>>>);

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an array keyed "0".."n-1" by position
    pub fn from_values(values: Vec<Value>) -> Self {
        let map = values
            .into_iter()
            .enumerate()
            .map(|(index, value)| (index.to_string(), value))
            .collect();
        Array(Arc::new(RwLock::new(map)))
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.read().get(key).cloned()
    }

    pub fn put(&self, key: &str, value: Value) {
        self.0.write().insert(key.to_string(), value);
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.read().keys().cloned().collect()
    }

    /// A point-in-time copy of the entries, in insertion order
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0
            .read()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn ptr_eq(&self, other: &Array) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Identity of the shared storage, stable while any reference lives
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

thread_local! {
    static FORMATTING: RefCell<Vec<usize>> = RefCell::new(Vec::new());
    static COMPARING: RefCell<Vec<(usize, usize)>> = RefCell::new(Vec::new());
}

/// Run `f` with `key` marked in progress; `None` if it already was, i.e. a cycle
fn cycle_guard<K, R>(active: &'static LocalKey<RefCell<Vec<K>>>, key: K, f: impl FnOnce() -> R) -> Option<R>
where
    K: PartialEq + Copy + 'static,
{
    let entered = active.with(|keys| {
        let mut keys = keys.borrow_mut();
        if keys.contains(&key) {
            false
        } else {
            keys.push(key);
            true
        }
    });
    if !entered {
        return None;
    }
    let result = f();
    active.with(|keys| keys.borrow_mut().retain(|k| *k != key));
    Some(result)
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries();
        match cycle_guard(&FORMATTING, self.id(), || f.debug_map().entries(entries).finish()) {
            Some(result) => result,
            None => f.write_str("*RECURSION*"),
        }
    }
}

/// Anything CALL can invoke
pub trait Callable: Send + Sync {
    fn name(&self) -> &str;

    fn call(&self, vm: &VM, args: Vec<Value>, caller: &Frame) -> VMResult<Value>;
}

type NativeFn = dyn Fn(&VM, Vec<Value>) -> VMResult<Value> + Send + Sync;

/// A host-provided function
pub struct NativeFunction {
    name: String,
    func: Box<NativeFn>,
}

impl NativeFunction {
    pub fn new<F>(name: &str, func: F) -> Self
    where
        F: Fn(&VM, Vec<Value>) -> VMResult<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            func: Box::new(func),
        }
    }

    /// Wrap the function as a value ready to be bound or pushed
    pub fn into_value(self) -> Value {
        Value::Function(Arc::new(self))
    }
}

impl Callable for NativeFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, vm: &VM, args: Vec<Value>, _caller: &Frame) -> VMResult<Value> {
        (self.func)(vm, args)
    }
}

/// Represents a value in the VM
#[derive(Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Array),
    List(Arc<Vec<Value>>),
    Function(Arc<dyn Callable>),
    CodeFunction(Arc<FunctionCode>),
}

impl Value {
    pub fn string(s: &str) -> Self {
        Value::String(s.to_string())
    }

    pub fn list(values: Vec<Value>) -> Self {
        Value::List(Arc::new(values))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::List(_) => "list",
            Value::Function(_) | Value::CodeFunction(_) => "function",
        }
    }

    /// Checks if the value is truthy (used in conditionals)
    pub fn is_true(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Integer(i) => *i != 0,
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::String(s) => !s.is_empty() && s != "0",
            Value::Array(array) => !array.is_empty(),
            Value::List(list) => !list.is_empty(),
            Value::Function(_) | Value::CodeFunction(_) => true,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::CodeFunction(_))
    }

    /// Member access; the key is always a string
    pub fn get(&self, key: &str) -> VMResult<Value> {
        match self {
            Value::Array(array) => array
                .get(key)
                .ok_or_else(|| VMError::UndefinedKey(key.to_string())),
            Value::List(list) => key
                .parse::<usize>()
                .ok()
                .and_then(|index| list.get(index).cloned())
                .ok_or_else(|| VMError::UndefinedKey(key.to_string())),
            Value::String(s) => {
                let chars: Vec<char> = s.chars().collect();
                let offset = key
                    .parse::<i64>()
                    .map_err(|_| VMError::UndefinedKey(key.to_string()))?;
                let index = if offset < 0 { chars.len() as i64 + offset } else { offset };
                usize::try_from(index)
                    .ok()
                    .and_then(|index| chars.get(index))
                    .map(|c| Value::String(c.to_string()))
                    .ok_or_else(|| VMError::UndefinedKey(key.to_string()))
            }
            other => Err(VMError::TypeMismatch(format!("Cannot index into {}", other.type_name()))),
        }
    }

    /// Member assignment; mutates the container in place
    pub fn put(&self, key: &str, value: Value) -> VMResult<()> {
        match self {
            Value::Array(array) => {
                array.put(key, value);
                Ok(())
            }
            other => Err(VMError::TypeMismatch(format!("Cannot assign a member of {}", other.type_name()))),
        }
    }

    /// The elements of an argument list
    pub fn to_sequence(&self) -> VMResult<Vec<Value>> {
        match self {
            Value::List(list) => Ok(list.as_ref().clone()),
            other => Err(VMError::TypeMismatch(format!("Expected an argument list, found {}", other.type_name()))),
        }
    }

    /// Invoke a function value with `caller` as the calling context
    pub fn call(&self, vm: &VM, args: Vec<Value>, caller: &Frame) -> VMResult<Value> {
        match self {
            Value::Function(function) => function.call(vm, args, caller),
            Value::CodeFunction(function) => {
                let mut frame = Frame::for_call(function, args, caller);
                vm.execute(&function.program, &mut frame)
            }
            other => Err(VMError::TypeMismatch(format!("{} is not callable", other.type_name()))),
        }
    }

    /// The display string, as produced by PRINT and interpolation
    pub fn to_display_string(&self) -> String {
        self.to_string()
    }
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        "NAN".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "INF".to_string() } else { "-INF".to_string() }
    } else if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        format!("{}", f)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Boolean(true) => write!(f, "1"),
            Value::Boolean(false) => Ok(()),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", format_float(*fl)),
            Value::String(s) => write!(f, "{}", s),
            Value::Array(_) => write!(f, "Array"),
            Value::List(_) => write!(f, "List"),
            Value::Function(_) | Value::CodeFunction(_) => write!(f, "Function"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Boolean(b) => write!(f, "Boolean({})", b),
            Value::Integer(i) => write!(f, "Integer({})", i),
            Value::Float(fl) => write!(f, "Float({})", fl),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Array(array) => write!(f, "Array({:?})", array),
            Value::List(list) => f.debug_tuple("List").field(list.as_ref()).finish(),
            Value::Function(function) => write!(f, "Function({})", function.name()),
            Value::CodeFunction(function) => write!(f, "CodeFunction({})", function.name),
        }
    }
}

/// Structural equality, used by tests and hosts; not the language's `==`
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            // A pair already under comparison is assumed equal
            (Value::Array(a), Value::Array(b)) => {
                a.ptr_eq(b)
                    || cycle_guard(&COMPARING, (a.id(), b.id()), || a.entries() == b.entries())
                        .unwrap_or(true)
            }
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::CodeFunction(a), Value::CodeFunction(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Boolean(true).to_string(), "1");
        assert_eq!(Value::Boolean(false).to_string(), "");
        assert_eq!(Value::Integer(-123).to_string(), "-123");
        assert_eq!(Value::string("hello world").to_string(), "hello world");
        assert_eq!(Value::Array(Array::new()).to_string(), "Array");
        assert_eq!(Value::list(vec![]).to_string(), "List");
    }

    #[test]
    fn test_value_float_display() {
        assert_eq!(Value::Float(3.14).to_string(), "3.14");
        assert_eq!(Value::Float(-2.5).to_string(), "-2.5");
        assert_eq!(Value::Float(2.0).to_string(), "2");
        assert_eq!(Value::Float(f64::INFINITY).to_string(), "INF");
        assert_eq!(Value::Float(f64::NEG_INFINITY).to_string(), "-INF");
        assert_eq!(Value::Float(f64::NAN).to_string(), "NAN");
    }

    #[test]
    fn test_value_is_true() {
        // Falsy values
        assert!(!Value::Null.is_true());
        assert!(!Value::Boolean(false).is_true());
        assert!(!Value::Integer(0).is_true());
        assert!(!Value::Float(0.0).is_true());
        assert!(!Value::Float(f64::NAN).is_true());
        assert!(!Value::string("").is_true());
        assert!(!Value::string("0").is_true());
        assert!(!Value::Array(Array::new()).is_true());
        assert!(!Value::list(vec![]).is_true());

        // Truthy values
        assert!(Value::Boolean(true).is_true());
        assert!(Value::Integer(-1).is_true());
        assert!(Value::Float(0.1).is_true());
        assert!(Value::string("0.0").is_true());
        assert!(Value::string("false").is_true());
        assert!(Value::Array(Array::from_values(vec![Value::Null])).is_true());
        assert!(NativeFunction::new("f", |_, _| Ok(Value::Null)).into_value().is_true());
    }

    #[test]
    fn test_array_from_values_keys_by_position() {
        let array = Array::from_values(vec![Value::from("a"), Value::from(2i64), Value::Null]);
        assert_eq!(array.keys(), vec!["0", "1", "2"]);
        assert_eq!(array.get("0"), Some(Value::from("a")));
        assert_eq!(array.get("1"), Some(Value::Integer(2)));
        assert_eq!(array.get("3"), None);
    }

    #[test]
    fn test_array_put_is_shared_between_clones() {
        let value = Value::Array(Array::new());
        let alias = value.clone();

        value.put("name", Value::from("Ada")).unwrap();
        value.put("0", Value::from(1i64)).unwrap();
        value.put("name", Value::from("Grace")).unwrap();

        assert_eq!(alias.get("name").unwrap(), Value::from("Grace"));
        match &alias {
            Value::Array(array) => assert_eq!(array.keys(), vec!["name", "0"]),
            other => panic!("Expected array, got {:?}", other),
        }
    }

    #[test]
    fn test_get_undefined_key() {
        let array = Value::Array(Array::new());
        match array.get("missing") {
            Err(VMError::UndefinedKey(key)) => assert_eq!(key, "missing"),
            other => panic!("Expected UndefinedKey, got {:?}", other),
        }
    }

    #[test]
    fn test_get_on_list_and_string() {
        let list = Value::list(vec![Value::from(10i64), Value::from(20i64)]);
        assert_eq!(list.get("1").unwrap(), Value::Integer(20));
        assert!(matches!(list.get("2"), Err(VMError::UndefinedKey(_))));
        assert!(matches!(list.get("x"), Err(VMError::UndefinedKey(_))));

        let s = Value::from("héllo");
        assert_eq!(s.get("1").unwrap(), Value::from("é"));
        assert_eq!(s.get("-1").unwrap(), Value::from("o"));
        assert!(matches!(s.get("5"), Err(VMError::UndefinedKey(_))));
        assert!(matches!(s.get("-6"), Err(VMError::UndefinedKey(_))));
        assert!(matches!(s.get("abc"), Err(VMError::UndefinedKey(_))));
    }

    #[test]
    fn test_get_and_put_type_mismatch() {
        assert!(matches!(Value::Integer(1).get("0"), Err(VMError::TypeMismatch(_))));
        assert!(matches!(Value::Null.get("0"), Err(VMError::TypeMismatch(_))));
        assert!(matches!(Value::from("abc").put("0", Value::Null), Err(VMError::TypeMismatch(_))));
        assert!(matches!(Value::list(vec![]).put("0", Value::Null), Err(VMError::TypeMismatch(_))));
    }

    #[test]
    fn test_to_sequence() {
        let list = Value::list(vec![Value::from(1i64), Value::from("two")]);
        assert_eq!(list.to_sequence().unwrap(), vec![Value::Integer(1), Value::from("two")]);
        assert!(matches!(Value::Array(Array::new()).to_sequence(), Err(VMError::TypeMismatch(_))));
    }

    #[test]
    fn test_call_native_function() {
        let vm = VM::new();
        let frame = Frame::new();
        let sum = NativeFunction::new("sum", |_, args| {
            let total = args.iter().map(|a| match a {
                Value::Integer(i) => *i,
                _ => 0,
            }).sum::<i64>();
            Ok(Value::Integer(total))
        })
        .into_value();

        let result = sum
            .call(&vm, vec![Value::from(2i64), Value::from(40i64)], &frame)
            .unwrap();
        assert_eq!(result, Value::Integer(42));
    }

    #[test]
    fn test_call_non_callable() {
        let vm = VM::new();
        let frame = Frame::new();
        match Value::Integer(3).call(&vm, vec![], &frame) {
            Err(VMError::TypeMismatch(msg)) => assert_eq!(msg, "integer is not callable"),
            other => panic!("Expected TypeMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_structural_equality() {
        assert_eq!(Value::Integer(1), Value::Integer(1));
        assert_ne!(Value::Integer(1), Value::Float(1.0));
        assert_ne!(Value::from("1"), Value::Integer(1));

        let a = Array::from_values(vec![Value::from(1i64)]);
        let b = Array::from_values(vec![Value::from(1i64)]);
        assert_eq!(Value::Array(a), Value::Array(b));

        let f = NativeFunction::new("f", |_, _| Ok(Value::Null)).into_value();
        let g = NativeFunction::new("f", |_, _| Ok(Value::Null)).into_value();
        assert_eq!(f, f.clone());
        assert_ne!(f, g);
    }

    #[test]
    fn test_self_containing_arrays() {
        let a = Array::new();
        a.put("0", Value::Array(a.clone()));
        let b = Array::new();
        b.put("0", Value::Array(b.clone()));

        assert_eq!(format!("{:?}", Value::Array(a.clone())), "Array({\"0\": Array(*RECURSION*)})");
        assert_eq!(Value::Array(a.clone()), Value::Array(b.clone()));

        b.put("1", Value::Null);
        assert_ne!(Value::Array(a), Value::Array(b));
    }

    #[test]
    fn test_type_names_and_debug() {
        assert_eq!(Value::Null.type_name(), "null");
        assert_eq!(Value::Float(1.0).type_name(), "float");
        assert_eq!(Value::list(vec![]).type_name(), "list");
        assert_eq!(format!("{:?}", Value::from("x")), "String(\"x\")");
        assert_eq!(
            format!("{:?}", NativeFunction::new("strlen", |_, _| Ok(Value::Null)).into_value()),
            "Function(strlen)"
        );
    }
}
