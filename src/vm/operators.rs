//! Dynamic-type arithmetic and loose comparison

use std::cmp::Ordering;
use crate::vm::{Array, VMError, VMResult, Value};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    fn is_zero(self) -> bool {
        match self {
            Number::Int(i) => i == 0,
            Number::Float(f) => f == 0.0,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Number::Int(i) => Value::Integer(i),
            Number::Float(f) => Value::Float(f),
        }
    }
}

/// Parse a string that is numeric in its entirety (surrounding whitespace allowed)
fn parse_numeric(s: &str) -> Option<Number> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Number::Int(i));
    }
    // f64::from_str also accepts "inf" and "nan", which are not numeric here
    let numeric_chars = trimmed
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'));
    if !numeric_chars || !trimmed.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    trimmed.parse::<f64>().ok().map(Number::Float)
}

/// The numeric prefix of a string, or 0 when there is none
fn leading_number(s: &str) -> Number {
    if let Some(number) = parse_numeric(s) {
        return number;
    }
    let trimmed = s.trim_start();
    let bytes = trimmed.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let int_end = end;
    if bytes.get(end) == Some(&b'.') {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    if matches!(bytes.get(end), Some(b'e') | Some(b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        if bytes.get(exp_end).map_or(false, |b| b.is_ascii_digit()) {
            while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
                exp_end += 1;
            }
            end = exp_end;
        }
    }

    let prefix = &trimmed[..end];
    if end == int_end {
        if let Ok(i) = prefix.parse::<i64>() {
            return Number::Int(i);
        }
    }
    prefix.parse::<f64>().map(Number::Float).unwrap_or(Number::Int(0))
}

fn to_number(value: &Value, op: &str) -> VMResult<Number> {
    match value {
        Value::Null => Ok(Number::Int(0)),
        Value::Boolean(b) => Ok(Number::Int(*b as i64)),
        Value::Integer(i) => Ok(Number::Int(*i)),
        Value::Float(f) => Ok(Number::Float(*f)),
        Value::String(s) => Ok(leading_number(s)),
        other => Err(VMError::TypeMismatch(format!(
            "Unsupported operand type {} for {}",
            other.type_name(),
            op
        ))),
    }
}

fn is_non_numeric_string(value: &Value) -> bool {
    matches!(value, Value::String(s) if parse_numeric(s).is_none())
}

fn numeric_op(
    left: &Value,
    right: &Value,
    op: &str,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> VMResult<Value> {
    let result = match (to_number(left, op)?, to_number(right, op)?) {
        (Number::Int(a), Number::Int(b)) => match int_op(a, b) {
            Some(i) => Number::Int(i),
            None => Number::Float(float_op(a as f64, b as f64)),
        },
        (a, b) => Number::Float(float_op(a.as_f64(), b.as_f64())),
    };
    Ok(result.into_value())
}

pub fn add(left: &Value, right: &Value) -> VMResult<Value> {
    match (left, right) {
        (Value::Array(a), Value::Array(b)) => {
            let union = Array::new();
            for (key, value) in a.entries() {
                union.put(&key, value);
            }
            for (key, value) in b.entries() {
                if union.get(&key).is_none() {
                    union.put(&key, value);
                }
            }
            Ok(Value::Array(union))
        }
        _ if is_non_numeric_string(left) || is_non_numeric_string(right) => {
            if !is_scalar(left) || !is_scalar(right) {
                return Err(VMError::TypeMismatch(format!(
                    "Cannot add {} and {}",
                    left.type_name(),
                    right.type_name()
                )));
            }
            Ok(Value::String(format!("{}{}", left, right)))
        }
        _ => numeric_op(left, right, "+", i64::checked_add, |a, b| a + b),
    }
}

pub fn subtract(left: &Value, right: &Value) -> VMResult<Value> {
    numeric_op(left, right, "-", i64::checked_sub, |a, b| a - b)
}

pub fn multiply(left: &Value, right: &Value) -> VMResult<Value> {
    numeric_op(left, right, "*", i64::checked_mul, |a, b| a * b)
}

pub fn divide(left: &Value, right: &Value) -> VMResult<Value> {
    let divisor = to_number(right, "/")?;
    if divisor.is_zero() {
        return Err(VMError::DivisionByZero);
    }
    let dividend = to_number(left, "/")?;

    let result = match (dividend, divisor) {
        (Number::Int(a), Number::Int(b)) if a.checked_rem(b) == Some(0) => match a.checked_div(b) {
            Some(q) => Number::Int(q),
            None => Number::Float(a as f64 / b as f64),
        },
        (a, b) => Number::Float(a.as_f64() / b.as_f64()),
    };
    Ok(result.into_value())
}

fn is_scalar(value: &Value) -> bool {
    matches!(
        value,
        Value::Null | Value::Boolean(_) | Value::Integer(_) | Value::Float(_) | Value::String(_)
    )
}

pub fn increment(value: &Value) -> VMResult<Value> {
    match value {
        Value::Null => Ok(Value::Integer(1)),
        Value::Boolean(_) => Ok(value.clone()),
        Value::Integer(i) => Ok(i
            .checked_add(1)
            .map(Value::Integer)
            .unwrap_or(Value::Float(*i as f64 + 1.0))),
        Value::Float(f) => Ok(Value::Float(f + 1.0)),
        Value::String(s) if s.is_empty() => Ok(Value::string("1")),
        Value::String(s) => match parse_numeric(s) {
            Some(number) => increment(&number.into_value()),
            None => Ok(Value::String(increment_alphanumeric(s))),
        },
        other => Err(VMError::TypeMismatch(format!("Cannot increment {}", other.type_name()))),
    }
}

pub fn decrement(value: &Value) -> VMResult<Value> {
    match value {
        Value::Null | Value::Boolean(_) => Ok(value.clone()),
        Value::Integer(i) => Ok(i
            .checked_sub(1)
            .map(Value::Integer)
            .unwrap_or(Value::Float(*i as f64 - 1.0))),
        Value::Float(f) => Ok(Value::Float(f - 1.0)),
        Value::String(s) if s.is_empty() => Ok(Value::Integer(-1)),
        Value::String(s) => match parse_numeric(s) {
            Some(number) => decrement(&number.into_value()),
            None => Ok(value.clone()),
        },
        other => Err(VMError::TypeMismatch(format!("Cannot decrement {}", other.type_name()))),
    }
}

/// "a" -> "b", "Az" -> "Ba", "zz" -> "aaa", "a9" -> "b0".
/// Strings not ending in an ASCII letter or digit are returned unchanged.
fn increment_alphanumeric(s: &str) -> String {
    let mut chars: Vec<char> = s.chars().collect();
    if !chars.last().map_or(false, |c| c.is_ascii_alphanumeric()) {
        return s.to_string();
    }

    let mut i = chars.len();
    while i > 0 {
        i -= 1;
        let (next, carry) = match chars[i] {
            'z' => ('a', Some('a')),
            'Z' => ('A', Some('A')),
            '9' => ('0', Some('1')),
            c if c.is_ascii_alphanumeric() => ((c as u8 + 1) as char, None),
            _ => return chars.into_iter().collect(),
        };
        chars[i] = next;
        match carry {
            None => return chars.into_iter().collect(),
            Some(prefix) if i == 0 || !chars[i - 1].is_ascii_alphanumeric() => {
                chars.insert(i, prefix);
                return chars.into_iter().collect();
            }
            Some(_) => {}
        }
    }
    chars.into_iter().collect()
}

/// Loose ordering; `None` when the operands are unordered (NaN)
fn loose_compare(left: &Value, right: &Value) -> VMResult<Option<Ordering>> {
    compare_values(left, right, &mut Vec::new())
}

/// `seen` holds the array pairs currently being compared, outermost first
fn compare_values(left: &Value, right: &Value, seen: &mut Vec<(usize, usize)>) -> VMResult<Option<Ordering>> {
    match (left, right) {
        (Value::Boolean(_), _) | (_, Value::Boolean(_)) | (Value::Null, Value::Null) => {
            Ok(Some(left.is_true().cmp(&right.is_true())))
        }
        (Value::Null, Value::String(s)) => Ok(Some("".cmp(s.as_str()))),
        (Value::String(s), Value::Null) => Ok(Some(s.as_str().cmp(""))),
        (Value::Null, _) | (_, Value::Null) if is_comparable_with_null(left) && is_comparable_with_null(right) => {
            Ok(Some(left.is_true().cmp(&right.is_true())))
        }
        (Value::String(a), Value::String(b)) => match (parse_numeric(a), parse_numeric(b)) {
            (Some(x), Some(y)) => Ok(compare_numbers(x, y)),
            _ => Ok(Some(a.as_str().cmp(b.as_str()))),
        },
        (Value::String(s), number @ (Value::Integer(_) | Value::Float(_))) => match parse_numeric(s) {
            Some(x) => Ok(compare_numbers(x, to_number(number, "comparison")?)),
            None => Ok(Some(s.as_str().cmp(number.to_string().as_str()))),
        },
        (number @ (Value::Integer(_) | Value::Float(_)), Value::String(s)) => match parse_numeric(s) {
            Some(y) => Ok(compare_numbers(to_number(number, "comparison")?, y)),
            None => Ok(Some(number.to_string().as_str().cmp(s.as_str()))),
        },
        (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => Ok(compare_numbers(
            to_number(left, "comparison")?,
            to_number(right, "comparison")?,
        )),
        (Value::Array(a), Value::Array(b)) => compare_arrays(a, b, seen),
        _ => Err(VMError::TypeMismatch(format!(
            "Cannot compare {} with {}",
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn compare_numbers(a: Number, b: Number) -> Option<Ordering> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => Some(x.cmp(&y)),
        (x, y) => x.as_f64().partial_cmp(&y.as_f64()),
    }
}

fn is_comparable_with_null(value: &Value) -> bool {
    is_scalar(value) || matches!(value, Value::Array(_))
}

fn compare_arrays(a: &Array, b: &Array, seen: &mut Vec<(usize, usize)>) -> VMResult<Option<Ordering>> {
    if a.ptr_eq(b) {
        return Ok(Some(Ordering::Equal));
    }
    let pair = (a.id(), b.id());
    if seen.contains(&pair) {
        return Err(VMError::TypeMismatch(
            "Nesting level too deep - recursive dependency?".to_string(),
        ));
    }
    seen.push(pair);
    let result = compare_entries(a, b, seen);
    seen.pop();
    result
}

fn compare_entries(a: &Array, b: &Array, seen: &mut Vec<(usize, usize)>) -> VMResult<Option<Ordering>> {
    let (left, right) = (a.entries(), b.entries());
    if left.len() != right.len() {
        return Ok(Some(left.len().cmp(&right.len())));
    }
    for (key, value) in &left {
        let other = match b.get(key) {
            Some(other) => other,
            None => return Ok(None),
        };
        match compare_values(value, &other, seen)? {
            Some(Ordering::Equal) => continue,
            unequal => return Ok(unequal),
        }
    }
    Ok(Some(Ordering::Equal))
}

pub fn compare_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| compare_eq(x, y))
        }
        (Value::Function(_), _) | (Value::CodeFunction(_), _) => left == right,
        _ => matches!(loose_compare(left, right), Ok(Some(Ordering::Equal))),
    }
}

pub fn compare_lt(left: &Value, right: &Value) -> VMResult<bool> {
    Ok(matches!(loose_compare(left, right)?, Some(Ordering::Less)))
}

pub fn compare_le(left: &Value, right: &Value) -> VMResult<bool> {
    Ok(matches!(loose_compare(left, right)?, Some(Ordering::Less | Ordering::Equal)))
}

pub fn compare_gt(left: &Value, right: &Value) -> VMResult<bool> {
    Ok(matches!(loose_compare(left, right)?, Some(Ordering::Greater)))
}

pub fn compare_ge(left: &Value, right: &Value) -> VMResult<bool> {
    Ok(matches!(loose_compare(left, right)?, Some(Ordering::Greater | Ordering::Equal)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> Value {
        Value::string(text)
    }

    #[test]
    fn test_add_numbers() {
        assert_eq!(add(&Value::Integer(2), &Value::Integer(3)).unwrap(), Value::Integer(5));
        assert_eq!(add(&Value::Integer(2), &Value::Float(0.5)).unwrap(), Value::Float(2.5));
        assert_eq!(add(&Value::Boolean(true), &Value::Null).unwrap(), Value::Integer(1));
        assert_eq!(add(&s("1"), &s("2")).unwrap(), Value::Integer(3));
        assert_eq!(add(&s(" 1.5"), &Value::Integer(1)).unwrap(), Value::Float(2.5));
    }

    #[test]
    fn test_add_overflow_promotes_to_float() {
        assert_eq!(
            add(&Value::Integer(i64::MAX), &Value::Integer(1)).unwrap(),
            Value::Float(i64::MAX as f64 + 1.0)
        );
        assert_eq!(
            multiply(&Value::Integer(i64::MAX), &Value::Integer(2)).unwrap(),
            Value::Float(i64::MAX as f64 * 2.0)
        );
    }

    #[test]
    fn test_add_concatenates_non_numeric_strings() {
        assert_eq!(add(&s("Hello, "), &s("World")).unwrap(), s("Hello, World"));
        assert_eq!(add(&s("n="), &Value::Integer(4)).unwrap(), s("n=4"));
        assert_eq!(add(&Value::Float(1.5), &s("x")).unwrap(), s("1.5x"));
        assert!(matches!(
            add(&s("x"), &Value::Array(Array::new())),
            Err(VMError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_add_arrays_is_key_union() {
        let left = Array::from_values(vec![s("a"), s("b")]);
        let right = Array::from_values(vec![s("x"), s("y"), s("z")]);
        let result = add(&Value::Array(left), &Value::Array(right)).unwrap();
        match result {
            Value::Array(array) => {
                assert_eq!(array.keys(), vec!["0", "1", "2"]);
                assert_eq!(array.get("0"), Some(s("a")));
                assert_eq!(array.get("2"), Some(s("z")));
            }
            other => panic!("Expected array, got {:?}", other),
        }
    }

    #[test]
    fn test_arithmetic_type_mismatch() {
        let list = Value::list(vec![]);
        assert!(matches!(subtract(&list, &Value::Integer(1)), Err(VMError::TypeMismatch(_))));
        assert!(matches!(add(&Value::Integer(1), &Value::Array(Array::new())), Err(VMError::TypeMismatch(_))));
    }

    #[test]
    fn test_subtract_and_multiply_coerce_strings() {
        assert_eq!(subtract(&s("10 apples"), &Value::Integer(3)).unwrap(), Value::Integer(7));
        assert_eq!(subtract(&s("abc"), &Value::Integer(3)).unwrap(), Value::Integer(-3));
        assert_eq!(multiply(&s("2.5e1"), &Value::Integer(2)).unwrap(), Value::Float(50.0));
        assert_eq!(multiply(&s("3e"), &Value::Integer(2)).unwrap(), Value::Integer(6));
    }

    #[test]
    fn test_divide() {
        assert_eq!(divide(&Value::Integer(10), &Value::Integer(2)).unwrap(), Value::Integer(5));
        assert_eq!(divide(&Value::Integer(7), &Value::Integer(2)).unwrap(), Value::Float(3.5));
        assert_eq!(divide(&Value::Float(1.0), &Value::Integer(4)).unwrap(), Value::Float(0.25));
        assert_eq!(
            divide(&Value::Integer(i64::MIN), &Value::Integer(-1)).unwrap(),
            Value::Float(-(i64::MIN as f64))
        );
    }

    #[test]
    fn test_divide_by_zero_regardless_of_left() {
        let zeros = [Value::Integer(0), Value::Float(0.0), s("0"), Value::Null, Value::Boolean(false)];
        let lefts = [Value::Integer(1), Value::Float(2.0), s("abc"), Value::Null, Value::list(vec![])];
        for zero in &zeros {
            for left in &lefts {
                assert!(
                    matches!(divide(left, zero), Err(VMError::DivisionByZero)),
                    "{:?} / {:?}",
                    left,
                    zero
                );
            }
        }
    }

    #[test]
    fn test_increment() {
        assert_eq!(increment(&Value::Null).unwrap(), Value::Integer(1));
        assert_eq!(increment(&Value::Integer(41)).unwrap(), Value::Integer(42));
        assert_eq!(increment(&Value::Float(0.5)).unwrap(), Value::Float(1.5));
        assert_eq!(increment(&Value::Boolean(false)).unwrap(), Value::Boolean(false));
        assert_eq!(increment(&s("")).unwrap(), s("1"));
        assert_eq!(increment(&s("9")).unwrap(), Value::Integer(10));
        assert_eq!(increment(&s("1.5")).unwrap(), Value::Float(2.5));
        assert_eq!(increment(&Value::Integer(i64::MAX)).unwrap(), Value::Float(i64::MAX as f64 + 1.0));
    }

    #[test]
    fn test_increment_alphanumeric_strings() {
        assert_eq!(increment(&s("a")).unwrap(), s("b"));
        assert_eq!(increment(&s("z")).unwrap(), s("aa"));
        assert_eq!(increment(&s("Az")).unwrap(), s("Ba"));
        assert_eq!(increment(&s("zz")).unwrap(), s("aaa"));
        assert_eq!(increment(&s("Zz")).unwrap(), s("AAa"));
        assert_eq!(increment(&s("a9")).unwrap(), s("b0"));
        assert_eq!(increment(&s("x-9")).unwrap(), s("x-10"));
        assert_eq!(increment(&s("hi!")).unwrap(), s("hi!"));
    }

    #[test]
    fn test_decrement() {
        assert_eq!(decrement(&Value::Null).unwrap(), Value::Null);
        assert_eq!(decrement(&Value::Integer(0)).unwrap(), Value::Integer(-1));
        assert_eq!(decrement(&Value::Float(1.5)).unwrap(), Value::Float(0.5));
        assert_eq!(decrement(&Value::Boolean(true)).unwrap(), Value::Boolean(true));
        assert_eq!(decrement(&s("")).unwrap(), Value::Integer(-1));
        assert_eq!(decrement(&s("10")).unwrap(), Value::Integer(9));
        assert_eq!(decrement(&s("b")).unwrap(), s("b"));
        assert!(matches!(decrement(&Value::Array(Array::new())), Err(VMError::TypeMismatch(_))));
    }

    #[test]
    fn test_loose_equality() {
        assert!(compare_eq(&Value::Integer(42), &s("42")));
        assert!(compare_eq(&Value::Integer(42), &Value::Float(42.0)));
        assert!(compare_eq(&s("1e3"), &s("1000")));
        assert!(compare_eq(&Value::Null, &Value::Boolean(false)));
        assert!(compare_eq(&Value::Null, &s("")));
        assert!(compare_eq(&s("abc"), &Value::Boolean(true)));
        assert!(compare_eq(&Value::Null, &Value::Integer(0)));

        assert!(!compare_eq(&Value::Integer(0), &s("a")));
        assert!(!compare_eq(&Value::Null, &s("a")));
        assert!(!compare_eq(&s("abc"), &s("ABC")));
        assert!(!compare_eq(&Value::Float(f64::NAN), &Value::Float(f64::NAN)));
    }

    #[test]
    fn test_ordering_predicates() {
        assert!(compare_lt(&Value::Integer(5), &Value::Integer(10)).unwrap());
        assert!(compare_le(&Value::Integer(5), &Value::Integer(5)).unwrap());
        assert!(compare_gt(&s("10"), &s("9")).unwrap());
        assert!(compare_lt(&s("10"), &s("9a")).unwrap());
        assert!(compare_ge(&Value::Float(2.5), &s("2.5")).unwrap());
        assert!(compare_gt(&Value::Boolean(true), &Value::Null).unwrap());
        assert!(!compare_gt(&Value::Integer(1), &Value::Integer(1)).unwrap());
    }

    #[test]
    fn test_nan_makes_orderings_false() {
        let nan = Value::Float(f64::NAN);
        let one = Value::Integer(1);
        assert!(!compare_lt(&nan, &one).unwrap());
        assert!(!compare_le(&nan, &one).unwrap());
        assert!(!compare_gt(&nan, &one).unwrap());
        assert!(!compare_ge(&nan, &one).unwrap());
    }

    #[test]
    fn test_array_comparison() {
        let small = Value::Array(Array::from_values(vec![Value::Integer(1)]));
        let big = Value::Array(Array::from_values(vec![Value::Integer(1), Value::Integer(2)]));
        let same = Value::Array(Array::from_values(vec![s("1")]));

        assert!(compare_lt(&small, &big).unwrap());
        assert!(compare_eq(&small, &same));
        assert!(!compare_eq(&small, &big));
    }

    #[test]
    fn test_null_against_arrays_by_truthiness() {
        let empty = Value::Array(Array::new());
        let full = Value::Array(Array::from_values(vec![Value::Integer(1)]));

        assert!(compare_eq(&Value::Null, &empty));
        assert!(compare_eq(&empty, &Value::Null));
        assert!(compare_le(&Value::Null, &empty).unwrap());
        assert!(!compare_eq(&Value::Null, &full));
        assert!(compare_lt(&Value::Null, &full).unwrap());
        assert!(compare_gt(&full, &Value::Null).unwrap());
    }

    #[test]
    fn test_self_containing_arrays_do_not_recurse_forever() {
        let a = Array::new();
        a.put("0", Value::Array(a.clone()));
        let b = Array::new();
        b.put("0", Value::Array(b.clone()));
        let (a, b) = (Value::Array(a), Value::Array(b));

        assert!(compare_eq(&a, &a));
        assert!(!compare_eq(&a, &b));
        assert!(matches!(compare_le(&a, &b), Err(VMError::TypeMismatch(_))));
    }

    #[test]
    fn test_shared_nested_arrays_compare_normally() {
        let inner = Value::Array(Array::from_values(vec![Value::Integer(1)]));
        let left = Value::Array(Array::from_values(vec![inner.clone(), inner.clone()]));
        let right = Value::Array(Array::from_values(vec![inner.clone(), inner]));
        assert!(compare_eq(&left, &right));
    }

    #[test]
    fn test_oversized_integer_prefix_becomes_float() {
        assert_eq!(
            add(&s("99999999999999999999abc"), &Value::Integer(0)).unwrap(),
            s("99999999999999999999abc0")
        );
        assert_eq!(
            subtract(&s("99999999999999999999abc"), &Value::Integer(0)).unwrap(),
            Value::Float(1e20)
        );
    }

    #[test]
    fn test_incomparable_values() {
        let list = Value::list(vec![Value::Integer(1)]);
        assert!(matches!(compare_lt(&list, &Value::Integer(1)), Err(VMError::TypeMismatch(_))));
        assert!(!compare_eq(&list, &Value::Integer(1)));
        assert!(compare_eq(&list, &Value::list(vec![s("1")])));
    }
}
