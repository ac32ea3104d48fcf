//! The five fixture procedures.
//!
//! Every procedure is a pure function of its arguments. Argument checking
//! produces `XmlRpcError` variants that the registry turns into faults.

use crate::error::{Result, XmlRpcError};
use crate::value::Value;

fn expect_args<'a, const N: usize>(method: &str, params: &'a [Value]) -> Result<&'a [Value; N]> {
    params
        .try_into()
        .map_err(|_| XmlRpcError::ArgumentCount {
            method: method.to_string(),
            expected: N,
            given: params.len(),
        })
}

fn type_error(method: &str, expected: &str, actual: &Value) -> XmlRpcError {
    XmlRpcError::TypeMismatch {
        method: method.to_string(),
        expected: expected.to_string(),
        actual: actual.type_name().to_string(),
    }
}

fn expect_str<'a>(method: &str, value: &'a Value) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| type_error(method, "string", value))
}

/// Numeric operand after promotion.
enum Operands {
    Integers { a: i64, b: i64, wide: bool },
    Doubles(f64, f64),
}

fn numeric_operands(method: &str, a: &Value, b: &Value) -> Result<Operands> {
    let numeric = |v: &Value| matches!(v, Value::Int(_) | Value::I8(_) | Value::Double(_));
    if !numeric(a) {
        return Err(type_error(method, "int, i8 or double", a));
    }
    if !numeric(b) {
        return Err(type_error(method, "int, i8 or double", b));
    }

    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => Ok(Operands::Integers {
            a: x,
            b: y,
            wide: matches!(a, Value::I8(_)) || matches!(b, Value::I8(_)),
        }),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => Ok(Operands::Doubles(x, y)),
            // both operands were checked numeric above
            _ => Err(XmlRpcError::Other(format!("{}(): operands are not numeric", method))),
        },
    }
}

fn arithmetic(
    method: &str,
    params: &[Value],
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value> {
    let [a, b] = expect_args::<2>(method, params)?;
    match numeric_operands(method, a, b)? {
        Operands::Integers { a, b, wide } => {
            let result = int_op(a, b).ok_or_else(|| XmlRpcError::Overflow {
                method: method.to_string(),
            })?;
            if wide {
                Ok(Value::I8(result))
            } else {
                Ok(Value::integer(result))
            }
        }
        Operands::Doubles(a, b) => Ok(Value::Double(float_op(a, b))),
    }
}

/// `add(a, b)` returns `a + b`.
pub fn add(params: &[Value]) -> Result<Value> {
    arithmetic("add", params, i64::checked_add, |a, b| a + b)
}

/// `subtract(a, b)` returns `a - b`.
pub fn subtract(params: &[Value]) -> Result<Value> {
    arithmetic("subtract", params, i64::checked_sub, |a, b| a - b)
}

/// Resolve a possibly negative position against `len`.
fn resolve_position(method: &str, i: i64, len: usize) -> Result<usize> {
    let out_of_range = || XmlRpcError::IndexOutOfRange {
        method: method.to_string(),
        index: i,
        len,
    };
    let len_i = i64::try_from(len).map_err(|_| out_of_range())?;
    let pos = if i < 0 { len_i + i } else { i };
    if (0..len_i).contains(&pos) {
        usize::try_from(pos).map_err(|_| out_of_range())
    } else {
        Err(out_of_range())
    }
}

/// `index(a, i)` returns element `i` of array or string `a`.
///
/// Negative positions count from the end. Strings are indexed by character.
pub fn index(params: &[Value]) -> Result<Value> {
    const METHOD: &str = "index";
    let [seq, i] = expect_args::<2>(METHOD, params)?;
    let i = match i {
        Value::Int(i) => i64::from(*i),
        Value::I8(i) => *i,
        other => return Err(type_error(METHOD, "int", other)),
    };

    match seq {
        Value::Array(items) => {
            let pos = resolve_position(METHOD, i, items.len())?;
            Ok(items[pos].clone())
        }
        Value::String(s) => {
            let len = s.chars().count();
            let pos = resolve_position(METHOD, i, len)?;
            let ch = s.chars().nth(pos).ok_or(XmlRpcError::IndexOutOfRange {
                method: METHOD.to_string(),
                index: i,
                len,
            })?;
            Ok(Value::String(ch.to_string()))
        }
        other => Err(type_error(METHOD, "array or string", other)),
    }
}

/// `upper(s)` returns `s` upper-cased.
pub fn upper(params: &[Value]) -> Result<Value> {
    let [s] = expect_args::<1>("upper", params)?;
    Ok(Value::String(expect_str("upper", s)?.to_uppercase()))
}

/// `title(s)` returns `s` title-cased.
pub fn title(params: &[Value]) -> Result<Value> {
    let [s] = expect_args::<1>("title", params)?;
    Ok(Value::String(title_case(expect_str("title", s)?)))
}

/// Upper-case a letter that does not follow another letter, lower-case one
/// that does. Everything that is not a letter ends the word.
///
/// "Letter" means `char::is_alphabetic`, which includes uncased scripts: an
/// ideograph continues a word, so `"中a"` stays `"中a"`. Python's `str.title`
/// only tracks cased characters and would give `"中A"`.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if in_word {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(ch);
            in_word = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i32]) -> Value {
        Value::Array(values.iter().copied().map(Value::Int).collect())
    }

    #[test]
    fn test_add() {
        assert_eq!(add(&[Value::Int(2), Value::Int(3)]).unwrap(), Value::Int(5));
        assert_eq!(add(&[Value::Int(-2), Value::Int(-3)]).unwrap(), Value::Int(-5));
        assert_eq!(
            add(&[Value::Double(1.5), Value::Int(2)]).unwrap(),
            Value::Double(3.5)
        );
        assert_eq!(add(&[Value::I8(2), Value::Int(3)]).unwrap(), Value::I8(5));
    }

    #[test]
    fn test_add_widens_past_32_bits() {
        assert_eq!(
            add(&[Value::Int(i32::MAX), Value::Int(1)]).unwrap(),
            Value::I8(i64::from(i32::MAX) + 1)
        );
        assert!(matches!(
            add(&[Value::I8(i64::MAX), Value::Int(1)]),
            Err(XmlRpcError::Overflow { .. })
        ));
    }

    #[test]
    fn test_add_rejects_non_numeric() {
        assert!(matches!(
            add(&[Value::from("a"), Value::Int(1)]),
            Err(XmlRpcError::TypeMismatch { .. })
        ));
        assert!(matches!(
            add(&[Value::Int(1), Value::Bool(true)]),
            Err(XmlRpcError::TypeMismatch { .. })
        ));
        assert!(matches!(
            add(&[Value::Int(1)]),
            Err(XmlRpcError::ArgumentCount {
                expected: 2,
                given: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_subtract_inverts_add() {
        for (a, b) in [(7, 3), (-4, 9), (0, 0), (1_000_000, -1_000_000)] {
            let sum = add(&[Value::Int(a), Value::Int(b)]).unwrap();
            assert_eq!(subtract(&[sum, Value::Int(b)]).unwrap(), Value::Int(a));
        }
        assert_eq!(
            subtract(&[Value::Double(0.5), Value::Double(1.0)]).unwrap(),
            Value::Double(-0.5)
        );
    }

    #[test]
    fn test_index_array() {
        let seq = ints(&[10, 20, 30]);
        assert_eq!(index(&[seq.clone(), Value::Int(1)]).unwrap(), Value::Int(20));
        assert_eq!(index(&[seq.clone(), Value::Int(-1)]).unwrap(), Value::Int(30));
        assert!(matches!(
            index(&[seq.clone(), Value::Int(5)]),
            Err(XmlRpcError::IndexOutOfRange { index: 5, len: 3, .. })
        ));
        assert!(matches!(
            index(&[seq, Value::Int(-4)]),
            Err(XmlRpcError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_index_string() {
        assert_eq!(
            index(&[Value::from("abc"), Value::Int(0)]).unwrap(),
            Value::from("a")
        );
        assert_eq!(
            index(&[Value::from("héllo"), Value::Int(1)]).unwrap(),
            Value::from("é")
        );
        assert!(index(&[Value::from(""), Value::Int(0)]).is_err());
    }

    #[test]
    fn test_index_type_errors() {
        assert!(matches!(
            index(&[Value::Int(5), Value::Int(0)]),
            Err(XmlRpcError::TypeMismatch { .. })
        ));
        assert!(matches!(
            index(&[ints(&[1]), Value::from("0")]),
            Err(XmlRpcError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_upper() {
        assert_eq!(upper(&[Value::from("hello")]).unwrap(), Value::from("HELLO"));
        assert_eq!(upper(&[Value::from("")]).unwrap(), Value::from(""));
        let once = upper(&[Value::from("MiXeD 123 straße")]).unwrap();
        assert_eq!(upper(&[once.clone()]).unwrap(), once);
        assert!(upper(&[Value::Int(1)]).is_err());
    }

    #[test]
    fn test_title() {
        assert_eq!(
            title(&[Value::from("hello world")]).unwrap(),
            Value::from("Hello World")
        );
        assert_eq!(title_case("HELLO wORLD"), "Hello World");
        assert_eq!(title_case("they're 3rd"), "They'Re 3Rd");
        assert_eq!(title_case(""), "");
        assert_eq!(title_case("  spaced\tout "), "  Spaced\tOut ");
        assert_eq!(title_case("中a"), "中a");
        assert_eq!(title_case("中 a"), "中 A");
    }

    #[test]
    fn test_title_idempotent() {
        for s in ["hello world", "Already Titled", "one-two three"] {
            let once = title_case(s);
            assert_eq!(title_case(&once), once);
        }
    }
}
