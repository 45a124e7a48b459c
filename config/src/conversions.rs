//! # Number Conversions
//!
//! Lenient numeric coercions used by the typed getters and the list getters.
//!
//! Narrowing follows two's-complement truncation for integers and
//! saturating truncation for floats, so `4.9` becomes `4` and an `i64` that
//! does not fit an `i32` wraps.

use crate::value::Value;

pub fn to_int(value: &Value) -> i32 {
    match value {
        Value::Integer(i) => *i as i32,
        Value::Float(f) => *f as i32,
        Value::String(s) => s.parse().unwrap_or(0),
        _ => 0
    }
}

pub fn to_long(value: &Value) -> i64 {
    match value {
        Value::Integer(i) => *i,
        Value::Float(f) => *f as i64,
        Value::String(s) => s.parse().unwrap_or(0),
        _ => 0
    }
}

pub fn to_double(value: &Value) -> f64 {
    match value {
        Value::Integer(i) => *i as f64,
        Value::Float(f) => *f,
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0
    }
}

pub fn to_float(value: &Value) -> f32 {
    to_double(value) as f32
}

pub fn to_short(value: &Value) -> i16 {
    match value {
        Value::Integer(i) => *i as i16,
        Value::Float(f) => *f as i32 as i16,
        Value::String(s) => s.parse().unwrap_or(0),
        _ => 0
    }
}

pub fn to_byte(value: &Value) -> i8 {
    match value {
        Value::Integer(i) => *i as i8,
        Value::Float(f) => *f as i32 as i8,
        Value::String(s) => s.parse().unwrap_or(0),
        _ => 0
    }
}

/// Keeps every element `coerce` accepts, in order. Rejected elements are
/// dropped, so the result may be shorter than the input.
pub fn coerce_list<T>(items: &[Value], coerce: impl Fn(&Value) -> Option<T>) -> Vec<T> {
    items.iter().filter_map(coerce).collect()
}

pub fn string_item(value: &Value) -> Option<String> {
    value.is_primitive().then(|| value.to_string())
}

pub fn int_item(value: &Value) -> Option<i32> {
    match value {
        Value::String(s) => s.parse().ok(),
        v if v.is_number() => Some(to_int(v)),
        _ => None
    }
}

pub fn long_item(value: &Value) -> Option<i64> {
    match value {
        Value::String(s) => s.parse().ok(),
        v if v.is_number() => Some(to_long(v)),
        _ => None
    }
}

pub fn double_item(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        v if v.is_number() => Some(to_double(v)),
        _ => None
    }
}

pub fn float_item(value: &Value) -> Option<f32> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        v if v.is_number() => Some(to_float(v)),
        _ => None
    }
}

pub fn short_item(value: &Value) -> Option<i16> {
    match value {
        Value::String(s) => s.parse().ok(),
        v if v.is_number() => Some(to_short(v)),
        _ => None
    }
}

pub fn byte_item(value: &Value) -> Option<i8> {
    match value {
        Value::String(s) => s.parse().ok(),
        v if v.is_number() => Some(to_byte(v)),
        _ => None
    }
}

/// Only the exact literals `true` and `false` are accepted from strings.
pub fn bool_item(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s == "true" => Some(true),
        Value::String(s) if s == "false" => Some(false),
        _ => None
    }
}

pub fn char_item(value: &Value) -> Option<char> {
    match value {
        Value::String(s) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(c),
                _ => None
            }
        }
        v if v.is_number() => char::from_u32(u32::from(to_int(v) as u16)),
        _ => None
    }
}
