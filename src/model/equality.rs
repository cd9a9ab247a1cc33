//! Structural equality used by duplicate detection
//!
//! - null equals null
//! - values of different variants are never equal
//! - records compare field by field and must share a type
//! - lists compare element-wise and must share an element type
//! - objects compare by identity
//! - scalars use their natural equality, except that NaN equals NaN
//!
//! There is deliberately no matching hash function. Callers group by a
//! partition key and scan linearly.

use super::value::Value;

pub fn structural_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x == y || (x.is_nan() && y.is_nan()),
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Enum(x), Value::Enum(y)) => x == y,
        (Value::List(x), Value::List(y)) => {
            x.element_type == y.element_type
                && x.items.len() == y.items.len()
                && x.items
                    .iter()
                    .zip(y.items.iter())
                    .all(|(l, r)| structural_eq(l, r))
        }
        (Value::Record(x), Value::Record(y)) => {
            x.type_name == y.type_name
                && x.fields.len() == y.fields.len()
                && x.fields.iter().all(|(name, l)| {
                    y.fields.get(name).map_or(false, |r| structural_eq(l, r))
                })
        }
        (Value::Object(x), Value::Object(y)) => x == y,
        (Value::Event(x), Value::Event(y)) => std::sync::Arc::ptr_eq(&x.callbacks, &y.callbacks),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EnumValue, ListValue, ObjectRef, Record};

    fn strings(items: &[&str]) -> Value {
        Value::List(ListValue::typed(
            "string",
            items.iter().map(|s| Value::str(s)).collect(),
        ))
    }

    #[test]
    fn test_null_equals_null() {
        assert!(structural_eq(&Value::Null, &Value::Null));
        assert!(!structural_eq(&Value::Null, &Value::Int(0)));
    }

    #[test]
    fn test_variant_mismatch_never_equal() {
        assert!(!structural_eq(&Value::Int(1), &Value::Float(1.0)));
        assert!(!structural_eq(&Value::str("1"), &Value::Int(1)));
    }

    #[test]
    fn test_nan_equals_nan() {
        let nan = Value::Float(f64::NAN);
        assert!(structural_eq(&nan, &Value::Float(f64::NAN)));
        assert!(!structural_eq(&nan, &Value::Float(0.0)));
        assert!(structural_eq(&Value::Float(0.5), &Value::Float(0.5)));
    }

    #[test]
    fn test_lists_compare_element_wise() {
        assert!(structural_eq(&strings(&["x"]), &strings(&["x"])));
        assert!(!structural_eq(&strings(&["x"]), &strings(&["y"])));
        assert!(!structural_eq(&strings(&["x"]), &strings(&["x", "x"])));
    }

    #[test]
    fn test_lists_of_different_element_types_differ() {
        let a = Value::List(ListValue::typed("string", vec!["x".into()]));
        let b = Value::List(ListValue::typed("Tag", vec!["x".into()]));
        assert!(!structural_eq(&a, &b));
    }

    #[test]
    fn test_nested_lists() {
        let inner = |s: &str| strings(&[s]);
        let a = Value::List(ListValue::typed("string[]", vec![inner("a"), inner("b")]));
        let b = Value::List(ListValue::typed("string[]", vec![inner("a"), inner("b")]));
        let c = Value::List(ListValue::typed("string[]", vec![inner("a"), inner("c")]));
        assert!(structural_eq(&a, &b));
        assert!(!structural_eq(&a, &c));
    }

    #[test]
    fn test_records_compare_structurally() {
        let p = |x| Value::Record(Record::from_pairs("Point", vec![("x", Value::Int(x))]));
        assert!(structural_eq(&p(1), &p(1)));
        assert!(!structural_eq(&p(1), &p(2)));

        let q = Value::Record(Record::from_pairs("Other", vec![("x", Value::Int(1))]));
        assert!(!structural_eq(&p(1), &q));
    }

    #[test]
    fn test_objects_compare_by_identity() {
        let a = ObjectRef::new("Thing", "same");
        let b = ObjectRef::new("Thing", "same");
        assert!(structural_eq(&Value::Object(a.clone()), &Value::Object(a.clone())));
        assert!(!structural_eq(&Value::Object(a), &Value::Object(b)));
    }

    #[test]
    fn test_enums_compare_type_and_value() {
        let a = Value::Enum(EnumValue::new("Color", 1));
        let b = Value::Enum(EnumValue::new("Color", 1));
        let c = Value::Enum(EnumValue::new("Shape", 1));
        assert!(structural_eq(&a, &b));
        assert!(!structural_eq(&a, &c));
    }
}
