//! Attribute value conversion between typed values and stored BSON.
//!
//! Native value categories map straight onto BSON scalars. The store has no
//! 8-bit or 32-bit float representation, so bytes widen to `Int32` and
//! floats to `Double` on the way out and narrow again on the way back.
//! Custom values travel in their canonical string form, which must
//! round-trip exactly. Conversion failures are hard failures of the whole
//! load or save.

use bson::{Binary, Bson, spec::BinarySubtype};

use crate::error::{GraphStoreError, GraphStoreResult};
use crate::meta::ValueType;
use crate::object::Value;

fn mismatch(value_type: &ValueType, found: &dyn std::fmt::Debug) -> GraphStoreError {
    GraphStoreError::Conversion(format!("expected {value_type:?} value, found {found:?}"))
}

/// Converts a typed attribute value into its stored form.
pub fn to_bson(value_type: &ValueType, value: &Value) -> GraphStoreResult<Bson> {
    Ok(match (value_type, value) {
        (_, Value::Null) => Bson::Null,
        (ValueType::Bool, Value::Bool(v)) => Bson::Boolean(*v),
        (ValueType::Byte, Value::Byte(v)) => Bson::Int32(*v as i32),
        (ValueType::Int, Value::Int(v)) => Bson::Int32(*v),
        (ValueType::Long, Value::Long(v)) => Bson::Int64(*v),
        (ValueType::Float, Value::Float(v)) => Bson::Double(*v as f64),
        (ValueType::Double, Value::Double(v)) => Bson::Double(*v),
        (ValueType::String, Value::String(v)) => Bson::String(v.clone()),
        (ValueType::Bytes, Value::Bytes(v)) => {
            Bson::Binary(Binary { subtype: BinarySubtype::Generic, bytes: v.clone() })
        }
        (ValueType::Date, Value::Date(ms)) => Bson::DateTime(bson::DateTime::from_millis(*ms)),
        (ValueType::Custom, value) => Bson::String(to_literal(value_type, value)?),
        (value_type, value) => return Err(mismatch(value_type, &value)),
    })
}

/// Converts a stored value back into its typed form.
pub fn from_bson(value_type: &ValueType, stored: &Bson) -> GraphStoreResult<Value> {
    Ok(match (value_type, stored) {
        (_, Bson::Null) => Value::Null,
        (ValueType::Bool, Bson::Boolean(v)) => Value::Bool(*v),
        (ValueType::Byte, Bson::Int32(v)) => Value::Byte(*v as i8),
        (ValueType::Int, Bson::Int32(v)) => Value::Int(*v),
        (ValueType::Int, Bson::Int64(v)) => Value::Int(*v as i32),
        (ValueType::Long, Bson::Int64(v)) => Value::Long(*v),
        (ValueType::Long, Bson::Int32(v)) => Value::Long(*v as i64),
        (ValueType::Float, Bson::Double(v)) => Value::Float(*v as f32),
        (ValueType::Double, Bson::Double(v)) => Value::Double(*v),
        (ValueType::Double, Bson::Int32(v)) => Value::Double(*v as f64),
        (ValueType::Double, Bson::Int64(v)) => Value::Double(*v as f64),
        (ValueType::String, Bson::String(v)) => Value::String(v.clone()),
        (ValueType::Bytes, Bson::Binary(binary)) => Value::Bytes(binary.bytes.clone()),
        (ValueType::Date, Bson::DateTime(dt)) => Value::Date(dt.timestamp_millis()),
        (ValueType::Date, Bson::Int64(ms)) => Value::Date(*ms),
        (ValueType::Custom, Bson::String(literal)) => from_literal(value_type, literal)?,
        (value_type, stored) => return Err(mismatch(value_type, &stored)),
    })
}

/// Converts a typed value to its canonical, round-trippable string form.
pub fn to_literal(value_type: &ValueType, value: &Value) -> GraphStoreResult<String> {
    Ok(match (value_type, value) {
        (ValueType::Bool, Value::Bool(v)) => v.to_string(),
        (ValueType::Byte, Value::Byte(v)) => v.to_string(),
        (ValueType::Int, Value::Int(v)) => v.to_string(),
        (ValueType::Long, Value::Long(v)) => v.to_string(),
        (ValueType::Float, Value::Float(v)) => v.to_string(),
        (ValueType::Double, Value::Double(v)) => v.to_string(),
        (ValueType::String, Value::String(v)) => v.clone(),
        (ValueType::Date, Value::Date(ms)) => ms.to_string(),
        // Custom values are carried in canonical form already.
        (ValueType::Custom, Value::String(v)) => v.clone(),
        (value_type, value) => return Err(mismatch(value_type, &value)),
    })
}

/// Parses a canonical string back into its typed value form.
pub fn from_literal(value_type: &ValueType, literal: &str) -> GraphStoreResult<Value> {
    let parse_error =
        || GraphStoreError::Conversion(format!("cannot parse '{literal}' as {value_type:?}"));

    Ok(match value_type {
        ValueType::Bool => Value::Bool(literal.parse().map_err(|_| parse_error())?),
        ValueType::Byte => Value::Byte(literal.parse().map_err(|_| parse_error())?),
        ValueType::Int => Value::Int(literal.parse().map_err(|_| parse_error())?),
        ValueType::Long => Value::Long(literal.parse().map_err(|_| parse_error())?),
        ValueType::Float => Value::Float(literal.parse().map_err(|_| parse_error())?),
        ValueType::Double => Value::Double(literal.parse().map_err(|_| parse_error())?),
        ValueType::String => Value::String(literal.to_string()),
        ValueType::Date => Value::Date(literal.parse().map_err(|_| parse_error())?),
        ValueType::Custom => Value::String(literal.to_string()),
        ValueType::Bytes => return Err(parse_error()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_scalars_round_trip() {
        let cases = [
            (ValueType::Bool, Value::Bool(true)),
            (ValueType::Int, Value::Int(42)),
            (ValueType::Long, Value::Long(1 << 40)),
            (ValueType::Double, Value::Double(2.5)),
            (ValueType::String, Value::String("junit".into())),
            (ValueType::Bytes, Value::Bytes(vec![1, 2, 3])),
            (ValueType::Date, Value::Date(1_300_000_000_000)),
        ];

        for (value_type, value) in cases {
            let stored = to_bson(&value_type, &value).unwrap();
            assert_eq!(from_bson(&value_type, &stored).unwrap(), value);
        }
    }

    #[test]
    fn byte_and_float_narrow_on_the_way_back() {
        let stored = to_bson(&ValueType::Byte, &Value::Byte(-7)).unwrap();
        assert_eq!(stored, Bson::Int32(-7));
        assert_eq!(from_bson(&ValueType::Byte, &stored).unwrap(), Value::Byte(-7));

        let stored = to_bson(&ValueType::Float, &Value::Float(1.5)).unwrap();
        assert_eq!(stored, Bson::Double(1.5));
        assert_eq!(from_bson(&ValueType::Float, &stored).unwrap(), Value::Float(1.5));
    }

    #[test]
    fn custom_values_are_stored_as_canonical_strings() {
        let value = Value::String("point(3,4)".into());
        let stored = to_bson(&ValueType::Custom, &value).unwrap();
        assert_eq!(stored, Bson::String("point(3,4)".into()));
        assert_eq!(from_bson(&ValueType::Custom, &stored).unwrap(), value);
    }

    #[test]
    fn mismatched_value_is_a_hard_failure() {
        assert!(to_bson(&ValueType::Int, &Value::String("nope".into())).is_err());
        assert!(from_bson(&ValueType::Bool, &Bson::Int32(1)).is_err());
        assert!(from_literal(&ValueType::Int, "twelve").is_err());
    }
}
