//! Runtime values for the script language.

use serde_json::Value as JsonValue;
use std::fmt;

/// A script runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    /// Signed integer.
    Int(i64),
    /// Double-precision float.
    Float(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    Str(String),
    /// No value (statements, void calls).
    Unit,
}

impl ScriptValue {
    /// Type name reported alongside captured values.
    pub fn type_name(&self) -> &'static str {
        match self {
            ScriptValue::Int(_) => "Int",
            ScriptValue::Float(_) => "Double",
            ScriptValue::Bool(_) => "Bool",
            ScriptValue::Str(_) => "String",
            ScriptValue::Unit => "Unit",
        }
    }

    /// Convert into the JSON value currency used at the runtime-fn seam.
    pub fn to_json(&self) -> JsonValue {
        match self {
            ScriptValue::Int(num) => JsonValue::from(*num),
            ScriptValue::Float(num) => JsonValue::from(*num),
            ScriptValue::Bool(flag) => JsonValue::from(*flag),
            ScriptValue::Str(text) => JsonValue::from(text.clone()),
            ScriptValue::Unit => JsonValue::Null,
        }
    }

    /// Reconstruct a value coming back from a runtime function.
    ///
    /// Anything without a script representation (arrays, objects) collapses
    /// to its JSON rendering as a string.
    pub fn from_json(value: &JsonValue) -> ScriptValue {
        match value {
            JsonValue::Null => ScriptValue::Unit,
            JsonValue::Bool(flag) => ScriptValue::Bool(*flag),
            JsonValue::Number(num) => {
                if let Some(int) = num.as_i64() {
                    ScriptValue::Int(int)
                } else {
                    ScriptValue::Float(num.as_f64().unwrap_or(f64::NAN))
                }
            }
            JsonValue::String(text) => ScriptValue::Str(text.clone()),
            other => ScriptValue::Str(other.to_string()),
        }
    }

    /// Numeric view for arithmetic with int-to-float promotion.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScriptValue::Int(num) => Some(*num as f64),
            ScriptValue::Float(num) => Some(*num),
            _ => None,
        }
    }
}

impl fmt::Display for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptValue::Int(num) => write!(f, "{}", num),
            ScriptValue::Float(num) => write!(f, "{}", num),
            ScriptValue::Bool(flag) => write!(f, "{}", flag),
            ScriptValue::Str(text) => write!(f, "{}", text),
            ScriptValue::Unit => write!(f, "()"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_roundtrip_preserves_scalars() {
        for value in [
            ScriptValue::Int(42),
            ScriptValue::Float(2.5),
            ScriptValue::Bool(true),
            ScriptValue::Str("text".into()),
            ScriptValue::Unit,
        ] {
            assert_eq!(ScriptValue::from_json(&value.to_json()), value);
        }
    }

    #[test]
    fn integral_json_numbers_stay_ints() {
        assert_eq!(ScriptValue::from_json(&json!(7)), ScriptValue::Int(7));
        assert_eq!(ScriptValue::from_json(&json!(7.5)), ScriptValue::Float(7.5));
    }
}
