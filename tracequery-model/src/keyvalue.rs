use std::fmt;

/// The value part of a span or process tag.
///
/// A tagged union over the five value types the wire model knows about.
/// Equality is by type and value, so `I64(1)` and `F64(1.0)` are distinct.
#[derive(Clone, Debug, PartialEq)]
pub enum TagValue {
    /// A string value.
    String(String),
    /// A boolean value.
    Bool(bool),
    /// A signed 64-bit integer value.
    I64(i64),
    /// A 64-bit float value.
    F64(f64),
    /// An opaque byte blob, base64-encoded on JSON surfaces.
    Binary(Vec<u8>),
}

impl TagValue {
    /// The external name of this value's type.
    pub fn type_name(&self) -> &'static str {
        match self {
            TagValue::String(_) => "string",
            TagValue::Bool(_) => "bool",
            TagValue::I64(_) => "int64",
            TagValue::F64(_) => "float64",
            TagValue::Binary(_) => "binary",
        }
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::String(v) => v.fmt(f),
            TagValue::Bool(v) => v.fmt(f),
            TagValue::I64(v) => v.fmt(f),
            TagValue::F64(v) => v.fmt(f),
            TagValue::Binary(v) => write!(f, "{v:02x?}"),
        }
    }
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        TagValue::String(value.to_owned())
    }
}

impl From<String> for TagValue {
    fn from(value: String) -> Self {
        TagValue::String(value)
    }
}

impl From<bool> for TagValue {
    fn from(value: bool) -> Self {
        TagValue::Bool(value)
    }
}

impl From<i64> for TagValue {
    fn from(value: i64) -> Self {
        TagValue::I64(value)
    }
}

impl From<f64> for TagValue {
    fn from(value: f64) -> Self {
        TagValue::F64(value)
    }
}

/// A key-value pair attached to spans, processes and log events.
///
/// # Examples
///
/// ```
/// use tracequery_model::KeyValue;
///
/// let kv = KeyValue::string("http.method", "GET");
/// assert_eq!(kv.key, "http.method");
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct KeyValue {
    /// The tag name.
    pub key: String,
    /// The tag value.
    pub value: TagValue,
}

impl KeyValue {
    /// Create a key-value pair from anything convertible to a [`TagValue`].
    pub fn new(key: impl Into<String>, value: impl Into<TagValue>) -> Self {
        KeyValue {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create a pair holding a string value.
    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        KeyValue {
            key: key.into(),
            value: TagValue::String(value.into()),
        }
    }

    /// Create a pair holding a boolean value.
    pub fn bool(key: impl Into<String>, value: bool) -> Self {
        KeyValue {
            key: key.into(),
            value: TagValue::Bool(value),
        }
    }

    /// Create a pair holding a signed 64-bit integer value.
    pub fn i64(key: impl Into<String>, value: i64) -> Self {
        KeyValue {
            key: key.into(),
            value: TagValue::I64(value),
        }
    }

    /// Create a pair holding a 64-bit float value.
    pub fn f64(key: impl Into<String>, value: f64) -> Self {
        KeyValue {
            key: key.into(),
            value: TagValue::F64(value),
        }
    }

    /// Create a pair holding an opaque byte blob.
    pub fn binary(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        KeyValue {
            key: key.into(),
            value: TagValue::Binary(value.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_by_key_type_and_value() {
        assert_eq!(KeyValue::i64("k", 1), KeyValue::i64("k", 1));
        assert_ne!(KeyValue::i64("k", 1), KeyValue::f64("k", 1.0));
        assert_ne!(KeyValue::string("k", "1"), KeyValue::i64("k", 1));
        assert_ne!(KeyValue::i64("a", 1), KeyValue::i64("b", 1));
    }

    #[test]
    fn type_names_match_the_wire_model() {
        let cases = [
            (TagValue::from("x"), "string"),
            (TagValue::from(true), "bool"),
            (TagValue::from(7i64), "int64"),
            (TagValue::from(0.5f64), "float64"),
            (TagValue::Binary(vec![1, 2]), "binary"),
        ];
        for (value, name) in cases {
            assert_eq!(value.type_name(), name);
        }
    }
}
