use crate::opt::Opt;

/// A scalar bound to a positional placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Uuid(uuid::Uuid),
    DateTime(chrono::DateTime<chrono::Utc>),
}

impl Value {
    /// True for the bare `%` wildcard, which LIKE patterns inline instead of binding.
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Value::String(s) if s == "%")
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub(crate) fn is_float(&self) -> bool {
        matches!(self, Value::F64(_))
    }
}

macro_rules! value_from {
    ($variant:ident: $($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::$variant(value.into())
                }
            }
        )*
    };
}

value_from!(I64: i8, i16, i32, i64, u8, u16, u32);
value_from!(F64: f32, f64);
value_from!(Bool: bool);
value_from!(String: String, &str);
value_from!(Uuid: uuid::Uuid);
value_from!(DateTime: chrono::DateTime<chrono::Utc>);

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Self::String(value.clone())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Converts a struct field into the value written by INSERT and UPDATE.
///
/// `None` means "not set": the column is left out of the generated statement.
/// Only [`Opt`] can report `None`; plain fields are always written.
pub trait ToValue {
    fn to_value(&self) -> Option<Value>;
}

impl<T: Clone + Into<Value>> ToValue for Opt<T> {
    fn to_value(&self) -> Option<Value> {
        self.get().cloned().map(Into::into)
    }
}

impl<T: Clone + Into<Value>> ToValue for Option<T> {
    fn to_value(&self) -> Option<Value> {
        Some(self.clone().map_or(Value::Null, Into::into))
    }
}

macro_rules! to_value_scalar {
    ($($ty:ty),*) => {
        $(
            impl ToValue for $ty {
                fn to_value(&self) -> Option<Value> {
                    Some(self.clone().into())
                }
            }
        )*
    };
}

to_value_scalar!(
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    f32,
    f64,
    bool,
    String,
    uuid::Uuid,
    chrono::DateTime<chrono::Utc>
);
