//! Optional column values.
//!
//! [`Opt<T>`] is how an entity says "this field was not set". Absent fields are
//! left out of INSERT and UPDATE statements, a SQL `NULL` scans into an absent
//! value, and an absent value serializes as `null`. A present zero (`0`, `""`,
//! `false`) is a real value and is always written.

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Error as _, Serialize, Serializer};
use sqlx::{Database, Decode, Type, ValueRef as _};

/// A value paired with a presence flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Opt<T> {
    value: T,
    present: bool,
}

pub type OptInt = Opt<i64>;
pub type OptFloat = Opt<f64>;
pub type OptString = Opt<String>;
pub type OptBool = Opt<bool>;
pub type OptTime = Opt<chrono::DateTime<chrono::Utc>>;

impl<T> Opt<T> {
    /// A present value.
    pub const fn new(value: T) -> Self {
        Self {
            value,
            present: true,
        }
    }

    pub fn is_present(&self) -> bool {
        self.present
    }

    pub fn is_absent(&self) -> bool {
        !self.present
    }

    /// The value if present.
    pub fn get(&self) -> Option<&T> {
        self.present.then_some(&self.value)
    }

    /// The stored value; the zero value when absent.
    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn set(&mut self, value: T) {
        self.value = value;
        self.present = true;
    }

    pub fn into_inner(self) -> T {
        self.value
    }

    pub fn into_option(self) -> Option<T> {
        self.present.then_some(self.value)
    }
}

impl<T: Default> Opt<T> {
    /// An absent value holding `T::default()`.
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn from_option(value: Option<T>) -> Self {
        value.map_or_else(Self::absent, Self::new)
    }

    /// Marks the value absent and resets it to zero.
    pub fn clear(&mut self) {
        *self = Self::absent();
    }
}

impl<T> From<T> for Opt<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Opt<String> {
    fn from(value: &str) -> Self {
        Self::new(value.to_owned())
    }
}

/// Scalars an [`Opt`] can serialize, with a hook to reject values that have no
/// valid encoding.
pub trait Scalar {
    fn check_encodable(&self) -> Result<(), String> {
        Ok(())
    }
}

macro_rules! scalar {
    ($($ty:ty),*) => {
        $( impl Scalar for $ty {} )*
    };
}

scalar!(
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    u64,
    bool,
    String,
    uuid::Uuid,
    chrono::DateTime<chrono::Utc>,
    chrono::NaiveDateTime,
    chrono::NaiveDate
);

impl Scalar for f64 {
    fn check_encodable(&self) -> Result<(), String> {
        if self.is_finite() {
            Ok(())
        } else {
            Err(format!("cannot encode non-finite float {}", self))
        }
    }
}

impl Scalar for f32 {
    fn check_encodable(&self) -> Result<(), String> {
        f64::from(*self).check_encodable()
    }
}

impl<T: Serialize + Scalar> Serialize for Opt<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.get() {
            None => serializer.serialize_none(),
            Some(value) => {
                value.check_encodable().map_err(S::Error::custom)?;
                serializer.serialize_some(value)
            }
        }
    }
}

impl<'de, T: Deserialize<'de> + Default> Deserialize<'de> for Opt<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(Self::from_option)
    }
}

impl<DB: Database, T: Type<DB>> Type<DB> for Opt<T> {
    fn type_info() -> DB::TypeInfo {
        T::type_info()
    }

    fn compatible(ty: &DB::TypeInfo) -> bool {
        T::compatible(ty)
    }
}

impl<'r, DB: Database, T: Decode<'r, DB> + Default> Decode<'r, DB> for Opt<T> {
    fn decode(value: <DB as Database>::ValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        if value.is_null() {
            return Ok(Self::absent());
        }
        T::decode(value).map(Self::new)
    }
}
