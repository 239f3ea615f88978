//! # Required Fields
//!
//! A fail-fast presence check. This is not an all-errors validator: the first
//! absent field, in the order supplied, is the only one reported.

use crate::combinators::is_truthy;
use crate::types::{FailureRecord, Result};

/// Decides whether a field value counts as supplied
pub trait Presence {
    fn is_present(&self) -> bool;
}

impl Presence for str {
    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

impl Presence for String {
    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

impl Presence for bool {
    fn is_present(&self) -> bool {
        *self
    }
}

macro_rules! impl_presence_for_numbers {
    ($($number:ty),*) => {
        $(
            impl Presence for $number {
                fn is_present(&self) -> bool {
                    *self != (0 as $number)
                }
            }
        )*
    };
}

impl_presence_for_numbers!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl Presence for f32 {
    fn is_present(&self) -> bool {
        *self != 0.0 && !self.is_nan()
    }
}

impl Presence for f64 {
    fn is_present(&self) -> bool {
        *self != 0.0 && !self.is_nan()
    }
}

impl<T> Presence for Vec<T> {
    fn is_present(&self) -> bool {
        true
    }
}

impl<T: Presence> Presence for Option<T> {
    fn is_present(&self) -> bool {
        self.as_ref().map(Presence::is_present).unwrap_or(false)
    }
}

impl<T: Presence + ?Sized> Presence for &T {
    fn is_present(&self) -> bool {
        (**self).is_present()
    }
}

impl Presence for serde_json::Value {
    fn is_present(&self) -> bool {
        is_truthy(self)
    }
}

fn missing(name: &str) -> FailureRecord {
    FailureRecord::validation(format!("Missing required argument '{}'", name))
}

/// Checks every field in order and fails on the first absent one
///
/// # Example
/// ```
/// use failure_core::require_fields;
///
/// let name = "x";
/// let email: Option<String> = None;
/// let err = require_fields(&[("name", &name), ("email", &email)]).unwrap_err();
/// assert_eq!(err.message(), "Missing required argument 'email'");
/// ```
pub fn require_fields(fields: &[(&str, &dyn Presence)]) -> Result<()> {
    match fields.iter().find(|(_, value)| !value.is_present()) {
        Some((name, _)) => Err(missing(name)),
        None => Ok(()),
    }
}

/// Checks that each key of `keys` holds a truthy value in `object`, in the order of `keys`
pub fn require_keys(
    object: &serde_json::Map<String, serde_json::Value>,
    keys: &[&str],
) -> Result<()> {
    match keys
        .iter()
        .find(|key| !object.get(**key).map(is_truthy).unwrap_or(false))
    {
        Some(key) => Err(missing(key)),
        None => Ok(()),
    }
}

/// Checks local variables by name: `require_fields!(user_id, email)?`
#[macro_export]
macro_rules! require_fields {
    ($($field:ident),+ $(,)?) => {
        $crate::validation::require_fields(&[
            $((stringify!($field), &$field as &dyn $crate::validation::Presence)),+
        ])
    };
}
