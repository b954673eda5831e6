//! Status dictionaries and per-model parameter schemas.
//!
//! Every node exposes its parameters and state as a [`Status`], i.e., a mapping from names to
//! [`Value`]s. Before a status reaches a node, it is checked against the [`ParamSpec`] schema
//! declared by the node's model: unknown keys, type mismatches and out-of-range values are
//! rejected with [`KernelError::InvalidParameter`].
//!
//! # Examples
//!
//! ```
//! use rusty_nest::status;
//! use rusty_nest::status::Value;
//!
//! let status = status! { "mean" => 200.0, "std" => 50.0, "n_events" => 0 };
//! assert_eq!(status.get("mean"), Some(&Value::Double(200.0)));
//! assert_eq!(status.get("n_events").and_then(Value::as_i64), Some(0));
//! ```
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::KernelError;

/// A status dictionary.
pub type Status = BTreeMap<String, Value>;

/// Builds a [`Status`] from `key => value` pairs.
#[macro_export]
macro_rules! status {
    () => { $crate::status::Status::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut status = $crate::status::Status::new();
        $( status.insert(String::from($key), $crate::status::Value::from($value)); )+
        status
    }};
}

/// A loosely typed parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    Ints(Vec<i64>),
    Doubles(Vec<f64>),
    Strings(Vec<String>),
    Dict(Status),
}

impl Value {
    /// Returns the value as a float, accepting integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(x) => Some(*x),
            Value::Int(x) => Some(*x as f64),
            _ => None,
        }
    }

    /// Returns the value as an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(x) => Some(x.as_str()),
            _ => None,
        }
    }

    /// Returns the value as a vector of floats, accepting integer vectors (and empty vectors of any kind).
    pub fn as_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            Value::Doubles(x) => Some(x.clone()),
            Value::Ints(x) => Some(x.iter().map(|&v| v as f64).collect()),
            Value::Strings(x) if x.is_empty() => Some(vec![]),
            _ => None,
        }
    }

    /// Returns the value as a vector of strings (an empty vector of any kind is accepted).
    pub fn as_string_vec(&self) -> Option<Vec<String>> {
        match self {
            Value::Strings(x) => Some(x.clone()),
            Value::Doubles(x) if x.is_empty() => Some(vec![]),
            Value::Ints(x) if x.is_empty() => Some(vec![]),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Status> {
        match self {
            Value::Dict(x) => Some(x),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(x: bool) -> Self {
        Value::Bool(x)
    }
}

impl From<i64> for Value {
    fn from(x: i64) -> Self {
        Value::Int(x)
    }
}

impl From<i32> for Value {
    fn from(x: i32) -> Self {
        Value::Int(x as i64)
    }
}

impl From<u64> for Value {
    fn from(x: u64) -> Self {
        Value::Int(x as i64)
    }
}

impl From<usize> for Value {
    fn from(x: usize) -> Self {
        Value::Int(x as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Double(x)
    }
}

impl From<&str> for Value {
    fn from(x: &str) -> Self {
        Value::Str(x.to_string())
    }
}

impl From<String> for Value {
    fn from(x: String) -> Self {
        Value::Str(x)
    }
}

impl From<Vec<i64>> for Value {
    fn from(x: Vec<i64>) -> Self {
        Value::Ints(x)
    }
}

impl From<Vec<f64>> for Value {
    fn from(x: Vec<f64>) -> Self {
        Value::Doubles(x)
    }
}

impl From<Vec<String>> for Value {
    fn from(x: Vec<String>) -> Self {
        Value::Strings(x)
    }
}

impl From<Vec<&str>> for Value {
    fn from(x: Vec<&str>) -> Self {
        Value::Strings(x.into_iter().map(String::from).collect())
    }
}

impl From<Status> for Value {
    fn from(x: Status) -> Self {
        Value::Dict(x)
    }
}

/// The declared type of a model parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Bool,
    Int,
    Double,
    Str,
    Doubles,
    Strings,
    Dict,
}

/// Who may write a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Writable on instances and model defaults.
    ReadWrite,
    /// Writable on model defaults only (`set_defaults`, `copy_model`).
    DefaultsOnly,
    /// Never writable.
    ReadOnly,
}

/// Where a status is being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Instance,
    Defaults,
}

/// The declaration of a single model parameter: name, type and valid (closed) range.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamType,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub access: Access,
}

impl ParamSpec {
    pub const fn new(name: &'static str, kind: ParamType) -> Self {
        ParamSpec {
            name,
            kind,
            min: None,
            max: None,
            access: Access::ReadWrite,
        }
    }

    pub const fn double(name: &'static str) -> Self {
        Self::new(name, ParamType::Double)
    }

    pub const fn int(name: &'static str) -> Self {
        Self::new(name, ParamType::Int)
    }

    pub const fn boolean(name: &'static str) -> Self {
        Self::new(name, ParamType::Bool)
    }

    pub const fn string(name: &'static str) -> Self {
        Self::new(name, ParamType::Str)
    }

    pub const fn doubles(name: &'static str) -> Self {
        Self::new(name, ParamType::Doubles)
    }

    pub const fn strings(name: &'static str) -> Self {
        Self::new(name, ParamType::Strings)
    }

    pub const fn dict(name: &'static str) -> Self {
        Self::new(name, ParamType::Dict)
    }

    /// Sets the smallest valid value (inclusive).
    pub const fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    /// Sets the largest valid value (inclusive).
    pub const fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub const fn read_only(mut self) -> Self {
        self.access = Access::ReadOnly;
        self
    }

    pub const fn defaults_only(mut self) -> Self {
        self.access = Access::DefaultsOnly;
        self
    }

    fn check_range(&self, model: &str, x: f64) -> Result<(), KernelError> {
        if !x.is_finite() {
            return Err(KernelError::InvalidParameter(format!(
                "{}.{} must be finite, got {}",
                model, self.name, x
            )));
        }
        if let Some(min) = self.min {
            if x < min {
                return Err(KernelError::InvalidParameter(format!(
                    "{}.{} must be at least {}, got {}",
                    model, self.name, min, x
                )));
            }
        }
        if let Some(max) = self.max {
            if x > max {
                return Err(KernelError::InvalidParameter(format!(
                    "{}.{} must be at most {}, got {}",
                    model, self.name, max, x
                )));
            }
        }
        Ok(())
    }

    /// Check a single value against the declared type and range.
    pub fn check(&self, model: &str, value: &Value) -> Result<(), KernelError> {
        let type_error = || {
            KernelError::InvalidParameter(format!(
                "{}.{} expects {:?}, got {:?}",
                model, self.name, self.kind, value
            ))
        };
        match self.kind {
            ParamType::Bool => value.as_bool().map(|_| ()).ok_or_else(type_error),
            ParamType::Str => value.as_str().map(|_| ()).ok_or_else(type_error),
            ParamType::Int => {
                let x = value.as_i64().ok_or_else(type_error)?;
                self.check_range(model, x as f64)
            }
            ParamType::Double => {
                let x = value.as_f64().ok_or_else(type_error)?;
                self.check_range(model, x)
            }
            ParamType::Doubles => value
                .as_f64_vec()
                .ok_or_else(type_error)?
                .into_iter()
                .try_for_each(|x| self.check_range(model, x)),
            ParamType::Strings => value.as_string_vec().map(|_| ()).ok_or_else(type_error),
            ParamType::Dict => value.as_dict().map(|_| ()).ok_or_else(type_error),
        }
    }
}

/// Validate a status dictionary against a model schema.
///
/// The function returns an error for unknown keys, values of the wrong type, values out of range
/// and for keys which cannot be written in the given scope.
pub fn validate(
    schema: &[ParamSpec],
    model: &str,
    status: &Status,
    scope: Scope,
) -> Result<(), KernelError> {
    for (key, value) in status.iter() {
        let spec = schema
            .iter()
            .find(|spec| spec.name == key)
            .ok_or_else(|| {
                KernelError::InvalidParameter(format!("{} has no parameter '{}'", model, key))
            })?;
        match (spec.access, scope) {
            (Access::ReadOnly, _) => {
                return Err(KernelError::InvalidParameter(format!(
                    "{}.{} is read-only",
                    model, key
                )))
            }
            (Access::DefaultsOnly, Scope::Instance) => {
                return Err(KernelError::InvalidParameter(format!(
                    "{}.{} can only be set as a model default using set_defaults or copy_model",
                    model, key
                )))
            }
            _ => {}
        }
        spec.check(model, value)?;
    }
    Ok(())
}

/// Read an optional float from a status, assuming it has been validated.
pub fn get_f64(status: &Status, key: &str) -> Option<f64> {
    status.get(key).and_then(Value::as_f64)
}

pub fn get_i64(status: &Status, key: &str) -> Option<i64> {
    status.get(key).and_then(Value::as_i64)
}

pub fn get_bool(status: &Status, key: &str) -> Option<bool> {
    status.get(key).and_then(Value::as_bool)
}

pub fn get_string(status: &Status, key: &str) -> Option<String> {
    status.get(key).and_then(Value::as_str).map(String::from)
}

pub fn get_f64_vec(status: &Status, key: &str) -> Option<Vec<f64>> {
    status.get(key).and_then(Value::as_f64_vec)
}

pub fn get_string_vec(status: &Status, key: &str) -> Option<Vec<String>> {
    status.get(key).and_then(Value::as_string_vec)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &[ParamSpec] = &[
        ParamSpec::double("tau_m").min(0.0),
        ParamSpec::int("n_events").min(0.0),
        ParamSpec::boolean("individual_spike_trains").defaults_only(),
        ParamSpec::dict("events").read_only(),
        ParamSpec::doubles("spike_times").min(0.0),
    ];

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::from(3).as_f64(), Some(3.0));
        assert_eq!(Value::from(3.5).as_i64(), None);
        assert_eq!(
            Value::from(vec![1_i64, 2]).as_f64_vec(),
            Some(vec![1.0, 2.0])
        );
        assert_eq!(Value::from("in").as_str(), Some("in"));
        assert_eq!(Value::from(true).as_bool(), Some(true));
    }

    #[test]
    fn test_untagged_serde() {
        let status = status! { "tau_m" => 10.0, "n_events" => 3, "port_name" => "in" };
        let json = serde_json::to_string(&status).unwrap();
        let parsed: Status = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, status);
    }

    #[test]
    fn test_validate() {
        assert!(validate(SCHEMA, "m", &status! { "tau_m" => 10.0 }, Scope::Instance).is_ok());
        assert!(validate(SCHEMA, "m", &status! { "tau_m" => 10 }, Scope::Instance).is_ok());
        assert!(matches!(
            validate(SCHEMA, "m", &status! { "tau_m" => -1.0 }, Scope::Instance),
            Err(KernelError::InvalidParameter(_))
        ));
        assert!(matches!(
            validate(SCHEMA, "m", &status! { "n_events" => 1.5 }, Scope::Instance),
            Err(KernelError::InvalidParameter(_))
        ));
        assert!(matches!(
            validate(SCHEMA, "m", &status! { "V_m" => 1.5 }, Scope::Instance),
            Err(KernelError::InvalidParameter(_))
        ));
        assert!(matches!(
            validate(SCHEMA, "m", &status! { "spike_times" => vec![1.0, -2.0] }, Scope::Instance),
            Err(KernelError::InvalidParameter(_))
        ));
        assert!(matches!(
            validate(SCHEMA, "m", &status! { "tau_m" => f64::NAN }, Scope::Instance),
            Err(KernelError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_validate_access() {
        let status = status! { "individual_spike_trains" => false };
        assert!(validate(SCHEMA, "m", &status, Scope::Defaults).is_ok());
        assert!(validate(SCHEMA, "m", &status, Scope::Instance).is_err());

        let status = status! { "events" => Status::new() };
        assert!(validate(SCHEMA, "m", &status, Scope::Defaults).is_err());
    }
}
