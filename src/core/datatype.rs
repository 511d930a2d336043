//! Field datatypes understood by recipes

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The kind of value a recipe field holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Datatype {
    /// Free-form text
    String,
    /// Whole number, kept as text until the payload is built
    Int,
    /// `true` / `false`
    Bool,
    /// Secret text, never decorated
    Password,
    /// Object storage bucket, stored with the project bucket prefix
    Bucket,
    /// Host name, stored with the project subdomain appended
    Domain,
    /// Path to a file supplied by the user
    File,
}

impl Datatype {
    /// Get the string representation used in recipe files
    pub fn as_str(&self) -> &'static str {
        match self {
            Datatype::String => "string",
            Datatype::Int => "int",
            Datatype::Bool => "bool",
            Datatype::Password => "password",
            Datatype::Bucket => "bucket",
            Datatype::Domain => "domain",
            Datatype::File => "file",
        }
    }

    /// Get all datatypes
    pub fn all() -> &'static [Datatype] {
        &[
            Datatype::String,
            Datatype::Int,
            Datatype::Bool,
            Datatype::Password,
            Datatype::Bucket,
            Datatype::Domain,
            Datatype::File,
        ]
    }

    /// Convert a canonical value into its install payload representation.
    ///
    /// Ints and bools that parse become JSON numbers and booleans. Anything
    /// else (including an unparsable int) stays a string so nothing is lost.
    pub fn to_payload(&self, canonical: &str) -> Value {
        match self {
            Datatype::Int => canonical
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(canonical.to_string())),
            Datatype::Bool => match canonical.trim() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => Value::String(canonical.to_string()),
            },
            _ => Value::String(canonical.to_string()),
        }
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Datatype {
    type Err = DatatypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "string" | "text" => Ok(Datatype::String),
            "int" | "integer" => Ok(Datatype::Int),
            "bool" | "boolean" => Ok(Datatype::Bool),
            "password" => Ok(Datatype::Password),
            "bucket" => Ok(Datatype::Bucket),
            "domain" => Ok(Datatype::Domain),
            "file" => Ok(Datatype::File),
            _ => Err(DatatypeParseError(s.to_string())),
        }
    }
}

impl Serialize for Datatype {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Datatype {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error returned for an unknown datatype name
#[derive(Debug, Error)]
#[error("invalid datatype: '{0}' (valid: string, int, bool, password, bucket, domain, file)")]
pub struct DatatypeParseError(pub String);
