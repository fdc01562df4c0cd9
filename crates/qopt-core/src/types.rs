//! # Scalar Type System
//!
//! A closed enumeration of the column/constant types the optimizer reasons about.
//! The optimizer never evaluates expressions; it only needs enough type information
//! to derive predicate types bottom-up, to gate constant casts, and to pick the
//! narrowest column when a rule needs an arbitrary cheap column (e.g. `COUNT(*)`
//! rewrites probing for the smallest scannable slot).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar types supported by the operator algebra.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    Boolean,
    TinyInt,
    Int,
    BigInt,
    Float,
    Double,
    Varchar,
    Date,
    Datetime,
}

impl ScalarType {
    /// Exact type match. Constant casts are skipped entirely when the source
    /// already matches the destination.
    pub fn matches(&self, other: ScalarType) -> bool {
        *self == other
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, ScalarType::TinyInt | ScalarType::Int | ScalarType::BigInt)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, ScalarType::Varchar)
    }

    pub fn is_date(&self) -> bool {
        matches!(self, ScalarType::Date)
    }

    /// Float and Double. Constant casts refuse to touch floating types because an
    /// equality comparison after the cast is unreliable.
    pub fn is_floating(&self) -> bool {
        matches!(self, ScalarType::Float | ScalarType::Double)
    }

    pub fn is_scalar(&self) -> bool {
        true
    }

    /// Storage width in bytes of a single slot of this type. Used by
    /// [`crate::utils::find_smallest_column_ref`] to pick the cheapest column.
    pub fn slot_size(&self) -> usize {
        match self {
            ScalarType::Boolean | ScalarType::TinyInt => 1,
            ScalarType::Int | ScalarType::Float | ScalarType::Date => 4,
            ScalarType::BigInt | ScalarType::Double | ScalarType::Datetime => 8,
            ScalarType::Varchar => 16,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarType::Boolean => "BOOLEAN",
            ScalarType::TinyInt => "TINYINT",
            ScalarType::Int => "INT",
            ScalarType::BigInt => "BIGINT",
            ScalarType::Float => "FLOAT",
            ScalarType::Double => "DOUBLE",
            ScalarType::Varchar => "VARCHAR",
            ScalarType::Date => "DATE",
            ScalarType::Datetime => "DATETIME",
        };
        write!(f, "{}", name)
    }
}
