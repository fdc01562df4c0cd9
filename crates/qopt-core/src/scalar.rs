//! # Scalar Operators
//!
//! Scalar operators are immutable expression trees that appear inside relational
//! operators: filter predicates, join conditions, projection definitions, and
//! aggregate calls. The tree is a closed enumeration:
//!
//! - **Column references** carry a stable numeric id assigned by the analyzer.
//!   Ids are unique for the lifetime of a query and are never reused, so identity
//!   comparisons and set membership go through the id alone.
//! - **Constants** are typed literals; SQL NULL is an explicit [`Datum::Null`].
//! - **Binary predicates** are the six comparison operators.
//! - **Compound predicates** are AND/OR (two children) and NOT (one child).
//! - **Calls** are named functions, used for projection expressions and aggregates.
//!
//! A tree's type is derived bottom-up: predicates and compounds are always
//! Boolean, everything else reports its declared type. `Display` renders SQL
//! literal text; the constant rendering is load-bearing for the lossless-cast
//! round-trip check in [`crate::utils::try_cast_constant`].

use crate::types::ScalarType;
use chrono::{NaiveDate, NaiveDateTime};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A typed constant value.
///
/// `OrderedFloat` wraps the floating variants so that constants can participate
/// in memo deduplication (Eq + Hash over the whole operator tree).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Datum {
    /// SQL NULL.
    Null,
    Boolean(bool),
    TinyInt(i8),
    Int(i32),
    BigInt(i64),
    Float(OrderedFloat<f32>),
    Double(OrderedFloat<f64>),
    Varchar(String),
    Date(NaiveDate),
    Datetime(NaiveDateTime),
}

impl Datum {
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Null => write!(f, "NULL"),
            Datum::Boolean(v) => write!(f, "{}", if *v { "TRUE" } else { "FALSE" }),
            Datum::TinyInt(v) => write!(f, "{}", v),
            Datum::Int(v) => write!(f, "{}", v),
            Datum::BigInt(v) => write!(f, "{}", v),
            Datum::Float(v) => write!(f, "{}", v),
            Datum::Double(v) => write!(f, "{}", v),
            Datum::Varchar(v) => write!(f, "{}", v),
            Datum::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            Datum::Datetime(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// A reference to a column with a stable numeric id.
///
/// Identity is the id alone: the analyzer guarantees ids are unique per query
/// and never mutated, so name and type are carried for diagnostics and type
/// derivation but do not participate in equality or hashing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnRef {
    pub id: u32,
    pub name: String,
    pub ty: ScalarType,
}

impl ColumnRef {
    pub fn new(id: u32, name: impl Into<String>, ty: ScalarType) -> Self {
        Self {
            id,
            name: name.into(),
            ty,
        }
    }
}

impl PartialEq for ColumnRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ColumnRef {}

impl Hash for ColumnRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for ColumnRef {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ColumnRef {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id)
    }
}

/// An ordered set of column ids.
///
/// Groups in the memo are equivalence classes with identical output column
/// sets; this is the structure those sets are compared with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRefSet {
    ids: BTreeSet<u32>,
}

impl ColumnRefSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: &ColumnRef) {
        self.ids.insert(column.id);
    }

    pub fn insert_id(&mut self, id: u32) {
        self.ids.insert(id);
    }

    pub fn contains(&self, column: &ColumnRef) -> bool {
        self.ids.contains(&column.id)
    }

    pub fn union_with(&mut self, other: &ColumnRefSet) {
        self.ids.extend(other.ids.iter().copied());
    }

    pub fn is_subset_of(&self, other: &ColumnRefSet) -> bool {
        self.ids.is_subset(&other.ids)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.ids.iter().copied()
    }
}

impl<'a> FromIterator<&'a ColumnRef> for ColumnRefSet {
    fn from_iter<I: IntoIterator<Item = &'a ColumnRef>>(iter: I) -> Self {
        let mut set = ColumnRefSet::new();
        for c in iter {
            set.insert(c);
        }
        set
    }
}

/// Comparison operators for binary predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryKind {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for BinaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryKind::Eq => "=",
            BinaryKind::Ne => "!=",
            BinaryKind::Lt => "<",
            BinaryKind::Le => "<=",
            BinaryKind::Gt => ">",
            BinaryKind::Ge => ">=",
        };
        write!(f, "{}", s)
    }
}

/// Connectives for compound predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompoundKind {
    And,
    Or,
    Not,
}

impl CompoundKind {
    pub fn is_and(&self) -> bool {
        matches!(self, CompoundKind::And)
    }

    pub fn is_or(&self) -> bool {
        matches!(self, CompoundKind::Or)
    }
}

/// Scalar expression tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarOperator {
    ColumnRef(ColumnRef),
    Constant { value: Datum, ty: ScalarType },
    BinaryPredicate {
        kind: BinaryKind,
        left: Box<ScalarOperator>,
        right: Box<ScalarOperator>,
    },
    /// AND/OR carry exactly two children, NOT carries one. The constructors
    /// below maintain that invariant.
    CompoundPredicate {
        kind: CompoundKind,
        children: Vec<ScalarOperator>,
    },
    Call {
        name: String,
        args: Vec<ScalarOperator>,
        ret: ScalarType,
    },
}

impl ScalarOperator {
    pub fn column(column: ColumnRef) -> Self {
        ScalarOperator::ColumnRef(column)
    }

    pub fn constant(value: Datum, ty: ScalarType) -> Self {
        ScalarOperator::Constant { value, ty }
    }

    pub fn binary(kind: BinaryKind, left: ScalarOperator, right: ScalarOperator) -> Self {
        ScalarOperator::BinaryPredicate {
            kind,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn and(left: ScalarOperator, right: ScalarOperator) -> Self {
        ScalarOperator::CompoundPredicate {
            kind: CompoundKind::And,
            children: vec![left, right],
        }
    }

    pub fn or(left: ScalarOperator, right: ScalarOperator) -> Self {
        ScalarOperator::CompoundPredicate {
            kind: CompoundKind::Or,
            children: vec![left, right],
        }
    }

    pub fn not(child: ScalarOperator) -> Self {
        ScalarOperator::CompoundPredicate {
            kind: CompoundKind::Not,
            children: vec![child],
        }
    }

    pub fn call(name: impl Into<String>, args: Vec<ScalarOperator>, ret: ScalarType) -> Self {
        ScalarOperator::Call {
            name: name.into(),
            args,
            ret,
        }
    }

    /// The type of this tree, derived bottom-up. Predicates are Boolean by
    /// construction; leaves report their declared types.
    pub fn ty(&self) -> ScalarType {
        match self {
            ScalarOperator::ColumnRef(c) => c.ty,
            ScalarOperator::Constant { ty, .. } => *ty,
            ScalarOperator::BinaryPredicate { .. } => ScalarType::Boolean,
            ScalarOperator::CompoundPredicate { .. } => ScalarType::Boolean,
            ScalarOperator::Call { ret, .. } => *ret,
        }
    }

    /// Visit each direct child. Binary predicates box their children, so a
    /// uniform slice view is not available; tree walks go through this.
    pub fn for_each_child<'a>(&'a self, mut f: impl FnMut(&'a ScalarOperator)) {
        match self {
            ScalarOperator::ColumnRef(_) | ScalarOperator::Constant { .. } => {}
            ScalarOperator::BinaryPredicate { left, right, .. } => {
                f(left);
                f(right);
            }
            ScalarOperator::CompoundPredicate { children, .. } => {
                for c in children {
                    f(c);
                }
            }
            ScalarOperator::Call { args, .. } => {
                for a in args {
                    f(a);
                }
            }
        }
    }

    pub fn is_column_ref(&self) -> bool {
        matches!(self, ScalarOperator::ColumnRef(_))
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, ScalarOperator::Constant { .. })
    }

    /// True iff the tree contains at least one column reference. Constants and
    /// constant-only calls are not variable.
    pub fn is_variable(&self) -> bool {
        match self {
            ScalarOperator::ColumnRef(_) => true,
            ScalarOperator::Constant { .. } => false,
            ScalarOperator::BinaryPredicate { left, right, .. } => {
                left.is_variable() || right.is_variable()
            }
            ScalarOperator::CompoundPredicate { children, .. } => {
                children.iter().any(|c| c.is_variable())
            }
            ScalarOperator::Call { args, .. } => args.iter().any(|a| a.is_variable()),
        }
    }

    pub fn as_column_ref(&self) -> Option<&ColumnRef> {
        match self {
            ScalarOperator::ColumnRef(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<(&Datum, ScalarType)> {
        match self {
            ScalarOperator::Constant { value, ty } => Some((value, *ty)),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarOperator::ColumnRef(c) => write!(f, "{}", c),
            ScalarOperator::Constant { value, .. } => write!(f, "{}", value),
            ScalarOperator::BinaryPredicate { kind, left, right } => {
                write!(f, "{} {} {}", left, kind, right)
            }
            ScalarOperator::CompoundPredicate { kind, children } => match kind {
                CompoundKind::Not => write!(f, "NOT ({})", children[0]),
                CompoundKind::And => write!(f, "({}) AND ({})", children[0], children[1]),
                CompoundKind::Or => write!(f, "({}) OR ({})", children[0], children[1]),
            },
            ScalarOperator::Call { name, args, .. } => {
                write!(f, "{}(", name)?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(id: u32, name: &str) -> ColumnRef {
        ColumnRef::new(id, name, ScalarType::Int)
    }

    #[test]
    fn column_ref_identity_is_id_only() {
        let a = ColumnRef::new(1, "a", ScalarType::Int);
        let renamed = ColumnRef::new(1, "a_alias", ScalarType::BigInt);
        assert_eq!(a, renamed);

        let mut set = ColumnRefSet::new();
        set.insert(&a);
        assert!(set.contains(&renamed));
    }

    #[test]
    fn predicate_type_is_boolean() {
        let pred = ScalarOperator::binary(
            BinaryKind::Eq,
            ScalarOperator::column(col(1, "a")),
            ScalarOperator::constant(Datum::Int(5), ScalarType::Int),
        );
        assert_eq!(pred.ty(), ScalarType::Boolean);
        assert_eq!(ScalarOperator::not(pred).ty(), ScalarType::Boolean);
    }

    #[test]
    fn is_variable_walks_the_tree() {
        let constant = ScalarOperator::constant(Datum::Int(1), ScalarType::Int);
        assert!(!constant.is_variable());

        let pred = ScalarOperator::binary(
            BinaryKind::Lt,
            ScalarOperator::column(col(7, "x")),
            constant.clone(),
        );
        assert!(pred.is_variable());
        assert!(!ScalarOperator::binary(BinaryKind::Lt, constant.clone(), constant).is_variable());
    }

    #[test]
    fn datum_display_renders_sql_literals() {
        assert_eq!(Datum::Null.to_string(), "NULL");
        assert_eq!(Datum::Boolean(true).to_string(), "TRUE");
        assert_eq!(
            Datum::Date(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()).to_string(),
            "2023-01-01"
        );
    }
}
