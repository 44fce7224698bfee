//! Descriptor values and their resolved form
//!
//! A descriptor carries [`Value`] trees: literals, references to other
//! descriptors, lists and ordered maps. Both the runtime resolver and the
//! graph compiler walk these trees through the same [`walk`] function; they
//! differ only in the [`ValueSink`] they plug in.

use crate::{Instance, Result, WiringError};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;
use std::sync::Arc;

// =============================================================================
// Descriptor values
// =============================================================================

/// Scalar (or pre-built) value stored directly in a descriptor.
#[derive(Debug, Clone)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// A live object handed in by the caller. Resolvable at runtime, but
    /// the compiler cannot write it out.
    Object(Instance),
}

impl Literal {
    /// Short type label used in error messages.
    pub fn type_label(&self) -> &'static str {
        match self {
            Literal::Null => "null",
            Literal::Bool(_) => "bool",
            Literal::Int(_) => "int",
            Literal::Float(_) => "float",
            Literal::Str(_) => "string",
            Literal::Object(_) => "object",
        }
    }
}

/// Raw value attached to a descriptor parameter or property.
#[derive(Debug, Clone)]
pub enum Value {
    Literal(Literal),
    /// Names another descriptor by id. Holds no ownership of the target.
    Reference(String),
    List(Vec<Value>),
    /// Entries in insertion order.
    Map(Vec<(String, Value)>),
}

impl Value {
    /// A reference to the descriptor with the given id.
    #[inline]
    pub fn reference(id: impl Into<String>) -> Self {
        Value::Reference(id.into())
    }

    /// Build a map value, keeping the first position of a repeated key and
    /// the last value assigned to it.
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let mut out: Vec<(String, Value)> = Vec::new();
        for (key, value) in entries {
            upsert(&mut out, key.into(), value);
        }
        Value::Map(out)
    }

    /// Build a list value.
    pub fn list<I: IntoIterator<Item = Value>>(items: I) -> Self {
        Value::List(items.into_iter().collect())
    }

    /// The null literal.
    #[inline]
    pub fn null() -> Self {
        Value::Literal(Literal::Null)
    }

    /// A pre-built object literal.
    #[inline]
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Value::Literal(Literal::Object(Instance::new(value)))
    }
}

/// Insert or replace `key`, keeping its original position.
pub(crate) fn upsert<V>(entries: &mut Vec<(String, V)>, key: String, value: V) {
    match entries.iter_mut().find(|(k, _)| *k == key) {
        Some(slot) => slot.1 = value,
        None => entries.push((key, value)),
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Literal(Literal::Str(s.to_owned()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Literal(Literal::Str(s))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Literal(Literal::Bool(b))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Literal(Literal::Int(n))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Literal(Literal::Int(i64::from(n)))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Literal(Literal::Float(n))
    }
}

impl From<Literal> for Value {
    fn from(literal: Literal) -> Self {
        Value::Literal(literal)
    }
}

impl From<Instance> for Value {
    fn from(instance: Instance) -> Self {
        Value::Literal(Literal::Object(instance))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

// =============================================================================
// Shared value-tree visitor
// =============================================================================

/// Strategy plugged into [`walk`].
///
/// The runtime resolver produces [`Resolved`] values; the compiler produces
/// expressions. Children are visited before their parent collection.
pub trait ValueSink {
    type Output;

    fn literal(&mut self, literal: &Literal) -> Result<Self::Output>;

    fn reference(&mut self, id: &str) -> Result<Self::Output>;

    fn list(&mut self, items: Vec<Self::Output>) -> Result<Self::Output>;

    fn map(&mut self, entries: Vec<(String, Self::Output)>) -> Result<Self::Output>;
}

/// Walk a value tree depth-first, in declaration order.
pub fn walk<S: ValueSink + ?Sized>(value: &Value, sink: &mut S) -> Result<S::Output> {
    match value {
        Value::Literal(literal) => sink.literal(literal),
        Value::Reference(id) => sink.reference(id),
        Value::List(items) => {
            let items = items
                .iter()
                .map(|item| walk(item, sink))
                .collect::<Result<Vec<_>>>()?;
            sink.list(items)
        }
        Value::Map(entries) => {
            let entries = entries
                .iter()
                .map(|(key, item)| Ok((key.clone(), walk(item, sink)?)))
                .collect::<Result<Vec<_>>>()?;
            sink.map(entries)
        }
    }
}

// =============================================================================
// Resolved values
// =============================================================================

/// A fully resolved value: what constructors and property setters receive.
#[derive(Debug, Clone, Default)]
pub enum Resolved {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Object(Instance),
    List(Vec<Resolved>),
    /// Entries in insertion order.
    Map(Vec<(String, Resolved)>),
}

impl Resolved {
    /// Short type label used in error messages.
    pub fn type_label(&self) -> &'static str {
        match self {
            Resolved::Null => "null",
            Resolved::Bool(_) => "bool",
            Resolved::Int(_) => "int",
            Resolved::Float(_) => "float",
            Resolved::Str(_) => "string",
            Resolved::Object(_) => "object",
            Resolved::List(_) => "list",
            Resolved::Map(_) => "map",
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Resolved::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Resolved::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Resolved::Object(instance) => Some(instance),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Resolved]> {
        match self {
            Resolved::List(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a map entry by key.
    pub fn get(&self, key: &str) -> Option<&Resolved> {
        match self {
            Resolved::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Keys of a map value, in order.
    pub fn keys(&self) -> Vec<&str> {
        match self {
            Resolved::Map(entries) => entries.iter().map(|(k, _)| k.as_str()).collect(),
            _ => Vec::new(),
        }
    }
}

impl PartialEq for Resolved {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Resolved::Null, Resolved::Null) => true,
            (Resolved::Bool(a), Resolved::Bool(b)) => a == b,
            (Resolved::Int(a), Resolved::Int(b)) => a == b,
            (Resolved::Float(a), Resolved::Float(b)) => a == b,
            (Resolved::Str(a), Resolved::Str(b)) => a == b,
            (Resolved::Object(a), Resolved::Object(b)) => a.ptr_eq(b),
            (Resolved::List(a), Resolved::List(b)) => a == b,
            (Resolved::Map(a), Resolved::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl From<&str> for Resolved {
    fn from(s: &str) -> Self {
        Resolved::Str(s.to_owned())
    }
}

impl From<Instance> for Resolved {
    fn from(instance: Instance) -> Self {
        Resolved::Object(instance)
    }
}

impl From<Literal> for Resolved {
    fn from(literal: Literal) -> Self {
        match literal {
            Literal::Null => Resolved::Null,
            Literal::Bool(b) => Resolved::Bool(b),
            Literal::Int(n) => Resolved::Int(n),
            Literal::Float(n) => Resolved::Float(n),
            Literal::Str(s) => Resolved::Str(s),
            Literal::Object(instance) => Resolved::Object(instance),
        }
    }
}

// =============================================================================
// Conversions into Rust field types
// =============================================================================

/// Conversion from a resolved value into a concrete Rust type.
///
/// Used by constructor argument access and generated property setters.
pub trait FromResolved: Sized {
    fn from_resolved(value: &Resolved) -> Result<Self>;
}

impl FromResolved for Resolved {
    #[inline]
    fn from_resolved(value: &Resolved) -> Result<Self> {
        Ok(value.clone())
    }
}

impl FromResolved for String {
    fn from_resolved(value: &Resolved) -> Result<Self> {
        match value {
            Resolved::Str(s) => Ok(s.clone()),
            other => Err(WiringError::mismatch("string", other.type_label())),
        }
    }
}

impl FromResolved for bool {
    fn from_resolved(value: &Resolved) -> Result<Self> {
        match value {
            Resolved::Bool(b) => Ok(*b),
            other => Err(WiringError::mismatch("bool", other.type_label())),
        }
    }
}

impl FromResolved for f64 {
    fn from_resolved(value: &Resolved) -> Result<Self> {
        match value {
            Resolved::Float(n) => Ok(*n),
            Resolved::Int(n) => Ok(*n as f64),
            other => Err(WiringError::mismatch("float", other.type_label())),
        }
    }
}

macro_rules! impl_from_resolved_int {
    ($($ty:ty),+) => {
        $(
            impl FromResolved for $ty {
                fn from_resolved(value: &Resolved) -> Result<Self> {
                    match value {
                        Resolved::Int(n) => <$ty>::try_from(*n)
                            .map_err(|_| WiringError::mismatch(stringify!($ty), "out-of-range int")),
                        other => Err(WiringError::mismatch(stringify!($ty), other.type_label())),
                    }
                }
            }
        )+
    };
}

impl_from_resolved_int!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

impl FromResolved for Instance {
    fn from_resolved(value: &Resolved) -> Result<Self> {
        match value {
            Resolved::Object(instance) => Ok(instance.clone()),
            other => Err(WiringError::mismatch("object", other.type_label())),
        }
    }
}

impl<T: Any + Send + Sync> FromResolved for Arc<T> {
    fn from_resolved(value: &Resolved) -> Result<Self> {
        match value {
            Resolved::Object(instance) => instance
                .downcast::<T>()
                .ok_or_else(|| WiringError::mismatch(std::any::type_name::<T>(), instance.type_name())),
            other => Err(WiringError::mismatch(std::any::type_name::<T>(), other.type_label())),
        }
    }
}

impl<T: FromResolved> FromResolved for Option<T> {
    fn from_resolved(value: &Resolved) -> Result<Self> {
        match value {
            Resolved::Null => Ok(None),
            other => T::from_resolved(other).map(Some),
        }
    }
}

impl<T: FromResolved> FromResolved for Vec<T> {
    fn from_resolved(value: &Resolved) -> Result<Self> {
        match value {
            Resolved::List(items) => items.iter().map(T::from_resolved).collect(),
            other => Err(WiringError::mismatch("list", other.type_label())),
        }
    }
}

impl<T: FromResolved> FromResolved for BTreeMap<String, T> {
    fn from_resolved(value: &Resolved) -> Result<Self> {
        match value {
            Resolved::Map(entries) => entries
                .iter()
                .map(|(k, v)| Ok((k.clone(), T::from_resolved(v)?)))
                .collect(),
            other => Err(WiringError::mismatch("map", other.type_label())),
        }
    }
}

impl<T: FromResolved, S: BuildHasher + Default> FromResolved for HashMap<String, T, S> {
    fn from_resolved(value: &Resolved) -> Result<Self> {
        match value {
            Resolved::Map(entries) => entries
                .iter()
                .map(|(k, v)| Ok((k.clone(), T::from_resolved(v)?)))
                .collect(),
            other => Err(WiringError::mismatch("map", other.type_label())),
        }
    }
}
