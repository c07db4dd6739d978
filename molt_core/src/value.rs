//! Runtime value representation.
//!
//! `Value` is the currency of method invocation: arguments and return values
//! are passed as `Value`s. It is a small `Copy` type so call paths never
//! allocate for primitive data.
//!
//! Strings are interned (`InternedString` is pointer-sized and `Copy`), so a
//! string-valued `Value` is still two words.

use crate::intern::InternedString;

/// A runtime value.
///
/// Deliberately enum-based rather than NaN-boxed: nothing in this engine
/// consumes the bit pattern, and the enum keeps matching explicit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// The absent value.
    None,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// Interned string.
    Str(InternedString),
}

impl Value {
    /// The `None` value.
    #[inline]
    pub const fn none() -> Self {
        Self::None
    }

    /// Create a boolean value.
    #[inline]
    pub const fn bool(b: bool) -> Self {
        Self::Bool(b)
    }

    /// Create an integer value.
    #[inline]
    pub const fn int(i: i64) -> Self {
        Self::Int(i)
    }

    /// Create a float value.
    #[inline]
    pub const fn float(f: f64) -> Self {
        Self::Float(f)
    }

    /// Create an interned-string value.
    #[inline]
    pub const fn str(s: InternedString) -> Self {
        Self::Str(s)
    }

    /// Check for `None`.
    #[inline]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Check for a boolean.
    #[inline]
    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool(_))
    }

    /// Check for an integer.
    #[inline]
    pub const fn is_int(&self) -> bool {
        matches!(self, Self::Int(_))
    }

    /// Check for a float.
    #[inline]
    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float(_))
    }

    /// Check for a string.
    #[inline]
    pub const fn is_str(&self) -> bool {
        matches!(self, Self::Str(_))
    }

    /// Extract a boolean, if this is one.
    #[inline]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract an integer, if this is one.
    #[inline]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Extract a float, if this is one.
    #[inline]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Extract an interned string, if this is one.
    #[inline]
    pub const fn as_str(&self) -> Option<InternedString> {
        match self {
            Self::Str(s) => Some(*s),
            _ => None,
        }
    }
}

impl Default for Value {
    #[inline]
    fn default() -> Self {
        Self::None
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Str(s) => write!(f, "{}", s),
        }
    }
}
