//! Scalar value types

use std::fmt;

/// A single value held by a table cell
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Scalar {
    /// Empty cell (no value)
    #[default]
    Empty,

    /// Numeric value (all numbers are stored as f64)
    Number(f64),

    /// Text value
    Text(String),
}

impl Scalar {
    /// Create a new text value
    pub fn text<S: Into<String>>(s: S) -> Self {
        Scalar::Text(s.into())
    }

    /// Check if the cell is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, Scalar::Empty)
    }

    /// Check if the cell holds a number
    pub fn is_number(&self) -> bool {
        matches!(self, Scalar::Number(_))
    }

    /// Try to get the value as a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Try to get the value as text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Interpret the value as a number, parsing text when possible
    pub fn to_number_lossy(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            Scalar::Text(s) => s.trim().parse().ok(),
            Scalar::Empty => None,
        }
    }

    /// String form with surrounding whitespace removed.
    ///
    /// This is the form used by every equality test against a literal
    /// (COUNT, LOOKUP, HAS_VALUE, filter contexts).
    pub fn trimmed(&self) -> String {
        match self {
            Scalar::Text(s) => s.trim().to_string(),
            other => other.to_string(),
        }
    }

    /// Check whether the trimmed string form equals `literal`
    pub fn matches_literal(&self, literal: &str) -> bool {
        match self {
            Scalar::Text(s) => s.trim() == literal,
            other => other.to_string() == literal,
        }
    }

    /// Hashable identity, `None` for empty cells
    pub fn key(&self) -> Option<ScalarKey> {
        match self {
            Scalar::Empty => None,
            Scalar::Number(n) => {
                // -0.0 and 0.0 count as the same value
                let n = if *n == 0.0 { 0.0 } else { *n };
                Some(ScalarKey::Number(n.to_bits()))
            }
            Scalar::Text(s) => Some(ScalarKey::Text(s.clone())),
        }
    }

    /// Get the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Empty => "empty",
            Scalar::Number(_) => "number",
            Scalar::Text(_) => "text",
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Empty => Ok(()),
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i32> for Scalar {
    fn from(n: i32) -> Self {
        Scalar::Number(n as f64)
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Scalar::Number(n as f64)
    }
}

impl From<usize> for Scalar {
    fn from(n: usize) -> Self {
        Scalar::Number(n as f64)
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Scalar::Number(n)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::text(s)
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Scalar::Empty)
    }
}

/// Hashable identity of a non-empty [`Scalar`]
///
/// Numbers and text never compare equal to each other, so `1` and `"1"`
/// are counted separately in frequency maps.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScalarKey {
    Number(u64),
    Text(String),
}
