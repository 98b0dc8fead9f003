//! Formula field definitions

use std::fmt;
use std::str::FromStr;

use crate::error::FormulaError;

/// How a formula field's results are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ResultType {
    /// Every value is a number; failures store 0
    #[default]
    Number,
    /// Every value is text
    Text,
    /// Numbers stay numbers, everything else becomes text
    Auto,
}

impl ResultType {
    /// All result types, in menu order
    pub const ALL: [ResultType; 3] = [ResultType::Number, ResultType::Text, ResultType::Auto];

    /// Display name
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultType::Number => "Number",
            ResultType::Text => "Text",
            ResultType::Auto => "Auto",
        }
    }
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResultType {
    type Err = FormulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResultType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| FormulaError::Argument(format!("Unknown result type: {}", s)))
    }
}

/// A named derived column definition
///
/// Only the definition lives here; the computed values are stored as a
/// column of the owning table.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FormulaField {
    /// Field (column) name
    pub name: String,
    /// Formula expression
    pub expression: String,
    /// Result storage type
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub result_type: ResultType,
}

impl FormulaField {
    /// Create a formula field definition
    pub fn new(
        name: impl Into<String>,
        expression: impl Into<String>,
        result_type: ResultType,
    ) -> Self {
        Self {
            name: name.into(),
            expression: expression.into(),
            result_type,
        }
    }
}

/// Formula fields of one sheet, in creation order
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    fields: Vec<FormulaField>,
}

impl FieldRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check if a field exists
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Get a field by name
    pub fn get(&self, name: &str) -> Option<&FormulaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Iterate over fields in creation order
    pub fn iter(&self) -> impl Iterator<Item = &FormulaField> {
        self.fields.iter()
    }

    /// Field names in creation order
    pub fn names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// Insert a field, replacing (in place) any field with the same name
    pub fn insert(&mut self, field: FormulaField) {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }

    /// Replace the field named `old_name`, keeping its position
    ///
    /// Falls back to appending when `old_name` is not registered.
    pub fn replace(&mut self, old_name: &str, field: FormulaField) {
        self.fields.retain(|f| f.name == old_name || f.name != field.name);
        match self.fields.iter_mut().find(|f| f.name == old_name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }

    /// Remove a field by name
    pub fn remove(&mut self, name: &str) -> Option<FormulaField> {
        let index = self.fields.iter().position(|f| f.name == name)?;
        Some(self.fields.remove(index))
    }
}
