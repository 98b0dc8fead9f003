//! Formula templates
//!
//! Named, reusable formula field definitions persisted as a flat JSON object:
//!
//! ```json
//! {
//!   "area": { "name": "Area", "expression": "[Length] * [Width]", "type": "Number" }
//! }
//! ```
//!
//! # Example
//!
//! ```rust
//! use tabula::prelude::*;
//! use tabula::FormulaTemplate;
//!
//! let mut parts = Table::with_columns("Parts", ["Length", "Width"]).unwrap();
//! parts.push_row([3, 4]).unwrap();
//! let mut store = TableStore::new();
//! store.add_sheet(parts).unwrap();
//!
//! let mut templates = TemplateStore::new();
//! templates.insert("area", FormulaTemplate::new("Area", "[Length] * [Width]", ResultType::Number));
//!
//! let mut engine = FormulaEngine::new();
//! templates.apply("area", &mut engine, &mut store, "Parts").unwrap();
//! assert_eq!(store.cell("Parts", 0, "Area"), Some(&Scalar::Number(12.0)));
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use tabula_core::TableStore;
use tabula_formula::{ColumnValues, EngineError, FormulaEngine, FormulaField};
use thiserror::Error;

/// A stored formula field definition
pub type FormulaTemplate = FormulaField;

/// Result type for template operations
pub type TemplateResult<T> = std::result::Result<T, TemplateError>;

/// Errors that can occur while loading, saving or applying templates
#[derive(Debug, Error)]
pub enum TemplateError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Malformed template file
    #[error("Invalid template file: {0}")]
    Json(#[from] serde_json::Error),

    /// Template not found by name
    #[error("Template not found: {0}")]
    UnknownTemplate(String),

    /// Applying the template failed
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Named formula templates, ordered by template name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateStore {
    templates: BTreeMap<String, FormulaTemplate>,
}

impl TemplateStore {
    /// Default file name used by the editor
    pub const DEFAULT_FILE: &'static str = "formula_templates.json";

    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Load templates from a JSON file
    ///
    /// A missing file yields an empty store.
    pub fn load<P: AsRef<Path>>(path: P) -> TemplateResult<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(text) => {
                let store = Self::from_json(&text)?;
                log::debug!("Loaded {} templates from {}", store.len(), path.display());
                Ok(store)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::new()),
            Err(err) => Err(err.into()),
        }
    }

    /// Save templates to a JSON file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> TemplateResult<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Parse templates from JSON text
    pub fn from_json(text: &str) -> TemplateResult<Self> {
        Ok(Self {
            templates: serde_json::from_str(text)?,
        })
    }

    /// Serialize templates as indented JSON
    pub fn to_json(&self) -> TemplateResult<String> {
        Ok(serde_json::to_string_pretty(&self.templates)?)
    }

    /// Number of templates
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Check if there are no templates
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Template names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    /// Get a template by name
    pub fn get(&self, name: &str) -> Option<&FormulaTemplate> {
        self.templates.get(name)
    }

    /// Iterate over `(template name, definition)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormulaTemplate)> {
        self.templates.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Add or replace a template, returning the previous definition
    pub fn insert<S: Into<String>>(
        &mut self,
        name: S,
        template: FormulaTemplate,
    ) -> Option<FormulaTemplate> {
        self.templates.insert(name.into(), template)
    }

    /// Remove a template by name
    pub fn remove(&mut self, name: &str) -> Option<FormulaTemplate> {
        self.templates.remove(name)
    }

    /// Create the formula field described by a template on a sheet
    pub fn apply(
        &self,
        name: &str,
        engine: &mut FormulaEngine,
        store: &mut TableStore,
        sheet: &str,
    ) -> TemplateResult<ColumnValues> {
        let template = self
            .get(name)
            .ok_or_else(|| TemplateError::UnknownTemplate(name.to_string()))?;
        let column = engine.create_formula_field(
            store,
            sheet,
            &template.name,
            &template.expression,
            template.result_type,
        )?;
        Ok(column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tabula_formula::ResultType;

    #[test]
    fn test_json_shape() {
        let mut store = TemplateStore::new();
        store.insert(
            "label",
            FormulaTemplate::new("Label", "[Type] + \"!\"", ResultType::Text),
        );

        let json: serde_json::Value = serde_json::from_str(&store.to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "label": { "name": "Label", "expression": "[Type] + \"!\"", "type": "Text" }
            })
        );
    }

    #[test]
    fn test_from_json() {
        let store = TemplateStore::from_json(
            r#"{"b": {"name": "B", "expression": "1", "type": "Auto"},
                "a": {"name": "A", "expression": "2", "type": "Number"}}"#,
        )
        .unwrap();
        assert_eq!(store.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(store.get("b").unwrap().result_type, ResultType::Auto);

        assert!(matches!(
            TemplateStore::from_json(r#"{"a": {"name": "A"}}"#),
            Err(TemplateError::Json(_))
        ));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = TemplateStore::load(dir.path().join(TemplateStore::DEFAULT_FILE)).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_apply_unknown_template() {
        let mut engine = FormulaEngine::new();
        let mut tables = TableStore::new();
        let err = TemplateStore::new()
            .apply("nope", &mut engine, &mut tables, "Parts")
            .unwrap_err();
        assert!(matches!(err, TemplateError::UnknownTemplate(_)));
    }
}
