//! Statement trees described as data.
//!
//! A document is a template with its parameters and named sub-statements,
//! written in TOML or JSON:
//!
//! ```toml
//! sql = "select * from Holder where {FILTER} and BirthdayY > {0}"
//! params = [1970]
//!
//! [statements.FILTER]
//! sql = "Gender = {G} and Id in ({0})"
//! params = [[1, 3, 5]]
//! named = { G = "M" }
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{PlaceError, PlaceResult};
use crate::parameter::{Direction, Parameter};
use crate::placement::Placement;
use crate::statement::{CommandKind, StatementId, StatementTree};
use crate::value::Value;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TemplateDoc {
    pub sql: String,
    /// Placed at `{0}`, `{1}`, ...; arrays become comma lists.
    pub params: Vec<serde_json::Value>,
    pub named: BTreeMap<String, serde_json::Value>,
    /// Names bound as null output parameters.
    pub outputs: Vec<String>,
    pub statements: BTreeMap<String, TemplateDoc>,
    pub kind: Option<CommandKind>,
    pub timeout_secs: Option<u64>,
}

impl TemplateDoc {
    pub fn from_toml(text: &str) -> PlaceResult<Self> {
        toml::from_str(text).map_err(|e| PlaceError::Document(e.to_string()))
    }

    pub fn from_json(text: &str) -> PlaceResult<Self> {
        serde_json::from_str(text).map_err(|e| PlaceError::Document(e.to_string()))
    }

    /// Read a document, as JSON for `.json` files and TOML otherwise.
    pub fn load(path: &Path) -> PlaceResult<Self> {
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&text),
            _ => Self::from_toml(&text),
        }
    }

    /// Add the described statements to `tree` and return the top one.
    pub fn build(&self, tree: &mut StatementTree) -> PlaceResult<StatementId> {
        let id = tree.statement(self.sql.clone());
        for (index, value) in self.params.iter().enumerate() {
            tree.place_parameter(id, index, placement(value))?;
        }
        for (name, value) in &self.named {
            tree.place_named(id, name.clone(), placement(value))?;
        }
        for name in &self.outputs {
            let output = Parameter::new(Value::Null).with_direction(Direction::Output);
            tree.place_named(id, name.clone(), output)?;
        }
        for (name, doc) in &self.statements {
            let child = doc.build(tree)?;
            tree.place_statement(id, name.clone(), child)?;
        }
        if let Some(kind) = self.kind {
            tree.set_command_kind(id, kind)?;
        }
        if let Some(secs) = self.timeout_secs {
            tree.set_timeout(id, Duration::from_secs(secs))?;
        }
        Ok(id)
    }
}

fn placement(value: &serde_json::Value) -> Placement {
    match value {
        serde_json::Value::Array(items) => {
            Placement::Sequence(items.iter().map(placement).collect())
        }
        serde_json::Value::Object(fields) => Placement::Record(
            fields
                .iter()
                .map(|(name, v)| (name.clone(), placement(v)))
                .collect(),
        ),
        scalar => Placement::Value(Value::from(scalar)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::GenericAdapter;

    const DOC: &str = r#"
sql = "select * from Holder where {FILTER} and BirthdayY > {0}"
params = [1970]

[statements.FILTER]
sql = "Gender = {G} and Id in ({0})"
params = [[1, 3, 5]]
named = { G = "M" }
"#;

    #[test]
    fn test_toml_document() {
        let doc = TemplateDoc::from_toml(DOC).unwrap();
        let mut tree = StatementTree::new();
        let id = doc.build(&mut tree).unwrap();
        let cmd = tree.render(id, &GenericAdapter::sql_server()).unwrap();
        assert_eq!(
            cmd.text,
            "select * from Holder where Gender = @G and Id in (@p1, @p2, @p3) and BirthdayY > @p0"
        );
        assert_eq!(cmd.parameters.len(), 5);
    }

    #[test]
    fn test_json_document_with_procedure() {
        let doc = TemplateDoc::from_json(
            r#"{"sql": "GetName", "named": {"ID": 4}, "outputs": ["NAME"],
                "kind": "stored_procedure", "timeout_secs": 5}"#,
        )
        .unwrap();
        let mut tree = StatementTree::new();
        let id = doc.build(&mut tree).unwrap();
        assert_eq!(tree.command_kind(id), Some(CommandKind::StoredProcedure));
        assert_eq!(tree.timeout(id), Some(Duration::from_secs(5)));
        let cmd = tree.render(id, &GenericAdapter::odbc()).unwrap();
        assert_eq!(cmd.outputs().count(), 1);
    }

    #[test]
    fn test_object_becomes_assignments() {
        let doc = TemplateDoc::from_json(
            r#"{"sql": "update T set {0}", "params": [{"a": 1, "b": "x"}]}"#,
        )
        .unwrap();
        let mut tree = StatementTree::new();
        let id = doc.build(&mut tree).unwrap();
        assert_eq!(tree.plain_text(id).unwrap(), "update T set a=1, b='x'");
    }

    #[test]
    fn test_malformed_document() {
        let err = TemplateDoc::from_toml("sql = ").unwrap_err();
        assert!(matches!(err, PlaceError::Document(_)));
    }
}
