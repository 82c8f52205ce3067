//! Flattening a statement tree into one command.
//!
//! Rendering walks the tree in preorder starting at the entry statement.
//! Each statement's indexed parameters get global positions
//! `offset + index`, after which the offset moves past the statement's
//! highest index; a named token either expands the child statement of that
//! name in place (threading the same offset) or binds the named parameter.
//! Because the offset keeps moving, a statement reached twice renders its
//! indexed parameters twice under different positions.
//!
//! The walk produces a stream of text and parameter pieces. The adapter
//! then decides how pieces become command text:
//!
//! - named backends write each parameter's name and bind every declared
//!   parameter once, indexed ones in preorder followed by named ones;
//! - positional backends write a placeholder per occurrence and bind in
//!   that left-to-right order;
//! - stored procedure calls on positional backends still bind by name, in
//!   declaration order.

use std::collections::HashSet;
use std::time::Duration;

use serde::Serialize;

use crate::config::{Config, UnresolvedTokenPolicy};
use crate::error::{PlaceError, PlaceResult};
use crate::parameter::Parameter;
use crate::provider::{GenericAdapter, ProviderAdapter};
use crate::statement::{CommandKind, Scope, StatementId, StatementTree};
use crate::template::{self, Segment};
use crate::value::Value;

/// A parameter together with the name it was rendered under.
#[derive(Debug, Clone, Serialize)]
pub struct BoundParameter {
    pub name: String,
    #[serde(flatten)]
    pub parameter: Parameter,
}

impl BoundParameter {
    pub fn value(&self) -> &Value {
        &self.parameter.value
    }

    /// Name the parameter was declared under, independent of the adapter.
    pub fn global_name(&self) -> Option<&str> {
        self.parameter.global_name()
    }
}

/// The rendered command: text plus parameters in binding order.
#[derive(Debug, Clone, Serialize)]
pub struct Command {
    pub text: String,
    pub parameters: Vec<BoundParameter>,
    pub kind: CommandKind,
    pub timeout: Duration,
}

impl Command {
    /// First parameter rendered under `name`.
    pub fn parameter(&self, name: &str) -> Option<&BoundParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Parameter values in binding order.
    pub fn values(&self) -> Vec<&Value> {
        self.parameters.iter().map(BoundParameter::value).collect()
    }

    /// Parameters the execution layer must read back after running.
    pub fn outputs(&self) -> impl Iterator<Item = &BoundParameter> {
        self.parameters
            .iter()
            .filter(|p| p.parameter.direction.is_output())
    }

    /// Global name of the parameter rendered as `rendered`.
    ///
    /// Execution layers read output values back under the backend's
    /// rendered name and report them under this one.
    pub fn global_name(&self, rendered: &str) -> Option<&str> {
        self.parameter(rendered).and_then(BoundParameter::global_name)
    }
}

impl StatementTree {
    /// Render `id` for `adapter` using the tree's own configuration.
    pub fn render(&self, id: StatementId, adapter: &dyn ProviderAdapter) -> PlaceResult<Command> {
        self.render_with(id, adapter, self.config())
    }

    /// Render `id` for `adapter` under an explicit configuration.
    pub fn render_with(
        &self,
        id: StatementId,
        adapter: &dyn ProviderAdapter,
        config: &Config,
    ) -> PlaceResult<Command> {
        let mut renderer = Renderer::walk(self, id, adapter, config.unresolved_tokens)?;
        let command = renderer.assemble(id);
        tracing::debug!(
            "Rendered statement {} with {} parameters",
            id,
            command.parameters.len()
        );
        Ok(command)
    }

    /// Render `id` with literal values in place of parameters.
    ///
    /// Meant for logs and diagnostics only; the output is never safe to
    /// execute.
    pub fn plain_text(&self, id: StatementId) -> PlaceResult<String> {
        let adapter = GenericAdapter::named("@");
        let renderer = Renderer::walk(self, id, &adapter, self.config().unresolved_tokens)?;
        let mut out = String::new();
        for piece in &renderer.pieces {
            match piece {
                Piece::Text(text) => out.push_str(text),
                Piece::Param(bound) => out.push_str(&bound.value().to_literal()),
            }
        }
        Ok(out)
    }
}

fn position(base: usize, index: usize) -> PlaceResult<usize> {
    base.checked_add(index)
        .ok_or(PlaceError::IndexOverflow { index })
}

#[derive(Debug)]
enum Piece {
    Text(String),
    Param(BoundParameter),
}

struct Renderer<'t> {
    tree: &'t StatementTree,
    adapter: &'t dyn ProviderAdapter,
    policy: UnresolvedTokenPolicy,
    scope: Scope<'t>,
    offset: usize,
    pieces: Vec<Piece>,
    /// Indexed parameters in preorder.
    declared: Vec<BoundParameter>,
    referenced: HashSet<String>,
    /// Statements currently being expanded.
    stack: Vec<StatementId>,
}

impl<'t> Renderer<'t> {
    fn walk(
        tree: &'t StatementTree,
        entry: StatementId,
        adapter: &'t dyn ProviderAdapter,
        policy: UnresolvedTokenPolicy,
    ) -> PlaceResult<Self> {
        tree.check(entry)?;
        let root = tree.node(entry).root;
        let mut renderer = Renderer {
            tree,
            adapter,
            policy,
            scope: tree.scope(root),
            offset: 0,
            pieces: Vec::new(),
            declared: Vec::new(),
            referenced: HashSet::new(),
            stack: vec![entry],
        };
        renderer.render_node(entry)?;
        Ok(renderer)
    }

    fn render_node(&mut self, id: StatementId) -> PlaceResult<()> {
        let tree = self.tree;
        let node = tree.node(id);
        let base = self.offset;

        for (&index, param) in &node.indexed {
            self.declared.push(BoundParameter {
                name: self.adapter.indexed_parameter_name(position(base, index)?),
                parameter: param.clone(),
            });
        }
        if let Some(&max) = node.indexed.keys().next_back() {
            self.offset = position(base, max)?
                .checked_add(1)
                .ok_or(PlaceError::IndexOverflow { index: max })?;
        }

        for segment in template::parse_template(&node.sql)? {
            match segment {
                Segment::Text(text) => self.push_text(text),
                Segment::Brace(c) => self.push_text(c.encode_utf8(&mut [0; 4])),
                Segment::Index(index) => match node.indexed.get(&index) {
                    Some(param) => {
                        let at = position(base, index)?;
                        tracing::trace!("{} -> position {}", segment.token(), at);
                        self.pieces.push(Piece::Param(BoundParameter {
                            name: self.adapter.indexed_parameter_name(at),
                            parameter: param.clone(),
                        }));
                    }
                    None => self.unresolved(&segment)?,
                },
                Segment::Name(name) => self.render_name(name, &segment)?,
            }
        }
        Ok(())
    }

    fn render_name(&mut self, name: &str, segment: &Segment<'_>) -> PlaceResult<()> {
        if let Some(&child) = self.scope.statements.get(name) {
            if self.stack.contains(&child) {
                return Err(PlaceError::RecursiveExpansion {
                    name: name.to_string(),
                });
            }
            tracing::trace!("{} -> statement {}", segment.token(), child);
            self.stack.push(child);
            self.render_node(child)?;
            self.stack.pop();
            return Ok(());
        }

        let param = match self.scope.parameters.get(name) {
            Some(&param) => param,
            None => return self.unresolved(segment),
        };
        tracing::trace!("{} -> named parameter", segment.token());
        self.referenced.insert(name.to_string());
        self.pieces.push(Piece::Param(BoundParameter {
            name: self.adapter.named_parameter_name(name),
            parameter: param.clone(),
        }));
        Ok(())
    }

    fn unresolved(&mut self, segment: &Segment<'_>) -> PlaceResult<()> {
        let token = segment.token();
        match self.policy {
            UnresolvedTokenPolicy::Error => Err(PlaceError::unresolved(token)),
            UnresolvedTokenPolicy::Literal => {
                tracing::warn!("Parameter {} has not been assigned, keeping it as text", token);
                self.push_text(&token);
                Ok(())
            }
        }
    }

    fn push_text(&mut self, text: &str) {
        match self.pieces.last_mut() {
            Some(Piece::Text(last)) => last.push_str(text),
            _ => self.pieces.push(Piece::Text(text.to_string())),
        }
    }

    /// Named parameters to bind: every declared one when rendering a whole
    /// tree, only the referenced ones when rendering part of it.
    fn named_parameters(&self, whole_tree: bool) -> Vec<BoundParameter> {
        self.scope
            .parameters
            .iter()
            .filter(|(name, _)| whole_tree || self.referenced.contains(*name))
            .map(|(name, param)| BoundParameter {
                name: self.adapter.named_parameter_name(name),
                parameter: (*param).clone(),
            })
            .collect()
    }

    fn assemble(&mut self, entry: StatementId) -> Command {
        let tree = self.tree;
        let node = tree.node(entry);
        let whole_tree = node.root == entry;
        let pieces = std::mem::take(&mut self.pieces);
        let mut text = String::new();

        let parameters = if self.adapter.supports_named_parameters() {
            for piece in &pieces {
                match piece {
                    Piece::Text(t) => text.push_str(t),
                    Piece::Param(bound) => text.push_str(&bound.name),
                }
            }
            self.by_declaration(whole_tree)
        } else {
            let mut occurrences = Vec::new();
            for piece in pieces {
                match piece {
                    Piece::Text(t) => text.push_str(&t),
                    Piece::Param(bound) => {
                        text.push_str(&self.adapter.placeholder(occurrences.len()));
                        occurrences.push(bound);
                    }
                }
            }
            match node.kind {
                CommandKind::StoredProcedure => self.by_declaration(whole_tree),
                CommandKind::Text => {
                    let unused = self.scope.parameters.len() - self.referenced.len();
                    if unused > 0 {
                        tracing::debug!(
                            "Dropping {} named parameters not referenced by positional command",
                            unused
                        );
                    }
                    occurrences
                }
            }
        };

        Command {
            text,
            parameters,
            kind: node.kind,
            timeout: node.timeout,
        }
    }

    fn by_declaration(&mut self, whole_tree: bool) -> Vec<BoundParameter> {
        let mut parameters = std::mem::take(&mut self.declared);
        parameters.extend(self.named_parameters(whole_tree));
        parameters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;
    use crate::parameter::Direction;
    use chrono::NaiveDate;

    fn named() -> GenericAdapter {
        GenericAdapter::sql_server()
    }

    fn positional() -> GenericAdapter {
        GenericAdapter::odbc()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2010, 1, 1).unwrap()
    }

    #[test]
    fn test_indexed_tokens_out_of_order() {
        let mut tree = StatementTree::new();
        let q = tree
            .statement_with(
                "select * from X where a={3} and b={2} and c={1} and d={0}",
                params![None::<i32>, 3, date(), "John"],
            )
            .unwrap();
        let cmd = tree.render(q, &named()).unwrap();
        assert_eq!(cmd.text, "select * from X where a=@p3 and b=@p2 and c=@p1 and d=@p0");
        assert_eq!(cmd.parameter("@p3").unwrap().value(), &Value::from("John"));
        assert_eq!(cmd.parameter("@p2").unwrap().value(), &Value::Date(date()));
        assert_eq!(cmd.parameter("@p1").unwrap().value(), &Value::Int(3));
        assert_eq!(cmd.parameter("@p0").unwrap().value(), &Value::Null);
    }

    #[test]
    fn test_render_is_repeatable() {
        let mut tree = StatementTree::new();
        let q = tree.statement_with("a={0} and b={N}", params![1]).unwrap();
        tree.place_named(q, "N", "x").unwrap();
        let first = tree.render(q, &named()).unwrap();
        for _ in 0..2 {
            let again = tree.render(q, &named()).unwrap();
            assert_eq!(again.text, first.text);
            assert_eq!(again.values(), first.values());
        }
    }

    #[test]
    fn test_positional_occurrence_order() {
        let mut tree = StatementTree::new();
        let q = tree
            .statement_with("a={2} and b={0} and c={N} and d={0}", params![1, 2, 3])
            .unwrap();
        tree.place_named(q, "N", 9).unwrap();
        let cmd = tree.render(q, &positional()).unwrap();
        assert_eq!(cmd.text, "a=? and b=? and c=? and d=?");
        assert_eq!(
            cmd.values(),
            vec![&Value::Int(3), &Value::Int(1), &Value::Int(9), &Value::Int(1)]
        );
    }

    #[test]
    fn test_escaped_braces_render_literally() {
        let mut tree = StatementTree::new();
        let q = tree.statement("select '{{A}}' from X");
        let cmd = tree.render(q, &named()).unwrap();
        assert_eq!(cmd.text, "select '{A}' from X");
        assert!(cmd.parameters.is_empty());
    }

    #[test]
    fn test_unresolved_token_is_error_by_default() {
        let mut tree = StatementTree::new();
        let q = tree.statement("a={X}");
        let err = tree.render(q, &named()).unwrap_err();
        assert!(matches!(err, PlaceError::UnresolvedToken { token } if token == "{X}"));
    }

    #[test]
    fn test_unresolved_token_kept_as_literal() {
        let config = Config::builder()
            .unresolved_tokens(UnresolvedTokenPolicy::Literal)
            .build();
        let mut tree = StatementTree::with_config(config);
        let q = tree.statement_with("a={X} and b={1} and c={0}", params![5]).unwrap();
        let cmd = tree.render(q, &named()).unwrap();
        assert_eq!(cmd.text, "a={X} and b={1} and c=@p0");
        assert_eq!(cmd.parameters.len(), 1);
    }

    #[test]
    fn test_unreferenced_named_parameters_still_bound() {
        let mut tree = StatementTree::new();
        let q = tree.statement("exec Proc");
        tree.place_named(q, "A", 1).unwrap();
        tree.place_named(q, "B", 2).unwrap();
        let cmd = tree.render(q, &named()).unwrap();
        let names: Vec<&str> = cmd.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["@A", "@B"]);

        let cmd = tree.render(q, &positional()).unwrap();
        assert!(cmd.parameters.is_empty());
    }

    #[test]
    fn test_stored_procedure_binds_by_name_on_positional_backend() {
        let mut tree = StatementTree::new();
        let q = tree.statement("GetHolder");
        tree.set_command_kind(q, CommandKind::StoredProcedure).unwrap();
        tree.place_named(q, "ID", 7).unwrap();
        tree.place_named(
            q,
            "NAME",
            Parameter::new(Value::Null).with_direction(Direction::Output),
        )
        .unwrap();
        let cmd = tree.render(q, &positional()).unwrap();
        assert_eq!(cmd.text, "GetHolder");
        assert_eq!(cmd.kind, CommandKind::StoredProcedure);
        let names: Vec<&str> = cmd.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["@ID", "@NAME"]);
        assert_eq!(cmd.outputs().count(), 1);
    }

    #[test]
    fn test_recursive_expansion_detected() {
        let mut tree = StatementTree::new();
        let root = tree.statement("{M}");
        let m = tree.statement("x+{M}");
        tree.place_statement(root, "M", m).unwrap();
        let err = tree.render(root, &named()).unwrap_err();
        assert!(matches!(err, PlaceError::RecursiveExpansion { name } if name == "M"));
    }

    #[test]
    fn test_subtree_render_binds_only_referenced_names() {
        let mut tree = StatementTree::new();
        let root = tree.statement("{A} {SUB}");
        let sub = tree.statement("{B}");
        tree.place_named(root, "A", 1).unwrap();
        tree.place_named(root, "B", 2).unwrap();
        tree.place_statement(root, "SUB", sub).unwrap();
        let cmd = tree.render(sub, &named()).unwrap();
        assert_eq!(cmd.text, "@B");
        assert_eq!(cmd.parameters.len(), 1);
    }

    #[test]
    fn test_plain_text_literals() {
        let mut tree = StatementTree::new();
        let q = tree
            .statement_with(
                "select {0}, {1}, {2}, {3}",
                params!["O'Neil", true, None::<i32>, date()],
            )
            .unwrap();
        assert_eq!(
            tree.plain_text(q).unwrap(),
            "select 'O''Neil', 1, null, '2010-01-01 00:00:00'"
        );
    }

    #[test]
    fn test_huge_index_is_an_error() {
        let mut tree = StatementTree::new();
        let q = tree.statement("a={0}");
        tree.place_parameter(q, usize::MAX, 1).unwrap();
        let err = tree.render(q, &named()).unwrap_err();
        assert!(matches!(err, PlaceError::IndexOverflow { index } if index == usize::MAX));
        assert!(tree.plain_text(q).is_err());
    }

    #[test]
    fn test_offset_overflow_across_statements() {
        let mut tree = StatementTree::new();
        let root = tree.statement_with("{0} {SUB}", params![1]).unwrap();
        let sub = tree.statement("x");
        tree.place_parameter(sub, usize::MAX - 1, 2).unwrap();
        tree.place_statement(root, "SUB", sub).unwrap();
        let err = tree.render(root, &positional()).unwrap_err();
        assert!(matches!(err, PlaceError::IndexOverflow { .. }));
    }

    #[test]
    fn test_render_unknown_statement() {
        let tree = StatementTree::new();
        let err = tree.render(StatementId(3), &named()).unwrap_err();
        assert!(matches!(err, PlaceError::UnknownStatement(3)));
    }
}
