//! Statement trees.
//!
//! All statements live in a [`StatementTree`] arena and are addressed by
//! [`StatementId`]. A statement holds its template text, indexed parameter
//! slots (`{0}`, `{1}`, ...), named parameter slots and named child
//! statements. Named slots are visible to the whole tree: a `{NAME}` token
//! anywhere below a root resolves against every name declared under it.
//!
//! Each node records the root of the tree it currently belongs to. Placing
//! a statement under another re-roots the placed statement and everything
//! below it, so its named parameters become visible to the new tree.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{PlaceError, PlaceResult};
use crate::parameter::Parameter;
use crate::placement::{Placement, Record};
use crate::template;

/// Handle to a statement inside a [`StatementTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatementId(pub(crate) usize);

impl StatementId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for StatementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How the execution layer should run the rendered command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    #[default]
    Text,
    StoredProcedure,
}

/// Insertion-ordered name → value slots. Re-inserting a name replaces the
/// value in place.
#[derive(Debug, Clone)]
pub(crate) struct Slots<T> {
    entries: Vec<(String, T)>,
    index: HashMap<String, usize>,
}

impl<T> Default for Slots<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T> Slots<T> {
    pub(crate) fn insert(&mut self, name: String, value: T) -> Option<T> {
        match self.index.get(&name) {
            Some(&i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, value));
                None
            }
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<&T> {
        self.index.get(name).map(|&i| &self.entries[i].1)
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<T> {
        let i = self.index.remove(name)?;
        let (_, value) = self.entries.remove(i);
        for slot in self.index.values_mut() {
            if *slot > i {
                *slot -= 1;
            }
        }
        Some(value)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Bookkeeping for statements built as separator-joined lists.
#[derive(Debug, Clone)]
pub(crate) struct ListState {
    pub(crate) separator: String,
    pub(crate) fallback: String,
    pub(crate) items: Vec<StatementId>,
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) sql: String,
    pub(crate) indexed: BTreeMap<usize, Parameter>,
    pub(crate) named: Slots<Parameter>,
    pub(crate) children: Slots<StatementId>,
    pub(crate) root: StatementId,
    pub(crate) list: Option<ListState>,
    pub(crate) kind: CommandKind,
    pub(crate) timeout: Duration,
}

/// Arena owning every statement of one or more trees.
#[derive(Debug, Clone, Default)]
pub struct StatementTree {
    nodes: Vec<Node>,
    config: Config,
}

impl StatementTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an arena whose renders follow `config`.
    pub fn with_config(config: Config) -> Self {
        Self {
            nodes: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Number of statements in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Create a statement from a template with no parameters.
    pub fn statement(&mut self, sql: impl Into<String>) -> StatementId {
        let id = StatementId(self.nodes.len());
        self.nodes.push(Node {
            sql: sql.into(),
            indexed: BTreeMap::new(),
            named: Slots::default(),
            children: Slots::default(),
            root: id,
            list: None,
            kind: CommandKind::Text,
            timeout: Duration::from_secs(self.config.timeout_secs),
        });
        id
    }

    /// Create a statement and place `params` at indices `0..`.
    pub fn statement_with(
        &mut self,
        sql: impl Into<String>,
        params: impl IntoIterator<Item = Placement>,
    ) -> PlaceResult<StatementId> {
        let id = self.statement(sql);
        self.place_parameters(id, params)?;
        Ok(id)
    }

    /// Create a statement and place `named` under their names.
    pub fn statement_named<K: Into<String>>(
        &mut self,
        sql: impl Into<String>,
        named: impl IntoIterator<Item = (K, Placement)>,
    ) -> PlaceResult<StatementId> {
        let id = self.statement(sql);
        self.place_named_parameters(id, named)?;
        Ok(id)
    }

    /// Create a statement from a single argument.
    ///
    /// A record places each of its fields as a named parameter; anything
    /// else is placed at index 0.
    pub fn statement_from(
        &mut self,
        sql: impl Into<String>,
        arg: impl Into<Placement>,
    ) -> PlaceResult<StatementId> {
        let id = self.statement(sql);
        match arg.into() {
            Placement::Record(fields) => self.place_named_parameters(id, fields)?,
            other => self.place_parameter(id, 0, other)?,
        }
        Ok(id)
    }

    /// Create a statement whose named parameters are the fields of `record`.
    pub fn statement_from_record(
        &mut self,
        sql: impl Into<String>,
        record: &impl Record,
    ) -> PlaceResult<StatementId> {
        self.statement_from(sql, Placement::record(record))
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub(crate) fn node(&self, id: StatementId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: StatementId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub(crate) fn check(&self, id: StatementId) -> PlaceResult<()> {
        if id.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(PlaceError::UnknownStatement(id.0))
        }
    }

    /// The raw template text of a statement.
    pub fn sql(&self, id: StatementId) -> Option<&str> {
        self.nodes.get(id.0).map(|n| n.sql.as_str())
    }

    /// The root of the tree `id` currently belongs to (itself if detached).
    pub fn root(&self, id: StatementId) -> Option<StatementId> {
        self.nodes.get(id.0).map(|n| n.root)
    }

    pub fn is_root(&self, id: StatementId) -> bool {
        self.root(id) == Some(id)
    }

    /// Parameter placed at a local index.
    pub fn parameter(&self, id: StatementId, index: usize) -> Option<&Parameter> {
        self.nodes.get(id.0)?.indexed.get(&index)
    }

    /// Parameter placed under a name on this statement.
    pub fn named_parameter(&self, id: StatementId, name: &str) -> Option<&Parameter> {
        self.nodes.get(id.0)?.named.get(name)
    }

    /// Child statement placed under a name on this statement.
    pub fn child(&self, id: StatementId, name: &str) -> Option<StatementId> {
        self.nodes.get(id.0)?.children.get(name).copied()
    }

    pub fn command_kind(&self, id: StatementId) -> Option<CommandKind> {
        self.nodes.get(id.0).map(|n| n.kind)
    }

    /// Set how the rendered command is run. Only meaningful on a root.
    pub fn set_command_kind(&mut self, id: StatementId, kind: CommandKind) -> PlaceResult<()> {
        self.check(id)?;
        self.node_mut(id).kind = kind;
        Ok(())
    }

    pub fn timeout(&self, id: StatementId) -> Option<Duration> {
        self.nodes.get(id.0).map(|n| n.timeout)
    }

    /// Set the execution timeout. Only meaningful on a root.
    pub fn set_timeout(&mut self, id: StatementId, timeout: Duration) -> PlaceResult<()> {
        self.check(id)?;
        self.node_mut(id).timeout = timeout;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Placing parameters
    // ------------------------------------------------------------------

    /// Place a value at local index `index` (the `{index}` token).
    ///
    /// Statements cannot sit in an indexed slot: they are placed under a
    /// generated name and every `{index}` token of the template is rewritten
    /// to reference that name.
    pub fn place_parameter(
        &mut self,
        id: StatementId,
        index: usize,
        value: impl Into<Placement>,
    ) -> PlaceResult<()> {
        self.check(id)?;
        match value.into() {
            Placement::Value(v) => {
                self.node_mut(id).indexed.insert(index, Parameter::new(v));
            }
            Placement::Parameter(p) => {
                self.node_mut(id).indexed.insert(index, p);
            }
            Placement::Statement(child) => {
                let name = format!("__q{}_{}", id.0, index);
                self.place_statement(id, name.clone(), child)?;
                let node = self.node_mut(id);
                node.sql = template::rename_index(&node.sql, index, &name)?;
                node.indexed.remove(&index);
            }
            Placement::Sequence(items) => {
                let list = self.comma_values(items)?;
                self.place_parameter(id, index, list)?;
            }
            Placement::Record(fields) => {
                let list = self.comma_assignments(fields)?;
                self.place_parameter(id, index, list)?;
            }
        }
        Ok(())
    }

    /// Place `values` at indices `0..`.
    pub fn place_parameters(
        &mut self,
        id: StatementId,
        values: impl IntoIterator<Item = Placement>,
    ) -> PlaceResult<()> {
        for (index, value) in values.into_iter().enumerate() {
            self.place_parameter(id, index, value)?;
        }
        Ok(())
    }

    /// Place a value under a tree-wide name (the `{name}` token).
    pub fn place_named(
        &mut self,
        id: StatementId,
        name: impl Into<String>,
        value: impl Into<Placement>,
    ) -> PlaceResult<()> {
        self.check(id)?;
        let name = name.into();
        let mut param = match value.into() {
            Placement::Value(v) => Parameter::new(v),
            Placement::Parameter(p) => p,
            Placement::Statement(child) => {
                self.place_statement(id, name, child)?;
                return Ok(());
            }
            Placement::Sequence(items) => {
                let list = self.comma_values(items)?;
                self.place_statement(id, name, list)?;
                return Ok(());
            }
            Placement::Record(fields) => {
                let list = self.comma_assignments(fields)?;
                self.place_statement(id, name, list)?;
                return Ok(());
            }
        };
        param.global_name = Some(name.clone());
        let node = self.node_mut(id);
        let displaced = node.children.remove(&name);
        node.named.insert(name, param);
        if let Some(old) = displaced {
            self.release(old);
        }
        Ok(())
    }

    /// Place every `(name, value)` pair under its name.
    pub fn place_named_parameters<K: Into<String>>(
        &mut self,
        id: StatementId,
        values: impl IntoIterator<Item = (K, Placement)>,
    ) -> PlaceResult<()> {
        for (name, value) in values {
            self.place_named(id, name, value)?;
        }
        Ok(())
    }

    /// Place the fields of `record` as named parameters.
    pub fn place_record(&mut self, id: StatementId, record: &impl Record) -> PlaceResult<()> {
        let fields = record
            .fields()
            .into_iter()
            .map(|(name, value)| (name, Placement::Value(value)));
        self.place_named_parameters(id, fields)
    }

    // ------------------------------------------------------------------
    // Placing statements
    // ------------------------------------------------------------------

    /// Place `child` under `name` on `parent` and return `child`.
    ///
    /// Fails if `child` is `parent`, or if `parent` is already somewhere
    /// below `child`.
    pub fn place_statement(
        &mut self,
        parent: StatementId,
        name: impl Into<String>,
        child: StatementId,
    ) -> PlaceResult<StatementId> {
        self.check(parent)?;
        self.check(child)?;
        let name = name.into();
        if parent == child {
            return Err(PlaceError::SelfReference { name });
        }
        let below = self.descendants(child);
        if below.contains(&parent) {
            return Err(PlaceError::CircularReference { name });
        }

        let root = self.node(parent).root;
        let node = self.node_mut(parent);
        node.named.remove(&name);
        let displaced = node.children.insert(name, child);

        self.node_mut(child).root = root;
        for id in below {
            self.node_mut(id).root = root;
        }
        if let Some(old) = displaced.filter(|&old| old != child) {
            self.release(old);
        }
        Ok(child)
    }

    /// Make `old` the root of whatever part of its subtree its former tree
    /// no longer reaches.
    fn release(&mut self, old: StatementId) {
        let root = self.node(old).root;
        let reachable: HashSet<StatementId> = self.descendants(root).into_iter().collect();
        if reachable.contains(&old) {
            return;
        }
        tracing::debug!("Statement {} detached from {}", old, root);
        for id in std::iter::once(old).chain(self.descendants(old)) {
            if !reachable.contains(&id) {
                self.node_mut(id).root = old;
            }
        }
    }

    /// Create a statement from `sql` and `params` and place it under `name`.
    pub fn place_sql(
        &mut self,
        parent: StatementId,
        name: impl Into<String>,
        sql: impl Into<String>,
        params: impl IntoIterator<Item = Placement>,
    ) -> PlaceResult<StatementId> {
        self.check(parent)?;
        let child = self.statement_with(sql, params)?;
        self.place_statement(parent, name, child)
    }

    /// Every statement transitively placed below `id`.
    pub(crate) fn descendants(&self, id: StatementId) -> Vec<StatementId> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            for (_, &child) in self.node(current).children.iter() {
                if seen.insert(child) {
                    out.push(child);
                    stack.push(child);
                }
            }
        }
        out
    }

    /// Named statements and parameters visible from `root`.
    ///
    /// Walks the tree depth-first; a name declared again further down the
    /// walk replaces the earlier one.
    pub(crate) fn scope(&self, root: StatementId) -> Scope<'_> {
        let mut scope = Scope::default();
        let mut visited = HashSet::new();
        self.collect_scope(root, &mut scope, &mut visited);
        scope
    }

    fn collect_scope<'t>(
        &'t self,
        id: StatementId,
        scope: &mut Scope<'t>,
        visited: &mut HashSet<StatementId>,
    ) {
        if !visited.insert(id) {
            return;
        }
        let node = self.node(id);
        for (name, param) in node.named.iter() {
            scope.parameters.insert(name.to_string(), param);
        }
        for (name, &child) in node.children.iter() {
            scope.statements.insert(name.to_string(), child);
            self.collect_scope(child, scope, visited);
        }
    }
}

/// Names visible to a render.
#[derive(Debug, Default)]
pub(crate) struct Scope<'t> {
    pub(crate) statements: Slots<StatementId>,
    pub(crate) parameters: Slots<&'t Parameter>,
}
