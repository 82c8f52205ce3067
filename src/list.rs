//! Separator-joined statement lists.
//!
//! A list is an ordinary statement whose template is assembled as items
//! are appended: `{item0}, {item1}, ...`. While empty it renders its
//! fallback text instead.

use crate::error::{PlaceError, PlaceResult};
use crate::placement::{Placement, Record};
use crate::statement::{ListState, StatementId, StatementTree};
use crate::template;

impl StatementTree {
    /// Create an empty list joined by `separator`, rendering `fallback`
    /// while it has no items.
    pub fn list(
        &mut self,
        separator: impl Into<String>,
        fallback: impl Into<String>,
    ) -> StatementId {
        let fallback = fallback.into();
        let id = self.statement(fallback.clone());
        self.node_mut(id).list = Some(ListState {
            separator: separator.into(),
            fallback,
            items: Vec::new(),
        });
        id
    }

    /// Append `fragment` to `list` and return it.
    pub fn append(&mut self, list: StatementId, fragment: StatementId) -> PlaceResult<StatementId> {
        self.check(list)?;
        let position = match &self.node(list).list {
            Some(state) => state.items.len(),
            None => return Err(PlaceError::NotAList(list.0)),
        };
        let name = format!("__i{}_{}", list.0, position);
        self.place_statement(list, name.clone(), fragment)?;

        let node = self.node_mut(list);
        if let Some(state) = node.list.as_mut() {
            if state.items.is_empty() {
                node.sql.clear();
            } else {
                node.sql.push_str(&template::escape(&state.separator));
            }
            node.sql.push('{');
            node.sql.push_str(&name);
            node.sql.push('}');
            state.items.push(fragment);
        }
        Ok(fragment)
    }

    /// Build a fragment from `sql` and `params` and append it.
    pub fn append_sql(
        &mut self,
        list: StatementId,
        sql: impl Into<String>,
        params: impl IntoIterator<Item = Placement>,
    ) -> PlaceResult<StatementId> {
        self.check(list)?;
        let fragment = self.statement_with(sql, params)?;
        self.append(list, fragment)
    }

    /// Append every fragment in order.
    pub fn extend(
        &mut self,
        list: StatementId,
        fragments: impl IntoIterator<Item = StatementId>,
    ) -> PlaceResult<()> {
        for fragment in fragments {
            self.append(list, fragment)?;
        }
        Ok(())
    }

    /// Append one fragment per `(sql, params)` pair.
    pub fn extend_sql<S: Into<String>>(
        &mut self,
        list: StatementId,
        items: impl IntoIterator<Item = (S, Vec<Placement>)>,
    ) -> PlaceResult<()> {
        for (sql, params) in items {
            self.append_sql(list, sql, params)?;
        }
        Ok(())
    }

    /// Items appended to `list`, or `None` if it is not a list.
    pub fn list_items(&self, list: StatementId) -> Option<&[StatementId]> {
        self.nodes_list(list).map(|state| state.items.as_slice())
    }

    /// Separator and fallback of `list`.
    pub fn list_format(&self, list: StatementId) -> Option<(&str, &str)> {
        self.nodes_list(list)
            .map(|state| (state.separator.as_str(), state.fallback.as_str()))
    }

    fn nodes_list(&self, list: StatementId) -> Option<&ListState> {
        self.check(list).ok()?;
        self.node(list).list.as_ref()
    }

    // ------------------------------------------------------------------
    // Common shapes
    // ------------------------------------------------------------------

    /// `a and b and c`; renders `true` while empty.
    pub fn and_clauses(
        &mut self,
        conditions: impl IntoIterator<Item = StatementId>,
    ) -> PlaceResult<StatementId> {
        let list = self.list(" and ", "true");
        self.extend(list, conditions)?;
        Ok(list)
    }

    /// `f1, f2, f3` from plain SQL fragments.
    pub fn comma_clauses<S: Into<String>>(
        &mut self,
        clauses: impl IntoIterator<Item = S>,
    ) -> PlaceResult<StatementId> {
        let list = self.list(", ", "");
        for clause in clauses {
            let fragment = self.statement(clause);
            self.append(list, fragment)?;
        }
        Ok(list)
    }

    /// `{0}, {0}, {0}`: one placeholder per value.
    pub fn comma_values<T: Into<Placement>>(
        &mut self,
        values: impl IntoIterator<Item = T>,
    ) -> PlaceResult<StatementId> {
        let list = self.list(", ", "");
        for value in values {
            self.append_sql(list, "{0}", [value.into()])?;
        }
        Ok(list)
    }

    /// `name={0}, other={0}` from name/value pairs.
    pub fn comma_assignments<K: Into<String>, T: Into<Placement>>(
        &mut self,
        pairs: impl IntoIterator<Item = (K, T)>,
    ) -> PlaceResult<StatementId> {
        self.matches_list(", ", "", pairs)
    }

    /// `name={0}, other={0}` from the fields of a record.
    pub fn comma_assignments_from(&mut self, record: &impl Record) -> PlaceResult<StatementId> {
        self.comma_assignments(record.fields())
    }

    /// `name={0} and other={0}` from the fields of a record; `true` if it
    /// has none.
    pub fn and_matches(&mut self, record: &impl Record) -> PlaceResult<StatementId> {
        self.matches_list(" and ", "true", record.fields())
    }

    fn matches_list<K: Into<String>, T: Into<Placement>>(
        &mut self,
        separator: &str,
        fallback: &str,
        pairs: impl IntoIterator<Item = (K, T)>,
    ) -> PlaceResult<StatementId> {
        let list = self.list(separator, fallback);
        for (name, value) in pairs {
            // field names come from data and must not become tokens
            let sql = format!("{}={{0}}", template::escape(&name.into()));
            self.append_sql(list, sql, [value.into()])?;
        }
        Ok(list)
    }
}
