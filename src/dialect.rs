//! Dialect registry: portable SQL fragments with backend-specific syntax.
//!
//! Callers ask for a syntax by name (`current_date`, `null_coalesce`, ...)
//! and get a statement fragment written in the active dialect. Lookup
//! tries `(dialect, syntax)` first and then the universal dialect `""`.
//!
//! ```
//! use sqlplace::{DialectRegistry, GenericAdapter, StatementTree};
//!
//! let registry = DialectRegistry::new();
//! let mut tree = StatementTree::new();
//! let adapter = GenericAdapter::sql_server();
//! let today = registry.current_date(&mut tree, &adapter).unwrap();
//! assert_eq!(tree.sql(today), Some("CONVERT(DATE, GETDATE())"));
//! ```

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::config::Config;
use crate::error::{PlaceError, PlaceResult};
use crate::placement::Placement;
use crate::provider::ProviderAdapter;
use crate::statement::{StatementId, StatementTree};

/// Builds a statement fragment from an ordered argument list.
pub type SyntaxBuilder =
    Arc<dyn Fn(&mut StatementTree, &[Placement]) -> PlaceResult<StatementId> + Send + Sync>;

/// A set of syntax builders registered together, usually one per dialect.
pub trait DialectModule: Send + Sync {
    fn register(&self, table: &mut SyntaxTable);
}

/// `(dialect, syntax)` → builder.
#[derive(Default)]
pub struct SyntaxTable {
    builders: HashMap<(String, String), SyntaxBuilder>,
}

impl SyntaxTable {
    /// Insert or replace the builder for `(dialect, syntax)`.
    pub fn register(
        &mut self,
        dialect: impl Into<String>,
        syntax: impl Into<String>,
        builder: SyntaxBuilder,
    ) {
        let key = (dialect.into(), syntax.into());
        if self.builders.insert(key.clone(), builder).is_some() {
            tracing::warn!(
                "Syntax '{}' for dialect '{}' replaced an earlier registration",
                key.1,
                key.0
            );
        }
    }

    /// Register a builder that places its arguments into `sql` at
    /// `{0}..{arity-1}`.
    pub fn register_template(
        &mut self,
        dialect: impl Into<String>,
        syntax: impl Into<String>,
        sql: &'static str,
        arity: usize,
    ) {
        let syntax = syntax.into();
        let builder = template_builder(syntax.clone(), sql, arity);
        self.register(dialect, syntax, builder);
    }

    fn get(&self, dialect: &str, syntax: &str) -> Option<SyntaxBuilder> {
        self.builders
            .get(&(dialect.to_string(), syntax.to_string()))
            .cloned()
    }
}

/// Builder placing the first `arity` arguments into a fixed template.
pub fn template_builder(syntax: String, sql: &'static str, arity: usize) -> SyntaxBuilder {
    Arc::new(move |tree: &mut StatementTree, args: &[Placement]| {
        if args.len() < arity {
            return Err(PlaceError::SyntaxArgument {
                syntax: syntax.clone(),
                index: args.len(),
            });
        }
        tree.statement_with(sql, args[..arity].iter().cloned())
    })
}

/// Portable fragments understood by most backends.
pub struct StandardDialect;

impl DialectModule for StandardDialect {
    fn register(&self, table: &mut SyntaxTable) {
        table.register_template("", "current_date", "CURRENT_DATE", 0);
        table.register_template("", "null_coalesce", "COALESCE({0}, {1})", 2);
        table.register_template("", "select", "SELECT {0}\nFROM {1}\nWHERE {2}", 3);
    }
}

/// SQL Server flavored fragments.
pub struct SqlServerDialect;

impl DialectModule for SqlServerDialect {
    fn register(&self, table: &mut SyntaxTable) {
        table.register_template("MSSQL", "current_date", "CONVERT(DATE, GETDATE())", 0);
        table.register_template("MSSQL", "null_coalesce", "ISNULL({0}, {1})", 2);
    }
}

/// Registry of dialect modules and their syntax builders.
///
/// Modules run once, on first use, even when several threads race on it.
/// Registrations made afterwards go straight into the table.
pub struct DialectRegistry {
    modules: Vec<Box<dyn DialectModule>>,
    init: OnceLock<()>,
    table: RwLock<SyntaxTable>,
    default_dialect: Option<String>,
}

impl Default for DialectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DialectRegistry {
    /// Registry with the standard and SQL Server modules.
    pub fn new() -> Self {
        Self::empty()
            .with_module(StandardDialect)
            .with_module(SqlServerDialect)
    }

    /// Registry without any module.
    pub fn empty() -> Self {
        Self {
            modules: Vec::new(),
            init: OnceLock::new(),
            table: RwLock::new(SyntaxTable::default()),
            default_dialect: None,
        }
    }

    pub fn with_module(mut self, module: impl DialectModule + 'static) -> Self {
        self.modules.push(Box::new(module));
        self
    }

    /// Use `dialect` regardless of the provider adapter.
    pub fn with_default_dialect(mut self, dialect: impl Into<String>) -> Self {
        self.default_dialect = Some(dialect.into());
        self
    }

    /// Take the dialect override from configuration, if set.
    pub fn apply_config(mut self, config: &Config) -> Self {
        if let Some(dialect) = &config.dialect {
            self.default_dialect = Some(dialect.clone());
        }
        self
    }

    fn ensure_initialized(&self) {
        self.init.get_or_init(|| {
            let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
            for module in &self.modules {
                module.register(&mut table);
            }
            tracing::debug!("Initialized {} dialect modules", self.modules.len());
        });
    }

    /// Insert or replace the builder for `(dialect, syntax)`.
    pub fn register(
        &self,
        dialect: impl Into<String>,
        syntax: impl Into<String>,
        builder: SyntaxBuilder,
    ) {
        self.ensure_initialized();
        let dialect = dialect.into();
        let syntax = syntax.into();
        tracing::debug!("Registering syntax '{}' for dialect '{}'", syntax, dialect);
        self.table
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(dialect, syntax, builder);
    }

    /// The dialect used when none is given: the configured override, else
    /// the adapter's own.
    pub fn default_dialect(&self, adapter: &dyn ProviderAdapter) -> String {
        match &self.default_dialect {
            Some(dialect) => dialect.clone(),
            None => adapter.dialect().to_string(),
        }
    }

    /// Build `syntax` in `dialect`, falling back to the universal dialect.
    pub fn resolve(
        &self,
        tree: &mut StatementTree,
        dialect: &str,
        syntax: &str,
        args: &[Placement],
    ) -> PlaceResult<StatementId> {
        self.ensure_initialized();
        let builder = {
            let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
            table.get(dialect, syntax).or_else(|| table.get("", syntax))
        };
        match builder {
            Some(build) => build(tree, args),
            None => Err(PlaceError::dialect_not_found(dialect, syntax)),
        }
    }

    /// Build `syntax` in the default dialect for `adapter`.
    pub fn syntax(
        &self,
        tree: &mut StatementTree,
        adapter: &dyn ProviderAdapter,
        syntax: &str,
        args: &[Placement],
    ) -> PlaceResult<StatementId> {
        let dialect = self.default_dialect(adapter);
        self.resolve(tree, &dialect, syntax, args)
    }

    pub fn current_date(
        &self,
        tree: &mut StatementTree,
        adapter: &dyn ProviderAdapter,
    ) -> PlaceResult<StatementId> {
        self.syntax(tree, adapter, "current_date", &[])
    }

    /// `expr`, or `fallback` when `expr` is null.
    pub fn null_coalesce(
        &self,
        tree: &mut StatementTree,
        adapter: &dyn ProviderAdapter,
        expr: impl Into<Placement>,
        fallback: impl Into<Placement>,
    ) -> PlaceResult<StatementId> {
        self.syntax(
            tree,
            adapter,
            "null_coalesce",
            &[expr.into(), fallback.into()],
        )
    }

    pub fn select(
        &self,
        tree: &mut StatementTree,
        adapter: &dyn ProviderAdapter,
        selection: impl Into<Placement>,
        from: impl Into<Placement>,
        condition: impl Into<Placement>,
    ) -> PlaceResult<StatementId> {
        self.syntax(
            tree,
            adapter,
            "select",
            &[selection.into(), from.into(), condition.into()],
        )
    }

    /// Registered `(dialect, syntax)` keys, sorted.
    pub fn syntaxes(&self) -> Vec<(String, String)> {
        self.ensure_initialized();
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<(String, String)> = table.builders.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::GenericAdapter;

    #[test]
    fn test_dialect_specific_syntax() {
        let registry = DialectRegistry::new();
        let mut tree = StatementTree::new();
        let id = registry
            .null_coalesce(&mut tree, &GenericAdapter::sql_server(), 1, 2)
            .unwrap();
        assert_eq!(tree.sql(id), Some("ISNULL({0}, {1})"));
    }

    #[test]
    fn test_falls_back_to_universal_dialect() {
        let registry = DialectRegistry::new();
        let mut tree = StatementTree::new();
        let id = registry
            .current_date(&mut tree, &GenericAdapter::postgres())
            .unwrap();
        assert_eq!(tree.sql(id), Some("CURRENT_DATE"));
    }

    #[test]
    fn test_not_found_names_both_keys() {
        let registry = DialectRegistry::new();
        let mut tree = StatementTree::new();
        let err = registry
            .resolve(&mut tree, "MSSQL", "top", &[])
            .unwrap_err();
        assert!(matches!(
            err,
            PlaceError::DialectNotFound { dialect, syntax } if dialect == "MSSQL" && syntax == "top"
        ));
    }

    #[test]
    fn test_empty_registry_has_nothing() {
        let registry = DialectRegistry::empty();
        assert!(registry.syntaxes().is_empty());
    }

    #[test]
    fn test_missing_argument() {
        let registry = DialectRegistry::new();
        let mut tree = StatementTree::new();
        let err = registry
            .resolve(&mut tree, "", "null_coalesce", &[Placement::from(1)])
            .unwrap_err();
        assert!(matches!(err, PlaceError::SyntaxArgument { index: 1, .. }));
    }

    #[test]
    fn test_config_overrides_adapter_dialect() {
        let config = Config::builder().dialect("MSSQL").build();
        let registry = DialectRegistry::new().apply_config(&config);
        assert_eq!(registry.default_dialect(&GenericAdapter::odbc()), "MSSQL");
    }

    #[test]
    fn test_late_registration_replaces_builtin() {
        let registry = DialectRegistry::new();
        registry.register(
            "",
            "current_date",
            Arc::new(|tree: &mut StatementTree, _: &[Placement]| -> PlaceResult<StatementId> {
                Ok(tree.statement("NOW()"))
            }),
        );
        let mut tree = StatementTree::new();
        let id = registry.resolve(&mut tree, "", "current_date", &[]).unwrap();
        assert_eq!(tree.sql(id), Some("NOW()"));
    }
}
