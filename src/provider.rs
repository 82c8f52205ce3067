//! Provider adapters: how a backend names and marks its parameters.
//!
//! Rendering never assumes a naming scheme of its own. It asks the active
//! [`ProviderAdapter`] for parameter names (`@p0`, `@NAME`), for the
//! positional placeholder of a backend without named parameters (`?`,
//! `$1`), and for the dialect used to pick portable SQL fragments.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::error::{PlaceError, PlaceResult};

/// Naming and placeholder conventions of one backend.
pub trait ProviderAdapter: Send + Sync {
    /// Name of the parameter at global position `index`.
    fn indexed_parameter_name(&self, index: usize) -> String;

    /// Name of a parameter declared under `name`.
    fn named_parameter_name(&self, name: &str) -> String;

    /// Placeholder written at the `position`-th parameter occurrence when
    /// the backend only binds by position.
    fn placeholder(&self, position: usize) -> String;

    fn supports_named_parameters(&self) -> bool;

    /// Dialect used for portable fragments; `""` is the universal default.
    fn dialect(&self) -> &str;
}

/// How a positional backend writes its placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionalStyle {
    /// `?` for every parameter.
    QuestionMark,
    /// `$1`, `$2`, ...
    Dollar,
    /// `:1`, `:2`, ...
    Colon,
}

/// Adapter configured from a few conventions.
#[derive(Debug, Clone)]
pub struct GenericAdapter {
    symbol: String,
    named: bool,
    positional: PositionalStyle,
    dialect: String,
}

impl GenericAdapter {
    /// Named parameters prefixed with `symbol`, e.g. `@p0` and `@NAME`.
    pub fn named(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            named: true,
            positional: PositionalStyle::QuestionMark,
            dialect: String::new(),
        }
    }

    /// Purely positional parameters.
    pub fn positional(style: PositionalStyle) -> Self {
        Self {
            symbol: "@".to_string(),
            named: false,
            positional: style,
            dialect: String::new(),
        }
    }

    /// `@p0`/`@NAME` parameters with the `MSSQL` dialect.
    pub fn sql_server() -> Self {
        Self::named("@").with_dialect("MSSQL")
    }

    /// `?` placeholders, as used by ODBC and OLE DB drivers.
    pub fn odbc() -> Self {
        Self::positional(PositionalStyle::QuestionMark)
    }

    /// `$1` placeholders.
    pub fn postgres() -> Self {
        Self::positional(PositionalStyle::Dollar).with_dialect("postgres")
    }

    pub fn with_dialect(mut self, dialect: impl Into<String>) -> Self {
        self.dialect = dialect.into();
        self
    }
}

impl ProviderAdapter for GenericAdapter {
    fn indexed_parameter_name(&self, index: usize) -> String {
        format!("{}p{}", self.symbol, index)
    }

    fn named_parameter_name(&self, name: &str) -> String {
        format!("{}{}", self.symbol, name)
    }

    fn placeholder(&self, position: usize) -> String {
        match self.positional {
            PositionalStyle::QuestionMark => "?".to_string(),
            PositionalStyle::Dollar => format!("${}", position + 1),
            PositionalStyle::Colon => format!(":{}", position + 1),
        }
    }

    fn supports_named_parameters(&self) -> bool {
        self.named
    }

    fn dialect(&self) -> &str {
        &self.dialect
    }
}

/// Table of adapters keyed by connection scheme (`mssql`, `odbc`, ...).
///
/// Built-in schemes are registered the first time the table is used,
/// exactly once even when several threads race on that first use.
#[derive(Default)]
pub struct ProviderRegistry {
    builtins: OnceLock<()>,
    adapters: RwLock<HashMap<String, Arc<dyn ProviderAdapter>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_builtins(&self) {
        self.builtins.get_or_init(|| {
            let mut adapters = self.adapters.write().unwrap_or_else(PoisonError::into_inner);
            let sql_server: Arc<dyn ProviderAdapter> = Arc::new(GenericAdapter::sql_server());
            let odbc: Arc<dyn ProviderAdapter> = Arc::new(GenericAdapter::odbc());
            let postgres: Arc<dyn ProviderAdapter> = Arc::new(GenericAdapter::postgres());
            for scheme in ["mssql", "sqlserver"] {
                adapters
                    .entry(scheme.to_string())
                    .or_insert_with(|| sql_server.clone());
            }
            for scheme in ["odbc", "oledb"] {
                adapters.entry(scheme.to_string()).or_insert_with(|| odbc.clone());
            }
            for scheme in ["postgres", "postgresql"] {
                adapters
                    .entry(scheme.to_string())
                    .or_insert_with(|| postgres.clone());
            }
        });
    }

    /// Register `adapter` for `scheme`, replacing any earlier registration.
    pub fn register(&self, scheme: impl Into<String>, adapter: Arc<dyn ProviderAdapter>) {
        self.ensure_builtins();
        let scheme = scheme.into().to_ascii_lowercase();
        tracing::debug!("Registering provider adapter for scheme '{}'", scheme);
        self.adapters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(scheme, adapter);
    }

    /// Find the adapter for a connection string such as
    /// `mssql://host/db` or `odbc:DSN=reports`.
    pub fn resolve(&self, connection: &str) -> PlaceResult<Arc<dyn ProviderAdapter>> {
        self.ensure_builtins();
        let scheme = connection_scheme(connection).ok_or(PlaceError::MissingScheme)?;
        let adapters = self.adapters.read().unwrap_or_else(PoisonError::into_inner);
        match adapters.get(&scheme) {
            Some(adapter) => {
                tracing::debug!("Resolved provider adapter for scheme '{}'", scheme);
                Ok(adapter.clone())
            }
            None => Err(PlaceError::AdapterResolution { scheme }),
        }
    }

    /// Registered schemes, sorted.
    pub fn schemes(&self) -> Vec<String> {
        self.ensure_builtins();
        let adapters = self.adapters.read().unwrap_or_else(PoisonError::into_inner);
        let mut schemes: Vec<String> = adapters.keys().cloned().collect();
        schemes.sort();
        schemes
    }
}

/// Scheme part of a connection string, lowercased. Credentials never
/// leave this function: anything that is not a bare scheme token, such as
/// a `Server=..;Password=..` string, yields `None`.
fn connection_scheme(connection: &str) -> Option<String> {
    let connection = connection.trim();
    let scheme = match connection.split_once("://") {
        Some((scheme, _)) => scheme,
        None => connection.split_once(':').map_or(connection, |(s, _)| s),
    };
    let is_token = !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'));
    if !is_token {
        return None;
    }
    // `postgres+tls` style suffixes select the same adapter
    let scheme = scheme.split('+').next().unwrap_or(scheme);
    Some(scheme.to_ascii_lowercase())
}
