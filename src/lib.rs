//! # sqlplace: composable SQL templates
//!
//! > **Build the tree, render once.**
//!
//! sqlplace flattens a tree of parameterized SQL templates into a single
//! command string plus the parameters to bind, in the order the backend
//! expects them.
//!
//! ## Quick Example
//!
//! ```
//! use sqlplace::prelude::*;
//!
//! let mut tree = StatementTree::new();
//! let ids = tree.comma_values(vec![1, 3, 5]).unwrap();
//! let query = tree
//!     .statement_with("select * from Holder where Id in ({0}) and Gender = {G}", params![ids])
//!     .unwrap();
//! tree.place_named(query, "G", "M").unwrap();
//!
//! let cmd = tree.render(query, &GenericAdapter::sql_server()).unwrap();
//! assert_eq!(cmd.text, "select * from Holder where Id in (@p0, @p1, @p2) and Gender = @G");
//!
//! let cmd = tree.render(query, &GenericAdapter::odbc()).unwrap();
//! assert_eq!(cmd.text, "select * from Holder where Id in (?, ?, ?) and Gender = ?");
//! ```
//!
//! ## Tokens
//!
//! | Token    | Resolves to                                          |
//! |----------|------------------------------------------------------|
//! | `{0}`    | Parameter placed at that index on the same statement |
//! | `{NAME}` | Child statement or parameter named anywhere in tree  |
//! | `{{` `}}`| Literal brace                                        |

pub mod config;
pub mod dialect;
pub mod document;
pub mod error;
pub mod exec;
mod list;
pub mod parameter;
pub mod placement;
pub mod provider;
pub mod render;
pub mod statement;
pub mod template;
pub mod value;

pub use config::{Config, UnresolvedTokenPolicy};
pub use dialect::{DialectModule, DialectRegistry, SyntaxBuilder, SyntaxTable};
pub use document::TemplateDoc;
pub use error::{PlaceError, PlaceResult};
pub use exec::{Execute, Execution, Outcome, Row};
pub use parameter::{BindHook, DbType, Direction, Parameter};
pub use placement::{Placement, Record, pick};
pub use provider::{GenericAdapter, PositionalStyle, ProviderAdapter, ProviderRegistry};
pub use render::{BoundParameter, Command};
pub use statement::{CommandKind, StatementId, StatementTree};
pub use value::Value;

pub mod prelude {
    pub use crate::config::{Config, UnresolvedTokenPolicy};
    pub use crate::dialect::DialectRegistry;
    pub use crate::error::*;
    pub use crate::parameter::{DbType, Direction, Parameter};
    pub use crate::placement::{Placement, Record};
    pub use crate::provider::{GenericAdapter, ProviderAdapter, ProviderRegistry};
    pub use crate::render::Command;
    pub use crate::statement::{CommandKind, StatementId, StatementTree};
    pub use crate::value::Value;
    pub use crate::params;
}

/// Render a template document for a provider in one call.
///
/// # Example
///
/// ```
/// use sqlplace::{GenericAdapter, TemplateDoc};
///
/// let doc = TemplateDoc::from_toml("sql = \"select {0}\"\nparams = [1]").unwrap();
/// let cmd = sqlplace::render_document(&doc, &GenericAdapter::postgres()).unwrap();
/// assert_eq!(cmd.text, "select $1");
/// ```
pub fn render_document(doc: &TemplateDoc, adapter: &dyn ProviderAdapter) -> PlaceResult<Command> {
    let mut tree = StatementTree::new();
    let id = doc.build(&mut tree)?;
    tree.render(id, adapter)
}
