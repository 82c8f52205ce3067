use std::sync::Arc;

use pretty_assertions::assert_eq;
use sqlplace::dialect::{DialectModule, SyntaxTable};
use sqlplace::prelude::*;
use sqlplace::TemplateDoc;

/// A project-specific syntax registered for SQL Server only.
struct CustomSyntaxes;

impl DialectModule for CustomSyntaxes {
    fn register(&self, table: &mut SyntaxTable) {
        table.register(
            "MSSQL",
            "your_own_syntax",
            Arc::new(|tree: &mut StatementTree, args: &[Placement]| -> PlaceResult<StatementId> {
                if args.len() < 2 {
                    return Err(PlaceError::SyntaxArgument {
                        syntax: "your_own_syntax".into(),
                        index: args.len(),
                    });
                }
                tree.statement_with("YOUR_OWN({0}, {1})", args[..2].to_vec())
            }),
        );
    }
}

fn registry() -> DialectRegistry {
    DialectRegistry::new().with_module(CustomSyntaxes)
}

#[test]
fn test_custom_syntax_in_its_dialect() {
    let registry = registry();
    let adapter = GenericAdapter::sql_server();
    let mut tree = StatementTree::new();
    let expr = tree.statement("Name");
    let own = registry
        .syntax(&mut tree, &adapter, "your_own_syntax", &[expr.into(), 5.into()])
        .unwrap();
    let q = tree.statement_with("select {0} from Holder", params![own]).unwrap();

    let cmd = tree.render(q, &adapter).unwrap();
    assert_eq!(cmd.text, "select YOUR_OWN(Name, @p1) from Holder");
    assert_eq!(cmd.values(), vec![&Value::Int(5)]);
}

#[test]
fn test_custom_syntax_missing_in_other_dialect() {
    let registry = registry();
    let mut tree = StatementTree::new();
    let err = registry
        .syntax(&mut tree, &GenericAdapter::postgres(), "your_own_syntax", &[])
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "There is no syntax 'your_own_syntax' registered for dialect 'postgres'"
    );
}

#[test]
fn test_builtin_fragments_follow_the_adapter() {
    let registry = DialectRegistry::new();
    let mut tree = StatementTree::new();

    let mssql = GenericAdapter::sql_server();
    let name = tree.statement("Name");
    let coalesce = registry
        .null_coalesce(&mut tree, &mssql, name, "n/a")
        .unwrap();
    let cmd = tree.render(coalesce, &mssql).unwrap();
    assert_eq!(cmd.text, "ISNULL(Name, @p1)");

    let postgres = GenericAdapter::postgres();
    let name = tree.statement("Name");
    let coalesce = registry
        .null_coalesce(&mut tree, &postgres, name, "n/a")
        .unwrap();
    let cmd = tree.render(coalesce, &postgres).unwrap();
    assert_eq!(cmd.text, "COALESCE(Name, $1)");
}

#[test]
fn test_select_fragment() {
    let registry = DialectRegistry::new();
    let adapter = GenericAdapter::sql_server();
    let mut tree = StatementTree::new();
    let today = registry.current_date(&mut tree, &adapter).unwrap();
    let fields = tree.comma_clauses(["HolderId", "FirstName"]).unwrap();
    let from = tree.statement("Holder");
    let filter = tree.statement_with("CreateDate < {0}", params![today]).unwrap();
    let select = registry
        .select(&mut tree, &adapter, fields, from, filter)
        .unwrap();
    let cmd = tree.render(select, &adapter).unwrap();
    assert_eq!(
        cmd.text,
        "SELECT HolderId, FirstName\nFROM Holder\nWHERE CreateDate < CONVERT(DATE, GETDATE())"
    );
}

#[test]
fn test_explicit_dialect_override() {
    let registry = DialectRegistry::new().with_default_dialect("");
    let mut tree = StatementTree::new();
    let today = registry
        .current_date(&mut tree, &GenericAdapter::sql_server())
        .unwrap();
    assert_eq!(tree.sql(today), Some("CURRENT_DATE"));
}

#[test]
fn test_concurrent_first_use_registers_once() {
    let registry = Arc::new(registry());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            std::thread::spawn(move || {
                let mut tree = StatementTree::new();
                registry
                    .current_date(&mut tree, &GenericAdapter::sql_server())
                    .map(|id| tree.sql(id).map(str::to_string))
                    .unwrap()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(
            handle.join().unwrap().as_deref(),
            Some("CONVERT(DATE, GETDATE())")
        );
    }
    assert_eq!(registry.syntaxes().len(), 6);
}

#[test]
fn test_provider_from_connection_string() {
    let providers = ProviderRegistry::new();
    let adapter = providers.resolve("postgresql://app@localhost/app").unwrap();
    let doc = TemplateDoc::from_json(r#"{"sql": "select * from T where a={0}", "params": [1]}"#)
        .unwrap();
    let cmd = sqlplace::render_document(&doc, adapter.as_ref()).unwrap();
    assert_eq!(cmd.text, "select * from T where a=$1");

    let err = providers.resolve("redis://secret@host").err().unwrap();
    assert!(matches!(err, PlaceError::AdapterResolution { scheme } if scheme == "redis"));
}
