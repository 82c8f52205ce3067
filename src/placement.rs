//! What can be placed into a statement slot.
//!
//! The placement decision is made once, when a value enters the tree:
//! scalars become parameters, statements become named children, sequences
//! become comma lists and records become assignment lists.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{PlaceError, PlaceResult};
use crate::parameter::Parameter;
use crate::statement::StatementId;
use crate::value::Value;

/// A value on its way into a statement.
#[derive(Debug, Clone)]
pub enum Placement {
    /// A bare value, wrapped into a default [`Parameter`].
    Value(Value),
    /// A parameter carrying its own type hints.
    Parameter(Parameter),
    /// A sub-statement, always stored in a named slot.
    Statement(StatementId),
    /// An ordered collection, promoted to a comma-joined value list.
    Sequence(Vec<Placement>),
    /// Field names and values of a record.
    Record(Vec<(String, Placement)>),
}

impl Placement {
    /// Capture the fields of a record.
    pub fn record(record: &impl Record) -> Self {
        Placement::Record(
            record
                .fields()
                .into_iter()
                .map(|(name, value)| (name, Placement::Value(value)))
                .collect(),
        )
    }
}

/// Types that can hand out their field names and values.
///
/// This is the capability used to build assignment and condition lists
/// from a record, e.g. `name=@p0, gender=@p1`.
pub trait Record {
    fn fields(&self) -> Vec<(String, Value)>;
}

impl<V: Clone + Into<Value>> Record for BTreeMap<String, V> {
    fn fields(&self) -> Vec<(String, Value)> {
        self.iter()
            .map(|(k, v)| (k.clone(), v.clone().into()))
            .collect()
    }
}

impl<V: Clone + Into<Value>> Record for Vec<(String, V)> {
    fn fields(&self) -> Vec<(String, Value)> {
        self.iter()
            .map(|(k, v)| (k.clone(), v.clone().into()))
            .collect()
    }
}

/// Select some fields of a record, in the order given.
pub fn pick(record: &impl Record, names: &[&str]) -> PlaceResult<Vec<(String, Value)>> {
    let fields = record.fields();
    names
        .iter()
        .map(|name| {
            fields
                .iter()
                .find(|(field, _)| field == name)
                .cloned()
                .ok_or_else(|| PlaceError::UnknownField(name.to_string()))
        })
        .collect()
}

macro_rules! placement_from_value {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Placement {
                fn from(v: $t) -> Self {
                    Placement::Value(v.into())
                }
            }
        )*
    };
}

placement_from_value!(
    bool,
    i8,
    i16,
    i32,
    i64,
    u16,
    u32,
    f32,
    f64,
    &str,
    String,
    NaiveDate,
    NaiveDateTime,
    Value
);

impl<T: Into<Value>> From<Option<T>> for Placement {
    fn from(opt: Option<T>) -> Self {
        Placement::Value(opt.into())
    }
}

impl From<Parameter> for Placement {
    fn from(p: Parameter) -> Self {
        Placement::Parameter(p)
    }
}

impl From<StatementId> for Placement {
    fn from(id: StatementId) -> Self {
        Placement::Statement(id)
    }
}

impl<T: Into<Placement>> From<Vec<T>> for Placement {
    fn from(items: Vec<T>) -> Self {
        Placement::Sequence(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Placement>, const N: usize> From<[T; N]> for Placement {
    fn from(items: [T; N]) -> Self {
        Placement::Sequence(items.into_iter().map(Into::into).collect())
    }
}

/// Build a `Vec<Placement>` from heterogeneous values.
///
/// ```
/// use sqlplace::{params, Placement};
///
/// let args: Vec<Placement> = params![None::<i32>, 3, "John"];
/// assert_eq!(args.len(), 3);
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::Placement>::new()
    };
    ($($value:expr),+ $(,)?) => {
        vec![$($crate::Placement::from($value)),+]
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Holder {
        holder_id: i32,
        first_name: String,
        birthday_y: Option<i32>,
    }

    impl Record for Holder {
        fn fields(&self) -> Vec<(String, Value)> {
            vec![
                ("holder_id".into(), self.holder_id.into()),
                ("first_name".into(), self.first_name.clone().into()),
                ("birthday_y".into(), self.birthday_y.into()),
            ]
        }
    }

    fn holder() -> Holder {
        Holder {
            holder_id: 7,
            first_name: "John".into(),
            birthday_y: None,
        }
    }

    #[test]
    fn test_pick_keeps_requested_order() {
        let picked = pick(&holder(), &["first_name", "holder_id"]).unwrap();
        assert_eq!(
            picked,
            vec![
                ("first_name".to_string(), Value::from("John")),
                ("holder_id".to_string(), Value::Int(7)),
            ]
        );
    }

    #[test]
    fn test_pick_unknown_field() {
        let err = pick(&holder(), &["nope"]).unwrap_err();
        assert!(matches!(err, PlaceError::UnknownField(name) if name == "nope"));
    }

    #[test]
    fn test_vec_becomes_sequence() {
        match Placement::from(vec![1, 3, 5]) {
            Placement::Sequence(items) => assert_eq!(items.len(), 3),
            other => panic!("expected sequence, got {:?}", other),
        }
    }

    #[test]
    fn test_record_placement_keeps_nulls() {
        match Placement::record(&holder()) {
            Placement::Record(fields) => {
                assert_eq!(fields.len(), 3);
                assert!(matches!(&fields[2].1, Placement::Value(Value::Null)));
            }
            other => panic!("expected record, got {:?}", other),
        }
    }

    #[test]
    fn test_params_macro() {
        let args = params![1, "a", Parameter::new(2)];
        assert!(matches!(args[2], Placement::Parameter(_)));
        assert!(params![].is_empty());
    }
}
