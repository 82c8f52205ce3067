//! Execution boundary.
//!
//! Running a [`Command`] against a live data source belongs to an
//! execution layer outside this crate. This module only fixes the shape
//! of that exchange: the layer receives the rendered text with its
//! parameters and hands back rows, a scalar or an affected-row count,
//! plus the values of output and return parameters keyed by the global
//! names they were declared under, so callers never see an adapter's
//! naming scheme. Outputs placed by index have no global name and are not
//! read back.

use std::collections::BTreeMap;

use crate::render::Command;
use crate::value::Value;

/// One result row, column name → value.
pub type Row = BTreeMap<String, Value>;

/// What running a command produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Rows(Vec<Row>),
    Scalar(Value),
    Affected(u64),
}

/// Result of running a command.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub outcome: Outcome,
    /// Output, input-output and return parameters read back after running.
    pub outputs: BTreeMap<String, Value>,
}

impl Execution {
    pub fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            outputs: BTreeMap::new(),
        }
    }

    /// Value read back for the parameter declared as `name`.
    pub fn output(&self, name: &str) -> Option<&Value> {
        self.outputs.get(name)
    }

    pub fn rows(&self) -> &[Row] {
        match &self.outcome {
            Outcome::Rows(rows) => rows,
            _ => &[],
        }
    }
}

/// Something that can run rendered commands.
pub trait Execute {
    type Error;

    fn execute(&mut self, command: &Command) -> Result<Execution, Self::Error>;
}
