//! Parameters: one bound value plus its binding metadata.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::value::Value;

/// Generic type hint understood by every execution layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DbType {
    AnsiString,
    String,
    Boolean,
    Byte,
    Int16,
    Int32,
    Int64,
    Decimal,
    Single,
    Double,
    Date,
    Time,
    DateTime,
    Binary,
    Guid,
    Object,
}

/// Direction of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Direction {
    #[default]
    Input,
    Output,
    InputOutput,
    ReturnValue,
}

impl Direction {
    /// Whether the execution layer should read the value back after running.
    pub fn is_output(&self) -> bool {
        !matches!(self, Direction::Input)
    }
}

/// Callback run against the backend-native parameter object once it exists.
///
/// The argument is whatever the execution layer creates for the parameter;
/// callers downcast it to the concrete type they expect.
#[derive(Clone)]
pub struct BindHook(Arc<dyn Fn(&mut dyn Any) + Send + Sync>);

impl BindHook {
    pub fn new(f: impl Fn(&mut dyn Any) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn call(&self, native: &mut dyn Any) {
        (self.0)(native)
    }
}

impl fmt::Debug for BindHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BindHook(..)")
    }
}

/// A value placed into a statement together with its type hints.
#[derive(Debug, Clone, Serialize)]
pub struct Parameter {
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_type: Option<DbType>,
    /// Backend-specific type code, orthogonal to `db_type`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_type: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    pub direction: Direction,
    #[serde(skip)]
    pub(crate) hook: Option<BindHook>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) global_name: Option<String>,
}

impl Parameter {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            db_type: None,
            provider_type: None,
            size: None,
            direction: Direction::Input,
            hook: None,
            global_name: None,
        }
    }

    pub fn with_type(mut self, db_type: DbType) -> Self {
        self.db_type = Some(db_type);
        self
    }

    pub fn with_provider_type(mut self, code: i32) -> Self {
        self.provider_type = Some(code);
        self
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Register a callback to run on the backend-native parameter.
    pub fn on_bind(mut self, f: impl Fn(&mut dyn Any) + Send + Sync + 'static) -> Self {
        self.hook = Some(BindHook::new(f));
        self
    }

    /// Name the parameter was placed under, if it was placed by name.
    pub fn global_name(&self) -> Option<&str> {
        self.global_name.as_deref()
    }

    /// Run the bind hook, if any, against the backend-native object.
    pub fn run_bind_hook(&self, native: &mut dyn Any) {
        if let Some(hook) = &self.hook {
            hook.call(native);
        }
    }
}

impl From<Value> for Parameter {
    fn from(value: Value) -> Self {
        Parameter::new(value)
    }
}
