//! Schema-driven domain models.
//!
//! A [`ModelSchema`] is a named list of [`FieldDefinition`]s. The
//! [`Marshaller`] turns raw JSON into [`Model`] instances that always carry
//! every declared field, applying defaults for anything the source left out.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{FieldErrors, GatewayError, Result};

pub mod enums;
pub mod marshal;
pub mod registry;

pub use enums::{EnumMember, EnumType, EnumValue, GatewayEnum, Resolved};
pub use marshal::Marshaller;
pub use registry::{RegistryBuilder, SchemaRegistry};

/// The conversion rule applied to a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    String,
    Boolean,
    Number,
    Date,
    /// Untyped pass-through.
    Json,
    /// Nested model, by schema name.
    Model(String),
    /// Enumeration, by enum name.
    Enum(String),
}

impl FieldType {
    /// Parse a primitive type keyword. Model and enum names are resolved by
    /// the registry.
    pub fn primitive(keyword: &str) -> Option<Self> {
        match keyword {
            "string" => Some(Self::String),
            "boolean" => Some(Self::Boolean),
            "number" => Some(Self::Number),
            "date" => Some(Self::Date),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("string"),
            Self::Boolean => f.write_str("boolean"),
            Self::Number => f.write_str("number"),
            Self::Date => f.write_str("date"),
            Self::Json => f.write_str("json"),
            Self::Model(name) | Self::Enum(name) => f.write_str(name),
        }
    }
}

pub type DefaultFactory = Arc<dyn Fn() -> FieldValue + Send + Sync>;

/// Value used when the source does not provide a field.
#[derive(Clone, Default)]
pub enum DefaultValue {
    #[default]
    Null,
    /// Converted with the field's own rule on every decode.
    Literal(Value),
    /// Invoked once per decode, so mutable defaults are never shared.
    Factory(DefaultFactory),
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldDefinition {
    name: String,
    field_type: FieldType,
    list: bool,
    default: DefaultValue,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            list: false,
            default: DefaultValue::Null,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::String)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Number)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Date)
    }

    pub fn json(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Json)
    }

    pub fn model(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new(name, FieldType::Model(model.into()))
    }

    pub fn enumeration(name: impl Into<String>, enum_name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Enum(enum_name.into()))
    }

    /// Mark the field as a list of its type.
    pub fn list(mut self) -> Self {
        self.list = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = DefaultValue::Literal(value.into());
        self
    }

    pub fn default_with<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> FieldValue + Send + Sync + 'static,
    {
        self.default = DefaultValue::Factory(Arc::new(factory));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub fn is_list(&self) -> bool {
        self.list
    }

    pub fn default(&self) -> &DefaultValue {
        &self.default
    }
}

pub type Validator = Arc<dyn Fn(&Model) -> Option<FieldErrors> + Send + Sync>;

/// A named, ordered list of field definitions.
#[derive(Clone)]
pub struct ModelSchema {
    name: String,
    fields: Vec<FieldDefinition>,
    index: HashMap<String, usize>,
    validator: Option<Validator>,
}

impl ModelSchema {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDefinition>) -> Result<Self> {
        let name = name.into();
        let mut index = HashMap::with_capacity(fields.len());
        for (idx, field) in fields.iter().enumerate() {
            if index.insert(field.name.clone(), idx).is_some() {
                return Err(GatewayError::Config(format!(
                    "model {name} declares field '{}' twice",
                    field.name
                )));
            }
        }
        Ok(Self {
            name,
            fields,
            index,
            validator: None,
        })
    }

    /// Install the validation hook returned by [`Model::validate`].
    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Model) -> Option<FieldErrors> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.index.get(name).map(|&idx| &self.fields[idx])
    }

    pub(crate) fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }
}

impl fmt::Debug for ModelSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSchema")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    String(String),
    Boolean(bool),
    Number(Number),
    Date(DateTime<Utc>),
    Json(Value),
    Model(Box<Model>),
    Enum(EnumValue),
    List(Vec<FieldValue>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            Self::Date(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_model(&self) -> Option<&Model> {
        match self {
            Self::Model(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_model_mut(&mut self) -> Option<&mut Model> {
        match self {
            Self::Model(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumValue> {
        match self {
            Self::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut Vec<FieldValue>> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::String(s) => Value::String(s.clone()),
            Self::Boolean(b) => Value::Bool(*b),
            Self::Number(n) => Value::Number(n.clone()),
            Self::Date(d) => Value::String(d.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Self::Json(v) => v.clone(),
            Self::Model(m) => m.to_json(),
            Self::Enum(e) => e.to_json(),
            Self::List(items) => Value::Array(items.iter().map(FieldValue::to_json).collect()),
        }
    }
}

impl From<Model> for FieldValue {
    fn from(model: Model) -> Self {
        Self::Model(Box::new(model))
    }
}

impl From<EnumValue> for FieldValue {
    fn from(value: EnumValue) -> Self {
        Self::Enum(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Date(value)
    }
}

impl From<Vec<FieldValue>> for FieldValue {
    fn from(items: Vec<FieldValue>) -> Self {
        Self::List(items)
    }
}

/// A decoded instance. Every declared field of its schema is present.
#[derive(Debug, Clone)]
pub struct Model {
    schema: Arc<ModelSchema>,
    values: Vec<FieldValue>,
}

impl Model {
    /// `values` must line up with `schema.fields()`; only the marshaller
    /// builds instances.
    pub(crate) fn from_parts(schema: Arc<ModelSchema>, values: Vec<FieldValue>) -> Self {
        debug_assert_eq!(schema.fields().len(), values.len());
        Self { schema, values }
    }

    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    pub fn model_name(&self) -> &str {
        self.schema.name()
    }

    /// `None` only for names the schema does not declare.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.schema.position(name).map(|idx| &self.values[idx])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut FieldValue> {
        self.schema.position(name).map(move |idx| &mut self.values[idx])
    }

    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) -> Result<()> {
        let idx = self.schema.position(name).ok_or_else(|| {
            GatewayError::InvalidInput(format!(
                "model {} has no field '{name}'",
                self.schema.name()
            ))
        })?;
        self.values[idx] = value.into();
        Ok(())
    }

    /// Declared fields in schema order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.schema
            .fields()
            .iter()
            .map(FieldDefinition::name)
            .zip(self.values.iter())
    }

    pub(crate) fn values(&self) -> &[FieldValue] {
        &self.values
    }

    /// Run the schema's validator. `None` means no errors.
    pub fn validate(&self) -> Option<FieldErrors> {
        self.schema
            .validator
            .as_ref()
            .and_then(|validator| validator(self))
            .filter(|errors| !errors.is_empty())
    }

    pub fn to_json(&self) -> Value {
        let mut map = Map::with_capacity(self.values.len());
        for (name, value) in self.fields() {
            map.insert(name.to_string(), value.to_json());
        }
        Value::Object(map)
    }

    /// Hand the instance to a serde type.
    pub fn to_typed<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.to_json())?)
    }
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.schema.name() == other.schema.name() && self.values == other.values
    }
}
