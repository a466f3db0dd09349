use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use log::warn;
use serde_json::{Number, Value};
use std::sync::Arc;

use super::{DefaultValue, FieldDefinition, FieldType, FieldValue, Model, ModelSchema, SchemaRegistry};
use crate::error::{GatewayError, Result};

/// Decodes raw JSON into [`Model`] instances according to a
/// [`SchemaRegistry`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Marshaller {
    registry: Arc<SchemaRegistry>,
}

impl Marshaller {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn schema(&self, model: &str) -> Result<Arc<ModelSchema>> {
        self.registry
            .model(model)
            .cloned()
            .ok_or_else(|| GatewayError::Config(format!("unknown model '{model}'")))
    }

    pub fn decode(&self, model: &str, raw: &Value) -> Result<Model> {
        let schema = self.schema(model)?;
        self.decode_schema(&schema, raw)
    }

    pub fn decode_schema(&self, schema: &Arc<ModelSchema>, raw: &Value) -> Result<Model> {
        Decoder::new(&self.registry).object(schema, raw, schema.name())
    }

    /// Decode an array of objects. A single object is treated as a list of one.
    pub fn decode_list(&self, model: &str, raw: &Value) -> Result<Vec<Model>> {
        let schema = self.schema(model)?;
        self.decode_list_schema(&schema, raw)
    }

    pub fn decode_list_schema(&self, schema: &Arc<ModelSchema>, raw: &Value) -> Result<Vec<Model>> {
        let decoder = Decoder::new(&self.registry);
        match raw {
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(idx, item)| decoder.object(schema, item, &format!("{}[{idx}]", schema.name())))
                .collect(),
            other => Ok(vec![decoder.object(schema, other, schema.name())?]),
        }
    }

    /// Decode again from an instance. Values already of the target model or
    /// enum pass through, so `redecode(decode(raw)) == decode(raw)`.
    pub fn redecode(&self, model: &Model) -> Result<Model> {
        Decoder::new(&self.registry).instance(model, model.model_name())
    }
}

#[derive(Clone, Copy)]
enum Source<'a> {
    Raw(&'a Value),
    Decoded(&'a FieldValue),
}

impl<'a> Source<'a> {
    fn is_absent(&self) -> bool {
        match self {
            Self::Raw(value) => value.is_null(),
            Self::Decoded(value) => value.is_null(),
        }
    }

    fn elements(self) -> Vec<Source<'a>> {
        match self {
            Self::Raw(Value::Array(items)) => items.iter().map(Source::Raw).collect(),
            Self::Decoded(FieldValue::List(items)) => items.iter().map(Source::Decoded).collect(),
            single => vec![single],
        }
    }
}

/// Borrowing worker shared by [`Marshaller`] and registry validation.
pub(crate) struct Decoder<'r> {
    registry: &'r SchemaRegistry,
}

impl<'r> Decoder<'r> {
    pub(crate) fn new(registry: &'r SchemaRegistry) -> Self {
        Self { registry }
    }

    fn object(&self, schema: &Arc<ModelSchema>, raw: &Value, path: &str) -> Result<Model> {
        let Value::Object(map) = raw else {
            return Err(GatewayError::decode(
                path,
                format!("expected an object, got {}", describe(raw)),
            ));
        };
        let values = schema
            .fields()
            .iter()
            .map(|field| {
                let source = map.get(field.name()).map(Source::Raw);
                self.field(field, source, &format!("{path}.{}", field.name()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Model::from_parts(schema.clone(), values))
    }

    fn instance(&self, model: &Model, path: &str) -> Result<Model> {
        let schema = model.schema();
        let values = schema
            .fields()
            .iter()
            .zip(model.values())
            .map(|(field, value)| {
                self.field(field, Some(Source::Decoded(value)), &format!("{path}.{}", field.name()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Model::from_parts(schema.clone(), values))
    }

    fn field(&self, field: &FieldDefinition, source: Option<Source<'_>>, path: &str) -> Result<FieldValue> {
        let source = match source {
            Some(source) if !source.is_absent() => source,
            _ => return self.default(field, path),
        };
        if !field.is_list() {
            return self.convert(field.field_type(), source, path);
        }
        source
            .elements()
            .into_iter()
            .enumerate()
            .map(|(idx, item)| {
                if item.is_absent() {
                    Ok(FieldValue::Null)
                } else {
                    self.convert(field.field_type(), item, &format!("{path}[{idx}]"))
                }
            })
            .collect::<Result<Vec<_>>>()
            .map(FieldValue::List)
    }

    pub(crate) fn default(&self, field: &FieldDefinition, path: &str) -> Result<FieldValue> {
        match field.default() {
            DefaultValue::Null | DefaultValue::Literal(Value::Null) => Ok(FieldValue::Null),
            DefaultValue::Literal(value) => self.field(field, Some(Source::Raw(value)), path),
            DefaultValue::Factory(factory) => Ok(factory()),
        }
    }

    fn convert(&self, ty: &FieldType, source: Source<'_>, path: &str) -> Result<FieldValue> {
        match source {
            Source::Raw(raw) => self.convert_raw(ty, raw, path),
            Source::Decoded(value) => match (ty, value) {
                (FieldType::Model(name), FieldValue::Model(model)) if model.model_name() == name => {
                    Ok(value.clone())
                }
                (FieldType::Enum(name), FieldValue::Enum(e)) if e.enum_name() == name => Ok(value.clone()),
                (FieldType::String, FieldValue::String(_))
                | (FieldType::Boolean, FieldValue::Boolean(_))
                | (FieldType::Number, FieldValue::Number(_))
                | (FieldType::Date, FieldValue::Date(_))
                | (FieldType::Json, FieldValue::Json(_)) => Ok(value.clone()),
                _ => self.convert_raw(ty, &value.to_json(), path),
            },
        }
    }

    fn convert_raw(&self, ty: &FieldType, raw: &Value, path: &str) -> Result<FieldValue> {
        match ty {
            FieldType::String => match raw {
                Value::String(s) => Ok(FieldValue::String(s.clone())),
                Value::Number(n) => Ok(FieldValue::String(n.to_string())),
                Value::Bool(b) => Ok(FieldValue::String(b.to_string())),
                other => Ok(pass_through(path, "a string", other)),
            },
            FieldType::Boolean => match raw {
                Value::Bool(b) => Ok(FieldValue::Boolean(*b)),
                Value::String(s) if s == "true" => Ok(FieldValue::Boolean(true)),
                Value::String(s) if s == "false" => Ok(FieldValue::Boolean(false)),
                other => Ok(pass_through(path, "a boolean", other)),
            },
            FieldType::Number => match raw {
                Value::Number(n) => Ok(FieldValue::Number(n.clone())),
                Value::String(s) => Ok(parse_number(s)
                    .map(FieldValue::Number)
                    .unwrap_or_else(|| pass_through(path, "a number", raw))),
                other => Ok(pass_through(path, "a number", other)),
            },
            FieldType::Date => parse_date(raw)
                .map(FieldValue::Date)
                .map_err(|message| GatewayError::decode(path, message)),
            FieldType::Json => Ok(FieldValue::Json(raw.clone())),
            FieldType::Model(name) => {
                let schema = self
                    .registry
                    .model(name)
                    .ok_or_else(|| GatewayError::decode(path, format!("unknown model '{name}'")))?;
                self.object(schema, raw, path).map(FieldValue::from)
            }
            FieldType::Enum(name) => {
                let ty = self
                    .registry
                    .enumeration(name)
                    .ok_or_else(|| GatewayError::decode(path, format!("unknown enum '{name}'")))?;
                Ok(FieldValue::Enum(ty.resolve(raw)))
            }
        }
    }
}

/// Primitives of an unexpected shape are kept as raw JSON.
fn pass_through(path: &str, expected: &str, got: &Value) -> FieldValue {
    warn!("{path}: expected {expected}, got {}; keeping the raw value", describe(got));
    FieldValue::Json(got.clone())
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn parse_number(s: &str) -> Option<Number> {
    let s = s.trim();
    if let Ok(int) = s.parse::<i64>() {
        return Some(int.into());
    }
    s.parse::<f64>().ok().and_then(Number::from_f64)
}

/// Parse a JSON date: RFC 3339, naive date-time (UTC), plain date, or epoch
/// milliseconds.
pub fn parse_date(raw: &Value) -> std::result::Result<DateTime<Utc>, String> {
    match raw {
        Value::String(s) => {
            if let Ok(date) = DateTime::parse_from_rfc3339(s) {
                return Ok(date.with_timezone(&Utc));
            }
            for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                    return Ok(naive.and_utc());
                }
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
                .ok_or_else(|| format!("'{s}' is not a date"))
        }
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(DateTime::from_timestamp_millis)
            .ok_or_else(|| format!("{n} is out of range for a timestamp")),
        other => Err(format!("expected a date, got {}", describe(other))),
    }
}
