use include_dir::{include_dir, Dir};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::config::ServiceConfig;
use crate::error::{GatewayError, Result};
use crate::model::{EnumType, FieldDefinition, FieldType, ModelSchema, SchemaRegistry};

static BUILTIN_CATALOGS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/catalogs");

/// A YAML document declaring enums, models and services.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Catalog {
    pub enums: BTreeMap<String, EnumSpec>,
    pub models: BTreeMap<String, ModelSpec>,
    pub services: BTreeMap<String, ServiceConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnumSpec {
    /// Encode members by name rather than ordinal.
    #[serde(default = "default_write_name")]
    pub write_name: bool,
    pub values: EnumValues,
}

fn default_write_name() -> bool {
    true
}

/// Member names (ordinal = position) or an explicit `NAME: ordinal` map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnumValues {
    Names(Vec<String>),
    Ordinals(BTreeMap<String, i64>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelSpec {
    pub fields: Vec<FieldSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    pub name: String,
    /// A primitive keyword or the name of a declared model or enum.
    #[serde(rename = "type", default = "default_field_type")]
    pub field_type: String,
    #[serde(default)]
    pub list: bool,
    #[serde(default)]
    pub default: Option<Value>,
}

fn default_field_type() -> String {
    "json".to_string()
}

impl Catalog {
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// A catalog shipped with the crate.
    pub fn builtin(name: &str) -> Result<Self> {
        let text = BUILTIN_CATALOGS
            .get_file(format!("{name}.yaml"))
            .and_then(|file| file.contents_utf8())
            .ok_or_else(|| {
                GatewayError::Config(format!(
                    "no built-in catalog named '{name}' (available: {})",
                    Self::builtin_names().join(", ")
                ))
            })?;
        Self::from_yaml(text)
    }

    pub fn builtin_names() -> Vec<&'static str> {
        let mut names: Vec<&'static str> = BUILTIN_CATALOGS
            .files()
            .filter_map(|file| file.path().file_stem()?.to_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// Load `source` as a file path if it exists, otherwise as a built-in
    /// catalog name.
    pub fn load(source: &str) -> Result<Self> {
        let path = Path::new(source);
        if path.is_file() {
            Self::from_file(path)
        } else {
            Self::builtin(source)
        }
    }

    /// Compile enums and models into a checked registry.
    pub fn registry(&self) -> Result<SchemaRegistry> {
        let mut builder = SchemaRegistry::builder();

        for (name, spec) in &self.enums {
            let enum_type = match &spec.values {
                EnumValues::Names(names) => EnumType::from_names(name, names.iter().cloned(), spec.write_name)?,
                EnumValues::Ordinals(ordinals) => {
                    let mut pairs: Vec<(String, i64)> = ordinals.iter().map(|(n, v)| (n.clone(), *v)).collect();
                    pairs.sort_by_key(|(_, value)| *value);
                    EnumType::from_ordinals(name, pairs, spec.write_name)?
                }
            };
            builder = builder.enumeration(enum_type);
        }

        for (name, spec) in &self.models {
            let fields = spec
                .fields
                .iter()
                .map(|field| self.field_definition(name, field))
                .collect::<Result<Vec<_>>>()?;
            builder = builder.model(ModelSchema::new(name.clone(), fields)?);
        }

        builder.build()
    }

    fn field_definition(&self, model: &str, spec: &FieldSpec) -> Result<FieldDefinition> {
        let field_type = FieldType::primitive(&spec.field_type)
            .or_else(|| {
                self.models
                    .contains_key(&spec.field_type)
                    .then(|| FieldType::Model(spec.field_type.clone()))
            })
            .or_else(|| {
                self.enums
                    .contains_key(&spec.field_type)
                    .then(|| FieldType::Enum(spec.field_type.clone()))
            })
            .ok_or_else(|| {
                GatewayError::Config(format!(
                    "{model}.{}: unknown type '{}'",
                    spec.name, spec.field_type
                ))
            })?;

        let mut definition = FieldDefinition::new(spec.name.clone(), field_type);
        if spec.list {
            definition = definition.list();
        }
        if let Some(default) = &spec.default {
            definition = definition.default_value(default.clone());
        }
        Ok(definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
enums:
  Color:
    values: [RED, GREEN]
  Level:
    write_name: false
    values: {LOW: 10, HIGH: 20}
models:
  Tag:
    fields:
      - {name: label, type: string}
  Item:
    fields:
      - {name: name, type: string}
      - {name: color, type: Color}
      - {name: tags, type: Tag, list: true, default: []}
      - {name: extra}
services:
  Items:
    url: /api/items
    view_set: true
    model: Item
"#;

    #[test]
    fn test_parse_and_compile() {
        let catalog = Catalog::from_yaml(CATALOG).unwrap();
        let registry = catalog.registry().unwrap();

        assert_eq!(registry.model_names(), vec!["Item", "Tag"]);
        let level = registry.enumeration("Level").unwrap();
        assert_eq!(level.by_value(20).unwrap().name(), "HIGH");
        assert!(!level.write_name());

        let item = registry.model("Item").unwrap();
        assert_eq!(item.field("color").unwrap().field_type(), &FieldType::Enum("Color".into()));
        assert_eq!(item.field("extra").unwrap().field_type(), &FieldType::Json);
        assert!(item.field("tags").unwrap().is_list());
    }

    #[test]
    fn test_unknown_field_type() {
        let catalog = Catalog::from_yaml("models:\n  A:\n    fields:\n      - {name: x, type: Nope}").unwrap();
        assert!(matches!(catalog.registry(), Err(GatewayError::Config(_))));
    }

    #[test]
    fn test_bad_default_is_rejected() {
        let catalog =
            Catalog::from_yaml("models:\n  A:\n    fields:\n      - {name: at, type: date, default: soon}").unwrap();
        assert!(catalog.registry().is_err());
    }

    #[test]
    fn test_builtin_catalog_compiles() {
        assert!(Catalog::builtin_names().contains(&"airavata"));
        let catalog = Catalog::builtin("airavata").unwrap();
        let registry = catalog.registry().unwrap();
        assert!(registry.model("Experiment").is_some());
        assert!(registry.enumeration("ExperimentState").is_some());
        assert!(catalog.services.contains_key("ExperimentService"));
        assert!(catalog.services.len() > 3);
    }

    #[test]
    fn test_unknown_builtin() {
        assert!(matches!(Catalog::builtin("nope"), Err(GatewayError::Config(_))));
    }
}
