use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::marshal::Decoder;
use super::{DefaultValue, EnumType, FieldType, GatewayEnum, ModelSchema};
use crate::error::{GatewayError, Result};

/// Every model schema and enum type known to a client. Built once, then
/// shared read-only.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    models: HashMap<String, Arc<ModelSchema>>,
    enums: HashMap<String, Arc<EnumType>>,
}

impl SchemaRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn model(&self, name: &str) -> Option<&Arc<ModelSchema>> {
        self.models.get(name)
    }

    pub fn enumeration(&self, name: &str) -> Option<&Arc<EnumType>> {
        self.enums.get(name)
    }

    pub fn model_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn enum_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.enums.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    models: Vec<ModelSchema>,
    enums: Vec<Arc<EnumType>>,
}

impl RegistryBuilder {
    pub fn model(mut self, schema: ModelSchema) -> Self {
        self.models.push(schema);
        self
    }

    pub fn enumeration(mut self, enum_type: Arc<EnumType>) -> Self {
        self.enums.push(enum_type);
        self
    }

    /// Register the descriptor of a [`gateway_enum!`](crate::gateway_enum) type.
    pub fn typed_enum<E: GatewayEnum>(self) -> Self {
        self.enumeration(E::enum_type())
    }

    /// Check names, references and literal defaults, then freeze.
    pub fn build(self) -> Result<SchemaRegistry> {
        let mut registry = SchemaRegistry::default();

        for enum_type in self.enums {
            let name = enum_type.name().to_string();
            if registry.enums.insert(name.clone(), enum_type).is_some() {
                return Err(GatewayError::Config(format!("enum '{name}' declared twice")));
            }
        }
        for schema in self.models {
            let name = schema.name().to_string();
            if registry.enums.contains_key(&name) {
                return Err(GatewayError::Config(format!(
                    "'{name}' is declared both as a model and as an enum"
                )));
            }
            if registry.models.insert(name.clone(), Arc::new(schema)).is_some() {
                return Err(GatewayError::Config(format!("model '{name}' declared twice")));
            }
        }

        for schema in registry.models.values() {
            for field in schema.fields() {
                match field.field_type() {
                    FieldType::Model(target) if !registry.models.contains_key(target) => {
                        return Err(GatewayError::Config(format!(
                            "{}.{} refers to unknown model '{target}'",
                            schema.name(),
                            field.name()
                        )));
                    }
                    FieldType::Enum(target) if !registry.enums.contains_key(target) => {
                        return Err(GatewayError::Config(format!(
                            "{}.{} refers to unknown enum '{target}'",
                            schema.name(),
                            field.name()
                        )));
                    }
                    _ => {}
                }
            }
        }

        check_default_cycles(&registry.models)?;

        let decoder = Decoder::new(&registry);
        for schema in registry.models.values() {
            for field in schema.fields() {
                if let DefaultValue::Literal(_) = field.default() {
                    let path = format!("{}.{}", schema.name(), field.name());
                    decoder.default(field, &path).map_err(|err| {
                        GatewayError::Config(format!("invalid default for {path}: {err}"))
                    })?;
                }
            }
        }

        Ok(registry)
    }
}

/// Reject models whose literal defaults build objects that, through further
/// literal defaults, build the same model again.
fn check_default_cycles(models: &HashMap<String, Arc<ModelSchema>>) -> Result<()> {
    let edges: HashMap<&str, Vec<&str>> = models
        .iter()
        .map(|(name, schema)| {
            let targets = schema
                .fields()
                .iter()
                .filter_map(|field| match (field.field_type(), field.default()) {
                    (FieldType::Model(target), DefaultValue::Literal(value)) if builds_object(value) => {
                        Some(target.as_str())
                    }
                    _ => None,
                })
                .collect();
            (name.as_str(), targets)
        })
        .collect();

    let mut done = HashSet::new();
    for &name in edges.keys() {
        visit(name, &edges, &mut Vec::new(), &mut done)?;
    }
    Ok(())
}

fn visit<'a>(
    name: &'a str,
    edges: &HashMap<&'a str, Vec<&'a str>>,
    stack: &mut Vec<&'a str>,
    done: &mut HashSet<&'a str>,
) -> Result<()> {
    if done.contains(name) {
        return Ok(());
    }
    if let Some(start) = stack.iter().position(|&seen| seen == name) {
        let mut chain = stack[start..].to_vec();
        chain.push(name);
        return Err(GatewayError::Config(format!(
            "literal defaults never terminate: {}",
            chain.join(" -> ")
        )));
    }
    stack.push(name);
    for &target in edges.get(name).into_iter().flatten() {
        visit(target, edges, stack, done)?;
    }
    stack.pop();
    done.insert(name);
    Ok(())
}

fn builds_object(value: &Value) -> bool {
    match value {
        Value::Object(_) => true,
        Value::Array(items) => items.iter().any(Value::is_object),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldDefinition;
    use serde_json::json;

    #[test]
    fn test_unknown_references_rejected() {
        let err = SchemaRegistry::builder()
            .model(ModelSchema::new("A", vec![FieldDefinition::model("b", "B")]).unwrap())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("unknown model 'B'"));

        let err = SchemaRegistry::builder()
            .model(ModelSchema::new("A", vec![FieldDefinition::enumeration("s", "State")]).unwrap())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("unknown enum 'State'"));
    }

    #[test]
    fn test_name_clashes_rejected() {
        let state = EnumType::from_names("State", ["ON"], true).unwrap();
        let result = SchemaRegistry::builder()
            .enumeration(state)
            .model(ModelSchema::new("State", vec![]).unwrap())
            .build();
        assert!(result.is_err());

        let result = SchemaRegistry::builder()
            .model(ModelSchema::new("A", vec![]).unwrap())
            .model(ModelSchema::new("A", vec![]).unwrap())
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_literal_default_rejected() {
        let result = SchemaRegistry::builder()
            .model(
                ModelSchema::new("A", vec![FieldDefinition::date("when").default_value(json!("soon"))])
                    .unwrap(),
            )
            .build();
        assert!(matches!(result, Err(GatewayError::Config(_))));
    }

    #[test]
    fn test_self_referencing_model() {
        let registry = SchemaRegistry::builder()
            .model(
                ModelSchema::new(
                    "Node",
                    vec![
                        FieldDefinition::string("name"),
                        FieldDefinition::model("children", "Node").list().default_value(json!([])),
                    ],
                )
                .unwrap(),
            )
            .build()
            .unwrap();
        assert_eq!(registry.model_names(), vec!["Node"]);
    }

    #[test]
    fn test_recursive_literal_defaults_rejected() {
        let err = SchemaRegistry::builder()
            .model(
                ModelSchema::new(
                    "Node",
                    vec![
                        FieldDefinition::string("name"),
                        FieldDefinition::model("parent", "Node").default_value(json!({})),
                    ],
                )
                .unwrap(),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
        assert!(err.to_string().contains("Node -> Node"), "{err}");

        let err = SchemaRegistry::builder()
            .model(ModelSchema::new("A", vec![FieldDefinition::model("b", "B").default_value(json!({}))]).unwrap())
            .model(
                ModelSchema::new("B", vec![FieldDefinition::model("a", "A").list().default_value(json!([{}]))])
                    .unwrap(),
            )
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("never terminate"), "{err}");
    }

    #[test]
    fn test_acyclic_literal_defaults_accepted() {
        let registry = SchemaRegistry::builder()
            .model(ModelSchema::new("Leaf", vec![FieldDefinition::string("label").default_value("x")]).unwrap())
            .model(
                ModelSchema::new("Root", vec![FieldDefinition::model("leaf", "Leaf").default_value(json!({}))])
                    .unwrap(),
            )
            .build()
            .unwrap();
        assert_eq!(registry.model_names(), vec!["Leaf", "Root"]);
    }
}
