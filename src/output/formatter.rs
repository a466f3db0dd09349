use colored::*;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::error::{GatewayError, Result};
use crate::model::{FieldValue, Model, ModelSchema, SchemaRegistry};
use crate::service::{Service, ServiceDirectory, ServiceResult};

/// Longest cell text in table output.
const MAX_CELL_WIDTH: usize = 40;

/// Summary line printed above a page of results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageSummary {
    pub count: Option<u64>,
    pub shown: usize,
    pub has_next: bool,
}

pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Format whatever a service method returned
    pub fn format_result(&self, result: &ServiceResult) -> Result<String> {
        match result {
            ServiceResult::Empty => Ok(match self.format {
                OutputFormat::Json => "null".to_string(),
                _ => format!("{} Done (no content)", "✓".green()),
            }),
            ServiceResult::Model(model) => self.format_model(model),
            ServiceResult::Models(models) => self.format_models(models, None),
            ServiceResult::Paginated(pages) => {
                if self.format == OutputFormat::Json {
                    return to_pretty_json(&result.to_json());
                }
                let summary = PageSummary {
                    count: pages.count(),
                    shown: pages.results().len(),
                    has_next: pages.has_next(),
                };
                self.format_models(pages.results(), Some(summary))
            }
            ServiceResult::Json(value) => self.format_json(value),
            ServiceResult::Text(text) => Ok(text.clone()),
            ServiceResult::Bytes(bytes) => Ok(String::from_utf8_lossy(bytes).into_owned()),
        }
    }

    /// Format a single model as field/value pairs
    pub fn format_model(&self, model: &Model) -> Result<String> {
        match self.format {
            OutputFormat::Json => to_pretty_json(&model.to_json()),
            OutputFormat::Csv => {
                let rows = model
                    .fields()
                    .map(|(name, value)| vec![name.to_string(), display_value(value)])
                    .collect::<Vec<_>>();
                write_csv(&["field", "value"], &rows)
            }
            OutputFormat::Table => {
                let mut table = Table::new();
                table.set_header(vec![
                    Cell::new("Field").fg(Color::Cyan),
                    Cell::new("Value").fg(Color::Cyan),
                ]);
                for (name, value) in model.fields() {
                    table.add_row(vec![Cell::new(name), Cell::new(truncate_string(&display_value(value), 80))]);
                }
                table.set_content_arrangement(ContentArrangement::Dynamic);

                let mut result = format!("\n{} {}\n\n", "▸".cyan(), model.model_name().bold());
                result.push_str(&table.to_string());
                Ok(result)
            }
        }
    }

    /// Format a list of models of one schema, one row per model
    pub fn format_models(&self, models: &[Model], summary: Option<PageSummary>) -> Result<String> {
        if self.format == OutputFormat::Json {
            return to_pretty_json(&Value::Array(models.iter().map(Model::to_json).collect()));
        }

        let Some(first) = models.first() else {
            return Ok(match self.format {
                OutputFormat::Csv => String::new(),
                _ => format!("{} No results", "∅".yellow()),
            });
        };
        let headers: Vec<&str> = first.schema().fields().iter().map(|f| f.name()).collect();
        let rows = models
            .iter()
            .map(|model| model.fields().map(|(_, value)| display_value(value)).collect())
            .collect::<Vec<Vec<String>>>();

        match self.format {
            OutputFormat::Csv => write_csv(&headers, &rows),
            _ => {
                let mut result = String::new();
                if let Some(summary) = summary {
                    result.push_str(&format!(
                        "\n{} Total: {} | Results: {}{}\n\n",
                        "📊".cyan(),
                        summary
                            .count
                            .map(|c| c.to_string())
                            .unwrap_or_else(|| "?".to_string())
                            .yellow(),
                        summary.shown.to_string().yellow(),
                        if summary.has_next { " | more pages available (--all)" } else { "" }
                    ));
                }
                result.push_str(&build_table(&headers, &rows).to_string());
                Ok(result)
            }
        }
    }

    /// Format an undecoded JSON response
    pub fn format_json(&self, value: &Value) -> Result<String> {
        match (self.format, value) {
            (OutputFormat::Json, _) => to_pretty_json(value),
            (_, Value::Array(items)) if items.iter().all(Value::is_object) && !items.is_empty() => {
                let headers: Vec<String> = items[0].as_object().map(|o| o.keys().cloned().collect()).unwrap_or_default();
                let rows = items
                    .iter()
                    .map(|item| headers.iter().map(|h| display_json(&item[h.as_str()])).collect())
                    .collect::<Vec<Vec<String>>>();
                let headers: Vec<&str> = headers.iter().map(String::as_str).collect();
                match self.format {
                    OutputFormat::Csv => write_csv(&headers, &rows),
                    _ => Ok(build_table(&headers, &rows).to_string()),
                }
            }
            (OutputFormat::Csv, Value::Object(map)) => {
                let rows = map
                    .iter()
                    .map(|(k, v)| vec![k.clone(), display_json(v)])
                    .collect::<Vec<_>>();
                write_csv(&["field", "value"], &rows)
            }
            _ => to_pretty_json(value),
        }
    }

    /// List every service with its method count
    pub fn format_services(&self, directory: &ServiceDirectory) -> Result<String> {
        let headers = ["service", "methods"];
        let rows = directory
            .iter()
            .map(|service| {
                vec![
                    service.name().to_string(),
                    service.methods().map(|m| m.name()).collect::<Vec<_>>().join(", "),
                ]
            })
            .collect::<Vec<_>>();
        self.format_rows(&headers, &rows)
    }

    /// Describe the methods of one service
    pub fn format_service(&self, service: &Service) -> Result<String> {
        let headers = ["method", "verb", "url", "model", "pagination"];
        let rows = service
            .methods()
            .map(|method| {
                vec![
                    method.name().to_string(),
                    method.method().to_string(),
                    method.url_template().to_string(),
                    method.model().map(|m| m.name().to_string()).unwrap_or_else(|| "-".to_string()),
                    format!("{:?}", method.pagination()).to_lowercase(),
                ]
            })
            .collect::<Vec<_>>();
        self.format_rows(&headers, &rows)
    }

    /// List model and enum names
    pub fn format_registry(&self, registry: &SchemaRegistry) -> Result<String> {
        let headers = ["name", "kind", "size"];
        let mut rows = Vec::new();
        for name in registry.model_names() {
            let fields = registry.model(name).map(|m| m.fields().len()).unwrap_or(0);
            rows.push(vec![name.to_string(), "model".to_string(), format!("{fields} fields")]);
        }
        for name in registry.enum_names() {
            let members = registry.enumeration(name).map(|e| e.len()).unwrap_or(0);
            rows.push(vec![name.to_string(), "enum".to_string(), format!("{members} members")]);
        }
        self.format_rows(&headers, &rows)
    }

    /// Describe the fields of one model
    pub fn format_schema(&self, schema: &ModelSchema) -> Result<String> {
        let headers = ["field", "type", "list", "default"];
        let rows = schema
            .fields()
            .iter()
            .map(|field| {
                vec![
                    field.name().to_string(),
                    field.field_type().to_string(),
                    field.is_list().to_string(),
                    format!("{:?}", field.default()),
                ]
            })
            .collect::<Vec<_>>();
        self.format_rows(&headers, &rows)
    }

    fn format_rows(&self, headers: &[&str], rows: &[Vec<String>]) -> Result<String> {
        match self.format {
            OutputFormat::Table => Ok(build_table(headers, rows).to_string()),
            OutputFormat::Csv => write_csv(headers, rows),
            OutputFormat::Json => {
                let objects = rows
                    .iter()
                    .map(|row| {
                        let map = headers
                            .iter()
                            .zip(row)
                            .map(|(h, v)| (h.to_string(), json!(v)))
                            .collect::<serde_json::Map<_, _>>();
                        Value::Object(map)
                    })
                    .collect();
                to_pretty_json(&Value::Array(objects))
            }
        }
    }
}

fn build_table(headers: &[&str], rows: &[Vec<String>]) -> Table {
    let mut table = Table::new();
    table.set_header(headers.iter().map(|h| Cell::new(h).fg(Color::Cyan)).collect::<Vec<_>>());
    for row in rows {
        table.add_row(row.iter().map(|v| Cell::new(truncate_string(v, MAX_CELL_WIDTH))).collect::<Vec<_>>());
    }
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn write_csv(headers: &[&str], rows: &[Vec<String>]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(headers)?;
    for row in rows {
        wtr.write_record(row)?;
    }
    let data = wtr.into_inner().map_err(|e| GatewayError::Other(e.to_string()))?;

    // Add BOM for Excel compatibility
    let mut result = vec![0xEF, 0xBB, 0xBF];
    result.extend_from_slice(&data);

    String::from_utf8(result).map_err(|e| GatewayError::Other(e.to_string()))
}

fn to_pretty_json(value: &Value) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Cell text of a decoded value.
pub fn display_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Null => String::new(),
        FieldValue::String(s) => s.clone(),
        FieldValue::Boolean(b) => b.to_string(),
        FieldValue::Number(n) => n.to_string(),
        FieldValue::Date(d) => d.format("%Y-%m-%d %H:%M:%S").to_string(),
        FieldValue::Enum(e) => e.name().into_owned(),
        FieldValue::Json(v) => display_json(v),
        FieldValue::Model(m) => m.to_json().to_string(),
        FieldValue::List(items) => items.iter().map(display_value).collect::<Vec<_>>().join(", "),
    }
}

fn display_json(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldDefinition, Marshaller};
    use std::sync::Arc;

    fn models() -> Vec<Model> {
        let registry = SchemaRegistry::builder()
            .model(
                ModelSchema::new(
                    "Project",
                    vec![
                        FieldDefinition::string("name"),
                        FieldDefinition::string("tags").list(),
                    ],
                )
                .unwrap(),
            )
            .build()
            .unwrap();
        let marshaller = Marshaller::new(Arc::new(registry));
        marshaller
            .decode_list("Project", &json!([{"name": "alpha", "tags": ["a", "b"]}, {"name": "beta, inc"}]))
            .unwrap()
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("short", 10), "short");
        assert_eq!(truncate_string("a much longer string", 10), "a much ...");
    }

    #[test]
    fn test_csv_output_quotes_and_bom() {
        let csv = Formatter::new(OutputFormat::Csv).format_models(&models(), None).unwrap();
        assert!(csv.starts_with('\u{feff}'));
        assert!(csv.contains("name,tags"));
        assert!(csv.contains("alpha,\"a, b\""));
        assert!(csv.contains("\"beta, inc\","));
    }

    #[test]
    fn test_json_output_is_encoded_models() {
        let out = Formatter::new(OutputFormat::Json).format_models(&models(), None).unwrap();
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed[0]["name"], "alpha");
        assert_eq!(parsed[1]["tags"], json!(null));
    }

    #[test]
    fn test_table_output_lists_rows() {
        let out = Formatter::new(OutputFormat::Table)
            .format_models(&models(), Some(PageSummary { count: Some(2), shown: 2, has_next: false }))
            .unwrap();
        assert!(out.contains("alpha"));
        assert!(out.contains("Total"));
    }

    #[test]
    fn test_empty_list() {
        let out = Formatter::new(OutputFormat::Table).format_models(&[], None).unwrap();
        assert!(out.contains("No results"));
    }
}
