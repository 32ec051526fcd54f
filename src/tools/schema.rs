//! Compiled input schemas for generated tools.
//!
//! Each operation's `params` and `body` descriptors are compiled once into a
//! [`FieldSchema`] tree. Validating agent-supplied arguments walks that tree:
//!
//! 1. **Required fields** must be present and non-null.
//! 2. **Defaults** fill omitted optional fields.
//! 3. **Type coercion**: `"123"` becomes `123` for integer and number fields,
//!    `"true"`/`"false"` become booleans, scalars become strings.
//! 4. **Formats**: email, date, date-time and uri strings are checked.
//! 5. **Enums** are checked after coercion.
//! 6. **Unknown fields** are dropped from the output, never forwarded.
//!
//! Objects that declare no properties are free-form and pass through
//! unchanged (provider filter objects, property bags).

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value, json};

use crate::manifest::{ParamKind, ParameterDef, ProviderOperation, StringFormat};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex is valid")
});

/// A single validation violation with a message the agent can act on.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationViolation {
    /// Dotted path to the offending value (empty for top-level issues).
    pub param: String,
    /// What is wrong.
    pub message: String,
}

impl ValidationViolation {
    fn new(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            param: param.into(),
            message: message.into(),
        }
    }
}

/// The result of validating arguments against an [`InputSchema`].
#[derive(Debug, Clone)]
pub struct SchemaValidationResult {
    /// All violations found. Empty means the arguments are valid.
    pub violations: Vec<ValidationViolation>,
    /// Arguments after coercion, defaults and dropping unknown fields.
    pub coerced: Map<String, Value>,
}

impl SchemaValidationResult {
    /// Returns `true` if there are no violations.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Render violations plus the list of valid parameters.
    #[must_use]
    pub fn format_error(&self, schema: &InputSchema) -> String {
        let mut out = String::from("Tool call validation failed:\n\n");

        for v in &self.violations {
            if v.param.is_empty() {
                let _ = writeln!(out, "- {}", v.message);
            } else {
                let _ = writeln!(out, "- Parameter '{}': {}", v.param, v.message);
            }
        }

        if !schema.fields.is_empty() {
            out.push_str("\nValid parameters for this tool:\n");
            for (name, field) in &schema.fields {
                let _ = writeln!(out, "  - {name}: {}", field.summary());
            }
        }

        out
    }
}

/// Structural type of a compiled field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// String with an optional format check
    String(Option<StringFormat>),
    /// Whole number
    Integer,
    /// Any number
    Number,
    /// Boolean
    Boolean,
    /// List of one element type
    Array(Box<FieldSchema>),
    /// Named fields; empty means free-form
    Object(BTreeMap<String, FieldSchema>),
}

/// One compiled field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    /// Structural type
    pub kind: FieldKind,
    /// Must be present and non-null
    pub required: bool,
    /// Filled in when omitted
    pub default: Option<Value>,
    /// Allowed values
    pub enum_values: Option<Vec<Value>>,
    /// Agent-facing description
    pub description: String,
}

impl FieldSchema {
    /// Compile a parameter descriptor.
    #[must_use]
    pub fn compile(def: &ParameterDef) -> Self {
        let kind = match &def.kind {
            ParamKind::String => FieldKind::String(def.format),
            ParamKind::Integer => FieldKind::Integer,
            ParamKind::Number => FieldKind::Number,
            ParamKind::Boolean => FieldKind::Boolean,
            ParamKind::Array { items } => FieldKind::Array(Box::new(Self::compile(items))),
            ParamKind::Object { properties } => FieldKind::Object(compile_fields(properties)),
        };
        Self {
            kind,
            required: def.required,
            default: def.default.clone(),
            enum_values: def.enum_values.clone(),
            description: def.description.clone(),
        }
    }

    fn type_name(&self) -> &'static str {
        match self.kind {
            FieldKind::String(_) => "string",
            FieldKind::Integer => "integer",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Array(_) => "array",
            FieldKind::Object(_) => "object",
        }
    }

    /// JSON Schema for this field.
    #[must_use]
    pub fn to_json_schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".to_string(), json!(self.type_name()));

        match &self.kind {
            FieldKind::String(Some(format)) => {
                schema.insert("format".to_string(), json!(format.as_str()));
            }
            FieldKind::Array(items) => {
                schema.insert("items".to_string(), items.to_json_schema());
            }
            FieldKind::Object(fields) if !fields.is_empty() => {
                let (properties, required) = object_schema(fields);
                schema.insert("properties".to_string(), properties);
                if !required.is_empty() {
                    schema.insert("required".to_string(), json!(required));
                }
            }
            _ => {}
        }

        if !self.description.is_empty() {
            schema.insert("description".to_string(), json!(self.description));
        }
        if let Some(values) = &self.enum_values {
            schema.insert("enum".to_string(), Value::Array(values.clone()));
        }
        if let Some(default) = &self.default {
            schema.insert("default".to_string(), default.clone());
        }

        Value::Object(schema)
    }

    fn summary(&self) -> String {
        let req = if self.required {
            " [required]"
        } else {
            " [optional]"
        };
        let format = match &self.kind {
            FieldKind::String(Some(f)) => format!(", {}", f.as_str()),
            _ => String::new(),
        };
        let enum_hint = self
            .enum_values
            .as_ref()
            .map(|values| {
                let opts: Vec<String> = values.iter().map(value_to_display_string).collect();
                format!(", one of: {}", opts.join(", "))
            })
            .unwrap_or_default();
        let desc = if self.description.is_empty() {
            String::new()
        } else {
            format!(": {}", self.description)
        };
        format!("({}{format}{req}){enum_hint}{desc}", self.type_name())
    }

    fn validate(&self, value: &Value, path: &str, violations: &mut Vec<ValidationViolation>) -> Value {
        let coerced = match &self.kind {
            FieldKind::String(format) => match coerce_to_string(value) {
                Ok(v) => {
                    if let (Some(format), Some(s)) = (format, v.as_str()) {
                        if let Err(msg) = check_format(*format, s) {
                            violations.push(ValidationViolation::new(path, msg));
                        }
                    }
                    v
                }
                Err(msg) => {
                    violations.push(ValidationViolation::new(path, msg));
                    return value.clone();
                }
            },
            FieldKind::Integer => coerce_or_report(coerce_to_integer(value), value, path, violations),
            FieldKind::Number => coerce_or_report(coerce_to_number(value), value, path, violations),
            FieldKind::Boolean => coerce_or_report(coerce_to_boolean(value), value, path, violations),
            FieldKind::Array(items) => {
                let Value::Array(elements) = value else {
                    violations.push(ValidationViolation::new(
                        path,
                        format!("expected array, got {}", json_type_name(value)),
                    ));
                    return value.clone();
                };
                Value::Array(
                    elements
                        .iter()
                        .enumerate()
                        .map(|(i, element)| items.validate(element, &format!("{path}[{i}]"), violations))
                        .collect(),
                )
            }
            FieldKind::Object(fields) => {
                let Value::Object(map) = value else {
                    violations.push(ValidationViolation::new(
                        path,
                        format!("expected object, got {}", json_type_name(value)),
                    ));
                    return value.clone();
                };
                if fields.is_empty() {
                    value.clone()
                } else {
                    Value::Object(validate_fields(fields, map, path, violations))
                }
            }
        };

        if let Some(allowed) = &self.enum_values {
            if !allowed.contains(&coerced) {
                let opts: Vec<String> = allowed.iter().map(value_to_display_string).collect();
                violations.push(ValidationViolation::new(
                    path,
                    format!(
                        "value {} is not allowed; must be one of: {}",
                        value_to_display_string(&coerced),
                        opts.join(", ")
                    ),
                ));
            }
        }

        coerced
    }
}

/// Compiled schema for one tool's arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSchema {
    fields: BTreeMap<String, FieldSchema>,
}

impl InputSchema {
    /// Compile an operation's `params` and `body` into one flat schema.
    ///
    /// The validator rejects manifests declaring a name in both maps; if one
    /// slips through, the body definition wins.
    #[must_use]
    pub fn compile(op: &ProviderOperation) -> Self {
        let mut fields = compile_fields(&op.params);
        fields.extend(compile_fields(&op.body));
        Self { fields }
    }

    /// Validate and normalize agent arguments.
    ///
    /// `Null` is treated as an empty object.
    #[must_use]
    pub fn validate(&self, arguments: &Value) -> SchemaValidationResult {
        let empty = Map::new();
        let map = match arguments {
            Value::Null => &empty,
            Value::Object(map) => map,
            other => {
                return SchemaValidationResult {
                    violations: vec![ValidationViolation::new(
                        "",
                        format!(
                            "arguments must be a JSON object, got {}",
                            json_type_name(other)
                        ),
                    )],
                    coerced: Map::new(),
                };
            }
        };

        let mut violations = Vec::new();
        let coerced = validate_fields(&self.fields, map, "", &mut violations);
        SchemaValidationResult {
            violations,
            coerced,
        }
    }

    /// JSON Schema advertised to the agent.
    #[must_use]
    pub fn to_json_schema(&self) -> Value {
        let (properties, required) = object_schema(&self.fields);
        let mut schema = json!({
            "type": "object",
            "properties": properties,
            "additionalProperties": false,
        });
        if !required.is_empty() {
            schema["required"] = json!(required);
        }
        schema
    }
}

fn compile_fields(defs: &BTreeMap<String, ParameterDef>) -> BTreeMap<String, FieldSchema> {
    defs.iter()
        .map(|(name, def)| (name.clone(), FieldSchema::compile(def)))
        .collect()
}

fn object_schema(fields: &BTreeMap<String, FieldSchema>) -> (Value, Vec<&str>) {
    let properties: Map<String, Value> = fields
        .iter()
        .map(|(name, field)| (name.clone(), field.to_json_schema()))
        .collect();
    let required = fields
        .iter()
        .filter(|(_, f)| f.required)
        .map(|(name, _)| name.as_str())
        .collect();
    (Value::Object(properties), required)
}

fn validate_fields(
    fields: &BTreeMap<String, FieldSchema>,
    map: &Map<String, Value>,
    prefix: &str,
    violations: &mut Vec<ValidationViolation>,
) -> Map<String, Value> {
    let mut out = Map::new();

    for (name, field) in fields {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };

        match map.get(name) {
            None | Some(Value::Null) => {
                if field.required {
                    let msg = if map.contains_key(name) {
                        "required parameter must not be null"
                    } else {
                        "required parameter is missing"
                    };
                    violations.push(ValidationViolation::new(path, msg));
                } else if let Some(default) = &field.default {
                    out.insert(name.clone(), default.clone());
                }
            }
            Some(value) => {
                let coerced = field.validate(value, &path, violations);
                out.insert(name.clone(), coerced);
            }
        }
    }

    for key in map.keys() {
        if !fields.contains_key(key) {
            tracing::debug!(param = %key, "Dropping undeclared argument");
        }
    }

    out
}

fn check_format(format: StringFormat, s: &str) -> Result<(), String> {
    let ok = match format {
        StringFormat::Email => EMAIL_RE.is_match(s),
        StringFormat::Date => chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok(),
        StringFormat::DateTime => chrono::DateTime::parse_from_rfc3339(s).is_ok(),
        StringFormat::Uri => url::Url::parse(s).is_ok(),
    };
    if ok {
        Ok(())
    } else {
        Err(format!("\"{s}\" is not a valid {}", format.as_str()))
    }
}

// ── Type coercion ─────────────────────────────────────────────────────────────

fn coerce_or_report(
    result: Result<Value, String>,
    original: &Value,
    path: &str,
    violations: &mut Vec<ValidationViolation>,
) -> Value {
    result.unwrap_or_else(|msg| {
        violations.push(ValidationViolation::new(path, msg));
        original.clone()
    })
}

fn coerce_to_string(value: &Value) -> Result<Value, String> {
    match value {
        Value::String(_) => Ok(value.clone()),
        Value::Number(n) => Ok(Value::String(n.to_string())),
        Value::Bool(b) => Ok(Value::String(b.to_string())),
        _ => Err(format!("expected string, got {}", json_type_name(value))),
    }
}

fn coerce_to_integer(value: &Value) -> Result<Value, String> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
        Value::Number(n) => {
            // Float with no fractional part becomes an integer.
            if let Some(f) = n.as_f64() {
                if f.fract() == 0.0 && f.abs() < 9.0e15 {
                    #[allow(clippy::cast_possible_truncation)]
                    return Ok(Value::Number((f as i64).into()));
                }
            }
            Err(format!("expected integer, got float {n}"))
        }
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(|i| Value::Number(i.into()))
            .map_err(|_| format!("expected integer, got string \"{s}\" which is not a valid integer")),
        _ => Err(format!("expected integer, got {}", json_type_name(value))),
    }
}

fn coerce_to_number(value: &Value) -> Result<Value, String> {
    match value {
        Value::Number(_) => Ok(value.clone()),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(|f| serde_json::Number::from_f64(f).map(Value::Number))
            .ok_or_else(|| format!("expected number, got string \"{s}\" which is not a valid number")),
        _ => Err(format!("expected number, got {}", json_type_name(value))),
    }
}

fn coerce_to_boolean(value: &Value) -> Result<Value, String> {
    match value {
        Value::Bool(_) => Ok(value.clone()),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(Value::Bool(true)),
            "false" | "0" | "no" => Ok(Value::Bool(false)),
            _ => Err(format!("expected boolean, got string \"{s}\"; use true or false")),
        },
        Value::Number(n) => match n.as_i64() {
            Some(1) => Ok(Value::Bool(true)),
            Some(0) => Ok(Value::Bool(false)),
            _ => Err(format!("expected boolean, got number {n}; use true or false")),
        },
        _ => Err(format!("expected boolean, got {}", json_type_name(value))),
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn value_to_display_string(v: &Value) -> String {
    match v {
        Value::String(s) => format!("\"{s}\""),
        _ => v.to_string(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
