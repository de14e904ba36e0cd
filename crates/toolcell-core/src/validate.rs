//! Schema-driven input validation and coercion.
//!
//! Validates a caller-supplied JSON document against a tool descriptor's
//! input schema (a JSON-Schema subset: `type`, `properties`, `required`,
//! `default`, `enum`, `pattern`, `minimum`, `maximum`, `minLength`,
//! `maxLength`, `minItems`, `maxItems`, `items`). Handles wrapper
//! unwrapping, nested objects, arrays of objects, union types, defaults,
//! and constraint checks.
//!
//! Error and warning order is stable: present keys in input-document order,
//! then defaulted fields in declared-schema order (serde_json is built with
//! `preserve_order` for exactly this reason).

use serde_json::{Map, Value};

/// Result of validating one document.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub valid: bool,
    /// Coerced document; never partially converted when `valid` is false.
    pub data: Value,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

struct ObjectOutcome {
    valid: bool,
    data: Map<String, Value>,
    errors: Vec<String>,
    warnings: Vec<String>,
}

struct FieldOutcome {
    valid: bool,
    value: Value,
    errors: Vec<String>,
    warnings: Vec<String>,
}

/// Validate `input` against `schema`, returning coerced data plus
/// accumulated errors and warnings.
pub fn validate_input(input: &Value, schema: &Value) -> ValidationReport {
    // Wrapper normalization: a single typeless property whose children
    // include at least one typed schema stands in for the real schema.
    let (properties, required, wrapper_key) = normalize_schema(schema);

    let validation_target = match wrapper_key {
        Some(ref key) => input.get(key.as_str()).unwrap_or(input),
        None => input,
    };

    let properties = match properties {
        Some(props) if !props.is_empty() => props,
        _ => {
            return ValidationReport {
                valid: true,
                data: input.clone(),
                errors: Vec::new(),
                warnings: vec!["No properties to validate".to_string()],
            };
        }
    };

    let data = match validation_target.as_object() {
        Some(map) => map,
        None => {
            return ValidationReport {
                valid: false,
                data: Value::Object(Map::new()),
                errors: vec!["Validation error: input document is not an object".to_string()],
                warnings: Vec::new(),
            };
        }
    };

    let outcome = validate_object(data, &properties, &required, "root");

    let data = if outcome.valid {
        let inner = Value::Object(outcome.data);
        match wrapper_key {
            Some(key) => {
                let mut wrapped = Map::new();
                wrapped.insert(key, inner);
                Value::Object(wrapped)
            }
            None => inner,
        }
    } else {
        Value::Object(Map::new())
    };

    ValidationReport {
        valid: outcome.valid,
        data,
        errors: outcome.errors,
        warnings: outcome.warnings,
    }
}

/// Detect the wrapper pattern and return (properties, required, wrapper key).
fn normalize_schema(schema: &Value) -> (Option<Map<String, Value>>, Vec<String>, Option<String>) {
    let required: Vec<String> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();

    let properties = match schema.get("properties").and_then(Value::as_object) {
        Some(props) => props,
        None => return (None, required, None),
    };

    if properties.len() == 1 {
        let (wrapper_key, wrapper_value) = properties
            .iter()
            .next()
            .map(|(k, v)| (k.clone(), v))
            .unwrap_or_else(|| unreachable!());
        if let Some(inner) = wrapper_value.as_object() {
            let has_type = inner.get("type").map(|t| !t.is_null()).unwrap_or(false);
            let has_typed_child = inner
                .values()
                .any(|v| v.as_object().map(|o| o.contains_key("type")).unwrap_or(false));
            if !has_type && has_typed_child {
                tracing::debug!(wrapper = %wrapper_key, "Detected wrapper schema");
                return (Some(inner.clone()), required, Some(wrapper_key));
            }
        }
    }

    (Some(properties.clone()), required, None)
}

fn join_path(path: &str, field: &str) -> String {
    if path == "root" {
        field.to_string()
    } else {
        format!("{}.{}", path, field)
    }
}

fn validate_object(
    data: &Map<String, Value>,
    properties: &Map<String, Value>,
    required: &[String],
    path: &str,
) -> ObjectOutcome {
    let mut outcome = ObjectOutcome {
        valid: true,
        data: Map::new(),
        errors: Vec::new(),
        warnings: Vec::new(),
    };

    for field in required {
        if !data.contains_key(field) {
            outcome
                .errors
                .push(format!("Missing required field: {}", join_path(path, field)));
            outcome.valid = false;
        }
    }

    // Present keys, in input-document order.
    for (field_name, field_value) in data {
        let field_path = join_path(path, field_name);
        let field_schema = match properties.get(field_name) {
            Some(schema) => schema,
            None => {
                outcome.warnings.push(format!(
                    "Unknown field '{}' - will be passed through",
                    field_path
                ));
                outcome.data.insert(field_name.clone(), field_value.clone());
                continue;
            }
        };

        let field_outcome = validate_field(field_name, field_value, field_schema, &field_path);
        if field_outcome.valid {
            outcome.data.insert(field_name.clone(), field_outcome.value);
            outcome.warnings.extend(field_outcome.warnings);
        } else {
            outcome.errors.extend(field_outcome.errors);
            outcome.valid = false;
        }
    }

    // Defaults for absent optional fields, in declared-schema order.
    for (field_name, field_schema) in properties {
        if outcome.data.contains_key(field_name) {
            continue;
        }
        if let Some(default) = field_schema.get("default") {
            outcome.data.insert(field_name.clone(), default.clone());
            outcome.warnings.push(format!(
                "Applied default value for '{}': {}",
                join_path(path, field_name),
                default
            ));
        }
    }

    outcome
}

fn validate_field(
    field_name: &str,
    value: &Value,
    field_schema: &Value,
    field_path: &str,
) -> FieldOutcome {
    let field_type = field_schema.get("type");

    // Union type: try each declared type in order, first full success wins.
    if let Some(Value::Array(types)) = field_type {
        return validate_union(field_name, value, field_schema, types);
    }

    let type_name = field_type.and_then(Value::as_str).unwrap_or("string");

    match (type_name, value) {
        ("object", Value::Object(map)) => {
            let nested_props = field_schema
                .get("properties")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            let nested_required: Vec<String> = field_schema
                .get("required")
                .and_then(Value::as_array)
                .map(|arr| {
                    arr.iter()
                        .filter_map(|v| v.as_str().map(String::from))
                        .collect()
                })
                .unwrap_or_default();
            let nested = validate_object(map, &nested_props, &nested_required, field_path);
            FieldOutcome {
                valid: nested.valid,
                value: Value::Object(nested.data),
                errors: nested.errors,
                warnings: nested.warnings,
            }
        }
        ("array", Value::Array(items)) => {
            let item_schema = field_schema.get("items");
            let items_are_objects = item_schema
                .and_then(|s| s.get("type"))
                .and_then(Value::as_str)
                == Some("object");
            if items_are_objects {
                validate_object_array(value, items, item_schema, field_path)
            } else {
                // Simple arrays pass through unchanged; only the
                // array-level constraints apply.
                let errors = constraint_errors(field_name, value, field_schema);
                FieldOutcome {
                    valid: errors.is_empty(),
                    value: value.clone(),
                    errors,
                    warnings: Vec::new(),
                }
            }
        }
        _ => {
            let converted = if value.is_null() {
                value.clone()
            } else {
                match coerce(value, type_name) {
                    Ok(converted) => converted,
                    Err(msg) => {
                        return FieldOutcome {
                            valid: false,
                            value: value.clone(),
                            errors: vec![format!("Field '{}': {}", field_path, msg)],
                            warnings: Vec::new(),
                        };
                    }
                }
            };
            let errors = constraint_errors(field_name, &converted, field_schema);
            FieldOutcome {
                valid: errors.is_empty(),
                value: converted,
                errors,
                warnings: Vec::new(),
            }
        }
    }
}

fn validate_object_array(
    array_value: &Value,
    items: &[Value],
    item_schema: Option<&Value>,
    field_path: &str,
) -> FieldOutcome {
    let props = item_schema
        .and_then(|s| s.get("properties"))
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let required: Vec<String> = item_schema
        .and_then(|s| s.get("required"))
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();

    let mut outcome = FieldOutcome {
        valid: true,
        value: array_value.clone(),
        errors: Vec::new(),
        warnings: Vec::new(),
    };

    let mut validated_items = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let item_path = format!("{}[{}]", field_path, index);
        match item.as_object() {
            Some(map) => {
                let nested = validate_object(map, &props, &required, &item_path);
                if nested.valid {
                    validated_items.push(Value::Object(nested.data));
                    outcome.warnings.extend(nested.warnings);
                } else {
                    outcome.errors.extend(nested.errors);
                    outcome.valid = false;
                }
            }
            None => {
                outcome
                    .errors
                    .push(format!("Field '{}': expected an object", item_path));
                outcome.valid = false;
            }
        }
    }

    if outcome.valid {
        outcome.value = Value::Array(validated_items);
    }
    outcome
}

fn validate_union(
    field_name: &str,
    value: &Value,
    field_schema: &Value,
    types: &[Value],
) -> FieldOutcome {
    let mut branch_errors: Vec<String> = Vec::new();

    for candidate in types {
        let type_name = match candidate.as_str() {
            Some(name) => name,
            None => continue,
        };

        let converted = if value.is_null() {
            Ok(value.clone())
        } else {
            coerce(value, type_name)
        };

        match converted {
            Ok(converted) => {
                let errors = constraint_errors(field_name, &converted, field_schema);
                if errors.is_empty() {
                    return FieldOutcome {
                        valid: true,
                        value: converted,
                        errors: Vec::new(),
                        warnings: vec![format!(
                            "Field '{}' validated as {}",
                            field_name, type_name
                        )],
                    };
                }
                branch_errors.push(format!(
                    "Type {} failed constraints: {}",
                    type_name,
                    errors.join("; ")
                ));
            }
            Err(msg) => {
                branch_errors.push(format!("Cannot convert to {}: {}", type_name, msg));
            }
        }
    }

    let type_list: Vec<&str> = types.iter().filter_map(Value::as_str).collect();
    FieldOutcome {
        valid: false,
        value: value.clone(),
        errors: vec![format!(
            "Field '{}': value '{}' doesn't match any allowed types [{}]. Errors: {}",
            field_name,
            display_value(value),
            type_list.join(", "),
            branch_errors.join("; ")
        )],
        warnings: Vec::new(),
    }
}

// ─── Coercion rules ──────────────────────────────────────────────────────────

/// Total coercion function; errors only when conversion is infeasible.
fn coerce(value: &Value, target_type: &str) -> Result<Value, String> {
    match target_type {
        "integer" => coerce_integer(value),
        "number" => coerce_number(value),
        "boolean" => coerce_boolean(value),
        "array" => coerce_array(value),
        "object" => coerce_object(value),
        // "string" and unrecognized declarations both take the textual form.
        _ => Ok(coerce_string(value)),
    }
}

fn coerce_string(value: &Value) -> Value {
    match value {
        Value::String(_) => value.clone(),
        other => Value::String(display_value(other)),
    }
}

fn coerce_integer(value: &Value) -> Result<Value, String> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::from(i))
            } else if let Some(f) = n.as_f64() {
                // Truncate toward zero.
                Ok(Value::from(f.trunc() as i64))
            } else {
                Err(format!("Cannot convert '{}' to integer", display_value(value)))
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                trimmed
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| format!("Cannot convert '{}' to integer", s))
            } else {
                Err(format!("Cannot convert '{}' to integer", s))
            }
        }
        _ => Err(format!("Cannot convert '{}' to integer", display_value(value))),
    }
}

fn coerce_number(value: &Value) -> Result<Value, String> {
    match value {
        Value::Number(_) => Ok(value.clone()),
        Value::String(s) => {
            let trimmed = s.trim();
            if !trimmed.contains('.') && !trimmed.to_lowercase().contains('e') {
                trimmed
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| format!("Cannot convert '{}' to number", s))
            } else {
                trimmed
                    .parse::<f64>()
                    .map(Value::from)
                    .map_err(|_| format!("Cannot convert '{}' to number", s))
            }
        }
        _ => Err(format!("Cannot convert '{}' to number", display_value(value))),
    }
}

fn coerce_boolean(value: &Value) -> Result<Value, String> {
    match value {
        Value::Bool(_) => Ok(value.clone()),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
            "false" | "0" | "no" | "off" => Ok(Value::Bool(false)),
            _ => Err(format!("Cannot convert '{}' to boolean", s)),
        },
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Bool(i != 0))
            } else {
                Err(format!("Cannot convert '{}' to boolean", display_value(value)))
            }
        }
        _ => Err(format!("Cannot convert '{}' to boolean", display_value(value))),
    }
}

fn coerce_array(value: &Value) -> Result<Value, String> {
    match value {
        Value::Array(_) => Ok(value.clone()),
        Value::String(s) => {
            if let Ok(parsed) = serde_json::from_str::<Value>(s) {
                if parsed.is_array() {
                    return Ok(parsed);
                }
            }
            // Comma-split fallback.
            let items: Vec<Value> = s
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| Value::String(part.to_string()))
                .collect();
            Ok(Value::Array(items))
        }
        _ => Err(format!("Cannot convert '{}' to array", display_value(value))),
    }
}

fn coerce_object(value: &Value) -> Result<Value, String> {
    match value {
        Value::Object(_) => Ok(value.clone()),
        Value::String(s) => {
            if let Ok(parsed) = serde_json::from_str::<Value>(s) {
                if parsed.is_object() {
                    return Ok(parsed);
                }
            }
            Err(format!("Cannot convert '{}' to object", s))
        }
        _ => Err(format!("Cannot convert '{}' to object", display_value(value))),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ─── Constraint checks ───────────────────────────────────────────────────────

/// Constraint checks: enum, pattern, numeric bounds, string length, array
/// size. Returns the violations; an empty list means the value passed.
fn constraint_errors(field_name: &str, value: &Value, field_schema: &Value) -> Vec<String> {
    let mut errors = Vec::new();
    if value.is_null() {
        return errors;
    }

    if let Some(allowed) = field_schema.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            errors.push(format!(
                "Field '{}' must be one of: {}, got: {}",
                field_name,
                Value::Array(allowed.clone()),
                display_value(value)
            ));
        }
    }

    if let (Some(pattern), Value::String(s)) =
        (field_schema.get("pattern").and_then(Value::as_str), value)
    {
        // Anchored at start, matching `re.match` semantics.
        match regex::Regex::new(&format!(r"\A(?:{})", pattern)) {
            Ok(re) => {
                if !re.is_match(s) {
                    errors.push(format!(
                        "Field '{}' must match pattern: {}",
                        field_name, pattern
                    ));
                }
            }
            Err(_) => {
                errors.push(format!(
                    "Field '{}': invalid pattern '{}'",
                    field_name, pattern
                ));
            }
        }
    }

    if let Some(n) = value.as_f64() {
        if let Some(minimum) = field_schema.get("minimum").and_then(Value::as_f64) {
            if n < minimum {
                errors.push(format!(
                    "Field '{}' must be >= {}",
                    field_name, field_schema["minimum"]
                ));
            }
        }
        if let Some(maximum) = field_schema.get("maximum").and_then(Value::as_f64) {
            if n > maximum {
                errors.push(format!(
                    "Field '{}' must be <= {}",
                    field_name, field_schema["maximum"]
                ));
            }
        }
    }

    if let Value::String(s) = value {
        let len = s.chars().count() as u64;
        if let Some(min_len) = field_schema.get("minLength").and_then(Value::as_u64) {
            if len < min_len {
                errors.push(format!(
                    "Field '{}' must be at least {} characters",
                    field_name, min_len
                ));
            }
        }
        if let Some(max_len) = field_schema.get("maxLength").and_then(Value::as_u64) {
            if len > max_len {
                errors.push(format!(
                    "Field '{}' must be at most {} characters",
                    field_name, max_len
                ));
            }
        }
    }

    if let Value::Array(items) = value {
        let len = items.len() as u64;
        if let Some(min_items) = field_schema.get("minItems").and_then(Value::as_u64) {
            if len < min_items {
                errors.push(format!(
                    "Field '{}' must have at least {} items",
                    field_name, min_items
                ));
            }
        }
        if let Some(max_items) = field_schema.get("maxItems").and_then(Value::as_u64) {
            if len > max_items {
                errors.push(format!(
                    "Field '{}' must have at most {} items",
                    field_name, max_items
                ));
            }
        }
    }

    errors
}
