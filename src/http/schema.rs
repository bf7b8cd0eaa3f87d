//! Request schema validation.
//!
//! A route's schema is an object with optional `body`, `querystring` (or
//! `query`) and `params` JSON Schemas. Query and path values arrive as
//! strings; before validation they are coerced to the scalar type a schema
//! property declares, so `{"type": "integer"}` accepts `?page=2`.

use jsonschema::Validator;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::http::error::DispatchError;

/// Error compiling a route schema.
#[derive(Debug, Error)]
#[error("Invalid {part} schema: {message}")]
pub struct SchemaError {
    pub part: &'static str,
    pub message: String,
}

struct Part {
    name: &'static str,
    schema: Value,
    validator: Validator,
}

impl Part {
    fn compile(name: &'static str, schema: &Value) -> Result<Self, SchemaError> {
        let validator = jsonschema::validator_for(schema).map_err(|e| SchemaError {
            part: name,
            message: e.to_string(),
        })?;
        Ok(Self {
            name,
            schema: schema.clone(),
            validator,
        })
    }

    fn check(&self, instance: &Value, errors: &mut Vec<String>) {
        errors.extend(
            self.validator
                .iter_errors(instance)
                .map(|e| format!("{} {}", self.name, e)),
        );
    }
}

/// Compiled validators for one route.
pub struct RequestSchema {
    body: Option<Part>,
    query: Option<Part>,
    params: Option<Part>,
}

impl RequestSchema {
    /// Compile a route schema. Returns `None` when nothing is validated.
    pub fn compile(schema: &Value) -> Result<Option<Self>, SchemaError> {
        let Value::Object(map) = schema else {
            return Err(SchemaError {
                part: "route",
                message: format!("expected an object, got {schema}"),
            });
        };

        let part = |name: &'static str, keys: &[&str]| -> Result<Option<Part>, SchemaError> {
            keys.iter()
                .find_map(|key| map.get(*key))
                .map(|schema| Part::compile(name, schema))
                .transpose()
        };

        let compiled = Self {
            body: part("body", &["body"])?,
            query: part("querystring", &["querystring", "query"])?,
            params: part("params", &["params"])?,
        };

        if compiled.body.is_none() && compiled.query.is_none() && compiled.params.is_none() {
            return Ok(None);
        }
        Ok(Some(compiled))
    }

    /// Coerce params and query in place, then validate all parts.
    pub fn apply(
        &self,
        params: &mut Map<String, Value>,
        query: &mut Map<String, Value>,
        body: &Value,
    ) -> Result<(), DispatchError> {
        let mut errors = Vec::new();

        if let Some(part) = &self.params {
            coerce(&part.schema, params);
            part.check(&Value::Object(params.clone()), &mut errors);
        }
        if let Some(part) = &self.query {
            coerce(&part.schema, query);
            part.check(&Value::Object(query.clone()), &mut errors);
        }
        if let Some(part) = &self.body {
            part.check(body, &mut errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DispatchError::BadRequest(errors.join(", ")))
        }
    }
}

impl std::fmt::Debug for RequestSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSchema")
            .field("body", &self.body.as_ref().map(|p| &p.schema))
            .field("query", &self.query.as_ref().map(|p| &p.schema))
            .field("params", &self.params.as_ref().map(|p| &p.schema))
            .finish()
    }
}

fn coerce(schema: &Value, values: &mut Map<String, Value>) {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return;
    };
    for (key, value) in values.iter_mut() {
        let Some(kind) = properties.get(key).and_then(|p| p.get("type")).and_then(Value::as_str) else {
            continue;
        };
        if let Some(coerced) = value.as_str().and_then(|text| coerce_scalar(kind, text)) {
            *value = coerced;
        }
    }
}

fn coerce_scalar(kind: &str, text: &str) -> Option<Value> {
    match kind {
        "integer" => text.parse::<i64>().ok().map(Value::from),
        "number" => text
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        "boolean" => match text {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}
