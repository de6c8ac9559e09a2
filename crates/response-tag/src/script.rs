//! User-expression evaluation over the extracted value.
//!
//! The expression runs in a restricted Rhai engine with the extracted value
//! bound as `output`. Any compile or runtime failure is caught and wrapped;
//! the engine offers no host access beyond a `parse_json` helper for
//! destructuring JSON bodies.

use crate::error::{Result, TagError};
use rhai::{Dynamic, Engine, EvalAltResult, Map, Scope};
use serde_json::Value;

/// Implicit variable name the extracted value is bound to
pub const OUTPUT_BINDING: &str = "output";

/// Evaluate `expression` with the extracted value in scope. An empty or
/// whitespace-only expression returns the value unchanged.
pub fn evaluate_expression(expression: &str, output: &str) -> Result<String> {
    if expression.trim().is_empty() {
        return Ok(output.to_string());
    }

    let engine = create_engine();
    let mut scope = Scope::new();
    scope.push(OUTPUT_BINDING, output.to_string());

    let result: Dynamic = engine
        .eval_with_scope(&mut scope, expression)
        .map_err(|e| TagError::Eval(e.to_string()))?;

    Ok(render_result(result))
}

fn create_engine() -> Engine {
    let mut engine = Engine::new();

    engine.register_fn(
        "parse_json",
        |text: &str| -> std::result::Result<Dynamic, Box<EvalAltResult>> {
            let value: Value = serde_json::from_str(text)
                .map_err(|e| -> Box<EvalAltResult> { format!("invalid JSON: {e}").into() })?;
            Ok(json_to_dynamic(value))
        },
    );

    engine
}

/// Render the expression result as the tag's final string value. Strings
/// pass through unquoted; maps and arrays render as JSON.
fn render_result(result: Dynamic) -> String {
    if result.is_unit() {
        return String::new();
    }
    if let Some(s) = result.clone().try_cast::<String>() {
        return s;
    }
    if result.is_map() || result.is_array() {
        return serde_json::to_string(&dynamic_to_json(result)).unwrap_or_default();
    }
    result.to_string()
}

fn json_to_dynamic(value: Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from(b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Dynamic::from(i)
            } else if let Some(f) = n.as_f64() {
                Dynamic::from(f)
            } else {
                Dynamic::UNIT
            }
        }
        Value::String(s) => Dynamic::from(s),
        Value::Array(arr) => {
            let vec: Vec<Dynamic> = arr.into_iter().map(json_to_dynamic).collect();
            Dynamic::from(vec)
        }
        Value::Object(obj) => {
            let mut map = Map::new();
            for (k, v) in obj {
                map.insert(k.into(), json_to_dynamic(v));
            }
            Dynamic::from(map)
        }
    }
}

fn dynamic_to_json(value: Dynamic) -> Value {
    if value.is_unit() {
        Value::Null
    } else if let Ok(b) = value.as_bool() {
        Value::Bool(b)
    } else if let Ok(i) = value.as_int() {
        Value::Number(i.into())
    } else if let Ok(f) = value.as_float() {
        Value::Number(serde_json::Number::from_f64(f).unwrap_or(0.into()))
    } else if let Some(s) = value.clone().try_cast::<String>() {
        Value::String(s)
    } else if let Some(arr) = value.clone().try_cast::<Vec<Dynamic>>() {
        Value::Array(arr.into_iter().map(dynamic_to_json).collect())
    } else if let Some(map) = value.clone().try_cast::<Map>() {
        let mut obj = serde_json::Map::new();
        for (k, v) in map {
            obj.insert(k.to_string(), dynamic_to_json(v));
        }
        Value::Object(obj)
    } else {
        Value::String(value.to_string())
    }
}
