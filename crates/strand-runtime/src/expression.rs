//! Expression evaluation seam.
//!
//! The runtime evaluates expression-valued properties, watch expressions,
//! and assignment values against a scope assembled from the flow-state
//! chain. The default implementation renders minijinja expressions; hosts
//! can swap in their own evaluator through the trait.

use minijinja::Environment;

use strand_flow::{PinType, Value};

/// Evaluates one expression string against a JSON scope.
pub trait ExpressionEvaluator: Send {
  fn eval(&self, scope: &serde_json::Value, expression: &str) -> Result<Value, String>;
}

/// minijinja-backed evaluator.
pub struct JinjaEvaluator {
  env: Environment<'static>,
}

impl JinjaEvaluator {
  pub fn new() -> Self {
    Self {
      env: Environment::new(),
    }
  }
}

impl Default for JinjaEvaluator {
  fn default() -> Self {
    Self::new()
  }
}

impl ExpressionEvaluator for JinjaEvaluator {
  fn eval(&self, scope: &serde_json::Value, expression: &str) -> Result<Value, String> {
    let compiled = self
      .env
      .compile_expression(expression)
      .map_err(|e| e.to_string())?;
    let result = compiled.eval(scope).map_err(|e| e.to_string())?;
    let json = serde_json::to_value(&result).map_err(|e| e.to_string())?;
    Ok(Value::from_json(json))
  }
}

fn int_in_range(n: i64, ty: PinType) -> bool {
  match ty {
    PinType::Int8 => i8::try_from(n).is_ok(),
    PinType::Int16 => i16::try_from(n).is_ok(),
    PinType::Int32 => i32::try_from(n).is_ok(),
    _ => true,
  }
}

/// Coerce an evaluated value to a pin type.
///
/// Used by `eval_property_with_type`; graph wiring never coerces (wires are
/// validated compatible at load time).
pub fn coerce_value(value: Value, ty: PinType) -> Result<Value, String> {
  match (ty, value) {
    (PinType::Any, value) => Ok(value),
    (PinType::Boolean, Value::Bool(b)) => Ok(Value::Bool(b)),
    (PinType::Int8 | PinType::Int16 | PinType::Int32 | PinType::Int64, Value::Int(n)) => {
      if int_in_range(n, ty) {
        Ok(Value::Int(n))
      } else {
        Err(format!("{} out of range for {:?}", n, ty))
      }
    }
    (PinType::Float | PinType::Double, Value::Float(f)) => Ok(Value::Float(f)),
    (PinType::Float | PinType::Double, Value::Int(n)) => Ok(Value::Float(n as f64)),
    (PinType::String, Value::String(s)) => Ok(Value::String(s)),
    (PinType::String, value @ (Value::Bool(_) | Value::Int(_) | Value::Float(_))) => {
      Ok(Value::String(value.to_string()))
    }
    (PinType::Array, Value::Array(items)) => Ok(Value::Array(items)),
    (PinType::Object, Value::Object(fields)) => Ok(Value::Object(fields)),
    (PinType::Stream, Value::Stream(id)) => Ok(Value::Stream(id)),
    (PinType::Stream, Value::Int(n)) if n >= 0 => Ok(Value::Stream(n as u64)),
    (PinType::Date, Value::Date(ms)) => Ok(Value::Date(ms)),
    (PinType::Date, Value::Int(ms)) => Ok(Value::Date(ms)),
    (ty, value) => Err(format!(
      "expected {:?}, found {}",
      ty,
      value.type_name()
    )),
  }
}
