//! Pin declarations and the closed pin-type set.

use serde::{Deserialize, Serialize};

/// Name of the implicit sequence input every component accepts.
pub const SEQ_IN: &str = "@seqin";
/// Name of the implicit sequence output every component exposes.
pub const SEQ_OUT: &str = "@seqout";

/// Types a data pin can carry.
///
/// Compatibility is a graph-validation concern only; the scheduler never
/// branches on pin types at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinType {
  Boolean,
  Int8,
  Int16,
  Int32,
  Int64,
  Float,
  Double,
  String,
  Array,
  Object,
  Stream,
  Date,
  /// Dynamically typed; compatible with every pin. Used by generic
  /// components whose value shape depends on an expression.
  Any,
}

impl PinType {
  fn integer_rank(self) -> Option<u8> {
    match self {
      PinType::Int8 => Some(0),
      PinType::Int16 => Some(1),
      PinType::Int32 => Some(2),
      PinType::Int64 => Some(3),
      _ => None,
    }
  }

  /// Whether a value of `self` may flow into a pin of type `target`.
  ///
  /// Exact match, integer widening, and Float → Double are accepted.
  pub fn flows_into(self, target: PinType) -> bool {
    if self == target || self == PinType::Any || target == PinType::Any {
      return true;
    }
    if let (Some(from), Some(to)) = (self.integer_rank(), target.integer_rank()) {
      return from <= to;
    }
    matches!((self, target), (PinType::Float, PinType::Double))
  }
}

/// One declared pin of a component descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinDef {
  pub name: String,
  pub ty: PinType,
  /// Optional data inputs do not gate readiness.
  #[serde(default)]
  pub optional: bool,
}

impl PinDef {
  pub fn new(name: impl Into<String>, ty: PinType) -> Self {
    Self {
      name: name.into(),
      ty,
      optional: false,
    }
  }

  pub fn optional(name: impl Into<String>, ty: PinType) -> Self {
    Self {
      name: name.into(),
      ty,
      optional: true,
    }
  }
}
