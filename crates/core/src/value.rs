// Copyright (c) rangedb.io 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::{
	cmp::Ordering,
	fmt::{Display, Formatter},
};

use serde::{Deserialize, Serialize};

/// A cell value. Keys and range restrictions rely on the total order
/// defined below: values order within their kind, and across kinds by the
/// kind tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
	Bool(bool),
	Int(i64),
	Text(String),
	Bytes(Vec<u8>),
}

impl Value {
	fn kind_rank(&self) -> u8 {
		match self {
			Value::Bool(_) => 0,
			Value::Int(_) => 1,
			Value::Text(_) => 2,
			Value::Bytes(_) => 3,
		}
	}
}

impl PartialOrd for Value {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for Value {
	fn cmp(&self, other: &Self) -> Ordering {
		match (self, other) {
			(Value::Bool(l), Value::Bool(r)) => l.cmp(r),
			(Value::Int(l), Value::Int(r)) => l.cmp(r),
			(Value::Text(l), Value::Text(r)) => l.cmp(r),
			(Value::Bytes(l), Value::Bytes(r)) => l.cmp(r),
			_ => self.kind_rank().cmp(&other.kind_rank()),
		}
	}
}

impl Display for Value {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			Value::Bool(v) => write!(f, "{}", v),
			Value::Int(v) => write!(f, "{}", v),
			Value::Text(v) => write!(f, "{}", v),
			Value::Bytes(v) => write!(f, "0x{}", v.iter().map(|b| format!("{:02x}", b)).collect::<String>()),
		}
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Value::Text(value.to_string())
	}
}

impl From<i64> for Value {
	fn from(value: i64) -> Self {
		Value::Int(value)
	}
}

impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Value::Bool(value)
	}
}
