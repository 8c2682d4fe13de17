// Copyright (c) rangedb.io 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use serde::{Deserialize, Serialize};

use crate::{
	key::{ClusteringKey, PartitionKey, Token},
	liveness::{Cell, Tombstone},
	schema::{ColumnId, TableId},
};

/// One row-level operation within a view mutation. Every carried cell
/// keeps the write timestamp of the base cell it was derived from, so
/// last-write-wins ordering is preserved once applied at the view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RowOp {
	Insert {
		key: ClusteringKey,
		cells: Vec<(ColumnId, Cell)>,
	},
	Update {
		key: ClusteringKey,
		cells: Vec<(ColumnId, Cell)>,
	},
	Delete {
		key: ClusteringKey,
		tombstone: Tombstone,
	},
}

impl RowOp {
	pub fn key(&self) -> &ClusteringKey {
		match self {
			RowOp::Insert {
				key,
				..
			} => key,
			RowOp::Update {
				key,
				..
			} => key,
			RowOp::Delete {
				key,
				..
			} => key,
		}
	}

	pub fn is_delete(&self) -> bool {
		matches!(self, RowOp::Delete { .. })
	}
}

/// A mutation against one partition of one view, produced by a diff and
/// consumed by the dispatcher. Transient; never persisted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewMutation {
	pub view: TableId,
	pub partition_key: PartitionKey,
	pub ops: Vec<RowOp>,
}

impl ViewMutation {
	pub fn new(view: TableId, partition_key: PartitionKey) -> Self {
		Self {
			view,
			partition_key,
			ops: Vec::new(),
		}
	}

	/// The token of the view's own derived partition key, which generally
	/// differs from the base partition's token.
	pub fn token(&self) -> Token {
		self.partition_key.token()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{Value, WriteTimestamp};

	#[test]
	fn test_mutation_wire_form() {
		let mut mutation = ViewMutation::new(TableId(7), PartitionKey(vec![Value::Text("alice".into())]));
		mutation.ops.push(RowOp::Delete {
			key: ClusteringKey(vec![Value::Int(1)]),
			tombstone: Tombstone::new(WriteTimestamp(10)),
		});

		let json = serde_json::to_string(&mutation).unwrap();
		assert!(json.contains("Delete"));

		let decoded: ViewMutation = serde_json::from_str(&json).unwrap();
		assert_eq!(decoded, mutation);
		assert_eq!(decoded.token(), mutation.token());
	}

	#[test]
	fn test_token_derives_from_view_partition_key() {
		let a = ViewMutation::new(TableId(7), PartitionKey(vec![Value::Text("a".into())]));
		let b = ViewMutation::new(TableId(7), PartitionKey(vec![Value::Text("b".into())]));
		assert_ne!(a.token(), b.token());
	}
}
