// Copyright (c) rangedb.io 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::sync::Arc;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnId(pub u32);

/// Monotonically assigned per table; equality is the staleness check for
/// view definitions bound against an older base schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaVersion(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
	/// Part of the partition key, at the given position.
	PartitionKey(usize),
	/// Part of the clustering key, at the given position.
	Clustering(usize),
	Regular,
}

impl ColumnKind {
	pub fn is_primary_key(&self) -> bool {
		matches!(self, ColumnKind::PartitionKey(_) | ColumnKind::Clustering(_))
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
	pub id: ColumnId,
	pub name: String,
	pub kind: ColumnKind,
}

/// Immutable table layout. Shared via [`SchemaRef`] and replaced wholesale
/// on schema change; readers holding an older snapshot stay internally
/// consistent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
	pub table: TableId,
	pub version: SchemaVersion,
	columns: Vec<ColumnDef>,
}

pub type SchemaRef = Arc<Schema>;

impl Schema {
	pub fn new(table: TableId, version: SchemaVersion, columns: Vec<ColumnDef>) -> Self {
		Self {
			table,
			version,
			columns,
		}
	}

	pub fn columns(&self) -> &[ColumnDef] {
		&self.columns
	}

	pub fn column(&self, id: ColumnId) -> Option<&ColumnDef> {
		self.columns.iter().find(|c| c.id == id)
	}

	pub fn column_by_name(&self, name: &str) -> Option<&ColumnDef> {
		self.columns.iter().find(|c| c.name == name)
	}

	/// Partition-key columns in key position order.
	pub fn partition_key_columns(&self) -> Vec<&ColumnDef> {
		let mut out: Vec<_> = self
			.columns
			.iter()
			.filter_map(|c| match c.kind {
				ColumnKind::PartitionKey(position) => Some((position, c)),
				_ => None,
			})
			.collect();
		out.sort_by_key(|(position, _)| *position);
		out.into_iter().map(|(_, c)| c).collect()
	}

	/// Clustering columns in key position order.
	pub fn clustering_columns(&self) -> Vec<&ColumnDef> {
		let mut out: Vec<_> = self
			.columns
			.iter()
			.filter_map(|c| match c.kind {
				ColumnKind::Clustering(position) => Some((position, c)),
				_ => None,
			})
			.collect();
		out.sort_by_key(|(position, _)| *position);
		out.into_iter().map(|(_, c)| c).collect()
	}

	pub fn regular_columns(&self) -> impl Iterator<Item = &ColumnDef> {
		self.columns.iter().filter(|c| c.kind == ColumnKind::Regular)
	}
}
