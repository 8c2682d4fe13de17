// Copyright (c) rangedb.io 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! View filter predicates.
//!
//! A [`FilterSpec`] is the declarative form owned by the catalog: a
//! conjunction of per-column restrictions, with columns referenced by
//! name. Compilation resolves names against the bound base schema and
//! splits the restrictions by column kind, so the evaluator can use the
//! partition-key ranges as a cheap pre-filter, the clustering ranges as a
//! prefix short-circuit, and the regular-column ranges as the row
//! predicate proper.

use std::{collections::BTreeSet, ops::Bound};

use rangedb_core::{
	ClockTime, ClusteringPrefix, ClusteringRow, ColumnId, ColumnKind, Error, Result, Schema, Tombstone, Value,
	ValueRange, diagnostic::view::view_filter_error,
};
use serde::{Deserialize, Serialize};

/// One restriction on one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Restriction {
	Eq(Value),
	Lt(Value),
	Le(Value),
	Gt(Value),
	Ge(Value),
}

impl Restriction {
	fn to_range(&self) -> ValueRange {
		match self {
			Restriction::Eq(value) => ValueRange::point(value.clone()),
			Restriction::Lt(value) => ValueRange {
				lower: Bound::Unbounded,
				upper: Bound::Excluded(value.clone()),
			},
			Restriction::Le(value) => ValueRange {
				lower: Bound::Unbounded,
				upper: Bound::Included(value.clone()),
			},
			Restriction::Gt(value) => ValueRange {
				lower: Bound::Excluded(value.clone()),
				upper: Bound::Unbounded,
			},
			Restriction::Ge(value) => ValueRange {
				lower: Bound::Included(value.clone()),
				upper: Bound::Unbounded,
			},
		}
	}
}

/// Declarative filter: a conjunction of column restrictions. The exchange
/// form registered with a view; opaque to everything but the compiler
/// below.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterSpec {
	pub restrictions: Vec<(String, Restriction)>,
}

impl FilterSpec {
	pub fn unfiltered() -> Self {
		Self::default()
	}

	pub fn with(mut self, column: impl Into<String>, restriction: Restriction) -> Self {
		self.restrictions.push((column.into(), restriction));
		self
	}
}

/// The evaluable predicate compiled from a [`FilterSpec`] against one base
/// schema version. Rebuilt whenever the owning view definition is rebound.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFilter {
	/// Per partition-key position; unrestricted positions carry an
	/// unbounded range.
	key_ranges: Vec<ValueRange>,
	clustering_prefix: ClusteringPrefix,
	regular: Vec<(ColumnId, ValueRange)>,
	referenced: BTreeSet<ColumnId>,
	/// Set when restriction intersection is provably empty; the filter
	/// then matches nothing.
	never_matches: bool,
}

impl CompiledFilter {
	pub fn compile(spec: &FilterSpec, base: &Schema) -> Result<Self> {
		let pk_count = base.partition_key_columns().len();
		let ck_count = base.clustering_columns().len();

		let mut key_ranges = vec![ValueRange::unrestricted(); pk_count];
		let mut clustering_ranges = vec![ValueRange::unrestricted(); ck_count];
		let mut regular: Vec<(ColumnId, ValueRange)> = Vec::new();
		let mut referenced = BTreeSet::new();
		let mut never_matches = false;

		for (name, restriction) in &spec.restrictions {
			let Some(column) = base.column_by_name(name) else {
				return Err(Error(view_filter_error(format!(
					"filter references unknown base column '{}'",
					name
				))));
			};
			referenced.insert(column.id);
			let range = restriction.to_range();

			match column.kind {
				ColumnKind::PartitionKey(position) => {
					if !key_ranges[position].intersect(&range) {
						never_matches = true;
					}
				}
				ColumnKind::Clustering(position) => {
					if !clustering_ranges[position].intersect(&range) {
						never_matches = true;
					}
				}
				ColumnKind::Regular => {
					match regular.iter_mut().find(|(id, _)| *id == column.id) {
						Some((_, existing)) => {
							if !existing.intersect(&range) {
								never_matches = true;
							}
						}
						None => regular.push((column.id, range)),
					}
				}
			}
		}

		// Drop unrestricted trailing clustering positions so the prefix
		// matcher stops early.
		while clustering_ranges.last().is_some_and(|r| r.is_unrestricted()) {
			clustering_ranges.pop();
		}

		Ok(Self {
			key_ranges,
			clustering_prefix: ClusteringPrefix {
				ranges: clustering_ranges,
			},
			regular,
			referenced,
			never_matches,
		})
	}

	/// The partition-key ranges implied by the filter; the cheap
	/// pre-filter consulted before full predicate evaluation.
	pub fn key_ranges(&self) -> &[ValueRange] {
		&self.key_ranges
	}

	pub fn clustering_prefix(&self) -> &ClusteringPrefix {
		&self.clustering_prefix
	}

	/// Base columns the filter depends on.
	pub fn referenced(&self) -> &BTreeSet<ColumnId> {
		&self.referenced
	}

	pub fn never_matches(&self) -> bool {
		self.never_matches
	}

	/// Evaluates the regular-column restrictions against the live state
	/// of a row. Clustering and partition-key restrictions are checked by
	/// the caller against the row's keys.
	pub fn matches_row(&self, row: &ClusteringRow, outer: Option<Tombstone>, now: ClockTime) -> bool {
		if self.never_matches {
			return false;
		}
		self.regular.iter().all(|(column, range)| match row.live_cell(*column, outer, now) {
			Some(cell) => range.contains(&cell.value),
			None => false,
		})
	}
}

#[cfg(test)]
mod tests {
	use rangedb_core::{Cell, ClusteringKey, ColumnDef, SchemaVersion, TableId, WriteTimestamp};

	use super::*;

	fn base_schema() -> Schema {
		Schema::new(TableId(1), SchemaVersion(1), vec![
			ColumnDef {
				id: ColumnId(0),
				name: "user".to_string(),
				kind: ColumnKind::PartitionKey(0),
			},
			ColumnDef {
				id: ColumnId(1),
				name: "ts".to_string(),
				kind: ColumnKind::Clustering(0),
			},
			ColumnDef {
				id: ColumnId(2),
				name: "status".to_string(),
				kind: ColumnKind::Regular,
			},
		])
	}

	#[test]
	fn test_compile_splits_by_column_kind() {
		let spec = FilterSpec::unfiltered()
			.with("user", Restriction::Eq(Value::Text("alice".into())))
			.with("ts", Restriction::Ge(Value::Int(10)))
			.with("status", Restriction::Eq(Value::Text("active".into())));
		let filter = CompiledFilter::compile(&spec, &base_schema()).unwrap();

		assert!(filter.key_ranges()[0].contains(&Value::Text("alice".into())));
		assert!(!filter.key_ranges()[0].contains(&Value::Text("bob".into())));
		assert!(filter.clustering_prefix().matches(&ClusteringKey(vec![Value::Int(10)])));
		assert!(!filter.clustering_prefix().matches(&ClusteringKey(vec![Value::Int(9)])));
		assert_eq!(filter.referenced().len(), 3);
	}

	#[test]
	fn test_compile_rejects_unknown_column() {
		let spec = FilterSpec::unfiltered().with("nope", Restriction::Eq(Value::Int(1)));
		let error = CompiledFilter::compile(&spec, &base_schema()).unwrap_err();
		assert_eq!(error.code(), "VIEW_003");
	}

	#[test]
	fn test_contradictory_restrictions_never_match() {
		let spec = FilterSpec::unfiltered()
			.with("status", Restriction::Eq(Value::Text("a".into())))
			.with("status", Restriction::Eq(Value::Text("b".into())));
		let filter = CompiledFilter::compile(&spec, &base_schema()).unwrap();
		assert!(filter.never_matches());
	}

	#[test]
	fn test_matches_row_requires_live_cell() {
		let spec = FilterSpec::unfiltered().with("status", Restriction::Eq(Value::Text("active".into())));
		let filter = CompiledFilter::compile(&spec, &base_schema()).unwrap();
		let now = ClockTime(0);

		let mut row = ClusteringRow::new(ClusteringKey(vec![Value::Int(1)]));
		assert!(!filter.matches_row(&row, None, now));

		row.set_cell(ColumnId(2), Cell::new(Value::Text("active".into()), WriteTimestamp(5)));
		assert!(filter.matches_row(&row, None, now));

		// A tombstone above the cell's timestamp kills the match
		let shadow = Some(Tombstone::new(WriteTimestamp(6)));
		assert!(!filter.matches_row(&row, shadow, now));
	}
}
