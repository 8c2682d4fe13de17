// Copyright (c) rangedb.io 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Affected-ness and filter evaluation.
//!
//! Three escalating-precision checks, used to cheaply discard views that a
//! base write cannot affect before paying for full row evaluation. The
//! first two are conservative: `false` is a hard guarantee, `true` only a
//! hint. The third is ground truth.

use rangedb_core::{ClockTime, ClusteringKey, ClusteringRow, PartitionKey, Result, RowDelta, Schema, Tombstone};

use crate::definition::ViewDefinition;

impl ViewDefinition {
	/// Whether the view filter considers the given partition key.
	///
	/// Tests the key against the cached partition-key restriction
	/// ranges. Returning `false` guarantees a write to this partition
	/// cannot affect the view; `true` only means evaluation must
	/// continue. Independent of row content.
	pub fn partition_key_matches(&self, base: &Schema, key: &PartitionKey) -> Result<bool> {
		let artifacts = self.artifacts(base)?;
		if artifacts.filter.never_matches() {
			return Ok(false);
		}
		Ok(artifacts
			.key_ranges
			.iter()
			.enumerate()
			.all(|(position, range)| match key.value(position) {
				Some(value) => range.contains(value),
				None => false,
			}))
	}

	/// Whether the view might be affected by the given update delta.
	///
	/// Returns `false` only when the update provably cannot change view
	/// membership or content. Purely a fast path; skipping it changes
	/// performance, not correctness.
	///
	/// Without a promoted column, view-row existence rides on bare row
	/// liveness, so writing any cell, projected or not, can create
	/// membership; only a promoted column narrows the proof down to the
	/// filter-referenced and projected columns.
	pub fn may_be_affected_by(&self, base: &Schema, _key: &PartitionKey, update: &RowDelta) -> Result<bool> {
		let artifacts = self.artifacts(base)?;
		if update.has_tombstone {
			return Ok(true);
		}
		if artifacts.promoted.is_none() && !update.touched.is_empty() {
			return Ok(true);
		}
		Ok(update.touched.iter().any(|column| artifacts.affected_columns.contains(column)))
	}

	/// Whether a base row matches the view filter, and thus whether the
	/// view should have a corresponding entry.
	///
	/// `row` must be the current full state of the base row, not a
	/// delta. No false positives and no false negatives. Does not check
	/// the partition key; callers have already filtered on it via
	/// [`Self::partition_key_matches`]. `outer` is the partition-level
	/// tombstone shadowing the row, if any.
	pub fn matches_view_filter(
		&self,
		base: &Schema,
		_key: &PartitionKey,
		row: &ClusteringRow,
		outer: Option<Tombstone>,
		now: ClockTime,
	) -> Result<bool> {
		let artifacts = self.artifacts(base)?;

		if !self.clustering_prefix_matches(base, &row.key)? {
			return Ok(false);
		}

		// A promoted base column's liveness gates view-row existence
		// independently of the rest of the predicate.
		if let Some(promoted) = artifacts.promoted {
			if row.live_cell(promoted, outer, now).is_none() {
				return Ok(false);
			}
		}

		// A fully deleted row, or one present only as a tombstone
		// marker, never matches.
		if !row.is_live(outer, now) {
			return Ok(false);
		}

		Ok(artifacts.filter.matches_row(row, outer, now))
	}

	/// Whether a clustering key lies inside the filter's restricted
	/// clustering prefix. Consulted before column-level predicates to
	/// short-circuit keys outside the restricted range.
	pub fn clustering_prefix_matches(&self, base: &Schema, key: &ClusteringKey) -> Result<bool> {
		let artifacts = self.artifacts(base)?;
		Ok(artifacts.clustering_prefix.matches(key))
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use rangedb_core::{
		Cell, ClusteringKey, ColumnDef, ColumnId, ColumnKind, SchemaRef, SchemaVersion, TableId, Value,
		WriteTimestamp,
	};

	use super::*;
	use crate::filter::{FilterSpec, Restriction};

	fn column(id: u32, name: &str, kind: ColumnKind) -> ColumnDef {
		ColumnDef {
			id: ColumnId(id),
			name: name.to_string(),
			kind,
		}
	}

	fn base_schema() -> Schema {
		Schema::new(TableId(1), SchemaVersion(1), vec![
			column(0, "user", ColumnKind::PartitionKey(0)),
			column(1, "ts", ColumnKind::Clustering(0)),
			column(2, "status", ColumnKind::Regular),
			column(3, "note", ColumnKind::Regular),
		])
	}

	fn view_schema() -> SchemaRef {
		Arc::new(Schema::new(TableId(2), SchemaVersion(1), vec![
			column(0, "user", ColumnKind::PartitionKey(0)),
			column(1, "ts", ColumnKind::Clustering(0)),
			column(2, "status", ColumnKind::Regular),
		]))
	}

	fn active_view(base: &Schema) -> ViewDefinition {
		let filter = FilterSpec::unfiltered()
			.with("user", Restriction::Eq(Value::Text("alice".into())))
			.with("status", Restriction::Eq(Value::Text("active".into())));
		ViewDefinition::new(view_schema(), filter, base)
	}

	fn row(ts_value: i64, status: &str, write_ts: i64) -> ClusteringRow {
		let mut row = ClusteringRow::new(ClusteringKey(vec![Value::Int(ts_value)]));
		row.set_cell(ColumnId(2), Cell::new(Value::Text(status.into()), WriteTimestamp(write_ts)));
		row
	}

	#[test]
	fn test_partition_key_matches_has_no_false_negatives() {
		let base = base_schema();
		let view = active_view(&base);

		let alice = PartitionKey(vec![Value::Text("alice".into())]);
		let bob = PartitionKey(vec![Value::Text("bob".into())]);
		assert!(view.partition_key_matches(&base, &alice).unwrap());
		assert!(!view.partition_key_matches(&base, &bob).unwrap());
	}

	#[test]
	fn test_unrestricted_partition_key_always_matches() {
		let base = base_schema();
		let view = ViewDefinition::new(view_schema(), FilterSpec::unfiltered(), &base);

		let key = PartitionKey(vec![Value::Text("anyone".into())]);
		assert!(view.partition_key_matches(&base, &key).unwrap());
	}

	#[test]
	fn test_may_be_affected_by_is_conservative_without_promoted_column() {
		let base = base_schema();
		// View projects user, ts, status; "note" (ColumnId 3) is
		// invisible to the view. Membership still rides on bare row
		// liveness, so even a note-only write may create a view row.
		let view = active_view(&base);
		let key = PartitionKey(vec![Value::Text("alice".into())]);

		let unprojected = RowDelta::new([ColumnId(3)], false);
		assert!(view.may_be_affected_by(&base, &key, &unprojected).unwrap());

		let empty = RowDelta::new([], false);
		assert!(!view.may_be_affected_by(&base, &key, &empty).unwrap());

		let tombstoned = RowDelta::new([], true);
		assert!(view.may_be_affected_by(&base, &key, &tombstoned).unwrap());
	}

	#[test]
	fn test_may_be_affected_by_skips_untouched_columns_with_promoted_column() {
		let base = Schema::new(TableId(1), SchemaVersion(1), vec![
			column(0, "user", ColumnKind::PartitionKey(0)),
			column(1, "ts", ColumnKind::Clustering(0)),
			column(2, "email", ColumnKind::Regular),
			column(3, "note", ColumnKind::Regular),
		]);
		// Membership is gated on the promoted email cell, so a write
		// touching only "note" provably cannot affect the view.
		let schema = Arc::new(Schema::new(TableId(2), SchemaVersion(1), vec![
			column(0, "email", ColumnKind::PartitionKey(0)),
			column(1, "user", ColumnKind::Clustering(0)),
			column(2, "ts", ColumnKind::Clustering(1)),
		]));
		let view = ViewDefinition::new(schema, FilterSpec::unfiltered(), &base);
		let key = PartitionKey(vec![Value::Text("alice".into())]);

		let unprojected = RowDelta::new([ColumnId(3)], false);
		assert!(!view.may_be_affected_by(&base, &key, &unprojected).unwrap());

		let promoted = RowDelta::new([ColumnId(2)], false);
		assert!(view.may_be_affected_by(&base, &key, &promoted).unwrap());

		let tombstoned = RowDelta::new([ColumnId(3)], true);
		assert!(view.may_be_affected_by(&base, &key, &tombstoned).unwrap());
	}

	#[test]
	fn test_matches_view_filter_is_pure() {
		let base = base_schema();
		let view = active_view(&base);
		let key = PartitionKey(vec![Value::Text("alice".into())]);
		let row = row(1, "active", 5);

		let first = view.matches_view_filter(&base, &key, &row, None, ClockTime(0)).unwrap();
		let second = view.matches_view_filter(&base, &key, &row, None, ClockTime(0)).unwrap();
		assert!(first);
		assert_eq!(first, second);
	}

	#[test]
	fn test_filter_mismatch() {
		let base = base_schema();
		let view = active_view(&base);
		let key = PartitionKey(vec![Value::Text("alice".into())]);

		let inactive = row(1, "inactive", 5);
		assert!(!view.matches_view_filter(&base, &key, &inactive, None, ClockTime(0)).unwrap());
	}

	#[test]
	fn test_partition_tombstone_kills_match() {
		let base = base_schema();
		let view = active_view(&base);
		let key = PartitionKey(vec![Value::Text("alice".into())]);
		let matching = row(1, "active", 5);

		let outer = Some(Tombstone::new(WriteTimestamp(10)));
		assert!(!view.matches_view_filter(&base, &key, &matching, outer, ClockTime(0)).unwrap());
	}

	#[test]
	fn test_clustering_prefix_short_circuit() {
		let base = base_schema();
		let filter = FilterSpec::unfiltered().with("ts", Restriction::Ge(Value::Int(100)));
		let view = ViewDefinition::new(view_schema(), filter, &base);
		let key = PartitionKey(vec![Value::Text("alice".into())]);

		let below = row(99, "active", 5);
		let above = row(100, "active", 5);
		assert!(!view.matches_view_filter(&base, &key, &below, None, ClockTime(0)).unwrap());
		assert!(view.matches_view_filter(&base, &key, &above, None, ClockTime(0)).unwrap());
	}

	#[test]
	fn test_promoted_column_liveness_gates_existence() {
		let base = Schema::new(TableId(1), SchemaVersion(1), vec![
			column(0, "user", ColumnKind::PartitionKey(0)),
			column(1, "ts", ColumnKind::Clustering(0)),
			column(2, "email", ColumnKind::Regular),
		]);
		let schema = Arc::new(Schema::new(TableId(2), SchemaVersion(1), vec![
			column(0, "email", ColumnKind::PartitionKey(0)),
			column(1, "user", ColumnKind::Clustering(0)),
			column(2, "ts", ColumnKind::Clustering(1)),
		]));
		let view = ViewDefinition::new(schema, FilterSpec::unfiltered(), &base);
		let key = PartitionKey(vec![Value::Text("alice".into())]);

		// Email cell expires at clock time 100
		let mut row = ClusteringRow::new(ClusteringKey(vec![Value::Int(1)]));
		row.set_cell(
			ColumnId(2),
			Cell::with_expiry(Value::Text("a@b.c".into()), WriteTimestamp(5), ClockTime(100)),
		);

		assert!(view.matches_view_filter(&base, &key, &row, None, ClockTime(99)).unwrap());
		assert!(!view.matches_view_filter(&base, &key, &row, None, ClockTime(100)).unwrap());
	}
}
