// Copyright (c) rangedb.io 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
	key::ClusteringKey,
	liveness::{Cell, ClockTime, Tombstone},
	schema::ColumnId,
};

/// One clustering position of a partition: the row's cells plus an
/// optional row-level tombstone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusteringRow {
	pub key: ClusteringKey,
	pub row_tombstone: Option<Tombstone>,
	pub cells: BTreeMap<ColumnId, Cell>,
}

impl ClusteringRow {
	pub fn new(key: ClusteringKey) -> Self {
		Self {
			key,
			row_tombstone: None,
			cells: BTreeMap::new(),
		}
	}

	pub fn with_tombstone(key: ClusteringKey, tombstone: Tombstone) -> Self {
		Self {
			key,
			row_tombstone: Some(tombstone),
			cells: BTreeMap::new(),
		}
	}

	pub fn set_cell(&mut self, column: ColumnId, cell: Cell) {
		self.cells.insert(column, cell);
	}

	/// The tombstone shadowing this row's cells: the later of the row
	/// tombstone and any outer (partition) tombstone.
	pub fn effective_tombstone(&self, outer: Option<Tombstone>) -> Option<Tombstone> {
		Tombstone::merge(self.row_tombstone, outer)
	}

	pub fn live_cell(&self, column: ColumnId, outer: Option<Tombstone>, now: ClockTime) -> Option<&Cell> {
		let shadow = self.effective_tombstone(outer);
		self.cells.get(&column).filter(|cell| cell.is_live(shadow, now))
	}

	/// A row with no live cells (e.g. present only as a range tombstone)
	/// is treated as absent.
	pub fn is_live(&self, outer: Option<Tombstone>, now: ClockTime) -> bool {
		let shadow = self.effective_tombstone(outer);
		self.cells.values().any(|cell| cell.is_live(shadow, now))
	}

	/// Latest write timestamp carried by this row, tombstone included.
	pub fn max_timestamp(&self) -> Option<crate::liveness::WriteTimestamp> {
		let cell_max = self.cells.values().map(|c| c.timestamp).max();
		let tomb = self.row_tombstone.map(|t| t.timestamp);
		match (cell_max, tomb) {
			(Some(a), Some(b)) => Some(a.max(b)),
			(Some(a), None) => Some(a),
			(None, Some(b)) => Some(b),
			(None, None) => None,
		}
	}

	/// The update-shape view of this row consumed by the affected-ness
	/// fast path.
	pub fn delta(&self) -> RowDelta {
		RowDelta {
			touched: self.cells.keys().copied().collect(),
			has_tombstone: self.row_tombstone.is_some(),
		}
	}
}

/// What an update touches, without the full row state. Used only to prove
/// that an update cannot affect a view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RowDelta {
	pub touched: BTreeSet<ColumnId>,
	pub has_tombstone: bool,
}

impl RowDelta {
	pub fn new(touched: impl IntoIterator<Item = ColumnId>, has_tombstone: bool) -> Self {
		Self {
			touched: touched.into_iter().collect(),
			has_tombstone,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{Value, WriteTimestamp};

	fn row_with_cell(ts: i64) -> ClusteringRow {
		let mut row = ClusteringRow::new(ClusteringKey(vec![Value::Int(1)]));
		row.set_cell(ColumnId(1), Cell::new(Value::Text("v".into()), WriteTimestamp(ts)));
		row
	}

	#[test]
	fn test_row_tombstone_kills_older_cells() {
		let mut row = row_with_cell(5);
		row.row_tombstone = Some(Tombstone::new(WriteTimestamp(10)));
		assert!(!row.is_live(None, ClockTime(0)));
		assert!(row.live_cell(ColumnId(1), None, ClockTime(0)).is_none());
	}

	#[test]
	fn test_outer_tombstone_merged_with_row_tombstone() {
		let mut row = row_with_cell(5);
		row.row_tombstone = Some(Tombstone::new(WriteTimestamp(1)));
		assert!(row.is_live(None, ClockTime(0)));

		let partition = Some(Tombstone::new(WriteTimestamp(7)));
		assert!(!row.is_live(partition, ClockTime(0)));
	}

	#[test]
	fn test_row_without_live_cells_is_absent() {
		let row = ClusteringRow::with_tombstone(
			ClusteringKey(vec![Value::Int(1)]),
			Tombstone::new(WriteTimestamp(3)),
		);
		assert!(!row.is_live(None, ClockTime(0)));
	}

	#[test]
	fn test_max_timestamp_includes_tombstone() {
		let mut row = row_with_cell(5);
		row.row_tombstone = Some(Tombstone::new(WriteTimestamp(9)));
		assert_eq!(row.max_timestamp(), Some(WriteTimestamp(9)));
	}

	#[test]
	fn test_delta_reports_touched_columns() {
		let row = row_with_cell(5);
		let delta = row.delta();
		assert!(delta.touched.contains(&ColumnId(1)));
		assert!(!delta.has_tombstone);
	}
}
