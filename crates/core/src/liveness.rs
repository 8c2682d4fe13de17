// Copyright (c) rangedb.io 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Cell and tombstone liveness: whether a write currently counts as
//! present, given TTL expiry and tombstone shadowing, evaluated at a
//! specific point in time.

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Microsecond write timestamp; the last-write-wins ordering of cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WriteTimestamp(pub i64);

/// Wall-clock seconds used for TTL expiry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClockTime(pub i64);

/// Deletion marker. Suppresses writes at or below its timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tombstone {
	pub timestamp: WriteTimestamp,
}

impl Tombstone {
	pub fn new(timestamp: WriteTimestamp) -> Self {
		Self {
			timestamp,
		}
	}

	pub fn shadows(&self, write: WriteTimestamp) -> bool {
		write <= self.timestamp
	}

	/// The later of two optional tombstones; the one that shadows more.
	pub fn merge(a: Option<Tombstone>, b: Option<Tombstone>) -> Option<Tombstone> {
		match (a, b) {
			(Some(l), Some(r)) => Some(if l.timestamp >= r.timestamp {
				l
			} else {
				r
			}),
			(Some(t), None) | (None, Some(t)) => Some(t),
			(None, None) => None,
		}
	}
}

/// A single column write: value, write timestamp and optional TTL expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
	pub value: Value,
	pub timestamp: WriteTimestamp,
	pub expiry: Option<ClockTime>,
}

impl Cell {
	pub fn new(value: Value, timestamp: WriteTimestamp) -> Self {
		Self {
			value,
			timestamp,
			expiry: None,
		}
	}

	pub fn with_expiry(value: Value, timestamp: WriteTimestamp, expiry: ClockTime) -> Self {
		Self {
			value,
			timestamp,
			expiry: Some(expiry),
		}
	}

	/// A cell counts as present only if it has not expired at `now` and
	/// is not shadowed by a tombstone at or above its timestamp.
	pub fn is_live(&self, shadow: Option<Tombstone>, now: ClockTime) -> bool {
		if let Some(expiry) = self.expiry {
			if expiry <= now {
				return false;
			}
		}
		if let Some(tombstone) = shadow {
			if tombstone.shadows(self.timestamp) {
				return false;
			}
		}
		true
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_cell_live_without_shadow() {
		let cell = Cell::new(Value::Int(1), WriteTimestamp(10));
		assert!(cell.is_live(None, ClockTime(0)));
	}

	#[test]
	fn test_tombstone_shadows_older_and_equal_writes() {
		let tombstone = Tombstone::new(WriteTimestamp(10));
		let cell = Cell::new(Value::Int(1), WriteTimestamp(10));
		assert!(!cell.is_live(Some(tombstone), ClockTime(0)));

		let newer = Cell::new(Value::Int(1), WriteTimestamp(11));
		assert!(newer.is_live(Some(tombstone), ClockTime(0)));
	}

	#[test]
	fn test_ttl_expiry() {
		let cell = Cell::with_expiry(Value::Int(1), WriteTimestamp(10), ClockTime(100));
		assert!(cell.is_live(None, ClockTime(99)));
		assert!(!cell.is_live(None, ClockTime(100)));
		assert!(!cell.is_live(None, ClockTime(101)));
	}

	#[test]
	fn test_merge_takes_later_tombstone() {
		let a = Tombstone::new(WriteTimestamp(5));
		let b = Tombstone::new(WriteTimestamp(9));
		assert_eq!(Tombstone::merge(Some(a), Some(b)), Some(b));
		assert_eq!(Tombstone::merge(None, Some(a)), Some(a));
		assert_eq!(Tombstone::merge(None, None), None);
	}
}
