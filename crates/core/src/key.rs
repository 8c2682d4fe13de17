// Copyright (c) rangedb.io 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::ops::Bound;

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::Xxh3;

use crate::value::Value;

/// Ring position of a partition key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Token(pub u64);

/// Partition-key column values in key position order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionKey(pub Vec<Value>);

impl PartitionKey {
	pub fn token(&self) -> Token {
		let mut hasher = Xxh3::new();
		for value in &self.0 {
			hash_value(&mut hasher, value);
		}
		Token(hasher.digest())
	}

	pub fn value(&self, position: usize) -> Option<&Value> {
		self.0.get(position)
	}
}

fn hash_value(hasher: &mut Xxh3, value: &Value) {
	match value {
		Value::Bool(v) => hasher.update(&[0u8, *v as u8]),
		Value::Int(v) => {
			hasher.update(&[1u8]);
			hasher.update(&v.to_be_bytes());
		}
		Value::Text(v) => {
			hasher.update(&[2u8]);
			hasher.update(v.as_bytes());
		}
		Value::Bytes(v) => {
			hasher.update(&[3u8]);
			hasher.update(v);
		}
	}
}

/// Clustering-column values in key position order; the within-partition
/// row order used by the merge-join.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClusteringKey(pub Vec<Value>);

impl ClusteringKey {
	pub fn value(&self, position: usize) -> Option<&Value> {
		self.0.get(position)
	}
}

/// Half-open or closed value range used for key restrictions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueRange {
	pub lower: Bound<Value>,
	pub upper: Bound<Value>,
}

impl ValueRange {
	pub fn unrestricted() -> Self {
		Self {
			lower: Bound::Unbounded,
			upper: Bound::Unbounded,
		}
	}

	pub fn point(value: Value) -> Self {
		Self {
			lower: Bound::Included(value.clone()),
			upper: Bound::Included(value),
		}
	}

	pub fn is_unrestricted(&self) -> bool {
		matches!((&self.lower, &self.upper), (Bound::Unbounded, Bound::Unbounded))
	}

	pub fn contains(&self, value: &Value) -> bool {
		let lower_ok = match &self.lower {
			Bound::Unbounded => true,
			Bound::Included(bound) => value >= bound,
			Bound::Excluded(bound) => value > bound,
		};
		let upper_ok = match &self.upper {
			Bound::Unbounded => true,
			Bound::Included(bound) => value <= bound,
			Bound::Excluded(bound) => value < bound,
		};
		lower_ok && upper_ok
	}

	/// Intersects another range into this one. Returns false if the
	/// intersection is provably empty for totally ordered values.
	pub fn intersect(&mut self, other: &ValueRange) -> bool {
		self.lower = tighter_lower(&self.lower, &other.lower);
		self.upper = tighter_upper(&self.upper, &other.upper);

		match (&self.lower, &self.upper) {
			(Bound::Included(l), Bound::Included(u)) => l <= u,
			(Bound::Included(l), Bound::Excluded(u))
			| (Bound::Excluded(l), Bound::Included(u))
			| (Bound::Excluded(l), Bound::Excluded(u)) => l < u,
			_ => true,
		}
	}
}

fn tighter_lower(a: &Bound<Value>, b: &Bound<Value>) -> Bound<Value> {
	match (a, b) {
		(Bound::Unbounded, other) | (other, Bound::Unbounded) => other.clone(),
		(Bound::Included(l), Bound::Included(r)) => {
			if l >= r {
				a.clone()
			} else {
				b.clone()
			}
		}
		(Bound::Included(l), Bound::Excluded(r)) | (Bound::Excluded(l), Bound::Included(r)) => {
			if l > r {
				a.clone()
			} else if r > l {
				b.clone()
			} else if matches!(a, Bound::Excluded(_)) {
				a.clone()
			} else {
				b.clone()
			}
		}
		(Bound::Excluded(l), Bound::Excluded(r)) => {
			if l >= r {
				a.clone()
			} else {
				b.clone()
			}
		}
	}
}

fn tighter_upper(a: &Bound<Value>, b: &Bound<Value>) -> Bound<Value> {
	match (a, b) {
		(Bound::Unbounded, other) | (other, Bound::Unbounded) => other.clone(),
		(Bound::Included(l), Bound::Included(r)) => {
			if l <= r {
				a.clone()
			} else {
				b.clone()
			}
		}
		(Bound::Included(l), Bound::Excluded(r)) | (Bound::Excluded(l), Bound::Included(r)) => {
			if l < r {
				a.clone()
			} else if r < l {
				b.clone()
			} else if matches!(a, Bound::Excluded(_)) {
				a.clone()
			} else {
				b.clone()
			}
		}
		(Bound::Excluded(l), Bound::Excluded(r)) => {
			if l <= r {
				a.clone()
			} else {
				b.clone()
			}
		}
	}
}

/// Restriction over a prefix of the clustering columns. Position `i` of
/// `ranges` restricts clustering position `i`; positions past the end are
/// unrestricted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClusteringPrefix {
	pub ranges: Vec<ValueRange>,
}

impl ClusteringPrefix {
	pub fn unrestricted() -> Self {
		Self::default()
	}

	pub fn matches(&self, key: &ClusteringKey) -> bool {
		self.ranges.iter().enumerate().all(|(position, range)| {
			match key.value(position) {
				Some(value) => range.contains(value),
				// Shorter keys cannot violate a restriction on a
				// position they do not have.
				None => range.is_unrestricted(),
			}
		})
	}
}
