// Copyright (c) rangedb.io 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Forward-only row sequences. A reader is finite and non-restartable;
//! re-deriving a fresh sequence means re-issuing the read against the
//! storage collaborator.

use std::collections::VecDeque;

use crate::{Result, key::PartitionKey, liveness::Tombstone, row::ClusteringRow};

/// Lazy, ordered sequence of clustering rows. Implementations must yield
/// rows in ascending clustering-key order; consumers are entitled to fail
/// loudly when they do not.
pub trait RowReader {
	fn next(&mut self) -> impl Future<Output = Result<Option<ClusteringRow>>> + Send;
}

/// One partition's worth of row state: the partition key, an optional
/// partition-level tombstone, and the row sequence itself. Both the
/// post-write (`updates`) and pre-write (`existings`) inputs of the update
/// generator have this shape.
#[derive(Debug)]
pub struct PartitionStream<R> {
	pub partition_key: PartitionKey,
	pub partition_tombstone: Option<Tombstone>,
	reader: R,
}

impl<R: RowReader> PartitionStream<R> {
	pub fn new(partition_key: PartitionKey, reader: R) -> Self {
		Self {
			partition_key,
			partition_tombstone: None,
			reader,
		}
	}

	pub fn with_tombstone(partition_key: PartitionKey, tombstone: Tombstone, reader: R) -> Self {
		Self {
			partition_key,
			partition_tombstone: Some(tombstone),
			reader,
		}
	}

	pub async fn next_row(&mut self) -> Result<Option<ClusteringRow>> {
		self.reader.next().await
	}
}

/// In-memory reader over a pre-collected row list. Used by tests and by
/// storage collaborators that already hold the rows.
#[derive(Debug)]
pub struct VecRowReader {
	rows: VecDeque<ClusteringRow>,
}

impl VecRowReader {
	pub fn new(rows: Vec<ClusteringRow>) -> Self {
		Self {
			rows: rows.into(),
		}
	}

	pub fn empty() -> Self {
		Self::new(Vec::new())
	}
}

impl RowReader for VecRowReader {
	async fn next(&mut self) -> Result<Option<ClusteringRow>> {
		Ok(self.rows.pop_front())
	}
}
