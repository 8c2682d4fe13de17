// Copyright (c) rangedb.io 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! View update generation.
//!
//! Diffs a base partition's post-write state against its pre-write state
//! and emits the view mutations that keep every affected view consistent.
//! Both inputs arrive as clustering-ordered row streams and are walked in
//! lock-step; one clustering position is resolved at a time and the task
//! yields between positions, so unbounded partitions never materialize in
//! memory.

use std::{cmp::Ordering, sync::Arc};

use rangedb_core::{
	Cell, ClockTime, ClusteringKey, ClusteringRow, ColumnId, ColumnKind, Error, PartitionKey, PartitionStream,
	Result, RowOp, RowReader, Schema, TableId, Tombstone, Value, ViewMutation,
	diagnostic::view::stream_order_violation, internal_err, return_internal_error,
};
use tracing::debug;

use crate::definition::{BindingSource, ViewArtifacts, ViewDefinition};

/// Diffs one base partition and produces the mutations for every view in
/// `views` that the write can affect.
///
/// `updates` carries the partition's rows as they stand after the write,
/// `existings` the prior state of exactly the same rows. Both must yield
/// rows in ascending clustering-key order; the generator fails with a
/// `VIEW_002` error rather than sort. With no views registered the
/// streams are never touched.
///
/// The result is the complete batch for this diff; it is not observable
/// partially. Dispatch is the caller's decision, which allows the batch
/// to be dropped when the triggering base write never commits.
pub async fn generate_view_updates<U, E>(
	base: &Schema,
	views: &[Arc<ViewDefinition>],
	mut updates: PartitionStream<U>,
	mut existings: PartitionStream<E>,
	now: ClockTime,
) -> Result<Vec<ViewMutation>>
where
	U: RowReader,
	E: RowReader,
{
	if views.is_empty() {
		return Ok(Vec::new());
	}
	if updates.partition_key != existings.partition_key {
		return internal_err!(
			"update and existing streams describe different partitions: {:?} vs {:?}",
			updates.partition_key,
			existings.partition_key
		);
	}

	let partition_key = updates.partition_key.clone();
	let mut candidates = Vec::with_capacity(views.len());
	for view in views {
		if view.partition_key_matches(base, &partition_key)? {
			candidates.push(view.clone());
		}
	}
	if candidates.is_empty() {
		return Ok(Vec::new());
	}

	let updates_tombstone = updates.partition_tombstone;
	let existings_tombstone = existings.partition_tombstone;

	let mut batch = MutationBatch::default();
	let mut update_cursor = StreamCursor::new("updates");
	let mut existing_cursor = StreamCursor::new("existings");

	let mut next_update = update_cursor.pull(&mut updates).await?;
	let mut next_existing = existing_cursor.pull(&mut existings).await?;
	let mut positions = 0usize;

	while next_update.is_some() || next_existing.is_some() {
		let (update_row, existing_row) = match (&next_update, &next_existing) {
			(Some(update), Some(existing)) => match update.key.cmp(&existing.key) {
				Ordering::Less => (next_update.take(), None),
				Ordering::Greater => (None, next_existing.take()),
				Ordering::Equal => (next_update.take(), next_existing.take()),
			},
			(Some(_), None) => (next_update.take(), None),
			(None, Some(_)) => (None, next_existing.take()),
			(None, None) => break,
		};

		for view in &candidates {
			diff_position(
				view,
				base,
				&partition_key,
				update_row.as_ref(),
				existing_row.as_ref(),
				updates_tombstone,
				existings_tombstone,
				now,
				&mut batch,
			)?;
		}
		positions += 1;

		if next_update.is_none() {
			next_update = update_cursor.pull(&mut updates).await?;
		}
		if next_existing.is_none() {
			next_existing = existing_cursor.pull(&mut existings).await?;
		}
		tokio::task::yield_now().await;
	}

	debug!(
		partition = ?partition_key,
		views = candidates.len(),
		positions,
		mutations = batch.mutations.len(),
		"generated view updates"
	);
	Ok(batch.mutations)
}

/// Classifies one clustering position for one view and emits the resulting
/// operations, if any.
#[allow(clippy::too_many_arguments)]
fn diff_position(
	view: &ViewDefinition,
	base: &Schema,
	partition_key: &PartitionKey,
	update_row: Option<&ClusteringRow>,
	existing_row: Option<&ClusteringRow>,
	updates_tombstone: Option<Tombstone>,
	existings_tombstone: Option<Tombstone>,
	now: ClockTime,
	batch: &mut MutationBatch,
) -> Result<()> {
	let artifacts = view.artifacts(base)?;

	match update_row {
		Some(update) => {
			let mut delta = update.delta();
			delta.has_tombstone |= updates_tombstone.is_some();
			if !view.may_be_affected_by(base, partition_key, &delta)? {
				return Ok(());
			}
		}
		// A position present only in the prior state was not written;
		// only a partition tombstone can change its membership.
		None => {
			if updates_tombstone.is_none() {
				return Ok(());
			}
		}
	}

	let old_matches = match existing_row {
		Some(existing) => view.matches_view_filter(base, partition_key, existing, existings_tombstone, now)?,
		None => false,
	};
	let new_matches = match update_row {
		Some(update) => view.matches_view_filter(base, partition_key, update, updates_tombstone, now)?,
		None => false,
	};

	match (old_matches, new_matches) {
		(false, false) => {}
		(false, true) => {
			// matches_view_filter guaranteed these derivations succeed
			let update = required_row(update_row)?;
			let derived = derive_view_row(&artifacts, partition_key, update, updates_tombstone, now)?;
			batch.push(view.table(), derived.partition_key, RowOp::Insert {
				key: derived.key,
				cells: derived.cells,
			});
		}
		(true, false) => {
			// The view key may derive from values the write removed, so
			// the deletion is keyed off the prior row.
			let existing = required_row(existing_row)?;
			let derived = derive_view_row(&artifacts, partition_key, existing, existings_tombstone, now)?;
			let tombstone = deletion_tombstone(update_row, existing, updates_tombstone)?;
			batch.push(view.table(), derived.partition_key, RowOp::Delete {
				key: derived.key,
				tombstone,
			});
		}
		(true, true) => {
			let update = required_row(update_row)?;
			let existing = required_row(existing_row)?;
			let new = derive_view_row(&artifacts, partition_key, update, updates_tombstone, now)?;
			let old = derive_view_row(&artifacts, partition_key, existing, existings_tombstone, now)?;

			if new.partition_key == old.partition_key && new.key == old.key {
				batch.push(view.table(), new.partition_key, RowOp::Update {
					key: new.key,
					cells: new.cells,
				});
			} else {
				// Delete strictly before insert, so the view never
				// holds both keys at once.
				let tombstone = deletion_tombstone(update_row, existing, updates_tombstone)?;
				batch.push(view.table(), old.partition_key, RowOp::Delete {
					key: old.key,
					tombstone,
				});
				batch.push(view.table(), new.partition_key, RowOp::Insert {
					key: new.key,
					cells: new.cells,
				});
			}
		}
	}
	Ok(())
}

fn required_row(row: Option<&ClusteringRow>) -> Result<&ClusteringRow> {
	match row {
		Some(row) => Ok(row),
		None => internal_err!("row classified as matching is absent from its stream"),
	}
}

/// The write timestamp a view-row deletion carries: the timestamp of
/// whatever base deletion or overwrite caused the row to stop matching.
fn deletion_tombstone(
	update_row: Option<&ClusteringRow>,
	existing_row: &ClusteringRow,
	updates_tombstone: Option<Tombstone>,
) -> Result<Tombstone> {
	if let Some(tombstone) = updates_tombstone {
		return Ok(tombstone);
	}
	if let Some(update) = update_row {
		if let Some(tombstone) = update.row_tombstone {
			return Ok(tombstone);
		}
		if let Some(timestamp) = update.max_timestamp() {
			return Ok(Tombstone::new(timestamp));
		}
	}
	match existing_row.max_timestamp() {
		Some(timestamp) => Ok(Tombstone::new(timestamp)),
		None => internal_err!("no timestamp available for view-row deletion"),
	}
}

/// One base row projected into view shape: the view's own partition key,
/// clustering key, and regular-column cells.
struct DerivedViewRow {
	partition_key: PartitionKey,
	key: ClusteringKey,
	cells: Vec<(ColumnId, Cell)>,
}

/// Projects a base row through the view's column bindings. Key positions
/// are filled from base key values or, for a promoted column, from the
/// live cell; regular view columns clone the base cell, preserving its
/// write timestamp.
fn derive_view_row(
	artifacts: &ViewArtifacts,
	base_partition_key: &PartitionKey,
	row: &ClusteringRow,
	outer: Option<Tombstone>,
	now: ClockTime,
) -> Result<DerivedViewRow> {
	let pk_len = artifacts.bindings.iter().filter(|b| matches!(b.view_kind, ColumnKind::PartitionKey(_))).count();
	let ck_len = artifacts.bindings.iter().filter(|b| matches!(b.view_kind, ColumnKind::Clustering(_))).count();

	let mut pk_values: Vec<Option<Value>> = vec![None; pk_len];
	let mut ck_values: Vec<Option<Value>> = vec![None; ck_len];
	let mut cells = Vec::new();
	let row_timestamp = row.max_timestamp();

	for binding in &artifacts.bindings {
		match binding.view_kind {
			ColumnKind::PartitionKey(position) => {
				let value = binding_value(binding.source, binding.base_column, base_partition_key, row, outer, now)?;
				if position >= pk_len {
					return_internal_error!("view partition-key position {} out of range", position);
				}
				pk_values[position] = Some(value);
			}
			ColumnKind::Clustering(position) => {
				let value = binding_value(binding.source, binding.base_column, base_partition_key, row, outer, now)?;
				if position >= ck_len {
					return_internal_error!("view clustering position {} out of range", position);
				}
				ck_values[position] = Some(value);
			}
			ColumnKind::Regular => match binding.source {
				BindingSource::BaseRegular => {
					// A dead base cell simply leaves the view column
					// absent.
					if let Some(cell) = row.live_cell(binding.base_column, outer, now) {
						cells.push((binding.view_column, cell.clone()));
					}
				}
				BindingSource::BasePartitionKey(_) | BindingSource::BaseClustering(_) => {
					let value = binding_value(
						binding.source,
						binding.base_column,
						base_partition_key,
						row,
						outer,
						now,
					)?;
					// A row that reached derivation carries at least
					// one write; inventing a timestamp here would
					// corrupt last-write-wins at the view.
					let Some(timestamp) = row_timestamp else {
						return_internal_error!("projected key column on a row with no write timestamp");
					};
					cells.push((binding.view_column, Cell::new(value, timestamp)));
				}
			},
		}
	}

	Ok(DerivedViewRow {
		partition_key: PartitionKey(collect_key(pk_values, "partition")?),
		key: ClusteringKey(collect_key(ck_values, "clustering")?),
		cells,
	})
}

fn binding_value(
	source: BindingSource,
	base_column: ColumnId,
	base_partition_key: &PartitionKey,
	row: &ClusteringRow,
	outer: Option<Tombstone>,
	now: ClockTime,
) -> Result<Value> {
	let value = match source {
		BindingSource::BasePartitionKey(position) => base_partition_key.value(position).cloned(),
		BindingSource::BaseClustering(position) => row.key.value(position).cloned(),
		BindingSource::BaseRegular => row.live_cell(base_column, outer, now).map(|cell| cell.value.clone()),
	};
	match value {
		Some(value) => Ok(value),
		None => internal_err!("no value for view key column bound to base column {}", base_column.0),
	}
}

fn collect_key(values: Vec<Option<Value>>, kind: &str) -> Result<Vec<Value>> {
	let mut key = Vec::with_capacity(values.len());
	for (position, value) in values.into_iter().enumerate() {
		match value {
			Some(value) => key.push(value),
			None => return internal_err!("view {} key position {} has no binding", kind, position),
		}
	}
	Ok(key)
}

/// Per-stream pull cursor enforcing ascending clustering-key order.
struct StreamCursor {
	name: &'static str,
	last: Option<ClusteringKey>,
}

impl StreamCursor {
	fn new(name: &'static str) -> Self {
		Self {
			name,
			last: None,
		}
	}

	async fn pull<R: RowReader>(&mut self, stream: &mut PartitionStream<R>) -> Result<Option<ClusteringRow>> {
		let Some(row) = stream.next_row().await? else {
			return Ok(None);
		};
		if let Some(last) = &self.last {
			if row.key <= *last {
				return Err(Error(stream_order_violation(self.name)));
			}
		}
		self.last = Some(row.key.clone());
		Ok(Some(row))
	}
}

/// Accumulates emitted operations, folding consecutive operations against
/// the same view partition into one mutation while preserving emission
/// order.
#[derive(Default)]
struct MutationBatch {
	mutations: Vec<ViewMutation>,
}

impl MutationBatch {
	fn push(&mut self, view: TableId, partition_key: PartitionKey, op: RowOp) {
		match self.mutations.last_mut() {
			Some(last) if last.view == view && last.partition_key == partition_key => last.ops.push(op),
			_ => {
				let mut mutation = ViewMutation::new(view, partition_key);
				mutation.ops.push(op);
				self.mutations.push(mutation);
			}
		}
	}
}
