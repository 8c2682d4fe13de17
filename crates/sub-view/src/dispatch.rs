// Copyright (c) rangedb.io 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! View mutation dispatch.
//!
//! The generator's job ends at producing a correct mutation batch; getting
//! each mutation to the replicas owning its view partition is this
//! module's. Handoff is fire-and-forget: the write path enqueues the batch
//! and returns without waiting for delivery, and a delivery fault
//! surfaces as a logged view-maintenance fault, never as a base-write
//! failure.

use std::{sync::Arc, time::Duration};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use parking_lot::Mutex;
use rangedb_core::{Result, Token, ViewMutation};
use tokio::task::{JoinHandle, spawn_blocking};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

/// Cluster member owning one or more token ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// Maps a token to the replica set owning it.
pub trait ReplicaResolver: Send + Sync {
	fn replicas_for(&self, token: Token) -> Vec<NodeId>;
}

/// Transport edge: hands one mutation to one replica. Implementations own
/// their retry policy; a returned error means the attempt was abandoned.
pub trait DeliverySink: Send + Sync {
	fn deliver(&self, node: NodeId, mutation: &ViewMutation) -> Result<()>;
}

/// The contract between the write path and view-mutation delivery.
///
/// `base_token` identifies the base partition whose write triggered the
/// batch; each mutation resolves its own replica set from its own derived
/// partition key, which generally differs from the base token. Must not
/// block the caller on delivery.
pub trait ViewMutationDispatcher: Send + Sync {
	fn mutate_mv(&self, base_token: Token, mutations: Vec<ViewMutation>);
}

/// Channel-backed dispatcher: mutations are queued on an unbounded channel
/// and drained by a background task that resolves replicas and forwards
/// each mutation.
pub struct ChannelDispatcher {
	tx: Sender<(Token, Vec<ViewMutation>)>,
	shutdown: CancellationToken,
	task: Mutex<Option<JoinHandle<()>>>,
}

impl ChannelDispatcher {
	pub fn spawn(resolver: Arc<dyn ReplicaResolver>, sink: Arc<dyn DeliverySink>) -> Self {
		let (tx, rx) = unbounded();
		let shutdown = CancellationToken::new();
		let task = tokio::spawn(dispatcher(rx, resolver, sink, shutdown.clone()));

		Self {
			tx,
			shutdown,
			task: Mutex::new(Some(task)),
		}
	}

	/// Signals the background task and waits for it to drain. Mutations
	/// enqueued before the call are still delivered.
	pub async fn shutdown(&self) {
		self.shutdown.cancel();
		let task = self.task.lock().take();
		if let Some(task) = task {
			let _ = task.await;
		}
	}
}

impl ViewMutationDispatcher for ChannelDispatcher {
	fn mutate_mv(&self, base_token: Token, mutations: Vec<ViewMutation>) {
		if mutations.is_empty() {
			return;
		}
		if self.tx.send((base_token, mutations)).is_err() {
			warn!(base_token = base_token.0, "dispatcher channel closed, dropping view mutations");
		}
	}
}

/// Background dispatch task: drains the mutation channel, resolves each
/// mutation's replica set and forwards it. Runs until shutdown is
/// signalled and the channel is drained, or the channel disconnects.
#[instrument(name = "view_dispatcher", level = "info", skip(rx, resolver, sink, shutdown))]
async fn dispatcher(
	rx: Receiver<(Token, Vec<ViewMutation>)>,
	resolver: Arc<dyn ReplicaResolver>,
	sink: Arc<dyn DeliverySink>,
	shutdown: CancellationToken,
) {
	info!("view dispatcher started");

	loop {
		// Receive on a blocking thread so the async runtime is never
		// parked on the channel.
		let batch = {
			let rx = rx.clone();
			let shutdown = shutdown.clone();

			spawn_blocking(move || {
				loop {
					match rx.recv_timeout(Duration::from_millis(1)) {
						Ok(batch) => return Some(batch),
						Err(RecvTimeoutError::Timeout) => {
							// Drain what is already queued before
							// honoring shutdown.
							if shutdown.is_cancelled() {
								return rx.try_recv().ok();
							}
						}
						Err(RecvTimeoutError::Disconnected) => {
							return None;
						}
					}
				}
			})
			.await
			.expect("blocking recv panicked")
		};

		let Some((base_token, mutations)) = batch else {
			break;
		};

		trace!(base_token = base_token.0, mutations = mutations.len(), "forwarding view mutations");

		for mutation in mutations {
			let token = mutation.token();
			let replicas = resolver.replicas_for(token);
			if replicas.is_empty() {
				warn!(view = mutation.view.0, token = token.0, "no replicas own view partition");
				continue;
			}
			for node in replicas {
				if let Err(e) = sink.deliver(node, &mutation) {
					// View-maintenance fault; the base write already
					// succeeded and stays correct.
					warn!(
						view = mutation.view.0,
						node = node.0,
						token = token.0,
						error = %e,
						"view mutation delivery failed"
					);
				}
			}
			debug!(view = mutation.view.0, token = token.0, ops = mutation.ops.len(), "view mutation dispatched");
		}
	}

	info!("view dispatcher exiting");
}

#[cfg(test)]
mod tests {
	use rangedb_core::{Error, PartitionKey, TableId, Value, diagnostic::view::view_filter_error};

	use super::*;

	struct FixedResolver(Vec<NodeId>);

	impl ReplicaResolver for FixedResolver {
		fn replicas_for(&self, _token: Token) -> Vec<NodeId> {
			self.0.clone()
		}
	}

	#[derive(Default)]
	struct RecordingSink {
		delivered: Mutex<Vec<(NodeId, ViewMutation)>>,
		fail_node: Option<NodeId>,
	}

	impl DeliverySink for RecordingSink {
		fn deliver(&self, node: NodeId, mutation: &ViewMutation) -> Result<()> {
			if self.fail_node == Some(node) {
				return Err(Error(view_filter_error("injected delivery failure")));
			}
			self.delivered.lock().push((node, mutation.clone()));
			Ok(())
		}
	}

	fn mutation(view: u64) -> ViewMutation {
		ViewMutation::new(TableId(view), PartitionKey(vec![Value::Int(view as i64)]))
	}

	#[tokio::test]
	async fn test_mutations_reach_every_replica() {
		let resolver = Arc::new(FixedResolver(vec![NodeId(1), NodeId(2)]));
		let sink = Arc::new(RecordingSink::default());
		let dispatcher = ChannelDispatcher::spawn(resolver, sink.clone());

		dispatcher.mutate_mv(Token(42), vec![mutation(7)]);
		dispatcher.shutdown().await;

		let delivered = sink.delivered.lock();
		assert_eq!(delivered.len(), 2);
		assert_eq!(delivered[0].0, NodeId(1));
		assert_eq!(delivered[1].0, NodeId(2));
		assert_eq!(delivered[0].1.view, TableId(7));
	}

	#[tokio::test]
	async fn test_delivery_failure_does_not_stop_dispatch() {
		let resolver = Arc::new(FixedResolver(vec![NodeId(1), NodeId(2)]));
		let sink = Arc::new(RecordingSink {
			delivered: Mutex::new(Vec::new()),
			fail_node: Some(NodeId(1)),
		});
		let dispatcher = ChannelDispatcher::spawn(resolver, sink.clone());

		dispatcher.mutate_mv(Token(1), vec![mutation(7), mutation(8)]);
		dispatcher.shutdown().await;

		let delivered = sink.delivered.lock();
		assert_eq!(delivered.len(), 2);
		assert!(delivered.iter().all(|(node, _)| *node == NodeId(2)));
	}

	#[tokio::test]
	async fn test_empty_batch_is_not_enqueued() {
		let resolver = Arc::new(FixedResolver(vec![NodeId(1)]));
		let sink = Arc::new(RecordingSink::default());
		let dispatcher = ChannelDispatcher::spawn(resolver, sink.clone());

		dispatcher.mutate_mv(Token(1), vec![]);
		dispatcher.shutdown().await;

		assert!(sink.delivered.lock().is_empty());
	}
}
