//! The signal router: compiles a wiring specification into a dispatch
//! table and delivers batches to receivers.
//!
//! The table is built exactly once, validated eagerly, and read-only
//! afterwards; lookups during delivery take no locks, so any number of
//! blocks may notify concurrently from independent threads. Delivery
//! itself is synchronous on the caller's thread: receivers bound to the
//! notified output run one at a time in declaration order, so a slow
//! receiver blocks its sender. The router performs no batching,
//! throttling or backpressure.

mod context;
mod error;

pub use context::{RouterContext, RouterSettings};
pub use error::RouterError;

use crate::block::{Block, DEFAULT_TERMINAL};
use crate::service::{ReceiverRef, ReceiverSpec};
use crate::signal::{Signal, clone_batch};
use crate::status::{RunnerStatus, StatusFlags};
use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::Arc;

/// One compiled receiver binding: who receives, on which input, serving
/// which of the sender's outputs.
struct ReceiverData {
    block: Arc<dyn Block>,
    block_id: String,
    input_id: String,
    output_id: String,
}

struct RoutingTable {
    /// sender id -> bindings in declaration order
    receivers: IndexMap<String, Vec<ReceiverData>>,
    settings: RouterSettings,
}

/// Compiles block execution information once and then delivers signal
/// batches from senders to their receivers.
pub struct BlockRouter {
    status: StatusFlags,
    table: OnceCell<RoutingTable>,
}

impl BlockRouter {
    pub fn new() -> Self {
        let status = StatusFlags::with_initial(RunnerStatus::Created);
        status.set_callback(Arc::new(|old, new| {
            log::info!("block router status changed from [{old}] to [{new}]");
        }));
        BlockRouter {
            status,
            table: OnceCell::new(),
        }
    }

    pub fn status(&self) -> &StatusFlags {
        &self.status
    }

    /// Builds and installs the routing table.
    ///
    /// Validation failures abort construction and leave no table behind,
    /// so a router that failed to configure can never deliver partially.
    pub fn configure(&self, context: RouterContext) -> Result<(), RouterError> {
        if self.table.get().is_some() {
            return Err(RouterError::AlreadyConfigured);
        }
        self.status.set(RunnerStatus::Configuring);
        match Self::build_table(&context) {
            Ok(receivers) => {
                if context.settings.clone_signals {
                    log::info!("set to clone signals for multiple receivers");
                }
                let table = RoutingTable {
                    receivers,
                    settings: context.settings,
                };
                if self.table.set(table).is_err() {
                    return Err(RouterError::AlreadyConfigured);
                }
                self.status.set(RunnerStatus::Configured);
                Ok(())
            }
            Err(e) => {
                log::error!("block router configuration failed: {e}");
                self.status.add(RunnerStatus::Error);
                Err(e)
            }
        }
    }

    pub fn start(&self) -> Result<(), RouterError> {
        if self.table.get().is_none() {
            return Err(RouterError::NotConfigured);
        }
        self.status.set(RunnerStatus::Starting);
        self.status.set(RunnerStatus::Started);
        Ok(())
    }

    pub fn stop(&self) {
        self.status.set(RunnerStatus::Stopping);
        self.status.set(RunnerStatus::Stopped);
    }

    fn build_table(
        context: &RouterContext,
    ) -> Result<IndexMap<String, Vec<ReceiverData>>, RouterError> {
        let mut receivers: IndexMap<String, Vec<ReceiverData>> = IndexMap::new();
        for execution in &context.execution {
            let sender = context
                .blocks
                .get(&execution.id)
                .ok_or_else(|| RouterError::MissingBlock(execution.id.clone()))?;
            let bindings = receivers.entry(execution.id.clone()).or_default();
            match &execution.receivers {
                ReceiverSpec::ByOutput(by_output) => {
                    for (output_id, entries) in by_output {
                        if !sender.is_output_valid(output_id) {
                            return Err(RouterError::InvalidBlockOutput {
                                block: execution.id.clone(),
                                output: output_id.clone(),
                            });
                        }
                        for entry in entries {
                            bindings.push(Self::resolve_receiver(
                                entry,
                                &context.blocks,
                                output_id,
                            )?);
                        }
                    }
                }
                ReceiverSpec::List(entries) => {
                    // an empty flat list is a no-op wiring, accepted for
                    // any sender; a non-empty one targets the sender's
                    // default output, which must therefore exist
                    if entries.is_empty() {
                        continue;
                    }
                    if !sender.is_output_valid(DEFAULT_TERMINAL) {
                        return Err(RouterError::InvalidBlockOutput {
                            block: execution.id.clone(),
                            output: DEFAULT_TERMINAL.to_string(),
                        });
                    }
                    for entry in entries {
                        bindings.push(Self::resolve_receiver(
                            entry,
                            &context.blocks,
                            DEFAULT_TERMINAL,
                        )?);
                    }
                }
            }
        }
        Ok(receivers)
    }

    fn resolve_receiver(
        entry: &ReceiverRef,
        blocks: &HashMap<String, Arc<dyn Block>>,
        output_id: &str,
    ) -> Result<ReceiverData, RouterError> {
        let (receiver_id, input_id) = match entry {
            // a bare id targets the receiver's default input
            ReceiverRef::Id(id) => (id.clone(), DEFAULT_TERMINAL.to_string()),
            ReceiverRef::WithInput { id, input } => (id.clone(), input.clone()),
        };
        let block = blocks
            .get(&receiver_id)
            .ok_or_else(|| RouterError::MissingBlock(receiver_id.clone()))?;
        if !block.is_input_valid(&input_id) {
            return Err(RouterError::InvalidBlockInput {
                block: receiver_id,
                input: input_id,
            });
        }
        Ok(ReceiverData {
            block: block.clone(),
            block_id: receiver_id,
            input_id,
            output_id: output_id.to_string(),
        })
    }

    /// Delivers a batch from `sender_id` on `output_id` to every matching
    /// receiver, synchronously and in binding order.
    ///
    /// Receivers flagged Error are skipped (logged); receivers flagged
    /// Warning still receive. With clone-on-fanout enabled and more than
    /// one binding for this sender, each receiver gets its own deep copy;
    /// a failed copy falls back to the original batch rather than
    /// dropping the delivery. Receiver failures propagate to the caller
    /// unwrapped and abort the remaining deliveries of this call.
    pub fn notify_signals(
        &self,
        sender_id: &str,
        signals: &[Signal],
        output_id: &str,
    ) -> Result<(), RouterError> {
        if self.status.is_set(RunnerStatus::Started) {
            if signals.is_empty() {
                // silently discard empty batches
                return Ok(());
            }
            let table = self.table.get().ok_or(RouterError::NotConfigured)?;
            if table.settings.check_signal_type {
                // fail-fast over the whole batch before any delivery
                if let Some(bad) = signals.iter().find(|signal| !signal.is_record()) {
                    return Err(RouterError::InvalidSignal(bad.value().to_string()));
                }
            }
            let bindings = table
                .receivers
                .get(sender_id)
                .ok_or_else(|| RouterError::MissingBlock(sender_id.to_string()))?;
            // clone only when this sender fans out at all, not merely on
            // the notified output
            let clone_batches = table.settings.clone_signals && bindings.len() > 1;
            for binding in bindings {
                if binding.output_id != output_id {
                    continue;
                }
                let receiver = &binding.block;
                if receiver.status().is_set(RunnerStatus::Error) {
                    log::debug!(
                        "block '{}' has status 'error', not delivering signals from '{}'",
                        binding.block_id,
                        sender_id
                    );
                    continue;
                }
                if receiver.status().is_set(RunnerStatus::Warning) {
                    log::warn!(
                        "block '{}' has status 'warning', delivering signals from '{}' anyway",
                        binding.block_id,
                        sender_id
                    );
                }
                if clone_batches {
                    match clone_batch(signals) {
                        Ok(cloned) => receiver.process_signals(&cloned, &binding.input_id)?,
                        Err(e) => {
                            log::info!(
                                "clone failed while delivering signals from '{sender_id}': \
                                 {e}; delivering the original batch"
                            );
                            receiver.process_signals(signals, &binding.input_id)?;
                        }
                    }
                } else {
                    receiver.process_signals(signals, &binding.input_id)?;
                }
            }
            Ok(())
        } else if self.status.is_set(RunnerStatus::Stopped) {
            log::info!("block router is stopped, discarding signals from '{sender_id}'");
            Ok(())
        } else if self.status.is_set(RunnerStatus::Stopping) {
            log::debug!("block router is stopping, discarding signals from '{sender_id}'");
            Ok(())
        } else {
            log::warn!("block router is not started, rejecting signals from '{sender_id}'");
            Err(RouterError::NotStarted)
        }
    }

    /// The binding lists as (receiver id, input id, output id) tuples,
    /// keyed by sender. Primarily for inspection and tests.
    pub fn bindings(&self) -> IndexMap<String, Vec<(String, String, String)>> {
        match self.table.get() {
            Some(table) => table
                .receivers
                .iter()
                .map(|(sender, bindings)| {
                    (
                        sender.clone(),
                        bindings
                            .iter()
                            .map(|b| {
                                (b.block_id.clone(), b.input_id.clone(), b.output_id.clone())
                            })
                            .collect(),
                    )
                })
                .collect(),
            None => IndexMap::new(),
        }
    }
}

impl Default for BlockRouter {
    fn default() -> Self {
        BlockRouter::new()
    }
}
