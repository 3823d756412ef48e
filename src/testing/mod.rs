//! Support types for exercising blocks and services in tests.

use crate::block::{Block, BlockCore, BlockError};
use crate::modules::{Authorizer, Persistence, PersistenceError, Unauthorized};
use crate::signal::Signal;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// One delivery observed by a [`CaptureBlock`].
#[derive(Clone, Debug)]
pub struct Delivery {
    pub signals: Vec<Signal>,
    pub input_id: String,
    /// Address of the delivered slice, for isolation assertions: equal
    /// addresses mean the very same batch object was delivered.
    pub batch_addr: usize,
}

/// A terminal block that records every batch it receives.
#[derive(Default)]
pub struct CaptureBlock {
    core: BlockCore,
    deliveries: Mutex<Vec<Delivery>>,
}

impl CaptureBlock {
    pub fn new() -> Self {
        CaptureBlock::default()
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }

    pub fn delivery_count(&self) -> usize {
        self.deliveries.lock().unwrap().len()
    }

    pub fn clear(&self) {
        self.deliveries.lock().unwrap().clear();
    }
}

impl Block for CaptureBlock {
    fn core(&self) -> &BlockCore {
        &self.core
    }

    fn process_signals(&self, signals: &[Signal], input_id: &str) -> Result<(), BlockError> {
        self.deliveries.lock().unwrap().push(Delivery {
            signals: signals.to_vec(),
            input_id: input_id.to_string(),
            batch_addr: signals.as_ptr() as usize,
        });
        Ok(())
    }
}

/// A block that re-notifies every received batch on its default output.
#[derive(Default)]
pub struct RelayBlock {
    core: BlockCore,
}

impl RelayBlock {
    pub fn new() -> Self {
        RelayBlock::default()
    }
}

impl Block for RelayBlock {
    fn core(&self) -> &BlockCore {
        &self.core
    }

    fn process_signals(&self, signals: &[Signal], _input_id: &str) -> Result<(), BlockError> {
        self.core
            .notify_signals(signals, crate::block::DEFAULT_TERMINAL)?;
        Ok(())
    }
}

/// A block whose processing always fails, for failure-propagation tests.
#[derive(Default)]
pub struct FailingBlock {
    core: BlockCore,
}

impl FailingBlock {
    pub fn new() -> Self {
        FailingBlock::default()
    }
}

impl Block for FailingBlock {
    fn core(&self) -> &BlockCore {
        &self.core
    }

    fn process_signals(&self, _signals: &[Signal], _input_id: &str) -> Result<(), BlockError> {
        Err(BlockError::Processing("failing block always fails".into()))
    }
}

/// In-memory persistence stub.
#[derive(Default)]
pub struct MemoryPersistence {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        MemoryPersistence::default()
    }
}

impl Persistence for MemoryPersistence {
    fn save(&self, key: &str, value: &Value) -> Result<(), PersistenceError> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<Value>, PersistenceError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Authorizer that allows every task.
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn authorize(&self, _user: &str, _task: &str) -> Result<(), Unauthorized> {
        Ok(())
    }
}

/// Authorizer that denies every task.
pub struct DenyAll;

impl Authorizer for DenyAll {
    fn authorize(&self, user: &str, task: &str) -> Result<(), Unauthorized> {
        Err(Unauthorized {
            user: user.to_string(),
            task: task.to_string(),
        })
    }
}
