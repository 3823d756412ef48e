//! The data the router is configured with.

use crate::block::Block;
use crate::service::BlockExecution;
use std::collections::HashMap;
use std::sync::Arc;

/// Build-time settings captured into the routing table.
#[derive(Clone, Copy, Debug)]
pub struct RouterSettings {
    /// Deep-copy batches per receiver when a sender fans out to more than
    /// one binding.
    pub clone_signals: bool,
    /// Verify every delivered item satisfies the signal contract before
    /// any delivery.
    pub check_signal_type: bool,
}

impl Default for RouterSettings {
    fn default() -> Self {
        RouterSettings {
            clone_signals: false,
            check_signal_type: true,
        }
    }
}

/// Everything `BlockRouter::configure` needs: the wiring specification,
/// the instantiated blocks keyed by id, and the settings.
#[derive(Clone)]
pub struct RouterContext {
    pub execution: Vec<BlockExecution>,
    pub blocks: HashMap<String, Arc<dyn Block>>,
    pub settings: RouterSettings,
}

impl RouterContext {
    pub fn new(execution: Vec<BlockExecution>, blocks: HashMap<String, Arc<dyn Block>>) -> Self {
        RouterContext {
            execution,
            blocks,
            settings: RouterSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: RouterSettings) -> Self {
        self.settings = settings;
        self
    }
}
