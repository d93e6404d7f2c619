//! Toast channels
//!
//! A toast is a short, in-session notice. The dedupe key makes `notify`
//! idempotent: a key the channel still remembers is not shown again.
//!
//! [`LogToast`] runs for the life of the process, so it only remembers the
//! most recent [`TOAST_MEMORY`] keys. Keys carry the reading timestamp and
//! the ledger never re-raises a processed reading, so an evicted key does
//! not come back in practice.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::{lock, ToastChannel};

/// Toast importance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for ToastLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ToastLevel::Info => "info",
            ToastLevel::Warning => "warning",
            ToastLevel::Error => "error",
        })
    }
}

/// One shown toast
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Toast {
    pub message: String,
    pub level: ToastLevel,
    pub dedupe_key: String,
}

/// Dedupe keys a [`LogToast`] remembers
pub const TOAST_MEMORY: usize = 1024;

/// Writes toasts to the log
#[derive(Debug)]
pub struct LogToast {
    shown: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl LogToast {
    /// Channel remembering the last [`TOAST_MEMORY`] keys
    pub fn new() -> Self {
        Self::with_capacity(TOAST_MEMORY)
    }

    /// Channel remembering the last `capacity` keys
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            shown: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Record `key`; false if it is already remembered
    fn remember(&mut self, key: &str) -> bool {
        if !self.shown.insert(key.to_string()) {
            return false;
        }
        self.order.push_back(key.to_string());

        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.shown.remove(&oldest);
            }
        }
        true
    }
}

impl Default for LogToast {
    fn default() -> Self {
        Self::new()
    }
}

impl ToastChannel for LogToast {
    fn notify(&mut self, message: &str, level: ToastLevel, dedupe_key: &str) {
        if !self.remember(dedupe_key) {
            return;
        }

        match level {
            ToastLevel::Info => log::info!("[toast] {}", message),
            ToastLevel::Warning => log::warn!("[toast] {}", message),
            ToastLevel::Error => log::error!("[toast] {}", message),
        }
    }
}

/// Records toasts in memory; clones share the record
#[derive(Debug, Clone, Default)]
pub struct MemoryToast {
    shown: Arc<Mutex<Vec<Toast>>>,
}

impl MemoryToast {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every toast shown so far, oldest first
    pub fn toasts(&self) -> Vec<Toast> {
        lock(&self.shown).clone()
    }

    /// Messages of every toast shown so far
    pub fn messages(&self) -> Vec<String> {
        lock(&self.shown).iter().map(|t| t.message.clone()).collect()
    }
}

impl ToastChannel for MemoryToast {
    fn notify(&mut self, message: &str, level: ToastLevel, dedupe_key: &str) {
        let mut shown = lock(&self.shown);
        if shown.iter().any(|t| t.dedupe_key == dedupe_key) {
            return;
        }

        shown.push(Toast {
            message: message.to_string(),
            level,
            dedupe_key: dedupe_key.to_string(),
        });
    }
}
