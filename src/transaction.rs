//! Pending telemetry transactions and the FIFO queue that owns them.
//!
//! A transaction is opened on the router, receives its buffered log lines
//! and is then closed. The queue preserves enqueue order so transactions are
//! always sent one after the other; only the head is ever in flight.

use std::collections::VecDeque;

/// Progress of a transaction through the open/log/close lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    /// The router has not yet acknowledged an open for this transaction.
    #[default]
    NeedsOpen,
    /// The router acknowledged the open; lines and close are due next.
    Opened,
}

/// One unit of telemetry destined for the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    timestamp_micros: u64,
    category: String,
    txn_id: String,
    log_lines: Vec<String>,
    lifecycle: Lifecycle,
}

impl Transaction {
    /// Create a transaction captured at `timestamp_micros`.
    ///
    /// The transaction id stays empty until the router assigns one, unless
    /// [`Transaction::continuing`] supplies it.
    #[must_use]
    pub fn new(timestamp_micros: u64, category: impl Into<String>, log_lines: Vec<String>) -> Self {
        Self {
            timestamp_micros,
            category: category.into(),
            txn_id: String::new(),
            log_lines,
            lifecycle: Lifecycle::NeedsOpen,
        }
    }

    /// Continue an existing router transaction instead of starting a new one.
    #[must_use]
    pub fn continuing(mut self, txn_id: impl Into<String>) -> Self {
        self.txn_id = txn_id.into();
        self
    }

    /// Capture time in microseconds since the Unix epoch.
    #[must_use]
    pub const fn timestamp_micros(&self) -> u64 { self.timestamp_micros }

    /// Category such as `requests` or `exceptions`.
    #[must_use]
    pub fn category(&self) -> &str { &self.category }

    /// Router transaction id, empty until known.
    #[must_use]
    pub fn txn_id(&self) -> &str { &self.txn_id }

    /// Lines sent after the transaction is opened.
    #[must_use]
    pub fn log_lines(&self) -> &[String] { &self.log_lines }

    /// Current lifecycle stage.
    #[must_use]
    pub const fn lifecycle(&self) -> Lifecycle { self.lifecycle }

    /// Record an open acknowledgement.
    ///
    /// A router-assigned id is adopted only when no id was supplied locally.
    pub(crate) fn mark_opened(&mut self, assigned_id: &str) {
        self.lifecycle = Lifecycle::Opened;
        if self.txn_id.is_empty() {
            assigned_id.clone_into(&mut self.txn_id);
        }
    }
}

/// Ordered, unbounded queue of transactions awaiting delivery.
#[derive(Debug, Default)]
pub struct TransactionQueue {
    pending: VecDeque<Transaction>,
}

impl TransactionQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Append `tx` behind every transaction already queued.
    pub fn enqueue(&mut self, tx: Transaction) { self.pending.push_back(tx); }

    /// Oldest queued transaction.
    #[must_use]
    pub fn peek_head(&self) -> Option<&Transaction> { self.pending.front() }

    pub(crate) fn head_mut(&mut self) -> Option<&mut Transaction> { self.pending.front_mut() }

    /// Remove and return the oldest queued transaction.
    pub fn remove_head(&mut self) -> Option<Transaction> { self.pending.pop_front() }

    /// Number of queued transactions.
    #[must_use]
    pub fn len(&self) -> usize { self.pending.len() }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.pending.is_empty() }

    /// Iterate over queued transactions from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Transaction> { self.pending.iter() }
}
