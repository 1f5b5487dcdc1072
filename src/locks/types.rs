//! Lock Record Types
//!
//! Plain serializable records exchanged with the session layer: held locks,
//! batch requests, structured results, and lock-owning transactions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

/// Lock kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockKind {
    /// Single writer
    Exclusive,
    /// Many readers / co-editors
    Shared,
    /// Shared until promoted to Exclusive
    Upgradeable,
}

impl LockKind {
    /// True for the kinds that coexist with other shared holders
    pub fn is_shared(&self) -> bool {
        matches!(self, LockKind::Shared | LockKind::Upgradeable)
    }
}

/// Lifecycle status of a lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockStatus {
    /// Currently held
    Granted,
    /// Waiting in the queue
    Pending,
    /// Refused
    Denied,
    /// Passed its TTL
    Expired,
    /// Explicitly released
    Released,
}

/// A lock on one object of one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lock {
    /// Unique lock id
    pub id: Uuid,
    /// Object the lock covers
    pub object_id: String,
    /// Actor holding the lock
    pub holder: String,
    /// Exclusion level
    pub kind: LockKind,
    /// Lifecycle status
    pub status: LockStatus,
    /// When the lock was granted
    pub acquired_at: DateTime<Utc>,
    /// When the lock expires unless extended
    pub expires_at: DateTime<Utc>,
    /// Transaction owning this lock, if any
    pub transaction_id: Option<Uuid>,
    /// Free-form metadata
    pub metadata: BTreeMap<String, String>,
}

impl Lock {
    /// Create a freshly granted lock
    pub fn granted(
        object_id: &str,
        holder: &str,
        kind: LockKind,
        ttl: Duration,
        transaction_id: Option<Uuid>,
    ) -> Self {
        let now = Utc::now();
        // Cap absurd TTLs so the expiry arithmetic cannot overflow
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(36_500));
        Self {
            id: Uuid::new_v4(),
            object_id: object_id.to_string(),
            holder: holder.to_string(),
            kind,
            status: LockStatus::Granted,
            acquired_at: now,
            expires_at: now + ttl,
            transaction_id,
            metadata: BTreeMap::new(),
        }
    }

    /// True once the TTL has passed
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Granted and not yet past its TTL
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == LockStatus::Granted && !self.is_expired(now)
    }

    /// Coexistence predicate: two locks on the same object are compatible
    /// iff either is inactive, both are held by the same actor, or both
    /// are shared-compatible kinds. An Exclusive lock conflicts with
    /// anything held by a different actor.
    pub fn compatible_with(&self, other_holder: &str, other_kind: LockKind, now: DateTime<Utc>) -> bool {
        if !self.is_active(now) {
            return true;
        }
        if self.holder == other_holder {
            return true;
        }
        self.kind.is_shared() && other_kind.is_shared()
    }
}

/// A batch lock request: all named objects are granted together or not at all
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockRequest {
    /// Unique request id
    pub id: Uuid,
    /// Requesting actor
    pub actor_id: String,
    /// Objects to lock, granted atomically
    pub object_ids: Vec<String>,
    /// Exclusion level for every object in the batch
    pub kind: LockKind,
    /// How long granted locks live without an extension
    pub ttl: Duration,
    /// How long to wait in the queue; zero fails immediately on conflict
    pub wait_timeout: Duration,
    /// Queue priority (higher first)
    pub priority: u32,
    /// Transaction to attach grants to
    pub transaction_id: Option<Uuid>,
    /// When the request was authored
    pub requested_at: DateTime<Utc>,
}

impl LockRequest {
    /// New request with the manager's default TTL and no waiting
    pub fn new(actor_id: &str, object_ids: Vec<String>, kind: LockKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor_id: actor_id.to_string(),
            object_ids,
            kind,
            ttl: Duration::from_secs(300),
            wait_timeout: Duration::ZERO,
            priority: 0,
            transaction_id: None,
            requested_at: Utc::now(),
        }
    }

    /// New exclusive request
    pub fn exclusive(actor_id: &str, object_ids: Vec<String>) -> Self {
        Self::new(actor_id, object_ids, LockKind::Exclusive)
    }

    /// New shared request
    pub fn shared(actor_id: &str, object_ids: Vec<String>) -> Self {
        Self::new(actor_id, object_ids, LockKind::Shared)
    }

    /// New upgradeable request
    pub fn upgradeable(actor_id: &str, object_ids: Vec<String>) -> Self {
        Self::new(actor_id, object_ids, LockKind::Upgradeable)
    }

    /// Set the lock TTL
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the queue wait timeout
    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.wait_timeout = wait_timeout;
        self
    }

    /// Set the queue priority
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Attach grants to a transaction
    pub fn with_transaction(mut self, transaction_id: Uuid) -> Self {
        self.transaction_id = Some(transaction_id);
        self
    }
}

/// Structured result of an acquire call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockResult {
    /// Objects that were granted (all of the batch, or none)
    pub acquired: Vec<String>,
    /// Objects that could not be granted
    pub failed: Vec<String>,
    /// True while the request sits in the queue (never set on a terminal result)
    pub pending: bool,
    /// The granted locks
    pub locks: Vec<Lock>,
    /// True iff the whole batch was granted
    pub success: bool,
    /// Per-object conflicting holder for failed objects
    pub conflicts: BTreeMap<String, String>,
    /// Free-form detail, including `reason` = `conflict` | `timeout`
    pub meta: BTreeMap<String, String>,
}

impl LockResult {
    /// The whole batch was granted
    pub fn granted(locks: Vec<Lock>) -> Self {
        Self {
            acquired: locks.iter().map(|lock| lock.object_id.clone()).collect(),
            failed: Vec::new(),
            pending: false,
            success: true,
            locks,
            conflicts: BTreeMap::new(),
            meta: BTreeMap::new(),
        }
    }

    /// Immediate conflict with `wait_timeout == 0`
    pub fn conflict(failed: Vec<String>, conflicts: BTreeMap<String, String>) -> Self {
        let mut meta = BTreeMap::new();
        meta.insert("reason".to_string(), "conflict".to_string());
        Self {
            acquired: Vec::new(),
            failed,
            pending: false,
            locks: Vec::new(),
            success: false,
            conflicts,
            meta,
        }
    }

    /// Queued batch unsatisfied within its wait timeout
    pub fn timeout(failed: Vec<String>) -> Self {
        let mut meta = BTreeMap::new();
        meta.insert("reason".to_string(), "timeout".to_string());
        Self {
            acquired: Vec::new(),
            failed,
            pending: false,
            locks: Vec::new(),
            success: false,
            conflicts: BTreeMap::new(),
            meta,
        }
    }
}

/// A group of grants that commit or roll back together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction id
    pub id: Uuid,
    /// Actor that opened the transaction
    pub actor_id: String,
    /// Locks owned by the transaction
    pub lock_ids: Vec<Uuid>,
    /// When the transaction was opened
    pub started_at: DateTime<Utc>,
    /// Set by commit
    pub committed: bool,
    /// Set by rollback
    pub rolled_back: bool,
}

/// Read-only counters for dashboards
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockStatistics {
    /// Granted, unexpired locks across all documents
    pub active_locks: usize,
    /// Requests waiting in queues
    pub queued_requests: usize,
    /// Open transactions
    pub active_transactions: usize,
    /// Documents with any lock state
    pub documents: usize,
}
