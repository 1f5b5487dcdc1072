//! # Collaborative Lock Manager
//!
//! Pessimistic per-object exclusion for shared documents. Each document has
//! a lock table, a pending-request queue and a transaction map; all three
//! live behind one coarse `tokio::sync::Mutex` so compound decisions, in
//! particular "grant the whole batch or none of it", are evaluated
//! atomically. Waiters never hold that exclusion: a queued request parks on
//! a oneshot completion outside the critical section and is woken when a
//! release or sweep frees the objects it overlaps with.
//!
//! Three supervised background loops run for the manager's lifetime:
//!
//! - **Expiry sweep** (seconds-scale): force-releases locks past their TTL
//! - **Queue reprocessing** (seconds-scale): re-evaluates pending requests
//! - **Deadlock detection** (longer cadence): breaks wait-for cycles
//!
//! All three re-acquire the same exclusion briefly per iteration and shut
//! down cleanly via a watch signal joined in [`LockManager::shutdown`].

use crate::locks::deadlock::{find_cycle, pick_victim, WaitForGraph};
use crate::locks::mirror::{mirror_key, LockMirror, NoopMirror};
use crate::locks::types::{
    Lock, LockKind, LockRequest, LockResult, LockStatistics, LockStatus, Transaction,
};
use crate::shared::config::LockConfig;
use crate::shared::error::CollabError;
use crate::shared::event::CollabEvent;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{broadcast, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A queued batch request waiting for its objects to free up
struct PendingRequest {
    request: LockRequest,
    tx: Option<oneshot::Sender<LockResult>>,
}

/// Per-document lock state
#[derive(Default)]
struct DocTable {
    /// Object id -> locks on that object
    locks: HashMap<String, Vec<Lock>>,
    /// Requests waiting for a grant, evaluated by (priority desc, arrival asc)
    queue: Vec<PendingRequest>,
    /// Open transactions
    transactions: HashMap<Uuid, Transaction>,
}

#[derive(Default)]
struct LockState {
    docs: HashMap<String, DocTable>,
}

/// The lock manager. Cheap to clone; every clone shares the same state.
#[derive(Clone)]
pub struct LockManager {
    state: Arc<Mutex<LockState>>,
    config: LockConfig,
    mirror: Arc<dyn LockMirror>,
    events: broadcast::Sender<CollabEvent>,
    shutdown: Arc<watch::Sender<bool>>,
    tasks: Arc<StdMutex<Vec<JoinHandle<()>>>>,
}

impl LockManager {
    /// Create a manager with no cross-process mirror.
    ///
    /// Must be called inside a tokio runtime; the maintenance loops are
    /// spawned immediately.
    pub fn new(config: LockConfig) -> Self {
        Self::with_mirror(config, Arc::new(NoopMirror))
    }

    /// Create a manager that publishes advisory lock entries to `mirror`
    pub fn with_mirror(config: LockConfig, mirror: Arc<dyn LockMirror>) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity);
        let (shutdown, _) = watch::channel(false);
        let manager = Self {
            state: Arc::new(Mutex::new(LockState::default())),
            config,
            mirror,
            events,
            shutdown: Arc::new(shutdown),
            tasks: Arc::new(StdMutex::new(Vec::new())),
        };
        manager.spawn_maintenance();
        manager
    }

    /// Subscribe to asynchronous notifications (grants from the queue,
    /// expirations, deadlock resolutions)
    pub fn subscribe(&self) -> broadcast::Receiver<CollabEvent> {
        self.events.subscribe()
    }

    /// Acquire locks on every object the request names, atomically.
    ///
    /// Returns `Err` only for malformed requests; conflicts and queue
    /// timeouts are ordinary `Ok` results with `success == false`.
    pub async fn acquire(
        &self,
        document: &str,
        request: LockRequest,
    ) -> Result<LockResult, CollabError> {
        let mut request = request;
        if request.actor_id.is_empty() {
            return Err(CollabError::validation("actor_id", "actor id cannot be empty"));
        }
        if request.object_ids.is_empty() {
            return Err(CollabError::validation("object_ids", "object list cannot be empty"));
        }
        if request.ttl.is_zero() {
            request.ttl = self.config.default_ttl();
        }
        let mut seen = BTreeSet::new();
        request.object_ids.retain(|object| seen.insert(object.clone()));

        let rx = {
            let mut state = self.state.lock().await;
            let table = state.docs.entry(document.to_string()).or_default();
            if let Some(transaction_id) = request.transaction_id {
                if !table.transactions.contains_key(&transaction_id) {
                    return Err(CollabError::validation(
                        "transaction_id",
                        format!("unknown transaction {}", transaction_id),
                    ));
                }
            }

            let now = Utc::now();
            let conflicts = conflicts_for(table, &request, now);
            if conflicts.is_empty() {
                let result = self.grant_batch(table, document, &request, now);
                debug!(document, actor = %request.actor_id, objects = ?result.acquired, "batch granted");
                return Ok(result);
            }
            if request.wait_timeout.is_zero() {
                debug!(document, actor = %request.actor_id, ?conflicts, "batch refused");
                return Ok(LockResult::conflict(conflicts.keys().cloned().collect(), conflicts));
            }

            let (tx, rx) = oneshot::channel();
            debug!(document, actor = %request.actor_id, request_id = %request.id, "batch queued");
            table.queue.push(PendingRequest {
                request: request.clone(),
                tx: Some(tx),
            });
            rx
        };

        match tokio::time::timeout(request.wait_timeout, rx).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) => Err(CollabError::internal("pending lock request dropped")),
            Err(_) => {
                let mut state = self.state.lock().await;
                if let Some(table) = state.docs.get_mut(document) {
                    let before = table.queue.len();
                    table.queue.retain(|pending| pending.request.id != request.id);
                    if table.queue.len() == before {
                        // The entry is already gone: a grant raced this
                        // timeout and its oneshot send won before the
                        // receiver was dropped. The timeout is what the
                        // caller sees, so the grant must not stand.
                        let raced = release_request_locks(
                            table,
                            request.id,
                            self.mirror.as_ref(),
                            document,
                        );
                        if !raced.is_empty() {
                            debug!(
                                document,
                                actor = %request.actor_id,
                                objects = ?raced,
                                "raced grant rolled back after timeout"
                            );
                            self.process_queue(table, document);
                        }
                    }
                }
                info!(document, actor = %request.actor_id, request_id = %request.id, "lock wait timed out");
                Ok(LockResult::timeout(request.object_ids.clone()))
            }
        }
    }

    /// Release the caller's locks on the named objects. Returns the object
    /// ids that were actually released.
    pub async fn release(&self, document: &str, actor_id: &str, object_ids: &[String]) -> Vec<String> {
        let mut state = self.state.lock().await;
        let Some(table) = state.docs.get_mut(document) else {
            return Vec::new();
        };
        let released = release_objects(table, actor_id, object_ids, self.mirror.as_ref(), document);
        if !released.is_empty() {
            debug!(document, actor = actor_id, objects = ?released, "locks released");
            self.process_queue(table, document);
        }
        released
    }

    /// Release every lock the actor holds in the document
    pub async fn release_all(&self, document: &str, actor_id: &str) -> Vec<String> {
        let objects: Vec<String> = {
            let state = self.state.lock().await;
            match state.docs.get(document) {
                Some(table) => table
                    .locks
                    .iter()
                    .filter(|(_, locks)| locks.iter().any(|lock| lock.holder == actor_id))
                    .map(|(object, _)| object.clone())
                    .collect(),
                None => Vec::new(),
            }
        };
        self.release(document, actor_id, &objects).await
    }

    /// Promote the actor's Upgradeable lock on `object_id` to Exclusive.
    /// Fails (returns false) while any other actor holds the object.
    pub async fn upgrade(&self, document: &str, actor_id: &str, object_id: &str) -> bool {
        let mut state = self.state.lock().await;
        let Some(table) = state.docs.get_mut(document) else {
            return false;
        };
        let now = Utc::now();
        let Some(locks) = table.locks.get_mut(object_id) else {
            return false;
        };
        let blocked = locks
            .iter()
            .any(|lock| lock.is_active(now) && lock.holder != actor_id);
        if blocked {
            return false;
        }
        for lock in locks.iter_mut() {
            if lock.holder == actor_id
                && lock.kind == LockKind::Upgradeable
                && lock.is_active(now)
            {
                lock.kind = LockKind::Exclusive;
                info!(document, actor = actor_id, object = object_id, "lock upgraded");
                return true;
            }
        }
        false
    }

    /// Push the expiry of the actor's lock on `object_id` further out
    pub async fn extend(&self, document: &str, actor_id: &str, object_id: &str, extra: Duration) -> bool {
        let mut state = self.state.lock().await;
        let Some(table) = state.docs.get_mut(document) else {
            return false;
        };
        let now = Utc::now();
        let Some(locks) = table.locks.get_mut(object_id) else {
            return false;
        };
        for lock in locks.iter_mut() {
            if lock.holder == actor_id && lock.is_active(now) {
                lock.expires_at += chrono::Duration::from_std(extra)
                    .unwrap_or_else(|_| chrono::Duration::days(36_500));
                let remaining = (lock.expires_at - now).to_std().unwrap_or(Duration::ZERO);
                self.mirror
                    .set(&mirror_key(document, object_id), actor_id, remaining);
                return true;
            }
        }
        false
    }

    /// Open a transaction that future grants can attach to
    pub async fn begin_transaction(&self, document: &str, actor_id: &str) -> Uuid {
        let mut state = self.state.lock().await;
        let table = state.docs.entry(document.to_string()).or_default();
        let transaction = Transaction {
            id: Uuid::new_v4(),
            actor_id: actor_id.to_string(),
            lock_ids: Vec::new(),
            started_at: Utc::now(),
            committed: false,
            rolled_back: false,
        };
        let id = transaction.id;
        table.transactions.insert(id, transaction);
        debug!(document, actor = actor_id, transaction = %id, "transaction opened");
        id
    }

    /// Commit: the transaction's locks stay held but become independent
    pub async fn commit_transaction(&self, document: &str, transaction_id: Uuid) -> bool {
        let mut state = self.state.lock().await;
        let Some(table) = state.docs.get_mut(document) else {
            return false;
        };
        if table.transactions.remove(&transaction_id).is_none() {
            return false;
        }
        for locks in table.locks.values_mut() {
            for lock in locks.iter_mut() {
                if lock.transaction_id == Some(transaction_id) {
                    lock.transaction_id = None;
                }
            }
        }
        info!(document, transaction = %transaction_id, "transaction committed");
        true
    }

    /// Roll back: every lock the transaction owns is released
    pub async fn rollback_transaction(&self, document: &str, transaction_id: Uuid) -> Vec<String> {
        let mut state = self.state.lock().await;
        let Some(table) = state.docs.get_mut(document) else {
            return Vec::new();
        };
        if table.transactions.remove(&transaction_id).is_none() {
            return Vec::new();
        }
        let mut released = Vec::new();
        for (object, locks) in table.locks.iter_mut() {
            let before = locks.len();
            locks.retain(|lock| lock.transaction_id != Some(transaction_id));
            if locks.len() < before {
                released.push(object.clone());
                self.mirror.delete(&mirror_key(document, object));
            }
        }
        table.locks.retain(|_, locks| !locks.is_empty());
        released.sort();
        if !released.is_empty() {
            info!(document, transaction = %transaction_id, objects = ?released, "transaction rolled back");
            self.process_queue(table, document);
        }
        released
    }

    /// The first active lock on an object, if any
    pub async fn get_lock_status(&self, document: &str, object_id: &str) -> Option<Lock> {
        let state = self.state.lock().await;
        let now = Utc::now();
        state
            .docs
            .get(document)?
            .locks
            .get(object_id)?
            .iter()
            .find(|lock| lock.is_active(now))
            .cloned()
    }

    /// Read-only counters for dashboards
    pub async fn get_statistics(&self) -> LockStatistics {
        let state = self.state.lock().await;
        let now = Utc::now();
        let mut stats = LockStatistics {
            documents: state.docs.len(),
            ..LockStatistics::default()
        };
        for table in state.docs.values() {
            stats.active_locks += table
                .locks
                .values()
                .flatten()
                .filter(|lock| lock.is_active(now))
                .count();
            stats.queued_requests += table.queue.len();
            stats.active_transactions += table.transactions.len();
        }
        stats
    }

    /// Stop the maintenance loops and wait for them to finish
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        let handles: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock().expect("task list poisoned");
            tasks.drain(..).collect()
        };
        for handle in handles {
            let _ = handle.await;
        }
    }

    // ---- internals -------------------------------------------------------

    fn spawn_maintenance(&self) {
        let mut tasks = self.tasks.lock().expect("task list poisoned");
        tasks.push(tokio::spawn(Self::sweep_loop(self.clone())));
        tasks.push(tokio::spawn(Self::queue_loop(self.clone())));
        tasks.push(tokio::spawn(Self::deadlock_loop(self.clone())));
    }

    async fn sweep_loop(manager: LockManager) {
        let mut shutdown = manager.shutdown.subscribe();
        let mut ticker = tokio::time::interval(manager.config.expiry_sweep_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => manager.sweep_expired().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    async fn queue_loop(manager: LockManager) {
        let mut shutdown = manager.shutdown.subscribe();
        let mut ticker = tokio::time::interval(manager.config.queue_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => manager.reprocess_queues().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    async fn deadlock_loop(manager: LockManager) {
        let mut shutdown = manager.shutdown.subscribe();
        let mut ticker = tokio::time::interval(manager.config.deadlock_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => manager.detect_deadlocks().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    /// Force-release every lock past its TTL and wake overlapping waiters
    pub async fn sweep_expired(&self) {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let documents: Vec<String> = state.docs.keys().cloned().collect();
        for document in documents {
            let table = state.docs.get_mut(&document).expect("document table vanished");
            let mut expired: Vec<(String, String)> = Vec::new();
            for (object, locks) in table.locks.iter_mut() {
                for lock in locks.iter_mut() {
                    if lock.status == LockStatus::Granted && lock.is_expired(now) {
                        lock.status = LockStatus::Expired;
                        expired.push((object.clone(), lock.holder.clone()));
                    }
                }
            }
            if expired.is_empty() {
                continue;
            }
            for locks in table.locks.values_mut() {
                locks.retain(|lock| lock.status != LockStatus::Expired);
            }
            table.locks.retain(|_, locks| !locks.is_empty());
            for (object, holder) in &expired {
                self.mirror.delete(&mirror_key(&document, object));
                info!(document = %document, object = %object, holder = %holder, "lock expired");
                let _ = self
                    .events
                    .send(CollabEvent::lock_expired(&document, object, holder));
            }
            self.process_queue(table, &document);
        }
    }

    /// Re-evaluate every pending queue; also drops entries whose waiter
    /// has already given up
    async fn reprocess_queues(&self) {
        let mut state = self.state.lock().await;
        let documents: Vec<String> = state.docs.keys().cloned().collect();
        for document in documents {
            let table = state.docs.get_mut(&document).expect("document table vanished");
            table.queue.retain(|pending| {
                pending
                    .tx
                    .as_ref()
                    .map(|tx| !tx.is_closed())
                    .unwrap_or(false)
            });
            self.process_queue(table, &document);
        }
    }

    /// Build the wait-for graph per document, break one cycle at a time
    pub async fn detect_deadlocks(&self) {
        let mut state = self.state.lock().await;
        let documents: Vec<String> = state.docs.keys().cloned().collect();
        for document in documents {
            loop {
                let table = state.docs.get_mut(&document).expect("document table vanished");
                let now = Utc::now();
                let graph = build_wait_graph(table, now);
                let Some(cycle) = find_cycle(&graph) else {
                    break;
                };

                let mut priorities: BTreeMap<String, u32> = BTreeMap::new();
                for pending in &table.queue {
                    let entry = priorities.entry(pending.request.actor_id.clone()).or_insert(0);
                    *entry = (*entry).max(pending.request.priority);
                }
                let victim = pick_victim(&cycle, &priorities);

                // Objects the cycle is waiting on, exclusively held by the
                // victim: releasing those is enough to break the cycle.
                let waited: BTreeSet<String> = table
                    .queue
                    .iter()
                    .filter(|pending| cycle.contains(&pending.request.actor_id))
                    .flat_map(|pending| pending.request.object_ids.iter().cloned())
                    .collect();
                let mut released = Vec::new();
                for object in waited {
                    if let Some(locks) = table.locks.get_mut(&object) {
                        let before = locks.len();
                        locks.retain(|lock| {
                            !(lock.holder == victim
                                && lock.kind == LockKind::Exclusive
                                && lock.is_active(now))
                        });
                        if locks.len() < before {
                            self.mirror.delete(&mirror_key(&document, &object));
                            released.push(object);
                        }
                    }
                }
                table.locks.retain(|_, locks| !locks.is_empty());
                if released.is_empty() {
                    break;
                }

                warn!(
                    document = %document,
                    victim = %victim,
                    cycle = ?cycle,
                    objects = ?released,
                    "deadlock cycle broken"
                );
                let _ = self.events.send(CollabEvent::deadlock_resolved(
                    &document,
                    &victim,
                    released,
                    cycle,
                ));
                self.process_queue(table, &document);
            }
        }
    }

    /// Grant every object of the batch. Caller has verified there are no
    /// conflicts; runs inside the state mutex.
    fn grant_batch(
        &self,
        table: &mut DocTable,
        document: &str,
        request: &LockRequest,
        _now: DateTime<Utc>,
    ) -> LockResult {
        let mut locks = Vec::with_capacity(request.object_ids.len());
        for object in &request.object_ids {
            let mut lock = Lock::granted(
                object,
                &request.actor_id,
                request.kind,
                request.ttl,
                request.transaction_id,
            );
            // Tag the grant with its request so a waiter whose timeout
            // raced the grant can take the locks back
            lock.metadata
                .insert("request_id".to_string(), request.id.to_string());
            self.mirror
                .set(&mirror_key(document, object), &request.actor_id, request.ttl);
            if let Some(transaction_id) = request.transaction_id {
                if let Some(transaction) = table.transactions.get_mut(&transaction_id) {
                    transaction.lock_ids.push(lock.id);
                }
            }
            table.locks.entry(object.clone()).or_default().push(lock.clone());
            locks.push(lock);
        }
        LockResult::granted(locks)
    }

    /// Walk the queue in (priority desc, arrival asc) order and grant every
    /// request that has become satisfiable
    fn process_queue(&self, table: &mut DocTable, document: &str) {
        table.queue.sort_by(|a, b| {
            b.request
                .priority
                .cmp(&a.request.priority)
                .then(a.request.requested_at.cmp(&b.request.requested_at))
        });
        let mut index = 0;
        while index < table.queue.len() {
            let now = Utc::now();
            if !conflicts_for(table, &table.queue[index].request, now).is_empty() {
                index += 1;
                continue;
            }
            let mut pending = table.queue.remove(index);
            let result = self.grant_batch(table, document, &pending.request, now);
            let lock_ids: Vec<Uuid> = result.locks.iter().map(|lock| lock.id).collect();
            let object_ids = result.acquired.clone();
            let actor_id = pending.request.actor_id.clone();
            let delivered = match pending.tx.take() {
                Some(tx) => tx.send(result).is_ok(),
                None => false,
            };
            if delivered {
                debug!(document, actor = %actor_id, objects = ?object_ids, "queued batch granted");
                let _ = self
                    .events
                    .send(CollabEvent::lock_granted(document, &actor_id, object_ids));
            } else {
                // Waiter timed out between the grant and delivery; undo it
                for object in &object_ids {
                    if let Some(locks) = table.locks.get_mut(object) {
                        locks.retain(|lock| !lock_ids.contains(&lock.id));
                    }
                    self.mirror.delete(&mirror_key(document, object));
                }
                table.locks.retain(|_, locks| !locks.is_empty());
                debug!(document, actor = %actor_id, "grant rolled back, waiter gone");
            }
        }
    }
}

/// Per-object conflicting holder for every object the request cannot have
fn conflicts_for(
    table: &DocTable,
    request: &LockRequest,
    now: DateTime<Utc>,
) -> BTreeMap<String, String> {
    let mut conflicts = BTreeMap::new();
    for object in &request.object_ids {
        if let Some(locks) = table.locks.get(object) {
            for lock in locks {
                if !lock.compatible_with(&request.actor_id, request.kind, now) {
                    conflicts.insert(object.clone(), lock.holder.clone());
                    break;
                }
            }
        }
    }
    conflicts
}

/// Actor-level wait-for graph: `A -> B` while one of A's queued requests
/// names an object B holds Exclusively
fn build_wait_graph(table: &DocTable, now: DateTime<Utc>) -> WaitForGraph {
    let mut graph = WaitForGraph::new();
    for pending in &table.queue {
        for object in &pending.request.object_ids {
            let Some(locks) = table.locks.get(object) else {
                continue;
            };
            for lock in locks {
                if lock.kind == LockKind::Exclusive
                    && lock.is_active(now)
                    && lock.holder != pending.request.actor_id
                {
                    graph
                        .entry(pending.request.actor_id.clone())
                        .or_default()
                        .insert(lock.holder.clone());
                }
            }
        }
    }
    graph
}

/// Release every lock carrying the given request tag, returning what was
/// freed. Used when a queued grant raced the waiter's timeout.
fn release_request_locks(
    table: &mut DocTable,
    request_id: Uuid,
    mirror: &dyn LockMirror,
    document: &str,
) -> Vec<String> {
    let tag = request_id.to_string();
    let mut released = Vec::new();
    for (object, locks) in table.locks.iter_mut() {
        let before = locks.len();
        locks.retain(|lock| lock.metadata.get("request_id") != Some(&tag));
        if locks.len() < before {
            released.push(object.clone());
            mirror.delete(&mirror_key(document, object));
        }
    }
    table.locks.retain(|_, locks| !locks.is_empty());
    released.sort();
    released
}

/// Release the actor's locks on the named objects, returning what was freed
fn release_objects(
    table: &mut DocTable,
    actor_id: &str,
    object_ids: &[String],
    mirror: &dyn LockMirror,
    document: &str,
) -> Vec<String> {
    let mut released = Vec::new();
    for object in object_ids {
        if let Some(locks) = table.locks.get_mut(object) {
            let before = locks.len();
            locks.retain(|lock| lock.holder != actor_id);
            if locks.len() < before {
                released.push(object.clone());
                mirror.delete(&mirror_key(document, object));
            }
            if locks.is_empty() {
                table.locks.remove(object);
            }
        }
    }
    released
}
