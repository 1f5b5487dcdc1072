//! # Change & Undo Tracker
//!
//! Records accepted edits, tracks which later changes depend on them, and
//! performs dependency-aware cascading undo/redo. The tracker owns the
//! change log, its per-object index, the dependency graph and both stacks;
//! everything lives behind one coarse `tokio::sync::Mutex` so compound
//! decisions (closure computation, cascades) are atomic.
//!
//! The tracker never mutates document state itself. Inverses and redo
//! replays are handed to the [`DocumentStore`] collaborator, and a failed
//! inverse does not abort a cascade: failures are logged, collected and
//! reported once after the whole cascade completes.

use crate::history::inverse::invert;
use crate::history::types::{
    CascadeFailure, ChangeGroup, ChangeRecord, HistoryFilter, TrackerStatistics, UndoOutcome,
};
use crate::shared::config::HistoryConfig;
use crate::shared::document::DocumentStore;
use crate::shared::event::CollabEvent;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

struct TrackerState {
    /// Tracked changes by id
    changes: HashMap<Uuid, ChangeRecord>,
    /// Recording order, oldest first; drives eviction
    order: VecDeque<Uuid>,
    /// Object id -> tracked changes touching it, oldest first
    by_object: HashMap<String, Vec<Uuid>>,
    /// Change id -> later changes depending on it
    dependents: HashMap<Uuid, BTreeSet<Uuid>>,
    undo_stack: Vec<ChangeGroup>,
    redo_stack: Vec<ChangeGroup>,
    open_group: Option<ChangeGroup>,
}

impl TrackerState {
    fn new() -> Self {
        Self {
            changes: HashMap::new(),
            order: VecDeque::new(),
            by_object: HashMap::new(),
            dependents: HashMap::new(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            open_group: None,
        }
    }
}

/// The change tracker. Cheap to clone; clones share the same log.
#[derive(Clone)]
pub struct ChangeTracker {
    inner: Arc<Mutex<TrackerState>>,
    store: Arc<dyn DocumentStore>,
    config: HistoryConfig,
    events: broadcast::Sender<CollabEvent>,
}

impl ChangeTracker {
    /// Create a tracker over the given document collaborator
    pub fn new(store: Arc<dyn DocumentStore>, config: HistoryConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity);
        Self {
            inner: Arc::new(Mutex::new(TrackerState::new())),
            store,
            config,
            events,
        }
    }

    /// Subscribe to asynchronous notifications (aggregated cascade failures)
    pub fn subscribe(&self) -> broadcast::Receiver<CollabEvent> {
        self.events.subscribe()
    }

    /// Open a group; subsequent records join it until `end_group`.
    /// An already-open group is closed first.
    pub async fn start_group(&self, description: &str, actor_id: &str) -> Uuid {
        let mut state = self.inner.lock().await;
        if let Some(open) = state.open_group.take() {
            if !open.changes.is_empty() {
                warn!(group = %open.id, "previous group left open, closing it");
                state.undo_stack.push(open);
            }
        }
        let group = ChangeGroup::new(description, actor_id);
        let id = group.id;
        state.open_group = Some(group);
        id
    }

    /// Close the open group and push it to the undo stack.
    /// Returns `None` when no group is open or the group stayed empty.
    pub async fn end_group(&self) -> Option<Uuid> {
        let mut state = self.inner.lock().await;
        let group = state.open_group.take()?;
        if group.changes.is_empty() {
            return None;
        }
        let id = group.id;
        state.undo_stack.push(group);
        Some(id)
    }

    /// Record an accepted change.
    ///
    /// The after-state snapshot is captured from the document layer when
    /// the caller did not provide one (the document has already applied
    /// the edit at this point). Recording clears the redo stack.
    pub async fn record(&self, mut change: ChangeRecord) -> Uuid {
        let mut state = self.inner.lock().await;
        if change.after_state.is_none() {
            if let Some(target) = &change.operation.target {
                change.after_state = self.store.capture_state(target);
            }
        }
        let id = change.id;
        link_dependencies(&mut state, &mut change);
        insert_into_log(&mut state, change.clone());

        match state.open_group.as_mut() {
            Some(group) => group.changes.push(change),
            None => {
                // Auto-wrap so every recorded change is undoable
                let mut group =
                    ChangeGroup::new(&format!("{:?}", change.operation.kind), &change.actor_id);
                group.changes.push(change);
                state.undo_stack.push(group);
            }
        }

        state.redo_stack.clear();
        evict_overflow(&mut state, self.config.capacity);
        id
    }

    /// Undo the most recent group (optionally the actor's most recent),
    /// cascading over every group that depends on it
    pub async fn undo(&self, actor_id: Option<&str>) -> Option<UndoOutcome> {
        let mut state = self.inner.lock().await;
        let index = pick_group(&state.undo_stack, actor_id)?;
        let outcome = self.undo_at(&mut state, index);
        self.report_failures(&outcome);
        Some(outcome)
    }

    /// Undo the group containing a specific change, wherever it sits on
    /// the undo stack
    pub async fn undo_specific(&self, change_id: Uuid) -> bool {
        let mut state = self.inner.lock().await;
        let Some(index) = state
            .undo_stack
            .iter()
            .position(|group| group.changes.iter().any(|change| change.id == change_id))
        else {
            return false;
        };
        let outcome = self.undo_at(&mut state, index);
        self.report_failures(&outcome);
        true
    }

    /// Reapply the most recently undone group (optionally the actor's)
    pub async fn redo(&self, actor_id: Option<&str>) -> Option<UndoOutcome> {
        let mut state = self.inner.lock().await;
        let index = pick_group(&state.redo_stack, actor_id)?;
        let group = state.redo_stack.remove(index);

        let mut failures = Vec::new();
        for change in &group.changes {
            if let Some(target) = &change.operation.target {
                if let Err(error) =
                    self.store
                        .apply(target, change.operation.kind, &change.operation.params)
                {
                    warn!(change = %change.id, %error, "redo replay failed");
                    failures.push(CascadeFailure {
                        change_id: change.id,
                        object_id: Some(target.clone()),
                        message: error.to_string(),
                    });
                }
            }
            let mut change = change.clone();
            change.dependents.clear();
            link_dependencies(&mut state, &mut change);
            insert_into_log(&mut state, change);
        }

        state.undo_stack.push(group.clone());
        debug!(group = %group.id, "group redone");
        Some(UndoOutcome {
            group,
            cascaded_groups: Vec::new(),
            failures,
        })
    }

    /// True when `undo` would find a group
    pub async fn can_undo(&self, actor_id: Option<&str>) -> bool {
        let state = self.inner.lock().await;
        pick_group(&state.undo_stack, actor_id).is_some()
    }

    /// True when `redo` would find a group
    pub async fn can_redo(&self, actor_id: Option<&str>) -> bool {
        let state = self.inner.lock().await;
        pick_group(&state.redo_stack, actor_id).is_some()
    }

    /// Tracked changes matching the filter, newest first
    pub async fn get_history(&self, filter: &HistoryFilter) -> Vec<ChangeRecord> {
        let state = self.inner.lock().await;
        let limit = filter.limit.unwrap_or(usize::MAX);
        state
            .order
            .iter()
            .rev()
            .filter_map(|id| state.changes.get(id))
            .filter(|record| filter.matches(record))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Read-only counters for dashboards
    pub async fn get_statistics(&self) -> TrackerStatistics {
        let state = self.inner.lock().await;
        TrackerStatistics {
            total_changes: state.changes.len(),
            undo_depth: state.undo_stack.len(),
            redo_depth: state.redo_stack.len(),
            group_open: state.open_group.is_some(),
        }
    }

    // ---- internals -------------------------------------------------------

    /// Undo the group at `index`, cascading dependents first.
    /// Never leaves a dependent change applied while its cause is undone.
    fn undo_at(&self, state: &mut TrackerState, index: usize) -> UndoOutcome {
        let group = state.undo_stack.remove(index);

        // Transitive closure of everything depending on the group, grown
        // to a fixpoint over whole groups (a group is atomic: pulling in
        // one member pulls in all of them and their dependents).
        let mut closure = dependent_closure(state, &group.change_ids());
        loop {
            let mut grew = false;
            for candidate in &state.undo_stack {
                if !candidate
                    .changes
                    .iter()
                    .any(|change| closure.contains(&change.id))
                {
                    continue;
                }
                for change in &candidate.changes {
                    if closure.insert(change.id) {
                        grew = true;
                    }
                }
                for id in dependent_closure(state, &candidate.change_ids()) {
                    if closure.insert(id) {
                        grew = true;
                    }
                }
            }
            if !grew {
                break;
            }
        }

        // Undo dependents most-recent-first, then the requested group
        let mut failures = Vec::new();
        let mut cascaded = Vec::new();
        while let Some(pos) = state.undo_stack.iter().rposition(|candidate| {
            candidate
                .changes
                .iter()
                .any(|change| closure.contains(&change.id))
        }) {
            let dependent = state.undo_stack.remove(pos);
            debug!(group = %dependent.id, cause = %group.id, "cascading undo");
            failures.extend(apply_inverse_group(state, self.store.as_ref(), &dependent));
            cascaded.push(dependent.id);
            state.redo_stack.push(dependent);
        }

        failures.extend(apply_inverse_group(state, self.store.as_ref(), &group));
        state.redo_stack.push(group.clone());
        debug!(group = %group.id, cascaded = cascaded.len(), "group undone");

        UndoOutcome {
            group,
            cascaded_groups: cascaded,
            failures,
        }
    }

    fn report_failures(&self, outcome: &UndoOutcome) {
        if outcome.failures.is_empty() {
            return;
        }
        warn!(
            group = %outcome.group.id,
            failures = outcome.failures.len(),
            "cascade undo completed with failures"
        );
        let _ = self.events.send(CollabEvent::cascade_undo_failed(
            outcome.group.id,
            outcome.failures.len(),
        ));
    }
}

/// Add edges from every still-tracked prior change sharing an object
fn link_dependencies(state: &mut TrackerState, change: &mut ChangeRecord) {
    for object in &change.affected_objects {
        let Some(priors) = state.by_object.get(object) else {
            continue;
        };
        for prior in priors.clone() {
            state.dependents.entry(prior).or_default().insert(change.id);
            if let Some(prior_record) = state.changes.get_mut(&prior) {
                if !prior_record.dependents.contains(&change.id) {
                    prior_record.dependents.push(change.id);
                }
            }
        }
    }
}

fn insert_into_log(state: &mut TrackerState, change: ChangeRecord) {
    for object in &change.affected_objects {
        state
            .by_object
            .entry(object.clone())
            .or_default()
            .push(change.id);
    }
    state.order.push_back(change.id);
    state.changes.insert(change.id, change);
}

fn remove_from_log(state: &mut TrackerState, change_id: Uuid) {
    state.changes.remove(&change_id);
    state.order.retain(|id| *id != change_id);
    state.by_object.retain(|_, ids| {
        ids.retain(|id| *id != change_id);
        !ids.is_empty()
    });
    state.dependents.remove(&change_id);
    for ids in state.dependents.values_mut() {
        ids.remove(&change_id);
    }
}

/// Transitive closure of changes depending on any of `seeds`.
/// Edges to evicted ids are treated as already satisfied.
fn dependent_closure(state: &TrackerState, seeds: &[Uuid]) -> BTreeSet<Uuid> {
    let mut closure = BTreeSet::new();
    let mut frontier: Vec<Uuid> = seeds.to_vec();
    while let Some(id) = frontier.pop() {
        if let Some(dependents) = state.dependents.get(&id) {
            for dependent in dependents {
                if closure.insert(*dependent) {
                    frontier.push(*dependent);
                }
            }
        }
    }
    closure
}

/// Apply the inverse of every change in the group, newest member first.
/// Failures never abort the walk; they are collected for one aggregate
/// report after the whole cascade.
fn apply_inverse_group(
    state: &mut TrackerState,
    store: &dyn DocumentStore,
    group: &ChangeGroup,
) -> Vec<CascadeFailure> {
    let mut failures = Vec::new();
    for change in group.changes.iter().rev() {
        if let Some(inverse) = invert(change) {
            let target = inverse.target.as_deref().unwrap_or_default();
            if let Err(error) = store.apply(target, inverse.kind, &inverse.params) {
                warn!(change = %change.id, %error, "inverse failed to apply");
                failures.push(CascadeFailure {
                    change_id: change.id,
                    object_id: change.operation.target.clone(),
                    message: error.to_string(),
                });
            }
        }
        remove_from_log(state, change.id);
    }
    failures
}

/// Evict oldest changes once the log exceeds its capacity
fn evict_overflow(state: &mut TrackerState, capacity: usize) {
    while state.order.len() > capacity {
        let Some(oldest) = state.order.front().copied() else {
            break;
        };
        debug!(change = %oldest, "history capacity reached, evicting oldest change");
        remove_from_log(state, oldest);
    }
}

/// Last group on the stack, or the actor's last group
fn pick_group(stack: &[ChangeGroup], actor_id: Option<&str>) -> Option<usize> {
    match actor_id {
        None => stack.len().checked_sub(1),
        Some(actor_id) => stack.iter().rposition(|group| group.actor_id == actor_id),
    }
}
