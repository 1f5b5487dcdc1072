//! Wait-For Graph Analysis
//!
//! Deadlock detection works on an actor-level wait-for graph: an edge
//! `A -> B` exists while one of A's queued requests names an object that B
//! holds Exclusively. The graph is rebuilt from scratch on every detector
//! pass; it is small (bounded by concurrently waiting actors), so a plain
//! DFS is enough.
//!
//! Everything here is deterministic: `BTreeMap`/`BTreeSet` ordering makes
//! repeated passes over the same state find the same cycle and pick the
//! same victim.

use std::collections::{BTreeMap, BTreeSet};

/// Actor -> set of actors it is waiting on
pub type WaitForGraph = BTreeMap<String, BTreeSet<String>>;

/// Find one cycle in the wait-for graph, as the list of actors in cycle
/// order. Returns `None` when the graph is acyclic.
pub fn find_cycle(graph: &WaitForGraph) -> Option<Vec<String>> {
    let mut visited: BTreeSet<&str> = BTreeSet::new();
    for start in graph.keys() {
        if visited.contains(start.as_str()) {
            continue;
        }
        let mut path: Vec<&str> = Vec::new();
        let mut on_path: BTreeSet<&str> = BTreeSet::new();
        if let Some(cycle) = dfs(graph, start, &mut visited, &mut path, &mut on_path) {
            return Some(cycle);
        }
    }
    None
}

fn dfs<'a>(
    graph: &'a WaitForGraph,
    node: &'a str,
    visited: &mut BTreeSet<&'a str>,
    path: &mut Vec<&'a str>,
    on_path: &mut BTreeSet<&'a str>,
) -> Option<Vec<String>> {
    if on_path.contains(node) {
        let start = path.iter().position(|entry| *entry == node)?;
        return Some(path[start..].iter().map(|entry| entry.to_string()).collect());
    }
    if visited.contains(node) {
        return None;
    }
    visited.insert(node);
    path.push(node);
    on_path.insert(node);

    if let Some(next_nodes) = graph.get(node) {
        for next in next_nodes {
            if let Some(cycle) = dfs(graph, next, visited, path, on_path) {
                return Some(cycle);
            }
        }
    }

    path.pop();
    on_path.remove(node);
    None
}

/// Select the victim whose locks will be force-released to break a cycle:
/// the cycle member with the lowest queued priority, ties going to the
/// first discovered.
pub fn pick_victim(cycle: &[String], priorities: &BTreeMap<String, u32>) -> String {
    let mut victim = &cycle[0];
    let mut lowest = priorities.get(victim).copied().unwrap_or(0);
    for actor in &cycle[1..] {
        let priority = priorities.get(actor).copied().unwrap_or(0);
        if priority < lowest {
            victim = actor;
            lowest = priority;
        }
    }
    victim.clone()
}
