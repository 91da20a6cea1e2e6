// Storage hierarchy reconstruction from parent pointers

use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::models::Storage;

/// One storage with its nested children
#[derive(Debug, Clone, PartialEq)]
pub struct StorageNode {
    pub storage: Storage,
    pub children: Vec<StorageNode>,
}

impl StorageNode {
    /// Number of storages in this subtree, including itself
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(StorageNode::count).sum::<usize>()
    }
}

/// Build the storage forest
///
/// Storages whose parent is not part of `storages` become roots. Siblings
/// keep their input order. Storages caught in a parent cycle are dropped
/// with a warning.
pub fn build_tree(storages: &[Storage]) -> Vec<StorageNode> {
    let known: HashSet<Uuid> = storages.iter().map(|s| s.id).collect();

    let mut children: HashMap<Uuid, Vec<usize>> = HashMap::new();
    let mut roots = Vec::new();

    for (index, storage) in storages.iter().enumerate() {
        match storage.parent() {
            Some(parent) if parent != storage.id && known.contains(&parent) => {
                children.entry(parent).or_default().push(index);
            }
            _ => roots.push(index),
        }
    }

    let mut visited = HashSet::new();
    let forest: Vec<StorageNode> = roots
        .into_iter()
        .filter_map(|index| attach(index, storages, &children, &mut visited))
        .collect();

    let placed: usize = forest.iter().map(StorageNode::count).sum();
    if placed < storages.len() {
        tracing::warn!(
            dropped = storages.len() - placed,
            "Storages unreachable from any root (parent cycle)"
        );
    }

    forest
}

fn attach(
    index: usize,
    storages: &[Storage],
    children: &HashMap<Uuid, Vec<usize>>,
    visited: &mut HashSet<Uuid>,
) -> Option<StorageNode> {
    let storage = &storages[index];
    if !visited.insert(storage.id) {
        return None;
    }

    let nested = children
        .get(&storage.id)
        .map(|indices| {
            indices
                .iter()
                .filter_map(|&child| attach(child, storages, children, visited))
                .collect()
        })
        .unwrap_or_default();

    Some(StorageNode {
        storage: storage.clone(),
        children: nested,
    })
}

/// Breadcrumb from the outermost ancestor down to `id`
///
/// Empty when `id` is not in `storages`. Stops at a missing parent or a cycle.
pub fn storage_path(storages: &[Storage], id: Uuid) -> Vec<Storage> {
    let by_id: HashMap<Uuid, &Storage> = storages.iter().map(|s| (s.id, s)).collect();

    let mut path = Vec::new();
    let mut seen = HashSet::new();
    let mut cursor = by_id.get(&id).copied();

    while let Some(storage) = cursor {
        if !seen.insert(storage.id) {
            break;
        }
        path.push(storage.clone());
        cursor = storage.parent().and_then(|parent| by_id.get(&parent).copied());
    }

    path.reverse();
    path
}

/// Fill level in whole percent; 0 for a storage without capacity
pub fn fill_percentage(storage: &Storage) -> u32 {
    if storage.capacity <= 0.0 {
        return 0;
    }
    let percent = (storage.fullness / storage.capacity * 100.0).round();
    percent.max(0.0) as u32
}

/// Indented text view of the forest
pub fn render(forest: &[StorageNode]) -> String {
    let mut out = String::new();
    for node in forest {
        render_node(node, 0, &mut out);
    }
    out
}

fn render_node(node: &StorageNode, depth: usize, out: &mut String) {
    let storage = &node.storage;
    let unit = storage
        .unit
        .as_ref()
        .map(|u| format!(" {}", u.symbol))
        .unwrap_or_default();

    out.push_str(&"  ".repeat(depth));
    out.push_str(&format!(
        "{} [{}/{}{}, {}%] {}\n",
        storage.name,
        storage.fullness,
        storage.capacity,
        unit,
        fill_percentage(storage),
        storage.id
    ));

    for child in &node.children {
        render_node(child, depth + 1, out);
    }
}
