use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};
use wikigraph_stream::{LinkEdge, PageNode};

/// Immutable, cheaply clonable view over an append-only sequence.
///
/// Storage is a short list of shared segments; cloning copies only the
/// segment pointers.
#[derive(Debug)]
pub struct Frozen<T> {
    segments: Arc<[Arc<[T]>]>,
    len: usize,
}

impl<T> Clone for Frozen<T> {
    fn clone(&self) -> Self {
        Self {
            segments: Arc::clone(&self.segments),
            len: self.len,
        }
    }
}

impl<T> Default for Frozen<T> {
    fn default() -> Self {
        Self {
            segments: Arc::from(Vec::<Arc<[T]>>::new()),
            len: 0,
        }
    }
}

impl<T> Frozen<T> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.segments.iter().flat_map(|segment| segment.iter())
    }

    pub fn get(&self, mut index: usize) -> Option<&T> {
        for segment in self.segments.iter() {
            if index < segment.len() {
                return segment.get(index);
            }
            index -= segment.len();
        }
        None
    }

    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.iter().cloned().collect()
    }
}

/// Growable side of [`Frozen`]: push is O(1), freezing seals the pending
/// tail and merges segments so each is more than twice the size of the next.
#[derive(Debug)]
struct SegmentLog<T> {
    segments: Vec<Arc<[T]>>,
    tail: Vec<T>,
    len: usize,
}

impl<T: Clone> SegmentLog<T> {
    fn new() -> Self {
        Self {
            segments: Vec::new(),
            tail: Vec::new(),
            len: 0,
        }
    }

    fn push(&mut self, item: T) {
        self.tail.push(item);
        self.len += 1;
    }

    fn extend(&mut self, items: impl IntoIterator<Item = T>) {
        for item in items {
            self.push(item);
        }
    }

    fn freeze(&mut self) -> Frozen<T> {
        if !self.tail.is_empty() {
            let sealed: Arc<[T]> = Arc::from(std::mem::take(&mut self.tail));
            self.segments.push(sealed);
            self.compact();
        }

        Frozen {
            segments: Arc::from(self.segments.clone()),
            len: self.len,
        }
    }

    fn compact(&mut self) {
        while self.segments.len() >= 2 {
            let n = self.segments.len();
            if self.segments[n - 2].len() > 2 * self.segments[n - 1].len() {
                break;
            }
            let (Some(last), Some(prev)) = (self.segments.pop(), self.segments.pop()) else {
                break;
            };
            let mut merged = Vec::with_capacity(prev.len() + last.len());
            merged.extend_from_slice(&prev);
            merged.extend_from_slice(&last);
            self.segments.push(Arc::from(merged));
        }
    }

    #[cfg(test)]
    fn segment_count(&self) -> usize {
        self.segments.len()
    }
}

/// Accumulated graph at one point in time. Never changes after creation.
#[derive(Debug, Clone, Default)]
pub struct GraphSnapshot {
    nodes: Frozen<PageNode>,
    edges: Frozen<LinkEdge>,
}

/// Owned, serializable copy of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphExport {
    pub nodes: Vec<PageNode>,
    pub edges: Vec<LinkEdge>,
}

impl GraphSnapshot {
    /// Build a snapshot directly from node and edge lists, in order.
    pub fn from_parts(nodes: Vec<PageNode>, edges: Vec<LinkEdge>) -> Self {
        let mut node_log = SegmentLog::new();
        node_log.extend(nodes);
        let mut edge_log = SegmentLog::new();
        edge_log.extend(edges);
        Self {
            nodes: node_log.freeze(),
            edges: edge_log.freeze(),
        }
    }

    pub fn nodes(&self) -> &Frozen<PageNode> {
        &self.nodes
    }

    pub fn edges(&self) -> &Frozen<LinkEdge> {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn export(&self) -> GraphExport {
        GraphExport {
            nodes: self.nodes.to_vec(),
            edges: self.edges.to_vec(),
        }
    }
}

/// Append-only merge of incoming graph fragments.
///
/// Node ids are deduplicated first-wins: a repeated id is dropped (and
/// counted) while the edges that came with it are still kept.
#[derive(Debug)]
pub struct GraphAccumulator {
    nodes: SegmentLog<PageNode>,
    edges: SegmentLog<LinkEdge>,
    seen: HashSet<String>,
    duplicates: usize,
}

impl Default for GraphAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphAccumulator {
    pub fn new() -> Self {
        Self {
            nodes: SegmentLog::new(),
            edges: SegmentLog::new(),
            seen: HashSet::new(),
            duplicates: 0,
        }
    }

    /// Merge one fragment. Returns false when the node id was already known.
    pub fn append(&mut self, node: PageNode, edges: Vec<LinkEdge>) -> bool {
        let accepted = if self.seen.contains(&node.id) {
            self.duplicates += 1;
            warn!("Duplicate node id '{}' dropped (first wins)", node.id);
            false
        } else {
            self.seen.insert(node.id.clone());
            self.nodes.push(node);
            true
        };

        debug!("Appending {} edge(s)", edges.len());
        self.edges.extend(edges);
        accepted
    }

    pub fn snapshot(&mut self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.nodes.freeze(),
            edges: self.edges.freeze(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len
    }

    pub fn duplicate_count(&self) -> usize {
        self.duplicates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_stay_logarithmic() {
        let mut log = SegmentLog::new();
        for i in 0..1000 {
            log.push(i);
            log.freeze();
        }
        let frozen = log.freeze();
        assert_eq!(frozen.len(), 1000);
        assert!(log.segment_count() <= 11, "got {}", log.segment_count());
        assert_eq!(frozen.to_vec(), (0..1000).collect::<Vec<_>>());
    }

    #[test]
    fn test_frozen_get_crosses_segments() {
        let mut log = SegmentLog::new();
        log.extend(0..5);
        log.freeze();
        log.push(5);
        let frozen = log.freeze();
        assert_eq!(frozen.get(0), Some(&0));
        assert_eq!(frozen.get(5), Some(&5));
        assert_eq!(frozen.get(6), None);
    }

    #[test]
    fn test_old_frozen_view_is_unchanged() {
        let mut log = SegmentLog::new();
        log.push("a");
        let before = log.freeze();
        log.push("b");
        let after = log.freeze();
        assert_eq!(before.to_vec(), vec!["a"]);
        assert_eq!(after.to_vec(), vec!["a", "b"]);
    }
}
