use std::cmp::Ordering;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::page::FrameId;

/// Replacer tracks page frame usage for replacement in case the buffer
/// pool is full.
pub trait Replacer: Send + Sync {
    /// Record the event that the given frame id is accessed at current timestamp.
    /// Create a new entry for access history if frame id has not been seen before;
    /// new entries start out non-evictable.
    fn record_access(&self, frame_id: FrameId);

    /// Find the frame to evict with the backward k-distance policy. Only frames
    /// that are marked as evictable are candidates for eviction.
    ///
    /// Successful eviction of a frame decrements the size of the replacer and
    /// removes the frame's access history.
    ///
    /// Return the frame id if a frame is evicted successfully, None if no frames
    /// can be evicted.
    fn evict(&self) -> Option<FrameId>;

    /// Toggle whether a frame is evictable or non-evictable. This function also
    /// controls replacer size. Note that size is equal to the number of evictable
    /// entries.
    ///
    /// If a frame was previously evictable and is to be set to non-evictable, then
    /// size should decrement. If a frame was previously non-evictable and is to be
    /// set evictable, then size should increment. Unknown frames are ignored.
    fn set_evictable(&self, frame_id: FrameId, evictable: bool);

    /// Check if a frame is evictable. If the frame is not tracked, return false.
    fn is_evictable(&self, frame_id: FrameId) -> bool;

    /// Remove an evictable frame from the replacer, along with its access history.
    /// This function also decrements the replacer size if removal is successful.
    ///
    /// Note that this is different from evicting a frame, which always removes
    /// the frame with the largest backward k-distance. This function removes the
    /// specified frame id, no matter what its backward k-distance is.
    ///
    /// Calling remove on a non-evictable frame is an upper-layer logic error and
    /// panics. If the specified frame is not tracked, do nothing.
    fn remove(&self, frame_id: FrameId);

    /// Number of evictable frames.
    fn size(&self) -> usize;
}

#[derive(Debug, Eq, PartialEq)]
struct KDistance {
    frame_id: FrameId,
    distance: u64,
    first_access_at: u64,
}

impl PartialOrd for KDistance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KDistance {
    fn cmp(&self, other: &Self) -> Ordering {
        // largest distance first; ties fall back to classical LRU on
        // the earliest recorded access
        match self.distance.cmp(&other.distance).reverse() {
            Ordering::Equal => self.first_access_at.cmp(&other.first_access_at),
            other => other,
        }
    }
}

struct LRUKNode {
    k: usize,
    frame_id: FrameId,
    is_evictable: bool,
    /// History of the last seen K timestamps of the given frame.
    /// Least recent timestamp stored in front.
    history: VecDeque<u64>,
}

impl LRUKNode {
    fn new(frame_id: FrameId, k: usize) -> Self {
        assert!(k > 0, "replacer k should be larger than zero");
        LRUKNode { history: VecDeque::with_capacity(k), k, frame_id, is_evictable: false }
    }

    fn record_access(&mut self, timestamp: u64) {
        if self.history.len() == self.k {
            self.history.pop_front();
        }
        self.history.push_back(timestamp)
    }

    fn k_distance(&self, now: u64) -> KDistance {
        // the node always has at least one recorded access by the time
        // a distance is computed, front() cannot fail.
        let first = *self.history.front().unwrap();
        if self.history.len() < self.k {
            return KDistance { frame_id: self.frame_id, distance: u64::MAX, first_access_at: first };
        }
        // with the history capped at k, the front entry is exactly the
        // k-th most recent access
        KDistance { frame_id: self.frame_id, distance: now - first, first_access_at: first }
    }
}

/// LRUKReplacer implements the LRU-k replacement policy.
///
/// The LRU-k algorithm evicts a frame whose backward k-distance is maximum of
/// all frames. Backward k-distance is computed as the difference in time between
/// the current timestamp and the timestamp of k-th previous access.
///
/// A frame with less than k history references is given +inf as its backward
/// k-distance. When multiple frames tie (in particular, all frames with +inf
/// backward k-distance), the one with the earliest recorded access is the victim.
pub struct LRUKReplacer {
    nodes: HashMap<FrameId, LRUKNode>,
    current_timestamp: u64,
    current_size: usize,
    replacer_size: usize,
    k: usize,
}

impl LRUKReplacer {
    pub fn new(k: usize, size: usize) -> Self {
        let nodes = HashMap::new();
        LRUKReplacer { nodes, current_timestamp: 0, current_size: 0, replacer_size: size, k }
    }

    /// Record the event that the given frame id is accessed at current timestamp.
    /// Each access consumes one tick of the global clock, so no two accesses
    /// share a timestamp.
    fn record_access(&mut self, frame_id: FrameId) {
        assert!(frame_id < self.replacer_size, "frame id {} out of range", frame_id);
        let node = self.nodes.entry(frame_id).or_insert_with(|| LRUKNode::new(frame_id, self.k));
        node.record_access(self.current_timestamp);
        self.current_timestamp += 1;
    }

    /// Find the frame with the largest backward k-distance and evict that frame.
    /// Only frames that are marked as evictable are candidates for eviction.
    fn evict(&mut self) -> Option<FrameId> {
        let now = self.current_timestamp;
        let mut distances = vec![];
        for node in self.nodes.values() {
            if !node.is_evictable {
                continue;
            }
            distances.push(node.k_distance(now));
        }
        if distances.is_empty() {
            return None;
        }

        distances.sort();

        // we will always have at least one element here, it is
        // okay to use unwrap.
        let dist = distances.first().unwrap();
        let evicted = self.nodes.remove(&dist.frame_id).unwrap();
        self.current_size -= 1;

        Some(evicted.frame_id)
    }

    /// Toggle whether a frame is evictable or non-evictable, adjusting the
    /// evictable count accordingly. Unknown frames and unchanged flags are
    /// no-ops.
    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        let node = match self.nodes.get_mut(&frame_id) {
            Some(node) => node,
            None => return,
        };
        if node.is_evictable == evictable {
            return;
        }

        node.is_evictable = evictable;
        if evictable {
            self.current_size += 1;
        } else {
            self.current_size -= 1;
        }
    }

    fn is_evictable(&self, frame_id: FrameId) -> bool {
        match self.nodes.get(&frame_id) {
            Some(node) => node.is_evictable,
            None => false,
        }
    }

    /// Remove an evictable frame from the replacer, along with its access
    /// history. Removing a non-evictable frame is a logic error in the caller
    /// and panics rather than leaving the pool in a corrupted state.
    fn remove(&mut self, frame_id: FrameId) {
        assert!(frame_id < self.replacer_size, "frame id {} out of range", frame_id);
        let node = match self.nodes.get(&frame_id) {
            Some(node) => node,
            None => return,
        };
        assert!(node.is_evictable, "can't remove non-evictable frame {}", frame_id);
        self.nodes.remove(&frame_id);
        self.current_size -= 1;
    }

    fn size(&self) -> usize {
        self.current_size
    }
}

/// SyncLRUKReplacer implements the thread-safe version of the LRU-k replacement
/// policy, basically all the heavy lifting happens in the LRUKReplacer. The
/// internal latch is always taken after the buffer pool latch, never the other
/// way around.
pub struct SyncLRUKReplacer {
    inner: Mutex<LRUKReplacer>,
}

impl SyncLRUKReplacer {
    pub fn new(k: usize, size: usize) -> Self {
        let inner = Mutex::new(LRUKReplacer::new(k, size));
        SyncLRUKReplacer { inner }
    }
}

impl Replacer for SyncLRUKReplacer {
    fn record_access(&self, frame_id: FrameId) {
        let mut guard = self.inner.lock().expect("replacer latch poisoned");
        guard.record_access(frame_id)
    }

    fn evict(&self) -> Option<FrameId> {
        let mut guard = self.inner.lock().expect("replacer latch poisoned");
        guard.evict()
    }

    fn set_evictable(&self, frame_id: FrameId, evictable: bool) {
        let mut guard = self.inner.lock().expect("replacer latch poisoned");
        guard.set_evictable(frame_id, evictable)
    }

    fn is_evictable(&self, frame_id: FrameId) -> bool {
        let guard = self.inner.lock().expect("replacer latch poisoned");
        guard.is_evictable(frame_id)
    }

    fn remove(&self, frame_id: FrameId) {
        let mut guard = self.inner.lock().expect("replacer latch poisoned");
        guard.remove(frame_id)
    }

    fn size(&self) -> usize {
        let guard = self.inner.lock().expect("replacer latch poisoned");
        guard.size()
    }
}
