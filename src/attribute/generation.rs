//! Generation tracking and deferred reclamation
//!
//! A generation is a monotonically increasing counter identifying a
//! point-in-time view of attribute storage. Two pieces cooperate:
//!
//! - `GenerationHandler` owns the counter and tracks which generations live
//!   readers still pin (via `GenerationGuard`). It answers
//!   `first_used_generation`, the oldest generation any reader may observe.
//! - `GenerationHolder` is the writer-owned hold list. Buffers superseded by
//!   a reallocating grow are retired into it, tagged with the generation
//!   current at retirement, and released by `trim` once the first used
//!   generation has moved past their tag.
//!
//! A buffer retired at generation `G` is released only when
//! `first_used_generation > G`. The holder performs no liveness detection
//! itself; correctness depends on the watermark supplied by the tracker.
//!
//! Reader registration is lock-free. Each generation has a node holding a
//! reference count whose low bit marks the node valid. A reader loads the
//! newest node, adds 2 to its count and keeps the guard only if the valid
//! bit was still set. The writer walks the chain from the oldest node and
//! clears the valid bit of every node that has no readers and is not the
//! newest; the first node it cannot invalidate is the first used
//! generation. Once invalid, a node can never be pinned again.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

/// Generation number
pub type Generation = u64;

/// Supplies the oldest generation any active reader may still observe.
pub trait GenerationTracker: Send + Sync {
    /// Oldest generation still in use. Everything retired strictly before
    /// this generation may be released.
    fn first_used_generation(&self) -> Generation;
}

/// Something the hold list can keep alive until its generation is unused.
pub trait GenerationHeld: Send + Sync {
    /// Bytes kept alive by this item
    fn byte_size(&self) -> usize;
}

const VALID_BIT: u32 = 1;
const GUARD_UNIT: u32 = 2;

/// Reader count for one generation
#[derive(Debug)]
struct GenerationNode {
    generation: Generation,
    /// `2 * guards | valid`
    ref_count: AtomicU32,
}

impl GenerationNode {
    fn new(generation: Generation) -> Self {
        Self {
            generation,
            ref_count: AtomicU32::new(VALID_BIT),
        }
    }

    /// Register one guard. Fails once the writer has invalidated the node.
    fn try_acquire(&self) -> bool {
        let previous = self.ref_count.fetch_add(GUARD_UNIT, Ordering::AcqRel);
        if previous & VALID_BIT != 0 {
            return true;
        }
        self.ref_count.fetch_sub(GUARD_UNIT, Ordering::AcqRel);
        false
    }

    fn release(&self) {
        self.ref_count.fetch_sub(GUARD_UNIT, Ordering::AcqRel);
    }

    /// Mark the node dead if no guard holds it. Writer only.
    fn try_invalidate(&self) -> bool {
        self.ref_count
            .compare_exchange(VALID_BIT, 0, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn guards(&self) -> usize {
        (self.ref_count.load(Ordering::Acquire) / GUARD_UNIT) as usize
    }
}

/// Shared generation counter plus reader registrations.
pub struct GenerationHandler {
    current: AtomicU64,
    /// Newest node; the only one readers ever pin.
    newest: ArcSwap<GenerationNode>,
    /// Oldest to newest. Only the writer side touches the chain.
    chain: Mutex<VecDeque<Arc<GenerationNode>>>,
}

impl GenerationHandler {
    /// Create a handler starting at generation 0 with no readers.
    pub fn new() -> Self {
        let first = Arc::new(GenerationNode::new(0));
        let mut chain = VecDeque::new();
        chain.push_back(Arc::clone(&first));
        Self {
            current: AtomicU64::new(0),
            newest: ArcSwap::new(first),
            chain: Mutex::new(chain),
        }
    }

    /// Current generation
    #[inline]
    pub fn current_generation(&self) -> Generation {
        self.current.load(Ordering::Acquire)
    }

    /// Advance to the next generation and return it. Writer only.
    pub(crate) fn inc_generation(&self) -> Generation {
        let mut chain = self.chain.lock();
        let next = self.current_generation() + 1;
        let node = Arc::new(GenerationNode::new(next));
        chain.push_back(Arc::clone(&node));
        self.newest.store(node);
        self.current.store(next, Ordering::Release);
        next
    }

    /// Pin the newest generation for the lifetime of the returned guard.
    ///
    /// Never blocks. A retry only happens when the writer retired the node
    /// between the load and the registration, in which case a newer node
    /// has already been published.
    pub fn take_guard(&self) -> GenerationGuard {
        loop {
            let node = self.newest.load_full();
            if node.try_acquire() {
                return GenerationGuard { node };
            }
        }
    }

    /// Number of live guards across all generations
    pub fn active_guard_count(&self) -> usize {
        self.chain.lock().iter().map(|node| node.guards()).sum()
    }

    /// Oldest pinned generation, if any reader holds a guard
    pub fn oldest_pinned_generation(&self) -> Option<Generation> {
        self.chain
            .lock()
            .iter()
            .find(|node| node.guards() > 0)
            .map(|node| node.generation)
    }
}

impl Default for GenerationHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for GenerationHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationHandler")
            .field("current", &self.current_generation())
            .field("active_guards", &self.active_guard_count())
            .finish()
    }
}

impl GenerationTracker for GenerationHandler {
    fn first_used_generation(&self) -> Generation {
        let mut chain = self.chain.lock();
        while chain.len() > 1 {
            let unused = chain.front().map_or(false, |node| node.try_invalidate());
            if !unused {
                break;
            }
            chain.pop_front();
        }
        chain
            .front()
            .map_or_else(|| self.current_generation(), |node| node.generation)
    }
}

/// Pins one generation while alive.
#[derive(Debug)]
pub struct GenerationGuard {
    node: Arc<GenerationNode>,
}

impl GenerationGuard {
    /// The pinned generation
    pub fn generation(&self) -> Generation {
        self.node.generation
    }
}

impl Drop for GenerationGuard {
    fn drop(&mut self) {
        self.node.release();
    }
}

struct HeldEntry {
    generation: Generation,
    item: Box<dyn GenerationHeld>,
}

/// Writer-owned hold list of retired buffers.
pub struct GenerationHolder {
    handler: Arc<GenerationHandler>,
    /// Ordered by generation; entries are appended with the current
    /// generation, which never decreases.
    hold_list: VecDeque<HeldEntry>,
    held_bytes: usize,
}

impl GenerationHolder {
    /// Create an empty hold list bound to `handler`'s counter.
    pub fn new(handler: Arc<GenerationHandler>) -> Self {
        Self {
            handler,
            hold_list: VecDeque::new(),
            held_bytes: 0,
        }
    }

    /// Current generation
    pub fn current_generation(&self) -> Generation {
        self.handler.current_generation()
    }

    /// Advance the generation counter, returning the new generation.
    pub fn advance_generation(&mut self) -> Generation {
        self.handler.inc_generation()
    }

    /// Retire `item`, tagging it with the current generation.
    pub fn retire(&mut self, item: Box<dyn GenerationHeld>) -> Generation {
        let generation = self.current_generation();
        self.held_bytes += item.byte_size();
        self.hold_list.push_back(HeldEntry { generation, item });
        generation
    }

    /// Release every item retired strictly before `first_used`.
    ///
    /// Returns the number of items released.
    pub fn trim(&mut self, first_used: Generation) -> usize {
        let mut released = 0;
        while let Some(front) = self.hold_list.front() {
            if front.generation >= first_used {
                break;
            }
            if let Some(entry) = self.hold_list.pop_front() {
                self.held_bytes -= entry.item.byte_size();
                released += 1;
            }
        }
        released
    }

    /// Release whatever `tracker` reports as unreachable.
    pub fn remove_old_generations(&mut self, tracker: &dyn GenerationTracker) -> usize {
        self.trim(tracker.first_used_generation())
    }

    /// Release everything unconditionally. Only valid once no reader can
    /// reach any held item, i.e. at teardown or before a full reload.
    pub fn clear(&mut self) {
        self.hold_list.clear();
        self.held_bytes = 0;
    }

    /// Bytes currently on hold
    pub fn held_bytes(&self) -> usize {
        self.held_bytes
    }

    /// Number of items currently on hold
    pub fn held_count(&self) -> usize {
        self.hold_list.len()
    }

    /// Oldest generation still on hold
    pub fn oldest_held_generation(&self) -> Option<Generation> {
        self.hold_list.front().map(|e| e.generation)
    }
}

impl fmt::Debug for GenerationHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationHolder")
            .field("current", &self.current_generation())
            .field("held_count", &self.held_count())
            .field("held_bytes", &self.held_bytes)
            .finish()
    }
}
