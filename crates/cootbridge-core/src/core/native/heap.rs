use super::handle::Owned;
use super::node::NativeNode;
use slotmap::{SlotMap, new_key_type};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::trace;

new_key_type! {
    /// Key of a live native handle inside a [`NativeHeap`].
    pub struct HandleId;
}

/// Running acquire/release counters of a [`NativeHeap`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Handles handed out, including top-level results and every sub-handle.
    pub acquired: u64,
    /// Handles returned to the heap exactly once.
    pub released: u64,
    /// Release attempts for handles that were not live (double releases).
    pub rejected_releases: u64,
}

impl HeapStats {
    pub fn live(&self) -> u64 {
        self.acquired.saturating_sub(self.released)
    }

    /// True when every acquired handle was released and nothing was released twice.
    pub fn is_balanced(&self) -> bool {
        self.acquired == self.released && self.rejected_releases == 0
    }
}

/// One entry of the optional heap journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeapEvent {
    Acquired { id: HandleId, class: String },
    Released { id: HandleId, class: String },
}

struct HeapState {
    live: SlotMap<HandleId, Rc<NativeNode>>,
    stats: HeapStats,
    journal: Option<Vec<HeapEvent>>,
}

/// The arena of native handles owned by one engine module.
///
/// Every inspection of a non-value node goes through a handle registered here, so the
/// heap knows at any moment how many handles are outstanding. Handles are only ever
/// released through [`Owned`], which makes a release skippable on no code path.
///
/// The heap is single-threaded by construction (`Rc` + `RefCell`), matching the engine's
/// single-writer execution model.
pub struct NativeHeap {
    state: RefCell<HeapState>,
}

impl NativeHeap {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            state: RefCell::new(HeapState {
                live: SlotMap::with_key(),
                stats: HeapStats::default(),
                journal: None,
            }),
        })
    }

    /// Creates a heap that records every acquire and release in order.
    pub fn with_journal() -> Rc<Self> {
        let heap = Self::new();
        heap.state.borrow_mut().journal = Some(Vec::new());
        heap
    }

    /// Registers a freshly allocated engine object and hands its single owner to the caller.
    pub fn allocate(self: &Rc<Self>, node: impl Into<NativeNode>) -> Owned {
        self.acquire(Rc::new(node.into()))
    }

    pub(crate) fn acquire(self: &Rc<Self>, node: Rc<NativeNode>) -> Owned {
        let id = {
            let mut state = self.state.borrow_mut();
            let id = state.live.insert(Rc::clone(&node));
            state.stats.acquired += 1;
            if let Some(journal) = state.journal.as_mut() {
                journal.push(HeapEvent::Acquired {
                    id,
                    class: node.class_name().to_string(),
                });
            }
            id
        };
        trace!(?id, class = node.class_name(), "acquired native handle");
        Owned::new(Rc::clone(self), id, node)
    }

    pub(crate) fn release(&self, id: HandleId) -> bool {
        let mut state = self.state.borrow_mut();
        match state.live.remove(id) {
            Some(node) => {
                state.stats.released += 1;
                if let Some(journal) = state.journal.as_mut() {
                    journal.push(HeapEvent::Released {
                        id,
                        class: node.class_name().to_string(),
                    });
                }
                trace!(?id, class = node.class_name(), "released native handle");
                true
            }
            None => {
                state.stats.rejected_releases += 1;
                false
            }
        }
    }

    pub fn is_live(&self, id: HandleId) -> bool {
        self.state.borrow().live.contains_key(id)
    }

    pub fn live_count(&self) -> usize {
        self.state.borrow().live.len()
    }

    pub fn stats(&self) -> HeapStats {
        self.state.borrow().stats
    }

    /// Returns a copy of the journal, or an empty list when journaling is off.
    pub fn journal(&self) -> Vec<HeapEvent> {
        self.state.borrow().journal.clone().unwrap_or_default()
    }

    /// Returns the journal recorded so far and starts a fresh one.
    pub fn take_journal(&self) -> Vec<HeapEvent> {
        self.state
            .borrow_mut()
            .journal
            .as_mut()
            .map(std::mem::take)
            .unwrap_or_default()
    }
}
