use crate::graph::CellId;
use std::cell::RefCell;
use std::rc::Rc;

/// FIFO of cell ids the graph engine reported as removed.
///
/// The engine reports removals from inside its own mutation calls, so the
/// notifications are queued here and drained once the call has returned.
/// Clones share the same queue.
#[derive(Debug, Clone, Default)]
pub struct RemovalQueue {
    cells: Rc<RefCell<Vec<CellId>>>,
}

impl RemovalQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the engine removed `cell`.
    pub fn push(&self, cell: CellId) {
        self.cells.borrow_mut().push(cell);
    }

    /// Take all queued ids in FIFO order.
    pub fn drain(&self) -> Vec<CellId> {
        std::mem::take(&mut *self.cells.borrow_mut())
    }

    /// Number of removals not yet drained.
    pub fn len(&self) -> usize {
        self.cells.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.borrow().is_empty()
    }

    /// Drop every recorded removal.
    pub fn clear(&self) {
        self.cells.borrow_mut().clear();
    }
}
