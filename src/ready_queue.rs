//! Ready Queue (spec.md §4.2)
//!
//! Bounded-access, FIFO, multi-producer/multi-consumer queue of table
//! descriptors deemed immediately dispatchable. Only the dispatcher pops from
//! this queue; any task holding a table's lock may push via
//! [`TableDescriptor::try_enqueue_ready`].

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::registry::TableDescriptor;
use std::sync::Arc;

pub struct ReadyQueue {
    queue: Mutex<VecDeque<Arc<TableDescriptor>>>,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Push onto the back. Callers must already have set `in_ready_queue = true`
    /// under the table's own lock before calling this (see
    /// `TableDescriptor::try_enqueue_ready`) so invariant 3 in spec.md §8 holds.
    pub fn push(&self, table: Arc<TableDescriptor>) {
        self.queue.lock().unwrap().push_back(table);
    }

    /// Push back onto the *front* — used when the dispatcher pops a table,
    /// finds it still has jobs after dispatching one, and wants FIFO fairness
    /// preserved relative to tables it hasn't looked at yet this round.
    pub fn push_front(&self, table: Arc<TableDescriptor>) {
        self.queue.lock().unwrap().push_front(table);
    }

    /// O(1) fast-path pop (spec.md §4.2 step 1). The popped descriptor's
    /// readiness must be re-validated by the caller under its own lock: the
    /// queue entry is a hint, not a guarantee (spec.md §8 invariant 2).
    pub fn try_pop(&self) -> Option<Arc<TableDescriptor>> {
        self.queue.lock().unwrap().pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ReadyQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TableRegistry;

    fn make_table(reg: &TableRegistry, name: &str) -> Arc<TableDescriptor> {
        let db = reg.get_or_create_database("d");
        reg.get_or_create_table(db, name, name, false, false, false, 4)
    }

    #[test]
    fn fifo_order_preserved() {
        let reg = TableRegistry::new();
        let rq = ReadyQueue::new();
        let a = make_table(&reg, "a");
        let b = make_table(&reg, "b");
        rq.push(a.clone());
        rq.push(b.clone());
        assert!(Arc::ptr_eq(&rq.try_pop().unwrap(), &a));
        assert!(Arc::ptr_eq(&rq.try_pop().unwrap(), &b));
        assert!(rq.try_pop().is_none());
    }

    #[test]
    fn push_front_takes_priority() {
        let reg = TableRegistry::new();
        let rq = ReadyQueue::new();
        let a = make_table(&reg, "a");
        let b = make_table(&reg, "b");
        rq.push(a.clone());
        rq.push_front(b.clone());
        assert!(Arc::ptr_eq(&rq.try_pop().unwrap(), &b));
        assert!(Arc::ptr_eq(&rq.try_pop().unwrap(), &a));
    }
}
