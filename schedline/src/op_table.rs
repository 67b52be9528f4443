//! Operation table: bounded pool of in-flight request slots.
//!
//! Each admitted request holds one slot from allocation until its status
//! event is processed. Slots belonging to the same queue form a doubly
//! linked chain through the pool (oldest = head, newest = tail, the tail
//! key lives in the queue record), which is what enforces per-queue FIFO
//! completion order.

use slab::Slab;

/// One in-flight operation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct OpEntry {
    pub queue: u32,
    /// Channel whose flow-control credit this operation holds.
    pub channel: u16,
    /// A doorbell arrived while this op was the chain tail; its completion
    /// must re-arm the queue even if the status says empty.
    pub doorbell_pending: bool,
    /// A start status has been accounted against this op.
    pub started: bool,
    /// Oldest op of its queue's chain.
    pub is_head: bool,
    /// Next newer op of the same queue.
    pub next: Option<u16>,
    /// Next older op of the same queue.
    pub prev: Option<u16>,
}

/// Bounded slab of [`OpEntry`] slots.
pub(crate) struct OpTable {
    slab: Slab<OpEntry>,
    capacity: usize,
}

impl OpTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slab: Slab::with_capacity(capacity),
            capacity,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slab.len()
    }

    #[inline]
    pub fn has_free(&self) -> bool {
        self.slab.len() < self.capacity
    }

    /// Reserve a slot for a request admitted on `channel`. The slot is not
    /// linked into the queue's chain until the request commits.
    pub fn allocate(&mut self, queue: u32, channel: u16) -> Option<u16> {
        if !self.has_free() {
            return None;
        }
        let key = self.slab.insert(OpEntry {
            queue,
            channel,
            doorbell_pending: false,
            started: false,
            is_head: false,
            next: None,
            prev: None,
        });
        Some(key as u16)
    }

    #[inline]
    pub fn get(&self, key: u16) -> Option<&OpEntry> {
        self.slab.get(key as usize)
    }

    #[inline]
    pub fn get_mut(&mut self, key: u16) -> Option<&mut OpEntry> {
        self.slab.get_mut(key as usize)
    }

    /// Append a reserved slot to its queue's chain. `tail` is the queue
    /// record's current tail key.
    pub fn link_tail(&mut self, key: u16, tail: Option<u16>) {
        match tail {
            Some(t) => {
                debug_assert!(self.slab.contains(t as usize), "stale tail key");
                self.slab[t as usize].next = Some(key);
                let entry = &mut self.slab[key as usize];
                entry.prev = Some(t);
                entry.is_head = false;
            }
            None => {
                self.slab[key as usize].is_head = true;
            }
        }
    }

    /// Detach a slot from its chain, repairing neighbor links. Returns the
    /// detached entry's `prev` key so the caller can fix the queue tail.
    pub fn unlink(&mut self, key: u16) -> Option<u16> {
        let entry = self.slab[key as usize];
        if let Some(p) = entry.prev {
            self.slab[p as usize].next = entry.next;
        }
        if let Some(n) = entry.next {
            self.slab[n as usize].prev = entry.prev;
            if entry.prev.is_none() {
                self.slab[n as usize].is_head = true;
            }
        }
        entry.prev
    }

    /// Return an unlinked slot to the free pool.
    pub fn release(&mut self, key: u16) -> OpEntry {
        self.slab.remove(key as usize)
    }

    /// Walk a queue's chain from oldest to newest, returning the first key
    /// matching `pred`. `tail` is the queue record's tail key.
    pub fn find_oldest(&self, tail: u16, pred: impl Fn(&OpEntry) -> bool) -> Option<u16> {
        // Walk back to the head, then forward.
        let mut head = tail;
        loop {
            let entry = self.slab.get(head as usize)?;
            if entry.is_head {
                break;
            }
            head = entry.prev?;
        }
        let mut cursor = Some(head);
        while let Some(key) = cursor {
            let entry = self.slab.get(key as usize)?;
            if pred(entry) {
                return Some(key);
            }
            cursor = entry.next;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn respects_capacity() {
        let mut ops = OpTable::new(2);
        let a = ops.allocate(1, 0).unwrap();
        let _b = ops.allocate(1, 0).unwrap();
        assert!(ops.allocate(2, 0).is_none());
        ops.release(a);
        assert!(ops.allocate(2, 0).is_some());
    }

    #[test]
    fn chain_link_and_pop_head() {
        let mut ops = OpTable::new(4);
        let a = ops.allocate(5, 0).unwrap();
        ops.link_tail(a, None);
        let b = ops.allocate(5, 0).unwrap();
        ops.link_tail(b, Some(a));
        assert!(ops.get(a).unwrap().is_head);
        assert!(!ops.get(b).unwrap().is_head);

        let prev = ops.unlink(a);
        assert_eq!(prev, None);
        ops.release(a);
        assert!(ops.get(b).unwrap().is_head);
        assert_eq!(ops.get(b).unwrap().prev, None);
    }

    #[test]
    fn unlink_middle_repairs_links() {
        let mut ops = OpTable::new(4);
        let a = ops.allocate(9, 0).unwrap();
        ops.link_tail(a, None);
        let b = ops.allocate(9, 0).unwrap();
        ops.link_tail(b, Some(a));
        let c = ops.allocate(9, 0).unwrap();
        ops.link_tail(c, Some(b));

        ops.unlink(b);
        ops.release(b);
        assert_eq!(ops.get(a).unwrap().next, Some(c));
        assert_eq!(ops.get(c).unwrap().prev, Some(a));
    }

    #[test]
    fn find_oldest_walks_from_head() {
        let mut ops = OpTable::new(4);
        let a = ops.allocate(2, 0).unwrap();
        ops.link_tail(a, None);
        let b = ops.allocate(2, 0).unwrap();
        ops.link_tail(b, Some(a));

        ops.get_mut(a).unwrap().started = true;
        assert_eq!(ops.find_oldest(b, |e| !e.started), Some(b));
        assert_eq!(ops.find_oldest(b, |e| e.started), Some(a));
    }
}
