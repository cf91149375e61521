//! Worker slots owned by the dispatcher, kept in creation order.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::ids::{TaskId, WorkerId};
use crate::workers::{WorkerSnapshot, WorkerStatus};

use super::runner::Assignment;

pub(crate) struct WorkerSlot {
    pub(crate) id: WorkerId,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) status: WorkerStatus,
    pub(crate) locked: bool,
    pub(crate) task: Option<TaskId>,
    /// Assignment channel; `None` once closed for shutdown.
    pub(crate) tx: Option<mpsc::Sender<Assignment>>,
}

impl WorkerSlot {
    pub(crate) fn new(tx: mpsc::Sender<Assignment>) -> Self {
        Self {
            id: WorkerId::new(),
            created_at: Utc::now(),
            status: WorkerStatus::Wait,
            locked: false,
            task: None,
            tx: Some(tx),
        }
    }

    pub(crate) fn snapshot(&self) -> WorkerSnapshot {
        WorkerSnapshot {
            id: self.id,
            created_at: self.created_at,
            status: self.status,
            locked: self.locked,
            task: self.task,
        }
    }

    /// Moves the slot to `next`, returning the previous status.
    pub(crate) fn set_status(&mut self, next: WorkerStatus) -> WorkerStatus {
        std::mem::replace(&mut self.status, next)
    }
}

/// Linear pool; index order is creation order.
#[derive(Default)]
pub(crate) struct WorkerPool {
    slots: Vec<WorkerSlot>,
}

impl WorkerPool {
    pub(crate) fn push(&mut self, slot: WorkerSlot) {
        self.slots.push(slot);
    }

    pub(crate) fn get(&self, id: WorkerId) -> Option<&WorkerSlot> {
        self.slots.iter().find(|s| s.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: WorkerId) -> Option<&mut WorkerSlot> {
        self.slots.iter_mut().find(|s| s.id == id)
    }

    pub(crate) fn remove(&mut self, id: WorkerId) -> Option<WorkerSlot> {
        let idx = self.slots.iter().position(|s| s.id == id)?;
        Some(self.slots.remove(idx))
    }

    /// Idle workers able to accept an assignment, oldest first.
    pub(crate) fn idle_ids(&self) -> Vec<WorkerId> {
        self.slots
            .iter()
            .filter(|s| s.status == WorkerStatus::Wait && s.tx.is_some())
            .map(|s| s.id)
            .collect()
    }

    /// Drops every assignment sender so worker loops exit after their current run.
    pub(crate) fn close_all(&mut self) {
        for slot in &mut self.slots {
            slot.tx = None;
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn count(&self, status: WorkerStatus) -> usize {
        self.slots.iter().filter(|s| s.status == status).count()
    }

    pub(crate) fn snapshots(&self) -> Vec<WorkerSnapshot> {
        self.slots.iter().map(WorkerSlot::snapshot).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot() -> WorkerSlot {
        let (tx, _rx) = mpsc::channel(1);
        WorkerSlot::new(tx)
    }

    #[test]
    fn test_idle_ids_in_creation_order() {
        let mut pool = WorkerPool::default();
        let a = slot();
        let b = slot();
        let mut c = slot();
        c.status = WorkerStatus::Busy;
        let (ida, idb) = (a.id, b.id);
        pool.push(a);
        pool.push(c);
        pool.push(b);

        assert_eq!(pool.idle_ids(), vec![ida, idb]);
        assert_eq!(pool.count(WorkerStatus::Busy), 1);
    }

    #[test]
    fn test_closed_slots_are_not_idle() {
        let mut pool = WorkerPool::default();
        pool.push(slot());
        pool.close_all();
        assert!(pool.idle_ids().is_empty());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut pool = WorkerPool::default();
        let ids: Vec<WorkerId> = (0..3)
            .map(|_| {
                let s = slot();
                let id = s.id;
                pool.push(s);
                id
            })
            .collect();

        assert!(pool.remove(ids[1]).is_some());
        assert!(pool.remove(ids[1]).is_none());
        let left: Vec<WorkerId> = pool.snapshots().into_iter().map(|s| s.id).collect();
        assert_eq!(left, vec![ids[0], ids[2]]);
    }
}
