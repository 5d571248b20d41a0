//! Growable arena of worker slots with stable indices.

use std::process::Child;

/// Longest owner label kept for `SHOWUSRS`.
pub(crate) const OWNER_LABEL_LEN: usize = 20;

/// Pid reported for workers started by hand in manual mode.
pub(crate) const MANUAL_PID: u32 = u32::MAX;

/// A worker process tracked by the table.
#[derive(Debug)]
pub(crate) enum WorkerProcess {
    /// A child spawned by the dispatcher.
    Spawned(Child),
    /// A worker the operator starts by hand from the logged command line.
    Manual,
}

impl WorkerProcess {
    /// Operating-system process id; manual workers report all ones.
    pub(crate) fn pid(&self) -> u32 {
        match self {
            Self::Spawned(child) => child.id(),
            Self::Manual => MANUAL_PID,
        }
    }
}

/// One entry of the worker table.
#[derive(Debug)]
pub(crate) struct WorkerSlot<P> {
    /// Running worker, `None` when the slot is free.
    pub(crate) process: Option<WorkerProcess>,
    /// Client waiting for the worker to confirm startup.
    pub(crate) pending: Option<P>,
    /// Informational user label.
    pub(crate) owner: String,
}

impl<P> Default for WorkerSlot<P> {
    fn default() -> Self {
        Self {
            process: None,
            pending: None,
            owner: String::new(),
        }
    }
}

impl<P> WorkerSlot<P> {
    pub(crate) const fn is_occupied(&self) -> bool {
        self.process.is_some()
    }

    /// Process id of the worker, zero when the slot is free.
    pub(crate) fn pid(&self) -> u32 {
        self.process.as_ref().map_or(0, WorkerProcess::pid)
    }
}

/// Registry of worker slots.
///
/// Free slots below [`WorkerTable::live_count`] are reused first-fit. When
/// none is free the table doubles its capacity in place, so an allocation
/// never fails and existing indices keep their meaning. The table never
/// shrinks.
#[derive(Debug)]
pub(crate) struct WorkerTable<P> {
    slots: Vec<WorkerSlot<P>>,
    live_count: usize,
}

impl<P> WorkerTable<P> {
    pub(crate) fn new(capacity: usize) -> Self {
        let mut slots = Vec::new();
        slots.resize_with(capacity.max(1), WorkerSlot::default);
        Self {
            slots,
            live_count: 0,
        }
    }

    /// Highest reserved or occupied index plus one.
    pub(crate) const fn live_count(&self) -> usize {
        self.live_count
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Reserves the lowest free slot, growing the table when needed.
    ///
    /// The caller must [`occupy`](Self::occupy) or [`free`](Self::free) the
    /// returned index before releasing the table.
    pub(crate) fn allocate(&mut self) -> usize {
        let hole = self
            .slots
            .iter()
            .take(self.live_count)
            .position(|slot| !slot.is_occupied());
        let index = hole.unwrap_or(self.live_count);
        if index >= self.slots.len() {
            let doubled = self.slots.len().saturating_mul(2).max(index + 1);
            self.slots.resize_with(doubled, WorkerSlot::default);
        }
        self.live_count = self.live_count.max(index + 1);
        index
    }

    /// Records the worker started for a reserved slot.
    pub(crate) fn occupy(&mut self, index: usize, process: WorkerProcess, owner: &str) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.process = Some(process);
            slot.owner = owner.chars().take(OWNER_LABEL_LEN).collect();
        }
    }

    /// Marks a slot unoccupied and trims the live count.
    ///
    /// Any pending client stays in place until it is taken.
    pub(crate) fn free(&mut self, index: usize) -> Option<WorkerProcess> {
        let process = self.slots.get_mut(index).and_then(|slot| {
            slot.owner.clear();
            slot.process.take()
        });
        self.compact();
        process
    }

    /// Drops trailing unoccupied slots from the live count.
    pub(crate) fn compact(&mut self) {
        while self.live_count > 0
            && self
                .slots
                .get(self.live_count - 1)
                .is_some_and(|slot| !slot.is_occupied())
        {
            self.live_count -= 1;
        }
    }

    pub(crate) fn slot(&self, index: usize) -> Option<&WorkerSlot<P>> {
        self.slots.get(index)
    }

    pub(crate) fn slot_mut(&mut self, index: usize) -> Option<&mut WorkerSlot<P>> {
        self.slots.get_mut(index)
    }

    /// Parks a client until the worker in `index` verifies.
    pub(crate) fn set_pending(&mut self, index: usize, pending: P) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.pending = Some(pending);
        }
    }

    /// Removes and returns the client waiting on `index`.
    pub(crate) fn take_pending(&mut self, index: usize) -> Option<P> {
        self.slots.get_mut(index).and_then(|slot| slot.pending.take())
    }

    /// Removes the clients whose worker exited before verifying.
    pub(crate) fn pending_orphans(&mut self) -> Vec<(usize, P)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter(|(_, slot)| !slot.is_occupied())
            .filter_map(|(index, slot)| slot.pending.take().map(|pending| (index, pending)))
            .collect()
    }

    /// Owner labels of the occupied slots, in slot order.
    pub(crate) fn owners(&self) -> Vec<String> {
        self.slots
            .iter()
            .take(self.live_count)
            .filter(|slot| slot.is_occupied())
            .map(|slot| slot.owner.clone())
            .collect()
    }

    /// Occupied slots with their indices.
    pub(crate) fn occupied_mut(&mut self) -> impl Iterator<Item = (usize, &mut WorkerSlot<P>)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter(|(_, slot)| slot.is_occupied())
    }
}
