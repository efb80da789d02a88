//! Virtual-clock timers and animation frames
//!
//! Time only moves when the embedder advances it, which keeps hover intent
//! delays, debounces and frame deferrals deterministic. Execution happens on
//! [`Document`](crate::dom::Document) so callbacks never run while the
//! scheduler is borrowed.

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Handle to a pending timeout
    pub struct TimerId;
    /// Handle to a pending animation-frame callback
    pub struct FrameId;
}

/// Deferred callback
pub type TaskCallback = Box<dyn FnOnce()>;

struct TimerEntry {
    due_ms: u64,
    seq: u64,
    callback: TaskCallback,
}

struct FrameEntry {
    seq: u64,
    callback: TaskCallback,
}

/// Pending timeouts and frame callbacks plus the current virtual time
#[derive(Default)]
pub(crate) struct Scheduler {
    now_ms: u64,
    seq: u64,
    timers: SlotMap<TimerId, TimerEntry>,
    frames: SlotMap<FrameId, FrameEntry>,
}

impl Scheduler {
    pub(crate) fn now(&self) -> u64 {
        self.now_ms
    }

    pub(crate) fn set_now(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    pub(crate) fn set_timeout(&mut self, delay_ms: u64, callback: TaskCallback) -> TimerId {
        let seq = self.next_seq();
        let due_ms = self.now_ms.saturating_add(delay_ms);
        self.timers.insert(TimerEntry {
            due_ms,
            seq,
            callback,
        })
    }

    pub(crate) fn clear_timeout(&mut self, id: TimerId) -> bool {
        self.timers.remove(id).is_some()
    }

    pub(crate) fn request_frame(&mut self, callback: TaskCallback) -> FrameId {
        let seq = self.next_seq();
        self.frames.insert(FrameEntry { seq, callback })
    }

    pub(crate) fn cancel_frame(&mut self, id: FrameId) -> bool {
        self.frames.remove(id).is_some()
    }

    pub(crate) fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub(crate) fn pending_frames(&self) -> usize {
        self.frames.len()
    }

    /// Earliest timer due at or before `until_ms`, ties broken by insertion order
    pub(crate) fn next_due(&self, until_ms: u64) -> Option<TimerId> {
        self.timers
            .iter()
            .filter(|(_, t)| t.due_ms <= until_ms)
            .min_by_key(|(_, t)| (t.due_ms, t.seq))
            .map(|(id, _)| id)
    }

    /// Remove a timer, returning its due time and callback
    pub(crate) fn take_timer(&mut self, id: TimerId) -> Option<(u64, TaskCallback)> {
        self.timers.remove(id).map(|t| (t.due_ms, t.callback))
    }

    /// Ids of the frames queued so far, oldest first
    pub(crate) fn queued_frames(&self) -> Vec<FrameId> {
        let mut frames: Vec<_> = self.frames.iter().map(|(id, f)| (f.seq, id)).collect();
        frames.sort_unstable_by_key(|(seq, _)| *seq);
        frames.into_iter().map(|(_, id)| id).collect()
    }

    pub(crate) fn take_frame(&mut self, id: FrameId) -> Option<TaskCallback> {
        self.frames.remove(id).map(|f| f.callback)
    }
}
