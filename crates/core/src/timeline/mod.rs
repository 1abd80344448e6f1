use std::{collections::BTreeSet, time::Duration};

/// Opaque handle returned by [`FrameScheduler::request_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameRequestId(u64);

/// Queue of pending display-refresh callbacks.
///
/// A request made while a frame is being serviced fires on the following
/// frame, never on the current one.
#[derive(Debug, Default)]
pub struct FrameScheduler {
    next_id: u64,
    pending: BTreeSet<FrameRequestId>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_frame(&mut self) -> FrameRequestId {
        self.next_id += 1;
        let id = FrameRequestId(self.next_id);
        self.pending.insert(id);
        id
    }

    /// Returns `true` when the request was still pending.
    pub fn cancel_frame(&mut self, id: FrameRequestId) -> bool {
        self.pending.remove(&id)
    }

    pub fn is_pending(&self, id: FrameRequestId) -> bool {
        self.pending.contains(&id)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drains every request due on this frame, oldest first.
    pub fn take_due(&mut self) -> Vec<FrameRequestId> {
        std::mem::take(&mut self.pending).into_iter().collect()
    }
}

/// Monotonic clock fed by frame timestamps from the host.
#[derive(Debug, Default, Clone)]
pub struct PlaybackClock {
    last_frame: Option<Duration>,
}

impl PlaybackClock {
    pub fn reset(&mut self) {
        self.last_frame = None;
    }

    /// Records a frame timestamp, ignoring any that would move time
    /// backwards, and returns the clock's current reading.
    pub fn advance(&mut self, timestamp: Duration) -> Duration {
        let now = match self.last_frame {
            Some(last) if last > timestamp => last,
            _ => timestamp,
        };
        self.last_frame = Some(now);
        now
    }

    pub fn now(&self) -> Duration {
        self.last_frame.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_requests_never_fire() {
        let mut scheduler = FrameScheduler::new();
        let kept = scheduler.request_frame();
        let dropped = scheduler.request_frame();

        assert!(scheduler.cancel_frame(dropped));
        assert!(!scheduler.cancel_frame(dropped));
        assert_eq!(scheduler.take_due(), vec![kept]);
        assert_eq!(scheduler.pending_len(), 0);
    }

    #[test]
    fn requests_made_while_servicing_wait_for_the_next_frame() {
        let mut scheduler = FrameScheduler::new();
        let first = scheduler.request_frame();

        let due = scheduler.take_due();
        assert_eq!(due, vec![first]);
        let second = scheduler.request_frame();
        assert_ne!(first, second);
        assert!(scheduler.is_pending(second));
        assert_eq!(scheduler.take_due(), vec![second]);
        assert!(scheduler.take_due().is_empty());
    }

    #[test]
    fn clock_is_monotonic() {
        let mut clock = PlaybackClock::default();
        assert_eq!(clock.advance(Duration::from_millis(20)), Duration::from_millis(20));
        assert_eq!(clock.advance(Duration::from_millis(10)), Duration::from_millis(20));
        assert_eq!(clock.advance(Duration::from_millis(36)), Duration::from_millis(36));

        clock.reset();
        assert_eq!(clock.now(), Duration::ZERO);
    }
}
