//! Command channel between caller threads and the update thread
//!
//! Callers record what they want in the pending bitmask (and the request
//! payload next to it) under the update lock, then send a wake-up on a
//! channel of capacity one. A full channel means a wake-up is already
//! pending, so bursts of requests collapse into one wake-up while the bits
//! accumulate. The update thread takes the whole bitmask at once and
//! acknowledges every request epoch up to the one it took.
//!
//! Lock order is update lock, then main lock. Neither side holds both.

use std::collections::VecDeque;
use std::ops::{BitOr, BitOrAssign};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Condvar, Mutex, MutexGuard};

use crate::error::{AosdError, Result};

/// Operations requested from the update thread
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateFlags(u16);

impl UpdateFlags {
    pub const NONE: Self = Self(0);
    pub const HIDE: Self = Self(1 << 1);
    pub const SHOW: Self = Self(1 << 2);
    pub const SIZE: Self = Self(1 << 3);
    pub const POS: Self = Self(1 << 4);
    pub const RENDER: Self = Self(1 << 5);
    pub const TIME: Self = Self(1 << 6);
    /// Transparency mode (visual/colormap) change
    pub const MODE: Self = Self(1 << 7);
    pub const MOUSE: Self = Self(1 << 8);
    pub const NAME: Self = Self(1 << 9);
    pub const FINISH: Self = Self(1 << 15);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for UpdateFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for UpdateFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl std::fmt::Debug for UpdateFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const NAMES: [(UpdateFlags, &str); 10] = [
            (UpdateFlags::HIDE, "HIDE"),
            (UpdateFlags::SHOW, "SHOW"),
            (UpdateFlags::SIZE, "SIZE"),
            (UpdateFlags::POS, "POS"),
            (UpdateFlags::RENDER, "RENDER"),
            (UpdateFlags::TIME, "TIME"),
            (UpdateFlags::MODE, "MODE"),
            (UpdateFlags::MOUSE, "MOUSE"),
            (UpdateFlags::NAME, "NAME"),
            (UpdateFlags::FINISH, "FINISH"),
        ];
        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            write!(f, "NONE")
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}

/// Everything posted since the update thread last looked
#[derive(Debug, Default)]
pub struct Batch<P> {
    pub flags: UpdateFlags,
    /// Newest request epoch covered by this batch
    pub epoch: u64,
    pub payload: P,
}

struct UpdateState<P> {
    pending: UpdateFlags,
    epoch: u64,
    payload: P,
    finishing: bool,
}

struct Failure {
    first: u64,
    last: u64,
    error: AosdError,
}

/// Recent failures kept for callers that have not woken up yet
const FAILURE_HISTORY: usize = 16;

#[derive(Default)]
struct AckState {
    completed: u64,
    cycles_done: u64,
    failures: VecDeque<Failure>,
    finished: bool,
}

pub struct CommandChannel<P> {
    update: Mutex<UpdateState<P>>,
    main: Mutex<AckState>,
    main_cond: Condvar,
    wake_tx: SyncSender<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl<P: Default> CommandChannel<P> {
    /// Create the channel and the wake-up receiver for the update thread
    pub fn new() -> (Self, Receiver<()>) {
        let (wake_tx, wake_rx) = mpsc::sync_channel(1);
        let channel = Self {
            update: Mutex::new(UpdateState {
                pending: UpdateFlags::NONE,
                epoch: 0,
                payload: P::default(),
                finishing: false,
            }),
            main: Mutex::new(AckState::default()),
            main_cond: Condvar::new(),
            wake_tx,
        };
        (channel, wake_rx)
    }

    /// Record `flags` and let `fill` update the payload, then wake the
    /// update thread. `fill` receives the epoch of this request, which is
    /// also returned for waiting on.
    pub fn post(&self, flags: UpdateFlags, fill: impl FnOnce(&mut P, u64)) -> Result<u64> {
        let epoch = {
            let mut state = lock(&self.update);
            if state.finishing {
                return Err(AosdError::Finished);
            }
            state.epoch += 1;
            let epoch = state.epoch;
            fill(&mut state.payload, epoch);
            state.pending |= flags;
            if flags.contains(UpdateFlags::FINISH) {
                state.finishing = true;
            }
            state.epoch
        };
        self.wake();
        Ok(epoch)
    }

    /// Nudge the update thread without posting anything
    pub fn wake(&self) {
        // Full: a wake-up is already queued and will see our bits.
        // Disconnected: the update thread is gone and `finished` says so.
        if let Err(TrySendError::Disconnected(())) = self.wake_tx.try_send(()) {
            tracing::trace!("wake-up after update thread exit");
        }
    }

    /// Block until the update thread has processed `epoch`
    pub fn wait_ack(&self, epoch: u64) -> Result<()> {
        let mut ack = lock(&self.main);
        while ack.completed < epoch && !ack.finished {
            ack = self.main_cond.wait(ack).unwrap_or_else(|e| e.into_inner());
        }
        if ack.completed < epoch {
            return Err(AosdError::Finished);
        }
        match ack
            .failures
            .iter()
            .find(|f| f.first <= epoch && epoch <= f.last)
        {
            Some(failure) => Err(failure.error.clone()),
            None => Ok(()),
        }
    }

    /// Block until the fade cycle started by `epoch` is over
    pub fn wait_cycle(&self, epoch: u64) -> Result<()> {
        let mut ack = lock(&self.main);
        while ack.cycles_done < epoch && !ack.finished {
            ack = self.main_cond.wait(ack).unwrap_or_else(|e| e.into_inner());
        }
        if ack.cycles_done < epoch {
            return Err(AosdError::Finished);
        }
        Ok(())
    }

    /// Post and wait in one go
    pub fn request(&self, flags: UpdateFlags, fill: impl FnOnce(&mut P, u64)) -> Result<()> {
        let epoch = self.post(flags, fill)?;
        self.wait_ack(epoch)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Update thread side
    // ─────────────────────────────────────────────────────────────────────────

    /// Snapshot and clear the pending bits
    pub fn take(&self) -> Batch<P> {
        let mut state = lock(&self.update);
        Batch {
            flags: std::mem::take(&mut state.pending),
            epoch: state.epoch,
            payload: std::mem::take(&mut state.payload),
        }
    }

    /// Acknowledge every epoch in `(previous, batch_epoch]`
    pub fn complete(&self, previous: u64, batch_epoch: u64, result: Result<()>) {
        if batch_epoch <= previous {
            return;
        }
        let mut ack = lock(&self.main);
        if let Err(error) = result {
            if ack.failures.len() == FAILURE_HISTORY {
                ack.failures.pop_front();
            }
            ack.failures.push_back(Failure {
                first: previous + 1,
                last: batch_epoch,
                error,
            });
        }
        ack.completed = ack.completed.max(batch_epoch);
        self.main_cond.notify_all();
    }

    /// The cycle started at `epoch` (and any older one) has ended
    pub fn cycle_done(&self, epoch: u64) {
        let mut ack = lock(&self.main);
        ack.cycles_done = ack.cycles_done.max(epoch);
        self.main_cond.notify_all();
    }

    /// The update thread is gone; release every waiter
    pub fn mark_finished(&self) {
        lock(&self.update).finishing = true;
        let mut ack = lock(&self.main);
        ack.finished = true;
        self.main_cond.notify_all();
    }

    pub fn is_finished(&self) -> bool {
        lock(&self.main).finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_burst_collapses_into_one_wake() {
        let (channel, wake_rx) = CommandChannel::<Vec<u32>>::new();
        channel.post(UpdateFlags::HIDE, |p, _| p.push(1)).unwrap();
        channel.post(UpdateFlags::SIZE, |p, _| p.push(2)).unwrap();
        channel
            .post(UpdateFlags::POS | UpdateFlags::RENDER, |p, _| p.push(3))
            .unwrap();

        assert!(wake_rx.try_recv().is_ok());
        assert!(wake_rx.try_recv().is_err(), "wake-ups must coalesce");

        let batch = channel.take();
        assert!(batch.flags.contains(UpdateFlags::HIDE | UpdateFlags::SIZE));
        assert!(batch.flags.contains(UpdateFlags::POS | UpdateFlags::RENDER));
        assert_eq!(batch.epoch, 3);
        assert_eq!(batch.payload, vec![1, 2, 3]);
        assert!(channel.take().flags.is_empty());
    }

    #[test]
    fn test_concurrent_posts_are_never_lost() {
        let (channel, wake_rx) = CommandChannel::<u32>::new();
        let channel = Arc::new(channel);
        let flags = [
            UpdateFlags::HIDE,
            UpdateFlags::SHOW,
            UpdateFlags::SIZE,
            UpdateFlags::POS,
            UpdateFlags::RENDER,
            UpdateFlags::MODE,
        ];

        let handles: Vec<_> = flags
            .iter()
            .map(|&flag| {
                let channel = Arc::clone(&channel);
                thread::spawn(move || channel.post(flag, |count, _| *count += 1).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        wake_rx.recv().unwrap();
        let batch = channel.take();
        for flag in flags {
            assert!(batch.flags.contains(flag), "{flag:?} dropped");
        }
        assert_eq!(batch.payload, 6);
        assert_eq!(batch.epoch, 6);
    }

    #[test]
    fn test_ack_releases_waiter_and_reports_failure() {
        let (channel, wake_rx) = CommandChannel::<()>::new();
        let channel = Arc::new(channel);

        let worker = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || {
                wake_rx.recv().unwrap();
                let batch = channel.take();
                channel.complete(0, batch.epoch, Err(AosdError::Backend("boom".into())));
            })
        };

        let result = channel.request(UpdateFlags::RENDER, |_, _| {});
        worker.join().unwrap();
        assert_eq!(result, Err(AosdError::Backend("boom".into())));
    }

    #[test]
    fn test_finish_rejects_later_posts_and_frees_waiters() {
        let (channel, _wake_rx) = CommandChannel::<()>::new();
        let epoch = channel.post(UpdateFlags::FINISH, |_, _| {}).unwrap();
        assert_eq!(
            channel.post(UpdateFlags::SHOW, |_, _| {}),
            Err(AosdError::Finished)
        );

        channel.mark_finished();
        assert_eq!(channel.wait_ack(epoch), Err(AosdError::Finished));
        assert_eq!(channel.wait_cycle(epoch), Err(AosdError::Finished));
    }

    #[test]
    fn test_flag_debug_lists_names() {
        let flags = UpdateFlags::SHOW | UpdateFlags::TIME;
        assert_eq!(format!("{flags:?}"), "SHOW|TIME");
        assert_eq!(format!("{:?}", UpdateFlags::NONE), "NONE");
    }
}
