//! Unbounded multi-producer, single-consumer channel.
//!
//! The queue, the wait flag and every write to the closed flag are guarded by one
//! mutex, and a single condition variable parks the consumer while the queue is
//! empty. Because at most one [`Receiver`] exists per channel, at most one thread
//! ever waits on the condition variable. Senders therefore only notify when
//! `waiter_pending` shows that thread is actually parked, instead of on every send.
//!
//! Handles can be explicitly transferred with [`Sender::transfer`] and
//! [`Receiver::transfer`]. The source handle is left invalid, and any further use
//! of it fails with [`MesoError::InvalidHandle`].

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::{Acquire, Release};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::comms::iter::{IntoIter, Iter};
use crate::{HandleKind, MesoError, SendError};

/// Lock-guarded part of the channel.
struct State<T> {
    queue: VecDeque<T>,
    /// Set when the consumer is parked waiting for data.
    waiter_pending: bool,
}

/// Shared state behind every `Sender` and `Receiver` of one channel.
pub(crate) struct Channel<T> {
    state: Mutex<State<T>>,
    available: Condvar,
    /// Only ever written while `state` is locked; false -> true once.
    closed: AtomicBool,
}

/// Every mutation leaves `State` consistent before anything can panic, so a
/// poisoned lock is still safe to use.
fn recover<G>(poisoned: PoisonError<G>) -> G {
    log::warn!("channel lock poisoned by a panicking thread, recovering state");
    poisoned.into_inner()
}

fn moved_out(kind: HandleKind) -> MesoError {
    log::debug!("operation attempted on a {kind} that has been moved out");
    MesoError::InvalidHandle(kind)
}

impl<T> Channel<T> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(State {
                queue: VecDeque::with_capacity(capacity),
                waiter_pending: false,
            }),
            available: Condvar::new(),
            closed: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(recover)
    }

    /// Appends `value` to the tail of the queue, or hands it back if closed.
    pub(crate) fn send(&self, value: T) -> Result<(), SendError<T>> {
        let mut state = self.lock();
        if self.closed.load(Acquire) {
            return Err(SendError::new(value, MesoError::ChannelClosed));
        }
        state.queue.push_back(value);
        if state.waiter_pending {
            state.waiter_pending = false;
            drop(state);
            self.available.notify_one();
        }
        Ok(())
    }

    /// Pops the head of the queue, parking while the channel is open and empty.
    pub(crate) fn receive(&self) -> Option<T> {
        let mut state = self.lock();
        if state.queue.is_empty() && !self.closed.load(Acquire) {
            state.waiter_pending = true;
            log::trace!("receiver parked on an empty channel");
            state = self
                .available
                .wait_while(state, |s| s.queue.is_empty() && !self.closed.load(Acquire))
                .unwrap_or_else(recover);
            log::trace!("receiver woke, {} item(s) queued", state.queue.len());
        }
        state.queue.pop_front()
    }

    /// Like `receive`, but gives up after `timeout`.
    pub(crate) fn receive_timeout(&self, timeout: Duration) -> Option<T> {
        let mut state = self.lock();
        if state.queue.is_empty() && !self.closed.load(Acquire) {
            state.waiter_pending = true;
            let (guard, result) = self
                .available
                .wait_timeout_while(state, timeout, |s| {
                    s.queue.is_empty() && !self.closed.load(Acquire)
                })
                .unwrap_or_else(recover);
            state = guard;
            if result.timed_out() {
                log::trace!("receive timed out after {timeout:?}");
                state.waiter_pending = false;
            }
        }
        state.queue.pop_front()
    }

    /// Pops the head of the queue if there is one. Never parks.
    pub(crate) fn try_receive(&self) -> Option<T> {
        self.lock().queue.pop_front()
    }

    pub(crate) fn close(&self) {
        let mut state = self.lock();
        if !self.closed.swap(true, Release) {
            log::trace!("channel closed with {} item(s) left to drain", state.queue.len());
        }
        if state.waiter_pending {
            state.waiter_pending = false;
            drop(state);
            self.available.notify_one();
        }
    }

    pub(crate) fn closed(&self) -> bool {
        self.closed.load(Acquire)
    }
}

/// Creates a new channel, returning its sending and receiving halves.
pub fn channel<T>() -> (Sender<T>, Receiver<T>) {
    channel_with_capacity(0)
}

/// Creates a new channel with queue storage preallocated for `capacity` items.
///
/// The capacity is only an allocation hint. The channel stays unbounded and
/// [`Sender::send`] never blocks.
pub fn channel_with_capacity<T>(capacity: usize) -> (Sender<T>, Receiver<T>) {
    log::trace!("creating channel with initial capacity {capacity}");
    let channel = Arc::new(Channel::with_capacity(capacity));
    let sender = Sender {
        channel: Some(Arc::clone(&channel)),
    };
    let receiver = Receiver {
        channel: Some(channel),
    };
    (sender, receiver)
}

/// Alias of [`channel`].
pub fn create_channel<T>() -> (Sender<T>, Receiver<T>) {
    channel()
}

/// The sending half of a channel.
///
/// Senders can be cloned freely and shared across threads. Every clone refers
/// to the same queue.
pub struct Sender<T> {
    channel: Option<Arc<Channel<T>>>,
}

impl<T> Sender<T> {
    fn channel(&self) -> Result<&Channel<T>, MesoError> {
        self.channel
            .as_deref()
            .ok_or_else(|| moved_out(HandleKind::Sender))
    }

    /// Enqueues `value` at the tail of the channel. Never blocks.
    ///
    /// Fails with [`MesoError::ChannelClosed`] once the channel has been closed,
    /// or [`MesoError::InvalidHandle`] if this sender was transferred away. In
    /// both cases the value is returned inside the [`SendError`].
    pub fn send(&self, value: T) -> Result<(), SendError<T>> {
        match self.channel.as_deref() {
            Some(channel) => channel.send(value),
            None => Err(SendError::new(value, moved_out(HandleKind::Sender))),
        }
    }

    /// Closes the channel. Closing an already closed channel does nothing.
    ///
    /// Values already queued can still be received.
    pub fn close(&self) -> Result<(), MesoError> {
        self.channel()?.close();
        Ok(())
    }

    /// Returns whether the channel has been closed.
    pub fn closed(&self) -> Result<bool, MesoError> {
        Ok(self.channel()?.closed())
    }

    /// Returns `false` once this handle has been transferred away.
    pub fn is_valid(&self) -> bool {
        self.channel.is_some()
    }

    /// Moves this handle's reference into a new `Sender`, leaving `self` invalid.
    pub fn transfer(&mut self) -> Sender<T> {
        log::debug!("transferring sender (valid: {})", self.is_valid());
        Sender {
            channel: self.channel.take(),
        }
    }
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Self {
            channel: self.channel.clone(),
        }
    }
}

impl<T> fmt::Debug for Sender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sender")
            .field("valid", &self.is_valid())
            .field("closed", &self.channel.as_deref().map(Channel::closed))
            .finish()
    }
}

/// The receiving half of a channel.
///
/// There is exactly one `Receiver` per channel. It cannot be cloned, and every
/// receiving method takes `&mut self` so only one thread can wait on it at a time.
pub struct Receiver<T> {
    channel: Option<Arc<Channel<T>>>,
}

impl<T> Receiver<T> {
    fn channel(&self) -> Result<&Channel<T>, MesoError> {
        self.channel
            .as_deref()
            .ok_or_else(|| moved_out(HandleKind::Receiver))
    }

    /// Receives the next value, blocking while the channel is open and empty.
    ///
    /// Returns `Ok(None)` once the channel is closed and fully drained; from then
    /// on it never blocks again.
    pub fn receive(&mut self) -> Result<Option<T>, MesoError> {
        Ok(self.channel()?.receive())
    }

    /// Receives the next value if one is queued, without blocking.
    pub fn try_receive(&mut self) -> Result<Option<T>, MesoError> {
        Ok(self.channel()?.try_receive())
    }

    /// Like [`receive`](Receiver::receive), but returns `Ok(None)` if nothing
    /// arrives within `timeout`.
    pub fn receive_timeout(&mut self, timeout: Duration) -> Result<Option<T>, MesoError> {
        Ok(self.channel()?.receive_timeout(timeout))
    }

    /// Returns whether the channel has been closed.
    pub fn closed(&self) -> Result<bool, MesoError> {
        Ok(self.channel()?.closed())
    }

    /// Returns `false` once this handle has been transferred away.
    pub fn is_valid(&self) -> bool {
        self.channel.is_some()
    }

    /// Moves this handle's reference into a new `Receiver`, leaving `self` invalid.
    pub fn transfer(&mut self) -> Receiver<T> {
        log::debug!("transferring receiver (valid: {})", self.is_valid());
        Receiver {
            channel: self.channel.take(),
        }
    }

    /// Returns a blocking iterator that yields values until the channel is closed
    /// and drained.
    pub fn iter(&mut self) -> Result<Iter<'_, T>, MesoError> {
        self.channel()?;
        Ok(Iter::new(self))
    }
}

impl<T> fmt::Debug for Receiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver")
            .field("valid", &self.is_valid())
            .field("closed", &self.channel.as_deref().map(Channel::closed))
            .finish()
    }
}

impl<T> IntoIterator for Receiver<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> IntoIter<T> {
        IntoIter::new(self)
    }
}

impl<'a, T> IntoIterator for &'a mut Receiver<T> {
    type Item = T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        Iter::new(self)
    }
}
