//! Unbounded multi-producer, single-consumer channels for OS threads.
//!
//! A call to [`channel`] returns a cloneable [`Sender`] and a unique [`Receiver`]
//! sharing one queue. Senders never block. The receiver blocks while the queue is
//! empty and the channel is open; once any sender calls [`Sender::close`] and the
//! queue drains, [`Receiver::receive`] returns `None` without blocking.
//!
//! ```
//! use std::thread;
//!
//! let (tx, mut rx) = mesocarp_mpsc::channel::<u32>();
//!
//! let producers: Vec<_> = (0..4)
//!     .map(|i| {
//!         let tx = tx.clone();
//!         thread::spawn(move || tx.send(i).unwrap())
//!     })
//!     .collect();
//! for handle in producers {
//!     handle.join().unwrap();
//! }
//! tx.close().unwrap();
//!
//! let mut received: Vec<u32> = rx.iter().unwrap().collect();
//! received.sort();
//! assert_eq!(received, vec![0, 1, 2, 3]);
//! ```
use std::fmt::{self, Debug, Display};

use thiserror::Error;

pub mod comms;

pub use comms::iter::{IntoIter, Iter};
pub use comms::mpsc::{channel, channel_with_capacity, create_channel, Receiver, Sender};

/// Which side of a channel a handle belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HandleKind {
    Sender,
    Receiver,
}

impl Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleKind::Sender => write!(f, "sender"),
            HandleKind::Receiver => write!(f, "receiver"),
        }
    }
}

/// Error type for all channel operations
#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
pub enum MesoError {
    #[error("This channel has been closed")]
    ChannelClosed,
    #[error("This {0} has been moved out")]
    InvalidHandle(HandleKind),
}

/// A failed send. The rejected value is handed back to the caller.
#[derive(Error, PartialEq, Eq)]
#[error("{kind}")]
pub struct SendError<T> {
    value: T,
    kind: MesoError,
}

impl<T> SendError<T> {
    pub(crate) fn new(value: T, kind: MesoError) -> Self {
        Self { value, kind }
    }

    /// Why the send failed.
    pub fn kind(&self) -> MesoError {
        self.kind
    }

    /// Takes back the value that was not enqueued.
    pub fn into_inner(self) -> T {
        self.value
    }
}

// no `T: Debug` bound, queued payloads need not be printable
impl<T> Debug for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendError")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl<T> From<SendError<T>> for MesoError {
    fn from(err: SendError<T>) -> Self {
        err.kind
    }
}
