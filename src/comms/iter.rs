//! Blocking iterators over a [`Receiver`].
//!
//! Each call to `next` is one [`Receiver::receive`], so advancing may park the
//! calling thread. Iteration ends once the channel is closed and drained, and
//! both iterators are fused from that point on.
use std::iter::FusedIterator;

use crate::comms::mpsc::Receiver;

/// Borrowing iterator, created by [`Receiver::iter`] or `&mut receiver`.
#[derive(Debug)]
pub struct Iter<'a, T> {
    receiver: &'a mut Receiver<T>,
    done: bool,
}

impl<'a, T> Iter<'a, T> {
    pub(crate) fn new(receiver: &'a mut Receiver<T>) -> Self {
        Self {
            receiver,
            done: false,
        }
    }
}

/// Owning iterator, created by calling `into_iter` on a [`Receiver`].
#[derive(Debug)]
pub struct IntoIter<T> {
    receiver: Receiver<T>,
    done: bool,
}

impl<T> IntoIter<T> {
    pub(crate) fn new(receiver: Receiver<T>) -> Self {
        Self {
            receiver,
            done: false,
        }
    }

    /// Gives back the underlying receiver.
    pub fn into_inner(self) -> Receiver<T> {
        self.receiver
    }
}

fn advance<T>(receiver: &mut Receiver<T>, done: &mut bool) -> Option<T> {
    if *done {
        return None;
    }
    match receiver.receive() {
        Ok(Some(value)) => Some(value),
        Ok(None) => {
            *done = true;
            None
        }
        Err(err) => {
            log::debug!("iteration stopped: {err}");
            *done = true;
            None
        }
    }
}

impl<T> Iterator for Iter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        advance(self.receiver, &mut self.done)
    }
}

impl<T> FusedIterator for Iter<'_, T> {}

impl<T> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        advance(&mut self.receiver, &mut self.done)
    }
}

impl<T> FusedIterator for IntoIter<T> {}
