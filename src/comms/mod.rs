//! Multi-producer, single-consumer (MPSC) channels.
//!
//! The `mpsc` submodule contains the channel itself and its `Sender`/`Receiver`
//! handles, while `iter` provides blocking iterators that drain a `Receiver`
//! until the channel is closed.
pub mod iter;
pub mod mpsc;
