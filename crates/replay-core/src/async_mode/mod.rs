//! Asynchronous actors support.
//!
//! Actor bodies are plain futures spawned as tasks. A task is polled by the executor when it is spawned and
//! each time one of its wakers fires. Wakers fire only from timers and promises completed inside
//! [`Simulation::step()`](crate::Simulation::step()), so every task resumes at a well-defined virtual time.

pub mod promise;
pub mod timer_future;

pub(crate) mod channel;
pub(crate) mod executor;
pub(crate) mod task;
pub(crate) mod waker;

pub use promise::{Promise, PromiseFuture};
pub use timer_future::TimerFuture;
