//! Discrete-event engine for replaying workloads in virtual time.
//!
//! Simulation components are either event handlers (see [`EventHandler`]) or asynchronous actors spawned
//! as tasks via [`Simulation::spawn`]. Actors block only at explicit suspension points: virtual timers
//! ([`SimulationContext::sleep`]) and promises completed by other components ([`async_mode::promise`]).
//! The clock jumps to the nearest pending timer or event once every ready task is suspended.

#![warn(missing_docs)]

pub mod async_mode;
pub mod component;
pub mod context;
pub mod event;
pub mod handler;
pub mod log;
pub mod simulation;
mod state;

pub use colored;
pub use component::Id;
pub use context::SimulationContext;
pub use event::{Event, EventData, EventId};
pub use handler::EventHandler;
pub use simulation::Simulation;
pub use state::EPSILON;
