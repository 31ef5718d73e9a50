//! Accessing simulation from components.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use crate::async_mode::TimerFuture;
use crate::component::Id;
use crate::event::{EventData, EventId};
use crate::log_warn;
use crate::state::{SimulationState, EPSILON};

/// A facade for accessing the simulation state and producing events from simulation components.
pub struct SimulationContext {
    id: Id,
    name: String,
    sim_state: Rc<RefCell<SimulationState>>,
}

impl SimulationContext {
    pub(crate) fn new(id: Id, name: &str, sim_state: Rc<RefCell<SimulationState>>) -> Self {
        Self {
            id,
            name: name.to_owned(),
            sim_state,
        }
    }

    /// Returns the identifier of component associated with this context.
    pub fn id(&self) -> Id {
        self.id
    }

    /// Returns the name of component associated with this context.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current simulation time.
    pub fn time(&self) -> f64 {
        self.sim_state.borrow().time()
    }

    /// Creates new event with specified payload, destination and delay.
    ///
    /// Panics if the delay is negative.
    pub fn emit<T>(&self, data: T, dst: Id, delay: f64) -> EventId
    where
        T: EventData,
    {
        self.sim_state.borrow_mut().add_event(data, self.id, dst, delay)
    }

    /// Creates new immediate (zero-delay) event with specified payload and destination.
    pub fn emit_now<T>(&self, data: T, dst: Id) -> EventId
    where
        T: EventData,
    {
        self.sim_state.borrow_mut().add_event(data, self.id, dst, 0.)
    }

    /// Creates new event for itself with specified payload and delay.
    pub fn emit_self<T>(&self, data: T, delay: f64) -> EventId
    where
        T: EventData,
    {
        self.sim_state.borrow_mut().add_event(data, self.id, self.id, delay)
    }

    /// Cancels the specified event.
    ///
    /// Cancelling already delivered event has no effect.
    pub fn cancel_event(&self, id: EventId) {
        self.sim_state.borrow_mut().cancel_event(id);
    }

    /// Suspends the calling actor for `duration` units of virtual time.
    ///
    /// The returned future resolves when the clock reaches `time() + duration`.
    /// Negative duration is clamped to zero, so the clock never goes backward. The clamp is logged
    /// as a warning unless the value is a floating-point residue within [`EPSILON`].
    ///
    /// Panics if the duration is NaN.
    pub fn sleep(&self, duration: f64) -> TimerFuture {
        assert!(!duration.is_nan(), "Sleep duration is NaN");
        if duration < -EPSILON {
            log_warn!(self, "negative sleep duration {:.6} is clamped to zero", duration);
        }
        let duration = duration.max(0.);
        self.sim_state
            .borrow_mut()
            .create_timer(self.id, duration, self.sim_state.clone())
    }

    /// Spawns a new asynchronous task on behalf of this component.
    pub fn spawn(&self, future: impl Future<Output = ()> + 'static) {
        self.sim_state.borrow_mut().spawn(future);
    }

    /// Returns the name of component by its identifier.
    ///
    /// Panics if component with such Id does not exist.
    pub fn lookup_name(&self, id: Id) -> String {
        match self.sim_state.borrow().lookup_name(id) {
            Some(name) => name.to_owned(),
            None => panic!("Component with id {} does not exist", id),
        }
    }
}
