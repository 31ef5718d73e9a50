//! Event handling.

use crate::event::Event;

/// Trait for consuming events in simulation components.
pub trait EventHandler {
    /// Processes event.
    ///
    /// Called by [`Simulation::step()`](crate::Simulation::step()) when the event time comes.
    /// No asynchronous task is polled while a handler runs, so a handler sees and leaves the shared state
    /// in a consistent form.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::cell::RefCell;
    /// use std::rc::Rc;
    /// use serde::Serialize;
    /// use replay_core::{cast, Event, EventHandler, Simulation};
    ///
    /// #[derive(Clone, Serialize)]
    /// pub struct Tick {
    ///     count: u32,
    /// }
    ///
    /// pub struct Counter {
    ///     total: u32,
    /// }
    ///
    /// impl EventHandler for Counter {
    ///     fn on(&mut self, event: Event) {
    ///         cast!(match event.data {
    ///             Tick { count } => {
    ///                 self.total += count;
    ///             }
    ///         })
    ///     }
    /// }
    ///
    /// let mut sim = Simulation::new();
    /// let counter = Rc::new(RefCell::new(Counter { total: 0 }));
    /// let counter_id = sim.add_handler("counter", counter.clone());
    /// let client = sim.create_context("client");
    /// client.emit(Tick { count: 3 }, counter_id, 1.5);
    /// sim.step_until_no_events();
    /// assert_eq!(counter.borrow().total, 3);
    /// assert_eq!(sim.time(), 1.5);
    /// ```
    fn on(&mut self, event: Event);
}

/// Enables the use of pattern matching syntax for processing different types of events
/// by downcasting the event payload from [`EventData`](crate::event::EventData) to user-defined types.
///
/// Match arms need not be exhaustive. If the payload does not match any of the arms,
/// the event is logged as unhandled under `ERROR` level.
#[macro_export]
macro_rules! cast {
    ( match $event:ident.data { $( $type:ident { $($tt:tt)* } => { $($expr:tt)* } )+ } ) => {
        $(
            if $event.data.is::<$type>() {
                if let Ok(__value) = $event.data.downcast::<$type>() {
                    let $type { $($tt)* } = *__value;
                    $($expr)*
                }
            } else
        )*
        {
            $crate::log::log_unhandled_event($event);
        }
    }
}
