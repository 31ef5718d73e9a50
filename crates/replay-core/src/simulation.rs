//! Simulation configuration and execution.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use log::Level::Trace;
use log::{debug, log_enabled, trace};
use serde_json::json;
use serde_type_name::type_name;

use crate::async_mode::channel::channel;
use crate::async_mode::executor::Executor;
use crate::component::Id;
use crate::context::SimulationContext;
use crate::handler::EventHandler;
use crate::log::{get_colored, log_undelivered_event};
use crate::state::SimulationState;

/// Represents a simulation, provides methods for its configuration and execution.
///
/// The simulation is driven by a single logical thread of control. Each [`step()`](Self::step()) runs every
/// ready actor task until it is suspended, then takes the earliest pending timer or event, advances the clock to
/// its time and fires it. A timer goes before an event with the same time, and equal-time timers (or events) go
/// in creation order, so runs are reproducible given the same inputs.
///
/// # Examples
///
/// ```rust
/// use replay_core::Simulation;
///
/// let mut sim = Simulation::new();
/// let ctx = sim.create_context("actor");
/// sim.spawn(async move {
///     ctx.sleep(2.5).await;
///     assert_eq!(ctx.time(), 2.5);
/// });
/// sim.step_until_no_events();
/// assert_eq!(sim.time(), 2.5);
/// ```
pub struct Simulation {
    sim_state: Rc<RefCell<SimulationState>>,
    handlers: Vec<Option<Rc<RefCell<dyn EventHandler>>>>,
    executor: Executor,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulation {
    /// Creates a new simulation.
    pub fn new() -> Self {
        let (task_sender, scheduled_tasks) = channel();
        Self {
            sim_state: Rc::new(RefCell::new(SimulationState::new(task_sender))),
            handlers: Vec::new(),
            executor: Executor::new(scheduled_tasks),
        }
    }

    fn register(&mut self, name: &str) -> Id {
        let id = self.sim_state.borrow_mut().register(name);
        if self.handlers.len() <= id as usize {
            self.handlers.resize_with(id as usize + 1, || None);
        }
        id
    }

    /// Returns the identifier of component by its name.
    ///
    /// Panics if component with such name does not exist.
    pub fn lookup_id(&self, name: &str) -> Id {
        match self.sim_state.borrow().lookup_id(name) {
            Some(id) => id,
            None => panic!("Component {} does not exist", name),
        }
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

    /// Creates a new simulation context with specified name.
    ///
    /// Component ids are assigned sequentially starting from 0.
    /// Creating a context for an already registered name reuses its id.
    pub fn create_context<S>(&mut self, name: S) -> SimulationContext
    where
        S: AsRef<str>,
    {
        let id = self.register(name.as_ref());
        let ctx = SimulationContext::new(id, name.as_ref(), self.sim_state.clone());
        debug!(
            target: "simulation",
            "[{:.3} {} simulation] Created context: {}",
            self.time(),
            get_colored("DEBUG", colored::Color::Blue),
            json!({"name": ctx.name(), "id": ctx.id()})
        );
        ctx
    }

    /// Registers the event handler implementation for component with specified name, returns the component Id.
    pub fn add_handler<S>(&mut self, name: S, handler: Rc<RefCell<dyn EventHandler>>) -> Id
    where
        S: AsRef<str>,
    {
        let id = self.register(name.as_ref());
        self.handlers[id as usize] = Some(handler);
        debug!(
            target: "simulation",
            "[{:.3} {} simulation] Added handler: {}",
            self.time(),
            get_colored("DEBUG", colored::Color::Blue),
            json!({"name": name.as_ref(), "id": id})
        );
        id
    }

    /// Spawns an actor body as a new asynchronous task.
    ///
    /// The task is first polled on the next [`step()`](Self::step()). Tasks are polled in the order they are
    /// spawned or woken.
    pub fn spawn(&self, future: impl Future<Output = ()> + 'static) {
        self.sim_state.borrow_mut().spawn(future);
    }

    /// Returns the current simulation time.
    pub fn time(&self) -> f64 {
        self.sim_state.borrow().time()
    }

    /// Performs a single step through the simulation.
    ///
    /// Polls ready tasks, then fires the next timer or delivers the next event and polls the tasks woken by it.
    /// If there is no handler registered for the event destination, logs the undelivered event and discards it.
    ///
    /// Returns `true` if some timer or event was processed and `false` otherwise. The latter means that every
    /// actor is either finished or waits for something that will never happen, so no progress can be made.
    pub fn step(&mut self) -> bool {
        self.executor.process_tasks();
        let timer_first = {
            let mut state = self.sim_state.borrow_mut();
            let timer_time = state.peek_timer().map(|timer| timer.time);
            let event_time = state.peek_event().map(|event| event.time);
            match (timer_time, event_time) {
                (None, None) => return false,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (Some(timer_time), Some(event_time)) => timer_time <= event_time,
            }
        };
        if timer_first {
            self.process_timer();
        } else {
            self.process_event();
        }
        self.executor.process_tasks();
        true
    }

    fn process_timer(&mut self) {
        let timer = self.sim_state.borrow_mut().next_timer();
        if let Some(timer) = timer {
            if log_enabled!(Trace) {
                let component_name = self.lookup_name(timer.component_id);
                trace!(
                    target: &component_name,
                    "[{:.3} {} {}] {}",
                    timer.time,
                    get_colored("TIMER", colored::Color::BrightBlack),
                    component_name,
                    json!({"timer_id": timer.id})
                );
            }
            timer.complete();
        }
    }

    fn process_event(&mut self) {
        let next = self.sim_state.borrow_mut().next_event();
        if let Some(event) = next {
            let handler = self.handlers.get(event.dst as usize).cloned().flatten();
            if let Some(handler) = handler {
                if log_enabled!(Trace) {
                    let src_name = self.lookup_name(event.src);
                    let dst_name = self.lookup_name(event.dst);
                    trace!(
                        target: &dst_name,
                        "[{:.3} {} {}] {}",
                        event.time,
                        get_colored("EVENT", colored::Color::BrightBlack),
                        dst_name,
                        json!({"type": type_name(&event.data).unwrap_or("?"), "data": event.data, "src": src_name})
                    );
                }
                handler.borrow_mut().on(event);
            } else {
                log_undelivered_event(event);
            }
        }
    }

    /// Steps through the simulation until there are no pending timers or events left.
    pub fn step_until_no_events(&mut self) {
        while self.step() {}
    }

    /// Steps through the simulation until the next timer or event time is above the specified time.
    ///
    /// The clock is then moved to `time` (if it is ahead of the current time).
    /// Returns `true` if there could be more pending timers or events and `false` otherwise.
    pub fn step_until_time(&mut self, time: f64) -> bool {
        self.executor.process_tasks();
        let result = loop {
            let next_time = {
                let mut state = self.sim_state.borrow_mut();
                let timer_time = state.peek_timer().map(|timer| timer.time);
                let event_time = state.peek_event().map(|event| event.time);
                match (timer_time, event_time) {
                    (None, None) => None,
                    (Some(t), None) | (None, Some(t)) => Some(t),
                    (Some(t1), Some(t2)) => Some(t1.min(t2)),
                }
            };
            match next_time {
                Some(next_time) if next_time <= time => {
                    self.step();
                }
                Some(_) => break true,
                None => break false,
            }
        };
        self.sim_state.borrow_mut().advance_time(time);
        result
    }

    /// Steps through the simulation with duration limit.
    ///
    /// A convenient wrapper around [`step_until_time()`](Self::step_until_time()).
    pub fn step_for_duration(&mut self, duration: f64) -> bool {
        let end_time = self.time() + duration;
        self.step_until_time(end_time)
    }

    /// Returns the total number of created events.
    ///
    /// Cancelled events are also counted here.
    pub fn event_count(&self) -> u64 {
        self.sim_state.borrow().event_count()
    }

    /// Returns the total number of created timers.
    pub fn timer_count(&self) -> u64 {
        self.sim_state.borrow().timer_count()
    }
}
