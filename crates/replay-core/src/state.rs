use std::cell::RefCell;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::future::Future;
use std::rc::Rc;

use crate::async_mode::channel::Sender;
use crate::async_mode::task::Task;
use crate::async_mode::timer_future::{TimerFuture, TimerId, TimerPromise};
use crate::component::Id;
use crate::event::{Event, EventData, EventId};
use crate::log::log_incorrect_event;

/// Epsilon to compare floating point values for equality.
pub const EPSILON: f64 = 1e-12;

// Shared simulation state: virtual clock, pending events and timers, registered component names.
pub(crate) struct SimulationState {
    clock: f64,
    events: BinaryHeap<Event>,
    canceled_events: HashSet<EventId>,
    event_count: u64,

    timers: BinaryHeap<TimerPromise>,
    canceled_timers: HashSet<TimerId>,
    timer_count: u64,

    component_name_to_id: HashMap<String, Id>,
    component_names: Vec<String>,

    executor: Sender<Rc<Task>>,
}

impl SimulationState {
    pub fn new(executor: Sender<Rc<Task>>) -> Self {
        Self {
            clock: 0.0,
            events: BinaryHeap::new(),
            canceled_events: HashSet::new(),
            event_count: 0,
            timers: BinaryHeap::new(),
            canceled_timers: HashSet::new(),
            timer_count: 0,
            component_name_to_id: HashMap::new(),
            component_names: Vec::new(),
            executor,
        }
    }

    // Components ------------------------------------------------------------------------------------------------------

    pub fn register(&mut self, name: &str) -> Id {
        if let Some(&id) = self.component_name_to_id.get(name) {
            return id;
        }
        let id = self.component_names.len() as Id;
        self.component_name_to_id.insert(name.to_owned(), id);
        self.component_names.push(name.to_owned());
        id
    }

    pub fn lookup_id(&self, name: &str) -> Option<Id> {
        self.component_name_to_id.get(name).copied()
    }

    pub fn lookup_name(&self, id: Id) -> Option<&str> {
        self.component_names.get(id as usize).map(|s| s.as_str())
    }

    // Clock -----------------------------------------------------------------------------------------------------------

    pub fn time(&self) -> f64 {
        self.clock
    }

    // Only moves the clock forward.
    pub fn advance_time(&mut self, time: f64) {
        if time > self.clock {
            self.clock = time;
        }
    }

    // Events ----------------------------------------------------------------------------------------------------------

    pub fn add_event<T>(&mut self, data: T, src: Id, dst: Id, delay: f64) -> EventId
    where
        T: EventData,
    {
        let event_id = self.event_count;
        let event = Event {
            id: event_id,
            // clamping tiny negative delays caused by floating-point errors
            time: self.clock + delay.max(0.),
            src,
            dst,
            data: Box::new(data),
        };
        if delay >= -EPSILON {
            self.events.push(event);
            self.event_count += 1;
            event_id
        } else {
            log_incorrect_event(event, &format!("negative delay {}", delay));
            panic!("Event delay is negative! It is not allowed to add events from the past.");
        }
    }

    pub fn cancel_event(&mut self, id: EventId) {
        self.canceled_events.insert(id);
    }

    pub fn peek_event(&mut self) -> Option<&Event> {
        while let Some(event) = self.events.peek() {
            let event_id = event.id;
            if !self.canceled_events.remove(&event_id) {
                break;
            }
            self.events.pop();
        }
        self.events.peek()
    }

    pub fn next_event(&mut self) -> Option<Event> {
        while let Some(event) = self.events.pop() {
            if !self.canceled_events.remove(&event.id) {
                self.clock = event.time;
                return Some(event);
            }
        }
        None
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    // Tasks -----------------------------------------------------------------------------------------------------------

    pub fn spawn(&mut self, future: impl Future<Output = ()> + 'static) {
        Task::spawn(future, self.executor.clone());
    }

    // Timers ----------------------------------------------------------------------------------------------------------

    pub fn create_timer(
        &mut self,
        component_id: Id,
        timeout: f64,
        sim_state: Rc<RefCell<SimulationState>>,
    ) -> TimerFuture {
        let timer_promise = TimerPromise::new(self.timer_count, component_id, self.clock + timeout);
        let timer_future = timer_promise.future(sim_state);
        self.timers.push(timer_promise);
        self.timer_count += 1;
        timer_future
    }

    pub fn peek_timer(&mut self) -> Option<&TimerPromise> {
        while let Some(timer) = self.timers.peek() {
            let timer_id = timer.id;
            if !self.canceled_timers.remove(&timer_id) {
                break;
            }
            self.timers.pop();
        }
        self.timers.peek()
    }

    pub fn next_timer(&mut self) -> Option<TimerPromise> {
        while let Some(timer) = self.timers.pop() {
            if !self.canceled_timers.remove(&timer.id) {
                self.clock = timer.time;
                return Some(timer);
            }
        }
        None
    }

    pub fn timer_count(&self) -> u64 {
        self.timer_count
    }

    // Called by dropped TimerFuture that was not completed.
    pub fn on_incomplete_timer_future_drop(&mut self, timer_id: TimerId) {
        self.canceled_timers.insert(timer_id);
    }
}
