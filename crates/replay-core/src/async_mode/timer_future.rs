//! Asynchronous waiting for virtual time to pass.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::state::SimulationState;
use crate::Id;

/// Timer identifier.
pub(crate) type TimerId = u64;

// Timer future --------------------------------------------------------------------------------------------------------

/// Future returned by [`SimulationContext::sleep`](crate::SimulationContext::sleep).
///
/// Resolves when the simulation clock reaches the timer time.
/// Dropping the future before that cancels the timer.
pub struct TimerFuture {
    timer_id: TimerId,
    state: Rc<RefCell<TimerAwaitState>>,
    sim_state: Rc<RefCell<SimulationState>>,
}

impl TimerFuture {
    fn new(timer_id: TimerId, state: Rc<RefCell<TimerAwaitState>>, sim_state: Rc<RefCell<SimulationState>>) -> Self {
        Self {
            timer_id,
            state,
            sim_state,
        }
    }
}

impl Future for TimerFuture {
    type Output = ();

    fn poll(self: Pin<&mut Self>, async_ctx: &mut Context) -> Poll<Self::Output> {
        let mut state = self.state.borrow_mut();
        if state.completed {
            Poll::Ready(())
        } else {
            state.waker = Some(async_ctx.waker().clone());
            Poll::Pending
        }
    }
}

impl Drop for TimerFuture {
    fn drop(&mut self) {
        if !self.state.borrow().completed {
            self.sim_state.borrow_mut().on_incomplete_timer_future_drop(self.timer_id);
        }
    }
}

// Timer promise -------------------------------------------------------------------------------------------------------

pub(crate) struct TimerPromise {
    pub id: TimerId,
    /// Id of simulation component that set the timer.
    pub component_id: Id,
    /// The time when the timer fires.
    pub time: f64,
    state: Rc<RefCell<TimerAwaitState>>,
}

impl TimerPromise {
    pub fn new(id: TimerId, component_id: Id, time: f64) -> Self {
        Self {
            id,
            component_id,
            time,
            state: Rc::new(RefCell::new(TimerAwaitState::new())),
        }
    }

    pub fn future(&self, sim_state: Rc<RefCell<SimulationState>>) -> TimerFuture {
        TimerFuture::new(self.id, self.state.clone(), sim_state)
    }

    pub fn complete(&self) {
        // Take the waker out first, waking must not happen while the state is borrowed.
        let waker = self.state.borrow_mut().complete();
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl Eq for TimerPromise {}

impl PartialEq for TimerPromise {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

// Inverted order to pop the earliest timer from BinaryHeap, equal times are resolved by creation order.
impl Ord for TimerPromise {
    fn cmp(&self, other: &Self) -> Ordering {
        other.time.total_cmp(&self.time).then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for TimerPromise {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct TimerAwaitState {
    completed: bool,
    waker: Option<Waker>,
}

impl TimerAwaitState {
    fn new() -> Self {
        Self {
            completed: false,
            waker: None,
        }
    }

    fn complete(&mut self) -> Option<Waker> {
        self.completed = true;
        self.waker.take()
    }
}
