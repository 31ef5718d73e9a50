//! One-shot completion of blocking calls served by simulation components.
//!
//! A component that performs some work on behalf of an actor (e.g. a host running a computation) creates a
//! [`Promise`] / [`PromiseFuture`] pair with [`contract`], keeps the promise and hands the future to the actor.
//! When the work is done, the component calls [`Promise::complete`] and the actor task is scheduled for polling.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

struct PromiseState<T> {
    value: Option<T>,
    completed: bool,
    waker: Option<Waker>,
}

/// Producer side of the pair, completed by a simulation component.
pub struct Promise<T> {
    state: Rc<RefCell<PromiseState<T>>>,
}

/// Consumer side of the pair, awaited by an actor.
pub struct PromiseFuture<T> {
    state: Rc<RefCell<PromiseState<T>>>,
}

/// Creates a connected promise and future.
pub fn contract<T>() -> (Promise<T>, PromiseFuture<T>) {
    let state = Rc::new(RefCell::new(PromiseState {
        value: None,
        completed: false,
        waker: None,
    }));
    (
        Promise { state: state.clone() },
        PromiseFuture { state },
    )
}

/// Creates a future that is already completed with the given value.
pub fn ready<T>(value: T) -> PromiseFuture<T> {
    let (promise, future) = contract();
    promise.complete(value);
    future
}

impl<T> Promise<T> {
    /// Completes the promise with the value and wakes the awaiting task.
    ///
    /// Panics if the promise is already completed.
    pub fn complete(&self, value: T) {
        let waker = {
            let mut state = self.state.borrow_mut();
            assert!(!state.completed, "Promise is completed twice");
            state.completed = true;
            state.value = Some(value);
            state.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// Returns true if the promise is completed.
    pub fn is_completed(&self) -> bool {
        self.state.borrow().completed
    }
}

impl<T> PromiseFuture<T> {
    /// Returns true if the value is available.
    pub fn is_completed(&self) -> bool {
        self.state.borrow().completed
    }
}

impl<T> Future for PromiseFuture<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, async_ctx: &mut Context) -> Poll<Self::Output> {
        let mut state = self.state.borrow_mut();
        match state.value.take() {
            Some(value) => Poll::Ready(value),
            None => {
                assert!(!state.completed, "PromiseFuture is polled after completion");
                state.waker = Some(async_ctx.waker().clone());
                Poll::Pending
            }
        }
    }
}
