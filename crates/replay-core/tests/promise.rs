use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;

use replay_core::async_mode::promise::{self, Promise, PromiseFuture};
use replay_core::{cast, Event, EventHandler, Simulation, SimulationContext};

#[derive(Clone, Serialize)]
struct Done {
    request_id: usize,
}

// Serves requests after a fixed delay and completes the requester's promise.
struct Server {
    pending: Vec<Option<Promise<f64>>>,
    ctx: SimulationContext,
}

impl Server {
    fn request(&mut self, delay: f64) -> PromiseFuture<f64> {
        let (promise, future) = promise::contract();
        self.pending.push(Some(promise));
        self.ctx.emit_self(
            Done {
                request_id: self.pending.len() - 1,
            },
            delay,
        );
        future
    }
}

impl EventHandler for Server {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            Done { request_id } => {
                if let Some(promise) = self.pending[request_id].take() {
                    promise.complete(self.ctx.time());
                }
            }
        })
    }
}

#[test]
fn test_promise_completed_by_component() {
    let mut sim = Simulation::new();
    let server = Rc::new(RefCell::new(Server {
        pending: Vec::new(),
        ctx: sim.create_context("server"),
    }));
    sim.add_handler("server", server.clone());

    let results = Rc::new(RefCell::new(Vec::new()));
    for (name, delay) in [("slow", 4.), ("fast", 1.5)] {
        let ctx = sim.create_context(name);
        let server = server.clone();
        let results = results.clone();
        sim.spawn(async move {
            let future = server.borrow_mut().request(delay);
            let completed_at = future.await;
            assert_eq!(completed_at, ctx.time());
            results.borrow_mut().push((ctx.name().to_owned(), completed_at));
        });
    }

    sim.step_until_no_events();
    assert_eq!(
        *results.borrow(),
        vec![("fast".to_owned(), 1.5), ("slow".to_owned(), 4.)]
    );
}

#[test]
fn test_ready_promise_does_not_advance_time() {
    let mut sim = Simulation::new();
    let ctx = sim.create_context("comp");
    let value = Rc::new(RefCell::new(None));
    let value_clone = value.clone();

    sim.spawn(async move {
        ctx.sleep(1.).await;
        let v = promise::ready(42).await;
        *value_clone.borrow_mut() = Some((v, ctx.time()));
    });

    sim.step_until_no_events();
    assert_eq!(*value.borrow(), Some((42, 1.)));
}

#[test]
#[should_panic(expected = "Promise is completed twice")]
fn test_double_completion_panics() {
    let (promise, _future) = promise::contract::<u32>();
    promise.complete(1);
    promise.complete(2);
}
