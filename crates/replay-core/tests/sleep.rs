use std::cell::RefCell;
use std::rc::Rc;

use futures::future::select;
use futures::{stream::FuturesUnordered, StreamExt};

use replay_core::Simulation;

#[test]
fn test_sleep() {
    let mut sim = Simulation::new();
    let ctx = sim.create_context("comp");

    sim.spawn(async move {
        let sleep_time_step = 5.;
        let concurrent_sleeps = 10;

        assert_eq!(ctx.time(), 0.);

        ctx.sleep(sleep_time_step).await;

        assert_eq!(ctx.time(), sleep_time_step);

        let mut futures = FuturesUnordered::new();
        for i in 0..=concurrent_sleeps {
            futures.push(ctx.sleep(i as f64 * sleep_time_step));
        }

        let mut expected_next_time = sleep_time_step;
        while futures.next().await.is_some() {
            assert_eq!(ctx.time(), expected_next_time);
            expected_next_time += sleep_time_step;
        }

        assert_eq!(ctx.time(), (concurrent_sleeps + 1) as f64 * sleep_time_step);
    });

    sim.step_until_no_events();
    assert_eq!(sim.time(), 55.);
}

#[test]
fn test_equal_time_wakeups_follow_creation_order() {
    let mut sim = Simulation::new();
    let order = Rc::new(RefCell::new(Vec::new()));

    for name in ["first", "second", "third"] {
        let ctx = sim.create_context(name);
        let order = order.clone();
        sim.spawn(async move {
            for _ in 0..3 {
                ctx.sleep(5.).await;
                order.borrow_mut().push(ctx.name().to_owned());
            }
        });
    }

    sim.step_until_no_events();
    assert_eq!(sim.time(), 15.);
    let expected: Vec<String> = std::iter::repeat(["first", "second", "third"])
        .take(3)
        .flatten()
        .map(|s| s.to_owned())
        .collect();
    assert_eq!(*order.borrow(), expected);
}

#[test]
fn test_negative_sleep_is_clamped() {
    let mut sim = Simulation::new();
    let ctx = sim.create_context("comp");
    let times = Rc::new(RefCell::new(Vec::new()));
    let times_clone = times.clone();

    sim.spawn(async move {
        ctx.sleep(3.).await;
        times_clone.borrow_mut().push(ctx.time());
        ctx.sleep(-2.).await;
        times_clone.borrow_mut().push(ctx.time());
        ctx.sleep(1.).await;
        times_clone.borrow_mut().push(ctx.time());
    });

    sim.step_until_no_events();
    assert_eq!(*times.borrow(), vec![3., 3., 4.]);
}

#[test]
fn test_dropped_timer_is_cancelled() {
    let mut sim = Simulation::new();
    let ctx = sim.create_context("comp");

    sim.spawn(async move {
        let _ = select(ctx.sleep(1.), ctx.sleep(10.)).await;
        assert_eq!(ctx.time(), 1.);
    });

    sim.step_until_no_events();
    // the 10 s timer must not move the clock
    assert_eq!(sim.time(), 1.);
    assert_eq!(sim.timer_count(), 2);
}

#[test]
fn test_step_until_time() {
    let mut sim = Simulation::new();
    let ctx = sim.create_context("comp");
    let done = Rc::new(RefCell::new(false));
    let done_clone = done.clone();

    sim.spawn(async move {
        ctx.sleep(10.).await;
        *done_clone.borrow_mut() = true;
    });

    assert!(sim.step_until_time(4.));
    assert_eq!(sim.time(), 4.);
    assert!(!*done.borrow());

    assert!(sim.step_for_duration(1.));
    assert_eq!(sim.time(), 5.);

    sim.step_until_no_events();
    assert_eq!(sim.time(), 10.);
    assert!(*done.borrow());
}

#[test]
fn test_nested_spawn() {
    let mut sim = Simulation::new();
    let ctx = Rc::new(sim.create_context("parent"));
    let finished = Rc::new(RefCell::new(Vec::new()));

    let parent_ctx = ctx.clone();
    let parent_finished = finished.clone();
    sim.spawn(async move {
        let child_ctx = parent_ctx.clone();
        let child_finished = parent_finished.clone();
        parent_ctx.spawn(async move {
            child_ctx.sleep(2.).await;
            child_finished.borrow_mut().push(("child", child_ctx.time()));
        });
        parent_ctx.sleep(1.).await;
        parent_finished.borrow_mut().push(("parent", parent_ctx.time()));
    });

    sim.step_until_no_events();
    assert_eq!(*finished.borrow(), vec![("parent", 1.), ("child", 2.)]);
}
