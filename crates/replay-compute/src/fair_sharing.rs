//! Fair sharing of host cores between concurrent computations.
//!
//! Each of `n` running computations on a host with `c` cores of speed `s` progresses at rate
//! `s * min(n, c) / n`. Instead of updating every computation on each change, the model tracks the total
//! amount of work done by a single computation since the start (`total_work`) and stores for each computation
//! the value of `total_work` at which it will be completed. Computations are kept in a heap ordered by this
//! value, so that insertion, removal and lookup of the next completion are logarithmic.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

const TOTAL_WORK_MAX_VALUE: f64 = 1e12;

struct Activity<T> {
    id: u64,
    item: T,
    finish_work: f64,
}

impl<T> PartialOrd for Activity<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Activity<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .finish_work
            .total_cmp(&self.finish_work)
            .then(other.id.cmp(&self.id))
    }
}

impl<T> PartialEq for Activity<T> {
    fn eq(&self, other: &Self) -> bool {
        self.finish_work == other.finish_work && self.id == other.id
    }
}

impl<T> Eq for Activity<T> {}

/// Shares the capacity of `cores` identical cores between running computations.
///
/// Computations which do not fit into free cores are not queued, instead all computations progress
/// simultaneously at an equally reduced rate.
pub struct FairShareModel<T> {
    activities: BinaryHeap<Activity<T>>,
    cores: u32,
    speed: f64,
    throughput_per_activity: f64,
    next_id: u64,
    total_work: f64,
    last_update: f64,
}

impl<T> FairShareModel<T> {
    /// Creates model for `cores` cores with given per-core speed (in flop/s).
    pub fn new(cores: u32, speed: f64) -> Self {
        assert!(cores > 0, "Number of cores must be positive");
        assert!(speed > 0., "Core speed must be positive");
        Self {
            activities: BinaryHeap::new(),
            cores,
            speed,
            throughput_per_activity: 0.,
            next_id: 0,
            total_work: 0.,
            last_update: 0.,
        }
    }

    /// Returns the number of running computations.
    pub fn len(&self) -> usize {
        self.activities.len()
    }

    /// Returns true if there are no running computations.
    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }

    /// Returns the number of cores occupied by running computations.
    pub fn busy_cores(&self) -> u32 {
        (self.activities.len() as u32).min(self.cores)
    }

    /// Returns the rate at which each running computation currently progresses.
    pub fn throughput_per_activity(&self) -> f64 {
        self.throughput_per_activity
    }

    /// Adds computation of `volume` flops started at `time`, returns its id inside the model.
    pub fn insert(&mut self, time: f64, volume: f64, item: T) -> u64 {
        self.advance(time);
        let id = self.next_id;
        self.next_id += 1;
        self.activities.push(Activity {
            id,
            item,
            finish_work: self.total_work + volume,
        });
        self.update_throughput();
        id
    }

    /// Changes the per-core speed at `time`.
    ///
    /// The work done before `time` is accounted at the old speed, the remaining work is done at the new one.
    pub fn set_speed(&mut self, time: f64, speed: f64) {
        assert!(speed > 0., "Core speed must be positive");
        self.advance(time);
        self.speed = speed;
        self.update_throughput();
    }

    /// Removes the computation which completes first and returns its completion time.
    pub fn pop(&mut self) -> Option<(f64, T)> {
        let activity = self.activities.pop()?;
        let remaining_work = activity.finish_work - self.total_work;
        let finish_time = self.last_update + remaining_work / self.throughput_per_activity;
        self.increment_total_work(remaining_work);
        self.last_update = finish_time;
        self.update_throughput();
        Some((finish_time, activity.item))
    }

    /// Returns the computation which completes first along with its completion time.
    pub fn peek(&self) -> Option<(f64, &T)> {
        self.activities.peek().map(|activity| {
            (
                self.last_update + (activity.finish_work - self.total_work) / self.throughput_per_activity,
                &activity.item,
            )
        })
    }

    fn advance(&mut self, time: f64) {
        if !self.activities.is_empty() {
            self.increment_total_work((time - self.last_update) * self.throughput_per_activity);
        }
        self.last_update = time;
    }

    fn update_throughput(&mut self) {
        let count = self.activities.len();
        self.throughput_per_activity = if count > 0 {
            self.speed * count.min(self.cores as usize) as f64 / count as f64
        } else {
            0.
        };
    }

    fn increment_total_work(&mut self, delta: f64) {
        self.total_work += delta;
        if self.total_work > TOTAL_WORK_MAX_VALUE {
            let total_work = self.total_work;
            let activities: Vec<Activity<T>> = std::mem::take(&mut self.activities)
                .into_vec()
                .into_iter()
                .map(|mut activity| {
                    activity.finish_work -= total_work;
                    activity
                })
                .collect();
            self.activities = activities.into();
            self.total_work = 0.;
        }
    }
}
