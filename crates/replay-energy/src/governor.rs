//! Scheduled switching of host performance states.

use std::cell::RefCell;
use std::rc::Rc;

use replay_compute::host::Host;
use replay_core::{log_info, SimulationContext};

/// Switch of a host to a performance state at a given time.
pub struct ScheduledPstate {
    /// Virtual time of the switch.
    pub time: f64,
    /// Host to switch.
    pub host: Rc<RefCell<Host>>,
    /// New performance state index.
    pub pstate: usize,
}

/// Actor applying performance state switches at their times.
pub struct PstateGovernor {
    schedule: Vec<ScheduledPstate>,
    ctx: SimulationContext,
}

impl PstateGovernor {
    /// Creates governor, switches with equal times are applied in the given order.
    pub fn new(mut schedule: Vec<ScheduledPstate>, ctx: SimulationContext) -> Self {
        schedule.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { schedule, ctx }
    }

    /// Applies all switches.
    pub async fn run(&self) {
        for change in &self.schedule {
            let delay = change.time - self.ctx.time();
            if delay > 0. {
                self.ctx.sleep(delay).await;
            }
            let mut host = change.host.borrow_mut();
            log_info!(
                self.ctx,
                "switching host {} from pstate {} to {}",
                host.name(),
                host.pstate(),
                change.pstate
            );
            host.set_pstate(change.pstate);
        }
    }
}
