//! [`ControlLoop`] – runs [`Hcm::tick`] at a fixed rate.
//!
//! The loop ends when the shared shutdown flag is set or when the robot has
//! finished its shutdown sequence.  A malformed tree detected mid-run is
//! returned as an error; every other problem is already handled inside the
//! tick.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use hcm_types::HcmError;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use crate::hcm::Hcm;

pub struct ControlLoop {
    hcm: Hcm,
    period: Duration,
    shutdown: Arc<AtomicBool>,
}

impl ControlLoop {
    pub fn new(hcm: Hcm, period: Duration, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            hcm,
            period,
            shutdown,
        }
    }

    pub fn hcm(&self) -> &Hcm {
        &self.hcm
    }

    /// Tick until shutdown.  Returns the number of ticks run.
    pub async fn run(&mut self) -> Result<u64, HcmError> {
        let mut interval = time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(period_ms = self.period.as_millis() as u64, "HCM control loop started");

        let mut ticks = 0;
        loop {
            interval.tick().await;
            if self.shutdown.load(Ordering::SeqCst) {
                info!(ticks, "HCM control loop stopped by operator");
                break;
            }
            let tick = self.hcm.tick()?;
            ticks += 1;
            if tick.is_shut_down() {
                info!(ticks, "robot shut down, leaving control loop");
                break;
            }
            debug!(tick = tick.report.tick, state = ?tick.state, action = ?tick.report.action, "tick");
        }
        Ok(ticks)
    }
}
