//! Reaper Policy Engine
//!
//! Decides, per machine, whether it is too young to touch, safe to reap, or
//! stuck in a state a human has to look at, and drives the client through
//! one bounded sweep.

use chrono::{DateTime, TimeDelta, Utc};
use reaper_core::{
    CloudClient, Clock, Machine, ReaperConfig, Result, SystemClock, DEFAULT_PAUSE_SECS,
};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Outcome of classifying one listed machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    /// Not older than the threshold; left alone.
    TooYoung,
    /// Old and in a settled state; stop then delete.
    Reap,
    /// Old but in any other state; reported, never acted on.
    Unexpected,
}

/// Classify a machine at `now` against a threshold in hours.
///
/// A machine is eligible only when its age is strictly greater than the
/// threshold. Fails if the provider timestamp cannot be parsed.
pub fn classify(
    machine: &Machine,
    now: DateTime<Utc>,
    max_age_hours: u64,
) -> Result<Classification> {
    let age = machine.age(now)?;
    if age <= threshold(max_age_hours) {
        return Ok(Classification::TooYoung);
    }
    if machine.state.is_reapable() {
        Ok(Classification::Reap)
    } else {
        Ok(Classification::Unexpected)
    }
}

fn threshold(max_age_hours: u64) -> TimeDelta {
    i64::try_from(max_age_hours)
        .ok()
        .and_then(TimeDelta::try_hours)
        .unwrap_or(TimeDelta::MAX)
}

/// What one sweep did
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepReport {
    /// Machines in the listing.
    pub examined: usize,
    /// Machines older than the threshold.
    pub eligible: usize,
    /// Ids that were stopped and deleted, in processing order.
    pub reaped: Vec<String>,
    /// Machines handed to `request_deletion`.
    pub unexpected: Vec<Machine>,
}

/// Age-based machine reaper
///
/// Holds no machine state between sweeps; the provider is the source of
/// truth and every sweep starts from a fresh listing.
#[derive(Debug)]
pub struct ReaperEngine<C, K = SystemClock> {
    client: C,
    clock: K,
    /// Fixed wait between stop and delete for the provider to converge.
    pause: Duration,
}

impl<C: CloudClient> ReaperEngine<C> {
    pub fn new(client: C, pause: Duration) -> Self {
        info!(pause_secs = pause.as_secs_f64(), "Initializing Reaper Policy Engine");
        Self {
            client,
            clock: SystemClock,
            pause,
        }
    }

    pub fn from_config(client: C, config: &ReaperConfig) -> Self {
        Self::new(client, config.pause())
    }
}

impl<C: CloudClient, K: Clock> ReaperEngine<C, K> {
    pub fn with_clock<K2: Clock>(self, clock: K2) -> ReaperEngine<C, K2> {
        ReaperEngine {
            client: self.client,
            clock,
            pause: self.pause,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn pause(&self) -> Duration {
        self.pause
    }

    /// Stop and delete every settled machine older than `max_age_hours`,
    /// then report the old machines that could not be reaped safely.
    ///
    /// The report is sent exactly once per completed sweep, even when it is
    /// empty. Any client or timestamp error aborts the sweep unchanged.
    #[instrument(skip(self), fields(sweep_id = %Uuid::new_v4()))]
    pub fn delete_old_machines(
        &self,
        max_age_hours: u64,
        notify_target: &str,
    ) -> Result<SweepReport> {
        let machines = self.client.list_machines()?;
        let now = self.clock.now();
        info!(count = machines.len(), "Sweeping machines");

        let mut report = SweepReport {
            examined: machines.len(),
            ..SweepReport::default()
        };

        for machine in &machines {
            match classify(machine, now, max_age_hours)? {
                Classification::TooYoung => {
                    debug!(
                        machine_id = %machine.id,
                        created = %machine.created,
                        "Skipping young machine"
                    );
                }
                Classification::Reap => {
                    report.eligible += 1;
                    self.reap(machine, &mut report)?;
                }
                Classification::Unexpected => {
                    report.eligible += 1;
                    warn!(
                        machine_id = %machine.id,
                        state = %machine.state,
                        "Old machine is not in a reapable state"
                    );
                    report.unexpected.push(machine.clone());
                }
            }
        }

        self.client.request_deletion(&report.unexpected, notify_target)?;

        info!(
            eligible = report.eligible,
            reaped = report.reaped.len(),
            unexpected = report.unexpected.len(),
            "Sweep complete"
        );
        Ok(report)
    }

    /// Refetch before acting; the listing may be stale.
    ///
    /// A refetched copy that is no longer running or stopped is reported as
    /// unexpected instead of reaped, even though the listing showed it settled.
    #[instrument(skip(self, listed, report), fields(machine_id = %listed.id))]
    fn reap(&self, listed: &Machine, report: &mut SweepReport) -> Result<()> {
        let current = self.client.get_machine(&listed.id)?;
        if !current.state.is_reapable() {
            warn!(
                listed_state = %listed.state,
                state = %current.state,
                "Machine changed state since listing"
            );
            report.unexpected.push(current);
            return Ok(());
        }

        info!(state = %current.state, "Stopping machine");
        self.client.stop_machine(&current.id)?;
        if !self.pause.is_zero() {
            thread::sleep(self.pause);
        }
        info!("Deleting machine");
        self.client.delete_machine(&current.id)?;

        report.reaped.push(current.id);
        Ok(())
    }
}

impl<C: CloudClient + Default> Default for ReaperEngine<C> {
    fn default() -> Self {
        Self::new(C::default(), Duration::from_secs(DEFAULT_PAUSE_SECS))
    }
}
