//! Delivery of the "please delete these by hand" report

use chrono::{DateTime, Utc};
use reaper_core::{Machine, Result};
use serde::Serialize;
use std::fmt::Write;
use tracing::{info, warn};

/// Machines a sweep could not reap, addressed to a person or channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeletionRequest {
    pub account: String,
    pub notify_target: String,
    pub generated_at: DateTime<Utc>,
    pub machines: Vec<Machine>,
}

impl DeletionRequest {
    pub fn new(account: &str, notify_target: &str, machines: &[Machine]) -> Self {
        Self {
            account: account.to_string(),
            notify_target: notify_target.to_string(),
            generated_at: Utc::now(),
            machines: machines.to_vec(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    pub fn subject(&self) -> String {
        format!(
            "{} machine(s) in account {} need manual deletion",
            self.machines.len(),
            self.account
        )
    }

    /// Plain-text body, one machine per line.
    pub fn body(&self) -> String {
        let mut body =
            String::from("These machines are old but cannot be stopped and deleted safely:\n");
        for machine in &self.machines {
            let _ = writeln!(
                body,
                "  {} {} state={} created={}",
                machine.id,
                machine.name.as_deref().unwrap_or("-"),
                machine.state,
                machine.created
            );
        }
        body
    }
}

pub trait Notifier {
    fn notify(&self, request: &DeletionRequest) -> Result<()>;
}

/// Emits the report through `tracing`; log shipping carries it onward.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, request: &DeletionRequest) -> Result<()> {
        if request.is_empty() {
            info!(notify_target = %request.notify_target, "No machines need manual deletion");
            return Ok(());
        }
        let report = serde_json::to_string(request)?;
        warn!(
            notify_target = %request.notify_target,
            count = request.machines.len(),
            %report,
            "{}\n{}",
            request.subject(),
            request.body()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reaper_core::MachineState;

    #[test]
    fn test_body_lists_each_machine() {
        let machines = vec![
            Machine::new("vm-1", MachineState::Provisioning, Utc::now()).with_name("juju-ci-1"),
            Machine::new("vm-2", MachineState::Failed, Utc::now()),
        ];
        let request = DeletionRequest::new("ci", "foo@bar", &machines);

        assert_eq!(request.subject(), "2 machine(s) in account ci need manual deletion");
        let body = request.body();
        assert!(body.contains("vm-1 juju-ci-1 state=provisioning"));
        assert!(body.contains("vm-2 - state=failed"));
    }

    #[test]
    fn test_log_notifier_accepts_empty_report() {
        let request = DeletionRequest::new("ci", "foo@bar", &[]);
        assert!(request.is_empty());
        assert!(LogNotifier.notify(&request).is_ok());
    }
}
