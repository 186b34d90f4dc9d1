//! In-memory provider for tests, benchmarks and dry rehearsals
//!
//! Keeps machines in listing order, records every call in the order it was
//! issued, and applies stop/delete to its own state so a second sweep sees
//! what the provider would show.

use crate::client::CloudClient;
use crate::error::{ReaperError, Result};
use crate::machine::{Machine, MachineState};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Instant;
use tracing::debug;

/// A call received by [`InMemoryClient`]
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCall {
    ListMachines,
    GetMachine(String),
    StopMachine(String),
    DeleteMachine(String),
    RequestDeletion {
        machines: Vec<Machine>,
        notify_target: String,
    },
}

impl ClientCall {
    pub fn machine_id(&self) -> Option<&str> {
        match self {
            ClientCall::GetMachine(id)
            | ClientCall::StopMachine(id)
            | ClientCall::DeleteMachine(id) => Some(id.as_str()),
            ClientCall::ListMachines | ClientCall::RequestDeletion { .. } => None,
        }
    }

    pub fn is_mutation(&self) -> bool {
        matches!(self, ClientCall::StopMachine(_) | ClientCall::DeleteMachine(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientOperation {
    ListMachines,
    GetMachine,
    StopMachine,
    DeleteMachine,
    RequestDeletion,
}

#[derive(Debug, Default)]
pub struct InMemoryClient {
    machines: Mutex<Vec<Machine>>,
    calls: Mutex<Vec<(Instant, ClientCall)>>,
    /// `None` as the machine id fails the operation for every machine.
    failures: Mutex<Vec<(ClientOperation, Option<String>)>>,
    /// State a machine reports on its next refetch.
    drift: Mutex<HashMap<String, MachineState>>,
    dry_run: bool,
}

impl InMemoryClient {
    pub fn new(machines: Vec<Machine>) -> Self {
        Self {
            machines: Mutex::new(machines),
            ..Self::default()
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Make `operation` fail, for one machine or for all of them.
    pub fn fail_on(self, operation: ClientOperation, machine_id: Option<&str>) -> Self {
        self.failures
            .lock()
            .push((operation, machine_id.map(str::to_string)));
        self
    }

    /// Simulate a state change between listing and refetch.
    pub fn drift_state(&self, machine_id: &str, state: MachineState) {
        self.drift.lock().insert(machine_id.to_string(), state);
    }

    pub fn machines(&self) -> Vec<Machine> {
        self.machines.lock().clone()
    }

    pub fn calls(&self) -> Vec<ClientCall> {
        self.calls.lock().iter().map(|(_, call)| call.clone()).collect()
    }

    /// Calls together with the instant each one arrived.
    pub fn timed_calls(&self) -> Vec<(Instant, ClientCall)> {
        self.calls.lock().clone()
    }

    pub fn calls_for(&self, machine_id: &str) -> Vec<ClientCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.machine_id() == Some(machine_id))
            .collect()
    }

    pub fn mutations(&self) -> Vec<ClientCall> {
        self.calls()
            .into_iter()
            .filter(ClientCall::is_mutation)
            .collect()
    }

    /// Every deletion report received, as `(machines, notify_target)`.
    pub fn reports(&self) -> Vec<(Vec<Machine>, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ClientCall::RequestDeletion {
                    machines,
                    notify_target,
                } => Some((machines, notify_target)),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, call: ClientCall) {
        debug!(?call, "in-memory client call");
        self.calls.lock().push((Instant::now(), call));
    }

    fn check_failure(&self, operation: ClientOperation, machine_id: Option<&str>) -> Result<()> {
        let failures = self.failures.lock();
        let injected = failures.iter().any(|(failing, target)| {
            *failing == operation
                && match (target, machine_id) {
                    (None, _) => true,
                    (Some(target), Some(id)) => target == id,
                    (Some(_), None) => false,
                }
        });
        if injected {
            return Err(ReaperError::Transport {
                reason: format!(
                    "injected {:?} failure for {}",
                    operation,
                    machine_id.unwrap_or("account")
                ),
            });
        }
        Ok(())
    }

    fn not_found(machine_id: &str) -> ReaperError {
        ReaperError::MachineNotFound {
            machine_id: machine_id.to_string(),
        }
    }
}

impl CloudClient for InMemoryClient {
    fn list_machines(&self) -> Result<Vec<Machine>> {
        self.record(ClientCall::ListMachines);
        self.check_failure(ClientOperation::ListMachines, None)?;
        Ok(self.machines())
    }

    fn get_machine(&self, machine_id: &str) -> Result<Machine> {
        self.record(ClientCall::GetMachine(machine_id.to_string()));
        self.check_failure(ClientOperation::GetMachine, Some(machine_id))?;

        let mut machines = self.machines.lock();
        let machine = machines
            .iter_mut()
            .find(|machine| machine.id == machine_id)
            .ok_or_else(|| Self::not_found(machine_id))?;
        if let Some(state) = self.drift.lock().remove(machine_id) {
            machine.state = state;
        }
        Ok(machine.clone())
    }

    fn stop_machine(&self, machine_id: &str) -> Result<()> {
        self.record(ClientCall::StopMachine(machine_id.to_string()));
        self.check_failure(ClientOperation::StopMachine, Some(machine_id))?;

        let mut machines = self.machines.lock();
        let machine = machines
            .iter_mut()
            .find(|machine| machine.id == machine_id)
            .ok_or_else(|| Self::not_found(machine_id))?;
        if !self.dry_run {
            machine.state = MachineState::Stopped;
        }
        Ok(())
    }

    fn delete_machine(&self, machine_id: &str) -> Result<()> {
        self.record(ClientCall::DeleteMachine(machine_id.to_string()));
        self.check_failure(ClientOperation::DeleteMachine, Some(machine_id))?;

        let mut machines = self.machines.lock();
        let index = machines
            .iter()
            .position(|machine| machine.id == machine_id)
            .ok_or_else(|| Self::not_found(machine_id))?;
        if !self.dry_run {
            machines.remove(index);
        }
        Ok(())
    }

    fn request_deletion(&self, machines: &[Machine], notify_target: &str) -> Result<()> {
        self.record(ClientCall::RequestDeletion {
            machines: machines.to_vec(),
            notify_target: notify_target.to_string(),
        });
        self.check_failure(ClientOperation::RequestDeletion, None)
    }
}
