//! Client capability consumed by the policy engine

use crate::error::Result;
use crate::machine::Machine;

/// Operations the reaper needs from the compute provider.
///
/// Implementations own transport, authentication, retries and dry-run
/// suppression. Mutating calls only *request* a transition; the provider
/// converges asynchronously.
pub trait CloudClient {
    /// Every machine visible to the account, in provider order.
    fn list_machines(&self) -> Result<Vec<Machine>>;

    /// Fresh copy of a single machine.
    fn get_machine(&self, machine_id: &str) -> Result<Machine>;

    fn stop_machine(&self, machine_id: &str) -> Result<()>;

    fn delete_machine(&self, machine_id: &str) -> Result<()>;

    /// Report machines that could not be reaped safely.
    fn request_deletion(&self, machines: &[Machine], notify_target: &str) -> Result<()>;
}

impl<T: CloudClient + ?Sized> CloudClient for &T {
    fn list_machines(&self) -> Result<Vec<Machine>> {
        (**self).list_machines()
    }

    fn get_machine(&self, machine_id: &str) -> Result<Machine> {
        (**self).get_machine(machine_id)
    }

    fn stop_machine(&self, machine_id: &str) -> Result<()> {
        (**self).stop_machine(machine_id)
    }

    fn delete_machine(&self, machine_id: &str) -> Result<()> {
        (**self).delete_machine(machine_id)
    }

    fn request_deletion(&self, machines: &[Machine], notify_target: &str) -> Result<()> {
        (**self).request_deletion(machines, notify_target)
    }
}

impl<T: CloudClient + ?Sized> CloudClient for Box<T> {
    fn list_machines(&self) -> Result<Vec<Machine>> {
        (**self).list_machines()
    }

    fn get_machine(&self, machine_id: &str) -> Result<Machine> {
        (**self).get_machine(machine_id)
    }

    fn stop_machine(&self, machine_id: &str) -> Result<()> {
        (**self).stop_machine(machine_id)
    }

    fn delete_machine(&self, machine_id: &str) -> Result<()> {
        (**self).delete_machine(machine_id)
    }

    fn request_deletion(&self, machines: &[Machine], notify_target: &str) -> Result<()> {
        (**self).request_deletion(machines, notify_target)
    }
}
