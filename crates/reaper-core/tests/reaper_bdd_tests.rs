//! BDD Tests for Reaper Core

use chrono::{TimeDelta, Utc};
use cucumber::{given, then, when, World};
use reaper_core::*;

#[derive(Debug, World)]
#[world(init = Self::new)]
struct ReaperWorld {
    machine: Option<Machine>,
    last_error: Option<ReaperError>,
}

impl ReaperWorld {
    fn new() -> Self {
        Self {
            machine: None,
            last_error: None,
        }
    }

    fn machine(&self) -> &Machine {
        self.machine.as_ref().expect("no machine in scenario")
    }
}

#[given(expr = "a machine {string} in state {string} created {int} hours ago")]
async fn given_machine(world: &mut ReaperWorld, id: String, state: String, hours: i64) {
    let created = Utc::now() - TimeDelta::hours(hours);
    world.machine = Some(Machine::new(id, MachineState::from(state), created));
}

#[given(expr = "a machine {string} with created timestamp {string}")]
async fn given_machine_with_timestamp(world: &mut ReaperWorld, id: String, created: String) {
    let mut machine = Machine::new(id, MachineState::Running, Utc::now());
    machine.created = created;
    world.machine = Some(machine);
}

#[when("I read the machine age")]
async fn when_read_age(world: &mut ReaperWorld) {
    if let Err(error) = world.machine().age(Utc::now()) {
        world.last_error = Some(error);
    }
}

#[then(expr = "the machine state should be shown as {string}")]
async fn then_state_shown_as(world: &mut ReaperWorld, expected: String) {
    assert_eq!(world.machine().state.to_string(), expected);
}

#[then(expr = "the machine should be reapable: {word}")]
async fn then_reapable(world: &mut ReaperWorld, expected: String) {
    assert_eq!(world.machine().state.is_reapable(), expected == "yes");
}

#[then(expr = "the machine age should be {int} hours")]
async fn then_age_hours(world: &mut ReaperWorld, hours: i64) {
    let age = world.machine().age(Utc::now()).unwrap();
    assert_eq!(age.num_hours(), hours);
}

#[then(expr = "I should get a {string} error")]
async fn then_should_get_error(world: &mut ReaperWorld, error_type: String) {
    let error = world.last_error.as_ref().expect("expected an error");
    assert!(error.to_string().contains(&error_type));
}

#[then("the error should include the machine ID")]
async fn then_error_includes_machine_id(world: &mut ReaperWorld) {
    let error = world.last_error.as_ref().expect("expected an error");
    assert!(error.to_string().contains(&world.machine().id));
}

#[tokio::main]
async fn main() {
    ReaperWorld::run("tests/features").await;
}
