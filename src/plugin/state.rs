//! ADD and DEL state machines
//!
//! Each invocation walks one machine from `Init` to `Done`, or to `Failed`
//! from any non-terminal state. Steps are never undone, so there are no
//! backward transitions.

use crate::error::{Error, Result};

pub mod add {
    use state_machines::state_machine;

    state_machine! {
        name: AddMachine,
        dynamic: true,
        initial: Init,
        states: [
            Init,
            ConfigLoaded,
            BridgeVerified,
            VethCreated,
            Attached,
            AddressAllocated,
            AddressConfigured,
            Done,
            Failed
        ],
        events {
            load {
                transition: { from: Init, to: ConfigLoaded }
            }
            verify {
                transition: { from: ConfigLoaded, to: BridgeVerified }
            }
            skip {
                transition: { from: BridgeVerified, to: Done }
            }
            plumb {
                transition: { from: BridgeVerified, to: VethCreated }
            }
            attach {
                transition: { from: VethCreated, to: Attached }
            }
            allocate {
                transition: { from: Attached, to: AddressAllocated }
            }
            configure {
                transition: { from: AddressAllocated, to: AddressConfigured }
            }
            finish {
                transition: { from: AddressConfigured, to: Done }
            }
            fail {
                transition: {
                    from: [
                        Init,
                        ConfigLoaded,
                        BridgeVerified,
                        VethCreated,
                        Attached,
                        AddressAllocated,
                        AddressConfigured
                    ],
                    to: Failed
                }
            }
        }
    }
}

pub mod del {
    use state_machines::state_machine;

    state_machine! {
        name: DelMachine,
        dynamic: true,
        initial: Init,
        states: [Init, ConfigLoaded, AddressReleased, VethRemoved, Done, Failed],
        events {
            load {
                transition: { from: Init, to: ConfigLoaded }
            }
            release {
                transition: { from: ConfigLoaded, to: AddressReleased }
            }
            skip {
                transition: { from: AddressReleased, to: Done }
            }
            remove {
                transition: { from: AddressReleased, to: VethRemoved }
            }
            finish {
                transition: { from: VethRemoved, to: Done }
            }
            fail {
                transition: { from: [Init, ConfigLoaded, AddressReleased, VethRemoved], to: Failed }
            }
        }
    }
}

pub use add::AddMachineEvent as AddEvent;
pub use del::DelMachineEvent as DelEvent;

/// Progress of one ADD invocation
pub struct AddFlow {
    machine: add::DynamicAddMachine<()>,
}

impl AddFlow {
    pub fn new() -> Self {
        Self {
            machine: add::AddMachine::new(()).into_dynamic(),
        }
    }

    pub fn state(&self) -> &str {
        self.machine.current_state()
    }

    /// Apply `event`, logging the transition
    pub fn advance(&mut self, event: AddEvent) -> Result<()> {
        let from = self.state().to_string();
        self.machine
            .handle(event)
            .map_err(|e| Error::StateTransition(format!("ADD from {}: {:?}", from, e)))?;
        tracing::debug!(from = %from, to = self.state(), "cmdAdd");
        Ok(())
    }

    /// Move to `Failed`; a flow that already ended stays where it is
    pub fn fail(&mut self) {
        if self.machine.handle(AddEvent::Fail).is_ok() {
            tracing::debug!(to = self.state(), "cmdAdd");
        }
    }
}

/// Progress of one DEL invocation
pub struct DelFlow {
    machine: del::DynamicDelMachine<()>,
}

impl DelFlow {
    pub fn new() -> Self {
        Self {
            machine: del::DelMachine::new(()).into_dynamic(),
        }
    }

    pub fn state(&self) -> &str {
        self.machine.current_state()
    }

    /// Apply `event`, logging the transition
    pub fn advance(&mut self, event: DelEvent) -> Result<()> {
        let from = self.state().to_string();
        self.machine
            .handle(event)
            .map_err(|e| Error::StateTransition(format!("DEL from {}: {:?}", from, e)))?;
        tracing::debug!(from = %from, to = self.state(), "cmdDel");
        Ok(())
    }

    /// Move to `Failed`; a flow that already ended stays where it is
    pub fn fail(&mut self) {
        if self.machine.handle(DelEvent::Fail).is_ok() {
            tracing::debug!(to = self.state(), "cmdDel");
        }
    }
}
