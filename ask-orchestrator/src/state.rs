//! Typestate discipline for one ask run, mirroring the ingestion
//! coordinator's use of `state_machines::state_machine!`
//! (`ingestion/src/pipeline/state.rs`): the machine enforces transition
//! order while the actual run data lives alongside it in the orchestrator.

use state_machines::state_machine;

state_machine! {
    name: AskMachine,
    state: AskState,
    initial: Accepted,
    states: [Accepted, Routed, MemorySelected, PathExecuted, Reflected, Finalized, Failed],
    events {
        route { transition: { from: Accepted, to: Routed } }
        select_memory { transition: { from: Routed, to: MemorySelected } }
        execute_path { transition: { from: MemorySelected, to: PathExecuted } }
        reflect { transition: { from: PathExecuted, to: Reflected } }
        finalize { transition: { from: Reflected, to: Finalized } }
        abort {
            transition: { from: Accepted, to: Failed }
            transition: { from: Routed, to: Failed }
            transition: { from: MemorySelected, to: Failed }
            transition: { from: PathExecuted, to: Failed }
            transition: { from: Reflected, to: Failed }
        }
    }
}

pub fn accepted() -> AskMachine<(), Accepted> {
    AskMachine::new(())
}
