// Step-sequencing invariants for the phase state machines.

use chainscribe::payload::Payload;
use chainscribe::pipeline::machine::PhaseStateMachine;
use chainscribe::pipeline::step::{Phase, Step};
use chainscribe::pipeline::work_item::{WorkItemStatus, WorkItemUpdate};
use proptest::prelude::*;

#[test]
fn preparation_visits_each_step_exactly_once() {
    let mut machine = PhaseStateMachine::new(Phase::Preparation);
    let mut visited = vec![machine.current_step()];

    while machine.status().next_step.is_some() {
        machine.advance();
        visited.push(machine.current_step());
    }

    assert_eq!(visited, Phase::Preparation.steps());

    // Advancing past the terminal step is a no-op.
    machine.advance();
    assert_eq!(machine.current_step(), Step::RetrieveSubmission);
    assert_eq!(machine.status().next_step, None);
}

#[test]
fn inscription_terminates_at_end() {
    let mut machine = PhaseStateMachine::new(Phase::Inscription);
    for _ in 0..Phase::Inscription.steps().len() {
        machine.advance();
    }
    assert_eq!(machine.current_step(), Step::End);
    assert_eq!(machine.current_step_label(), "end");
}

proptest! {
    // However many advances are attempted, the machine sits at the step
    // whose index is the number of successful advances, capped at terminal:
    // no skipping, no repeating, no wrapping.
    #[test]
    fn advance_count_maps_onto_the_step_list(advances in 0usize..16) {
        for phase in [Phase::Preparation, Phase::Inscription] {
            let mut machine = PhaseStateMachine::new(phase);
            for _ in 0..advances {
                machine.advance();
            }
            let steps = phase.steps();
            let expected = steps[advances.min(steps.len() - 1)];
            prop_assert_eq!(machine.current_step(), expected);
        }
    }
}

#[test]
fn reset_twice_equals_reset_once() {
    let mut machine = PhaseStateMachine::new(Phase::Preparation);
    machine.begin(vec![Payload::from_text("one").unwrap()]);
    machine.advance();
    machine.advance();
    machine.set_processing(true);

    machine.reset();
    let status_after_one = machine.status().clone();
    let items_after_one = machine.items().len();

    machine.reset();
    assert_eq!(machine.status(), &status_after_one);
    assert_eq!(machine.items().len(), items_after_one);
    assert!(machine.items().is_empty());
    assert_eq!(machine.current_step(), Step::Construct);
    assert_eq!(machine.status().next_step, Some(Step::Retrieve));
    assert!(!machine.status().is_processing);
    assert!(machine.error().is_none());
}

#[test]
fn update_item_is_the_only_mutation_path_and_merges() {
    let mut machine = PhaseStateMachine::new(Phase::Preparation);
    machine.begin(vec![
        Payload::from_text("a").unwrap(),
        Payload::from_text("b").unwrap(),
    ]);

    machine.update_item(
        1,
        WorkItemUpdate {
            status: Some(WorkItemStatus::Constructing),
            progress: Some(25),
            ..Default::default()
        },
    );

    assert_eq!(machine.item(0).unwrap().status, WorkItemStatus::Pending);
    assert_eq!(machine.item(1).unwrap().status, WorkItemStatus::Constructing);
    assert_eq!(machine.item(1).unwrap().progress, 25);

    // Lower progress is ignored while the item has not failed.
    machine.update_item(
        1,
        WorkItemUpdate {
            progress: Some(10),
            ..Default::default()
        },
    );
    assert_eq!(machine.item(1).unwrap().progress, 25);
}

#[test]
fn fail_all_items_spares_confirmed_work() {
    let mut machine = PhaseStateMachine::new(Phase::Preparation);
    machine.begin(vec![
        Payload::from_text("a").unwrap(),
        Payload::from_text("b").unwrap(),
    ]);
    machine.update_item(
        0,
        WorkItemUpdate {
            status: Some(WorkItemStatus::Confirmed),
            progress: Some(100),
            ..Default::default()
        },
    );

    machine.fail_all_items();

    assert_eq!(machine.item(0).unwrap().status, WorkItemStatus::Confirmed);
    assert_eq!(machine.item(0).unwrap().progress, 100);
    assert_eq!(machine.item(1).unwrap().status, WorkItemStatus::Failed);
    assert_eq!(machine.item(1).unwrap().progress, 0);
}
