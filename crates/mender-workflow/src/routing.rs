//! The two routing gates of the self-correction loop.
//!
//! Both are closures over a [`CycleGuard`] clone so the graph owns its
//! ceiling configuration; no process-wide state is consulted.

use mender_graph::{CycleGuard, State, Target};

use crate::nodes::{INVESTIGATOR, MECHANIC, PUBLISHER};
use crate::state::{FIX_VALIDATED, ROOT_CAUSE_IDENTIFIED};

/// After the investigator: progress once a root cause is identified,
/// exhaust when the cycle budget is spent, otherwise investigate again.
pub fn investigation_gate(guard: CycleGuard) -> impl Fn(&State) -> Target {
    move |state: &State| {
        if state.get_bool(ROOT_CAUSE_IDENTIFIED) {
            Target::node(MECHANIC)
        } else if guard.exhausted(state) {
            Target::Exhaust
        } else {
            Target::node(INVESTIGATOR)
        }
    }
}

/// After the validator — the self-correction gate. In priority order:
/// a validated fix goes to publication, a spent cycle budget exhausts the
/// run, and anything else loops back to the investigator with the
/// accumulated feedback already merged into state.
pub fn validation_gate(guard: CycleGuard) -> impl Fn(&State) -> Target {
    move |state: &State| {
        if state.get_bool(FIX_VALIDATED) {
            Target::node(PUBLISHER)
        } else if guard.exhausted(state) {
            Target::Exhaust
        } else {
            Target::node(INVESTIGATOR)
        }
    }
}
