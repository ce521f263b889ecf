//! Transition Consolidator — component D.
//!
//! Stateful reconciler: merges each incoming forecast against the currently
//! planned next transition, using the classifier (C) to decide what
//! changes. Ported from `SerialConsolidator` in
//! original_source/soundsride/consolidator.py, one session's worth of
//! state per instance (the Session Coordinator owns one per session).

use crate::classifier::{classify, Classification, NextTransition, Strategy, Tolerances};
use crate::genre::Genre;
use crate::transition_spec::{Transition, TransitionId, TransitionSpec};
use std::collections::HashSet;

/// The consolidator's persistent state: transitions partitioned into
/// already-crossed, the single committed-to next one, and everything
/// beyond it. All three share the session's anchor (`anchor_ms`).
#[derive(Debug, Clone)]
pub struct ConsolidatedSpec {
    pub anchor_ms: i64,
    passed: Vec<(TransitionId, i64, Genre)>,
    planned_next: Option<(TransitionId, i64, Genre)>,
    distant: Vec<(TransitionId, i64, Genre)>,
}

impl ConsolidatedSpec {
    fn empty(anchor_ms: i64) -> Self {
        Self { anchor_ms, passed: Vec::new(), planned_next: None, distant: Vec::new() }
    }

    pub fn passed(&self) -> &[(TransitionId, i64, Genre)] {
        &self.passed
    }

    pub fn planned_next(&self) -> Option<&(TransitionId, i64, Genre)> {
        self.planned_next.as_ref()
    }

    pub fn distant(&self) -> &[(TransitionId, i64, Genre)] {
        &self.distant
    }

    /// Concatenation `passed ++ [planned_next?] ++ distant` in absolute
    /// coordinates, the view the planner (E) consumes.
    pub fn merged(&self) -> Vec<(TransitionId, i64, Genre)> {
        let mut out = Vec::with_capacity(self.passed.len() + self.distant.len() + 1);
        out.extend(self.passed.iter().cloned());
        out.extend(self.planned_next.iter().cloned());
        out.extend(self.distant.iter().cloned());
        out
    }
}

/// Stateful reconciler owning one session's `ConsolidatedSpec`.
pub struct TransitionConsolidator {
    state: ConsolidatedSpec,
    passed_ids: HashSet<TransitionId>,
    tolerances: Tolerances,
    latest_strategy: Option<Strategy>,
}

impl TransitionConsolidator {
    pub fn new(anchor_ms: i64, tolerances: Tolerances) -> Self {
        Self {
            state: ConsolidatedSpec::empty(anchor_ms),
            passed_ids: HashSet::new(),
            tolerances,
            latest_strategy: None,
        }
    }

    pub fn get(&self) -> &ConsolidatedSpec {
        &self.state
    }

    pub fn latest_strategy(&self) -> Option<Strategy> {
        self.latest_strategy
    }

    /// Reconcile an incoming spec. Returns the classification, or `None` if
    /// the update was a duplicate of an already-passed transition (a no-op,
    /// per section 4.D step 1).
    pub fn update(&mut self, now_ms: i64, new_spec: &TransitionSpec) -> Option<Classification> {
        let actual = new_spec.iter_absolute().next();

        if let Some((id, _, _)) = actual {
            if self.passed_ids.contains(&id) {
                return None;
            }
        }

        let planned = self.state.planned_next.as_ref().map(|(id, abs_ms, _)| NextTransition {
            id: *id,
            abs_ms: *abs_ms,
        });
        let actual_nt = actual.map(|(id, abs_ms, _)| NextTransition { id, abs_ms });

        let classification = classify(now_ms, planned, actual_nt, self.tolerances);
        self.latest_strategy = Some(classification.strategy);

        let tail: Vec<(TransitionId, i64, Genre)> = new_spec
            .iter_absolute()
            .skip(1)
            .map(|(id, abs, genre)| (id, abs, genre.clone()))
            .collect();

        match classification.strategy {
            Strategy::Idling => {}

            Strategy::PassedFinalTransition => {
                if let Some(p) = self.state.planned_next.take() {
                    self.passed_ids.insert(p.0);
                    self.state.passed.push(p);
                }
            }

            Strategy::Start => {
                let (id, abs, genre) = actual.expect("Start implies an actual transition");
                self.state.planned_next = Some((id, abs, genre.clone()));
                self.state.distant = tail;
            }

            Strategy::Temporise | Strategy::NeglectMisalignment | Strategy::EndureMissedTransition => {
                self.state.distant = tail;
            }

            Strategy::Delay | Strategy::Accelerate | Strategy::RedispatchMissedTransition => {
                let (_, new_abs, _) = actual.expect("id-matched strategies imply an actual");
                if let Some(p) = self.state.planned_next.as_mut() {
                    p.1 = new_abs;
                }
                self.state.distant = tail;
            }

            Strategy::Passed => {
                if let Some(p) = self.state.planned_next.take() {
                    self.passed_ids.insert(p.0);
                    self.state.passed.push(p);
                }
                let (id, abs, genre) = actual.expect("Passed implies an actual transition");
                self.state.planned_next = Some((id, abs, genre.clone()));
                self.state.distant = tail;
            }

            Strategy::Undefined => {}
        }

        Some(classification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(anchor_ms: i64, pairs: &[(TransitionId, i64, &str)]) -> TransitionSpec {
        let transitions = pairs
            .iter()
            .map(|(id, offset, genre)| Transition { id: *id, offset_ms: *offset, post_genre: Genre::new(*genre) })
            .collect();
        TransitionSpec::new(anchor_ms, transitions).unwrap()
    }

    #[test]
    fn s1_startup() {
        let mut c = TransitionConsolidator::new(0, Tolerances::default());
        let s = spec(0, &[(5, 10_000, "high"), (10, 20_000, "low")]);
        let result = c.update(0, &s).unwrap();
        assert_eq!(result.strategy, Strategy::Start);
        assert_eq!(c.get().planned_next(), Some(&(5, 10_000, Genre::new("high"))));
        assert_eq!(c.get().distant(), &[(10, 20_000, Genre::new("low"))]);
    }

    #[test]
    fn s3_delay_inside_hot_zone() {
        let tol = Tolerances { deviation_tolerance_ms: 1_050, hot_zone_entrance_ms: 15_000 };
        let mut c = TransitionConsolidator::new(0, tol);
        let s0 = spec(0, &[(5, 10_000, "high"), (10, 20_000, "low")]);
        c.update(0, &s0).unwrap();

        // now=8500, actual=(5,10500,"high"): d_pa=500 < T => NeglectMisalignment
        let s1 = spec(8_500, &[(5, 2_000, "high"), (10, 11_500, "low")]);
        let r1 = c.update(8_500, &s1).unwrap();
        assert_eq!(r1.strategy, Strategy::NeglectMisalignment);
        assert_eq!(c.get().planned_next().unwrap().1, 10_000);

        // now=8500, actual=(5,12000,"high"): d_pa=2000 >= T => Delay
        let s2 = spec(8_500, &[(5, 3_500, "high"), (10, 13_500, "low")]);
        let r2 = c.update(8_500, &s2).unwrap();
        assert_eq!(r2.strategy, Strategy::Delay);
        assert_eq!(c.get().planned_next().unwrap().1, 12_000);
    }

    #[test]
    fn s4_passed_transition() {
        let mut c = TransitionConsolidator::new(0, Tolerances::default());
        let s0 = spec(0, &[(5, 10_000, "high"), (10, 20_000, "low")]);
        c.update(0, &s0).unwrap();

        let s1 = spec(11_000, &[(10, 9_000, "low")]);
        let r1 = c.update(11_000, &s1).unwrap();
        assert_eq!(r1.strategy, Strategy::Passed);
        assert_eq!(c.get().passed(), &[(5, 10_000, Genre::new("high"))]);
        assert_eq!(c.get().planned_next(), Some(&(10, 20_000, Genre::new("low"))));
    }

    #[test]
    fn duplicate_of_passed_transition_is_noop() {
        let mut c = TransitionConsolidator::new(0, Tolerances::default());
        let s0 = spec(0, &[(5, 10_000, "high"), (10, 20_000, "low")]);
        c.update(0, &s0).unwrap();
        let s1 = spec(11_000, &[(10, 9_000, "low")]);
        c.update(11_000, &s1).unwrap();

        // id 5 already in `passed`; an update whose first transition is id 5
        // must be a no-op (even if the rest of the spec is well-formed).
        let s2 = spec(12_000, &[(5, 1_000, "high"), (10, 8_000, "low")]);
        let r2 = c.update(12_000, &s2);
        assert!(r2.is_none());
        assert_eq!(c.get().planned_next(), Some(&(10, 20_000, Genre::new("low"))));
    }

    #[test]
    fn merged_view_concatenates_in_order() {
        let mut c = TransitionConsolidator::new(0, Tolerances::default());
        let s0 = spec(0, &[(5, 10_000, "high"), (10, 20_000, "low"), (15, 30_000, "high")]);
        c.update(0, &s0).unwrap();
        let merged = c.get().merged();
        assert_eq!(merged.len(), 3); // planned_next (id 5) + distant (ids 10, 15)
        assert_eq!(merged[0].0, 5);
        assert_eq!(merged[1].0, 10);
        assert_eq!(merged[2].0, 15);
    }
}
