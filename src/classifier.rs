//! Updating-Strategy Classifier — component C.
//!
//! A pure function `(now, planned, actual, tolerances) -> Strategy`. Ported
//! from `UpdatingStrategyDetection.detect` in
//! original_source/soundsride/consolidator.py, re-architected per the design
//! notes as an explicit decision table over an enumerated condition instead
//! of a chain of `elif`s, so the match is exhaustiveness-checked.

use crate::transition_spec::TransitionId;

/// Tolerances controlling the classifier. Defaults match section 4.C:
/// `deviation_tolerance = 0`, `hot_zone_entrance = +inf` (always imminent,
/// no misalignment tolerated).
#[derive(Debug, Clone, Copy)]
pub struct Tolerances {
    pub deviation_tolerance_ms: i64,
    pub hot_zone_entrance_ms: i64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self { deviation_tolerance_ms: 0, hot_zone_entrance_ms: i64::MAX }
    }
}

/// The three signed deltas carried by a non-trivial strategy, in
/// milliseconds: current->planned, current->actual, planned->actual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Deltas {
    pub current_to_planned_ms: i64,
    pub current_to_actual_ms: i64,
    pub planned_to_actual_ms: i64,
}

/// Tagged sum of every updating strategy the classifier can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Nothing planned, nothing upcoming.
    Idling,
    /// Nothing planned, something upcoming: adopt it.
    Start,
    /// Something planned, nothing upcoming: we passed the final transition.
    PassedFinalTransition,
    /// Planned and actual ids differ: we passed the planned transition.
    Passed,
    /// Both ids match; both distances beyond the hot zone.
    Temporise,
    /// Both ids match; in the hot zone, misalignment within tolerance.
    NeglectMisalignment,
    /// Both ids match; in the hot zone, actual arrives later than planned.
    Delay,
    /// Both ids match; in the hot zone, actual arrives earlier than planned.
    Accelerate,
    /// Planned already passed, actual still upcoming, within tolerance.
    EndureMissedTransition,
    /// Planned already passed, actual still upcoming, beyond tolerance.
    RedispatchMissedTransition,
    /// None of the enumerated conditions apply.
    Undefined,
}

impl Strategy {
    /// Whether the consolidator must act on this strategy (mutate
    /// `planned_next`/`distant` and trigger a re-plan).
    pub fn action_required(self) -> bool {
        matches!(
            self,
            Strategy::Start
                | Strategy::PassedFinalTransition
                | Strategy::Passed
                | Strategy::Delay
                | Strategy::Accelerate
                | Strategy::RedispatchMissedTransition
        )
    }
}

/// Result of classification: the strategy plus the deltas that produced it
/// (present only when both a planned and an actual transition with matching
/// ids were compared).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub strategy: Strategy,
    pub deltas: Deltas,
}

impl Classification {
    fn simple(strategy: Strategy) -> Self {
        Self { strategy, deltas: Deltas::default() }
    }
}

/// Planned or actual next-transition reference used by the classifier.
#[derive(Debug, Clone, Copy)]
pub struct NextTransition {
    pub id: TransitionId,
    pub abs_ms: i64,
}

/// Classify the current situation. Pure: takes no state, mutates nothing.
pub fn classify(
    now_ms: i64,
    planned: Option<NextTransition>,
    actual: Option<NextTransition>,
    tol: Tolerances,
) -> Classification {
    let (planned, actual) = match (planned, actual) {
        (None, None) => return Classification::simple(Strategy::Idling),
        (Some(_), None) => return Classification::simple(Strategy::PassedFinalTransition),
        (None, Some(_)) => return Classification::simple(Strategy::Start),
        (Some(p), Some(a)) => (p, a),
    };

    if planned.id != actual.id {
        return Classification::simple(Strategy::Passed);
    }

    let d_cp = planned.abs_ms - now_ms;
    let d_ca = actual.abs_ms - now_ms;
    let d_pa = actual.abs_ms - planned.abs_ms;

    let deltas = Deltas {
        current_to_planned_ms: d_cp,
        current_to_actual_ms: d_ca,
        planned_to_actual_ms: d_pa,
    };
    let hz = tol.hot_zone_entrance_ms;
    let t = tol.deviation_tolerance_ms;

    let both_beyond_hot_zone = d_ca >= hz && d_cp >= hz;
    let both_in_hot_zone = (0..=hz).contains(&d_ca) && (0..=hz).contains(&d_cp);
    let actual_beyond_planned_in = d_ca >= hz && (0..=hz).contains(&d_cp);
    let actual_in_planned_beyond = (0..=hz).contains(&d_ca) && d_cp >= hz;
    let planned_passed_actual_upcoming = d_ca >= 0 && d_cp <= 0;

    // The table in section 4.C lists NeglectMisalignment as `|d_pa| <= T` and
    // Delay as `d_pa >= T`, which overlap at `d_pa == T`. Section 8's boundary
    // property resolves the tie toward action: "right-closed tolerance on
    // the positive side" means T itself belongs to Delay, not
    // NeglectMisalignment. The strict `<` below (and its mirror for
    // Endure/Redispatch) implements that resolution.
    let strategy = if both_beyond_hot_zone {
        Strategy::Temporise
    } else if both_in_hot_zone && d_pa >= t {
        Strategy::Delay
    } else if both_in_hot_zone && d_pa <= -t {
        Strategy::Accelerate
    } else if both_in_hot_zone && d_pa.abs() < t {
        Strategy::NeglectMisalignment
    } else if actual_beyond_planned_in && d_pa >= t {
        Strategy::Delay
    } else if actual_beyond_planned_in && d_pa.abs() < t {
        Strategy::NeglectMisalignment
    } else if actual_in_planned_beyond && d_pa <= -t {
        Strategy::Accelerate
    } else if actual_in_planned_beyond && d_pa.abs() < t {
        Strategy::NeglectMisalignment
    } else if planned_passed_actual_upcoming && d_pa >= t {
        Strategy::RedispatchMissedTransition
    } else if planned_passed_actual_upcoming && d_pa < t {
        Strategy::EndureMissedTransition
    } else {
        Strategy::Undefined
    };

    Classification { strategy, deltas }
}
