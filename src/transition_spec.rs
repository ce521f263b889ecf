//! Transition Spec — component B.
//!
//! An immutable value carrying an ordered list of (transition-id, absolute
//! timestamp, post-genre) triples, anchored to a session timestamp. Grounded
//! on the Python `TransitionSpec` (original_source/soundsride/mix_plan.py),
//! re-expressed as ordered `Vec`s instead of a `dict` keyed by offset so that
//! offset collisions and ordering are caught at construction time rather than
//! silently deduplicated by dict semantics.

use crate::error::{Error, Result};
use crate::genre::Genre;
use std::collections::HashSet;

/// A single (id, offset, post-genre) triple, before being anchored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub id: TransitionId,
    /// Milliseconds relative to the spec's anchor. Non-negative.
    pub offset_ms: i64,
    pub post_genre: Genre,
}

/// Transition ids are small non-negative integers in the wire format
/// (`transitionId`) but are opaque identifiers to the core — never
/// interpreted arithmetically.
pub type TransitionId = i64;

/// An immutable, validated transition spec.
///
/// Invariants (enforced in `new`):
/// - offsets strictly increasing
/// - ids unique within the spec
/// - offsets non-negative
/// - empty transition lists are permitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionSpec {
    /// Absolute millisecond at which offsets are measured.
    pub anchor_ms: i64,
    transitions: Vec<Transition>,
}

impl TransitionSpec {
    /// Construct a spec, validating monotonicity and id uniqueness.
    ///
    /// Returns `Error::MalformedForecast` on a non-monotone or
    /// duplicate-id input; this is the RPC-boundary rejection point — by the
    /// time a spec exists, it is well-formed (section 4.D failure semantics).
    pub fn new(anchor_ms: i64, transitions: Vec<Transition>) -> Result<Self> {
        let mut seen_ids = HashSet::with_capacity(transitions.len());
        let mut last_offset: Option<i64> = None;

        for t in &transitions {
            if t.offset_ms < 0 {
                return Err(Error::MalformedForecast(format!(
                    "negative offset {} for transition {}",
                    t.offset_ms, t.id
                )));
            }
            if let Some(last) = last_offset {
                if t.offset_ms <= last {
                    return Err(Error::MalformedForecast(format!(
                        "offsets must be strictly increasing, got {} after {}",
                        t.offset_ms, last
                    )));
                }
            }
            last_offset = Some(t.offset_ms);

            if !seen_ids.insert(t.id) {
                return Err(Error::MalformedForecast(format!(
                    "duplicate transition id {}",
                    t.id
                )));
            }

            if !t.post_genre.is_known() {
                return Err(Error::MalformedForecast(format!(
                    "unrecognized genre: {}",
                    t.post_genre
                )));
            }
        }

        Ok(Self { anchor_ms, transitions })
    }

    /// An empty spec anchored at `anchor_ms`.
    pub fn empty(anchor_ms: i64) -> Self {
        Self { anchor_ms, transitions: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// First transition, if any.
    pub fn first(&self) -> Option<&Transition> {
        self.transitions.first()
    }

    /// All but the first transition, re-anchored at the same anchor (the
    /// tail keeps absolute timestamps stable since the anchor is unchanged).
    pub fn tail(&self) -> Vec<Transition> {
        self.transitions.iter().skip(1).cloned().collect()
    }

    /// Absolute timestamp for a transition at the given offset.
    pub fn absolute_ms(&self, offset_ms: i64) -> i64 {
        self.anchor_ms + offset_ms
    }

    /// Iterate `(id, absolute_ms, post_genre)` triples.
    pub fn iter_absolute(&self) -> impl Iterator<Item = (TransitionId, i64, &Genre)> {
        self.transitions
            .iter()
            .map(move |t| (t.id, self.absolute_ms(t.offset_ms), &t.post_genre))
    }
}
