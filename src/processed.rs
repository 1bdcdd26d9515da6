//! A song processed for Star Power optimisation.
//!
//! [`ProcessedSong`] bundles the timebase, the point set, and the SP tables
//! built from one note track, and answers the two questions the optimiser
//! keeps asking: how much SP is available between two points, and whether a
//! proposed activation interval is feasible.

use std::fmt::Write as _;

use crate::points::{PointRef, PointSet};
use crate::song::{Colour, NoteTrack, SyncTrack};
use crate::sp::{SpBar, SpData, MINIMUM_SP_AMOUNT, SP_PHRASE_AMOUNT};
use crate::time::{Beat, Measure, Position, Second, TimeConverter};

/// An activation interval under consideration, with the SP known to be
/// available when it could begin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActivationCandidate {
    /// First point covered by the activation.
    pub act_start: PointRef,
    /// Last point covered by the activation.
    pub act_end: PointRef,
    /// Earliest position the activation may begin.
    pub earliest_activation_point: Position,
    /// SP bounds at the earliest activation point.
    pub sp_bar: SpBar,
}

/// A settled activation interval of a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Activation {
    /// First point covered.
    pub act_start: PointRef,
    /// Last point covered.
    pub act_end: PointRef,
}

/// A full Star Power path.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Path {
    /// The activations in chart order.
    pub activations: Vec<Activation>,
    /// The score gained over never activating.
    pub score_boost: u32,
}

/// Whether an activation candidate is feasible, and if not, in which
/// direction it fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActValidity {
    /// The activation works as proposed.
    Success,
    /// Even best-case SP cannot cover the interval.
    InsufficientSp,
    /// SP would unavoidably cover the point after `act_end` too, so the
    /// candidate is dominated by its extension.
    SurplusSp,
}

/// Result of validating a candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActResult {
    /// The earliest position the activation can end. Meaningful only on
    /// success or surplus.
    pub ending_position: Position,
    /// The verdict.
    pub validity: ActValidity,
}

const UNBOUNDED: Position = Position {
    beat: Beat(f64::INFINITY),
    measure: Measure(f64::INFINITY),
};

/// A note track compiled into everything the optimiser needs.
///
/// Construction can only fail for out-of-memory; the input invariants are
/// upheld by the constructors of the arguments.
#[derive(Debug, Clone)]
pub struct ProcessedSong {
    converter: TimeConverter,
    points: PointSet,
    sp_data: SpData,
}

impl ProcessedSong {
    /// Processes a track under the given play parameters.
    ///
    /// `early_whammy` and `squeeze` lie in `[0.0, 1.0]`; `lazy_whammy` is a
    /// non-negative number of seconds.
    #[must_use]
    pub fn new<C: Colour>(
        track: &NoteTrack<C>,
        resolution: u32,
        sync_track: &SyncTrack,
        early_whammy: f64,
        squeeze: f64,
        lazy_whammy: Second,
    ) -> Self {
        let converter = TimeConverter::new(sync_track, resolution);
        let points = PointSet::new(track, resolution, &converter, squeeze);
        let sp_data = SpData::new(track, resolution, sync_track, early_whammy, lazy_whammy);
        Self {
            converter,
            points,
            sp_data,
        }
    }

    /// The timebase converter.
    #[must_use]
    pub fn converter(&self) -> &TimeConverter {
        &self.converter
    }

    /// The compiled scoring points.
    #[must_use]
    pub fn points(&self) -> &PointSet {
        &self.points
    }

    /// The SP drain and whammy tables.
    #[must_use]
    pub fn sp_data(&self) -> &SpData {
        &self.sp_data
    }

    /// The front of a point's hit window, narrowed to `squeeze`.
    #[must_use]
    pub fn adjusted_hit_window_start(&self, point: PointRef, squeeze: f64) -> Position {
        let point = &self.points[point];
        if squeeze == 1.0 {
            return point.hit_window_start;
        }
        let start = self.converter.beats_to_seconds(point.hit_window_start.beat);
        let mid = self.converter.beats_to_seconds(point.position.beat);
        let adjusted = Second(start.value() + (mid.value() - start.value()) * (1.0 - squeeze));
        self.converter
            .position(self.converter.seconds_to_beats(adjusted))
    }

    /// The back of a point's hit window, narrowed to `squeeze`.
    #[must_use]
    pub fn adjusted_hit_window_end(&self, point: PointRef, squeeze: f64) -> Position {
        let point = &self.points[point];
        if squeeze == 1.0 {
            return point.hit_window_end;
        }
        let end = self.converter.beats_to_seconds(point.hit_window_end.beat);
        let mid = self.converter.beats_to_seconds(point.position.beat);
        let adjusted = Second(end.value() + (mid.value() - end.value()) * (1.0 - squeeze));
        self.converter
            .position(self.converter.seconds_to_beats(adjusted))
    }

    /// The SP obtainable between `start` and the position of `act_start`.
    ///
    /// Phrase grants are counted for SP-granting points from `first_point`
    /// (inclusive) to `act_start` (exclusive) that could still be hit at
    /// `start`. Whammy counts fully towards the maximum; towards the minimum
    /// only up to `required_whammy_end`, if given. Both bounds are clamped
    /// to a full bar.
    #[must_use]
    pub fn total_available_sp(
        &self,
        start: Beat,
        first_point: PointRef,
        act_start: PointRef,
        required_whammy_end: Option<Beat>,
    ) -> SpBar {
        let mut sp_bar = SpBar::new(0.0, 0.0);
        for index in first_point.index()..act_start.index() {
            let point = &self.points[PointRef::new(index)];
            if point.is_sp_granting_note && point.hit_window_end.beat.value() >= start.value() {
                sp_bar.add_phrase();
            }
        }

        let act_start_beat = self.points[act_start].position.beat;
        if let Some(required) = required_whammy_end {
            if required.value() > start.value() {
                let whammy_end = Beat(required.value().min(act_start_beat.value()));
                sp_bar.min += self.sp_data.available_whammy(start, whammy_end);
                sp_bar.min = sp_bar.min.min(1.0);
            }
        }
        sp_bar.max += self.sp_data.available_whammy(start, act_start_beat);
        sp_bar.max = sp_bar.max.min(1.0);
        sp_bar
    }

    /// Validates a candidate under the full hit window with whammy assumed
    /// mandatory throughout.
    #[must_use]
    pub fn is_candidate_valid(&self, activation: &ActivationCandidate) -> ActResult {
        self.is_restricted_candidate_valid(activation, 1.0, None)
    }

    /// Validates a candidate under a narrowed hit window and an optional
    /// bound on how long the player is committed to whammying.
    ///
    /// Two walks run from `act_start` to `act_end`. The best-case walk
    /// starts as late as the window allows with the maximum SP, collecting
    /// intermediate phrase grants as late as they can be hit; if it exhausts
    /// before reaching `act_end`'s front end the candidate fails. The
    /// worst-case walk starts as early as possible with the minimum SP and
    /// yields the earliest position the activation can end; if that already
    /// reaches the front end of the point after `act_end`, the candidate is
    /// dominated by its extension.
    #[must_use]
    pub fn is_restricted_candidate_valid(
        &self,
        activation: &ActivationCandidate,
        squeeze: f64,
        required_whammy_end: Option<Position>,
    ) -> ActResult {
        let null_result = |validity| ActResult {
            ending_position: Position::zero(),
            validity,
        };
        if !activation.sp_bar.full_enough_to_activate() {
            return null_result(ActValidity::InsufficientSp);
        }
        let required = required_whammy_end.unwrap_or(UNBOUNDED);

        let mut pos_max = self.adjusted_hit_window_end(activation.act_start, squeeze);
        let mut sp_max = activation.sp_bar.max;

        let mut pos_min = self.adjusted_hit_window_start(activation.act_start, squeeze);
        if activation.earliest_activation_point.beat.value() < pos_min.beat.value() {
            pos_min = activation.earliest_activation_point;
        }
        let mut sp_min = activation.sp_bar.min.max(MINIMUM_SP_AMOUNT);

        let mut next_grant = self
            .points
            .next_sp_granting_note(activation.act_start.next());
        while let Some(grant) = next_grant {
            if grant > activation.act_end {
                break;
            }
            let front = self.adjusted_hit_window_start(grant, squeeze);
            let back = self.adjusted_hit_window_end(grant, squeeze);

            if back.beat.value() > pos_max.beat.value() {
                let propagated = self
                    .sp_data
                    .propagate_sp_over_whammy_max(pos_max, back, sp_max);
                if propagated < 0.0 {
                    // The grant may still be reachable by hitting the note
                    // earlier in its window.
                    let at_front = if front.beat.value() > pos_max.beat.value() {
                        self.sp_data
                            .propagate_sp_over_whammy_max(pos_max, front, sp_max)
                    } else {
                        sp_max
                    };
                    if at_front < 0.0 {
                        return null_result(ActValidity::InsufficientSp);
                    }
                    pos_max = self.sp_data.activation_end_point(pos_max, back, sp_max);
                    sp_max = 0.0;
                } else {
                    pos_max = back;
                    sp_max = propagated;
                }
            }
            sp_max = (sp_max + SP_PHRASE_AMOUNT).min(1.0);

            if front.beat.value() > pos_min.beat.value() {
                sp_min = self
                    .sp_data
                    .propagate_sp_over_whammy_min(pos_min, front, sp_min, required);
                pos_min = front;
            }
            if required.beat.value() >= self.points[grant].position.beat.value() {
                sp_min = (sp_min + SP_PHRASE_AMOUNT).min(1.0);
            }

            next_grant = self.points.next_sp_granting_note(grant.next());
        }

        let end_front = self.adjusted_hit_window_start(activation.act_end, squeeze);
        if end_front.beat.value() > pos_max.beat.value() {
            sp_max = self
                .sp_data
                .propagate_sp_over_whammy_max(pos_max, end_front, sp_max);
            if sp_max < 0.0 {
                return null_result(ActValidity::InsufficientSp);
            }
        }
        if end_front.beat.value() > pos_min.beat.value() {
            sp_min = self
                .sp_data
                .propagate_sp_over_whammy_min(pos_min, end_front, sp_min, required);
            pos_min = end_front;
        }

        let ending_position = self
            .sp_data
            .activation_end_point(pos_min, UNBOUNDED, sp_min.min(1.0));

        let after_end = activation.act_end.next();
        if after_end.index() < self.points.len() {
            let next_front = self.adjusted_hit_window_start(after_end, squeeze);
            if ending_position.beat.value() >= next_front.beat.value() {
                return ActResult {
                    ending_position,
                    validity: ActValidity::SurplusSp,
                };
            }
        }
        ActResult {
            ending_position,
            validity: ActValidity::Success,
        }
    }

    /// Renders a path as human-readable text.
    #[must_use]
    pub fn path_summary(&self, path: &Path) -> String {
        let base_score = match self.points.last() {
            Some(last) => self.points.range_score(PointRef::new(0), last.next()),
            None => 0,
        };
        let mut summary = String::new();
        let _ = writeln!(summary, "Total score: {}", base_score + path.score_boost);
        let _ = writeln!(summary, "Score boost: {}", path.score_boost);
        for (number, activation) in path.activations.iter().enumerate() {
            let start = &self.points[activation.act_start];
            let end = &self.points[activation.act_end];
            let _ = writeln!(
                summary,
                "Activation {}: measures {:.3} to {:.3} (beats {:.3} to {:.3}), points {} to {}",
                number + 1,
                start.position.measure.value(),
                end.position.measure.value(),
                start.position.beat.value(),
                end.position.beat.value(),
                activation.act_start.index(),
                activation.act_end.index(),
            );
        }
        summary
    }
}
