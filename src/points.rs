//! Compilation of a note track into an ordered sequence of scoring points.
//!
//! Each chord becomes one point worth its colour count; each sustain emits
//! one extra point per tick. Points carry their hit windows as fully
//! materialised [`Position`]s so the optimiser never touches the converter.

use itertools::Itertools;

use crate::song::{Colour, NoteTrack, StarPower, Tick};
use crate::time::{Beat, Position, Second, TimeConverter};

/// Half-width of the hit window at full squeeze, in seconds.
pub const HIT_WINDOW_SECONDS: f64 = 0.07;

/// A stable index of a point in a [`PointSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PointRef(usize);

impl PointRef {
    /// Wraps a raw index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// The raw index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }

    /// The reference one point later.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// A single scoring point.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    /// Where the point scores.
    pub position: Position,
    /// Earliest position the point can be hit.
    pub hit_window_start: Position,
    /// Latest position the point can be hit.
    pub hit_window_end: Position,
    /// Value under the normalised scoring rules.
    pub value: u32,
    /// Value before any multiplier, equal to `value` in this core.
    pub base_value: u32,
    /// Whether the point comes from a sustain tick rather than a note.
    pub is_hold_point: bool,
    /// Whether hitting this point completes a Star Power phrase.
    pub is_sp_granting_note: bool,
}

/// The ordered scoring points of one track, with the auxiliary indexes the
/// optimiser queries in O(1).
#[derive(Debug, Clone)]
pub struct PointSet {
    points: Vec<Point>,
    next_non_hold_point: Vec<usize>,
    next_sp_granting_note: Vec<usize>,
    solo_boosts: Vec<(Position, u32)>,
    cumulative_score_totals: Vec<u32>,
}

fn phrase_containing(phrases: &[StarPower], position: Tick) -> bool {
    let idx = phrases.partition_point(|p| p.position + p.length <= position);
    phrases.get(idx).is_some_and(|p| p.contains(position))
}

fn window_position(converter: &TimeConverter, mid: Second, offset: f64) -> Position {
    converter.position(converter.seconds_to_beats(Second(mid.value() + offset)))
}

impl PointSet {
    /// Compiles a track into points.
    ///
    /// `squeeze` scales the hit window and must lie in `[0.0, 1.0]`.
    #[must_use]
    pub fn new<C: Colour>(
        track: &NoteTrack<C>,
        resolution: u32,
        converter: &TimeConverter,
        squeeze: f64,
    ) -> Self {
        let res = f64::from(resolution);
        let window = HIT_WINDOW_SECONDS * squeeze;
        let mut points = Vec::with_capacity(track.notes().len());

        for (tick, chord) in &track.notes().iter().chunk_by(|note| note.position) {
            let mut colour_count = 0u32;
            let mut max_length = 0u32;
            for note in chord {
                colour_count += 1;
                max_length = max_length.max(note.length);
            }

            let beat = Beat(f64::from(tick) / res);
            let position = converter.position(beat);
            let mid_seconds = converter.beats_to_seconds(beat);
            points.push(Point {
                position,
                hit_window_start: window_position(converter, mid_seconds, -window),
                hit_window_end: window_position(converter, mid_seconds, window),
                value: colour_count,
                base_value: colour_count,
                is_hold_point: false,
                is_sp_granting_note: phrase_containing(track.sp_phrases(), tick),
            });

            for hold_tick in tick + 1..=tick + max_length {
                let hold_position = converter.position(Beat(f64::from(hold_tick) / res));
                points.push(Point {
                    position: hold_position,
                    hit_window_start: hold_position,
                    hit_window_end: hold_position,
                    value: 1,
                    base_value: 1,
                    is_hold_point: true,
                    is_sp_granting_note: false,
                });
            }
        }

        points.sort_by(|a, b| a.position.beat.value().total_cmp(&b.position.beat.value()));

        let mut next_non_hold_point = vec![points.len(); points.len()];
        let mut next_sp_granting_note = vec![points.len(); points.len()];
        let mut non_hold = points.len();
        let mut sp_granting = points.len();
        for (index, point) in points.iter().enumerate().rev() {
            if !point.is_hold_point {
                non_hold = index;
            }
            if point.is_sp_granting_note {
                sp_granting = index;
            }
            next_non_hold_point[index] = non_hold;
            next_sp_granting_note[index] = sp_granting;
        }

        let mut cumulative_score_totals = Vec::with_capacity(points.len() + 1);
        let mut total = 0u32;
        cumulative_score_totals.push(0);
        for point in &points {
            total += point.value;
            cumulative_score_totals.push(total);
        }

        let solo_boosts = Self::form_solo_boosts(track, res, converter);

        Self {
            points,
            next_non_hold_point,
            next_sp_granting_note,
            solo_boosts,
            cumulative_score_totals,
        }
    }

    fn form_solo_boosts<C: Colour>(
        track: &NoteTrack<C>,
        res: f64,
        converter: &TimeConverter,
    ) -> Vec<(Position, u32)> {
        const SOLO_NOTE_BOOST: u32 = 2;

        let mut solo_boosts = Vec::new();
        let mut solo_start: Option<Tick> = None;
        let mut closed_spans = Vec::new();
        for event in track.events() {
            match event.name.as_str() {
                "solo" => solo_start = Some(event.position),
                "soloend" => {
                    if let Some(start) = solo_start.take() {
                        closed_spans.push((start, event.position));
                    }
                }
                _ => {}
            }
        }
        if let (Some(start), Some(last)) = (solo_start, track.notes().last()) {
            closed_spans.push((start, last.position));
        }

        for (start, end) in closed_spans {
            let notes_in_span = track
                .notes()
                .iter()
                .filter(|note| note.position >= start && note.position <= end)
                .count() as u32;
            if notes_in_span == 0 {
                continue;
            }
            let end_position = converter.position(Beat(f64::from(end) / res));
            solo_boosts.push((end_position, SOLO_NOTE_BOOST * notes_in_span));
        }
        solo_boosts
    }

    /// The number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the track compiled to no points at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The reference of the first point, if any.
    #[must_use]
    pub fn first(&self) -> Option<PointRef> {
        (!self.points.is_empty()).then_some(PointRef(0))
    }

    /// The reference of the last point, if any.
    #[must_use]
    pub fn last(&self) -> Option<PointRef> {
        self.points.len().checked_sub(1).map(PointRef)
    }

    /// Iterates over all points in order.
    pub fn iter(&self) -> impl Iterator<Item = &Point> {
        self.points.iter()
    }

    /// The earliest non-hold point at or after `point`.
    #[must_use]
    pub fn next_non_hold_point(&self, point: PointRef) -> Option<PointRef> {
        let index = *self.next_non_hold_point.get(point.0)?;
        (index < self.points.len()).then_some(PointRef(index))
    }

    /// The earliest SP-granting point at or after `point`.
    #[must_use]
    pub fn next_sp_granting_note(&self, point: PointRef) -> Option<PointRef> {
        let index = *self.next_sp_granting_note.get(point.0)?;
        (index < self.points.len()).then_some(PointRef(index))
    }

    /// The combined value of all points `p` with `start <= p < end`.
    #[must_use]
    pub fn range_score(&self, start: PointRef, end: PointRef) -> u32 {
        self.cumulative_score_totals[end.0] - self.cumulative_score_totals[start.0]
    }

    /// The solo bonuses of the track as `(end position, boost)` pairs.
    #[must_use]
    pub fn solo_boosts(&self) -> &[(Position, u32)] {
        &self.solo_boosts
    }
}

impl std::ops::Index<PointRef> for PointSet {
    type Output = Point;

    fn index(&self, index: PointRef) -> &Point {
        &self.points[index.0]
    }
}
