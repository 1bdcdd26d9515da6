//! The dynamic-programming search for an optimal Star Power path.
//!
//! Subproblems are "best path from point `p` onwards, standing at position
//! `pos`"; they are memoised in an ordered map. A second map keyed by point
//! alone handles the states where SP is already full, which no longer depend
//! on the position. Candidate activations are enumerated only at points
//! where the SP level can first cross the activation minimum.

use std::collections::BTreeMap;

use log::debug;

use crate::points::PointRef;
use crate::processed::{ActValidity, Activation, ActivationCandidate, Path, ProcessedSong};
use crate::sp::{SpBar, MEASURES_PER_BAR, MINIMUM_SP_AMOUNT};
use crate::time::Position;

#[derive(Debug, Clone, Copy)]
struct CacheKey {
    point: PointRef,
    position: Position,
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for CacheKey {}

impl PartialOrd for CacheKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CacheKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.point.cmp(&other.point).then_with(|| {
            self.position
                .beat
                .value()
                .total_cmp(&other.position.beat.value())
        })
    }
}

#[derive(Debug, Clone)]
struct CacheValue {
    path: Path,
    possible_next_acts: Vec<(Activation, Option<CacheKey>)>,
}

#[derive(Debug, Default)]
struct Cache {
    paths: BTreeMap<CacheKey, CacheValue>,
    full_sp_paths: BTreeMap<PointRef, CacheValue>,
}

/// Finds the optimal Star Power path over a processed song.
#[derive(Debug)]
pub struct Optimiser<'a> {
    song: &'a ProcessedSong,
    total_solo_boost: u32,
    next_candidate_points: Vec<usize>,
}

impl<'a> Optimiser<'a> {
    /// Prepares the search over `song`.
    #[must_use]
    pub fn new(song: &'a ProcessedSong) -> Self {
        let total_solo_boost = song.points().solo_boosts().iter().map(|(_, boost)| boost).sum();
        Self {
            song,
            total_solo_boost,
            next_candidate_points: Self::form_next_candidate_points(song),
        }
    }

    /// For every point, the earliest point at or after it where an
    /// activation could first become possible: a non-hold point that grants
    /// SP or directly follows a granting note.
    fn form_next_candidate_points(song: &ProcessedSong) -> Vec<usize> {
        let points = song.points();
        let len = points.len();

        let mut is_candidate = vec![false; len];
        let mut after_grant = false;
        for index in 0..len {
            let point = &points[PointRef::new(index)];
            if !point.is_hold_point {
                if point.is_sp_granting_note || after_grant {
                    is_candidate[index] = true;
                }
                if !point.is_sp_granting_note {
                    after_grant = false;
                }
            }
            if point.is_sp_granting_note {
                after_grant = true;
            }
        }

        let mut next_candidate_points = vec![len; len];
        let mut current = len;
        for index in (0..len).rev() {
            if is_candidate[index] {
                current = index;
            }
            next_candidate_points[index] = current;
        }
        next_candidate_points
    }

    fn next_candidate_point(&self, point: PointRef) -> Option<PointRef> {
        let index = *self.next_candidate_points.get(point.index())?;
        (index < self.song.points().len()).then_some(PointRef::new(index))
    }

    fn advance_cache_key(&self, key: CacheKey) -> Option<CacheKey> {
        let point = self.next_candidate_point(key.point.next())?;
        Some(CacheKey {
            point,
            position: key.position,
        })
    }

    /// The earliest end worth trying for an activation starting at `point`:
    /// anything whose successor is still inside the guaranteed drain
    /// distance would come back as surplus. One point of margin absorbs the
    /// hit-window wiggle on the activation start.
    fn act_end_lower_bound(&self, point: PointRef, pos: crate::time::Measure, sp: f64) -> PointRef {
        let points = self.song.points();
        let min_end_measure = pos.value() + sp * MEASURES_PER_BAR;
        let mut lower = point.index();
        let mut upper = points.len();
        while lower < upper {
            let mid = (lower + upper) / 2;
            if points[PointRef::new(mid)].position.measure.value() < min_end_measure {
                lower = mid + 1;
            } else {
                upper = mid;
            }
        }
        let clamped = lower.saturating_sub(1).min(points.len() - 1);
        PointRef::new(clamped.max(point.index()))
    }

    fn path_is_better(candidate: &Path, best: &Path) -> bool {
        use std::cmp::Ordering;

        match candidate.score_boost.cmp(&best.score_boost) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => match candidate.activations.len().cmp(&best.activations.len()) {
                Ordering::Less => true,
                Ordering::Greater => false,
                Ordering::Equal => {
                    let lhs = candidate.activations.iter().map(|act| act.act_start);
                    let rhs = best.activations.iter().map(|act| act.act_start);
                    lhs.lt(rhs)
                }
            },
        }
    }

    /// Reuses a cached subpath computed at the same point but a later
    /// position, when no SP difference separates the two positions for any
    /// activation start the cached solution considered.
    fn try_previous_best_subpaths(&self, key: CacheKey, cache: &Cache) -> Option<CacheValue> {
        let (cached_key, value) = cache
            .paths
            .range(key..)
            .next()
            .filter(|(cached, _)| cached.point == key.point)?;
        let sp_unchanged = |start: PointRef| {
            let here = self
                .song
                .total_available_sp(key.position.beat, key.point, start, None);
            let there =
                self.song
                    .total_available_sp(cached_key.position.beat, key.point, start, None);
            here == there
        };
        let first_candidate = self.next_candidate_point(key.point)?;
        if !sp_unchanged(first_candidate) {
            return None;
        }
        if !value
            .possible_next_acts
            .iter()
            .all(|(act, _)| sp_unchanged(act.act_start))
        {
            return None;
        }
        Some(value.clone())
    }

    fn find_best_subpaths(&self, key: CacheKey, cache: &mut Cache, has_full_sp: bool) -> CacheValue {
        if has_full_sp {
            if let Some(value) = cache.full_sp_paths.get(&key.point) {
                return value.clone();
            }
        } else {
            if let Some(value) = cache.paths.get(&key) {
                return value.clone();
            }
            if let Some(value) = self.try_previous_best_subpaths(key, cache) {
                cache.paths.insert(key, value.clone());
                return value;
            }
        }

        let points = self.song.points();
        let mut acts: Vec<(Activation, Option<CacheKey>)> = Vec::new();
        let mut best_path = Path::default();

        let mut cursor = Some(key).and_then(|k| {
            self.next_candidate_point(k.point).map(|point| CacheKey {
                point,
                position: k.position,
            })
        });
        while let Some(current) = cursor {
            let start = current.point;
            // Full SP is only established for the point this subproblem was
            // entered with; any later start the cursor reaches has its SP
            // re-derived from that anchor.
            let sp_bar = if has_full_sp && start == key.point {
                SpBar::new(1.0, 1.0)
            } else if has_full_sp {
                self.song.total_available_sp(
                    points[key.point].position.beat,
                    key.point,
                    start,
                    None,
                )
            } else {
                self.song
                    .total_available_sp(key.position.beat, key.point, start, None)
            };
            if sp_bar.full_enough_to_activate() {
                if !has_full_sp && sp_bar.min >= 1.0 {
                    // SP is proven full exactly here, so this start's
                    // activations live in the position-independent by-point
                    // subproblem. Later starts keep their own derivation,
                    // so the walk carries on.
                    let full = self.find_best_subpaths(
                        CacheKey {
                            point: start,
                            position: key.position,
                        },
                        cache,
                        true,
                    );
                    if Self::path_is_better(&full.path, &best_path) {
                        best_path = full.path;
                    }
                } else {
                    // Under full SP the subproblem is cached by point alone,
                    // so it must not depend on the incoming position.
                    let earliest_activation_point = if has_full_sp {
                        points[start].position
                    } else {
                        key.position
                    };
                    let guaranteed_sp = sp_bar.min.max(MINIMUM_SP_AMOUNT);
                    let mut end = self.act_end_lower_bound(
                        start,
                        earliest_activation_point.measure,
                        guaranteed_sp,
                    );
                    while end.index() < points.len() {
                        let candidate = ActivationCandidate {
                            act_start: start,
                            act_end: end,
                            earliest_activation_point,
                            sp_bar,
                        };
                        let result = self.song.is_candidate_valid(&candidate);
                        match result.validity {
                            ActValidity::InsufficientSp => break,
                            ActValidity::SurplusSp => {}
                            ActValidity::Success => {
                                let next_key = points.next_non_hold_point(end.next()).map(
                                    |point| CacheKey {
                                        point,
                                        position: result.ending_position,
                                    },
                                );
                                acts.push((
                                    Activation {
                                        act_start: start,
                                        act_end: end,
                                    },
                                    next_key,
                                ));
                            }
                        }
                        end = end.next();
                    }
                }
            }
            cursor = self.advance_cache_key(current);
        }

        for (act, next_key) in &acts {
            let boost = points.range_score(act.act_start, act.act_end.next());
            let path = match next_key {
                Some(next_key) => {
                    let sub = self.find_best_subpaths(*next_key, cache, false);
                    let mut activations = Vec::with_capacity(sub.path.activations.len() + 1);
                    activations.push(*act);
                    activations.extend_from_slice(&sub.path.activations);
                    Path {
                        activations,
                        score_boost: boost + sub.path.score_boost,
                    }
                }
                None => Path {
                    activations: vec![*act],
                    score_boost: boost,
                },
            };
            if Self::path_is_better(&path, &best_path) {
                best_path = path;
            }
        }

        let value = CacheValue {
            path: best_path,
            possible_next_acts: acts,
        };
        if has_full_sp {
            cache.full_sp_paths.insert(key.point, value.clone());
        } else {
            cache.paths.insert(key, value.clone());
        }
        value
    }

    /// The optimal path for the processed song, including solo bonuses in
    /// the reported boost.
    #[must_use]
    pub fn optimal_path(&self) -> Path {
        let mut cache = Cache::default();
        let Some(first) = self.song.points().first() else {
            return Path {
                activations: Vec::new(),
                score_boost: self.total_solo_boost,
            };
        };
        let start_key = CacheKey {
            point: first,
            position: Position::zero(),
        };
        let value = self.find_best_subpaths(start_key, &mut cache, false);
        debug!(
            "optimal path found: {} activation(s), boost {}, {} cached subproblems ({} full-SP)",
            value.path.activations.len(),
            value.path.score_boost,
            cache.paths.len(),
            cache.full_sp_paths.len(),
        );
        let mut path = value.path;
        path.score_boost += self.total_solo_boost;
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::song::{FiveFretColour, Note, NoteTrack, StarPower, SyncTrack, TrackEvent};
    use crate::time::Second;
    use pretty_assertions::assert_eq;

    fn processed(
        notes: Vec<Note<FiveFretColour>>,
        phrases: Vec<StarPower>,
        events: Vec<TrackEvent>,
    ) -> ProcessedSong {
        let track = NoteTrack::new(notes, phrases, events).unwrap();
        let sync = SyncTrack::new(vec![], vec![]).unwrap();
        ProcessedSong::new(&track, 192, &sync, 1.0, 1.0, Second(0.0))
    }

    fn phrase(position: u32, length: u32) -> StarPower {
        StarPower { position, length }
    }

    #[test]
    fn no_phrases_means_no_activations() {
        let song = processed(
            vec![
                Note::new(0, FiveFretColour::Green),
                Note::new(192, FiveFretColour::Red),
            ],
            vec![],
            vec![],
        );
        let path = Optimiser::new(&song).optimal_path();

        assert_eq!(path, Path::default());
    }

    #[test]
    fn empty_track_yields_empty_path() {
        let song = processed(vec![], vec![], vec![]);
        let path = Optimiser::new(&song).optimal_path();

        assert_eq!(path.activations, vec![]);
        assert_eq!(path.score_boost, 0);
    }

    #[test]
    fn single_activation_covers_the_cluster() {
        // Two early phrase notes charge half a bar; the optimum doubles the
        // trailing cluster in one activation.
        let song = processed(
            vec![
                Note::new(0, FiveFretColour::Green),
                Note::new(192, FiveFretColour::Green),
                Note::new(768, FiveFretColour::Green),
                Note::new(960, FiveFretColour::Green),
                Note::new(1152, FiveFretColour::Green),
            ],
            vec![phrase(0, 50), phrase(192, 50)],
            vec![],
        );
        let path = Optimiser::new(&song).optimal_path();

        assert_eq!(
            path.activations,
            vec![Activation {
                act_start: PointRef::new(2),
                act_end: PointRef::new(4),
            }]
        );
        assert_eq!(path.score_boost, 3);
    }

    #[test]
    fn activation_starts_as_soon_as_half_bar_is_charged() {
        // Four phrases; the best activation begins once half a bar is up
        // and stretches across both remaining notes, beating the full-bar
        // option that starts later.
        let song = processed(
            vec![
                Note::new(0, FiveFretColour::Green),
                Note::new(192, FiveFretColour::Green),
                Note::new(384, FiveFretColour::Green),
                Note::new(576, FiveFretColour::Green),
                Note::new(1920, FiveFretColour::Green),
                Note::new(2112, FiveFretColour::Green),
            ],
            vec![
                phrase(0, 50),
                phrase(192, 50),
                phrase(384, 50),
                phrase(576, 50),
            ],
            vec![],
        );
        let path = Optimiser::new(&song).optimal_path();

        assert_eq!(
            path.activations,
            vec![Activation {
                act_start: PointRef::new(2),
                act_end: PointRef::new(5),
            }]
        );
        assert_eq!(path.score_boost, 4);
    }

    #[test]
    fn solo_boost_is_added_to_the_result() {
        let song = processed(
            vec![
                Note::new(0, FiveFretColour::Green),
                Note::new(192, FiveFretColour::Red),
            ],
            vec![],
            vec![
                TrackEvent {
                    position: 0,
                    name: "solo".to_owned(),
                },
                TrackEvent {
                    position: 300,
                    name: "soloend".to_owned(),
                },
            ],
        );
        let path = Optimiser::new(&song).optimal_path();

        assert_eq!(path.activations, vec![]);
        assert_eq!(path.score_boost, 4);
    }

    #[test]
    fn optimal_path_is_idempotent() {
        let song = processed(
            vec![
                Note::new(0, FiveFretColour::Green),
                Note::new(192, FiveFretColour::Green),
                Note::sustain(384, 384, FiveFretColour::Green),
                Note::new(1152, FiveFretColour::Green),
                Note::new(1536, FiveFretColour::Green),
                Note::new(1920, FiveFretColour::Green),
                Note::new(2304, FiveFretColour::Green),
            ],
            vec![phrase(0, 50), phrase(192, 50), phrase(384, 400)],
            vec![],
        );
        let optimiser = Optimiser::new(&song);

        assert_eq!(optimiser.optimal_path(), optimiser.optimal_path());
    }

    #[test]
    fn boost_dominates_any_single_fixed_activation() {
        // Optimality sanity check: the returned boost is at least that of
        // every directly validated candidate.
        let song = processed(
            vec![
                Note::new(0, FiveFretColour::Green),
                Note::new(192, FiveFretColour::Green),
                Note::new(768, FiveFretColour::Green),
                Note::new(960, FiveFretColour::Green),
                Note::new(1920, FiveFretColour::Green),
                Note::new(2304, FiveFretColour::Green),
            ],
            vec![phrase(0, 50), phrase(192, 50), phrase(768, 50), phrase(960, 50)],
            vec![],
        );
        let optimiser = Optimiser::new(&song);
        let best = optimiser.optimal_path();

        let points_len = song.points().len();
        for start in 0..points_len {
            for end in start..points_len {
                let candidate = ActivationCandidate {
                    act_start: PointRef::new(start),
                    act_end: PointRef::new(end),
                    earliest_activation_point: Position::zero(),
                    sp_bar: song.total_available_sp(
                        crate::time::Beat(0.0),
                        PointRef::new(0),
                        PointRef::new(start),
                        None,
                    ),
                };
                if song.is_candidate_valid(&candidate).validity == ActValidity::Success {
                    let boost = song
                        .points()
                        .range_score(candidate.act_start, candidate.act_end.next());
                    assert!(best.score_boost >= boost);
                }
            }
        }
    }
}
