//! End-to-end tests for the optimiser over whole charts.

use chartopt::prelude::*;

fn note(position: u32) -> Note<FiveFretColour> {
    Note::new(position, FiveFretColour::Green)
}

fn processed_with(
    notes: Vec<Note<FiveFretColour>>,
    phrases: Vec<StarPower>,
    squeeze: f64,
) -> ProcessedSong {
    let track = NoteTrack::new(notes, phrases, vec![]).unwrap();
    let sync = SyncTrack::new(vec![], vec![]).unwrap();
    ProcessedSong::new(&track, 192, &sync, 1.0, squeeze, Second(0.0))
}

fn dense_chart() -> (Vec<Note<FiveFretColour>>, Vec<StarPower>) {
    // 32 notes a beat apart; phrases on the first four and on four in the
    // middle, plus a whammyable sustain inside the first phrase block.
    let mut notes: Vec<_> = (0..32).map(|i| note(i * 192)).collect();
    notes[2] = Note::sustain(384, 192, FiveFretColour::Green);
    let phrases = vec![
        StarPower {
            position: 0,
            length: 50,
        },
        StarPower {
            position: 192,
            length: 50,
        },
        StarPower {
            position: 384,
            length: 150,
        },
        StarPower {
            position: 576,
            length: 50,
        },
        StarPower {
            position: 3072,
            length: 50,
        },
        StarPower {
            position: 3264,
            length: 50,
        },
    ];
    (notes, phrases)
}

#[test]
fn activations_are_ordered_and_disjoint() {
    let (notes, phrases) = dense_chart();
    let song = processed_with(notes, phrases, 1.0);
    let path = Optimiser::new(&song).optimal_path();

    assert!(!path.activations.is_empty());
    for pair in path.activations.windows(2) {
        assert!(pair[0].act_end < pair[1].act_start);
    }
    for activation in &path.activations {
        assert!(activation.act_start <= activation.act_end);
    }
}

#[test]
fn boost_equals_the_doubled_point_values() {
    let (notes, phrases) = dense_chart();
    let song = processed_with(notes, phrases, 1.0);
    let path = Optimiser::new(&song).optimal_path();

    let expected: u32 = path
        .activations
        .iter()
        .map(|act| song.points().range_score(act.act_start, act.act_end.next()))
        .sum();
    assert_eq!(path.score_boost, expected);
}

#[test]
fn optimal_path_is_reproducible() {
    let (notes, phrases) = dense_chart();
    let song = processed_with(notes, phrases, 1.0);
    let optimiser = Optimiser::new(&song);

    let first = optimiser.optimal_path();
    let second = optimiser.optimal_path();
    assert_eq!(first, second);

    let fresh = Optimiser::new(&song).optimal_path();
    assert_eq!(first, fresh);
}

#[test]
fn wider_hit_windows_never_hurt_the_boost() {
    let (notes, phrases) = dense_chart();
    let narrow = processed_with(notes.clone(), phrases.clone(), 0.5);
    let wide = processed_with(notes, phrases, 1.0);

    let narrow_boost = Optimiser::new(&narrow).optimal_path().score_boost;
    let wide_boost = Optimiser::new(&wide).optimal_path().score_boost;
    assert!(wide_boost >= narrow_boost);
}

#[test]
fn optimum_dominates_every_single_activation() {
    let (notes, phrases) = dense_chart();
    let song = processed_with(notes, phrases, 1.0);
    let optimiser = Optimiser::new(&song);
    let best = optimiser.optimal_path();

    let len = song.points().len();
    for start in 0..len {
        // Activations begin on note boundaries, matching the search space.
        if song.points()[PointRef::new(start)].is_hold_point {
            continue;
        }
        let sp_bar = song.total_available_sp(Beat(0.0), PointRef::new(0), PointRef::new(start), None);
        for end in start..len {
            let candidate = ActivationCandidate {
                act_start: PointRef::new(start),
                act_end: PointRef::new(end),
                earliest_activation_point: Position::zero(),
                sp_bar,
            };
            if song.is_candidate_valid(&candidate).validity == ActValidity::Success {
                let boost = song
                    .points()
                    .range_score(candidate.act_start, candidate.act_end.next());
                assert!(
                    best.score_boost >= boost,
                    "single activation {start}..{end} with boost {boost} beats the optimum"
                );
            }
        }
    }
}

/// Replays a path from the start of the chart, re-deriving the SP bar
/// before each activation from the preceding state. Every activation the
/// optimiser chose must still be reachable under the recomputed SP.
fn assert_path_revalidates(song: &ProcessedSong, path: &Path) {
    let mut position = Position::zero();
    let mut first_point = PointRef::new(0);
    for activation in &path.activations {
        let sp_bar =
            song.total_available_sp(position.beat, first_point, activation.act_start, None);
        assert!(sp_bar.full_enough_to_activate());
        let candidate = ActivationCandidate {
            act_start: activation.act_start,
            act_end: activation.act_end,
            earliest_activation_point: position,
            sp_bar,
        };
        let result = song.is_candidate_valid(&candidate);
        assert_ne!(result.validity, ActValidity::InsufficientSp);
        position = result.ending_position;
        match song.points().next_non_hold_point(activation.act_end.next()) {
            Some(next) => first_point = next,
            None => break,
        }
    }
}

#[test]
fn chosen_activations_revalidate_under_recomputed_sp() {
    // A phrase block banks a full bar early, then the chart goes quiet for
    // a long stretch before a lone far phrase and its trailing cluster. The
    // far cluster must only be doubled on the strength of SP that is really
    // available there.
    let song = processed_with(
        vec![
            note(0),
            note(192),
            note(384),
            note(576),
            note(5760),
            note(5952),
            note(6144),
            note(6336),
            note(6528),
        ],
        vec![
            StarPower {
                position: 0,
                length: 50,
            },
            StarPower {
                position: 192,
                length: 50,
            },
            StarPower {
                position: 384,
                length: 50,
            },
            StarPower {
                position: 576,
                length: 50,
            },
            StarPower {
                position: 5760,
                length: 50,
            },
        ],
        1.0,
    );
    let path = Optimiser::new(&song).optimal_path();
    assert!(!path.activations.is_empty());
    assert_path_revalidates(&song, &path);

    let (notes, phrases) = dense_chart();
    let song = processed_with(notes, phrases, 1.0);
    assert_path_revalidates(&song, &Optimiser::new(&song).optimal_path());
}

#[test]
fn hold_heavy_chart_solves_and_summarises() {
    // The phrase-counting chart: a sustain inside a long phrase plus three
    // one-shot phrases.
    let song = processed_with(
        vec![
            note(0),
            note(192),
            note(384),
            note(576),
            Note::sustain(768, 192, FiveFretColour::Green),
            note(1152),
            note(1344),
            note(1536),
            note(4608),
            note(4800),
        ],
        vec![
            StarPower {
                position: 0,
                length: 50,
            },
            StarPower {
                position: 384,
                length: 50,
            },
            StarPower {
                position: 768,
                length: 400,
            },
            StarPower {
                position: 1344,
                length: 50,
            },
        ],
        1.0,
    );
    let path = Optimiser::new(&song).optimal_path();

    assert!(path.score_boost > 0);
    let summary = song.path_summary(&path);
    assert!(summary.contains("Total score:"));
    assert!(summary.contains("Activation 1:"));
}

#[test]
fn six_fret_and_drum_tracks_are_supported() {
    let ghl = NoteTrack::new(
        vec![
            Note::new(0, SixFretColour::WhiteLow),
            Note::new(192, SixFretColour::BlackHigh),
            Note::new(768, SixFretColour::WhiteMid),
        ],
        vec![
            StarPower {
                position: 0,
                length: 50,
            },
            StarPower {
                position: 192,
                length: 50,
            },
        ],
        vec![],
    )
    .unwrap();
    let drums = NoteTrack::new(
        vec![
            Note::new(0, DrumColour::Red),
            Note::new(192, DrumColour::YellowCymbal),
            Note::new(768, DrumColour::Kick),
        ],
        vec![
            StarPower {
                position: 0,
                length: 50,
            },
            StarPower {
                position: 192,
                length: 50,
            },
        ],
        vec![],
    )
    .unwrap();
    let sync = SyncTrack::new(vec![], vec![]).unwrap();

    let ghl_song = ProcessedSong::new(&ghl, 192, &sync, 1.0, 1.0, Second(0.0));
    let drum_song = ProcessedSong::new(&drums, 192, &sync, 1.0, 1.0, Second(0.0));

    let ghl_path = Optimiser::new(&ghl_song).optimal_path();
    let drum_path = Optimiser::new(&drum_song).optimal_path();
    assert_eq!(ghl_path.score_boost, 1);
    assert_eq!(drum_path.score_boost, 1);
}
