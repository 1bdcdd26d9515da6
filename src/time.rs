//! Units of chart time and the conversions between them.
//!
//! Four scales coexist: ticks (source resolution), beats, measures (meter
//! dependent), and seconds (tempo dependent). [`TimeConverter`] relates them
//! under a piecewise-constant tempo and meter map; [`Position`] carries a
//! beat and its measure together so hot paths never convert twice.

use crate::song::SyncTrack;

/// Beats per measure assumed outside any time signature, i.e. 4/4.
pub const DEFAULT_BEAT_RATE: f64 = 4.0;

/// Beats per second assumed outside any tempo event, i.e. 120 BPM.
pub const DEFAULT_BEATS_PER_SECOND: f64 = 2.0;

/// A position measured in beats.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Beat(pub f64);

impl Beat {
    /// The underlying value.
    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }

    /// Converts to measures under a constant beat rate.
    #[must_use]
    pub fn to_measure(self, beat_rate: f64) -> Measure {
        Measure(self.0 / beat_rate)
    }

    /// Converts to seconds under a constant beats-per-second rate.
    #[must_use]
    pub fn to_second(self, beats_per_second: f64) -> Second {
        Second(self.0 / beats_per_second)
    }
}

impl std::ops::Add for Beat {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Beat {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

/// A position measured in measures of the prevailing time signature.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Measure(pub f64);

impl Measure {
    /// The underlying value.
    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }

    /// Converts to beats under a constant beat rate.
    #[must_use]
    pub fn to_beat(self, beat_rate: f64) -> Beat {
        Beat(self.0 * beat_rate)
    }
}

impl std::ops::Add for Measure {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Measure {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

/// A position measured in seconds of wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Second(pub f64);

impl Second {
    /// The underlying value.
    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }

    /// Converts to beats under a constant beats-per-second rate.
    #[must_use]
    pub fn to_beat(self, beats_per_second: f64) -> Beat {
        Beat(self.0 * beats_per_second)
    }
}

impl std::ops::Add for Second {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Second {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

/// A beat and its measure, materialised together.
///
/// Comparisons throughout the crate are made on the beat component; the two
/// members must always be produced by the same converter so they stay
/// consistent.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position {
    /// The position in beats.
    pub beat: Beat,
    /// The same position in measures.
    pub measure: Measure,
}

impl Position {
    /// The origin position.
    #[must_use]
    pub const fn zero() -> Self {
        Self {
            beat: Beat(0.0),
            measure: Measure(0.0),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct MeasureTimestamp {
    measure: Measure,
    beat: Beat,
}

#[derive(Debug, Clone, Copy)]
struct SecondTimestamp {
    second: Second,
    beat: Beat,
}

/// Converts between beats, measures, and seconds under a sync track.
///
/// Anchors are laid down once per time signature (for measures) and once per
/// tempo change (for seconds); queries binary-search the anchor table and
/// interpolate linearly. Results are defined for any finite input: the
/// pre-chart region extrapolates as 4/4 at 120 BPM and the post-chart region
/// with the trailing rates.
#[derive(Debug, Clone)]
pub struct TimeConverter {
    measure_timestamps: Vec<MeasureTimestamp>,
    second_timestamps: Vec<SecondTimestamp>,
    last_beat_rate: f64,
    last_beats_per_second: f64,
}

fn beat_rate_of(numerator: u32, denominator: u32) -> f64 {
    f64::from(numerator) * DEFAULT_BEAT_RATE / f64::from(denominator)
}

impl TimeConverter {
    /// Builds the anchor tables for a sync track at the given resolution.
    #[must_use]
    pub fn new(sync_track: &SyncTrack, resolution: u32) -> Self {
        let res = f64::from(resolution);

        let mut measure_timestamps = Vec::with_capacity(sync_track.time_sigs().len());
        let mut last_tick = 0u32;
        let mut last_beat_rate = DEFAULT_BEAT_RATE;
        let mut last_measure = 0.0;
        for ts in sync_track.time_sigs() {
            last_measure += f64::from(ts.position - last_tick) / (res * last_beat_rate);
            measure_timestamps.push(MeasureTimestamp {
                measure: Measure(last_measure),
                beat: Beat(f64::from(ts.position) / res),
            });
            last_beat_rate = beat_rate_of(ts.numerator, ts.denominator);
            last_tick = ts.position;
        }

        let mut second_timestamps = Vec::with_capacity(sync_track.bpms().len());
        let mut last_tick = 0u32;
        let mut last_micro_bpm = crate::song::DEFAULT_MICRO_BPM;
        let mut last_second = 0.0;
        for bpm in sync_track.bpms() {
            last_second +=
                f64::from(bpm.position - last_tick) * 60_000.0 / (res * f64::from(last_micro_bpm));
            second_timestamps.push(SecondTimestamp {
                second: Second(last_second),
                beat: Beat(f64::from(bpm.position) / res),
            });
            last_micro_bpm = bpm.micro_bpm;
            last_tick = bpm.position;
        }

        Self {
            measure_timestamps,
            second_timestamps,
            last_beat_rate,
            last_beats_per_second: f64::from(last_micro_bpm) / 60_000.0,
        }
    }

    /// Converts a beat position to measures.
    #[must_use]
    pub fn beats_to_measures(&self, beats: Beat) -> Measure {
        let stamps = &self.measure_timestamps;
        let idx = stamps.partition_point(|t| t.beat.0 < beats.0);
        if idx == stamps.len() {
            let back = stamps[stamps.len() - 1];
            return back.measure + (beats - back.beat).to_measure(self.last_beat_rate);
        }
        if idx == 0 {
            let front = stamps[0];
            return front.measure - (front.beat - beats).to_measure(DEFAULT_BEAT_RATE);
        }
        let (prev, next) = (stamps[idx - 1], stamps[idx]);
        Measure(
            prev.measure.0
                + (next.measure.0 - prev.measure.0) * (beats.0 - prev.beat.0)
                    / (next.beat.0 - prev.beat.0),
        )
    }

    /// Converts a measure position to beats.
    #[must_use]
    pub fn measures_to_beats(&self, measures: Measure) -> Beat {
        let stamps = &self.measure_timestamps;
        let idx = stamps.partition_point(|t| t.measure.0 < measures.0);
        if idx == stamps.len() {
            let back = stamps[stamps.len() - 1];
            return back.beat + (measures - back.measure).to_beat(self.last_beat_rate);
        }
        if idx == 0 {
            let front = stamps[0];
            return front.beat - (front.measure - measures).to_beat(DEFAULT_BEAT_RATE);
        }
        let (prev, next) = (stamps[idx - 1], stamps[idx]);
        Beat(
            prev.beat.0
                + (next.beat.0 - prev.beat.0) * (measures.0 - prev.measure.0)
                    / (next.measure.0 - prev.measure.0),
        )
    }

    /// Converts a beat position to seconds.
    #[must_use]
    pub fn beats_to_seconds(&self, beats: Beat) -> Second {
        let stamps = &self.second_timestamps;
        let idx = stamps.partition_point(|t| t.beat.0 < beats.0);
        if idx == stamps.len() {
            let back = stamps[stamps.len() - 1];
            return back.second + (beats - back.beat).to_second(self.last_beats_per_second);
        }
        if idx == 0 {
            let front = stamps[0];
            return front.second - (front.beat - beats).to_second(DEFAULT_BEATS_PER_SECOND);
        }
        let (prev, next) = (stamps[idx - 1], stamps[idx]);
        Second(
            prev.second.0
                + (next.second.0 - prev.second.0) * (beats.0 - prev.beat.0)
                    / (next.beat.0 - prev.beat.0),
        )
    }

    /// Converts a second position to beats.
    #[must_use]
    pub fn seconds_to_beats(&self, seconds: Second) -> Beat {
        let stamps = &self.second_timestamps;
        let idx = stamps.partition_point(|t| t.second.0 < seconds.0);
        if idx == stamps.len() {
            let back = stamps[stamps.len() - 1];
            return back.beat + (seconds - back.second).to_beat(self.last_beats_per_second);
        }
        if idx == 0 {
            let front = stamps[0];
            return front.beat - (front.second - seconds).to_beat(DEFAULT_BEATS_PER_SECOND);
        }
        let (prev, next) = (stamps[idx - 1], stamps[idx]);
        Beat(
            prev.beat.0
                + (next.beat.0 - prev.beat.0) * (seconds.0 - prev.second.0)
                    / (next.second.0 - prev.second.0),
        )
    }

    /// Materialises the measure alongside a beat.
    #[must_use]
    pub fn position(&self, beat: Beat) -> Position {
        Position {
            beat,
            measure: self.beats_to_measures(beat),
        }
    }
}
