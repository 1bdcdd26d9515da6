//! Star Power accounting: how much SP the player can hold at any position.
//!
//! SP drains by measure distance and refills through whammy on sustained
//! notes inside phrases. [`SpData`] precomputes the whammyable ranges and
//! the per-meter net gain rates, then answers propagation queries with
//! bounded walks over both tables. Exhaustion mid-propagation is reported
//! with the `-1.0` sentinel, never an error.

use crate::song::{Colour, NoteTrack, StarPower, SyncTrack, Tick};
use crate::time::{Beat, Measure, Position, Second, TimeConverter};

/// SP gained by whammying for one beat in 4/4.
pub const SP_GAIN_RATE: f64 = 1.0 / 30.0;

/// Measures of drain one full SP bar is worth.
pub const MEASURES_PER_BAR: f64 = 8.0;

/// Net whammy gain rate applied before the first meter segment.
const DEFAULT_NET_SP_GAIN_RATE: f64 = 1.0 / 480.0;

/// SP granted by completing one phrase.
pub const SP_PHRASE_AMOUNT: f64 = 0.25;

/// Smallest SP level an activation can start from.
pub const MINIMUM_SP_AMOUNT: f64 = 0.5;

/// The minimum and maximum SP possible at a given time.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpBar {
    /// Lower bound on the SP level, in `[0, 1]`.
    pub min: f64,
    /// Upper bound on the SP level, in `[0, 1]`.
    pub max: f64,
}

impl SpBar {
    /// Creates a bar from its bounds.
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Adds a phrase's worth of SP to both bounds, saturating at a full bar.
    pub fn add_phrase(&mut self) {
        self.min = (self.min + SP_PHRASE_AMOUNT).min(1.0);
        self.max = (self.max + SP_PHRASE_AMOUNT).min(1.0);
    }

    /// Whether the upper bound allows activating at all.
    #[must_use]
    pub fn full_enough_to_activate(&self) -> bool {
        self.max >= MINIMUM_SP_AMOUNT
    }
}

#[derive(Debug, Clone, Copy)]
struct BeatRate {
    position: Beat,
    net_sp_gain_rate: f64,
}

#[derive(Debug, Clone, Copy)]
struct WhammyRange {
    start: Position,
    end: Position,
}

/// Precomputed SP drain and gain data for one track.
#[derive(Debug, Clone)]
pub struct SpData {
    converter: TimeConverter,
    beat_rates: Vec<BeatRate>,
    whammy_ranges: Vec<WhammyRange>,
}

fn phrase_containing(phrases: &[StarPower], position: Tick) -> bool {
    let idx = phrases.partition_point(|p| p.position + p.length <= position);
    phrases.get(idx).is_some_and(|p| p.contains(position))
}

impl SpData {
    /// Builds the SP tables for a track.
    ///
    /// `early_whammy` widens each whammy interval by that fraction of the
    /// front hit window; `lazy_whammy` narrows it by a fixed number of
    /// seconds. Intervals that come out empty are dropped.
    #[must_use]
    pub fn new<C: Colour>(
        track: &NoteTrack<C>,
        resolution: u32,
        sync_track: &SyncTrack,
        early_whammy: f64,
        lazy_whammy: Second,
    ) -> Self {
        let converter = TimeConverter::new(sync_track, resolution);
        let beat_rates = Self::form_beat_rates(resolution, sync_track);
        let res = f64::from(resolution);
        let early_timing_window = crate::points::HIT_WINDOW_SECONDS * early_whammy;

        let mut ranges: Vec<(Beat, Beat)> = Vec::new();
        for note in track.notes() {
            if note.length == 0 || !phrase_containing(track.sp_phrases(), note.position) {
                continue;
            }
            let mut second_start = converter.beats_to_seconds(Beat(f64::from(note.position) / res));
            second_start = Second(second_start.value() - early_timing_window + lazy_whammy.value());
            let beat_start = converter.seconds_to_beats(second_start);
            let beat_end = Beat(f64::from(note.position + note.length) / res);
            if beat_start < beat_end {
                ranges.push((beat_start, beat_end));
            }
        }
        ranges.sort_by(|a, b| a.0.value().total_cmp(&b.0.value()));

        let mut whammy_ranges = Vec::with_capacity(ranges.len());
        let mut ranges = ranges.into_iter();
        if let Some(mut pair) = ranges.next() {
            for range in ranges {
                if range.0.value() <= pair.1.value() {
                    pair.1 = Beat(pair.1.value().max(range.1.value()));
                } else {
                    whammy_ranges.push(Self::form_range(&converter, pair));
                    pair = range;
                }
            }
            whammy_ranges.push(Self::form_range(&converter, pair));
        }

        Self {
            converter,
            beat_rates,
            whammy_ranges,
        }
    }

    fn form_range(converter: &TimeConverter, (start, end): (Beat, Beat)) -> WhammyRange {
        WhammyRange {
            start: converter.position(start),
            end: converter.position(end),
        }
    }

    fn form_beat_rates(resolution: u32, sync_track: &SyncTrack) -> Vec<BeatRate> {
        let res = f64::from(resolution);
        sync_track
            .time_sigs()
            .iter()
            .map(|ts| {
                let measure_rate =
                    f64::from(ts.numerator) * crate::time::DEFAULT_BEAT_RATE / f64::from(ts.denominator);
                BeatRate {
                    position: Beat(f64::from(ts.position) / res),
                    net_sp_gain_rate: SP_GAIN_RATE - 1.0 / (MEASURES_PER_BAR * measure_rate),
                }
            })
            .collect()
    }

    /// Whether `beat` lies somewhere the player can whammy.
    #[must_use]
    pub fn is_in_whammy_ranges(&self, beat: Beat) -> bool {
        let idx = self
            .whammy_ranges
            .partition_point(|r| r.end.beat.value() < beat.value());
        self.whammy_ranges
            .get(idx)
            .is_some_and(|r| r.start.beat.value() <= beat.value())
    }

    /// The SP obtainable by whammying across `[start, end)`.
    ///
    /// The returned amount may exceed a full bar; clamping is up to the
    /// caller.
    #[must_use]
    pub fn available_whammy(&self, start: Beat, end: Beat) -> f64 {
        let mut total = 0.0;
        let idx = self
            .whammy_ranges
            .partition_point(|r| r.end.beat.value() <= start.value());
        for range in &self.whammy_ranges[idx..] {
            if range.start.beat.value() >= end.value() {
                break;
            }
            let whammy_start = range.start.beat.value().max(start.value());
            let whammy_end = range.end.beat.value().min(end.value());
            total += (whammy_end - whammy_start) * SP_GAIN_RATE;
        }
        total
    }

    /// Best-case SP after travelling from `start` to `end`, whammying every
    /// range on the way. Returns a negative amount if SP runs out anywhere.
    #[must_use]
    pub fn propagate_sp_over_whammy_max(&self, start: Position, end: Position, sp: f64) -> f64 {
        let mut start = start;
        let mut sp = sp;
        let mut idx = self
            .whammy_ranges
            .partition_point(|r| r.end.beat.value() <= start.beat.value());
        while let Some(range) = self.whammy_ranges.get(idx) {
            if range.start.beat.value() >= end.beat.value() {
                break;
            }
            if range.start.beat.value() > start.beat.value() {
                let meas_diff = range.start.measure - start.measure;
                sp -= meas_diff.value() / MEASURES_PER_BAR;
                if sp < 0.0 {
                    return sp;
                }
                start = range.start;
            }
            let range_end = Beat(end.beat.value().min(range.end.beat.value()));
            sp = self.propagate_over_whammy_range(start.beat, range_end, sp);
            if sp < 0.0 || range.end.beat.value() >= end.beat.value() {
                return sp;
            }
            start = range.end;
            idx += 1;
        }

        let meas_diff = end.measure - start.measure;
        sp - meas_diff.value() / MEASURES_PER_BAR
    }

    /// Worst-case SP after travelling from `start` to `end`: whammy is only
    /// mandatory until `required_whammy_end`, after which SP simply drains.
    /// The result saturates at zero instead of reporting exhaustion.
    #[must_use]
    pub fn propagate_sp_over_whammy_min(
        &self,
        start: Position,
        end: Position,
        sp: f64,
        required_whammy_end: Position,
    ) -> f64 {
        let mut start = start;
        let mut sp = sp;
        if required_whammy_end.beat.value() > start.beat.value() {
            let mut whammy_end = end;
            if required_whammy_end.beat.value() < end.beat.value() {
                whammy_end = required_whammy_end;
            }
            sp = self.propagate_sp_over_whammy_max(start, whammy_end, sp);
            start = required_whammy_end;
        }
        if start.beat.value() < end.beat.value() {
            let meas_diff = end.measure - start.measure;
            sp -= meas_diff.value() / MEASURES_PER_BAR;
        }
        sp.max(0.0)
    }

    /// The latest position at or before `end` an activation that starts at
    /// `start` with `sp_bar_amount` SP can reach; `end` itself if SP lasts.
    #[must_use]
    pub fn activation_end_point(&self, start: Position, end: Position, sp_bar_amount: f64) -> Position {
        let mut start = start;
        let mut sp = sp_bar_amount;
        let mut idx = self
            .whammy_ranges
            .partition_point(|r| r.end.beat.value() <= start.beat.value());
        while let Some(range) = self.whammy_ranges.get(idx) {
            if range.start.beat.value() >= end.beat.value() {
                break;
            }
            if range.start.beat.value() > start.beat.value() {
                let meas_diff = range.start.measure - start.measure;
                let sp_deduction = meas_diff.value() / MEASURES_PER_BAR;
                if sp < sp_deduction {
                    let end_meas = start.measure + Measure(sp * MEASURES_PER_BAR);
                    return Position {
                        beat: self.converter.measures_to_beats(end_meas),
                        measure: end_meas,
                    };
                }
                sp -= sp_deduction;
                start = range.start;
            }
            let range_end = Beat(end.beat.value().min(range.end.beat.value()));
            let new_sp = self.propagate_over_whammy_range(start.beat, range_end, sp);
            if new_sp < 0.0 {
                let end_beat = self.whammy_propagation_endpoint(start.beat, end.beat, sp);
                return Position {
                    beat: end_beat,
                    measure: self.converter.beats_to_measures(end_beat),
                };
            }
            sp = new_sp;
            if range.end.beat.value() >= end.beat.value() {
                return end;
            }
            start = range.end;
            idx += 1;
        }

        let meas_diff = end.measure - start.measure;
        let sp_deduction = meas_diff.value() / MEASURES_PER_BAR;
        if sp < sp_deduction {
            let end_meas = start.measure + Measure(sp * MEASURES_PER_BAR);
            return Position {
                beat: self.converter.measures_to_beats(end_meas),
                measure: end_meas,
            };
        }
        end
    }

    /// Advances SP across `[start, end)` assuming constant whammy, applying
    /// the net gain rate of each meter segment. Returns `-1.0` as soon as SP
    /// would go negative; saturates at a full bar otherwise.
    fn propagate_over_whammy_range(&self, start: Beat, end: Beat, sp_bar_amount: f64) -> f64 {
        let mut start = start;
        let mut sp = sp_bar_amount;
        let mut idx = self
            .beat_rates
            .partition_point(|rate| rate.position.value() < start.value());
        if idx > 0 {
            idx -= 1;
        } else if let Some(first) = self.beat_rates.first() {
            let subrange_end = Beat(end.value().min(first.position.value()));
            sp += (subrange_end - start).value() * DEFAULT_NET_SP_GAIN_RATE;
            sp = sp.min(1.0);
            start = subrange_end;
        }
        while start < end {
            let mut subrange_end = end;
            if let Some(next) = self.beat_rates.get(idx + 1) {
                subrange_end = Beat(end.value().min(next.position.value()));
            }
            sp += (subrange_end - start).value() * self.beat_rates[idx].net_sp_gain_rate;
            if sp < 0.0 {
                return -1.0;
            }
            sp = sp.min(1.0);
            start = subrange_end;
            idx += 1;
        }
        sp
    }

    /// The beat whammy-backed SP runs out if all of `[start, end)` is
    /// whammied; `end` if it survives throughout.
    fn whammy_propagation_endpoint(&self, start: Beat, end: Beat, sp_bar_amount: f64) -> Beat {
        let mut start = start;
        let mut sp = sp_bar_amount;
        let mut idx = self
            .beat_rates
            .partition_point(|rate| rate.position.value() < start.value());
        if idx > 0 {
            idx -= 1;
        } else if let Some(first) = self.beat_rates.first() {
            let subrange_end = Beat(end.value().min(first.position.value()));
            sp += (subrange_end - start).value() * DEFAULT_NET_SP_GAIN_RATE;
            sp = sp.min(1.0);
            start = subrange_end;
        }
        while start < end {
            let mut subrange_end = end;
            if let Some(next) = self.beat_rates.get(idx + 1) {
                subrange_end = Beat(end.value().min(next.position.value()));
            }
            let rate = self.beat_rates[idx].net_sp_gain_rate;
            let sp_gain = (subrange_end - start).value() * rate;
            if sp + sp_gain < 0.0 {
                return start + Beat(-sp / rate);
            }
            sp = (sp + sp_gain).min(1.0);
            start = subrange_end;
            idx += 1;
        }
        end
    }
}
