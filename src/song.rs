//! Input entities consumed by the optimiser core.
//!
//! A chart parser (out of scope for this crate) produces these structures in
//! an already-validated form. The constructors here enforce the few
//! invariants the core relies on and reject anything else with
//! [`SongError`]; past construction, every structure is immutable.

use thiserror::Error;

/// An integer position in the chart's source resolution.
pub type Tick = u32;

/// An error in the data handed over by the chart producer.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SongError {
    /// The header's resolution was zero or negative.
    #[error("songs with non-positive resolution are invalid")]
    NonPositiveResolution,
    /// A sync track list was not sorted by tick position.
    #[error("sync track events must be sorted by position")]
    UnsortedSyncTrack,
    /// A time signature had a zero numerator or denominator.
    #[error("time signature at tick {0} is malformed")]
    MalformedTimeSignature(Tick),
    /// A BPM event carried a zero tempo.
    #[error("BPM at tick {0} is zero")]
    ZeroBpm(Tick),
    /// Star Power phrases overlapped or were out of order.
    #[error("star power phrases must be sorted and non-overlapping")]
    OverlappingPhrases,
}

/// Difficulty of a note track. Selection happens outside the core; the enum
/// exists as shared vocabulary with the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Difficulty {
    /// Easy difficulty.
    Easy,
    /// Medium difficulty.
    Medium,
    /// Hard difficulty.
    Hard,
    /// Expert difficulty.
    Expert,
}

/// Instrument family of a note track. Each family has its own colour type
/// and therefore its own point-set construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Instrument {
    /// Five fret guitar-like instruments (lead, bass, keys).
    FiveFret,
    /// Six fret (GHL) instruments.
    SixFret,
    /// Drums.
    Drums,
}

/// Note colour of an instrument family.
///
/// The optimiser itself is colour-agnostic; the trait only pins down the
/// ordering used to group and deduplicate notes.
pub trait Colour: Copy + Ord + std::fmt::Debug {}

/// Colours of a five fret track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FiveFretColour {
    /// The green (first) fret.
    Green,
    /// The red (second) fret.
    Red,
    /// The yellow (third) fret.
    Yellow,
    /// The blue (fourth) fret.
    Blue,
    /// The orange (fifth) fret.
    Orange,
    /// An open strum.
    Open,
}

impl Colour for FiveFretColour {}

/// Colours of a six fret (GHL) track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SixFretColour {
    /// An open strum.
    Open,
    /// Low black fret.
    BlackLow,
    /// Middle black fret.
    BlackMid,
    /// High black fret.
    BlackHigh,
    /// Low white fret.
    WhiteLow,
    /// Middle white fret.
    WhiteMid,
    /// High white fret.
    WhiteHigh,
}

impl Colour for SixFretColour {}

/// Colours of a drum track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DrumColour {
    /// The red pad.
    Red,
    /// The yellow pad.
    Yellow,
    /// The blue pad.
    Blue,
    /// The green pad.
    Green,
    /// The yellow cymbal.
    YellowCymbal,
    /// The blue cymbal.
    BlueCymbal,
    /// The green cymbal.
    GreenCymbal,
    /// The kick pedal.
    Kick,
}

impl Colour for DrumColour {}

/// A note of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Note<C> {
    /// Tick the note lies on.
    pub position: Tick,
    /// Sustain length in ticks, 0 for a plain note.
    pub length: Tick,
    /// The note's colour.
    pub colour: C,
    /// Whether the note carries a force flag.
    pub is_forced: bool,
    /// Whether the note carries a tap flag.
    pub is_tap: bool,
}

impl<C> Note<C> {
    /// Creates a plain note without flags or sustain.
    #[must_use]
    pub const fn new(position: Tick, colour: C) -> Self {
        Self {
            position,
            length: 0,
            colour,
            is_forced: false,
            is_tap: false,
        }
    }

    /// Creates a sustained note without flags.
    #[must_use]
    pub const fn sustain(position: Tick, length: Tick, colour: C) -> Self {
        Self {
            position,
            length,
            colour,
            is_forced: false,
            is_tap: false,
        }
    }
}

/// A Star Power phrase. Notes whose position lies inside the half-open span
/// `[position, position + length)` grant SP when hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StarPower {
    /// Tick the phrase starts on.
    pub position: Tick,
    /// Length of the phrase in ticks.
    pub length: Tick,
}

impl StarPower {
    /// Returns whether `position` lies inside the phrase's span.
    #[must_use]
    pub const fn contains(&self, position: Tick) -> bool {
        position >= self.position && position < self.position + self.length
    }
}

/// A named event on a note track, such as a solo marker.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackEvent {
    /// Tick the event lies on.
    pub position: Tick,
    /// The event name, e.g. `solo` or `soloend`.
    pub name: String,
}

/// A time signature change.
///
/// The denominator is stored resolved: chart files encode it as a power of
/// two exponent, and the parser is expected to have applied `1 << raw`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeSignature {
    /// Tick the signature takes effect at.
    pub position: Tick,
    /// Beats per measure numerator.
    pub numerator: u32,
    /// Beat unit denominator.
    pub denominator: u32,
}

/// A tempo change, in thousandths of a beat per minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bpm {
    /// Tick the tempo takes effect at.
    pub position: Tick,
    /// BPM multiplied by 1000.
    pub micro_bpm: u32,
}

/// The default tempo assumed when a sync track has no BPM events.
pub const DEFAULT_MICRO_BPM: u32 = 120_000;

/// Tempo and meter map of a song.
///
/// Construction guarantees both lists are sorted, non-empty, and start at
/// tick 0, inserting the implicit 4/4 signature and 120 BPM where the chart
/// leaves them out.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SyncTrack {
    time_sigs: Vec<TimeSignature>,
    bpms: Vec<Bpm>,
}

impl SyncTrack {
    /// Builds a sync track from parser output.
    ///
    /// # Errors
    ///
    /// Returns a [`SongError`] if either list is unsorted, a signature has a
    /// zero numerator or denominator, or a BPM is zero.
    pub fn new(mut time_sigs: Vec<TimeSignature>, mut bpms: Vec<Bpm>) -> Result<Self, SongError> {
        if !time_sigs.windows(2).all(|w| w[0].position <= w[1].position)
            || !bpms.windows(2).all(|w| w[0].position <= w[1].position)
        {
            return Err(SongError::UnsortedSyncTrack);
        }
        for ts in &time_sigs {
            if ts.numerator == 0 || ts.denominator == 0 {
                return Err(SongError::MalformedTimeSignature(ts.position));
            }
        }
        for bpm in &bpms {
            if bpm.micro_bpm == 0 {
                return Err(SongError::ZeroBpm(bpm.position));
            }
        }
        if time_sigs.first().is_none_or(|ts| ts.position != 0) {
            time_sigs.insert(
                0,
                TimeSignature {
                    position: 0,
                    numerator: 4,
                    denominator: 4,
                },
            );
        }
        if bpms.first().is_none_or(|bpm| bpm.position != 0) {
            bpms.insert(
                0,
                Bpm {
                    position: 0,
                    micro_bpm: DEFAULT_MICRO_BPM,
                },
            );
        }
        Ok(Self { time_sigs, bpms })
    }

    /// The time signatures, sorted by position and starting at tick 0.
    #[must_use]
    pub fn time_sigs(&self) -> &[TimeSignature] {
        &self.time_sigs
    }

    /// The tempo changes, sorted by position and starting at tick 0.
    #[must_use]
    pub fn bpms(&self) -> &[Bpm] {
        &self.bpms
    }
}

/// Global properties of a song.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SongHeader {
    offset: f32,
    resolution: f32,
}

impl SongHeader {
    /// Creates a header from parser output.
    ///
    /// # Errors
    ///
    /// Returns [`SongError::NonPositiveResolution`] if the resolution is not
    /// strictly positive.
    pub fn new(offset: f32, resolution: f32) -> Result<Self, SongError> {
        if resolution <= 0.0 {
            return Err(SongError::NonPositiveResolution);
        }
        Ok(Self { offset, resolution })
    }

    /// The audio offset in seconds. Unused by the core, carried for callers.
    #[must_use]
    pub const fn offset(&self) -> f32 {
        self.offset
    }

    /// Ticks per beat.
    #[must_use]
    pub const fn resolution(&self) -> f32 {
        self.resolution
    }
}

impl Default for SongHeader {
    fn default() -> Self {
        Self {
            offset: 0.0,
            resolution: 192.0,
        }
    }
}

/// A single difficulty's notes for one instrument, with its Star Power
/// phrases and named events.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NoteTrack<C> {
    notes: Vec<Note<C>>,
    sp_phrases: Vec<StarPower>,
    events: Vec<TrackEvent>,
}

impl<C: Colour> NoteTrack<C> {
    /// Builds a note track from parser output.
    ///
    /// Notes are sorted by position then colour and deduplicated, keeping
    /// the later occurrence of any `(position, colour)` pair.
    ///
    /// # Errors
    ///
    /// Returns [`SongError::OverlappingPhrases`] if the Star Power phrases
    /// are out of order or overlap.
    pub fn new(
        mut notes: Vec<Note<C>>,
        sp_phrases: Vec<StarPower>,
        events: Vec<TrackEvent>,
    ) -> Result<Self, SongError> {
        notes.sort_by_key(|note| (note.position, note.colour));
        notes.dedup_by(|later, earlier| {
            let duplicate =
                later.position == earlier.position && later.colour == earlier.colour;
            if duplicate {
                *earlier = *later;
            }
            duplicate
        });
        if !sp_phrases
            .windows(2)
            .all(|w| w[0].position + w[0].length <= w[1].position)
        {
            return Err(SongError::OverlappingPhrases);
        }
        Ok(Self {
            notes,
            sp_phrases,
            events,
        })
    }

    /// The notes, sorted by position then colour, unique per pair.
    #[must_use]
    pub fn notes(&self) -> &[Note<C>] {
        &self.notes
    }

    /// The Star Power phrases, sorted and disjoint.
    #[must_use]
    pub fn sp_phrases(&self) -> &[StarPower] {
        &self.sp_phrases
    }

    /// The named track events.
    #[must_use]
    pub fn events(&self) -> &[TrackEvent] {
        &self.events
    }
}
