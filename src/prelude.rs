//! One-stop imports for the common types of the crate.

pub use crate::optimiser::Optimiser;
pub use crate::points::{Point, PointRef, PointSet};
pub use crate::processed::{
    ActResult, ActValidity, Activation, ActivationCandidate, Path, ProcessedSong,
};
pub use crate::song::{
    Bpm, Colour, Difficulty, DrumColour, FiveFretColour, Instrument, Note, NoteTrack,
    SixFretColour, SongError, SongHeader, StarPower, SyncTrack, TimeSignature, TrackEvent,
};
pub use crate::sp::{SpBar, SpData};
pub use crate::time::{Beat, Measure, Position, Second, TimeConverter};
