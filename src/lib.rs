//! Star Power path optimisation for Clone Hero style rhythm-game charts.
//!
//! Given one already-parsed note track, its tempo/meter map, and the play
//! parameters, this crate computes the set of non-overlapping Star Power
//! activations that maximises the score bonus, honouring how SP is gained
//! (phrase hits and whammy on held phrase notes) and spent (measure-based
//! drain modulated by the meter).
//!
//! Chart file parsing, difficulty and instrument selection, rendering, and
//! any I/O live outside this crate: an external producer hands over
//! validated [`song`] structures and receives a [`processed::Path`] plus a
//! text summary back.
//!
//! # Usage
//!
//! ```
//! use chartopt::prelude::*;
//!
//! let track = NoteTrack::new(
//!     vec![
//!         Note::new(0, FiveFretColour::Green),
//!         Note::new(192, FiveFretColour::Red),
//!         Note::new(768, FiveFretColour::Yellow),
//!         Note::new(960, FiveFretColour::Blue),
//!     ],
//!     vec![
//!         StarPower { position: 0, length: 50 },
//!         StarPower { position: 192, length: 50 },
//!     ],
//!     vec![],
//! )
//! .unwrap();
//! let sync_track = SyncTrack::new(vec![], vec![]).unwrap();
//!
//! let song = ProcessedSong::new(&track, 192, &sync_track, 1.0, 1.0, Second(0.0));
//! let path = Optimiser::new(&song).optimal_path();
//!
//! assert_eq!(path.activations.len(), 1);
//! println!("{}", song.path_summary(&path));
//! ```
//!
//! The pipeline is: [`song`] input entities → [`time::TimeConverter`] →
//! [`points::PointSet`] and [`sp::SpData`] → [`processed::ProcessedSong`] →
//! [`optimiser::Optimiser`]. Each stage is constructed once and read-only
//! afterwards; the whole crate is single-threaded and allocation-bounded.

#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod optimiser;
pub mod points;
pub mod prelude;
pub mod processed;
pub mod song;
pub mod sp;
pub mod time;

pub use optimiser::Optimiser;
pub use processed::{ActResult, ActValidity, Activation, ActivationCandidate, Path, ProcessedSong};
pub use song::{NoteTrack, SongError, SongHeader, SyncTrack};
pub use sp::SpBar;
