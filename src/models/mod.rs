pub mod track;

pub use track::{SyncStatus, TrackRecord};
