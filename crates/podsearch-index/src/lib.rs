//! Transcript index for Podsearch
//!
//! Persistent vector store of enriched transcript segments keyed by
//! `"{episode_id}_{segment_index}"`, with nearest-neighbour search that
//! returns each hit's text and metadata.

pub mod distance;
pub mod error;
pub mod store;

pub use error::{IndexError, Result};
pub use store::{CollectionConfig, OpenMode, TranscriptIndex, INDEX_FILE_NAME};
