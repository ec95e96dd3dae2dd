//! Local catalog of server media and play history

pub mod metadata;
pub mod store;

pub use metadata::{artist_title_from_path, display_metadata, extract_artist_title};
pub use store::{CatalogStore, Candidate, ReconcileReport};
