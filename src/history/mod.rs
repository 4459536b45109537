//! Job history ingestion.
//!
//! A recorded history reaches the simulator in two steps: the reader loads
//! raw records from disk, and the filter drops what cannot be simulated,
//! applies the user's date bounds and sorts by start time.

pub mod filter;
pub mod reader;
