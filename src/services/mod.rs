//! Collaborator services kept apart from the extraction logic

pub mod io;
pub mod progress;

pub use io::{parse_locator, read_source, OutputStore};
pub use progress::{
    NoOpProgressReporter, ProcessingStage, ProgressReporter, ProgressUpdate,
    TracingProgressReporter,
};
