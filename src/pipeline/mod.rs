//! Content pipeline
//!
//! The moving parts between the API surface and the store:
//! - [`machine`]: the highlight status machine, the only legal mutator of
//!   annotation state
//! - [`orchestrator`]: generation and refinement runs with background
//!   annotation jobs
//! - [`poller`]: convergence loop for watching in-flight jobs
//! - [`autosave`]: debounced persistence of editor changes

pub mod autosave;
pub mod machine;
pub mod orchestrator;
pub mod poller;

pub use autosave::{AutoSaveHandle, AutoSaver};
pub use machine::{HighlightEvent, TransitionError};
pub use orchestrator::GenerationOrchestrator;
pub use poller::{
    PollResolution, PollSettings, PollStop, ReconciliationPoller, StatusSource, StoreStatusSource,
};
