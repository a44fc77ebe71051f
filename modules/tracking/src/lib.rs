//! Scheduled tracking of definitions against host-search sources with
//! novelty detection and notification.

pub mod engine;
pub mod loader;
pub mod notify;

pub use engine::{
    definitions_by_source, execute_tracking_queries, track_definitions_for_source, CycleReport, RunMode,
    SourceReport, Tracker,
};
pub use loader::load_definition_files;
pub use notify::{FileNotifier, LogNotifier};
