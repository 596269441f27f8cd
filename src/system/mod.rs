// System Layer
pub mod archive_service;
pub mod classifier;
pub mod filesystem;
pub mod naming;
pub mod operations;
pub mod processor;

pub use archive_service::ArchiveService;
pub use classifier::classify;
pub use filesystem::{FileSystem, PathService};
pub use naming::{derive_output_name, NameResolutionService};
pub use operations::{LocalOperationsService, OperationsService};
pub use processor::{processor_for, ArchiveProcessor};
