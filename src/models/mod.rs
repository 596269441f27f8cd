// Data Models
pub mod archive_type;
pub mod operation;

pub use archive_type::ArchiveType;
pub use operation::{
    CancelToken, ExtractRequest, OperationContext, OperationId, OperationInfo, OperationKind,
    OperationProgress, OperationState, PackRequest,
};
