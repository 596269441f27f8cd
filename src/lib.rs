//! BokslDir 아카이브/파일 작업 코어
//!
//! 경로의 아카이브 형식 판별, 형식별 압축/해제, 출력 경로 충돌 회피,
//! 그리고 이를 취소 가능한 비동기 작업으로 실행하는 서비스를 제공한다.

pub mod config;
pub mod logging;
pub mod models;
pub mod system;
pub mod utils;

pub use models::ArchiveType;
pub use system::{ArchiveService, LocalOperationsService};
pub use utils::error::{BokslDirError, Result};
