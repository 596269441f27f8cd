use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BokslDirError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Path not found: {path:?}")]
    PathNotFound { path: PathBuf },

    #[error("Not a directory: {path:?}")]
    NotADirectory { path: PathBuf },

    #[error("Permission denied: {path:?}")]
    PermissionDenied { path: PathBuf },

    #[error("File already exists: {path:?}")]
    FileExists { path: PathBuf },

    #[error("Source and destination are the same: {path:?}")]
    SameSourceAndDest { path: PathBuf },

    #[error("Copy failed: {src:?} -> {dest:?}: {reason}")]
    CopyFailed {
        src: PathBuf,
        dest: PathBuf,
        reason: String,
    },

    #[error("Move failed: {src:?} -> {dest:?}: {reason}")]
    MoveFailed {
        src: PathBuf,
        dest: PathBuf,
        reason: String,
    },

    #[error("Delete failed: {path:?}: {reason}")]
    DeleteFailed { path: PathBuf, reason: String },

    #[error("Rename failed: {src:?} -> {dest:?}: {reason}")]
    RenameFailed {
        src: PathBuf,
        dest: PathBuf,
        reason: String,
    },

    #[error("Archive create failed: {path:?}: {reason}")]
    ArchiveCreateFailed { path: PathBuf, reason: String },

    #[error("Invalid archive: {path:?}: {reason}")]
    ArchiveFormat { path: PathBuf, reason: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Background task failed: {0}")]
    TaskFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BokslDirError {
    /// 아카이브 내용 자체가 손상/미지원인 경우 (I/O 실패와 구분)
    pub fn is_format_error(&self) -> bool {
        matches!(self, BokslDirError::ArchiveFormat { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, BokslDirError::Cancelled)
    }

    /// 아카이브를 읽는 중 발생한 io::Error 분류
    ///
    /// 디코더는 손상된 입력을 InvalidData/InvalidInput/UnexpectedEof로 보고하므로
    /// 이 경우 포맷 오류로 취급합니다.
    pub fn from_archive_read(path: impl Into<PathBuf>, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::InvalidData
            | io::ErrorKind::InvalidInput
            | io::ErrorKind::UnexpectedEof => BokslDirError::ArchiveFormat {
                path: path.into(),
                reason: error.to_string(),
            },
            io::ErrorKind::PermissionDenied => BokslDirError::PermissionDenied { path: path.into() },
            _ => BokslDirError::Io(error),
        }
    }

    /// 대상 쪽 쓰기 실패 분류
    pub fn from_write(path: impl Into<PathBuf>, error: io::Error) -> Self {
        if error.kind() == io::ErrorKind::PermissionDenied {
            BokslDirError::PermissionDenied { path: path.into() }
        } else {
            BokslDirError::Io(error)
        }
    }
}

pub type Result<T> = std::result::Result<T, BokslDirError>;
