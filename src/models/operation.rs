//! 파일 작업 모델
//!
//! 복사/이동/삭제/압축/압축 해제 작업에 필요한 데이터 구조 정의

use crate::utils::error::{BokslDirError, Result};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// 압축 요청
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackRequest {
    /// 개별 파일 목록
    pub files: Vec<PathBuf>,
    /// 재귀적으로 포함할 디렉토리 목록
    pub directories: Vec<PathBuf>,
    /// 엔트리 경로의 기준 디렉토리
    pub source_directory: PathBuf,
    /// 생성할 아카이브 파일
    pub output_file: PathBuf,
}

/// 압축 해제 요청
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractRequest {
    pub archive_path: PathBuf,
    pub output_directory: PathBuf,
}

/// 작업 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Copy,
    Move,
    Delete,
    Rename,
    Pack,
    Extract,
}

impl OperationKind {
    /// 작업 유형 이름 반환
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::Copy => "Copy",
            OperationKind::Move => "Move",
            OperationKind::Delete => "Delete",
            OperationKind::Rename => "Rename",
            OperationKind::Pack => "Pack",
            OperationKind::Extract => "Extract",
        }
    }

}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 작업 식별자
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(pub u64);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 작업 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    /// 처리 중
    Running,
    /// 완료
    Completed,
    /// 실패
    Failed,
    /// 취소됨
    Cancelled,
}

/// 작업 진행 상태
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationProgress {
    /// 현재 처리 중인 엔트리
    pub current_entry: String,
    /// 완료된 엔트리 수
    pub entries_processed: usize,
    /// 처리된 바이트 수
    pub bytes_processed: u64,
}

/// 진행 중인 작업 스냅샷
#[derive(Debug, Clone)]
pub struct OperationInfo {
    pub id: OperationId,
    pub kind: OperationKind,
    pub state: OperationState,
    /// 작업 대상 (로그/표시용)
    pub target: PathBuf,
    pub progress: OperationProgress,
}

/// 취소 토큰
///
/// 복제본끼리 같은 플래그를 공유합니다.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// 작업 실행 컨텍스트
///
/// 프로세서와 파일 작업 루프에 전달되어 엔트리 단위로 취소 확인과 진행률 갱신을 수행합니다.
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    cancel: CancelToken,
    progress: Arc<Mutex<OperationProgress>>,
}

impl OperationContext {
    pub fn new(cancel: CancelToken) -> Self {
        Self {
            cancel,
            progress: Arc::new(Mutex::new(OperationProgress::default())),
        }
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// 취소되었으면 `Cancelled` 반환
    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(BokslDirError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// 엔트리 하나 완료
    pub fn entry_completed(&self, name: &str, bytes: u64) {
        if let Ok(mut progress) = self.progress.lock() {
            progress.current_entry = name.to_string();
            progress.entries_processed += 1;
            progress.bytes_processed = progress.bytes_processed.saturating_add(bytes);
        }
    }

    pub fn progress(&self) -> OperationProgress {
        self.progress
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}
