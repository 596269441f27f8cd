//! 파일 작업 실행 서비스
//!
//! 복사/이동/삭제/이름 변경/압축/압축 해제를 비동기 작업 단위로 실행합니다.
//! 실제 파일 I/O와 코덱 처리는 tokio 블로킹 풀에서 수행하고, 진행 중인 작업은
//! 식별자로 조회하거나 취소할 수 있습니다.

use crate::config::CompressionSettings;
use crate::models::{
    ArchiveType, CancelToken, ExtractRequest, OperationContext, OperationId, OperationInfo,
    OperationKind, OperationState, PackRequest,
};
use crate::system::filesystem::FileSystem;
use crate::system::processor::processor_for;
use crate::utils::error::{BokslDirError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// 파일 작업 서비스
#[async_trait]
pub trait OperationsService: Send + Sync {
    /// 노드들을 대상 디렉토리 아래로 복사
    async fn copy(&self, nodes: &[PathBuf], destination_directory: &Path) -> Result<()>;

    /// 노드들을 대상 디렉토리 아래로 이동
    async fn move_nodes(&self, nodes: &[PathBuf], destination_directory: &Path) -> Result<()>;

    /// 노드 영구 삭제 (디렉토리는 재귀)
    async fn delete(&self, nodes: &[PathBuf]) -> Result<()>;

    /// 같은 디렉토리 안에서 이름 변경. 새 경로를 돌려준다.
    async fn rename(&self, path: &Path, new_name: &str) -> Result<PathBuf>;

    async fn pack(&self, request: PackRequest, archive_type: ArchiveType) -> Result<()>;

    async fn extract(
        &self,
        archive_path: &Path,
        output_directory: &Path,
        archive_type: ArchiveType,
    ) -> Result<()>;
}

struct TrackedOperation {
    kind: OperationKind,
    target: PathBuf,
    context: OperationContext,
}

type ActiveTable = Arc<Mutex<HashMap<OperationId, TrackedOperation>>>;

/// 추적 테이블 등록 해제 가드
///
/// 블로킹 작업 클로저가 소유하므로, 호출자가 future를 버려도 작업이 실제로 끝나는 시점에 지워진다.
struct ActiveEntry {
    active: ActiveTable,
    id: OperationId,
}

impl Drop for ActiveEntry {
    fn drop(&mut self) {
        if let Ok(mut active) = self.active.lock() {
            active.remove(&self.id);
        }
    }
}

/// 완료 전에 future가 버려지면 작업을 취소
struct CancelOnDrop(Option<CancelToken>);

impl CancelOnDrop {
    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(token) = self.0.take() {
            debug!("Operation future dropped, cancelling");
            token.cancel();
        }
    }
}

/// 로컬 파일 시스템 기반 구현
pub struct LocalOperationsService {
    compression: CompressionSettings,
    filesystem: Arc<FileSystem>,
    next_id: AtomicU64,
    active: ActiveTable,
}

impl LocalOperationsService {
    pub fn new(compression: CompressionSettings) -> Self {
        Self {
            compression,
            filesystem: Arc::new(FileSystem::new()),
            next_id: AtomicU64::new(1),
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// 진행 중인 작업 취소 요청. 해당 작업이 없으면 false.
    pub fn cancel(&self, id: OperationId) -> bool {
        let Ok(active) = self.active.lock() else {
            return false;
        };
        match active.get(&id) {
            Some(tracked) => {
                tracked.context.cancel_token().cancel();
                info!("{} {} cancel requested", tracked.kind, id);
                true
            }
            None => false,
        }
    }

    /// 진행 중인 작업 스냅샷 (id 순)
    pub fn active_operations(&self) -> Vec<OperationInfo> {
        let Ok(active) = self.active.lock() else {
            return Vec::new();
        };
        let mut infos: Vec<OperationInfo> = active
            .iter()
            .map(|(id, tracked)| OperationInfo {
                id: *id,
                kind: tracked.kind,
                state: OperationState::Running,
                target: tracked.target.clone(),
                progress: tracked.context.progress(),
            })
            .collect();
        infos.sort_by_key(|info| info.id);
        infos
    }

    /// 외부 취소 토큰으로 압축
    ///
    /// 실패하거나 취소되면 이번 호출이 만든 출력 파일을 지운다.
    pub async fn pack_with_token(
        &self,
        request: PackRequest,
        archive_type: ArchiveType,
        token: CancelToken,
    ) -> Result<()> {
        let processor = processor_for(archive_type, &self.compression);

        self.run(
            OperationKind::Pack,
            request.output_file.clone(),
            token,
            move |_, ctx| {
                let output = &request.output_file;
                let existed_before = output.exists();
                let result = processor.pack(&request, ctx);
                if result.is_err() && !existed_before && output.exists() {
                    remove_partial_output(output);
                }
                result
            },
        )
        .await
    }

    /// 외부 취소 토큰으로 압축 해제
    pub async fn extract_with_token(
        &self,
        archive_path: &Path,
        output_directory: &Path,
        archive_type: ArchiveType,
        token: CancelToken,
    ) -> Result<()> {
        let processor = processor_for(archive_type, &self.compression);
        let request = ExtractRequest {
            archive_path: archive_path.to_path_buf(),
            output_directory: output_directory.to_path_buf(),
        };

        self.run(
            OperationKind::Extract,
            request.archive_path.clone(),
            token,
            move |_, ctx| {
                processor.extract(&request.archive_path, &request.output_directory, ctx)
            },
        )
        .await
    }

    fn register(
        &self,
        kind: OperationKind,
        target: &Path,
        context: &OperationContext,
    ) -> ActiveEntry {
        let id = OperationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut active) = self.active.lock() {
            active.insert(
                id,
                TrackedOperation {
                    kind,
                    target: target.to_path_buf(),
                    context: context.clone(),
                },
            );
        }
        ActiveEntry {
            active: Arc::clone(&self.active),
            id,
        }
    }

    /// 작업 하나를 블로킹 풀에서 실행하고 추적 테이블을 관리
    async fn run<T, F>(
        &self,
        kind: OperationKind,
        target: PathBuf,
        token: CancelToken,
        work: F,
    ) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&FileSystem, &OperationContext) -> Result<T> + Send + 'static,
    {
        let context = OperationContext::new(token);
        let entry = self.register(kind, &target, &context);
        let id = entry.id;
        info!("{} {} started: {}", kind, id, target.display());

        let filesystem = Arc::clone(&self.filesystem);
        let abandon = CancelOnDrop(Some(context.cancel_token().clone()));
        let joined = tokio::task::spawn_blocking(move || {
            let _entry = entry;
            let result = context
                .check_cancelled()
                .and_then(|()| work(&filesystem, &context));
            log_outcome(kind, id, &context, &result);
            result
        })
        .await;
        abandon.disarm();

        match joined {
            Ok(result) => result,
            Err(e) => {
                warn!("{} {} task failed: {}", kind, id, e);
                Err(BokslDirError::TaskFailed(e.to_string()))
            }
        }
    }
}

fn log_outcome<T>(
    kind: OperationKind,
    id: OperationId,
    context: &OperationContext,
    result: &Result<T>,
) {
    let progress = context.progress();
    match result {
        Ok(_) => info!(
            "{} {} {:?}: {} entries, {} bytes",
            kind,
            id,
            OperationState::Completed,
            progress.entries_processed,
            progress.bytes_processed
        ),
        Err(e) if e.is_cancelled() => info!(
            "{} {} {:?} after {} entries",
            kind,
            id,
            OperationState::Cancelled,
            progress.entries_processed
        ),
        Err(e) => warn!("{} {} {:?}: {}", kind, id, OperationState::Failed, e),
    }
}

fn remove_partial_output(output: &Path) {
    match fs::remove_file(output) {
        Ok(()) => debug!("Removed partial archive {}", output.display()),
        Err(e) => warn!(
            "Failed to remove partial archive {}: {}",
            output.display(),
            e
        ),
    }
}

impl Default for LocalOperationsService {
    fn default() -> Self {
        Self::new(CompressionSettings::default())
    }
}

/// 대상 디렉토리 안의 같은 이름 경로
fn destination_for(node: &Path, destination_directory: &Path) -> Result<PathBuf> {
    let name = node.file_name().ok_or_else(|| {
        BokslDirError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} has no file name", node.display()),
        ))
    })?;
    Ok(destination_directory.join(name))
}

fn ensure_directory(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(BokslDirError::PathNotFound {
            path: path.to_path_buf(),
        });
    }
    if !path.is_dir() {
        return Err(BokslDirError::NotADirectory {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// 새 이름 검증: 비어 있지 않고 경로 구분자를 포함하지 않는 단일 이름
fn validate_new_name(new_name: &str) -> Result<()> {
    let trimmed = new_name.trim();
    let invalid = trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || trimmed.contains('/')
        || trimmed.contains(std::path::MAIN_SEPARATOR);
    if invalid {
        return Err(BokslDirError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid file name: {:?}", new_name),
        )));
    }
    Ok(())
}

#[async_trait]
impl OperationsService for LocalOperationsService {
    async fn copy(&self, nodes: &[PathBuf], destination_directory: &Path) -> Result<()> {
        let nodes = nodes.to_vec();
        let destination = destination_directory.to_path_buf();

        self.run(
            OperationKind::Copy,
            destination.clone(),
            CancelToken::new(),
            move |filesystem, ctx| {
                ensure_directory(&destination)?;
                for node in &nodes {
                    ctx.check_cancelled()?;
                    let dest = destination_for(node, &destination)?;
                    if node.is_dir() {
                        filesystem.copy_directory(node, &dest, ctx)?;
                    } else {
                        let copied = filesystem.copy_file(node, &dest)?;
                        ctx.entry_completed(&node.to_string_lossy(), copied);
                    }
                }
                Ok(())
            },
        )
        .await
    }

    async fn move_nodes(&self, nodes: &[PathBuf], destination_directory: &Path) -> Result<()> {
        let nodes = nodes.to_vec();
        let destination = destination_directory.to_path_buf();

        self.run(
            OperationKind::Move,
            destination.clone(),
            CancelToken::new(),
            move |filesystem, ctx| {
                ensure_directory(&destination)?;
                for node in &nodes {
                    ctx.check_cancelled()?;
                    let dest = destination_for(node, &destination)?;
                    if node.is_dir() {
                        filesystem.move_directory(node, &dest, ctx)?;
                    } else {
                        let moved = filesystem.move_file(node, &dest)?;
                        ctx.entry_completed(&node.to_string_lossy(), moved);
                    }
                }
                Ok(())
            },
        )
        .await
    }

    async fn delete(&self, nodes: &[PathBuf]) -> Result<()> {
        let nodes = nodes.to_vec();
        let target = nodes.first().cloned().unwrap_or_default();

        self.run(
            OperationKind::Delete,
            target,
            CancelToken::new(),
            move |filesystem, ctx| {
                for node in &nodes {
                    ctx.check_cancelled()?;
                    let is_dir = fs::symlink_metadata(node)
                        .map(|m| m.is_dir())
                        .unwrap_or(false);
                    if is_dir {
                        filesystem.delete_directory(node, ctx)?;
                    } else {
                        let removed = filesystem.delete_file(node)?;
                        ctx.entry_completed(&node.to_string_lossy(), removed);
                    }
                }
                Ok(())
            },
        )
        .await
    }

    async fn rename(&self, path: &Path, new_name: &str) -> Result<PathBuf> {
        validate_new_name(new_name)?;
        let src = path.to_path_buf();
        let dest = match path.parent() {
            Some(parent) => parent.join(new_name.trim()),
            None => PathBuf::from(new_name.trim()),
        };

        self.run(
            OperationKind::Rename,
            src.clone(),
            CancelToken::new(),
            move |filesystem, ctx| {
                filesystem.rename_path(&src, &dest)?;
                ctx.entry_completed(&dest.to_string_lossy(), 0);
                Ok(dest)
            },
        )
        .await
    }

    async fn pack(&self, request: PackRequest, archive_type: ArchiveType) -> Result<()> {
        self.pack_with_token(request, archive_type, CancelToken::new())
            .await
    }

    async fn extract(
        &self,
        archive_path: &Path,
        output_directory: &Path,
        archive_type: ArchiveType,
    ) -> Result<()> {
        self.extract_with_token(archive_path, output_directory, archive_type, CancelToken::new())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(path: &Path, content: &[u8]) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn test_copy_files_and_directories() {
        let temp = tempdir().expect("create tempdir");
        let file = temp.path().join("a.txt");
        let dir = temp.path().join("dir");
        write(&file, b"alpha");
        write(&dir.join("nested").join("b.txt"), b"beta");
        let dest = temp.path().join("dest");
        fs::create_dir_all(&dest).unwrap();

        let service = LocalOperationsService::default();
        service
            .copy(&[file.clone(), dir.clone()], &dest)
            .await
            .expect("copy");

        assert_eq!(fs::read(dest.join("a.txt")).unwrap(), b"alpha");
        assert_eq!(fs::read(dest.join("dir/nested/b.txt")).unwrap(), b"beta");
        assert!(file.exists());
        assert!(service.active_operations().is_empty());
    }

    #[tokio::test]
    async fn test_copy_into_missing_destination() {
        let temp = tempdir().expect("create tempdir");
        let file = temp.path().join("a.txt");
        write(&file, b"alpha");

        let err = LocalOperationsService::default()
            .copy(&[file], &temp.path().join("missing"))
            .await
            .expect_err("missing destination");
        assert!(matches!(err, BokslDirError::PathNotFound { .. }));
    }

    #[tokio::test]
    async fn test_move_nodes() {
        let temp = tempdir().expect("create tempdir");
        let file = temp.path().join("a.txt");
        let dir = temp.path().join("dir");
        write(&file, b"alpha");
        write(&dir.join("b.txt"), b"beta");
        let dest = temp.path().join("dest");
        fs::create_dir_all(&dest).unwrap();

        LocalOperationsService::default()
            .move_nodes(&[file.clone(), dir.clone()], &dest)
            .await
            .expect("move");

        assert!(!file.exists());
        assert!(!dir.exists());
        assert_eq!(fs::read(dest.join("a.txt")).unwrap(), b"alpha");
        assert_eq!(fs::read(dest.join("dir/b.txt")).unwrap(), b"beta");
    }

    #[tokio::test]
    async fn test_delete_nodes() {
        let temp = tempdir().expect("create tempdir");
        let file = temp.path().join("a.txt");
        let dir = temp.path().join("dir");
        write(&file, b"alpha");
        write(&dir.join("sub/b.txt"), b"beta");

        LocalOperationsService::default()
            .delete(&[file.clone(), dir.clone()])
            .await
            .expect("delete");
        assert!(!file.exists());
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_rename() {
        let temp = tempdir().expect("create tempdir");
        let file = temp.path().join("old.txt");
        write(&file, b"x");

        let service = LocalOperationsService::default();
        let renamed = service.rename(&file, "new.txt").await.expect("rename");
        assert_eq!(renamed, temp.path().join("new.txt"));
        assert!(renamed.exists());
        assert!(!file.exists());

        let err = service
            .rename(&renamed, "../escape.txt")
            .await
            .expect_err("invalid name");
        assert!(matches!(err, BokslDirError::Io(ref e) if e.kind() == io::ErrorKind::InvalidInput));
        assert!(service.rename(&renamed, "  ").await.is_err());
    }

    #[tokio::test]
    async fn test_pack_and_extract_through_service() {
        let temp = tempdir().expect("create tempdir");
        let source = temp.path().join("source");
        write(&source.join("docs/readme.md"), b"# readme");
        write(&source.join("top.txt"), b"top");
        let archive = temp.path().join("bundle.zip");

        let service = LocalOperationsService::default();
        service
            .pack(
                PackRequest {
                    files: vec![source.join("top.txt")],
                    directories: vec![source.join("docs")],
                    source_directory: source.clone(),
                    output_file: archive.clone(),
                },
                ArchiveType::Zip,
            )
            .await
            .expect("pack");

        let out = temp.path().join("out");
        service
            .extract(&archive, &out, ArchiveType::Zip)
            .await
            .expect("extract");
        assert_eq!(fs::read(out.join("docs/readme.md")).unwrap(), b"# readme");
        assert_eq!(fs::read(out.join("top.txt")).unwrap(), b"top");
    }

    #[tokio::test]
    async fn test_failed_pack_leaves_no_output() {
        let temp = tempdir().expect("create tempdir");
        let archive = temp.path().join("bundle.tar.gz");

        let err = LocalOperationsService::default()
            .pack(
                PackRequest {
                    files: vec![temp.path().join("missing.txt")],
                    directories: Vec::new(),
                    source_directory: temp.path().to_path_buf(),
                    output_file: archive.clone(),
                },
                ArchiveType::TarGz,
            )
            .await
            .expect_err("missing input");
        assert!(matches!(err, BokslDirError::PathNotFound { .. }));
        assert!(!archive.exists());
    }

    #[tokio::test]
    async fn test_failed_pack_keeps_existing_output() {
        let temp = tempdir().expect("create tempdir");
        let file = temp.path().join("a.txt");
        write(&file, b"alpha");
        let archive = temp.path().join("bundle.zip");
        write(&archive, b"previous archive");

        let err = LocalOperationsService::default()
            .pack(
                PackRequest {
                    files: vec![file],
                    directories: Vec::new(),
                    source_directory: temp.path().to_path_buf(),
                    output_file: archive.clone(),
                },
                ArchiveType::Zip,
            )
            .await
            .expect_err("existing output");
        assert!(matches!(err, BokslDirError::FileExists { .. }));
        assert_eq!(fs::read(&archive).unwrap(), b"previous archive");
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let temp = tempdir().expect("create tempdir");
        let file = temp.path().join("a.txt");
        write(&file, b"alpha");
        let archive = temp.path().join("bundle.7z");

        let token = CancelToken::new();
        token.cancel();
        let err = LocalOperationsService::default()
            .pack_with_token(
                PackRequest {
                    files: vec![file],
                    directories: Vec::new(),
                    source_directory: temp.path().to_path_buf(),
                    output_file: archive.clone(),
                },
                ArchiveType::SevenZip,
                token,
            )
            .await
            .expect_err("cancelled");
        assert!(err.is_cancelled());
        assert!(!archive.exists());
    }

    #[tokio::test]
    async fn test_dropped_pack_is_cancelled_and_untracked() {
        let temp = tempdir().expect("create tempdir");
        let source = temp.path().join("src");
        // 압축이 잘 되지 않는 데이터로 충분히 오래 걸리게 한다
        let mut seed: u32 = 0x2545_f491;
        for i in 0..60 {
            let chunk: Vec<u8> = (0..256 * 1024)
                .map(|_| {
                    seed ^= seed << 13;
                    seed ^= seed >> 17;
                    seed ^= seed << 5;
                    seed as u8
                })
                .collect();
            write(&source.join(format!("blob_{:02}.bin", i)), &chunk);
        }
        let archive = temp.path().join("bundle.tar.xz");

        let service = LocalOperationsService::default();
        let timed_out = tokio::time::timeout(
            std::time::Duration::from_millis(1),
            service.pack(
                PackRequest {
                    files: Vec::new(),
                    directories: vec![source.clone()],
                    source_directory: temp.path().to_path_buf(),
                    output_file: archive.clone(),
                },
                ArchiveType::TarXz,
            ),
        )
        .await;
        assert!(timed_out.is_err());

        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(30);
        while !service.active_operations().is_empty() {
            assert!(tokio::time::Instant::now() < deadline, "operation still tracked");
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert!(!archive.exists());
    }

    #[test]
    fn test_cancel_by_id() {
        let service = LocalOperationsService::default();
        let context = OperationContext::default();
        let entry = service.register(OperationKind::Extract, Path::new("/tmp/a.zip"), &context);
        let id = entry.id;

        let active = service.active_operations();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, id);
        assert_eq!(active[0].kind, OperationKind::Extract);
        assert_eq!(active[0].state, OperationState::Running);

        assert!(service.cancel(id));
        assert!(context.cancel_token().is_cancelled());

        drop(entry);
        assert!(!service.cancel(id));
        assert!(service.active_operations().is_empty());
    }

    #[test]
    fn test_operation_ids_increase() {
        let service = LocalOperationsService::default();
        let context = OperationContext::default();
        let first = service.register(OperationKind::Copy, Path::new("a"), &context);
        let second = service.register(OperationKind::Copy, Path::new("b"), &context);
        assert!(second.id > first.id);
    }
}
