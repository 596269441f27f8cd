//! 아카이브 서비스
//!
//! 노드 분류, 출력 경로 결정 후 실제 작업은 `OperationsService`에 위임한다.

use crate::models::{ArchiveType, PackRequest};
use crate::system::classifier::classify;
use crate::system::filesystem::PathService;
use crate::system::naming::NameResolutionService;
use crate::system::operations::OperationsService;
use crate::utils::error::{BokslDirError, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub struct ArchiveService {
    operations: Arc<dyn OperationsService>,
    paths: Arc<dyn PathService>,
    naming: NameResolutionService,
}

impl ArchiveService {
    pub fn new(operations: Arc<dyn OperationsService>, paths: Arc<dyn PathService>) -> Self {
        let naming = NameResolutionService::new(Arc::clone(&paths));
        Self {
            operations,
            paths,
            naming,
        }
    }

    pub fn is_archive(&self, path: &Path) -> bool {
        classify(path).is_some()
    }

    /// 노드들을 압축
    ///
    /// 디렉토리로 존재하는 노드는 재귀 포함, 나머지는 파일로 취급한다.
    /// 엔트리 이름은 노드들의 공통 상위 디렉토리 기준.
    pub async fn pack(
        &self,
        nodes: &[PathBuf],
        output_file: &Path,
        archive_type: ArchiveType,
    ) -> Result<()> {
        if nodes.is_empty() {
            return Err(BokslDirError::ArchiveCreateFailed {
                path: output_file.to_path_buf(),
                reason: "No source selected".to_string(),
            });
        }

        let mut files = Vec::new();
        let mut directories = Vec::new();
        for node in nodes {
            let bucket = if self.paths.is_directory(node) {
                &mut directories
            } else {
                &mut files
            };
            if !bucket.contains(node) {
                bucket.push(node.clone());
            }
        }

        let source_directory = self
            .paths
            .common_root_directory(nodes)
            .unwrap_or_else(|| PathBuf::from("."));

        info!(
            "Pack {} file(s), {} dir(s) from {} into {} ({})",
            files.len(),
            directories.len(),
            source_directory.display(),
            output_file.display(),
            archive_type
        );
        let request = PackRequest {
            files,
            directories,
            source_directory,
            output_file: output_file.to_path_buf(),
        };
        self.operations.pack(request, archive_type).await
    }

    /// 아카이브 이름으로 만든 새 디렉토리에 해제 (`/a/b/file.zip` -> `/a/b/file`)
    ///
    /// # Panics
    ///
    /// 아카이브로 분류되지 않는 경로. 호출 전에 `is_archive`로 확인해야 한다.
    pub async fn extract_to_new_directory(&self, archive_path: &Path) -> Result<PathBuf> {
        let archive_type = Self::require_archive_type(archive_path);
        let output_directory = self
            .naming
            .full_name_without_extension(archive_path)
            .or_else(|| self.paths.parent_directory(archive_path))
            .unwrap_or_else(|| PathBuf::from("."));

        self.operations
            .extract(archive_path, &output_directory, archive_type)
            .await?;
        Ok(output_directory)
    }

    /// 지정한 디렉토리(없으면 아카이브가 있는 디렉토리)에 해제
    ///
    /// # Panics
    ///
    /// 아카이브로 분류되지 않는 경로.
    pub async fn extract(
        &self,
        archive_path: &Path,
        output_directory: Option<&Path>,
    ) -> Result<PathBuf> {
        let archive_type = Self::require_archive_type(archive_path);
        let output_directory = match output_directory {
            Some(dir) => dir.to_path_buf(),
            None => self
                .paths
                .parent_directory(archive_path)
                .unwrap_or_else(|| PathBuf::from(".")),
        };

        self.operations
            .extract(archive_path, &output_directory, archive_type)
            .await?;
        Ok(output_directory)
    }

    /// 압축 출력 경로 제안: `공통 상위/<이름>.<확장자>` (겹치면 `_(n)`)
    pub fn suggest_pack_output(&self, nodes: &[PathBuf], archive_type: ArchiveType) -> PathBuf {
        let root = self
            .paths
            .common_root_directory(nodes)
            .unwrap_or_else(|| PathBuf::from("."));

        let name = match nodes {
            [single] => {
                let part = if self.paths.is_directory(single) {
                    single.file_name()
                } else {
                    single.file_stem()
                };
                part.and_then(OsStr::to_str).map(str::to_string)
            }
            _ => root.file_name().and_then(OsStr::to_str).map(str::to_string),
        }
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| "archive".to_string());

        self.naming
            .unique_path(&root, &format!("{}.{}", name, archive_type.extension()))
    }

    fn require_archive_type(archive_path: &Path) -> ArchiveType {
        match classify(archive_path) {
            Some(archive_type) => archive_type,
            None => panic!(
                "extract called with a path that is not an archive: {}",
                archive_path.display()
            ),
        }
    }
}
