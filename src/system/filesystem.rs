use crate::models::OperationContext;
use crate::utils::error::{BokslDirError, Result};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// 경로 조회 서비스
///
/// 아카이브 서비스가 노드 분류와 기본 출력 경로 결정에 사용합니다.
pub trait PathService: Send + Sync {
    /// 부모 디렉토리. 상대 경로의 최상위 항목은 "." 을 돌려준다.
    fn parent_directory(&self, path: &Path) -> Option<PathBuf>;

    fn exists(&self, path: &Path) -> bool;

    fn is_directory(&self, path: &Path) -> bool;

    /// 모든 노드를 포함하는 가장 깊은 디렉토리
    fn common_root_directory(&self, paths: &[PathBuf]) -> Option<PathBuf> {
        let mut parents = paths.iter().filter_map(|p| self.parent_directory(p));
        let first = parents.next()?;
        let mut common: Vec<Component<'_>> = first.components().collect();
        let rest: Vec<PathBuf> = parents.collect();
        for parent in &rest {
            let shared = common
                .iter()
                .zip(parent.components())
                .take_while(|(a, b)| **a == *b)
                .count();
            common.truncate(shared);
        }
        if common.is_empty() {
            return Some(PathBuf::from("."));
        }
        Some(common.iter().collect())
    }
}

/// 로컬 파일 작업
///
/// 디렉토리 단위 작업은 walkdir로 엔트리를 순회하면서 엔트리마다 취소 여부를 확인하고
/// 진행 상황을 `OperationContext`에 기록한다.
pub struct FileSystem;

/// io 에러 변환. 권한 문제는 작업과 무관하게 `PermissionDenied`로 보고한다.
fn io_failure(
    error: io::Error,
    path: &Path,
    other: impl FnOnce(String) -> BokslDirError,
) -> BokslDirError {
    match error.kind() {
        io::ErrorKind::PermissionDenied => BokslDirError::PermissionDenied {
            path: path.to_path_buf(),
        },
        io::ErrorKind::NotFound => BokslDirError::PathNotFound {
            path: path.to_path_buf(),
        },
        _ => other(error.to_string()),
    }
}

fn walk_failure(error: walkdir::Error, root: &Path) -> BokslDirError {
    let path = error.path().unwrap_or(root).to_path_buf();
    match error.into_io_error() {
        Some(e) => io_failure(e, &path, |reason| BokslDirError::DeleteFailed {
            path: path.clone(),
            reason,
        }),
        None => BokslDirError::DeleteFailed {
            path,
            reason: "filesystem loop detected".to_string(),
        },
    }
}

fn check_distinct(src: &Path, dest: &Path) -> Result<()> {
    if src == dest {
        return Err(BokslDirError::SameSourceAndDest {
            path: src.to_path_buf(),
        });
    }
    Ok(())
}

fn require_directory(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(BokslDirError::NotADirectory {
            path: path.to_path_buf(),
        }),
        Err(_) => Err(BokslDirError::PathNotFound {
            path: path.to_path_buf(),
        }),
    }
}

impl FileSystem {
    pub fn new() -> Self {
        Self
    }

    /// 단일 파일 복사. 반환값: 복사된 바이트 수
    pub fn copy_file(&self, src: &Path, dest: &Path) -> Result<u64> {
        check_distinct(src, dest)?;
        fs::copy(src, dest).map_err(|e| {
            io_failure(e, src, |reason| BokslDirError::CopyFailed {
                src: src.to_path_buf(),
                dest: dest.to_path_buf(),
                reason,
            })
        })
    }

    /// 디렉토리 트리 복사. `dest`가 트리의 새 루트가 된다.
    pub fn copy_directory(&self, src: &Path, dest: &Path, ctx: &OperationContext) -> Result<u64> {
        check_distinct(src, dest)?;
        require_directory(src)?;
        if dest.starts_with(src) {
            return Err(BokslDirError::CopyFailed {
                src: src.to_path_buf(),
                dest: dest.to_path_buf(),
                reason: "Destination is inside the source directory".to_string(),
            });
        }

        let mut total_bytes = 0u64;
        for entry in WalkDir::new(src).follow_links(false).sort_by_file_name() {
            ctx.check_cancelled()?;
            let entry = entry.map_err(|e| walk_failure(e, src))?;
            let relative = entry.path().strip_prefix(src).unwrap_or(Path::new(""));
            let target = dest.join(relative);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&target).map_err(|e| {
                    io_failure(e, &target, |reason| BokslDirError::CopyFailed {
                        src: entry.path().to_path_buf(),
                        dest: target.clone(),
                        reason,
                    })
                })?;
            } else {
                let copied = self.copy_file(entry.path(), &target)?;
                ctx.entry_completed(&entry.path().to_string_lossy(), copied);
                total_bytes += copied;
            }
        }
        Ok(total_bytes)
    }

    /// 파일 이동. rename이 안 되면(다른 장치) 복사 후 원본 삭제.
    pub fn move_file(&self, src: &Path, dest: &Path) -> Result<u64> {
        check_distinct(src, dest)?;
        let size = fs::symlink_metadata(src)
            .map_err(|_| BokslDirError::PathNotFound {
                path: src.to_path_buf(),
            })?
            .len();

        if fs::rename(src, dest).is_ok() {
            return Ok(size);
        }
        self.copy_file(src, dest)?;
        fs::remove_file(src).map_err(|e| BokslDirError::MoveFailed {
            src: src.to_path_buf(),
            dest: dest.to_path_buf(),
            reason: format!("Failed to remove source after copy: {}", e),
        })?;
        Ok(size)
    }

    /// 디렉토리 이동. 복사로 대체되는 경우 복사와 원본 삭제 모두 엔트리 단위로 취소할 수 있다.
    pub fn move_directory(&self, src: &Path, dest: &Path, ctx: &OperationContext) -> Result<u64> {
        check_distinct(src, dest)?;
        require_directory(src)?;

        if fs::rename(src, dest).is_ok() {
            let moved = self.calculate_total_size(dest)?;
            ctx.entry_completed(&src.to_string_lossy(), moved);
            return Ok(moved);
        }

        let copied = self.copy_directory(src, dest, ctx)?;
        self.remove_tree(src, ctx, false).map_err(|e| match e {
            BokslDirError::Cancelled => e,
            other => BokslDirError::MoveFailed {
                src: src.to_path_buf(),
                dest: dest.to_path_buf(),
                reason: format!("Failed to remove source after copy: {}", other),
            },
        })?;
        Ok(copied)
    }

    /// 경로의 총 크기 (디렉토리는 재귀, 심볼릭 링크는 따라가지 않음)
    pub fn calculate_total_size(&self, path: &Path) -> Result<u64> {
        let mut total = 0u64;
        for entry in WalkDir::new(path).follow_links(false) {
            let entry = entry.map_err(|e| walk_failure(e, path))?;
            if !entry.file_type().is_dir() {
                total += entry.metadata().map(|m| m.len()).unwrap_or(0);
            }
        }
        Ok(total)
    }

    /// 파일(또는 심볼릭 링크) 영구 삭제. 반환값: 삭제된 크기
    pub fn delete_file(&self, path: &Path) -> Result<u64> {
        // 깨진 링크도 지울 수 있도록 링크 자체의 메타데이터를 본다
        let size = fs::symlink_metadata(path)
            .map_err(|_| BokslDirError::PathNotFound {
                path: path.to_path_buf(),
            })?
            .len();
        fs::remove_file(path).map_err(|e| {
            io_failure(e, path, |reason| BokslDirError::DeleteFailed {
                path: path.to_path_buf(),
                reason,
            })
        })?;
        Ok(size)
    }

    /// 디렉토리 트리 영구 삭제
    ///
    /// 하위 항목부터 하나씩 지우며 매 엔트리 전에 취소를 확인한다. 취소되면 이미 지운 항목은 복구되지 않는다.
    pub fn delete_directory(&self, path: &Path, ctx: &OperationContext) -> Result<u64> {
        require_directory(path)?;
        self.remove_tree(path, ctx, true)
    }

    fn remove_tree(&self, root: &Path, ctx: &OperationContext, report: bool) -> Result<u64> {
        let mut total_bytes = 0u64;
        for entry in WalkDir::new(root).follow_links(false).contents_first(true) {
            ctx.check_cancelled()?;
            let entry = entry.map_err(|e| walk_failure(e, root))?;
            let path = entry.path();

            if entry.file_type().is_dir() {
                fs::remove_dir(path).map_err(|e| {
                    io_failure(e, path, |reason| BokslDirError::DeleteFailed {
                        path: path.to_path_buf(),
                        reason,
                    })
                })?;
            } else {
                let removed = self.delete_file(path)?;
                total_bytes += removed;
                if report {
                    ctx.entry_completed(&path.to_string_lossy(), removed);
                }
            }
        }
        Ok(total_bytes)
    }

    /// 이름 변경. 대상이 이미 있으면 덮어쓰지 않는다.
    pub fn rename_path(&self, src: &Path, dest: &Path) -> Result<()> {
        if fs::symlink_metadata(src).is_err() {
            return Err(BokslDirError::PathNotFound {
                path: src.to_path_buf(),
            });
        }
        if fs::symlink_metadata(dest).is_ok() {
            return Err(BokslDirError::FileExists {
                path: dest.to_path_buf(),
            });
        }
        fs::rename(src, dest).map_err(|e| {
            io_failure(e, src, |reason| BokslDirError::RenameFailed {
                src: src.to_path_buf(),
                dest: dest.to_path_buf(),
                reason,
            })
        })
    }
}

impl PathService for FileSystem {
    fn parent_directory(&self, path: &Path) -> Option<PathBuf> {
        match path.parent() {
            Some(parent) if parent.as_os_str().is_empty() => Some(PathBuf::from(".")),
            Some(parent) => Some(parent.to_path_buf()),
            None => None,
        }
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_directory(&self, path: &Path) -> bool {
        path.is_dir()
    }
}

impl Default for FileSystem {
    fn default() -> Self {
        Self::new()
    }
}
