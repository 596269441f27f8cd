//! 포맷별 아카이브 프로세서
//!
//! `ArchiveType` 하나당 어댑터 하나. 선택은 `processor_for`의 match로만 이루어진다.

mod gzip_handler;
pub mod lzip;
mod sevenz_handler;
mod tar_handler;
mod zip_handler;

pub use gzip_handler::GzipProcessor;
pub use sevenz_handler::SevenZipProcessor;
pub use tar_handler::{TarCodec, TarProcessor};
pub use zip_handler::ZipProcessor;

use crate::config::CompressionSettings;
use crate::models::{ArchiveType, OperationContext, PackRequest};
use crate::utils::error::{BokslDirError, Result};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// 압축/해제 기능 집합
pub trait ArchiveProcessor: Send + Sync {
    fn archive_type(&self) -> ArchiveType;

    /// `request.output_file`에 새 아카이브 생성
    fn pack(&self, request: &PackRequest, ctx: &OperationContext) -> Result<()>;

    /// 아카이브 전체를 `output_directory`에 해제 (없으면 생성)
    fn extract(
        &self,
        archive_path: &Path,
        output_directory: &Path,
        ctx: &OperationContext,
    ) -> Result<()>;
}

pub fn processor_for(
    archive_type: ArchiveType,
    compression: &CompressionSettings,
) -> Box<dyn ArchiveProcessor> {
    match archive_type {
        ArchiveType::Tar => Box::new(TarProcessor::new(TarCodec::Plain, 0)),
        ArchiveType::TarGz => Box::new(TarProcessor::new(TarCodec::Gzip, compression.gzip_level)),
        ArchiveType::TarBz2 => {
            Box::new(TarProcessor::new(TarCodec::Bzip2, compression.bzip2_level))
        }
        ArchiveType::TarXz => Box::new(TarProcessor::new(TarCodec::Xz, compression.xz_level)),
        ArchiveType::TarLz => Box::new(TarProcessor::new(TarCodec::Lzip, compression.xz_level)),
        ArchiveType::Zip => Box::new(ZipProcessor::new(compression.zip_level)),
        ArchiveType::SevenZip => Box::new(SevenZipProcessor::new()),
        ArchiveType::GZip => Box::new(GzipProcessor::new(compression.gzip_level)),
    }
}

/// 압축 대상 항목
#[derive(Debug, Clone)]
pub(crate) struct PackEntry {
    pub source_path: PathBuf,
    /// 아카이브 내부 경로 (`/` 구분)
    pub archive_name: String,
    pub is_dir: bool,
    pub size: u64,
}

/// 출력 파일을 만들기 전에 입력을 모두 수집한다 (출력 파일이 입력 디렉토리 안에 있어도 포함되지 않음)
pub(crate) fn collect_pack_entries(request: &PackRequest) -> Result<Vec<PackEntry>> {
    let base = &request.source_directory;
    let mut entries = Vec::new();

    for file in &request.files {
        let metadata = fs::metadata(file).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => BokslDirError::PathNotFound { path: file.clone() },
            _ => BokslDirError::Io(e),
        })?;
        entries.push(PackEntry {
            source_path: file.clone(),
            archive_name: entry_name(base, file)?,
            is_dir: false,
            size: metadata.len(),
        });
    }

    for directory in &request.directories {
        if !directory.is_dir() {
            return Err(BokslDirError::NotADirectory {
                path: directory.clone(),
            });
        }
        let walker = WalkDir::new(directory)
            .follow_links(false)
            .sort_by_file_name();
        for entry in walker {
            let entry = entry.map_err(io::Error::from)?;
            let path = entry.path();
            let archive_name = entry_name(base, path)?;
            if archive_name.is_empty() {
                continue;
            }

            if entry.file_type().is_dir() {
                entries.push(PackEntry {
                    source_path: path.to_path_buf(),
                    archive_name,
                    is_dir: true,
                    size: 0,
                });
            } else if path.is_file() {
                let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
                entries.push(PackEntry {
                    source_path: path.to_path_buf(),
                    archive_name,
                    is_dir: false,
                    size,
                });
            } else {
                debug!("Skipping non-regular entry: {:?}", path);
            }
        }
    }

    Ok(entries)
}

/// 기준 디렉토리에 대한 아카이브 엔트리 이름
fn entry_name(base: &Path, path: &Path) -> Result<String> {
    let relative = if base == Path::new(".") && path.is_relative() {
        Some(path.strip_prefix(".").unwrap_or(path))
    } else {
        path.strip_prefix(base).ok()
    };

    let Some(relative) = relative else {
        return Err(BokslDirError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "{} is not inside source directory {}",
                path.display(),
                base.display()
            ),
        )));
    };
    Ok(archive_display_path(relative))
}

pub(crate) fn archive_display_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(v) => Some(v.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// 새 출력 파일 생성. 이미 있으면 덮어쓰지 않는다.
pub(crate) fn create_output_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => BokslDirError::FileExists {
                path: path.to_path_buf(),
            },
            _ => BokslDirError::from_write(path, e),
        })
}

pub(crate) fn open_archive(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => BokslDirError::PathNotFound {
            path: path.to_path_buf(),
        },
        _ => BokslDirError::from_write(path, e),
    })
}

pub(crate) fn prepare_output_directory(path: &Path) -> Result<()> {
    if path.exists() && !path.is_dir() {
        return Err(BokslDirError::NotADirectory {
            path: path.to_path_buf(),
        });
    }
    fs::create_dir_all(path).map_err(|e| BokslDirError::from_write(path, e))
}

pub(crate) fn unsafe_entry(archive_path: &Path, name: &str) -> BokslDirError {
    BokslDirError::ArchiveFormat {
        path: archive_path.to_path_buf(),
        reason: format!("{}: blocked unsafe path", name),
    }
}

/// 해제 대상 경로가 출력 디렉토리를 벗어나지 않는지 확인
pub(crate) fn sanitize_extract_path(dest_root: &Path, raw_path: &Path) -> Option<PathBuf> {
    let mut clean = PathBuf::new();
    for comp in raw_path.components() {
        match comp {
            Component::Normal(v) => clean.push(v),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    let out = dest_root.join(clean);
    if out.starts_with(dest_root) {
        Some(out)
    } else {
        None
    }
}
