use super::{
    collect_pack_entries, create_output_file, open_archive, prepare_output_directory,
    sanitize_extract_path, unsafe_entry, ArchiveProcessor,
};
use crate::models::{ArchiveType, OperationContext, PackRequest};
use crate::utils::error::{BokslDirError, Result};
use std::fs::{self, File};
use std::io;
use std::path::Path;
use tracing::debug;
use zip::result::ZipError;
use zip::write::SimpleFileOptions as ZipFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// `.zip` (Deflate)
#[derive(Debug, Clone, Copy)]
pub struct ZipProcessor {
    level: i64,
}

impl ZipProcessor {
    pub fn new(level: u32) -> Self {
        Self {
            level: i64::from(level.min(9)),
        }
    }
}

impl ArchiveProcessor for ZipProcessor {
    fn archive_type(&self) -> ArchiveType {
        ArchiveType::Zip
    }

    fn pack(&self, request: &PackRequest, ctx: &OperationContext) -> Result<()> {
        let entries = collect_pack_entries(request)?;
        ctx.check_cancelled()?;

        let output = request.output_file.as_path();
        let mut writer = ZipWriter::new(create_output_file(output)?);
        let options = ZipFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(self.level));

        for entry in &entries {
            ctx.check_cancelled()?;

            if entry.is_dir {
                writer
                    .add_directory(entry.archive_name.clone(), options)
                    .map_err(|e| map_zip_write_error(output, &entry.archive_name, e))?;
            } else {
                writer
                    .start_file(entry.archive_name.clone(), options)
                    .map_err(|e| map_zip_write_error(output, &entry.archive_name, e))?;
                let mut src = File::open(&entry.source_path).map_err(|e| {
                    BokslDirError::ArchiveCreateFailed {
                        path: output.to_path_buf(),
                        reason: format!("{}: {}", entry.archive_name, e),
                    }
                })?;
                io::copy(&mut src, &mut writer)
                    .map_err(|e| BokslDirError::from_write(output, e))?;
            }

            debug!("zip: packed {}", entry.archive_name);
            ctx.entry_completed(&entry.archive_name, entry.size);
        }

        writer
            .finish()
            .map_err(|e| map_zip_write_error(output, "central directory", e))?;
        Ok(())
    }

    fn extract(
        &self,
        archive_path: &Path,
        output_directory: &Path,
        ctx: &OperationContext,
    ) -> Result<()> {
        let file = open_archive(archive_path)?;
        let mut archive =
            ZipArchive::new(file).map_err(|e| map_zip_read_error(archive_path, e))?;
        prepare_output_directory(output_directory)?;

        for idx in 0..archive.len() {
            ctx.check_cancelled()?;

            let mut entry = archive
                .by_index(idx)
                .map_err(|e| map_zip_read_error(archive_path, e))?;
            let name = entry.name().to_string();
            let Some(dest_path) = sanitize_extract_path(output_directory, Path::new(&name))
            else {
                return Err(unsafe_entry(archive_path, &name));
            };

            if entry.is_dir() {
                fs::create_dir_all(&dest_path)
                    .map_err(|e| BokslDirError::from_write(&dest_path, e))?;
            } else {
                if let Some(parent) = dest_path.parent() {
                    fs::create_dir_all(parent)
                        .map_err(|e| BokslDirError::from_write(parent, e))?;
                }
                let mut out = File::create(&dest_path)
                    .map_err(|e| BokslDirError::from_write(&dest_path, e))?;
                io::copy(&mut entry, &mut out)
                    .map_err(|e| BokslDirError::from_archive_read(archive_path, e))?;
            }

            debug!("zip: extracted {}", name);
            ctx.entry_completed(&name, entry.size());
        }
        Ok(())
    }
}

fn map_zip_read_error(path: &Path, error: ZipError) -> BokslDirError {
    match error {
        ZipError::Io(e) => BokslDirError::from_archive_read(path, e),
        other => BokslDirError::ArchiveFormat {
            path: path.to_path_buf(),
            reason: other.to_string(),
        },
    }
}

fn map_zip_write_error(path: &Path, entry_name: &str, error: ZipError) -> BokslDirError {
    match error {
        ZipError::Io(e) => BokslDirError::from_write(path, e),
        other => BokslDirError::ArchiveCreateFailed {
            path: path.to_path_buf(),
            reason: format!("{}: {}", entry_name, other),
        },
    }
}
