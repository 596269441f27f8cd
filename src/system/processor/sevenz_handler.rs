use super::{
    collect_pack_entries, create_output_file, open_archive, prepare_output_directory,
    sanitize_extract_path, unsafe_entry, ArchiveProcessor,
};
use crate::models::{ArchiveType, OperationContext, PackRequest};
use crate::utils::error::{BokslDirError, Result};
use sevenz_rust2::{SevenZArchiveEntry, SevenZWriter};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

/// `.7z` (LZMA2)
#[derive(Debug, Clone, Copy, Default)]
pub struct SevenZipProcessor;

impl SevenZipProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl ArchiveProcessor for SevenZipProcessor {
    fn archive_type(&self) -> ArchiveType {
        ArchiveType::SevenZip
    }

    fn pack(&self, request: &PackRequest, ctx: &OperationContext) -> Result<()> {
        let entries = collect_pack_entries(request)?;
        ctx.check_cancelled()?;

        let output = request.output_file.as_path();
        let create_failed = |reason: String| BokslDirError::ArchiveCreateFailed {
            path: output.to_path_buf(),
            reason,
        };

        let mut writer = SevenZWriter::new(create_output_file(output)?)
            .map_err(|e| create_failed(e.to_string()))?;

        for entry in &entries {
            ctx.check_cancelled()?;

            let archive_entry =
                SevenZArchiveEntry::from_path(&entry.source_path, entry.archive_name.clone());
            if entry.is_dir {
                writer
                    .push_archive_entry::<&[u8]>(archive_entry, None)
                    .map_err(|e| create_failed(format!("{}: {}", entry.archive_name, e)))?;
            } else {
                let src = File::open(&entry.source_path)
                    .map_err(|e| create_failed(format!("{}: {}", entry.archive_name, e)))?;
                writer
                    .push_archive_entry(archive_entry, Some(src))
                    .map_err(|e| create_failed(format!("{}: {}", entry.archive_name, e)))?;
            }

            debug!("7z: packed {}", entry.archive_name);
            ctx.entry_completed(&entry.archive_name, entry.size);
        }

        writer.finish().map_err(|e| create_failed(e.to_string()))?;
        Ok(())
    }

    fn extract(
        &self,
        archive_path: &Path,
        output_directory: &Path,
        ctx: &OperationContext,
    ) -> Result<()> {
        let file = open_archive(archive_path)?;
        prepare_output_directory(output_directory)?;

        // 콜백 안의 오류는 여기에 담고 Ok(false)로 해제를 중단한다
        let mut failure: Option<BokslDirError> = None;
        let mut extract_fn = |entry: &SevenZArchiveEntry,
                              reader: &mut dyn Read,
                              _output_path: &PathBuf|
         -> std::result::Result<bool, sevenz_rust2::Error> {
            match extract_entry(entry, reader, archive_path, output_directory, ctx) {
                Ok(()) => Ok(true),
                Err(e) => {
                    failure = Some(e);
                    Ok(false)
                }
            }
        };

        let result =
            sevenz_rust2::decompress_with_extract_fn(file, output_directory, &mut extract_fn);

        if let Some(error) = failure {
            return Err(error);
        }
        result.map_err(|e| BokslDirError::ArchiveFormat {
            path: archive_path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

fn extract_entry(
    entry: &SevenZArchiveEntry,
    reader: &mut dyn Read,
    archive_path: &Path,
    output_directory: &Path,
    ctx: &OperationContext,
) -> Result<()> {
    ctx.check_cancelled()?;

    let name = entry.name.clone();
    let Some(dest_path) = sanitize_extract_path(output_directory, Path::new(&name)) else {
        return Err(unsafe_entry(archive_path, &name));
    };

    if entry.is_directory {
        fs::create_dir_all(&dest_path).map_err(|e| BokslDirError::from_write(&dest_path, e))?;
    } else {
        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent).map_err(|e| BokslDirError::from_write(parent, e))?;
        }
        let mut out =
            File::create(&dest_path).map_err(|e| BokslDirError::from_write(&dest_path, e))?;
        io::copy(reader, &mut out).map_err(|e| BokslDirError::from_archive_read(archive_path, e))?;
    }

    debug!("7z: extracted {}", name);
    ctx.entry_completed(&name, entry.size);
    Ok(())
}
