use super::{
    collect_pack_entries, create_output_file, open_archive, prepare_output_directory,
    ArchiveProcessor,
};
use crate::models::{ArchiveType, OperationContext, PackRequest};
use crate::system::naming::derive_output_name;
use crate::utils::error::{BokslDirError, Result};
use flate2::read::MultiGzDecoder;
use flate2::{Compression, GzBuilder};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// 단일 파일 `.gz`
///
/// gzip 스트림은 파일 하나만 담을 수 있으므로 디렉토리는 받지 않는다.
#[derive(Debug, Clone, Copy)]
pub struct GzipProcessor {
    level: u32,
}

impl GzipProcessor {
    pub fn new(level: u32) -> Self {
        Self {
            level: level.min(9),
        }
    }
}

impl ArchiveProcessor for GzipProcessor {
    fn archive_type(&self) -> ArchiveType {
        ArchiveType::GZip
    }

    fn pack(&self, request: &PackRequest, ctx: &OperationContext) -> Result<()> {
        if request.files.len() != 1 || !request.directories.is_empty() {
            return Err(BokslDirError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "gzip packs exactly one file (got {} files, {} directories)",
                    request.files.len(),
                    request.directories.len()
                ),
            )));
        }

        let entries = collect_pack_entries(request)?;
        ctx.check_cancelled()?;
        let output = request.output_file.as_path();

        for entry in &entries {
            let mut src = File::open(&entry.source_path).map_err(|e| {
                BokslDirError::ArchiveCreateFailed {
                    path: output.to_path_buf(),
                    reason: format!("{}: {}", entry.archive_name, e),
                }
            })?;

            let writer = BufWriter::new(create_output_file(output)?);
            let mut encoder = GzBuilder::new()
                .filename(entry.archive_name.as_bytes())
                .write(writer, Compression::new(self.level));
            io::copy(&mut src, &mut encoder).map_err(|e| BokslDirError::from_write(output, e))?;
            encoder
                .finish()
                .and_then(|mut w| w.flush())
                .map_err(|e| BokslDirError::from_write(output, e))?;

            debug!("gzip: packed {}", entry.archive_name);
            ctx.entry_completed(&entry.archive_name, entry.size);
        }
        Ok(())
    }

    fn extract(
        &self,
        archive_path: &Path,
        output_directory: &Path,
        ctx: &OperationContext,
    ) -> Result<()> {
        let reader = BufReader::new(open_archive(archive_path)?);
        prepare_output_directory(output_directory)?;
        ctx.check_cancelled()?;

        let name = derive_output_name(archive_path);
        let dest_path = output_directory.join(&name);
        let mut decoder = MultiGzDecoder::new(reader);
        let mut out =
            File::create(&dest_path).map_err(|e| BokslDirError::from_write(&dest_path, e))?;
        let written = io::copy(&mut decoder, &mut out)
            .map_err(|e| BokslDirError::from_archive_read(archive_path, e))?;

        debug!("gzip: extracted {}", name);
        ctx.entry_completed(&name, written);
        Ok(())
    }
}
