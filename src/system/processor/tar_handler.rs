use super::lzip::{LzipDecoder, LzipEncoder};
use super::{
    archive_display_path, collect_pack_entries, create_output_file, open_archive,
    prepare_output_directory, sanitize_extract_path, unsafe_entry, ArchiveProcessor, PackEntry,
};
use crate::models::{ArchiveType, OperationContext, PackRequest};
use crate::utils::error::{BokslDirError, Result};
use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use tar::{Archive as TarArchive, Builder as TarBuilder};
use tracing::debug;
use xz2::read::XzDecoder;
use xz2::write::XzEncoder;

/// tar 스트림을 감싸는 압축 코덱
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TarCodec {
    Plain,
    Gzip,
    Bzip2,
    Xz,
    Lzip,
}

/// tar 계열 프로세서 (`.tar`, `.tar.gz`, `.tar.bz2`, `.tar.xz`, `.tar.lz`)
#[derive(Debug, Clone, Copy)]
pub struct TarProcessor {
    codec: TarCodec,
    level: u32,
}

impl TarProcessor {
    pub fn new(codec: TarCodec, level: u32) -> Self {
        Self {
            codec,
            level: level.min(9),
        }
    }
}

impl ArchiveProcessor for TarProcessor {
    fn archive_type(&self) -> ArchiveType {
        match self.codec {
            TarCodec::Plain => ArchiveType::Tar,
            TarCodec::Gzip => ArchiveType::TarGz,
            TarCodec::Bzip2 => ArchiveType::TarBz2,
            TarCodec::Xz => ArchiveType::TarXz,
            TarCodec::Lzip => ArchiveType::TarLz,
        }
    }

    fn pack(&self, request: &PackRequest, ctx: &OperationContext) -> Result<()> {
        let entries = collect_pack_entries(request)?;
        ctx.check_cancelled()?;

        let output = request.output_file.as_path();
        let writer = BufWriter::new(create_output_file(output)?);
        let finish_err = |e: io::Error| BokslDirError::from_write(output, e);

        let mut writer = match self.codec {
            TarCodec::Plain => write_tar(writer, &entries, output, ctx)?,
            TarCodec::Gzip => {
                let encoder = GzEncoder::new(writer, Compression::new(self.level));
                write_tar(encoder, &entries, output, ctx)?
                    .finish()
                    .map_err(finish_err)?
            }
            TarCodec::Bzip2 => {
                // bzip2는 1-9만 허용
                let level = bzip2::Compression::new(self.level.max(1));
                let encoder = BzEncoder::new(writer, level);
                write_tar(encoder, &entries, output, ctx)?
                    .finish()
                    .map_err(finish_err)?
            }
            TarCodec::Xz => {
                let encoder = XzEncoder::new(writer, self.level);
                write_tar(encoder, &entries, output, ctx)?
                    .finish()
                    .map_err(finish_err)?
            }
            TarCodec::Lzip => {
                let encoder = LzipEncoder::new(writer, self.level).map_err(finish_err)?;
                write_tar(encoder, &entries, output, ctx)?
                    .finish()
                    .map_err(finish_err)?
            }
        };
        writer.flush().map_err(finish_err)?;
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

        match self.codec {
            TarCodec::Plain => unpack_all(reader, archive_path, output_directory, ctx),
            TarCodec::Gzip => unpack_all(
                MultiGzDecoder::new(reader),
                archive_path,
                output_directory,
                ctx,
            ),
            TarCodec::Bzip2 => unpack_all(
                BzDecoder::new(reader),
                archive_path,
                output_directory,
                ctx,
            ),
            TarCodec::Xz => unpack_all(
                XzDecoder::new(reader),
                archive_path,
                output_directory,
                ctx,
            ),
            TarCodec::Lzip => {
                let decoder = LzipDecoder::new(reader)
                    .map_err(|e| BokslDirError::from_archive_read(archive_path, e))?;
                unpack_all(decoder, archive_path, output_directory, ctx)
            }
        }
    }
}

/// 엔트리를 모두 추가하고 tar 종료 블록까지 기록한 뒤 내부 writer 반환
fn write_tar<W: Write>(
    writer: W,
    entries: &[PackEntry],
    output: &Path,
    ctx: &OperationContext,
) -> Result<W> {
    let mut builder = TarBuilder::new(writer);
    for entry in entries {
        ctx.check_cancelled()?;

        let result = if entry.is_dir {
            builder.append_dir(&entry.archive_name, &entry.source_path)
        } else {
            builder.append_path_with_name(&entry.source_path, &entry.archive_name)
        };
        result.map_err(|e| BokslDirError::ArchiveCreateFailed {
            path: output.to_path_buf(),
            reason: format!("{}: {}", entry.archive_name, e),
        })?;

        debug!("tar: packed {}", entry.archive_name);
        ctx.entry_completed(&entry.archive_name, entry.size);
    }
    builder
        .into_inner()
        .map_err(|e| BokslDirError::from_write(output, e))
}

fn unpack_all<R: Read>(
    reader: R,
    archive_path: &Path,
    output_directory: &Path,
    ctx: &OperationContext,
) -> Result<()> {
    let mut archive = TarArchive::new(reader);
    archive.set_overwrite(true);
    archive.set_preserve_permissions(false);

    let entries = archive
        .entries()
        .map_err(|e| read_error(archive_path, e))?;
    for entry in entries {
        ctx.check_cancelled()?;

        let mut entry = entry.map_err(|e| read_error(archive_path, e))?;
        let raw_path = entry
            .path()
            .map_err(|e| read_error(archive_path, e))?
            .into_owned();
        let raw_name = raw_path.to_string_lossy().to_string();

        // tar는 절대 경로의 루트를 조용히 떼어내므로 먼저 직접 검사한다
        if sanitize_extract_path(output_directory, &raw_path).is_none() {
            return Err(unsafe_entry(archive_path, &raw_name));
        }

        let size = entry.size();
        let unpacked = entry
            .unpack_in(output_directory)
            .map_err(|e| read_error(archive_path, e))?;
        if !unpacked {
            return Err(unsafe_entry(archive_path, &raw_name));
        }

        let name = archive_display_path(&raw_path);
        debug!("tar: extracted {}", name);
        ctx.entry_completed(&name, size);
    }

    // 종료 블록 뒤까지 읽어야 코덱 트레일러(CRC 등)가 검증된다
    let mut rest = archive.into_inner();
    io::copy(&mut rest, &mut io::sink()).map_err(|e| read_error(archive_path, e))?;
    Ok(())
}

/// tar 읽기 오류 분류
///
/// tar 크레이트는 체크섬 불일치 등 헤더 손상을 `ErrorKind::Other`로 보고한다.
fn read_error(archive_path: &Path, error: io::Error) -> BokslDirError {
    if error.kind() == io::ErrorKind::Other {
        BokslDirError::ArchiveFormat {
            path: archive_path.to_path_buf(),
            reason: error.to_string(),
        }
    } else {
        BokslDirError::from_archive_read(archive_path, error)
    }
}
