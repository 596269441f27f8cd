use crate::models::ArchiveType;
use std::path::Path;

/// 인식하는 확장자 목록. 겹치는 경우 가장 긴 접미사가 우선한다.
const ARCHIVE_SUFFIXES: &[(&str, ArchiveType)] = &[
    (".tar.bz2", ArchiveType::TarBz2),
    (".tar.gz", ArchiveType::TarGz),
    (".tar.lz", ArchiveType::TarLz),
    (".tar.xz", ArchiveType::TarXz),
    (".tbz2", ArchiveType::TarBz2),
    (".tbz", ArchiveType::TarBz2),
    (".tgz", ArchiveType::TarGz),
    (".tlz", ArchiveType::TarLz),
    (".txz", ArchiveType::TarXz),
    (".tar", ArchiveType::Tar),
    (".zip", ArchiveType::Zip),
    (".7z", ArchiveType::SevenZip),
    (".gz", ArchiveType::GZip),
];

/// 파일 이름에서 아카이브 접미사를 찾는다.
///
/// 반환값: (접미사 바이트 길이, 포맷). 접미사만으로 된 이름(`.zip`)은 매칭하지 않는다.
pub fn archive_suffix(file_name: &str) -> Option<(usize, ArchiveType)> {
    let lower = file_name.to_ascii_lowercase();
    let (suffix, archive_type) = ARCHIVE_SUFFIXES
        .iter()
        .filter(|(suffix, _)| lower.ends_with(suffix))
        .max_by_key(|(suffix, _)| suffix.len())?;
    // 가장 긴 접미사가 이름 전체라면 내부 확장자로 물러서지 않는다
    if lower.len() == suffix.len() {
        return None;
    }
    Some((suffix.len(), *archive_type))
}

/// 경로의 마지막 세그먼트로 아카이브 포맷 판별
pub fn classify(path: &Path) -> Option<ArchiveType> {
    let name = path.file_name()?.to_string_lossy();
    archive_suffix(&name).map(|(_, archive_type)| archive_type)
}
