//! 아카이브 포맷 구분자

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 지원하는 아카이브 포맷
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArchiveType {
    #[serde(rename = "tar")]
    Tar,
    #[serde(rename = "zip")]
    Zip,
    #[serde(rename = "7z")]
    SevenZip,
    #[serde(rename = "gz")]
    GZip,
    #[serde(rename = "tar.bz2")]
    TarBz2,
    #[serde(rename = "tar.gz")]
    TarGz,
    #[serde(rename = "tar.lz")]
    TarLz,
    #[serde(rename = "tar.xz")]
    TarXz,
}

impl ArchiveType {
    pub const ALL: [ArchiveType; 8] = [
        ArchiveType::Tar,
        ArchiveType::Zip,
        ArchiveType::SevenZip,
        ArchiveType::GZip,
        ArchiveType::TarBz2,
        ArchiveType::TarGz,
        ArchiveType::TarLz,
        ArchiveType::TarXz,
    ];

    /// 표시 이름 (설정/CLI 에서 쓰는 이름과 동일)
    pub fn display_name(&self) -> &'static str {
        match self {
            ArchiveType::Tar => "tar",
            ArchiveType::Zip => "zip",
            ArchiveType::SevenZip => "7z",
            ArchiveType::GZip => "gz",
            ArchiveType::TarBz2 => "tar.bz2",
            ArchiveType::TarGz => "tar.gz",
            ArchiveType::TarLz => "tar.lz",
            ArchiveType::TarXz => "tar.xz",
        }
    }

    /// 새 아카이브 생성 시 붙이는 확장자 (점 제외)
    pub fn extension(&self) -> &'static str {
        self.display_name()
    }

    /// 여러 파일/디렉토리를 담을 수 있는지 여부
    pub fn supports_multiple_entries(&self) -> bool {
        !matches!(self, ArchiveType::GZip)
    }
}

impl fmt::Display for ArchiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ArchiveType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().trim_start_matches('.').to_ascii_lowercase();
        ArchiveType::ALL
            .into_iter()
            .find(|t| t.display_name() == normalized)
            .ok_or_else(|| {
                let names: Vec<_> = ArchiveType::ALL.iter().map(|t| t.display_name()).collect();
                format!(
                    "unknown archive type '{}' (expected one of: {})",
                    s,
                    names.join(", ")
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_are_unique() {
        let mut names: Vec<_> = ArchiveType::ALL.iter().map(|t| t.display_name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ArchiveType::ALL.len());
    }

    #[test]
    fn test_from_str_accepts_dotted_and_uppercase() {
        assert_eq!("zip".parse::<ArchiveType>(), Ok(ArchiveType::Zip));
        assert_eq!(".TAR.GZ".parse::<ArchiveType>(), Ok(ArchiveType::TarGz));
        assert_eq!("7z".parse::<ArchiveType>(), Ok(ArchiveType::SevenZip));
        assert!("rar".parse::<ArchiveType>().is_err());
    }

    #[test]
    fn test_only_gzip_is_single_entry() {
        assert!(!ArchiveType::GZip.supports_multiple_entries());
        assert!(ArchiveType::TarGz.supports_multiple_entries());
    }
}
