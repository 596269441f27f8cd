//! 설정 파일
//!
//! `BOKSLDIR_ARCHIVE_CONFIG`가 지정되어 있으면 그 경로를, 아니면
//! `<config_dir>/boksldir/archive.toml`을 읽는다. 파일이 없으면 기본값을 쓴다.

use crate::models::ArchiveType;
use crate::utils::error::{BokslDirError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "BOKSLDIR_ARCHIVE_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub archive: ArchiveSettings,
    pub compression: CompressionSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveSettings {
    /// 형식을 지정하지 않은 압축에 사용
    pub default_type: ArchiveType,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            default_type: ArchiveType::Zip,
        }
    }
}

/// 압축 레벨 (0-9, 범위를 넘으면 프로세서에서 잘라낸다)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionSettings {
    pub zip_level: u32,
    pub gzip_level: u32,
    pub bzip2_level: u32,
    /// `.tar.xz`, `.tar.lz` 공용
    pub xz_level: u32,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            zip_level: 6,
            gzip_level: 6,
            bzip2_level: 9,
            xz_level: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `RUST_LOG`가 없을 때 쓰는 필터
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Settings {
    /// 기본 위치에서 설정 로드
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content)
                .map_err(|e| BokslDirError::Config(format!("{}: {}", path.display(), e))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(BokslDirError::Config(format!("{}: {}", path.display(), e))),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| BokslDirError::Config(e.to_string()))
    }
}

pub fn config_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var(CONFIG_ENV) {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    dirs::config_dir().map(|dir| dir.join("boksldir").join("archive.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_empty_document_uses_defaults() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.archive.default_type, ArchiveType::Zip);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn test_partial_document_keeps_other_defaults() {
        let settings = Settings::from_toml_str(
            r#"
            [archive]
            default_type = "tar.xz"

            [compression]
            xz_level = 9
            "#,
        )
        .unwrap();

        assert_eq!(settings.archive.default_type, ArchiveType::TarXz);
        assert_eq!(settings.compression.xz_level, 9);
        assert_eq!(settings.compression.zip_level, 6);
        assert_eq!(settings.compression.bzip2_level, 9);
    }

    #[test]
    fn test_unknown_archive_type_is_config_error() {
        let err = Settings::from_toml_str("[archive]\ndefault_type = \"rar\"\n").unwrap_err();
        assert!(matches!(err, BokslDirError::Config(_)));
    }

    #[test]
    fn test_load_from_missing_file_gives_defaults() {
        let temp = tempdir().expect("create tempdir");
        let settings = Settings::load_from(&temp.path().join("absent.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_from_malformed_file() {
        let temp = tempdir().expect("create tempdir");
        let path = temp.path().join("archive.toml");
        fs::write(&path, "[compression\nzip_level = ").unwrap();
        assert!(matches!(
            Settings::load_from(&path),
            Err(BokslDirError::Config(_))
        ));
    }

    #[test]
    fn test_settings_serialize_round_trip() {
        let mut settings = Settings::default();
        settings.archive.default_type = ArchiveType::SevenZip;
        settings.logging.level = "debug".to_string();

        let text = toml::to_string_pretty(&settings).unwrap();
        assert!(text.contains("default_type = \"7z\""));
        assert_eq!(Settings::from_toml_str(&text).unwrap(), settings);
    }
}
