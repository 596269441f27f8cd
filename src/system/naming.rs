use crate::system::classifier::archive_suffix;
use crate::system::filesystem::PathService;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const FALLBACK_NAME: &str = "archive";

/// 아카이브 이름에서 확장자를 제거한 이름
///
/// 복합 확장자(`.tar.gz` 등)는 분류기와 같은 규칙으로 한 번에 제거한다.
pub fn derive_output_name(archive_path: &Path) -> String {
    let Some(file_name) = archive_path.file_name().map(OsStr::to_string_lossy) else {
        return FALLBACK_NAME.to_string();
    };

    // 접미사는 ASCII라서 잘라낸 위치가 항상 문자 경계
    if let Some((suffix_len, _)) = archive_suffix(&file_name) {
        let base = &file_name[..file_name.len() - suffix_len];
        if !base.trim().is_empty() {
            return base.to_string();
        }
    }

    archive_path
        .file_stem()
        .map(OsStr::to_string_lossy)
        .filter(|s| !s.trim().is_empty())
        .map_or_else(|| FALLBACK_NAME.to_string(), |s| s.into_owned())
}

/// 충돌 없는 출력 경로 생성
pub struct NameResolutionService {
    paths: Arc<dyn PathService>,
}

impl NameResolutionService {
    pub fn new(paths: Arc<dyn PathService>) -> Self {
        Self { paths }
    }

    /// `부모/확장자 없는 이름`. 이미 존재하면 `이름_(n)` 형태로 비어 있는 경로를 찾는다.
    pub fn full_name_without_extension(&self, archive_path: &Path) -> Option<PathBuf> {
        let parent = self.paths.parent_directory(archive_path)?;
        let name = derive_output_name(archive_path);
        Some(self.next_unique(&parent, &name, None))
    }

    /// 디렉토리 안에서 겹치지 않는 파일 경로 (`stem_(n).ext`)
    pub fn unique_path(&self, directory: &Path, file_name: &str) -> PathBuf {
        let (stem, extension) = match archive_suffix(file_name) {
            Some((suffix_len, _)) => {
                let split = file_name.len() - suffix_len;
                (&file_name[..split], Some(&file_name[split + 1..]))
            }
            None => {
                let path = Path::new(file_name);
                let stem = path
                    .file_stem()
                    .and_then(OsStr::to_str)
                    .filter(|s| !s.is_empty())
                    .unwrap_or(FALLBACK_NAME);
                (stem, path.extension().and_then(OsStr::to_str))
            }
        };
        self.next_unique(directory, stem, extension)
    }

    fn next_unique(&self, directory: &Path, stem: &str, extension: Option<&str>) -> PathBuf {
        let seed = stem.trim();
        let base_name = if seed.is_empty() { FALLBACK_NAME } else { seed };

        let make_name = |index: usize| -> String {
            let base = if index == 0 {
                base_name.to_string()
            } else {
                format!("{}_({})", base_name, index)
            };
            match extension {
                Some(ext) if !ext.is_empty() => format!("{}.{}", base, ext),
                _ => base,
            }
        };

        let mut index = 0usize;
        loop {
            let candidate = directory.join(make_name(index));
            if !self.paths.exists(&candidate) {
                return candidate;
            }
            index += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// 지정한 경로만 존재한다고 답하는 가짜 경로 서비스
    struct FakePaths {
        existing: HashSet<PathBuf>,
    }

    impl FakePaths {
        fn with(existing: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                existing: existing.iter().map(PathBuf::from).collect(),
            })
        }
    }

    impl PathService for FakePaths {
        fn parent_directory(&self, path: &Path) -> Option<PathBuf> {
            path.parent().map(Path::to_path_buf)
        }

        fn exists(&self, path: &Path) -> bool {
            self.existing.contains(path)
        }

        fn is_directory(&self, _path: &Path) -> bool {
            false
        }
    }

    #[test]
    fn test_derive_output_name() {
        assert_eq!(derive_output_name(Path::new("archive.tar.gz")), "archive");
        assert_eq!(derive_output_name(Path::new("archive.zip")), "archive");
        assert_eq!(derive_output_name(Path::new("/a/b/Photos.TAR.BZ2")), "Photos");
        assert_eq!(derive_output_name(Path::new("/a/b/data.tgz")), "data");
        assert_eq!(derive_output_name(Path::new("/a/b/file.7z")), "file");
        assert_eq!(derive_output_name(Path::new("/a/b/notes.txt.gz")), "notes.txt");
        assert_eq!(derive_output_name(Path::new("/a/b/v1.2.tar.xz")), "v1.2");
    }

    #[test]
    fn test_derive_output_name_fallbacks() {
        assert_eq!(derive_output_name(Path::new("/a/b/readme.txt")), "readme");
        assert_eq!(derive_output_name(Path::new("/")), "archive");
        // 접미사뿐인 이름은 분류되지 않으므로 파일 stem을 쓴다
        assert_eq!(derive_output_name(Path::new("/a/b/.tar.gz")), ".tar");
    }

    #[cfg(unix)]
    #[test]
    fn test_derive_output_name_non_utf8() {
        use crate::system::classifier::classify;
        use std::os::unix::ffi::OsStrExt;

        let path = Path::new("/a/b").join(OsStr::from_bytes(b"caf\xe9.zip"));
        assert!(classify(&path).is_some());
        assert_eq!(derive_output_name(&path), "caf\u{FFFD}");
    }

    #[test]
    fn test_full_name_without_extension() {
        let service = NameResolutionService::new(FakePaths::with(&[]));
        assert_eq!(
            service.full_name_without_extension(Path::new("/a/b/file.zip")),
            Some(PathBuf::from("/a/b/file"))
        );
        assert_eq!(
            service.full_name_without_extension(Path::new("/a/b/file.tar.lz")),
            Some(PathBuf::from("/a/b/file"))
        );
    }

    #[test]
    fn test_full_name_without_extension_skips_existing() {
        let service =
            NameResolutionService::new(FakePaths::with(&["/a/b/file", "/a/b/file_(1)"]));
        assert_eq!(
            service.full_name_without_extension(Path::new("/a/b/file.zip")),
            Some(PathBuf::from("/a/b/file_(2)"))
        );
    }

    #[test]
    fn test_full_name_without_extension_without_parent() {
        let service = NameResolutionService::new(FakePaths::with(&[]));
        assert_eq!(service.full_name_without_extension(Path::new("/")), None);
    }

    #[test]
    fn test_unique_path_keeps_compound_extension() {
        let service = NameResolutionService::new(FakePaths::with(&["/out/photos.tar.gz"]));
        assert_eq!(
            service.unique_path(Path::new("/out"), "photos.tar.gz"),
            PathBuf::from("/out/photos_(1).tar.gz")
        );
        assert_eq!(
            service.unique_path(Path::new("/out"), "photos.zip"),
            PathBuf::from("/out/photos.zip")
        );
    }
}
