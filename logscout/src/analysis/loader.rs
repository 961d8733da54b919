use memmap2::Mmap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{trace, warn};

use crate::config::EncodingMode;
use crate::errors::{AnalysisError, AnalysisResult};

const BUFFER_CAPACITY: usize = 65536;
pub(crate) const SMALL_FILE_THRESHOLD: u64 = 32 * 1024; // 32KB
pub(crate) const LARGE_FILE_THRESHOLD: u64 = 10 * 1024 * 1024; // 10MB

/// Decodes bytes into a String according to the encoding mode
fn decode_bytes(bytes: &[u8], path: &Path, encoding_mode: EncodingMode) -> AnalysisResult<String> {
    match encoding_mode {
        EncodingMode::FailFast => String::from_utf8(bytes.to_vec())
            .map_err(|e| AnalysisError::encoding_error(path, e)),
        EncodingMode::Lossy => {
            let cow = String::from_utf8_lossy(bytes);
            if let std::borrow::Cow::Owned(_) = cow {
                warn!("Invalid UTF-8 replaced in file: {}", path.display());
            }
            Ok(cow.into_owned())
        }
    }
}

/// Reads a whole file as text, choosing a read strategy by size
pub fn read_text(path: &Path, encoding_mode: EncodingMode) -> AnalysisResult<String> {
    let file = File::open(path).map_err(|e| AnalysisError::from_io(path, e))?;
    let size = file.metadata().map_err(AnalysisError::IoError)?.len();

    if size < SMALL_FILE_THRESHOLD {
        trace!("Reading small file in one call: {}", path.display());
        let mut file = file;
        let mut bytes = Vec::with_capacity(size as usize);
        file.read_to_end(&mut bytes).map_err(AnalysisError::IoError)?;
        decode_bytes(&bytes, path, encoding_mode)
    } else if size < LARGE_FILE_THRESHOLD {
        trace!("Reading buffered file: {}", path.display());
        let mut reader = BufReader::with_capacity(BUFFER_CAPACITY, file);
        let mut bytes = Vec::with_capacity(size as usize);
        reader
            .read_to_end(&mut bytes)
            .map_err(AnalysisError::IoError)?;
        decode_bytes(&bytes, path, encoding_mode)
    } else {
        trace!("Memory mapping large file: {}", path.display());
        let mmap = unsafe { Mmap::map(&file) }.map_err(AnalysisError::IoError)?;
        decode_bytes(&mmap, path, encoding_mode)
    }
}

/// Reads a file as an ordered sequence of lines
pub fn read_lines(path: &Path, encoding_mode: EncodingMode) -> AnalysisResult<Vec<String>> {
    let text = read_text(path, encoding_mode)?;
    Ok(text.lines().map(str::to_owned).collect())
}

/// Lists the regular files directly inside `dir`, sorted by path.
///
/// Symlinks are followed; subdirectories are not descended into. Failing to
/// open the directory is [`AnalysisError::DirectoryUnavailable`]; an entry that
/// cannot be inspected is skipped.
pub fn list_regular_files(dir: &Path) -> AnalysisResult<Vec<PathBuf>> {
    let entries =
        std::fs::read_dir(dir).map_err(|e| AnalysisError::directory_unavailable(dir, e))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.path()),
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                None
            }
        })
        .filter(|path| path.is_file())
        .collect();

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_read_text_strategies() {
        let dir = tempdir().unwrap();

        let small = dir.path().join("small.log");
        fs::write(&small, "one error\n").unwrap();
        assert_eq!(
            read_text(&small, EncodingMode::FailFast).unwrap(),
            "one error\n"
        );

        let medium = dir.path().join("medium.log");
        let content = "medium line with error\n".repeat(4000);
        fs::write(&medium, &content).unwrap();
        assert_eq!(read_text(&medium, EncodingMode::FailFast).unwrap(), content);
    }

    #[test]
    fn test_invalid_utf8_handling() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("binary.log");
        fs::write(&path, [b'o', b'k', 0xFF, 0xFE, b'\n']).unwrap();

        assert!(matches!(
            read_text(&path, EncodingMode::FailFast),
            Err(AnalysisError::EncodingError { .. })
        ));

        let lossy = read_text(&path, EncodingMode::Lossy).unwrap();
        assert!(lossy.starts_with("ok"));
        assert!(lossy.contains('\u{FFFD}'));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let result = read_text(&dir.path().join("absent.log"), EncodingMode::FailFast);
        assert!(matches!(result, Err(AnalysisError::FileNotFound(_))));
    }

    #[test]
    fn test_read_lines_keeps_empty_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lines.log");
        fs::write(&path, "a b\n\nc\n").unwrap();
        assert_eq!(
            read_lines(&path, EncodingMode::FailFast).unwrap(),
            vec!["a b", "", "c"]
        );
    }

    #[test]
    fn test_list_regular_files_is_flat() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.log"), "b").unwrap();
        fs::write(dir.path().join("a.log"), "a").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.log"), "c").unwrap();

        let files = list_regular_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.log", "b.log"]);
    }

    #[test]
    fn test_list_missing_directory() {
        let dir = tempdir().unwrap();
        let result = list_regular_files(&dir.path().join("nope"));
        assert!(matches!(
            result,
            Err(AnalysisError::DirectoryUnavailable { .. })
        ));
    }
}
