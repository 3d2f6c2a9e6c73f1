use anyhow::{Context, Result, anyhow};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

// @module: File and directory utilities

/// Prefix of session state files
pub const STATE_FILE_PREFIX: &str = ".loc-";

/// Extension of session state files
pub const STATE_FILE_EXTENSION: &str = "json";

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_file()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.as_os_str().is_empty() && !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(())
    }

    // @generates: Default output path `<dir>/<target>_<stem>.<ext>`
    pub fn generate_output_path<P: AsRef<Path>>(input_file: P, target_language: &str) -> PathBuf {
        let input_file = input_file.as_ref();
        let stem = input_file.file_stem().unwrap_or_default().to_string_lossy();

        let mut output_filename = format!("{}_{}", target_language, stem);
        if let Some(ext) = input_file.extension() {
            output_filename.push('.');
            output_filename.push_str(&ext.to_string_lossy());
        }

        input_file.with_file_name(output_filename)
    }

    // @generates: Session state path `<dir>/.loc-<id>.json`
    pub fn state_file_path<P: AsRef<Path>>(input_file: P, session_id: &str) -> PathBuf {
        input_file.as_ref().with_file_name(format!(
            "{}{}.{}",
            STATE_FILE_PREFIX, session_id, STATE_FILE_EXTENSION
        ))
    }

    /// Whether `path` looks like a session state file
    pub fn is_state_file<P: AsRef<Path>>(path: P) -> bool {
        let path = path.as_ref();
        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        name.starts_with(STATE_FILE_PREFIX)
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(STATE_FILE_EXTENSION))
    }

    /// Find session state files under a directory
    pub fn find_state_files<P: AsRef<Path>>(dir: P, recursive: bool) -> Result<Vec<PathBuf>> {
        let mut result = Vec::new();
        let walker = WalkDir::new(dir.as_ref()).follow_links(true);
        let walker = if recursive { walker } else { walker.max_depth(1) };

        for entry in walker {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();
            if path.is_file() && Self::is_state_file(path) {
                result.push(path.to_path_buf());
            }
        }

        result.sort();
        Ok(result)
    }

    /// Read a file to a string
    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("Failed to read file: {:?}", path))?;
        let mut content = String::from_utf8(bytes)
            .map_err(|_| anyhow!("File is not valid UTF-8: {:?}", path))?;
        if content.starts_with('\u{feff}') {
            content.remove(0);
        }
        Ok(content)
    }

    /// Write a string to a file atomically.
    ///
    /// Content goes to a temporary file in the destination directory which
    /// then replaces the target, so readers never see a partial file.
    pub fn write_atomic<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        let path = path.as_ref();
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self::ensure_dir(&parent)?;

        let mut temp = NamedTempFile::new_in(&parent)
            .with_context(|| format!("Failed to create temporary file in {:?}", parent))?;
        temp.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write temporary file for {:?}", path))?;
        temp.as_file()
            .sync_all()
            .with_context(|| format!("Failed to flush temporary file for {:?}", path))?;
        temp.persist(path)
            .map_err(|e| anyhow!("Failed to replace {:?}: {}", path, e.error))?;

        Ok(())
    }

    /// Hex SHA-256 of a string
    pub fn sha256_hex(content: &str) -> String {
        let digest = Sha256::digest(content.as_bytes());
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }
}
