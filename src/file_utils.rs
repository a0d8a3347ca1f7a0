use anyhow::{Result, Context};
use std::fs;
use std::path::{Path, PathBuf};
use log::warn;

// @module: File and directory utilities

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

    // @generates: Sibling path with the prefix prepended to the file name
    // @returns: None when the path has no file name
    pub fn prefixed_path<P: AsRef<Path>>(input: P, prefix: &str) -> Option<PathBuf> {
        let input = input.as_ref();
        let file_name = input.file_name()?;

        let mut output_name = prefix.to_string();
        output_name.push_str(&file_name.to_string_lossy());

        Some(match input.parent() {
            Some(parent) => parent.join(output_name),
            None => PathBuf::from(output_name),
        })
    }

    /// Read a file to a string
    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
        fs::read_to_string(&path)
            .with_context(|| format!("Failed to read file: {:?}", path.as_ref()))
    }

    /// Write a string to a file
    pub fn write_to_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        // Ensure the parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            Self::ensure_dir(parent)?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write to file: {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Delete a leftover output after a failed run. Missing files are fine.
    pub fn remove_partial<P: AsRef<Path>>(path: P) {
        let path = path.as_ref();
        if path.exists() {
            if let Err(e) = fs::remove_file(path) {
                warn!("Could not remove partial output {:?}: {}", path, e);
            }
        }
    }
}
