//! Local zip extraction for folder downloads.

use crate::error::ArchiveError;
use log::info;
use std::path::{Path, PathBuf};

/// Directory a downloaded zip is unpacked into: the zip's parent, plus the
/// optional `folder` below it.
pub fn extraction_dir(zip_dest: &Path, folder: Option<&str>) -> PathBuf {
    let parent = zip_dest
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    match folder.map(|f| f.trim_matches('/')).filter(|f| !f.is_empty()) {
        Some(f) => parent.join(f),
        None => parent,
    }
}

/// Extract every entry of `zip_path` into `target`. Returns the entry count.
///
/// Entry names that would escape `target` are rejected by the zip reader.
pub fn extract_zip_blocking(zip_path: &Path, target: &Path) -> Result<usize, ArchiveError> {
    let open_err = |source| ArchiveError::Open {
        path: zip_path.to_path_buf(),
        source,
    };
    let file = std::fs::File::open(zip_path).map_err(|e| open_err(zip::result::ZipError::Io(e)))?;
    let mut archive = zip::ZipArchive::new(std::io::BufReader::new(file)).map_err(open_err)?;

    let extract_err = |source| ArchiveError::Extract {
        path: zip_path.to_path_buf(),
        target: target.to_path_buf(),
        source,
    };
    std::fs::create_dir_all(target).map_err(|e| extract_err(zip::result::ZipError::Io(e)))?;
    archive.extract(target).map_err(extract_err)?;

    let entries = archive.len();
    info!(
        "Extracted {} entries from {} into {}",
        entries,
        zip_path.display(),
        target.display()
    );
    Ok(entries)
}

/// Async wrapper running the extraction on the blocking pool.
pub async fn extract_zip(zip_path: &Path, target: &Path) -> Result<usize, ArchiveError> {
    let zip_path = zip_path.to_path_buf();
    let target = target.to_path_buf();
    tokio::task::spawn_blocking(move || extract_zip_blocking(&zip_path, &target))
        .await
        .map_err(|e| ArchiveError::Join(e.to_string()))?
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::io::Write;

    /// Build an in-memory zip with the given `(name, contents)` entries.
    pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }
}
