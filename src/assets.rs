//! directory assets: a local folder packaged into a zip archive that
//! seeds the initial content of the source repository.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use zip::write::FileOptions;

use crate::error::{Error, Result};

/// what the deployer needs to know to upload an asset, without the bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetManifestEntry {
    pub source_path: String,
    pub hash: String,
    pub object_key: String,
    pub file_count: usize,
}

#[derive(Debug, Clone)]
pub struct PackagedAsset {
    pub manifest: AssetManifestEntry,
    pub archive: Vec<u8>,
}

fn asset_err<P: AsRef<Path>>(path: P, message: String) -> Error {
    Error::Asset { path: path.as_ref().display().to_string(), message }
}

/// collects every file under `start_dir`, depth first, with entries
/// of each directory visited in name order.
fn iter_files_recursively<P: AsRef<Path>>(
    start_dir: P,
    callback: &mut impl FnMut(PathBuf) -> Result<()>,
) -> Result<()> {
    let readdir = std::fs::read_dir(start_dir.as_ref())
        .map_err(|e| asset_err(&start_dir, format!("Failed to read dir\n{e}")))?;
    let mut entries = vec![];
    for entry in readdir {
        let direntry = entry.map_err(|e| asset_err(&start_dir, format!("Failed to get readdir entry\n{e}")))?;
        entries.push(direntry.path());
    }
    entries.sort();
    for path in entries {
        if path.file_name().map(|n| n == ".git").unwrap_or(false) {
            continue;
        }
        if path.is_dir() {
            iter_files_recursively(&path, callback)?;
        } else {
            callback(path)?;
        }
    }
    Ok(())
}

/// archive name of `path` relative to `root`, always `/` separated.
fn archive_name(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root)
        .map_err(|e| asset_err(path, format!("File is outside of asset root\n{e}")))?;
    let parts: Vec<String> = relative.components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    Ok(parts.join("/"))
}

/// zips the directory. Entries are written in a fixed order with a fixed
/// timestamp so the same content always yields the same archive and hash.
pub fn package_directory<P: AsRef<Path>>(dir: P) -> Result<PackagedAsset> {
    let root = dir.as_ref();
    if !root.is_dir() {
        return Err(asset_err(root, "Asset directory does not exist".into()));
    }
    let mut files = vec![];
    iter_files_recursively(root, &mut |p| {
        files.push(p);
        Ok(())
    })?;
    if files.is_empty() {
        return Err(asset_err(root, "Asset directory is empty".into()));
    }

    let options = FileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644);
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for file in files.iter() {
        let name = archive_name(root, file)?;
        let contents = std::fs::read(file)
            .map_err(|e| asset_err(file, format!("Failed to read file\n{e}")))?;
        debug!(file = %name, bytes = contents.len(), "adding file to asset");
        writer.start_file(name, options)
            .map_err(|e| asset_err(file, format!("Failed to add file to archive\n{e}")))?;
        writer.write_all(&contents)?;
    }
    let archive = writer.finish()
        .map_err(|e| asset_err(root, format!("Failed to finish archive\n{e}")))?
        .into_inner();

    let hash = format!("{:08x}", adler::adler32_slice(&archive));
    let manifest = AssetManifestEntry {
        source_path: root.display().to_string(),
        object_key: format!("{hash}.zip"),
        hash,
        file_count: files.len(),
    };
    Ok(PackagedAsset { manifest, archive })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn site_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>hello</h1>").unwrap();
        std::fs::create_dir(dir.path().join("css")).unwrap();
        std::fs::write(dir.path().join("css").join("site.css"), "body {}").unwrap();
        dir
    }

    #[test]
    fn packaging_is_deterministic() {
        let dir = site_dir();
        let a = package_directory(dir.path()).unwrap();
        let b = package_directory(dir.path()).unwrap();
        assert_eq!(a.archive, b.archive);
        assert_eq!(a.manifest, b.manifest);
        assert_eq!(a.manifest.file_count, 2);
        assert_eq!(a.manifest.object_key, format!("{}.zip", a.manifest.hash));
    }

    #[test]
    fn content_change_changes_hash() {
        let dir = site_dir();
        let before = package_directory(dir.path()).unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>changed</h1>").unwrap();
        let after = package_directory(dir.path()).unwrap();
        assert_ne!(before.manifest.hash, after.manifest.hash);
    }

    #[test]
    fn archive_uses_relative_forward_slash_names() {
        let dir = site_dir();
        let packaged = package_directory(dir.path()).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(packaged.archive)).unwrap();
        let names: Vec<String> = archive.file_names().map(|s| s.to_string()).collect();
        assert!(names.contains(&"css/site.css".to_string()));
        assert!(names.contains(&"index.html".to_string()));
        let mut index = String::new();
        archive.by_name("index.html").unwrap().read_to_string(&mut index).unwrap();
        assert_eq!(index, "<h1>hello</h1>");
    }

    #[test]
    fn missing_or_empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = package_directory(dir.path()).unwrap_err();
        assert!(err.to_string().contains("empty"));
        let err = package_directory(dir.path().join("nope")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
