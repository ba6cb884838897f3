//! Output storage: atomic tmp-then-rename writes and JSON records

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Suffix of in-progress files; never a name the catalog hands out
pub const PARTIAL_SUFFIX: &str = ".modpull-partial";

/// Path of the in-progress companion of `path`
/// (`name.ext` → `name.ext.modpull-partial`)
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(PARTIAL_SUFFIX);
    path.with_file_name(name)
}

/// Buffered file writer with atomic tmp→rename.
///
/// The final path only appears once [`finalize`](AtomicFile::finalize)
/// succeeds. Dropping an unfinalized writer removes the tmp file.
pub struct AtomicFile {
    writer: Option<BufWriter<File>>,
    tmp_path: PathBuf,
    final_path: PathBuf,
    written: u64,
}

impl std::fmt::Debug for AtomicFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomicFile")
            .field("final_path", &self.final_path)
            .field("written", &self.written)
            .finish_non_exhaustive()
    }
}

impl AtomicFile {
    /// Start writing `final_path` through its tmp companion
    pub fn create(final_path: &Path) -> io::Result<Self> {
        let tmp_path = tmp_path(final_path);

        // Clean up stale tmp file
        if tmp_path.exists() {
            fs::remove_file(&tmp_path)?;
        }

        let file = File::create(&tmp_path)?;
        Ok(Self {
            writer: Some(BufWriter::new(file)),
            tmp_path,
            final_path: final_path.to_path_buf(),
            written: 0,
        })
    }

    pub fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| io::Error::other("write after finalize"))?;
        writer.write_all(buf)?;
        self.written += buf.len() as u64;
        Ok(())
    }

    /// Flush, sync and rename tmp → final. Returns bytes written.
    pub fn finalize(mut self) -> io::Result<u64> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| io::Error::other("already finalized"))?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        drop(file);
        fs::rename(&self.tmp_path, &self.final_path)?;
        Ok(self.written)
    }
}

impl Drop for AtomicFile {
    fn drop(&mut self) {
        if self.writer.take().is_some() {
            if let Err(e) = fs::remove_file(&self.tmp_path) {
                log::debug!("Cannot remove {}: {e}", self.tmp_path.display());
            }
        }
    }
}

/// Write `value` as pretty JSON, atomically replacing any existing file
pub fn write_json(path: &Path, value: &impl serde::Serialize) -> io::Result<()> {
    let body = serde_json::to_vec_pretty(value).map_err(io::Error::other)?;
    let mut file = AtomicFile::create(path)?;
    file.write_all(&body)?;
    file.finalize()?;
    Ok(())
}

/// Write `value` as pretty JSON only if `path` does not exist yet.
///
/// Returns whether a record was written.
pub fn write_json_if_absent(path: &Path, value: &impl serde::Serialize) -> io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    write_json(path, value)?;
    Ok(true)
}

/// Remove in-progress files left behind by an interrupted run.
///
/// Only the layout this crate writes is scanned: `<root>/<id>*/` (item
/// records) and `<root>/<id>*/<file id>/` (downloads and their sidecars).
/// Returns the number of files removed.
pub fn cleanup_partial_files(root: &Path) -> io::Result<usize> {
    let root = glob::Pattern::escape(&root.to_string_lossy());
    let options = glob::MatchOptions {
        require_literal_separator: true,
        ..Default::default()
    };

    let mut removed = 0;
    for pattern in [
        format!("{root}/[0-9]*/*{PARTIAL_SUFFIX}"),
        format!("{root}/[0-9]*/[0-9]*/*{PARTIAL_SUFFIX}"),
    ] {
        let paths = glob::glob_with(&pattern, options)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        for entry in paths {
            let path = entry.map_err(|e| e.into_error())?;
            if path.is_file() {
                log::warn!("Removing partial file: {}", path.display());
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn tmp_path_appends_suffix() {
        assert_eq!(
            tmp_path(Path::new("/a/b/mod.jar")),
            PathBuf::from("/a/b/mod.jar.modpull-partial")
        );
    }

    #[test]
    fn atomic_file_invisible_until_finalized() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("mod.jar");

        let mut file = AtomicFile::create(&target).unwrap();
        file.write_all(b"hello ").unwrap();
        file.write_all(b"world").unwrap();
        assert!(!target.exists());
        assert!(tmp_path(&target).exists());

        assert_eq!(file.finalize().unwrap(), 11);
        assert_eq!(fs::read(&target).unwrap(), b"hello world");
        assert!(!tmp_path(&target).exists());
    }

    #[test]
    fn atomic_file_dropped_removes_tmp() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("mod.jar");

        let mut file = AtomicFile::create(&target).unwrap();
        file.write_all(b"partial").unwrap();
        drop(file);

        assert!(!target.exists());
        assert!(!tmp_path(&target).exists());
    }

    #[test]
    fn atomic_file_replaces_stale_tmp() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("mod.jar");
        fs::write(tmp_path(&target), b"stale garbage").unwrap();

        let mut file = AtomicFile::create(&target).unwrap();
        file.write_all(b"new").unwrap();
        file.finalize().unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"new");
    }

    #[test]
    fn write_json_if_absent_keeps_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("record.json");

        assert!(write_json_if_absent(&path, &serde_json::json!({"v": 1})).unwrap());
        assert!(!write_json_if_absent(&path, &serde_json::json!({"v": 2})).unwrap());

        let kept: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(kept["v"], 1);
    }

    #[test]
    fn write_json_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("record.json");

        write_json(&path, &serde_json::json!({"v": 1})).unwrap();
        write_json(&path, &serde_json::json!({"v": 2})).unwrap();

        let kept: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(kept["v"], 2);
    }

    #[test]
    fn cleanup_removes_partials_inside_item_layout() {
        let dir = TempDir::new().unwrap();
        let item_dir = dir.path().join("238222-jei");
        let file_dir = item_dir.join("2724420");
        fs::create_dir_all(&file_dir).unwrap();
        fs::write(tmp_path(&item_dir.join("mod-info.json")), b"{").unwrap();
        fs::write(tmp_path(&file_dir.join("jei.jar")), b"half").unwrap();
        fs::write(file_dir.join("jei.jar"), b"keep").unwrap();

        assert_eq!(cleanup_partial_files(dir.path()).unwrap(), 2);

        assert!(!tmp_path(&item_dir.join("mod-info.json")).exists());
        assert!(!tmp_path(&file_dir.join("jei.jar")).exists());
        assert!(file_dir.join("jei.jar").exists());
    }

    #[test]
    fn cleanup_leaves_foreign_files_alone() {
        let dir = TempDir::new().unwrap();
        let file_dir = dir.path().join("1-world").join("77");
        let elsewhere = dir.path().join("notes").join("drafts");
        fs::create_dir_all(&file_dir).unwrap();
        fs::create_dir_all(&elsewhere).unwrap();

        // downloads may legitimately end in .tmp
        fs::write(file_dir.join("world.tmp"), b"map").unwrap();
        fs::write(dir.path().join("notes.tmp"), b"mine").unwrap();
        // partial-looking files outside the item layout are not ours
        fs::write(dir.path().join("x.modpull-partial"), b"?").unwrap();
        fs::write(elsewhere.join("y.modpull-partial"), b"?").unwrap();

        assert_eq!(cleanup_partial_files(dir.path()).unwrap(), 0);

        assert!(file_dir.join("world.tmp").exists());
        assert!(dir.path().join("notes.tmp").exists());
        assert!(dir.path().join("x.modpull-partial").exists());
        assert!(elsewhere.join("y.modpull-partial").exists());
    }
}
