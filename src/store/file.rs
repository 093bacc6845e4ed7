//! File-backed store, one file per key

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::KeyValueStore;
use crate::error::{HawalaError, HawalaResult};

/// Directory of records. Writes go to a temp file that is fsynced and then
/// renamed over the target, so a crash leaves either the old or the new value.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl AsRef<Path>) -> HawalaResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .map_err(|e| HawalaError::storage(format!("Cannot create {}: {}", dir.display(), e)))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(encode_key(key))
    }
}

/// Map a key to a flat file name. Characters outside `[A-Za-z0-9._-]` become `%XX`.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 5);
    for b in key.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || (b == b'.' && !out.is_empty()) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out.push_str(".json");
    out
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> HawalaResult<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> HawalaResult<()> {
        let target = self.path_for(key);
        let tmp = target.with_extension("json.tmp");
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp)?;
            file.write_all(value)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &target)?;

        // Persist the rename itself
        #[cfg(unix)]
        {
            fs::File::open(&self.dir)?.sync_all()?;
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> HawalaResult<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "hawala-ton-store-{}-{}-{}",
            name,
            std::process::id(),
            rand::random::<u32>()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_key_encoding() {
        assert_eq!(encode_key("vault/seed"), "vault%2Fseed.json");
        assert_eq!(encode_key("query_id/0:ab"), "query_id%2F0%3Aab.json");
        assert_eq!(encode_key("../x"), "%2E.%2Fx.json");
    }

    #[test]
    fn test_file_store_persists() {
        let dir = temp_dir("persist");
        {
            let store = FileStore::open(&dir).unwrap();
            store.put("query_id/0:abc", b"{\"version\":1}").unwrap();
            store.put("query_id/0:abc", b"{\"version\":2}").unwrap();
        }
        let reopened = FileStore::open(&dir).unwrap();
        assert_eq!(reopened.get("query_id/0:abc").unwrap().unwrap(), b"{\"version\":2}");
        assert!(reopened.get("missing").unwrap().is_none());

        reopened.delete("query_id/0:abc").unwrap();
        reopened.delete("query_id/0:abc").unwrap();
        assert!(reopened.get("query_id/0:abc").unwrap().is_none());

        let leftovers: Vec<_> = fs::read_dir(&dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
        let _ = fs::remove_dir_all(&dir);
    }
}
