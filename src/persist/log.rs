use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One mutation of the key/value store. This is the on-disk record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreEntry {
    Set { key: String, value: String },
    Remove { key: String },
}

/// Encode a single entry to [len][bincode][crc32] format.
fn encode_entry(writer: &mut impl Write, entry: &StoreEntry) -> io::Result<()> {
    let payload =
        bincode::serialize(entry).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = payload.len() as u32;
    let crc = crc32fast::hash(&payload);
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc.to_le_bytes())?;
    Ok(())
}

/// Append-only log backing [`super::FileStore`].
///
/// Format per entry: `[u32: len][bincode: StoreEntry][u32: crc32]`.
/// A truncated or corrupt tail (crash mid-write) is dropped on replay.
pub struct KvLog {
    writer: BufWriter<File>,
    path: PathBuf,
    appends_since_compact: u64,
}

impl KvLog {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            appends_since_compact: 0,
        })
    }

    /// Append one entry and fsync.
    pub fn append(&mut self, entry: &StoreEntry) -> io::Result<()> {
        let encoded = encode_entry(&mut self.writer, entry);
        // Always flush, so half-encoded bytes don't get glued to the next entry.
        let flushed = self
            .writer
            .flush()
            .and_then(|()| self.writer.get_ref().sync_all());
        encoded?;
        self.appends_since_compact += 1;
        flushed
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    /// Write `entries` to a temp file next to `path` and fsync it.
    pub fn write_compact_file(path: &Path, entries: &[StoreEntry]) -> io::Result<()> {
        let tmp_path = path.with_extension("tmp");
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        for entry in entries {
            encode_entry(&mut writer, entry)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()
    }

    /// Rename the temp file over the log and reopen it for appending.
    pub fn swap_compact_file(&mut self) -> io::Result<()> {
        let tmp_path = self.path.with_extension("tmp");
        fs::rename(&tmp_path, &self.path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.appends_since_compact = 0;
        Ok(())
    }

    /// Read every valid entry from disk. A missing file is an empty log.
    pub fn replay(path: &Path) -> io::Result<Vec<StoreEntry>> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut reader = BufReader::new(file);
        let mut entries = Vec::new();

        loop {
            let mut len_buf = [0u8; 4];
            match reader.read_exact(&mut len_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }
            let len = u32::from_le_bytes(len_buf) as usize;
            if len > crate::limits::MAX_DRAFT_BYTES * 2 {
                break; // garbage length
            }

            let mut payload = vec![0u8; len];
            match reader.read_exact(&mut payload) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }

            let mut crc_buf = [0u8; 4];
            match reader.read_exact(&mut crc_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }
            if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
                break;
            }

            match bincode::deserialize::<StoreEntry>(&payload) {
                Ok(entry) => entries.push(entry),
                Err(_) => break,
            }
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("arisync_test_log");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = fs::remove_file(&path);
        path
    }

    fn set(key: &str, value: &str) -> StoreEntry {
        StoreEntry::Set {
            key: key.into(),
            value: value.into(),
        }
    }

    #[test]
    fn append_and_replay() {
        let path = tmp_path("append_and_replay.log");
        let entries = vec![
            set("acme:2025-06-01:2025-06-14", "{}"),
            StoreEntry::Remove {
                key: "acme:2025-06-01:2025-06-14".into(),
            },
        ];
        {
            let mut log = KvLog::open(&path).unwrap();
            for e in &entries {
                log.append(e).unwrap();
            }
            assert_eq!(log.appends_since_compact(), 2);
        }
        assert_eq!(KvLog::replay(&path).unwrap(), entries);
    }

    #[test]
    fn replay_drops_truncated_tail() {
        let path = tmp_path("truncated.log");
        {
            let mut log = KvLog::open(&path).unwrap();
            log.append(&set("k", "v")).unwrap();
        }
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[9u8, 0, 0, 0, 1, 2]).unwrap();
        }
        assert_eq!(KvLog::replay(&path).unwrap(), vec![set("k", "v")]);
    }

    #[test]
    fn replay_stops_at_bad_crc() {
        let path = tmp_path("bad_crc.log");
        {
            let payload = bincode::serialize(&set("k", "v")).unwrap();
            let mut f = File::create(&path).unwrap();
            f.write_all(&(payload.len() as u32).to_le_bytes()).unwrap();
            f.write_all(&payload).unwrap();
            f.write_all(&0xDEAD_BEEFu32.to_le_bytes()).unwrap();
        }
        assert!(KvLog::replay(&path).unwrap().is_empty());
    }

    #[test]
    fn replay_missing_file_is_empty() {
        let path = tmp_path("missing.log");
        assert!(KvLog::replay(&path).unwrap().is_empty());
    }

    #[test]
    fn compact_then_append() {
        let path = tmp_path("compact.log");
        let mut log = KvLog::open(&path).unwrap();
        for i in 0..20 {
            log.append(&set("k", &format!("v{i}"))).unwrap();
        }
        let before = fs::metadata(&path).unwrap().len();

        KvLog::write_compact_file(&path, &[set("k", "v19")]).unwrap();
        log.swap_compact_file().unwrap();
        assert_eq!(log.appends_since_compact(), 0);
        log.append(&set("other", "x")).unwrap();

        let after = fs::metadata(&path).unwrap().len();
        assert!(after < before, "compacted log should shrink: {after} < {before}");
        assert_eq!(
            KvLog::replay(&path).unwrap(),
            vec![set("k", "v19"), set("other", "x")]
        );
    }
}
