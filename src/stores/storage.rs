use anyhow::{anyhow, bail, Context, Result};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

/// Keys the client persists. Every value is an advisory cache.
pub mod keys {
    pub const TOKEN: &str = "token";
    pub const ASSIGNED_CHARACTERS: &str = "assignedCharacters";
    pub const ASSIGNED_CHARACTER_IDS: &str = "assignedCharacterIds";
    pub const MESSAGE_COUNTS: &str = "messageCountsPerCharacter";
    pub const SELECTED_CHARACTER: &str = "selectedCharacterId";

    /// Everything tied to the logged-in user
    pub const SESSION_SCOPED: [&str; 5] = [
        TOKEN,
        ASSIGNED_CHARACTERS,
        ASSIGNED_CHARACTER_IDS,
        MESSAGE_COUNTS,
        SELECTED_CHARACTER,
    ];
}

/// String key-value storage, the client's equivalent of browser local storage
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Typed JSON helpers over any [`Storage`]
pub trait StorageExt: Storage {
    /// Read and decode a JSON value. Malformed entries read as absent.
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = key, error = %e, "Ignoring malformed cached value");
                None
            }
        }
    }

    fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)
            .context(format!("Failed to encode cached value for '{}'", key))?;
        self.set(key, &raw)
    }
}

impl<S: Storage + ?Sized> StorageExt for S {}

/// In-memory storage
pub struct MemoryStorage {
    entries: DashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Storage log operation types
#[derive(Debug, Clone, PartialEq)]
enum LogOperation {
    Set { key: String, value: String },
    Remove { key: String },
}

impl LogOperation {
    /// Keys are plain identifiers; values are JSON string literals so the
    /// record always fits on one line.
    fn encode(&self) -> Result<String> {
        match self {
            LogOperation::Set { key, value } => {
                let literal = serde_json::to_string(value).context("Failed to encode value")?;
                Ok(format!("SET|{}|{}", key, literal))
            }
            LogOperation::Remove { key } => Ok(format!("REMOVE|{}", key)),
        }
    }

    fn decode(line: &str) -> Result<Self> {
        let parts: Vec<&str> = line.splitn(3, '|').collect();

        match parts.first() {
            Some(&"SET") => {
                if parts.len() != 3 {
                    bail!("Invalid SET format");
                }
                let value: String =
                    serde_json::from_str(parts[2]).context("Invalid SET value literal")?;
                Ok(LogOperation::Set {
                    key: parts[1].to_string(),
                    value,
                })
            }
            Some(&"REMOVE") => {
                if parts.len() != 2 {
                    bail!("Invalid REMOVE format");
                }
                Ok(LogOperation::Remove {
                    key: parts[1].to_string(),
                })
            }
            _ => bail!("Unknown operation type"),
        }
    }
}

/// File-backed storage.
///
/// Reads are served from an in-memory mirror. Every mutation is appended to a
/// log file as a single flushed line, so a crash loses at most the operation
/// in flight. `compact` rewrites the log through a temp file and rename.
pub struct FileStorage {
    entries: DashMap<String, String>,
    file: Mutex<File>,
    path: PathBuf,
}

impl FileStorage {
    /// Open (or create) the log at `path` and replay it
    pub fn open(path: PathBuf) -> Result<Self> {
        let entries = DashMap::new();

        if path.exists() {
            for op in Self::replay(&path)? {
                match op {
                    LogOperation::Set { key, value } => {
                        entries.insert(key, value);
                    }
                    LogOperation::Remove { key } => {
                        entries.remove(&key);
                    }
                }
            }
        }

        let file = Self::open_append(&path)?;

        Ok(Self {
            entries,
            file: Mutex::new(file),
            path,
        })
    }

    fn open_append(path: &PathBuf) -> Result<File> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .context(format!("Failed to open storage file: {}", path.display()))
    }

    fn replay(path: &PathBuf) -> Result<Vec<LogOperation>> {
        let file = File::open(path).context("Failed to open storage file for replay")?;
        let reader = BufReader::new(file);
        let mut operations = Vec::new();

        for (line_num, line_result) in reader.lines().enumerate() {
            let line = line_result.context("Failed to read line from storage file")?;
            let line = line.trim();

            if line.is_empty() {
                continue;
            }

            match LogOperation::decode(line) {
                Ok(op) => operations.push(op),
                Err(e) => {
                    warn!(
                        line_num = line_num + 1,
                        error = %e,
                        "Failed to parse storage line, skipping"
                    );
                }
            }
        }

        Ok(operations)
    }

    fn append(&self, op: &LogOperation) -> Result<()> {
        let line = op.encode()?;
        let mut file = self
            .file
            .lock()
            .map_err(|_| anyhow!("Storage file lock poisoned"))?;
        writeln!(file, "{}", line).context("Failed to write to storage file")?;
        file.flush().context("Failed to flush storage file")?;
        Ok(())
    }

    /// Rewrite the log so it holds one SET per live key
    pub fn compact(&self) -> Result<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| anyhow!("Storage file lock poisoned"))?;

        let tmp_path = self.path.with_extension("compact");
        {
            let mut tmp = File::create(&tmp_path).context("Failed to create compaction file")?;
            for entry in self.entries.iter() {
                let op = LogOperation::Set {
                    key: entry.key().clone(),
                    value: entry.value().clone(),
                };
                writeln!(tmp, "{}", op.encode()?).context("Failed to write compaction file")?;
            }
            tmp.sync_all().context("Failed to sync compaction file")?;
        }

        fs::rename(&tmp_path, &self.path).context("Failed to replace storage file")?;
        *file = Self::open_append(&self.path)?;

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if key.is_empty() || key.contains('|') || key.contains('\n') {
            bail!("Invalid storage key '{}'", key);
        }
        self.append(&LogOperation::Set {
            key: key.to_string(),
            value: value.to_string(),
        })?;
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        if !self.entries.contains_key(key) {
            return Ok(());
        }
        self.append(&LogOperation::Remove {
            key: key.to_string(),
        })?;
        self.entries.remove(key);
        Ok(())
    }
}
