//! Persistent `key|value` stores shared between the scanner, the builder,
//! and external analyzer processes.
//!
//! The format is one record per line, key separated from value by the first
//! `|`. Compound values (argument lists, file lists) are semicolon-joined.
//! Keys are kept in a `BTreeMap` so rewrites are deterministic.

use crate::error::{MasonError, Result};
use std::{
    collections::BTreeMap,
    fs::{read_to_string, remove_file, OpenOptions},
    io,
    path::{Path, PathBuf},
    thread::sleep,
    time::{Duration, SystemTime},
};

const KEY_VALUE_DELIMITER: char = '|';
const COMPOUND_DELIMITER: char = ';';

/// How long a lock file may sit before it is considered abandoned by a
/// crashed process and stolen.
const STALE_LOCK_AGE: Duration = Duration::from_secs(30);
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(50);
const LOCK_RETRY_LIMIT: u32 = 200;

/// Join values into a single compound string. The trailing delimiter matches
/// the on-disk format written by the analyzer processes.
pub fn join_compound<I, S>(values: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for value in values {
        out.push_str(value.as_ref());
        out.push(COMPOUND_DELIMITER);
    }
    out
}

/// Split a compound string into its parts, discarding the empty remainder
/// after a trailing delimiter.
pub fn split_compound(value: &str) -> Vec<String> {
    let mut parts: Vec<String> = value.split(COMPOUND_DELIMITER).map(str::to_string).collect();
    if parts.last().map(|p| p.is_empty()).unwrap_or(false) {
        parts.pop();
    }
    parts
}

/// Quote an argument for command line use if it contains whitespace.
pub fn quote_arg(arg: &str) -> String {
    if arg.contains(char::is_whitespace) && !arg.starts_with('"') {
        format!("\"{arg}\"")
    } else {
        arg.to_string()
    }
}

#[derive(Debug, Default, Clone)]
pub struct KeyValueFile {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl KeyValueFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        KeyValueFile {
            path: path.as_ref().to_path_buf(),
            values: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file, replacing the in-memory map. A missing file is an
    /// error so callers can decide whether absence means "defaults".
    pub fn read(&mut self) -> Result<()> {
        let content = read_to_string(&self.path)?;
        self.values = Self::parse(&content, &self.path);
        Ok(())
    }

    /// Read the file, treating a missing file as an empty map.
    pub fn read_or_default(&mut self) -> Result<()> {
        match self.read() {
            Ok(()) => Ok(()),
            Err(MasonError::NotFound(_)) => {
                self.values.clear();
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn parse(content: &str, path: &Path) -> BTreeMap<String, String> {
        let mut values = BTreeMap::new();
        for line in content.lines() {
            if line.is_empty() {
                continue;
            }
            match line.split_once(KEY_VALUE_DELIMITER) {
                Some((key, value)) => {
                    values.insert(key.to_string(), value.to_string());
                }
                None => {
                    tracing::warn!("Skipping malformed record in {:?}: {}", path, line);
                }
            }
        }
        values
    }

    pub fn write(&self) -> Result<()> {
        let mut content = String::new();
        for (key, value) in &self.values {
            if !value.is_empty() {
                content.push_str(key);
                content.push(KEY_VALUE_DELIMITER);
                content.push_str(value);
                content.push('\n');
            }
        }
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    /// Get a value, or the empty string when the key is absent. Most record
    /// formats treat "absent" and "empty" identically.
    pub fn get(&self, key: &str) -> String {
        self.values.get(key).cloned().unwrap_or_default()
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: &str) {
        if value.is_empty() {
            self.values.remove(key);
        } else {
            self.values.insert(key.to_string(), value.to_string());
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &String)> {
        self.values.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Exclusive read-merge-write cycle. Takes the lock file, re-reads the
    /// current on-disk state, applies `merge` on top of it, rewrites, and
    /// releases the lock. Concurrent writers each merge over the latest
    /// state rather than overwriting each other.
    pub fn update_exclusive<F>(&mut self, merge: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _lock = FileLock::acquire(&self.path)?;
        match read_to_string(&self.path) {
            Ok(content) => {
                self.values = Self::parse(&content, &self.path);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.values.clear();
            }
            Err(e) => return Err(e.into()),
        }
        merge(&mut self.values);
        self.write()
    }
}

/// Cross-process mutual exclusion via a companion `.lock` file created with
/// `create_new`. Locks older than [`STALE_LOCK_AGE`] are assumed abandoned.
struct FileLock {
    lock_path: PathBuf,
}

impl FileLock {
    fn acquire(target: &Path) -> Result<FileLock> {
        let mut lock_path = target.as_os_str().to_os_string();
        lock_path.push(".lock");
        let lock_path = PathBuf::from(lock_path);
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        for _ in 0..LOCK_RETRY_LIMIT {
            match OpenOptions::new().write(true).create_new(true).open(&lock_path) {
                Ok(_) => return Ok(FileLock { lock_path }),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    Self::steal_if_stale(&lock_path);
                    sleep(LOCK_RETRY_INTERVAL);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(MasonError::Io(format!(
            "Timed out waiting for lock file {lock_path:?}"
        )))
    }

    fn steal_if_stale(lock_path: &Path) {
        let age = std::fs::metadata(lock_path)
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok());
        if let Some(age) = age {
            if age > STALE_LOCK_AGE {
                tracing::warn!("Removing stale lock file {:?} (age {:?})", lock_path, age);
                let _ = remove_file(lock_path);
            }
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = remove_file(&self.lock_path) {
            tracing::warn!("Unable to remove lock file {:?}: {}", self.lock_path, e);
        }
    }
}
