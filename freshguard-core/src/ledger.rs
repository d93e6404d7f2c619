//! Alert Ledger Implementations
//!
//! ## Overview
//!
//! The ledger is the single source of truth for "has this condition already
//! been surfaced?". The evaluator writes a key *before* anything is sent, so
//! a crash or a failed delivery can lose a notification but can never
//! produce a second one for the same key.
//!
//! Two implementations are provided:
//!
//! 1. [`MemoryLedger`]: process-lifetime set, used in tests and dry runs
//! 2. [`FileLedger`]: append-only journal on local disk, survives restarts
//!
//! ## File Format
//!
//! One JSON string per line, in the order the keys were marked:
//!
//! ```text
//! "ch4_danger_1700000000"
//! "fruit_classification_1700000000"
//! "reading_1700000000"
//! ```
//!
//! A file holding a single JSON object is read as the `processedAlerts`
//! export browser dashboards kept in local storage:
//!
//! ```json
//! { "ch4_danger_1700000000": true, "reading_1700000000": true }
//! ```
//!
//! Entries whose value is `false` are ignored. The export is rewritten as a
//! journal on open, so later appends land in a line-based file.
//!
//! ## Durability
//!
//! [`FileLedger::mark`] appends one line for a new key and calls
//! `sync_data` before returning, so a key reported as marked is on disk and
//! a mark costs one short write whatever the ledger size. Creating the file
//! also syncs its directory.
//!
//! A crash mid-append can leave a final line without its newline. On open
//! such a line is kept if it parses and dropped otherwise; either way the
//! file is compacted so the next append starts on a fresh line. Compaction
//! writes a sibling temp file, syncs it, renames it over the journal and
//! syncs the directory.
//!
//! ## Growth
//!
//! Keys are bounded by parameters × severities × readings. Nothing is ever
//! evicted.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::alerts::AlertKey;
use crate::errors::LedgerResult;
use crate::traits::AlertLedger;

/// In-memory ledger
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    keys: BTreeSet<AlertKey>,
}

impl MemoryLedger {
    /// Empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored keys in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &AlertKey> {
        self.keys.iter()
    }
}

impl AlertLedger for MemoryLedger {
    fn has(&self, key: &AlertKey) -> bool {
        self.keys.contains(key)
    }

    fn mark(&mut self, key: &AlertKey) -> LedgerResult<()> {
        self.keys.insert(key.clone());
        Ok(())
    }

    fn len(&self) -> usize {
        self.keys.len()
    }
}

/// File-backed ledger
#[derive(Debug)]
pub struct FileLedger {
    path: PathBuf,
    keys: BTreeSet<AlertKey>,
    /// Append handle, opened on the first mark
    journal: Option<File>,
    /// Journal length after the last complete append
    journal_len: u64,
}

impl FileLedger {
    /// Open the ledger at `path`, starting empty if the file does not exist
    ///
    /// Nothing is created until the first key is marked.
    pub fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref().to_path_buf();

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => Some(contents),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        let mut ledger = Self {
            path,
            keys: BTreeSet::new(),
            journal: None,
            journal_len: 0,
        };

        if let Some(contents) = contents {
            let needs_compaction = if contents.trim_start().starts_with('{') {
                ledger.keys = read_export(&contents)?;
                log::info!("importing dashboard export {}", ledger.path.display());
                true
            } else {
                let (keys, clean) = read_journal(&contents)?;
                ledger.keys = keys;
                !clean
            };

            if needs_compaction {
                ledger.compact()?;
            }
        }

        log::debug!(
            "opened alert ledger {} with {} keys",
            ledger.path.display(),
            ledger.keys.len()
        );

        Ok(ledger)
    }

    /// Location of the ledger file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored keys in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &AlertKey> {
        self.keys.iter()
    }

    /// Rewrite the journal with one line per stored key
    fn compact(&mut self) -> LedgerResult<()> {
        let tmp = self.path.with_extension("tmp");
        let mut written = 0u64;

        {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp)?;
            let mut writer = BufWriter::new(file);

            for key in &self.keys {
                let line = journal_line(key)?;
                writer.write_all(line.as_bytes())?;
                written += line.len() as u64;
            }
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }

        fs::rename(&tmp, &self.path)?;
        sync_parent(&self.path)?;

        self.journal = None;
        self.journal_len = written;
        log::debug!("compacted alert ledger {} to {} keys", self.path.display(), self.keys.len());
        Ok(())
    }

    fn open_journal(&mut self) -> LedgerResult<File> {
        let existed = self.path.exists();
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        if !existed {
            sync_parent(&self.path)?;
        }
        self.journal_len = file.metadata()?.len();
        Ok(file)
    }

    fn append(&mut self, key: &AlertKey) -> LedgerResult<()> {
        let line = journal_line(key)?;
        let journal = match self.journal.take() {
            Some(journal) => journal,
            None => self.open_journal()?,
        };

        let written = (&journal)
            .write_all(line.as_bytes())
            .and_then(|()| journal.sync_data());

        if let Err(e) = written {
            // Drop a partial line so the next append starts clean
            let _ = journal.set_len(self.journal_len);
            self.journal = Some(journal);
            return Err(e.into());
        }

        self.journal_len += line.len() as u64;
        self.journal = Some(journal);
        Ok(())
    }
}

impl AlertLedger for FileLedger {
    fn has(&self, key: &AlertKey) -> bool {
        self.keys.contains(key)
    }

    fn mark(&mut self, key: &AlertKey) -> LedgerResult<()> {
        if !self.keys.insert(key.clone()) {
            return Ok(());
        }

        if let Err(e) = self.append(key) {
            // Keep memory and disk in agreement
            self.keys.remove(key);
            log::error!("failed to persist ledger key {}: {}", key, e);
            return Err(e);
        }

        Ok(())
    }

    fn len(&self) -> usize {
        self.keys.len()
    }
}

fn journal_line(key: &AlertKey) -> LedgerResult<String> {
    let mut line = serde_json::to_string(key.as_str())?;
    line.push('\n');
    Ok(line)
}

/// Keys of a `processedAlerts` object whose value is `true`
fn read_export(contents: &str) -> LedgerResult<BTreeSet<AlertKey>> {
    let stored: BTreeMap<String, bool> = serde_json::from_str(contents)?;
    Ok(stored
        .into_iter()
        .filter(|(_, present)| *present)
        .map(|(key, _)| AlertKey::from_raw(key))
        .collect())
}

/// Fold journal lines into a key set
///
/// The flag is false when the file should be compacted: a torn final line
/// or duplicate entries.
fn read_journal(contents: &str) -> LedgerResult<(BTreeSet<AlertKey>, bool)> {
    let mut keys = BTreeSet::new();
    let mut clean = true;

    let mut lines: Vec<&str> = contents.split('\n').collect();
    // Empty when the file ends with a newline
    let tail = lines.pop().unwrap_or_default();

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let key: String = serde_json::from_str(line)?;
        if !keys.insert(AlertKey::from_raw(key)) {
            clean = false;
        }
    }

    let tail = tail.trim();
    if !tail.is_empty() {
        clean = false;
        match serde_json::from_str::<String>(tail) {
            Ok(key) => {
                keys.insert(AlertKey::from_raw(key));
            }
            Err(e) => log::warn!("dropping incomplete ledger entry {:?}: {}", tail, e),
        }
    }

    Ok((keys, clean))
}

/// Make a created or renamed entry in the parent directory durable
fn sync_parent(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        File::open(parent)?.sync_all()?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}
