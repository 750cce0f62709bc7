//! # Code Store - Persistence Layer
//!
//! File-backed persistence for learned infrared codes. The store is an
//! append-only, newline-delimited text file: one record per line, fields
//! space-separated, all decimal:
//!
//! ```text
//! <id> <protocol-ordinal> <address> <command>
//! ```
//!
//! Ids are positive, unique, and allocated as `1 + max id currently in the
//! file`. Allocation always rescans the file rather than trusting the
//! in-memory cache, so the store stays authoritative even if the two ever
//! diverge. Individual records are never deleted; the only destructive
//! operation is [`CodeStore::remove`], which drops the whole file.
//!
//! The store also owns the last-seen chat update id, persisted to its own
//! single-integer file across deliberate restarts so the long poll resumes
//! at the right offset.

use anyhow::{anyhow, Context, Result};
use fs2::FileExt;
use log::{debug, warn};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Infrared protocol tag.
///
/// Ordinals match the IR codec's own enumeration so files written by the
/// appliance stay interchangeable with the codec's numbering. Unrecognized
/// ordinals are preserved as [`Protocol::Other`] rather than rejected:
/// a record with an unsupported protocol is still a valid record, it just
/// cannot be transmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Rc5,
    Rc6,
    Nec,
    Sony,
    Panasonic,
    Jvc,
    Samsung,
    Lg,
    Dish,
    Sharp,
    Other(u16),
}

impl Protocol {
    /// Map a codec ordinal to a protocol tag. Never fails.
    pub fn from_ordinal(ordinal: u16) -> Self {
        match ordinal {
            1 => Protocol::Rc5,
            2 => Protocol::Rc6,
            3 => Protocol::Nec,
            4 => Protocol::Sony,
            5 => Protocol::Panasonic,
            6 => Protocol::Jvc,
            7 => Protocol::Samsung,
            10 => Protocol::Lg,
            13 => Protocol::Dish,
            14 => Protocol::Sharp,
            other => Protocol::Other(other),
        }
    }

    /// The codec ordinal used in the wire/file format.
    pub fn ordinal(&self) -> u16 {
        match self {
            Protocol::Rc5 => 1,
            Protocol::Rc6 => 2,
            Protocol::Nec => 3,
            Protocol::Sony => 4,
            Protocol::Panasonic => 5,
            Protocol::Jvc => 6,
            Protocol::Samsung => 7,
            Protocol::Lg => 10,
            Protocol::Dish => 13,
            Protocol::Sharp => 14,
            Protocol::Other(o) => *o,
        }
    }

    /// Human-readable protocol name for display and chat notices.
    pub fn name(&self) -> &'static str {
        match self {
            Protocol::Rc5 => "RC5",
            Protocol::Rc6 => "RC6",
            Protocol::Nec => "NEC",
            Protocol::Sony => "SONY",
            Protocol::Panasonic => "PANASONIC",
            Protocol::Jvc => "JVC",
            Protocol::Samsung => "SAMSUNG",
            Protocol::Lg => "LG",
            Protocol::Dish => "DISH",
            Protocol::Sharp => "SHARP",
            Protocol::Other(_) => "UNKNOWN",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors produced when parsing a stored record line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordParseError {
    #[error("record line has {0} fields, expected 4")]
    FieldCount(usize),
    #[error("invalid {field} field: {value:?}")]
    Field { field: &'static str, value: String },
    #[error("record id must be positive")]
    ZeroId,
}

/// One learned infrared signal: protocol/address/command plus a unique id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeRecord {
    pub id: u32,
    pub protocol: Protocol,
    pub address: u32,
    pub command: u32,
}

impl CodeRecord {
    /// Serialize to the single-line file format (decimal fields).
    pub fn to_line(&self) -> String {
        format!(
            "{} {} {} {}",
            self.id,
            self.protocol.ordinal(),
            self.address,
            self.command
        )
    }

    /// Parse one file line. Whitespace-tolerant at the edges.
    pub fn parse_line(line: &str) -> Result<Self, RecordParseError> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 4 {
            return Err(RecordParseError::FieldCount(fields.len()));
        }
        let field = |name: &'static str, raw: &str| RecordParseError::Field {
            field: name,
            value: raw.to_string(),
        };
        let id: u32 = fields[0].parse().map_err(|_| field("id", fields[0]))?;
        if id == 0 {
            return Err(RecordParseError::ZeroId);
        }
        let ordinal: u16 = fields[1]
            .parse()
            .map_err(|_| field("protocol", fields[1]))?;
        let address: u32 = fields[2].parse().map_err(|_| field("address", fields[2]))?;
        let command: u32 = fields[3].parse().map_err(|_| field("command", fields[3]))?;
        Ok(CodeRecord {
            id,
            protocol: Protocol::from_ordinal(ordinal),
            address,
            command,
        })
    }
}

/// Handle to the on-disk code store. Cheap to clone; every operation opens
/// the file fresh so clones in different tasks never share descriptors.
#[derive(Debug, Clone)]
pub struct CodeStore {
    codes_path: PathBuf,
    last_update_path: PathBuf,
}

impl CodeStore {
    pub fn new(data_dir: &str, codes_file: &str, last_update_file: &str) -> Self {
        let dir = Path::new(data_dir);
        CodeStore {
            codes_path: dir.join(codes_file),
            last_update_path: dir.join(last_update_file),
        }
    }

    /// Ensure the backing directory exists and is writable.
    ///
    /// Failure here is the fatal-halt case: the caller displays the error and
    /// parks forever instead of restarting, since a missing or broken storage
    /// medium needs physical intervention.
    pub async fn mount(&self) -> Result<()> {
        let dir = self
            .codes_path
            .parent()
            .ok_or_else(|| anyhow!("codes path {:?} has no parent directory", self.codes_path))?;
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create data directory {:?}", dir))?;
        // Probe writability so a read-only mount fails at startup, not mid-learn.
        let probe = dir.join(".irdeck-mount");
        fs::write(&probe, b"ok")
            .await
            .with_context(|| format!("data directory {:?} is not writable", dir))?;
        fs::remove_file(&probe).await.ok();
        Ok(())
    }

    pub fn codes_path(&self) -> &Path {
        &self.codes_path
    }

    /// Whether the codes file currently exists.
    pub async fn exists(&self) -> bool {
        fs::try_exists(&self.codes_path).await.unwrap_or(false)
    }

    /// Load every record, preserving file order.
    ///
    /// Two passes: count the lines first, size the result exactly, then fill.
    /// Lines that fail to parse are skipped with a warning rather than
    /// poisoning the whole load.
    pub async fn load_all(&self) -> Result<Vec<CodeRecord>> {
        if !self.exists().await {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.codes_path)
            .await
            .with_context(|| format!("failed to read {:?}", self.codes_path))?;
        let count = content.lines().filter(|l| !l.trim().is_empty()).count();
        let mut records = Vec::with_capacity(count);
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match CodeRecord::parse_line(line) {
                Ok(rec) => records.push(rec),
                Err(e) => warn!("Skipping malformed record line {:?}: {}", line, e),
            }
        }
        Ok(records)
    }

    /// Allocate the next record id as `1 + max id in the file`.
    ///
    /// Always rescans the file (absent file means 1). The cache is
    /// deliberately not consulted so id allocation survives any store/cache
    /// divergence.
    pub async fn next_id(&self) -> u32 {
        if !self.exists().await {
            return 1;
        }
        let content = match fs::read_to_string(&self.codes_path).await {
            Ok(c) => c,
            Err(e) => {
                warn!("Could not scan codes file for next id: {}", e);
                return 1;
            }
        };
        let max_id = content
            .lines()
            .filter_map(|line| line.split_whitespace().next())
            .filter_map(|field| field.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        max_id + 1
    }

    /// Append one record line, holding an exclusive lock for the write.
    pub async fn append(&self, record: &CodeRecord) -> Result<()> {
        let path = self.codes_path.clone();
        let line = record.to_line();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("failed to open {:?} for append", path))?;
            file.lock_exclusive()
                .with_context(|| format!("failed to lock {:?}", path))?;
            let result = writeln!(file, "{}", line)
                .with_context(|| format!("failed to append to {:?}", path));
            let _ = fs2::FileExt::unlock(&file);
            result
        })
        .await
        .map_err(|e| anyhow!("append task panicked: {}", e))??;
        debug!("Appended record {}", record.to_line());
        Ok(())
    }

    /// Delete the whole codes file. Returns `Ok(false)` when it was already
    /// absent, which callers treat as a reportable no-op, not an error.
    pub async fn remove(&self) -> Result<bool> {
        if !self.exists().await {
            return Ok(false);
        }
        fs::remove_file(&self.codes_path)
            .await
            .with_context(|| format!("failed to remove {:?}", self.codes_path))?;
        Ok(true)
    }

    /// Persist the last chat update id seen, rewriting the whole file.
    pub async fn save_last_update_id(&self, id: i64) -> Result<()> {
        fs::write(&self.last_update_path, id.to_string())
            .await
            .with_context(|| format!("failed to write {:?}", self.last_update_path))?;
        debug!("Saved last update id {}", id);
        Ok(())
    }

    /// Read back the persisted last update id. Absent or unreadable file
    /// yields 0, which resumes the long poll from the beginning.
    pub async fn load_last_update_id(&self) -> i64 {
        match fs::read_to_string(&self.last_update_path).await {
            Ok(content) => content.trim().parse().unwrap_or(0),
            Err(_) => 0,
        }
    }
}
