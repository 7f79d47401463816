//! Durable ticket store.
//!
//! Tickets live in memory and are written to `tickets.bin` on flush:
//!
//! ```text
//! magic "SUBT" | version u8 | len u64 LE | MessagePack Vec<Ticket> | crc32 u32 LE
//! ```
//!
//! `put` and `remove` only touch memory. Nothing reaches disk until
//! [`SubscriptionStore::flush`] or drop, so a crash loses every change made
//! since the last flush. Hosts that need renewals and removals to survive a
//! crash flush after each call.
//!
//! Flushes are serialized. Each one writes and syncs `tickets.bin.tmp`
//! before renaming it over `tickets.bin`, so readers see either the old or
//! the new file. The directory is guarded by an exclusive lock on `LOCK` for
//! the lifetime of the store.

use super::{MemoryStore, SubscriptionStore};
use crate::error::{Result, SubscriptionError};
use crate::types::{Ticket, TicketId};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Magic bytes for the ticket file.
const TICKETS_MAGIC: &[u8; 4] = b"SUBT";

/// Current ticket file format version.
const TICKETS_VERSION: u8 = 1;

const TICKETS_FILE: &str = "tickets.bin";

/// Refuse to allocate for absurd lengths from a damaged header.
const MAX_ENCODED_LEN: u64 = 256 * 1024 * 1024;

/// Ticket store persisted to a directory on flush.
pub struct FileStore {
    dir: PathBuf,
    tickets: MemoryStore,
    /// Flushes share one temp file.
    write_lock: Mutex<()>,
    /// Held for its lock.
    _lock: File,
}

impl FileStore {
    /// Open (or create) a store in `dir`, loading any flushed tickets.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let lock = Self::acquire_lock(&dir)?;

        let path = dir.join(TICKETS_FILE);
        let tickets = if path.exists() {
            Self::load(&path)?
        } else {
            Vec::new()
        };

        tracing::debug!(dir = %dir.display(), tickets = tickets.len(), "opened ticket store");

        Ok(Self {
            dir,
            tickets: MemoryStore::from_tickets(tickets),
            write_lock: Mutex::new(()),
            _lock: lock,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn acquire_lock(dir: &Path) -> Result<File> {
        let lock_file = File::create(dir.join("LOCK"))?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| SubscriptionError::Locked)?;

        Ok(lock_file)
    }

    fn load(path: &Path) -> Result<Vec<Ticket>> {
        let mut file = File::open(path)?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != TICKETS_MAGIC {
            return Err(SubscriptionError::InvalidFormat(
                "Invalid ticket file magic".into(),
            ));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != TICKETS_VERSION {
            return Err(SubscriptionError::InvalidFormat(format!(
                "Unsupported ticket file version: {}",
                version[0]
            )));
        }

        let mut len_bytes = [0u8; 8];
        file.read_exact(&mut len_bytes)?;
        let len = u64::from_le_bytes(len_bytes);
        if len > MAX_ENCODED_LEN {
            return Err(SubscriptionError::Corruption(
                "Ticket file length out of range".into(),
            ));
        }

        let mut encoded = vec![0u8; len as usize];
        file.read_exact(&mut encoded)?;

        let mut checksum_bytes = [0u8; 4];
        file.read_exact(&mut checksum_bytes)?;
        if u32::from_le_bytes(checksum_bytes) != crc32fast::hash(&encoded) {
            return Err(SubscriptionError::Corruption(
                "Ticket file checksum mismatch".into(),
            ));
        }

        Ok(rmp_serde::from_slice(&encoded)?)
    }

    fn write(&self) -> Result<()> {
        let encoded = rmp_serde::to_vec(&self.tickets.list_all())?;

        let _guard = self.write_lock.lock();

        let tmp_path = self.dir.join(format!("{TICKETS_FILE}.tmp"));
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;

        file.write_all(TICKETS_MAGIC)?;
        file.write_all(&[TICKETS_VERSION])?;
        file.write_all(&(encoded.len() as u64).to_le_bytes())?;
        file.write_all(&encoded)?;
        file.write_all(&crc32fast::hash(&encoded).to_le_bytes())?;
        file.sync_all()?;

        fs::rename(&tmp_path, self.dir.join(TICKETS_FILE))?;
        Ok(())
    }
}

impl SubscriptionStore for FileStore {
    fn put(&mut self, ticket: Ticket) {
        self.tickets.put(ticket);
    }

    fn get(&self, id: &TicketId) -> Option<Ticket> {
        self.tickets.get(id)
    }

    fn remove(&mut self, id: &TicketId) -> Option<Ticket> {
        self.tickets.remove(id)
    }

    fn list_all(&self) -> Vec<Ticket> {
        self.tickets.list_all()
    }

    fn contains(&self, id: &TicketId) -> bool {
        self.tickets.contains(id)
    }

    fn len(&self) -> usize {
        self.tickets.len()
    }

    fn flush(&self) -> Result<()> {
        self.write()
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        if let Err(e) = self.write() {
            tracing::warn!(dir = %self.dir.display(), error = %e, "failed to flush ticket store on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EndpointReference, FilterSpec};
    use chrono::{TimeDelta, Utc};
    use tempfile::TempDir;

    fn make_ticket() -> Ticket {
        let now = Utc::now();
        Ticket {
            id: TicketId::generate(),
            notify_to: EndpointReference::new("http://sink.example/events")
                .with_parameter("Token", "t-1"),
            end_to: Some(EndpointReference::new("http://sink.example/ended")),
            expires_at: (now + TimeDelta::days(3)).fixed_offset(),
            non_expiring: false,
            filter: Some(FilterSpec::new(
                crate::negotiation::XPATH_1_0_DIALECT,
                "/event[@kind='alarm']",
            )),
            wrapped_delivery: true,
            created_at: now,
        }
    }

    #[test]
    fn test_flush_and_reopen() {
        let dir = TempDir::new().unwrap();
        let ticket = make_ticket();

        {
            let mut store = FileStore::open(dir.path()).unwrap();
            store.put(ticket.clone());
            store.flush().unwrap();
        }

        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&ticket.id), Some(ticket));
    }

    #[test]
    fn test_drop_flushes() {
        let dir = TempDir::new().unwrap();
        let ticket = make_ticket();

        {
            let mut store = FileStore::open(dir.path()).unwrap();
            store.put(ticket.clone());
        }

        let store = FileStore::open(dir.path()).unwrap();
        assert!(store.contains(&ticket.id));
    }

    #[test]
    fn test_removal_persists() {
        let dir = TempDir::new().unwrap();
        let ticket = make_ticket();

        {
            let mut store = FileStore::open(dir.path()).unwrap();
            store.put(ticket.clone());
            store.flush().unwrap();
            store.remove(&ticket.id);
        }

        let store = FileStore::open(dir.path()).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_unflushed_changes_stay_in_memory() {
        let dir = TempDir::new().unwrap();
        let flushed = make_ticket();
        let pending = make_ticket();

        let mut store = FileStore::open(dir.path()).unwrap();
        store.put(flushed.clone());
        store.flush().unwrap();
        store.put(pending.clone());
        store.remove(&flushed.id);

        // What a crash at this point leaves behind.
        let on_disk = FileStore::load(&dir.path().join(TICKETS_FILE)).unwrap();
        assert_eq!(on_disk, vec![flushed]);
        assert_eq!(store.list_all(), vec![pending.clone()]);

        store.flush().unwrap();
        let on_disk = FileStore::load(&dir.path().join(TICKETS_FILE)).unwrap();
        assert_eq!(on_disk, vec![pending]);
    }

    #[test]
    fn test_second_open_is_locked() {
        let dir = TempDir::new().unwrap();
        let _store = FileStore::open(dir.path()).unwrap();

        let result = FileStore::open(dir.path());
        assert!(matches!(result, Err(SubscriptionError::Locked)));
    }

    #[test]
    fn test_bad_magic() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(TICKETS_FILE), b"NOPE\x01").unwrap();

        let result = FileStore::open(dir.path());
        assert!(matches!(result, Err(SubscriptionError::InvalidFormat(_))));
    }

    #[test]
    fn test_checksum_mismatch() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = FileStore::open(dir.path()).unwrap();
            store.put(make_ticket());
            store.flush().unwrap();
        }

        let path = dir.path().join(TICKETS_FILE);
        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        fs::write(&path, bytes).unwrap();

        let result = FileStore::open(dir.path());
        assert!(matches!(result, Err(SubscriptionError::Corruption(_))));
    }
}
