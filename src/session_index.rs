//! The durable list of known sessions.
//!
//! Session identifiers are kept in creation order and written, as a JSON
//! array, to a [`DurableSlot`] whenever a session is added.  The slot is read
//! once when the index is opened.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::{Error, Result, SessionId};

/// A single durable string value.
pub trait DurableSlot: Send + Sync {
    /// Read the stored value; `None` if nothing was ever written.
    fn read(&self) -> Result<Option<String>>;

    /// Replace the stored value.
    fn write(&self, value: &str) -> Result<()>;
}

/// A slot backed by a file, replaced atomically on every write.
#[derive(Debug, Clone)]
pub struct FileSlot {
    path: PathBuf,
}

impl FileSlot {
    /// Create a slot stored at `path`.  The file need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Where the slot lives.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DurableSlot for FileSlot {
    fn read(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Error::io(
                format!("failed to read {}", self.path.display()),
                err,
            )),
        }
    }

    fn write(&self, value: &str) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|err| {
                Error::io(format!("failed to create {}", parent.display()), err)
            })?;
        }
        let tmp = self.path.with_extension("tmp");
        let mut file = File::create(&tmp)
            .map_err(|err| Error::io(format!("failed to create {}", tmp.display()), err))?;
        file.write_all(value.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|err| Error::io(format!("failed to write {}", tmp.display()), err))?;
        fs::rename(&tmp, &self.path).map_err(|err| {
            Error::io(format!("failed to replace {}", self.path.display()), err)
        })
    }
}

/// A slot that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemorySlot {
    value: Mutex<Option<String>>,
}

impl MemorySlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a slot holding `value`.
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Mutex::new(Some(value.into())),
        }
    }
}

impl DurableSlot for MemorySlot {
    fn read(&self) -> Result<Option<String>> {
        Ok(self
            .value
            .lock()
            .map_err(|_| Error::validation("memory slot lock poisoned", None))?
            .clone())
    }

    fn write(&self, value: &str) -> Result<()> {
        *self
            .value
            .lock()
            .map_err(|_| Error::validation("memory slot lock poisoned", None))? =
            Some(value.to_string());
        Ok(())
    }
}

/// The order in which sessions are presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionOrder {
    /// Most recently created first.
    #[default]
    NewestFirst,
    /// In creation order.
    OldestFirst,
}

/// Known sessions plus the one currently active.
pub struct SessionIndex {
    slot: Box<dyn DurableSlot>,
    ids: Vec<SessionId>,
    active: Option<SessionId>,
    order: SessionOrder,
}

impl SessionIndex {
    /// Load the index from `slot`.
    ///
    /// Duplicate identifiers in the stored list are collapsed to their first
    /// occurrence.
    pub fn open(slot: impl DurableSlot + 'static, order: SessionOrder) -> Result<Self> {
        let stored = match slot.read()? {
            Some(contents) if !contents.trim().is_empty() => {
                serde_json::from_str::<Vec<SessionId>>(&contents).map_err(|err| {
                    Error::serialization("failed to parse session list", Some(Box::new(err)))
                })?
            }
            _ => Vec::new(),
        };
        let mut ids: Vec<SessionId> = Vec::with_capacity(stored.len());
        for id in stored {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(Self {
            slot: Box::new(slot),
            ids,
            active: None,
            order,
        })
    }

    /// Known sessions in presentation order.
    pub fn sessions(&self) -> Vec<&SessionId> {
        match self.order {
            SessionOrder::NewestFirst => self.ids.iter().rev().collect(),
            SessionOrder::OldestFirst => self.ids.iter().collect(),
        }
    }

    /// Number of known sessions.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True if no session is known.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// True if `id` is known.
    pub fn contains(&self, id: &SessionId) -> bool {
        self.ids.contains(id)
    }

    /// The presentation order.
    pub fn order(&self) -> SessionOrder {
        self.order
    }

    /// The most recently created session, whatever the presentation order.
    pub fn latest(&self) -> Option<&SessionId> {
        self.ids.last()
    }

    /// The active session, if any.
    pub fn active(&self) -> Option<&SessionId> {
        self.active.as_ref()
    }

    /// Record a newly created session and persist the list.
    ///
    /// Adding a known identifier is a no-op.
    pub fn add(&mut self, id: SessionId) -> Result<()> {
        if self.ids.contains(&id) {
            return Ok(());
        }
        self.ids.push(id);
        self.persist()
    }

    /// Make `id` the active session.  It must already be known.
    pub fn set_active(&mut self, id: &SessionId) -> Result<()> {
        if !self.contains(id) {
            return Err(Error::not_found(
                "session is not in the index",
                Some("session".to_string()),
                Some(id.to_string()),
            ));
        }
        self.active = Some(id.clone());
        Ok(())
    }

    /// Forget the active session.
    pub fn clear_active(&mut self) {
        self.active = None;
    }

    /// Resolve a 1-based position in presentation order.
    pub fn nth(&self, position: usize) -> Option<&SessionId> {
        position
            .checked_sub(1)
            .and_then(|index| self.sessions().get(index).copied())
    }

    fn persist(&self) -> Result<()> {
        let serialized = serde_json::to_string(&self.ids)?;
        self.slot.write(&serialized)
    }
}

impl std::fmt::Debug for SessionIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionIndex")
            .field("ids", &self.ids)
            .field("active", &self.active)
            .field("order", &self.order)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Shared(Arc<MemorySlot>);

    impl DurableSlot for Shared {
        fn read(&self) -> Result<Option<String>> {
            self.0.read()
        }

        fn write(&self, value: &str) -> Result<()> {
            self.0.write(value)
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "chatstream-index-{}-{}",
            std::process::id(),
            name
        ))
    }

    #[test]
    fn empty_slot_opens_empty() {
        let index = SessionIndex::open(MemorySlot::new(), SessionOrder::NewestFirst).unwrap();
        assert!(index.is_empty());
        assert!(index.active().is_none());
    }

    #[test]
    fn add_persists_in_creation_order() {
        let slot = Arc::new(MemorySlot::new());
        let mut index =
            SessionIndex::open(Shared(Arc::clone(&slot)), SessionOrder::NewestFirst).unwrap();
        index.add(SessionId::new("a")).unwrap();
        index.add(SessionId::new("b")).unwrap();
        index.add(SessionId::new("a")).unwrap();

        assert_eq!(slot.read().unwrap().unwrap(), r#"["a","b"]"#);
        assert_eq!(
            index.sessions(),
            vec![&SessionId::new("b"), &SessionId::new("a")]
        );
    }

    #[test]
    fn oldest_first_order() {
        let slot = MemorySlot::with_value(r#"["a","b","c"]"#);
        let index = SessionIndex::open(slot, SessionOrder::OldestFirst).unwrap();
        assert_eq!(index.nth(1), Some(&SessionId::new("a")));
        assert_eq!(index.nth(3), Some(&SessionId::new("c")));
        assert_eq!(index.nth(0), None);
        assert_eq!(index.nth(4), None);
        assert_eq!(index.latest(), Some(&SessionId::new("c")));
    }

    #[test]
    fn duplicates_in_storage_are_collapsed() {
        let slot = MemorySlot::with_value(r#"["a","b","a"]"#);
        let index = SessionIndex::open(slot, SessionOrder::OldestFirst).unwrap();
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn active_must_be_known() {
        let slot = MemorySlot::with_value(r#"["a"]"#);
        let mut index = SessionIndex::open(slot, SessionOrder::NewestFirst).unwrap();

        let err = index.set_active(&SessionId::new("zzz")).unwrap_err();
        assert!(err.is_not_found());
        assert!(index.active().is_none());

        index.set_active(&SessionId::new("a")).unwrap();
        assert_eq!(index.active(), Some(&SessionId::new("a")));
        index.clear_active();
        assert!(index.active().is_none());
    }

    #[test]
    fn corrupt_slot_is_an_error() {
        let slot = MemorySlot::with_value("{not a list");
        assert!(SessionIndex::open(slot, SessionOrder::NewestFirst).is_err());
    }

    #[test]
    fn file_slot_round_trip() {
        let path = temp_path("round-trip.json");
        let _ = fs::remove_file(&path);

        let mut index =
            SessionIndex::open(FileSlot::new(&path), SessionOrder::NewestFirst).unwrap();
        index.add(SessionId::new("first")).unwrap();
        index.add(SessionId::new("second")).unwrap();

        let reopened = SessionIndex::open(FileSlot::new(&path), SessionOrder::OldestFirst).unwrap();
        assert_eq!(
            reopened.sessions(),
            vec![&SessionId::new("first"), &SessionId::new("second")]
        );
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn missing_file_reads_as_none() {
        let slot = FileSlot::new(temp_path("does-not-exist.json"));
        assert!(slot.read().unwrap().is_none());
    }
}
