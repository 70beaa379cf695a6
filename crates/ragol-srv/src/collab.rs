//! External collaborators. The server core never owns account data, quest
//! bytes, or chat-command behavior; it talks to these through trait handles
//! injected at construction, so tests run with in-memory implementations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// One account, as stored by whatever backs the license store.
#[derive(Debug, Clone)]
pub struct License {
    pub serial_number: u32,
    pub access_key: String,
    pub gc_password: Option<String>,
}

pub trait LicenseStore: Send + Sync {
    /// Authoritative account lookup.
    fn lookup(&self, serial_number: u32) -> Option<Arc<License>>;
}

/// In-memory store used by tests and by proxies that carry a single license.
#[derive(Default)]
pub struct MemoryLicenseStore {
    licenses: HashMap<u32, Arc<License>>,
}

impl MemoryLicenseStore {
    pub fn with(licenses: impl IntoIterator<Item = License>) -> Self {
        Self {
            licenses: licenses
                .into_iter()
                .map(|l| (l.serial_number, Arc::new(l)))
                .collect(),
        }
    }
}

impl LicenseStore for MemoryLicenseStore {
    fn lookup(&self, serial_number: u32) -> Option<Arc<License>> {
        self.licenses.get(&serial_number).cloned()
    }
}

#[derive(Debug, Clone)]
pub struct QuestInfo {
    pub quest_id: u32,
    pub name: String,
    pub short_description: String,
}

pub trait QuestRepository: Send + Sync {
    fn list(&self) -> Vec<QuestInfo>;
    fn get(&self, quest_id: u32) -> Option<(QuestInfo, Arc<Vec<u8>>)>;
}

/// Chat lines starting with `$` (possibly behind a color code) go here
/// instead of being relayed.
pub trait ChatCommandHandler: Send + Sync {
    fn handle(&self, session: &mut dyn ChatContext, text: &str);
}

/// What a chat command is allowed to touch. Kept narrow on purpose; the
/// interpreter itself lives outside the core.
pub trait ChatContext {
    fn reply(&mut self, text: &str);
}

/// A chat handler that swallows everything. Useful default.
pub struct NullChatHandler;

impl ChatCommandHandler for NullChatHandler {
    fn handle(&self, session: &mut dyn ChatContext, _text: &str) {
        session.reply("Unknown command");
    }
}

/// Read-mostly file cache: the first read loads and pins the contents for
/// process lifetime, later reads return the same immutable buffer.
pub struct FileContentsCache {
    loader: Box<dyn Fn(&str) -> std::io::Result<Vec<u8>> + Send + Sync>,
    cache: Mutex<HashMap<String, Arc<Vec<u8>>>>,
}

impl FileContentsCache {
    pub fn new(loader: impl Fn(&str) -> std::io::Result<Vec<u8>> + Send + Sync + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Cache backed by the filesystem.
    pub fn from_disk() -> Self {
        Self::new(|path| std::fs::read(path))
    }

    /// Cache preloaded with fixed contents; lookups outside the map fail.
    pub fn fixed(files: impl IntoIterator<Item = (String, Vec<u8>)>) -> Self {
        let map: HashMap<String, Vec<u8>> = files.into_iter().collect();
        Self::new(move |path| {
            map.get(path)
                .cloned()
                .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, path.to_string()))
        })
    }

    pub fn get(&self, path: &str) -> std::io::Result<Arc<Vec<u8>>> {
        let mut cache = self.cache.lock().expect("file cache poisoned");
        if let Some(data) = cache.get(path) {
            return Ok(data.clone());
        }
        let data = Arc::new((self.loader)(path)?);
        cache.insert(path.to_string(), data.clone());
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_pins_first_read() {
        let cache = FileContentsCache::fixed([("a.bin".to_string(), vec![1, 2, 3])]);
        let first = cache.get("a.bin").unwrap();
        let second = cache.get("a.bin").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(cache.get("missing.bin").is_err());
    }

    #[test]
    fn memory_store_lookup() {
        let store = MemoryLicenseStore::with([License {
            serial_number: 1001,
            access_key: "key".into(),
            gc_password: None,
        }]);
        assert!(store.lookup(1001).is_some());
        assert!(store.lookup(9).is_none());
    }
}
