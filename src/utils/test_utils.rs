use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::sync::{Mutex, MutexGuard, OnceLock};

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

/// Serializes tests that touch process environment variables and restores
/// every variable it changed when dropped.
pub struct TestEnvVarGuard {
    originals: HashMap<OsString, Option<OsString>>,
    _lock: MutexGuard<'static, ()>,
}

impl TestEnvVarGuard {
    pub fn new() -> Self {
        let lock = env_lock()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Self {
            originals: HashMap::new(),
            _lock: lock,
        }
    }

    fn remember(&mut self, key: &OsStr) {
        self.originals
            .entry(key.to_os_string())
            .or_insert_with(|| std::env::var_os(key));
    }

    pub fn set_var<K: AsRef<OsStr>, V: AsRef<OsStr>>(&mut self, key: K, value: V) {
        self.remember(key.as_ref());
        std::env::set_var(key, value);
    }

    pub fn remove_var<K: AsRef<OsStr>>(&mut self, key: K) {
        self.remember(key.as_ref());
        std::env::remove_var(key);
    }
}

impl Drop for TestEnvVarGuard {
    fn drop(&mut self) {
        for (key, value) in self.originals.drain() {
            match value {
                Some(value) => std::env::set_var(&key, value),
                None => std::env::remove_var(&key),
            }
        }
    }
}
