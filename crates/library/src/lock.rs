//! One shared database per store root.
//!
//! Every [`Library`](crate::Library) opened on the same store root in this
//! process shares one `Mutex<Database>`. Mutating operations hold it for their
//! whole duration, so two ingestions (or an ingestion and a deletion) never
//! interleave and never overwrite each other's save.

use slotkeeper_database::Database;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex as StdMutex, PoisonError, Weak};
use tokio::sync::Mutex;

pub(crate) type SharedDatabase = Arc<Mutex<Database>>;

static STORES: LazyLock<StdMutex<HashMap<PathBuf, Weak<Mutex<Database>>>>> = LazyLock::new(Default::default);

/// The database shared by everyone using `root`, loading it from `database`
/// if nobody has it open yet.
pub(crate) fn shared_database(root: &Path, database: &Path) -> SharedDatabase {
    let key = canonical(root);
    // The map only holds weak handles; a poisoned lock can't leave it in a
    // state that matters.
    let mut stores = STORES.lock().unwrap_or_else(PoisonError::into_inner);
    stores.retain(|_, weak| weak.strong_count() > 0);
    if let Some(shared) = stores.get(&key).and_then(Weak::upgrade) {
        tracing::debug!(root = %key.display(), "Reusing open database for store");
        return shared;
    }
    let shared = Arc::new(Mutex::new(Database::load(database)));
    stores.insert(key, Arc::downgrade(&shared));
    shared
}

/// Canonical form of a store root, so `./card` and `/abs/card` share a lock.
/// A root that doesn't exist yet is made absolute instead.
fn canonical(root: &Path) -> PathBuf {
    root.canonicalize()
        .or_else(|_| std::path::absolute(root))
        .unwrap_or_else(|_| root.to_path_buf())
}
