//! In-memory object store with S3-like listing semantics.
//!
//! Keys are kept sorted, listings are paged at `page_size` entries (objects
//! plus common prefixes) and continuation tokens are the last key consumed.
//! Failures can be injected per key prefix to exercise error propagation.

use std::{
    collections::{BTreeMap, HashSet},
    io::{Cursor, Read},
    ops::Bound,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::SystemTime,
};

use crate::{
    adapters::{ObjectBody, ObjectClient},
    model::fs::{FSDeletion, FSError, FSListing, FSObject},
    util::cancel::{CancellationSource, CancellationToken},
};

const ACCESS_DENIED: &str = "AccessDenied: access denied";

#[derive(Clone, Debug)]
struct MockObject {
    data: Vec<u8>,
    modified_time: SystemTime,
}

pub struct MockClient {
    page_size: usize,
    objects: Mutex<BTreeMap<String, MockObject>>,
    denied: Mutex<HashSet<String>>,
    delete_budget: Mutex<Option<usize>>,
    cancel_after_deletes: Mutex<Option<(usize, CancellationSource)>>,
    open_bodies: Arc<AtomicUsize>,
    list_calls: AtomicUsize,
    put_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl MockClient {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            objects: Mutex::new(BTreeMap::new()),
            denied: Mutex::new(HashSet::new()),
            delete_budget: Mutex::new(None),
            cancel_after_deletes: Mutex::new(None),
            open_bodies: Arc::new(AtomicUsize::new(0)),
            list_calls: AtomicUsize::new(0),
            put_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
        }
    }

    /// Seeds an object without going through `fs_put_object`.
    pub fn insert(&self, key: &str, data: &[u8]) {
        self.lock_objects().insert(
            key.to_string(),
            MockObject {
                data: data.to_vec(),
                modified_time: SystemTime::now(),
            },
        );
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock_objects().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock_objects().keys().cloned().collect()
    }

    /// Every request touching a key under `prefix` fails as if permission was
    /// denied. Bulk deletes report those keys as failed instead.
    pub fn deny(&self, prefix: &str) {
        self.denied
            .lock()
            .expect("failed to acquire `denied` guard")
            .insert(prefix.to_string());
    }

    /// Lets `calls` more bulk deletes through; later ones fail outright.
    pub fn break_deletes_after(&self, calls: usize) {
        *self
            .delete_budget
            .lock()
            .expect("failed to acquire `delete_budget` guard") = Some(calls);
    }

    /// Fires `source` once `calls` bulk deletes have completed, as a caller
    /// cancelling between batches would.
    pub fn cancel_after_deletes(&self, calls: usize, source: CancellationSource) {
        *self
            .cancel_after_deletes
            .lock()
            .expect("failed to acquire `cancel_after_deletes` guard") = Some((calls, source));
    }

    pub fn open_bodies(&self) -> usize {
        self.open_bodies.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    fn lock_objects(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, MockObject>> {
        self.objects
            .lock()
            .expect("failed to acquire `objects` guard")
    }

    fn is_denied(&self, key: &str) -> bool {
        self.denied
            .lock()
            .expect("failed to acquire `denied` guard")
            .iter()
            .any(|prefix| key.starts_with(prefix.as_str()))
    }

    fn check(&self, key: &str, cancel: &CancellationToken) -> Result<(), FSError> {
        if cancel.is_cancelled() {
            return Err(FSError::Cancelled);
        }

        if self.is_denied(key) {
            return Err(FSError::client(format!("{}: {}", ACCESS_DENIED, key)));
        }

        Ok(())
    }
}

/// Body handed out by `fs_get_object`; tracks how many are still alive.
struct MockBody {
    data: Cursor<Vec<u8>>,
    open: Arc<AtomicUsize>,
}

impl Read for MockBody {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.data.read(buf)
    }
}

impl Drop for MockBody {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ObjectClient for MockClient {
    fn fs_head_object(
        &self,
        _bucket: &str,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<FSObject, FSError> {
        self.check(key, cancel)?;

        let objects = self.lock_objects();
        let object = objects.get(key).ok_or_else(|| FSError::not_found(key))?;

        Ok(FSObject {
            key: key.to_string(),
            size: object.data.len() as u64,
            modified_time: object.modified_time,
        })
    }

    fn fs_get_object(
        &self,
        _bucket: &str,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<ObjectBody, FSError> {
        self.check(key, cancel)?;

        let data = self
            .lock_objects()
            .get(key)
            .map(|object| object.data.clone())
            .ok_or_else(|| FSError::not_found(key))?;

        self.open_bodies.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockBody {
            data: Cursor::new(data),
            open: self.open_bodies.clone(),
        }))
    }

    fn fs_put_object(
        &self,
        _bucket: &str,
        key: &str,
        body: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<(), FSError> {
        self.check(key, cancel)?;
        self.put_calls.fetch_add(1, Ordering::SeqCst);

        self.lock_objects().insert(
            key.to_string(),
            MockObject {
                data: body,
                modified_time: SystemTime::now(),
            },
        );

        Ok(())
    }

    fn fs_list_objects(
        &self,
        _bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        continuation_token: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<FSListing, FSError> {
        self.check(prefix, cancel)?;
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let objects = self.lock_objects();
        let start = match continuation_token {
            Some(tok) => Bound::Excluded(tok),
            None => Bound::Unbounded,
        };

        let mut listing = FSListing::default();
        let mut entries = 0;
        let mut last_key: Option<String> = None;
        let mut current_prefix: Option<String> = None;

        for (key, object) in objects.range::<String, _>((start, Bound::Unbounded)) {
            if !key.starts_with(prefix) {
                continue;
            }

            let group = delimiter.filter(|d| !d.is_empty()).and_then(|d| {
                key[prefix.len()..]
                    .find(d)
                    .map(|idx| key[..prefix.len() + idx + d.len()].to_string())
            });

            if group.is_some() && group == current_prefix {
                last_key = Some(key.clone());
                continue;
            }

            if entries == self.page_size {
                listing.next_token = last_key;
                return Ok(listing);
            }

            match group {
                Some(common_prefix) => {
                    listing.common_prefixes.push(common_prefix.clone());
                    current_prefix = Some(common_prefix);
                }
                None => {
                    listing.objects.push(FSObject {
                        key: key.clone(),
                        size: object.data.len() as u64,
                        modified_time: object.modified_time,
                    });
                    current_prefix = None;
                }
            }

            entries += 1;
            last_key = Some(key.clone());
        }

        Ok(listing)
    }

    fn fs_delete_objects(
        &self,
        _bucket: &str,
        keys: &[String],
        cancel: &CancellationToken,
    ) -> Result<FSDeletion, FSError> {
        if cancel.is_cancelled() {
            return Err(FSError::Cancelled);
        }

        {
            let mut budget = self
                .delete_budget
                .lock()
                .expect("failed to acquire `delete_budget` guard");
            match budget.as_mut() {
                Some(0) => {
                    return Err(FSError::client("failed to delete_objects: connection reset"));
                }
                Some(remaining) => *remaining -= 1,
                None => {}
            }
        }
        let calls = self.delete_calls.fetch_add(1, Ordering::SeqCst) + 1;

        let mut objects = self.lock_objects();
        let mut deletion = FSDeletion::default();
        for key in keys {
            if self.is_denied(key) {
                deletion.failed.push((key.clone(), ACCESS_DENIED.to_string()));
                continue;
            }

            // Deleting a missing key succeeds, as it does on S3.
            objects.remove(key);
            deletion.deleted.push(key.clone());
        }

        if let Some((after, source)) = self
            .cancel_after_deletes
            .lock()
            .expect("failed to acquire `cancel_after_deletes` guard")
            .as_ref()
        {
            if calls >= *after {
                source.cancel();
            }
        }

        Ok(deletion)
    }
}
