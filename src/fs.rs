use std::{
    io::{Cursor, Read},
    sync::Arc,
};

use tracing::debug;

use crate::{
    adapters::ObjectClient,
    model::fs::{FSError, FileInfo},
    util::{cancel::CancellationToken, pager::ListPager, stream},
};

pub const DEFAULT_DELIMITER: &str = "/";
pub const DEFAULT_COPY_BUFFER_SIZE: usize = 64 * 1024;
/// Largest batch a single S3 `DeleteObjects` request accepts.
pub const DEFAULT_DELETE_BATCH_SIZE: usize = 1000;

/// A caller-owned copy of an object's content, positioned at the start.
pub type FileStream = Cursor<Vec<u8>>;

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub delimiter: String,
    pub copy_buffer_size: usize,
    pub delete_batch_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER.to_string(),
            copy_buffer_size: DEFAULT_COPY_BUFFER_SIZE,
            delete_batch_size: DEFAULT_DELETE_BATCH_SIZE,
        }
    }
}

/// Hierarchical view over a flat bucket.
///
/// Holds only immutable configuration, so clones are cheap and the value can
/// be shared between threads freely. Directories are never written; they are
/// derived from key prefixes on every call.
#[derive(Clone)]
pub struct ObjectFS {
    pub client: Arc<dyn ObjectClient>,
    pub bucket: String,
    pub config: StorageConfig,
    pub cancel: CancellationToken,
}

impl ObjectFS {
    pub fn new(client: Arc<dyn ObjectClient>, bucket: &str) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
            config: StorageConfig::default(),
            cancel: CancellationToken::none(),
        }
    }

    pub fn with_config(mut self, config: StorageConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns a handle whose every request observes `cancel`.
    pub fn with_cancellation(&self, cancel: CancellationToken) -> Self {
        Self {
            cancel,
            ..self.clone()
        }
    }

    pub fn is_root(&self, path: &str) -> bool {
        path.is_empty() || path == self.config.delimiter
    }

    /// Maps a directory path onto the key prefix its children share.
    ///
    /// The root maps to the empty prefix; any other path is terminated with
    /// the delimiter so `a` never matches `ab.txt`.
    pub fn directory_prefix(&self, path: &str) -> String {
        if self.is_root(path) {
            return String::new();
        }

        if path.ends_with(self.config.delimiter.as_str()) {
            path.to_string()
        } else {
            format!("{}{}", path, self.config.delimiter)
        }
    }

    /// Prefix for a one-level listing of `path`.
    ///
    /// The root lists from the empty prefix; any other path is used as given,
    /// so `a` groups `a/...` into the common prefix `a/` next to `ab.txt`.
    pub fn listing_prefix<'a>(&self, path: &'a str) -> &'a str {
        if self.is_root(path) {
            ""
        } else {
            path
        }
    }

    pub fn pages<'a>(&'a self, prefix: &'a str, delimited: bool) -> ListPager<'a> {
        let delimiter = if delimited {
            Some(self.config.delimiter.as_str())
        } else {
            None
        };

        ListPager::new(
            self.client.as_ref(),
            &self.bucket,
            prefix,
            delimiter,
            &self.cancel,
        )
    }

    /// Immediate children of `prefix`: one entry per common prefix, then one
    /// per literal object, page by page in store order.
    pub fn list_children(&self, prefix: &str) -> Result<Vec<FileInfo>, FSError> {
        let mut files = Vec::new();
        let is_folder = prefix.ends_with(self.config.delimiter.as_str());

        for page in self.pages(prefix, true) {
            let page = page?;

            files.extend(page.common_prefixes.into_iter().map(FileInfo::directory));
            files.extend(
                page.objects
                    .into_iter()
                    // `a/` listed under `a/` is a folder marker, not a child
                    .filter(|object| !(is_folder && object.key == prefix))
                    .map(FileInfo::file),
            );
        }

        debug!(prefix = prefix, count = files.len(), "listed children");
        Ok(files)
    }

    /// Removes every key under `prefix`.
    ///
    /// Keys are enumerated in full before the first delete, then removed in
    /// batches of `delete_batch_size`. Nothing is atomic: once any key is gone,
    /// a later failure surfaces as `PartialDeletion` listing the keys confirmed
    /// deleted and the ones that may still exist. Returns the number deleted.
    pub fn delete_prefix(&self, prefix: &str) -> Result<usize, FSError> {
        let keys = self
            .pages(prefix, false)
            .keys()
            .collect::<Result<Vec<_>, _>>()?;

        if keys.is_empty() {
            debug!(prefix = prefix, "nothing to delete");
            return Ok(0);
        }

        let mut deleted: Vec<String> = Vec::with_capacity(keys.len());
        let mut refused: Vec<(String, String)> = Vec::new();

        for (i, batch) in keys.chunks(self.config.delete_batch_size.max(1)).enumerate() {
            let result = match self.client.fs_delete_objects(&self.bucket, batch, &self.cancel) {
                Ok(result) => result,
                Err(err) if deleted.is_empty() && refused.is_empty() => return Err(err),
                Err(err) => {
                    let done = deleted.len() + refused.len();
                    let mut remaining: Vec<String> =
                        refused.into_iter().map(|(key, _)| key).collect();
                    remaining.extend(keys[done..].iter().cloned());

                    return Err(FSError::PartialDeletion {
                        prefix: prefix.to_string(),
                        deleted,
                        remaining,
                        message: err.to_string(),
                    });
                }
            };

            debug!(
                prefix = prefix,
                batch = i,
                deleted = result.deleted.len(),
                failed = result.failed.len(),
                "deleted batch"
            );
            deleted.extend(result.deleted);
            refused.extend(result.failed);
        }

        if let Some((_, reason)) = refused.first() {
            return Err(FSError::PartialDeletion {
                prefix: prefix.to_string(),
                message: reason.clone(),
                deleted,
                remaining: refused.into_iter().map(|(key, _)| key).collect(),
            });
        }

        Ok(deleted.len())
    }

    /// Copies the object at `key` into an owned buffer.
    ///
    /// The live body is released before this returns, on success and on
    /// every error path.
    pub fn download(&self, key: &str) -> Result<FileStream, FSError> {
        let mut body = self.client.fs_get_object(&self.bucket, key, &self.cancel)?;

        let mut buffer = Vec::new();
        let copied = stream::copy_bounded(
            &mut body,
            &mut buffer,
            self.config.copy_buffer_size,
            &self.cancel,
        )?;
        drop(body);

        debug!(key = key, size = copied, "downloaded object");
        Ok(Cursor::new(buffer))
    }

    /// Drains `content` and writes it to `key` as one whole-object put.
    ///
    /// Cancellation while draining never issues the put. Cancellation while
    /// the put is in flight drops the request and returns `Cancelled`, but the
    /// store may already have applied the write; callers that need certainty
    /// must check the key afterwards.
    pub fn upload(&self, key: &str, content: &mut dyn Read) -> Result<u64, FSError> {
        let mut body = Vec::new();
        let copied = stream::copy_bounded(
            content,
            &mut body,
            self.config.copy_buffer_size,
            &self.cancel,
        )?;

        self.client
            .fs_put_object(&self.bucket, key, body, &self.cancel)?;

        debug!(key = key, size = copied, "uploaded object");
        Ok(copied)
    }
}
