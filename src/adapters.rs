use std::io::Read;

use crate::{model, util::cancel::CancellationToken};

pub mod gcs;
pub mod mock;
pub mod s3;

/// A live, single-use object body. Dropping it releases the underlying response.
pub type ObjectBody = Box<dyn Read + Send>;

/// The object-store primitives the storage adapter is built on.
///
/// Implementations report a missing key as `FSError::NotFound` and every other
/// failure as `FSError::Client` with the provider's message intact. They never
/// retry on the adapter's behalf. The token must be forwarded to every request
/// the implementation issues.
pub trait ObjectClient: Send + Sync {
    fn fs_head_object(
        &self,
        bucket: &str,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<model::fs::FSObject, model::fs::FSError>;

    fn fs_get_object(
        &self,
        bucket: &str,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<ObjectBody, model::fs::FSError>;

    /// Writes the whole object in one request, replacing any existing object.
    fn fs_put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<(), model::fs::FSError>;

    /// Fetches one page. With a delimiter, keys that continue past it below
    /// `prefix` are folded into `common_prefixes`.
    fn fs_list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        continuation_token: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<model::fs::FSListing, model::fs::FSError>;

    /// Deletes up to one batch of keys. Per-key refusals are reported in the
    /// result, not as an error.
    fn fs_delete_objects(
        &self,
        bucket: &str,
        keys: &[String],
        cancel: &CancellationToken,
    ) -> Result<model::fs::FSDeletion, model::fs::FSError>;
}
