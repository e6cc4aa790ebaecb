use std::{
    io::{self, Read},
    pin::Pin,
    time::SystemTime,
};

use futures::{Stream, StreamExt};
use google_cloud_storage::http::{
    self,
    objects::{
        delete::DeleteObjectRequest,
        download::Range,
        get::GetObjectRequest,
        list::ListObjectsRequest,
        upload::{Media, UploadObjectRequest, UploadType},
        Object,
    },
};

use crate::{
    adapters::{ObjectBody, ObjectClient},
    model,
    util::{self, cancel::CancellationToken},
};

fn is_not_found(err: &http::Error) -> bool {
    matches!(err, http::Error::Response(resp) if resp.code == 404)
}

fn to_fs_object(obj: Object) -> model::fs::FSObject {
    model::fs::FSObject {
        key: obj.name,
        size: obj.size.max(0) as u64,
        modified_time: obj
            .updated
            .map(SystemTime::from)
            .unwrap_or(SystemTime::UNIX_EPOCH),
    }
}

type ChunkStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, String>> + Send>>;

/// Blocking view of a streamed download; keeps the unread tail of the last chunk.
///
/// Failures surface as `FSError` wrapped in an `io::Error`, as for S3 bodies.
struct GcsBody {
    key: String,
    chunks: ChunkStream,
    pending: Vec<u8>,
    offset: usize,
    cancel: CancellationToken,
}

impl Read for GcsBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.offset == self.pending.len() {
            match util::poll::poll_until_cancelled(self.chunks.next(), &self.cancel)? {
                None => return Ok(0),
                Some(Err(message)) => {
                    return Err(model::fs::FSError::client(format!(
                        "failed to read body: {}, {}",
                        self.key, message
                    ))
                    .into());
                }
                Some(Ok(chunk)) => {
                    self.pending = chunk;
                    self.offset = 0;
                }
            }
        }

        let len = buf.len().min(self.pending.len() - self.offset);
        buf[..len].copy_from_slice(&self.pending[self.offset..self.offset + len]);
        self.offset += len;

        Ok(len)
    }
}

impl ObjectClient for google_cloud_storage::client::Client {
    fn fs_head_object(
        &self,
        bucket: &str,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<model::fs::FSObject, model::fs::FSError> {
        let req = GetObjectRequest {
            bucket: bucket.to_string(),
            object: key.to_string(),
            ..Default::default()
        };

        match util::poll::poll_until_cancelled(self.get_object(&req), cancel)? {
            Err(err) if is_not_found(&err) => Err(model::fs::FSError::not_found(key)),
            Err(err) => Err(model::fs::FSError::client(format!(
                "failed to head_object: {}, {}",
                key, err
            ))),
            Ok(obj) => Ok(to_fs_object(obj)),
        }
    }

    fn fs_get_object(
        &self,
        bucket: &str,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<ObjectBody, model::fs::FSError> {
        let req = GetObjectRequest {
            bucket: bucket.to_string(),
            object: key.to_string(),
            ..Default::default()
        };

        let stream = match util::poll::poll_until_cancelled(
            self.download_streamed_object(&req, &Range::default()),
            cancel,
        )? {
            Err(err) if is_not_found(&err) => return Err(model::fs::FSError::not_found(key)),
            Err(err) => {
                return Err(model::fs::FSError::client(format!(
                    "failed to download_object: {}, {}",
                    key, err
                )));
            }
            Ok(stream) => stream,
        };

        let chunks: ChunkStream = Box::pin(stream.map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|err| err.to_string())
        }));

        Ok(Box::new(GcsBody {
            key: key.to_string(),
            chunks,
            pending: Vec::new(),
            offset: 0,
            cancel: cancel.clone(),
        }))
    }

    fn fs_put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<(), model::fs::FSError> {
        let req = UploadObjectRequest {
            bucket: bucket.to_string(),
            ..Default::default()
        };

        util::poll::poll_until_cancelled(
            self.upload_object(&req, body, &UploadType::Simple(Media::new(key.to_string()))),
            cancel,
        )?
        .map_err(|err| {
            model::fs::FSError::client(format!("failed to put_object at: {}, {}", key, err))
        })?;

        Ok(())
    }

    fn fs_list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        continuation_token: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<model::fs::FSListing, model::fs::FSError> {
        let req = ListObjectsRequest {
            bucket: bucket.to_string(),
            prefix: Some(prefix.to_string()),
            delimiter: delimiter.map(|d| d.to_string()),
            page_token: continuation_token,
            ..Default::default()
        };

        let lo = util::poll::poll_until_cancelled(self.list_objects(&req), cancel)?.map_err(
            |err| model::fs::FSError::client(format!("failed to list_objects at: {}, {}", prefix, err)),
        )?;

        Ok(model::fs::FSListing {
            common_prefixes: lo.prefixes.unwrap_or_default(),
            objects: lo
                .items
                .unwrap_or_default()
                .into_iter()
                .map(to_fs_object)
                .collect(),
            next_token: lo.next_page_token,
        })
    }

    /// GCS has no bulk delete, so keys are removed one request at a time.
    fn fs_delete_objects(
        &self,
        bucket: &str,
        keys: &[String],
        cancel: &CancellationToken,
    ) -> Result<model::fs::FSDeletion, model::fs::FSError> {
        let mut deletion = model::fs::FSDeletion::default();

        for (i, key) in keys.iter().enumerate() {
            let req = DeleteObjectRequest {
                bucket: bucket.to_string(),
                object: key.clone(),
                ..Default::default()
            };

            match util::poll::poll_until_cancelled(self.delete_object(&req), cancel) {
                Err(err) => {
                    if deletion.deleted.is_empty() && deletion.failed.is_empty() {
                        return Err(err);
                    }
                    // keys of this batch already gone must still be reported
                    deletion.failed.extend(
                        keys[i..]
                            .iter()
                            .map(|key| (key.clone(), err.to_string())),
                    );
                    break;
                }
                Ok(Err(err)) if is_not_found(&err) => deletion.deleted.push(key.clone()),
                Ok(Err(err)) => deletion.failed.push((key.clone(), err.to_string())),
                Ok(Ok(())) => deletion.deleted.push(key.clone()),
            }
        }

        Ok(deletion)
    }
}
