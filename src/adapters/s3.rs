use std::{
    io::{self, Read},
    pin::Pin,
    time::{Duration, SystemTime},
};

use aws_sdk_s3::{
    error::DisplayErrorContext,
    primitives::{ByteStream, DateTime},
    types::{Delete, ObjectIdentifier},
};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{
    adapters::{ObjectBody, ObjectClient},
    model,
    util::{self, cancel::CancellationToken},
};

fn modified_time(last_modified: Option<&DateTime>) -> SystemTime {
    match last_modified {
        Some(dt) if dt.secs() >= 0 => {
            SystemTime::UNIX_EPOCH + Duration::new(dt.secs() as u64, dt.subsec_nanos())
        }
        _ => SystemTime::UNIX_EPOCH,
    }
}

/// Blocking view of a `GetObject` response body.
///
/// Failures surface as `FSError` wrapped in an `io::Error`: `Cancelled` once
/// the token fires, `Client` when the transfer itself breaks.
struct S3Body {
    key: String,
    inner: Pin<Box<dyn AsyncRead + Send>>,
    cancel: CancellationToken,
}

impl Read for S3Body {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match util::poll::poll_until_cancelled(self.inner.read(buf), &self.cancel)? {
            Ok(read) => Ok(read),
            Err(err) => Err(model::fs::FSError::client(format!(
                "failed to read body: {}, {}",
                self.key, err
            ))
            .into()),
        }
    }
}

impl ObjectClient for aws_sdk_s3::Client {
    fn fs_head_object(
        &self,
        bucket: &str,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<model::fs::FSObject, model::fs::FSError> {
        let req = self.head_object().bucket(bucket).key(key);

        let ho = match util::poll::poll_until_cancelled(req.send(), cancel)? {
            Err(err) => {
                if let Some(svc_err) = err.as_service_error() {
                    if svc_err.is_not_found() {
                        return Err(model::fs::FSError::not_found(key));
                    }
                }

                return Err(model::fs::FSError::client(format!(
                    "failed to head_object: {}, {}",
                    key,
                    DisplayErrorContext(&err)
                )));
            }
            Ok(ho) => ho,
        };

        Ok(model::fs::FSObject {
            key: key.to_string(),
            size: ho.content_length().unwrap_or(0).max(0) as u64,
            modified_time: modified_time(ho.last_modified()),
        })
    }

    fn fs_get_object(
        &self,
        bucket: &str,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<ObjectBody, model::fs::FSError> {
        let req = self.get_object().bucket(bucket).key(key);

        let o = match util::poll::poll_until_cancelled(req.send(), cancel)? {
            Err(err) => {
                if let Some(svc_err) = err.as_service_error() {
                    if svc_err.is_no_such_key() {
                        return Err(model::fs::FSError::not_found(key));
                    }
                }

                return Err(model::fs::FSError::client(format!(
                    "failed to get_object: {}, {}",
                    key,
                    DisplayErrorContext(&err)
                )));
            }
            Ok(o) => o,
        };

        Ok(Box::new(S3Body {
            key: key.to_string(),
            inner: Box::pin(o.body.into_async_read()),
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
        let req = self
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body));

        util::poll::poll_until_cancelled(req.send(), cancel)?.map_err(|err| {
            model::fs::FSError::client(format!(
                "failed to put_object at: {}, {}",
                key,
                DisplayErrorContext(&err)
            ))
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
        let req = self
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .set_delimiter(delimiter.map(|d| d.to_string()))
            .set_continuation_token(continuation_token);

        let lo = util::poll::poll_until_cancelled(req.send(), cancel)?.map_err(|err| {
            model::fs::FSError::client(format!(
                "failed to list_objects at: {}, {}",
                prefix,
                DisplayErrorContext(&err)
            ))
        })?;

        let common_prefixes = lo
            .common_prefixes()
            .iter()
            .filter_map(|cp| cp.prefix().map(|p| p.to_string()))
            .collect();

        let objects = lo
            .contents()
            .iter()
            .map(|o| model::fs::FSObject {
                key: o.key().unwrap_or("").to_string(),
                size: o.size().unwrap_or(0).max(0) as u64,
                modified_time: modified_time(o.last_modified()),
            })
            .collect();

        Ok(model::fs::FSListing {
            common_prefixes,
            objects,
            next_token: lo.next_continuation_token().map(|tok| tok.to_string()),
        })
    }

    fn fs_delete_objects(
        &self,
        bucket: &str,
        keys: &[String],
        cancel: &CancellationToken,
    ) -> Result<model::fs::FSDeletion, model::fs::FSError> {
        let build_err = |err: aws_sdk_s3::error::BuildError| {
            model::fs::FSError::client(format!("failed to build delete_objects request: {}", err))
        };

        let objects = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(build_err)?;

        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(false)
            .build()
            .map_err(build_err)?;

        let req = self.delete_objects().bucket(bucket).delete(delete);

        let out = util::poll::poll_until_cancelled(req.send(), cancel)?.map_err(|err| {
            model::fs::FSError::client(format!(
                "failed to delete_objects: {} keys, {}",
                keys.len(),
                DisplayErrorContext(&err)
            ))
        })?;

        Ok(model::fs::FSDeletion {
            deleted: out
                .deleted()
                .iter()
                .filter_map(|d| d.key().map(|k| k.to_string()))
                .collect(),
            failed: out
                .errors()
                .iter()
                .filter_map(|e| {
                    let reason = format!(
                        "{}: {}",
                        e.code().unwrap_or("Unknown"),
                        e.message().unwrap_or("")
                    );
                    e.key().map(|k| (k.to_string(), reason))
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::task::{Context, Poll};

    use tokio::io::ReadBuf;

    use super::*;
    use crate::util::cancel::CancellationSource;

    struct ResetReader;

    impl AsyncRead for ResetReader {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset",
            )))
        }
    }

    fn body(inner: Pin<Box<dyn AsyncRead + Send>>, cancel: CancellationToken) -> S3Body {
        S3Body {
            key: "folder/sample.txt".to_string(),
            inner,
            cancel,
        }
    }

    #[test]
    fn test_body_read() {
        let mut data = Vec::new();
        body(Box::pin(&b"hello"[..]), CancellationToken::none())
            .read_to_end(&mut data)
            .unwrap();

        assert_eq!(data, b"hello");
    }

    #[test]
    fn test_body_read_cancelled_does_not_retry() {
        let source = CancellationSource::new();
        source.cancel();

        let err = body(Box::pin(&b"hello"[..]), source.token())
            .read_to_end(&mut Vec::new())
            .unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::Other);
        assert!(model::fs::FSError::from(err).is_cancelled());
    }

    #[test]
    fn test_body_transfer_failure_is_client_error() {
        let err = body(Box::pin(ResetReader), CancellationToken::none())
            .read_to_end(&mut Vec::new())
            .unwrap_err();

        assert!(matches!(
            model::fs::FSError::from(err),
            model::fs::FSError::Client { .. }
        ));
    }

    #[test]
    fn test_modified_time() {
        let cases = vec![
            (None, SystemTime::UNIX_EPOCH),
            (
                Some(DateTime::from_secs(1_700_000_000)),
                SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000),
            ),
            (
                Some(DateTime::from_secs_and_nanos(10, 500)),
                SystemTime::UNIX_EPOCH + Duration::new(10, 500),
            ),
            (Some(DateTime::from_secs(-5)), SystemTime::UNIX_EPOCH),
        ];

        for (input, expected) in cases {
            assert_eq!(
                modified_time(input.as_ref()),
                expected,
                "failed for case: {:?}",
                input
            );
        }
    }
}
