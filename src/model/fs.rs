use std::time::SystemTime;

use thiserror::Error;

/// A file or synthetic directory as seen through the storage adapter.
///
/// For directories `size` is always 0 and `last_modified` is `None`; neither
/// carries meaning since directories are never stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileInfo {
    pub path: String,
    pub size: u64,
    pub last_modified: Option<SystemTime>,
    pub is_directory: bool,
}

impl FileInfo {
    pub fn file(object: FSObject) -> Self {
        Self {
            path: object.key,
            size: object.size,
            last_modified: Some(object.modified_time),
            is_directory: false,
        }
    }

    pub fn directory(prefix: impl Into<String>) -> Self {
        Self {
            path: prefix.into(),
            size: 0,
            last_modified: None,
            is_directory: true,
        }
    }
}

/// A literal object returned by a head or list call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FSObject {
    pub key: String,
    pub size: u64,
    pub modified_time: SystemTime,
}

/// One page of a prefix listing.
#[derive(Clone, Debug, Default)]
pub struct FSListing {
    pub common_prefixes: Vec<String>,
    pub objects: Vec<FSObject>,
    pub next_token: Option<String>,
}

/// Outcome of a single bulk delete call.
#[derive(Clone, Debug, Default)]
pub struct FSDeletion {
    pub deleted: Vec<String>,
    /// Keys the store refused to delete, with the reason it gave.
    pub failed: Vec<(String, String)>,
}

#[derive(Debug, Error)]
pub enum FSError {
    #[error("object not found: {key}")]
    NotFound { key: String },

    #[error("{message}")]
    Client { message: String },

    #[error(
        "failed to delete directory: {prefix}, {} deleted, {} remaining, {message}",
        .deleted.len(),
        .remaining.len()
    )]
    PartialDeletion {
        prefix: String,
        deleted: Vec<String>,
        remaining: Vec<String>,
        message: String,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("failed to copy stream: {message}")]
    Io { message: String },

    #[error("failed to parse bucket uri: {uri}")]
    InvalidUri { uri: String },
}

impl FSError {
    pub fn not_found(key: &str) -> Self {
        FSError::NotFound {
            key: key.to_string(),
        }
    }

    pub fn client(message: impl Into<String>) -> Self {
        FSError::Client {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FSError::NotFound { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FSError::Cancelled)
    }
}

/// Unwraps an `FSError` carried through a `Read`/`Write` boundary; any other
/// I/O failure becomes `Io`.
impl From<std::io::Error> for FSError {
    fn from(err: std::io::Error) -> Self {
        let message = err.to_string();

        match err.into_inner().map(|inner| inner.downcast::<FSError>()) {
            Some(Ok(fs_err)) => *fs_err,
            _ => FSError::Io { message },
        }
    }
}

/// Lets object bodies report store failures through `Read` without the
/// caller retrying them; the kind is never `Interrupted`.
impl From<FSError> for std::io::Error {
    fn from(err: FSError) -> Self {
        std::io::Error::new(std::io::ErrorKind::Other, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_info_shapes() {
        let modified_time = SystemTime::UNIX_EPOCH;
        let file = FileInfo::file(FSObject {
            key: "a/x.txt".to_string(),
            size: 13,
            modified_time,
        });

        assert_eq!(file.path, "a/x.txt");
        assert_eq!(file.size, 13);
        assert_eq!(file.last_modified, Some(modified_time));
        assert!(!file.is_directory);

        let dir = FileInfo::directory("a/b/");
        assert_eq!(dir.path, "a/b/");
        assert!(dir.is_directory);
        assert_eq!(dir.last_modified, None);
    }

    #[test]
    fn test_error_classification() {
        let cases = vec![
            (FSError::not_found("key"), true, false),
            (FSError::client("access denied"), false, false),
            (FSError::Cancelled, false, true),
        ];

        for (err, not_found, cancelled) in cases {
            assert_eq!(err.is_not_found(), not_found, "failed for case: {}", err);
            assert_eq!(err.is_cancelled(), cancelled, "failed for case: {}", err);
        }
    }

    #[test]
    fn test_io_error_round_trip() {
        let cases = vec![
            (FSError::Cancelled, "cancelled"),
            (FSError::client("failed to read body: key, reset"), "client"),
        ];

        for (err, expected) in cases {
            let io_err = std::io::Error::from(err);
            assert_eq!(io_err.kind(), std::io::ErrorKind::Other, "failed for case: {}", expected);

            let result = FSError::from(io_err);
            let group = match result {
                FSError::Cancelled => "cancelled",
                FSError::Client { .. } => "client",
                _ => "other",
            };
            assert_eq!(group, expected, "failed for case: {}", expected);
        }

        let plain = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        assert!(matches!(FSError::from(plain), FSError::Io { .. }));
    }

    #[test]
    fn test_partial_deletion_message() {
        let err = FSError::PartialDeletion {
            prefix: "a/".to_string(),
            deleted: vec!["a/x".to_string()],
            remaining: vec!["a/y".to_string(), "a/z".to_string()],
            message: "access denied".to_string(),
        };

        assert_eq!(
            err.to_string(),
            "failed to delete directory: a/, 1 deleted, 2 remaining, access denied"
        );
    }
}
