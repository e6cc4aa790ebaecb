use std::io::Read;

use tracing::{info, span, Level};

use crate::{
    fs::{FileStream, ObjectFS},
    model::fs::{FSError, FileInfo},
};

/// File-system shaped access to stored documents.
///
/// Only `file_exists` turns a missing key into a value; every other method
/// reports it as `FSError::NotFound`. Failures from the backing store are
/// passed through with their classification intact.
pub trait FileStorage {
    fn file_exists(&self, path: &str) -> Result<bool, FSError>;

    /// Returns an owned copy of the content; later writes to `path` do not
    /// affect it.
    fn get_file(&self, path: &str) -> Result<FileStream, FSError>;

    /// Replaces whatever is stored at `path` with the full content of `content`.
    ///
    /// A `Cancelled` result does not prove the old content survived: the
    /// write may have reached the store before the request was dropped.
    fn save_file(&self, path: &str, content: &mut dyn Read) -> Result<(), FSError>;

    fn get_file_info(&self, path: &str) -> Result<FileInfo, FSError>;

    /// Lists one level below `path`, which is used as the key prefix as
    /// given; pass `a/` for the children of directory `a`. Only the root
    /// (`""` or the bare delimiter) is special. An unknown directory is simply
    /// empty.
    fn get_files_info(&self, path: &str) -> Result<Vec<FileInfo>, FSError>;

    fn get_root_files_info(&self) -> Result<Vec<FileInfo>, FSError>;

    /// Removes every file below `path`. Removing an empty or unknown
    /// directory succeeds.
    fn delete_directory(&self, path: &str) -> Result<(), FSError>;
}

impl FileStorage for ObjectFS {
    fn file_exists(&self, path: &str) -> Result<bool, FSError> {
        let span = span!(Level::INFO, "file_exists", context = "file_exists");
        let _e = span.enter();
        info!(bucket = %self.bucket, path = path, "called");

        match self.client.fs_head_object(&self.bucket, path, &self.cancel) {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn get_file(&self, path: &str) -> Result<FileStream, FSError> {
        let span = span!(Level::INFO, "get_file", context = "get_file");
        let _e = span.enter();
        info!(bucket = %self.bucket, path = path, "called");

        self.download(path)
    }

    fn save_file(&self, path: &str, content: &mut dyn Read) -> Result<(), FSError> {
        let span = span!(Level::INFO, "save_file", context = "save_file");
        let _e = span.enter();
        info!(bucket = %self.bucket, path = path, "called");

        self.upload(path, content)?;
        Ok(())
    }

    fn get_file_info(&self, path: &str) -> Result<FileInfo, FSError> {
        let span = span!(Level::INFO, "get_file_info", context = "get_file_info");
        let _e = span.enter();
        info!(bucket = %self.bucket, path = path, "called");

        let object = self.client.fs_head_object(&self.bucket, path, &self.cancel)?;

        Ok(FileInfo {
            path: path.to_string(),
            ..FileInfo::file(object)
        })
    }

    fn get_files_info(&self, path: &str) -> Result<Vec<FileInfo>, FSError> {
        let span = span!(Level::INFO, "get_files_info", context = "get_files_info");
        let _e = span.enter();
        info!(bucket = %self.bucket, path = path, "called");

        self.list_children(self.listing_prefix(path))
    }

    fn get_root_files_info(&self) -> Result<Vec<FileInfo>, FSError> {
        let span = span!(Level::INFO, "get_root_files_info", context = "get_root_files_info");
        let _e = span.enter();
        info!(bucket = %self.bucket, "called");

        self.list_children("")
    }

    fn delete_directory(&self, path: &str) -> Result<(), FSError> {
        let span = span!(Level::INFO, "delete_directory", context = "delete_directory");
        let _e = span.enter();
        info!(bucket = %self.bucket, path = path, "called");

        let deleted = self.delete_prefix(&self.directory_prefix(path))?;
        info!(deleted = deleted, "deleted directory");

        Ok(())
    }
}
