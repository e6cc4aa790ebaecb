use std::io::{ErrorKind, Read, Write};

use crate::{model::fs::FSError, util::cancel::CancellationToken};

pub const MIN_BUFFER_SIZE: usize = 4 * 1024;
pub const MAX_BUFFER_SIZE: usize = 64 * 1024;

/// Copies `input` into `output` through a single fixed-size buffer.
///
/// Memory held by the copy is `buffer_size` (clamped to 4..=64 KiB) regardless
/// of how much data flows through. Returns the number of bytes copied.
pub fn copy_bounded<R, W>(
    input: &mut R,
    output: &mut W,
    buffer_size: usize,
    cancel: &CancellationToken,
) -> Result<u64, FSError>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buffer = vec![0u8; buffer_size.clamp(MIN_BUFFER_SIZE, MAX_BUFFER_SIZE)];
    let mut copied = 0u64;

    loop {
        if cancel.is_cancelled() {
            return Err(FSError::Cancelled);
        }

        let read = match input.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };

        output.write_all(&buffer[..read])?;
        copied += read as u64;
    }

    output.flush()?;
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::util::cancel::CancellationSource;

    /// Hands out at most `chunk` bytes per read and records the largest request.
    struct ChunkedReader {
        data: Cursor<Vec<u8>>,
        chunk: usize,
        largest_request: usize,
    }

    impl Read for ChunkedReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.largest_request = self.largest_request.max(buf.len());
            let len = buf.len().min(self.chunk);
            self.data.read(&mut buf[..len])
        }
    }

    #[test]
    fn test_copy_bounded() {
        let cases = vec![
            (0usize, 7usize, 4096usize),
            (10, 3, 1),
            (200_000, 5000, 16 * 1024),
            (200_000, 100_000, 1024 * 1024),
        ];

        for (len, chunk, buffer_size) in cases {
            let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let mut reader = ChunkedReader {
                data: Cursor::new(data.clone()),
                chunk,
                largest_request: 0,
            };
            let mut output = Vec::new();

            let copied = copy_bounded(
                &mut reader,
                &mut output,
                buffer_size,
                &CancellationToken::none(),
            )
            .unwrap();

            assert_eq!(copied, len as u64, "failed on `copied` for case: {}", len);
            assert_eq!(output, data, "failed on `output` for case: {}", len);
            assert!(
                reader.largest_request <= MAX_BUFFER_SIZE,
                "failed on buffer bound for case: {}",
                len
            );
        }
    }

    #[test]
    fn test_copy_bounded_cancelled() {
        let source = CancellationSource::new();
        source.cancel();

        let mut output = Vec::new();
        let result = copy_bounded(
            &mut Cursor::new(vec![1u8; 10]),
            &mut output,
            MIN_BUFFER_SIZE,
            &source.token(),
        );

        assert!(matches!(result, Err(FSError::Cancelled)));
        assert!(output.is_empty());
    }

    #[test]
    fn test_copy_bounded_keeps_body_error_class() {
        struct FailingBody(fn() -> FSError);

        impl Read for FailingBody {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err((self.0)().into())
            }
        }

        let cases: Vec<(fn() -> FSError, &str)> = vec![
            (|| FSError::Cancelled, "cancelled"),
            (|| FSError::client("failed to read body: key, reset"), "client"),
        ];

        for (make_err, expected) in cases {
            let result = copy_bounded(
                &mut FailingBody(make_err),
                &mut Vec::new(),
                MIN_BUFFER_SIZE,
                &CancellationToken::none(),
            );

            let group = match result {
                Err(FSError::Cancelled) => "cancelled",
                Err(FSError::Client { .. }) => "client",
                _ => "other",
            };
            assert_eq!(group, expected, "failed for case: {}", expected);
        }
    }

    #[test]
    fn test_copy_bounded_read_error() {
        struct Broken;

        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(ErrorKind::ConnectionReset, "reset"))
            }
        }

        let result = copy_bounded(
            &mut Broken,
            &mut Vec::new(),
            MIN_BUFFER_SIZE,
            &CancellationToken::none(),
        );

        assert!(matches!(result, Err(FSError::Io { .. })));
    }
}
