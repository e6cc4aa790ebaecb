use crate::model::fs::FSError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provider {
    AWS,
    GCS,
}

/// A bucket addressed as `s3://name` or `gs://name`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BucketUri {
    pub provider: Provider,
    pub bucket: String,
}

impl std::str::FromStr for BucketUri {
    type Err = FSError;

    fn from_str(uri: &str) -> Result<Self, Self::Err> {
        let invalid = || FSError::InvalidUri {
            uri: uri.to_string(),
        };

        let (scheme, rest) = uri.split_once("://").ok_or_else(invalid)?;
        let provider = match scheme {
            "s3" => Provider::AWS,
            "gs" => Provider::GCS,
            _ => return Err(invalid()),
        };

        let bucket = rest.trim_end_matches('/');
        if bucket.is_empty() || bucket.contains('/') {
            return Err(invalid());
        }

        Ok(BucketUri {
            provider,
            bucket: bucket.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bucket_uri() {
        let cases = vec![
            ("s3://bucket", Some((Provider::AWS, "bucket"))),
            ("gs://bucket", Some((Provider::GCS, "bucket"))),
            ("s3://bucket/", Some((Provider::AWS, "bucket"))),
            ("ftp://bucket", None),
            ("bucket", None),
            ("s3://", None),
            ("gs://bucket/folder", None),
        ];

        for (input, expected) in cases {
            let result = input.parse::<BucketUri>().ok();
            let expected = expected.map(|(provider, bucket)| BucketUri {
                provider,
                bucket: bucket.to_string(),
            });
            assert_eq!(result, expected, "failed for case: {}", input);
        }
    }

    #[test]
    fn test_parse_error_keeps_uri() {
        let err = "ftp://bucket".parse::<BucketUri>().unwrap_err();
        assert!(matches!(err, FSError::InvalidUri { uri } if uri == "ftp://bucket"));
    }
}
