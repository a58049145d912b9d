//! Object key conventions.

use crate::error::{StorageError, StorageResult};

/// Content type of published reels.
pub const OUTPUT_CONTENT_TYPE: &str = "video/mp4";

/// Published reels never change under the same key.
pub const OUTPUT_CACHE_CONTROL: &str = "public, max-age=31536000";

/// Key of the published reel for a job.
pub fn output_key(job_id: &str) -> String {
    format!("users/{}/reel.mp4", job_id)
}

/// Resolve a photo reference to an object key in `bucket`.
///
/// Accepts `gs://{bucket}/{key}`, `s3://{bucket}/{key}`, `r2://{bucket}/{key}`
/// or a bare key. A URI naming another bucket is rejected.
pub fn object_key(reference: &str, bucket: &str) -> StorageResult<String> {
    let reference = reference.trim();

    let key = match reference.split_once("://") {
        Some((scheme, rest)) => {
            if !matches!(scheme, "gs" | "s3" | "r2") {
                return Err(StorageError::invalid_key(reference));
            }
            let (ref_bucket, key) = rest
                .split_once('/')
                .ok_or_else(|| StorageError::invalid_key(reference))?;
            if ref_bucket != bucket {
                return Err(StorageError::invalid_key(format!(
                    "{} is not in bucket {}",
                    reference, bucket
                )));
            }
            key
        }
        None => reference.trim_start_matches('/'),
    };

    if key.is_empty() || key.split('/').any(|segment| segment == "..") {
        return Err(StorageError::invalid_key(reference));
    }
    Ok(key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_key() {
        assert_eq!(output_key("job-42"), "users/job-42/reel.mp4");
    }

    #[test]
    fn test_object_key_from_uri() {
        assert_eq!(
            object_key("gs://reels-uploads/uploads/u1/p1.jpg", "reels-uploads").unwrap(),
            "uploads/u1/p1.jpg"
        );
        assert_eq!(object_key("r2://reels-uploads/p.jpg", "reels-uploads").unwrap(), "p.jpg");
    }

    #[test]
    fn test_object_key_bare() {
        assert_eq!(object_key("uploads/p1.jpg", "b").unwrap(), "uploads/p1.jpg");
        assert_eq!(object_key("/uploads/p1.jpg", "b").unwrap(), "uploads/p1.jpg");
    }

    #[test]
    fn test_object_key_rejects_foreign_bucket() {
        assert!(matches!(
            object_key("gs://other/p1.jpg", "reels-uploads"),
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_object_key_rejects_bad_input() {
        assert!(object_key("", "b").is_err());
        assert!(object_key("gs://b", "b").is_err());
        assert!(object_key("ftp://b/p.jpg", "b").is_err());
        assert!(object_key("uploads/../secret", "b").is_err());
    }
}
