//! Collision-resistant identities for uploads
//!
//! `identity = digest8 + "_" + sanitized_filename`, where `digest8` is the
//! first 8 hex characters of SHA-256 over the filename and the request
//! timestamp. This is collision avoidance, not content addressing: the same
//! bytes uploaded twice get two identities.

use crate::models::ArtifactIdentity;
use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

const DIGEST_LEN: usize = 8;

/// Identity for `sanitized_filename` uploaded now
pub fn name_upload(sanitized_filename: &str) -> ArtifactIdentity {
    name_upload_at(sanitized_filename, Utc::now())
}

/// Identity for `sanitized_filename` uploaded at `at`
///
/// Identical inputs at the same instant yield the same identity; the upload
/// store refuses to overwrite in that case.
pub fn name_upload_at(sanitized_filename: &str, at: DateTime<Utc>) -> ArtifactIdentity {
    let timestamp = at.to_rfc3339_opts(SecondsFormat::Nanos, true);
    let digest = Sha256::digest(format!("{}_{}", sanitized_filename, timestamp).as_bytes());
    let hex = format!("{:x}", digest);

    ArtifactIdentity::new(format!("{}_{}", &hex[..DIGEST_LEN], sanitized_filename))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn identity_has_digest_prefix_and_original_name() {
        let identity = name_upload("song.mp3");
        let (digest, rest) = identity.as_str().split_once('_').unwrap();

        assert_eq!(digest.len(), 8);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(rest, "song.mp3");
        assert_eq!(identity.job_name(), format!("{}_song", digest));
    }

    #[test]
    fn distinct_timestamps_give_distinct_identities() {
        let t0 = Utc::now();
        let a = name_upload_at("song.mp3", t0);
        let b = name_upload_at("song.mp3", t0 + Duration::microseconds(1));
        let c = name_upload_at("song.mp3", t0 + Duration::seconds(1));

        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn same_instant_and_name_is_deterministic() {
        let t0 = Utc::now();
        assert_eq!(name_upload_at("song.mp3", t0), name_upload_at("song.mp3", t0));
    }
}
