use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Identifiers used across the testlog ingestion pipeline.
///
/// Two families live here:
/// - opaque ids handed to us by the CI system (`JobId`, `StepId`, `ProjectId`, `ArtifactId`)
/// - ids we derive ourselves from content (`TestCaseId`, `NameHash`, `BlobRef`)
///
/// Derived ids are deterministic: re-ingesting the same job produces the same ids.
macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

opaque_id!(
    /// A job: one logical test run, possibly split across several steps.
    JobId
);
opaque_id!(
    /// A step (shard) of a job. Steps report results independently.
    StepId
);
opaque_id!(ProjectId);
opaque_id!(
    /// A source artifact, e.g. the `junit.xml` a batch was parsed from.
    ArtifactId
);
opaque_id!(
    /// Canonical test case id. Derived from `(job, fully-qualified name)`.
    TestCaseId
);
opaque_id!(
    /// SHA-256 of a fully-qualified test name. Stable across jobs.
    NameHash
);
opaque_id!(
    /// Content address of a payload in the content store.
    BlobRef
);

impl TestCaseId {
    /// The id a test case gets in a given job.
    ///
    /// Uniqueness is job-scoped, so the step is deliberately not part of the key.
    pub fn for_test(job: &JobId, fq_name: &str) -> Self {
        Self(hash_hex(["testcase", job.as_str(), fq_name]))
    }
}

impl NameHash {
    pub fn of(fq_name: &str) -> Self {
        Self(hex::encode(Sha256::digest(fq_name.as_bytes())))
    }
}

impl BlobRef {
    pub fn for_content(payload: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(payload)))
    }

    /// Two-character fan-out prefix used by on-disk stores.
    pub fn shard(&self) -> &str {
        self.0.get(..2).unwrap_or("00")
    }
}

/// Each part is length-prefixed, so no choice of part contents can shift a boundary.
fn hash_hex<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    let mut hasher = Sha256::new();
    for p in parts {
        hasher.update((p.len() as u64).to_be_bytes());
        hasher.update(p.as_bytes());
    }
    hex::encode(hasher.finalize())
}
