//! Identifier generation and content fingerprints
//!
//! Entity identifiers are short lowercase hex strings: a Blake3 digest of a
//! kind-specific salt followed by random bytes, truncated to a kind-specific
//! length. They are not guaranteed unique; the store's unique keys are.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Number of random bytes mixed into every identifier
const ENTROPY_BYTES: usize = 16;

/// The four persisted entity kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    File,
    Record,
    Pipeline,
    Experiment,
}

impl EntityKind {
    /// All kinds, in dependency order
    pub const ALL: [Self; 4] = [Self::File, Self::Record, Self::Pipeline, Self::Experiment];

    /// Salt mixed into generated identifiers
    #[inline]
    #[must_use]
    pub const fn salt(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Record => "record",
            Self::Pipeline => "pipeline",
            Self::Experiment => "experiment",
        }
    }

    /// Length in hex characters of generated identifiers
    #[inline]
    #[must_use]
    pub const fn id_len(self) -> usize {
        match self {
            Self::File | Self::Pipeline => 8,
            Self::Record | Self::Experiment => 16,
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.salt())
    }
}

/// Generate a fresh identifier for `kind`
#[must_use]
pub fn generate(kind: EntityKind) -> String {
    let entropy: [u8; ENTROPY_BYTES] = rand::random();

    let mut hasher = blake3::Hasher::new();
    hasher.update(kind.salt().as_bytes());
    hasher.update(&entropy);

    let mut id = hex::encode(hasher.finalize().as_bytes());
    id.truncate(kind.id_len());
    id
}

/// Stable hex fingerprint of a serializable value (JSON encoding)
///
/// # Errors
/// Returns error if serialization fails
pub fn fingerprint<T>(value: &T) -> Result<String, serde_json::Error>
where
    T: Serialize + ?Sized,
{
    let json = serde_json::to_vec(value)?;
    Ok(blake3::hash(&json).to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generated_ids_have_kind_length() {
        for kind in EntityKind::ALL {
            let id = generate(kind);
            assert_eq!(id.len(), kind.id_len(), "{kind}");
            assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn generated_ids_differ() {
        let ids: HashSet<_> = (0..256).map(|_| generate(EntityKind::Record)).collect();
        assert_eq!(ids.len(), 256);
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let value = serde_json::json!({"lr": 0.1, "epochs": 3});
        assert_eq!(fingerprint(&value).unwrap(), fingerprint(&value).unwrap());
        assert_ne!(
            fingerprint(&value).unwrap(),
            fingerprint(&serde_json::json!({"lr": 0.2})).unwrap()
        );
    }

    #[test]
    fn kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&EntityKind::Pipeline).unwrap(), "\"pipeline\"");
    }
}
