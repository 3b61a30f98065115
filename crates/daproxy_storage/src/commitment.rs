//! Commitment modes, certificate versions and the keccak digest.

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;

/// Length of a keccak-256 digest in bytes.
pub const DIGEST_LEN: usize = 32;

/// Computes the keccak-256 digest of `data`.
#[must_use]
pub fn keccak256(data: &[u8]) -> [u8; DIGEST_LEN] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// How a rollup addresses its blobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitmentMode {
    /// Caller-supplied keccak-256 key, served by the object store.
    OptimismKeccak,
    /// Backend-generated certificate wrapped in the optimism generic layout.
    OptimismGeneric,
    /// Backend-generated certificate in the standard layout.
    Standard,
}

impl CommitmentMode {
    /// Returns true if the primary backend generates the key.
    pub fn is_generated(&self) -> bool {
        !matches!(self, CommitmentMode::OptimismKeccak)
    }

    /// Stable textual name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitmentMode::OptimismKeccak => "optimism_keccak",
            CommitmentMode::OptimismGeneric => "optimism_generic",
            CommitmentMode::Standard => "standard",
        }
    }
}

impl fmt::Display for CommitmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a commitment mode or version cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown variant: {}", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

impl FromStr for CommitmentMode {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "optimism_keccak" => Ok(CommitmentMode::OptimismKeccak),
            "optimism_generic" => Ok(CommitmentMode::OptimismGeneric),
            "standard" => Ok(CommitmentMode::Standard),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// A versioned DA backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DaBackend {
    /// The legacy network, confirmed by polling on-chain state.
    V1,
    /// The newer network, certified inside the disperse call.
    V2,
}

impl DaBackend {
    /// Certificate version produced by this backend.
    pub fn cert_version(&self) -> CertVersion {
        match self {
            DaBackend::V1 => CertVersion::V1,
            DaBackend::V2 => CertVersion::V2,
        }
    }

    /// Compact tag used by atomic selectors.
    pub fn to_u8(self) -> u8 {
        match self {
            DaBackend::V1 => 0,
            DaBackend::V2 => 1,
        }
    }

    /// Inverse of [`DaBackend::to_u8`].
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(DaBackend::V1),
            1 => Some(DaBackend::V2),
            _ => None,
        }
    }
}

impl fmt::Display for DaBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaBackend::V1 => f.write_str("v1"),
            DaBackend::V2 => f.write_str("v2"),
        }
    }
}

impl FromStr for DaBackend {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "v1" => Ok(DaBackend::V1),
            "v2" => Ok(DaBackend::V2),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Version tag carried by a generated commitment.
///
/// Each certificate describes its own version; it is never inferred from
/// whichever backend currently receives new writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertVersion {
    /// Certificate issued by the legacy network.
    V1,
    /// Certificate issued by the newer network.
    V2,
}

impl CertVersion {
    /// Wire byte for this version.
    pub fn as_byte(&self) -> u8 {
        match self {
            CertVersion::V1 => 0x00,
            CertVersion::V2 => 0x01,
        }
    }

    /// Parses a wire byte.
    pub fn from_byte(byte: u8) -> Result<Self, UnknownVariant> {
        match byte {
            0x00 => Ok(CertVersion::V1),
            0x01 => Ok(CertVersion::V2),
            other => Err(UnknownVariant(format!("certificate version {other:#04x}"))),
        }
    }

    /// Backend that must service certificates of this version.
    pub fn backend(&self) -> DaBackend {
        match self {
            CertVersion::V1 => DaBackend::V1,
            CertVersion::V2 => DaBackend::V2,
        }
    }
}

/// Routing metadata resolved by the HTTP layer for a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitmentMeta {
    /// Commitment mode of the request.
    pub mode: CommitmentMode,
    /// Certificate version; ignored for keccak commitments.
    pub version: CertVersion,
}

impl CommitmentMeta {
    /// Creates routing metadata.
    pub fn new(mode: CommitmentMode, version: CertVersion) -> Self {
        Self { mode, version }
    }

    /// Metadata for a keccak commitment.
    pub fn keccak() -> Self {
        Self::new(CommitmentMode::OptimismKeccak, CertVersion::V1)
    }
}

/// Commitment returned by a successful put.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Commitment {
    /// Caller-supplied keccak key.
    Keccak(Vec<u8>),
    /// Backend-generated certificate and its version.
    Certificate {
        /// Version of the backend that issued it.
        version: CertVersion,
        /// Opaque certificate bytes.
        cert: Vec<u8>,
    },
}

impl Commitment {
    /// Raw key bytes used for retrieval.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Commitment::Keccak(key) => key,
            Commitment::Certificate { cert, .. } => cert,
        }
    }

    /// Certificate version, if this is a generated commitment.
    pub fn version(&self) -> Option<CertVersion> {
        match self {
            Commitment::Keccak(_) => None,
            Commitment::Certificate { version, .. } => Some(*version),
        }
    }

    /// Routing metadata that reads this commitment back under `mode`.
    pub fn meta(&self, mode: CommitmentMode) -> CommitmentMeta {
        CommitmentMeta::new(mode, self.version().unwrap_or(CertVersion::V1))
    }

    /// Versioned wire form: the version byte followed by the certificate.
    pub fn to_versioned_bytes(&self) -> Vec<u8> {
        match self {
            Commitment::Keccak(key) => key.clone(),
            Commitment::Certificate { version, cert } => {
                let mut out = Vec::with_capacity(cert.len() + 1);
                out.push(version.as_byte());
                out.extend_from_slice(cert);
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keccak_known_vector() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn commitment_mode_parse() {
        assert_eq!(
            "standard".parse::<CommitmentMode>().unwrap(),
            CommitmentMode::Standard
        );
        assert!("celestia".parse::<CommitmentMode>().is_err());
        assert!(!CommitmentMode::OptimismKeccak.is_generated());
        assert!(CommitmentMode::OptimismGeneric.is_generated());
    }

    #[test]
    fn cert_version_bytes() {
        assert_eq!(CertVersion::from_byte(0x01).unwrap(), CertVersion::V2);
        assert!(CertVersion::from_byte(0x07).is_err());
        assert_eq!(CertVersion::V2.backend(), DaBackend::V2);
        assert_eq!(DaBackend::V1.cert_version(), CertVersion::V1);
    }

    #[test]
    fn versioned_commitment_prefix() {
        let c = Commitment::Certificate {
            version: CertVersion::V2,
            cert: vec![0xaa, 0xbb],
        };
        assert_eq!(c.to_versioned_bytes(), vec![0x01, 0xaa, 0xbb]);
        assert_eq!(c.version(), Some(CertVersion::V2));
        assert_eq!(Commitment::Keccak(vec![1]).version(), None);
    }

    #[test]
    fn da_backend_serde_names() {
        assert_eq!("V2".parse::<DaBackend>().unwrap(), DaBackend::V2);
        assert_eq!(DaBackend::from_u8(DaBackend::V2.to_u8()), Some(DaBackend::V2));
        assert_eq!(DaBackend::from_u8(9), None);
    }
}
