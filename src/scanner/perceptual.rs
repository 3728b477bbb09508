//! Perceptual image hashing.
//!
//! Computes fingerprints that stay stable under resizing and recompression.
//! The hash side length is configurable: a precision of `n` yields an
//! `n * n` bit fingerprint.

use image::DynamicImage;
use image_hasher::{HashAlg, HasherConfig};
use serde::{Deserialize, Serialize};

use crate::stats::Fingerprint;

/// Supported perceptual hashing algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PerceptualAlgorithm {
    /// aHash (Average Hash) - each bit compares a pixel with the mean.
    #[default]
    Ahash,
    /// pHash (Perceptual Hash) - DCT-based, most resilient to transformations.
    Phash,
    /// dHash (Difference Hash) - Gradient-based, very fast and effective.
    Dhash,
}

impl std::fmt::Display for PerceptualAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Phash => write!(f, "pHash"),
            Self::Dhash => write!(f, "dHash"),
            Self::Ahash => write!(f, "aHash"),
        }
    }
}

/// Computes perceptual fingerprints for decoded images.
pub struct PerceptualHasher {
    hasher: image_hasher::Hasher,
    algorithm: PerceptualAlgorithm,
    precision: u32,
}

impl PerceptualHasher {
    /// Create a hasher producing `precision * precision` bit fingerprints.
    #[must_use]
    pub fn new(algorithm: PerceptualAlgorithm, precision: u32) -> Self {
        let precision = precision.max(2);
        let mut config = HasherConfig::new().hash_size(precision, precision);

        match algorithm {
            PerceptualAlgorithm::Phash => {
                config = config.hash_alg(HashAlg::Median).preproc_dct();
            }
            PerceptualAlgorithm::Dhash => {
                config = config.hash_alg(HashAlg::Gradient);
            }
            PerceptualAlgorithm::Ahash => {
                config = config.hash_alg(HashAlg::Mean);
            }
        }

        Self {
            hasher: config.to_hasher(),
            algorithm,
            precision,
        }
    }

    /// Fingerprint an already decoded image.
    #[must_use]
    pub fn fingerprint(&self, image: &DynamicImage) -> Fingerprint {
        Fingerprint::from_bytes(self.hasher.hash_image(image).as_bytes())
    }

    /// Get the algorithm used by this hasher.
    #[must_use]
    pub fn algorithm(&self) -> PerceptualAlgorithm {
        self.algorithm
    }

    /// Hash side length.
    #[must_use]
    pub fn precision(&self) -> u32 {
        self.precision
    }
}

impl Default for PerceptualHasher {
    fn default() -> Self {
        Self::new(PerceptualAlgorithm::Ahash, 8)
    }
}

impl std::fmt::Debug for PerceptualHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerceptualHasher")
            .field("algorithm", &self.algorithm)
            .field("precision", &self.precision)
            .finish()
    }
}
