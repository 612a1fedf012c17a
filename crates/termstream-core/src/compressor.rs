//! Per-session adaptive compression.
//!
//! One instance per session. Tracks a measured network speed (EMA) and
//! adapts the DEFLATE level accordingly; a user-supplied override takes
//! precedence until explicitly cleared.

use std::io::Write;

use flate2::{Compression, write::DeflateEncoder, write::DeflateDecoder};
use termstream_proto::payloads::control::CompressionType;

use crate::{config::CompressionConfig, errors::CompressionError};

/// Coarse network-speed bucket derived from the EMA estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkCategory {
    /// No samples observed yet.
    Unknown,
    /// >= 1 MB/s.
    Fast,
    /// >= 100 KB/s, < 1 MB/s.
    Medium,
    /// < 100 KB/s.
    Slow,
}

const FAST_THRESHOLD_BPS: f64 = 1_000_000.0;
const MEDIUM_THRESHOLD_BPS: f64 = 100_000.0;

/// Result of [`AdaptiveCompressor::compress`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionResult {
    /// Output bytes (compressed if `compressed == true`, otherwise a copy
    /// of the input).
    pub data: Vec<u8>,
    /// Whether `data` is compressed.
    pub compressed: bool,
    /// Compression scheme used, if any.
    pub compression_type: CompressionType,
}

/// Adaptive DEFLATE compressor for one session's output stream.
#[derive(Debug, Clone)]
pub struct AdaptiveCompressor {
    config: CompressionConfig,
    enabled: bool,
    current_level: u32,
    level_override: Option<u32>,
    estimated_speed_bps: Option<f64>,
    network_category: NetworkCategory,
}

impl AdaptiveCompressor {
    /// Create a compressor starting at the medium level, enabled unless
    /// `config.min_size_for_compression == 0`.
    #[must_use]
    pub fn new(config: CompressionConfig) -> Self {
        let enabled = config.min_size_for_compression > 0;
        let current_level = config.medium_level;
        Self {
            config,
            enabled,
            current_level,
            level_override: None,
            estimated_speed_bps: None,
            network_category: NetworkCategory::Unknown,
        }
    }

    /// Compress `data` if enabled and large enough; falls back to
    /// uncompressed output if compression doesn't help.
    pub fn compress(&self, data: &[u8]) -> CompressionResult {
        if !self.enabled || data.len() < self.config.min_size_for_compression {
            return CompressionResult {
                data: data.to_vec(),
                compressed: false,
                compression_type: CompressionType::None,
            };
        }

        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::new(self.current_level));
        if encoder.write_all(data).is_err() {
            return CompressionResult {
                data: data.to_vec(),
                compressed: false,
                compression_type: CompressionType::None,
            };
        }
        let Ok(compressed) = encoder.finish() else {
            return CompressionResult {
                data: data.to_vec(),
                compressed: false,
                compression_type: CompressionType::None,
            };
        };

        let threshold = data.len() * usize::from(self.config.min_compression_ratio_pct) / 100;
        if compressed.len() > threshold {
            return CompressionResult {
                data: data.to_vec(),
                compressed: false,
                compression_type: CompressionType::None,
            };
        }

        CompressionResult { data: compressed, compressed: true, compression_type: CompressionType::Deflate }
    }

    /// Inverse of [`Self::compress`].
    ///
    /// # Errors
    ///
    /// Returns [`CompressionError::Deflate`] if the DEFLATE stream is
    /// malformed.
    pub fn decompress(data: &[u8], compression_type: CompressionType) -> Result<Vec<u8>, CompressionError> {
        match compression_type {
            CompressionType::None => Ok(data.to_vec()),
            CompressionType::Deflate => {
                let mut decoder = DeflateDecoder::new(Vec::new());
                decoder.write_all(data).map_err(|e| CompressionError::Deflate(e.to_string()))?;
                decoder.finish().map_err(|e| CompressionError::Deflate(e.to_string()))
            },
        }
    }

    /// Feed a measured transfer of `bytes` over `duration_ms` into the EMA;
    /// zero-duration samples are ignored. Recategorizes and, unless a
    /// manual override is active, adjusts `current_level`.
    pub fn update_network_metrics(&mut self, bytes: u64, duration_ms: u64) {
        if duration_ms == 0 {
            return;
        }

        let instant = (bytes as f64) * 1000.0 / (duration_ms as f64);
        let ema = match self.estimated_speed_bps {
            None => instant,
            Some(previous) => 0.7 * previous + 0.3 * instant,
        };
        self.estimated_speed_bps = Some(ema);

        self.network_category = if ema >= FAST_THRESHOLD_BPS {
            NetworkCategory::Fast
        } else if ema >= MEDIUM_THRESHOLD_BPS {
            NetworkCategory::Medium
        } else {
            NetworkCategory::Slow
        };

        if self.level_override.is_none() {
            self.current_level = match self.network_category {
                NetworkCategory::Fast => self.config.fast_level,
                NetworkCategory::Medium => self.config.medium_level,
                NetworkCategory::Slow | NetworkCategory::Unknown => self.config.slow_level,
            };
        }
    }

    /// Current measured network category.
    #[must_use]
    pub fn network_category(&self) -> NetworkCategory {
        self.network_category
    }

    /// Set an explicit compression level, overriding adaptive adjustment
    /// until [`Self::clear_compression_level_override`] is called.
    ///
    /// # Errors
    ///
    /// Returns [`CompressionError::InvalidLevel`] if `level > 9`.
    pub fn set_compression_level(&mut self, level: u32) -> Result<(), CompressionError> {
        if level > 9 {
            return Err(CompressionError::InvalidLevel(level as u8));
        }
        self.level_override = Some(level);
        self.current_level = level;
        Ok(())
    }

    /// Restore adaptive level adjustment.
    pub fn clear_compression_level_override(&mut self) {
        self.level_override = None;
    }

    /// Enable or disable compression entirely.
    pub fn set_compression_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Current settings snapshot.
    #[must_use]
    pub fn settings(&self) -> (bool, u32) {
        (self.enabled, self.current_level)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn small_payload_below_threshold_is_not_compressed() {
        let compressor = AdaptiveCompressor::new(CompressionConfig::default());
        let result = compressor.compress(b"hi");
        assert!(!result.compressed);
        assert_eq!(result.data, b"hi");
    }

    #[test]
    fn zero_min_size_disables_compression_entirely() {
        let compressor =
            AdaptiveCompressor::new(CompressionConfig { min_size_for_compression: 0, ..Default::default() });
        let result = compressor.compress(&vec![b'a'; 1024]);
        assert!(!result.compressed);
    }

    #[test]
    fn decompress_inverts_compress_for_compressible_data() {
        let compressor = AdaptiveCompressor::new(CompressionConfig::default());
        let data = vec![b'x'; 4096];
        let result = compressor.compress(&data);
        assert!(result.compressed);

        let restored = AdaptiveCompressor::decompress(&result.data, result.compression_type).unwrap();
        assert_eq!(restored, data);
    }

    #[test]
    fn decompress_none_is_identity() {
        let restored = AdaptiveCompressor::decompress(b"raw", CompressionType::None).unwrap();
        assert_eq!(restored, b"raw");
    }

    #[test]
    fn zero_duration_sample_is_ignored() {
        let mut compressor = AdaptiveCompressor::new(CompressionConfig::default());
        compressor.update_network_metrics(1_000_000, 0);
        assert!(matches!(compressor.network_category(), NetworkCategory::Unknown));
    }

    #[test]
    fn sustained_fast_metrics_categorize_fast() {
        let mut compressor = AdaptiveCompressor::new(CompressionConfig::default());
        for _ in 0..5 {
            compressor.update_network_metrics(2_000_000, 1000);
        }
        assert!(matches!(compressor.network_category(), NetworkCategory::Fast));
        assert_eq!(compressor.settings().1, compressor.config.fast_level);
    }

    #[test]
    fn sustained_slow_metrics_categorize_slow() {
        let mut compressor = AdaptiveCompressor::new(CompressionConfig::default());
        for _ in 0..5 {
            compressor.update_network_metrics(10_000, 1000);
        }
        assert!(matches!(compressor.network_category(), NetworkCategory::Slow));
    }

    #[test]
    fn single_outlier_does_not_flip_category_within_one_sample() {
        let mut compressor = AdaptiveCompressor::new(CompressionConfig::default());
        for _ in 0..10 {
            compressor.update_network_metrics(10_000, 1000);
        }
        assert!(matches!(compressor.network_category(), NetworkCategory::Slow));

        compressor.update_network_metrics(10_000_000, 1000);
        assert!(matches!(compressor.network_category(), NetworkCategory::Slow));
    }

    #[test]
    fn level_override_survives_metric_updates() {
        let mut compressor = AdaptiveCompressor::new(CompressionConfig::default());
        compressor.set_compression_level(9).unwrap();
        compressor.update_network_metrics(2_000_000, 1000);
        assert_eq!(compressor.settings().1, 9);
    }

    #[test]
    fn invalid_level_is_rejected() {
        let mut compressor = AdaptiveCompressor::new(CompressionConfig::default());
        assert!(matches!(
            compressor.set_compression_level(10),
            Err(CompressionError::InvalidLevel(10))
        ));
    }

    proptest! {
        #[test]
        fn compress_decompress_round_trips_for_arbitrary_data(data in prop::collection::vec(any::<u8>(), 0..4096)) {
            let compressor = AdaptiveCompressor::new(CompressionConfig::default());
            let result = compressor.compress(&data);
            let restored = AdaptiveCompressor::decompress(&result.data, result.compression_type).unwrap();
            prop_assert_eq!(restored, data);
        }
    }
}
