//! Persistent pipeline configuration.
//!
//! The config is stored as one opaque fixed-size blob and is always read
//! and written whole. Layout (all multi-byte fields little-endian):
//!
//! | Offset | Size | Field |
//! |-------:|-----:|-------|
//! | 0      | 4    | magic `VNC1` |
//! | 4      | 1    | layout version |
//! | 5      | 1    | flags: grayscale, threshold, invert, ROI, blobs (bits 0-4) |
//! | 6      | 1    | `threshold_val` |
//! | 7      | 1    | blob labeler |
//! | 8      | 8    | `roi_x`, `roi_y`, `roi_w`, `roi_h` (`u16` each) |
//! | 16     | 2    | `downsample_factor` |
//! | 18     | 4    | `min_blob_area` |
//! | 22     | 2    | reserved, zero |
//! | 24     | 8    | SipHash-1-3 of bytes `0..24` |
//!
//! [`load_or_init`] is the startup path: load, and if nothing usable is
//! stored fall back to defaults and persist them so the next boot finds
//! a valid blob.

use std::fs;
use std::hash::Hasher;
use std::io;
use std::path::{Path, PathBuf};

use siphasher::sip::SipHasher13;
use visionode_pipeline::{BlobLabelerKind, PipelineConfig};

/// Size of an encoded config blob.
pub const CONFIG_BLOB_LEN: usize = 32;

const MAGIC: [u8; 4] = *b"VNC1";
const LAYOUT_VERSION: u8 = 1;
const CHECKSUM_OFFSET: usize = 24;

const FLAG_GRAYSCALE: u8 = 1 << 0;
const FLAG_THRESHOLD: u8 = 1 << 1;
const FLAG_INVERT: u8 = 1 << 2;
const FLAG_ROI: u8 = 1 << 3;
const FLAG_BLOBS: u8 = 1 << 4;
const KNOWN_FLAGS: u8 = FLAG_GRAYSCALE | FLAG_THRESHOLD | FLAG_INVERT | FLAG_ROI | FLAG_BLOBS;

/// Errors reading or writing the stored config.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Nothing has been stored yet.
    #[error("no stored configuration")]
    NotFound,

    /// The stored blob failed a size, magic, version, checksum or value
    /// check.
    #[error("stored configuration is corrupt: {0}")]
    Corrupt(String),

    /// The storage medium failed.
    #[error("configuration storage error: {0}")]
    Io(#[from] io::Error),
}

fn checksum(bytes: &[u8]) -> u64 {
    let mut hasher = SipHasher13::new();
    hasher.write(bytes);
    hasher.finish()
}

/// Encode a config into its fixed-size blob.
#[must_use]
pub fn encode(config: &PipelineConfig) -> [u8; CONFIG_BLOB_LEN] {
    let mut flags = 0;
    for (on, bit) in [
        (config.enable_grayscale, FLAG_GRAYSCALE),
        (config.enable_threshold, FLAG_THRESHOLD),
        (config.invert, FLAG_INVERT),
        (config.enable_roi, FLAG_ROI),
        (config.enable_blob_detection, FLAG_BLOBS),
    ] {
        if on {
            flags |= bit;
        }
    }

    let mut out = [0u8; CONFIG_BLOB_LEN];
    out[0..4].copy_from_slice(&MAGIC);
    out[4] = LAYOUT_VERSION;
    out[5] = flags;
    out[6] = config.threshold_val;
    out[7] = config.blob_labeler.to_u8();
    out[8..10].copy_from_slice(&config.roi_x.to_le_bytes());
    out[10..12].copy_from_slice(&config.roi_y.to_le_bytes());
    out[12..14].copy_from_slice(&config.roi_w.to_le_bytes());
    out[14..16].copy_from_slice(&config.roi_h.to_le_bytes());
    out[16..18].copy_from_slice(&config.downsample_factor.to_le_bytes());
    out[18..22].copy_from_slice(&config.min_blob_area.to_le_bytes());
    let sum = checksum(&out[..CHECKSUM_OFFSET]);
    out[CHECKSUM_OFFSET..].copy_from_slice(&sum.to_le_bytes());
    out
}

/// Decode a blob produced by [`encode`].
///
/// # Errors
///
/// Returns [`SettingsError::Corrupt`] if the blob has the wrong size,
/// magic, version or checksum, uses unknown flag bits or labeler tags,
/// or decodes to a config that fails [`PipelineConfig::validate`].
pub fn decode(bytes: &[u8]) -> Result<PipelineConfig, SettingsError> {
    let bytes: &[u8; CONFIG_BLOB_LEN] = bytes.try_into().map_err(|_| {
        SettingsError::Corrupt(format!(
            "expected {CONFIG_BLOB_LEN} bytes, got {}",
            bytes.len()
        ))
    })?;
    if bytes[0..4] != MAGIC {
        return Err(SettingsError::Corrupt("bad magic".to_string()));
    }
    if bytes[4] != LAYOUT_VERSION {
        return Err(SettingsError::Corrupt(format!("unsupported layout version {}", bytes[4])));
    }
    let mut stored = [0u8; 8];
    stored.copy_from_slice(&bytes[CHECKSUM_OFFSET..]);
    if u64::from_le_bytes(stored) != checksum(&bytes[..CHECKSUM_OFFSET]) {
        return Err(SettingsError::Corrupt("checksum mismatch".to_string()));
    }

    let flags = bytes[5];
    if flags & !KNOWN_FLAGS != 0 {
        return Err(SettingsError::Corrupt(format!("unknown flag bits {flags:#04x}")));
    }
    let blob_labeler = BlobLabelerKind::from_u8(bytes[7])
        .ok_or_else(|| SettingsError::Corrupt(format!("unknown blob labeler {}", bytes[7])))?;
    if bytes[22..24] != [0, 0] {
        return Err(SettingsError::Corrupt("reserved bytes are not zero".to_string()));
    }

    let u16_at = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
    let config = PipelineConfig {
        enable_grayscale: flags & FLAG_GRAYSCALE != 0,
        enable_threshold: flags & FLAG_THRESHOLD != 0,
        threshold_val: bytes[6],
        invert: flags & FLAG_INVERT != 0,
        enable_roi: flags & FLAG_ROI != 0,
        roi_x: u16_at(8),
        roi_y: u16_at(10),
        roi_w: u16_at(12),
        roi_h: u16_at(14),
        downsample_factor: u16_at(16),
        enable_blob_detection: flags & FLAG_BLOBS != 0,
        min_blob_area: u32::from_le_bytes([bytes[18], bytes[19], bytes[20], bytes[21]]),
        blob_labeler,
    };
    config
        .validate()
        .map_err(|err| SettingsError::Corrupt(err.to_string()))?;
    Ok(config)
}

/// Somewhere a config blob can be kept between runs.
pub trait ConfigStore {
    /// Read and decode the stored config.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::NotFound`] if nothing is stored,
    /// [`SettingsError::Corrupt`] if the blob does not decode, and
    /// [`SettingsError::Io`] if the medium fails.
    fn load(&self) -> Result<PipelineConfig, SettingsError>;

    /// Encode and store `config`, replacing what was there.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Io`] if the medium fails.
    fn save(&mut self, config: &PipelineConfig) -> Result<(), SettingsError>;
}

/// Stores the blob in a single file.
///
/// Writes go to a sibling temp file that is then renamed over the
/// target, so an interrupted save never leaves a half-written blob.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Use the file at `path`. Nothing is read until [`load`](ConfigStore::load).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl ConfigStore for FileStore {
    fn load(&self) -> Result<PipelineConfig, SettingsError> {
        let bytes = fs::read(&self.path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => SettingsError::NotFound,
            _ => SettingsError::Io(err),
        })?;
        decode(&bytes)
    }

    fn save(&mut self, config: &PipelineConfig) -> Result<(), SettingsError> {
        let tmp = self.temp_path();
        fs::write(&tmp, encode(config))?;
        fs::rename(&tmp, &self.path)?;
        tracing::info!(path = %self.path.display(), "configuration saved");
        Ok(())
    }
}

/// Keeps the blob in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blob: Option<Vec<u8>>,
}

impl MemoryStore {
    /// An empty store: `load` reports [`SettingsError::NotFound`].
    #[must_use]
    pub const fn new() -> Self {
        Self { blob: None }
    }

    /// A store holding arbitrary bytes, valid or not.
    #[must_use]
    pub const fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { blob: Some(bytes) }
    }

    /// The raw stored bytes, if any.
    #[must_use]
    pub fn bytes(&self) -> Option<&[u8]> {
        self.blob.as_deref()
    }
}

impl ConfigStore for MemoryStore {
    fn load(&self) -> Result<PipelineConfig, SettingsError> {
        self.blob.as_deref().map_or(Err(SettingsError::NotFound), decode)
    }

    fn save(&mut self, config: &PipelineConfig) -> Result<(), SettingsError> {
        self.blob = Some(encode(config).to_vec());
        Ok(())
    }
}

/// Load the stored config, or fall back to defaults and persist them.
///
/// Never fails: a store that cannot be read yields the defaults, and a
/// store that cannot be written is logged and otherwise ignored.
pub fn load_or_init(store: &mut dyn ConfigStore) -> PipelineConfig {
    match store.load() {
        Ok(config) => {
            tracing::debug!(?config, "configuration loaded");
            return config;
        }
        Err(SettingsError::NotFound) => {
            tracing::warn!("no stored configuration, using defaults");
        }
        Err(err) => {
            tracing::warn!(error = %err, "stored configuration unusable, using defaults");
        }
    }

    let config = PipelineConfig::default();
    tracing::info!("configuration reset to defaults");
    if let Err(err) = store.save(&config) {
        tracing::error!(error = %err, "failed to persist default configuration");
    }
    config
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn custom() -> PipelineConfig {
        PipelineConfig {
            enable_grayscale: true,
            enable_threshold: true,
            threshold_val: 100,
            invert: true,
            enable_roi: true,
            roi_x: 80,
            roi_y: 60,
            roi_w: 160,
            roi_h: 120,
            downsample_factor: 2,
            enable_blob_detection: true,
            min_blob_area: 70_000,
            blob_labeler: BlobLabelerKind::RunLength,
        }
    }

    /// A store whose writes always fail.
    struct ReadOnly;

    impl ConfigStore for ReadOnly {
        fn load(&self) -> Result<PipelineConfig, SettingsError> {
            Err(SettingsError::NotFound)
        }

        fn save(&mut self, _config: &PipelineConfig) -> Result<(), SettingsError> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only").into())
        }
    }

    #[test]
    fn decode_inverts_encode() {
        for config in [PipelineConfig::default(), custom()] {
            assert_eq!(decode(&encode(&config)).unwrap(), config);
        }
    }

    #[test]
    fn layout_is_fixed() {
        let blob = encode(&custom());
        assert_eq!(&blob[0..4], b"VNC1");
        assert_eq!(blob[4], 1);
        assert_eq!(blob[5], 0b1_1111);
        assert_eq!(blob[6], 100);
        assert_eq!(blob[7], 1);
        assert_eq!(&blob[8..10], &[80, 0]);
        assert_eq!(&blob[16..18], &[2, 0]);
        assert_eq!(&blob[18..22], &70_000_u32.to_le_bytes());
        assert_eq!(&blob[22..24], &[0, 0]);
    }

    #[test]
    fn flipped_bit_fails_checksum() {
        let mut blob = encode(&custom());
        blob[6] ^= 1;
        let err = decode(&blob).unwrap_err();
        assert!(matches!(err, SettingsError::Corrupt(ref m) if m.contains("checksum")), "{err}");
    }

    #[test]
    fn wrong_size_is_corrupt() {
        let blob = encode(&custom());
        assert!(matches!(decode(&blob[..31]), Err(SettingsError::Corrupt(_))));
        assert!(matches!(decode(&[]), Err(SettingsError::Corrupt(_))));
    }

    #[test]
    fn wrong_magic_or_version_is_corrupt() {
        let mut blob = encode(&custom());
        blob[0] = b'X';
        assert!(matches!(decode(&blob), Err(SettingsError::Corrupt(ref m)) if m.contains("magic")));

        let mut blob = encode(&custom());
        blob[4] = 2;
        assert!(matches!(decode(&blob), Err(SettingsError::Corrupt(ref m)) if m.contains("version")));
    }

    #[test]
    fn invalid_values_are_corrupt_even_with_good_checksum() {
        // Re-seal a blob with a zero downsample factor.
        let mut blob = encode(&custom());
        blob[16..18].copy_from_slice(&0u16.to_le_bytes());
        let sum = checksum(&blob[..CHECKSUM_OFFSET]);
        blob[CHECKSUM_OFFSET..].copy_from_slice(&sum.to_le_bytes());
        assert!(matches!(decode(&blob), Err(SettingsError::Corrupt(_))));
    }

    #[test]
    fn unknown_labeler_is_corrupt() {
        let mut blob = encode(&custom());
        blob[7] = 9;
        let sum = checksum(&blob[..CHECKSUM_OFFSET]);
        blob[CHECKSUM_OFFSET..].copy_from_slice(&sum.to_le_bytes());
        assert!(matches!(decode(&blob), Err(SettingsError::Corrupt(ref m)) if m.contains("labeler")));
    }

    #[test]
    fn memory_store_round_trip() {
        let mut store = MemoryStore::new();
        assert!(matches!(store.load(), Err(SettingsError::NotFound)));
        store.save(&custom()).unwrap();
        assert_eq!(store.load().unwrap(), custom());
        assert_eq!(store.bytes().unwrap().len(), CONFIG_BLOB_LEN);
    }

    #[test]
    fn load_or_init_on_empty_store_persists_defaults() {
        let mut store = MemoryStore::new();
        let config = load_or_init(&mut store);
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(store.load().unwrap(), PipelineConfig::default());
        assert_eq!(store.bytes().unwrap(), encode(&PipelineConfig::default()));
    }

    #[test]
    fn load_or_init_replaces_corrupt_blob() {
        let mut store = MemoryStore::from_bytes(vec![0xAA; 7]);
        assert_eq!(load_or_init(&mut store), PipelineConfig::default());
        assert_eq!(store.load().unwrap(), PipelineConfig::default());
    }

    #[test]
    fn load_or_init_keeps_valid_blob() {
        let mut store = MemoryStore::new();
        store.save(&custom()).unwrap();
        assert_eq!(load_or_init(&mut store), custom());
    }

    #[test]
    fn load_or_init_survives_failed_save() {
        assert_eq!(load_or_init(&mut ReadOnly), PipelineConfig::default());
    }

    #[test]
    fn file_store_temp_path_is_sibling() {
        let store = FileStore::new("/data/visionode.cfg");
        assert_eq!(store.temp_path(), PathBuf::from("/data/visionode.cfg.tmp"));
    }
}
