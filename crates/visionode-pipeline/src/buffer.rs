//! Working buffer management.
//!
//! The pipeline owns exactly one byte buffer that every stage reads and
//! writes in place. Its physical size is a high-water mark: it grows when
//! a frame has more pixels than any frame before it and never shrinks, so
//! a steady stream of same-sized frames allocates once.
//!
//! Growth asks a preferred [`MemoryTier`] first and a fallback tier
//! second, mirroring boards that have a large slow external RAM and a
//! small fast internal one.

use std::fmt;

use crate::types::PipelineError;

/// A source of zero-initialised byte buffers.
///
/// Implementations must return `None` instead of aborting when the
/// request cannot be satisfied.
pub trait MemoryTier {
    /// Short name used in log messages.
    fn name(&self) -> &'static str;

    /// Allocate exactly `len` zeroed bytes, or `None` on failure.
    fn allocate(&self, len: usize) -> Option<Vec<u8>>;
}

/// The global allocator, asked fallibly via `try_reserve_exact`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHeap;

impl MemoryTier for SystemHeap {
    fn name(&self) -> &'static str {
        "heap"
    }

    fn allocate(&self, len: usize) -> Option<Vec<u8>> {
        let mut data = Vec::new();
        data.try_reserve_exact(len).ok()?;
        data.resize(len, 0);
        Some(data)
    }
}

/// A tier with a hard byte budget, backed by the global allocator.
///
/// Models a limited-capacity RAM region: requests above `capacity` fail
/// even if the host could serve them.
#[derive(Debug, Clone, Copy)]
pub struct CappedHeap {
    name: &'static str,
    capacity: usize,
}

impl CappedHeap {
    /// Enough internal RAM for one QVGA luminance frame.
    pub const QVGA_BYTES: usize = 320 * 240;

    /// Create a tier that refuses requests larger than `capacity` bytes.
    #[must_use]
    pub const fn new(name: &'static str, capacity: usize) -> Self {
        Self { name, capacity }
    }

    /// The byte budget.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

impl MemoryTier for CappedHeap {
    fn name(&self) -> &'static str {
        self.name
    }

    fn allocate(&self, len: usize) -> Option<Vec<u8>> {
        if len > self.capacity {
            return None;
        }
        SystemHeap.allocate(len)
    }
}

/// The pipeline's reusable byte arena.
///
/// Only the physical allocation lives here. The logical image extent
/// (current width and height) is tracked by the caller and passed to
/// each stage explicitly.
pub struct WorkingBuffer {
    data: Vec<u8>,
    tier: Option<&'static str>,
    preferred: Box<dyn MemoryTier>,
    fallback: Box<dyn MemoryTier>,
}

impl WorkingBuffer {
    /// Create an empty buffer that grows from the system heap and falls
    /// back to a QVGA-sized internal tier.
    #[must_use]
    pub fn new() -> Self {
        Self::with_tiers(
            Box::new(SystemHeap),
            Box::new(CappedHeap::new("internal", CappedHeap::QVGA_BYTES)),
        )
    }

    /// Create an empty buffer with explicit memory tiers.
    #[must_use]
    pub fn with_tiers(preferred: Box<dyn MemoryTier>, fallback: Box<dyn MemoryTier>) -> Self {
        Self {
            data: Vec::new(),
            tier: None,
            preferred,
            fallback,
        }
    }

    /// Physical size in bytes (the largest frame seen so far).
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Name of the tier that served the current allocation, if any.
    #[must_use]
    pub const fn tier(&self) -> Option<&'static str> {
        self.tier
    }

    /// Make sure at least `needed` bytes are available.
    ///
    /// Returns `Ok(true)` if the buffer was reallocated. The replacement
    /// is obtained before the old allocation is dropped, so on failure
    /// the previous contents are still intact.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::AllocationFailure`] if neither tier can
    /// provide `needed` bytes.
    pub fn ensure_capacity(&mut self, needed: usize) -> Result<bool, PipelineError> {
        if self.data.len() >= needed {
            return Ok(false);
        }

        let (data, tier) = if let Some(data) = self.preferred.allocate(needed) {
            (data, self.preferred.name())
        } else {
            tracing::warn!(
                bytes = needed,
                preferred = self.preferred.name(),
                fallback = self.fallback.name(),
                "preferred tier allocation failed, falling back"
            );
            let Some(data) = self.fallback.allocate(needed) else {
                tracing::error!(bytes = needed, "failed to allocate working buffer");
                return Err(PipelineError::AllocationFailure { bytes: needed });
            };
            (data, self.fallback.name())
        };

        tracing::debug!(
            from = self.data.len(),
            to = needed,
            tier,
            "working buffer grown"
        );
        self.data = data;
        self.tier = Some(tier);
        Ok(true)
    }

    /// The whole physical allocation.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// The whole physical allocation, mutably.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Default for WorkingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for WorkingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkingBuffer")
            .field("capacity", &self.data.len())
            .field("tier", &self.tier)
            .field("preferred", &self.preferred.name())
            .field("fallback", &self.fallback.name())
            .finish()
    }
}
