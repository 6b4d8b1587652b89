//! Tuning parameters for geometry placement and batch sizing

/// Default fragments per render batch
pub const FRAGS_PER_BATCH: usize = 512;

/// Placement tuning for the geometry cache.
///
/// GPU-resident buffers draw faster but consume a constrained memory budget,
/// so placement runs in three bands: below `gpu_memory_low` everything is
/// kept resident, above `gpu_memory_high` everything is streamed, and in
/// between the decision is scored per buffer.
#[derive(Clone, Copy, Debug)]
pub struct CacheTuning {
    /// Below this much GPU memory in use, new geometry is always resident (bytes)
    pub gpu_memory_low: usize,
    /// Above this much GPU memory in use, new geometry is always streamed (bytes)
    pub gpu_memory_high: usize,
    /// Hard cap on the number of GPU-resident buffers
    pub gpu_object_limit: usize,
    /// Score cutoff (byte size x instance count) for the middle band
    pub gpu_score_cutoff: u64,
}

impl Default for CacheTuning {
    fn default() -> Self {
        Self {
            gpu_memory_low: 150 * 1024 * 1024,
            gpu_memory_high: 450 * 1024 * 1024,
            gpu_object_limit: 25_000,
            gpu_score_cutoff: 6 * 1024 * 1024,
        }
    }
}

/// Batch sizing inputs for the fragment iterator
#[derive(Clone, Copy, Debug, Default)]
pub struct IteratorConfig {
    /// Halve the batch size for constrained (mobile-class) environments
    pub constrained_memory: bool,
    /// Quarter the batch size for 2D sheets, whose meshes pack far more
    /// drawing per fragment
    pub is_2d: bool,
}

impl IteratorConfig {
    /// Fragments per batch under this configuration
    pub fn batch_size(&self) -> usize {
        let mut size = FRAGS_PER_BATCH;
        if self.constrained_memory {
            size /= 2;
        }
        if self.is_2d {
            size /= 4;
        }
        size.max(1)
    }
}
