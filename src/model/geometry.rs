//! Geometry ownership and GPU-vs-system-memory placement
//!
//! The cache owns every geometry buffer for a model and decides per buffer
//! whether it is uploaded to the rendering backend or kept in system memory
//! and streamed per draw call. GPU-resident buffers draw faster but consume
//! a constrained budget, so placement runs in three bands against the
//! [`CacheTuning`] watermarks.

use log::{debug, warn};

use crate::core::config::CacheTuning;
use crate::math::Box3;

/// Where a buffer's data lives at draw time
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Residency {
    /// Uploaded to the rendering backend once, drawn from there
    GpuResident,
    /// Kept in system memory, streamed to the backend per draw call
    SystemStreamed,
}

/// A vertex/index buffer pair, possibly referenced by many fragments
#[derive(Clone, Debug)]
pub struct GeometryBuffer {
    pub vertex_data: Vec<u8>,
    pub index_data: Vec<u8>,
    /// Total byte size as reported by the decoder
    pub byte_size: usize,
    pub polygon_count: usize,
    /// 2D sheet content; always placed GPU-resident
    pub is_2d: bool,
    pub residency: Residency,
    /// Standalone bound; moved into the cache's packed array on add
    pub bound: Option<Box3>,
}

impl GeometryBuffer {
    pub fn new(vertex_data: Vec<u8>, index_data: Vec<u8>, polygon_count: usize, bound: Box3) -> Self {
        let byte_size = vertex_data.len() + index_data.len();
        Self {
            vertex_data,
            index_data,
            byte_size,
            polygon_count,
            is_2d: false,
            residency: Residency::SystemStreamed,
            bound: Some(bound),
        }
    }
}

/// Owns all geometry buffers for a model and tracks memory residency.
///
/// Buffers are identified by integer id; id 0 is reserved as invalid.
/// Bounds are kept in a packed float array (6 per id) grown geometrically,
/// matching the node store growth policy.
pub struct GeometryCache {
    buffers: Vec<Option<GeometryBuffer>>,
    /// Packed 6-float model-space box per id
    boxes: Vec<f32>,
    next_id: u32,
    tuning: CacheTuning,

    // Running statistics. Memory and polygon totals are cumulative
    // "ever loaded"; only live_count tracks removals.
    gpu_memory_used: usize,
    gpu_buffer_count: usize,
    system_memory_used: usize,
    live_count: usize,
    polygon_count: usize,
    instanced_polygon_count: usize,
}

impl GeometryCache {
    pub fn new(tuning: CacheTuning) -> Self {
        Self {
            // Slot 0 stays empty so id 0 is never valid
            buffers: vec![None],
            boxes: empty_box_floats(1),
            next_id: 1,
            tuning,
            gpu_memory_used: 0,
            gpu_buffer_count: 0,
            system_memory_used: 0,
            live_count: 0,
            polygon_count: 0,
            instanced_polygon_count: 0,
        }
    }

    /// Add a decoded buffer, deciding its residency and returning its id.
    ///
    /// Pass `id == 0` to auto-assign. The placement decision:
    /// - 2D content is always GPU-resident.
    /// - Below the low watermark (and under the object cap) → GPU-resident.
    /// - Above the high watermark or object cap → streamed.
    /// - In between → scored by `byte_size x instance_count` against the
    ///   cutoff; large heavily-instanced buffers win residency.
    ///
    /// The buffer's standalone bound is moved into the packed box array and
    /// freed, to bound peak memory during bulk load.
    pub fn add_geometry(&mut self, mut buffer: GeometryBuffer, instance_count: usize, id: u32) -> u32 {
        let id = if id == 0 {
            let assigned = self.next_id;
            self.next_id += 1;
            assigned
        } else {
            self.next_id = self.next_id.max(id + 1);
            id
        };

        let idx = id as usize;
        if idx >= self.buffers.len() {
            self.grow_to(idx + 1);
        }
        if self.buffers[idx].is_some() {
            warn!("geometry id {} already in use, replacing", id);
        }

        buffer.residency = self.decide_placement(&buffer, instance_count);
        match buffer.residency {
            Residency::GpuResident => {
                self.gpu_memory_used += buffer.byte_size;
                self.gpu_buffer_count += 1;
            }
            Residency::SystemStreamed => {
                self.system_memory_used += buffer.byte_size;
            }
        }
        self.polygon_count += buffer.polygon_count;
        self.instanced_polygon_count += buffer.polygon_count * instance_count.max(1);
        self.live_count += 1;

        debug!(
            "geometry {}: {} bytes x{} instances -> {:?}",
            id, buffer.byte_size, instance_count, buffer.residency
        );

        // Move the standalone bound into the packed array and drop it
        let bound = buffer.bound.take().unwrap_or_else(Box3::empty);
        bound.write_slice(&mut self.boxes[idx * 6..idx * 6 + 6]);

        self.buffers[idx] = Some(buffer);
        id
    }

    fn decide_placement(&self, buffer: &GeometryBuffer, instance_count: usize) -> Residency {
        if buffer.is_2d {
            return Residency::GpuResident;
        }
        if self.gpu_buffer_count >= self.tuning.gpu_object_limit
            || self.gpu_memory_used > self.tuning.gpu_memory_high
        {
            return Residency::SystemStreamed;
        }
        if self.gpu_memory_used < self.tuning.gpu_memory_low {
            return Residency::GpuResident;
        }
        let score = buffer.byte_size as u64 * instance_count.max(1) as u64;
        if score >= self.tuning.gpu_score_cutoff {
            Residency::GpuResident
        } else {
            Residency::SystemStreamed
        }
    }

    /// Detach a buffer, freeing its data.
    ///
    /// Only the live-buffer count decrements; the cumulative memory and
    /// polygon statistics are intentionally left alone — they record "ever
    /// loaded", and downstream streaming heuristics read them as monotone
    /// load-progress counters.
    pub fn remove_geometry(&mut self, id: u32) -> bool {
        match self.buffers.get_mut(id as usize) {
            Some(slot @ Some(_)) => {
                *slot = None;
                self.live_count -= 1;
                let idx = id as usize;
                Box3::empty().write_slice(&mut self.boxes[idx * 6..idx * 6 + 6]);
                true
            }
            _ => {
                warn!("remove_geometry: no geometry with id {}", id);
                false
            }
        }
    }

    /// Read a buffer's model-space box into `out`; empty for unknown or
    /// removed ids.
    pub fn get_model_box(&self, id: u32, out: &mut Box3) {
        let idx = id as usize;
        if idx == 0 || idx * 6 + 6 > self.boxes.len() {
            out.set_empty();
            return;
        }
        *out = Box3::from_slice(&self.boxes[idx * 6..idx * 6 + 6]);
    }

    /// The buffer for an id; callers must check for `None`
    pub fn geometry(&self, id: u32) -> Option<&GeometryBuffer> {
        if id == 0 {
            return None;
        }
        self.buffers.get(id as usize).and_then(|slot| slot.as_ref())
    }

    fn grow_to(&mut self, len: usize) {
        let old = self.buffers.len();
        let grown = (old * 3 / 2).max(len);
        self.buffers.resize_with(grown, || None);
        self.boxes.extend(empty_box_floats(grown - old));
    }

    // Statistics. All cumulative except live_count.

    pub fn gpu_memory_used(&self) -> usize {
        self.gpu_memory_used
    }

    pub fn gpu_buffer_count(&self) -> usize {
        self.gpu_buffer_count
    }

    pub fn system_memory_used(&self) -> usize {
        self.system_memory_used
    }

    /// Buffers currently attached (decrements on removal)
    pub fn live_count(&self) -> usize {
        self.live_count
    }

    /// Un-instanced polygons ever loaded
    pub fn polygon_count(&self) -> usize {
        self.polygon_count
    }

    /// Polygons ever loaded, weighted by instance count
    pub fn instanced_polygon_count(&self) -> usize {
        self.instanced_polygon_count
    }
}

impl Default for GeometryCache {
    fn default() -> Self {
        Self::new(CacheTuning::default())
    }
}

fn empty_box_floats(count: usize) -> Vec<f32> {
    let mut floats = Vec::with_capacity(count * 6);
    for _ in 0..count {
        floats.extend_from_slice(&[
            f32::INFINITY,
            f32::INFINITY,
            f32::INFINITY,
            f32::NEG_INFINITY,
            f32::NEG_INFINITY,
            f32::NEG_INFINITY,
        ]);
    }
    floats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Vec3;

    fn buffer(bytes: usize) -> GeometryBuffer {
        GeometryBuffer::new(vec![0u8; bytes], Vec::new(), bytes / 100, unit_box())
    }

    fn unit_box() -> Box3 {
        Box3::new(Vec3::ZERO, Vec3::ONE)
    }

    fn tight_tuning() -> CacheTuning {
        CacheTuning {
            gpu_memory_low: 1000,
            gpu_memory_high: 3000,
            gpu_object_limit: 100,
            gpu_score_cutoff: 500 * 4,
        }
    }

    #[test]
    fn test_low_band_always_resident() {
        let mut cache = GeometryCache::new(tight_tuning());
        let id = cache.add_geometry(buffer(200), 1, 0);
        assert_eq!(cache.geometry(id).unwrap().residency, Residency::GpuResident);
        assert_eq!(cache.gpu_memory_used(), 200);
        assert_eq!(cache.gpu_buffer_count(), 1);
    }

    #[test]
    fn test_high_band_always_streamed() {
        let mut cache = GeometryCache::new(tight_tuning());
        // Push cumulative GPU memory past the high watermark
        cache.add_geometry(buffer(4000), 1, 0);
        let id = cache.add_geometry(buffer(100), 50, 0);
        assert_eq!(cache.geometry(id).unwrap().residency, Residency::SystemStreamed);
        assert!(cache.system_memory_used() >= 100);
    }

    #[test]
    fn test_middle_band_scored() {
        let mut cache = GeometryCache::new(tight_tuning());
        // Land between the watermarks
        cache.add_geometry(buffer(1500), 1, 0);
        assert!(cache.gpu_memory_used() >= 1000 && cache.gpu_memory_used() <= 3000);

        // score 500 * 4 meets the cutoff
        let winner = cache.add_geometry(buffer(500), 4, 0);
        assert_eq!(cache.geometry(winner).unwrap().residency, Residency::GpuResident);

        // score 500 * 1 does not
        let loser = cache.add_geometry(buffer(500), 1, 0);
        assert_eq!(cache.geometry(loser).unwrap().residency, Residency::SystemStreamed);
    }

    #[test]
    fn test_object_cap_forces_streaming() {
        let tuning = CacheTuning { gpu_object_limit: 2, ..tight_tuning() };
        let mut cache = GeometryCache::new(tuning);
        cache.add_geometry(buffer(10), 1, 0);
        cache.add_geometry(buffer(10), 1, 0);
        let id = cache.add_geometry(buffer(10), 1, 0);
        assert_eq!(cache.geometry(id).unwrap().residency, Residency::SystemStreamed);
    }

    #[test]
    fn test_2d_always_resident() {
        let mut cache = GeometryCache::new(tight_tuning());
        cache.add_geometry(buffer(4000), 1, 0);

        let mut sheet = buffer(100);
        sheet.is_2d = true;
        let id = cache.add_geometry(sheet, 1, 0);
        assert_eq!(cache.geometry(id).unwrap().residency, Residency::GpuResident);
    }

    #[test]
    fn test_auto_assigned_ids() {
        let mut cache = GeometryCache::default();
        let a = cache.add_geometry(buffer(10), 1, 0);
        let b = cache.add_geometry(buffer(10), 1, 0);
        assert_eq!(a, 1);
        assert_eq!(b, 2);

        // Explicit id bumps the auto counter past it
        let c = cache.add_geometry(buffer(10), 1, 10);
        assert_eq!(c, 10);
        assert_eq!(cache.add_geometry(buffer(10), 1, 0), 11);
    }

    #[test]
    fn test_bound_moved_into_packed_array() {
        let mut cache = GeometryCache::default();
        let id = cache.add_geometry(buffer(10), 1, 0);

        assert!(cache.geometry(id).unwrap().bound.is_none());
        let mut out = Box3::empty();
        cache.get_model_box(id, &mut out);
        assert_eq!(out, unit_box());
    }

    #[test]
    fn test_model_box_unknown_id_empty() {
        let cache = GeometryCache::default();
        let mut out = unit_box();
        cache.get_model_box(999, &mut out);
        assert!(out.is_empty());
        cache.get_model_box(0, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_remove_keeps_cumulative_stats() {
        let mut cache = GeometryCache::new(tight_tuning());
        let id = cache.add_geometry(buffer(200), 2, 0);
        let gpu_before = cache.gpu_memory_used();
        let polys_before = cache.polygon_count();

        assert!(cache.remove_geometry(id));
        assert!(cache.geometry(id).is_none());
        assert_eq!(cache.live_count(), 0);

        // Cumulative statistics are not rolled back
        assert_eq!(cache.gpu_memory_used(), gpu_before);
        assert_eq!(cache.polygon_count(), polys_before);

        let mut out = unit_box();
        cache.get_model_box(id, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut cache = GeometryCache::default();
        assert!(!cache.remove_geometry(42));
        assert!(!cache.remove_geometry(0));
    }

    #[test]
    fn test_instanced_polygon_accounting() {
        let mut cache = GeometryCache::default();
        cache.add_geometry(buffer(1000), 5, 0);
        assert_eq!(cache.polygon_count(), 10);
        assert_eq!(cache.instanced_polygon_count(), 50);
    }
}
