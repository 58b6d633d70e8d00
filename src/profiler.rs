//! GPU timestamp profiler (C4).
//!
//! Each frame writes a begin/end timestamp pair per named scope into a ring of query pools
//! sized to the number of frame contexts in flight, so resolving frame N's timestamps never
//! races with frame N's own queries still being written. Resolution happens lazily, on the
//! first `last_frame_durations` call after the device signals the corresponding frame has
//! finished.

use fxhash::FxHashMap;

use crate::error::RenderGraphError;
use crate::gpu::device::{CommandEncoder, Device, GpuQueryPool};

const QUERIES_PER_SCOPE: u32 = 2;

struct RingSlot {
    pool: Box<dyn GpuQueryPool>,
    scope_names: Vec<String>,
    next_query: u32,
}

/// Named begin/end GPU timestamp scopes, resolved into durations a frame later.
pub struct GpuProfiler {
    rings: Vec<RingSlot>,
    current: usize,
    capacity_per_pool: u32,
    timestamp_period_ns: f64,
    last_durations: FxHashMap<String, f64>,
}

impl GpuProfiler {
    pub fn new(
        device: &dyn Device,
        frame_context_count: usize,
        max_scopes_per_frame: u32,
    ) -> Result<Self, RenderGraphError> {
        let capacity_per_pool = max_scopes_per_frame * QUERIES_PER_SCOPE;
        let mut rings = Vec::with_capacity(frame_context_count);
        for _ in 0..frame_context_count {
            rings.push(RingSlot {
                pool: device.create_query_pool(capacity_per_pool)?,
                scope_names: Vec::new(),
                next_query: 0,
            });
        }
        Ok(GpuProfiler {
            rings,
            current: 0,
            capacity_per_pool,
            timestamp_period_ns: device.timestamp_period_ns(),
            last_durations: FxHashMap::default(),
        })
    }

    /// Start a new frame's scope recording, resetting this ring slot's query cursor. Must be
    /// called once per frame, before any [`GpuProfiler::scope`] calls for that frame.
    pub fn begin_frame(&mut self, frame_index: u64) {
        self.current = (frame_index as usize) % self.rings.len();
        let slot = &mut self.rings[self.current];
        slot.scope_names.clear();
        slot.next_query = 0;
    }

    /// Record a begin/end timestamp pair bracketing `record`, under `name`.
    pub fn scope(
        &mut self,
        encoder: &mut dyn CommandEncoder,
        name: impl Into<String>,
        record: impl FnOnce(&mut dyn CommandEncoder),
    ) {
        let slot = &mut self.rings[self.current];
        if slot.next_query + QUERIES_PER_SCOPE > self.capacity_per_pool {
            log::warn!("profiler scope budget exceeded, dropping timestamp for {}", name.into());
            record(encoder);
            return;
        }
        let begin_query = slot.next_query;
        let end_query = begin_query + 1;
        slot.next_query += QUERIES_PER_SCOPE;
        slot.scope_names.push(name.into());

        encoder.write_timestamp(slot.pool.as_ref(), begin_query);
        record(encoder);
        encoder.write_timestamp(slot.pool.as_ref(), end_query);
    }

    pub fn end_frame(&mut self) {
        // Nothing to flush eagerly: resolution is pulled lazily via `resolve`.
    }

    /// Resolve the ring slot that was active `frames_ago` frames ago into wall-clock
    /// durations. The caller is responsible for only resolving slots the device has confirmed
    /// have finished executing (i.e. `frames_ago >= frame_context_count - 1`).
    pub fn resolve(&mut self, timestamps_ns: &[u64], frames_ago: usize) {
        let ring_len = self.rings.len();
        let index = (self.current + ring_len - (frames_ago % ring_len)) % ring_len;
        let slot = &self.rings[index];

        self.last_durations.clear();
        for (scope_index, name) in slot.scope_names.iter().enumerate() {
            let begin = timestamps_ns
                .get(scope_index * QUERIES_PER_SCOPE as usize)
                .copied()
                .unwrap_or(0);
            let end = timestamps_ns
                .get(scope_index * QUERIES_PER_SCOPE as usize + 1)
                .copied()
                .unwrap_or(begin);
            let duration_ns = (end.saturating_sub(begin)) as f64 * self.timestamp_period_ns;
            self.last_durations.insert(name.clone(), duration_ns);
        }
    }

    pub fn last_frame_durations(&self) -> &FxHashMap<String, f64> {
        &self.last_durations
    }
}
