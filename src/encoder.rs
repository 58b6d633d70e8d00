//! Render pass command recording with binding caches (C8).
//!
//! A [`RenderPassEncoder`] is what a pass's executable closure actually sees. It wraps the raw
//! [`CommandEncoder`] with caches so a pass can bind generously without worrying about redundant
//! driver calls:
//! - the bound graphics/compute pipeline, keyed by its pipeline key (skips a rebind if the next
//!   draw wants the same pipeline state, the common case across a batch of draws using the same
//!   material);
//! - vertex/index buffer bindings, compared by object identity per slot;
//! - a global binding table for descriptor sets (spec §4.6): `set_global_*` calls push bindings
//!   that [`RenderPassEncoder::bind_root_signature`] resolves against a shader's declared
//!   tables, last write wins per `(set, slot)`. There is no explicit push/pop; a later
//!   `set_global_*` call simply shadows an earlier one for the rest of the pass.

use fxhash::FxHashMap;
use smallvec::SmallVec;
use std::hash::{Hash, Hasher};

use crate::context::FrameContext;
use crate::error::RenderGraphError;
use crate::gpu::descriptor::{
    BindingKind, ComputePipelineKey, DescriptorSetKey, DynamicPipelineState, GraphicsPipelineKey,
    IndexType, RootSignature, SamplerDescriptor, ScissorRect, Viewport,
};
use crate::gpu::device::{CommandEncoder, Device, GpuBuffer, GpuDescriptorSet, GpuSampler, GpuTexture};
use crate::graph::handle::{BufferHandle, TextureHandle};
use crate::graph::resolve::{resolve_buffer, resolve_texture};
use crate::graph::resource::{BufferNode, TextureNode};
use crate::pool::typed::{BufferSlot, PoolSet, RenderPassSlot, TextureSlot};

/// How many descriptor tables (sets) [`RenderPassEncoder::bind_root_signature`] resolves per
/// call (spec §4.6).
const MAX_DESCRIPTOR_TABLES: usize = 4;

/// One binding a `set_global_*` call pushed into a [`GlobalBindingTable`], not yet resolved
/// against any particular shader's root signature.
enum GlobalBinding<'a> {
    Texture(TextureHandle),
    TextureObject(&'a dyn GpuTexture),
    Sampler(SamplerDescriptor),
    Buffer {
        handle: BufferHandle,
        offset: Option<u64>,
        size: Option<u64>,
    },
}

/// A flat, append-only log of `(set, slot, binding)` pushes. Resolving a slot walks backward
/// from the end and returns the first match, so the last push for a given `(set, slot)` always
/// wins — the global-binding equivalent of shadowing, without needing explicit scopes.
struct GlobalBindingTable<'a> {
    entries: Vec<(u32, u32, GlobalBinding<'a>)>,
}

impl<'a> GlobalBindingTable<'a> {
    fn new() -> Self {
        GlobalBindingTable { entries: Vec::new() }
    }

    fn push(&mut self, set: u32, slot: u32, binding: GlobalBinding<'a>) {
        self.entries.push((set, slot, binding));
    }

    fn resolve(&self, set: u32, slot: u32) -> Option<&GlobalBinding<'a>> {
        self.entries
            .iter()
            .rev()
            .find(|(s, sl, _)| *s == set && *sl == slot)
            .map(|(_, _, binding)| binding)
    }
}

/// What a pass's executable closure actually touches, regardless of whether the pass is a
/// render pass (bound inside `begin_render_pass`/`end_render_pass`, `render_pass: Some`) or a
/// compute pass (recorded standalone, `render_pass: None` — calling
/// [`RenderPassEncoder::bind_graphics_pipeline`] from one is a misuse and panics, same as
/// calling `bind_compute_pipeline` mid-render-pass would be on a real device).
pub struct RenderPassEncoder<'a> {
    device: &'a dyn Device,
    context: &'a mut FrameContext,
    encoder: &'a mut dyn CommandEncoder,
    render_pass: Option<RenderPassSlot>,
    textures: &'a [TextureNode],
    buffers: &'a [BufferNode],
    managed_textures: &'a FxHashMap<TextureHandle, TextureSlot>,
    managed_buffers: &'a FxHashMap<BufferHandle, BufferSlot>,
    globals: GlobalBindingTable<'a>,
    last_descriptor_set_keys: [Option<DescriptorSetKey>; MAX_DESCRIPTOR_TABLES],
    bound_pipeline: Option<GraphicsPipelineKey>,
    bound_compute_pipeline: Option<ComputePipelineKey>,
    bound_vertex_buffers: SmallVec<[(u32, *const ()); 4]>,
    bound_index_buffer: Option<*const ()>,
    bound_descriptor_sets: SmallVec<[(u32, u64); 4]>,
}

impl<'a> RenderPassEncoder<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        device: &'a dyn Device,
        context: &'a mut FrameContext,
        encoder: &'a mut dyn CommandEncoder,
        render_pass: Option<RenderPassSlot>,
        textures: &'a [TextureNode],
        buffers: &'a [BufferNode],
        managed_textures: &'a FxHashMap<TextureHandle, TextureSlot>,
        managed_buffers: &'a FxHashMap<BufferHandle, BufferSlot>,
    ) -> Self {
        RenderPassEncoder {
            device,
            context,
            encoder,
            render_pass,
            textures,
            buffers,
            managed_textures,
            managed_buffers,
            globals: GlobalBindingTable::new(),
            last_descriptor_set_keys: [None; MAX_DESCRIPTOR_TABLES],
            bound_pipeline: None,
            bound_compute_pipeline: None,
            bound_vertex_buffers: SmallVec::new(),
            bound_index_buffer: None,
            bound_descriptor_sets: SmallVec::new(),
        }
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.encoder.set_viewport(viewport);
    }

    pub fn set_scissor(&mut self, scissor: ScissorRect) {
        self.encoder.set_scissor(scissor);
    }

    /// No-op if the device doesn't support dynamic state (spec §4.2): callers that want
    /// portability across tiers should still bake the equivalent state into their
    /// [`GraphicsPipelineKey`], since [`GraphicsPipelineKey::normalize_for_dynamic_state`]
    /// collapses it out only on devices that actually support it.
    pub fn set_dynamic_state(&mut self, state: DynamicPipelineState) {
        if self.context.dynamic_state_tier == crate::gpu::descriptor::DynamicStateTier::Tier1 {
            self.encoder.set_dynamic_state(state);
        }
    }

    pub fn bind_graphics_pipeline(&mut self, key: GraphicsPipelineKey) -> Result<(), RenderGraphError> {
        let normalized = key.normalize_for_dynamic_state(self.context.dynamic_state_tier);
        if self.bound_pipeline == Some(normalized) {
            return Ok(());
        }
        let device = self.device;
        let render_pass_slot = self
            .render_pass
            .expect("bind_graphics_pipeline called outside a render pass");
        // Borrow the two sub-pools disjointly: `resolve` only needs a shared borrow of
        // `render_passes`, `get` on `graphics_pipelines` needs a mutable one, and a method on
        // the whole `PoolSet` couldn't hand out both at once.
        let PoolSet {
            render_passes,
            graphics_pipelines,
            ..
        } = &mut self.context.pools;
        let render_pass = render_passes.resolve(render_pass_slot);
        let slot = graphics_pipelines.get(normalized, |k| device.create_graphics_pipeline(render_pass.as_ref(), k))?;
        let pipeline = graphics_pipelines.resolve(slot);
        self.encoder.bind_graphics_pipeline(pipeline.as_ref());
        self.bound_pipeline = Some(normalized);
        self.last_descriptor_set_keys = [None; MAX_DESCRIPTOR_TABLES];
        Ok(())
    }

    pub fn bind_compute_pipeline(&mut self, key: ComputePipelineKey) -> Result<(), RenderGraphError> {
        if self.bound_compute_pipeline == Some(key) {
            return Ok(());
        }
        let slot = self.context.pools.get_compute_pipeline(self.device, key)?;
        let pipeline = self.context.pools.resolve_compute_pipeline(slot);
        self.encoder.bind_compute_pipeline(pipeline);
        self.bound_compute_pipeline = Some(key);
        self.last_descriptor_set_keys = [None; MAX_DESCRIPTOR_TABLES];
        Ok(())
    }

    pub fn dispatch(&mut self, group_count_x: u32, group_count_y: u32, group_count_z: u32) {
        self.encoder.dispatch(group_count_x, group_count_y, group_count_z);
    }

    /// Binds `texture` at `(set, slot)` for the rest of this pass, or until shadowed by another
    /// `set_global_*` call at the same `(set, slot)` (spec §4.6).
    pub fn set_global_texture(&mut self, set: u32, slot: u32, texture: TextureHandle) {
        self.globals.push(set, slot, GlobalBinding::Texture(texture));
    }

    /// Like [`set_global_texture`](Self::set_global_texture), but binds a texture object
    /// directly instead of resolving a graph handle — used for resources the graph never
    /// declared, such as this crate's own built-in default textures.
    pub fn set_global_texture_handle(&mut self, set: u32, slot: u32, texture: &'a dyn GpuTexture) {
        self.globals.push(set, slot, GlobalBinding::TextureObject(texture));
    }

    pub fn set_global_sampler(&mut self, set: u32, slot: u32, sampler: SamplerDescriptor) {
        self.globals.push(set, slot, GlobalBinding::Sampler(sampler));
    }

    pub fn set_global_buffer(&mut self, set: u32, slot: u32, buffer: BufferHandle) {
        self.globals.push(
            set,
            slot,
            GlobalBinding::Buffer {
                handle: buffer,
                offset: None,
                size: None,
            },
        );
    }

    pub fn set_global_buffer_with_offset_size(&mut self, set: u32, slot: u32, buffer: BufferHandle, offset: u64, size: u64) {
        self.globals.push(
            set,
            slot,
            GlobalBinding::Buffer {
                handle: buffer,
                offset: Some(offset),
                size: Some(size),
            },
        );
    }

    /// Walks `root_signature`'s tables, resolving each slot against whatever the pass's
    /// `set_global_*` calls last bound there (falling back to this context's default resources
    /// for anything never explicitly bound — spec §4.6), then binds one descriptor set per
    /// table, skipping any table whose resolved resources are identical to what is already
    /// bound there.
    pub fn bind_root_signature(&mut self, root_signature: &RootSignature) -> Result<(), RenderGraphError> {
        for (set, table) in root_signature.tables.iter().enumerate().take(MAX_DESCRIPTOR_TABLES) {
            let set = set as u32;
            let mut resource_identities: SmallVec<[u64; 8]> = SmallVec::new();
            let mut offsets: SmallVec<[u64; 8]> = SmallVec::new();
            let mut sizes: SmallVec<[u64; 8]> = SmallVec::new();

            for (slot, kind) in table.bindings.iter().enumerate() {
                let slot = slot as u32;
                match kind {
                    BindingKind::Texture => {
                        let texture: &dyn GpuTexture = match self.globals.resolve(set, slot) {
                            Some(GlobalBinding::Texture(handle)) => {
                                resolve_texture(self.textures, self.managed_textures, &self.context.pools, *handle)
                            }
                            Some(GlobalBinding::TextureObject(texture)) => *texture,
                            _ => self.context.missing_texture(),
                        };
                        resource_identities.push(texture as *const dyn GpuTexture as *const u8 as u64);
                        offsets.push(0);
                        sizes.push(0);
                    }
                    BindingKind::Sampler => {
                        let descriptor = match self.globals.resolve(set, slot) {
                            Some(GlobalBinding::Sampler(descriptor)) => *descriptor,
                            _ => SamplerDescriptor::linear_clamp(),
                        };
                        let device = self.device;
                        let sampler_slot = self.context.pools.get_sampler(device, descriptor)?;
                        let sampler = self.context.pools.resolve_sampler(sampler_slot);
                        resource_identities.push(sampler as *const dyn GpuSampler as *const u8 as u64);
                        offsets.push(0);
                        sizes.push(0);
                    }
                    BindingKind::UniformBuffer | BindingKind::RwBuffer => {
                        match self.globals.resolve(set, slot) {
                            Some(GlobalBinding::Buffer { handle, offset, size }) => {
                                let buffer = resolve_buffer(self.buffers, self.managed_buffers, &self.context.pools, *handle);
                                resource_identities.push(buffer as *const dyn GpuBuffer as *const u8 as u64);
                                offsets.push(offset.unwrap_or(0));
                                sizes.push(size.unwrap_or(0));
                            }
                            _ => {
                                resource_identities.push(0);
                                offsets.push(0);
                                sizes.push(0);
                            }
                        }
                    }
                }
            }

            let mut resource_hasher = fxhash::FxHasher::default();
            resource_identities.hash(&mut resource_hasher);
            let bound_resources_hash = resource_hasher.finish();

            let mut offset_hasher = fxhash::FxHasher::default();
            offsets.hash(&mut offset_hasher);
            sizes.hash(&mut offset_hasher);
            let offsets_hash = offset_hasher.finish();

            let key = DescriptorSetKey {
                layout_id: set as u64,
                bound_resources_hash,
                offsets_hash,
            };

            if self.last_descriptor_set_keys[set as usize] == Some(key) {
                continue;
            }

            let device = self.device;
            let descriptor_set_slot = self.context.pools.get_descriptor_set(device, key)?;
            let descriptor_set = self.context.pools.resolve_descriptor_set(descriptor_set_slot);
            self.encoder.bind_descriptor_set(set, descriptor_set);
            self.last_descriptor_set_keys[set as usize] = Some(key);
        }
        Ok(())
    }

    /// Binds `set` at `slot` directly, bypassing the global binding table and root-signature
    /// resolution entirely. An escape hatch for passes that already hold a
    /// [`GpuDescriptorSet`] object (e.g. ones shared across frames) and don't need the
    /// shadowing/resolution machinery `set_global_*` + [`bind_root_signature`] provides.
    pub fn bind_descriptor_set(&mut self, slot: u32, set: &dyn GpuDescriptorSet) -> Result<(), RenderGraphError> {
        let identity = set as *const dyn GpuDescriptorSet as *const u8 as u64;
        if self.bound_descriptor_sets.iter().any(|&(s, id)| s == slot && id == identity) {
            return Ok(());
        }
        self.encoder.bind_descriptor_set(slot, set);
        self.bound_descriptor_sets.retain(|(s, _)| *s != slot);
        self.bound_descriptor_sets.push((slot, identity));
        Ok(())
    }

    pub fn bind_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle, offset: u64) {
        let object = resolve_buffer(self.buffers, self.managed_buffers, &self.context.pools, buffer);
        let identity = object as *const dyn crate::gpu::device::GpuBuffer as *const u8 as *const ();
        if self
            .bound_vertex_buffers
            .iter()
            .any(|&(s, id)| s == slot && id == identity)
        {
            return;
        }
        self.encoder.bind_vertex_buffer(slot, object, offset);
        self.bound_vertex_buffers.retain(|(s, _)| *s != slot);
        self.bound_vertex_buffers.push((slot, identity));
    }

    pub fn bind_index_buffer(&mut self, buffer: BufferHandle, offset: u64, index_type: IndexType) {
        let object = resolve_buffer(self.buffers, self.managed_buffers, &self.context.pools, buffer);
        let identity = object as *const dyn crate::gpu::device::GpuBuffer as *const u8 as *const ();
        if self.bound_index_buffer == Some(identity) {
            return;
        }
        self.encoder.bind_index_buffer(object, offset, index_type);
        self.bound_index_buffer = Some(identity);
    }

    pub fn texture(&self, handle: TextureHandle) -> &dyn GpuTexture {
        resolve_texture(self.textures, self.managed_textures, &self.context.pools, handle)
    }

    pub fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        self.encoder.draw(vertex_count, instance_count, first_vertex, first_instance);
    }

    pub fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        self.encoder
            .draw_indexed(index_count, instance_count, first_index, vertex_offset, first_instance);
    }

    pub fn push_constants(&mut self, offset: u32, data: &[u8]) {
        self.encoder.push_constants(offset, data);
    }
}
