//! One [`Pool`] per GPU object kind, with the `never_release`/`destroy_out_of_date` policy
//! from the design's profile table (§4.2) baked in per kind:
//!
//! | object            | never_release | destroy_out_of_date | rationale                          |
//! |-------------------|----------------|----------------------|-------------------------------------|
//! | texture           | no             | no                   | reused across frames by shape       |
//! | buffer            | no             | no                   | reused across frames by shape       |
//! | texture view      | no             | no                   | cheap, reused like textures         |
//! | render pass       | yes            | no                   | few distinct shapes, expensive      |
//! | framebuffer       | no             | yes                  | pins specific attachments, stale fast |
//! | graphics pipeline | yes            | no                   | compilation is the expensive part   |
//! | compute pipeline  | yes            | no                   | compilation is the expensive part   |
//! | descriptor set    | no             | yes                  | bound resources change pass to pass |

use crate::error::RenderGraphError;
use crate::gpu::descriptor::{
    BufferDescriptor, ComputePipelineKey, DescriptorSetKey, FramebufferDescriptor,
    GraphicsPipelineKey, RenderPassDescriptor, SamplerDescriptor, TextureDescriptor,
    TextureViewDescriptor,
};
use crate::gpu::device::{
    Device, GpuBuffer, GpuComputePipeline, GpuDescriptorSet, GpuFramebuffer, GpuGraphicsPipeline,
    GpuRenderPass, GpuSampler, GpuTexture, GpuTextureView,
};
use crate::pool::generic::{Pool, Slot};

pub type TextureSlot = Slot<TextureDescriptor>;
pub type BufferSlot = Slot<BufferDescriptor>;
pub type TextureViewSlot = Slot<TextureViewDescriptor>;
pub type SamplerSlot = Slot<SamplerDescriptor>;
pub type RenderPassSlot = Slot<RenderPassDescriptor>;
pub type FramebufferSlot = Slot<FramebufferDescriptor>;
pub type GraphicsPipelineSlot = Slot<GraphicsPipelineKey>;
pub type ComputePipelineSlot = Slot<ComputePipelineKey>;
pub type DescriptorSetSlot = Slot<DescriptorSetKey>;

/// The full set of typed pools backing a [`crate::context::FrameContext`] (C3).
pub struct PoolSet {
    pub textures: Pool<TextureDescriptor, Box<dyn GpuTexture>>,
    pub buffers: Pool<BufferDescriptor, Box<dyn GpuBuffer>>,
    pub texture_views: Pool<TextureViewDescriptor, Box<dyn GpuTextureView>>,
    pub samplers: Pool<SamplerDescriptor, Box<dyn GpuSampler>>,
    pub render_passes: Pool<RenderPassDescriptor, Box<dyn GpuRenderPass>>,
    pub framebuffers: Pool<FramebufferDescriptor, Box<dyn GpuFramebuffer>>,
    pub graphics_pipelines: Pool<GraphicsPipelineKey, Box<dyn GpuGraphicsPipeline>>,
    pub compute_pipelines: Pool<ComputePipelineKey, Box<dyn GpuComputePipeline>>,
    pub descriptor_sets: Pool<DescriptorSetKey, Box<dyn GpuDescriptorSet>>,
}

impl PoolSet {
    pub fn new() -> Self {
        PoolSet {
            textures: Pool::new(false, false),
            buffers: Pool::new(false, false),
            texture_views: Pool::new(false, false),
            samplers: Pool::new(true, false),
            render_passes: Pool::new(true, false),
            framebuffers: Pool::new(false, true),
            graphics_pipelines: Pool::new(true, false),
            compute_pipelines: Pool::new(true, false),
            descriptor_sets: Pool::new(false, true),
        }
    }

    /// Roll every pool to the next frame: release entries checked out this frame, age and
    /// evict anything past its idle budget. Called once per frame by the executor after
    /// submission (spec §4.5).
    pub fn new_frame(&mut self) {
        self.textures.new_frame();
        self.buffers.new_frame();
        self.texture_views.new_frame();
        self.samplers.new_frame();
        self.render_passes.new_frame();
        self.framebuffers.new_frame();
        self.graphics_pipelines.new_frame();
        self.compute_pipelines.new_frame();
        self.descriptor_sets.new_frame();
    }

    pub fn clear(&mut self) {
        self.textures.clear();
        self.buffers.clear();
        self.texture_views.clear();
        self.samplers.clear();
        self.render_passes.clear();
        self.framebuffers.clear();
        self.graphics_pipelines.clear();
        self.compute_pipelines.clear();
        self.descriptor_sets.clear();
    }

    pub fn get_texture(
        &mut self,
        device: &dyn Device,
        descriptor: TextureDescriptor,
    ) -> Result<TextureSlot, RenderGraphError> {
        self.textures.get(descriptor, |d| device.create_texture(d))
    }

    pub fn resolve_texture(&self, slot: TextureSlot) -> &dyn GpuTexture {
        self.textures.resolve(slot).as_ref()
    }

    pub fn get_buffer(
        &mut self,
        device: &dyn Device,
        descriptor: BufferDescriptor,
    ) -> Result<BufferSlot, RenderGraphError> {
        self.buffers.get(descriptor, |d| device.create_buffer(d))
    }

    pub fn resolve_buffer(&self, slot: BufferSlot) -> &dyn GpuBuffer {
        self.buffers.resolve(slot).as_ref()
    }

    pub fn get_texture_view(
        &mut self,
        device: &dyn Device,
        texture: &dyn GpuTexture,
        descriptor: TextureViewDescriptor,
    ) -> Result<TextureViewSlot, RenderGraphError> {
        self.texture_views
            .get(descriptor, |d| device.create_texture_view(texture, d))
    }

    pub fn resolve_texture_view(&self, slot: TextureViewSlot) -> &dyn GpuTextureView {
        self.texture_views.resolve(slot).as_ref()
    }

    pub fn get_sampler(
        &mut self,
        device: &dyn Device,
        descriptor: SamplerDescriptor,
    ) -> Result<SamplerSlot, RenderGraphError> {
        self.samplers.get(descriptor, |d| device.create_sampler(d))
    }

    pub fn resolve_sampler(&self, slot: SamplerSlot) -> &dyn GpuSampler {
        self.samplers.resolve(slot).as_ref()
    }

    pub fn get_framebuffer(
        &mut self,
        device: &dyn Device,
        render_pass: &dyn GpuRenderPass,
        descriptor: FramebufferDescriptor,
        attachments: &[&dyn GpuTextureView],
    ) -> Result<FramebufferSlot, RenderGraphError> {
        self.framebuffers.get(descriptor, |d| {
            device.create_framebuffer(render_pass, d, attachments)
        })
    }

    pub fn resolve_framebuffer(&self, slot: FramebufferSlot) -> &dyn GpuFramebuffer {
        self.framebuffers.resolve(slot).as_ref()
    }

    pub fn get_render_pass(
        &mut self,
        device: &dyn Device,
        descriptor: RenderPassDescriptor,
    ) -> Result<RenderPassSlot, RenderGraphError> {
        self.render_passes
            .get(descriptor, |d| device.create_render_pass(d))
    }

    pub fn resolve_render_pass(&self, slot: RenderPassSlot) -> &dyn GpuRenderPass {
        self.render_passes.resolve(slot).as_ref()
    }

    pub fn get_graphics_pipeline(
        &mut self,
        device: &dyn Device,
        render_pass: &dyn GpuRenderPass,
        key: GraphicsPipelineKey,
    ) -> Result<GraphicsPipelineSlot, RenderGraphError> {
        self.graphics_pipelines
            .get(key, |k| device.create_graphics_pipeline(render_pass, k))
    }

    pub fn resolve_graphics_pipeline(&self, slot: GraphicsPipelineSlot) -> &dyn GpuGraphicsPipeline {
        self.graphics_pipelines.resolve(slot).as_ref()
    }

    pub fn get_compute_pipeline(
        &mut self,
        device: &dyn Device,
        key: ComputePipelineKey,
    ) -> Result<ComputePipelineSlot, RenderGraphError> {
        self.compute_pipelines
            .get(key, |k| device.create_compute_pipeline(k))
    }

    pub fn resolve_compute_pipeline(&self, slot: ComputePipelineSlot) -> &dyn GpuComputePipeline {
        self.compute_pipelines.resolve(slot).as_ref()
    }

    pub fn get_descriptor_set(
        &mut self,
        device: &dyn Device,
        key: DescriptorSetKey,
    ) -> Result<DescriptorSetSlot, RenderGraphError> {
        self.descriptor_sets
            .get(key, |k| device.create_descriptor_set(k))
    }

    pub fn resolve_descriptor_set(&self, slot: DescriptorSetSlot) -> &dyn GpuDescriptorSet {
        self.descriptor_sets.resolve(slot).as_ref()
    }
}

impl Default for PoolSet {
    fn default() -> Self {
        Self::new()
    }
}
