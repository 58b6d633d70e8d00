//! The `Device`/`CommandEncoder` boundary a backend implements.
//!
//! These traits are deliberately object-safe (`dyn Device`, `dyn CommandEncoder`) rather than
//! built around associated types, so a single trait object can be threaded through the graph
//! builder/compiler/executor/encoder without the crate ever naming a concrete backend type.
//! `examples/ennis-autograph-ng`'s later `render` crate takes the same turn away from its
//! earlier associated-type `RendererBackend` design for the same reason.

use std::fmt::Debug;

use crate::error::RenderGraphError;
use crate::gpu::descriptor::{
    BufferDescriptor, ClearColor, ClearDepthStencil, ComputePipelineKey, DescriptorSetKey,
    DynamicPipelineState, FramebufferDescriptor, GraphicsPipelineKey, IndexType, LoadAction,
    RenderPassDescriptor, SamplerDescriptor, ScissorRect, TextureDescriptor, TextureViewDescriptor,
    Viewport,
};

/// A GPU texture object. Backends wrap their native handle (`VkImage`, ...) behind this.
pub trait GpuTexture: Debug {
    fn descriptor(&self) -> &TextureDescriptor;
}

/// A GPU buffer object.
pub trait GpuBuffer: Debug {
    fn descriptor(&self) -> &BufferDescriptor;
}

/// A texture view (an image subresource range viewed through a format/aspect).
pub trait GpuTextureView: Debug {
    fn descriptor(&self) -> &TextureViewDescriptor;
}

/// A compiled render pass object, compatible with any framebuffer sharing its
/// [`RenderPassDescriptor`].
pub trait GpuRenderPass: Debug {
    fn descriptor(&self) -> &RenderPassDescriptor;
}

/// A framebuffer bound to a specific render pass and set of attachment views.
pub trait GpuFramebuffer: Debug {
    fn descriptor(&self) -> &FramebufferDescriptor;
}

/// A compiled graphics pipeline state object.
pub trait GpuGraphicsPipeline: Debug {
    fn key(&self) -> &GraphicsPipelineKey;
}

/// A compiled compute pipeline state object.
pub trait GpuComputePipeline: Debug {
    fn key(&self) -> &ComputePipelineKey;
}

/// A bound descriptor set.
pub trait GpuDescriptorSet: Debug {
    fn key(&self) -> &DescriptorSetKey;
}

/// A sampler object.
pub trait GpuSampler: Debug {
    fn descriptor(&self) -> &SamplerDescriptor;
}

/// A GPU timestamp query pool, used by [`crate::profiler::GpuProfiler`] (C4).
pub trait GpuQueryPool: Debug {
    fn capacity(&self) -> u32;
}

/// The presentable surface a frame's final pass writes to.
pub trait GpuSwapchain: Debug {
    fn extent(&self) -> (u32, u32);
}

/// Everything the render graph needs from a physical device to build and tear down pooled
/// objects and to record and submit command buffers.
///
/// Instance/device creation, memory allocation strategy and presentation setup are the
/// embedder's responsibility; by the time the graph sees a `dyn Device` it is fully usable.
pub trait Device {
    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
    ) -> Result<Box<dyn GpuTexture>, RenderGraphError>;

    fn create_buffer(
        &self,
        descriptor: &BufferDescriptor,
    ) -> Result<Box<dyn GpuBuffer>, RenderGraphError>;

    /// Maps `buffer` at `offset` and copies `data` into it (spec §4.5/§4.7: upload passes stage
    /// their payload through a host-visible buffer before the device-side copy). Fails only if
    /// the device rejects the mapped range at the backend level; the caller is responsible for
    /// checking `data` actually fits before calling this.
    fn write_buffer(&self, buffer: &dyn GpuBuffer, offset: u64, data: &[u8]) -> Result<(), RenderGraphError>;

    fn create_texture_view(
        &self,
        texture: &dyn GpuTexture,
        descriptor: &TextureViewDescriptor,
    ) -> Result<Box<dyn GpuTextureView>, RenderGraphError>;

    fn create_render_pass(
        &self,
        descriptor: &RenderPassDescriptor,
    ) -> Result<Box<dyn GpuRenderPass>, RenderGraphError>;

    fn create_framebuffer(
        &self,
        render_pass: &dyn GpuRenderPass,
        descriptor: &FramebufferDescriptor,
        attachments: &[&dyn GpuTextureView],
    ) -> Result<Box<dyn GpuFramebuffer>, RenderGraphError>;

    fn create_graphics_pipeline(
        &self,
        render_pass: &dyn GpuRenderPass,
        key: &GraphicsPipelineKey,
    ) -> Result<Box<dyn GpuGraphicsPipeline>, RenderGraphError>;

    fn create_compute_pipeline(
        &self,
        key: &ComputePipelineKey,
    ) -> Result<Box<dyn GpuComputePipeline>, RenderGraphError>;

    fn create_descriptor_set(
        &self,
        key: &DescriptorSetKey,
    ) -> Result<Box<dyn GpuDescriptorSet>, RenderGraphError>;

    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<Box<dyn GpuSampler>, RenderGraphError>;

    fn create_query_pool(&self, capacity: u32) -> Result<Box<dyn GpuQueryPool>, RenderGraphError>;

    /// Whether this device can set primitive topology/cull mode/front face/depth test state
    /// dynamically outside of a pipeline object (spec §4.2/§4.6).
    fn dynamic_state_tier(&self) -> crate::gpu::descriptor::DynamicStateTier;

    /// Nanoseconds represented by one tick of a resolved timestamp query, for
    /// [`crate::profiler::GpuProfiler`].
    fn timestamp_period_ns(&self) -> f64;

    /// Begin recording a new command buffer for this frame.
    fn create_command_encoder(&self) -> Box<dyn CommandEncoder>;

    /// Submit a recorded command buffer for execution, returning once it has been handed to
    /// the device's queue (not once it has finished executing).
    fn submit(&self, encoder: Box<dyn CommandEncoder>) -> Result<(), RenderGraphError>;

    /// Acquire the next backbuffer image from a swapchain previously imported into a frame.
    fn acquire_next_image(
        &self,
        swapchain: &dyn GpuSwapchain,
    ) -> Result<Box<dyn GpuTexture>, RenderGraphError>;

    /// Present a previously-acquired backbuffer.
    fn present(&self, swapchain: &dyn GpuSwapchain) -> Result<(), RenderGraphError>;
}

/// A single color attachment bound by `begin_render_pass`.
pub struct ColorAttachment<'a> {
    pub view: &'a dyn GpuTextureView,
    pub load_action: LoadAction,
    pub clear_value: ClearColor,
}

/// The depth/stencil attachment bound by `begin_render_pass`, if any.
pub struct DepthAttachment<'a> {
    pub view: &'a dyn GpuTextureView,
    pub load_action: LoadAction,
    pub clear_value: ClearDepthStencil,
}

/// A single barrier transitioning one texture (or texture subresource range) from one state
/// to another (spec §4.5.1).
#[derive(Copy, Clone, Debug)]
pub struct TextureBarrier<'a> {
    pub texture: &'a dyn GpuTexture,
    pub base_mip_level: u32,
    pub mip_level_count: u32,
    pub base_array_layer: u32,
    pub array_layer_count: u32,
    pub src_state: crate::gpu::descriptor::ResourceState,
    pub dst_state: crate::gpu::descriptor::ResourceState,
}

/// A single barrier transitioning one buffer from one state to another.
#[derive(Copy, Clone, Debug)]
pub struct BufferBarrier<'a> {
    pub buffer: &'a dyn GpuBuffer,
    pub src_state: crate::gpu::descriptor::ResourceState,
    pub dst_state: crate::gpu::descriptor::ResourceState,
}

/// The Vulkan-class command vocabulary the executor and encoder record into.
///
/// Batched barrier submission is capped at 16 buffer + 16 texture barriers per call (spec
/// §4.5.1); callers that need more split across multiple `pipeline_barrier` calls.
pub trait CommandEncoder {
    fn begin_render_pass(
        &mut self,
        render_pass: &dyn GpuRenderPass,
        framebuffer: &dyn GpuFramebuffer,
        color_attachments: &[ColorAttachment<'_>],
        depth_attachment: Option<&DepthAttachment<'_>>,
    );
    fn end_render_pass(&mut self);

    fn begin_compute_pass(&mut self);
    fn end_compute_pass(&mut self);

    fn set_viewport(&mut self, viewport: Viewport);
    fn set_scissor(&mut self, scissor: ScissorRect);
    fn set_dynamic_state(&mut self, state: DynamicPipelineState);

    fn bind_graphics_pipeline(&mut self, pipeline: &dyn GpuGraphicsPipeline);
    fn bind_compute_pipeline(&mut self, pipeline: &dyn GpuComputePipeline);
    fn bind_descriptor_set(&mut self, index: u32, set: &dyn GpuDescriptorSet);
    fn bind_vertex_buffer(&mut self, slot: u32, buffer: &dyn GpuBuffer, offset: u64);
    fn bind_index_buffer(&mut self, buffer: &dyn GpuBuffer, offset: u64, index_type: IndexType);

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32);
    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    );
    fn dispatch(&mut self, group_count_x: u32, group_count_y: u32, group_count_z: u32);

    fn push_constants(&mut self, offset: u32, data: &[u8]);

    fn copy_buffer_to_buffer(
        &mut self,
        src: &dyn GpuBuffer,
        src_offset: u64,
        dst: &dyn GpuBuffer,
        dst_offset: u64,
        size: u64,
    );
    fn copy_buffer_to_texture(
        &mut self,
        src: &dyn GpuBuffer,
        src_offset: u64,
        dst: &dyn GpuTexture,
        dst_mip_level: u32,
        dst_array_layer: u32,
    );
    fn pipeline_barrier(&mut self, buffer_barriers: &[BufferBarrier<'_>], texture_barriers: &[TextureBarrier<'_>]);

    fn write_timestamp(&mut self, pool: &dyn GpuQueryPool, query_index: u32);
}
