//! A tiny in-memory `Device`/`CommandEncoder` pair for exercising the graph end to end without
//! a real GPU. Every `create_*` call just stamps out a zero-sized fake object and bumps a
//! counter, so tests can assert how many times a given kind of object was actually created
//! (pool hit/miss behavior) and what commands the encoder recorded (ordering, barrier batching,
//! pipeline cache hits).

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rendergraph::error::RenderGraphError;
use rendergraph::gpu::{
    BufferBarrier, BufferDescriptor, ColorAttachment, CommandEncoder, ComputePipelineKey,
    DepthAttachment, DescriptorSetKey, Device, DynamicPipelineState, DynamicStateTier,
    FramebufferDescriptor, GpuBuffer, GpuComputePipeline, GpuDescriptorSet, GpuFramebuffer,
    GpuGraphicsPipeline, GpuQueryPool, GpuRenderPass, GpuSampler, GpuSwapchain, GpuTexture,
    GpuTextureView, GraphicsPipelineKey, IndexType, RenderPassDescriptor, SamplerDescriptor,
    ScissorRect, TextureBarrier, TextureDescriptor, TextureViewDescriptor, Viewport,
};

macro_rules! fake_object {
    ($name:ident, $descriptor_ty:ty, $trait_name:ident, $accessor:ident) => {
        #[derive(Debug)]
        pub struct $name {
            pub id: u64,
            descriptor: $descriptor_ty,
        }

        impl $trait_name for $name {
            fn $accessor(&self) -> &$descriptor_ty {
                &self.descriptor
            }
        }
    };
}

fake_object!(FakeTexture, TextureDescriptor, GpuTexture, descriptor);
fake_object!(FakeBuffer, BufferDescriptor, GpuBuffer, descriptor);
fake_object!(FakeTextureView, TextureViewDescriptor, GpuTextureView, descriptor);
fake_object!(FakeRenderPass, RenderPassDescriptor, GpuRenderPass, descriptor);
fake_object!(FakeFramebuffer, FramebufferDescriptor, GpuFramebuffer, descriptor);
fake_object!(FakeSampler, SamplerDescriptor, GpuSampler, descriptor);

#[derive(Debug)]
pub struct FakeGraphicsPipeline {
    pub id: u64,
    key: GraphicsPipelineKey,
}
impl GpuGraphicsPipeline for FakeGraphicsPipeline {
    fn key(&self) -> &GraphicsPipelineKey {
        &self.key
    }
}

#[derive(Debug)]
pub struct FakeComputePipeline {
    pub id: u64,
    key: ComputePipelineKey,
}
impl GpuComputePipeline for FakeComputePipeline {
    fn key(&self) -> &ComputePipelineKey {
        &self.key
    }
}

#[derive(Debug)]
pub struct FakeDescriptorSet {
    pub id: u64,
    key: DescriptorSetKey,
}
impl GpuDescriptorSet for FakeDescriptorSet {
    fn key(&self) -> &DescriptorSetKey {
        &self.key
    }
}

#[derive(Debug)]
pub struct FakeQueryPool {
    capacity: u32,
}
impl GpuQueryPool for FakeQueryPool {
    fn capacity(&self) -> u32 {
        self.capacity
    }
}

#[derive(Debug)]
pub struct FakeSwapchain {
    extent: (u32, u32),
}
impl GpuSwapchain for FakeSwapchain {
    fn extent(&self) -> (u32, u32) {
        self.extent
    }
}

/// Per-kind creation counters, so a test can assert a pool actually reused an entry instead of
/// recreating it.
#[derive(Default)]
pub struct CreationCounts {
    pub textures: Cell<u32>,
    pub buffers: Cell<u32>,
    pub texture_views: Cell<u32>,
    pub render_passes: Cell<u32>,
    pub framebuffers: Cell<u32>,
    pub graphics_pipelines: Cell<u32>,
    pub compute_pipelines: Cell<u32>,
    pub descriptor_sets: Cell<u32>,
    pub samplers: Cell<u32>,
}

pub struct MockDevice {
    next_id: Cell<u64>,
    pub counts: CreationCounts,
    pub log: Rc<RefCell<Vec<String>>>,
    dynamic_state_tier: DynamicStateTier,
}

impl MockDevice {
    pub fn new() -> Self {
        MockDevice {
            next_id: Cell::new(0),
            counts: CreationCounts::default(),
            log: Rc::new(RefCell::new(Vec::new())),
            dynamic_state_tier: DynamicStateTier::None,
        }
    }

    pub fn with_dynamic_state_tier1() -> Self {
        let mut device = MockDevice::new();
        device.dynamic_state_tier = DynamicStateTier::Tier1;
        device
    }

    fn next_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    pub fn log(&self) -> Vec<String> {
        self.log.borrow().clone()
    }
}

impl Device for MockDevice {
    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<Box<dyn GpuTexture>, RenderGraphError> {
        self.counts.textures.set(self.counts.textures.get() + 1);
        Ok(Box::new(FakeTexture {
            id: self.next_id(),
            descriptor: *descriptor,
        }))
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<Box<dyn GpuBuffer>, RenderGraphError> {
        self.counts.buffers.set(self.counts.buffers.get() + 1);
        Ok(Box::new(FakeBuffer {
            id: self.next_id(),
            descriptor: *descriptor,
        }))
    }

    fn write_buffer(&self, buffer: &dyn GpuBuffer, offset: u64, data: &[u8]) -> Result<(), RenderGraphError> {
        let _ = buffer;
        self.log
            .borrow_mut()
            .push(format!("write_buffer({} bytes @ {})", data.len(), offset));
        Ok(())
    }

    fn create_texture_view(
        &self,
        _texture: &dyn GpuTexture,
        descriptor: &TextureViewDescriptor,
    ) -> Result<Box<dyn GpuTextureView>, RenderGraphError> {
        self.counts.texture_views.set(self.counts.texture_views.get() + 1);
        Ok(Box::new(FakeTextureView {
            id: self.next_id(),
            descriptor: *descriptor,
        }))
    }

    fn create_render_pass(
        &self,
        descriptor: &RenderPassDescriptor,
    ) -> Result<Box<dyn GpuRenderPass>, RenderGraphError> {
        self.counts.render_passes.set(self.counts.render_passes.get() + 1);
        Ok(Box::new(FakeRenderPass {
            id: self.next_id(),
            descriptor: *descriptor,
        }))
    }

    fn create_framebuffer(
        &self,
        _render_pass: &dyn GpuRenderPass,
        descriptor: &FramebufferDescriptor,
        _attachments: &[&dyn GpuTextureView],
    ) -> Result<Box<dyn GpuFramebuffer>, RenderGraphError> {
        self.counts.framebuffers.set(self.counts.framebuffers.get() + 1);
        Ok(Box::new(FakeFramebuffer {
            id: self.next_id(),
            descriptor: *descriptor,
        }))
    }

    fn create_graphics_pipeline(
        &self,
        _render_pass: &dyn GpuRenderPass,
        key: &GraphicsPipelineKey,
    ) -> Result<Box<dyn GpuGraphicsPipeline>, RenderGraphError> {
        self.counts.graphics_pipelines.set(self.counts.graphics_pipelines.get() + 1);
        Ok(Box::new(FakeGraphicsPipeline {
            id: self.next_id(),
            key: *key,
        }))
    }

    fn create_compute_pipeline(
        &self,
        key: &ComputePipelineKey,
    ) -> Result<Box<dyn GpuComputePipeline>, RenderGraphError> {
        self.counts.compute_pipelines.set(self.counts.compute_pipelines.get() + 1);
        Ok(Box::new(FakeComputePipeline {
            id: self.next_id(),
            key: *key,
        }))
    }

    fn create_descriptor_set(&self, key: &DescriptorSetKey) -> Result<Box<dyn GpuDescriptorSet>, RenderGraphError> {
        self.counts.descriptor_sets.set(self.counts.descriptor_sets.get() + 1);
        Ok(Box::new(FakeDescriptorSet {
            id: self.next_id(),
            key: *key,
        }))
    }

    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<Box<dyn GpuSampler>, RenderGraphError> {
        self.counts.samplers.set(self.counts.samplers.get() + 1);
        Ok(Box::new(FakeSampler {
            id: self.next_id(),
            descriptor: *descriptor,
        }))
    }

    fn create_query_pool(&self, capacity: u32) -> Result<Box<dyn GpuQueryPool>, RenderGraphError> {
        Ok(Box::new(FakeQueryPool { capacity }))
    }

    fn dynamic_state_tier(&self) -> DynamicStateTier {
        self.dynamic_state_tier
    }

    fn timestamp_period_ns(&self) -> f64 {
        1.0
    }

    fn create_command_encoder(&self) -> Box<dyn CommandEncoder> {
        Box::new(MockCommandEncoder::new(self.log.clone()))
    }

    fn submit(&self, _encoder: Box<dyn CommandEncoder>) -> Result<(), RenderGraphError> {
        Ok(())
    }

    fn acquire_next_image(&self, _swapchain: &dyn GpuSwapchain) -> Result<Box<dyn GpuTexture>, RenderGraphError> {
        self.create_texture(&TextureDescriptor {
            width: 1920,
            height: 1080,
            depth: 1,
            mip_levels: 1,
            array_layers: 1,
            format: ash::vk::Format::B8G8R8A8_UNORM.as_raw(),
            usage: ash::vk::ImageUsageFlags::COLOR_ATTACHMENT.as_raw(),
        })
    }

    fn present(&self, _swapchain: &dyn GpuSwapchain) -> Result<(), RenderGraphError> {
        Ok(())
    }
}

pub fn fake_swapchain(width: u32, height: u32) -> Box<dyn GpuSwapchain> {
    Box::new(FakeSwapchain {
        extent: (width, height),
    })
}

/// Records every call it receives as a short opcode string, in order, so tests can assert on
/// ordering and counts without caring about the fake objects' identities.
pub struct MockCommandEncoder {
    log: Rc<RefCell<Vec<String>>>,
}

impl MockCommandEncoder {
    fn new(log: Rc<RefCell<Vec<String>>>) -> Self {
        MockCommandEncoder { log }
    }

    fn push(&self, entry: impl Into<String>) {
        self.log.borrow_mut().push(entry.into());
    }
}

impl CommandEncoder for MockCommandEncoder {
    fn begin_render_pass(
        &mut self,
        _render_pass: &dyn GpuRenderPass,
        _framebuffer: &dyn GpuFramebuffer,
        color_attachments: &[ColorAttachment<'_>],
        depth_attachment: Option<&DepthAttachment<'_>>,
    ) {
        self.push(format!(
            "begin_render_pass(colors={}, depth={})",
            color_attachments.len(),
            depth_attachment.is_some()
        ));
    }

    fn end_render_pass(&mut self) {
        self.push("end_render_pass");
    }

    fn begin_compute_pass(&mut self) {
        self.push("begin_compute_pass");
    }

    fn end_compute_pass(&mut self) {
        self.push("end_compute_pass");
    }

    fn set_viewport(&mut self, _viewport: Viewport) {
        self.push("set_viewport");
    }

    fn set_scissor(&mut self, _scissor: ScissorRect) {
        self.push("set_scissor");
    }

    fn set_dynamic_state(&mut self, _state: DynamicPipelineState) {
        self.push("set_dynamic_state");
    }

    fn bind_graphics_pipeline(&mut self, _pipeline: &dyn GpuGraphicsPipeline) {
        self.push("bind_graphics_pipeline");
    }

    fn bind_compute_pipeline(&mut self, _pipeline: &dyn GpuComputePipeline) {
        self.push("bind_compute_pipeline");
    }

    fn bind_descriptor_set(&mut self, index: u32, _set: &dyn GpuDescriptorSet) {
        self.push(format!("bind_descriptor_set({})", index));
    }

    fn bind_vertex_buffer(&mut self, slot: u32, _buffer: &dyn GpuBuffer, _offset: u64) {
        self.push(format!("bind_vertex_buffer({})", slot));
    }

    fn bind_index_buffer(&mut self, _buffer: &dyn GpuBuffer, _offset: u64, _index_type: IndexType) {
        self.push("bind_index_buffer");
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, _first_vertex: u32, _first_instance: u32) {
        self.push(format!("draw({}, {})", vertex_count, instance_count));
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        _first_index: u32,
        _vertex_offset: i32,
        _first_instance: u32,
    ) {
        self.push(format!("draw_indexed({}, {})", index_count, instance_count));
    }

    fn dispatch(&mut self, group_count_x: u32, group_count_y: u32, group_count_z: u32) {
        self.push(format!("dispatch({}, {}, {})", group_count_x, group_count_y, group_count_z));
    }

    fn push_constants(&mut self, _offset: u32, _data: &[u8]) {
        self.push("push_constants");
    }

    fn copy_buffer_to_buffer(
        &mut self,
        _src: &dyn GpuBuffer,
        _src_offset: u64,
        _dst: &dyn GpuBuffer,
        _dst_offset: u64,
        _size: u64,
    ) {
        self.push("copy_buffer_to_buffer");
    }

    fn copy_buffer_to_texture(
        &mut self,
        _src: &dyn GpuBuffer,
        _src_offset: u64,
        _dst: &dyn GpuTexture,
        _dst_mip_level: u32,
        _dst_array_layer: u32,
    ) {
        self.push("copy_buffer_to_texture");
    }

    fn pipeline_barrier(&mut self, buffer_barriers: &[BufferBarrier<'_>], texture_barriers: &[TextureBarrier<'_>]) {
        self.push(format!(
            "pipeline_barrier(b={}, t={})",
            buffer_barriers.len(),
            texture_barriers.len()
        ));
    }

    fn write_timestamp(&mut self, _pool: &dyn GpuQueryPool, _query_index: u32) {
        self.push("write_timestamp");
    }
}
