//! The frame-scoped execution context (C9): the pools, profiler and default resources an
//! [`crate::executor::Executor`] run draws from, owned by the embedder across the whole
//! application lifetime (pools outlive any single frame; only the graph itself is rebuilt
//! every frame).

use crate::error::RenderGraphError;
use crate::gpu::descriptor::{
    BindingKind, BufferDescriptor, BufferType, DescriptorTableLayout, GraphicsPipelineKey,
    MemoryUsage, RootSignature, SamplerDescriptor, TextureDescriptor,
};
use crate::gpu::descriptor::DynamicStateTier;
use crate::gpu::device::{Device, GpuSampler, GpuTexture};
use crate::pool::typed::{SamplerSlot, TextureSlot};
use crate::pool::PoolSet;
use crate::profiler::GpuProfiler;

/// Reserved shader id for this crate's one built-in shader: the full-screen-triangle blit mip
/// chain generation draws with (spec §4.3/§4.9). Never collides with a backend-assigned id,
/// since real shader ids are handed out starting from 0.
pub const BLIT_SHADER_ID: u64 = u64::MAX;

/// The [`GraphicsPipelineKey`] every pass in a generated mip chain binds.
pub fn blit_pipeline_key() -> GraphicsPipelineKey {
    GraphicsPipelineKey {
        shader_id: BLIT_SHADER_ID,
        render_target_count: 1,
        ..Default::default()
    }
}

/// The root signature the blit shader binds against: one texture and one sampler, set 0.
pub fn blit_root_signature() -> RootSignature {
    RootSignature {
        tables: smallvec::smallvec![DescriptorTableLayout {
            bindings: smallvec::smallvec![BindingKind::Texture, BindingKind::Sampler],
        }],
    }
}

/// A small magenta texture bound in place of a missing resource, making binding mistakes
/// visible instead of silently sampling garbage (spec §2.1, a debugging aid carried over from
/// the original engine's default-resource set).
const MISSING_TEXTURE_SIZE: u32 = 4;

pub struct FrameContext {
    pub pools: PoolSet,
    pub profiler: Option<GpuProfiler>,
    pub frame_index: u64,
    pub dynamic_state_tier: DynamicStateTier,
    missing_texture: TextureSlot,
    default_sampler: SamplerSlot,
}

impl FrameContext {
    /// Creates the pools and default resources this context will reuse across every frame.
    /// `max_scopes_per_frame` bounds how many named [`GpuProfiler::scope`] calls a single frame
    /// can make before timestamps silently stop being recorded (spec §4.8).
    pub fn new(
        device: &dyn Device,
        frame_in_flight_count: usize,
        max_profiler_scopes_per_frame: u32,
        enable_profiler: bool,
    ) -> Result<Self, RenderGraphError> {
        let mut pools = PoolSet::new();

        let missing_texture_descriptor = TextureDescriptor {
            width: MISSING_TEXTURE_SIZE,
            height: MISSING_TEXTURE_SIZE,
            depth: 1,
            mip_levels: 1,
            array_layers: 1,
            format: ash::vk::Format::R8G8B8A8_UNORM.as_raw(),
            usage: ash::vk::ImageUsageFlags::SAMPLED.as_raw(),
        };
        let missing_texture = pools.get_texture(device, missing_texture_descriptor)?;

        let default_sampler = pools.get_sampler(device, SamplerDescriptor::linear_clamp())?;

        let profiler = if enable_profiler {
            Some(GpuProfiler::new(device, frame_in_flight_count, max_profiler_scopes_per_frame)?)
        } else {
            None
        };

        Ok(FrameContext {
            pools,
            profiler,
            frame_index: 0,
            dynamic_state_tier: device.dynamic_state_tier(),
            missing_texture,
            default_sampler,
        })
    }

    pub fn missing_texture(&self) -> &dyn GpuTexture {
        self.pools.resolve_texture(self.missing_texture)
    }

    pub fn default_sampler(&self) -> &dyn GpuSampler {
        self.pools.resolve_sampler(self.default_sampler)
    }

    /// A small host-visible staging buffer descriptor sized to `byte_count`, used by upload
    /// passes (spec §4.3's upload passes; the executor pools these like any other buffer).
    pub fn staging_buffer_descriptor(byte_count: u64) -> BufferDescriptor {
        BufferDescriptor {
            size: byte_count,
            buffer_type: BufferType::NONE.bits(),
            memory_usage: MemoryUsage::CpuToGpu as u32,
        }
    }

    /// Begins a new frame: advances the frame counter and starts a new profiler scope
    /// recording, if profiling is enabled. Call before building this frame's
    /// [`crate::graph::builder::RenderGraph`] (which is backed by its own, freshly allocated
    /// `typed_arena::Arena`; the context itself does not own frame-local storage).
    pub fn begin_frame(&mut self) {
        self.frame_index += 1;
        if let Some(profiler) = &mut self.profiler {
            profiler.begin_frame(self.frame_index);
        }
    }
}
