//! Value types and POD descriptor structs used as pool keys (C1/C3).
//!
//! Every descriptor here is `#[repr(C)]`, derives `bytemuck::{Pod, Zeroable}`, and is built
//! through `Default` so that no field is ever left uninitialized before it is hashed — see
//! [`crate::hash`] for why that matters.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use smallvec::SmallVec;

/// The state a resource (texture or buffer) can be transitioned into by a barrier.
///
/// Mirrors the Vulkan-class access/layout vocabulary from the spec rather than a narrower
/// "load/store" abstraction, because barrier planning (§4.5.1) needs to compare and diff
/// these states directly.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u32)]
pub enum ResourceState {
    Undefined = 0,
    RenderTarget,
    DepthWrite,
    DepthRead,
    ShaderResource,
    CopySource,
    CopyDest,
    VertexAndConstantBuffer,
    IndexBuffer,
    UnorderedAccess,
    Present,
}

impl Default for ResourceState {
    fn default() -> Self {
        ResourceState::Undefined
    }
}

bitflags::bitflags! {
    /// Buffer descriptor-type flags, used both to infer `ResourceState` for `use_buffer`
    /// and to pick the right `BufferUsageFlags` when creating the backing object.
    #[derive(Default)]
    pub struct BufferType: u32 {
        const NONE    = 0;
        const VERTEX  = 1 << 0;
        const INDEX   = 1 << 1;
        const UNIFORM = 1 << 2;
        const RW      = 1 << 3;
    }
}

/// Where a buffer's backing memory lives and how the host can access it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u32)]
pub enum MemoryUsage {
    GpuOnly = 0,
    CpuToGpu,
    GpuToCpu,
    CpuOnly,
}

impl Default for MemoryUsage {
    fn default() -> Self {
        MemoryUsage::GpuOnly
    }
}

/// Action taken on an attachment's existing contents when a render pass begins.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u32)]
pub enum LoadAction {
    Load = 0,
    Clear,
    DontCare,
}

impl Default for LoadAction {
    fn default() -> Self {
        LoadAction::DontCare
    }
}

/// Action taken on an attachment's contents when a render pass ends.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u32)]
pub enum StoreAction {
    Store = 0,
    DontCare,
}

impl Default for StoreAction {
    fn default() -> Self {
        StoreAction::Store
    }
}

/// RGBA clear color, stored bit-for-bit (not compared as floats) when used as part of a
/// descriptor key — see [`crate::hash`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct ClearColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl ClearColor {
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        ClearColor { r, g, b, a }
    }

    pub const BLACK: ClearColor = ClearColor::rgba(0.0, 0.0, 0.0, 1.0);
}

/// Depth/stencil clear value.
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct ClearDepthStencil {
    pub depth: f32,
    pub stencil: u32,
}

/// Viewport, in the Vulkan convention (origin top-left, `min_depth`/`max_depth` in `[0, 1]`).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

/// Scissor rectangle, in framebuffer pixel coordinates.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ScissorRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Index buffer element width.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum IndexType {
    U16,
    U32,
}

/// Pipeline state an implementation may set outside the pipeline object when the device
/// exposes dynamic-state Tier-1 (spec §4.2/§4.6).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DynamicPipelineState {
    pub topology: vk::PrimitiveTopology,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub depth_test_enable: bool,
    pub depth_write_enable: bool,
    pub depth_compare_op: vk::CompareOp,
}

/// Whether the device can accept pipeline state set dynamically via
/// [`crate::gpu::CommandEncoder::set_dynamic_state`], broadening graphics-pipeline reuse
/// (spec §4.2).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DynamicStateTier {
    /// No dynamic state support: every permutation of topology/cull/front-face/depth state
    /// requires its own pipeline object.
    None,
    /// Primitive topology, cull mode, front face and depth test/write/compare can be set
    /// dynamically; these fields are zeroed out of the pipeline key.
    Tier1,
}

//--------------------------------------------------------------------------------------------------
// Pool key descriptors (C1/C3). All are #[repr(C)], Pod + Zeroable, Eq + Hash derived so
// field-wise comparison and bytemuck's byte-wise hashing agree by construction.

/// Key identifying a pooled texture (spec §4.5 step 1: "width×height×depth×mipLevels×format").
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct TextureDescriptor {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub format: i32, // ash::vk::Format's repr
    pub usage: u32,  // ash::vk::ImageUsageFlags bits
}

impl TextureDescriptor {
    pub fn format(&self) -> vk::Format {
        vk::Format::from_raw(self.format)
    }

    pub fn usage(&self) -> vk::ImageUsageFlags {
        vk::ImageUsageFlags::from_raw(self.usage)
    }

    pub fn is_depth_format(&self) -> bool {
        matches!(
            self.format(),
            vk::Format::D16_UNORM
                | vk::Format::D32_SFLOAT
                | vk::Format::D24_UNORM_S8_UINT
                | vk::Format::D32_SFLOAT_S8_UINT
        )
    }

    pub fn subresource_count(&self) -> u32 {
        self.mip_levels * self.array_layers
    }
}

/// Key identifying a pooled buffer (spec §4.5 step 1: "size×type×memory usage").
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct BufferDescriptor {
    pub size: u64,
    pub buffer_type: u32, // BufferType bits
    pub memory_usage: u32, // MemoryUsage discriminant
}

impl BufferDescriptor {
    pub fn buffer_type(&self) -> BufferType {
        BufferType::from_bits_truncate(self.buffer_type)
    }
}

/// Key identifying a pooled texture view (parent descriptor + mip/slice range + aspect).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct TextureViewDescriptor {
    pub format: i32,
    pub base_mip_level: u32,
    pub mip_level_count: u32,
    pub base_array_layer: u32,
    pub array_layer_count: u32,
    pub usage: u32,
}

/// Key identifying a pooled render pass: attachment formats + load/store actions.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct RenderPassDescriptor {
    pub color_attachment_count: u32,
    pub color_formats: [i32; 8],
    pub color_load_actions: [u32; 8],
    pub color_store_actions: [u32; 8],
    pub has_depth_attachment: u32,
    pub depth_format: i32,
    pub depth_load_action: u32,
    pub depth_store_action: u32,
    pub stencil_load_action: u32,
    pub stencil_store_action: u32,
}

/// Key identifying a pooled framebuffer: the render pass it is compatible with plus the
/// concrete attachment views (views are pooled themselves, so this stores their descriptors).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct FramebufferDescriptor {
    pub render_pass: RenderPassDescriptor,
    pub width: u32,
    pub height: u32,
    pub attachment_count: u32,
    pub attachment_views: [TextureViewDescriptor; 9], // 8 color + 1 depth
}

/// Key identifying a pooled graphics pipeline (PSOKey, spec §4.6). `shader_id` stands in for
/// "shader pointer" in the original design: an opaque, stable identifier a backend assigns to
/// a compiled shader module.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct GraphicsPipelineKey {
    pub shader_id: u64,
    pub vertex_layout_hash: u64,
    pub blend_state_hash: u32,
    pub depth_state_hash: u32,
    pub rasterizer_state_hash: u32,
    pub render_pass: RenderPassDescriptor,
    pub subpass: u32,
    pub render_target_count: u32,
    /// Zeroed when [`DynamicStateTier::Tier1`] is available (spec §4.2).
    pub primitive_topology: u32,
    pub cull_mode: u32,
    pub front_face: u32,
    pub depth_test_enable: u32,
    pub depth_write_enable: u32,
    pub depth_compare_op: u32,
}

impl GraphicsPipelineKey {
    /// Zero the dynamic-state fields when the device supports Tier-1 dynamic state, so
    /// otherwise-identical pipelines that only differ in topology/cull/front-face/depth-test
    /// collapse to the same pool entry (spec §4.2).
    pub fn normalize_for_dynamic_state(mut self, tier: DynamicStateTier) -> Self {
        if tier == DynamicStateTier::Tier1 {
            self.primitive_topology = 0;
            self.cull_mode = 0;
            self.front_face = 0;
            self.depth_test_enable = 0;
            self.depth_write_enable = 0;
            self.depth_compare_op = 0;
        }
        self
    }
}

/// Key identifying a pooled compute pipeline (CPSOKey, spec §4.6).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct ComputePipelineKey {
    pub shader_id: u64,
}

/// Texture filtering mode.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u32)]
pub enum FilterMode {
    Nearest = 0,
    Linear,
}

impl Default for FilterMode {
    fn default() -> Self {
        FilterMode::Nearest
    }
}

/// Texture addressing mode outside the `[0, 1]` UV range.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u32)]
pub enum AddressMode {
    Repeat = 0,
    ClampToEdge,
    MirroredRepeat,
}

impl Default for AddressMode {
    fn default() -> Self {
        AddressMode::Repeat
    }
}

/// Key identifying a pooled sampler.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct SamplerDescriptor {
    pub min_filter: u32,
    pub mag_filter: u32,
    pub mipmap_filter: u32,
    pub address_mode_u: u32,
    pub address_mode_v: u32,
    pub address_mode_w: u32,
    pub max_anisotropy: u32,
}

impl SamplerDescriptor {
    pub const fn linear_clamp() -> Self {
        SamplerDescriptor {
            min_filter: FilterMode::Linear as u32,
            mag_filter: FilterMode::Linear as u32,
            mipmap_filter: FilterMode::Linear as u32,
            address_mode_u: AddressMode::ClampToEdge as u32,
            address_mode_v: AddressMode::ClampToEdge as u32,
            address_mode_w: AddressMode::ClampToEdge as u32,
            max_anisotropy: 1,
        }
    }
}

/// Key identifying a pooled descriptor set: its layout plus the concrete bound resources and
/// offsets/sizes, so two distinct binding sets never alias the same pool entry.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct DescriptorSetKey {
    pub layout_id: u64,
    pub bound_resources_hash: u64,
    pub offsets_hash: u64,
}

/// One binding slot inside a descriptor table, in declaration order (spec §4.6 root signature).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BindingKind {
    Texture,
    Sampler,
    UniformBuffer,
    RwBuffer,
}

/// One descriptor set's worth of binding slots, in order.
#[derive(Clone, Debug, Default)]
pub struct DescriptorTableLayout {
    pub bindings: SmallVec<[BindingKind; 8]>,
}

/// A shader's binding layout: one [`DescriptorTableLayout`] per descriptor set, walked by
/// [`crate::encoder::RenderPassEncoder::bind_root_signature`] to resolve each slot against
/// whatever was last pushed through a `set_global_*` call (spec §4.6).
#[derive(Clone, Debug, Default)]
pub struct RootSignature {
    pub tables: SmallVec<[DescriptorTableLayout; 4]>,
}
