//! Dependency edges (C5): how a pass touches a resource, carried as petgraph edge weights on
//! the bipartite pass/resource graph built in [`crate::compiler`].

use crate::gpu::descriptor::ResourceState;
use crate::graph::handle::{BufferHandle, TextureHandle};

/// Which resource-node table a dependency points into.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ResourceRef {
    Texture(TextureHandle),
    Buffer(BufferHandle),
}

/// How a pass uses a resource it declared a dependency on. Each variant maps to the
/// [`ResourceState`] the resource must be barriered into before the pass runs (spec §4.5.1).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Usage {
    /// Read as a bound texture/sampler in a shader.
    Sample,
    /// Written as a color render target.
    ColorAttachment,
    /// Written (and possibly read, if load action is `Load`) as the depth/stencil attachment.
    DepthAttachment,
    /// Read-only source of a copy or blit.
    CopySource,
    /// Write-only destination of a copy, blit or mip generation step.
    CopyDest,
    /// Bound as a uniform/constant buffer.
    UniformBuffer,
    /// Bound as a vertex buffer.
    VertexBuffer,
    /// Bound as an index buffer.
    IndexBuffer,
    /// Bound for unordered read-write access from a compute shader.
    UnorderedAccess,
    /// The final present of a swapchain image; only valid on the graph's present pass. Treated
    /// as a *read* (a terminal consumer), not a write: nothing downstream ever reads a
    /// presented image back, so if this were a write the present pass's own output would look
    /// unreferenced and the pass would be culled (spec §4.4).
    Present,
}

impl Usage {
    /// Whether this usage writes to the resource (determines pass liveness during DAG culling,
    /// spec §4.4: a pass with no write usages that also has no side effect is cullable).
    pub fn is_write(self) -> bool {
        matches!(
            self,
            Usage::ColorAttachment | Usage::DepthAttachment | Usage::CopyDest | Usage::UnorderedAccess
        )
    }

    pub fn resource_state(self) -> ResourceState {
        match self {
            Usage::Sample => ResourceState::ShaderResource,
            Usage::ColorAttachment => ResourceState::RenderTarget,
            Usage::DepthAttachment => ResourceState::DepthWrite,
            Usage::CopySource => ResourceState::CopySource,
            Usage::CopyDest => ResourceState::CopyDest,
            Usage::UniformBuffer => ResourceState::VertexAndConstantBuffer,
            Usage::VertexBuffer => ResourceState::VertexAndConstantBuffer,
            Usage::IndexBuffer => ResourceState::IndexBuffer,
            Usage::UnorderedAccess => ResourceState::UnorderedAccess,
            Usage::Present => ResourceState::Present,
        }
    }
}

/// An edge between a pass node and a resource node in the bipartite dependency graph.
#[derive(Copy, Clone, Debug)]
pub struct Edge {
    pub usage: Usage,
    /// For textures: which subresource range this usage applies to, when narrower than the
    /// whole resource (e.g. sampling one mip level while writing another, spec §4.3 mip
    /// generation). `None` means the whole resource.
    pub subresource: Option<SubresourceRange>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SubresourceRange {
    pub base_mip_level: u32,
    pub mip_level_count: u32,
    pub base_array_layer: u32,
    pub array_layer_count: u32,
}

impl Edge {
    pub fn whole_resource(usage: Usage) -> Self {
        Edge {
            usage,
            subresource: None,
        }
    }

    pub fn with_subresource(usage: Usage, subresource: SubresourceRange) -> Self {
        Edge {
            usage,
            subresource: Some(subresource),
        }
    }
}
