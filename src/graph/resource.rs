//! Resource nodes (C5): the texture/buffer side of the bipartite pass/resource graph.
//!
//! Each resource node carries a `ManageType` describing where its backing GPU object comes
//! from: `Managed` resources are created and pooled by the executor from a descriptor,
//! `Imported` resources wrap an object the caller already owns (a swapchain image, a
//! persistent G-buffer kept across frames), and `SubResource` aliases a mip/layer range of
//! another node declared in the same graph (spec §4.3's `declare_texture_subresource`).

use crate::gpu::descriptor::{BufferDescriptor, ResourceState, TextureDescriptor};
use crate::gpu::device::{GpuBuffer, GpuTexture};
use crate::graph::handle::TextureHandle;

/// Where a resource node's backing GPU object comes from.
pub enum ManageType<O: ?Sized> {
    /// Created and released by the pool from `descriptor` when the compiler decides it is live.
    Managed,
    /// Already exists; owned by the caller for at least the lifetime of this frame.
    Imported(Box<O>),
    /// A mip/array-layer range of another texture node declared earlier in the same graph.
    SubResource {
        parent: TextureHandle,
        base_mip_level: u32,
        mip_level_count: u32,
        base_array_layer: u32,
        array_layer_count: u32,
    },
}

pub struct TextureNode {
    pub name: &'static str,
    pub descriptor: TextureDescriptor,
    pub manage: ManageType<dyn GpuTexture>,
    /// Entry state the resource is assumed to be in before the graph touches it; for imported
    /// resources this is whatever the caller says it already is (spec §4.3 `import_texture`).
    pub initial_state: ResourceState,
    /// Keeps this node alive across the DAG-culling pass even if no live pass samples or
    /// writes it (spec §4.3's `hold_on_last`/`add_hold_pass`: used for resources a later frame
    /// needs to read back, or debug capture).
    pub hold_on_last: bool,
}

impl TextureNode {
    pub fn is_imported(&self) -> bool {
        matches!(self.manage, ManageType::Imported(_))
    }

    pub fn is_subresource(&self) -> bool {
        matches!(self.manage, ManageType::SubResource { .. })
    }
}

pub struct BufferNode {
    pub name: &'static str,
    pub descriptor: BufferDescriptor,
    pub manage: ManageType<dyn GpuBuffer>,
    pub initial_state: ResourceState,
    pub hold_on_last: bool,
}

impl BufferNode {
    pub fn is_imported(&self) -> bool {
        matches!(self.manage, ManageType::Imported(_))
    }
}
