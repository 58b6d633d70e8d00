//! Resolves a resource handle down to the live GPU object backing it this frame: either the
//! pooled object the executor devirtualized, the object a caller imported, or (for a
//! subresource) the same lookup run recursively on its parent.

use fxhash::FxHashMap;

use crate::gpu::descriptor::TextureDescriptor;
use crate::gpu::device::{GpuBuffer, GpuTexture};
use crate::graph::handle::{BufferHandle, TextureHandle};
use crate::graph::resource::{BufferNode, ManageType, TextureNode};
use crate::pool::generic::Pool;
use crate::pool::typed::{BufferSlot, TextureSlot};
use crate::pool::PoolSet;

pub fn resolve_texture<'a>(
    textures: &'a [TextureNode],
    managed: &FxHashMap<TextureHandle, TextureSlot>,
    pools: &'a PoolSet,
    handle: TextureHandle,
) -> &'a dyn GpuTexture {
    match &textures[handle.index()].manage {
        ManageType::Managed => {
            let slot = *managed
                .get(&handle)
                .expect("texture handle used before devirtualization");
            pools.resolve_texture(slot)
        }
        ManageType::Imported(texture) => texture.as_ref(),
        ManageType::SubResource { parent, .. } => resolve_texture(textures, managed, pools, *parent),
    }
}

/// Same resolution as [`resolve_texture`], but taking the texture sub-pool directly instead of
/// the whole [`PoolSet`]. Needed wherever a caller must also borrow a *different* sub-pool
/// mutably in the same scope (building a framebuffer out of pooled texture views, say) — asking
/// for a `&PoolSet` there would conflict with the mutable borrow of the other field, since
/// Rust can't see through a method call that only the whole struct has access to.
pub fn resolve_texture_from_pool<'a>(
    textures: &'a [TextureNode],
    managed: &FxHashMap<TextureHandle, TextureSlot>,
    texture_pool: &'a Pool<TextureDescriptor, Box<dyn GpuTexture>>,
    handle: TextureHandle,
) -> &'a dyn GpuTexture {
    match &textures[handle.index()].manage {
        ManageType::Managed => {
            let slot = *managed
                .get(&handle)
                .expect("texture handle used before devirtualization");
            texture_pool.resolve(slot).as_ref()
        }
        ManageType::Imported(texture) => texture.as_ref(),
        ManageType::SubResource { parent, .. } => {
            resolve_texture_from_pool(textures, managed, texture_pool, *parent)
        }
    }
}

pub fn resolve_buffer<'a>(
    buffers: &'a [BufferNode],
    managed: &FxHashMap<BufferHandle, BufferSlot>,
    pools: &'a PoolSet,
    handle: BufferHandle,
) -> &'a dyn GpuBuffer {
    match &buffers[handle.index()].manage {
        ManageType::Managed => {
            let slot = *managed
                .get(&handle)
                .expect("buffer handle used before devirtualization");
            pools.resolve_buffer(slot)
        }
        ManageType::Imported(buffer) => buffer.as_ref(),
        ManageType::SubResource { .. } => {
            unreachable!("buffer nodes never declare a subresource range")
        }
    }
}
