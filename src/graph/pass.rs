//! Pass nodes (C5) and their execution payloads.
//!
//! # Redesigned from the original
//! The source engine hands a pass a raw `void* passdata` set up through `set_executable(fn,
//! size)` and recovers it by casting inside the callback. That has no place in safe Rust: a
//! pass here instead owns a `Box<dyn FnMut(&mut RenderPassEncoder) + 'frame>` closure that
//! captures whatever state it needs directly, with the borrow checker enforcing that nothing
//! it captures outlives the frame arena it came from.

use smallvec::SmallVec;

use crate::gpu::descriptor::{ClearColor, ClearDepthStencil, LoadAction};
use crate::graph::edge::{Edge, ResourceRef};
use crate::graph::handle::{BufferHandle, TextureHandle};

/// What kind of work a pass performs, determining which fields of [`PassNode`] are populated
/// and how the executor dispatches it (spec §4.5.2).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PassKind {
    /// Declares a dependency without emitting any commands; used to keep a resource alive
    /// across the frame boundary or to force an ordering the data dependencies alone wouldn't
    /// (spec §4.3 `add_hold_pass`).
    HoldOn,
    Render,
    Compute,
    UploadTexture,
    UploadBuffer,
    /// The graph's terminal pass: presents an imported swapchain image (spec §4.3 `present`).
    Present,
}

#[derive(Clone, Debug)]
pub struct ColorAttachmentDesc {
    pub texture: TextureHandle,
    /// Which mip level of `texture` this attachment renders into. Always 0 except for the
    /// individual passes a generated mip chain synthesizes (spec §4.3/§4.5.1), where each level
    /// renders into a different one.
    pub base_mip_level: u32,
    pub load_action: LoadAction,
    pub clear_value: ClearColor,
}

#[derive(Clone, Debug)]
pub struct DepthAttachmentDesc {
    pub texture: TextureHandle,
    pub load_action: LoadAction,
    pub clear_value: ClearDepthStencil,
}

/// Up to 8 color attachments plus one optional depth/stencil attachment, matching the device
/// abstraction's render pass limits (spec §4.2).
#[derive(Clone, Debug, Default)]
pub struct RenderPassContext {
    pub color_attachments: SmallVec<[ColorAttachmentDesc; 8]>,
    pub depth_attachment: Option<DepthAttachmentDesc>,
}

pub struct UploadTextureContext<'frame> {
    pub dst: TextureHandle,
    pub data: &'frame [u8],
    pub dst_mip_level: u32,
    pub dst_array_layer: u32,
}

pub struct UploadBufferContext<'frame> {
    pub dst: BufferHandle,
    pub data: &'frame [u8],
    pub dst_offset: u64,
}

/// The closure a render/compute pass runs once the executor has bound its attachments and
/// transitioned its resources. Boxed so [`crate::graph::builder::RenderGraph`] can store passes
/// of heterogeneous captured state in one arena.
pub type PassExecuteFn<'frame> = Box<dyn FnMut(&mut crate::encoder::RenderPassEncoder<'_>) + 'frame>;

pub struct PassNode<'frame> {
    pub name: &'static str,
    pub kind: PassKind,
    pub render: Option<RenderPassContext>,
    pub upload_texture: Option<UploadTextureContext<'frame>>,
    pub upload_buffer: Option<UploadBufferContext<'frame>>,
    pub present_texture: Option<TextureHandle>,
    pub executable: Option<PassExecuteFn<'frame>>,
    /// Forces this pass to survive DAG culling regardless of whether anything downstream
    /// consumes its outputs (spec §4.4; set by `add_hold_pass` and by `present`).
    pub force_keep: bool,
    /// Resources this pass reads, with the usage each read is made under.
    pub reads: SmallVec<[(ResourceRef, Edge); 8]>,
    /// Resources this pass writes, with the usage each write is made under.
    pub writes: SmallVec<[(ResourceRef, Edge); 8]>,
}

impl<'frame> PassNode<'frame> {
    pub fn new(name: &'static str, kind: PassKind) -> Self {
        PassNode {
            name,
            kind,
            render: None,
            upload_texture: None,
            upload_buffer: None,
            present_texture: None,
            executable: None,
            force_keep: false,
            reads: SmallVec::new(),
            writes: SmallVec::new(),
        }
    }

    pub fn add_dependency(&mut self, resource: ResourceRef, edge: Edge) {
        if edge.usage.is_write() {
            self.writes.push((resource, edge));
        } else {
            self.reads.push((resource, edge));
        }
    }
}
