//! The frame-scoped builder (C5): [`RenderGraph`] collects resource declarations and passes;
//! nothing here touches a device or allocates a GPU object. [`crate::compiler::compile`] turns
//! the result into a [`crate::compiler::CompiledRenderGraph`] that the executor can run.

use smallvec::SmallVec;
use typed_arena::Arena;

use crate::gpu::descriptor::{
    BufferDescriptor, BufferType, ClearColor, ClearDepthStencil, LoadAction, MemoryUsage,
    ResourceState, TextureDescriptor,
};
use crate::gpu::device::{GpuBuffer, GpuTexture};
use crate::graph::edge::{Edge, ResourceRef, SubresourceRange, Usage};
use crate::graph::handle::{BufferHandle, PassHandle, TextureHandle};
use crate::graph::pass::{
    ColorAttachmentDesc, DepthAttachmentDesc, PassKind, PassNode, RenderPassContext,
    UploadBufferContext, UploadTextureContext,
};
use crate::graph::resource::{BufferNode, ManageType, TextureNode};

/// A single frame's worth of declared resources and passes. Built fresh every frame from a
/// [`typed_arena::Arena`] that backs any byte buffers passes need to keep alive until the
/// executor runs them (e.g. `add_upload_buffer_pass`'s source data).
pub struct RenderGraph<'frame> {
    arena: &'frame Arena<u8>,
    pub(crate) textures: Vec<TextureNode>,
    pub(crate) buffers: Vec<BufferNode>,
    pub(crate) passes: Vec<PassNode<'frame>>,
}

impl<'frame> RenderGraph<'frame> {
    pub fn new(arena: &'frame Arena<u8>) -> Self {
        RenderGraph {
            arena,
            textures: Vec::new(),
            buffers: Vec::new(),
            passes: Vec::new(),
        }
    }

    /// Copy `data` into the frame arena, returning a slice with the same lifetime as the
    /// passes being built, so upload passes don't need their own separate allocation.
    pub fn alloc_bytes(&self, data: &[u8]) -> &'frame [u8] {
        self.arena.alloc_extend(data.iter().copied())
    }

    //--------------------------------------------------------------------------------------
    // Resource declaration

    pub fn declare_texture(&mut self, name: &'static str, descriptor: TextureDescriptor) -> TextureHandle {
        self.textures.push(TextureNode {
            name,
            descriptor,
            manage: ManageType::Managed,
            initial_state: ResourceState::Undefined,
            hold_on_last: false,
        });
        TextureHandle((self.textures.len() - 1) as u32)
    }

    /// Declares a view over a mip/array-layer range of a texture already declared in this
    /// graph, without allocating a separate backing resource (spec §4.3).
    pub fn declare_texture_subresource(
        &mut self,
        parent: TextureHandle,
        base_mip_level: u32,
        mip_level_count: u32,
        base_array_layer: u32,
        array_layer_count: u32,
    ) -> TextureHandle {
        let parent_descriptor = self.textures[parent.index()].descriptor;
        self.textures.push(TextureNode {
            name: "subresource",
            descriptor: parent_descriptor,
            manage: ManageType::SubResource {
                parent,
                base_mip_level,
                mip_level_count,
                base_array_layer,
                array_layer_count,
            },
            initial_state: ResourceState::Undefined,
            hold_on_last: false,
        });
        TextureHandle((self.textures.len() - 1) as u32)
    }

    pub fn import_texture(
        &mut self,
        name: &'static str,
        texture: Box<dyn GpuTexture>,
        initial_state: ResourceState,
    ) -> TextureHandle {
        let descriptor = *texture.descriptor();
        self.textures.push(TextureNode {
            name,
            descriptor,
            manage: ManageType::Imported(texture),
            initial_state,
            hold_on_last: false,
        });
        TextureHandle((self.textures.len() - 1) as u32)
    }

    /// Shorthand for importing the image a swapchain just handed back, in the `Present`-ready
    /// state it leaves acquired images in.
    pub fn import_backbuffer(&mut self, texture: Box<dyn GpuTexture>) -> TextureHandle {
        self.import_texture("backbuffer", texture, ResourceState::Undefined)
    }

    pub fn declare_buffer(&mut self, name: &'static str, descriptor: BufferDescriptor) -> BufferHandle {
        self.buffers.push(BufferNode {
            name,
            descriptor,
            manage: ManageType::Managed,
            initial_state: ResourceState::Undefined,
            hold_on_last: false,
        });
        BufferHandle((self.buffers.len() - 1) as u32)
    }

    /// Declares a small host-visible uniform buffer without spelling out the full descriptor;
    /// used constantly enough by passes (per-draw constants, per-pass parameters) to deserve a
    /// shorthand (spec §4.3).
    pub fn declare_uniform_buffer_quick(&mut self, name: &'static str, size: u64) -> BufferHandle {
        self.declare_buffer(
            name,
            BufferDescriptor {
                size,
                buffer_type: BufferType::UNIFORM.bits(),
                memory_usage: MemoryUsage::CpuToGpu as u32,
            },
        )
    }

    pub fn import_buffer(
        &mut self,
        name: &'static str,
        buffer: Box<dyn GpuBuffer>,
        initial_state: ResourceState,
    ) -> BufferHandle {
        let descriptor = *buffer.descriptor();
        self.buffers.push(BufferNode {
            name,
            descriptor,
            manage: ManageType::Imported(buffer),
            initial_state,
            hold_on_last: false,
        });
        BufferHandle((self.buffers.len() - 1) as u32)
    }

    //--------------------------------------------------------------------------------------
    // Pass declaration

    pub fn add_render_pass(&mut self, name: &'static str) -> PassBuilder<'_, 'frame> {
        let mut node = PassNode::new(name, PassKind::Render);
        node.render = Some(RenderPassContext::default());
        PassBuilder { graph: self, node }
    }

    pub fn add_compute_pass(&mut self, name: &'static str) -> PassBuilder<'_, 'frame> {
        PassBuilder {
            graph: self,
            node: PassNode::new(name, PassKind::Compute),
        }
    }

    /// A pass that emits no commands but keeps its declared dependencies alive through DAG
    /// culling; used to pin a resource that a later frame reads back, or for debug capture
    /// (spec §4.3).
    pub fn add_hold_pass(&mut self, name: &'static str) -> PassBuilder<'_, 'frame> {
        let mut node = PassNode::new(name, PassKind::HoldOn);
        node.force_keep = true;
        PassBuilder { graph: self, node }
    }

    pub fn add_upload_texture_pass(
        &mut self,
        name: &'static str,
        dst: TextureHandle,
        data: &[u8],
        dst_mip_level: u32,
        dst_array_layer: u32,
    ) -> PassHandle {
        let data = self.alloc_bytes(data);
        let mut node = PassNode::new(name, PassKind::UploadTexture);
        node.add_dependency(ResourceRef::Texture(dst), Edge::whole_resource(Usage::CopyDest));
        node.upload_texture = Some(UploadTextureContext {
            dst,
            data,
            dst_mip_level,
            dst_array_layer,
        });
        self.push_pass(node)
    }

    pub fn add_upload_buffer_pass(
        &mut self,
        name: &'static str,
        dst: BufferHandle,
        data: &[u8],
        dst_offset: u64,
    ) -> PassHandle {
        let data = self.alloc_bytes(data);
        let mut node = PassNode::new(name, PassKind::UploadBuffer);
        node.add_dependency(ResourceRef::Buffer(dst), Edge::whole_resource(Usage::CopyDest));
        node.upload_buffer = Some(UploadBufferContext { dst, data, dst_offset });
        self.push_pass(node)
    }

    /// Marks `texture` as the frame's presentable output. Always survives DAG culling (spec
    /// §4.4): a graph with a `present` call always has at least one live pass.
    pub fn present(&mut self, texture: TextureHandle) -> PassHandle {
        let mut node = PassNode::new("present", PassKind::Present);
        node.force_keep = true;
        node.present_texture = Some(texture);
        node.add_dependency(ResourceRef::Texture(texture), Edge::whole_resource(Usage::Present));
        self.push_pass(node)
    }

    pub(crate) fn push_pass(&mut self, node: PassNode<'frame>) -> PassHandle {
        self.passes.push(node);
        PassHandle((self.passes.len() - 1) as u32)
    }

    /// Keeps `texture` alive through DAG culling even if no live pass ends up reading it, e.g.
    /// a resource a future frame will import back in (spec §4.3/§4.4).
    pub fn keep_texture_alive(&mut self, texture: TextureHandle) {
        self.textures[texture.index()].hold_on_last = true;
    }

    pub fn keep_buffer_alive(&mut self, buffer: BufferHandle) {
        self.buffers[buffer.index()].hold_on_last = true;
    }

    /// Consumes the builder, handing the compiler its raw resource/pass tables. The arena
    /// itself is not part of this: it is borrowed for `'frame`, not owned by the graph, so
    /// dropping the graph never invalidates slices already handed out from it.
    pub(crate) fn into_parts(self) -> (Vec<TextureNode>, Vec<BufferNode>, Vec<PassNode<'frame>>) {
        (self.textures, self.buffers, self.passes)
    }
}

/// Chainable declaration of one render/compute pass's attachments and dependencies, finalized
/// by [`PassBuilder::execute`] (or dropped implicitly for upload/hold passes which never carry
/// an executable).
pub struct PassBuilder<'graph, 'frame> {
    graph: &'graph mut RenderGraph<'frame>,
    node: PassNode<'frame>,
}

impl<'graph, 'frame> PassBuilder<'graph, 'frame> {
    pub fn add_color_attachment(
        mut self,
        texture: TextureHandle,
        load_action: LoadAction,
        clear_value: ClearColor,
    ) -> Self {
        self.node
            .render
            .get_or_insert_with(RenderPassContext::default)
            .color_attachments
            .push(ColorAttachmentDesc {
                texture,
                base_mip_level: 0,
                load_action,
                clear_value,
            });
        self.node
            .add_dependency(ResourceRef::Texture(texture), Edge::whole_resource(Usage::ColorAttachment));
        self
    }

    /// Declares a color attachment targeting a single mip level of `texture`, barriering only
    /// that subresource range instead of the whole texture (spec §4.5.1). Used by mip chain
    /// generation, where each level in the chain is rendered as its own pass.
    pub fn add_color_attachment_at_mip(
        mut self,
        texture: TextureHandle,
        mip_level: u32,
        load_action: LoadAction,
        clear_value: ClearColor,
    ) -> Self {
        self.node
            .render
            .get_or_insert_with(RenderPassContext::default)
            .color_attachments
            .push(ColorAttachmentDesc {
                texture,
                base_mip_level: mip_level,
                load_action,
                clear_value,
            });
        self.node.add_dependency(
            ResourceRef::Texture(texture),
            Edge::with_subresource(
                Usage::ColorAttachment,
                SubresourceRange {
                    base_mip_level: mip_level,
                    mip_level_count: 1,
                    base_array_layer: 0,
                    array_layer_count: 1,
                },
            ),
        );
        self
    }

    pub fn add_depth_attachment(
        mut self,
        texture: TextureHandle,
        load_action: LoadAction,
        clear_value: ClearDepthStencil,
    ) -> Self {
        self.node.render.get_or_insert_with(RenderPassContext::default).depth_attachment =
            Some(DepthAttachmentDesc {
                texture,
                load_action,
                clear_value,
            });
        self.node
            .add_dependency(ResourceRef::Texture(texture), Edge::whole_resource(Usage::DepthAttachment));
        self
    }

    /// Declares that this pass samples `texture` as a shader resource (whole resource).
    pub fn sample(mut self, texture: TextureHandle) -> Self {
        self.node
            .add_dependency(ResourceRef::Texture(texture), Edge::whole_resource(Usage::Sample));
        self
    }

    /// Declares that this pass samples a single mip level of `texture`, so the compiler can
    /// barrier only that subresource range instead of the whole texture (spec §4.5.1).
    pub fn sample_mip(mut self, texture: TextureHandle, mip_level: u32) -> Self {
        self.node.add_dependency(
            ResourceRef::Texture(texture),
            Edge::with_subresource(
                Usage::Sample,
                SubresourceRange {
                    base_mip_level: mip_level,
                    mip_level_count: 1,
                    base_array_layer: 0,
                    array_layer_count: 1,
                },
            ),
        );
        self
    }

    /// Declares a dependency on `buffer` under the given usage; `Usage::UniformBuffer`,
    /// `VertexBuffer`, `IndexBuffer` and `UnorderedAccess` are all valid here.
    pub fn use_buffer_as(mut self, buffer: BufferHandle, usage: Usage) -> Self {
        self.node
            .add_dependency(ResourceRef::Buffer(buffer), Edge::whole_resource(usage));
        self
    }

    /// Shorthand for `use_buffer_as(buffer, Usage::UniformBuffer)`, the overwhelmingly common
    /// case.
    pub fn use_buffer(self, buffer: BufferHandle) -> Self {
        self.use_buffer_as(buffer, Usage::UniformBuffer)
    }

    /// Finalizes the pass with its recorded command closure and returns its handle.
    pub fn execute(mut self, f: impl FnMut(&mut crate::encoder::RenderPassEncoder<'_>) + 'frame) -> PassHandle {
        self.node.executable = Some(Box::new(f));
        self.graph.push_pass(self.node)
    }
}
