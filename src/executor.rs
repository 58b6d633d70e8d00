//! Barrier planning and dispatch (C7): walks a [`CompiledRenderGraph`] pass by pass, devirtualizing
//! and destroying resources at the points the compiler decided, planning and batching the
//! barriers each pass needs, and dispatching into a recorded command buffer.

use fxhash::FxHashMap;
use smallvec::SmallVec;

use crate::compiler::CompiledRenderGraph;
use crate::context::FrameContext;
use crate::encoder::RenderPassEncoder;
use crate::error::RenderGraphError;
use crate::gpu::descriptor::{
    FramebufferDescriptor, LoadAction, RenderPassDescriptor, ResourceState, StoreAction,
    TextureViewDescriptor,
};
use crate::gpu::device::{
    BufferBarrier, ColorAttachment, CommandEncoder, DepthAttachment, Device, GpuTextureView,
    TextureBarrier,
};
use crate::graph::edge::{ResourceRef, SubresourceRange};
use crate::graph::handle::{BufferHandle, TextureHandle};
use crate::graph::pass::{PassKind, PassNode};
use crate::graph::resolve::{resolve_buffer, resolve_texture, resolve_texture_from_pool};
use crate::graph::resource::{BufferNode, ManageType, TextureNode};
use crate::pool::typed::{BufferSlot, PoolSet, TextureSlot, TextureViewSlot};

/// Barriers are submitted in batches of at most this many buffer entries and this many texture
/// entries per `pipeline_barrier` call (spec §4.5.1).
const MAX_BARRIERS_PER_BATCH: usize = 16;

/// A texture's per-subresource barrier state (spec §4.5.1): one [`ResourceState`] per
/// `(mip, array layer)` pair, plus a flag tracking whether every subresource currently holds
/// the same state. `consistent` lets whole-resource edges take the cheap single-barrier path
/// (and is what makes that path behave identically to the per-subresource path once a texture
/// has only one subresource — testable property #4).
struct TextureStateTrack {
    subresource_states: Vec<ResourceState>,
    consistent: bool,
}

impl TextureStateTrack {
    fn new(initial_state: ResourceState, subresource_count: u32) -> Self {
        TextureStateTrack {
            subresource_states: vec![initial_state; subresource_count.max(1) as usize],
            consistent: true,
        }
    }
}

/// Per-execution bookkeeping: which pool slot a `Managed` handle currently resolves to, and the
/// last known [`ResourceState`] of every declared resource, so each barrier only pays for the
/// actual transition instead of always starting cold from `Undefined`. Lives for exactly one
/// [`Executor::execute`] call — a fresh one is built every frame.
struct ExecutionState {
    managed_textures: FxHashMap<TextureHandle, TextureSlot>,
    managed_buffers: FxHashMap<BufferHandle, BufferSlot>,
    texture_states: Vec<TextureStateTrack>,
    buffer_states: Vec<ResourceState>,
}

/// One planned barrier on a texture subresource range (spec §4.5.1's
/// `mipLevel + arraySlice * mipCount` indexing, generalized to a range rather than one index).
struct TextureTransition {
    handle: TextureHandle,
    base_mip_level: u32,
    mip_level_count: u32,
    base_array_layer: u32,
    array_layer_count: u32,
    src: ResourceState,
    dst: ResourceState,
}

/// Runs a compiled graph against a device, producing a single recorded command buffer.
pub struct Executor;

impl Executor {
    /// Devirtualizes/destroys pooled resources and records every live pass's commands,
    /// returning the finished command buffer for [`crate::gpu::device::Device::submit`].
    pub fn execute<'frame>(
        device: &dyn Device,
        context: &mut FrameContext,
        mut graph: CompiledRenderGraph<'frame>,
    ) -> Result<Box<dyn CommandEncoder>, RenderGraphError> {
        let mut encoder = device.create_command_encoder();

        let mut state = ExecutionState {
            managed_textures: FxHashMap::default(),
            managed_buffers: FxHashMap::default(),
            texture_states: graph
                .textures
                .iter()
                .map(|t| TextureStateTrack::new(t.initial_state, t.descriptor.subresource_count()))
                .collect(),
            buffer_states: graph.buffers.iter().map(|b| b.initial_state).collect(),
        };

        for compiled in graph.passes.drain(..) {
            for resource in &compiled.devirtualize {
                devirtualize(device, context, &graph.textures, &graph.buffers, &mut state, *resource)?;
            }

            // `HoldOn`/`Present` passes never dispatch a single command (see `dispatch_pass`
            // below) — they exist purely to influence DAG culling and liveness, so there is no
            // command-buffer position to insert a barrier before and nothing to plan one for.
            if !matches!(compiled.node.kind, PassKind::HoldOn | PassKind::Present) {
                plan_and_submit_barriers(encoder.as_mut(), &graph.textures, &graph.buffers, &context.pools, &mut state, &compiled.node);
            }

            dispatch_pass(device, context, encoder.as_mut(), &graph.textures, &graph.buffers, &state, compiled.node)?;

            for resource in &compiled.destroy {
                forget(&mut state, *resource);
            }
        }

        context.pools.new_frame();
        Ok(encoder)
    }
}

fn devirtualize(
    device: &dyn Device,
    context: &mut FrameContext,
    textures: &[TextureNode],
    buffers: &[BufferNode],
    state: &mut ExecutionState,
    resource: ResourceRef,
) -> Result<(), RenderGraphError> {
    match resource {
        ResourceRef::Texture(handle) => {
            let node = &textures[handle.index()];
            if matches!(node.manage, ManageType::Managed) {
                let slot = context.pools.get_texture(device, node.descriptor)?;
                state.managed_textures.insert(handle, slot);
            }
        }
        ResourceRef::Buffer(handle) => {
            let node = &buffers[handle.index()];
            if matches!(node.manage, ManageType::Managed) {
                let slot = context.pools.get_buffer(device, node.descriptor)?;
                state.managed_buffers.insert(handle, slot);
            }
        }
    }
    Ok(())
}

/// Drops this execution's record of a handle's pool slot. The pool entry itself isn't released
/// until [`PoolSet::new_frame`]; this only stops `resolve_texture`/`resolve_buffer` from
/// honoring the handle past the point the compiler said it was last touched.
fn forget(state: &mut ExecutionState, resource: ResourceRef) {
    match resource {
        ResourceRef::Texture(handle) => {
            state.managed_textures.remove(&handle);
        }
        ResourceRef::Buffer(handle) => {
            state.managed_buffers.remove(&handle);
        }
    }
}

fn subresource_index(mip: u32, layer: u32, mip_levels: u32) -> usize {
    (mip + layer * mip_levels) as usize
}

/// Maps an edge's subresource range (or, if the edge is whole-resource, the node's own full
/// range) into the coordinate space of the root (non-subresource) texture handle it ultimately
/// aliases, recursing through [`ManageType::SubResource`] chains (spec §4.5.1: subresource
/// views barrier the same underlying resource their parent does).
fn root_texture_range(
    textures: &[TextureNode],
    mut handle: TextureHandle,
    mut range: Option<SubresourceRange>,
) -> (TextureHandle, Option<SubresourceRange>) {
    loop {
        let node = &textures[handle.index()];
        match node.manage {
            ManageType::SubResource {
                parent,
                base_mip_level,
                mip_level_count,
                base_array_layer,
                array_layer_count,
            } => {
                let local = range.unwrap_or(SubresourceRange {
                    base_mip_level: 0,
                    mip_level_count,
                    base_array_layer: 0,
                    array_layer_count,
                });
                range = Some(SubresourceRange {
                    base_mip_level: base_mip_level + local.base_mip_level,
                    mip_level_count: local.mip_level_count,
                    base_array_layer: base_array_layer + local.base_array_layer,
                    array_layer_count: local.array_layer_count,
                });
                handle = parent;
            }
            _ => return (handle, range),
        }
    }
}

fn plan_and_submit_barriers<'frame>(
    encoder: &mut dyn CommandEncoder,
    textures: &[TextureNode],
    buffers: &[BufferNode],
    pools: &PoolSet,
    state: &mut ExecutionState,
    pass: &PassNode<'frame>,
) {
    let mut texture_transitions: SmallVec<[TextureTransition; 16]> = SmallVec::new();
    let mut buffer_transitions: SmallVec<[(BufferHandle, ResourceState, ResourceState); 16]> = SmallVec::new();

    for (resource, edge) in pass.reads.iter().chain(pass.writes.iter()) {
        let target_state = edge.usage.resource_state();
        match resource {
            ResourceRef::Texture(handle) => {
                let forced = matches!(
                    target_state,
                    ResourceState::RenderTarget | ResourceState::DepthWrite | ResourceState::CopyDest
                );
                let (root, range) = root_texture_range(textures, *handle, edge.subresource);
                let root_node = &textures[root.index()];
                let mip_levels = root_node.descriptor.mip_levels;
                let subresource_count = root_node.descriptor.subresource_count();
                let track = &mut state.texture_states[root.index()];

                match range {
                    None => {
                        if track.consistent || subresource_count <= 1 {
                            let current = track.subresource_states[0];
                            if current != target_state || forced {
                                texture_transitions.push(TextureTransition {
                                    handle: root,
                                    base_mip_level: 0,
                                    mip_level_count: root_node.descriptor.mip_levels,
                                    base_array_layer: 0,
                                    array_layer_count: root_node.descriptor.array_layers,
                                    src: current,
                                    dst: target_state,
                                });
                            }
                        } else {
                            for layer in 0..root_node.descriptor.array_layers {
                                for mip in 0..mip_levels {
                                    let index = subresource_index(mip, layer, mip_levels);
                                    let current = track.subresource_states[index];
                                    if current != target_state || forced {
                                        texture_transitions.push(TextureTransition {
                                            handle: root,
                                            base_mip_level: mip,
                                            mip_level_count: 1,
                                            base_array_layer: layer,
                                            array_layer_count: 1,
                                            src: current,
                                            dst: target_state,
                                        });
                                    }
                                }
                            }
                        }
                        for s in track.subresource_states.iter_mut() {
                            *s = target_state;
                        }
                        track.consistent = true;
                    }
                    Some(r) => {
                        for layer in r.base_array_layer..(r.base_array_layer + r.array_layer_count) {
                            for mip in r.base_mip_level..(r.base_mip_level + r.mip_level_count) {
                                let index = subresource_index(mip, layer, mip_levels);
                                let current = track.subresource_states[index];
                                if current != target_state || forced {
                                    texture_transitions.push(TextureTransition {
                                        handle: root,
                                        base_mip_level: mip,
                                        mip_level_count: 1,
                                        base_array_layer: layer,
                                        array_layer_count: 1,
                                        src: current,
                                        dst: target_state,
                                    });
                                }
                                track.subresource_states[index] = target_state;
                            }
                        }
                        track.consistent = false;
                    }
                }
            }
            ResourceRef::Buffer(handle) => {
                let forced = matches!(target_state, ResourceState::CopyDest);
                let index = handle.index();
                let current = state.buffer_states[index];
                if current != target_state || forced {
                    buffer_transitions.push((*handle, current, target_state));
                    state.buffer_states[index] = target_state;
                }
            }
        }
    }

    if texture_transitions.is_empty() && buffer_transitions.is_empty() {
        return;
    }

    let texture_batches = texture_transitions.chunks(MAX_BARRIERS_PER_BATCH).count();
    let buffer_batches = buffer_transitions.chunks(MAX_BARRIERS_PER_BATCH).count();
    let batch_count = texture_batches.max(buffer_batches).max(1);

    for i in 0..batch_count {
        let texture_chunk = texture_transitions.chunks(MAX_BARRIERS_PER_BATCH).nth(i).unwrap_or(&[]);
        let buffer_chunk = buffer_transitions.chunks(MAX_BARRIERS_PER_BATCH).nth(i).unwrap_or(&[]);

        let texture_barriers: SmallVec<[TextureBarrier<'_>; 16]> = texture_chunk
            .iter()
            .map(|transition| TextureBarrier {
                texture: resolve_texture(textures, &state.managed_textures, pools, transition.handle),
                base_mip_level: transition.base_mip_level,
                mip_level_count: transition.mip_level_count,
                base_array_layer: transition.base_array_layer,
                array_layer_count: transition.array_layer_count,
                src_state: transition.src,
                dst_state: transition.dst,
            })
            .collect();
        let buffer_barriers: SmallVec<[BufferBarrier<'_>; 16]> = buffer_chunk
            .iter()
            .map(|(handle, src, dst)| BufferBarrier {
                buffer: resolve_buffer(buffers, &state.managed_buffers, pools, *handle),
                src_state: *src,
                dst_state: *dst,
            })
            .collect();

        encoder.pipeline_barrier(&buffer_barriers, &texture_barriers);
    }
}

fn dispatch_pass<'frame>(
    device: &dyn Device,
    context: &mut FrameContext,
    encoder: &mut dyn CommandEncoder,
    textures: &[TextureNode],
    buffers: &[BufferNode],
    state: &ExecutionState,
    mut pass: PassNode<'frame>,
) -> Result<(), RenderGraphError> {
    match pass.kind {
        PassKind::HoldOn | PassKind::Present => Ok(()),
        PassKind::Render => dispatch_render_pass(device, context, encoder, textures, buffers, state, &mut pass),
        PassKind::Compute => dispatch_compute_pass(device, context, encoder, textures, buffers, state, &mut pass),
        PassKind::UploadTexture => dispatch_upload_texture(device, context, encoder, textures, state, &pass),
        PassKind::UploadBuffer => dispatch_upload_buffer(device, context, encoder, buffers, state, &pass),
    }
}

#[allow(clippy::too_many_arguments)]
fn dispatch_render_pass<'frame>(
    device: &dyn Device,
    context: &mut FrameContext,
    encoder: &mut dyn CommandEncoder,
    textures: &[TextureNode],
    buffers: &[BufferNode],
    state: &ExecutionState,
    pass: &mut PassNode<'frame>,
) -> Result<(), RenderGraphError> {
    let render = match &pass.render {
        Some(r) => r,
        None => return Ok(()),
    };

    let mut render_pass_descriptor = RenderPassDescriptor::default();
    render_pass_descriptor.color_attachment_count = render.color_attachments.len() as u32;
    let mut width = 0u32;
    let mut height = 0u32;
    for (i, attachment) in render.color_attachments.iter().enumerate() {
        let node = &textures[attachment.texture.index()];
        render_pass_descriptor.color_formats[i] = node.descriptor.format;
        render_pass_descriptor.color_load_actions[i] = attachment.load_action as u32;
        render_pass_descriptor.color_store_actions[i] = StoreAction::Store as u32;
        width = (node.descriptor.width >> attachment.base_mip_level).max(1);
        height = (node.descriptor.height >> attachment.base_mip_level).max(1);
    }
    if let Some(depth) = &render.depth_attachment {
        let node = &textures[depth.texture.index()];
        render_pass_descriptor.has_depth_attachment = 1;
        render_pass_descriptor.depth_format = node.descriptor.format;
        render_pass_descriptor.depth_load_action = depth.load_action as u32;
        render_pass_descriptor.depth_store_action = StoreAction::Store as u32;
        render_pass_descriptor.stencil_load_action = LoadAction::DontCare as u32;
        render_pass_descriptor.stencil_store_action = StoreAction::DontCare as u32;
        if width == 0 {
            width = node.descriptor.width;
            height = node.descriptor.height;
        }
    }

    let render_pass_slot = context.pools.get_render_pass(device, render_pass_descriptor)?;

    // Disjoint-borrow the sub-pools this needs at once: `texture_pool` to resolve each
    // attachment's backing object, `texture_views`/`framebuffers` to pool the view and
    // framebuffer objects, `render_passes` to hand the render pass object to
    // `create_framebuffer`. Going through a `PoolSet` convenience method here would need
    // `&mut self` for the whole struct, which can't coexist with holding the others open.
    let PoolSet {
        textures: texture_pool,
        texture_views,
        framebuffers,
        render_passes,
        ..
    } = &mut context.pools;

    let attachment_mips: SmallVec<[(TextureHandle, u32); 9]> = render
        .color_attachments
        .iter()
        .map(|a| (a.texture, a.base_mip_level))
        .chain(render.depth_attachment.as_ref().map(|d| (d.texture, 0)))
        .collect();

    let mut view_slots: SmallVec<[TextureViewSlot; 9]> = SmallVec::new();
    let mut view_descriptors: SmallVec<[TextureViewDescriptor; 9]> = SmallVec::new();
    for (handle, base_mip_level) in &attachment_mips {
        let node = &textures[handle.index()];
        let view_descriptor = TextureViewDescriptor {
            format: node.descriptor.format,
            base_mip_level: *base_mip_level,
            mip_level_count: 1,
            base_array_layer: 0,
            array_layer_count: node.descriptor.array_layers,
            usage: node.descriptor.usage,
        };
        let texture_object = resolve_texture_from_pool(textures, &state.managed_textures, texture_pool, *handle);
        let slot = texture_views.get(view_descriptor, |d| device.create_texture_view(texture_object, d))?;
        view_slots.push(slot);
        view_descriptors.push(view_descriptor);
    }

    let view_refs: SmallVec<[&dyn GpuTextureView; 9]> =
        view_slots.iter().map(|slot| texture_views.resolve(*slot).as_ref()).collect();
    let render_pass_object = render_passes.resolve(render_pass_slot).as_ref();

    let mut framebuffer_descriptor = FramebufferDescriptor::default();
    framebuffer_descriptor.render_pass = render_pass_descriptor;
    framebuffer_descriptor.width = width;
    framebuffer_descriptor.height = height;
    framebuffer_descriptor.attachment_count = view_descriptors.len() as u32;
    for (i, descriptor) in view_descriptors.iter().enumerate() {
        framebuffer_descriptor.attachment_views[i] = *descriptor;
    }

    let framebuffer_slot = framebuffers.get(framebuffer_descriptor, |d| {
        device.create_framebuffer(render_pass_object, d, &view_refs)
    })?;
    let framebuffer_object = framebuffers.resolve(framebuffer_slot).as_ref();

    let color_count = render.color_attachments.len();
    let color_attachments: SmallVec<[ColorAttachment<'_>; 8]> = render
        .color_attachments
        .iter()
        .enumerate()
        .map(|(i, attachment)| ColorAttachment {
            view: view_refs[i],
            load_action: attachment.load_action,
            clear_value: attachment.clear_value,
        })
        .collect();
    let depth_attachment = render.depth_attachment.as_ref().map(|depth| DepthAttachment {
        view: view_refs[color_count],
        load_action: depth.load_action,
        clear_value: depth.clear_value,
    });

    encoder.begin_render_pass(render_pass_object, framebuffer_object, &color_attachments, depth_attachment.as_ref());
    drop(depth_attachment);
    drop(color_attachments);
    drop(view_refs);

    {
        let mut render_pass_encoder = RenderPassEncoder::new(
            device,
            context,
            encoder,
            Some(render_pass_slot),
            textures,
            buffers,
            &state.managed_textures,
            &state.managed_buffers,
        );
        if let Some(executable) = pass.executable.as_mut() {
            executable(&mut render_pass_encoder);
        }
    }

    encoder.end_render_pass();
    Ok(())
}

fn dispatch_compute_pass<'frame>(
    device: &dyn Device,
    context: &mut FrameContext,
    encoder: &mut dyn CommandEncoder,
    textures: &[TextureNode],
    buffers: &[BufferNode],
    state: &ExecutionState,
    pass: &mut PassNode<'frame>,
) -> Result<(), RenderGraphError> {
    encoder.begin_compute_pass();
    {
        let mut pass_encoder = RenderPassEncoder::new(
            device,
            context,
            encoder,
            None,
            textures,
            buffers,
            &state.managed_textures,
            &state.managed_buffers,
        );
        if let Some(executable) = pass.executable.as_mut() {
            executable(&mut pass_encoder);
        }
    }
    encoder.end_compute_pass();
    Ok(())
}

fn dispatch_upload_texture<'frame>(
    device: &dyn Device,
    context: &mut FrameContext,
    encoder: &mut dyn CommandEncoder,
    textures: &[TextureNode],
    state: &ExecutionState,
    pass: &PassNode<'frame>,
) -> Result<(), RenderGraphError> {
    let upload = match &pass.upload_texture {
        Some(u) => u,
        None => return Ok(()),
    };
    let staging_descriptor = FrameContext::staging_buffer_descriptor(upload.data.len() as u64);
    let staging_slot = context.pools.get_buffer(device, staging_descriptor)?;
    let staging = context.pools.resolve_buffer(staging_slot);
    device.write_buffer(staging, 0, upload.data)?;

    let dst_texture = resolve_texture(textures, &state.managed_textures, &context.pools, upload.dst);
    encoder.copy_buffer_to_texture(staging, 0, dst_texture, upload.dst_mip_level, upload.dst_array_layer);
    Ok(())
}

fn dispatch_upload_buffer<'frame>(
    device: &dyn Device,
    context: &mut FrameContext,
    encoder: &mut dyn CommandEncoder,
    buffers: &[BufferNode],
    state: &ExecutionState,
    pass: &PassNode<'frame>,
) -> Result<(), RenderGraphError> {
    let upload = match &pass.upload_buffer {
        Some(u) => u,
        None => return Ok(()),
    };

    let dst_size = buffers[upload.dst.index()].descriptor.size;
    assert!(
        upload.dst_offset + upload.data.len() as u64 <= dst_size,
        "upload of {} bytes at offset {} overruns destination buffer of size {}",
        upload.data.len(),
        upload.dst_offset,
        dst_size
    );

    let staging_descriptor = FrameContext::staging_buffer_descriptor(upload.data.len() as u64);
    let staging_slot = context.pools.get_buffer(device, staging_descriptor)?;
    let staging = context.pools.resolve_buffer(staging_slot);
    device.write_buffer(staging, 0, upload.data)?;

    let dst_buffer = resolve_buffer(buffers, &state.managed_buffers, &context.pools, upload.dst);
    encoder.copy_buffer_to_buffer(staging, 0, dst_buffer, upload.dst_offset, upload.data.len() as u64);
    Ok(())
}
