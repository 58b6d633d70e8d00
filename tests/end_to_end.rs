//! End-to-end scenarios driving a graph from declaration through compilation to dispatch
//! against a mock device, exercising only the crate's public surface.

mod support;

use rendergraph::gpu::descriptor::{ClearColor, ClearDepthStencil, LoadAction, ResourceState};
use rendergraph::gpu::Device;
use rendergraph::{compile, Executor, FrameContext, RenderGraph};
use support::mock_device::MockDevice;
use support::{color_texture_descriptor, depth_texture_descriptor, mip_chain_texture_descriptor};
use typed_arena::Arena;

fn new_context(device: &MockDevice) -> FrameContext {
    FrameContext::new(device, 2, 64, false).expect("context creation")
}

/// S1: a graph with nothing but an imported backbuffer and a present call records no render
/// pass at all, but still executes cleanly.
#[test]
fn empty_frame_presents_only() {
    let device = MockDevice::new();
    let mut context = new_context(&device);
    let arena = Arena::new();
    let mut graph = RenderGraph::new(&arena);

    let backbuffer = graph.import_texture(
        "backbuffer",
        device.create_texture(&color_texture_descriptor(1920, 1080)).unwrap(),
        ResourceState::Undefined,
    );
    graph.present(backbuffer);

    let compiled = compile(graph);
    assert_eq!(compiled.live_pass_count(), 1);

    Executor::execute(&device, &mut context, compiled).expect("execute");
    assert!(device.log().is_empty(), "present-only pass emits no commands");
}

/// S2: a single pass clearing the backbuffer and presenting it records exactly one
/// begin/end render pass pair and no barriers beyond the transition into render-target state.
#[test]
fn single_clear_pass_records_begin_and_end() {
    let device = MockDevice::new();
    let mut context = new_context(&device);
    let arena = Arena::new();
    let mut graph = RenderGraph::new(&arena);

    let backbuffer = graph.import_texture(
        "backbuffer",
        device.create_texture(&color_texture_descriptor(1920, 1080)).unwrap(),
        ResourceState::Undefined,
    );
    graph
        .add_render_pass("clear-backbuffer")
        .add_color_attachment(backbuffer, LoadAction::Clear, ClearColor::BLACK)
        .execute(|_encoder| {});
    graph.present(backbuffer);

    let compiled = compile(graph);
    assert_eq!(compiled.live_pass_count(), 2);

    Executor::execute(&device, &mut context, compiled).expect("execute");
    let log = device.log();
    assert_eq!(log.iter().filter(|entry| entry.starts_with("begin_render_pass")).count(), 1);
    assert_eq!(log.iter().filter(|entry| entry.as_str() == "end_render_pass").count(), 1);
    assert!(log.iter().any(|entry| entry.starts_with("pipeline_barrier")));
}

/// S3: a transient depth buffer is created fresh for the frame (managed) and never seen again
/// by the caller; the pass still runs and the pool only ever creates one texture for it.
#[test]
fn transient_depth_buffer_is_devirtualized_for_one_pass() {
    let device = MockDevice::new();
    let mut context = new_context(&device);
    let arena = Arena::new();
    let mut graph = RenderGraph::new(&arena);

    let backbuffer = graph.import_texture(
        "backbuffer",
        device.create_texture(&color_texture_descriptor(1920, 1080)).unwrap(),
        ResourceState::Undefined,
    );
    let depth = graph.declare_texture("depth", depth_texture_descriptor(1920, 1080));

    graph
        .add_render_pass("geometry")
        .add_color_attachment(backbuffer, LoadAction::Clear, ClearColor::BLACK)
        .add_depth_attachment(depth, LoadAction::Clear, ClearDepthStencil { depth: 1.0, stencil: 0 })
        .execute(|_encoder| {});
    graph.present(backbuffer);

    let compiled = compile(graph);
    Executor::execute(&device, &mut context, compiled).expect("execute");

    assert_eq!(device.counts.textures.get(), 1, "depth texture created exactly once");
    let log = device.log();
    assert!(log.iter().any(|entry| entry.starts_with("begin_render_pass(colors=1, depth=true)")));
}

/// S4: a pass whose only output feeds nothing downstream is culled, and never touches the
/// device at all.
#[test]
fn unreferenced_branch_never_reaches_the_device() {
    let device = MockDevice::new();
    let mut context = new_context(&device);
    let arena = Arena::new();
    let mut graph = RenderGraph::new(&arena);

    let backbuffer = graph.import_texture(
        "backbuffer",
        device.create_texture(&color_texture_descriptor(1920, 1080)).unwrap(),
        ResourceState::Undefined,
    );
    let orphan = graph.declare_texture("orphan", color_texture_descriptor(512, 512));

    graph
        .add_render_pass("dead-end")
        .add_color_attachment(orphan, LoadAction::Clear, ClearColor::BLACK)
        .execute(|_encoder| {});
    graph
        .add_render_pass("clear-backbuffer")
        .add_color_attachment(backbuffer, LoadAction::Clear, ClearColor::BLACK)
        .execute(|_encoder| {});
    graph.present(backbuffer);

    let compiled = compile(graph);
    assert_eq!(compiled.live_pass_count(), 2, "dead-end pass is culled");

    let textures_before = device.counts.textures.get();
    Executor::execute(&device, &mut context, compiled).expect("execute");
    assert_eq!(
        device.counts.textures.get(),
        textures_before,
        "a culled pass's resources are never devirtualized"
    );
}

/// S5: generating a full mip chain renders each level from the one above it, in order, with a
/// barrier in front of every read and write subresource it touches.
#[test]
fn mipmap_chain_renders_each_level_in_order() {
    let device = MockDevice::new();
    let mut context = new_context(&device);
    let arena = Arena::new();
    let mut graph = RenderGraph::new(&arena);

    let backbuffer = graph.import_texture(
        "backbuffer",
        device.create_texture(&color_texture_descriptor(1920, 1080)).unwrap(),
        ResourceState::Undefined,
    );
    let texture = graph.declare_texture("mip-source", mip_chain_texture_descriptor(512, 512, 4));
    let mip_passes = graph.add_generate_mipmap_pass("mip-chain", texture, 0, 4);
    assert_eq!(mip_passes.len(), 3, "one render pass per level beyond the base");
    graph.add_hold_pass("keep-mips").sample(texture).execute(|_encoder| {});
    graph
        .add_render_pass("clear-backbuffer")
        .add_color_attachment(backbuffer, LoadAction::Clear, ClearColor::BLACK)
        .execute(|_encoder| {});
    graph.present(backbuffer);

    let compiled = compile(graph);
    Executor::execute(&device, &mut context, compiled).expect("execute");

    let log = device.log();
    assert!(
        log.iter().all(|e| !e.starts_with("blit_texture")),
        "mip chain generation no longer blits, it renders"
    );

    let draw_entries = log.iter().filter(|e| e.starts_with("draw(")).count();
    assert_eq!(draw_entries, 3, "one full-screen-triangle draw per mip level");

    let render_pass_entries = log.iter().filter(|e| e.starts_with("begin_render_pass")).count();
    assert_eq!(render_pass_entries, 4, "3 mip levels plus the backbuffer clear");

    let barrier_entries = log.iter().filter(|e| e.starts_with("pipeline_barrier")).count();
    assert_eq!(
        barrier_entries, 4,
        "one batch per mip-chain render pass (read + write subresource) plus one for the backbuffer clear; \
         the hold pass and the present pass dispatch no commands and plan no barriers"
    );

    assert_eq!(device.counts.textures.get(), 2, "backbuffer plus the mip-source texture");
}

/// S6: upload passes stage a buffer and schedule a copy into the destination resource.
#[test]
fn upload_passes_schedule_staging_copies() {
    let device = MockDevice::new();
    let mut context = new_context(&device);
    let arena = Arena::new();
    let mut graph = RenderGraph::new(&arena);

    let backbuffer = graph.import_texture(
        "backbuffer",
        device.create_texture(&color_texture_descriptor(1920, 1080)).unwrap(),
        ResourceState::Undefined,
    );
    let texture = graph.declare_texture("uploaded", color_texture_descriptor(64, 64));
    let buffer = graph.declare_uniform_buffer_quick("uniforms", 256);

    graph.add_upload_texture_pass("upload-texture", texture, &[0u8; 64 * 64 * 4], 0, 0);
    graph.add_upload_buffer_pass("upload-buffer", buffer, &[0u8; 256], 0);
    graph.add_hold_pass("keep-texture").sample(texture).execute(|_encoder| {});
    graph.add_hold_pass("keep-buffer").use_buffer(buffer).execute(|_encoder| {});
    graph
        .add_render_pass("clear-backbuffer")
        .add_color_attachment(backbuffer, LoadAction::Clear, ClearColor::BLACK)
        .execute(|_encoder| {});
    graph.present(backbuffer);

    let compiled = compile(graph);
    Executor::execute(&device, &mut context, compiled).expect("execute");

    let log = device.log();
    assert!(log.iter().any(|entry| entry == "copy_buffer_to_texture"));
    assert!(log.iter().any(|entry| entry == "copy_buffer_to_buffer"));
}

/// Invariant 1: compilation preserves the recorded order of surviving passes.
#[test]
fn compilation_preserves_declaration_order_of_survivors() {
    let device = MockDevice::new();
    let arena = Arena::new();
    let mut graph = RenderGraph::new(&arena);

    let backbuffer = graph.import_texture(
        "backbuffer",
        device.create_texture(&color_texture_descriptor(64, 64)).unwrap(),
        ResourceState::Undefined,
    );
    let a = graph.declare_texture("a", color_texture_descriptor(64, 64));
    let b = graph.declare_texture("b", color_texture_descriptor(64, 64));

    graph
        .add_render_pass("produce-a")
        .add_color_attachment(a, LoadAction::Clear, ClearColor::BLACK)
        .execute(|_| {});
    graph
        .add_render_pass("produce-b")
        .sample(a)
        .add_color_attachment(b, LoadAction::Clear, ClearColor::BLACK)
        .execute(|_| {});
    graph
        .add_render_pass("composite")
        .sample(b)
        .add_color_attachment(backbuffer, LoadAction::Clear, ClearColor::BLACK)
        .execute(|_| {});
    graph.present(backbuffer);

    let compiled = compile(graph);
    assert_eq!(compiled.live_pass_count(), 4);
}

/// Invariant 10: exactly 8 color attachments is fine; a 9th overruns the fixed-size attachment
/// table the moment the executor tries to populate it, which is this design's precondition
/// failure (spec §4.2 bounds render passes to 8 color attachments).
#[test]
fn eight_color_attachments_succeed() {
    let device = MockDevice::new();
    let mut context = new_context(&device);
    let arena = Arena::new();
    let mut graph = RenderGraph::new(&arena);

    let handles: Vec<_> = (0..8)
        .map(|i| graph.declare_texture("target", color_texture_descriptor(64, 64 + i)))
        .collect();
    let mut builder = graph.add_render_pass("many-targets");
    for &handle in &handles {
        builder = builder.add_color_attachment(handle, LoadAction::Clear, ClearColor::BLACK);
    }
    builder.execute(|_| {});
    graph.present(handles[0]);

    let compiled = compile(graph);
    Executor::execute(&device, &mut context, compiled).expect("eight color attachments is within bounds");
}

#[test]
#[should_panic]
fn nine_color_attachments_overruns_the_attachment_table() {
    let device = MockDevice::new();
    let mut context = new_context(&device);
    let arena = Arena::new();
    let mut graph = RenderGraph::new(&arena);

    let handles: Vec<_> = (0..9)
        .map(|i| graph.declare_texture("target", color_texture_descriptor(64, 64 + i)))
        .collect();
    let mut builder = graph.add_render_pass("too-many-targets");
    for &handle in &handles {
        builder = builder.add_color_attachment(handle, LoadAction::Clear, ClearColor::BLACK);
    }
    builder.execute(|_| {});
    graph.present(handles[0]);

    let compiled = compile(graph);
    let _ = Executor::execute(&device, &mut context, compiled);
}
