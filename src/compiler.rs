//! DAG culling and lifetime compilation (C6).
//!
//! Turns a [`RenderGraph`] into a [`CompiledRenderGraph`]: the set of passes actually worth
//! running, in declaration order, each annotated with which resources need to be devirtualized
//! (created, or bound to their backing object for the first time) right before it runs and
//! which can be destroyed right after.
//!
//! # Culling algorithm
//! This is the classic frame-graph reference-counting worklist (as described in Yuriy
//! O'Donnell's Frostbite framegraph talk and reflected, in cruder form, in
//! `examples/ennis-autograph-ng`'s abandoned `frame/sched.rs`): a resource's refcount is the
//! number of passes that *read* it; a pass's refcount is the number of resources it *writes*.
//! Any resource that starts with refcount zero is definitionally unused, so its producing
//! pass(es) lose one reference each; if a pass's refcount then hits zero, the pass itself is
//! dead, and everything *it* reads loses a reference in turn, which can cascade further back
//! up the graph. Passes with no writes at all (hold passes, the present pass) are never
//! touched by this process and are always kept — that's what makes them useful as an explicit
//! "keep this alive" marker.

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::graph::builder::RenderGraph;
use crate::graph::edge::ResourceRef;
use crate::graph::pass::PassNode;
use crate::graph::resource::{BufferNode, ManageType, TextureNode};

/// A live pass paired with the resource lifetime events that bracket it.
pub struct CompiledPass<'frame> {
    pub node: PassNode<'frame>,
    /// Resources that must be created/bound before this pass runs, because this is the first
    /// live pass to touch them.
    pub devirtualize: SmallVec<[ResourceRef; 4]>,
    /// Resources that can be released back to the pool after this pass runs, because this is
    /// the last live pass to touch them.
    pub destroy: SmallVec<[ResourceRef; 4]>,
}

/// The output of [`compile`]: a culled, lifetime-annotated pass list ready for
/// [`crate::executor::Executor`].
pub struct CompiledRenderGraph<'frame> {
    pub(crate) passes: Vec<CompiledPass<'frame>>,
    pub(crate) textures: Vec<TextureNode>,
    pub(crate) buffers: Vec<BufferNode>,
}

impl<'frame> CompiledRenderGraph<'frame> {
    pub fn live_pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn texture_node(&self, handle: crate::graph::handle::TextureHandle) -> &TextureNode {
        &self.textures[handle.index()]
    }

    pub fn buffer_node(&self, handle: crate::graph::handle::BufferHandle) -> &BufferNode {
        &self.buffers[handle.index()]
    }

    #[cfg(feature = "graphviz")]
    pub fn write_graphviz(&self, out: &mut dyn std::fmt::Write) -> std::fmt::Result {
        writeln!(out, "digraph rendergraph {{")?;
        writeln!(out, "  rankdir=LR;")?;
        for (i, compiled) in self.passes.iter().enumerate() {
            writeln!(out, "  pass_{} [shape=box,label=\"{}\"];", i, compiled.node.name)?;
            for (resource, _) in &compiled.node.reads {
                writeln!(out, "  {} -> pass_{};", resource_label(*resource), i)?;
            }
            for (resource, _) in &compiled.node.writes {
                writeln!(out, "  pass_{} -> {};", i, resource_label(*resource))?;
            }
        }
        writeln!(out, "}}")
    }
}

#[cfg(feature = "graphviz")]
fn resource_label(resource: ResourceRef) -> String {
    match resource {
        ResourceRef::Texture(h) => format!("tex_{}", h.index()),
        ResourceRef::Buffer(h) => format!("buf_{}", h.index()),
    }
}

/// Compiles a declared graph into an executable, lifetime-annotated one.
pub fn compile<'frame>(graph: RenderGraph<'frame>) -> CompiledRenderGraph<'frame> {
    let (textures, buffers, mut passes) = graph.into_parts();

    let mut resource_refcount: HashMap<ResourceRef, i64> = HashMap::new();
    let mut writers: HashMap<ResourceRef, SmallVec<[usize; 2]>> = HashMap::new();

    for (pass_index, pass) in passes.iter().enumerate() {
        for (resource, _) in &pass.reads {
            *resource_refcount.entry(*resource).or_insert(0) += 1;
        }
        for (resource, _) in &pass.writes {
            writers.entry(*resource).or_insert_with(SmallVec::new).push(pass_index);
            resource_refcount.entry(*resource).or_insert(0);
        }
    }

    let is_persistent = |resource: ResourceRef| -> bool {
        match resource {
            ResourceRef::Texture(h) => textures[h.index()].hold_on_last,
            ResourceRef::Buffer(h) => buffers[h.index()].hold_on_last,
        }
    };

    let mut pass_refcount: Vec<i64> = passes.iter().map(|p| p.writes.len() as i64).collect();
    let mut culled = vec![false; passes.len()];

    let mut worklist: Vec<ResourceRef> = resource_refcount
        .iter()
        .filter(|(resource, count)| **count == 0 && !is_persistent(**resource))
        .map(|(resource, _)| *resource)
        .collect();

    while let Some(resource) = worklist.pop() {
        let writer_passes = match writers.get(&resource) {
            Some(w) => w.clone(),
            None => continue,
        };
        for pass_index in writer_passes {
            if passes[pass_index].force_keep {
                continue;
            }
            pass_refcount[pass_index] -= 1;
            if pass_refcount[pass_index] == 0 && !culled[pass_index] {
                culled[pass_index] = true;
                for (input_resource, _) in passes[pass_index].reads.clone() {
                    if is_persistent(input_resource) {
                        continue;
                    }
                    if let Some(count) = resource_refcount.get_mut(&input_resource) {
                        *count -= 1;
                        if *count == 0 {
                            worklist.push(input_resource);
                        }
                    }
                }
            }
        }
    }

    // First/last live-pass touch indices, in declaration order, per resource.
    let mut first_touch: HashMap<ResourceRef, usize> = HashMap::new();
    let mut last_touch: HashMap<ResourceRef, usize> = HashMap::new();
    for (pass_index, pass) in passes.iter().enumerate() {
        if culled[pass_index] {
            continue;
        }
        for resource in pass.reads.iter().map(|(r, _)| *r).chain(pass.writes.iter().map(|(r, _)| *r)) {
            first_touch.entry(resource).or_insert(pass_index);
            last_touch.insert(resource, pass_index);
        }
    }

    let is_managed = |resource: ResourceRef| -> bool {
        match resource {
            ResourceRef::Texture(h) => matches!(textures[h.index()].manage, ManageType::Managed),
            ResourceRef::Buffer(h) => matches!(buffers[h.index()].manage, ManageType::Managed),
        }
    };

    let mut devirtualize_at: HashMap<usize, SmallVec<[ResourceRef; 4]>> = HashMap::new();
    let mut destroy_at: HashMap<usize, SmallVec<[ResourceRef; 4]>> = HashMap::new();
    for (&resource, &pass_index) in &first_touch {
        if is_managed(resource) {
            devirtualize_at.entry(pass_index).or_insert_with(SmallVec::new).push(resource);
        }
    }
    for (&resource, &pass_index) in &last_touch {
        if is_managed(resource) && !is_persistent(resource) {
            destroy_at.entry(pass_index).or_insert_with(SmallVec::new).push(resource);
        }
    }

    let mut compiled_passes = Vec::with_capacity(passes.len());
    for (pass_index, node) in passes.drain(..).enumerate() {
        if culled[pass_index] {
            continue;
        }
        compiled_passes.push(CompiledPass {
            devirtualize: devirtualize_at.remove(&pass_index).unwrap_or_default(),
            destroy: destroy_at.remove(&pass_index).unwrap_or_default(),
            node,
        });
    }

    CompiledRenderGraph {
        passes: compiled_passes,
        textures,
        buffers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::descriptor::{ClearColor, LoadAction, TextureDescriptor};
    use crate::graph::builder::RenderGraph;
    use typed_arena::Arena;

    fn texture_descriptor() -> TextureDescriptor {
        TextureDescriptor {
            width: 64,
            height: 64,
            depth: 1,
            mip_levels: 1,
            array_layers: 1,
            format: ash::vk::Format::R8G8B8A8_UNORM.as_raw(),
            usage: ash::vk::ImageUsageFlags::COLOR_ATTACHMENT.as_raw(),
        }
    }

    #[test]
    fn unreferenced_pass_is_culled() {
        let arena = Arena::new();
        let mut graph = RenderGraph::new(&arena);
        let backbuffer = graph.declare_texture("backbuffer", texture_descriptor());
        let orphan = graph.declare_texture("orphan", texture_descriptor());

        graph
            .add_render_pass("geometry")
            .add_color_attachment(backbuffer, LoadAction::Clear, ClearColor::BLACK)
            .execute(|_| {});
        graph
            .add_render_pass("dead-end")
            .add_color_attachment(orphan, LoadAction::Clear, ClearColor::BLACK)
            .execute(|_| {});
        graph.present(backbuffer);

        let compiled = compile(graph);
        let names: Vec<&str> = compiled.passes.iter().map(|p| p.node.name).collect();
        assert!(names.contains(&"geometry"));
        assert!(names.contains(&"present"));
        assert!(!names.contains(&"dead-end"));
    }

    #[test]
    fn chain_of_dead_passes_culls_transitively() {
        let arena = Arena::new();
        let mut graph = RenderGraph::new(&arena);
        let backbuffer = graph.declare_texture("backbuffer", texture_descriptor());
        let intermediate_a = graph.declare_texture("a", texture_descriptor());
        let intermediate_b = graph.declare_texture("b", texture_descriptor());

        graph
            .add_render_pass("produce-a")
            .add_color_attachment(intermediate_a, LoadAction::Clear, ClearColor::BLACK)
            .execute(|_| {});
        graph
            .add_render_pass("produce-b-from-a")
            .sample(intermediate_a)
            .add_color_attachment(intermediate_b, LoadAction::Clear, ClearColor::BLACK)
            .execute(|_| {});
        // Neither "produce-a" nor "produce-b-from-a" feeds the backbuffer, so both must cull.
        graph
            .add_render_pass("clear-backbuffer")
            .add_color_attachment(backbuffer, LoadAction::Clear, ClearColor::BLACK)
            .execute(|_| {});
        graph.present(backbuffer);

        let compiled = compile(graph);
        let names: Vec<&str> = compiled.passes.iter().map(|p| p.node.name).collect();
        assert_eq!(names, vec!["clear-backbuffer", "present"]);
    }

    #[test]
    fn hold_pass_keeps_dependency_alive() {
        let arena = Arena::new();
        let mut graph = RenderGraph::new(&arena);
        let backbuffer = graph.declare_texture("backbuffer", texture_descriptor());
        let captured = graph.declare_texture("captured", texture_descriptor());

        graph
            .add_render_pass("produce-capture")
            .add_color_attachment(captured, LoadAction::Clear, ClearColor::BLACK)
            .execute(|_| {});
        graph.add_hold_pass("keep-capture").sample(captured).execute(|_| {});
        graph
            .add_render_pass("clear-backbuffer")
            .add_color_attachment(backbuffer, LoadAction::Clear, ClearColor::BLACK)
            .execute(|_| {});
        graph.present(backbuffer);

        let compiled = compile(graph);
        let names: Vec<&str> = compiled.passes.iter().map(|p| p.node.name).collect();
        assert!(names.contains(&"produce-capture"));
        assert!(names.contains(&"keep-capture"));
    }

    #[test]
    fn devirtualize_and_destroy_bracket_sole_use() {
        let arena = Arena::new();
        let mut graph = RenderGraph::new(&arena);
        let backbuffer = graph.declare_texture("backbuffer", texture_descriptor());
        let scratch = graph.declare_texture("scratch", texture_descriptor());

        graph
            .add_render_pass("produce-scratch")
            .add_color_attachment(scratch, LoadAction::Clear, ClearColor::BLACK)
            .execute(|_| {});
        graph
            .add_render_pass("consume-scratch")
            .sample(scratch)
            .add_color_attachment(backbuffer, LoadAction::Clear, ClearColor::BLACK)
            .execute(|_| {});
        graph.present(backbuffer);

        let compiled = compile(graph);
        let produce = compiled.passes.iter().find(|p| p.node.name == "produce-scratch").unwrap();
        let consume = compiled.passes.iter().find(|p| p.node.name == "consume-scratch").unwrap();
        assert!(produce.devirtualize.contains(&ResourceRef::Texture(scratch)));
        assert!(consume.destroy.contains(&ResourceRef::Texture(scratch)));
    }
}
