//! A frame-scoped GPU render graph: declare a frame's passes and the resources they touch
//! against an abstract device, and let the graph work out what is actually live, in what
//! order, with what barriers, and bound to which pooled objects.
//!
//! The pipeline a frame goes through:
//!
//! 1. [`graph::builder::RenderGraph`] — declare virtual/imported resources and passes (C5).
//! 2. [`compiler::compile`] — cull dead passes, work out devirtualize/destroy brackets (C6).
//! 3. [`executor::Executor::execute`] — devirtualize, barrier, dispatch (C7).
//! 4. [`encoder::RenderPassEncoder`] — what a pass's own closure sees while recording (C8).
//!
//! [`context::FrameContext`] owns the pools ([`pool::PoolSet`], C2/C3) and the optional
//! [`profiler::GpuProfiler`] (C4) across the application's whole lifetime; only the graph
//! itself is rebuilt every frame. None of this crate opens a device, allocates device memory,
//! or does window/swapchain setup — that's [`gpu::device::Device`]'s job, implemented by
//! whatever backend the embedder links in.

pub mod compiler;
pub mod context;
pub mod encoder;
pub mod error;
pub mod executor;
pub mod gpu;
pub mod graph;
pub mod hash;
pub mod pool;
pub mod profiler;

pub use compiler::{compile, CompiledPass, CompiledRenderGraph};
pub use context::FrameContext;
pub use encoder::RenderPassEncoder;
pub use error::RenderGraphError;
pub use executor::Executor;
pub use graph::{
    BufferHandle, Edge, ManageType, PassBuilder, PassHandle, PassKind, RenderGraph, ResourceRef,
    SubresourceRange, TextureHandle, Usage,
};
