//! Error taxonomy for the render graph core.
//!
//! Per the failure semantics of this crate: invariant violations (malformed graphs, handle
//! misuse) are programmer errors and `panic!`/`assert!` immediately rather than being
//! wrapped in a `Result` — see the `assert!`/`debug_assert!` call sites throughout `graph`
//! and `executor`. Only failures that cross the GPU device boundary are represented here,
//! because those are conditions a caller can legitimately want to react to (device lost,
//! out of memory) without the process aborting.

use thiserror::Error;

/// Fatal errors that can be returned from [`crate::executor::Executor::execute`].
///
/// There is deliberately no "retry" or "partial success" variant: a frame either executes
/// to completion or the caller tears the device down, per §7 of the design.
#[derive(Debug, Error)]
pub enum RenderGraphError {
    /// A pool's `create` callback returned a null/failed GPU object.
    #[error("failed to create {kind} for pool key {descriptor_debug}")]
    DeviceObjectCreation {
        kind: &'static str,
        descriptor_debug: String,
    },

    /// The swapchain could not hand back a backbuffer image (e.g. out-of-date, needs resize).
    #[error("swapchain acquire failed: {reason}")]
    SwapchainAcquireFailed { reason: String },

    /// A staging buffer upload failed validation that could not be caught ahead of time
    /// (e.g. the device rejected the mapped range).
    #[error("upload to staging buffer failed: {reason}")]
    UploadFailed { reason: String },
}
