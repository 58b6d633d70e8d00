//! The builder-facing half of the render graph (C5): declaring virtual/imported resources and
//! passes before anything is compiled or executed.

pub mod builder;
pub mod edge;
pub mod handle;
pub mod mipmap;
pub mod pass;
pub mod resolve;
pub mod resource;

pub use builder::{PassBuilder, RenderGraph};
pub use edge::{Edge, ResourceRef, SubresourceRange, Usage};
pub use handle::{BufferHandle, PassHandle, TextureHandle};
pub use pass::{PassExecuteFn, PassKind, PassNode};
pub use resource::{BufferNode, ManageType, TextureNode};
