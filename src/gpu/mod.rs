//! The abstract GPU API the render graph core is built against.
//!
//! Everything in this module is an *interface*, not an implementation: instance/device/queue
//! creation, swapchain setup and actual command submission to a physical GPU are explicitly
//! out of scope for this crate (see spec §1). A backend (Vulkan, D3D12, a test mock...)
//! implements [`Device`] and [`CommandEncoder`] and the render graph drives it without any
//! further knowledge of the underlying API.
//!
//! The vocabulary of formats, usage flags and access masks is Vulkan-class by design (the
//! spec calls this out explicitly), so this module reuses [`ash::vk`] value types for them
//! rather than inventing a parallel enum set.

pub mod descriptor;
pub mod device;

pub use descriptor::*;
pub use device::*;
