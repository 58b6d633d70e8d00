pub mod mock_device;

use rendergraph::gpu::TextureDescriptor;

#[allow(dead_code)]
pub fn color_texture_descriptor(width: u32, height: u32) -> TextureDescriptor {
    TextureDescriptor {
        width,
        height,
        depth: 1,
        mip_levels: 1,
        array_layers: 1,
        format: ash::vk::Format::R8G8B8A8_UNORM.as_raw(),
        usage: ash::vk::ImageUsageFlags::COLOR_ATTACHMENT.as_raw(),
    }
}

#[allow(dead_code)]
pub fn depth_texture_descriptor(width: u32, height: u32) -> TextureDescriptor {
    TextureDescriptor {
        width,
        height,
        depth: 1,
        mip_levels: 1,
        array_layers: 1,
        format: ash::vk::Format::D32_SFLOAT.as_raw(),
        usage: ash::vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT.as_raw(),
    }
}

#[allow(dead_code)]
pub fn mip_chain_texture_descriptor(width: u32, height: u32, mip_levels: u32) -> TextureDescriptor {
    TextureDescriptor {
        width,
        height,
        depth: 1,
        mip_levels,
        array_layers: 1,
        format: ash::vk::Format::R8G8B8A8_UNORM.as_raw(),
        usage: ash::vk::ImageUsageFlags::COLOR_ATTACHMENT.as_raw() | ash::vk::ImageUsageFlags::SAMPLED.as_raw(),
    }
}
