//! Mip chain generation (supplemented from `original_source/`: the original engine's renderer
//! exposes a dedicated downsample step that the distilled design omitted).
//!
//! Each level beyond the base is an ordinary render pass: a full-screen triangle sampling the
//! level above it through the built-in blit shader, writing into the level below. Modeling it
//! this way instead of inventing a bespoke pass kind means the compiler and executor barrier
//! each level's subresource range exactly the way any other render pass would (spec
//! §4.3/§4.5.1), and the whole chain stays on the same texture handle so culling and barrier
//! planning see it as one resource rather than N independent ones.

use smallvec::SmallVec;

use crate::context::{blit_pipeline_key, blit_root_signature};
use crate::gpu::descriptor::{ClearColor, LoadAction, SamplerDescriptor};
use crate::graph::builder::RenderGraph;
use crate::graph::handle::{PassHandle, TextureHandle};

impl<'frame> RenderGraph<'frame> {
    /// Adds one render pass per mip level from `base_mip_level + 1` through
    /// `base_mip_level + mip_level_count - 1`, each sampling the level above it and writing the
    /// level below it, returning every pass's handle in generation order.
    pub fn add_generate_mipmap_pass(
        &mut self,
        name: &'static str,
        texture: TextureHandle,
        base_mip_level: u32,
        mip_level_count: u32,
    ) -> SmallVec<[PassHandle; 8]> {
        let mut passes = SmallVec::new();
        for level in (base_mip_level + 1)..(base_mip_level + mip_level_count) {
            let handle = self
                .add_render_pass(name)
                .add_color_attachment_at_mip(texture, level, LoadAction::DontCare, ClearColor::BLACK)
                .sample_mip(texture, level - 1)
                .execute(move |encoder| {
                    encoder.bind_graphics_pipeline(blit_pipeline_key()).expect("blit pipeline");
                    encoder.set_global_texture(0, 0, texture);
                    encoder.set_global_sampler(0, 1, SamplerDescriptor::linear_clamp());
                    encoder.bind_root_signature(&blit_root_signature()).expect("blit root signature");
                    encoder.draw(3, 1, 0, 0);
                });
            passes.push(handle);
        }
        passes
    }
}
