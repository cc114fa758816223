//! The two ping-pong trail textures.

use crate::field::TextureRoles;
use crate::textures::FieldTextureConfig;

/// GPU state for the trail field.
pub struct FieldTextures {
    /// Both textures; [`TextureRoles`] decides which one is written.
    pub textures: [wgpu::Texture; 2],
    pub views: [wgpu::TextureView; 2],
    pub roles: TextureRoles,
    pub config: FieldTextureConfig,
}

impl FieldTextures {
    /// Allocate both textures. New textures are zero-initialized.
    pub fn new(device: &wgpu::Device, config: FieldTextureConfig) -> Self {
        let make = |label: &str| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: config.extent(),
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: FieldTextureConfig::FORMAT,
                usage: FieldTextureConfig::usage(),
                view_formats: &[],
            })
        };

        let textures = [make("Field Texture A"), make("Field Texture B")];
        let views = [
            textures[0].create_view(&wgpu::TextureViewDescriptor::default()),
            textures[1].create_view(&wgpu::TextureViewDescriptor::default()),
        ];

        log::info!(
            "Allocated two {}x{} field textures ({:.1} MiB)",
            config.size.x,
            config.size.y,
            (2 * config.byte_size()) as f64 / (1024.0 * 1024.0)
        );

        Self {
            textures,
            views,
            roles: TextureRoles::new(),
            config,
        }
    }

    pub fn input(&self) -> &wgpu::Texture {
        &self.textures[self.roles.input()]
    }

    pub fn output(&self) -> &wgpu::Texture {
        &self.textures[self.roles.output()]
    }

    /// Swap input and output.
    pub fn swap(&mut self) {
        self.roles.swap();
    }

    /// Seed the input with the last frame's result.
    pub fn copy_output_to_input(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.copy_texture_to_texture(
            self.output().as_image_copy(),
            self.input().as_image_copy(),
            self.config.extent(),
        );
    }
}
