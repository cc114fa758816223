//! Sampling and addressing configuration for the trail field.
//!
//! The field is toroidal and deliberately unfiltered: marks left by agents
//! stay sharp instead of being smeared by hardware interpolation.

use glam::UVec2;

/// Filter mode for field sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    /// Sharp nearest-neighbor filtering (default).
    #[default]
    Nearest,
    /// Linear filtering. Needs a filterable format, which `Rgba32Float` is not
    /// without `FLOAT32_FILTERABLE`.
    Linear,
}

impl FilterMode {
    pub(crate) fn to_wgpu(self) -> wgpu::FilterMode {
        match self {
            FilterMode::Nearest => wgpu::FilterMode::Nearest,
            FilterMode::Linear => wgpu::FilterMode::Linear,
        }
    }
}

/// Address mode for coordinates outside the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressMode {
    /// Wrap around on both axes (default).
    #[default]
    Repeat,
    /// Clamp to edge texels.
    ClampToEdge,
    /// Mirror at the boundaries.
    MirrorRepeat,
}

impl AddressMode {
    pub(crate) fn to_wgpu(self) -> wgpu::AddressMode {
        match self {
            AddressMode::Repeat => wgpu::AddressMode::Repeat,
            AddressMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
            AddressMode::MirrorRepeat => wgpu::AddressMode::MirrorRepeat,
        }
    }
}

/// Configuration shared by both field textures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldTextureConfig {
    /// Texture size in pixels.
    pub size: UVec2,
    /// Filter used when the display pass samples the field.
    pub filter: FilterMode,
    /// Addressing on both axes.
    pub address_mode: AddressMode,
}

impl FieldTextureConfig {
    /// Texel format of the field.
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

    /// Field of the given size with repeat addressing and nearest filtering.
    pub fn new(size: UVec2) -> Self {
        Self {
            size,
            filter: FilterMode::Nearest,
            address_mode: AddressMode::Repeat,
        }
    }

    /// Set the filter mode.
    pub fn with_filter(mut self, filter: FilterMode) -> Self {
        self.filter = filter;
        self
    }

    /// Set the address mode.
    pub fn with_address_mode(mut self, mode: AddressMode) -> Self {
        self.address_mode = mode;
        self
    }

    /// Extent of one field texture.
    pub fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.size.x,
            height: self.size.y,
            depth_or_array_layers: 1,
        }
    }

    /// Size of one texture in bytes.
    pub fn byte_size(&self) -> u64 {
        self.size.x as u64 * self.size.y as u64 * 16
    }

    /// Usages both ping-pong textures need: sampled, written from compute,
    /// and copied in either direction.
    pub fn usage() -> wgpu::TextureUsages {
        wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::STORAGE_BINDING
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST
    }

    pub(crate) fn sampler_descriptor(&self) -> wgpu::SamplerDescriptor<'static> {
        let address = self.address_mode.to_wgpu();
        let filter = self.filter.to_wgpu();
        wgpu::SamplerDescriptor {
            label: Some("Field Sampler"),
            address_mode_u: address,
            address_mode_v: address,
            address_mode_w: address,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        }
    }

    /// This configuration as far as `features` allow.
    ///
    /// Linear filtering of `Rgba32Float` needs `FLOAT32_FILTERABLE`; without
    /// it the field is sampled with nearest filtering instead.
    pub fn supported_by(self, features: wgpu::Features) -> Self {
        if self.is_filtering() && !features.contains(wgpu::Features::FLOAT32_FILTERABLE) {
            log::warn!("Device cannot filter Rgba32Float textures; using nearest filtering");
            return self.with_filter(FilterMode::Nearest);
        }
        self
    }

    /// Whether the display sampler filters.
    pub(crate) fn is_filtering(&self) -> bool {
        self.filter == FilterMode::Linear
    }
}
