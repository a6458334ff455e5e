use crate::denoiser::error::DenoiseError;

/// One named plane inside a planar float image. Offsets and strides are kept
/// in bytes, as the file format reports them; element arithmetic checks
/// divisibility.
#[derive(Debug, Clone)]
pub struct ChannelDesc {
    pub name: String,
    pub elem_width_bytes: usize,
    pub base_offset_bytes: usize,
    pub stride_x_bytes: usize,
    pub stride_y_bytes: usize,
}

impl ChannelDesc {
    pub fn base_offset_elems(&self) -> usize {
        debug_assert_eq!(self.base_offset_bytes % self.elem_width_bytes, 0);
        self.base_offset_bytes / self.elem_width_bytes
    }

    pub fn stride_x_elems(&self) -> usize {
        debug_assert_eq!(self.stride_x_bytes % self.elem_width_bytes, 0);
        self.stride_x_bytes / self.elem_width_bytes
    }

    pub fn stride_y_elems(&self) -> usize {
        debug_assert_eq!(self.stride_y_bytes % self.elem_width_bytes, 0);
        self.stride_y_bytes / self.elem_width_bytes
    }

    pub fn offset_elems(&self, x: usize, y: usize) -> usize {
        self.base_offset_elems() + x * self.stride_x_elems() + y * self.stride_y_elems()
    }
}

#[derive(Debug, Clone)]
pub struct ImageMeta {
    pub width: usize,
    pub height: usize,
    pub channels: Vec<ChannelDesc>,
}

impl ImageMeta {
    /// Metadata for a freshly built planar RGB image.
    pub fn rgb(width: usize, height: usize) -> Self {
        let elem = std::mem::size_of::<f32>();
        let channels = ["R", "G", "B"]
            .iter()
            .enumerate()
            .map(|(i, name)| ChannelDesc {
                name: (*name).to_string(),
                elem_width_bytes: elem,
                base_offset_bytes: i * elem * width * height,
                stride_x_bytes: elem,
                stride_y_bytes: elem * width,
            })
            .collect();
        Self {
            width,
            height,
            channels,
        }
    }

    pub fn total_pixels(&self) -> usize {
        self.width * self.height
    }

    pub fn storage_size(&self) -> usize {
        self.total_pixels() * self.channels.len()
    }

    /// Linear scan; channel lists are a handful of entries.
    pub fn find_channel_idx(&self, name: &str) -> Result<usize, DenoiseError> {
        self.channels
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| DenoiseError::ChannelMissing {
                name: name.to_string(),
            })
    }

    pub fn find_channel(&self, name: &str) -> Result<&ChannelDesc, DenoiseError> {
        Ok(&self.channels[self.find_channel_idx(name)?])
    }
}

/// Planar float image: all channel planes in one backing vector, addressed
/// through the channel directory.
pub struct GBuffer {
    pub meta: ImageMeta,
    pub data: Vec<f32>,
}

impl GBuffer {
    pub fn new(meta: ImageMeta) -> Self {
        let data = vec![0.0; meta.storage_size()];
        Self { meta, data }
    }

    pub fn sample(&self, channel: &ChannelDesc, x: usize, y: usize) -> f32 {
        self.data[channel.offset_elems(x, y)]
    }

    /// Contiguous view of one plane. Only meaningful for unit-x-stride,
    /// row-major channels; anything else is a programming error.
    pub fn channel_plane(&self, channel: &ChannelDesc) -> &[f32] {
        assert_eq!(channel.elem_width_bytes, std::mem::size_of::<f32>());
        assert_eq!(channel.stride_x_elems(), 1);
        assert_eq!(channel.stride_y_elems(), self.meta.width);
        &self.data[channel.base_offset_elems()..][..self.meta.total_pixels()]
    }

    pub fn put_channel_data(&mut self, channel: &ChannelDesc, newdata: &[f32]) {
        assert_eq!(channel.stride_x_elems(), 1);
        assert_eq!(channel.stride_y_elems(), self.meta.width);
        assert_eq!(newdata.len(), self.meta.total_pixels());
        let base = channel.base_offset_elems();
        self.data[base..base + newdata.len()].copy_from_slice(newdata);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_meta() -> ImageMeta {
        ImageMeta::rgb(4, 3)
    }

    #[test]
    fn offset_arithmetic_is_exact() {
        let meta = test_meta();
        let g = &meta.channels[1];
        assert_eq!(g.base_offset_elems(), 12);
        assert_eq!(g.stride_x_elems(), 1);
        assert_eq!(g.stride_y_elems(), 4);
        assert_eq!(g.offset_elems(2, 1), 12 + 2 + 4);
    }

    #[test]
    fn find_channel_by_name() {
        let meta = test_meta();
        assert_eq!(meta.find_channel_idx("R").unwrap(), 0);
        assert_eq!(meta.find_channel_idx("B").unwrap(), 2);
        assert_eq!(meta.find_channel("G").unwrap().base_offset_elems(), 12);
    }

    #[test]
    fn missing_channel_is_an_error() {
        let meta = test_meta();
        let err = meta.find_channel_idx("Albedo.R").unwrap_err();
        assert!(matches!(
            err,
            DenoiseError::ChannelMissing { name } if name == "Albedo.R"
        ));
    }

    #[test]
    fn storage_covers_all_planes() {
        let meta = test_meta();
        assert_eq!(meta.total_pixels(), 12);
        assert_eq!(meta.storage_size(), 36);
        assert_eq!(GBuffer::new(meta).data.len(), 36);
    }

    #[test]
    fn put_and_sample_roundtrip() {
        let mut image = GBuffer::new(test_meta());
        let plane: Vec<f32> = (0..12).map(|i| i as f32).collect();
        let channel = image.meta.find_channel("G").unwrap().clone();
        image.put_channel_data(&channel, &plane);

        assert_eq!(image.sample(&channel, 0, 0), 0.0);
        assert_eq!(image.sample(&channel, 3, 2), 11.0);
        assert_eq!(image.channel_plane(&channel), plane.as_slice());
        // Other planes untouched.
        let r = image.meta.find_channel("R").unwrap();
        assert!(image.channel_plane(r).iter().all(|&v| v == 0.0));
    }

    #[test]
    #[should_panic]
    fn plane_view_rejects_non_unit_stride() {
        let mut meta = test_meta();
        meta.channels[0].stride_x_bytes = 8;
        let image = GBuffer {
            data: vec![0.0; 36],
            meta,
        };
        let channel = image.meta.channels[0].clone();
        image.channel_plane(&channel);
    }
}
