//! Loads a multi-channel OpenEXR file into a planar [`GBuffer`].
//!
//! Every kept channel must be single-precision float and share the layer's
//! data window; planes land back-to-back in channel-directory order.

use std::path::Path;

use exr::prelude::*;

use crate::denoiser::error::DenoiseError;
use crate::denoiser::gbuffer::{ChannelDesc, GBuffer, ImageMeta};

/// Load only the channels `keep` accepts; everything else is ignored
/// entirely, including its pixel type.
pub fn load_exr(
    path: &Path,
    keep: impl Fn(&str) -> bool,
) -> std::result::Result<GBuffer, DenoiseError> {
    let image = read()
        .no_deep_data()
        .largest_resolution_level()
        .all_channels()
        .first_valid_layer()
        .all_attributes()
        .from_file(path)
        .map_err(|source| DenoiseError::Exr {
            path: path.to_path_buf(),
            source,
        })?;

    let layer = &image.layer_data;
    let width = layer.size.0;
    let height = layer.size.1;
    let total_pixels = width * height;

    let elem = std::mem::size_of::<f32>();
    let mut meta = ImageMeta {
        width,
        height,
        channels: Vec::new(),
    };
    let mut planes: Vec<&[f32]> = Vec::new();

    for channel in &layer.channel_data.list {
        let name = channel.name.to_string();
        if !keep(&name) {
            continue;
        }
        let FlatSamples::F32(values) = &channel.sample_data else {
            return Err(DenoiseError::ChannelType {
                name,
                path: path.to_path_buf(),
            });
        };

        meta.channels.push(ChannelDesc {
            name,
            elem_width_bytes: elem,
            base_offset_bytes: meta.channels.len() * elem * total_pixels,
            stride_x_bytes: elem,
            stride_y_bytes: elem * width,
        });
        planes.push(values);
    }

    if meta.channels.is_empty() {
        return Err(DenoiseError::NoChannels {
            path: path.to_path_buf(),
        });
    }

    let mut data = Vec::with_capacity(meta.storage_size());
    for plane in planes {
        data.extend_from_slice(plane);
    }

    tracing::info!(
        path = %path.display(),
        width,
        height,
        channels = meta.channels.len(),
        "loaded EXR g-buffer"
    );
    Ok(GBuffer { meta, data })
}
