//! Packs planar g-buffer channels into the arena-resident working buffers
//! the kernel reads: contiguous planes, or pixel-interleaved groups.

use crate::denoiser::arena::MemoryArena;
use crate::denoiser::error::DenoiseError;
use crate::denoiser::gbuffer::{ChannelDesc, GBuffer};

/// Copy one plane contiguously into a fresh arena span.
pub fn upload_channel<'a>(
    arena: &'a MemoryArena,
    offset_bytes: usize,
    image: &GBuffer,
    channel: &ChannelDesc,
) -> Result<&'a mut [f32], DenoiseError> {
    let plane = image.channel_plane(channel);
    let span = arena.allocate::<f32>(offset_bytes, plane.len())?;
    span.copy_from_slice(plane);
    tracing::debug!(channel = %channel.name, elems = span.len(), "uploaded channel plane");
    Ok(span)
}

/// Copy several planes into one span, interleaved per pixel in the given
/// channel order. Used for normals always, and for colour and albedo when
/// the kernel runs in its RGB-triple layout.
pub fn upload_channels_interleave<'a>(
    arena: &'a MemoryArena,
    offset_bytes: usize,
    image: &GBuffer,
    channels: &[&ChannelDesc],
) -> Result<&'a mut [f32], DenoiseError> {
    let channel_pixels = image.meta.total_pixels();
    let planes: Vec<&[f32]> = channels.iter().map(|c| image.channel_plane(c)).collect();
    let span = arena.allocate::<f32>(offset_bytes, channel_pixels * planes.len())?;

    let mut offset = 0;
    for i in 0..channel_pixels {
        for plane in &planes {
            span[offset] = plane[i];
            offset += 1;
        }
    }
    assert_eq!(offset, span.len());

    tracing::debug!(
        channels = %channels.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", "),
        elems = span.len(),
        "interleaved channel planes"
    );
    Ok(span)
}
