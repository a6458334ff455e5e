//! 8-bit PNG output. Pixel mapping is a bare `clamp(f, 0, 1) * 255` with a
//! truncating cast; the tool works in the renderer's linear space and does
//! no colour conversion.

use std::path::Path;

use image::{GrayImage, Luma, Rgb, RgbImage};
use rayon::prelude::*;

use crate::denoiser::error::DenoiseError;
use crate::denoiser::gbuffer::GBuffer;

#[inline]
pub fn tonemap_u8(f: f32) -> u8 {
    (f.clamp(0.0, 1.0) * 255.0) as u8
}

/// Write a planar image's R/G/B channels as one interleaved PNG.
pub fn write_png_rgb(path: &Path, image: &GBuffer) -> Result<(), DenoiseError> {
    let r = image.meta.find_channel("R")?;
    let g = image.meta.find_channel("G")?;
    let b = image.meta.find_channel("B")?;

    let img = RgbImage::from_fn(
        image.meta.width as u32,
        image.meta.height as u32,
        |x, y| {
            let (x, y) = (x as usize, y as usize);
            Rgb([
                tonemap_u8(image.sample(r, x, y)),
                tonemap_u8(image.sample(g, x, y)),
                tonemap_u8(image.sample(b, x, y)),
            ])
        },
    );
    img.save(path).map_err(|source| DenoiseError::ImageWrite {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), "wrote RGB image");
    Ok(())
}

pub fn write_grayscale(
    path: &Path,
    width: usize,
    height: usize,
    plane: &[f32],
) -> Result<(), DenoiseError> {
    assert_eq!(plane.len(), width * height);
    let img = GrayImage::from_fn(width as u32, height as u32, |x, y| {
        Luma([tonemap_u8(plane[y as usize * width + x as usize])])
    });
    img.save(path).map_err(|source| DenoiseError::ImageWrite {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), "wrote grayscale image");
    Ok(())
}

/// Dump every channel of the g-buffer as a grayscale PNG named after it.
pub fn dump_channel_pngs(dir: &Path, image: &GBuffer) -> Result<(), DenoiseError> {
    image.meta.channels.par_iter().try_for_each(|channel| {
        let plane = image.channel_plane(channel);
        let path = dir.join(format!("{}.png", channel.name));
        write_grayscale(&path, image.meta.width, image.meta.height, plane)
    })
}
