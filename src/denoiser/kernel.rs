//! Edge-preserving cross-bilateral filter over albedo-demodulated radiance.
//!
//! Around every pixel, four triangular fans grow outward along the cardinal
//! directions; ring `i` of a fan holds taps `(i, j)` for `j in -i..i`. A tap
//! contributes a weight combining a spatial Gaussian with an intensity
//! Gaussian over the demodulated signal `z = color / albedo`, but only while
//! the guiding normals along the direction stay similar: a direction dies as
//! soon as the dot product against the running spine normal drops below
//! `COS_MIN`, or (from the second ring) evolves faster than `MONOTONE_RATIO`
//! allows. The final store fuses remodulation: `dst = albedo * value / weight`.
//!
//! Two layouts implement the same algorithm: a planar variant filtering one
//! scalar plane per call, and an RGB-triple variant that pays one normal
//! fetch per tap for three channel updates.

use glam::Vec3;
use rayon::prelude::*;

use crate::denoiser::fastexp::approx_exp;
use crate::denoiser::gbuffer::ImageMeta;

pub const RADIUS: i32 = 3;

const COS_MIN: f32 = 0.7;
const MONOTONE_RATIO: f32 = 1.01;
const DIST_SCALE: f32 = -1.0 / (1.0 + 2.0 * RADIUS as f32);
const INTENSITY_SCALE: f32 = -1.0 / 25.0;

/// Origins per rayon work item in the main pass.
const TILE_PIXELS: usize = 4096;

/// Band at each end of the linear pixel range that the kernel never writes.
/// Any origin past it has all taps in bounds: the largest tap offset
/// magnitude is `RADIUS * (width + 1)`.
pub fn redzone(width: usize) -> usize {
    RADIUS as usize * (width + 1)
}

/// Fan-local `(i, j)` to image-space `(dx, dy)`, one case per direction.
#[inline]
fn rotate(direction: u32, i: i32, j: i32) -> (i32, i32) {
    match direction {
        0 => (i, j),
        1 => (j, -i),
        2 => (-i, -j),
        _ => (-j, i),
    }
}

#[inline]
fn shift(origin: usize, width: usize, dx: i32, dy: i32) -> usize {
    (origin as isize + dy as isize * width as isize + dx as isize) as usize
}

#[inline]
fn normal_at(normals: &[f32], p: usize) -> Vec3 {
    Vec3::new(normals[3 * p], normals[3 * p + 1], normals[3 * p + 2])
}

#[inline]
fn rgb_at(buf: &[f32], p: usize) -> Vec3 {
    Vec3::new(buf[3 * p], buf[3 * p + 1], buf[3 * p + 2])
}

/// Working buffers for the RGB-triple layout: colour, albedo, `z` and `dst`
/// interleaved `RGB RGB ...`, normals interleaved `xyz xyz ...`.
pub struct RgbStreams<'a> {
    pub dst: &'a mut [f32],
    pub color: &'a [f32],
    pub albedo: &'a [f32],
    pub normals: &'a [f32],
    pub z: &'a mut [f32],
}

/// Working buffers for the planar layout: one scalar plane per call, normals
/// shared and always interleaved.
pub struct PlanarStreams<'a> {
    pub dst: &'a mut [f32],
    pub color: &'a [f32],
    pub albedo: &'a [f32],
    pub normals: &'a [f32],
    pub z: &'a mut [f32],
}

pub fn filter_rgb(meta: &ImageMeta, streams: RgbStreams<'_>) {
    let total = meta.total_pixels();
    let width = meta.width;
    assert_eq!(streams.dst.len(), 3 * total);
    assert_eq!(streams.color.len(), 3 * total);
    assert_eq!(streams.albedo.len(), 3 * total);
    assert_eq!(streams.normals.len(), 3 * total);
    assert_eq!(streams.z.len(), 3 * total);

    let RgbStreams {
        dst,
        color,
        albedo,
        normals,
        z,
    } = streams;

    for ((z, &c), &a) in z.iter_mut().zip(color).zip(albedo) {
        *z = c / a;
    }
    let z: &[f32] = z;

    let redzone = redzone(width);
    if total <= 2 * redzone {
        return;
    }

    dst[3 * redzone..3 * (total - redzone)]
        .par_chunks_mut(3 * TILE_PIXELS)
        .enumerate()
        .for_each(|(chunk_idx, chunk)| {
            let base = redzone + chunk_idx * TILE_PIXELS;
            for (k, out) in chunk.chunks_exact_mut(3).enumerate() {
                let filtered = filter_origin_rgb(width, base + k, z, normals, albedo);
                out[0] = filtered.x;
                out[1] = filtered.y;
                out[2] = filtered.z;
            }
        });
}

pub fn filter_planar(meta: &ImageMeta, streams: PlanarStreams<'_>) {
    let total = meta.total_pixels();
    let width = meta.width;
    assert_eq!(streams.dst.len(), total);
    assert_eq!(streams.color.len(), total);
    assert_eq!(streams.albedo.len(), total);
    assert_eq!(streams.normals.len(), 3 * total);
    assert_eq!(streams.z.len(), total);

    let PlanarStreams {
        dst,
        color,
        albedo,
        normals,
        z,
    } = streams;

    for ((z, &c), &a) in z.iter_mut().zip(color).zip(albedo) {
        *z = c / a;
    }
    let z: &[f32] = z;

    let redzone = redzone(width);
    if total <= 2 * redzone {
        return;
    }

    dst[redzone..total - redzone]
        .par_chunks_mut(TILE_PIXELS)
        .enumerate()
        .for_each(|(chunk_idx, chunk)| {
            let base = redzone + chunk_idx * TILE_PIXELS;
            for (k, out) in chunk.iter_mut().enumerate() {
                *out = filter_origin_planar(width, base + k, z, normals, albedo);
            }
        });
}

#[inline]
fn filter_origin_rgb(
    width: usize,
    origin: usize,
    z: &[f32],
    normals: &[f32],
    albedo: &[f32],
) -> Vec3 {
    let zorigin = rgb_at(z, origin);
    let norigin = normal_at(normals, origin);
    let mut value = zorigin;
    let mut weight = Vec3::ONE;

    for direction in 0..4 {
        let mut nprev = norigin;
        let mut ndotprev = 0.0f32;

        'fan: for i in 1..=RADIUS {
            for j in -i..i {
                let (dx, dy) = rotate(direction, i, j);
                let offset = shift(origin, width, dx, dy);

                let nhere = normal_at(normals, offset);
                let ndot = nprev.dot(nhere);
                if ndot < COS_MIN
                    || (i > 1
                        && (ndot > ndotprev * MONOTONE_RATIO || ndotprev > ndot * MONOTONE_RATIO))
                {
                    break 'fan;
                }

                let gdist = (((i * i + j * j) as f32) * DIST_SCALE).exp();

                let zhere = rgb_at(z, offset);
                let diff = zhere - zorigin;
                let gintensity = Vec3::new(
                    approx_exp(diff.x * diff.x * INTENSITY_SCALE),
                    approx_exp(diff.y * diff.y * INTENSITY_SCALE),
                    approx_exp(diff.z * diff.z * INTENSITY_SCALE),
                );

                let factor = gintensity * gdist;
                value += zhere * factor;
                weight += factor;

                // The running spine normal advances only on the central tap
                // of each ring, not across a ring's sideways taps.
                if j == 0 {
                    nprev = nhere;
                    ndotprev = ndot;
                }
            }
        }
    }

    rgb_at(albedo, origin) * value / weight
}

#[inline]
fn filter_origin_planar(
    width: usize,
    origin: usize,
    z: &[f32],
    normals: &[f32],
    albedo: &[f32],
) -> f32 {
    let zorigin = z[origin];
    let norigin = normal_at(normals, origin);
    let mut value = zorigin;
    let mut weight = 1.0f32;

    for direction in 0..4 {
        let mut nprev = norigin;
        let mut ndotprev = 0.0f32;

        'fan: for i in 1..=RADIUS {
            for j in -i..i {
                let (dx, dy) = rotate(direction, i, j);
                let offset = shift(origin, width, dx, dy);

                let nhere = normal_at(normals, offset);
                let ndot = nprev.dot(nhere);
                if ndot < COS_MIN
                    || (i > 1
                        && (ndot > ndotprev * MONOTONE_RATIO || ndotprev > ndot * MONOTONE_RATIO))
                {
                    break 'fan;
                }

                let gdist = (((i * i + j * j) as f32) * DIST_SCALE).exp();

                let zhere = z[offset];
                let diff = zhere - zorigin;
                let gintensity = approx_exp(diff * diff * INTENSITY_SCALE);

                let factor = gdist * gintensity;
                value += zhere * factor;
                weight += factor;

                if j == 0 {
                    nprev = nhere;
                    ndotprev = ndot;
                }
            }
        }
    }

    albedo[origin] * value / weight
}
