use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;

use crate::denoiser::arena::MemoryArena;
use crate::denoiser::error::DenoiseError;
use crate::denoiser::exporter;
use crate::denoiser::gbuffer::{ChannelDesc, GBuffer, ImageMeta};
use crate::denoiser::kernel::{self, PlanarStreams, RgbStreams};
use crate::denoiser::layout;
use crate::denoiser::loader;

const COLOR_CHANNELS: [&str; 3] = ["R", "G", "B"];
const ALBEDO_CHANNELS: [&str; 3] = ["Albedo.R", "Albedo.G", "Albedo.B"];
const NORMAL_CHANNELS: [&str; 3] = ["Ns.X", "Ns.Y", "Ns.Z"];

const BENCH_PASSES: usize = 10;

#[derive(Parser, Debug)]
#[command(
    name = "denoiser",
    about = "Edge-preserving cross-bilateral denoiser for path-traced g-buffers"
)]
pub struct Args {
    /// Input OpenEXR g-buffer with R/G/B, Albedo.* and Ns.* float channels
    pub input: PathBuf,

    /// Run the planar kernel variant (one pass per colour plane)
    #[arg(long)]
    pub planar: bool,

    /// Also write every input channel as a grayscale PNG
    #[arg(long)]
    pub dump_channels: bool,

    /// Prefault the arena mapping before filtering
    #[arg(long)]
    pub prefault: bool,

    /// Filter the frame repeatedly and report per-pass throughput
    #[arg(long)]
    pub benchmark: bool,

    /// Output directory
    #[arg(long, default_value = "out")]
    pub out_dir: PathBuf,
}

fn is_required_channel(name: &str) -> bool {
    COLOR_CHANNELS.contains(&name)
        || ALBEDO_CHANNELS.contains(&name)
        || NORMAL_CHANNELS.contains(&name)
}

fn find_channels<'a>(
    meta: &'a ImageMeta,
    names: [&str; 3],
) -> Result<[&'a ChannelDesc; 3], DenoiseError> {
    Ok([
        meta.find_channel(names[0])?,
        meta.find_channel(names[1])?,
        meta.find_channel(names[2])?,
    ])
}

/// Split an `RGB RGB ...` stream back into the planes of an RGB image.
fn deinterleave3(image: &mut GBuffer, src: &[f32]) {
    let total = image.meta.total_pixels();
    assert_eq!(src.len(), 3 * total);
    for k in 0..3 {
        let channel = image.meta.channels[k].clone();
        let plane: Vec<f32> = (0..total).map(|i| src[3 * i + k]).collect();
        image.put_channel_data(&channel, &plane);
    }
}

fn report_throughput(meta: &ImageMeta, elapsed: Duration) {
    let mpix_per_s = meta.total_pixels() as f64 / elapsed.as_secs_f64() / 1e6;
    println!(
        "{}x{}: {:.3} ms, {:.1} Mpix/s",
        meta.width,
        meta.height,
        elapsed.as_secs_f64() * 1e3,
        mpix_per_s
    );
}

pub fn run(args: &Args) -> Result<(), DenoiseError> {
    let gbuf = loader::load_exr(&args.input, is_required_channel)?;

    let color_channels = find_channels(&gbuf.meta, COLOR_CHANNELS)?;
    let albedo_channels = find_channels(&gbuf.meta, ALBEDO_CHANNELS)?;
    let normal_channels = find_channels(&gbuf.meta, NORMAL_CHANNELS)?;

    std::fs::create_dir_all(&args.out_dir).map_err(|source| DenoiseError::CreateDir {
        path: args.out_dir.clone(),
        source,
    })?;
    if args.dump_channels {
        exporter::dump_channel_pngs(&args.out_dir, &gbuf)?;
    }

    let arena = MemoryArena::new()?;
    if args.prefault {
        let timer = Instant::now();
        arena.prefault();
        tracing::info!(ms = timer.elapsed().as_millis() as u64, "prefaulted arena");
    }

    // Normals always go through interleaved: one fetch per tap serves all
    // three channel updates.
    let normals = layout::upload_channels_interleave(&arena, 128, &gbuf, &normal_channels)?;

    let passes = if args.benchmark { BENCH_PASSES } else { 1 };
    if args.planar {
        run_planar(args, &gbuf, &arena, normals, color_channels, albedo_channels, passes)
    } else {
        run_rgb(args, &gbuf, &arena, normals, color_channels, albedo_channels, passes)
    }
}

fn run_rgb(
    args: &Args,
    gbuf: &GBuffer,
    arena: &MemoryArena,
    normals: &[f32],
    color_channels: [&ChannelDesc; 3],
    albedo_channels: [&ChannelDesc; 3],
    passes: usize,
) -> Result<(), DenoiseError> {
    let total = gbuf.meta.total_pixels();

    let color = layout::upload_channels_interleave(arena, 0, gbuf, &color_channels)?;
    let albedo = layout::upload_channels_interleave(arena, 0, gbuf, &albedo_channels)?;
    let dst = arena.allocate::<f32>(192, 3 * total)?;
    let z = arena.allocate::<f32>(0, 3 * total)?;

    for _ in 0..passes {
        let timer = Instant::now();
        kernel::filter_rgb(
            &gbuf.meta,
            RgbStreams {
                dst: &mut dst[..],
                color: &color[..],
                albedo: &albedo[..],
                normals,
                z: &mut z[..],
            },
        );
        report_throughput(&gbuf.meta, timer.elapsed());
    }

    let (w, h) = (gbuf.meta.width, gbuf.meta.height);
    let mut in_image = GBuffer::new(ImageMeta::rgb(w, h));
    let mut out_image = GBuffer::new(ImageMeta::rgb(w, h));
    deinterleave3(&mut in_image, color);
    deinterleave3(&mut out_image, dst);
    exporter::write_png_rgb(&args.out_dir.join("in.png"), &in_image)?;
    exporter::write_png_rgb(&args.out_dir.join("out.png"), &out_image)?;
    Ok(())
}

fn run_planar(
    args: &Args,
    gbuf: &GBuffer,
    arena: &MemoryArena,
    normals: &[f32],
    color_channels: [&ChannelDesc; 3],
    albedo_channels: [&ChannelDesc; 3],
    passes: usize,
) -> Result<(), DenoiseError> {
    let total = gbuf.meta.total_pixels();

    let mut color_planes = Vec::with_capacity(3);
    let mut albedo_planes = Vec::with_capacity(3);
    let mut dst_planes = Vec::with_capacity(3);
    for k in 0..3 {
        color_planes.push(layout::upload_channel(arena, 0, gbuf, color_channels[k])?);
        albedo_planes.push(layout::upload_channel(arena, 64, gbuf, albedo_channels[k])?);
        dst_planes.push(arena.allocate::<f32>(192, total)?);
    }
    // One shared scratch plane; each colour pass rewrites it fully.
    let z = arena.allocate::<f32>(0, total)?;

    for _ in 0..passes {
        let timer = Instant::now();
        for k in 0..3 {
            kernel::filter_planar(
                &gbuf.meta,
                PlanarStreams {
                    dst: &mut dst_planes[k][..],
                    color: &color_planes[k][..],
                    albedo: &albedo_planes[k][..],
                    normals,
                    z: &mut z[..],
                },
            );
        }
        report_throughput(&gbuf.meta, timer.elapsed());
    }

    let (w, h) = (gbuf.meta.width, gbuf.meta.height);
    let mut in_image = GBuffer::new(ImageMeta::rgb(w, h));
    let mut out_image = GBuffer::new(ImageMeta::rgb(w, h));
    for k in 0..3 {
        let channel = in_image.meta.channels[k].clone();
        in_image.put_channel_data(&channel, &color_planes[k][..]);
        out_image.put_channel_data(&channel, &dst_planes[k][..]);
    }
    exporter::write_png_rgb(&args.out_dir.join("in.png"), &in_image)?;
    exporter::write_png_rgb(&args.out_dir.join("out.png"), &out_image)?;
    Ok(())
}
