//! Core path tracing renderer.
//!
//! Implements Monte Carlo path tracing with:
//! - Bucketed rendering on the rayon pool
//! - Per-bucket deterministic random streams
//! - Gamma correction on output

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rand::RngCore;
use rayon::prelude::*;
use tern_math::Vec2;

use crate::bucket::{generate_buckets, render_bucket, DEFAULT_BUCKET_SIZE};
use crate::error::{RenderError, RenderResult};
use crate::integrator::DEFAULT_MAX_DEPTH;
use crate::material::Color;
use crate::sampling::gen_f32;
use crate::scene::Scene;
use crate::stats::{self, Counter, RenderStats};

/// Default master seed.
pub const DEFAULT_SEED: u64 = 53;

/// Render configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    /// Samples per pixel for anti-aliasing
    pub samples_per_pixel: u32,
    /// Maximum ray bounce depth
    pub max_depth: u32,
    /// Bucket edge length in pixels
    pub bucket_size: u32,
    /// Master seed, mixed with bucket coordinates
    pub seed: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            samples_per_pixel: 1,
            max_depth: DEFAULT_MAX_DEPTH,
            bucket_size: DEFAULT_BUCKET_SIZE,
            seed: DEFAULT_SEED,
        }
    }
}

/// Cooperative cancellation flag shared between the caller and workers.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Apply gamma correction (gamma = 2.2).
#[inline]
pub fn linear_to_gamma(linear: f32) -> f32 {
    if linear > 0.0 {
        linear.powf(1.0 / 2.2)
    } else {
        0.0
    }
}

/// Clamp a value to [0, 1] range.
#[inline]
pub fn clamp_01(x: f32) -> f32 {
    x.clamp(0.0, 1.0)
}

/// Convert a linear color to gamma-encoded 8-bit RGB.
pub fn color_to_rgb(color: Color) -> [u8; 3] {
    let encode = |c: f32| (255.0 * clamp_01(linear_to_gamma(c)) + 0.5) as u8;
    [encode(color.x), encode(color.y), encode(color.z)]
}

/// Average of `samples_per_pixel` jittered radiance estimates for pixel (x, y).
pub fn render_pixel(scene: &Scene, x: u32, y: u32, rng: &mut dyn RngCore) -> Color {
    let config = scene.config();
    let integrator = scene.integrator();
    let spp = config.samples_per_pixel.max(1);

    let mut pixel_color = Color::ZERO;
    for _ in 0..spp {
        let pixel = Vec2::new(x as f32 + gen_f32(rng), y as f32 + gen_f32(rng));
        let ray = scene.camera().generate_ray(pixel, rng);
        pixel_color += integrator.sample(scene.root(), scene.background(), &ray, rng);
    }
    stats::add(Counter::PixelSamples, spp as u64);

    pixel_color / spp as f32
}

/// Linear RGB image storing render output.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Color>,
}

impl ImageBuffer {
    /// Create a new image buffer filled with black.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Color::ZERO; width as usize * height as usize],
        }
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Get the pixel at (x, y).
    pub fn get(&self, x: u32, y: u32) -> Color {
        self.pixels[self.offset(x, y)]
    }

    /// Set the pixel at (x, y).
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        let i = self.offset(x, y);
        self.pixels[i] = color;
    }

    /// Gamma-encoded 8-bit image for PNG, JPEG and friends.
    pub fn to_rgb8(&self) -> image::RgbImage {
        image::RgbImage::from_fn(self.width, self.height, |x, y| {
            image::Rgb(color_to_rgb(self.get(x, y)))
        })
    }

    /// Linear floating point image for EXR.
    pub fn to_rgb32f(&self) -> image::Rgb32FImage {
        image::Rgb32FImage::from_fn(self.width, self.height, |x, y| {
            image::Rgb(self.get(x, y).to_array())
        })
    }
}

/// Render the entire scene to an image buffer.
///
/// Buckets render in parallel; their pixels are copied into the image on
/// the calling thread once all of them are done.
pub fn render(scene: &Scene, cancel: &CancelToken) -> RenderResult<(ImageBuffer, RenderStats)> {
    let (width, height) = scene.camera().resolution();
    let config = scene.config();
    let buckets = generate_buckets(width, height, config.bucket_size);
    let total = buckets.len();

    log::info!(
        "Rendering {}x{} at {} spp in {} buckets on {} threads",
        width,
        height,
        config.samples_per_pixel,
        total,
        rayon::current_num_threads()
    );
    let start = Instant::now();
    let done = AtomicUsize::new(0);

    let results: Vec<_> = buckets
        .par_iter()
        .map(|bucket| {
            if cancel.is_cancelled() {
                return None;
            }
            let result = render_bucket(bucket, scene, config.seed, cancel)?;

            let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
            if finished * 10 / total > (finished - 1) * 10 / total {
                log::info!("{}% done ({}/{} buckets)", finished * 100 / total, finished, total);
            }
            Some(result)
        })
        .collect();

    if cancel.is_cancelled() {
        log::warn!("Render cancelled after {:.2?}", start.elapsed());
        return Err(RenderError::Cancelled);
    }

    let mut image = ImageBuffer::new(width, height);
    let mut stats = RenderStats::default();
    for result in results {
        let result = result.ok_or(RenderError::Cancelled)?;
        let b = result.bucket;
        for (i, color) in result.pixels.into_iter().enumerate() {
            let i = i as u32;
            image.set(b.x + i % b.width, b.y + i / b.width, color);
        }
        stats += result.stats;
    }

    log::info!("Render finished in {:.2?}", start.elapsed());
    log::info!("{}", stats);
    Ok((image, stats))
}
