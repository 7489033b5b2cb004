use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tern_renderer::{
    example_scene_by_name, parse_scene, read_scene_json, run_tests, CancelToken, FileResolver,
    ImageBuffer, Registry,
};

/// Render a scene description with the tern path tracer.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Scene file to render, or a built-in scene such as `example_scene0`
    scene: String,

    /// Output image. Without it the image is named after the scene plus a
    /// timestamp, and an EXR copy is written next to it
    #[arg(short, long)]
    outfile: Option<PathBuf>,

    /// Image format (png, jpg, bmp, tga or exr); overrides the extension
    #[arg(short, long)]
    format: Option<String>,

    /// Master random seed
    #[arg(short, long, default_value_t = 53)]
    seed: u64,

    /// Number of render threads; all cores when omitted
    #[arg(short, long)]
    threads: Option<usize>,

    /// Samples per pixel; overrides the scene's sampler
    #[arg(long)]
    spp: Option<u32>,

    /// Lowest severity shown: 0 trace, 1 debug, 2 info, 3 warn, 4 error,
    /// 5 critical, 6 off
    #[arg(short, long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(0..=6))]
    verbosity: u8,
}

const FORMATS: [&str; 5] = ["png", "jpg", "bmp", "tga", "exr"];

fn level_filter(verbosity: u8) -> log::LevelFilter {
    match verbosity {
        0 => log::LevelFilter::Trace,
        1 => log::LevelFilter::Debug,
        2 => log::LevelFilter::Info,
        3 => log::LevelFilter::Warn,
        4 | 5 => log::LevelFilter::Error,
        _ => log::LevelFilter::Off,
    }
}

/// Where the render is written.
#[derive(Debug, PartialEq)]
struct Output {
    path: PathBuf,
    format: String,
    /// Linear copy written when no output file was given
    exr_copy: Option<PathBuf>,
}

/// Pick the output paths and format from the flags and the scene name.
fn plan_output(args: &Args, timestamp: u64) -> Result<Output> {
    let from_extension = args
        .outfile
        .as_ref()
        .and_then(|p| p.extension())
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    let format = match (&args.format, from_extension) {
        (Some(f), _) => f.to_ascii_lowercase(),
        (None, Some(ext)) if ext == "jpeg" => "jpg".to_string(),
        (None, Some(ext)) => ext,
        (None, None) => "png".to_string(),
    };
    if !FORMATS.contains(&format.as_str()) {
        bail!("unsupported image format '{}', expected one of {:?}", format, FORMATS);
    }

    if let Some(outfile) = &args.outfile {
        return Ok(Output {
            path: outfile.with_extension(&format),
            format,
            exr_copy: None,
        });
    }

    let base = Path::new(&args.scene).with_extension("");
    let named = |ext: &str| {
        let mut name = OsString::from(base.as_os_str());
        name.push(format!("-{timestamp}.{ext}"));
        PathBuf::from(name)
    };
    Ok(Output {
        path: named(&format),
        exr_copy: (format != "exr").then(|| named("exr")),
        format,
    })
}

fn save_image(image: &ImageBuffer, path: &Path, format: &str) -> Result<()> {
    log::info!("Writing {}", path.display());
    let result = if format == "exr" {
        image.to_rgb32f().save(path)
    } else {
        image.to_rgb8().save(path)
    };
    result.with_context(|| format!("Failed to write {}", path.display()))
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(level_filter(args.verbosity))
        .parse_default_env()
        .init();

    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to configure the render thread pool")?;
    }

    let start = Instant::now();
    let registry = Registry::with_builtins()?;
    let (j, resolver) = match example_scene_by_name(&args.scene) {
        Some(j) => (j, FileResolver::new()),
        None => read_scene_json(&args.scene)
            .with_context(|| format!("Failed to read scene '{}'", args.scene))?,
    };

    if let Some(report) = run_tests(&j, &registry, &resolver)? {
        if !report.all_passed() {
            bail!("Failed {}/{} tests", report.failures.len(), report.total);
        }
        return Ok(());
    }

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());
    let output = plan_output(&args, timestamp)?;

    let mut scene = parse_scene(&j, &registry, resolver)
        .with_context(|| format!("Failed to load scene '{}'", args.scene))?;
    log::info!("Scene loaded in {:.2?}", start.elapsed());

    let config = scene.config_mut();
    config.seed = args.seed;
    if let Some(spp) = args.spp {
        config.samples_per_pixel = spp.max(1);
    }

    let image = scene
        .raytrace(&CancelToken::new())
        .context("Render failed")?;

    save_image(&image, &output.path, &output.format)?;
    if let Some(exr) = &output.exr_copy {
        save_image(&image, exr, "exr")?;
    }
    log::info!("Done in {:.2?}", start.elapsed());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["tern"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_defaults() {
        let a = args(&["scenes/cornell.json"]);
        assert_eq!(a.seed, 53);
        assert_eq!(a.verbosity, 2);
        assert_eq!(level_filter(a.verbosity), log::LevelFilter::Info);
    }

    #[test]
    fn test_default_output_is_timestamped_with_exr_copy() {
        let output = plan_output(&args(&["scenes/cornell.json"]), 1700000000).unwrap();
        assert_eq!(
            output,
            Output {
                path: PathBuf::from("scenes/cornell-1700000000.png"),
                format: "png".to_string(),
                exr_copy: Some(PathBuf::from("scenes/cornell-1700000000.exr")),
            }
        );

        // Consecutive renders do not overwrite each other.
        let later = plan_output(&args(&["scenes/cornell.json"]), 1700000001).unwrap();
        assert_ne!(output.path, later.path);

        let output = plan_output(&args(&["example_scene3", "-f", "exr"]), 5).unwrap();
        assert_eq!(output.path, PathBuf::from("example_scene3-5.exr"));
        assert_eq!(output.exr_copy, None);
    }

    #[test]
    fn test_explicit_outfile() {
        let output = plan_output(&args(&["s.json", "-o", "out/image.exr"]), 0).unwrap();
        assert_eq!(output.path, PathBuf::from("out/image.exr"));
        assert_eq!(output.format, "exr");
        assert_eq!(output.exr_copy, None);

        let output = plan_output(&args(&["s.json", "-o", "a.png", "-f", "jpg"]), 0).unwrap();
        assert_eq!(output.path, PathBuf::from("a.jpg"));
        assert_eq!(output.format, "jpg");

        assert!(plan_output(&args(&["s.json", "-f", "gif"]), 0).is_err());
    }

    #[test]
    fn test_verbosity_scale() {
        assert_eq!(level_filter(0), log::LevelFilter::Trace);
        assert_eq!(level_filter(3), log::LevelFilter::Warn);
        assert_eq!(level_filter(5), log::LevelFilter::Error);
        assert_eq!(level_filter(6), log::LevelFilter::Off);
        assert!(Args::try_parse_from(["tern", "s.json", "-v", "7"]).is_err());
    }
}
