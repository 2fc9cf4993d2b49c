use anyhow::{anyhow, bail, Context, Result};
use autocapture::overlay::draw_detection;
use autocapture::quality::CaptureStabilityTracker;
use autocapture::testing::synthetic_data::{row_major_output, ReplayDetector};
use autocapture::{
    AlignmentScorer, AutoCaptureConfig, BoundingBox, CropExtractor, Detection, DetectionDecoder,
    Frame, GeometryContext, ModelOutput, OutputLayout, ScanSession, TickOutcome,
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    autocapture::init_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: autocapture-cli <command> [args]");
        eprintln!("Commands: score, decode, crop, overlay, simulate, init-config");
        if cfg!(feature = "camera") {
            eprintln!("Camera commands: cameras, snapshot");
        }
        std::process::exit(1);
    }

    let command = &args[1];
    match command.as_str() {
        "score" => cmd_score(&args),
        "decode" => cmd_decode(&args),
        "crop" => cmd_crop(&args),
        "overlay" => cmd_overlay(&args),
        "simulate" => cmd_simulate(&args),
        "init-config" => cmd_init_config(&args),
        #[cfg(feature = "camera")]
        "cameras" => cmd_cameras(),
        #[cfg(feature = "camera")]
        "snapshot" => cmd_snapshot(&args),
        _ => {
            eprintln!("Unknown command: {}", command);
            std::process::exit(1);
        }
    }
}

/// Positional arguments and flags shared by every command.
struct ParsedArgs {
    positional: Vec<String>,
    json: bool,
    config: Option<PathBuf>,
    out: Option<PathBuf>,
    layout: Option<OutputLayout>,
    frames: usize,
    confidence: f32,
}

fn parse_args(args: &[String]) -> Result<ParsedArgs> {
    let mut parsed = ParsedArgs {
        positional: Vec::new(),
        json: false,
        config: None,
        out: None,
        layout: None,
        frames: 5,
        confidence: 0.9,
    };

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--json" => parsed.json = true,
            "--config" => {
                i += 1;
                parsed.config = Some(PathBuf::from(flag_value(args, i, "--config")?));
            }
            "--out" => {
                i += 1;
                parsed.out = Some(PathBuf::from(flag_value(args, i, "--out")?));
            }
            "--layout" => {
                i += 1;
                parsed.layout = Some(match flag_value(args, i, "--layout")? {
                    "row" => OutputLayout::RowMajor,
                    "column" => OutputLayout::ColumnMajor,
                    other => bail!("unknown layout '{}', expected row or column", other),
                });
            }
            "--frames" => {
                i += 1;
                parsed.frames = flag_value(args, i, "--frames")?.parse()?;
            }
            "--confidence" => {
                i += 1;
                parsed.confidence = flag_value(args, i, "--confidence")?.parse()?;
            }
            other => parsed.positional.push(other.to_string()),
        }
        i += 1;
    }
    Ok(parsed)
}

fn flag_value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str> {
    args.get(i)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("{} requires a value", flag))
}

fn load_config(parsed: &ParsedArgs) -> Result<AutoCaptureConfig> {
    match &parsed.config {
        Some(path) => AutoCaptureConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display())),
        None => Ok(AutoCaptureConfig::load_or_default()),
    }
}

fn positional<T: std::str::FromStr>(parsed: &ParsedArgs, index: usize, name: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = parsed
        .positional
        .get(index)
        .ok_or_else(|| anyhow!("missing <{}>", name))?;
    raw.parse::<T>()
        .with_context(|| format!("invalid <{}>: {}", name, raw))
}

/// `<x> <y> <w> <h>` starting at `index`
fn parse_box(parsed: &ParsedArgs, index: usize) -> Result<BoundingBox> {
    Ok(BoundingBox::new(
        positional(parsed, index, "x")?,
        positional(parsed, index + 1, "y")?,
        positional(parsed, index + 2, "w")?,
        positional(parsed, index + 3, "h")?,
    ))
}

fn load_frame(path: &Path) -> Result<Frame> {
    let image = image::open(path)
        .with_context(|| format!("opening {}", path.display()))?
        .to_rgb8();
    Ok(Frame::from_image(image))
}

fn detection_for(bbox: BoundingBox, confidence: f32, frame: &Frame) -> Detection {
    let aspect_ratio = bbox.aspect_ratio().unwrap_or(0.0);
    Detection {
        bbox,
        confidence,
        aspect_ratio,
        alignment_score: AlignmentScorer::default().score(
            aspect_ratio,
            bbox.area(),
            frame.width as f32,
            frame.height as f32,
        ),
    }
}

fn cmd_score(args: &[String]) -> Result<()> {
    // score <aspect> <area> <frame_w> <frame_h> [--config path] [--json]
    let parsed = parse_args(args)?;
    let config = load_config(&parsed)?;
    let aspect: f32 = positional(&parsed, 0, "aspect")?;
    let area: f32 = positional(&parsed, 1, "area")?;
    let frame_w: f32 = positional(&parsed, 2, "frame_w")?;
    let frame_h: f32 = positional(&parsed, 3, "frame_h")?;

    let scorer = AlignmentScorer::new(
        config.document.ideal_aspect_ratio,
        config.document.aspect_ratio_tolerance,
    );
    let score = scorer.score(aspect, area, frame_w, frame_h);
    if parsed.json {
        println!("{}", serde_json::json!({ "alignment_score": score }));
    } else {
        println!("Alignment score: {:.4}", score);
    }
    Ok(())
}

fn cmd_decode(args: &[String]) -> Result<()> {
    // decode <output.json> <frame_w> <frame_h> [--layout row|column] [--config path] [--json]
    let parsed = parse_args(args)?;
    let config = load_config(&parsed)?;
    let path: PathBuf = positional(&parsed, 0, "output.json")?;
    let frame_w: u32 = positional(&parsed, 1, "frame_w")?;
    let frame_h: u32 = positional(&parsed, 2, "frame_h")?;
    if frame_w == 0 || frame_h == 0 {
        bail!("frame dimensions must be positive");
    }

    let raw = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let output: ModelOutput = serde_json::from_str(&raw)?;
    let geometry = GeometryContext::letterbox(config.detector.input_size, frame_w, frame_h);
    let decoder = DetectionDecoder::new(
        config.detector.confidence_floor,
        AlignmentScorer::new(
            config.document.ideal_aspect_ratio,
            config.document.aspect_ratio_tolerance,
        ),
    );
    let detections = decoder.decode_with_layout(&output, &geometry, parsed.layout)?;

    if parsed.json {
        println!("{}", serde_json::to_string(&detections)?);
        return Ok(());
    }

    let tracker = CaptureStabilityTracker::new(config.document.clone());
    println!("{} detections", detections.len());
    for (i, d) in detections.iter().enumerate() {
        let assessment = tracker.assess(d, frame_w, frame_h);
        println!(
            "#{} conf {:.3} box ({:.1}, {:.1}, {:.1}x{:.1}) aspect {:.3} align {:.3} quality {:.3} {}",
            i,
            d.confidence,
            d.bbox.x,
            d.bbox.y,
            d.bbox.width,
            d.bbox.height,
            d.aspect_ratio,
            d.alignment_score,
            assessment.quality_score,
            match assessment.invalid_reason {
                Some(reason) => format!("invalid: {:?}", reason),
                None => "valid".to_string(),
            }
        );
    }
    Ok(())
}

fn cmd_crop(args: &[String]) -> Result<()> {
    // crop <image> <x> <y> <w> <h> [--out path] [--config path] [--json]
    let parsed = parse_args(args)?;
    let config = load_config(&parsed)?;
    let path: PathBuf = positional(&parsed, 0, "image")?;
    let bbox = parse_box(&parsed, 1)?;
    let frame = load_frame(&path)?;

    let extractor = CropExtractor::new(config.crop.clone());
    let region = extractor.compute_crop_region(&bbox, frame.width, frame.height)?;
    let artifact = extractor.extract(&detection_for(bbox, 1.0, &frame), &frame)?;

    let saved = match &parsed.out {
        Some(out) => {
            fs::write(out, artifact.encode_jpeg(config.storage.jpeg_quality)?)?;
            out.clone()
        }
        None => artifact.save_to_dir(
            &config.storage.output_directory,
            config.storage.jpeg_quality,
        )?,
    };

    if parsed.json {
        println!(
            "{}",
            serde_json::json!({ "region": region, "artifact": artifact.info(), "path": saved })
        );
    } else {
        println!(
            "Cropped {}x{} at ({}, {}) -> {}x{} saved to {}",
            region.width,
            region.height,
            region.x,
            region.y,
            artifact.width(),
            artifact.height(),
            saved.display()
        );
    }
    Ok(())
}

fn cmd_overlay(args: &[String]) -> Result<()> {
    // overlay <image> <x> <y> <w> <h> --out path [--confidence c]
    let parsed = parse_args(args)?;
    let config = load_config(&parsed)?;
    let path: PathBuf = positional(&parsed, 0, "image")?;
    let bbox = parse_box(&parsed, 1)?;
    let out = parsed.out.clone().ok_or_else(|| anyhow!("--out is required"))?;

    let frame = load_frame(&path)?;
    let detection = detection_for(bbox, parsed.confidence, &frame);
    let tracker = CaptureStabilityTracker::new(config.document);
    let valid = tracker.assess(&detection, frame.width, frame.height).is_valid();

    let mut image = image::RgbImage::from_raw(frame.width, frame.height, frame.data)
        .ok_or_else(|| anyhow!("image buffer mismatch"))?;
    let label = draw_detection(&mut image, &detection, valid)
        .ok_or_else(|| anyhow!("box lies outside the image"))?;
    image.save(&out)?;
    println!("{} -> {}", label, out.display());
    Ok(())
}

fn cmd_simulate(args: &[String]) -> Result<()> {
    // simulate <image> <x> <y> <w> <h> [--confidence c] [--frames n] [--out dir] [--json]
    let parsed = parse_args(args)?;
    let config = load_config(&parsed)?;
    let path: PathBuf = positional(&parsed, 0, "image")?;
    let bbox = parse_box(&parsed, 1)?;
    let frame = load_frame(&path)?;

    let geometry =
        GeometryContext::letterbox(config.detector.input_size, frame.width, frame.height);
    let detector =
        ReplayDetector::repeating(row_major_output(&[(bbox, parsed.confidence)], &geometry, 8));
    let mut session = ScanSession::new(detector, &config);
    session.start();

    let mut ticks = Vec::new();
    for i in 0..parsed.frames {
        let outcome = session.process_frame(&frame)?;
        let status = session.signals().status.clone();
        if !parsed.json {
            println!("frame {}: {:?} - {}", i + 1, outcome, status);
        }
        ticks.push(serde_json::json!({ "frame": i + 1, "status": status }));
        if outcome == TickOutcome::Captured {
            break;
        }
    }

    let saved = match session.take_artifact() {
        Some(artifact) => {
            let dir = parsed
                .out
                .clone()
                .unwrap_or_else(|| PathBuf::from(&config.storage.output_directory));
            Some(artifact.save_to_dir(dir, config.storage.jpeg_quality)?)
        }
        None => None,
    };
    session.stop();

    if parsed.json {
        println!(
            "{}",
            serde_json::json!({ "ticks": ticks, "stats": session.stats(), "artifact": saved })
        );
    } else {
        match saved {
            Some(path) => println!("Captured: {}", path.display()),
            None => println!("No capture after {} frames", parsed.frames),
        }
    }
    Ok(())
}

fn cmd_init_config(args: &[String]) -> Result<()> {
    // init-config [path]
    let parsed = parse_args(args)?;
    let path = parsed
        .positional
        .first()
        .map(PathBuf::from)
        .unwrap_or_else(AutoCaptureConfig::default_path);
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    AutoCaptureConfig::default().save_to_file(&path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

#[cfg(feature = "camera")]
fn cmd_cameras() -> Result<()> {
    let cameras = autocapture::platform::list_cameras()?;
    if cameras.is_empty() {
        println!("No cameras found");
    }
    for (index, name) in cameras {
        println!("[{}] {}", index, name);
    }
    Ok(())
}

#[cfg(feature = "camera")]
fn cmd_snapshot(args: &[String]) -> Result<()> {
    // snapshot [index] [--frames n] [--out dir]
    use autocapture::platform::CameraSource;
    use autocapture::{CapturedArtifact, FrameSource};

    let parsed = parse_args(args)?;
    let config = load_config(&parsed)?;
    let index: u32 = positional(&parsed, 0, "index").unwrap_or(0);

    let mut source = CameraSource::new(index);
    source.open()?;
    // the first frames after opening are often black or partial
    let mut last = None;
    for _ in 0..parsed.frames.max(1) {
        match source.next_frame() {
            Ok(Some(frame)) if !frame.is_empty() => last = Some(frame),
            Ok(_) => {}
            Err(e) if e.is_transient() => log::debug!("Skipping frame: {}", e),
            Err(e) => {
                source.release();
                return Err(e.into());
            }
        }
    }
    source.release();

    let frame = last.ok_or_else(|| anyhow!("camera {} produced no frames", index))?;
    let artifact = CapturedArtifact::selfie(&frame)?;
    let dir = parsed
        .out
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.storage.output_directory));
    let path = artifact.save_to_dir(dir, config.storage.jpeg_quality)?;
    println!(
        "Saved {}x{} frame from camera {} to {}",
        frame.width,
        frame.height,
        index,
        path.display()
    );
    Ok(())
}
