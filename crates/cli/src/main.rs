mod settings;

use std::path::PathBuf;
use std::process;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;

use planb_core::detection::infrastructure::onnx_face_detector::OnnxFaceDetector;
use planb_core::person::domain::person_extractor::PersonExtractor;
use planb_core::person::infrastructure::opaque_cutout_extractor::OpaqueCutoutExtractor;
use planb_core::pipeline::pipeline_logger::{
    CsvProfiler, NullPipelineLogger, PipelineLogger, StdoutPipelineLogger,
};
use planb_core::pipeline::track_faces_use_case::{TrackFacesOptions, TrackFacesUseCase};
use planb_core::shared::constants::{FACE_MODEL_NAME, UPSTREAM_DEFAULT_HOST};
use planb_core::tracking::domain::camera_motion::{CameraMotion, MotionGatedTracker, StillCamera};
use planb_core::tracking::domain::target_tracker::TargetTracker;
use planb_core::tracking::domain::tracker_config::Orientation;
use planb_core::tracking::infrastructure::periodic_motion::PeriodicMotion;
use planb_core::upstream::domain::destination::Destination;
use planb_core::upstream::domain::upstream_channel::{UpstreamChannel, UpstreamConfig};
use planb_core::upstream::domain::upstream_record::WireFormat;
use planb_core::upstream::infrastructure::jpeg_frame_encoder::JpegFrameEncoder;
use planb_core::upstream::infrastructure::tcp_connector::TcpConnector;
use planb_core::video::domain::frame_source::CaptureTarget;
use planb_core::video::infrastructure::ffmpeg_capture::FfmpegCapture;

use settings::Settings;

/// Frames between two status lines.
const STATUS_EVERY: usize = 30;

/// Locks onto the most prominent face in front of the camera and streams
/// effect events to a downstream renderer.
#[derive(Parser, Debug)]
#[command(name = "planb", version)]
struct Cli {
    /// Camera device index.
    #[arg(short = 'c', long, default_value_t = 0)]
    camera: u32,

    /// Read frames from a video file instead of a camera.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Upstream destination: port number, 0 to disable, or a log file path.
    #[arg(short = 'p', long = "upstream-port", default_value = "8089")]
    upstream: Destination,

    /// Host of the upstream consumer.
    #[arg(long, default_value = UPSTREAM_DEFAULT_HOST)]
    upstream_host: String,

    /// Also append every upstream record to this file.
    #[arg(short = 'u', long)]
    upstream_log: Option<PathBuf>,

    /// Embed the current video frame in upstream events.
    #[arg(short = 'f', long)]
    stream_frames: bool,

    /// Run detection on the frame rotated 90° clockwise (portrait camera).
    #[arg(short = 'r', long)]
    rotate: bool,

    /// Mirror the camera image horizontally.
    #[arg(short = 'm', long)]
    mirror: bool,

    /// Frames to skip after each processed frame.
    #[arg(short = 's', long, default_value_t = 2)]
    skip: usize,

    /// Do not print the periodic status line.
    #[arg(short = 'n', long)]
    no_visual: bool,

    /// Write per-frame stage timings as CSV.
    #[arg(short = 'P', long, num_args = 0..=1, default_missing_value = "profiler.csv")]
    profiling: Option<PathBuf>,

    /// Do not send the cut-out face image on acquisition.
    #[arg(short = 'F', long)]
    no_face_contour: bool,

    /// ONNX face detection model.
    #[arg(long, default_value = FACE_MODEL_NAME)]
    model: PathBuf,

    /// Upstream framing: json-lines or length-prefixed.
    #[arg(long, default_value = "json-lines")]
    wire_format: WireFormat,

    /// Pretend the camera moves for DURATION seconds every PERIOD seconds.
    #[arg(long, value_name = "PERIOD:DURATION")]
    simulate_motion: Option<MotionSchedule>,

    /// JSON file with tracker tunables.
    #[arg(long)]
    config: Option<PathBuf>,
}

/// `--simulate-motion` argument.
#[derive(Clone, Copy, Debug, PartialEq)]
struct MotionSchedule {
    period: Duration,
    duration: Duration,
}

impl FromStr for MotionSchedule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (period, duration) = s
            .split_once(':')
            .ok_or_else(|| format!("expected PERIOD:DURATION, got '{s}'"))?;
        let secs = |v: &str| -> Result<Duration, String> {
            v.trim()
                .parse::<f64>()
                .ok()
                .and_then(|f| Duration::try_from_secs_f64(f).ok())
                .ok_or_else(|| format!("invalid number of seconds '{v}'"))
        };
        let schedule = MotionSchedule {
            period: secs(period)?,
            duration: secs(duration)?,
        };
        if schedule.period.is_zero() {
            return Err("motion period must be positive".into());
        }
        if schedule.duration > schedule.period {
            return Err("motion duration cannot exceed its period".into());
        }
        Ok(schedule)
    }
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let orientation = if cli.rotate {
        Orientation::RotatedClockwise
    } else {
        Orientation::Upright
    };
    let tracker_config = settings.tracker_config(orientation)?;
    let upstream_config = upstream_config(&cli, &settings)?;

    let detector = Box::new(OnnxFaceDetector::new(&cli.model, settings.score_floor)?);
    let channel = UpstreamChannel::open(
        upstream_config.clone(),
        Box::new(TcpConnector::new(
            upstream_config.connect_timeout,
            upstream_config.write_timeout,
        )),
        Box::new(JpegFrameEncoder::new(
            upstream_config.frame_size,
            upstream_config.jpeg_quality,
        )),
    )?;

    let motion: Box<dyn CameraMotion> = match cli.simulate_motion {
        Some(schedule) => {
            log::info!(
                "simulating camera motion: {:?} every {:?}",
                schedule.duration,
                schedule.period
            );
            Box::new(PeriodicMotion::new(
                schedule.period,
                schedule.duration,
                Instant::now(),
            ))
        }
        None => Box::new(StillCamera),
    };
    let tracker = MotionGatedTracker::new(TargetTracker::new(tracker_config), motion);

    let extractor: Option<Box<dyn PersonExtractor>> = if cli.no_face_contour {
        None
    } else {
        Some(Box::new(OpaqueCutoutExtractor))
    };

    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = cancelled.clone();
    ctrlc::set_handler(move || {
        log::info!("interrupt received, stopping");
        flag.store(true, Ordering::SeqCst);
    })?;

    let target = match &cli.input {
        Some(path) => CaptureTarget::File(path.clone()),
        None => CaptureTarget::Camera(cli.camera),
    };

    let mut use_case = TrackFacesUseCase::new(
        Box::new(FfmpegCapture::new()),
        detector,
        tracker,
        channel,
        extractor,
        build_logger(&cli)?,
        TrackFacesOptions {
            skip: cli.skip,
            mirror: cli.mirror,
        },
        Some(cancelled),
    );
    let stats = use_case.execute(&target)?;
    log::info!(
        "processed {} of {} frames, sent {} events and {} faces",
        stats.frames_processed,
        stats.frames_captured,
        stats.events_sent,
        stats.faces_sent
    );
    Ok(())
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(input) = &cli.input {
        if !input.exists() {
            return Err(format!("Input file not found: {}", input.display()).into());
        }
    }
    if !cli.model.exists() {
        return Err(format!("Face model not found: {}", cli.model.display()).into());
    }
    if cli.upstream_host.trim().is_empty() {
        return Err("Upstream host must not be empty".into());
    }
    Ok(())
}

fn upstream_config(
    cli: &Cli,
    settings: &Settings,
) -> Result<UpstreamConfig, Box<dyn std::error::Error>> {
    let mut config = UpstreamConfig {
        host: cli.upstream_host.clone(),
        stream_frames: cli.stream_frames,
        wire_format: cli.wire_format,
        retry_period: settings.retry_period()?,
        ..UpstreamConfig::default()
    };
    match &cli.upstream {
        Destination::Disabled => config.port = None,
        Destination::Port(port) => config.port = Some(*port),
        Destination::LogFile(path) => {
            config.port = None;
            config.log_path = Some(path.clone());
        }
    }
    if let Some(log) = &cli.upstream_log {
        if config.log_path.is_some() {
            return Err("Upstream log given twice (--upstream-port and --upstream-log)".into());
        }
        config.log_path = Some(log.clone());
    }
    if config.port.is_none() && config.log_path.is_none() {
        log::warn!("upstream disabled, events are only logged locally");
    }
    Ok(config)
}

fn build_logger(cli: &Cli) -> Result<Box<dyn PipelineLogger>, Box<dyn std::error::Error>> {
    let base: Box<dyn PipelineLogger> = if cli.no_visual {
        Box::new(NullPipelineLogger)
    } else {
        Box::new(StdoutPipelineLogger::new(STATUS_EVERY))
    };
    let logger: Box<dyn PipelineLogger> = match &cli.profiling {
        Some(path) => Box::new(CsvProfiler::create(path, base)?),
        None => base,
    };
    Ok(logger)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut full = vec!["planb"];
        full.extend_from_slice(args);
        Cli::try_parse_from(full).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);
        assert_eq!(cli.camera, 0);
        assert_eq!(cli.upstream, Destination::Port(8089));
        assert_eq!(cli.upstream_host, "localhost");
        assert_eq!(cli.skip, 2);
        assert_eq!(cli.wire_format, WireFormat::JsonLines);
        assert_eq!(cli.model, PathBuf::from(FACE_MODEL_NAME));
        assert!(cli.profiling.is_none());
        assert!(!cli.rotate && !cli.mirror && !cli.stream_frames);
    }

    #[test]
    fn test_short_flags() {
        let cli = parse(&["-r", "-f", "-m", "-n", "-F", "-c", "1", "-s", "0", "-p", "9000"]);
        assert!(cli.rotate && cli.stream_frames && cli.mirror);
        assert!(cli.no_visual && cli.no_face_contour);
        assert_eq!(cli.camera, 1);
        assert_eq!(cli.skip, 0);
        assert_eq!(cli.upstream, Destination::Port(9000));
    }

    #[test]
    fn test_profiling_default_path() {
        assert_eq!(parse(&["-P"]).profiling, Some(PathBuf::from("profiler.csv")));
        assert_eq!(
            parse(&["-P", "run.csv"]).profiling,
            Some(PathBuf::from("run.csv"))
        );
    }

    #[test]
    fn test_wire_format_flag() {
        let cli = parse(&["--wire-format", "length-prefixed"]);
        assert_eq!(cli.wire_format, WireFormat::LengthPrefixed);
        assert!(Cli::try_parse_from(["planb", "--wire-format", "xml"]).is_err());
    }

    #[test]
    fn test_bad_port_rejected() {
        assert!(Cli::try_parse_from(["planb", "-p", "99999"]).is_err());
    }

    #[test]
    fn test_motion_schedule_parse() {
        let schedule: MotionSchedule = "10:3".parse().unwrap();
        assert_eq!(schedule.period, Duration::from_secs(10));
        assert_eq!(schedule.duration, Duration::from_secs(3));
        assert!("10".parse::<MotionSchedule>().is_err());
        assert!("0:0".parse::<MotionSchedule>().is_err());
        assert!("3:10".parse::<MotionSchedule>().is_err());
        assert!("a:b".parse::<MotionSchedule>().is_err());
    }

    #[test]
    fn test_upstream_port_destination() {
        let config = upstream_config(&parse(&["-p", "7000", "-f"]), &Settings::default()).unwrap();
        assert_eq!(config.port, Some(7000));
        assert!(config.stream_frames);
        assert!(config.log_path.is_none());
    }

    #[test]
    fn test_upstream_disabled_with_log() {
        let config = upstream_config(
            &parse(&["-p", "0", "-u", "events.log"]),
            &Settings::default(),
        )
        .unwrap();
        assert_eq!(config.port, None);
        assert_eq!(config.log_path, Some(PathBuf::from("events.log")));
    }

    #[test]
    fn test_upstream_file_destination() {
        let config = upstream_config(&parse(&["-p", "events.log"]), &Settings::default()).unwrap();
        assert_eq!(config.port, None);
        assert_eq!(config.log_path, Some(PathBuf::from("events.log")));
    }

    #[test]
    fn test_two_log_files_rejected() {
        let cli = parse(&["-p", "a.log", "-u", "b.log"]);
        assert!(upstream_config(&cli, &Settings::default()).is_err());
    }

    #[test]
    fn test_validate_missing_model() {
        let cli = parse(&["--model", "/nonexistent/model.onnx"]);
        let err = validate(&cli).unwrap_err();
        assert!(err.to_string().contains("Face model not found"));
    }

    #[test]
    fn test_validate_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("model.onnx");
        std::fs::write(&model, b"").unwrap();
        let cli = parse(&[
            "--model",
            model.to_str().unwrap(),
            "--input",
            "/nonexistent/clip.mp4",
        ]);
        assert!(validate(&cli)
            .unwrap_err()
            .to_string()
            .contains("Input file not found"));
    }

    #[test]
    fn test_build_logger_with_profiling() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.csv");
        let cli = parse(&["-n", "-P", path.to_str().unwrap()]);
        build_logger(&cli).unwrap();
        assert!(path.exists());
    }
}
