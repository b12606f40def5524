use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::detection::domain::face_detector::FaceDetector;
use crate::person::domain::person_extractor::PersonExtractor;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;
use crate::tracking::domain::camera_motion::MotionGatedTracker;
use crate::tracking::domain::effect_event::EffectEvent;
use crate::tracking::domain::tracker_config::Orientation;
use crate::upstream::domain::upstream_channel::UpstreamChannel;
use crate::video::domain::frame_source::{CaptureTarget, FrameSource};

use super::pipeline_logger::{FrameStatus, PipelineLogger};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrackFacesOptions {
    /// Frames dropped after each processed one.
    pub skip: usize,
    /// Flip frames horizontally before anything else sees them.
    pub mirror: bool,
}

/// Counters for a finished run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub frames_captured: usize,
    pub frames_processed: usize,
    pub events_sent: usize,
    pub faces_sent: usize,
}

/// The frame loop: capture, detect, step the tracker, send upstream.
///
/// Strictly sequential, one frame fully handled before the next is read.
/// Detection runs on the rotated frame when the tracker is configured for
/// [`Orientation::RotatedClockwise`]; everything sent upstream stays in the
/// upright orientation.
pub struct TrackFacesUseCase {
    source: Box<dyn FrameSource>,
    detector: Box<dyn FaceDetector>,
    tracker: MotionGatedTracker,
    channel: UpstreamChannel,
    extractor: Option<Box<dyn PersonExtractor>>,
    logger: Box<dyn PipelineLogger>,
    options: TrackFacesOptions,
    cancelled: Arc<AtomicBool>,
}

impl TrackFacesUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Box<dyn FrameSource>,
        detector: Box<dyn FaceDetector>,
        tracker: MotionGatedTracker,
        channel: UpstreamChannel,
        extractor: Option<Box<dyn PersonExtractor>>,
        logger: Box<dyn PipelineLogger>,
        options: TrackFacesOptions,
        cancelled: Option<Arc<AtomicBool>>,
    ) -> Self {
        Self {
            source,
            detector,
            tracker,
            channel,
            extractor,
            logger,
            options,
            cancelled: cancelled.unwrap_or_else(|| Arc::new(AtomicBool::new(false))),
        }
    }

    pub fn tracker(&self) -> &MotionGatedTracker {
        &self.tracker
    }

    pub fn channel(&self) -> &UpstreamChannel {
        &self.channel
    }

    /// Runs until the source is exhausted, the cancel flag is raised or a
    /// capture/detector error occurs. The source and the upstream channel
    /// are closed on every exit path.
    pub fn execute(
        &mut self,
        target: &CaptureTarget,
    ) -> Result<RunStats, Box<dyn std::error::Error>> {
        let result = match self.source.open(target) {
            Ok(_) => {
                // motion schedules count from the first captured frame
                self.tracker.reset_motion(Instant::now());
                self.run()
            }
            Err(e) => Err(e),
        };
        self.source.close();
        self.channel.close();
        self.logger.summary();
        result
    }

    fn run(&mut self) -> Result<RunStats, Box<dyn std::error::Error>> {
        let Self {
            source,
            detector,
            tracker,
            channel,
            extractor,
            logger,
            options,
            cancelled,
        } = self;
        let rotated = tracker.tracker().config().orientation == Orientation::RotatedClockwise;
        let mut stats = RunStats::default();
        let mut capture_start = Instant::now();

        for item in source.frames() {
            if cancelled.load(Ordering::Relaxed) {
                logger.info("cancelled");
                break;
            }
            let frame = item?;
            let capture_ms = capture_start.elapsed().as_secs_f64() * 1000.0;
            stats.frames_captured += 1;
            if (stats.frames_captured - 1) % options.skip.saturating_add(1) != 0 {
                capture_start = Instant::now();
                continue;
            }
            stats.frames_processed += 1;
            let frame_start = Instant::now();

            let upright = if options.mirror {
                frame.mirrored()
            } else {
                frame
            };
            let rotated_frame;
            let detector_input = if rotated {
                rotated_frame = upright.rotated_clockwise();
                &rotated_frame
            } else {
                &upright
            };

            let detect_start = Instant::now();
            let detections = detector.detect(detector_input)?;
            let detect_ms = detect_start.elapsed().as_secs_f64() * 1000.0;

            let now = Instant::now();
            let event = tracker.step(&detections, now);
            let track_ms = now.elapsed().as_secs_f64() * 1000.0;

            let send_start = Instant::now();
            if let Some(event) = event {
                channel.send_at(&event, Some(&upright), now);
                stats.events_sent += 1;
                if let (EffectEvent::EffectStart { bbox, .. }, Some(extractor)) =
                    (&event, extractor.as_mut())
                {
                    if send_face(channel, &mut **extractor, &upright, bbox) {
                        stats.faces_sent += 1;
                    }
                }
            }
            let send_ms = send_start.elapsed().as_secs_f64() * 1000.0;

            let total_ms = capture_ms + frame_start.elapsed().as_secs_f64() * 1000.0;
            logger.timing("capture", capture_ms);
            logger.timing("detect", detect_ms);
            logger.timing("track", track_ms);
            logger.timing("send", send_ms);
            logger.timing("total", total_ms);
            let state = tracker.tracker();
            logger.metric("drop_count", state.drop_count() as f64);
            logger.frame(&FrameStatus {
                index: upright.index(),
                mode: state.mode(),
                remaining: state.remaining(now),
                drop_count: state.drop_count(),
            });

            capture_start = Instant::now();
        }
        Ok(stats)
    }
}

/// Crops around the newly locked face, cuts the person out and sends it.
fn send_face(
    channel: &mut UpstreamChannel,
    extractor: &mut dyn PersonExtractor,
    upright: &Frame,
    bbox: &BoundingBox,
) -> bool {
    let rect = bbox.face_crop_rect(upright.width(), upright.height());
    let crop = upright.crop(&rect);
    match extractor.extract(&crop) {
        Ok(Some(person)) => {
            channel.send_face(&person);
            true
        }
        Ok(None) => {
            log::debug!("no person found around face at {:?}", bbox.to_array());
            false
        }
        Err(e) => {
            log::warn!("person extraction failed: {e}");
            false
        }
    }
}
