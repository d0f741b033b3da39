//! Full sessions driven through the capture flow with synthetic landmarks


use pose_capture::{
    auto_capture::SchedulerEvent,
    capture_flow::{CaptureFlow, FrameInput},
    config::Config,
    encoding::JpegEncoder,
    landmarks::LandmarkSet,
    quality::QualityIssue,
    sequencer::{CaptureRefusal, CaptureState},
    upload::{DirectoryUploader, UploadProgress},
    Error, Result,
};
use std::{
    io::Read,
    time::{Duration, Instant},
};
use tempfile::TempDir;
use zip::ZipArchive;
use test_helpers::{face_with_pose, grey_wall_frame, standard_sequence_faces, straight_face, studio_frame};

fn config(auto: bool) -> Config {
    let mut config = Config::default();
    config.session.session_id = "roll-7".to_string();
    config.timing.auto_capture = auto;
    config
}

fn flow(auto: bool) -> Result<CaptureFlow<JpegEncoder>> {
    CaptureFlow::new(&config(auto), JpegEncoder::default())
}

/// Feed enough identical frames to fill the smoothing window
fn hold(flow: &mut CaptureFlow<JpegEncoder>, start: Instant, face: &LandmarkSet) -> Result<Instant> {
    let frame = studio_frame();
    let mut now = start;
    for _ in 0..5 {
        flow.process_frame(FrameInput {
            at: now,
            faces: std::slice::from_ref(face),
            frame: Some(&frame),
        })?;
        now += Duration::from_millis(100);
    }
    Ok(now)
}

fn run_session(flow: &mut CaptureFlow<JpegEncoder>, t0: Instant) -> Result<Instant> {
    let frame = studio_frame();
    let mut now = t0;
    for face in standard_sequence_faces() {
        now = hold(flow, now, &face)?;
        assert_eq!(flow.state(now), CaptureState::ReadyToCapture);
        flow.capture_now(now, &frame)?;
        now += Duration::from_secs(4);
    }
    Ok(now)
}

#[test]
fn test_manual_session_from_landmarks() -> Result<()> {
    let t0 = Instant::now();
    let mut flow = flow(false)?;
    flow.start(t0)?;
    assert_eq!(flow.prompt(), Some("Look straight until the circle turns green"));

    let end = run_session(&mut flow, t0)?;
    assert_eq!(flow.state(end), CaptureState::SessionComplete);

    let labels: Vec<_> = flow.photos().iter().map(|p| p.label.as_str()).collect();
    assert_eq!(labels, vec!["straight", "left", "right", "up", "down"]);

    let photo = image::load_from_memory(&flow.photos()[0].image).map_err(Error::Image)?;
    assert_eq!((photo.width(), photo.height()), (480, 480));
    Ok(())
}

#[test]
fn test_wrong_pose_is_refused() -> Result<()> {
    let t0 = Instant::now();
    let mut flow = flow(false)?;
    flow.start(t0)?;

    let now = hold(&mut flow, t0, &face_with_pose(0.0, 30.0, 0.0))?;
    assert_eq!(flow.state(now), CaptureState::Aligning);
    let err = flow.capture_now(now, &studio_frame()).unwrap_err();
    assert!(matches!(err, Error::CaptureRefused(CaptureRefusal::NotAligned)));
    assert!(flow.photos().is_empty());
    Ok(())
}

#[test]
fn test_bad_background_blocks_capture() -> Result<()> {
    let t0 = Instant::now();
    let mut flow = flow(false)?;
    flow.start(t0)?;

    let face = straight_face();
    let frame = grey_wall_frame();
    let report = flow.process_frame(FrameInput {
        at: t0,
        faces: std::slice::from_ref(&face),
        frame: Some(&frame),
    })?;
    assert!(report.aligned);
    assert_eq!(report.state, CaptureState::Aligning);
    assert_eq!(report.verdict.issues, vec![QualityIssue::BackgroundNotWhite]);

    let err = flow.capture_now(t0, &frame).unwrap_err();
    assert_eq!(err.to_string(), "Capture refused: Background is not white enough");
    Ok(())
}

#[test]
fn test_reacquired_face_is_sampled_afresh() -> Result<()> {
    let t0 = Instant::now();
    let mut flow = flow(false)?;
    flow.start(t0)?;
    let face = straight_face();

    let wall = grey_wall_frame();
    let report = flow.process_frame(FrameInput {
        at: t0,
        faces: std::slice::from_ref(&face),
        frame: Some(&wall),
    })?;
    assert_eq!(report.verdict.issues, vec![QualityIssue::BackgroundNotWhite]);

    let studio = studio_frame();
    let report = flow.process_frame(FrameInput {
        at: t0 + Duration::from_millis(100),
        faces: &[],
        frame: Some(&studio),
    })?;
    assert_eq!(report.verdict.issues, vec![QualityIssue::NoFace]);

    // Well inside the sample interval, yet the new face gets its own sample
    let report = flow.process_frame(FrameInput {
        at: t0 + Duration::from_millis(200),
        faces: std::slice::from_ref(&face),
        frame: Some(&studio),
    })?;
    assert!(report.verdict.passed(), "issues: {:?}", report.verdict.issues);
    Ok(())
}

#[test]
fn test_multiple_faces_block_alignment() -> Result<()> {
    let t0 = Instant::now();
    let mut flow = flow(false)?;
    flow.start(t0)?;

    let faces = [straight_face(), straight_face()];
    let frame = studio_frame();
    let report = flow.process_frame(FrameInput {
        at: t0,
        faces: &faces,
        frame: Some(&frame),
    })?;
    assert!(!report.aligned);
    assert_eq!(report.smoothed, None);

    let err = flow.capture_now(t0, &frame).unwrap_err();
    assert!(matches!(
        err,
        Error::CaptureRefused(CaptureRefusal::InvalidFace(QualityIssue::MultipleFaces))
    ));
    Ok(())
}

#[test]
fn test_auto_capture_from_landmarks() -> Result<()> {
    let t0 = Instant::now();
    let mut flow = flow(true)?;
    flow.start(t0)?;
    let face = straight_face();
    let frame = studio_frame();

    let mut fired_at = None;
    for step in 0..=8u64 {
        let now = t0 + Duration::from_millis(250 * step);
        let report = flow.process_frame(FrameInput {
            at: now,
            faces: std::slice::from_ref(&face),
            frame: Some(&frame),
        })?;
        if report.captured.is_some() {
            fired_at = Some(step);
            break;
        }
    }
    assert_eq!(fired_at, Some(8));
    assert_eq!(flow.photos().len(), 1);
    assert_eq!(flow.sequencer().target_index(), 1);
    Ok(())
}

#[test]
fn test_losing_alignment_cancels_auto_capture() -> Result<()> {
    let t0 = Instant::now();
    let mut flow = flow(true)?;
    flow.start(t0)?;
    let face = straight_face();
    let crowd = [straight_face(), straight_face()];
    let frame = studio_frame();

    let report = flow.process_frame(FrameInput {
        at: t0,
        faces: std::slice::from_ref(&face),
        frame: Some(&frame),
    })?;
    assert_eq!(report.countdown, Some(2));

    let report = flow.process_frame(FrameInput {
        at: t0 + Duration::from_secs(1),
        faces: &crowd,
        frame: Some(&frame),
    })?;
    assert_eq!(report.auto, SchedulerEvent::Cancelled);
    assert_eq!(report.countdown, None);

    // Nothing fires at the original deadline
    let report = flow.tick(t0 + Duration::from_secs(2), Some(&frame))?;
    assert!(report.captured.is_none());

    // Regaining alignment restarts from the full delay
    let t1 = t0 + Duration::from_millis(2500);
    let report = flow.process_frame(FrameInput {
        at: t1,
        faces: std::slice::from_ref(&face),
        frame: Some(&frame),
    })?;
    assert_eq!(report.countdown, Some(2));
    let report = flow.tick(t1 + Duration::from_secs(1), Some(&frame))?;
    assert!(report.captured.is_none());
    let report = flow.tick(t1 + Duration::from_secs(2), Some(&frame))?;
    assert!(report.captured.is_some());
    Ok(())
}

#[test]
fn test_retake_through_flow() -> Result<()> {
    let t0 = Instant::now();
    let mut flow = flow(false)?;
    flow.start(t0)?;
    let mut now = run_session(&mut flow, t0)?;
    let original = flow.photos()[1].clone();

    flow.retake(1)?;
    assert_eq!(flow.prompt(), Some("Slowly turn left until the circle turns green"));
    now = hold(&mut flow, now, &face_with_pose(0.0, 30.0, 0.0))?;
    let receipt = flow.capture_now(now, &patched_studio_frame())?;
    assert!(receipt.replaced);
    assert_eq!(flow.photos()[1].label, original.label);
    assert_ne!(flow.photos()[1].image, original.image);
    assert_eq!(flow.state(now + Duration::from_secs(4)), CaptureState::SessionComplete);
    Ok(())
}

/// A white frame with a darker patch, so its encoding differs from the studio frame
fn patched_studio_frame() -> image::RgbImage {
    let mut frame = studio_frame();
    for y in 200..280 {
        for x in 280..360 {
            frame.put_pixel(x, y, image::Rgb([90, 60, 40]));
        }
    }
    frame
}

#[test]
fn test_stop_then_upload() -> Result<()> {
    let t0 = Instant::now();
    let mut flow = flow(false)?;
    flow.start(t0)?;
    run_session(&mut flow, t0)?;
    flow.stop();

    let face = straight_face();
    let frame = studio_frame();
    let result = flow.process_frame(FrameInput {
        at: t0,
        faces: std::slice::from_ref(&face),
        frame: Some(&frame),
    });
    assert!(matches!(result, Err(Error::FlowStopped)));

    let dir = TempDir::new()?;
    let mut uploader = DirectoryUploader::new(dir.path());
    let mut updates: Vec<UploadProgress> = Vec::new();
    let receipt = flow.upload(&mut uploader, &mut |p| updates.push(p))?;

    assert_eq!(receipt.archive_name, "roll-7.zip");
    assert_eq!(receipt.entries.len(), 5);
    assert_eq!(updates.first().map(|p| p.percent), Some(10));
    assert_eq!(updates.last().map(|p| p.message.as_str()), Some("Upload complete"));
    assert!(updates.windows(2).all(|w| w[0].percent <= w[1].percent));

    let path = dir.path().join("roll-7.zip");
    assert_eq!(receipt.location.as_deref(), Some(path.as_path()));
    assert!(updates.iter().any(|p| p.message.starts_with("Compressing")));

    let mut archive = ZipArchive::new(std::fs::File::open(&path)?)?;
    assert_eq!(archive.len(), 5);
    let mut first = Vec::new();
    archive.by_name("roll-7/straight_1.jpg")?.read_to_end(&mut first)?;
    assert_eq!(&first[..2], &[0xFF, 0xD8]);
    assert_eq!(first, flow.photos()[0].image);
    assert!(archive.by_name("roll-7/down_5.jpg").is_ok());
    Ok(())
}

#[test]
fn test_upload_without_photos_fails() -> Result<()> {
    let flow = flow(false)?;
    let dir = TempDir::new()?;
    let mut uploader = DirectoryUploader::new(dir.path());
    let err = flow.upload(&mut uploader, &mut |_| {}).unwrap_err();
    assert!(matches!(err, Error::UploadError(ref m) if m == "No photos to upload"));
    Ok(())
}
