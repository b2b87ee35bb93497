//! End-to-end: recorded landmarks -> tracking worker -> pose cell -> render loop.

use std::sync::Arc;

use glasses_tryon::recording::{BlankCamera, RecordedDetector, Recording};
use glasses_tryon::render::FrameCompositor;
use glasses_tryon::{
    Config, Error, FaceResults, Frame, FrameSize, FrameSource, Landmark, LandmarkDetector,
    LandmarkSet, OverlayTransform, PoseCell, RenderLoop, Result, Tracker, TrackingWorker,
};

fn face_at(left_x: f32, right_x: f32) -> FaceResults {
    let mut points = vec![Landmark::new(0.5, 0.5); 478];
    points[33] = Landmark::new(left_x, 0.5);
    points[263] = Landmark::new(right_x, 0.5);
    FaceResults::single(LandmarkSet::new(points))
}

#[test]
fn replayed_session_drives_overlay() {
    let config = Config::default();
    let recording = Recording::new(
        config.frame,
        vec![
            face_at(0.40, 0.60),
            FaceResults::none(),
            face_at(0.10, 0.30),
        ],
    );
    let frames = recording.len() as u64;

    let cell = Arc::new(PoseCell::new());
    let detector = RecordedDetector::new(Arc::new(recording));
    let tracker = Tracker::new(detector, &config).with_cell(Arc::clone(&cell));
    let worker = TrackingWorker::spawn(tracker).unwrap();
    let mut render = RenderLoop::new(Arc::clone(&cell), &config);
    let mut camera = BlankCamera::new(config.frame).with_limit(frames);

    let mut transforms = Vec::new();
    while let Some(frame) = camera.next_frame() {
        worker.submit(frame).unwrap();
        worker.recv_outcome().unwrap().result.unwrap();
        let tick = render.tick();
        assert!(tick.fresh);
        transforms.push(tick.transform);
    }

    assert_eq!(transforms.len(), 3);
    let first = transforms[0].placement().unwrap();
    assert!(first.position.x.abs() < 1e-3);
    assert!((first.scale - 153.6).abs() < 1e-3);

    // Face lost: overlay hidden, not left at the old position
    assert_eq!(transforms[1], OverlayTransform::Hidden);

    // Re-acquired on the left half of the frame
    let third = transforms[2].placement().unwrap();
    assert!((third.position.x - (128.0 - 320.0)).abs() < 1e-3);
}

#[test]
fn stalled_tracking_freezes_last_pose() {
    let config = Config::default();
    let cell = Arc::new(PoseCell::new());
    let recording = Recording::new(config.frame, vec![face_at(0.40, 0.60)]);
    let tracker =
        Tracker::new(RecordedDetector::new(Arc::new(recording)), &config).with_cell(Arc::clone(&cell));
    let worker = TrackingWorker::spawn(tracker).unwrap();
    let mut render = RenderLoop::new(Arc::clone(&cell), &config);

    worker.submit(Frame::blank(0, config.frame)).unwrap();
    worker.recv_outcome().unwrap().result.unwrap();
    let live = render.tick();

    // Past the end of the recording: the detector fails, nothing is published
    worker.submit(Frame::blank(1, config.frame)).unwrap();
    let outcome = worker.recv_outcome().unwrap();
    assert!(matches!(outcome.result, Err(Error::Detector(_))));

    for _ in 0..3 {
        let tick = render.tick();
        assert!(!tick.fresh);
        assert_eq!(tick.transform, live.transform);
    }
}

#[test]
fn smoothing_from_config_damps_jumps() {
    let mut config = Config::default();
    config.overlay.smoothing = Some(0.5);
    let recording = Recording::new(config.frame, vec![face_at(0.40, 0.60), face_at(0.60, 0.80)]);

    let cell = Arc::new(PoseCell::new());
    let mut tracker =
        Tracker::new(RecordedDetector::new(Arc::new(recording)), &config).with_cell(Arc::clone(&cell));

    tracker.process_frame(&Frame::blank(0, config.frame)).unwrap();
    let pose = tracker.process_frame(&Frame::blank(1, config.frame)).unwrap().unwrap();

    // Raw midpoint moves 320 -> 448; half-way is 384
    assert!((pose.x - 384.0).abs() < 1e-2);
    assert_eq!(cell.latest(), Some(pose));
}

struct CountingDetector {
    calls: usize,
}

impl LandmarkDetector for CountingDetector {
    fn detect(&mut self, _frame: &Frame) -> Result<FaceResults> {
        self.calls += 1;
        Ok(face_at(0.40, 0.60))
    }
}

#[test]
fn wrong_resolution_never_reaches_detector() {
    let config = Config::default();
    let mut tracker = Tracker::new(CountingDetector { calls: 0 }, &config);

    let err = tracker
        .process_frame(&Frame::blank(0, FrameSize::new(1280, 720)))
        .unwrap_err();
    assert!(matches!(err, Error::FrameSizeMismatch { .. }));
    assert_eq!(tracker.detector().calls, 0);

    tracker.process_frame(&Frame::blank(1, config.frame)).unwrap();
    assert_eq!(tracker.detector().calls, 1);
}

#[test]
fn compositor_follows_render_loop() {
    let config = Config::default();
    let cell = Arc::new(PoseCell::new());
    let mut render = RenderLoop::new(Arc::clone(&cell), &config);
    let mut compositor = FrameCompositor::new(config.viewport());
    let blank = compositor.canvas().clone();

    let mut tracker = Tracker::new(CountingDetector { calls: 0 }, &config).with_cell(Arc::clone(&cell));
    tracker.process_frame(&Frame::blank(0, config.frame)).unwrap();
    let tick = render.drive(&mut compositor);
    assert!(tick.transform.is_visible());
    assert_ne!(compositor.canvas(), &blank);

    cell.publish(None);
    render.drive(&mut compositor);
    assert_eq!(compositor.canvas(), &blank);
}
