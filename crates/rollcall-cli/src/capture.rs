//! Camera → processor → window loop.

use crate::processor::FrameProcessor;
use rollcall_hw::{Annotation, Camera, CameraError, DisplayError, Frame, Window};
use thiserror::Error;

/// Delay handed to the window's key poll each tick.
const KEY_POLL_MS: i32 = 1;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("camera: {0}")]
    Camera(#[from] CameraError),
    #[error("display: {0}")]
    Display(#[from] DisplayError),
}

/// Where frames come from.
pub trait FrameSource {
    /// Next frame, or `None` when nothing arrived this tick.
    fn next_frame(&mut self) -> Result<Option<Frame>, CameraError>;
}

/// Where annotated frames go, and where the stop key is read.
pub trait FrameSink {
    fn show(&mut self, frame: &Frame, annotations: &[Annotation]) -> Result<(), DisplayError>;
    fn escape_pressed(&mut self, delay_ms: i32) -> Result<bool, DisplayError>;
}

impl FrameSource for Camera {
    fn next_frame(&mut self) -> Result<Option<Frame>, CameraError> {
        self.read_frame()
    }
}

impl FrameSink for Window {
    fn show(&mut self, frame: &Frame, annotations: &[Annotation]) -> Result<(), DisplayError> {
        Window::show(self, frame, annotations)
    }

    fn escape_pressed(&mut self, delay_ms: i32) -> Result<bool, DisplayError> {
        Window::escape_pressed(self, delay_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Running,
    Stopped,
}

/// Per-run counters, logged when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub shown: u64,
    pub skipped: u64,
}

/// Open-camera convenience wrapper around [`run`].
pub fn run_camera<P: FrameProcessor + ?Sized>(
    camera: Camera,
    window: Window,
    processor: &mut P,
) -> Result<LoopStats, CaptureError> {
    tracing::info!(
        camera = camera.index,
        width = camera.width,
        height = camera.height,
        "capture loop started; press ESC to stop"
    );
    run(camera, window, processor)
}

/// Run until Escape is pressed in `sink`.
///
/// Each tick reads one frame, mirrors it, runs `processor` on it and shows
/// the annotated result. Ticks where the source yields nothing, or fails to
/// read, are skipped. Source and sink are dropped when this returns.
pub fn run<S, K, P>(mut source: S, mut sink: K, processor: &mut P) -> Result<LoopStats, CaptureError>
where
    S: FrameSource,
    K: FrameSink,
    P: FrameProcessor + ?Sized,
{
    let mut state = LoopState::Running;
    let mut stats = LoopStats::default();

    while state == LoopState::Running {
        match source.next_frame() {
            Ok(Some(mut frame)) => {
                frame.mirror();
                let annotations = processor.process(&frame);
                sink.show(&frame, &annotations)?;
                stats.shown += 1;
                tracing::trace!(
                    seq = frame.sequence,
                    faces = annotations.len(),
                    latency_ms = frame.age().as_millis() as u64,
                    "frame shown"
                );
            }
            Ok(None) => {
                stats.skipped += 1;
                tracing::debug!(skipped = stats.skipped, "no frame from camera; skipping tick");
            }
            Err(e) => {
                stats.skipped += 1;
                tracing::debug!(skipped = stats.skipped, error = %e, "frame read failed; skipping tick");
            }
        }

        if sink.escape_pressed(KEY_POLL_MS)? {
            state = LoopState::Stopped;
        }
    }

    tracing::info!(shown = stats.shown, skipped = stats.skipped, "capture loop stopped");
    drop(source);
    drop(sink);
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_hw::AnnotationStyle;
    use std::collections::VecDeque;

    enum Tick {
        Frame(Frame),
        Empty,
        Fail,
    }

    struct ScriptedSource {
        ticks: VecDeque<Tick>,
    }

    impl FrameSource for ScriptedSource {
        fn next_frame(&mut self) -> Result<Option<Frame>, CameraError> {
            match self.ticks.pop_front() {
                Some(Tick::Frame(f)) => Ok(Some(f)),
                Some(Tick::Empty) | None => Ok(None),
                Some(Tick::Fail) => Err(CameraError::CaptureFailed("device unplugged".into())),
            }
        }
    }

    /// Records what it was shown; reports Escape on poll number `escape_at`.
    struct RecordingSink {
        shown: Vec<(u64, Vec<u8>, usize)>,
        polls: usize,
        escape_at: usize,
    }

    impl FrameSink for &mut RecordingSink {
        fn show(&mut self, frame: &Frame, annotations: &[Annotation]) -> Result<(), DisplayError> {
            self.shown.push((frame.sequence, frame.image().as_raw().clone(), annotations.len()));
            Ok(())
        }

        fn escape_pressed(&mut self, _delay_ms: i32) -> Result<bool, DisplayError> {
            self.polls += 1;
            Ok(self.polls >= self.escape_at)
        }
    }

    struct CountingProcessor {
        calls: usize,
    }

    impl FrameProcessor for CountingProcessor {
        fn process(&mut self, _frame: &Frame) -> Vec<Annotation> {
            self.calls += 1;
            vec![Annotation {
                left: 0,
                top: 0,
                right: 1,
                bottom: 1,
                label: "Face".into(),
                style: AnnotationStyle::Detection,
            }]
        }
    }

    fn frame(seq: u64) -> Frame {
        // 2x1: red then blue.
        Frame::from_rgb(vec![255, 0, 0, 0, 0, 255], 2, 1, seq).unwrap()
    }

    fn sink(escape_at: usize) -> RecordingSink {
        RecordingSink { shown: Vec::new(), polls: 0, escape_at }
    }

    #[test]
    fn test_skips_empty_and_failed_reads() {
        let source = ScriptedSource {
            ticks: VecDeque::from(vec![Tick::Frame(frame(1)), Tick::Empty, Tick::Fail, Tick::Frame(frame(2))]),
        };
        let mut window = sink(4);
        let mut processor = CountingProcessor { calls: 0 };

        let stats = run(source, &mut window, &mut processor).unwrap();

        assert_eq!(stats, LoopStats { shown: 2, skipped: 2 });
        assert_eq!(processor.calls, 2);
        let seqs: Vec<u64> = window.shown.iter().map(|s| s.0).collect();
        assert_eq!(seqs, vec![1, 2]);
        assert!(window.shown.iter().all(|s| s.2 == 1));
    }

    #[test]
    fn test_escape_stops_after_current_tick() {
        let source = ScriptedSource {
            ticks: (1..=10).map(|i| Tick::Frame(frame(i))).collect(),
        };
        let mut window = sink(3);
        let mut processor = CountingProcessor { calls: 0 };

        let stats = run(source, &mut window, &mut processor).unwrap();

        assert_eq!(stats.shown, 3);
        assert_eq!(window.polls, 3);
    }

    #[test]
    fn test_frames_are_mirrored_before_display() {
        let source = ScriptedSource {
            ticks: VecDeque::from(vec![Tick::Frame(frame(1))]),
        };
        let mut window = sink(1);

        run(source, &mut window, &mut CountingProcessor { calls: 0 }).unwrap();

        assert_eq!(window.shown[0].1, vec![0, 0, 255, 255, 0, 0]);
    }
}
