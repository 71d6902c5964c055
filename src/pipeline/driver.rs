use super::detector::QuadDetector;
use super::mailbox::FrameMailbox;
use super::types::{CaptureOutcome, Frame, PipelineEvent};
use crate::acceptance::{AcceptanceGate, AcceptanceMode};
use crate::capture::{
    CaptureController, CaptureDevice, CaptureRequest, CaptureState, ControllerDecision,
};
use crate::config::ScanConfig;
use crate::errors::{RectifyError, ScanError};
use crate::geometry::Quad;
use crate::overlay::OverlayHold;
use crate::rectify::{DocumentImage, PerspectiveRectifier};
use crate::timing::{Clock, MonotonicClock};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use image::DynamicImage;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use uuid::Uuid;

enum Command {
    CaptureNow,
    SetAutoCapture(bool),
}

/// Producer side of the frame hand-off. Never blocks.
#[derive(Clone)]
pub struct FrameSender {
    mailbox: Arc<FrameMailbox<Frame>>,
    next_sequence: Arc<AtomicU64>,
}

impl FrameSender {
    /// Stamp the frame's sequence number and enqueue it, displacing the oldest pending frame if full.
    pub fn send(&self, mut frame: Frame) -> Result<(), ScanError> {
        frame.sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        if self.mailbox.push_drop_oldest(frame) {
            Ok(())
        } else {
            Err(ScanError::Pipeline("pipeline is shut down".to_string()))
        }
    }

    pub fn dropped(&self) -> u64 {
        self.mailbox.dropped()
    }
}

pub struct PipelineBuilder {
    config: ScanConfig,
    detector: Box<dyn QuadDetector>,
    device: Box<dyn CaptureDevice>,
    still_detector: Option<Box<dyn QuadDetector>>,
    clock: Arc<dyn Clock>,
}

impl PipelineBuilder {
    pub fn new(
        config: ScanConfig,
        detector: impl QuadDetector + 'static,
        device: impl CaptureDevice + 'static,
    ) -> Self {
        Self {
            config,
            detector: Box::new(detector),
            device: Box::new(device),
            still_detector: None,
            clock: Arc::new(MonotonicClock::new()),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Detector run on every full-resolution still, with the manual thresholds.
    pub fn with_still_detector(mut self, detector: impl QuadDetector + 'static) -> Self {
        self.still_detector = Some(Box::new(detector));
        self
    }

    pub fn start(self) -> Result<PipelineHandle, ScanError> {
        self.config.validate()?;
        let settings = &self.config.pipeline;

        let mailbox = Arc::new(FrameMailbox::new(settings.frame_queue_capacity));
        let (event_tx, event_rx) = bounded(settings.event_queue_capacity);
        let (outcome_tx, outcome_rx) = unbounded();
        let (command_tx, command_rx) = unbounded();
        let (job_tx, job_rx) = unbounded();
        let (done_tx, done_rx) = unbounded();
        let stop_flag = Arc::new(AtomicBool::new(false));
        let gate = AcceptanceGate::new(self.config.acceptance.clone());

        let capture_worker = CaptureWorker {
            device: self.device,
            still_detector: self.still_detector,
            gate: gate.clone(),
            rectifier: PerspectiveRectifier::from_config(&self.config.rectify),
            jobs: job_rx,
            outcomes: outcome_tx,
            done: done_tx,
        };
        let capture_thread = std::thread::Builder::new()
            .name("crabscan-capture".to_string())
            .spawn(move || capture_worker.run())
            .map_err(|e| ScanError::Pipeline(format!("spawn failed: {e}")))?;

        let detection_worker = DetectionWorker {
            detector: self.detector,
            gate,
            controller: CaptureController::from_config(&self.config),
            overlay: OverlayHold::from_config(&self.config.overlay),
            clock: self.clock,
            mailbox: mailbox.clone(),
            commands: command_rx,
            events: event_tx,
            jobs: job_tx,
            done: done_rx,
            stop_flag: stop_flag.clone(),
            idle_tick: settings.idle_tick(),
            in_flight: None,
            last_frame_size: (0, 0),
            dropped_events: 0,
        };
        let detection_thread = std::thread::Builder::new()
            .name("crabscan-detect".to_string())
            .spawn(move || detection_worker.run())
            .map_err(|e| ScanError::Pipeline(format!("spawn failed: {e}")))?;

        log::info!(
            "Pipeline started (window {}, cooldown {:?}, auto-capture {})",
            self.config.stability.window_size,
            self.config.capture.cooldown(),
            self.config.capture.auto_capture
        );

        Ok(PipelineHandle {
            frames: FrameSender {
                mailbox,
                next_sequence: Arc::new(AtomicU64::new(0)),
            },
            commands: command_tx,
            events: event_rx,
            captures: outcome_rx,
            stop_flag,
            threads: vec![detection_thread, capture_thread],
            join_timeout: settings.join_timeout(),
        })
    }
}

/// Owner-side handle of a running pipeline. Dropping it shuts the pipeline down.
pub struct PipelineHandle {
    frames: FrameSender,
    commands: Sender<Command>,
    events: Receiver<PipelineEvent>,
    captures: Receiver<CaptureOutcome>,
    stop_flag: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
    join_timeout: Duration,
}

impl PipelineHandle {
    pub fn submit_frame(&self, frame: Frame) -> Result<(), ScanError> {
        self.frames.send(frame)
    }

    /// Cloneable producer for a frame-source thread.
    pub fn frame_sender(&self) -> FrameSender {
        self.frames.clone()
    }

    /// Overlay, stability and state notifications. Events are dropped if nobody reads them.
    pub fn events(&self) -> &Receiver<PipelineEvent> {
        &self.events
    }

    /// One outcome per capture request, in request order.
    pub fn captures(&self) -> &Receiver<CaptureOutcome> {
        &self.captures
    }

    /// Request a manual capture. Refused (with an event) while cooling down.
    pub fn capture_now(&self) -> Result<(), ScanError> {
        self.send_command(Command::CaptureNow)
    }

    pub fn set_auto_capture(&self, enabled: bool) -> Result<(), ScanError> {
        self.send_command(Command::SetAutoCapture(enabled))
    }

    pub fn dropped_frames(&self) -> u64 {
        self.frames.dropped()
    }

    pub fn is_running(&self) -> bool {
        !self.threads.is_empty()
    }

    fn send_command(&self, command: Command) -> Result<(), ScanError> {
        self.commands
            .send(command)
            .map_err(|_| ScanError::Pipeline("pipeline is shut down".to_string()))
    }

    /// Stop both workers. An in-flight capture is allowed to finish.
    pub fn shutdown(&mut self, join_timeout: Duration) -> Result<(), ScanError> {
        self.stop_flag.store(true, Ordering::Relaxed);
        self.frames.mailbox.close();

        let start = Instant::now();
        while let Some(handle) = self.threads.first() {
            if handle.is_finished() {
                let handle = self.threads.remove(0);
                if handle.join().is_err() {
                    log::error!("Pipeline worker panicked");
                }
                continue;
            }
            if start.elapsed() >= join_timeout {
                // Keep the remaining handles so a later shutdown can retry.
                return Err(ScanError::Pipeline(
                    "timed out waiting for pipeline workers".to_string(),
                ));
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        log::info!("Pipeline stopped");
        Ok(())
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        if self.threads.is_empty() {
            return;
        }
        if let Err(e) = self.shutdown(self.join_timeout) {
            log::warn!("Error shutting down pipeline in drop: {}", e);
        }
    }
}

/// Serial owner of the detection window, controller and overlay state.
struct DetectionWorker {
    detector: Box<dyn QuadDetector>,
    gate: AcceptanceGate,
    controller: CaptureController,
    overlay: OverlayHold,
    clock: Arc<dyn Clock>,
    mailbox: Arc<FrameMailbox<Frame>>,
    commands: Receiver<Command>,
    events: Sender<PipelineEvent>,
    jobs: Sender<CaptureRequest>,
    done: Receiver<Uuid>,
    stop_flag: Arc<AtomicBool>,
    idle_tick: Duration,
    in_flight: Option<Uuid>,
    last_frame_size: (u32, u32),
    dropped_events: u64,
}

impl DetectionWorker {
    fn run(mut self) {
        log::debug!("Detection worker started");
        loop {
            if self.stop_flag.load(Ordering::Relaxed) {
                break;
            }
            self.drain_done();
            self.drain_commands();

            match self.mailbox.pop_timeout(self.idle_tick) {
                Ok(Some(frame)) => self.process_frame(&frame),
                Ok(None) => self.idle(),
                Err(_) => break,
            }
        }
        if self.dropped_events > 0 {
            log::debug!("{} pipeline events were not delivered", self.dropped_events);
        }
        log::debug!("Detection worker stopped");
    }

    fn drain_done(&mut self) {
        while let Ok(id) = self.done.try_recv() {
            if self.in_flight == Some(id) {
                self.in_flight = None;
            }
        }
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                Command::CaptureNow => self.manual_capture(),
                Command::SetAutoCapture(enabled) => self.controller.set_auto_capture(enabled),
            }
        }
    }

    fn process_frame(&mut self, frame: &Frame) {
        let now = self.clock.now();
        let size = frame.size();
        self.last_frame_size = size;
        self.tick_controller(now);

        let candidate = self.detector.detect(frame);
        let accepted = self
            .gate
            .check(candidate.as_ref(), size, AcceptanceMode::Live);

        if let Some(update) = self.overlay.observe(accepted.as_ref().ok().copied(), now) {
            self.emit(PipelineEvent::Overlay(update));
        }

        let can_trigger = self.in_flight.is_none();
        match self
            .controller
            .observe_gated(accepted, size, now, can_trigger)
        {
            ControllerDecision::CoolingDown { remaining } => {
                log::trace!("Frame {} ignored, cooling down ({:?})", frame.sequence, remaining);
            }
            ControllerDecision::WindowReset { rejection, .. } => {
                log::trace!("Frame {} rejected: {}", frame.sequence, rejection);
                self.emit(PipelineEvent::DetectionRejected {
                    sequence: frame.sequence,
                    rejection,
                });
            }
            ControllerDecision::Evaluated { verdict, progress } => {
                self.emit(PipelineEvent::Stability {
                    sequence: frame.sequence,
                    verdict,
                    progress,
                });
            }
            ControllerDecision::Capture(request) => self.dispatch(request, now),
        }
    }

    fn idle(&mut self) {
        let now = self.clock.now();
        self.tick_controller(now);
        if let Some(update) = self.overlay.tick(now) {
            self.emit(PipelineEvent::Overlay(update));
        }
    }

    fn tick_controller(&mut self, now: Duration) {
        if self.controller.tick(now) {
            self.emit(PipelineEvent::StateChanged(CaptureState::Idle));
        }
    }

    fn manual_capture(&mut self) {
        let now = self.clock.now();
        if self.in_flight.is_some() {
            log::warn!("Manual capture refused, a capture is still in flight");
            self.emit(PipelineEvent::ManualCaptureRefused {
                remaining: Duration::ZERO,
            });
            return;
        }

        match self
            .controller
            .request_manual(self.overlay.current(), self.last_frame_size, now)
        {
            Some(request) => self.dispatch(request, now),
            None => {
                let remaining = match self.controller.state(now) {
                    CaptureState::Cooldown { remaining } => remaining,
                    CaptureState::Idle => Duration::ZERO,
                };
                self.emit(PipelineEvent::ManualCaptureRefused { remaining });
            }
        }
    }

    fn dispatch(&mut self, request: CaptureRequest, now: Duration) {
        if let Some(pending) = self.in_flight {
            log::warn!(
                "Capture {} still in flight, dropping request {}",
                pending,
                request.id
            );
            return;
        }

        self.in_flight = Some(request.id);
        self.emit(PipelineEvent::CaptureRequested(request.clone()));
        self.emit(PipelineEvent::StateChanged(self.controller.state(now)));

        if self.jobs.send(request).is_err() {
            log::error!("Capture worker is not running");
            self.in_flight = None;
        }
    }

    fn emit(&mut self, event: PipelineEvent) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped_events = self.dropped_events.saturating_add(1);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

/// Takes stills and rectifies them, one request at a time.
struct CaptureWorker {
    device: Box<dyn CaptureDevice>,
    still_detector: Option<Box<dyn QuadDetector>>,
    gate: AcceptanceGate,
    rectifier: PerspectiveRectifier,
    jobs: Receiver<CaptureRequest>,
    outcomes: Sender<CaptureOutcome>,
    done: Sender<Uuid>,
}

impl CaptureWorker {
    fn run(mut self) {
        log::debug!("Capture worker started");
        while let Ok(request) = self.jobs.recv() {
            let outcome = self.process(request);
            // Release the in-flight slot before the consumer can observe the outcome.
            if self.done.send(outcome.request().id).is_err() {
                log::debug!("Capture {} finished after detection stopped", outcome.request().id);
            }
            if self.outcomes.send(outcome).is_err() {
                log::debug!("Capture outcome dropped, no consumer");
            }
        }
        log::debug!("Capture worker stopped");
    }

    fn process(&mut self, request: CaptureRequest) -> CaptureOutcome {
        let still = match self.device.capture_still(&request) {
            Ok(image) => image,
            Err(error) => {
                log::error!("Still capture {} failed: {}", request.id, error);
                return CaptureOutcome::Failed { request, error };
            }
        };

        let document = match self.locate(&request, &still) {
            Some(quad) => self.rectifier.rectify_or_original(still, &quad),
            None => {
                log::warn!("No document outline for capture {}, using original", request.id);
                DocumentImage::Original {
                    image: still,
                    reason: RectifyError::MissingQuad,
                }
            }
        };

        let (width, height) = document.dimensions();
        log::info!(
            "Capture {} complete: {}x{} ({})",
            request.id,
            width,
            height,
            if document.is_rectified() {
                "rectified"
            } else {
                "original"
            }
        );
        CaptureOutcome::Completed { request, document }
    }

    /// Quad in still-image pixels: a fresh detection on the still if one is
    /// accepted, otherwise the request's preview quad scaled to the still.
    fn locate(&mut self, request: &CaptureRequest, still: &DynamicImage) -> Option<Quad> {
        let size = (still.width(), still.height());
        if let Some(detector) = self.still_detector.as_mut() {
            let frame = Frame::from_image(still);
            match self
                .gate
                .check(detector.detect(&frame).as_ref(), size, AcceptanceMode::Manual)
            {
                Ok(quad) => return Some(quad),
                Err(rejection) => {
                    log::info!(
                        "Still re-detection for {:?} capture rejected: {}",
                        request.trigger,
                        rejection
                    );
                }
            }
        }
        request.quad_for(size.0, size.1)
    }
}
