use super::types::Frame;
use crate::acceptance::Candidate;

/// Per-frame document detector supplied by the host.
///
/// Returns at most one candidate. Thresholds are applied by the pipeline,
/// not by the detector.
pub trait QuadDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Option<Candidate>;
}

impl<F> QuadDetector for F
where
    F: FnMut(&Frame) -> Option<Candidate> + Send,
{
    fn detect(&mut self, frame: &Frame) -> Option<Candidate> {
        self(frame)
    }
}
