#[cfg(test)]
mod error_tests {
    use crabscan::errors::{Rejection, RectifyError, ScanError};
    use std::error::Error;

    #[test]
    fn test_capture_device_failure() {
        let error = ScanError::CaptureDeviceFailure("shutter stuck".to_string());
        assert!(error.to_string().contains("Capture device error"));
        assert!(error.to_string().contains("shutter stuck"));
    }

    #[test]
    fn test_rectification_failed_has_source() {
        let error = ScanError::from(RectifyError::NonInvertible);
        assert!(error.to_string().contains("Rectification failed"));
        assert!(error.source().is_some());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let error: ScanError = io.into();
        assert!(matches!(error, ScanError::Io(_)));
        assert!(error.to_string().contains("missing"));
    }

    #[test]
    fn test_output_too_large_display() {
        let error = RectifyError::OutputTooLarge {
            width: 9000,
            height: 100,
            max: 8192,
        };
        assert_eq!(error.to_string(), "output 9000x100 exceeds maximum side 8192");
    }

    #[test]
    fn test_rejection_display() {
        assert_eq!(Rejection::Miss.to_string(), "no quad detected");
        let aspect = Rejection::AspectOutOfRange { ratio: 0.1, min: 0.2 };
        assert_eq!(aspect.to_string(), "aspect ratio 0.100 below minimum 0.200");
    }

    #[test]
    fn test_error_debug_format() {
        let error = ScanError::Pipeline("closed".to_string());
        let debug_str = format!("{:?}", error);
        assert!(debug_str.contains("Pipeline"));
    }
}
