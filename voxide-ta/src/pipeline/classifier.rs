//! Size-based path selection
//!
//! Pure decision function, no side effects. A missing or unreadable
//! transcript is the caller's error, not this component's.

use voxide_common::events::AnalysisPath;

/// Choose the processing path for a transcript of `byte_length` bytes.
///
/// Below the threshold the transcript fits the engine's request/response
/// API; at or above it, detection must run as submitted jobs.
pub fn route_for_length(byte_length: u64, threshold_bytes: u64) -> AnalysisPath {
    if byte_length < threshold_bytes {
        AnalysisPath::Synchronous
    } else {
        AnalysisPath::Asynchronous
    }
}
