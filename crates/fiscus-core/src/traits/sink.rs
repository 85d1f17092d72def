//! Output sink trait for normalized record sets.

use crate::error::FiscusResult;
use crate::frame::Frame;

/// Writes a finished record set to its destination.
///
/// A sink either persists the whole frame or nothing: implementations must
/// not leave partial output behind on failure.
pub trait RecordSink {
    /// Persist the record set.
    fn write_frame(&mut self, frame: &Frame) -> FiscusResult<()>;

    /// Flush and finalize the destination.
    fn finish(self: Box<Self>) -> FiscusResult<()>;
}
