/// Sensor interface shared by all drivers

/// A sensor that produces one decoded reading per call.
///
/// Reads are single-shot: drivers never retry internally, the caller owns
/// the retry policy.
pub trait Sensor {
    /// Decoded value produced by a successful read
    type Reading;

    /// Failure type, see [`Retryable`]
    type Error: Retryable;

    /// Human readable chip name
    fn name(&self) -> &'static str;

    /// Perform one complete measurement
    fn read(&mut self) -> Result<Self::Reading, Self::Error>;
}

/// Classifies errors for caller-side retry policies
pub trait Retryable {
    /// True when the same operation may succeed if attempted again
    /// (timing glitches, corrupted frames). False for configuration or
    /// setup failures that will not go away by themselves.
    fn is_transient(&self) -> bool;
}
