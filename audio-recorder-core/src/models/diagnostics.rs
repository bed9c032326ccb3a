/// Counters describing what the capture callback has handed to the pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureDiagnostics {
    /// Quanta accepted into the aggregator queue.
    pub quanta_captured: u64,
    /// Quanta dropped because the aggregator queue was full.
    pub quanta_dropped: u64,
    /// Per-channel frames accepted into the aggregator queue.
    pub samples_captured: u64,
}
