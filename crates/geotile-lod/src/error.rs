/// Errors raised by LOD configuration and per-tick ray construction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LodError {
    /// A tuning parameter is out of range.
    #[error("invalid LOD settings: {0}")]
    InvalidSettings(String),

    /// The camera cannot produce rays (bad clip planes, field of view, or a
    /// non-invertible view-projection).
    #[error("degenerate camera: {0}")]
    DegenerateCamera(&'static str),

    /// The requested screen position is not a finite NDC point.
    #[error("non-finite NDC coordinate ({x}, {y})")]
    InvalidNdc { x: f64, y: f64 },
}
