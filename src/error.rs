use thiserror::Error;

/// Which side of the history an empty-stack error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum HistoryDirection {
    #[strum(serialize = "undo")]
    Undo,
    #[strum(serialize = "redo")]
    Redo,
}

/// A selection that would put a knob downstream of the target.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderViolation {
    #[error("Cannot use knob beyond target location (knob at {knob_index}, target at {target_index}).")]
    KnobBeyondTarget {
        knob_index: usize,
        target_index: usize,
    },

    #[error("Target must be at or beyond final knob (target at {target_index}, knob at {knob_index}).")]
    TargetBeforeKnob {
        target_index: usize,
        knob_index: usize,
    },
}

#[derive(Error, Debug)]
pub enum BeamForgeError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration Error: {0}")]
    Config(String),

    // --- Selection ---
    #[error("{0}")]
    OrderViolation(#[from] OrderViolation),

    // --- Validation ---
    #[error("All checked parameters must have a target value and weight ('{parameter}' is incomplete).")]
    IncompleteTarget { parameter: String },

    #[error("Nothing to optimize: {0}")]
    EmptySelection(String),

    #[error("Knob '{knob}' has no usable bounds for a bounded search")]
    MissingBounds { knob: String },

    // --- Runtime ---
    #[error("Numeric failure during optimization: {0}")]
    NumericFailure(String),

    #[error("Optimization cancelled after {evaluations} evaluations")]
    Cancelled { evaluations: usize },

    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    #[error("Nothing to {0}")]
    EmptyHistory(HistoryDirection),

    // --- Model lookups ---
    #[error("Unknown element '{0}'")]
    UnknownElement(String),

    #[error("Index {index} is outside the lattice (valid: {min}..={max})")]
    IndexOutOfRange { index: usize, min: usize, max: usize },

    #[error("Element name '{0}' is already in use")]
    DuplicateName(String),

    #[error("Element '{element}' has no attribute '{attribute}'")]
    UnknownAttribute { element: String, attribute: String },

    #[error("Attribute '{attribute}' of '{element}' is not numeric")]
    NonNumericAttribute { element: String, attribute: String },

    #[error("Unknown beam-state parameter '{0}'")]
    UnknownParameter(String),
}

pub type BfResult<T> = Result<T, BeamForgeError>;
