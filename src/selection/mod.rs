pub mod knob;
pub mod target;
pub mod tracker;

pub use self::knob::{derive_bounds, Bounds, Knob, KnobEntry, KnobRegistry};
pub use self::target::{Goal, TargetParam, TargetSpec};
pub use self::tracker::IndexTracker;
