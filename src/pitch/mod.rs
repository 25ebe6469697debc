//! Pitch estimation: live estimators, their invocation schedule, and the
//! precomputed reference curves songs are compared against.

pub mod estimator;
pub mod reference;
pub mod schedule;

pub use estimator::{
    build_estimator, AccurateEstimator, FastEstimator, PitchEstimate, PitchEstimator,
    WindowDetector,
};
pub use reference::{list_curves, ReferenceCurve, ReferenceError, ReferenceRow};
pub use schedule::EstimationSchedule;
