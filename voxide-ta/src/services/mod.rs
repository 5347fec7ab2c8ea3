//! External collaborators, specified at their interface boundary
//!
//! The coordinator never performs speech recognition or language analysis
//! itself; these modules define the seams to the services that do, plus the
//! blob store both sides exchange artifacts through.

pub mod object_store;
pub mod text_analytics;

pub use object_store::{FsObjectStore, ObjectStore, StoreError};
pub use text_analytics::{
    AnalyticsError, DetectionJobRequest, HttpTextAnalytics, TextAnalytics,
};
