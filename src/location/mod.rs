pub mod platform;
pub mod sample;
pub mod source;

pub use sample::{haversine_distance, LocationSample, SampleOrigin, SampleThrottle};
pub use source::{
    LocationSource, PermissionState, SampleSink, SourceEvent, WatchId, WatchOptions,
};
