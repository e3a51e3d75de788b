// Vehicle state store and status/intent processing

mod processor;
mod store;
mod vehicle;

pub use processor::{
    AllStopProcessor, StatusIntentProcessor, Transition, DEFAULT_MAX_ACCEL, DEFAULT_MAX_CLOCK_SKEW_MS,
};
pub use store::{UpdateOutcome, VehicleStore};
pub use vehicle::{Vehicle, VehicleSnapshot, VehicleStatus};
