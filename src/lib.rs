// Status-and-intent message model and validation
pub mod status;

// Vehicle state store
pub mod state;

// Intersection geometry
pub mod intersection;

// All-stop scheduling algorithm and schedule output
pub mod schedule;

// Scheduling cadence control
pub mod cadence;

// Transport capabilities and NATS implementation
pub mod transport;
pub mod nats;

// Service configuration
pub mod config;

// Ingestion and scheduling loops
pub mod pipeline;
