// NATS transport: status intents in, schedules out

mod client;
mod publisher;

pub use client::{NatsClient, NatsConfig, StatusIntentConsumer};
pub use publisher::SchedulePublisher;
