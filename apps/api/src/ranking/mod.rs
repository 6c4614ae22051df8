// Resume ranking: criteria extraction, header titles, per-resume scoring, aggregation.
// All reasoning-service calls go through a `&dyn ReasoningService`; nothing here builds a client.

pub mod aggregator;
pub mod criteria;
pub mod handlers;
pub mod headers;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod scorer;
