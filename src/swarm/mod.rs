//! Investigation swarm - parallel specialists under a shared deadline

mod orchestrator;
pub mod specialists;

pub use orchestrator::SwarmOrchestrator;
pub use specialists::{
    CorrelatorSpecialist, EmbeddingSpecialist, GraphSpecialist, LogSpecialist, MetricsSpecialist,
    Specialist,
};
