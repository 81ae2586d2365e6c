pub mod agent;
pub mod behavior;
pub mod conversation;
pub mod errors;
pub mod knowledge_base;
pub mod metrics;
pub mod models;
pub mod prompt_template;
pub mod providers;
pub mod registry;
pub mod router;
pub mod state;
