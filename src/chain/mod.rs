pub mod contracts;
pub mod events;
pub mod gas;
pub mod orchestrator;
pub mod providers;
pub mod session;
