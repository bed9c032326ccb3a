pub mod manual_host;
pub mod orchestrator;
