use morpho_protocol::Subroutine;
use protocol::ProtocolDocument;
use store::default_store;

pub use morpho_protocol;

pub mod about;
pub mod config;
pub mod control_loop;
pub mod engine;
pub mod error;
pub mod logging;
pub mod matcher;
pub mod predict;
pub mod protocol;
pub mod risk;
pub mod store;
pub mod verification;

/// Looks up and lowers a target against the process-wide database.
pub fn compile(organ: &str, species: &str) -> Option<ProtocolDocument> {
    matcher::find_subroutine(default_store(), organ, species).map(protocol::assemble)
}

/// Inverse lookup against the process-wide database.
pub fn predict(vmem: f64, spatial_domain: &str, species: Option<&str>) -> Vec<&'static Subroutine> {
    predict::predict(default_store(), vmem, spatial_domain, species)
}
