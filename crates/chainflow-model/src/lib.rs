pub mod builder;
pub mod config;
pub mod error;
pub mod network;
pub mod report;
pub mod solution;

pub use builder::{FlowModel, ModelBuilder, VariableLayout};
pub use config::{ArcTable, NetworkConfig, NodeTable};
pub use error::NetworkError;
pub use network::Network;
pub use report::Reporter;
pub use solution::{Flow, FlowSolution};
