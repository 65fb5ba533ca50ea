use thiserror::Error;
use tricolor_common::ToolError;
use tricolor_hdl::ElaborationError;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Elaboration(#[from] ElaborationError),
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to read Yosys netlist: {0}")]
    Netlist(String),
    #[error("Simulation error: {0}")]
    Simulation(String),
    #[error("Design '{0}' has no cover properties to check")]
    NoCovers(String),
}
