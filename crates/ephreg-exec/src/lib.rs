mod error;
pub use error::ExecError;

pub mod command;
pub use command::{CommandOutput, CommandSpec, run_command};

mod hosts;
pub use hosts::HostsFile;

mod port_forward;
pub use port_forward::PortForward;

pub mod tools;
