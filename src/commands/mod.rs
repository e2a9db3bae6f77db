mod ls_command;
pub use ls_command::*;

mod run_command;
pub use run_command::*;
