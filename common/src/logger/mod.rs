mod init;
mod spans;
mod trace_id;

pub use init::init_logger;
pub use spans::{run_span, symbol_span};
pub use trace_id::RunId;
