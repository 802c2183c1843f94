pub mod runtime;
pub mod serve;

pub use runtime::init_logging;
pub use serve::{cmd_serve, ServeArgs};
