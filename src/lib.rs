pub mod cli;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod session;
pub mod utils;

pub use cli::{Cli, Commands};
pub use error::PipelineError;
pub use models::{Config, OutputFormat};
pub use session::{Answer, IngestReport, Session, SessionOptions};
