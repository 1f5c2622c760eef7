mod ask;
mod chat;
mod chunk;
mod config;
mod search;
mod setup;
mod status;

pub use ask::AskArgs;
pub use chat::ChatArgs;
pub use chunk::ChunkArgs;
pub use config::ConfigCommand;
pub use search::SearchArgs;

pub use ask::handle_ask;
pub use chat::handle_chat;
pub use chunk::handle_chunk;
pub use config::handle_config;
pub use search::handle_search;
pub use status::handle_status;
