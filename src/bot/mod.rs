pub mod anchors;
pub mod dispatch;
pub mod handlers;
pub mod parser;
pub mod session;

pub type HandlerResult = anyhow::Result<()>;

pub use dispatch::ReviewDispatcher;
pub use handlers::build_schema;
