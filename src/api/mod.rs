pub mod handlers;
pub mod routes;

pub use handlers::{AppState, ROOT_ROUTE};
pub use routes::create_router;
