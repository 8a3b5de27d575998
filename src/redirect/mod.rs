pub mod handlers;
pub mod help;
pub mod routes;

pub use routes::create_redirect_router;
