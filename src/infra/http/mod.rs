mod auth;
mod middleware;
mod public;

pub use auth::StaffGate;
pub use public::{HttpState, build_router};
