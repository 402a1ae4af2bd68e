pub mod scopes;

pub use scopes::{router as scopes_router, AppState, ADMIN_TOKEN_HEADER};
