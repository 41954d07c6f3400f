//! REST API for task listing and mutation.
//!
//! Caller identity comes from the `X-User-Id` header, which an upstream
//! authentication layer is trusted to have set from a verified token.

mod params;
mod server;

pub use params::parse_date;
pub use server::{ApiServer, AuthUser, USER_ID_HEADER, build_router, start_server};
