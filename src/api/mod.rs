//! RPC surface (section 6), expressed as axum HTTP+JSON endpoints rather
//! than literal gRPC — see DESIGN.md's Open Question resolution. Grounded
//! on wkmp-ap's `api/server.rs` + `api/handlers.rs` routing/handler split.

pub mod handlers;
pub mod server;
pub mod types;
