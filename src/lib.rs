//! api-edge - strips the `/api` prefix at the edge and forwards to origin

pub mod config;
pub mod edge;
pub mod error;
pub mod event;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod origin;
pub mod rewrite;
pub mod server;
