pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod push;
pub mod reconciler;
pub mod session;
pub mod state;
pub mod wallet_sync;
