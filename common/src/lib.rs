pub mod message;
pub mod order;
pub mod reconcile;
pub mod review;
pub mod user;
pub mod wallet;
pub mod wire;
