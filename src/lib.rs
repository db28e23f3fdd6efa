pub mod auth;
pub mod compactor;
pub mod config;
pub mod error;
pub mod http;
pub mod ledger;
pub mod limits;
pub mod model;
pub mod normalize;
pub mod observability;
pub mod service;
pub mod store;
pub mod wal;
