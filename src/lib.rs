pub mod auth;
pub mod cart;
pub mod common;
pub mod config;
pub mod domain;
pub mod graphql;
pub mod logging;
pub mod mailer;
pub mod metrics;
pub mod orders;
pub mod seed;
pub mod server;
pub mod slug;
pub mod storage;

pub use common::error::{Result, ShopError};
