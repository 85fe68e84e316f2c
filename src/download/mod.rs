//! Delivery channel: HTTP download endpoints.

pub mod handlers;
