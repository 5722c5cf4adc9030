//! Read-side access to orders.

pub mod query_handlers;
