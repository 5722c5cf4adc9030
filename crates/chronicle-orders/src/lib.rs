//! Chronicle Orders: the reference domain for the write pipeline.
//!
//! An order is created for a customer, collects lines, and is then either
//! shipped or cancelled.

pub mod application;
pub mod domain;
