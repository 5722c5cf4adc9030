//! Chronicle Core: the event-sourcing data model and its seams.
//!
//! This crate defines stored events, aggregates, commands, the entity
//! projector and the storage traits the write pipeline depends on. It
//! contains no infrastructure code.

pub mod aggregate;
pub mod audit;
pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod handler;
pub mod id;
pub mod notification;
pub mod projector;
pub mod repository;
