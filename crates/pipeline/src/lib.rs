//! Asynchronous mockup generation pipeline.
//!
//! The [`dispatcher::JobDispatcher`] validates and persists requests and
//! enqueues a self-contained [`queue::GenerationJob`]. The
//! [`worker::GenerationWorker`] drains the queue, calls the provider through
//! the [`adapter::GenerationAdapter`], and persists images and continuation
//! signatures. All I/O goes through the traits in [`ports`].

pub mod adapter;
pub mod config;
pub mod continuation;
pub mod dispatcher;
pub mod error;
pub mod ports;
pub mod queue;
pub mod storage;
pub mod store;
pub mod upscale;
pub mod views;
pub mod worker;
