//! Client for the Gemini `generateContent` image endpoint.
//!
//! - [`messages`] -- typed request/response wire format.
//! - [`api`] -- REST client and error type.
//! - [`extract`] -- pulls image bytes and thought signatures out of a response.

pub mod api;
pub mod extract;
pub mod messages;
