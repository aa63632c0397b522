//! These models represent the objects passed around by the agent
//!
//! There are two related formats we need to interact with:
//! - the conversation history kept for the UI, where tool plumbing is mostly hidden
//! - the completion endpoint wire format, sent to and received from the model
//!
//! Everything coming back from the model is decoded into [`response::ModelResponse`]
//! once at the boundary, so the rest of the crate never inspects loose JSON shapes.
pub mod message;
pub mod response;
pub mod role;
pub mod tool;
