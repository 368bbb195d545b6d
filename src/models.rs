//! These models represent the objects passed around by the agent
//!
//! There are a few related formats we need to interact with:
//! - openai-compatible messages/tools, sent from the agent to the model server
//! - capability requests, sent from the agent to the tools it can operate
//!
//! These overlap but do not match exactly, so incoming data is converted to
//! the internal structs immediately at the provider boundary.
pub mod content;
pub mod message;
pub mod role;
pub mod tool;
