//! These models represent the objects passed around by the agent loop
//!
//! A conversation is a list of [`message::Message`]s, each tagged with a [`role::Role`]
//! and carrying an ordered list of content blocks. Tool requests issued by the model
//! and the results we send back are content blocks too, so the whole exchange can be
//! replayed to the model on every turn. Providers convert to and from their wire format
//! at the edge; nothing inside the crate depends on a particular API shape.
pub mod content;
pub mod message;
pub mod role;
pub mod tool;
