//! Application boundary — port traits and the inbound event vocabulary.
//!
//! Everything the agent core consumes from the outside world is expressed
//! as a trait in [`ports`]; everything the transport hands back in is one
//! of the plain structs in [`events`].  Both are free of SDK types so the
//! core stays testable on the host.

pub mod events;
pub mod ports;
