//! Amity core: pure site-config rules and the friend-handshake state machine.
mod handshake;
mod site_config;

pub use handshake::{
    accept_proof, transition, HandshakeAction, HandshakeEvent, RelationshipState, TransitionError,
    TrustLevel,
};
pub use site_config::{config_filenames, SiteConfig};
