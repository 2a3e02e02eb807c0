use sha2::{Digest, Sha256};
use thiserror::Error;

/// Trust level attached to the local identity standing in for a remote site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrustLevel {
    /// No relationship.
    #[default]
    None,
    /// We sent a friend request that the peer has not yet approved.
    PendingFriendRequest,
    /// The peer sent us a friend request we have not yet approved.
    FriendRequest,
    /// Mutual trust established; both read tokens exchanged.
    Friend,
}

/// Everything the state machine knows about one relationship.
///
/// `in_token` is minted locally and must be presented by the peer to read
/// our feed; `out_token` is received from the peer and presented when
/// reading theirs. The remaining two fields are handshake-transient and are
/// cleared once the relationship reaches [`TrustLevel::Friend`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipState {
    pub trust: TrustLevel,
    /// The requester's signature; held by both sides while in flight.
    pub accept_signature: Option<String>,
    /// The receiver-minted accept token identifying this handshake.
    pub accept_token: Option<String>,
    pub in_token: Option<String>,
    pub out_token: Option<String>,
}

/// One step of the handshake, from either the wire or the operator.
///
/// Fresh secrets are minted by the caller and passed in, which keeps the
/// transition function pure and every branch independently testable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeEvent {
    /// We are about to send a friend request with this freshly minted
    /// signature.
    SendRequest { signature: String },
    /// The peer answered our friend request. A `friend` token means the
    /// peer auto-accepted a crossed request; an `accept_token` means it is
    /// pending; neither is a generic ack (the peer may be ignoring
    /// incoming requests, but we cannot tell).
    RequestAcknowledged {
        accept_token: Option<String>,
        friend: Option<String>,
    },
    /// An inbound friend request. The minted token is used only if no
    /// accept token is stored yet, so duplicate requests never leak a
    /// second one.
    RequestReceived {
        signature: String,
        minted_accept_token: String,
    },
    /// An inbound friend request from a peer we already sent one to. Both
    /// operators have expressed intent, so the handshake completes at
    /// once: the inbound signature becomes the peer's read token.
    CrossedRequestReceived {
        signature: String,
        minted_in_token: String,
    },
    /// The operator approved this inbound request.
    Approve { minted_in_token: String },
    /// An inbound accept call already resolved to this relationship.
    AcceptReceived {
        token: String,
        friend: String,
        proof: String,
        minted_in_token: String,
    },
    /// The peer confirmed our approval and returned its read token.
    AcceptAcknowledged { friend: String },
    /// The relationship is removed; all secrets are discarded.
    Remove,
}

/// Side effects a transition asks the caller to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeAction {
    /// POST `{site_url, signature}` to the peer's friend-request endpoint.
    CallRequest { signature: String },
    /// Reply `{friend_request_pending}` to an inbound request.
    ReplyPending { accept_token: String },
    /// Record the global `accept_token -> relationship` lookup.
    RegisterAcceptLookup { accept_token: String },
    /// POST `{token, friend, proof}` to the peer's accepted endpoint.
    CallAccept {
        token: String,
        friend: String,
        proof: String,
    },
    /// Reply `{friend}` to an inbound accept.
    ReplyFriend { in_token: String },
    /// Delete the global `accept_token` lookup entry.
    DropAcceptLookup { accept_token: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("proof does not match the stored signature")]
    VerificationFailed,
    #[error("event is not valid at trust level {0:?}")]
    InvalidTransition(TrustLevel),
}

/// Proof that the accept caller saw the original request signature:
/// `sha256(accept_token || signature)`, hex encoded.
pub fn accept_proof(accept_token: &str, signature: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(accept_token.as_bytes());
    hasher.update(signature.as_bytes());
    to_hex(&hasher.finalize())
}

/// Applies one event to a relationship.
///
/// On `Err` the caller must discard the would-be state: the stored
/// relationship is left untouched (fail closed).
pub fn transition(
    mut state: RelationshipState,
    event: HandshakeEvent,
) -> Result<(RelationshipState, Vec<HandshakeAction>), TransitionError> {
    let actions = match event {
        HandshakeEvent::SendRequest { signature } => {
            if state.trust == TrustLevel::Friend {
                return Err(TransitionError::InvalidTransition(state.trust));
            }
            state.trust = TrustLevel::PendingFriendRequest;
            state.accept_signature = Some(signature.clone());
            vec![HandshakeAction::CallRequest { signature }]
        }
        HandshakeEvent::RequestAcknowledged {
            accept_token,
            friend,
        } => {
            if state.trust != TrustLevel::PendingFriendRequest {
                return Err(TransitionError::InvalidTransition(state.trust));
            }
            if let Some(friend) = friend {
                // The peer auto-accepted a crossed request in its reply.
                // The signature we sent is the token it will present.
                let Some(signature) = state.accept_signature.take() else {
                    return Err(TransitionError::InvalidTransition(state.trust));
                };
                state.trust = TrustLevel::Friend;
                state.in_token = Some(signature);
                state.out_token = Some(friend);
                state.accept_token = None;
                Vec::new()
            } else {
                match accept_token {
                    Some(token) => {
                        state.accept_token = Some(token.clone());
                        vec![HandshakeAction::RegisterAcceptLookup {
                            accept_token: token,
                        }]
                    }
                    // Generic ack: nothing to wait for, the request stays
                    // pending.
                    None => Vec::new(),
                }
            }
        }
        HandshakeEvent::RequestReceived {
            signature,
            minted_accept_token,
        } => match state.trust {
            // An established friendship is acknowledged, never demoted.
            TrustLevel::Friend => Vec::new(),
            // Crossed requests take their own event.
            TrustLevel::PendingFriendRequest => {
                return Err(TransitionError::InvalidTransition(state.trust));
            }
            TrustLevel::None | TrustLevel::FriendRequest => {
                // Idempotent: a duplicate request reuses the stored accept
                // token.
                let token = state.accept_token.take().unwrap_or(minted_accept_token);
                state.trust = TrustLevel::FriendRequest;
                state.accept_signature = Some(signature);
                state.accept_token = Some(token.clone());
                vec![HandshakeAction::ReplyPending {
                    accept_token: token,
                }]
            }
        },
        HandshakeEvent::CrossedRequestReceived {
            signature,
            minted_in_token,
        } => {
            if state.trust != TrustLevel::PendingFriendRequest {
                return Err(TransitionError::InvalidTransition(state.trust));
            }
            let mut actions = Vec::new();
            // Our own outgoing handshake is superseded; reclaim its lookup.
            if let Some(token) = state.accept_token.take() {
                actions.push(HandshakeAction::DropAcceptLookup {
                    accept_token: token,
                });
            }
            state.trust = TrustLevel::Friend;
            state.out_token = Some(signature);
            state.in_token = Some(minted_in_token.clone());
            state.accept_signature = None;
            actions.push(HandshakeAction::ReplyFriend {
                in_token: minted_in_token,
            });
            actions
        }
        HandshakeEvent::Approve { minted_in_token } => {
            if state.trust != TrustLevel::FriendRequest {
                return Err(TransitionError::InvalidTransition(state.trust));
            }
            let (Some(token), Some(signature)) =
                (state.accept_token.clone(), state.accept_signature.clone())
            else {
                return Err(TransitionError::InvalidTransition(state.trust));
            };
            let proof = accept_proof(&token, &signature);
            state.in_token = Some(minted_in_token.clone());
            // Trust flips to Friend only once the peer confirms.
            vec![HandshakeAction::CallAccept {
                token,
                friend: minted_in_token,
                proof,
            }]
        }
        HandshakeEvent::AcceptReceived {
            token,
            friend,
            proof,
            minted_in_token,
        } => {
            if state.trust != TrustLevel::PendingFriendRequest {
                return Err(TransitionError::InvalidTransition(state.trust));
            }
            let Some(signature) = state.accept_signature.as_deref() else {
                return Err(TransitionError::InvalidTransition(state.trust));
            };
            if proof != accept_proof(&token, signature) {
                return Err(TransitionError::VerificationFailed);
            }
            state.out_token = Some(friend);
            state.in_token = Some(minted_in_token.clone());
            state.trust = TrustLevel::Friend;
            state.accept_signature = None;
            state.accept_token = None;
            vec![
                HandshakeAction::DropAcceptLookup {
                    accept_token: token,
                },
                HandshakeAction::ReplyFriend {
                    in_token: minted_in_token,
                },
            ]
        }
        HandshakeEvent::AcceptAcknowledged { friend } => {
            if state.trust != TrustLevel::FriendRequest {
                return Err(TransitionError::InvalidTransition(state.trust));
            }
            state.out_token = Some(friend);
            state.trust = TrustLevel::Friend;
            state.accept_signature = None;
            state.accept_token = None;
            Vec::new()
        }
        HandshakeEvent::Remove => {
            // An in-flight accept token still has a registered lookup.
            let actions = match state.accept_token.take() {
                Some(token) => vec![HandshakeAction::DropAcceptLookup {
                    accept_token: token,
                }],
                None => Vec::new(),
            };
            state = RelationshipState::default();
            actions
        }
    };

    Ok((state, actions))
}

fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut hex = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
