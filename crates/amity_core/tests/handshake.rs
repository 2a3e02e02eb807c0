use amity_core::{
    accept_proof, transition, HandshakeAction, HandshakeEvent, RelationshipState, TransitionError,
    TrustLevel,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(amity_logging::initialize_for_tests);
}

/// Drives the full three-message exchange between a requester and a
/// receiver, returning both final states.
fn run_full_handshake() -> (RelationshipState, RelationshipState) {
    init_logging();
    let requester = RelationshipState::default();
    let receiver = RelationshipState::default();

    // Requester mints a signature and sends the request.
    let (requester, actions) = transition(
        requester,
        HandshakeEvent::SendRequest {
            signature: "sig-r".into(),
        },
    )
    .unwrap();
    assert_eq!(
        actions,
        vec![HandshakeAction::CallRequest {
            signature: "sig-r".into()
        }]
    );

    // Receiver handles it and replies with an accept token.
    let (receiver, actions) = transition(
        receiver,
        HandshakeEvent::RequestReceived {
            signature: "sig-r".into(),
            minted_accept_token: "accept-s".into(),
        },
    )
    .unwrap();
    assert_eq!(
        actions,
        vec![HandshakeAction::ReplyPending {
            accept_token: "accept-s".into()
        }]
    );
    assert_eq!(receiver.trust, TrustLevel::FriendRequest);

    // Requester records the token so it can resolve the later accept call.
    let (requester, actions) = transition(
        requester,
        HandshakeEvent::RequestAcknowledged {
            accept_token: Some("accept-s".into()),
            friend: None,
        },
    )
    .unwrap();
    assert_eq!(
        actions,
        vec![HandshakeAction::RegisterAcceptLookup {
            accept_token: "accept-s".into()
        }]
    );
    assert_eq!(requester.trust, TrustLevel::PendingFriendRequest);

    // Receiver's operator approves; the accept call carries the proof.
    let (receiver, actions) = transition(
        receiver,
        HandshakeEvent::Approve {
            minted_in_token: "in-s".into(),
        },
    )
    .unwrap();
    let expected_proof = accept_proof("accept-s", "sig-r");
    assert_eq!(
        actions,
        vec![HandshakeAction::CallAccept {
            token: "accept-s".into(),
            friend: "in-s".into(),
            proof: expected_proof.clone(),
        }]
    );

    // Requester verifies the proof and completes its side.
    let (requester, actions) = transition(
        requester,
        HandshakeEvent::AcceptReceived {
            token: "accept-s".into(),
            friend: "in-s".into(),
            proof: expected_proof,
            minted_in_token: "in-r".into(),
        },
    )
    .unwrap();
    assert_eq!(
        actions,
        vec![
            HandshakeAction::DropAcceptLookup {
                accept_token: "accept-s".into()
            },
            HandshakeAction::ReplyFriend {
                in_token: "in-r".into()
            },
        ]
    );

    // Receiver stores the returned read token and is done.
    let (receiver, actions) = transition(
        receiver,
        HandshakeEvent::AcceptAcknowledged {
            friend: "in-r".into(),
        },
    )
    .unwrap();
    assert_eq!(actions, Vec::new());

    (requester, receiver)
}

#[test]
fn full_handshake_ends_with_mirrored_tokens() {
    let (requester, receiver) = run_full_handshake();

    assert_eq!(requester.trust, TrustLevel::Friend);
    assert_eq!(receiver.trust, TrustLevel::Friend);

    // Each direction has an independent secret, mirrored across the sides.
    assert_eq!(requester.out_token, receiver.in_token);
    assert_eq!(receiver.out_token, requester.in_token);
    assert_ne!(requester.in_token, requester.out_token);
}

#[test]
fn full_handshake_clears_transient_secrets() {
    let (requester, receiver) = run_full_handshake();
    assert_eq!(requester.accept_signature, None);
    assert_eq!(requester.accept_token, None);
    assert_eq!(receiver.accept_signature, None);
    assert_eq!(receiver.accept_token, None);
}

#[test]
fn duplicate_request_reuses_the_stored_accept_token() {
    init_logging();
    let (receiver, _) = transition(
        RelationshipState::default(),
        HandshakeEvent::RequestReceived {
            signature: "sig-r".into(),
            minted_accept_token: "first".into(),
        },
    )
    .unwrap();

    let (receiver, actions) = transition(
        receiver,
        HandshakeEvent::RequestReceived {
            signature: "sig-r".into(),
            minted_accept_token: "second".into(),
        },
    )
    .unwrap();

    // The retry is answered with the original token; nothing new leaks.
    assert_eq!(
        actions,
        vec![HandshakeAction::ReplyPending {
            accept_token: "first".into()
        }]
    );
    assert_eq!(receiver.accept_token.as_deref(), Some("first"));
}

#[test]
fn accept_with_bad_proof_fails_closed() {
    init_logging();
    let (requester, _) = transition(
        RelationshipState::default(),
        HandshakeEvent::SendRequest {
            signature: "sig-r".into(),
        },
    )
    .unwrap();
    let (requester, _) = transition(
        requester,
        HandshakeEvent::RequestAcknowledged {
            accept_token: Some("accept-s".into()),
            friend: None,
        },
    )
    .unwrap();

    let before = requester.clone();
    let err = transition(
        requester,
        HandshakeEvent::AcceptReceived {
            token: "accept-s".into(),
            friend: "in-s".into(),
            proof: "forged".into(),
            minted_in_token: "in-r".into(),
        },
    )
    .unwrap_err();

    assert_eq!(err, TransitionError::VerificationFailed);
    // The caller keeps the untouched prior state.
    assert_eq!(before.trust, TrustLevel::PendingFriendRequest);
    assert_eq!(before.accept_signature.as_deref(), Some("sig-r"));
}

#[test]
fn approve_requires_an_inbound_request() {
    init_logging();
    let err = transition(
        RelationshipState::default(),
        HandshakeEvent::Approve {
            minted_in_token: "in-s".into(),
        },
    )
    .unwrap_err();
    assert_eq!(err, TransitionError::InvalidTransition(TrustLevel::None));
}

#[test]
fn accept_requires_an_outstanding_request() {
    init_logging();
    let err = transition(
        RelationshipState::default(),
        HandshakeEvent::AcceptReceived {
            token: "t".into(),
            friend: "f".into(),
            proof: "p".into(),
            minted_in_token: "i".into(),
        },
    )
    .unwrap_err();
    assert_eq!(err, TransitionError::InvalidTransition(TrustLevel::None));
}

#[test]
fn remove_discards_every_secret() {
    let (requester, _) = run_full_handshake();
    let (requester, actions) = transition(requester, HandshakeEvent::Remove).unwrap();
    assert_eq!(actions, Vec::new());
    assert_eq!(requester, RelationshipState::default());
}

#[test]
fn request_to_an_established_friend_is_rejected() {
    let (requester, _) = run_full_handshake();
    let err = transition(
        requester,
        HandshakeEvent::SendRequest {
            signature: "sig-2".into(),
        },
    )
    .unwrap_err();
    assert_eq!(err, TransitionError::InvalidTransition(TrustLevel::Friend));
}

#[test]
fn crossed_requests_befriend_both_sides_without_approval() {
    init_logging();
    // Side A sent a request and holds the peer's pending accept token.
    let (side_a, _) = transition(
        RelationshipState::default(),
        HandshakeEvent::SendRequest {
            signature: "sig-a".into(),
        },
    )
    .unwrap();
    let (side_a, _) = transition(
        side_a,
        HandshakeEvent::RequestAcknowledged {
            accept_token: Some("accept-b".into()),
            friend: None,
        },
    )
    .unwrap();

    // The peer's own request arrives instead of an approval.
    let (side_a, actions) = transition(
        side_a,
        HandshakeEvent::CrossedRequestReceived {
            signature: "sig-b".into(),
            minted_in_token: "in-a".into(),
        },
    )
    .unwrap();
    assert_eq!(
        actions,
        vec![
            HandshakeAction::DropAcceptLookup {
                accept_token: "accept-b".into()
            },
            HandshakeAction::ReplyFriend {
                in_token: "in-a".into()
            },
        ]
    );
    assert_eq!(side_a.trust, TrustLevel::Friend);
    assert_eq!(side_a.accept_signature, None);
    assert_eq!(side_a.accept_token, None);

    // Side B sent "sig-b" and gets the completed reply.
    let (side_b, _) = transition(
        RelationshipState::default(),
        HandshakeEvent::SendRequest {
            signature: "sig-b".into(),
        },
    )
    .unwrap();
    let (side_b, actions) = transition(
        side_b,
        HandshakeEvent::RequestAcknowledged {
            accept_token: None,
            friend: Some("in-a".into()),
        },
    )
    .unwrap();
    assert_eq!(actions, Vec::new());
    assert_eq!(side_b.trust, TrustLevel::Friend);
    assert_eq!(side_b.accept_signature, None);
    assert_eq!(side_b.accept_token, None);

    // The request signature doubles as the granted read token.
    assert_eq!(side_a.out_token, side_b.in_token);
    assert_eq!(side_a.in_token, side_b.out_token);
    assert_eq!(side_b.in_token.as_deref(), Some("sig-b"));
}

#[test]
fn crossed_request_requires_an_outgoing_request() {
    init_logging();
    let err = transition(
        RelationshipState::default(),
        HandshakeEvent::CrossedRequestReceived {
            signature: "sig-b".into(),
            minted_in_token: "in-a".into(),
        },
    )
    .unwrap_err();
    assert_eq!(err, TransitionError::InvalidTransition(TrustLevel::None));
}

#[test]
fn request_from_an_established_friend_never_demotes() {
    let (_, receiver) = run_full_handshake();
    let before = receiver.clone();
    let (receiver, actions) = transition(
        receiver,
        HandshakeEvent::RequestReceived {
            signature: "sig-2".into(),
            minted_accept_token: "accept-2".into(),
        },
    )
    .unwrap();
    assert_eq!(actions, Vec::new());
    assert_eq!(receiver, before);
}

#[test]
fn remove_mid_handshake_reclaims_the_accept_lookup() {
    init_logging();
    let (requester, _) = transition(
        RelationshipState::default(),
        HandshakeEvent::SendRequest {
            signature: "sig-r".into(),
        },
    )
    .unwrap();
    let (requester, _) = transition(
        requester,
        HandshakeEvent::RequestAcknowledged {
            accept_token: Some("accept-s".into()),
            friend: None,
        },
    )
    .unwrap();

    let (requester, actions) = transition(requester, HandshakeEvent::Remove).unwrap();
    assert_eq!(
        actions,
        vec![HandshakeAction::DropAcceptLookup {
            accept_token: "accept-s".into()
        }]
    );
    assert_eq!(requester, RelationshipState::default());
}

#[test]
fn proof_is_deterministic_and_order_sensitive() {
    assert_eq!(accept_proof("a", "b"), accept_proof("a", "b"));
    assert_ne!(accept_proof("a", "b"), accept_proof("b", "a"));
    assert_eq!(accept_proof("a", "b").len(), 64);
}
