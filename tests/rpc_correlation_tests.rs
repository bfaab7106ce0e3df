//! # RPC Correlation Tests
//!
//! Exercises the correlation map the RPC client is built around: each
//! concurrent waiter receives exactly its own reply, cancellation unblocks
//! the waiter and clears the slot within bounded time, and a reply arriving
//! after cancellation is dropped without leaking a map entry.

use bus_gateway::bus::rpc::CorrelationMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[tokio::test]
async fn test_interleaved_calls_receive_their_own_replies() {
    let map = Arc::new(CorrelationMap::new());

    // Sixteen concurrent callers on "the same queue": correlation ids are the
    // only thing binding replies to waiters.
    let calls: Vec<(String, _)> = (0..16)
        .map(|_| {
            let id = Uuid::new_v4().to_string();
            let rx = map.register(&id);
            (id, rx)
        })
        .collect();

    // Deliver replies from a separate task, in reverse order.
    let replier = {
        let map = Arc::clone(&map);
        let ids: Vec<String> = calls.iter().map(|(id, _)| id.clone()).collect();
        tokio::spawn(async move {
            for id in ids.iter().rev() {
                assert!(map.complete(id, id.as_bytes().to_vec()));
                tokio::task::yield_now().await;
            }
        })
    };

    for (id, rx) in calls {
        let body = rx.await.expect("waiter must receive its reply");
        assert_eq!(body, id.as_bytes());
    }

    replier.await.unwrap();
    assert!(map.is_empty());
}

#[tokio::test]
async fn test_cancellation_unblocks_waiter_and_clears_slot() {
    let map = Arc::new(CorrelationMap::new());
    let token = CancellationToken::new();

    let id = Uuid::new_v4().to_string();
    let rx = map.register(&id);

    // Model the call's select loop: reply wins or cancellation wins.
    let waiter = {
        let map = Arc::clone(&map);
        let id = id.clone();
        let token = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                reply = rx => Ok(reply.unwrap()),
                _ = token.cancelled() => {
                    map.remove(&id);
                    Err("cancelled")
                }
            }
        })
    };

    token.cancel();
    let outcome = tokio::time::timeout(Duration::from_millis(100), waiter)
        .await
        .expect("waiter must unblock within 100ms")
        .unwrap();

    assert_eq!(outcome, Err("cancelled"));
    // The slot must be gone within the same bound.
    assert!(map.is_empty());

    // A late reply finds no slot, is dropped, and leaks nothing.
    assert!(!map.complete(&id, b"late".to_vec()));
    assert!(map.is_empty());
}

#[tokio::test]
async fn test_cancelling_one_call_leaves_others_pending() {
    let map = CorrelationMap::new();

    let kept = map.register("kept");
    let _dropped = map.register("dropped");

    assert!(map.remove("dropped"));
    assert_eq!(map.len(), 1);

    // The surviving call still completes normally.
    assert!(map.complete("kept", b"ok".to_vec()));
    assert_eq!(kept.await.unwrap(), b"ok");
    assert!(map.is_empty());
}

#[tokio::test]
async fn test_correlation_ids_never_collide_in_practice() {
    let map = CorrelationMap::new();

    // UUIDv4 per call; registering a thousand never observes a collision.
    let ids: Vec<String> = (0..1000).map(|_| Uuid::new_v4().to_string()).collect();
    let receivers: Vec<_> = ids.iter().map(|id| map.register(id)).collect();

    assert_eq!(map.len(), 1000);
    for id in &ids {
        assert!(map.complete(id, Vec::new()));
    }
    for rx in receivers {
        assert!(rx.await.is_ok());
    }
    assert!(map.is_empty());
}
