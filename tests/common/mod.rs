//! Shared scaffolding for the integration tests: an in-memory broker double
//! that records every publish, a local token verifier, and state builders.

#![allow(dead_code)]

use async_trait::async_trait;
use axum_test::TestServer;
use bus_gateway::auth::oidc::{user_from_claims, AuthenticatedUser, TokenVerifier};
use bus_gateway::bus::rpc::RpcClient;
use bus_gateway::core::error::{GatewayError, GatewayResult};
use bus_gateway::gateway::AppState;
use bus_gateway::routing::model::RoutingConfig;
use bus_gateway::routing::router::ServiceRouter;
use bus_gateway::build_app;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Token the mock verifier accepts
pub const VALID_TOKEN: &str = "valid-token";

/// What the broker double does when a queue receives a request
#[derive(Clone)]
pub enum ScriptedReply {
    /// Answer with this body
    Body(Vec<u8>),
    /// Fail the publish
    FailPublish,
    /// Never answer; the call parks until cancelled
    Silence,
}

/// In-memory broker double
///
/// Records every `(queue, payload)` publish so tests can assert the exact
/// envelope that went out, and answers according to the per-queue script.
#[derive(Default)]
pub struct MockRpc {
    replies: Mutex<HashMap<String, ScriptedReply>>,
    published: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MockRpc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply_with(self, queue: &str, body: &[u8]) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(queue.to_string(), ScriptedReply::Body(body.to_vec()));
        self
    }

    pub fn silent(self, queue: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(queue.to_string(), ScriptedReply::Silence);
        self
    }

    pub fn failing(self, queue: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(queue.to_string(), ScriptedReply::FailPublish);
        self
    }

    /// Everything published so far, with payloads parsed as JSON
    pub fn published(&self) -> Vec<(String, serde_json::Value)> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|(queue, payload)| {
                (
                    queue.clone(),
                    serde_json::from_slice(payload).expect("published payload is JSON"),
                )
            })
            .collect()
    }

    pub fn publish_count(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

#[async_trait]
impl RpcClient for MockRpc {
    async fn call(
        &self,
        queue: &str,
        payload: Vec<u8>,
        cancel: CancellationToken,
    ) -> GatewayResult<Vec<u8>> {
        let script = self.replies.lock().unwrap().get(queue).cloned();

        match script {
            Some(ScriptedReply::FailPublish) => Err(GatewayError::PublishFailed {
                queue: queue.to_string(),
                reason: "scripted failure".to_string(),
            }),
            Some(ScriptedReply::Body(body)) => {
                self.published
                    .lock()
                    .unwrap()
                    .push((queue.to_string(), payload));
                Ok(body)
            }
            Some(ScriptedReply::Silence) | None => {
                self.published
                    .lock()
                    .unwrap()
                    .push((queue.to_string(), payload));
                cancel.cancelled().await;
                Err(GatewayError::Cancelled)
            }
        }
    }
}

/// Verifier accepting exactly [`VALID_TOKEN`]
pub struct MockVerifier;

#[async_trait]
impl TokenVerifier for MockVerifier {
    async fn verify(&self, token: &str) -> GatewayResult<AuthenticatedUser> {
        if token == VALID_TOKEN {
            let claims = serde_json::json!({
                "preferred_username": "tester",
                "realm_access": { "roles": ["user"] }
            });
            Ok(user_from_claims(claims.as_object().unwrap().clone()))
        } else {
            Err(GatewayError::auth("invalid token"))
        }
    }
}

/// The routing tree most scenarios run against
///
/// `mainsite` is private; `Countries` is public with no declared actions;
/// `GameTypes` is private with `List` public and `Publish` private.
pub fn routing_fixture() -> RoutingConfig {
    serde_json::from_str(
        r#"{
            "Microservices": [
                {
                    "Id": "mainsite",
                    "Queue": "mainsite_queue",
                    "Scope": "Private",
                    "Resources": [
                        {
                            "Name": "Countries",
                            "Type": "DATA",
                            "Scope": "Public",
                            "Actions": []
                        },
                        {
                            "Name": "GameTypes",
                            "Type": "DATA",
                            "Actions": [
                                { "Name": "List", "Scope": "Public" },
                                { "Name": "Publish" }
                            ]
                        }
                    ]
                }
            ]
        }"#,
    )
    .unwrap()
}

pub fn state_with(routing: RoutingConfig, rpc: Arc<MockRpc>) -> AppState {
    AppState {
        router: ServiceRouter::new(routing),
        rpc,
        verifier: Arc::new(MockVerifier),
        include_exception_detail: false,
        shutdown: CancellationToken::new(),
    }
}

pub fn test_server(state: AppState) -> TestServer {
    TestServer::new(build_app(state, &[])).expect("test server")
}
