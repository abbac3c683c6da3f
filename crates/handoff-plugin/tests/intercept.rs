//! End-to-end intercept tests against a real, socket-bound server.

use std::sync::Arc;

use handoff_config::PluginConfig;
use handoff_core::{BridgeError, BridgeResult};
use handoff_plugin::{FrameworkCall, PluginCoordinator};
use handoff_server::HandoffRpcClient;
use handoff_test::Harness;

/// A minimal framework call: an agent name plus a string payload, echoed
/// back reversed by the test's stand-in "human" responder.
struct EchoCall {
    agent: String,
    text: String,
}

impl FrameworkCall for EchoCall {
    type Response = String;

    fn agent_name(&self) -> &str {
        &self.agent
    }

    fn to_payload(&self) -> Vec<u8> {
        self.text.clone().into_bytes()
    }

    fn from_payload(payload: Vec<u8>) -> BridgeResult<String> {
        String::from_utf8(payload).map_err(|e| BridgeError::internal(e.to_string()))
    }
}

#[tokio::test]
async fn intercept_round_trips_through_a_real_server() {
    let harness = Harness::start().await;
    let config = PluginConfig {
        server_address: harness.addr.to_string(),
        ..PluginConfig::default()
    };
    let mut plugin = PluginCoordinator::spawn(config);
    plugin.wait_until_attached().await.unwrap();
    let session_id = plugin.session_id().await.expect("session minted on attach");

    let client = harness.client.clone();
    let coordinator = Arc::clone(&harness.coordinator);
    let responder = tokio::spawn(async move {
        let mut sub = coordinator.subscribe(session_id, None, None).await.unwrap();
        loop {
            let event = sub.recv().await.unwrap().expect("stream stays open");
            if event.payload_kind.is_request() {
                let reply: Vec<u8> = event.payload.iter().rev().copied().collect();
                client
                    .submit_response(event.session_id, event.turn_id, reply)
                    .await
                    .unwrap();
                break;
            }
        }
    });

    let call = EchoCall {
        agent: "orch".to_string(),
        text: "hello".to_string(),
    };
    let outcome = plugin
        .intercept(&call, std::future::pending())
        .await
        .unwrap();
    assert_eq!(outcome.into_intercepted().unwrap(), "olleh");

    responder.await.unwrap();
}

#[tokio::test]
async fn excluded_agents_pass_through_without_contacting_the_server() {
    let mut config = PluginConfig {
        server_address: "127.0.0.1:1".to_string(),
        ..PluginConfig::default()
    };
    config.target_agents.insert("orch".to_string());
    let mut plugin = PluginCoordinator::spawn(config);

    let call = EchoCall {
        agent: "other-agent".to_string(),
        text: "irrelevant".to_string(),
    };
    let outcome = plugin
        .intercept(&call, std::future::pending())
        .await
        .unwrap();
    assert!(outcome.is_pass_through());
}
