//! End-to-end flow loop against an in-memory cloud.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pf_cloud::{
    CloudConnection, CloudResponse, DeviceCall, DeviceCloud, DeviceRef, DeviceUpdate,
    EventStream, PublishParams, StreamFilter,
};
use pf_domain::config::{CloudConfig, Config, FunctionNodeConfig, NodeDefinition};
use pf_domain::error::{Error, Result};
use serde_json::{json, Value};

#[derive(Default)]
struct EchoCloud {
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl DeviceCloud for EchoCloud {
    async fn list_devices(&self, _: &str, _: Option<&str>) -> Result<CloudResponse> {
        Ok(CloudResponse::ok(json!([])))
    }
    async fn get_device(&self, _: &str, _: &DeviceRef) -> Result<CloudResponse> {
        Ok(CloudResponse::ok(json!({})))
    }
    async fn update_device(&self, _: &str, _: &DeviceRef, _: &DeviceUpdate) -> Result<CloudResponse> {
        Ok(CloudResponse::ok(json!({})))
    }
    async fn claim_device(&self, _: &str, _: &str) -> Result<CloudResponse> {
        Ok(CloudResponse::ok(json!({})))
    }
    async fn add_device_to_product(&self, _: &str, _: &str, _: &str) -> Result<CloudResponse> {
        Ok(CloudResponse::ok(json!({})))
    }
    async fn get_variable(&self, _: &str, _: &DeviceCall) -> Result<CloudResponse> {
        Ok(CloudResponse::ok(json!({})))
    }
    async fn call_function(&self, _: &str, call: &DeviceCall) -> Result<CloudResponse> {
        let arg = call.argument.clone().unwrap_or_default();
        self.calls.lock().unwrap().push(arg.clone());
        Ok(CloudResponse::ok(json!({
            "id": call.device.device_id,
            "return_value": arg.len(),
        })))
    }
    async fn publish_event(&self, _: &str, _: &PublishParams) -> Result<CloudResponse> {
        Ok(CloudResponse::ok(json!({"ok": true})))
    }
    async fn event_stream(&self, _: &str, _: &StreamFilter) -> Result<EventStream> {
        Err(Error::Stream("not supported".into()))
    }
}

fn config() -> Config {
    Config {
        cloud: CloudConfig {
            access_token: Some("test-token".into()),
            ..Default::default()
        },
        nodes: vec![NodeDefinition::Function(FunctionNodeConfig {
            id: "led".into(),
            devid: "{device}".into(),
            fname: "led".into(),
            param: String::new(),
            product_id_or_slug: None,
            repeat: 0.0,
            once: false,
        })],
        ..Default::default()
    }
}

#[tokio::test]
async fn input_lines_drive_nodes_and_results_are_written() {
    let cloud = Arc::new(EchoCloud::default());
    let config = config();
    let connection = Arc::new(CloudConnection::new(&config.cloud, cloud.clone()));

    let input: &[u8] = b"not json\n\n{\"node\":\"ghost\",\"payload\":1}\n{\"node\":\"led\",\"payload\":\"blink\",\"device\":\"dev7\"}\n";
    let mut output = Vec::new();

    pf_runner::flow::run(
        &config,
        connection,
        input,
        &mut output,
        std::future::pending(),
        Duration::from_millis(200),
    )
    .await
    .unwrap();

    assert_eq!(*cloud.calls.lock().unwrap(), vec!["blink".to_string()]);

    let lines: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["node"], json!("led"));
    assert_eq!(lines[0]["payload"], json!(5));
    assert_eq!(lines[0]["id"], json!("dev7"));
}

#[tokio::test]
async fn shutdown_stops_before_input_ends() {
    let cloud = Arc::new(EchoCloud::default());
    let config = config();
    let connection = Arc::new(CloudConnection::new(&config.cloud, cloud.clone()));

    // A reader that never yields a line.
    let (_writer, reader) = tokio::io::duplex(64);
    let mut output = Vec::new();

    pf_runner::flow::run(
        &config,
        connection,
        tokio::io::BufReader::new(reader),
        &mut output,
        async {},
        Duration::from_secs(60),
    )
    .await
    .unwrap();

    assert!(output.is_empty());
    assert!(cloud.calls.lock().unwrap().is_empty());
}
