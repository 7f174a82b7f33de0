#![allow(clippy::unwrap_used)]
// Integration tests for `NetBoxClient` using wiremock.

use serde_json::json;
use url::Url;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use nbcrt_api::{Error, NetBoxClient, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, NetBoxClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&format!("{}/", server.uri())).unwrap();
    let client = NetBoxClient::with_client(reqwest::Client::new(), base_url);
    (server, client)
}

fn page(results: serde_json::Value, next: Option<&str>) -> serde_json::Value {
    let count = results.as_array().map_or(0, Vec::len);
    json!({
        "count": count,
        "next": next,
        "previous": null,
        "results": results,
    })
}

// ── Connection tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_connection_sends_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/status/"))
        .and(header("authorization", "Token s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"netbox-version": "4.1.0"})))
        .expect(1)
        .mount(&server)
        .await;

    let token: secrecy::SecretString = "s3cret".to_string().into();
    let client = NetBoxClient::new(&server.uri(), &token, &TransportConfig::default()).unwrap();
    client.test_connection().await.unwrap();
}

#[tokio::test]
async fn test_connection_rejected_token() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/status/"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Invalid token"))
        .mount(&server)
        .await;

    let result = client.test_connection().await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
}

// ── Site tests ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_sites() {
    let (server, client) = setup().await;

    let body = page(
        json!([{
            "id": 7,
            "name": "Copenhagen",
            "display": "Copenhagen",
            "slug": "cph",
            "physical_address": "Main St 1\r\n1000 Copenhagen",
            "region": { "id": 1, "name": "Denmark", "display": "Denmark", "slug": "dk" },
            "group": null
        }]),
        None,
    );

    Mock::given(method("GET"))
        .and(path("/api/dcim/sites/"))
        .and(query_param("limit", "1000"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let sites = client.list_sites().await.unwrap();

    assert_eq!(sites.len(), 1);
    assert_eq!(sites[0].id, 7);
    assert_eq!(sites[0].region.as_ref().unwrap().name, "Denmark");
    assert!(sites[0].group.is_none());
}

// ── Device tests ────────────────────────────────────────────────────

fn device_json(id: i64, name: &str) -> serde_json::Value {
    json!({
        "id": id,
        "name": name,
        "display": name,
        "device_type": { "id": 3, "display": "Cisco C9300", "model": "C9300" },
        "role": { "id": 2, "name": "Access Switch", "display": "Access Switch" },
        "site": { "id": 7, "name": "Copenhagen", "display": "Copenhagen" },
        "primary_ip": { "id": 11, "address": "10.0.0.1/24", "display": "10.0.0.1/24" },
        "tags": [{ "id": 1, "name": "fw:edge-fw", "slug": "fw-edge-fw" }],
        "custom_fields": { "rack_unit": 4 },
        "config_context": {}
    })
}

#[tokio::test]
async fn test_list_devices_follows_pages() {
    let (server, client) = setup().await;
    let client = client.with_page_size(2);

    let first = page(
        json!([device_json(1, "sw-01"), device_json(2, "sw-02")]),
        Some("http://netbox/api/dcim/devices/?limit=2&offset=2"),
    );
    let second = page(json!([device_json(3, "sw-03")]), None);

    Mock::given(method("GET"))
        .and(path("/api/dcim/devices/"))
        .and(query_param("has_primary_ip", "true"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&first))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/dcim/devices/"))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&second))
        .expect(1)
        .mount(&server)
        .await;

    let devices = client.list_devices().await.unwrap();

    assert_eq!(devices.len(), 3);
    assert_eq!(devices[2].name.as_deref(), Some("sw-03"));
    assert_eq!(devices[0].role.as_ref().unwrap().name, "Access Switch");
    assert_eq!(devices[0].tags[0].name, "fw:edge-fw");
    assert_eq!(devices[0].custom_fields["rack_unit"], json!(4));
}

#[tokio::test]
async fn test_legacy_device_role_field_is_accepted() {
    let (server, client) = setup().await;

    let mut legacy = device_json(1, "sw-01");
    let role = legacy.as_object_mut().unwrap().remove("role").unwrap();
    legacy["device_role"] = role;

    Mock::given(method("GET"))
        .and(path("/api/dcim/devices/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(json!([legacy]), None)))
        .mount(&server)
        .await;

    let devices = client.list_devices().await.unwrap();
    assert_eq!(devices[0].role.as_ref().unwrap().name, "Access Switch");
}

#[tokio::test]
async fn test_failing_page_fails_whole_collection() {
    let (server, client) = setup().await;
    let client = client.with_page_size(1);

    Mock::given(method("GET"))
        .and(path("/api/dcim/devices/"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            json!([device_json(1, "sw-01")]),
            Some("http://netbox/api/dcim/devices/?limit=1&offset=1"),
        )))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/dcim/devices/"))
        .and(query_param("offset", "1"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let result = client.list_devices().await;

    match result {
        Err(Error::Api { status, ref endpoint, .. }) => {
            assert_eq!(status, 502);
            assert_eq!(endpoint, "dcim/devices/");
        }
        other => panic!("expected Api error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/dcim/sites/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let result = client.list_sites().await;
    assert!(
        matches!(result, Err(Error::Deserialization { .. })),
        "expected Deserialization error, got: {result:?}"
    );
}

// ── Virtual machine / console port tests ────────────────────────────

#[tokio::test]
async fn test_list_virtual_machines() {
    let (server, client) = setup().await;

    let body = page(
        json!([{
            "id": 40,
            "name": "vm-dns-01",
            "display": "vm-dns-01",
            "site": { "id": 7, "name": "Copenhagen", "display": "Copenhagen" },
            "platform": { "id": 5, "name": "Ubuntu 24.04", "display": "Ubuntu 24.04" },
            "primary_ip": { "id": 90, "address": "10.1.0.53/24" }
        }]),
        None,
    );

    Mock::given(method("GET"))
        .and(path("/api/virtualization/virtual-machines/"))
        .and(query_param("has_primary_ip", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let vms = client.list_virtual_machines().await.unwrap();

    assert_eq!(vms.len(), 1);
    assert_eq!(vms[0].platform.as_ref().unwrap().display, "Ubuntu 24.04");
    assert!(vms[0].tags.is_empty());
}

#[tokio::test]
async fn test_list_console_server_ports() {
    let (server, client) = setup().await;

    let body = page(
        json!([
            {
                "id": 1,
                "name": "Port 1",
                "device": { "id": 100, "name": "cons-01", "display": "cons-01" },
                "connected_endpoints": [
                    { "id": 5, "name": "Console", "device": { "id": 1, "name": "sw-01", "display": "sw-01" } }
                ]
            },
            {
                "id": 2,
                "name": "Port 2",
                "device": { "id": 100, "name": "cons-01", "display": "cons-01" },
                "connected_endpoints": null
            }
        ]),
        None,
    );

    Mock::given(method("GET"))
        .and(path("/api/dcim/console-server-ports/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let ports = client.list_console_server_ports().await.unwrap();

    assert_eq!(ports.len(), 2);
    assert_eq!(ports[0].connected_device().unwrap().label(), "sw-01");
    assert!(ports[1].connected_device().is_none());
}
