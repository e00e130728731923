//! End-to-end provider scenarios over real HTTP
//!
//! Each test runs a provider with the HTTP fetcher against wiremock servers
//! standing in for resolvers and hosted lists.

use dynwl_core::{ConfigurationDocument, IpStrategy, ProviderConfig, SourceConfig};
use dynwl_http::http_provider;
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn serve(server: &MockServer, route: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

async fn next_document(rx: &mut mpsc::Receiver<ConfigurationDocument>) -> ConfigurationDocument {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("document published in time")
        .expect("output channel open")
}

fn public_ip_source(server: &MockServer, whitelist_ipv6: bool) -> SourceConfig {
    SourceConfig::PublicIp {
        name: "dpw_middleware".to_string(),
        ipv4_resolver: format!("{}/v4", server.uri()),
        ipv6_resolver: format!("{}/v6", server.uri()),
        whitelist_ipv6,
    }
}

#[tokio::test]
async fn single_resolver_publishes_public_ipv4() {
    let server = MockServer::start().await;
    serve(&server, "/v4", 200, "192.0.2.123").await;

    let config = ProviderConfig::public_ip()
        .with_poll_interval("1s")
        .with_sources(vec![public_ip_source(&server, false)]);
    let (mut provider, _events) = http_provider("test", config).unwrap();

    let (tx, mut rx) = mpsc::channel(1);
    provider.start(tx).unwrap();

    let document = next_document(&mut rx).await;

    let expected = json!({
        "http": {
            "routers": {},
            "services": {},
            "middlewares": {
                "dpw_middleware": { "ipWhiteList": { "sourceRange": ["192.0.2.123"] } }
            },
            "serversTransports": {}
        },
        "tcp": {
            "routers": {},
            "services": {},
            "middlewares": {
                "dpw_middleware": { "ipWhiteList": { "sourceRange": ["192.0.2.123"] } }
            }
        },
        "tls": { "stores": {}, "options": {} },
        "udp": { "routers": {}, "services": {} }
    });
    assert_eq!(serde_json::to_value(&document).unwrap(), expected);

    provider.stop().unwrap();
    provider.join().await;
}

#[tokio::test]
async fn dual_stack_with_strategy() {
    let server = MockServer::start().await;
    serve(&server, "/v4", 200, "192.0.2.123").await;
    serve(&server, "/v6", 200, "1234:1234:1234:1234:1234:1234:1234:1234").await;

    let config = ProviderConfig::public_ip()
        .with_poll_interval("1s")
        .with_sources(vec![public_ip_source(&server, true)])
        .with_ip_strategy(IpStrategy::new(1, vec!["123.0.0.1".to_string()]));
    let (mut provider, _events) = http_provider("test", config).unwrap();

    let (tx, mut rx) = mpsc::channel(1);
    provider.start(tx).unwrap();

    let document = next_document(&mut rx).await;
    let value = serde_json::to_value(&document).unwrap();

    assert_eq!(
        value["http"]["middlewares"]["dpw_middleware"],
        json!({
            "ipWhiteList": {
                "sourceRange": ["192.0.2.123", "1234:1234:1234:1234::/64"],
                "ipStrategy": { "depth": 1, "excludedIPs": ["123.0.0.1"] }
            }
        })
    );
    assert_eq!(
        value["tcp"]["middlewares"]["dpw_middleware"]["ipWhiteList"]["sourceRange"],
        json!(["192.0.2.123", "1234:1234:1234:1234::/64"])
    );

    provider.stop().unwrap();
    provider.join().await;
}

#[tokio::test]
async fn failing_list_keeps_last_entry_while_other_updates() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/office"))
        .respond_with(ResponseTemplate::new(200).set_body_string("10.0.0.3\n10.0.0.4\n"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    serve(&server, "/office", 500, "").await;

    Mock::given(method("GET"))
        .and(path("/partners"))
        .respond_with(ResponseTemplate::new(200).set_body_string("192.0.2.1\n"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    serve(&server, "/partners", 200, "192.0.2.2\n").await;

    let base_url = format!("{}/", server.uri());
    let config = ProviderConfig::hosted_lists(&base_url, [("office", "office"), ("partners", "partners")])
        .with_poll_interval("1s");
    let (mut provider, _events) = http_provider("test", config).unwrap();

    let (tx, mut rx) = mpsc::channel(1);
    provider.start(tx).unwrap();

    let first = next_document(&mut rx).await;
    let second = next_document(&mut rx).await;

    assert_eq!(
        first.whitelist("office").unwrap().source_range,
        vec!["10.0.0.3", "10.0.0.4"]
    );
    assert_eq!(first.whitelist("office"), second.whitelist("office"));

    assert_eq!(first.whitelist("partners").unwrap().source_range, vec!["192.0.2.1"]);
    assert_eq!(second.whitelist("partners").unwrap().source_range, vec!["192.0.2.2"]);

    provider.stop().unwrap();
    provider.join().await;
}

#[tokio::test]
async fn unreachable_resolver_publishes_empty_rule() {
    let uri = {
        let server = MockServer::start().await;
        server.uri()
    };

    let config = ProviderConfig::public_ip()
        .with_poll_interval("1s")
        .with_sources(vec![SourceConfig::PublicIp {
            name: "home".to_string(),
            ipv4_resolver: format!("{}/v4", uri),
            ipv6_resolver: String::new(),
            whitelist_ipv6: false,
        }]);
    let (mut provider, _events) = http_provider("test", config).unwrap();

    let (tx, mut rx) = mpsc::channel(1);
    provider.start(tx).unwrap();

    let document = next_document(&mut rx).await;
    assert!(document.whitelist("home").unwrap().source_range.is_empty());

    provider.stop().unwrap();
    provider.join().await;
    assert!(rx.recv().await.is_none());
}
