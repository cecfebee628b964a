//! End-to-end tests against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives `TodoableClient`
//! over real HTTP through `UreqTransport`, covering authentication,
//! reauthentication and every list/item operation.

use std::net::{SocketAddr, TcpListener};
use std::time::Duration;

use chrono::Utc;
use todoable::{ApiError, ClientConfig, Credentials, TodoableClient, UreqTransport};

fn start_server() -> SocketAddr {
    let std_listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    addr
}

fn config(addr: SocketAddr) -> ClientConfig {
    ClientConfig::new(&format!("http://{addr}"))
}

fn connect(addr: SocketAddr) -> TodoableClient {
    let config = config(addr);
    let transport = UreqTransport::new(config.timeout);
    TodoableClient::connect(config, transport, Credentials::new("user", "pw")).unwrap()
}

#[test]
fn crud_lifecycle() {
    let addr = start_server();
    let mut client = connect(addr);

    // Step 1: no lists yet.
    assert!(client.get_lists(false).unwrap().is_empty());

    // Step 2: create a list.
    let created = client.create_list("Groceries").unwrap();
    assert_eq!(created.name, "Groceries");
    let list_id = created.id.clone().unwrap();
    assert!(created.items.is_none());

    // Step 3: rename it.
    client.update_list(&list_id, "Food").unwrap();
    let fetched = client.get_list(&list_id).unwrap();
    assert_eq!(fetched.name, "Food");
    assert_eq!(fetched.id.as_deref(), Some(list_id.as_str()));
    assert_eq!(fetched.items, Some(Vec::new()));

    // Step 4: add two items, finish one.
    let milk = client.create_list_item(&list_id, "Milk").unwrap();
    assert!(!milk.is_finished());
    let raw_eggs = client.create_list_item_raw(&list_id, "Eggs").unwrap();
    assert_eq!(raw_eggs["name"], "Eggs");
    let milk_id = milk.id.clone().unwrap();
    client.complete_list_item(&list_id, &milk_id).unwrap();

    // Step 5: eager load attaches items to each list.
    let lists = client.get_lists(true).unwrap();
    assert_eq!(lists.len(), 1);
    let items = lists[0].items.as_ref().unwrap();
    assert_eq!(items.len(), 2);
    let finished = items.iter().find(|i| i.name == "Milk").unwrap();
    let finished_at = finished.finished_at.unwrap();
    assert!((Utc::now().naive_utc() - finished_at).num_minutes().abs() < 5);
    assert!(!items.iter().find(|i| i.name == "Eggs").unwrap().is_finished());

    // Step 6: delete an item.
    client.delete_list_item(&list_id, &milk_id).unwrap();
    let fetched = client.get_list(&list_id).unwrap();
    assert_eq!(fetched.items.unwrap().len(), 1);

    // Step 7: delete the list; it is gone afterwards.
    client.delete_list(&list_id).unwrap();
    let err = client.get_list(&list_id).unwrap_err();
    assert!(matches!(err, ApiError::NotFound { status: 404, .. }));
    let err = client.delete_list(&list_id).unwrap_err();
    assert!(matches!(err, ApiError::NotFound { .. }));
    assert!(client.get_lists(false).unwrap().is_empty());
}

#[test]
fn blank_name_is_an_invalid_request() {
    let addr = start_server();
    let mut client = connect(addr);
    let err = client.create_list("   ").unwrap_err();
    assert!(matches!(err, ApiError::InvalidRequest { status: 422, .. }));
}

#[test]
fn bad_credentials_fail_to_connect() {
    let addr = start_server();
    let config = config(addr);
    let transport = UreqTransport::new(config.timeout);
    let result = TodoableClient::connect(config, transport, Credentials::new("user", "nope"));
    assert!(matches!(result, Err(ApiError::Authentication { .. })));
}

#[test]
fn expired_token_is_refreshed_with_stored_credentials() {
    let addr = start_server();
    let config = config(addr);
    let transport = UreqTransport::new(config.timeout);
    let expired = Utc::now().naive_utc() - chrono::Duration::minutes(1);
    let mut client = TodoableClient::with_token(
        config,
        transport,
        "stale-token",
        Some(expired),
        Some(Credentials::new("user", "pw")),
    );

    assert!(client.get_lists(false).unwrap().is_empty());
    assert_ne!(client.token(), Some("stale-token"));
    assert!(client.token_expiry().unwrap() > Utc::now().naive_utc());
}

#[test]
fn unknown_token_without_credentials_is_rejected() {
    let addr = start_server();
    let config = config(addr);
    let transport = UreqTransport::new(config.timeout);
    let mut client = TodoableClient::with_token(config, transport, "bogus", None, None);
    let err = client.get_lists(false).unwrap_err();
    assert!(matches!(err, ApiError::Authentication { status: Some(401), .. }));
}

#[test]
fn refused_connection_is_a_timeout() {
    // Bind and drop to find a port nothing listens on.
    let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
    let config = config(addr).with_timeout(Duration::from_millis(500));
    let transport = UreqTransport::new(config.timeout);
    assert_eq!(transport.timeout(), Duration::from_millis(500));
    let result = TodoableClient::connect(config, transport, Credentials::new("user", "pw"));
    assert!(matches!(result, Err(ApiError::Timeout { .. })));
}
