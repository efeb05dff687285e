//! Full-stack tests: a real server instance on a loopback port, exercised
//! through the client library exactly as a UI would.

use std::net::SocketAddr;
use std::time::Duration;

use beacon_client::chat::{ChannelState, MessagingChannel};
use beacon_client::geocode::StaticGeocoder;
use beacon_client::intake::{EmergencyForm, IntakeFlow, IntakeState};
use beacon_client::locations::LocationStore;
use beacon_client::payments::donate;
use beacon_client::stats::{grand_totals, StatsAggregator};
use beacon_client::{session, ApiClient, ClientError, Session};
use beacon_server::{build_router, AppState, ServerConfig};
use beacon_shared::types::{Conversation, Severity};
use beacon_shared::Wallet;
use beacon_store::Database;

/// Boot a server on an ephemeral loopback port and return its base URL.
async fn spawn_server() -> String {
    let config = ServerConfig {
        // Tests hammer one IP; keep the limiter out of the way.
        rate_limit_per_sec: 10_000,
        rate_limit_burst: 10_000,
        ..ServerConfig::default()
    };
    let state = AppState::new(config, Database::open_in_memory().unwrap());
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    format!("http://{addr}")
}

async fn signed_in(api: &ApiClient) -> (Wallet, Session) {
    let wallet = Wallet::generate();
    let session = session::sign_in(api, &wallet).await.unwrap();
    assert_eq!(session.address, wallet.address());
    (wallet, session)
}

#[tokio::test]
async fn report_emergency_and_aggregate_stats() {
    let base = spawn_server().await;
    let api = ApiClient::new(&base);
    let (_wallet, session) = signed_in(&api).await;

    let mut store = LocationStore::new(api.clone(), Some(session.clone()));
    store.load().await.unwrap();
    assert!(store.locations().is_empty());

    // Pick a point on the map and file a report through the intake flow.
    let mut intake = IntakeFlow::new();
    intake.open(Some(&session), 37.77, -122.41).unwrap();
    let form = EmergencyForm {
        emergency_type: "Fire".into(),
        description: "Apartment fire".into(),
        severity: Severity::High,
        people_affected: "10".into(),
        contact_info: "555-0100".into(),
    };
    let stored = intake.submit(&mut store, form).await.unwrap();
    assert_eq!(intake.state(), IntakeState::Closed);
    assert_eq!(stored.wallet_address, session.address);

    // A fresh anonymous client sees the report too.
    let mut reader = LocationStore::new(api.clone(), None);
    reader.load().await.unwrap();
    assert_eq!(reader.locations().len(), 1);

    // Aggregate into per-region statistics.
    let geocoder = StaticGeocoder::new(vec![(37.77, -122.41, 0.5, "California".to_string())]);
    let aggregator = StatsAggregator::new(geocoder);
    aggregator.mark_ready();
    let stats = aggregator.compute(reader.locations()).await;

    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].region, "California");
    assert_eq!(stats[0].tally.emergencies, 1);
    assert_eq!(stats[0].tally.total_people, 10);
    assert_eq!(stats[0].tally.types["Fire"], 1);
    assert_eq!(stats[0].tally.severities[&Severity::High], 1);
    assert_eq!(grand_totals(&stats), (10, 1));
}

#[tokio::test]
async fn global_and_direct_chat_stay_isolated() {
    let base = spawn_server().await;
    let api = ApiClient::new(&base);
    let (_wa, alice) = signed_in(&api).await;
    let (_wb, bob) = signed_in(&api).await;
    let (_wc, carol) = signed_in(&api).await;

    // Alice opens the global channel with its realtime feed attached.
    let mut alice_global = MessagingChannel::new(api.clone(), &alice, Conversation::Global);
    alice_global.open().await.unwrap();
    assert_eq!(alice_global.state(), ChannelState::Ready);

    // Bob posts globally and messages Alice directly.
    let mut bob_global = MessagingChannel::new(api.clone(), &bob, Conversation::Global);
    bob_global.open().await.unwrap();
    bob_global.set_draft("everyone: stay safe");
    bob_global.send().await.unwrap();

    let mut bob_to_alice =
        MessagingChannel::new(api.clone(), &bob, Conversation::Direct(alice.address.clone()));
    bob_to_alice.open().await.unwrap();
    bob_to_alice.set_draft("alice, are you ok?");
    bob_to_alice.send().await.unwrap();

    // Give the broadcast a moment to fan out, then drain.
    tokio::time::sleep(Duration::from_millis(200)).await;
    alice_global.pump();

    // The global view carries only the global message.
    assert_eq!(alice_global.messages().len(), 1);
    assert_eq!(alice_global.messages()[0].content, "everyone: stay safe");
    assert!(alice_global.messages()[0].is_global);

    // Pumping again ingests nothing new.
    assert_eq!(alice_global.pump(), 0);
    assert_eq!(alice_global.messages().len(), 1);

    // Alice's direct view with Bob has exactly the pairwise exchange.
    let mut alice_to_bob =
        MessagingChannel::new(api.clone(), &alice, Conversation::Direct(bob.address.clone()));
    alice_to_bob.open().await.unwrap();
    assert_eq!(alice_to_bob.messages().len(), 1);
    assert_eq!(alice_to_bob.messages()[0].content, "alice, are you ok?");

    // Carol sees nothing of it.
    let mut carol_to_bob =
        MessagingChannel::new(api.clone(), &carol, Conversation::Direct(bob.address.clone()));
    carol_to_bob.open().await.unwrap();
    assert!(carol_to_bob.messages().is_empty());

    // Blank drafts never reach the server.
    alice_global.set_draft("   ");
    assert!(matches!(
        alice_global.send().await,
        Err(ClientError::Validation(_))
    ));
}

#[tokio::test]
async fn send_refetches_missed_messages() {
    let base = spawn_server().await;
    let api = ApiClient::new(&base);
    let (_wa, alice) = signed_in(&api).await;
    let (_wb, bob) = signed_in(&api).await;

    let mut alice_global = MessagingChannel::new(api.clone(), &alice, Conversation::Global);
    alice_global.open().await.unwrap();

    // Bob posts while Alice never drains her push feed; as far as her view
    // is concerned the event was lost.
    let mut bob_global = MessagingChannel::new(api.clone(), &bob, Conversation::Global);
    bob_global.open().await.unwrap();
    bob_global.set_draft("from bob");
    bob_global.send().await.unwrap();

    // Alice's own send must pull the missed message back in.
    alice_global.set_draft("from alice");
    alice_global.send().await.unwrap();

    let contents: Vec<_> = alice_global
        .messages()
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(contents, ["from bob", "from alice"]);
    assert_eq!(alice_global.draft(), "");

    // The buffered push duplicate is deduplicated on drain.
    tokio::time::sleep(Duration::from_millis(200)).await;
    alice_global.pump();
    assert_eq!(alice_global.messages().len(), 2);
}

#[tokio::test]
async fn failed_realtime_attach_emits_notice() {
    use axum::{routing::get, Json, Router};
    use beacon_client::events::{notice_channel, Notice};
    use beacon_shared::types::Message;

    // A server that answers the history fetch but has no WebSocket route.
    let app = Router::new().route(
        "/api/messages",
        get(|| async { Json(Vec::<Message>::new()) }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let api = ApiClient::new(format!("http://{addr}"));
    let session = Session {
        address: beacon_shared::Wallet::generate().address(),
        token: "t".to_string(),
    };

    let (tx, mut rx) = notice_channel();
    let mut channel =
        MessagingChannel::new(api, &session, Conversation::Global).with_notices(tx);
    channel.open().await.unwrap();

    // The channel is still usable without the feed, but the user was told.
    assert_eq!(channel.state(), ChannelState::Ready);
    assert!(matches!(rx.try_recv(), Ok(Notice::Error(_))));
}

#[tokio::test]
async fn donation_round_trip() {
    let base = spawn_server().await;
    let api = ApiClient::new(&base);
    let (wallet, session) = signed_in(&api).await;
    let recipient = Wallet::generate().address();

    // A rejected amount never reaches the server.
    assert!(matches!(
        donate(&api, &session, &wallet, &recipient, 0.0).await,
        Err(ClientError::Validation(_))
    ));

    let accepted = donate(&api, &session, &wallet, &recipient, 2.5).await.unwrap();
    assert!(accepted);
}

#[tokio::test]
async fn clear_removes_only_own_locations() {
    let base = spawn_server().await;
    let api = ApiClient::new(&base);
    let (_wa, alice) = signed_in(&api).await;
    let (_wb, bob) = signed_in(&api).await;

    let mut alice_store = LocationStore::new(api.clone(), Some(alice.clone()));
    alice_store.add(10.0, 20.0, None).await.unwrap();
    alice_store.add(11.0, 21.0, None).await.unwrap();

    let mut bob_store = LocationStore::new(api.clone(), Some(bob.clone()));
    bob_store.add(30.0, 40.0, None).await.unwrap();

    let deleted = alice_store.clear().await.unwrap();
    assert_eq!(deleted, 2);

    // Bob's report survives Alice's clear.
    let mut reader = LocationStore::new(api.clone(), None);
    reader.load().await.unwrap();
    assert_eq!(reader.locations().len(), 1);
    assert_eq!(reader.locations()[0].wallet_address, bob.address);
}

#[tokio::test]
async fn out_of_range_coordinates_fail_before_network() {
    let base = spawn_server().await;
    let api = ApiClient::new(&base);
    let (_wallet, session) = signed_in(&api).await;

    let mut store = LocationStore::new(api, Some(session));
    let result = store.add(95.0, 0.0, None).await;
    assert!(matches!(result, Err(ClientError::Validation(_))));
    assert!(store.locations().is_empty());
}
