// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use bearer_session::{http::OutboundRequest, store::CredentialStore};

mod common;
use common::*;

#[tokio::test]
async fn restore_without_credentials_skips_the_probe() {
	let server = MockServer::start_async().await;
	let (session, _store, navigator) = build_test_session(test_config(&server.base_url()), None);
	let probe = server
		.mock_async(|when, then| {
			when.method(GET).path("/auth/me");
			then.status(200);
		})
		.await;
	let restored =
		session.restore(OutboundRequest::get("/auth/me")).await.expect("Restore should not fail.");

	assert!(!restored);

	probe.assert_calls_async(0).await;

	assert_eq!(navigator.count(), 0);
}

#[tokio::test]
async fn restore_keeps_credentials_the_api_accepts() {
	let server = MockServer::start_async().await;
	let (session, store, _navigator) = build_test_session(
		test_config(&server.base_url()),
		Some(pair("access-old", "refresh-old")),
	);
	let probe = server
		.mock_async(|when, then| {
			when.method(GET).path("/auth/me").header("authorization", "Bearer access-old");
			then.status(200).json_body(json!({ "id": "user-1" }));
		})
		.await;
	let restored =
		session.restore(OutboundRequest::get("/auth/me")).await.expect("Restore should not fail.");

	assert!(restored);

	probe.assert_calls_async(1).await;

	assert!(store.get().is_some());
}

#[tokio::test]
async fn restore_recovers_through_a_refresh() {
	let server = MockServer::start_async().await;
	let (session, store, navigator) = build_test_session(
		test_config(&server.base_url()),
		Some(pair("access-old", "refresh-old")),
	);

	server
		.mock_async(|when, then| {
			when.method(GET).path("/auth/me").header("authorization", "Bearer access-old");
			then.status(401);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/auth/me").header("authorization", "Bearer access-new");
			then.status(200);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(json!({ "accessToken": "access-new", "refreshToken": "refresh-new" }));
		})
		.await;

	let restored =
		session.restore(OutboundRequest::get("/auth/me")).await.expect("Restore should not fail.");

	assert!(restored);
	assert_eq!(
		store.get().map(|pair| pair.refresh_token().expose().to_owned()),
		Some("refresh-new".to_owned())
	);
	assert_eq!(navigator.count(), 0);
}

#[tokio::test]
async fn restore_clears_credentials_after_a_failed_refresh() {
	let server = MockServer::start_async().await;
	let (session, store, navigator) = build_test_session(
		test_config(&server.base_url()),
		Some(pair("access-old", "refresh-old")),
	);

	server
		.mock_async(|when, then| {
			when.method(GET).path("/auth/me");
			then.status(401);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(401);
		})
		.await;

	let restored =
		session.restore(OutboundRequest::get("/auth/me")).await.expect("Restore should not fail.");

	assert!(!restored);
	assert!(store.get().is_none());
	assert_eq!(navigator.count(), 1);
}

#[tokio::test]
async fn restore_clears_credentials_when_the_probe_errors() {
	let server = MockServer::start_async().await;
	let (session, store, navigator) = build_test_session(
		test_config(&server.base_url()),
		Some(pair("access-old", "refresh-old")),
	);

	server
		.mock_async(|when, then| {
			when.method(GET).path("/auth/me");
			then.status(500);
		})
		.await;

	let restored =
		session.restore(OutboundRequest::get("/auth/me")).await.expect("Restore should not fail.");

	assert!(!restored);
	assert!(store.get().is_none());
	assert!(!session.is_authenticated());
	assert_eq!(navigator.count(), 0);
}
