//! State store integration tests for the local, blob and Key Vault backends.

mod common;

use std::sync::Arc;

use certforgot::azure::{AzureBlobClient, AzureKeyVaultClient, StaticTokenCredential};
use certforgot::context::OpContext;
use certforgot::identity::Identity;
use certforgot::state::{
    BlobStateStore, KeyVaultStateConfig, KeyVaultStateStore, LocalStateStore, StateBackendType, StateStore,
};
use certforgot::CertforgotError;
use common::{rsa_identity, test_identity, MockBlobClient, MockKeyVaultClient};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn credential() -> Arc<StaticTokenCredential> {
    Arc::new(StaticTokenCredential::new("state-token").unwrap())
}

#[tokio::test]
async fn local_store_round_trip_and_replace() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStateStore::new(dir.path()).unwrap();
    let ctx = OpContext::new();

    assert!(!store.exists(&ctx).await.unwrap());

    let first = test_identity("first@example.com");
    store.update(&ctx, &first).await.unwrap();
    assert!(store.exists(&ctx).await.unwrap());
    assert_eq!(store.get(&ctx).await.unwrap(), first);

    let second = test_identity("Ops Team <second@example.com>");
    store.update(&ctx, &second).await.unwrap();
    assert_eq!(store.get(&ctx).await.unwrap(), second);
    assert_eq!(store.backend_type(), StateBackendType::Local);
}

#[tokio::test]
async fn rsa_identity_round_trips_through_stores() {
    let identity = rsa_identity("Ops Team <ops@example.com>");
    let ctx = OpContext::new();

    let dir = tempfile::tempdir().unwrap();
    let local = LocalStateStore::new(dir.path()).unwrap();
    local.update(&ctx, &identity).await.unwrap();
    let restored = local.get(&ctx).await.unwrap();
    assert_eq!(restored, identity);
    assert!(restored.signing_key.to_rsa_private_key().is_ok());

    let blob = BlobStateStore::new(Arc::new(MockBlobClient::new()));
    blob.update(&ctx, &identity).await.unwrap();
    assert_eq!(blob.get(&ctx).await.unwrap(), identity);

    let vault = KeyVaultStateStore::new(Arc::new(MockKeyVaultClient::new()));
    vault.update(&ctx, &identity).await.unwrap();
    assert_eq!(vault.get(&ctx).await.unwrap(), identity);
}

#[tokio::test]
async fn local_store_document_uses_stable_keys() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStateStore::new(dir.path()).unwrap();
    store.update(&OpContext::new(), &test_identity("ops@example.com")).await.unwrap();

    let document = std::fs::read_to_string(dir.path().join("certforgot_state.yaml")).unwrap();
    assert!(document.contains("userEmail: ops@example.com"));
    assert!(document.contains("userPrivateKey:"));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(dir.path().join("certforgot_state.yaml")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[tokio::test]
async fn blob_store_round_trip_with_mock_client() {
    let client = Arc::new(MockBlobClient::new());
    let store = BlobStateStore::new(client.clone());
    let ctx = OpContext::new();

    assert!(!store.exists(&ctx).await.unwrap());
    assert!(store.get(&ctx).await.unwrap_err().is_not_found());

    let identity = test_identity("ops@example.com");
    store.update(&ctx, &identity).await.unwrap();
    assert!(store.exists(&ctx).await.unwrap());
    assert_eq!(store.get(&ctx).await.unwrap(), identity);

    let uploaded = String::from_utf8(client.content().unwrap()).unwrap();
    assert_eq!(Identity::from_yaml(uploaded.as_bytes()).unwrap(), identity);
}

#[tokio::test]
async fn blob_store_over_rest() {
    let server = MockServer::start().await;
    let identity = test_identity("ops@example.com");
    let document = identity.to_yaml().unwrap();

    Mock::given(method("PUT"))
        .and(path("/state/certforgot_state.yaml"))
        .and(header("x-ms-blob-type", "BlockBlob"))
        .and(header("authorization", "Bearer state-token"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/state/certforgot_state.yaml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(document.clone()))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/state/certforgot_state.yaml"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client =
        AzureBlobClient::new(&format!("{}/state", server.uri()), "certforgot_state.yaml", credential()).unwrap();
    let store = BlobStateStore::new(Arc::new(client));
    let ctx = OpContext::new();

    store.update(&ctx, &identity).await.unwrap();
    assert!(store.exists(&ctx).await.unwrap());
    assert_eq!(store.get(&ctx).await.unwrap(), identity);

    let requests = server.received_requests().await.unwrap();
    let put = requests.iter().find(|r| r.method.as_str() == "PUT").unwrap();
    assert_eq!(put.body, document.as_bytes());
}

#[tokio::test]
async fn blob_exists_distinguishes_missing_blob_from_missing_container() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/state/certforgot_state.yaml"))
        .respond_with(ResponseTemplate::new(404).insert_header("x-ms-error-code", "BlobNotFound"))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/missing/certforgot_state.yaml"))
        .respond_with(ResponseTemplate::new(404).insert_header("x-ms-error-code", "ContainerNotFound"))
        .mount(&server)
        .await;

    let ctx = OpContext::new();
    let present_container =
        AzureBlobClient::new(&format!("{}/state", server.uri()), "certforgot_state.yaml", credential()).unwrap();
    assert!(!BlobStateStore::new(Arc::new(present_container)).exists(&ctx).await.unwrap());

    let missing_container =
        AzureBlobClient::new(&format!("{}/missing", server.uri()), "certforgot_state.yaml", credential()).unwrap();
    let err = BlobStateStore::new(Arc::new(missing_container)).exists(&ctx).await.unwrap_err();
    assert!(matches!(err, CertforgotError::Network { .. }), "{err}");
}

#[tokio::test]
async fn key_vault_store_round_trip_with_mock_client() {
    let client = Arc::new(MockKeyVaultClient::new());
    let store = KeyVaultStateStore::new(client.clone());
    let ctx = OpContext::new();
    let identity = test_identity("Ops Team <ops@example.com>");

    store.update(&ctx, &identity).await.unwrap();

    assert_eq!(client.secret("certforgot-useremail").unwrap(), "\"Ops Team\" <ops@example.com>");
    assert_eq!(client.key("certforgot-userkey").unwrap(), identity.signing_key);
    assert!(store.exists(&ctx).await.unwrap());
    assert_eq!(store.get(&ctx).await.unwrap(), identity);
}

#[tokio::test]
async fn key_vault_exists_skips_key_lookup_without_secret() {
    let client = Arc::new(MockKeyVaultClient::new());
    let store = KeyVaultStateStore::new(client.clone());

    assert!(!store.exists(&OpContext::new()).await.unwrap());
    assert_eq!(MockKeyVaultClient::calls(&client.get_secret_calls), 1);
    assert_eq!(MockKeyVaultClient::calls(&client.get_key_calls), 0);
}

#[tokio::test]
async fn key_vault_partial_identity_reports_absent() {
    let client = Arc::new(MockKeyVaultClient::new());
    client.insert_secret("certforgot-useremail", "ops@example.com");
    let store = KeyVaultStateStore::new(client.clone());
    let ctx = OpContext::new();

    assert!(!store.exists(&ctx).await.unwrap());
    assert_eq!(MockKeyVaultClient::calls(&client.get_key_calls), 1);
    assert!(store.get(&ctx).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn key_vault_store_rejects_malformed_email_secret() {
    let client = Arc::new(MockKeyVaultClient::new());
    client.insert_secret("certforgot-useremail", "not an address");
    let store = KeyVaultStateStore::new(client);

    let err = store.get(&OpContext::new()).await.unwrap_err();
    assert!(matches!(err, CertforgotError::Parse { .. }), "{err}");
}

#[tokio::test]
async fn key_vault_store_over_rest_with_custom_names() {
    let server = MockServer::start().await;
    let identity = test_identity("ops@example.com");
    let key_json = serde_json::to_value(&identity.signing_key).unwrap();

    Mock::given(method("PUT"))
        .and(path("/secrets/acme-email"))
        .and(query_param("api-version", "7.4"))
        .and(body_json(serde_json::json!({"value": "ops@example.com"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"value": "ops@example.com"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/keys/acme-key"))
        .and(body_json(serde_json::json!({"key": key_json})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"key": key_json})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/secrets/acme-email"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"value": "ops@example.com"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/keys/acme-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"key": key_json})))
        .mount(&server)
        .await;

    let client = AzureKeyVaultClient::new(&server.uri(), credential()).unwrap();
    let names = KeyVaultStateConfig { email_secret_name: "acme-email".to_string(), key_name: "acme-key".to_string() };
    let store = KeyVaultStateStore::with_config(Arc::new(client), names);
    let ctx = OpContext::new();

    store.update(&ctx, &identity).await.unwrap();
    assert!(store.exists(&ctx).await.unwrap());
    assert_eq!(store.get(&ctx).await.unwrap(), identity);
}

#[tokio::test]
async fn key_vault_absent_secret_over_rest() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/secrets/certforgot-useremail"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/keys/certforgot-userkey"))
        .respond_with(ResponseTemplate::new(404))
        .expect(0)
        .mount(&server)
        .await;

    let client = AzureKeyVaultClient::new(&server.uri(), credential()).unwrap();
    let store = KeyVaultStateStore::new(Arc::new(client));
    assert!(!store.exists(&OpContext::new()).await.unwrap());
}
