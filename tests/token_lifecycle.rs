//! Token lifecycle and credential-retry behaviour against a scripted platform.

mod common;

use async_trait::async_trait;
use common::{
    AUTHORIZER_TOKEN_PATH, COMPONENT_TOKEN_PATH, MockTransport, access_token_of, authorizer_token,
    component_token,
};
use open_platform_channel::lock::{DistributedLock, LocalLock, LockHandle};
use open_platform_channel::{
    ChannelConfig, ChannelError, ConfigPreset, Credential, CredentialStore, MemoryCredentialStore,
    PlatformClient, RequestOptions,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const TENANT: &str = "wx_tenant";
const API_PATH: &str = "wxa/get_category";

fn store() -> MemoryCredentialStore {
    MemoryCredentialStore::new("ticket@@@1").with_refresh_token(TENANT, "refresh@@@1")
}

async fn seeded_store(authorizer: &str) -> Result<MemoryCredentialStore, ChannelError> {
    let store = store();
    store
        .save_component_credential(&Credential::new("C0", i64::MAX))
        .await?;
    store
        .save_authorizer_credential(TENANT, &Credential::new(authorizer, i64::MAX))
        .await?;
    Ok(store)
}

fn client_with(
    transport: Arc<MockTransport>,
    store: MemoryCredentialStore,
    lock: Arc<impl DistributedLock + 'static>,
) -> PlatformClient {
    PlatformClient::builder("wx_component", "component_secret", TENANT)
        .with_transport(transport)
        .with_store(Arc::new(store))
        .with_lock(lock)
        .with_config(ChannelConfig::from(ConfigPreset::Development))
        .build()
        .unwrap()
}

fn api_url(client: &PlatformClient, token: &str) -> String {
    client.url_for(&client.config().wxa_base, "get_category", token)
}

/// Counts acquisitions and releases around an in-process lock.
#[derive(Default)]
struct TrackingLock {
    inner: LocalLock,
    acquired: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

#[async_trait]
impl DistributedLock for TrackingLock {
    async fn acquire(&self, scope: &str) -> Result<LockHandle, ChannelError> {
        let mut inner = self.inner.acquire(scope).await?;
        self.acquired.fetch_add(1, Ordering::SeqCst);
        let released = Arc::clone(&self.released);
        Ok(LockHandle::new(move || {
            inner.release();
            released.fetch_add(1, Ordering::SeqCst);
        }))
    }
}

struct UnavailableLock;

#[async_trait]
impl DistributedLock for UnavailableLock {
    async fn acquire(&self, scope: &str) -> Result<LockHandle, ChannelError> {
        Err(ChannelError::LockAcquisitionFailure(format!(
            "lock service unavailable for {scope}"
        )))
    }
}

#[tokio::test]
async fn test_valid_credentials_make_no_upstream_calls() -> Result<(), ChannelError> {
    let transport = Arc::new(MockTransport::new());
    let client = client_with(
        Arc::clone(&transport),
        seeded_store("A0").await?,
        Arc::new(LocalLock::new()),
    );

    assert_eq!(client.ensure_component_token().await?.secret, "C0");
    assert_eq!(client.ensure_access_token().await?.secret, "A0");
    assert!(transport.requests().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_concurrent_acquires_fetch_once() -> Result<(), ChannelError> {
    let transport = Arc::new(
        MockTransport::new()
            .with_delay(Duration::from_millis(20))
            .route(COMPONENT_TOKEN_PATH, &[component_token("C1")])
            .route(AUTHORIZER_TOKEN_PATH, &[authorizer_token("A1")]),
    );
    let client = client_with(Arc::clone(&transport), store(), Arc::new(LocalLock::new()));

    let mut handles = vec![];
    for _ in 0..16 {
        let client = client.clone();
        handles.push(tokio::spawn(async move { client.access_token().await }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap()?.secret, "A1");
    }

    assert_eq!(transport.calls_to(COMPONENT_TOKEN_PATH).len(), 1);
    assert_eq!(transport.calls_to(AUTHORIZER_TOKEN_PATH).len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_tenants_refresh_independently() -> Result<(), ChannelError> {
    let transport = Arc::new(
        MockTransport::new()
            .route(COMPONENT_TOKEN_PATH, &[component_token("C1")])
            .route(AUTHORIZER_TOKEN_PATH, &[authorizer_token("A1"), authorizer_token("B1")]),
    );
    let store = store().with_refresh_token("wx_other", "refresh@@@2");
    let client = client_with(Arc::clone(&transport), store, Arc::new(LocalLock::new()));
    let other = client.for_tenant("wx_other");

    assert_eq!(client.ensure_access_token().await?.secret, "A1");
    assert_eq!(other.ensure_access_token().await?.secret, "B1");

    assert_eq!(transport.calls_to(COMPONENT_TOKEN_PATH).len(), 1);
    let refreshes = transport.calls_to(AUTHORIZER_TOKEN_PATH);
    assert_eq!(refreshes.len(), 2);
    let body: serde_json::Value =
        serde_json::from_slice(refreshes[1].body.as_deref().unwrap()).unwrap();
    assert_eq!(body["authorizer_appid"], "wx_other");
    assert_eq!(body["authorizer_refresh_token"], "refresh@@@2");
    Ok(())
}

#[tokio::test]
async fn test_rejected_token_is_refreshed_and_retried() -> Result<(), ChannelError> {
    let transport = Arc::new(
        MockTransport::new()
            .route(
                API_PATH,
                &[
                    r#"{"errcode":40001,"errmsg":"invalid credential"}"#,
                    r#"{"errcode":0,"errmsg":"ok","category_list":[]}"#,
                ],
            )
            .route(AUTHORIZER_TOKEN_PATH, &[authorizer_token("A1")]),
    );
    let store = seeded_store("A0").await?;
    let client = client_with(Arc::clone(&transport), store.clone(), Arc::new(LocalLock::new()));

    let url = api_url(&client, "A0");
    let response = client.request(&url, &RequestOptions::get()).await?.into_json()?;
    assert_eq!(response["errmsg"], "ok");

    let api_calls = transport.calls_to(API_PATH);
    assert_eq!(api_calls.len(), 2);
    assert_eq!(access_token_of(&api_calls[0]).as_deref(), Some("A0"));
    assert_eq!(access_token_of(&api_calls[1]).as_deref(), Some("A1"));
    assert_eq!(transport.calls_to(AUTHORIZER_TOKEN_PATH).len(), 1);
    assert!(transport.calls_to(COMPONENT_TOKEN_PATH).is_empty());

    let stored = store.get_authorizer_credential(TENANT).await?.unwrap();
    assert_eq!(stored.secret, "A1");
    Ok(())
}

#[tokio::test]
async fn test_all_credential_invalid_codes_trigger_retry() -> Result<(), ChannelError> {
    for code in [40001, 40014, 42001] {
        let rejected = format!(r#"{{"errcode":{code},"errmsg":"rejected"}}"#);
        let transport = Arc::new(
            MockTransport::new()
                .route(API_PATH, &[rejected.as_str(), r#"{"errcode":0}"#])
                .route(AUTHORIZER_TOKEN_PATH, &[authorizer_token("A1")]),
        );
        let client = client_with(
            Arc::clone(&transport),
            seeded_store("A0").await?,
            Arc::new(LocalLock::new()),
        );

        client
            .request(&api_url(&client, "A0"), &RequestOptions::get())
            .await?;
        assert_eq!(transport.calls_to(API_PATH).len(), 2, "code {code}");
    }
    Ok(())
}

#[tokio::test]
async fn test_retry_budget_exhaustion_surfaces_last_error() -> Result<(), ChannelError> {
    let transport = Arc::new(
        MockTransport::new()
            .route(API_PATH, &[r#"{"errcode":42001,"errmsg":"access_token expired"}"#])
            .route(
                AUTHORIZER_TOKEN_PATH,
                &[authorizer_token("A1"), authorizer_token("A2")],
            ),
    );
    let client = client_with(
        Arc::clone(&transport),
        seeded_store("A0").await?,
        Arc::new(LocalLock::new()),
    );

    let err = client
        .request_with_retries(&api_url(&client, "A0"), &RequestOptions::get(), 2)
        .await
        .unwrap_err();

    assert!(matches!(err, ChannelError::CredentialInvalid { code: 42001, .. }));
    assert_eq!(transport.calls_to(API_PATH).len(), 3);
    assert_eq!(transport.calls_to(AUTHORIZER_TOKEN_PATH).len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_zero_budget_does_not_retry() -> Result<(), ChannelError> {
    let transport = Arc::new(
        MockTransport::new()
            .route(API_PATH, &[r#"{"errcode":40001,"errmsg":"invalid credential"}"#]),
    );
    let client = client_with(
        Arc::clone(&transport),
        seeded_store("A0").await?,
        Arc::new(LocalLock::new()),
    );

    let err = client
        .request_with_retries(&api_url(&client, "A0"), &RequestOptions::get(), 0)
        .await
        .unwrap_err();
    assert!(err.is_credential_invalid());
    assert_eq!(transport.requests().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_other_errors_surface_immediately() -> Result<(), ChannelError> {
    let transport = Arc::new(
        MockTransport::new().route(
            API_PATH,
            &[r#"{"errcode":45009,"errmsg":"reach max api daily quota limit"}"#],
        ),
    );
    let client = client_with(
        Arc::clone(&transport),
        seeded_store("A0").await?,
        Arc::new(LocalLock::new()),
    );

    let err = client
        .request(&api_url(&client, "A0"), &RequestOptions::get())
        .await
        .unwrap_err();
    assert!(matches!(err, ChannelError::UpstreamApi { code: 45009, .. }));
    assert_eq!(transport.requests().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_url_without_access_token_is_retried_unchanged() -> Result<(), ChannelError> {
    let transport = Arc::new(
        MockTransport::new()
            .route(API_PATH, &[r#"{"errcode":40001}"#, r#"{"errcode":0}"#])
            .route(AUTHORIZER_TOKEN_PATH, &[authorizer_token("A1")]),
    );
    let client = client_with(
        Arc::clone(&transport),
        seeded_store("A0").await?,
        Arc::new(LocalLock::new()),
    );

    let url = format!("{}get_category", client.config().wxa_base);
    client.request(&url, &RequestOptions::get()).await?;

    let api_calls = transport.calls_to(API_PATH);
    assert_eq!(api_calls.len(), 2);
    assert_eq!(api_calls[1].url, url);
    Ok(())
}

#[tokio::test]
async fn test_lock_failure_surfaces_without_upstream_calls() {
    let transport = Arc::new(MockTransport::new());
    let client = client_with(Arc::clone(&transport), store(), Arc::new(UnavailableLock));

    let err = client.ensure_access_token().await.unwrap_err();
    assert!(matches!(err, ChannelError::LockAcquisitionFailure(_)));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_lock_released_on_every_path() -> Result<(), ChannelError> {
    let transport = Arc::new(
        MockTransport::new()
            .route(
                COMPONENT_TOKEN_PATH,
                &[
                    r#"{"errcode":-1,"errmsg":"system error"}"#.to_string(),
                    component_token("C1"),
                ],
            )
            .route(AUTHORIZER_TOKEN_PATH, &[authorizer_token("A1")]),
    );
    let lock = Arc::new(TrackingLock::default());
    let acquired = Arc::clone(&lock.acquired);
    let released = Arc::clone(&lock.released);
    let client = client_with(transport, store(), lock);

    assert!(client.ensure_access_token().await.is_err());
    assert_eq!(acquired.load(Ordering::SeqCst), 1);
    assert_eq!(released.load(Ordering::SeqCst), 1);

    assert_eq!(client.ensure_access_token().await?.secret, "A1");
    assert_eq!(acquired.load(Ordering::SeqCst), 3);
    assert_eq!(released.load(Ordering::SeqCst), 3);
    Ok(())
}

#[tokio::test]
async fn test_hook_observes_every_attempt() -> Result<(), ChannelError> {
    let attempts = Arc::new(AtomicUsize::new(0));
    let failures = Arc::new(AtomicUsize::new(0));
    let (a, f) = (Arc::clone(&attempts), Arc::clone(&failures));

    let transport = Arc::new(
        MockTransport::new()
            .route(API_PATH, &[r#"{"errcode":40001}"#, r#"{"errcode":0}"#])
            .route(AUTHORIZER_TOKEN_PATH, &[authorizer_token("A1")]),
    );
    let client = PlatformClient::builder("wx_component", "component_secret", TENANT)
        .with_transport(Arc::clone(&transport))
        .with_store(Arc::new(seeded_store("A0").await?))
        .with_config(ChannelConfig::from(ConfigPreset::Development))
        .with_request_hook(
            move |tenant: &str,
                  _: Duration,
                  _: &str,
                  _: &RequestOptions,
                  error: Option<&ChannelError>| {
                assert_eq!(tenant, TENANT);
                a.fetch_add(1, Ordering::SeqCst);
                if error.is_some() {
                    f.fetch_add(1, Ordering::SeqCst);
                }
            },
        )
        .build()?;

    client
        .request(&api_url(&client, "A0"), &RequestOptions::get())
        .await?;

    // Two API attempts plus the authorizer refresh in between.
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(failures.load(Ordering::SeqCst), 1);
    Ok(())
}
