//! Walks through one push/reply cycle and one token refresh with a
//! scripted in-process platform, so it runs without network access.

use async_trait::async_trait;
use open_platform_channel::transport::{HttpRequest, HttpResponse, Transport};
use open_platform_channel::{
    ChannelConfig, ChannelError, ConfigPreset, LocalLock, MessageCrypto, PlatformClient,
    RequestOptions,
};
use std::sync::Arc;
use std::time::Duration;

/// Answers token endpoints and one API with canned bodies.
struct CannedPlatform;

#[async_trait]
impl Transport for CannedPlatform {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ChannelError> {
        let body = if request.url.contains("api_component_token") {
            r#"{"component_access_token":"COMPONENT_TOKEN","expires_in":7200}"#
        } else if request.url.contains("api_authorizer_token") {
            r#"{"authorizer_access_token":"AUTHORIZER_TOKEN","expires_in":7200}"#
        } else {
            r#"{"errcode":0,"errmsg":"ok","category_list":[{"first_class":"Tools"}]}"#
        };
        Ok(HttpResponse::json(body))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("🔐 Push / reply round trip");
    println!("==========================\n");

    let crypto = MessageCrypto::new(
        "wx_test",
        "signing_token",
        "abcdefghijklmnopqrstuvwxyz0123456789ABCDEFG",
    )?;

    // What the platform would push to the integration's callback URL
    let push = crypto.encrypt_message(
        "<xml><ToUserName>gh_123</ToUserName><Content>hello</Content></xml>",
        None,
        None,
    )?;
    println!("📨 Push signature: {}", push.msg_signature);

    let payload = crypto.decrypt_message(
        &push.msg_signature,
        &push.timestamp.to_string(),
        &push.nonce.to_string(),
        &push.encrypt,
    )?;
    println!("✅ Decrypted payload: {payload}");

    let reply = crypto.build_reply("<xml><Content>world</Content></xml>", None, None)?;
    println!("📤 Encrypted reply:\n{reply}\n");

    println!("🎟️  Token lifecycle");
    println!("===================\n");

    let client = PlatformClient::builder("wx_component", "component_secret", "wx_tenant")
        .with_verify_ticket("ticket@@@demo")
        .with_refresh_token("refreshtoken@@@demo")
        .with_transport(Arc::new(CannedPlatform))
        .with_lock(Arc::new(LocalLock::new()))
        .with_config(ChannelConfig::from(ConfigPreset::Development))
        .with_request_hook(
            |tenant: &str,
             elapsed: Duration,
             url: &str,
             _: &RequestOptions,
             error: Option<&ChannelError>| {
                println!("  ⏱️  [{tenant}] {url} in {elapsed:?} (error: {error:?})");
            },
        )
        .build()?;
    println!("{}", client.config().summary());

    let token = client.ensure_access_token().await?;
    println!("✅ Authorizer token: {}", token.secret);

    let url = client.url_for(&client.config().wxa_base, "get_category", &token.secret);
    let categories = client.request(&url, &RequestOptions::get()).await?.into_json()?;
    println!("✅ Categories: {}", categories["category_list"]);

    Ok(())
}
