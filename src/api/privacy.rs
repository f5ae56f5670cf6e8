//! Mini-program privacy settings and privacy-interface applications.

use crate::{ChannelError, PlatformClient, RequestOptions};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
struct SetPrivacySetting<'a> {
    owner_setting: &'a Value,
    privacy_ver: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    setting_list: Option<&'a Value>,
}

#[derive(Debug, Serialize)]
struct ApplyPrivacyInterface<'a> {
    api_name: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pic_list: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    video_list: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url_list: Option<&'a [String]>,
}

fn to_body<T: Serialize>(body: &T) -> Result<Value, ChannelError> {
    serde_json::to_value(body)
        .map_err(|e| ChannelError::Configuration(format!("Unserializable request body: {e}")))
}

/// Fetches the privacy guide settings of the authorizer's mini program.
///
/// `privacy_ver` is `1` for the current settings and `2` (the usual value)
/// for the pending ones.
pub async fn get_privacy_setting(
    client: &PlatformClient,
    privacy_ver: u32,
) -> Result<Value, ChannelError> {
    let url = client
        .authorized_url(&client.config().api_base, "component/getprivacysetting")
        .await?;
    let body = serde_json::json!({ "privacy_ver": privacy_ver });
    client
        .request(&url, &RequestOptions::post_json(body))
        .await?
        .into_json()
}

/// Updates the privacy guide settings of the authorizer's mini program.
///
/// `setting_list` is not sent for `privacy_ver == 1`, which only updates
/// the owner settings; any other version requires it.
///
/// # Errors
///
/// `Configuration` when `setting_list` is missing for a version other than 1.
pub async fn set_privacy_setting(
    client: &PlatformClient,
    owner_setting: &Value,
    privacy_ver: u32,
    setting_list: Option<&Value>,
) -> Result<Value, ChannelError> {
    let setting_list = if privacy_ver == 1 {
        None
    } else {
        Some(setting_list.ok_or_else(|| {
            ChannelError::Configuration("setting_list is required".to_string())
        })?)
    };
    let body = to_body(&SetPrivacySetting {
        owner_setting,
        privacy_ver,
        setting_list,
    })?;

    let url = client
        .authorized_url(&client.config().api_base, "component/setprivacysetting")
        .await?;
    client
        .request(&url, &RequestOptions::post_json(body))
        .await?
        .into_json()
}

/// Lists the privacy interfaces the mini program may apply for and their
/// application status.
pub async fn get_privacy_interface(client: &PlatformClient) -> Result<Value, ChannelError> {
    let url = client
        .authorized_url(&client.config().wxa_base, "security/get_privacy_interface")
        .await?;
    client
        .request(&url, &RequestOptions::get())
        .await?
        .into_json()
}

/// Applies for access to a privacy interface such as `wx.getLocation`.
///
/// Optional supporting material lists are omitted from the request when
/// `None`.
pub async fn apply_privacy_interface(
    client: &PlatformClient,
    api_name: &str,
    content: &str,
    pic_list: Option<&[String]>,
    video_list: Option<&[String]>,
    url_list: Option<&[String]>,
) -> Result<Value, ChannelError> {
    let body = to_body(&ApplyPrivacyInterface {
        api_name,
        content,
        pic_list,
        video_list,
        url_list,
    })?;

    let url = client
        .authorized_url(&client.config().wxa_base, "security/apply_privacy_interface")
        .await?;
    client
        .request(&url, &RequestOptions::post_json(body))
        .await?
        .into_json()
}
