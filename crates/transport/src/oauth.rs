use crate::{
    error::SparkError,
    http::{HttpRequest, HttpResponse},
    uri::Uri,
};
use serde::Deserialize;
use spark_config::Config;

/// Token issued by the tenant's keycloak realm.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_expires_in: u64,
    #[serde(default)]
    pub token_type: String,
    #[serde(default, rename = "not-before-policy")]
    pub not_before_policy: u64,
    #[serde(default)]
    pub scope: String,
}

impl AccessToken {
    pub fn from_response(response: &HttpResponse) -> Result<Self, SparkError> {
        let data = response
            .data
            .clone()
            .ok_or_else(|| SparkError::sdk("no access token found"))?;
        let token: AccessToken = serde_json::from_value(data)
            .map_err(|e| SparkError::sdk_with("failed to decode OAuth2 access token", e))?;

        if token.access_token.is_empty() {
            return Err(SparkError::sdk("no access token found"));
        }
        Ok(token)
    }
}

/// Client-credentials request against
/// `{realm}/protocol/openid-connect/token`.
pub fn token_request(config: &Config) -> Result<HttpRequest, SparkError> {
    let creds = config
        .auth()
        .oauth()
        .ok_or_else(|| SparkError::sdk("OAuth2 credentials are not configured"))?;

    let url = Uri::of(
        None,
        &config.base_url().oauth2(),
        "protocol",
        "openid-connect/token",
    )?;

    let form = creds
        .form()
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

    Ok(HttpRequest::post(url).with_form(form))
}
