use crate::ports;
use crate::types::api::{
    AlertUpdated, ErrorBody, SosRequest, SosSaved, UserRequest, UserSaved,
};
use crate::types::places::{NearbyResponse, PlaceResult};
use crate::types::records::{AlertLevel, AlertStatusView};

use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::{StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid API base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server answered {status}: {message}")]
    Status { status: u16, message: String },
    #[error("no user registered for {0}")]
    UserNotFound(String),
}

/// Typed client over the HTTP API. Path segments are percent-encoded, so a
/// phone number like `+1 555` is safe to pass as-is.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_http(reqwest::Client::new(), base_url)
    }

    pub fn with_http(http: reqwest::Client, base_url: &str) -> Result<Self, ClientError> {
        let base =
            Url::parse(base_url).map_err(|err| ClientError::InvalidBaseUrl(err.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidBaseUrl(base_url.to_string()));
        }
        Ok(Self { http, base })
    }

    pub async fn save_user(&self, user: &UserRequest) -> Result<UserSaved, ClientError> {
        let response = self.http.post(self.url(&["api", "users"])).json(user).send().await?;
        decode(response).await
    }

    /// `None` when the server does not know the phone.
    pub async fn alert_status(&self, phone: &str) -> Result<Option<AlertStatusView>, ClientError> {
        let response = self
            .http
            .get(self.url(&["api", "users", phone, "alerts"]))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        decode(response).await.map(Some)
    }

    pub async fn set_alert_status(
        &self,
        phone: &str,
        level: AlertLevel,
    ) -> Result<AlertUpdated, ClientError> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Body {
            alert_status: AlertLevel,
        }

        let response = self
            .http
            .put(self.url(&["api", "users", phone, "alerts"]))
            .json(&Body {
                alert_status: level,
            })
            .send()
            .await?;
        decode(response).await
    }

    pub async fn send_sos(&self, request: &SosRequest) -> Result<SosSaved, ClientError> {
        let response = self.http.post(self.url(&["api", "sos"])).json(request).send().await?;
        decode(response).await
    }

    pub async fn nearby_places(
        &self,
        lat: f64,
        lng: f64,
        kind: &str,
        radius: u32,
    ) -> Result<NearbyResponse, ClientError> {
        let response = self
            .http
            .get(self.url(&["api", "places", "nearby"]))
            .query(&[
                ("lat", lat.to_string()),
                ("lng", lng.to_string()),
                ("type", kind.to_string()),
                ("radius", radius.to_string()),
            ])
            .send()
            .await?;
        decode(response).await
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
    };
    Err(ClientError::Status {
        status: status.as_u16(),
        message,
    })
}

impl ports::AlertSource for ApiClient {
    type Error = ClientError;
    type Fut<'a>
        = BoxFuture<'a, Result<AlertStatusView, ClientError>>
    where
        Self: 'a;

    fn fetch_status<'a>(&'a self, phone: &'a str) -> Self::Fut<'a> {
        async move {
            self.alert_status(phone)
                .await?
                .ok_or_else(|| ClientError::UserNotFound(phone.to_string()))
        }
        .boxed()
    }
}

impl ports::PlacesSearch for ApiClient {
    type Error = ClientError;
    type Fut<'a>
        = BoxFuture<'a, Result<Vec<PlaceResult>, ClientError>>
    where
        Self: 'a;

    fn nearby<'a>(&'a self, lat: f64, lng: f64, category: &'a str, radius: u32) -> Self::Fut<'a> {
        async move {
            let response = self.nearby_places(lat, lng, category, radius).await?;
            Ok(response.results)
        }
        .boxed()
    }
}
