use std::time::Duration;

use reqwest::Client;
use reqwest::Response;
use reqwest::StatusCode;
use reqwest::multipart::Form;
use reqwest::multipart::Part;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::models::ImageUpload;
use crate::models::NewReview;
use crate::models::Review;
use crate::models::ReviewFilter;
use crate::models::ReviewPatch;

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("review not found")]
  NotFound,
  #[error("store rejected the payload: {0}")]
  Validation(String),
  #[error("bad request: {0}")]
  BadRequest(String),
  #[error("review store unavailable: {0}")]
  Unavailable(String),
}

/// Operations the bot consumes from the review store. The store enforces
/// field ranges and ownership on its side; `owner` is forwarded so it can.
#[allow(async_fn_in_trait)]
pub trait ReviewStore: Send + Sync {
  async fn create(&self, review: &NewReview) -> Result<Review, ApiError>;
  async fn get(&self, id: i64) -> Result<Review, ApiError>;
  async fn update(&self, id: i64, owner: i64, patch: &ReviewPatch) -> Result<Review, ApiError>;
  async fn delete(&self, id: i64, owner: i64) -> Result<(), ApiError>;
  async fn list(&self, filter: &ReviewFilter) -> Result<Vec<Review>, ApiError>;
  async fn attach_image(&self, id: i64, owner: i64, image: ImageUpload) -> Result<Review, ApiError>;
}

pub struct HttpReviewStore {
  base_url: String,
  client: Client,
}

impl HttpReviewStore {
  pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
    let client = Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|err| ApiError::Unavailable(err.to_string()))?;
    Ok(Self {
      base_url: base_url.trim_end_matches('/').to_string(),
      client,
    })
  }

  pub async fn health(&self) -> bool {
    let url = format!("{}/health", self.base_url);
    match self.client.get(url).send().await {
      Ok(response) => response.status() == StatusCode::OK,
      Err(err) => {
        debug!(error = %err, "health probe failed");
        false
      },
    }
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.base_url, path)
  }
}

impl ReviewStore for HttpReviewStore {
  async fn create(&self, review: &NewReview) -> Result<Review, ApiError> {
    let response = self
      .client
      .post(self.url("/reviews/"))
      .json(review)
      .send()
      .await
      .map_err(transport_error)?;
    read_json(check(response).await?).await
  }

  async fn get(&self, id: i64) -> Result<Review, ApiError> {
    let response = self
      .client
      .get(self.url(&format!("/reviews/{id}")))
      .send()
      .await
      .map_err(transport_error)?;
    read_json(check(response).await?).await
  }

  async fn update(&self, id: i64, owner: i64, patch: &ReviewPatch) -> Result<Review, ApiError> {
    let response = self
      .client
      .patch(self.url(&format!("/reviews/{id}")))
      .query(&[("owner", owner)])
      .json(patch)
      .send()
      .await
      .map_err(transport_error)?;
    read_json(check(response).await?).await
  }

  async fn delete(&self, id: i64, owner: i64) -> Result<(), ApiError> {
    let response = self
      .client
      .delete(self.url(&format!("/reviews/{id}")))
      .query(&[("owner", owner)])
      .send()
      .await
      .map_err(transport_error)?;
    check(response).await?;
    Ok(())
  }

  async fn list(&self, filter: &ReviewFilter) -> Result<Vec<Review>, ApiError> {
    let mut params: Vec<(&str, String)> = Vec::new();
    if let Some(kind) = &filter.kind {
      params.push(("kind", kind.clone()));
    }
    if let Some(min_rating) = filter.min_rating {
      params.push(("min_rating", min_rating.to_string()));
    }
    let response = self
      .client
      .get(self.url("/reviews/"))
      .query(&params)
      .send()
      .await
      .map_err(transport_error)?;
    read_json(check(response).await?).await
  }

  async fn attach_image(&self, id: i64, owner: i64, image: ImageUpload) -> Result<Review, ApiError> {
    let part = Part::bytes(image.data)
      .file_name(image.filename)
      .mime_str("image/jpeg")
      .map_err(|err| ApiError::BadRequest(err.to_string()))?;
    let form = Form::new().part("file", part);
    let response = self
      .client
      .post(self.url(&format!("/reviews/{id}/image")))
      .query(&[("owner", owner)])
      .multipart(form)
      .send()
      .await
      .map_err(transport_error)?;
    read_json(check(response).await?).await
  }
}

fn transport_error(err: reqwest::Error) -> ApiError {
  if err.is_timeout() {
    ApiError::Unavailable("request timed out".to_string())
  } else {
    ApiError::Unavailable(err.to_string())
  }
}

async fn check(response: Response) -> Result<Response, ApiError> {
  match response.status() {
    StatusCode::NOT_FOUND => Err(ApiError::NotFound),
    StatusCode::UNPROCESSABLE_ENTITY => Err(ApiError::Validation(extract_detail(response).await)),
    StatusCode::BAD_REQUEST => Err(ApiError::BadRequest(extract_detail(response).await)),
    status if status.is_server_error() => Err(ApiError::Unavailable(format!("server error: {status}"))),
    _ => Ok(response),
  }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
  response
    .json()
    .await
    .map_err(|err| ApiError::Unavailable(format!("invalid response body: {err}")))
}

/// The store reports errors as `{"detail": ...}`; fall back when it does not.
async fn extract_detail(response: Response) -> String {
  match response.json::<Value>().await {
    Ok(body) => match body.get("detail") {
      Some(Value::String(text)) => text.clone(),
      Some(other) => other.to_string(),
      None => "unknown error".to_string(),
    },
    Err(_) => "unknown error".to_string(),
  }
}
