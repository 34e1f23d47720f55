use async_trait::async_trait;
use reqwest::{
  Client,
  Method,
  Response,
  StatusCode,
  Url
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{
  debug,
  instrument,
  warn
};
use uuid::Uuid;

use super::{
  ApiError,
  RemoteApi
};
use crate::task::{
  Credentials,
  DraftTask,
  Task,
  TaskId,
  TaskPatch
};

/// reqwest-backed client. The session
/// cookie set by `/auth/login` lives in
/// the client's in-memory cookie store
/// and is dropped with it.
#[derive(Debug, Clone)]
pub struct HttpApi {
  client: Client,
  base:   Url
}

impl HttpApi {
  pub fn new(
    base_url: &str
  ) -> Result<Self, ApiError> {
    let trimmed = base_url.trim();
    let mut base = Url::parse(trimmed)
      .map_err(|err| {
        ApiError::InvalidUrl(format!(
          "{trimmed}: {err}"
        ))
      })?;

    if base.cannot_be_a_base() {
      return Err(ApiError::InvalidUrl(
        trimmed.to_string()
      ));
    }

    if !base.path().ends_with('/') {
      let path =
        format!("{}/", base.path());
      base.set_path(&path);
    }

    let client = Client::builder()
      .cookie_store(true)
      .build()
      .map_err(|err| {
        ApiError::Network(format!(
          "failed building HTTP \
           client: {err}"
        ))
      })?;

    debug!(base = %base, "configured task API client");

    Ok(Self {
      client,
      base
    })
  }

  pub fn base_url(&self) -> &Url {
    &self.base
  }

  fn endpoint(
    &self,
    segments: &[&str]
  ) -> Result<Url, ApiError> {
    let mut url = self.base.clone();
    url
      .path_segments_mut()
      .map_err(|()| {
        ApiError::InvalidUrl(
          self.base.to_string()
        )
      })?
      .pop_if_empty()
      .extend(segments);
    Ok(url)
  }

  async fn call<B>(
    &self,
    method: Method,
    segments: &[&str],
    body: Option<&B>
  ) -> Result<Response, ApiError>
  where
    B: Serialize + Sync + ?Sized
  {
    let url = self.endpoint(segments)?;
    let request_id = Uuid::new_v4();

    let mut request = self
      .client
      .request(method.clone(), url.clone());
    if let Some(body) = body {
      request = request.json(body);
    }

    debug!(%request_id, %method, url = %url, "sending API request");

    let response =
      match request.send().await {
        | Ok(response) => response,
        | Err(err) => {
          warn!(
            %request_id,
            %method,
            url = %url,
            error = %err,
            "API request failed before \
             a response arrived"
          );
          return Err(
            ApiError::Network(
              err.to_string()
            )
          );
        }
      };

    let status = response.status();
    debug!(%request_id, status = %status, "API response received");

    if status.is_success() {
      return Ok(response);
    }

    let body = response
      .text()
      .await
      .unwrap_or_default();
    let message =
      extract_message(&body);

    if status == StatusCode::UNAUTHORIZED
    {
      return Err(
        ApiError::Unauthorized {
          message
        }
      );
    }

    warn!(
      %request_id,
      status = %status,
      message = ?message,
      "API rejected request"
    );
    Err(ApiError::Rejected {
      status: status.as_u16(),
      message
    })
  }

  async fn call_json<T, B>(
    &self,
    method: Method,
    segments: &[&str],
    body: Option<&B>
  ) -> Result<T, ApiError>
  where
    T: DeserializeOwned,
    B: Serialize + Sync + ?Sized
  {
    let response = self
      .call(method, segments, body)
      .await?;
    response.json::<T>().await.map_err(
      |err| {
        ApiError::Decode(err.to_string())
      }
    )
  }
}

/// Pulls a human readable message out
/// of an error body: `message` first,
/// then `error`.
pub(crate) fn extract_message(
  body: &str
) -> Option<String> {
  let value: serde_json::Value =
    serde_json::from_str(body).ok()?;

  ["message", "error"]
    .iter()
    .find_map(|key| {
      value
        .get(key)
        .and_then(|v| v.as_str())
    })
    .map(str::trim)
    .filter(|text| !text.is_empty())
    .map(ToString::to_string)
}

#[async_trait]
impl RemoteApi for HttpApi {
  #[instrument(skip(self))]
  async fn whoami(
    &self
  ) -> Result<(), ApiError> {
    self
      .call::<()>(
        Method::GET,
        &["auth", "me"],
        None
      )
      .await
      .map(|_| ())
  }

  #[instrument(skip(self, credentials), fields(email = %credentials.email))]
  async fn login(
    &self,
    credentials: &Credentials
  ) -> Result<(), ApiError> {
    self
      .call(
        Method::POST,
        &["auth", "login"],
        Some(credentials)
      )
      .await
      .map(|_| ())
  }

  #[instrument(skip(self))]
  async fn logout(
    &self
  ) -> Result<(), ApiError> {
    self
      .call::<()>(
        Method::POST,
        &["auth", "logout"],
        None
      )
      .await
      .map(|_| ())
  }

  #[instrument(skip(self, credentials), fields(email = %credentials.email))]
  async fn register(
    &self,
    credentials: &Credentials
  ) -> Result<(), ApiError> {
    self
      .call(
        Method::POST,
        &["auth", "register"],
        Some(credentials)
      )
      .await
      .map(|_| ())
  }

  #[instrument(skip(self))]
  async fn list_tasks(
    &self
  ) -> Result<Vec<Task>, ApiError> {
    self
      .call_json::<_, ()>(
        Method::GET,
        &["tasks"],
        None
      )
      .await
  }

  #[instrument(skip(self, draft), fields(title_len = draft.title.len(), status = %draft.status))]
  async fn create_task(
    &self,
    draft: &DraftTask
  ) -> Result<Task, ApiError> {
    self
      .call_json(
        Method::POST,
        &["tasks"],
        Some(draft)
      )
      .await
  }

  #[instrument(skip(self, patch), fields(task_id = %id))]
  async fn update_task(
    &self,
    id: &TaskId,
    patch: &TaskPatch
  ) -> Result<Task, ApiError> {
    self
      .call_json(
        Method::PUT,
        &["tasks", id.as_str()],
        Some(patch)
      )
      .await
  }

  #[instrument(skip(self), fields(task_id = %id))]
  async fn delete_task(
    &self,
    id: &TaskId
  ) -> Result<(), ApiError> {
    self
      .call::<()>(
        Method::DELETE,
        &["tasks", id.as_str()],
        None
      )
      .await
      .map(|_| ())
  }
}
