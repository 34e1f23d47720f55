mod http;

use async_trait::async_trait;

pub use self::http::HttpApi;
use crate::task::{
  Credentials,
  DraftTask,
  Task,
  TaskId,
  TaskPatch
};

const GENERIC_FAILURE: &str =
  "Unexpected error";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
  #[error("not authenticated{}", suffix(.message))]
  Unauthorized {
    message: Option<String>
  },
  #[error("request rejected with HTTP {status}{}", suffix(.message))]
  Rejected {
    status:  u16,
    message: Option<String>
  },
  #[error("network error: {0}")]
  Network(String),
  #[error("failed to decode response: {0}")]
  Decode(String),
  #[error("invalid API URL: {0}")]
  InvalidUrl(String)
}

fn suffix(
  message: &Option<String>
) -> String {
  message
    .as_deref()
    .map(|text| format!(": {text}"))
    .unwrap_or_default()
}

impl ApiError {
  /// Text the server put in the error
  /// body, if any.
  pub fn remote_message(
    &self
  ) -> Option<&str> {
    match self {
      | ApiError::Unauthorized {
        message
      }
      | ApiError::Rejected {
        message,
        ..
      } => message.as_deref(),
      | _ => None
    }
  }

  pub fn user_message(&self) -> String {
    if let Some(text) =
      self.remote_message()
    {
      return text.to_string();
    }

    match self {
      | ApiError::Unauthorized {
        ..
      } => "Not logged in".to_string(),
      | ApiError::Rejected {
        status,
        ..
      } => {
        format!(
          "Request failed (HTTP \
           {status})"
        )
      }
      | _ => GENERIC_FAILURE.to_string()
    }
  }

  pub fn is_unauthorized(&self) -> bool {
    matches!(
      self,
      ApiError::Unauthorized { .. }
    )
  }
}

/// Calls the remote task API exposes.
/// Session credentials travel with
/// every request at the transport
/// level.
#[async_trait]
pub trait RemoteApi: Send + Sync {
  async fn whoami(
    &self
  ) -> Result<(), ApiError>;

  async fn login(
    &self,
    credentials: &Credentials
  ) -> Result<(), ApiError>;

  async fn logout(
    &self
  ) -> Result<(), ApiError>;

  async fn register(
    &self,
    credentials: &Credentials
  ) -> Result<(), ApiError>;

  async fn list_tasks(
    &self
  ) -> Result<Vec<Task>, ApiError>;

  async fn create_task(
    &self,
    draft: &DraftTask
  ) -> Result<Task, ApiError>;

  async fn update_task(
    &self,
    id: &TaskId,
    patch: &TaskPatch
  ) -> Result<Task, ApiError>;

  async fn delete_task(
    &self,
    id: &TaskId
  ) -> Result<(), ApiError>;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn user_message_prefers_server_text()
  {
    let err = ApiError::Rejected {
      status:  400,
      message: Some(
        "Title is required".to_string()
      )
    };
    assert_eq!(
      err.user_message(),
      "Title is required"
    );
    assert_eq!(
      err.to_string(),
      "request rejected with HTTP 400: \
       Title is required"
    );
  }

  #[test]
  fn user_message_falls_back_by_kind()
  {
    assert_eq!(
      ApiError::Network(
        "connection refused".to_string()
      )
      .user_message(),
      "Unexpected error"
    );
    assert_eq!(
      ApiError::Rejected {
        status:  500,
        message: None
      }
      .user_message(),
      "Request failed (HTTP 500)"
    );
    assert_eq!(
      ApiError::Unauthorized {
        message: None
      }
      .user_message(),
      "Not logged in"
    );
    assert!(
      ApiError::Unauthorized {
        message: None
      }
      .is_unauthorized()
    );
  }
}
