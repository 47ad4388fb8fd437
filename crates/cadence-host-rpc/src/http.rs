use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use crate::{CallOptions, InvokeError, Invoker, Payload};

#[derive(Debug, Clone)]
pub struct HttpInvokerConfig {
  pub base_url: Url,
  /// Used when the call itself carries no timeout.
  pub default_timeout: Option<Duration>,
  /// Transport-level retries for calls that do not set their own.
  pub retries: u32,
}

/// Invoker that POSTs the payload as JSON to `{base_url}/{target}/{operation}`.
#[derive(Debug, Clone)]
pub struct HttpInvoker {
  client: Client,
  base_url: Url,
  default_timeout: Option<Duration>,
  retries: u32,
}

impl HttpInvoker {
  pub fn new(config: HttpInvokerConfig) -> Self {
    Self {
      client: Client::new(),
      base_url: config.base_url,
      default_timeout: config.default_timeout,
      retries: config.retries,
    }
  }

  pub fn endpoint(&self, target: &str, operation: &str) -> Result<Url, InvokeError> {
    let mut url = self.base_url.clone();
    url
      .path_segments_mut()
      .map_err(|_| InvokeError::InvalidEndpoint {
        url: self.base_url.to_string(),
      })?
      .pop_if_empty()
      .push(target)
      .push(operation);
    Ok(url)
  }

  async fn attempt(&self, url: Url, payload: &Payload) -> Result<Payload, InvokeError> {
    let response = self.client.post(url).json(payload).send().await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
      return Err(InvokeError::Remote {
        status: status.as_u16(),
        body,
      });
    }
    if body.trim().is_empty() {
      return Ok(Payload::empty());
    }
    Ok(Payload::from_json(&body)?)
  }
}

#[async_trait]
impl Invoker for HttpInvoker {
  async fn call(
    &self,
    target: &str,
    operation: &str,
    payload: &Payload,
    options: &CallOptions,
  ) -> Result<Payload, InvokeError> {
    let url = self.endpoint(target, operation)?;
    let timeout = options.timeout.or(self.default_timeout);
    let retries = options.retries.unwrap_or(self.retries);
    let mut attempt = 0;

    loop {
      debug!(url = %url, attempt, "invoking remote operation");
      let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, self.attempt(url.clone(), payload))
          .await
          .unwrap_or(Err(InvokeError::Timeout {
            timeout_ms: limit.as_millis() as u64,
          })),
        None => self.attempt(url.clone(), payload).await,
      };

      match result {
        Err(e) if e.is_retryable() && attempt < retries => {
          attempt += 1;
          warn!(url = %url, attempt, error = %e, "retrying remote operation");
        }
        other => return other,
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;
  use std::sync::atomic::{AtomicUsize, Ordering};

  use serde_json::json;
  use tokio::io::{AsyncReadExt, AsyncWriteExt};
  use tokio::net::{TcpListener, TcpStream};

  fn invoker(base: &str) -> HttpInvoker {
    retrying_invoker(base, 0)
  }

  /// Serves every connection with the same canned response and counts requests.
  async fn serve(status: &'static str, body: &'static str) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
      while let Ok((mut stream, _)) = listener.accept().await {
        counter.fetch_add(1, Ordering::SeqCst);
        read_request(&mut stream).await;
        let response = format!(
          "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
          status,
          body.len(),
          body
        );
        let _ = stream.write_all(response.as_bytes()).await;
        let _ = stream.shutdown().await;
      }
    });

    (format!("http://{}/", addr), hits)
  }

  /// Accepts connections and never answers them.
  async fn serve_silently() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
      let mut open = Vec::new();
      while let Ok((stream, _)) = listener.accept().await {
        counter.fetch_add(1, Ordering::SeqCst);
        open.push(stream);
      }
    });

    (format!("http://{}/", addr), hits)
  }

  fn retrying_invoker(base: &str, retries: u32) -> HttpInvoker {
    HttpInvoker::new(HttpInvokerConfig {
      base_url: Url::parse(base).unwrap(),
      default_timeout: None,
      retries,
    })
  }

  async fn read_request(stream: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
      let n = stream.read(&mut chunk).await.unwrap_or(0);
      if n == 0 {
        return;
      }
      buf.extend_from_slice(&chunk[..n]);
      let text = String::from_utf8_lossy(&buf);
      if let Some(end) = text.find("\r\n\r\n") {
        let length = text[..end]
          .lines()
          .find_map(|l| {
            let (name, value) = l.split_once(':')?;
            name
              .eq_ignore_ascii_case("content-length")
              .then(|| value.trim().parse::<usize>().ok())
              .flatten()
          })
          .unwrap_or(0);
        if buf.len() >= end + 4 + length {
          return;
        }
      }
    }
  }

  #[test]
  fn test_endpoint_joins_segments() {
    let http = invoker("http://localhost:8080/api/");
    assert_eq!(
      http.endpoint("billing", "charge").unwrap().as_str(),
      "http://localhost:8080/api/billing/charge"
    );

    let http = invoker("http://localhost:8080");
    assert_eq!(
      http.endpoint("billing", "charge").unwrap().as_str(),
      "http://localhost:8080/billing/charge"
    );
  }

  #[test]
  fn test_endpoint_rejects_opaque_base() {
    let http = invoker("mailto:ops@example.com");
    assert!(matches!(
      http.endpoint("a", "b"),
      Err(InvokeError::InvalidEndpoint { .. })
    ));
  }

  #[tokio::test]
  async fn test_call_returns_json_body() {
    let (base, hits) = serve("200 OK", r#"{"charged":true}"#).await;
    let http = invoker(&base);

    let response = http
      .call("billing", "charge", &Payload::new(json!({"amount": 3})), &CallOptions::default())
      .await
      .unwrap();

    assert_eq!(response.as_value(), &json!({"charged": true}));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_empty_body_is_empty_payload() {
    let (base, _) = serve("204 No Content", "").await;
    let response = invoker(&base)
      .call("audit", "record", &Payload::empty(), &CallOptions::default())
      .await
      .unwrap();
    assert!(response.is_empty());
  }

  #[tokio::test]
  async fn test_remote_status_is_not_retried() {
    let (base, hits) = serve("500 Internal Server Error", "boom").await;
    let options = CallOptions {
      timeout: None,
      retries: Some(3),
    };

    let result = invoker(&base)
      .call("billing", "charge", &Payload::empty(), &options)
      .await;

    match result {
      Err(InvokeError::Remote { status, body }) => {
        assert_eq!(status, 500);
        assert_eq!(body, "boom");
      }
      other => panic!("expected remote error, got {:?}", other),
    }
    assert_eq!(hits.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_explicit_zero_retries_beats_invoker_default() {
    let (base, hits) = serve_silently().await;
    let options = CallOptions {
      timeout: Some(Duration::from_millis(50)),
      retries: Some(0),
    };

    let result = retrying_invoker(&base, 2)
      .call("billing", "charge", &Payload::empty(), &options)
      .await;

    assert!(matches!(result, Err(InvokeError::Timeout { timeout_ms: 50 })));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_unset_retries_use_invoker_default() {
    let (base, hits) = serve_silently().await;
    let options = CallOptions {
      timeout: Some(Duration::from_millis(50)),
      retries: None,
    };

    let result = retrying_invoker(&base, 2)
      .call("billing", "charge", &Payload::empty(), &options)
      .await;

    assert!(matches!(result, Err(InvokeError::Timeout { .. })));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 3);
  }

  #[test]
  fn test_retry_classification() {
    assert!(InvokeError::Timeout { timeout_ms: 5 }.is_retryable());
    assert!(
      !InvokeError::Remote {
        status: 503,
        body: String::new()
      }
      .is_retryable()
    );
    assert!(!InvokeError::failed("nope").is_retryable());
  }
}
