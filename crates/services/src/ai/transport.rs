use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::AiConfig;
use crate::error::TransportError;

/// Sampling parameters sent with every generation request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 4096,
        }
    }
}

/// One call against one model.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    pub params: GenerationParams,
    /// When set, the model is constrained to emit JSON matching this schema.
    pub response_schema: Option<Value>,
}

/// HTTP seam for the generation endpoint.
#[async_trait]
pub trait ModelTransport: Send + Sync {
    /// Run one generation request and return the first candidate's text.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` for rejected, failed or empty calls.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, TransportError>;
}

/// `generateContent` over reqwest.
#[derive(Clone)]
pub struct GeminiTransport {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GeminiTransport {
    /// Build a transport with the configured request timeout.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Http` if the HTTP client cannot be built.
    pub fn new(config: &AiConfig) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl ModelTransport for GeminiTransport {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, TransportError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, request.model);
        let payload = GenerateContentRequest::new(request);

        let response = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
            .await
            .map_err(map_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(model = %request.model, status = status.as_u16(), "generation request rejected");
            return Err(rejection(status.as_u16(), &body));
        }

        let body: GenerateContentResponse = response.json().await.map_err(map_reqwest)?;
        body.first_text().ok_or(TransportError::EmptyResponse)
    }
}

fn map_reqwest(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Http(e)
    }
}

/// Build a `Rejected` error from a non-success status and its body.
pub(crate) fn rejection(status: u16, body: &str) -> TransportError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => TransportError::Rejected {
            status: envelope.error.code.unwrap_or(status),
            api_status: envelope.error.status,
            message: envelope.error.message,
        },
        Err(_) => TransportError::Rejected {
            status,
            api_status: None,
            message: body.chars().take(500).collect(),
        },
    }
}

//
// ─── WIRE TYPES ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig<'a>,
}

impl<'a> GenerateContentRequest<'a> {
    fn new(request: &'a GenerationRequest) -> Self {
        Self {
            contents: vec![RequestContent {
                parts: vec![RequestPart {
                    text: &request.prompt,
                }],
            }],
            generation_config: GenerationConfig {
                params: request.params,
                response_mime_type: request
                    .response_schema
                    .as_ref()
                    .map(|_| "application/json"),
                response_schema: request.response_schema.as_ref(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    #[serde(flatten)]
    params: GenerationParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<&'a Value>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .find_map(|p| p.text.filter(|t| !t.trim().is_empty()))
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: Option<u16>,
    #[serde(default)]
    message: String,
    status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    #[test]
    fn request_body_matches_endpoint_shape() {
        let request = GenerationRequest {
            model: "gemini-1.5-flash".into(),
            prompt: "hello".into(),
            params: GenerationParams::default(),
            response_schema: None,
        };
        let body = serde_json::to_value(GenerateContentRequest::new(&request)).unwrap();
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(body["generationConfig"]["topK"], 40);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 4096);
        assert!(body["generationConfig"].get("responseMimeType").is_none());
    }

    #[test]
    fn schema_sets_json_mime_type() {
        let request = GenerationRequest {
            model: "m".into(),
            prompt: "p".into(),
            params: GenerationParams::default(),
            response_schema: Some(json!({"type": "OBJECT"})),
        };
        let body = serde_json::to_value(GenerateContentRequest::new(&request)).unwrap();
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "OBJECT");
    }

    #[test]
    fn first_text_reads_first_candidate() {
        let body: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "{\"questions\": []}"}]}}]
        }))
        .unwrap();
        assert_eq!(body.first_text().as_deref(), Some("{\"questions\": []}"));

        let empty: GenerateContentResponse =
            serde_json::from_value(json!({"candidates": []})).unwrap();
        assert_eq!(empty.first_text(), None);
    }

    #[test]
    fn first_text_skips_blank_parts() {
        let body: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "  \n"}, {}, {"text": "answer"}]}}]
        }))
        .unwrap();
        assert_eq!(body.first_text().as_deref(), Some("answer"));

        let blank: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": " "}]}}]
        }))
        .unwrap();
        assert_eq!(blank.first_text(), None);
    }

    #[test]
    fn rejection_parses_error_envelope() {
        let err = rejection(
            403,
            r#"{"error": {"code": 403, "message": "API key not valid", "status": "PERMISSION_DENIED"}}"#,
        );
        assert!(err.is_terminal());

        let err = rejection(503, "<html>Service Unavailable</html>");
        assert!(!err.is_terminal());
    }

    // ─── over HTTP ──────────────────────────────────────────────────────────

    /// Accept one connection, answer it with `status` and `body`, and hand
    /// back the raw request that was received.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0_u8; 4096];
            while !request_complete(&received) {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\n\
                 content-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&received).into_owned()
        });
        (format!("http://{addr}"), server)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some((head, body)) = text.split_once("\r\n\r\n") else {
            return false;
        };
        let length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        body.len() >= length
    }

    fn transport(base_url: String) -> GeminiTransport {
        GeminiTransport::new(&AiConfig {
            base_url,
            ..AiConfig::with_api_key("secret")
        })
        .unwrap()
    }

    fn request(model: &str) -> GenerationRequest {
        GenerationRequest {
            model: model.into(),
            prompt: "Cardiology".into(),
            params: GenerationParams::default(),
            response_schema: None,
        }
    }

    #[tokio::test]
    async fn forbidden_response_is_terminal_and_key_is_a_query_param() {
        let (base_url, server) = serve_once(
            "403 Forbidden",
            r#"{"error": {"code": 403, "message": "denied", "status": "PERMISSION_DENIED"}}"#,
        )
        .await;
        let err = transport(base_url)
            .generate(&request("m"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Rejected { status: 403, .. }));
        assert!(err.is_terminal());

        let received = server.await.unwrap();
        let request_line = received.lines().next().unwrap();
        assert!(request_line.starts_with("POST /models/m:generateContent?key=secret "));
        assert!(received.contains("\"text\":\"Cardiology\""));
    }

    #[tokio::test]
    async fn invalid_argument_is_terminal() {
        let (base_url, server) = serve_once(
            "400 Bad Request",
            r#"{"error": {"code": 400, "message": "bad schema", "status": "INVALID_ARGUMENT"}}"#,
        )
        .await;
        let err = transport(base_url)
            .generate(&request("m"))
            .await
            .unwrap_err();
        assert!(err.is_terminal());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn unavailable_response_is_retryable() {
        let (base_url, server) = serve_once("503 Service Unavailable", "overloaded").await;
        let err = transport(base_url)
            .generate(&request("m"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Rejected { status: 503, .. }));
        assert!(!err.is_terminal());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn success_returns_first_candidate_text() {
        let (base_url, server) = serve_once(
            "200 OK",
            r#"{"candidates": [{"content": {"parts": [{"text": "{\"questions\": []}"}]}}]}"#,
        )
        .await;
        let text = transport(base_url).generate(&request("m")).await.unwrap();
        assert_eq!(text, r#"{"questions": []}"#);
        server.await.unwrap();
    }
}
