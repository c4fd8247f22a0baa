use crate::sanitize::truncate_words;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_ENDPOINT: &str = "https://api.ideogram.ai/describe";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
const CREDENTIAL_HEADER: &str = "Api-Key";

#[derive(Debug, Error)]
pub enum DescribeError {
    #[error("画像を読めませんでした: {}", .path.display())]
    ReadImage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("HTTP {status}")]
    Http { status: u16 },
    #[error("リクエストに失敗しました: {0}")]
    Request(#[from] reqwest::Error),
    #[error("レスポンスのパースに失敗しました: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("説明が返されませんでした")]
    NoDescription,
}

/// Description text on success, already cut to the requested word count.
pub type DescriptionResult = Result<String, DescribeError>;

pub trait Describer {
    fn describe(
        &self,
        image_path: &Path,
        prompt_instructions: &str,
        max_words: usize,
    ) -> DescriptionResult;
}

#[derive(Debug, Deserialize)]
struct DescribeResponse {
    #[serde(default)]
    descriptions: Vec<DescriptionItem>,
}

#[derive(Debug, Deserialize)]
struct DescriptionItem {
    #[serde(default)]
    text: Option<String>,
}

/// Calls the remote describe endpoint with a multipart body holding the image and prompt.
#[derive(Debug, Clone)]
pub struct HttpDescriber {
    client: Client,
    endpoint: String,
    credential: String,
}

impl HttpDescriber {
    pub fn new(
        endpoint: impl Into<String>,
        credential: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, DescribeError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, endpoint, credential))
    }

    pub fn with_client(
        client: Client,
        endpoint: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            credential: credential.into(),
        }
    }
}

impl Describer for HttpDescriber {
    fn describe(
        &self,
        image_path: &Path,
        prompt_instructions: &str,
        max_words: usize,
    ) -> DescriptionResult {
        let bytes = fs::read(image_path).map_err(|source| DescribeError::ReadImage {
            path: image_path.to_path_buf(),
            source,
        })?;
        let file_name = image_path
            .file_name()
            .map(|v| v.to_string_lossy().to_string())
            .unwrap_or_else(|| "image".to_string());

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime_for_path(image_path))?;
        let form = Form::new()
            .text("prompt", build_prompt(prompt_instructions, max_words))
            .part("image_file", part);

        let response = self
            .client
            .post(&self.endpoint)
            .header(CREDENTIAL_HEADER, self.credential.as_str())
            .multipart(form)
            .send()?;
        let status = response.status().as_u16();
        let body = response.bytes()?;
        debug!(path = %image_path.display(), status, bytes = body.len(), "describe response");

        parse_describe_response(status, &body, max_words)
    }
}

pub fn build_prompt(prompt_instructions: &str, max_words: usize) -> String {
    format!("Describe this image in {max_words} words or less. {prompt_instructions}")
}

pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|v| v.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        _ => "image/*",
    }
}

pub fn parse_describe_response(status: u16, body: &[u8], max_words: usize) -> DescriptionResult {
    if status != 200 {
        return Err(DescribeError::Http { status });
    }

    let parsed: DescribeResponse = serde_json::from_slice(body)?;
    let text = parsed
        .descriptions
        .into_iter()
        .next()
        .and_then(|item| item.text)
        .map(|text| truncate_words(&text, max_words))
        .filter(|text| !text.is_empty())
        .ok_or(DescribeError::NoDescription)?;

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};
    use tempfile::tempdir;

    /// Accepts one connection, answers with `status`/`body` and hands back the raw request.
    fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut request = Vec::new();
            let mut chunk = [0u8; 4096];

            let header_end = loop {
                let n = stream.read(&mut chunk).expect("read");
                request.extend_from_slice(&chunk[..n]);
                if let Some(pos) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
                if n == 0 {
                    break request.len();
                }
            };
            let head = String::from_utf8_lossy(&request[..header_end]).to_ascii_lowercase();
            let content_length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok());
            let chunked = head.contains("transfer-encoding: chunked");

            loop {
                let complete = match content_length {
                    Some(len) => request.len() >= header_end + len,
                    None if chunked => request.ends_with(b"0\r\n\r\n"),
                    None => true,
                };
                if complete {
                    break;
                }
                let n = stream.read(&mut chunk).expect("read body");
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
            }

            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).expect("write");
            String::from_utf8_lossy(&request).to_string()
        });
        (format!("http://127.0.0.1:{port}/describe"), handle)
    }

    fn local_describer(endpoint: String) -> HttpDescriber {
        let client = Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("client");
        HttpDescriber::with_client(client, endpoint, "secret-key")
    }

    #[test]
    fn success_is_truncated_to_max_words() {
        let body = br#"{"descriptions":[{"text":"a b c d e"}]}"#;
        let text = parse_describe_response(200, body, 3).expect("must succeed");
        assert_eq!(text, "a b c");
    }

    #[test]
    fn only_first_description_is_used() {
        let body = br#"{"descriptions":[{"text":"  first one  "},{"text":"second"}]}"#;
        let text = parse_describe_response(200, body, 7).expect("must succeed");
        assert_eq!(text, "first one");
    }

    #[test]
    fn empty_descriptions_is_failure() {
        let err = parse_describe_response(200, br#"{"descriptions":[]}"#, 3)
            .expect_err("must fail");
        assert!(matches!(err, DescribeError::NoDescription));
    }

    #[test]
    fn missing_text_is_failure() {
        let err = parse_describe_response(200, br#"{"descriptions":[{"url":"x"}]}"#, 3)
            .expect_err("must fail");
        assert!(matches!(err, DescribeError::NoDescription));
    }

    #[test]
    fn rate_limited_status_is_failure() {
        let err = parse_describe_response(429, b"slow down", 3).expect_err("must fail");
        assert!(matches!(err, DescribeError::Http { status: 429 }));
        assert!(err.to_string().contains("429"));
    }

    #[test]
    fn malformed_json_is_failure() {
        let err = parse_describe_response(200, b"<html>", 3).expect_err("must fail");
        assert!(matches!(err, DescribeError::Parse(_)));
    }

    #[test]
    fn prompt_includes_word_limit_and_instructions() {
        assert_eq!(
            build_prompt("Focus on the URL.", 7),
            "Describe this image in 7 words or less. Focus on the URL."
        );
    }

    #[test]
    fn mime_is_inferred_from_extension() {
        assert_eq!(mime_for_path(Path::new("a.PNG")), "image/png");
        assert_eq!(mime_for_path(Path::new("a.jpg")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("a.webp")), "image/webp");
        assert_eq!(mime_for_path(Path::new("a.bmp")), "image/*");
    }

    #[test]
    fn missing_image_is_failure() {
        let temp = tempdir().expect("tempdir");
        let describer = HttpDescriber::new("http://127.0.0.1:9", "key", Duration::from_secs(1))
            .expect("client");
        let err = describer
            .describe(&temp.path().join("gone.png"), "", 3)
            .expect_err("must fail");
        assert!(matches!(err, DescribeError::ReadImage { .. }));
    }

    #[test]
    fn unreachable_endpoint_is_failure() {
        let temp = tempdir().expect("tempdir");
        let image = temp.path().join("shot.png");
        fs::write(&image, b"png").expect("write");

        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
            listener.local_addr().expect("addr").port()
        };
        let describer = HttpDescriber::new(
            format!("http://127.0.0.1:{port}/describe"),
            "key",
            Duration::from_secs(2),
        )
        .expect("client");

        let err = describer.describe(&image, "", 3).expect_err("must fail");
        assert!(matches!(err, DescribeError::Request(_)));
    }

    #[test]
    fn describe_posts_multipart_request_and_reads_text() {
        let temp = tempdir().expect("tempdir");
        let image = temp.path().join("shot.png");
        fs::write(&image, b"png-bytes").expect("write");
        let (endpoint, server) = serve_once(
            "200 OK",
            r#"{"descriptions":[{"text":"login page of example dot com"}]}"#,
        );

        let text = local_describer(endpoint)
            .describe(&image, "Focus on the URL.", 3)
            .expect("must succeed");
        assert_eq!(text, "login page of");

        let request = server.join().expect("server thread");
        let lower = request.to_ascii_lowercase();
        assert!(request.starts_with("POST /describe "));
        assert!(lower.contains("api-key: secret-key"));
        assert!(lower.contains("content-type: multipart/form-data"));
        assert!(lower.contains(r#"name="prompt""#));
        assert!(request.contains("Describe this image in 3 words or less. Focus on the URL."));
        assert!(lower.contains(r#"name="image_file"; filename="shot.png""#));
        assert!(lower.contains("content-type: image/png"));
        assert!(request.contains("png-bytes"));
    }

    #[test]
    fn describe_reports_rate_limit_status() {
        let temp = tempdir().expect("tempdir");
        let image = temp.path().join("shot.webp");
        fs::write(&image, b"webp-bytes").expect("write");
        let (endpoint, server) = serve_once("429 Too Many Requests", r#"{"error":"slow down"}"#);

        let err = local_describer(endpoint)
            .describe(&image, "", 3)
            .expect_err("must fail");
        assert!(matches!(err, DescribeError::Http { status: 429 }));
        assert!(err.to_string().contains("429"));

        let request = server.join().expect("server thread");
        assert!(request.to_ascii_lowercase().contains("content-type: image/webp"));
    }
}
