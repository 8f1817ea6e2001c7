//! Dynamic client registration
//!
//! Posts an OIDC dynamic-registration request to `<endpoint>/register` and
//! parses the server's answer. No retries: a transport failure or a body
//! that does not decode aborts the run.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Request-shaping data supplied by the caller. Never mutated by the core.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Redirect/callback URL registered for the authorization-code flow.
    pub callback_url: String,
    /// Human-readable client name shown in the IAM console.
    pub client_name: String,
}

const SCOPE: &str = "address phone openid email profile offline_access";
const GRANT_TYPES: [&str; 2] = ["refresh_token", "authorization_code"];
const RESPONSE_TYPES: [&str; 1] = ["code"];
const TOKEN_ENDPOINT_AUTH_METHOD: &str = "client_secret_basic";

/// Wire form of the registration request body.
#[derive(Serialize)]
struct RegistrationRequest<'a> {
    redirect_uris: [&'a str; 1],
    client_name: &'a str,
    token_endpoint_auth_method: &'a str,
    scope: &'a str,
    grant_types: [&'a str; 2],
    response_types: [&'a str; 1],
}

impl<'a> RegistrationRequest<'a> {
    fn new(config: &'a ClientConfig) -> Self {
        Self {
            redirect_uris: [config.callback_url.as_str()],
            client_name: config.client_name.as_str(),
            token_endpoint_auth_method: TOKEN_ENDPOINT_AUTH_METHOD,
            scope: SCOPE,
            grant_types: GRANT_TYPES,
            response_types: RESPONSE_TYPES,
        }
    }
}

/// The IAM server's answer, plus the endpoint that produced it.
///
/// The server does not return the registration endpoint; `register` stamps it
/// onto the parsed response so a cached credential file can recover it later
/// without asking the user again. On the wire (and on disk) the field rides
/// in the server-specific `registration_client_uri` slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationResponse {
    pub client_id: String,
    pub client_secret: String,
    #[serde(rename = "registration_client_uri", default)]
    pub endpoint: String,
}

#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("registration request failed: {0}")]
    Transport(String),

    #[error("malformed registration response: {0}")]
    MalformedResponse(String),
}

/// Register a new client at `<endpoint>/register`.
pub fn register(
    endpoint: &str,
    config: &ClientConfig,
    http: &reqwest::blocking::Client,
) -> Result<RegistrationResponse, RegistrationError> {
    let url = format!("{endpoint}/register");
    let request = RegistrationRequest::new(config);

    log::debug!("posting client registration to {url}");
    let response = http
        .post(&url)
        .json(&request)
        .send()
        .map_err(|e| RegistrationError::Transport(e.to_string()))?;

    log::debug!("registration response status: {}", response.status());
    let body = response
        .text()
        .map_err(|e| RegistrationError::Transport(e.to_string()))?;

    let mut parsed: RegistrationResponse = serde_json::from_str(&body)
        .map_err(|e| RegistrationError::MalformedResponse(e.to_string()))?;
    parsed.endpoint = endpoint.to_string();
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    use super::*;

    #[test]
    fn test_request_body_shape() {
        let config = ClientConfig {
            callback_url: "http://localhost:8080/cb".to_string(),
            client_name: "alice".to_string(),
        };

        let body = serde_json::to_value(RegistrationRequest::new(&config)).unwrap();
        assert_eq!(body["redirect_uris"][0], "http://localhost:8080/cb");
        assert_eq!(body["client_name"], "alice");
        assert_eq!(body["token_endpoint_auth_method"], "client_secret_basic");
        assert_eq!(body["grant_types"][0], "refresh_token");
        assert_eq!(body["grant_types"][1], "authorization_code");
        assert_eq!(body["response_types"][0], "code");
        assert_eq!(
            body["scope"],
            "address phone openid email profile offline_access"
        );
    }

    #[test]
    fn test_response_parses_without_registration_uri() {
        let parsed: RegistrationResponse =
            serde_json::from_str(r#"{"client_id":"abc","client_secret":"xyz"}"#).unwrap();
        assert_eq!(parsed.client_id, "abc");
        assert_eq!(parsed.client_secret, "xyz");
        assert_eq!(parsed.endpoint, "");
    }

    /// Consume a full HTTP request (headers plus Content-Length body).
    fn read_request(stream: &mut std::net::TcpStream) {
        let mut raw = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let header_end = raw.windows(4).position(|w| w == b"\r\n\r\n");
            if let Some(end) = header_end {
                let headers = String::from_utf8_lossy(&raw[..end]).to_lowercase();
                let content_length = headers
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if raw.len() >= end + 4 + content_length {
                    return;
                }
            }
            match stream.read(&mut buf) {
                Ok(0) | Err(_) => return,
                Ok(n) => raw.extend_from_slice(&buf[..n]),
            }
        }
    }

    /// Serve one HTTP request with a fixed JSON body, returning the base URL.
    fn one_shot_server(body: &'static str) -> (String, thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            read_request(&mut stream);
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).unwrap();
        });
        (format!("http://{addr}"), handle)
    }

    #[test]
    fn test_register_stamps_endpoint() {
        let (endpoint, server) =
            one_shot_server(r#"{"client_id":"abc","client_secret":"xyz"}"#);
        let config = ClientConfig {
            callback_url: "http://localhost:8080/cb".to_string(),
            client_name: "test".to_string(),
        };

        let response =
            register(&endpoint, &config, &reqwest::blocking::Client::new()).unwrap();
        server.join().unwrap();

        assert_eq!(response.client_id, "abc");
        assert_eq!(response.client_secret, "xyz");
        assert_eq!(response.endpoint, endpoint);
    }

    #[test]
    fn test_register_rejects_malformed_body() {
        let (endpoint, server) = one_shot_server("not json at all");
        let config = ClientConfig {
            callback_url: "http://localhost:8080/cb".to_string(),
            client_name: "test".to_string(),
        };

        let err =
            register(&endpoint, &config, &reqwest::blocking::Client::new()).unwrap_err();
        server.join().unwrap();
        assert!(matches!(err, RegistrationError::MalformedResponse(_)));
    }

    #[test]
    fn test_register_surfaces_transport_failure() {
        // Nothing is listening on this port.
        let config = ClientConfig {
            callback_url: "http://localhost:8080/cb".to_string(),
            client_name: "test".to_string(),
        };
        let err = register(
            "http://127.0.0.1:1",
            &config,
            &reqwest::blocking::Client::new(),
        )
        .unwrap_err();
        assert!(matches!(err, RegistrationError::Transport(_)));
    }
}
