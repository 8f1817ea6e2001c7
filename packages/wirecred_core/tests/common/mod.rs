#![allow(dead_code)]

//! Shared fixtures: a one-shot mock IAM server and a scripted prompt.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

use wirecred::crypto::Secret;
use wirecred::input::Prompt;

/// Serve a fixed number of registration requests, then stop. The join handle
/// yields how many requests were actually answered.
pub fn mock_iam(body: &'static str, requests: usize) -> (String, thread::JoinHandle<usize>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = thread::spawn(move || {
        let mut served = 0;
        for _ in 0..requests {
            let Ok((mut stream, _)) = listener.accept() else {
                break;
            };
            consume_request(&mut stream);
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            if stream.write_all(response.as_bytes()).is_ok() {
                served += 1;
            }
        }
        served
    });

    (format!("http://{addr}"), handle)
}

/// Read a full HTTP request: headers plus Content-Length body.
fn consume_request(stream: &mut TcpStream) {
    let mut raw = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        if let Some(end) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
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

/// Prompt double that answers from pre-scripted values.
pub struct ScriptedPrompt {
    strings: VecDeque<String>,
    passwords: VecDeque<Vec<u8>>,
}

impl ScriptedPrompt {
    pub fn new() -> Self {
        Self {
            strings: VecDeque::new(),
            passwords: VecDeque::new(),
        }
    }

    pub fn with_passwords(passwords: Vec<&[u8]>) -> Self {
        Self {
            strings: VecDeque::new(),
            passwords: passwords.into_iter().map(<[u8]>::to_vec).collect(),
        }
    }

    pub fn push_string(&mut self, answer: &str) {
        self.strings.push_back(answer.to_string());
    }
}

impl Prompt for ScriptedPrompt {
    fn ask_string(&mut self, _question: &str, default: &str) -> io::Result<String> {
        Ok(self
            .strings
            .pop_front()
            .unwrap_or_else(|| default.to_string()))
    }

    fn ask_password(&mut self, _question: &str, _confirm: bool) -> io::Result<Secret> {
        self.passwords
            .pop_front()
            .map(Secret::new)
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no scripted password"))
    }
}

/// Prompt double that must never be consulted.
pub struct UnusedPrompt;

impl Prompt for UnusedPrompt {
    fn ask_string(&mut self, question: &str, _default: &str) -> io::Result<String> {
        panic!("unexpected string prompt: {question}");
    }

    fn ask_password(&mut self, question: &str, _confirm: bool) -> io::Result<Secret> {
        panic!("unexpected password prompt: {question}");
    }
}
