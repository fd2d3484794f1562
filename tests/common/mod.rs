//! Common test utilities for integration tests

use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Helper function to write a plain XML dump file
#[allow(dead_code)]
pub fn write_dump(path: &Path, content: &str) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content.as_bytes()).unwrap();
    path.to_path_buf()
}

/// Helper function to write a gzip-compressed dump file
#[allow(dead_code)]
pub fn write_gz_dump(path: &Path, content: &str) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut encoder = GzEncoder::new(fs::File::create(path).unwrap(), Compression::default());
    encoder.write_all(content.as_bytes()).unwrap();
    encoder.finish().unwrap();
    path.to_path_buf()
}

/// Reads a gzip-compressed file back into a string
#[allow(dead_code)]
pub fn read_gz(path: &Path) -> String {
    use std::io::Read;
    let mut out = String::new();
    flate2::read::GzDecoder::new(fs::File::open(path).unwrap())
        .read_to_string(&mut out)
        .unwrap();
    out
}

/// Two-incident dump with display values
#[allow(dead_code)]
pub const INCIDENT_DUMP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<unload unload_date="2024-03-01 10:00:00">
<incident action="INSERT_OR_UPDATE"><number>INC001</number><state display_value="Closed">7</state></incident>
<incident action="INSERT_OR_UPDATE"><number>INC002</number><state display_value="New">1</state></incident>
</unload>"#;

/// Dump without rows
#[allow(dead_code)]
pub const EMPTY_DUMP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<unload unload_date="2024-03-01 10:00:00">
</unload>"#;

/// Canned HTTP response served by [`spawn_server`]
#[allow(dead_code)]
pub struct MockResponse {
    pub status: u16,
    pub content_type: Option<&'static str>,
    pub body: String,
}

#[allow(dead_code)]
impl MockResponse {
    pub fn xml(body: &str) -> Self {
        Self {
            status: 200,
            content_type: Some("text/xml"),
            body: body.to_string(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            content_type: Some("text/html"),
            body: "<html>error</html>".to_string(),
        }
    }
}

/// Address of a running stub server and the request heads it received
#[allow(dead_code)]
pub struct MockServer {
    pub addr: SocketAddr,
    pub requests: Arc<Mutex<Vec<String>>>,
}

#[allow(dead_code)]
impl MockServer {
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn request(&self, index: usize) -> String {
        self.requests.lock().unwrap()[index].to_lowercase()
    }
}

/// Serves `responses` in order, one connection each, then stops accepting.
#[allow(dead_code)]
pub async fn spawn_server(responses: Vec<MockResponse>) -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = requests.clone();

    tokio::spawn(async move {
        for response in responses {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let head = read_request_head(&mut socket).await;
            seen.lock().unwrap().push(head);

            let mut raw = format!(
                "HTTP/1.1 {} Stub\r\nContent-Length: {}\r\nConnection: close\r\n",
                response.status,
                response.body.len()
            );
            if let Some(content_type) = response.content_type {
                raw.push_str(&format!("Content-Type: {content_type}\r\n"));
            }
            raw.push_str("\r\n");
            raw.push_str(&response.body);

            let _ = socket.write_all(raw.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    MockServer { addr, requests }
}

async fn read_request_head(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
