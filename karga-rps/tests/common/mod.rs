//! In-process HTTP/1.1 target answering with scripted status codes.

#![allow(dead_code)]

use std::{
    io,
    net::SocketAddr,
    num::NonZeroU64,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use karga_rps::{LoadConfig, Rate};
use reqwest::Url;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

pub struct MockTarget {
    pub addr: SocketAddr,
    hits: Arc<AtomicU64>,
}

impl MockTarget {
    /// Answers the n-th request with `statuses[n % statuses.len()]`.
    pub async fn start(statuses: Vec<u16>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicU64::new(0));

        let counter = Arc::clone(&hits);
        let statuses: Arc<[u16]> = statuses.into();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let counter = Arc::clone(&counter);
                let statuses = Arc::clone(&statuses);
                tokio::spawn(async move {
                    let _ = respond(socket, &counter, &statuses).await;
                });
            }
        });

        Self { addr, hits }
    }

    /// Accepts connections and reads requests but never answers them.
    pub async fn silent() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicU64::new(0));

        let counter = Arc::clone(&hits);
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    let mut sink = [0u8; 1024];
                    while matches!(socket.read(&mut sink).await, Ok(n) if n > 0) {}
                });
            }
        });

        Self { addr, hits }
    }

    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::SeqCst)
    }
}

/// A url nothing listens on.
pub fn refused_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/")
}

pub fn config(url: &str, rate: f64, duration_secs: u64) -> LoadConfig {
    LoadConfig::builder()
        .target(Url::parse(url).unwrap())
        .rate(Rate::new(rate).unwrap())
        .duration_secs(NonZeroU64::new(duration_secs).unwrap())
        .system_proxy(false)
        .build()
}

async fn respond(mut socket: TcpStream, hits: &AtomicU64, statuses: &[u16]) -> io::Result<()> {
    let mut request = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        request.extend_from_slice(&chunk[..n]);
    }

    let hit = hits.fetch_add(1, Ordering::SeqCst) as usize;
    let status = statuses[hit % statuses.len()];
    let response = format!(
        "HTTP/1.1 {status} {}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        reason(status)
    );

    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}
