//! A dispatcher stand-in listening on loopback.

#![allow(dead_code)]

use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use vjudger::config::DispatcherSettings;
use vjudger::protocol::{FrameDecoder, Verdict, encode};

pub const SECRET: &str = "s3cret";

/// Upper bound for any single wait in these tests.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

pub struct FakeDispatcher {
    listener: TcpListener,
}

impl FakeDispatcher {
    pub async fn bind() -> Self {
        Self::bind_port(0).await
    }

    pub async fn bind_port(port: u16) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .expect("bind loopback listener");
        Self { listener }
    }

    pub fn port(&self) -> u16 {
        self.listener.local_addr().expect("local addr").port()
    }

    /// Settings pointing a judger at this listener.
    pub fn settings(&self, reconnect_delay_ms: u64) -> DispatcherSettings {
        settings_for_port(self.port(), reconnect_delay_ms)
    }

    /// Accept one judger and check that it sends the secret first.
    pub async fn accept(&self) -> DispatcherConn {
        let (mut stream, _) = tokio::time::timeout(STEP_TIMEOUT, self.listener.accept())
            .await
            .expect("judger should connect")
            .expect("accept");

        let mut secret = vec![0u8; SECRET.len()];
        tokio::time::timeout(STEP_TIMEOUT, stream.read_exact(&mut secret))
            .await
            .expect("secret should arrive")
            .expect("read secret");
        assert_eq!(secret, SECRET.as_bytes());

        DispatcherConn {
            stream,
            decoder: FrameDecoder::new(),
        }
    }
}

pub fn settings_for_port(port: u16, reconnect_delay_ms: u64) -> DispatcherSettings {
    DispatcherSettings {
        host: "127.0.0.1".to_string(),
        port,
        secret: SECRET.to_string(),
        reconnect_delay_ms,
        write_timeout_ms: STEP_TIMEOUT.as_millis() as u64,
    }
}

pub struct DispatcherConn {
    stream: TcpStream,
    decoder: FrameDecoder,
}

impl DispatcherConn {
    pub async fn send_job(&mut self, job: Value) {
        let frame = encode(&job).expect("encode job");
        self.stream.write_all(&frame).await.expect("write job");
    }

    /// Write bytes as-is, framed or not.
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.expect("write raw bytes");
    }

    /// True once the judger has closed its end.
    pub async fn closed_by_judger(&mut self) -> bool {
        let mut buf = [0u8; 64];
        matches!(
            tokio::time::timeout(STEP_TIMEOUT, self.stream.read(&mut buf)).await,
            Ok(Ok(0)) | Ok(Err(_))
        )
    }

    /// Send one job split over two writes.
    pub async fn send_job_split(&mut self, job: Value, at: usize) {
        let frame = encode(&job).expect("encode job");
        let at = at.min(frame.len());
        self.stream.write_all(&frame[..at]).await.expect("write head");
        self.stream.flush().await.expect("flush head");
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.stream.write_all(&frame[at..]).await.expect("write tail");
    }

    pub async fn recv_verdict(&mut self) -> Verdict {
        tokio::time::timeout(STEP_TIMEOUT, self.next_verdict())
            .await
            .expect("verdict should arrive")
    }

    /// True if no verdict arrives within `window`.
    pub async fn stays_quiet(&mut self, window: Duration) -> bool {
        tokio::time::timeout(window, self.next_verdict()).await.is_err()
    }

    async fn next_verdict(&mut self) -> Verdict {
        let mut buf = [0u8; 4096];
        loop {
            if let Some(verdict) = self.decoder.next_frame::<Verdict>().expect("valid frame") {
                return verdict;
            }
            let n = self.stream.read(&mut buf).await.expect("read verdict");
            assert!(n > 0, "judger closed the connection");
            self.decoder.feed(&buf[..n]);
        }
    }
}
