use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use crate::db::ScannerStore;
use crate::errors::FuzzError;
use crate::matching::MatchEngine;
use crate::queue::VulnerabilitySink;
use super::monitors::Monitors;

const MAX_DATAGRAM: usize = 512;
const MAX_NAME_LEN: usize = 253;

/// Query name of the first question in a DNS request, lowercased.
pub fn decode_query_name(packet: &[u8]) -> Option<String> {
    if packet.len() < 12 {
        return None;
    }
    let questions = u16::from_be_bytes([packet[4], packet[5]]);
    if questions == 0 {
        return None;
    }

    let mut labels: Vec<String> = Vec::new();
    let mut pos = 12;
    loop {
        let len = *packet.get(pos)? as usize;
        if len == 0 {
            break;
        }
        // compression pointers never appear in a question name we accept
        if len & 0xC0 != 0 {
            return None;
        }
        let label = packet.get(pos + 1..pos + 1 + len)?;
        labels.push(String::from_utf8_lossy(label).to_lowercase());
        pos += 1 + len;
        if labels.iter().map(|l| l.len() + 1).sum::<usize>() > MAX_NAME_LEN + 1 {
            return None;
        }
    }
    if labels.is_empty() {
        return None;
    }
    Some(labels.join("."))
}

/// Passive UDP listener feeding every received query name to the DNS scanners.
///
/// Monitors are re-read from the store for each query, so scanners registered
/// after the listener started are matched too. Dropping the listener stops it.
pub struct DnsListener {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl DnsListener {
    pub async fn start(
        addr: SocketAddr,
        scanners: Arc<ScannerStore>,
        engine: Arc<MatchEngine>,
        sink: Arc<dyn VulnerabilitySink>,
    ) -> Result<Self, FuzzError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| FuzzError::Scanner(format!("Failed to bind DNS listener on {}: {}", addr, e)))?;
        let local_addr = socket.local_addr()?;
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let mut monitors = Arc::new(Monitors::default());
            let mut buf = [0u8; MAX_DATAGRAM];
            loop {
                let received = tokio::select! {
                    _ = token.cancelled() => break,
                    received = socket.recv_from(&mut buf) => received,
                };
                let (len, peer) = match received {
                    Ok(received) => received,
                    Err(e) => {
                        warn!(error = %e, "DNS listener receive failed");
                        continue;
                    }
                };
                let Some(name) = decode_query_name(&buf[..len]) else {
                    debug!(%peer, bytes = len, "Ignoring non-query datagram");
                    continue;
                };
                debug!(%peer, name = %name, "DNS query received");
                match scanners.monitors() {
                    Ok(latest) => monitors = latest,
                    Err(e) => warn!(error = %e, "Failed to refresh DNS scanners, using previous set"),
                }
                monitors.scan_dns_query(&engine, sink.as_ref(), &name).await;
            }
        });

        info!(addr = %local_addr, "DNS listener started");
        Ok(Self { local_addr, cancel, task: Some(task) })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops the listener and waits for its task to finish.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "DNS listener task failed");
            }
        }
        info!(addr = %self.local_addr, "DNS listener stopped");
    }
}

impl Drop for DnsListener {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::queue::{MemoryVulnerabilities, VulnerabilitySource};
    use crate::scanners::kinds::{PhraseScanner, Scanner};
    use std::time::Duration;

    fn query_packet(name: &str) -> Vec<u8> {
        let mut packet = vec![0x12, 0x34, 0x01, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0];
        for label in name.split('.') {
            packet.push(label.len() as u8);
            packet.extend_from_slice(label.as_bytes());
        }
        packet.extend_from_slice(&[0, 0x00, 0x01, 0x00, 0x01]);
        packet
    }

    #[test]
    fn test_decode_query_name() {
        assert_eq!(
            decode_query_name(&query_packet("X123.oob.Example.com")).as_deref(),
            Some("x123.oob.example.com")
        );
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_query_name(b"short").is_none());
        let mut no_questions = query_packet("a.b");
        no_questions[5] = 0;
        assert!(decode_query_name(&no_questions).is_none());
        let mut truncated = query_packet("abcdef.b");
        truncated.truncate(15);
        assert!(decode_query_name(&truncated).is_none());
    }

    #[tokio::test]
    async fn test_listener_matches_scanners_registered_after_start() {
        let scanners = Arc::new(ScannerStore::new(Database::in_memory().unwrap()).unwrap());
        let sink = Arc::new(MemoryVulnerabilities::new());
        let listener = DnsListener::start(
            "127.0.0.1:0".parse().unwrap(),
            scanners.clone(),
            Arc::new(MatchEngine::new()),
            sink.clone(),
        )
        .await
        .unwrap();

        scanners
            .register(&[Scanner::DnsQuery(PhraseScanner {
                phrase: "§ID§.oob.test".into(),
                payload_marker: "§ID§".into(),
                is_regex: false,
            })])
            .unwrap();

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client
            .send_to(&query_packet("4242.oob.test"), listener.local_addr())
            .await
            .unwrap();

        let mut found = Vec::new();
        for _ in 0..50 {
            found = sink.list_all().await.unwrap();
            if !found.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        listener.stop().await;

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].payload_id.as_deref(), Some("4242"));
    }
}
