//! Origin path: per-video frame emitter task (§4.4 "Origin path").
//!
//! Frame production (video decode and JPEG encode) is an external
//! collaborator per the scope of this design; [`VideoSource`] is the wire
//! contract this task consumes, not an implementation of that pipeline.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;

use crate::services::subscription::VideoSubscriptionTable;

use super::frame::split_frame;

/// A source of encoded JPEG frames for one catalogue entry.
///
/// Implemented by the external frame-generation collaborator (video decode
/// + JPEG encode at the source's native frame rate); this crate only calls
/// through the trait.
#[async_trait::async_trait]
pub trait VideoSource: Send {
    /// Produces the next frame's JPEG bytes, blocking (asynchronously)
    /// until one is ready at the source's native cadence.
    async fn next_frame(&mut self) -> std::io::Result<Vec<u8>>;
}

/// Runs the per-video origin emitter: pulls frames from `source` and, for
/// each one, fans its chunks out to every current subscriber of `video` on
/// `streaming_port`. A hard send failure drops that subscriber (§4.4).
pub async fn run_origin_emitter(
    video: String,
    mut source: Box<dyn VideoSource>,
    subscriptions: Arc<VideoSubscriptionTable>,
    socket: UdpSocket,
    streaming_port: u16,
) {
    loop {
        let jpeg = match source.next_frame().await {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("origin[{video}]: frame source error: {e}");
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
        };

        let subscribers = subscriptions.subscribers_snapshot(&video);
        if subscribers.is_empty() {
            continue;
        }

        let chunks = split_frame(&video, &jpeg);
        for ip in subscribers {
            for chunk in &chunks {
                if let Err(e) = socket.send_to(chunk, (ip, streaming_port)).await {
                    log::debug!("origin[{video}]: send to {ip} failed, dropping subscriber: {e}");
                    subscriptions.unsubscribe(&video, &ip);
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ip(n: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, n))
    }

    struct CountingSource {
        calls: Arc<AtomicUsize>,
        frame: Vec<u8>,
    }

    #[async_trait::async_trait]
    impl VideoSource for CountingSource {
        async fn next_frame(&mut self) -> std::io::Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.frame.clone())
        }
    }

    #[tokio::test]
    async fn emitter_skips_chunking_when_video_has_no_subscribers() {
        let subscriptions = Arc::new(VideoSubscriptionTable::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let source = Box::new(CountingSource {
            calls: Arc::clone(&calls),
            frame: vec![0xFF; 10],
        });
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let handle = tokio::spawn(run_origin_emitter(
            "clipA".into(),
            source,
            Arc::clone(&subscriptions),
            socket,
            12345,
        ));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(calls.load(Ordering::SeqCst) > 0);
        handle.abort();
    }

    #[tokio::test]
    async fn emitter_sends_frame_chunks_to_loopback_subscriber() {
        use super::super::frame::decode_chunk;
        use std::net::Ipv4Addr;

        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let receiver_port = receiver.local_addr().unwrap().port();

        let subscriptions = Arc::new(VideoSubscriptionTable::new());
        subscriptions.subscribe("clipA", IpAddr::V4(Ipv4Addr::LOCALHOST));

        let source = Box::new(CountingSource {
            calls: Arc::new(AtomicUsize::new(0)),
            frame: vec![0xAB; 4],
        });
        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let handle = tokio::spawn(run_origin_emitter(
            "clipA".into(),
            source,
            subscriptions,
            sender,
            receiver_port,
        ));

        let mut buf = [0u8; 128];
        let n = tokio::time::timeout(Duration::from_secs(1), receiver.recv(&mut buf))
            .await
            .expect("receiver should get a chunk")
            .unwrap();
        let decoded = decode_chunk(&buf[..n]).unwrap();
        assert_eq!(decoded.video_id, "clipA");
        assert_eq!(decoded.payload, &[0xABu8; 4][..]);

        handle.abort();
    }
}
