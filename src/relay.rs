//! 流式透传
//!
//! 把上游响应体逐块拷贝到出站响应体。下游每拉取一次才向上游读取下一块，
//! 不启动后台任务也不经过 channel；调用方断开连接时出站 body 被丢弃，
//! 上游流随之释放。

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::json;

use crate::config::StreamErrorMode;
use crate::gateway::RelayError;
use crate::upstream::ByteStream;

struct Pipe {
    upstream: ByteStream,
    mode: StreamErrorMode,
    finished: bool,
    chunks: u64,
    bytes: u64,
}

impl Drop for Pipe {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(
                chunks = self.chunks,
                bytes = self.bytes,
                "client disconnected, releasing upstream stream"
            );
        }
    }
}

/// 构造透传流
///
/// 上游出错时按 `mode` 处理：`Close` 直接结束，`Event` 先写出一个
/// `data: {"error": ...}` 事件。两种情况都不会重试。
pub fn pipe(
    upstream: ByteStream,
    mode: StreamErrorMode,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static {
    let state = Pipe {
        upstream,
        mode,
        finished: false,
        chunks: 0,
        bytes: 0,
    };

    futures::stream::unfold(state, |mut pipe| async move {
        if pipe.finished {
            return None;
        }

        loop {
            match pipe.upstream.next().await {
                Some(Ok(chunk)) if chunk.is_empty() => continue,
                Some(Ok(chunk)) => {
                    pipe.chunks += 1;
                    pipe.bytes += chunk.len() as u64;
                    return Some((Ok(chunk), pipe));
                }
                Some(Err(e)) => {
                    let err = RelayError::StreamInterrupted(e);
                    tracing::warn!(
                        chunks = pipe.chunks,
                        bytes = pipe.bytes,
                        "{err}"
                    );
                    pipe.finished = true;
                    return match pipe.mode {
                        StreamErrorMode::Close => None,
                        StreamErrorMode::Event => Some((Ok(error_event(&err)), pipe)),
                    };
                }
                None => {
                    tracing::info!(chunks = pipe.chunks, bytes = pipe.bytes, "stream completed");
                    pipe.finished = true;
                    return None;
                }
            }
        }
    })
}

/// SSE 错误事件：`data: {"error":"..."}\n\n`
fn error_event(err: &RelayError) -> Bytes {
    Bytes::from(format!("data: {}\n\n", json!({ "error": err.to_string() })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::io;

    fn upstream(items: Vec<Result<&'static str, &'static str>>) -> ByteStream {
        Box::pin(stream::iter(items.into_iter().map(|item| {
            item.map(Bytes::from).map_err(io::Error::other)
        })))
    }

    async fn drain(s: impl Stream<Item = Result<Bytes, io::Error>>) -> Vec<Bytes> {
        s.map(|chunk| chunk.unwrap()).collect().await
    }

    #[tokio::test]
    async fn chunks_pass_through_in_order() {
        let chunks = vec![
            Ok("data: {\"a\":1}\n\n"),
            Ok("data: {\"b\""),
            Ok(":2}\n\n"),
            Ok("data: [DONE]\n\n"),
        ];
        let out = drain(pipe(upstream(chunks), StreamErrorMode::Close)).await;

        assert_eq!(
            out,
            vec![
                Bytes::from_static(b"data: {\"a\":1}\n\n"),
                Bytes::from_static(b"data: {\"b\""),
                Bytes::from_static(b":2}\n\n"),
                Bytes::from_static(b"data: [DONE]\n\n"),
            ]
        );
    }

    #[tokio::test]
    async fn empty_chunks_are_skipped() {
        let out = drain(pipe(
            upstream(vec![Ok("a"), Ok(""), Ok("b")]),
            StreamErrorMode::Close,
        ))
        .await;
        assert_eq!(out, vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]);
    }

    #[tokio::test]
    async fn error_closes_stream_in_close_mode() {
        let out = drain(pipe(
            upstream(vec![Ok("a"), Err("connection reset"), Ok("never")]),
            StreamErrorMode::Close,
        ))
        .await;
        assert_eq!(out, vec![Bytes::from_static(b"a")]);
    }

    #[tokio::test]
    async fn error_emits_event_in_event_mode() {
        let out = drain(pipe(
            upstream(vec![Ok("a"), Err("connection reset"), Ok("never")]),
            StreamErrorMode::Event,
        ))
        .await;

        assert_eq!(out.len(), 2);
        assert_eq!(out[0], Bytes::from_static(b"a"));
        let event = std::str::from_utf8(&out[1]).unwrap();
        let data = event
            .strip_prefix("data: ")
            .and_then(|s| s.strip_suffix("\n\n"))
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(data).unwrap();
        assert!(value["error"].as_str().unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn dropping_the_pipe_stops_upstream_reads() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let reads = Arc::new(AtomicUsize::new(0));
        let counter = reads.clone();
        let source: ByteStream = Box::pin(stream::iter(0..10).map(move |i| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, io::Error>(Bytes::from(format!("chunk-{i}")))
        }));

        let mut out = Box::pin(pipe(source, StreamErrorMode::Close));
        assert_eq!(out.next().await.unwrap().unwrap(), Bytes::from_static(b"chunk-0"));
        drop(out);

        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }
}
