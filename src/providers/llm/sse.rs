use futures::future;
use futures::stream::{self, Stream, StreamExt};

use crate::error::Result;

use super::TextStream;

/// What a single `data:` payload means to the caller.
pub(super) enum SseEvent {
    Delta(String),
    Skip,
    Done,
}

/// Split a server-sent-events body into its `data:` payloads.
fn data_payloads(response: reqwest::Response) -> impl Stream<Item = Result<String>> + Send {
    let bytes = Box::pin(response.bytes_stream());

    stream::unfold(
        (bytes, Vec::<u8>::new(), false),
        |(mut bytes, mut buf, finished)| async move {
            if finished {
                return None;
            }
            loop {
                if let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buf.drain(..=pos).collect();
                    let line = String::from_utf8_lossy(&line);
                    let line = line.trim_end_matches(['\r', '\n']);
                    if let Some(data) = line.strip_prefix("data:") {
                        return Some((Ok(data.trim_start().to_string()), (bytes, buf, false)));
                    }
                    continue;
                }
                match bytes.next().await {
                    Some(Ok(chunk)) => buf.extend_from_slice(&chunk),
                    Some(Err(e)) => return Some((Err(e.into()), (bytes, buf, true))),
                    None => return None,
                }
            }
        },
    )
}

/// Turn an SSE response into a [`TextStream`] using a vendor-specific
/// payload parser. Stops at `Done` or after the first error.
pub(super) fn text_stream<F>(response: reqwest::Response, parse: F) -> TextStream
where
    F: Fn(&str) -> Result<SseEvent> + Send + 'static,
{
    let stream = data_payloads(response)
        .map(move |payload| payload.and_then(|data| parse(&data)))
        .take_while(|event| future::ready(!matches!(event, Ok(SseEvent::Done))))
        .scan(false, |errored, event| {
            if *errored {
                return future::ready(None);
            }
            *errored = event.is_err();
            future::ready(Some(event))
        })
        .filter_map(|event| {
            future::ready(match event {
                Ok(SseEvent::Delta(text)) => Some(Ok(text)),
                Ok(_) => None,
                Err(e) => Some(Err(e)),
            })
        });

    Box::pin(stream)
}
