//! Event source consumption
//!
//! Drives a builder from an asynchronous event stream until exhaustion,
//! cancellation or upstream failure.

use std::fmt;
use std::future::Future;

use futures::{Stream, StreamExt};

use super::builder::{TranscriptBuilder, TranscriptUpdate};
use super::event::SourceItem;
use super::part::Message;

/// Consume `events` into `builder`, reporting every update to `on_update`
///
/// - Exhaustion finalizes the message as completed
/// - `cancel` resolving finalizes it as cancelled
/// - An `Err` item finalizes it as interrupted
/// - A step boundary closes the open segment
///
/// In every case the open segment is closed and a well-formed message is
/// returned.
pub async fn drive<S, I, E, C, F>(
    mut builder: TranscriptBuilder,
    events: S,
    cancel: C,
    mut on_update: F,
) -> Message
where
    S: Stream<Item = Result<I, E>>,
    I: Into<SourceItem>,
    E: fmt::Display,
    C: Future<Output = ()>,
    F: FnMut(&TranscriptUpdate),
{
    futures::pin_mut!(events);
    futures::pin_mut!(cancel);

    let mut received = 0usize;
    let last = loop {
        tokio::select! {
            biased;
            _ = &mut cancel => {
                tracing::info!(message_id = %builder.message_id(), received, "Turn cancelled");
                break builder.cancel();
            }
            next = events.next() => match next {
                Some(Ok(item)) => {
                    let updates = match item.into() {
                        SourceItem::Event(event) => {
                            received += 1;
                            builder.apply(event)
                        }
                        SourceItem::StepBoundary => builder.end_step(),
                    };
                    for update in updates {
                        on_update(&update);
                    }
                }
                Some(Err(e)) => {
                    tracing::error!(message_id = %builder.message_id(), received, "Event source interrupted: {}", e);
                    break builder.interrupt(e.to_string());
                }
                None => break builder.finalize(),
            }
        }
    };

    for update in last {
        on_update(&update);
    }
    builder.into_message()
}

/// Drive without cancellation or observation
pub async fn collect<S, I, E>(events: S) -> Message
where
    S: Stream<Item = Result<I, E>>,
    I: Into<SourceItem>,
    E: fmt::Display,
{
    drive(
        TranscriptBuilder::new(),
        events,
        futures::future::pending(),
        |_| {},
    )
    .await
}
