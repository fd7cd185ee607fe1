//! One assistant turn as an event stream
//!
//! A background task reads the upstream response, forwards its events in
//! arrival order and runs requested tools concurrently. Tool results join
//! the same stream as soon as they finish, so deltas keep flowing while a
//! call is outstanding. When a step ends with tool calls, the results are
//! sent back upstream and the next step's events continue the stream after
//! a step boundary.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

use crate::model::config::Config;
use crate::tools::ToolRegistry;
use crate::transcript::{Event, Message, SourceItem, TranscriptBuilder};
use crate::upstream::converter::{UpstreamDecoder, messages_from_transcript};
use crate::upstream::errors::UpstreamError;
use crate::upstream::provider::ChatProvider;
use crate::upstream::types::{ChatCompletionRequest, ChatMessage, StreamOptions};

/// Buffered events between the producer task and the consumer
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Request parameters shared by every turn
#[derive(Debug, Clone)]
pub struct TurnSettings {
    pub model: String,
    pub system_prompt: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Upstream requests allowed per turn when tools are called
    pub max_steps: usize,
}

impl TurnSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.upstream_model.clone(),
            system_prompt: config.system_prompt.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_steps: config.max_tool_steps.max(1),
        }
    }
}

/// Starts turns against one backend with one tool set
#[derive(Clone)]
pub struct TurnRunner {
    provider: Arc<ChatProvider>,
    tools: Arc<ToolRegistry>,
    settings: TurnSettings,
}

impl TurnRunner {
    pub fn new(provider: Arc<ChatProvider>, tools: Arc<ToolRegistry>, settings: TurnSettings) -> Self {
        Self {
            provider,
            tools,
            settings,
        }
    }

    /// Upstream request for `history`, whose last message is the new user turn
    pub fn request(&self, history: &[Message], system_prompt: Option<&str>) -> ChatCompletionRequest {
        let system_prompt = system_prompt.unwrap_or(&self.settings.system_prompt);
        ChatCompletionRequest {
            model: self.settings.model.clone(),
            messages: messages_from_transcript(system_prompt, history),
            stream: true,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            tools: self.tools.definitions(),
            stream_options: Some(StreamOptions {
                include_usage: true,
            }),
        }
    }

    /// Start producing events for `request`
    ///
    /// Dropping the returned stream aborts the producer and any running
    /// tools.
    pub fn start(&self, request: ChatCompletionRequest) -> TurnEvents {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let producer = Producer {
            provider: self.provider.clone(),
            tools: self.tools.clone(),
            tx,
            running: JoinSet::new(),
            running_calls: HashMap::new(),
        };
        let task = tokio::spawn(producer.run(request, self.settings.max_steps));
        TurnEvents { rx, task }
    }
}

/// Event stream of one running turn
pub struct TurnEvents {
    rx: mpsc::Receiver<Result<SourceItem, UpstreamError>>,
    task: JoinHandle<()>,
}

impl Stream for TurnEvents {
    type Item = Result<SourceItem, UpstreamError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for TurnEvents {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Why a step stopped early
enum StepEnd {
    Failed(UpstreamError),
    /// The consumer went away
    Closed,
}

struct Producer {
    provider: Arc<ChatProvider>,
    tools: Arc<ToolRegistry>,
    tx: mpsc::Sender<Result<SourceItem, UpstreamError>>,
    running: JoinSet<Event>,
    running_calls: HashMap<tokio::task::Id, (String, String)>,
}

impl Producer {
    async fn run(mut self, mut request: ChatCompletionRequest, max_steps: usize) {
        for step in 1..=max_steps {
            let events = match self.step(&request).await {
                Ok(events) => events,
                Err(StepEnd::Failed(e)) => {
                    let _ = self.tx.send(Err(e)).await;
                    return;
                }
                Err(StepEnd::Closed) => return,
            };

            let called_tools = events
                .iter()
                .any(|event| matches!(event, Event::ToolInputAvailable { .. }));
            if !called_tools {
                return;
            }
            if step == max_steps {
                tracing::info!(max_steps, "Tool step limit reached, ending turn");
                return;
            }

            tracing::debug!(step, "Sending tool results back upstream");
            request.messages.extend(follow_up_messages(events));
            if self.tx.send(Ok(SourceItem::StepBoundary)).await.is_err() {
                return;
            }
        }
    }

    /// One upstream request; returns every event it forwarded
    async fn step(&mut self, request: &ChatCompletionRequest) -> Result<Vec<Event>, StepEnd> {
        let response = self
            .provider
            .call_api_stream(request)
            .await
            .map_err(StepEnd::Failed)?;

        let mut forwarded = Vec::new();
        let mut decoder = UpstreamDecoder::new();
        let mut body = response.bytes_stream();

        loop {
            tokio::select! {
                chunk = body.next() => match chunk {
                    Some(Ok(bytes)) => {
                        let events = decoder.push(&bytes).map_err(StepEnd::Failed)?;
                        for event in events {
                            self.forward(event, &mut forwarded).await?;
                        }
                    }
                    Some(Err(e)) => return Err(StepEnd::Failed(UpstreamError::Network(e))),
                    None => break,
                },
                Some(joined) = self.running.join_next_with_id(), if !self.running.is_empty() => {
                    let event = self.tool_finished(joined);
                    self.forward(event, &mut forwarded).await?;
                }
            }
        }

        for event in decoder.finish().map_err(StepEnd::Failed)? {
            self.forward(event, &mut forwarded).await?;
        }

        while let Some(joined) = self.running.join_next_with_id().await {
            let event = self.tool_finished(joined);
            self.forward(event, &mut forwarded).await?;
        }

        Ok(forwarded)
    }

    /// Send one event downstream, starting the tool it requests
    async fn forward(&mut self, event: Event, forwarded: &mut Vec<Event>) -> Result<(), StepEnd> {
        if let Event::ToolInputAvailable {
            call_id,
            tool_name,
            input,
        } = &event
        {
            let tools = self.tools.clone();
            let (id, name, input) = (call_id.clone(), tool_name.clone(), input.clone());
            let handle = self
                .running
                .spawn(async move { tools.execute(id, name, input).await });
            self.running_calls
                .insert(handle.id(), (call_id.clone(), tool_name.clone()));
        }

        forwarded.push(event.clone());
        self.tx
            .send(Ok(SourceItem::Event(event)))
            .await
            .map_err(|_| StepEnd::Closed)
    }

    fn tool_finished(
        &mut self,
        joined: Result<(tokio::task::Id, Event), tokio::task::JoinError>,
    ) -> Event {
        match joined {
            Ok((id, event)) => {
                self.running_calls.remove(&id);
                event
            }
            Err(e) => {
                let (call_id, tool_name) = self
                    .running_calls
                    .remove(&e.id())
                    .unwrap_or_default();
                tracing::error!(call_id = %call_id, tool = %tool_name, "Tool task failed: {}", e);
                Event::tool_error(call_id, format!("Tool '{}' crashed", tool_name))
            }
        }
    }
}

/// Upstream messages describing what a finished step produced
fn follow_up_messages(events: Vec<Event>) -> Vec<ChatMessage> {
    let mut builder = TranscriptBuilder::new();
    for event in events {
        builder.apply(event);
    }
    messages_from_transcript("", &[builder.into_message()])
}
