//! Per-message dispatcher: the guest chat entry point.
//!
//! Every guest message flows through:
//! 1. `QuickAnswers`: wifi/checkout canned replies (no model call), unless
//!    the guest is asking for something to be done
//! 2. model call, bounded by the configured timeout
//! 3. `parser::parse`: marker extraction
//! 4. `HeuristicClassifier`: safety net when the model emitted no marker
//! 5. `RequestCoordinator::resolve`: store mutation + reply text
//! 6. chat log
//!
//! `handle` never fails; every error path ends in a reply string.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::{LlmError, PipelineError};
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::pipeline::classifier::HeuristicClassifier;
use crate::pipeline::coordinator::RequestCoordinator;
use crate::pipeline::parser;
use crate::pipeline::rules::QUICK_REQUEST_FALLBACK;
use crate::pipeline::types::Classification;
use crate::store::traits::{ChatLog, ChatSender};

/// Temperature for guest replies.
const REPLY_TEMPERATURE: f64 = 0.4;

/// Max tokens for a guest reply.
const REPLY_MAX_TOKENS: u64 = 512;

pub const EMPTY_MESSAGE_REPLY: &str = "Please type a message and I'll be happy to help.";

pub const NO_MODEL_REPLY: &str = "Our virtual assistant isn't available at the moment. \
For anything urgent, please call the front desk.";

pub const EMPTY_MODEL_REPLY: &str =
    "I'm sorry, I didn't quite catch that. Could you tell me a bit more?";

fn model_failure_reply(error: &PipelineError) -> String {
    format!(
        "I'm sorry, I'm having trouble answering right now ({error}). \
Please try again in a moment or contact the front desk."
    )
}

/// Orchestrates one guest message end to end.
pub struct Dispatcher {
    llm: Option<Arc<dyn LlmProvider>>,
    classifier: HeuristicClassifier,
    coordinator: RequestCoordinator,
    chat_log: Arc<dyn ChatLog>,
    config: PipelineConfig,
}

impl Dispatcher {
    pub fn new(
        llm: Option<Arc<dyn LlmProvider>>,
        coordinator: RequestCoordinator,
        chat_log: Arc<dyn ChatLog>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            llm,
            classifier: HeuristicClassifier::new(config.rulebook.clone()),
            coordinator,
            chat_log,
            config,
        }
    }

    pub fn has_model(&self) -> bool {
        self.llm.is_some()
    }

    /// Handle one guest message and return the reply.
    pub async fn handle(&self, text: &str, room: &str, session_ref: Option<&str>) -> String {
        let text = text.trim();
        if text.is_empty() {
            return EMPTY_MESSAGE_REPLY.to_string();
        }

        info!(room = %room, len = text.len(), "Guest message received");

        let reply = match self.quick_answer(text) {
            Some(answer) => {
                debug!(room = %room, "Quick answer");
                answer
            }
            None => self.answer_with_model(text, room, session_ref).await,
        };

        self.log_turn(room, text, ChatSender::Guest).await;
        self.log_turn(room, &reply, ChatSender::Assistant).await;
        reply
    }

    /// Answer a quick-request button. No model call and no request record;
    /// both sides are logged like a chat exchange.
    pub async fn handle_quick_request(&self, label: &str, room: &str) -> String {
        let label = label.trim();
        let reply = match self.config.quick_replies.lookup(label) {
            Some(reply) => reply.to_string(),
            None => {
                debug!(room = %room, label = %label, "Unknown quick request label");
                QUICK_REQUEST_FALLBACK.to_string()
            }
        };
        info!(room = %room, label = %label, "Quick request");

        self.log_turn(room, label, ChatSender::Guest).await;
        self.log_turn(room, &reply, ChatSender::Assistant).await;
        reply
    }

    /// A canned reply, unless the text carries action or cancel phrasing:
    /// "the wifi is not working, please fix it" must be filed, not answered.
    fn quick_answer(&self, text: &str) -> Option<String> {
        let answer = self.config.quick_answers.answer(text)?;
        if !self.classifier.classify(text).is_none() {
            debug!("Quick-answer topic with action phrasing, using model path");
            return None;
        }
        Some(answer)
    }

    async fn answer_with_model(&self, text: &str, room: &str, session_ref: Option<&str>) -> String {
        let Some(llm) = &self.llm else {
            // No model: the heuristic is the only way to capture the request.
            let classification = self.classifier.classify(text);
            return match classification {
                Classification::NoIntent => NO_MODEL_REPLY.to_string(),
                _ => {
                    let ack = self
                        .coordinator
                        .resolve(&classification, "", room, session_ref)
                        .await;
                    append(NO_MODEL_REPLY, &ack)
                }
            };
        };

        let raw = match self.call_model(llm.as_ref(), text).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(room = %room, error = %e, "Model call failed");
                let reply = model_failure_reply(&e);
                return self.with_fallback(reply, text, room, session_ref).await;
            }
        };

        let parsed = parser::parse(&raw);
        debug!(
            room = %room,
            intent = parsed.classification.label(),
            "Model reply parsed"
        );

        if !parsed.classification.is_none() {
            return self
                .coordinator
                .resolve(&parsed.classification, &parsed.remainder, room, session_ref)
                .await;
        }

        let remainder = if parsed.remainder.trim().is_empty() {
            EMPTY_MODEL_REPLY.to_string()
        } else {
            parsed.remainder.trim().to_string()
        };

        if parser::contains_marker(&raw) {
            // Any marker, parsed or not, suppresses the fallback.
            debug!(room = %room, "Marker present but unparsed, skipping fallback");
            return remainder;
        }

        self.with_fallback(remainder, text, room, session_ref).await
    }

    /// Run the heuristic once and, on a service intent, file the request and
    /// append the acknowledgment to `reply`.
    async fn with_fallback(
        &self,
        reply: String,
        text: &str,
        room: &str,
        session_ref: Option<&str>,
    ) -> String {
        let classification = self.classifier.classify(text);
        if !classification.is_service() {
            return reply;
        }
        info!(room = %room, "Heuristic fallback found a service request");
        let ack = self
            .coordinator
            .resolve(&classification, "", room, session_ref)
            .await;
        append(&reply, &ack)
    }

    async fn call_model(&self, llm: &dyn LlmProvider, text: &str) -> Result<String, PipelineError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(self.config.system_prompt.as_str()),
            ChatMessage::user(text),
        ])
        .with_temperature(REPLY_TEMPERATURE)
        .with_max_tokens(REPLY_MAX_TOKENS);

        let timeout = self.config.model_timeout;
        let response = tokio::time::timeout(timeout, llm.complete(request))
            .await
            .map_err(|_| LlmError::Timeout {
                provider: llm.model_name().to_string(),
                timeout,
            })??;

        debug!(
            model = llm.model_name(),
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "Model replied"
        );
        Ok(response.content)
    }

    async fn log_turn(&self, room: &str, text: &str, sender: ChatSender) {
        if let Err(e) = self.chat_log.append_turn(room, text, sender).await {
            warn!(room = %room, error = %e, "Failed to log chat turn");
        }
    }
}

fn append(reply: &str, ack: &str) -> String {
    let reply = reply.trim();
    if reply.is_empty() {
        ack.to_string()
    } else {
        format!("{reply}\n\n{ack}")
    }
}
