//! The conversation loop.
//!
//! Drives generation, classification, extraction, tool dispatch and
//! re-prompting across bounded turns. One runner serves many requests;
//! each request gets its own transcript, classifier and event channel,
//! so sessions never share mutable state.

use crate::classifier::{ChunkTag, StreamClassifier, TaggedChunk};
use crate::extractor::ToolCallExtractor;
use crate::prompt::{DEFAULT_SYSTEM_PROMPT, PromptAssembler, continuation_block};
use crate::stream_event::AgentStreamEvent;
use potager_config::AgentConfig;
use potager_core::backend::{GenerationBackend, Usage};
use potager_core::message::HistoryMessage;
use potager_core::tool::ToolRegistry;
use potager_telemetry::{InteractionTrace, TraceStore};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

/// One inbound chat request.
#[derive(Debug, Clone, Default)]
pub struct AgentRequest {
    pub query: String,
    pub history: Vec<HistoryMessage>,
    pub conversation_id: Option<String>,
    /// Dynamic reference context injected into the prompt.
    pub context: String,
}

impl AgentRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }
}

/// How one generation turn ended.
enum TurnOutcome {
    /// Stream consumed fully; carries the turn's raw text.
    Completed(String),
    /// The consumer went away mid-stream. The buffer is truncated, so no
    /// extraction may run on it.
    Disconnected,
    Failed(String),
}

pub struct AgentRunner {
    backend: Arc<dyn GenerationBackend>,
    tools: Arc<ToolRegistry>,
    traces: Arc<TraceStore>,
    config: AgentConfig,
    model: String,
}

impl AgentRunner {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        tools: Arc<ToolRegistry>,
        traces: Arc<TraceStore>,
        config: AgentConfig,
        model: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            tools,
            traces,
            config,
            model: model.into(),
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run one request; events arrive on the returned channel in order.
    /// The channel closes after the terminal event.
    pub fn run_stream(self: &Arc<Self>, request: AgentRequest) -> mpsc::Receiver<AgentStreamEvent> {
        let (tx, rx) = mpsc::channel(64);
        let runner = Arc::clone(self);
        tokio::spawn(async move {
            runner.drive(request, tx).await;
        });
        rx
    }

    async fn drive(&self, request: AgentRequest, tx: mpsc::Sender<AgentStreamEvent>) {
        let conversation_id = request
            .conversation_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let started = Instant::now();

        let assembler = PromptAssembler::new(
            self.config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            self.config.safety_confirmation,
            &self.config.thought_marker,
            &self.config.answer_marker,
        );
        let schemas = self.tools.schemas();
        let mut prompt =
            assembler.assemble(&request.context, &request.history, &request.query, &schemas);
        let initial_prompt = prompt.clone();
        let extractor = ToolCallExtractor::new(&self.config.tool_block_marker);

        let mut usage = Usage::default();
        let mut response = String::new();
        let mut turns = 0usize;

        while turns < self.config.max_turns {
            turns += 1;
            tracing::debug!(conversation_id = %conversation_id, turn = turns, "generation turn");

            let text = match self.run_turn(&prompt, &mut usage, &mut response, &tx).await {
                TurnOutcome::Completed(text) => text,
                TurnOutcome::Disconnected => {
                    tracing::debug!(conversation_id = %conversation_id, "consumer disconnected");
                    return;
                }
                TurnOutcome::Failed(message) => {
                    tracing::warn!(conversation_id = %conversation_id, error = %message, "generation failed");
                    let _ = tx.send(AgentStreamEvent::Error { message }).await;
                    self.record(&conversation_id, &initial_prompt, &response, usage, turns, started);
                    return;
                }
            };

            let Some(invocation) = extractor.extract(&text) else {
                // No invocation: the emitted message segments are the answer.
                self.record(&conversation_id, &initial_prompt, &response, usage, turns, started);
                let _ = tx
                    .send(AgentStreamEvent::Done {
                        conversation_id,
                        turns,
                    })
                    .await;
                return;
            };

            tracing::info!(tool = %invocation.name, turn = turns, "tool invocation");
            if tx
                .send(AgentStreamEvent::StepStart {
                    tool: invocation.name.clone(),
                    args: invocation.arguments.clone(),
                })
                .await
                .is_err()
            {
                return;
            }

            let tool_started = Instant::now();
            let outcome = self
                .tools
                .dispatch(&invocation.name, invocation.arguments.clone())
                .await;
            let duration = tool_started.elapsed().as_millis() as u64;
            let result_json = serde_json::to_string(&outcome)
                .unwrap_or_else(|e| format!(r#"{{"success":false,"error":"{e}"}}"#));

            if tx
                .send(AgentStreamEvent::StepEnd {
                    tool: invocation.name.clone(),
                    duration,
                    result: result_json.clone(),
                })
                .await
                .is_err()
            {
                return;
            }

            prompt.push_str(&continuation_block(
                &invocation.name,
                &invocation.arguments,
                &result_json,
            ));
        }

        // Budget exhausted while the model kept asking for tools.
        let notice = format!(
            "\n\n⚠️ **Alerte sécurité** : j'ai atteint ma limite de réflexion ({} étapes). J'arrête ici pour ne pas tourner en rond.",
            self.config.max_turns
        );
        response.push_str(&notice);
        let _ = tx
            .send(AgentStreamEvent::MessageToken { content: notice })
            .await;
        self.record(&conversation_id, &initial_prompt, &response, usage, turns, started);
        let _ = tx
            .send(AgentStreamEvent::Done {
                conversation_id,
                turns,
            })
            .await;
    }

    /// Stream one generation, classifying and forwarding as chunks land.
    async fn run_turn(
        &self,
        prompt: &str,
        usage: &mut Usage,
        response: &mut String,
        tx: &mpsc::Sender<AgentStreamEvent>,
    ) -> TurnOutcome {
        let mut chunks = match self.backend.generate_stream(prompt).await {
            Ok(rx) => rx,
            Err(e) => return TurnOutcome::Failed(e.to_string()),
        };

        let mut classifier = StreamClassifier::new(
            &self.config.thought_marker,
            &self.config.answer_marker,
            &self.config.tool_block_marker,
        );

        while let Some(item) = chunks.recv().await {
            match item {
                Ok(chunk) => {
                    if let Some(u) = chunk.usage {
                        usage.absorb(u);
                    }
                    if !chunk.text.is_empty()
                        && !self.forward(classifier.push(&chunk.text), response, tx).await
                    {
                        return TurnOutcome::Disconnected;
                    }
                    if chunk.done {
                        break;
                    }
                }
                Err(e) => return TurnOutcome::Failed(e.to_string()),
            }
        }

        if !self.forward(classifier.finish(), response, tx).await {
            return TurnOutcome::Disconnected;
        }
        TurnOutcome::Completed(classifier.into_buffer())
    }

    /// Returns false when the consumer hung up.
    async fn forward(
        &self,
        tagged: Vec<TaggedChunk>,
        response: &mut String,
        tx: &mpsc::Sender<AgentStreamEvent>,
    ) -> bool {
        for chunk in tagged {
            let event = match chunk.tag {
                ChunkTag::Thought => AgentStreamEvent::ThoughtToken {
                    content: chunk.text,
                },
                ChunkTag::Message => {
                    response.push_str(&chunk.text);
                    AgentStreamEvent::MessageToken {
                        content: chunk.text,
                    }
                }
            };
            if tx.send(event).await.is_err() {
                return false;
            }
        }
        true
    }

    fn record(
        &self,
        conversation_id: &str,
        prompt: &str,
        response: &str,
        usage: Usage,
        turns: usize,
        started: Instant,
    ) {
        let mut trace = InteractionTrace::new(&self.config.name, &self.config.version);
        trace.conversation_id = Some(conversation_id.to_string());
        trace.model = self.model.clone();
        trace.prompt = prompt.to_string();
        trace.response = response.to_string();
        trace.input_tokens = usage.prompt_tokens;
        trace.output_tokens = usage.completion_tokens;
        trace.turns = turns;
        trace.duration_ms = started.elapsed().as_millis() as u64;
        self.traces.record(trace);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use potager_providers::scripted::{ScriptedBackend, ScriptedTurn};
    use potager_tools::{MemoryGardenStore, garden_registry};

    const SEARCH_CALL: &str =
        "PENSÉE : je cherche\n\n```json\n{\"tool\":\"search_garden\",\"args\":{\"query\":\"tomate\"}}\n```";

    struct Harness {
        runner: Arc<AgentRunner>,
        backend: Arc<ScriptedBackend>,
        traces: Arc<TraceStore>,
    }

    fn harness(turns: Vec<ScriptedTurn>, max_turns: usize) -> Harness {
        let backend = Arc::new(ScriptedBackend::new(turns));
        let store = Arc::new(MemoryGardenStore::new());
        store.seed_demo();
        let traces = Arc::new(TraceStore::new(100));
        let config = AgentConfig {
            max_turns,
            ..AgentConfig::default()
        };
        let runner = Arc::new(AgentRunner::new(
            backend.clone(),
            Arc::new(garden_registry(store)),
            traces.clone(),
            config,
            "test-model",
        ));
        Harness {
            runner,
            backend,
            traces,
        }
    }

    async fn collect(mut rx: mpsc::Receiver<AgentStreamEvent>) -> Vec<AgentStreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    fn messages(events: &[AgentStreamEvent]) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                AgentStreamEvent::MessageToken { content } => Some(content.as_str()),
                _ => None,
            })
            .collect()
    }

    fn thoughts(events: &[AgentStreamEvent]) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                AgentStreamEvent::ThoughtToken { content } => Some(content.as_str()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn budget_exhaustion_emits_safety_notice() {
        let h = harness(
            vec![ScriptedTurn::whole(SEARCH_CALL), ScriptedTurn::whole(SEARCH_CALL)],
            2,
        );
        let events = collect(h.runner.run_stream(AgentRequest::new("inventaire ?"))).await;

        let steps = events
            .iter()
            .filter(|e| matches!(e, AgentStreamEvent::StepStart { .. }))
            .count();
        assert_eq!(steps, 2);
        assert!(messages(&events).contains("Alerte sécurité"));
        assert!(matches!(
            events.last(),
            Some(AgentStreamEvent::Done { turns: 2, .. })
        ));
    }

    #[tokio::test]
    async fn loop_stops_on_first_turn_without_invocation() {
        let h = harness(
            vec![
                ScriptedTurn::whole(SEARCH_CALL),
                ScriptedTurn::whole(SEARCH_CALL),
                ScriptedTurn::whole("RÉPONSE : Voici votre inventaire."),
            ],
            5,
        );
        let events = collect(h.runner.run_stream(AgentRequest::new("inventaire ?"))).await;

        assert!(!messages(&events).contains("Alerte sécurité"));
        assert!(matches!(
            events.last(),
            Some(AgentStreamEvent::Done { turns: 3, .. })
        ));
        assert_eq!(h.backend.calls(), 3);
    }

    #[tokio::test]
    async fn unknown_tool_feeds_error_back_and_continues() {
        let h = harness(
            vec![
                ScriptedTurn::whole(
                    "PENSÉE : hmm\n\n```json\n{\"tool\":\"arroser_la_lune\",\"args\":{}}\n```",
                ),
                ScriptedTurn::whole("RÉPONSE : Je ne peux pas faire cela."),
            ],
            5,
        );
        let events = collect(h.runner.run_stream(AgentRequest::new("arrose la lune"))).await;

        let step_end = events
            .iter()
            .find_map(|e| match e {
                AgentStreamEvent::StepEnd { result, .. } => Some(result.clone()),
                _ => None,
            })
            .unwrap();
        assert!(step_end.contains("not found"));

        // the error result was re-prompted, and the loop went on
        let prompts = h.backend.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].contains("RÉSULTAT DE L'OUTIL"));
        assert!(prompts[1].contains("not found"));
        assert!(matches!(
            events.last(),
            Some(AgentStreamEvent::Done { turns: 2, .. })
        ));
    }

    #[tokio::test]
    async fn generation_failure_aborts_with_error_event() {
        let h = harness(vec![], 5);
        let events = collect(h.runner.run_stream(AgentRequest::new("bonjour"))).await;
        assert!(matches!(
            events.last(),
            Some(AgentStreamEvent::Error { .. })
        ));
    }

    #[tokio::test]
    async fn end_to_end_tomato_count() {
        let h = harness(
            vec![
                ScriptedTurn::pieces(&[
                    "PENSÉE : je vérifie\n\n",
                    "```json\n{\"tool\":\"search_garden\",\"args\":{\"query\":\"tomate\"}}\n```",
                ]),
                ScriptedTurn::pieces(&["PENSÉE : j'ai trouvé\n\n", "RÉPONSE : Vous avez 4 tomates."]),
            ],
            5,
        );
        let events = collect(
            h.runner
                .run_stream(AgentRequest::new("Combien de tomates ai-je ?")),
        )
        .await;

        assert!(thoughts(&events).contains("je vérifie"));
        assert!(thoughts(&events).contains("j'ai trouvé"));
        assert_eq!(messages(&events), "Vous avez 4 tomates.");

        // ordering: thoughts, step_start, step_end, thoughts, message, done
        let shape: Vec<&str> = events
            .iter()
            .map(|e| match e {
                AgentStreamEvent::ThoughtToken { .. } => "thought",
                AgentStreamEvent::MessageToken { .. } => "message",
                AgentStreamEvent::StepStart { .. } => "step_start",
                AgentStreamEvent::StepEnd { .. } => "step_end",
                AgentStreamEvent::Error { .. } => "error",
                AgentStreamEvent::Done { .. } => "done",
            })
            .collect();
        let step_start_at = shape.iter().position(|s| *s == "step_start").unwrap();
        let step_end_at = shape.iter().position(|s| *s == "step_end").unwrap();
        let message_at = shape.iter().position(|s| *s == "message").unwrap();
        assert!(shape[..step_start_at].iter().all(|s| *s == "thought"));
        assert_eq!(step_end_at, step_start_at + 1);
        assert!(message_at > step_end_at);
        assert_eq!(shape.last(), Some(&"done"));

        // the tool really ran against the seeded garden
        let step_end = events
            .iter()
            .find_map(|e| match e {
                AgentStreamEvent::StepEnd { result, .. } => Some(result.clone()),
                _ => None,
            })
            .unwrap();
        assert!(step_end.contains("\"quantite\":4"));

        assert!(matches!(
            events.last(),
            Some(AgentStreamEvent::Done { turns: 2, .. })
        ));

        // and the interaction was traced
        let traces = h.traces.recent(1);
        assert_eq!(traces.len(), 1);
        assert_eq!(traces[0].turns, 2);
        assert_eq!(traces[0].response, "Vous avez 4 tomates.");
    }

    #[tokio::test]
    async fn history_and_query_reach_the_prompt() {
        let h = harness(vec![ScriptedTurn::whole("RÉPONSE : Bonjour !")], 5);
        let mut request = AgentRequest::new("Et mes radis ?");
        request.history = vec![
            HistoryMessage::user("Bonjour"),
            HistoryMessage::assistant("Bonjour, que puis-je faire ?"),
        ];
        collect(h.runner.run_stream(request)).await;

        let prompts = h.backend.prompts();
        assert!(prompts[0].contains("USER: Bonjour"));
        assert!(prompts[0].contains("USER_QUERY: Et mes radis ?"));
        assert!(prompts[0].contains("search_garden"));
    }
}
