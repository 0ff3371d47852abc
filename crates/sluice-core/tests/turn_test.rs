#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::StreamExt;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use sluice_core::api::Fragment;
    use sluice_core::app::{KeywordGate, Message, Orchestrator, StreamEvent, ToolCallValidator};
    use sluice_core::config::{Settings, TurnSettings};
    use sluice_core::test_utils::{
        ScriptedProvider, stream_error, text_fragments, tool_call_fragments,
    };
    use sluice_core::tools::{FnTool, ToolRegistry};
    use sluice_tools::tools::weather::WEATHER_COMPONENT;
    use sluice_tools::{InputSchema, Presentation};

    fn location_schema() -> InputSchema {
        let mut properties = serde_json::Map::new();
        properties.insert("location".to_string(), json!({"type": "string"}));
        InputSchema::object(properties, vec!["location".to_string()])
    }

    /// Weather stand-in that counts how often it runs.
    fn counting_weather(calls: Arc<AtomicUsize>) -> FnTool {
        FnTool::new(
            "get_weather",
            "Get the current weather",
            location_schema(),
            Presentation::inline(WEATHER_COMPONENT),
            move |args, _ctx| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let location = args["location"].as_str().unwrap_or_default().to_string();
                    Ok(json!(format!("{location}: 24C sunny")))
                }
            },
        )
    }

    fn counting_lookup(calls: Arc<AtomicUsize>) -> FnTool {
        FnTool::new(
            "lookup_record",
            "Look up a record for the model to summarize",
            location_schema(),
            Presentation::ReenterModel,
            move |args, _ctx| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!({"record": args["location"], "population": 1_200_000}))
                }
            },
        )
    }

    struct Harness {
        provider: Arc<ScriptedProvider>,
        orchestrator: Orchestrator,
        weather_calls: Arc<AtomicUsize>,
        lookup_calls: Arc<AtomicUsize>,
    }

    fn harness(provider: ScriptedProvider) -> Harness {
        let weather_calls = Arc::new(AtomicUsize::new(0));
        let lookup_calls = Arc::new(AtomicUsize::new(0));
        let registry = ToolRegistry::new()
            .with(counting_weather(weather_calls.clone()))
            .with(counting_lookup(lookup_calls.clone()));
        let provider = Arc::new(provider);
        let orchestrator = Orchestrator::new(
            provider.clone(),
            ToolCallValidator::new(registry),
            TurnSettings::default(),
        );
        Harness {
            provider,
            orchestrator,
            weather_calls,
            lookup_calls,
        }
    }

    async fn run(orchestrator: &Orchestrator, input: &str) -> Vec<StreamEvent> {
        orchestrator
            .run_turn(vec![], input, CancellationToken::new())
            .collect()
            .await
    }

    fn count(events: &[StreamEvent], pred: impl Fn(&StreamEvent) -> bool) -> usize {
        events.iter().filter(|e| pred(e)).count()
    }

    #[tokio::test]
    async fn plain_text_reply() {
        let h = harness(ScriptedProvider::new().then_fragments(vec![
            Fragment::text("Hel"),
            Fragment::text("lo"),
        ]));

        let events = run(&h.orchestrator, "hi").await;

        assert_eq!(
            events,
            vec![
                StreamEvent::Thinking,
                StreamEvent::Responding {
                    content: "Hel".to_string()
                },
                StreamEvent::Responding {
                    content: "lo".to_string()
                },
                StreamEvent::Done {
                    content: "Hello".to_string()
                },
            ]
        );
        assert_eq!(h.provider.request_count(), 1);
    }

    #[tokio::test]
    async fn inline_tool_result_ends_the_turn() {
        let h = harness(ScriptedProvider::new().then_fragments(tool_call_fragments(
            0,
            "call_1",
            "get_weather",
            r#"{"location":"Hangzhou"}"#,
            5,
        )));

        let events = run(&h.orchestrator, "What's the weather in Hangzhou?").await;

        assert_eq!(
            events,
            vec![
                StreamEvent::Thinking,
                StreamEvent::UsingTool,
                StreamEvent::ToolResult {
                    component_type: "WeatherCard".to_string(),
                    content: r#""Hangzhou: 24C sunny""#.to_string(),
                },
                StreamEvent::Done {
                    content: String::new()
                },
            ]
        );
        assert_eq!(h.weather_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.provider.request_count(), 1);
    }

    #[tokio::test]
    async fn truncated_arguments_lead_to_clarification() {
        let h = harness(
            ScriptedProvider::new()
                .then_fragments(tool_call_fragments(
                    0,
                    "call_1",
                    "get_weather",
                    r#"{"location":"#,
                    3,
                ))
                .then_fragments(text_fragments("Which city do you mean?", 6)),
        );

        let events = run(&h.orchestrator, "What's the weather?").await;

        assert_eq!(events.first(), Some(&StreamEvent::Thinking));
        assert_eq!(
            events.last(),
            Some(&StreamEvent::Done {
                content: "Which city do you mean?".to_string()
            })
        );
        assert_eq!(count(&events, |e| *e == StreamEvent::Thinking), 1);
        assert_eq!(count(&events, |e| matches!(e, StreamEvent::ToolResult { .. })), 0);
        assert_eq!(count(&events, |e| matches!(e, StreamEvent::Error { .. })), 0);
        assert_eq!(count(&events, |e| *e == StreamEvent::UsingTool), 0);
        assert_eq!(h.weather_calls.load(Ordering::SeqCst), 0);

        let clarification = &h.provider.requests()[1];
        assert!(!clarification.has_tools());
        assert!(clarification.tool_choice.is_none());
        assert!((clarification.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(
            clarification.messages.last(),
            Some(&Message::user("What's the weather?"))
        );
    }

    #[tokio::test]
    async fn mid_stream_failure_emits_one_error() {
        let h = harness(ScriptedProvider::new().then_stream(vec![
            Ok(Fragment::default()),
            Err(stream_error("connection reset by peer")),
        ]));

        let events = run(&h.orchestrator, "hi").await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0], StreamEvent::Thinking);
        assert!(matches!(&events[1], StreamEvent::Error { content } if !content.is_empty()));
        assert_eq!(count(&events, |e| matches!(e, StreamEvent::Done { .. })), 0);
    }

    #[tokio::test]
    async fn one_bad_call_blocks_the_whole_batch() {
        let mut fragments =
            tool_call_fragments(0, "call_1", "get_weather", r#"{"location":"Hangzhou"}"#, 8);
        fragments.extend(tool_call_fragments(
            1,
            "call_2",
            "get_weather",
            r#"{"city":"Beijing"}"#,
            8,
        ));
        let h = harness(
            ScriptedProvider::new()
                .then_fragments(fragments)
                .then_fragments(text_fragments("Which second city?", 64)),
        );

        let events = run(&h.orchestrator, "Weather in Hangzhou and Beijing").await;

        assert_eq!(h.weather_calls.load(Ordering::SeqCst), 0);
        assert_eq!(count(&events, |e| matches!(e, StreamEvent::ToolResult { .. })), 0);
        assert!(matches!(events.last(), Some(StreamEvent::Done { .. })));
    }

    #[tokio::test]
    async fn multi_call_results_keep_call_order() {
        let mut fragments = tool_call_fragments(0, "call_1", "get_weather", r#"{"location":"Hangzhou"}"#, 4);
        fragments.extend(tool_call_fragments(
            1,
            "call_2",
            "get_weather",
            r#"{"location":"Beijing"}"#,
            4,
        ));
        let h = harness(ScriptedProvider::new().then_fragments(fragments));

        let events = run(&h.orchestrator, "Weather in Hangzhou and Beijing").await;

        let contents: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::ToolResult { content, .. } => Some(content.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            contents,
            vec![r#""Hangzhou: 24C sunny""#, r#""Beijing: 24C sunny""#]
        );
        assert_eq!(count(&events, |e| *e == StreamEvent::UsingTool), 1);
        assert_eq!(h.weather_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn reenter_result_goes_back_to_the_model() {
        let h = harness(
            ScriptedProvider::new()
                .then_fragments(tool_call_fragments(
                    0,
                    "call_1",
                    "lookup_record",
                    r#"{"location":"Hangzhou"}"#,
                    6,
                ))
                .then_fragments(text_fragments("Hangzhou has about 1.2 million people.", 7)),
        );

        let events = run(&h.orchestrator, "Tell me about Hangzhou").await;

        assert_eq!(h.provider.request_count(), 2);
        assert_eq!(h.lookup_calls.load(Ordering::SeqCst), 1);
        assert_eq!(count(&events, |e| matches!(e, StreamEvent::ToolResult { .. })), 0);
        assert_eq!(count(&events, |e| *e == StreamEvent::Thinking), 1);
        assert_eq!(
            events.last(),
            Some(&StreamEvent::Done {
                content: "Hangzhou has about 1.2 million people.".to_string()
            })
        );

        let follow_up = &h.provider.requests()[1];
        let tool_message = follow_up.messages.last().unwrap();
        assert_eq!(tool_message.tool_call_id.as_deref(), Some("call_1"));
        assert!(tool_message.content.contains("1200000"));
    }

    #[tokio::test]
    async fn mixed_batch_shows_inline_then_reenters() {
        let mut fragments = tool_call_fragments(0, "call_1", "get_weather", r#"{"location":"Hangzhou"}"#, 9);
        fragments.extend(tool_call_fragments(
            1,
            "call_2",
            "lookup_record",
            r#"{"location":"Hangzhou"}"#,
            9,
        ));
        let h = harness(
            ScriptedProvider::new()
                .then_fragments(fragments)
                .then_fragments(text_fragments("Summary.", 64)),
        );

        let events = run(&h.orchestrator, "Weather and facts for Hangzhou").await;

        assert_eq!(count(&events, |e| matches!(e, StreamEvent::ToolResult { .. })), 1);
        assert_eq!(h.provider.request_count(), 2);

        let follow_up = &h.provider.requests()[1];
        let tool_messages: Vec<_> = follow_up
            .messages
            .iter()
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();
        assert_eq!(tool_messages, vec!["call_1", "call_2"]);
    }

    #[tokio::test]
    async fn keyword_gate_declines_off_topic_calls() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = ToolRegistry::new().with(counting_weather(calls.clone()));
        let validator = ToolCallValidator::new(registry)
            .with_gate("get_weather", KeywordGate::new(["weather", "天气"]));
        let provider = Arc::new(
            ScriptedProvider::new()
                .then_fragments(tool_call_fragments(
                    0,
                    "call_1",
                    "get_weather",
                    r#"{"location":"Hangzhou"}"#,
                    64,
                ))
                .then_fragments(text_fragments("Hangzhou is in Zhejiang.", 64)),
        );
        let orchestrator =
            Orchestrator::new(provider.clone(), validator, TurnSettings::default());

        let events = run(&orchestrator, "Where is Hangzhou?").await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(provider.request_count(), 2);
        assert!(matches!(events.last(), Some(StreamEvent::Done { .. })));
    }

    #[tokio::test]
    async fn cancelled_turn_skips_tools_and_ends_with_error() {
        let h = harness(ScriptedProvider::new().then_fragments(tool_call_fragments(
            0,
            "call_1",
            "get_weather",
            r#"{"location":"Hangzhou"}"#,
            64,
        )));
        let token = CancellationToken::new();
        token.cancel();

        let events: Vec<_> = h
            .orchestrator
            .run_turn(vec![], "What's the weather in Hangzhou?", token)
            .collect()
            .await;

        assert_eq!(h.weather_calls.load(Ordering::SeqCst), 0);
        assert_eq!(count(&events, |e| matches!(e, StreamEvent::ToolResult { .. })), 0);
        assert_eq!(count(&events, |e| matches!(e, StreamEvent::Error { .. })), 1);
        assert!(matches!(events.last(), Some(StreamEvent::Error { .. })));
        assert_eq!(count(&events, |e| matches!(e, StreamEvent::Done { .. })), 0);
    }

    #[tokio::test]
    async fn default_settings_wire_up_builtin_tools() {
        let settings = Settings::default();
        let registry = settings.build_registry().unwrap();
        let validator = settings.build_validator(registry);
        let provider = Arc::new(
            ScriptedProvider::new().then_fragments(tool_call_fragments(
                0,
                "call_1",
                "get_weather",
                r#"{"location":"Hangzhou"}"#,
                7,
            )),
        );
        let orchestrator = Orchestrator::new(provider, validator, settings.turn.clone());

        let events = run(&orchestrator, "What's the weather in Hangzhou?").await;

        assert!(events.iter().any(|e| matches!(
            e,
            StreamEvent::ToolResult { component_type, content }
                if component_type == WEATHER_COMPONENT && content.contains("Hangzhou")
        )));
    }
}
