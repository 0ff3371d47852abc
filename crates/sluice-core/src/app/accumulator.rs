//! Reassembles a streamed completion into one assistant message.
//!
//! Text is passed through as it arrives. Tool-call deltas are merged by
//! their positional index using plain string concatenation; nothing is
//! parsed here, so a truncated argument string still finalizes.

use futures::{Stream, StreamExt};
use std::collections::BTreeMap;

use crate::api::error::ApiError;
use crate::api::fragment::{Fragment, ToolCallDelta};
use crate::app::conversation::Message;
use crate::app::events::StreamEvent;
use sluice_tools::ToolCallRequest;

#[derive(Debug, Default)]
pub struct ChunkAccumulator {
    announce_thinking: bool,
    seen_fragment: bool,
    text: String,
    slots: BTreeMap<usize, ToolCallRequest>,
}

impl ChunkAccumulator {
    /// `announce_thinking` controls whether the first fragment yields a
    /// `thinking` event. Follow-up requests within a turn pass `false`.
    pub fn new(announce_thinking: bool) -> Self {
        Self {
            announce_thinking,
            ..Self::default()
        }
    }

    pub fn ingest(&mut self, fragment: &Fragment) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        if !self.seen_fragment {
            self.seen_fragment = true;
            if self.announce_thinking {
                events.push(StreamEvent::Thinking);
            }
        }

        let Some(delta) = fragment.delta() else {
            return events;
        };

        if let Some(content) = delta.content.as_deref().filter(|c| !c.is_empty()) {
            self.text.push_str(content);
            events.push(StreamEvent::Responding {
                content: content.to_string(),
            });
        }

        for call in delta.tool_calls.iter().flatten() {
            self.merge_tool_delta(call);
        }

        events
    }

    fn merge_tool_delta(&mut self, delta: &ToolCallDelta) {
        let slot = self.slots.entry(delta.index).or_default();

        // Providers repeat the id on later chunks; the first non-empty one wins.
        if slot.id.is_empty()
            && let Some(id) = delta.id.as_deref()
        {
            slot.id.push_str(id);
        }

        if let Some(function) = &delta.function {
            if let Some(name) = &function.name {
                slot.name.push_str(name);
            }
            if let Some(arguments) = &function.arguments {
                slot.arguments.push_str(arguments);
            }
        }
    }

    /// Consume the accumulator. Any tool-call slot makes this a tool-call
    /// message, whatever text came with it.
    pub fn finalize(self) -> Message {
        if self.slots.is_empty() {
            Message::assistant(self.text)
        } else {
            Message::assistant_tool_calls(self.text, self.slots.into_values().collect())
        }
    }
}

/// Item of [`accumulate`].
#[derive(Debug, Clone, PartialEq)]
pub enum Accumulated {
    Event(StreamEvent),
    /// The finalized message. Always the last item of a successful stream.
    Finished(Message),
}

/// Drive a fragment stream through a [`ChunkAccumulator`].
///
/// A stream error is yielded once and ends the sequence without a
/// `Finished` item.
pub fn accumulate<S>(
    mut fragments: S,
    announce_thinking: bool,
) -> impl Stream<Item = Result<Accumulated, ApiError>> + Send
where
    S: Stream<Item = Result<Fragment, ApiError>> + Unpin + Send,
{
    async_stream::stream! {
        let mut accumulator = ChunkAccumulator::new(announce_thinking);
        while let Some(item) = fragments.next().await {
            match item {
                Ok(fragment) => {
                    for event in accumulator.ingest(&fragment) {
                        yield Ok(Accumulated::Event(event));
                    }
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }
        yield Ok(Accumulated::Finished(accumulator.finalize()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use proptest::prelude::*;

    fn run(fragments: &[Fragment]) -> (Vec<StreamEvent>, Message) {
        let mut accumulator = ChunkAccumulator::new(true);
        let events = fragments
            .iter()
            .flat_map(|f| accumulator.ingest(f))
            .collect();
        (events, accumulator.finalize())
    }

    #[test]
    fn passes_text_through() {
        let (events, message) = run(&[Fragment::text("Hel"), Fragment::text("lo")]);
        assert_eq!(
            events,
            vec![
                StreamEvent::Thinking,
                StreamEvent::Responding { content: "Hel".into() },
                StreamEvent::Responding { content: "lo".into() },
            ]
        );
        assert_eq!(message, Message::assistant("Hello"));
    }

    #[test]
    fn thinking_fires_on_empty_first_fragment() {
        let (events, message) = run(&[Fragment::default(), Fragment::text("hi")]);
        assert_eq!(events[0], StreamEvent::Thinking);
        assert_eq!(events.iter().filter(|e| **e == StreamEvent::Thinking).count(), 1);
        assert_eq!(message.content, "hi");
    }

    #[test]
    fn follow_up_requests_stay_quiet() {
        let mut accumulator = ChunkAccumulator::new(false);
        assert!(accumulator.ingest(&Fragment::default()).is_empty());
    }

    #[test]
    fn merges_tool_calls_by_index() {
        let fragments = [
            Fragment::tool_call(0, Some("call_a"), Some("get_"), Some("")),
            Fragment::tool_call(1, Some("call_b"), Some("get_current_time"), Some("{}")),
            Fragment::tool_call(0, Some("call_a"), Some("weather"), Some(r#"{"location":"#)),
            Fragment::tool_call(0, None, None, Some(r#""Hangzhou"}"#)),
        ];
        let (events, message) = run(&fragments);

        assert_eq!(events, vec![StreamEvent::Thinking]);
        assert_eq!(
            message.tool_calls(),
            &[
                ToolCallRequest::new("call_a", "get_weather", r#"{"location":"Hangzhou"}"#),
                ToolCallRequest::new("call_b", "get_current_time", "{}"),
            ]
        );
    }

    #[test]
    fn missing_id_defaults_to_empty() {
        let (_, message) = run(&[Fragment::tool_call(0, None, Some("get_weather"), None)]);
        assert_eq!(message.tool_calls()[0].id, "");
    }

    #[test]
    fn truncated_arguments_still_finalize() {
        let (_, message) = run(&[
            Fragment::text("Let me check. "),
            Fragment::tool_call(0, Some("call_1"), Some("get_weather"), Some(r#"{"location":"#)),
        ]);
        assert!(message.has_tool_calls());
        assert_eq!(message.content, "Let me check. ");
        assert_eq!(message.tool_calls()[0].arguments, r#"{"location":"#);
    }

    #[tokio::test]
    async fn accumulate_ends_with_finished() {
        let fragments = stream::iter(vec![Ok(Fragment::text("Hi"))]);
        let items: Vec<_> = accumulate(fragments, true).collect().await;

        assert_eq!(items.len(), 3);
        assert!(matches!(items[2], Ok(Accumulated::Finished(ref m)) if m.content == "Hi"));
    }

    #[tokio::test]
    async fn accumulate_stops_at_first_error() {
        let fragments = stream::iter(vec![
            Ok(Fragment::text("Hi")),
            Err(ApiError::StreamError {
                provider: "test".into(),
                details: "reset".into(),
            }),
            Ok(Fragment::text("never")),
        ]);
        let items: Vec<_> = accumulate(fragments, true).collect().await;

        assert_eq!(items.len(), 3);
        assert!(items[2].is_err());
    }

    fn split_points(s: &str, cuts: &[usize]) -> Vec<String> {
        let chars: Vec<char> = s.chars().collect();
        let mut points: Vec<usize> = cuts.iter().map(|c| c % (chars.len() + 1)).collect();
        points.push(0);
        points.push(chars.len());
        points.sort_unstable();
        points.dedup();
        points
            .windows(2)
            .map(|w| chars[w[0]..w[1]].iter().collect())
            .collect()
    }

    proptest! {
        #[test]
        fn responding_concatenates_to_final_text(parts in prop::collection::vec(".{0,8}", 0..12)) {
            let fragments: Vec<Fragment> = parts.iter().map(Fragment::text).collect();
            let (events, message) = run(&fragments);

            let streamed: String = events
                .iter()
                .filter_map(|e| match e {
                    StreamEvent::Responding { content } => Some(content.as_str()),
                    _ => None,
                })
                .collect();
            prop_assert_eq!(&streamed, &message.content);
            prop_assert_eq!(streamed, parts.concat());

            let thinking = events.iter().filter(|e| **e == StreamEvent::Thinking).count();
            prop_assert_eq!(thinking, usize::from(!fragments.is_empty()));
            if !fragments.is_empty() {
                prop_assert_eq!(&events[0], &StreamEvent::Thinking);
            }
        }

        #[test]
        fn tool_calls_survive_fragmentation(
            name in "[a-z_]{1,16}",
            arguments in r#"\{("[a-z]{1,6}":"[a-zA-Z0-9 ]{0,10}")?\}"#,
            name_cuts in prop::collection::vec(any::<usize>(), 0..5),
            arg_cuts in prop::collection::vec(any::<usize>(), 0..8),
        ) {
            let whole = [Fragment::tool_call(0, Some("call_1"), Some(name.as_str()), Some(arguments.as_str()))];
            let (_, expected) = run(&whole);

            let mut fragments = vec![Fragment::tool_call(0, Some("call_1"), None, None)];
            fragments.extend(
                split_points(&name, &name_cuts)
                    .iter()
                    .map(|part| Fragment::tool_call(0, None, Some(part.as_str()), None)),
            );
            fragments.extend(
                split_points(&arguments, &arg_cuts)
                    .iter()
                    .map(|part| Fragment::tool_call(0, None, None, Some(part.as_str()))),
            );
            let (_, fragmented) = run(&fragments);

            prop_assert_eq!(fragmented, expected);
        }
    }
}
