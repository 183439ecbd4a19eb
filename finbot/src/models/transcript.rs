//! Session-scoped conversation transcript.

use super::turn::Turn;
use serde::{Deserialize, Serialize};

/// Ordered sequence of turns for one session.
///
/// Insertion order is the only invariant. Turns are never deduplicated or
/// reordered; the only way to drop them is [`Transcript::clear`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// The most recent `size` turns, oldest first.
    ///
    /// With fewer than `size` turns recorded the whole transcript is returned.
    pub fn window(&self, size: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(size);
        &self.turns[start..]
    }

    /// The window serialized as `role: content` lines.
    pub fn render_window(&self, size: usize) -> String {
        self.window(size)
            .iter()
            .map(Turn::to_prompt_line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl FromIterator<Turn> for Transcript {
    fn from_iter<I: IntoIterator<Item = Turn>>(iter: I) -> Self {
        Self {
            turns: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn transcript_of(n: usize) -> Transcript {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    Turn::user(format!("q{}", i))
                } else {
                    Turn::assistant(format!("a{}", i))
                }
            })
            .collect()
    }

    fn contents(turns: &[Turn]) -> Vec<&str> {
        turns.iter().map(|t| t.content.as_str()).collect()
    }

    #[test]
    fn push_preserves_order_and_grows_by_one() {
        for n in 0..12 {
            let mut transcript = transcript_of(n);
            let before: Vec<String> = transcript
                .turns()
                .iter()
                .map(|t| t.content.clone())
                .collect();

            transcript.push(Turn::user("new"));

            assert_eq!(transcript.len(), n + 1);
            assert_eq!(
                contents(&transcript.turns()[..n]),
                before.iter().map(String::as_str).collect::<Vec<_>>()
            );
            assert_eq!(transcript.turns()[n].content, "new");
        }
    }

    #[test]
    fn window_never_exceeds_size() {
        for n in 0..30 {
            let transcript = transcript_of(n);
            let window = transcript.window(5);
            assert_eq!(window.len(), n.min(5));
            assert_eq!(window, &transcript.turns()[n.saturating_sub(5)..]);
        }
    }

    #[test]
    fn short_transcript_window_is_everything_in_order() {
        let transcript = transcript_of(3);
        assert_eq!(contents(transcript.window(5)), vec!["q0", "a1", "q2"]);
    }

    #[test]
    fn window_of_long_transcript_is_most_recent_suffix() {
        let transcript = transcript_of(8);
        assert_eq!(
            contents(transcript.window(5)),
            vec!["a3", "q4", "a5", "q6", "a7"]
        );
    }

    #[test]
    fn zero_sized_window_is_empty() {
        let transcript = transcript_of(4);
        assert!(transcript.window(0).is_empty());
        assert_eq!(transcript.render_window(0), "");
    }

    #[test]
    fn render_window_formats_role_lines() {
        let transcript = transcript_of(7);
        assert_eq!(
            transcript.render_window(3),
            "user: q4\nassistant: a5\nuser: q6"
        );
    }

    #[test]
    fn clear_empties_transcript() {
        let mut transcript = transcript_of(9);
        transcript.clear();
        assert!(transcript.is_empty());
        assert_eq!(transcript.len(), 0);
        assert_eq!(transcript.render_window(5), "");
    }

    #[test]
    fn serializes_as_plain_list() {
        let transcript = transcript_of(2);
        let json = serde_json::to_value(&transcript).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["role"], "user");

        let back: Transcript = serde_json::from_value(json).unwrap();
        assert_eq!(back.turns()[1].role, Role::Assistant);
    }
}
