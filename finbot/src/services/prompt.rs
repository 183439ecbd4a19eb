//! Prompt assembly.
//!
//! Every outbound prompt is the persona block, the optional profile lines,
//! the most recent turns as `role: content` lines, and finally the new input.
//! Older turns are dropped outright; there is no summarisation or token
//! accounting.

use crate::models::{Preferences, Transcript};

/// Static instructional text prepended to every outbound prompt.
pub const FINANCE_PERSONA: &str = "You are a helpful and professional financial advisor chatbot. \
     Provide clear, concise information on budgeting, investing, and markets. \
     Always include a disclaimer that this is not professional financial advice.";

/// Number of recent turns carried into each prompt.
pub const DEFAULT_HISTORY_WINDOW: usize = 5;

/// First line of the follow-up suggestion prompt.
pub const FOLLOW_UP_INSTRUCTION: &str =
    "Suggest three short follow-up questions the user might ask next.";

/// Maximum number of follow-up suggestions kept.
pub const MAX_FOLLOW_UPS: usize = 3;

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    persona: String,
    window: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(FINANCE_PERSONA, DEFAULT_HISTORY_WINDOW)
    }
}

impl PromptBuilder {
    pub fn new(persona: impl Into<String>, window: usize) -> Self {
        Self {
            persona: persona.into(),
            window,
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Compose the prompt for `input`.
    ///
    /// `history` must not yet contain the turn for `input`.
    pub fn build(&self, history: &Transcript, preferences: &Preferences, input: &str) -> String {
        let mut sections: Vec<String> = vec![self.persona.clone()];

        if !preferences.is_empty() {
            let mut profile = String::from("User profile:");
            if let Some(risk) = preferences.risk_tolerance {
                profile.push_str(&format!("\n- Risk tolerance: {}", risk));
            }
            if let Some(level) = preferences.expertise_level {
                profile.push_str(&format!("\n- Expertise level: {}", level));
            }
            sections.push(profile);
        }

        let recent = history.render_window(self.window);
        if !recent.is_empty() {
            sections.push(format!("Recent conversation:\n{}", recent));
        }

        sections.push(format!("User: {}", input));
        sections.join("\n\n")
    }
}

/// Prompt asking the model for follow-up questions about the last exchange.
pub fn follow_up_prompt(question: &str, answer: &str) -> String {
    format!(
        "{}\nReturn only the questions, one per line, without numbering.\n\n\
         User question: {}\n\nAdvisor answer: {}",
        FOLLOW_UP_INSTRUCTION, question, answer
    )
}

/// Extract at most [`MAX_FOLLOW_UPS`] questions from a model reply.
pub fn parse_follow_ups(text: &str) -> Vec<String> {
    text.lines()
        .map(strip_list_marker)
        .filter(|line| !line.is_empty())
        .take(MAX_FOLLOW_UPS)
        .map(str::to_string)
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    let line = line
        .strip_prefix(['-', '*', '•'])
        .map(str::trim_start)
        .unwrap_or(line);

    // "1." / "2)" style numbering; "2.5%" is not a marker
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(['.', ')']) {
            if rest.starts_with(char::is_whitespace) {
                return rest.trim_start();
            }
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExpertiseLevel, RiskTolerance, Turn};

    fn history(n: usize) -> Transcript {
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

    #[test]
    fn first_message_is_persona_plus_input() {
        let prompt = PromptBuilder::default().build(
            &Transcript::new(),
            &Preferences::default(),
            "How do I start budgeting?",
        );
        assert_eq!(
            prompt,
            format!("{}\n\nUser: How do I start budgeting?", FINANCE_PERSONA)
        );
    }

    #[test]
    fn preferences_are_interpolated_verbatim() {
        let prefs = Preferences {
            risk_tolerance: Some(RiskTolerance::Aggressive),
            expertise_level: Some(ExpertiseLevel::Beginner),
        };
        let prompt = PromptBuilder::default().build(&Transcript::new(), &prefs, "ETFs?");
        assert!(prompt.contains(
            "User profile:\n- Risk tolerance: Aggressive\n- Expertise level: Beginner"
        ));
    }

    #[test]
    fn only_set_preferences_appear() {
        let prefs = Preferences {
            risk_tolerance: None,
            expertise_level: Some(ExpertiseLevel::Advanced),
        };
        let prompt = PromptBuilder::default().build(&Transcript::new(), &prefs, "x");
        assert!(prompt.contains("- Expertise level: Advanced"));
        assert!(!prompt.contains("Risk tolerance"));
    }

    #[test]
    fn history_is_limited_to_window() {
        let prompt = PromptBuilder::new("P", 5).build(&history(9), &Preferences::default(), "next");
        assert_eq!(
            prompt,
            "P\n\nRecent conversation:\nuser: q4\nassistant: a5\nuser: q6\nassistant: a7\nuser: q8\n\nUser: next"
        );
        assert!(!prompt.contains("a3"));
    }

    #[test]
    fn short_history_is_included_whole() {
        let prompt = PromptBuilder::new("P", 5).build(&history(2), &Preferences::default(), "go");
        assert!(prompt.contains("Recent conversation:\nuser: q0\nassistant: a1\n\nUser: go"));
    }

    #[test]
    fn section_order_is_persona_profile_history_input() {
        let prefs = Preferences {
            risk_tolerance: Some(RiskTolerance::Moderate),
            expertise_level: None,
        };
        let prompt = PromptBuilder::default().build(&history(1), &prefs, "and now?");
        let persona = prompt.find(FINANCE_PERSONA).unwrap();
        let profile = prompt.find("User profile:").unwrap();
        let recent = prompt.find("Recent conversation:").unwrap();
        let input = prompt.find("User: and now?").unwrap();
        assert!(persona < profile && profile < recent && recent < input);
    }

    #[test]
    fn follow_up_prompt_starts_with_instruction() {
        let prompt = follow_up_prompt("What is a Roth IRA?", "A retirement account.");
        assert!(prompt.starts_with(FOLLOW_UP_INSTRUCTION));
        assert!(prompt.contains("User question: What is a Roth IRA?"));
        assert!(prompt.contains("Advisor answer: A retirement account."));
    }

    #[test]
    fn parses_follow_ups_and_strips_markers() {
        let parsed = parse_follow_ups(
            "1. What is compounding?\n\n- How big should savings be?\n* Are bonds safe?\n2) Extra one?",
        );
        assert_eq!(
            parsed,
            vec![
                "What is compounding?",
                "How big should savings be?",
                "Are bonds safe?"
            ]
        );
    }

    #[test]
    fn numbers_without_separator_are_kept() {
        assert_eq!(
            parse_follow_ups("401k limits this year?"),
            vec!["401k limits this year?"]
        );
    }

    #[test]
    fn leading_decimals_are_not_list_markers() {
        assert_eq!(
            parse_follow_ups("2.5% APY good?\n3) Is 4.0 GPA relevant?"),
            vec!["2.5% APY good?", "Is 4.0 GPA relevant?"]
        );
    }
}
