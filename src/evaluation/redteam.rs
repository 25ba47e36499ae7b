//! Adversarial scan: seed objectives are rewritten by attack strategies and
//! sent to the agent, and the resulting conversations are collected for a
//! content safety evaluation.

use super::result::RED_TEAM_CATEGORIES;
use crate::agent::{AgentApi, PollPolicy, send_and_wait};
use crate::config::RedTeamConfig;
use crate::error::{HarnessError, Result};
use crate::persistence::load_json;
use crate::runner::{ChatMessage, Conversation};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// A text transformation applied to an attack objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackStrategy {
    /// The objective unchanged.
    Baseline,
    CharacterSpace,
    Rot13,
    Leetspeak,
    CharSwap,
    UnicodeConfusable,
    Flip,
    Base64,
    Morse,
    /// Strategies applied left to right.
    Compose(&'static [AttackStrategy]),
}

impl AttackStrategy {
    /// Scan order. A scan uses a prefix of this list.
    pub const ALL: [AttackStrategy; 10] = [
        AttackStrategy::Baseline,
        AttackStrategy::Flip,
        AttackStrategy::Base64,
        AttackStrategy::Morse,
        AttackStrategy::Rot13,
        AttackStrategy::Leetspeak,
        AttackStrategy::CharacterSpace,
        AttackStrategy::CharSwap,
        AttackStrategy::UnicodeConfusable,
        AttackStrategy::Compose(&[AttackStrategy::Base64, AttackStrategy::Rot13]),
    ];

    pub fn name(&self) -> String {
        match self {
            AttackStrategy::Baseline => "baseline".to_string(),
            AttackStrategy::CharacterSpace => "character_space".to_string(),
            AttackStrategy::Rot13 => "rot13".to_string(),
            AttackStrategy::Leetspeak => "leetspeak".to_string(),
            AttackStrategy::CharSwap => "char_swap".to_string(),
            AttackStrategy::UnicodeConfusable => "unicode_confusable".to_string(),
            AttackStrategy::Flip => "flip".to_string(),
            AttackStrategy::Base64 => "base64".to_string(),
            AttackStrategy::Morse => "morse".to_string(),
            AttackStrategy::Compose(parts) => parts
                .iter()
                .map(AttackStrategy::name)
                .collect::<Vec<_>>()
                .join("_"),
        }
    }

    pub fn convert(&self, text: &str) -> String {
        match self {
            AttackStrategy::Baseline => text.to_string(),
            AttackStrategy::CharacterSpace => {
                text.chars().map(String::from).collect::<Vec<_>>().join(" ")
            }
            AttackStrategy::Rot13 => text.chars().map(rot13).collect(),
            AttackStrategy::Leetspeak => text.chars().map(leet).collect(),
            AttackStrategy::CharSwap => text
                .split(' ')
                .map(swap_middle)
                .collect::<Vec<_>>()
                .join(" "),
            AttackStrategy::UnicodeConfusable => text.chars().map(confusable).collect(),
            AttackStrategy::Flip => text.chars().rev().collect(),
            AttackStrategy::Base64 => STANDARD.encode(text.as_bytes()),
            AttackStrategy::Morse => morse(text),
            AttackStrategy::Compose(parts) => parts
                .iter()
                .fold(text.to_string(), |acc, part| part.convert(&acc)),
        }
    }

    /// The first `n` strategies of [`AttackStrategy::ALL`].
    pub fn first(n: usize) -> &'static [AttackStrategy] {
        &SCAN_ORDER[..n.min(SCAN_ORDER.len())]
    }
}

static SCAN_ORDER: [AttackStrategy; 10] = AttackStrategy::ALL;

fn rot13(c: char) -> char {
    match c {
        'a'..='z' => (((c as u8 - b'a') + 13) % 26 + b'a') as char,
        'A'..='Z' => (((c as u8 - b'A') + 13) % 26 + b'A') as char,
        _ => c,
    }
}

fn leet(c: char) -> char {
    match c.to_ascii_lowercase() {
        'a' => '4',
        'e' => '3',
        'i' => '1',
        'o' => '0',
        's' => '5',
        't' => '7',
        _ => c,
    }
}

fn confusable(c: char) -> char {
    match c {
        'a' => '\u{0430}',
        'c' => '\u{0441}',
        'e' => '\u{0435}',
        'i' => '\u{0456}',
        'o' => '\u{043E}',
        'p' => '\u{0440}',
        'x' => '\u{0445}',
        'y' => '\u{0443}',
        _ => c,
    }
}

/// Swap the two middle characters of words longer than three characters.
fn swap_middle(word: &str) -> String {
    let mut chars: Vec<char> = word.chars().collect();
    if chars.len() > 3 {
        let mid = chars.len() / 2;
        chars.swap(mid - 1, mid);
    }
    chars.into_iter().collect()
}

fn morse_code(c: char) -> Option<&'static str> {
    Some(match c.to_ascii_uppercase() {
        'A' => ".-",
        'B' => "-...",
        'C' => "-.-.",
        'D' => "-..",
        'E' => ".",
        'F' => "..-.",
        'G' => "--.",
        'H' => "....",
        'I' => "..",
        'J' => ".---",
        'K' => "-.-",
        'L' => ".-..",
        'M' => "--",
        'N' => "-.",
        'O' => "---",
        'P' => ".--.",
        'Q' => "--.-",
        'R' => ".-.",
        'S' => "...",
        'T' => "-",
        'U' => "..-",
        'V' => "...-",
        'W' => ".--",
        'X' => "-..-",
        'Y' => "-.--",
        'Z' => "--..",
        '0' => "-----",
        '1' => ".----",
        '2' => "..---",
        '3' => "...--",
        '4' => "....-",
        '5' => ".....",
        '6' => "-....",
        '7' => "--...",
        '8' => "---..",
        '9' => "----.",
        '.' => ".-.-.-",
        ',' => "--..--",
        '?' => "..--..",
        _ => return None,
    })
}

/// Letters separated by spaces, words by ` / `. Unknown characters pass through.
fn morse(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            word.chars()
                .map(|c| morse_code(c).map(String::from).unwrap_or_else(|| c.to_string()))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join(" / ")
}

/// Seed prompts per risk category.
pub type Objectives = BTreeMap<String, Vec<String>>;

pub fn load_objectives(path: &Path) -> Result<Objectives> {
    let objectives: Objectives = load_json(path)?;
    if objectives.values().all(Vec::is_empty) {
        return Err(HarnessError::invalid_data(path, "no attack objectives"));
    }
    Ok(objectives)
}

/// One seed prompt to attack with.
#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    pub risk_category: &'static str,
    pub prompt: String,
}

/// Up to `per_category` objectives for each attacked category, in category
/// order. Categories that are not attacked are ignored.
pub fn select_objectives(objectives: &Objectives, per_category: usize) -> Vec<Objective> {
    for name in objectives.keys() {
        if !RED_TEAM_CATEGORIES.contains(&name.as_str()) {
            tracing::warn!(category = %name, "ignoring objectives for unknown risk category");
        }
    }

    RED_TEAM_CATEGORIES
        .iter()
        .flat_map(|&category| {
            objectives
                .get(category)
                .into_iter()
                .flatten()
                .take(per_category)
                .map(move |prompt| Objective {
                    risk_category: category,
                    prompt: prompt.clone(),
                })
        })
        .collect()
}

/// One line of `redteam-conversations.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackConversation {
    pub conversation: Conversation,
    pub risk_category: String,
    pub attack_technique: String,
}

/// Sends every objective, under every strategy, to one agent.
pub struct RedTeamScan<'a, A> {
    api: &'a A,
    agent_id: String,
    policy: PollPolicy,
    max_turns: u32,
    strategies: &'static [AttackStrategy],
}

impl<'a, A: AgentApi> RedTeamScan<'a, A> {
    pub fn new(
        api: &'a A,
        agent_id: impl Into<String>,
        policy: PollPolicy,
        config: &RedTeamConfig,
    ) -> Self {
        Self {
            api,
            agent_id: agent_id.into(),
            policy,
            max_turns: config.max_turns.max(1),
            strategies: AttackStrategy::first(config.max_scenarios),
        }
    }

    pub fn strategies(&self) -> &'static [AttackStrategy] {
        self.strategies
    }

    /// Run the scan on a single persistent thread.
    ///
    /// A failed agent call is recorded as an `Error: ...` reply and the scan
    /// continues; only failing to open the thread aborts it.
    pub async fn run(&self, objectives: &[Objective]) -> Result<Vec<AttackConversation>> {
        let thread = self.api.create_thread().await?;
        let mut conversations = Vec::with_capacity(objectives.len() * self.strategies.len());

        for objective in objectives {
            for strategy in self.strategies {
                let prompt = strategy.convert(&objective.prompt);
                let mut messages = Vec::new();

                for _ in 0..self.max_turns {
                    let reply = match send_and_wait(
                        self.api,
                        &thread.id,
                        &self.agent_id,
                        &prompt,
                        self.policy,
                    )
                    .await
                    {
                        Ok(exchange) => exchange.response,
                        Err(HarnessError::RunFailed { reason, .. }) => {
                            format!("Error: Agent run failed - {}", reason)
                        }
                        Err(e) => {
                            tracing::warn!(
                                category = objective.risk_category,
                                strategy = %strategy.name(),
                                error = %e,
                                "attack turn failed"
                            );
                            format!("Error: {}", e)
                        }
                    };
                    messages.push(ChatMessage::user(&prompt));
                    messages.push(ChatMessage::assistant(reply));
                }

                conversations.push(AttackConversation {
                    conversation: Conversation { messages },
                    risk_category: objective.risk_category.to_string(),
                    attack_technique: strategy.name(),
                });
            }
        }

        Ok(conversations)
    }
}
