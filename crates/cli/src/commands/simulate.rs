//! Offline replay of reaction changes through the pin policy.
//!
//! Each step mutates an in-memory tally, is evaluated exactly as a live gateway
//! event would be, and the resulting decision is applied to the simulated pin
//! flag.

use anyhow::{bail, Result};
use pinbot_core::policy::{
    evaluate, Decision, MessageState, ReactionChangeEvent, ReactionChangeKind, ReactionEmoji,
    ReactionTally,
};
use pinbot_discord::notifications::unpin_title;
use serde::Serialize;

use super::CommandResult;

const SIMULATED_JUMP_LINK: &str = "https://discord.com/channels/0/0/0";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReactionStep {
    pub kind: ReactionChangeKind,
    pub emoji: ReactionEmoji,
    pub literal: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub step: usize,
    pub change: String,
    pub decision: &'static str,
    pub pinned: bool,
    pub pushpins: u64,
    pub thumbs_down: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<&'static str>,
}

pub fn run(initially_pinned: bool, raw_steps: &[String]) -> CommandResult {
    let steps = match parse_steps(raw_steps) {
        Ok(steps) => steps,
        Err(error) => return CommandResult::failure("simulate", "invalid_step", error.to_string(), 2),
    };

    let reports = simulate(initially_pinned, &steps);
    let message = reports.iter().map(render_step).collect::<Vec<_>>().join("\n");
    CommandResult::success_with_details("simulate", message, &reports)
}

pub fn parse_steps(raw_steps: &[String]) -> Result<Vec<ReactionStep>> {
    raw_steps.iter().map(|raw| parse_step(raw)).collect()
}

pub fn parse_step(raw: &str) -> Result<ReactionStep> {
    let raw = raw.trim();
    let (kind, literal) = if let Some(rest) = raw.strip_prefix('+') {
        (ReactionChangeKind::Added, rest)
    } else if let Some(rest) = raw.strip_prefix('-') {
        (ReactionChangeKind::Removed, rest)
    } else {
        bail!("step `{raw}` must start with `+` (added) or `-` (removed)");
    };

    let literal = literal.trim();
    if literal.is_empty() {
        bail!("step `{raw}` does not name an emoji");
    }

    Ok(ReactionStep { kind, emoji: ReactionEmoji::from_literal(literal), literal: literal.to_string() })
}

pub fn simulate(initially_pinned: bool, steps: &[ReactionStep]) -> Vec<StepReport> {
    let mut state = MessageState {
        pinned: initially_pinned,
        tally: ReactionTally::new(),
        jump_link: SIMULATED_JUMP_LINK.to_string(),
    };

    steps
        .iter()
        .enumerate()
        .map(|(index, step)| {
            match step.kind {
                ReactionChangeKind::Added => state.tally.add(step.emoji, 1),
                ReactionChangeKind::Removed => state.tally.remove(step.emoji, 1),
            }

            let decision = evaluate(&ReactionChangeEvent { emoji: step.emoji, kind: step.kind }, &state);
            let mut notification = None;
            match decision {
                Decision::NoOp => {}
                Decision::Pin => state.pinned = true,
                Decision::Unpin(reason) => {
                    if state.pinned {
                        notification = Some(unpin_title(reason));
                    }
                    state.pinned = false;
                }
            }

            StepReport {
                step: index + 1,
                change: format!("{}{}", sign(step.kind), step.literal),
                decision: decision.label(),
                pinned: state.pinned,
                pushpins: state.tally.pushpins(),
                thumbs_down: state.tally.thumbs_down(),
                notification,
            }
        })
        .collect()
}

fn sign(kind: ReactionChangeKind) -> char {
    match kind {
        ReactionChangeKind::Added => '+',
        ReactionChangeKind::Removed => '-',
    }
}

fn render_step(report: &StepReport) -> String {
    let mut line = format!(
        "{}. {} -> {} (pinned={}, pushpins={}, thumbs_down={})",
        report.step,
        report.change,
        report.decision,
        report.pinned,
        report.pushpins,
        report.thumbs_down
    );
    if let Some(title) = report.notification {
        line.push_str(&format!(" notify: {title}"));
    }
    line
}
