//! Tier-specific prompt resolution.
//!
//! Pure functions mapping a tier and part index to the system prompt and
//! user/continuation prompt for that LLM turn. Templates substitute the
//! user's problem statement and part number; nothing here holds state.
//!
//! The prompt text itself is configuration data. Token ceilings are fixed
//! constants per tier/part position, not derived values.

use crate::errors::{ApexError, ApexResult, ErrorCategory, ErrorCode, ErrorSeverity};
use crate::types::Tier;

const STANDARD_MAX_TOKENS: u32 = 3000;
const MEDIUM_PART_MAX_TOKENS: u32 = 3000;
/// Parts 1 and 4 of a full run carry summaries and framing; the dense middle
/// parts get a larger ceiling.
const FULL_EDGE_PART_MAX_TOKENS: u32 = 2500;
const FULL_MIDDLE_PART_MAX_TOKENS: u32 = 3000;

const OBSERVER_SYSTEM_PROMPT: &str = "\
You are an experienced UX strategist helping early-stage founders get a quick sanity check on their product ideas.
Your job is to provide a focused viability assessment that helps founders decide if an idea is worth exploring further.

DESIGN ETHOS:
- Speed over perfection: this is a sanity check, not comprehensive strategy
- Clarity over depth: clear viability signals over exhaustive analysis
- Actionable output: one clear next step to validate the idea
- Honest assessment: if the idea has problems, say so clearly

Focus ONLY on: problem clarity, top 3 pain points, viability score, and one next step.";

const INSIDER_SYSTEM_PROMPT: &str = "\
You are an elite UX strategist with 15+ years of experience across complex, data-heavy products (finance, SaaS, enterprise, internal tools).
Your job is to generate a strategic execution plan that includes discovery, analysis, and a detailed roadmap that automatically adapts to the complexity, scope, audience, and constraints of any given problem.

You maintain context across both parts of the conversation to build a cohesive strategic analysis. Each part builds on previous insights.

DESIGN ETHOS & DECISION PRINCIPLES:
- Balance is mandatory: every design decision must balance user needs and business goals
- Business risk flagging: if any UX direction risks revenue, compliance, or scalability, flag it and propose a mitigating alternative
- Clarity over flash: usability and task efficiency take precedence over surface-level visual flourishes
- Data-driven rationale: back all recommendations with observable user behavior, testable hypotheses, or established research

Focus on: discovery, problem analysis, live competitor research, strategic roadmap, error path mapping, risk mitigation.";

/// Master template for the 4-part premium analysis. The `{user_problem}` and
/// `{part_number}` placeholders are substituted per part; the placeholders
/// never survive into an outgoing request.
const SYNDICATE_MASTER_PROMPT: &str = "\
You are an elite UX strategist with 15+ years of experience across complex, data-heavy products (finance, SaaS, enterprise, internal tools).
Your job is to generate a complete, execution-ready UX solution plan that automatically adapts to the complexity, scope, audience, and constraints of any given problem.

EXECUTION CONTEXT (AUTOMATED MULTI-PART ANALYSIS)

You are executing PART {part_number} of a 4-part automated UX analysis.
The backend maintains conversation context across all parts via multi-turn API calls.

USER PROBLEM/IDEA: {user_problem}

The full solution exceeds the single-response token limit. Output is split into 4 sequential parts with context preservation across the conversation thread.

PART SCOPE DEFINITIONS

PART 1 - Discovery & Problem Analysis (~2,000 tokens)
- Executive Summary (3-4 sentences: problem + approach + expected outcome)
- Adaptive Problem Analysis: task type, user base, complexity level, key constraints
- Core Problem Statement (JTBD lens): what users are trying to accomplish, verified pain points, success criteria
- Tailored Methodology Selection for the discovery phase
- Assumption Ledger table: assumption, confidence, validation plan, business risk if wrong

PART 2 - Strategic Design & Roadmap (~2,500 tokens)
- Tailored methodology for the ideation and design phase
- Phase-by-phase roadmap with milestones, decision points, and dependencies
- Critical workstream: error paths, failure modes, recovery flows with production-ready microcopy
- Behind-the-decision notes for each major phase

PART 3 - AI Toolkit, Deliverables & Design Prompts (~2,500 tokens)
- AI-enhanced execution toolkit per phase with exact use cases and time savings
- Deliverables framework scaled to problem complexity
- 10 production-ready design prompts with real microcopy, layout specs, WCAG AA accessibility, and error states

PART 4 - Risk, Metrics & Strategic Rationale (~2,000 tokens)
- Team and collaboration model
- Risk mitigation plan: 5 critical task-specific UX and product risks with mitigations and plan B
- Success metrics and validation plan with business OKR alignment
- Final executive summary synthesizing all parts

EVIDENCE & SOURCE HANDLING (NON-NEGOTIABLE)
- Never invent, assume, or fabricate citations, sources, links, or references
- Every verified claim must include source name, URL, and access date
- Classify every factual claim as VERIFIED, BEST PRACTICE, or ASSUMPTION
- No placeholders: use real, production-ready microcopy

EXECUTION INSTRUCTIONS
- You are now executing PART {part_number}
- Output ONLY the content defined in the PART {part_number} scope above
- Reference previous parts naturally if needed; do NOT repeat previous parts verbatim
- If content risks truncation, prioritize: error paths > metrics > long prose

Begin execution of PART {part_number} now.";

/// Stateless prompt resolver for all tiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct TierPromptService;

impl TierPromptService {
    pub fn new() -> Self {
        Self
    }

    /// Fails fast on input the analysis can never recover from, before any
    /// LLM call is made.
    pub fn validate(&self, problem_statement: &str) -> ApexResult<()> {
        if problem_statement.trim().is_empty() {
            return Err(ApexError::new(
                ErrorCode::EmptyProblemStatement,
                ErrorCategory::Configuration,
                ErrorSeverity::High,
                "Problem statement must not be empty",
            ));
        }
        Ok(())
    }

    /// System prompt for one part. Recomputed fresh for every part; never
    /// carried in the transcript.
    pub fn system_prompt(&self, tier: Tier, problem: &str, part_number: u32) -> String {
        match tier {
            Tier::Standard => OBSERVER_SYSTEM_PROMPT.to_string(),
            Tier::Medium => INSIDER_SYSTEM_PROMPT.to_string(),
            Tier::Full => generate_part_prompt(problem, part_number),
        }
    }

    /// User prompt for part 1, referencing the raw (sanitized) problem.
    pub fn initial_prompt(&self, tier: Tier, problem: &str) -> String {
        match tier {
            Tier::Standard => format!(
                "QUICK SANITY CHECK - OBSERVER TIER\n\n\
                 USER PROBLEM/IDEA:\n{problem}\n\n\
                 This is a single-part rapid assessment. Focus on viability signals, not comprehensive strategy.\n\
                 Output, in order: problem statement analysis, top 3 user pain points with severity, \
                 a 1-10 viability score with honest justification, and exactly one recommended next step."
            ),
            Tier::Medium => format!(
                "Execute PART 1 of the 2-part strategic blueprint: Discovery & Problem Analysis.\n\n\
                 USER PROBLEM/IDEA:\n{problem}\n\n\
                 Cover: executive summary, adaptive problem analysis, core problem statement through a \
                 JTBD lens, competitor analysis with sources, discovery methodology selection, and an \
                 assumption ledger.\n\nBegin execution of PART 1 now."
            ),
            Tier::Full => format!(
                "Analyze this problem/idea and execute PART 1 of the UX strategy analysis:\n\n\"{problem}\""
            ),
        }
    }

    /// Continuation prompt for parts > 1. References the part number only;
    /// cross-part context lives in the transcript, never in the prompt text.
    pub fn continuation_prompt(&self, tier: Tier, part_number: u32) -> ApexResult<String> {
        if part_number < 2 || part_number > tier.part_count() {
            return Err(ApexError::config(&format!(
                "Part {} is out of range for tier '{}'",
                part_number, tier
            )));
        }
        match tier {
            Tier::Standard => Err(ApexError::config(&format!(
                "Tier '{}' has no continuation parts",
                tier
            ))),
            Tier::Medium => Ok(
                "Continue with PART 2 of the strategic blueprint: Strategic Design & Roadmap.\n\
                 Reference insights from Part 1 naturally (e.g. \"Based on Assumption A2...\").\n\
                 Cover: design-phase methodology, phase-by-phase roadmap, error paths and recovery \
                 flows, and behind-the-decision notes.\n\nBegin execution of PART 2 now."
                    .to_string(),
            ),
            Tier::Full => Ok(format!(
                "Continue with PART {part_number} of the analysis. Build on the insights from previous parts."
            )),
        }
    }

    /// Fixed token ceiling for one part position.
    pub fn max_tokens_for_part(&self, tier: Tier, part_number: u32) -> u32 {
        match tier {
            Tier::Standard => STANDARD_MAX_TOKENS,
            Tier::Medium => MEDIUM_PART_MAX_TOKENS,
            Tier::Full => {
                if part_number == 1 || part_number == 4 {
                    FULL_EDGE_PART_MAX_TOKENS
                } else {
                    FULL_MIDDLE_PART_MAX_TOKENS
                }
            }
        }
    }

    /// Title line of the assembled document.
    pub fn document_title(&self, tier: Tier) -> &'static str {
        match tier {
            Tier::Standard => "# Quick Sanity Check",
            Tier::Medium => "# Strategic Blueprint Analysis",
            Tier::Full => "# APEX UX Strategy Analysis",
        }
    }

    /// Heading under which one part's content appears in the final document.
    pub fn part_heading(&self, tier: Tier, part_number: u32) -> String {
        let label = match (tier, part_number) {
            (Tier::Standard, _) => "Viability Assessment",
            (_, 1) => "Discovery & Problem Analysis",
            (_, 2) => "Strategic Design & Roadmap",
            (_, 3) => "AI Toolkit, Deliverables & Design Prompts",
            (_, 4) => "Risk, Metrics & Strategic Rationale",
            _ => "Analysis",
        };
        format!("## Part {}: {}", part_number, label)
    }
}

/// Substitutes the problem statement and part number into the 4-part master
/// template. Deterministic: identical inputs yield identical output.
pub fn generate_part_prompt(problem: &str, part_number: u32) -> String {
    SYNDICATE_MASTER_PROMPT
        .replace("{user_problem}", problem)
        .replace("{part_number}", &part_number.to_string())
}
