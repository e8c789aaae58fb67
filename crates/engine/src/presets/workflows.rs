//! Graph definitions of the predefined workflows.

use serde_json::{Value, json};

use super::transforms::{ASSEMBLE_ANALYSIS, EXTRACT_PROFILE, FORMAT_EMAIL, FORMAT_FLASHCARDS};
use crate::models::{Edge, NodeDefinition, WorkflowDefinition};

pub const PROFILE_ANALYSIS: &str = "profile-analysis";
pub const INTERVIEW_FLASHCARDS: &str = "interview-flashcards";
pub const EMAIL_DRAFT: &str = "email-draft";
pub const COMPANY_RESEARCH: &str = "company-research";

fn transform(id: &str, function: &str) -> NodeDefinition {
    NodeDefinition::new(id, "transform").with_config(json!({ "transformFunction": function }))
}

fn llm(id: &str, prompt: &str) -> NodeDefinition {
    NodeDefinition::new(id, "llm").with_config(json!({ "prompt": prompt }))
}

/// A nested `llm` definition for a parallel node's `subNodes`.
fn sub_llm(id: &str, prompt: &str) -> Value {
    json!({ "id": id, "type": "llm", "config": { "prompt": prompt } })
}

fn parallel(id: &str, sub_nodes: Vec<Value>) -> NodeDefinition {
    NodeDefinition::new(id, "parallel").with_config(json!({ "subNodes": sub_nodes }))
}

/// clean → normalize → sort → extract → {icebreakers, questions,
/// talkingPoints} → assemble
pub fn profile_analysis() -> WorkflowDefinition {
    WorkflowDefinition::new(
        vec![
            transform("clean", "clean-text").start(),
            transform("normalize", "normalize-dates"),
            transform("sort", "sort-by-relevance"),
            transform("extract", EXTRACT_PROFILE),
            parallel(
                "generate",
                vec![
                    sub_llm(
                        "icebreakers",
                        "Write three short, specific conversation openers for {{name}} \
                         ({{headline}}). Recent experience: {{experiences}}. Recent posts: \
                         {{posts}}. Respond with JSON: {\"icebreakers\": [string]}.",
                    ),
                    sub_llm(
                        "questions",
                        "Suggest five thoughtful questions to ask {{name}} about their work. \
                         Experience: {{experiences}}. Skills: {{skills}}. Respond with JSON: \
                         {\"questions\": [string]}.",
                    ),
                    sub_llm(
                        "talkingPoints",
                        "List talking points shared between the reader (aiming for \
                         {{targetRole}}) and {{name}}. About: {{about}}. Experience: \
                         {{experiences}}. Respond with JSON: {\"talkingPoints\": [string]}.",
                    ),
                ],
            ),
            transform("assemble", ASSEMBLE_ANALYSIS).end(),
        ],
        vec![
            Edge::new("clean", "normalize"),
            Edge::new("normalize", "sort"),
            Edge::new("sort", "extract"),
            Edge::new("extract", "generate"),
            Edge::new("generate", "assemble"),
        ],
    )
    .with_description("Icebreakers, questions and talking points for a scraped profile")
}

/// clean → has-experience? → detailed | basic → format
pub fn interview_flashcards() -> WorkflowDefinition {
    WorkflowDefinition::new(
        vec![
            transform("clean", "clean-text").start(),
            NodeDefinition::new("check", "decision")
                .with_config(json!({ "condition": "input.experiences.length > 0" })),
            llm(
                "detailed",
                "Create interview flashcards for a conversation with {{name}} ({{headline}}). \
                 Base them on this experience: {{experiences}}. Respond with JSON: \
                 {\"flashcards\": [{\"question\": string, \"answer\": string}]}.",
            ),
            llm(
                "basic",
                "Create general interview flashcards for someone meeting {{name}} \
                 ({{headline}}). Respond with JSON: {\"flashcards\": [{\"question\": string, \
                 \"answer\": string}]}.",
            ),
            transform("format", FORMAT_FLASHCARDS).end(),
        ],
        vec![
            Edge::new("clean", "check"),
            Edge::new("check", "detailed").when("input.decision"),
            Edge::new("check", "basic").when("!input.decision"),
            Edge::new("detailed", "format"),
            Edge::new("basic", "format"),
        ],
    )
    .with_description("Interview flashcards, detailed when work history is available")
}

/// clean → sort → draft → format
pub fn email_draft() -> WorkflowDefinition {
    WorkflowDefinition::new(
        vec![
            transform("clean", "clean-text").start(),
            transform("sort", "sort-by-relevance"),
            llm(
                "draft",
                "Draft a concise, friendly outreach email from {{senderName}} to {{name}} \
                 ({{headline}}) about {{purpose}}. Mention one relevant item from \
                 {{experiences}}. Respond with JSON: {\"subject\": string, \"body\": string}.",
            ),
            transform("format", FORMAT_EMAIL).end(),
        ],
        vec![
            Edge::new("clean", "sort"),
            Edge::new("sort", "draft"),
            Edge::new("draft", "format"),
        ],
    )
    .with_description("Personalised outreach email draft")
}

/// clean → {overview, culture} → assemble
pub fn company_research() -> WorkflowDefinition {
    WorkflowDefinition::new(
        vec![
            transform("clean", "clean-text").start(),
            parallel(
                "research",
                vec![
                    sub_llm(
                        "overview",
                        "Summarise what {{company}} does in a few bullet points, using this \
                         page text: {{about}}. Respond with JSON: {\"overview\": [string]}.",
                    ),
                    sub_llm(
                        "culture",
                        "Describe the culture and values of {{company}} as bullet points, \
                         using this page text: {{about}}. Respond with JSON: \
                         {\"culture\": [string]}.",
                    ),
                ],
            ),
            transform("assemble", ASSEMBLE_ANALYSIS).end(),
        ],
        vec![Edge::new("clean", "research"), Edge::new("research", "assemble")],
    )
    .with_description("Company overview and culture notes")
}

/// Every predefined workflow with the name it is registered under.
pub fn all() -> Vec<(&'static str, WorkflowDefinition)> {
    vec![
        (PROFILE_ANALYSIS, profile_analysis()),
        (INTERVIEW_FLASHCARDS, interview_flashcards()),
        (EMAIL_DRAFT, email_draft()),
        (COMPANY_RESEARCH, company_research()),
    ]
}
