//! Predefined career-networking workflows.
//!
//! [`install`] registers the domain transforms and builds every workflow in
//! [`workflows::all`] on an existing [`Engine`].

pub mod transforms;
pub mod workflows;

pub use workflows::{COMPANY_RESEARCH, EMAIL_DRAFT, INTERVIEW_FLASHCARDS, PROFILE_ANALYSIS};

use tracing::debug;

use crate::{Engine, ValidationError};

/// Register the domain transforms, then create every predefined workflow.
///
/// # Errors
/// A [`ValidationError`] if a definition no longer matches the engine's
/// node-type registry (for example a built-in type was replaced).
pub fn install(engine: &mut Engine) -> Result<(), ValidationError> {
    engine.register_transform(transforms::EXTRACT_PROFILE, transforms::extract_profile);
    engine.register_transform(transforms::ASSEMBLE_ANALYSIS, transforms::assemble_analysis);
    engine.register_transform(transforms::FORMAT_FLASHCARDS, transforms::format_flashcards);
    engine.register_transform(transforms::FORMAT_EMAIL, transforms::format_email);

    for (name, definition) in workflows::all() {
        engine.create_workflow(name, &definition)?;
        debug!(workflow = name, "predefined workflow installed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExecutionStatus;
    use async_trait::async_trait;
    use nodes::{LlmCaller, LlmRequest, LlmResponse, OrchestrationContext};
    use parking_lot::Mutex;
    use serde_json::{Value, json};
    use std::sync::Arc;

    /// Answers by keyword match on the prompt and records every prompt.
    struct ScriptedLlm {
        script: Vec<(&'static str, Result<&'static str, &'static str>)>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        fn new(script: Vec<(&'static str, Result<&'static str, &'static str>)>) -> Arc<Self> {
            Arc::new(Self {
                script,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmCaller for ScriptedLlm {
        async fn call_llm(&self, request: LlmRequest) -> anyhow::Result<LlmResponse> {
            self.prompts.lock().push(request.prompt.clone());
            let (_, reply) = self
                .script
                .iter()
                .find(|(keyword, _)| request.prompt.contains(keyword))
                .ok_or_else(|| anyhow::anyhow!("unscripted prompt"))?;
            match reply {
                Ok(text) => Ok(LlmResponse::text(*text)),
                Err(msg) => Err(anyhow::anyhow!(*msg)),
            }
        }
    }

    fn engine() -> Engine {
        let mut engine = Engine::new();
        install(&mut engine).expect("predefined workflows are valid");
        engine
    }

    fn profile() -> Value {
        json!({
            "name": "  Ada   Lovelace ",
            "headline": "Analytical Engine programmer\u{200b}",
            "about": "Writes notes on engines …see more",
            "targetRole": "Engine programmer",
            "experiences": [
                { "title": "Translator", "company": "Taylor's", "startDate": "Jan 1842", "endDate": "1843" },
                { "title": "Engine programmer", "company": "Babbage", "startDate": "1843", "endDate": "Present" }
            ],
            "skills": ["mathematics", "poetry"]
        })
    }

    #[test]
    fn every_predefined_workflow_is_installed() {
        assert_eq!(
            engine().workflow_names(),
            vec![COMPANY_RESEARCH, EMAIL_DRAFT, INTERVIEW_FLASHCARDS, PROFILE_ANALYSIS]
        );
    }

    #[tokio::test]
    async fn profile_analysis_survives_one_failed_section() {
        let llm = ScriptedLlm::new(vec![
            ("conversation openers", Ok(r#"{"icebreakers": ["Loved your notes"]}"#)),
            ("thoughtful questions", Err("rate limited")),
            ("talking points", Ok("- Engines\n- Poetry")),
        ]);
        let services = OrchestrationContext::new().with_llm(llm.clone());

        let out = engine()
            .execute_workflow(PROFILE_ANALYSIS, profile(), services)
            .await
            .unwrap();

        let analysis = &out["assemble"];
        assert_eq!(analysis["icebreakers"], json!(["Loved your notes"]));
        assert_eq!(analysis["questions"], json!([]));
        assert_eq!(analysis["talkingPoints"], json!(["Engines", "Poetry"]));
        assert_eq!(analysis["warnings"], json!(["questions: rate limited"]));

        // Prompts see cleaned, sorted data: the matching role ranks first.
        let prompts = llm.prompts.lock();
        let opener = prompts
            .iter()
            .find(|p| p.contains("conversation openers"))
            .unwrap();
        assert!(opener.contains(r#""Ada Lovelace""#));
        let programmer = opener.find(r#""title":"Engine programmer""#).unwrap();
        let translator = opener.find(r#""title":"Translator""#).unwrap();
        assert!(programmer < translator);
    }

    #[tokio::test]
    async fn flashcards_route_on_experience() {
        let llm = ScriptedLlm::new(vec![
            ("Base them on this experience", Ok(r#"{"flashcards": [{"question": "Why engines?", "answer": "Poetry"}]}"#)),
            ("general interview flashcards", Ok("Q: Who are you?\nA: A reader")),
        ]);

        let engine = engine();
        let services = OrchestrationContext::new().with_llm(llm.clone());
        let out = engine
            .execute_workflow(INTERVIEW_FLASHCARDS, profile(), services.clone())
            .await
            .unwrap();
        assert_eq!(out["format"]["flashcards"][0]["question"], "Why engines?");

        let out = engine
            .execute_workflow(INTERVIEW_FLASHCARDS, json!({ "name": "Grace" }), services)
            .await
            .unwrap();
        assert_eq!(out["format"]["flashcards"][0]["answer"], "A reader");

        let records = engine.history();
        assert_eq!(records[0].skipped, vec!["basic"]);
        assert_eq!(records[1].skipped, vec!["detailed"]);
        assert!(records.iter().all(|r| r.status == ExecutionStatus::Completed));
    }

    #[tokio::test]
    async fn email_draft_failure_is_reported_with_cause() {
        let llm = ScriptedLlm::new(vec![("outreach email", Err("provider unavailable"))]);
        let services = OrchestrationContext::new().with_llm(llm);
        let engine = engine();

        let err = engine
            .execute_workflow(EMAIL_DRAFT, profile(), services)
            .await
            .unwrap_err();

        assert_eq!(err.node_id(), Some("draft"));
        assert_eq!(err.to_string(), "node 'draft' failed: provider unavailable");
        assert_eq!(engine.history()[0].status, ExecutionStatus::Failed);
    }

    #[tokio::test]
    async fn email_draft_formats_completion() {
        let llm = ScriptedLlm::new(vec![(
            "outreach email",
            Ok("Subject: Engines\nHello Ada, I enjoyed your notes."),
        )]);
        let services = OrchestrationContext::new().with_llm(llm);

        let mut input = profile();
        input["senderName"] = json!("Charles");
        input["purpose"] = json!("a coffee chat");
        let out = engine()
            .execute_workflow(EMAIL_DRAFT, input, services)
            .await
            .unwrap();

        assert_eq!(out["format"]["subject"], "Engines");
        assert_eq!(out["format"]["wordCount"], 6);
    }

    #[tokio::test]
    async fn company_research_assembles_sections() {
        let llm = ScriptedLlm::new(vec![
            ("Summarise what", Ok(r#"{"overview": ["Builds engines"]}"#)),
            ("culture and values", Ok(r#"{"culture": ["Curious"]}"#)),
        ]);
        let services = OrchestrationContext::new().with_llm(llm);

        let out = engine()
            .execute_workflow(
                COMPANY_RESEARCH,
                json!({ "company": "Babbage & Co", "about": "We build engines." }),
                services,
            )
            .await
            .unwrap();

        assert_eq!(
            out["assemble"],
            json!({ "overview": ["Builds engines"], "culture": ["Curious"], "warnings": [] })
        );
    }
}
