//! Basic chat.

use crate::agent::llm_agent::LlmAgent;
use crate::agent::state::INPUT_KEY;

pub const CHAT_AGENT: &str = "basic_chat_agent";
pub const OUTPUT_KEY: &str = "response";

const INSTRUCTION: &str = "\
You are a friendly, knowledgeable assistant.
Answer in the language the user writes in (Japanese by default), be accurate and concise,
and use short Markdown lists when they make an answer easier to read.
If you are unsure, say so instead of guessing.";

/// The general-purpose conversation agent. Text output under `response`.
pub fn chat_agent() -> LlmAgent {
    LlmAgent::new(CHAT_AGENT, OUTPUT_KEY)
        .description("General conversation and questions")
        .instruction(INSTRUCTION)
        .reads([INPUT_KEY])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::config::AgentDefaults;
    use crate::agent::events::NoopHandler;
    use crate::agent::workflow::SequentialWorkflow;
    use crate::api::scripted::ScriptedBackend;

    #[tokio::test]
    async fn chat_runs_as_single_step() {
        let backend = ScriptedBackend::fixed("  こんにちは！  ").with_usage(12, 4);
        let workflow = SequentialWorkflow::single(chat_agent()).unwrap();
        let result = workflow
            .run(&backend, &AgentDefaults::default(), "やあ", &NoopHandler)
            .await
            .unwrap();

        assert_eq!(result.final_output(), "こんにちは！");
        assert_eq!(result.workflow, CHAT_AGENT);
        assert_eq!(result.total_tokens(), 16);

        let request = &backend.requests()[0];
        assert_eq!(request.user_prompt(), Some("やあ"));
        assert!(request.response_format.is_none());
    }
}
