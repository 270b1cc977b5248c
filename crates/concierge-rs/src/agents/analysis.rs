//! Analysis reports and comparisons. Both answer in structured Markdown.

use crate::agent::llm_agent::LlmAgent;
use crate::agent::state::INPUT_KEY;

pub const ANALYSIS_AGENT: &str = "analysis_specialist";
pub const COMPARISON_AGENT: &str = "comparison_specialist";
pub const ANALYSIS_KEY: &str = "analysis_result";
pub const COMPARISON_KEY: &str = "comparison_result";

/// Analysis type used when the caller gives none.
pub const DEFAULT_ANALYSIS_TYPE: &str = "general";

const ANALYSIS_INSTRUCTION: &str = "\
You are a data analyst. Analyze the user's content and answer in Japanese with this Markdown structure:

## 分析結果サマリー
3-5 key findings.

## 詳細分析
### 1. データ概要
### 2. 主要な傾向
### 3. 統計的分析
### 4. 課題と機会

## 推奨事項
### 優先度: 高
### 優先度: 中
### 優先度: 低

## 次のステップ
Concrete actions.

Base every claim on the content given. Say so when the data is insufficient.";

const COMPARISON_INSTRUCTION: &str = "\
You compare options objectively. Identify the options in the user's request and answer in Japanese:

## 比較対象
## 評価基準
A Markdown table scoring each option per criterion (1-5).
## 長所と短所
Per option.
## 用途別のおすすめ
## 結論

Stay neutral and state the assumptions behind each score.";

/// Structured analysis report under `analysis_result`.
///
/// `analysis_type` (for example `trend`, `sentiment`, `general`) is passed
/// to the model as the focus of the report.
pub fn analysis_agent(analysis_type: &str) -> LlmAgent {
    let analysis_type = match analysis_type.trim() {
        "" => DEFAULT_ANALYSIS_TYPE,
        t => t,
    };
    LlmAgent::new(ANALYSIS_AGENT, ANALYSIS_KEY)
        .description("Structured analysis reports with prioritized recommendations")
        .instruction(format!("{ANALYSIS_INSTRUCTION}\n\nAnalysis type: {analysis_type}"))
        .reads([INPUT_KEY])
        .temperature(0.3)
}

/// Option comparison under `comparison_result`.
pub fn comparison_agent() -> LlmAgent {
    LlmAgent::new(COMPARISON_AGENT, COMPARISON_KEY)
        .description("Objective comparison of options")
        .instruction(COMPARISON_INSTRUCTION)
        .reads([INPUT_KEY])
        .temperature(0.3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::config::AgentDefaults;
    use crate::agent::state::SessionState;

    #[test]
    fn analysis_type_reaches_the_prompt() {
        let state = SessionState::with_input("売上データ");
        let prompt = analysis_agent("trend").system_prompt(&state, &AgentDefaults::default());
        assert!(prompt.contains("Analysis type: trend"));
        assert!(prompt.contains("## 推奨事項"));

        let prompt = analysis_agent("  ").system_prompt(&state, &AgentDefaults::default());
        assert!(prompt.ends_with("Analysis type: general"));
    }

    #[test]
    fn comparison_writes_its_own_key() {
        let agent = comparison_agent();
        assert_eq!(agent.output_key, COMPARISON_KEY);
        assert_eq!(agent.temperature, Some(0.3));
    }
}
