//! Source provenance.
//!
//! Walks the final transcript's tool results and groups the evidence the
//! agents actually consulted, so the API response can cite where the
//! report came from.

use crate::agents::MARKET_SYNTHESIZER;
use crate::models::{AgentState, MessageRole};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceSummary {
    pub news: Vec<Value>,
    pub market: Vec<Value>,
    pub disclosures: Vec<Value>,
}

impl SourceSummary {
    pub fn is_empty(&self) -> bool {
        self.news.is_empty() && self.market.is_empty() && self.disclosures.is_empty()
    }
}

/// Collect the evidence cited by tool results in the transcript,
/// de-duplicated, in first-seen order. Unparseable or failed tool
/// results are skipped.
pub fn extract_sources(state: &AgentState) -> SourceSummary {
    let mut summary = SourceSummary::default();

    for msg in state.transcript.iter().filter(|m| m.role == MessageRole::Tool) {
        let Ok(output) = serde_json::from_str::<Value>(&msg.content) else {
            continue;
        };
        if output.get("success").and_then(Value::as_bool) == Some(false) {
            continue;
        }
        let data = output.get("data").unwrap_or(&output);

        if let Some(articles) = data.get("articles").and_then(Value::as_array) {
            push_unique(&mut summary.news, articles);
        } else if let Some(results) = data.get("results").and_then(Value::as_array) {
            // General web hits feed the same evidence list as news.
            push_unique(&mut summary.news, results);
        } else if let Some(documents) = data.get("documents").and_then(Value::as_array) {
            push_unique(&mut summary.disclosures, documents);
        } else if data.get("market_snapshot").is_some() || data.get("company").is_some() {
            let entry = data.clone();
            if !summary.market.contains(&entry) {
                summary.market.push(entry);
            }
        }
    }

    summary
}

fn push_unique(bucket: &mut Vec<Value>, items: &[Value]) {
    for item in items {
        if !bucket.contains(item) {
            bucket.push(item.clone());
        }
    }
}

/// The report to present: the write-once final report when set, otherwise
/// the synthesizer's latest message, otherwise the latest agent message.
pub fn final_report(state: &AgentState) -> String {
    if !state.final_report.is_empty() {
        return state.final_report.clone();
    }

    let from_agent = |name: Option<&str>| {
        state
            .transcript
            .iter()
            .rev()
            .filter(|m| m.role == MessageRole::Assistant)
            .find(|m| match name {
                Some(n) => m.agent.as_deref() == Some(n),
                None => m.agent.is_some(),
            })
            .map(|m| m.content.clone())
    };

    from_agent(Some(MARKET_SYNTHESIZER))
        .or_else(|| from_agent(None))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatMessage, ToolOutput};
    use serde_json::json;

    fn tool_msg(name: &str, output: &ToolOutput) -> ChatMessage {
        ChatMessage::tool_result("call-1", name, serde_json::to_string(output).unwrap())
    }

    #[test]
    fn groups_tool_results_by_kind() {
        let mut state = AgentState::new("Assess AAPL");
        state.transcript.push(tool_msg(
            "search_geopolitical_news",
            &ToolOutput::ok(json!({
                "query": "AAPL sanctions",
                "articles": [{ "title": "Export controls widen", "url": "https://example.com/a" }]
            })),
        ));
        state.transcript.push(tool_msg(
            "get_market_data",
            &ToolOutput::ok(json!({
                "ticker": "AAPL",
                "company": "Apple Inc.",
                "market_snapshot": { "current_price": 189.5 }
            })),
        ));
        state.transcript.push(tool_msg(
            "search_corporate_disclosures",
            &ToolOutput::ok(json!({
                "documents": [{ "source": "10-K", "company": "AAPL" }]
            })),
        ));

        let summary = extract_sources(&state);
        assert_eq!(summary.news.len(), 1);
        assert_eq!(summary.market.len(), 1);
        assert_eq!(summary.disclosures.len(), 1);
        assert_eq!(summary.market[0]["ticker"], "AAPL");
    }

    #[test]
    fn web_results_land_in_the_news_bucket_and_duplicates_collapse() {
        let article = json!({ "title": "Chip supply update", "url": "https://example.com/b" });
        let mut state = AgentState::new("q");
        state.transcript.push(tool_msg(
            "search_geopolitical_news",
            &ToolOutput::ok(json!({ "articles": [article] })),
        ));
        state.transcript.push(tool_msg(
            "search_web_general",
            &ToolOutput::ok(json!({ "results": [article] })),
        ));

        let summary = extract_sources(&state);
        assert_eq!(summary.news.len(), 1);
    }

    #[test]
    fn failed_and_malformed_results_are_skipped() {
        let mut state = AgentState::new("q");
        state.transcript.push(tool_msg(
            "search_geopolitical_news",
            &ToolOutput::failure("upstream down"),
        ));
        state
            .transcript
            .push(ChatMessage::tool_result("call-2", "get_market_data", "not json"));

        assert!(extract_sources(&state).is_empty());
    }

    #[test]
    fn report_fallback_chain() {
        let mut state = AgentState::new("q");
        assert_eq!(final_report(&state), "");

        state.transcript.push(ChatMessage::assistant(
            Some("geopolitical_analyst"),
            "geo brief",
        ));
        assert_eq!(final_report(&state), "geo brief");

        state.transcript.push(ChatMessage::assistant(
            Some(MARKET_SYNTHESIZER),
            "synth summary",
        ));
        assert_eq!(final_report(&state), "synth summary");

        state.final_report = "═══ the report".to_string();
        assert_eq!(final_report(&state), "═══ the report");
    }
}
