//! Candidate selection through a chat model.
//!
//! The model sees the issue and the ranked candidate paths and must answer
//! with one of them. Its answer is normalized and checked for membership;
//! anything outside the candidate set is a [`CoreError::SelectionIntegrity`].

use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;

use scout_llm::{ChatProvider, Message, RetryPolicy, call_with_retry};

use crate::error::{CoreError, Result};

/// A ranked retrieval result offered to the selector.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub path: String,
    pub content: String,
    pub distance: f32,
}

/// Build the single-turn selection prompt.
#[must_use]
pub fn selection_prompt(issue: &str, candidates: &[Candidate]) -> String {
    let mut files = String::new();
    for candidate in candidates {
        let _ = writeln!(files, "- {}", candidate.path);
    }
    format!(
        "Given this issue description:\n{issue}\n\nAnd these available files:\n{files}\n\
         Which single file is most likely to need changes? \
         Respond with just the file path, nothing else."
    )
}

/// Reduce a model reply to the bare path it names.
///
/// Takes the first non-empty line outside a code fence, then strips
/// surrounding backticks and quotes and a leading `- ` or `./`.
#[must_use]
pub fn normalize_choice(response: &str) -> &str {
    let line = response
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with("```"))
        .unwrap_or("");
    let mut choice = line.trim_matches(|c| matches!(c, '`' | '"' | '\'')).trim();
    if let Some(rest) = choice.strip_prefix("- ") {
        choice = rest.trim_start();
    }
    choice = choice.trim_matches(|c| matches!(c, '`' | '"' | '\''));
    choice.strip_prefix("./").unwrap_or(choice)
}

pub struct Selector<C> {
    provider: Arc<C>,
    retry: RetryPolicy,
}

impl<C: ChatProvider> Selector<C> {
    #[must_use]
    pub fn new(provider: Arc<C>) -> Self {
        Self {
            provider,
            retry: RetryPolicy {
                timeout: Duration::from_secs(120),
                ..RetryPolicy::default()
            },
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Ask the chat model which candidate is most relevant to `issue`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoRelevantFile`] for an empty candidate list,
    /// [`CoreError::SelectionIntegrity`] when the answer is not a candidate
    /// path, or the provider error once retries are spent.
    pub async fn select(&self, issue: &str, candidates: &[Candidate]) -> Result<String> {
        if candidates.is_empty() {
            return Err(CoreError::NoRelevantFile);
        }

        let messages = [Message::user(selection_prompt(issue, candidates))];
        let response = call_with_retry("candidate selection", &self.retry, || {
            self.provider.chat(&messages)
        })
        .await?;

        let choice = normalize_choice(&response);
        tracing::info!(
            provider = self.provider.name(),
            selected = choice,
            "selector answered"
        );

        candidates
            .iter()
            .find(|c| c.path == choice)
            .map(|c| c.path.clone())
            .ok_or_else(|| CoreError::SelectionIntegrity {
                returned: choice.to_owned(),
                candidates: candidates.len(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use scout_llm::mock::MockProvider;

    fn candidates(paths: &[&str]) -> Vec<Candidate> {
        paths
            .iter()
            .enumerate()
            .map(|(i, p)| Candidate {
                path: (*p).to_string(),
                content: String::new(),
                #[allow(clippy::cast_precision_loss)]
                distance: i as f32 * 0.1,
            })
            .collect()
    }

    #[test]
    fn prompt_lists_candidates_in_rank_order() {
        let prompt = selection_prompt("login fails", &candidates(&["auth.py", "db.py"]));
        assert!(prompt.starts_with("Given this issue description:\nlogin fails\n"));
        assert!(prompt.contains("- auth.py\n- db.py\n"));
        assert!(prompt.find("auth.py") < prompt.find("db.py"));
        assert!(prompt.ends_with("Respond with just the file path, nothing else."));
    }

    #[test]
    fn normalize_strips_decorations() {
        assert_eq!(normalize_choice("  src/auth.py \n"), "src/auth.py");
        assert_eq!(normalize_choice("`src/auth.py`"), "src/auth.py");
        assert_eq!(normalize_choice("\"src/auth.py\""), "src/auth.py");
        assert_eq!(normalize_choice("- src/auth.py"), "src/auth.py");
        assert_eq!(normalize_choice("./src/auth.py"), "src/auth.py");
        assert_eq!(normalize_choice("- `./src/auth.py`"), "src/auth.py");
        assert_eq!(normalize_choice("```\nsrc/auth.py\n```"), "src/auth.py");
        assert_eq!(normalize_choice(""), "");
    }

    #[tokio::test]
    async fn select_returns_member_path() {
        let provider = Arc::new(MockProvider::with_responses(vec!["`db.py`".into()]));
        let selector = Selector::new(provider);

        let chosen = selector
            .select("slow queries", &candidates(&["auth.py", "db.py"]))
            .await
            .unwrap();

        assert_eq!(chosen, "db.py");
    }

    #[tokio::test]
    async fn select_rejects_path_outside_candidates() {
        let provider = Arc::new(MockProvider::with_responses(vec!["main.py".into()]));
        let selector = Selector::new(provider);

        let err = selector
            .select("crash", &candidates(&["auth.py", "db.py"]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CoreError::SelectionIntegrity { returned, candidates: 2 } if returned == "main.py"
        ));
    }

    #[tokio::test]
    async fn select_with_no_candidates_is_no_relevant_file() {
        let selector = Selector::new(Arc::new(MockProvider::default()));

        let err = selector.select("anything", &[]).await.unwrap_err();

        assert!(matches!(err, CoreError::NoRelevantFile));
    }

    #[tokio::test]
    async fn select_propagates_provider_failure() {
        let mut provider = MockProvider::default();
        provider.fail_chat = true;
        let selector = Selector::new(Arc::new(provider)).with_retry(RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        });

        let err = selector
            .select("crash", &candidates(&["a.py"]))
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Llm(_)));
    }

    proptest! {
        #[test]
        fn normalize_recovers_plain_paths(path in "[a-z][a-z0-9_/]{0,30}\\.(py|rs|go)") {
            for wrapped in [
                path.clone(),
                format!("`{path}`"),
                format!("- {path}"),
                format!("./{path}"),
                format!("  \"{path}\"  \n"),
            ] {
                prop_assert_eq!(normalize_choice(&wrapped), path.as_str());
            }
        }
    }
}
