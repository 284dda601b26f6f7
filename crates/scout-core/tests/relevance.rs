use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use scout_core::config::Config;
use scout_core::context::format_file_context;
use scout_core::{CoreError, RelevanceEngine, Selector};
use scout_index::IndexStore;
use scout_llm::RetryPolicy;
use scout_llm::mock::MockProvider;
use tempfile::TempDir;

const AUTH: &str = "def login(user, password):\n    return check(user, password)\n";
const DB: &str = "def query(sql):\n    return conn.execute(sql)\n";
const UI: &str = "def render(page):\n    return template(page)\n";
const ISSUE: &str = "Login fails when the password contains unicode";

fn embedder() -> MockProvider {
    MockProvider::default().with_embeddings(HashMap::from([
        (AUTH.to_string(), vec![1.0, 0.0, 0.0]),
        (DB.to_string(), vec![0.0, 1.0, 0.0]),
        (UI.to_string(), vec![0.0, 0.0, 1.0]),
        (ISSUE.to_string(), vec![0.9, 0.3, 0.1]),
    ]))
}

fn repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    for (name, content) in [("auth.py", AUTH), ("db.py", DB), ("ui.py", UI)] {
        fs::write(dir.path().join(name), content).unwrap();
    }
    dir
}

fn config() -> Config {
    let mut config = Config::default();
    config.index.embed_retries = 0;
    config
}

fn engine(
    embed: MockProvider,
    chat: MockProvider,
    config: &Config,
) -> (Arc<MockProvider>, RelevanceEngine<MockProvider, MockProvider>) {
    let embed = Arc::new(embed);
    let chat = Arc::new(chat);
    let selector = Selector::new(Arc::clone(&chat)).with_retry(RetryPolicy {
        max_retries: 0,
        timeout: Duration::from_secs(5),
        base_backoff: Duration::from_millis(1),
    });
    let engine = RelevanceEngine::new(Arc::clone(&embed), chat, config).with_selector(selector);
    (embed, engine)
}

async fn run(engine: &RelevanceEngine<MockProvider, MockProvider>, root: &Path) -> IndexStore {
    let store = IndexStore::open(":memory:").await.unwrap();
    engine.reconcile(&store, root).await.unwrap();
    store
}

#[tokio::test]
async fn selects_nearest_file_confirmed_by_selector() {
    let repo = repo();
    let store = IndexStore::open(":memory:").await.unwrap();
    let chat = MockProvider::with_responses(vec!["auth.py".into()]);
    let (_, engine) = engine(embedder(), chat, &config());

    let found = engine
        .find_relevant_file(&store, repo.path(), ISSUE)
        .await
        .unwrap();

    assert_eq!(found.path, "auth.py");
    assert_eq!(found.content, AUTH);
    assert_eq!(found.pass.indexed_count(), 3);
    let ranked: Vec<_> = found.candidates.iter().map(|c| c.path.as_str()).collect();
    assert_eq!(ranked, vec!["auth.py", "db.py", "ui.py"]);
    let contents: Vec<_> = found.candidates.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(contents, vec![AUTH, DB, UI]);
    assert!(
        found
            .candidates
            .windows(2)
            .all(|w| w[0].distance <= w[1].distance)
    );
}

#[tokio::test]
async fn selector_may_prefer_a_lower_ranked_candidate() {
    let repo = repo();
    let store = IndexStore::open(":memory:").await.unwrap();
    let chat = MockProvider::with_responses(vec!["`./db.py`".into()]);
    let (_, engine) = engine(embedder(), chat, &config());

    let found = engine
        .find_relevant_file(&store, repo.path(), ISSUE)
        .await
        .unwrap();

    assert_eq!(found.path, "db.py");
    assert_eq!(found.content, DB);
}

#[tokio::test]
async fn hallucinated_path_is_an_integrity_error() {
    let repo = repo();
    let store = IndexStore::open(":memory:").await.unwrap();
    let chat = MockProvider::with_responses(vec!["src/session.py".into()]);
    let (_, engine) = engine(embedder(), chat, &config());

    let err = engine
        .find_relevant_file(&store, repo.path(), ISSUE)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CoreError::SelectionIntegrity { ref returned, candidates: 3 } if returned == "src/session.py"
    ));
}

#[tokio::test]
async fn empty_repository_has_no_relevant_file() {
    let repo = TempDir::new().unwrap();
    let store = IndexStore::open(":memory:").await.unwrap();
    let (_, engine) = engine(embedder(), MockProvider::default(), &config());

    let err = engine
        .find_relevant_file(&store, repo.path(), ISSUE)
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::NoRelevantFile));
}

#[tokio::test]
async fn candidate_count_is_capped() {
    let repo = repo();
    let mut config = config();
    config.retrieval.max_candidates = 2;
    let chat = MockProvider::with_responses(vec!["auth.py".into()]);
    let (_, engine) = engine(embedder(), chat, &config);
    let store = IndexStore::open(":memory:").await.unwrap();

    let found = engine
        .find_relevant_file(&store, repo.path(), ISSUE)
        .await
        .unwrap();

    assert_eq!(found.candidates.len(), 2);
}

#[tokio::test]
async fn repeated_queries_only_embed_the_issue() {
    let repo = repo();
    let chat = MockProvider::with_responses(vec!["auth.py".into(), "auth.py".into()]);
    let (embed, engine) = engine(embedder(), chat, &config());
    let store = run(&engine, repo.path()).await;
    embed.reset_calls();

    let found = engine
        .find_relevant_file(&store, repo.path(), ISSUE)
        .await
        .unwrap();

    assert_eq!(found.pass.embed_calls, 0);
    assert_eq!(found.pass.unchanged_count(), 3);
    assert_eq!(embed.embed_calls(), 1);
}

#[tokio::test]
async fn rank_on_empty_store_is_empty() {
    let (_, engine) = engine(embedder(), MockProvider::default(), &config());
    let store = IndexStore::open(":memory:").await.unwrap();

    let ranked = engine.rank(&store, ISSUE, 5).await.unwrap();

    assert!(ranked.is_empty());
}

#[tokio::test]
async fn chosen_file_renders_as_context() {
    let repo = repo();
    let store = IndexStore::open(":memory:").await.unwrap();
    let chat = MockProvider::with_responses(vec!["ui.py".into()]);
    let (_, engine) = engine(embedder(), chat, &config());

    let found = engine
        .find_relevant_file(&store, repo.path(), ISSUE)
        .await
        .unwrap();
    let context = format_file_context([(found.path.as_str(), found.content.as_str())]);

    assert!(context.starts_with("Current codebase:\n\nFile: ui.py\n```\n"));
    assert!(context.contains(UI));
}
