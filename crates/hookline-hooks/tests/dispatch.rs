use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use hookline_ai::{
    ProviderCall, ProviderClient, ProviderError, ProviderId, ProviderOrchestrator, ProviderSet,
    ResponseMode,
};
use hookline_hooks::{
    Action, Dispatcher, HookPayload, KeywordRegistry, Rule, StateStore, builtin_rules,
};

fn keywords() -> KeywordRegistry {
    KeywordRegistry::builtin().expect("builtin keywords")
}

fn sh(label: &str, pattern: Option<&str>, script: &str) -> Rule {
    let action = Action::InvokeExternalScript {
        path: PathBuf::from("sh"),
        args: vec!["-c".to_string(), script.to_string()],
    };
    match pattern {
        Some(pattern) => Rule::when(label, pattern, action).expect("valid rule"),
        None => Rule::always(label, action),
    }
}

fn literal(label: &str, text: &str) -> Rule {
    Rule::always(label, Action::EmitLiteralText(text.to_string()))
}

#[derive(Clone, Default)]
struct RecordingClient {
    answer: Option<String>,
    calls: Arc<Mutex<Vec<ProviderCall>>>,
}

impl RecordingClient {
    fn answering(answer: &str) -> Self {
        Self {
            answer: Some(answer.to_string()),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().expect("lock calls").clone()
    }
}

#[async_trait]
impl ProviderClient for RecordingClient {
    async fn call(&self, call: &ProviderCall) -> Result<String, ProviderError> {
        self.calls.lock().expect("lock calls").push(call.clone());
        self.answer.clone().ok_or(ProviderError::Http {
            provider: call.provider,
            status: 401,
            body: "unauthorized".to_string(),
        })
    }
}

#[tokio::test]
async fn prompt_matching_no_rule_produces_no_output() {
    let rules = vec![
        Rule::when(
            "deploy",
            r"\bdeploy\b",
            Action::EmitLiteralText("check the release notes".to_string()),
        )
        .expect("valid rule"),
        sh("lint", Some(r"\blint\b"), "printf linted"),
    ];
    let dispatcher = Dispatcher::new(rules, keywords());

    for prompt in ["refactor the parser", "redeployment soon", "linting"] {
        assert_eq!(dispatcher.dispatch(&HookPayload::new(prompt)).await, "");
    }
}

#[tokio::test]
async fn single_always_literal_rule_echoes_its_text_for_any_prompt() {
    let dispatcher = Dispatcher::new(vec![literal("banner", "stay focused")], keywords());
    for prompt in ["x", "ultrawork now", "@codex help"] {
        assert_eq!(
            dispatcher.dispatch(&HookPayload::new(prompt)).await,
            "stay focused"
        );
    }
}

#[tokio::test]
async fn builtin_table_resolves_keywords_and_records_mode() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let dispatcher = Dispatcher::new(builtin_rules().expect("builtin rules"), keywords());
    let payload = HookPayload::new("implement login ralph ultrawork").with_cwd(workspace.path());

    let output = dispatcher.dispatch(&payload).await;

    let registry = keywords();
    let ralph = &registry.get("ralph").expect("ralph").output;
    let ultrawork = &registry.get("ultrawork").expect("ultrawork").output;
    assert_eq!(
        output,
        format!("{ralph}\n{ultrawork}\nflags: persist-until-done, self-verify, parallel-agents")
    );

    let state = StateStore::for_workspace(workspace.path())
        .load()
        .expect("state file");
    assert_eq!(state.mode.as_deref(), Some("ralph"));
    assert_eq!(state.keywords, vec!["ralph", "ultrawork"]);
    assert!(state.updated_at.is_some());
}

#[tokio::test]
async fn state_tracking_can_be_disabled() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let dispatcher = Dispatcher::new(builtin_rules().expect("builtin rules"), keywords())
        .track_state(false);
    let payload = HookPayload::new("ralph").with_cwd(workspace.path());

    assert!(!dispatcher.dispatch(&payload).await.is_empty());
    assert!(!StateStore::for_workspace(workspace.path()).path().exists());
}

#[tokio::test]
async fn synergy_text_replaces_individual_texts() {
    let dispatcher = Dispatcher::new(builtin_rules().expect("builtin rules"), keywords());
    let forward = dispatcher
        .dispatch(&HookPayload::new("autopilot with a plan"))
        .await;
    let reverse = dispatcher
        .dispatch(&HookPayload::new("plan it, then AUTOPILOT"))
        .await;

    for output in [&forward, &reverse] {
        assert!(output.starts_with("[AUTOPILOT + PLAN]"));
        assert!(!output.contains("[AUTOPILOT] "));
        assert!(!output.contains("[PLAN] "));
    }
}

#[tokio::test]
async fn script_output_is_collected_and_payload_is_on_stdin() {
    let rules = vec![
        sh("greeting", None, "printf 'hello from hook\\n'"),
        sh("echo-payload", Some("payload"), "cat"),
    ];
    let dispatcher = Dispatcher::new(rules, keywords());

    let output = dispatcher
        .dispatch(&HookPayload::new("show the payload"))
        .await;

    let mut lines = output.lines();
    assert_eq!(lines.next(), Some("hello from hook"));
    let echoed: serde_json::Value =
        serde_json::from_str(lines.next().expect("payload line")).expect("payload json");
    assert_eq!(echoed["prompt"], "show the payload");
}

#[tokio::test]
async fn failing_script_does_not_affect_siblings() {
    let rules = vec![
        sh("broken", None, "echo boom >&2; exit 3"),
        literal("kept", "kept"),
        sh("missing", None, "exec /definitely/not/a/program"),
        sh("also", None, "printf also"),
    ];
    let dispatcher = Dispatcher::new(rules, keywords());

    assert_eq!(
        dispatcher.dispatch(&HookPayload::new("anything")).await,
        "kept\nalso"
    );
}

#[tokio::test]
async fn slow_script_is_cut_off_by_the_action_timeout() {
    let rules = vec![sh("slow", None, "sleep 5; printf late"), literal("fast", "fast")];
    let dispatcher =
        Dispatcher::new(rules, keywords()).action_timeout(Duration::from_millis(200));

    let started = Instant::now();
    let output = dispatcher.dispatch(&HookPayload::new("go")).await;

    assert_eq!(output, "fast");
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn matched_scripts_run_concurrently_and_keep_rule_order() {
    let rules = vec![
        sh("one", None, "sleep 1; printf one"),
        literal("two", "two"),
        sh("three", None, "sleep 1; printf three"),
    ];
    let dispatcher = Dispatcher::new(rules, keywords());

    let started = Instant::now();
    let output = dispatcher.dispatch(&HookPayload::new("go")).await;

    assert_eq!(output, "one\ntwo\nthree");
    assert!(started.elapsed() < Duration::from_millis(1_900));
}

#[tokio::test]
async fn scripts_run_in_the_payload_cwd() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let hooks = workspace.path().join("hooks");
    std::fs::create_dir_all(&hooks).expect("hooks dir");
    std::fs::write(hooks.join("hello.sh"), "printf 'local hook'\n").expect("script");
    let rule = Rule::always(
        "local",
        Action::InvokeExternalScript {
            path: PathBuf::from("sh"),
            args: vec!["hooks/hello.sh".to_string()],
        },
    );
    let dispatcher = Dispatcher::new(vec![rule], keywords());

    let output = dispatcher
        .dispatch(&HookPayload::new("go").with_cwd(workspace.path()))
        .await;
    assert_eq!(output, "local hook");
}

#[tokio::test]
async fn malformed_payloads_are_silent() {
    let dispatcher = Dispatcher::new(vec![literal("banner", "hi")], keywords());
    for raw in ["", "   ", "not json", "{\"session_id\":\"s\"}", "[1,2,3]"] {
        assert_eq!(dispatcher.dispatch_raw(raw).await, "");
    }
    assert_eq!(dispatcher.dispatch_raw(r#"{"prompt":"x"}"#).await, "hi");
}

#[tokio::test]
async fn skip_rules_are_inert() {
    let rules = vec![
        Rule::always("inert", Action::Skip),
        Rule::when("also-inert", "x", Action::Skip).expect("valid rule"),
    ];
    let dispatcher = Dispatcher::new(rules, keywords());
    assert_eq!(dispatcher.matching_rules("x").len(), 2);
    assert_eq!(dispatcher.dispatch(&HookPayload::new("x")).await, "");
}

#[tokio::test]
async fn provider_mention_consults_the_orchestrator() {
    let codex = RecordingClient::answering("the parser looks fine");
    let gemini = RecordingClient::answering("unused");
    let orchestrator = ProviderOrchestrator::new(ProviderSet::new(
        Arc::new(codex.clone()),
        Arc::new(gemini.clone()),
    ));
    let dispatcher = Dispatcher::new(builtin_rules().expect("builtin rules"), keywords())
        .orchestrator(orchestrator);

    let output = dispatcher
        .dispatch(&HookPayload::new("ask codex to review the parser"))
        .await;

    assert_eq!(output, "[codex] the parser looks fine");
    let calls = codex.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].prompt, "review the parser");
    assert_eq!(calls[0].mode, ResponseMode::Plain);
    assert!(gemini.calls().is_empty());
}

#[tokio::test]
async fn provider_auth_failure_falls_over_inside_dispatch() {
    let codex = RecordingClient::default();
    let gemini = RecordingClient::answering("second opinion");
    let orchestrator = ProviderOrchestrator::new(ProviderSet::new(
        Arc::new(codex.clone()),
        Arc::new(gemini.clone()),
    ));
    let dispatcher = Dispatcher::new(builtin_rules().expect("builtin rules"), keywords())
        .orchestrator(orchestrator);

    let output = dispatcher
        .dispatch(&HookPayload::new("@codex is this sound?"))
        .await;

    assert_eq!(output, "[gemini] second opinion");
    assert_eq!(codex.calls().len(), 1);
    assert_eq!(gemini.calls()[0].provider, ProviderId::Gemini);
}

#[tokio::test]
async fn provider_rule_without_orchestrator_is_silent() {
    let dispatcher = Dispatcher::new(builtin_rules().expect("builtin rules"), keywords());
    assert_eq!(
        dispatcher.dispatch(&HookPayload::new("@gemini thoughts?")).await,
        ""
    );
}

#[derive(Clone, Default)]
struct HangingClient {
    calls: Arc<Mutex<usize>>,
}

#[async_trait]
impl ProviderClient for HangingClient {
    async fn call(&self, _call: &ProviderCall) -> Result<String, ProviderError> {
        *self.calls.lock().expect("lock calls") += 1;
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn hung_provider_falls_over_before_the_action_timeout() {
    let codex = HangingClient::default();
    let gemini = RecordingClient::answering("the parser is fine");
    let orchestrator = ProviderOrchestrator::new(ProviderSet::new(
        Arc::new(codex.clone()),
        Arc::new(gemini.clone()),
    ));
    let dispatcher = Dispatcher::new(builtin_rules().expect("builtin rules"), keywords())
        .orchestrator(orchestrator);

    let started = tokio::time::Instant::now();
    let output = dispatcher
        .dispatch(&HookPayload::new("ask codex to review the parser"))
        .await;

    assert_eq!(output, "[gemini] the parser is fine");
    assert_eq!(*codex.calls.lock().expect("lock calls"), 1);
    assert_eq!(gemini.calls()[0].prompt, "review the parser");
    assert!(started.elapsed() < hookline_hooks::DEFAULT_ACTION_TIMEOUT);
}

#[tokio::test(start_paused = true)]
async fn hung_providers_still_report_failure_text() {
    let orchestrator = ProviderOrchestrator::new(ProviderSet::new(
        Arc::new(HangingClient::default()),
        Arc::new(HangingClient::default()),
    ));
    let dispatcher = Dispatcher::new(builtin_rules().expect("builtin rules"), keywords())
        .orchestrator(orchestrator)
        .action_timeout(Duration::from_secs(10));

    let output = dispatcher
        .dispatch(&HookPayload::new("@gemini is this sound?"))
        .await;

    assert!(
        output.starts_with("[hookline] all providers failed (gemini -> codex)"),
        "output: {output}"
    );
    assert!(output.ends_with("timed out after 4500ms"), "output: {output}");
}

#[tokio::test]
async fn corrupt_state_file_is_replaced_on_the_next_dispatch() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let store = StateStore::for_workspace(workspace.path());
    std::fs::create_dir_all(store.path().parent().expect("state dir")).expect("mkdir");
    std::fs::write(store.path(), "not json {{{").expect("garbage");
    let dispatcher = Dispatcher::new(builtin_rules().expect("builtin rules"), keywords());

    let output = dispatcher
        .dispatch(&HookPayload::new("ralph").with_cwd(workspace.path()))
        .await;

    assert!(output.starts_with("[RALPH]"), "output: {output}");
    let state = store.load().expect("state parses again");
    assert_eq!(state.mode.as_deref(), Some("ralph"));
}
