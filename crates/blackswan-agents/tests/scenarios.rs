//! End-to-end orchestration scenarios.
//!
//! Each test wires scripted model clients into a real `Orchestrator` with a
//! real cache, so fan-out, retry, quorum, synthesis and caching are exercised
//! together. Time is paused so backoff and timeouts run instantly.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use blackswan_agents::test_support::{
    analysis_request, response, FailingStore, RecordingClient, ScriptedClient, Step,
};
use blackswan_agents::{
    Agent, AnalysisError, FailureKind, MetricsRecorder, ModelClient, ModelError, Orchestrator,
    OrchestratorSettings, RetryPolicy, RetryingCaller,
};
use blackswan_cache::{MemoryResultCache, ResultStore, SqliteResultStore};
use blackswan_models::{AgentRole, Fingerprint, ModelParams, Severity};
use tokio_util::sync::CancellationToken;

fn agent(role: AgentRole, client: Arc<dyn ModelClient>) -> Arc<Agent> {
    Arc::new(Agent::new(
        role,
        ModelParams {
            model: format!("{role}-model"),
            temperature: 0.2,
            max_tokens: 500,
        },
        RetryingCaller::new(client, RetryPolicy::default()),
        Duration::from_secs(30),
    ))
}

fn orchestrator(
    roster: Vec<(AgentRole, Arc<dyn ModelClient>)>,
    cache: Arc<dyn ResultStore>,
    settings: OrchestratorSettings,
) -> Orchestrator {
    let agents = roster
        .into_iter()
        .map(|(role, client)| agent(role, client))
        .collect();
    Orchestrator::new(agents, cache, settings)
}

fn member(role: AgentRole, client: Arc<dyn ModelClient>) -> (AgentRole, Arc<dyn ModelClient>) {
    (role, client)
}

fn ok(role: AgentRole, confidence: f64, severity: Severity) -> Arc<ScriptedClient> {
    Arc::new(ScriptedClient::succeeding(role, confidence, severity))
}

fn memory_cache() -> Arc<MemoryResultCache> {
    Arc::new(MemoryResultCache::new(100))
}

#[tokio::test(start_paused = true)]
async fn three_of_four_agents_agree_on_high_severity() {
    let cache = memory_cache();
    let recorder = Arc::new(MetricsRecorder::new());
    let historical = Arc::new(ScriptedClient::failing(ModelError::Transport(
        "connection refused".into(),
    )));

    let orchestrator = orchestrator(
        vec![
            member(AgentRole::PrimaryAnalysis, ok(AgentRole::PrimaryAnalysis, 0.8, Severity::High)),
            member(AgentRole::Sentiment, ok(AgentRole::Sentiment, 0.75, Severity::High)),
            member(AgentRole::HistoricalComparison, historical.clone()),
            member(AgentRole::MarketImpact, ok(AgentRole::MarketImpact, 0.9, Severity::Critical)),
        ],
        cache.clone(),
        OrchestratorSettings::default(),
    )
    .with_metrics(recorder.clone());

    let request = analysis_request(3);
    let result = orchestrator.analyze(&request).await.unwrap();

    assert!((result.confidence_score - 0.816_666_7).abs() < 1e-6);
    assert!((result.confidence_variance - 0.0624).abs() < 1e-3);
    assert_eq!(result.severity, Severity::High);
    assert!(!result.requires_human_review);
    assert_eq!(result.event_id, request.event.id);
    assert_eq!(result.reasoning.agent_count, 3);
    assert!(result.historical_similarity.is_none());

    // The failing agent was retried to exhaustion without sinking the analysis.
    assert_eq!(historical.calls(), 3);
    assert_eq!(recorder.count("success"), 3);
    assert_eq!(recorder.count("transport_error"), 1);
    assert_eq!(recorder.variances().len(), 1);
    assert_eq!(cache.len().await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn two_divergent_agents_require_review() {
    let orchestrator = orchestrator(
        vec![
            member(AgentRole::PrimaryAnalysis, ok(AgentRole::PrimaryAnalysis, 0.9, Severity::Critical)),
            member(AgentRole::Sentiment, ok(AgentRole::Sentiment, 0.2, Severity::Low)),
        ],
        memory_cache(),
        OrchestratorSettings::default(),
    );

    let result = orchestrator.analyze(&analysis_request(0)).await.unwrap();

    assert!((result.confidence_score - 0.55).abs() < 1e-9);
    assert!((result.confidence_variance - 0.35).abs() < 1e-9);
    assert!(result.requires_human_review);
}

#[tokio::test(start_paused = true)]
async fn single_success_is_insufficient_consensus() {
    let cache = memory_cache();
    let hanging: Vec<Arc<ScriptedClient>> =
        (0..3).map(|_| Arc::new(ScriptedClient::hanging())).collect();

    let orchestrator = orchestrator(
        vec![
            member(AgentRole::PrimaryAnalysis, ok(AgentRole::PrimaryAnalysis, 0.8, Severity::High)),
            member(AgentRole::Sentiment, hanging[0].clone()),
            member(AgentRole::HistoricalComparison, hanging[1].clone()),
            member(AgentRole::MarketImpact, hanging[2].clone()),
        ],
        cache.clone(),
        OrchestratorSettings::default(),
    );

    let err = orchestrator.analyze(&analysis_request(0)).await.unwrap_err();

    match err {
        AnalysisError::InsufficientConsensus {
            succeeded,
            required,
            dispatched,
            failures,
        } => {
            assert_eq!(succeeded, 1);
            assert_eq!(required, 2);
            assert_eq!(dispatched, 4);
            assert_eq!(failures.len(), 3);
            assert!(failures
                .iter()
                .all(|f| f.kind == FailureKind::Timeout && f.attempts == 3));
        }
        other => panic!("expected InsufficientConsensus, got {other:?}"),
    }

    for client in &hanging {
        assert_eq!(client.calls(), 3);
        assert_eq!(client.in_flight(), 0);
    }
    assert_eq!(cache.len().await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn no_success_is_insufficient_consensus() {
    let cache = memory_cache();
    let orchestrator = orchestrator(
        vec![
            member(
                AgentRole::PrimaryAnalysis,
                Arc::new(ScriptedClient::failing(ModelError::Transport("reset".into()))),
            ),
            member(
                AgentRole::Sentiment,
                Arc::new(ScriptedClient::failing(ModelError::MalformedResponse(
                    "no json".into(),
                ))),
            ),
            member(
                AgentRole::MarketImpact,
                Arc::new(ScriptedClient::failing(ModelError::ProviderRejected(
                    "unknown model".into(),
                ))),
            ),
        ],
        cache.clone(),
        OrchestratorSettings::default(),
    );

    let err = orchestrator.analyze(&analysis_request(0)).await.unwrap_err();

    match err {
        AnalysisError::InsufficientConsensus {
            succeeded,
            dispatched,
            mut failures,
            ..
        } => {
            assert_eq!(succeeded, 0);
            assert_eq!(dispatched, 3);
            assert_eq!(failures.len(), 3);
            failures.sort_by_key(|f| f.role);
            let kinds: Vec<_> = failures.iter().map(|f| (f.role, f.kind, f.attempts)).collect();
            assert_eq!(
                kinds,
                vec![
                    (AgentRole::PrimaryAnalysis, FailureKind::Transport, 3),
                    (AgentRole::Sentiment, FailureKind::Malformed, 3),
                    (AgentRole::MarketImpact, FailureKind::ProviderRejected, 1),
                ]
            );
        }
        other => panic!("expected InsufficientConsensus, got {other:?}"),
    }
    assert_eq!(cache.len().await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn quorum_never_drops_below_two() {
    let cache = memory_cache();
    let orchestrator = orchestrator(
        vec![
            member(AgentRole::PrimaryAnalysis, ok(AgentRole::PrimaryAnalysis, 0.8, Severity::High)),
            member(
                AgentRole::Sentiment,
                Arc::new(ScriptedClient::failing(ModelError::ProviderRejected(
                    "unknown model".into(),
                ))),
            ),
        ],
        cache.clone(),
        OrchestratorSettings {
            min_quorum: 1,
            ..OrchestratorSettings::default()
        },
    );

    let err = orchestrator.analyze(&analysis_request(0)).await.unwrap_err();

    assert!(matches!(
        err,
        AnalysisError::InsufficientConsensus { succeeded: 1, required: 2, .. }
    ));
    assert_eq!(cache.len().await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn warm_cache_skips_agents() {
    let primary = ok(AgentRole::PrimaryAnalysis, 0.7, Severity::High);
    let sentiment = ok(AgentRole::Sentiment, 0.6, Severity::Medium);
    let orchestrator = orchestrator(
        vec![
            member(AgentRole::PrimaryAnalysis, primary.clone()),
            member(AgentRole::Sentiment, sentiment.clone()),
        ],
        memory_cache(),
        OrchestratorSettings::default(),
    );

    let request = analysis_request(0);
    let first = orchestrator.analyze(&request).await.unwrap();
    let second = orchestrator.analyze(&request).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(primary.calls(), 1);
    assert_eq!(sentiment.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn expired_result_is_recomputed() {
    let primary = ok(AgentRole::PrimaryAnalysis, 0.7, Severity::High);
    let sentiment = ok(AgentRole::Sentiment, 0.6, Severity::Medium);
    let orchestrator = orchestrator(
        vec![
            member(AgentRole::PrimaryAnalysis, primary.clone()),
            member(AgentRole::Sentiment, sentiment.clone()),
        ],
        memory_cache(),
        OrchestratorSettings {
            cache_ttl: Duration::from_secs(60),
            ..OrchestratorSettings::default()
        },
    );

    let request = analysis_request(0);
    let first = orchestrator.analyze(&request).await.unwrap();
    tokio::time::advance(Duration::from_secs(61)).await;
    let second = orchestrator.analyze(&request).await.unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(primary.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_identical_requests_both_dispatch_and_last_write_wins() {
    // The first call's agents answer slowly, the second call's quickly, so
    // the first call finishes last and its write is the one that survives.
    let primary = Arc::new(ScriptedClient::with_steps(vec![
        Step::Delay(
            Duration::from_secs(3),
            Ok(response(AgentRole::PrimaryAnalysis, 0.9, Severity::Critical)),
        ),
        Step::Delay(
            Duration::from_secs(1),
            Ok(response(AgentRole::PrimaryAnalysis, 0.6, Severity::Medium)),
        ),
    ]));
    let sentiment = Arc::new(ScriptedClient::with_steps(vec![
        Step::Delay(
            Duration::from_secs(3),
            Ok(response(AgentRole::Sentiment, 0.9, Severity::Critical)),
        ),
        Step::Delay(
            Duration::from_secs(1),
            Ok(response(AgentRole::Sentiment, 0.6, Severity::Medium)),
        ),
    ]));
    let cache = memory_cache();
    let orchestrator = orchestrator(
        vec![
            member(AgentRole::PrimaryAnalysis, primary.clone()),
            member(AgentRole::Sentiment, sentiment.clone()),
        ],
        cache.clone(),
        OrchestratorSettings::default(),
    );

    let request = analysis_request(0);
    let (slow, fast) = tokio::join!(orchestrator.analyze(&request), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        orchestrator.analyze(&request).await
    });

    let (slow, fast) = (slow.unwrap(), fast.unwrap());
    assert_eq!(primary.calls(), 2);
    assert_eq!(sentiment.calls(), 2);
    assert!((slow.confidence_score - 0.9).abs() < 1e-9);
    assert!((fast.confidence_score - 0.6).abs() < 1e-9);

    let fingerprint = Fingerprint::compute(&request.event, &request.market_context);
    let cached = cache.get(&fingerprint).await.unwrap().unwrap();
    assert_eq!(cache.len().await.unwrap(), 1);
    assert_eq!(cached.id, slow.id);
    assert_ne!(cached.id, fast.id);
}

#[tokio::test(start_paused = true)]
async fn cancellation_aborts_in_flight_agents() {
    let hanging: Vec<Arc<ScriptedClient>> =
        (0..2).map(|_| Arc::new(ScriptedClient::hanging())).collect();
    let cache = memory_cache();
    let orchestrator = orchestrator(
        vec![
            member(AgentRole::PrimaryAnalysis, ok(AgentRole::PrimaryAnalysis, 0.8, Severity::High)),
            member(AgentRole::Sentiment, hanging[0].clone()),
            member(AgentRole::MarketImpact, hanging[1].clone()),
        ],
        cache.clone(),
        OrchestratorSettings::default(),
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        trigger.cancel();
    });

    let err = orchestrator
        .analyze_until_cancelled(&analysis_request(0), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, AnalysisError::Cancelled));
    for client in &hanging {
        assert_eq!(client.calls(), 1);
        assert_eq!(client.in_flight(), 0);
    }
    assert_eq!(cache.len().await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn total_deadline_stops_the_analysis() {
    let hanging = Arc::new(ScriptedClient::hanging());
    let orchestrator = orchestrator(
        vec![
            member(AgentRole::PrimaryAnalysis, ok(AgentRole::PrimaryAnalysis, 0.8, Severity::High)),
            member(AgentRole::Sentiment, hanging.clone()),
        ],
        memory_cache(),
        OrchestratorSettings {
            total_timeout: Some(Duration::from_secs(10)),
            ..OrchestratorSettings::default()
        },
    );

    let err = orchestrator.analyze(&analysis_request(0)).await.unwrap_err();

    assert!(matches!(err, AnalysisError::DeadlineExceeded(d) if d == Duration::from_secs(10)));
    assert_eq!(hanging.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn unavailable_cache_still_returns_result() {
    let store = Arc::new(FailingStore::default());
    let orchestrator = orchestrator(
        vec![
            member(AgentRole::PrimaryAnalysis, ok(AgentRole::PrimaryAnalysis, 0.8, Severity::High)),
            member(AgentRole::Sentiment, ok(AgentRole::Sentiment, 0.7, Severity::High)),
        ],
        store.clone(),
        OrchestratorSettings::default(),
    );

    let result = orchestrator.analyze(&analysis_request(0)).await.unwrap();

    assert_eq!(result.severity, Severity::High);
    assert_eq!(store.reads.load(Ordering::SeqCst), 1);
    assert_eq!(store.writes.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn rejected_provider_is_called_once() {
    let rejected = Arc::new(ScriptedClient::failing(ModelError::ProviderRejected(
        "model not found".into(),
    )));
    let recorder = Arc::new(MetricsRecorder::new());
    let orchestrator = orchestrator(
        vec![
            member(AgentRole::PrimaryAnalysis, ok(AgentRole::PrimaryAnalysis, 0.8, Severity::High)),
            member(AgentRole::Sentiment, ok(AgentRole::Sentiment, 0.7, Severity::Medium)),
            member(AgentRole::MarketImpact, rejected.clone()),
        ],
        memory_cache(),
        OrchestratorSettings::default(),
    )
    .with_metrics(recorder.clone());

    let result = orchestrator.analyze(&analysis_request(0)).await.unwrap();

    assert_eq!(result.reasoning.agent_count, 2);
    assert_eq!(rejected.calls(), 1);
    assert_eq!(recorder.count("provider_rejected"), 1);
}

#[tokio::test(start_paused = true)]
async fn panicking_agent_is_reported_as_task_failure() {
    let recorder = Arc::new(MetricsRecorder::new());
    let orchestrator = orchestrator(
        vec![
            member(AgentRole::PrimaryAnalysis, ok(AgentRole::PrimaryAnalysis, 0.8, Severity::High)),
            member(
                AgentRole::Sentiment,
                Arc::new(ScriptedClient::with_steps(vec![Step::Panic])),
            ),
        ],
        memory_cache(),
        OrchestratorSettings::default(),
    )
    .with_metrics(recorder.clone());

    let err = orchestrator.analyze(&analysis_request(0)).await.unwrap_err();

    match err {
        AnalysisError::InsufficientConsensus { failures, .. } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].role, AgentRole::Sentiment);
            assert_eq!(failures[0].kind, FailureKind::TaskFailed);
        }
        other => panic!("expected InsufficientConsensus, got {other:?}"),
    }

    // Only model call outcomes reach the metrics sink.
    assert_eq!(recorder.calls().len(), 1);
    assert_eq!(recorder.count("success"), 1);
    assert_eq!(recorder.count("task_failed"), 0);
}

#[tokio::test(start_paused = true)]
async fn sqlite_store_serves_repeat_requests() {
    let store = Arc::new(SqliteResultStore::open_in_memory(100).unwrap());
    let primary = ok(AgentRole::PrimaryAnalysis, 0.8, Severity::High);
    let orchestrator = orchestrator(
        vec![
            member(AgentRole::PrimaryAnalysis, primary.clone()),
            member(AgentRole::Sentiment, ok(AgentRole::Sentiment, 0.7, Severity::High)),
        ],
        store.clone(),
        OrchestratorSettings::default(),
    );

    let request = analysis_request(0);
    let first = orchestrator.analyze(&request).await.unwrap();
    let second = orchestrator.analyze(&request).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(primary.calls(), 1);
    assert_eq!(store.len().await.unwrap(), 1);
}

#[tokio::test]
async fn historical_agent_receives_top_similar_events() {
    let historical = Arc::new(RecordingClient::new(response(
        AgentRole::HistoricalComparison,
        0.6,
        Severity::Medium,
    )));
    let sentiment = Arc::new(RecordingClient::new(response(
        AgentRole::Sentiment,
        0.7,
        Severity::High,
    )));
    let orchestrator = orchestrator(
        vec![
            member(AgentRole::HistoricalComparison, historical.clone()),
            member(AgentRole::Sentiment, sentiment.clone()),
        ],
        memory_cache(),
        OrchestratorSettings::default(),
    );

    orchestrator.analyze(&analysis_request(8)).await.unwrap();

    let seen = historical.requests();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].similar_events.len(), 5);
    assert_eq!(seen[0].params.model, "historical_comparison-model");
    assert!(sentiment.requests()[0].similar_events.is_empty());
}
