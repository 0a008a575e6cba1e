//! Agent Task Tests
//!
//! End-to-end runs through `AgentTeam` with scripted completion services:
//! the reasoning loop, handoffs, isolation, timeouts and cost telemetry.
//!
//! Run: cargo nextest run --test agent_task_tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use agent_relay::tools::CalculateTool;
use agent_relay::{
    AgentDefinition, AgentGraph, AgentId, AgentTeam, CompletionError, CompletionRequest,
    CompletionResponse, CompletionService, ErrorKind, ExecutionConfig, FnTool, Role, ScriptStep,
    ScriptedCompletion, StepEvent, TaskContext, TaskStatus, ToolCallRequest, ToolError,
    ToolRegistry,
};
use async_trait::async_trait;
use serde_json::json;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn tool_call(id: &str, name: &str, arguments: serde_json::Value) -> ToolCallRequest {
    ToolCallRequest::new(id, name, arguments)
}

fn single_agent(tools: ToolRegistry) -> (Arc<AgentGraph>, AgentId) {
    let mut builder = AgentGraph::builder();
    let id = builder.add(
        AgentDefinition::new("Assistant", "You are a helpful assistant. Use tools when useful.")
            .with_tools(tools),
    );
    (Arc::new(builder.build().unwrap()), id)
}

fn calculator_only() -> ToolRegistry {
    ToolRegistry::new().with(CalculateTool).unwrap()
}

/// Never answers; counts how often it is polled forward.
struct Ticker {
    ticks: Arc<AtomicUsize>,
}

#[async_trait]
impl CompletionService for Ticker {
    fn name(&self) -> &str {
        "ticker"
    }

    async fn complete(
        &self,
        _request: CompletionRequest<'_>,
    ) -> Result<CompletionResponse, CompletionError> {
        loop {
            self.ticks.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

// =============================================================================
// Reasoning loop
// =============================================================================

mod reasoning_loop_tests {
    use super::*;

    #[tokio::test]
    async fn test_calculate_then_answer() {
        init_tracing();
        let (graph, assistant) = single_agent(calculator_only());
        let client = Arc::new(ScriptedCompletion::replies([
            CompletionResponse::tool_calls(vec![tool_call(
                "call_1",
                "calculate",
                json!({"expression": "2+3"}),
            )]),
            CompletionResponse::text("2 + 3 = 5"),
        ]));
        let team = AgentTeam::new(graph, client.clone());

        let result = team
            .run_agent_task(assistant, "what is 2+3?", 5, Duration::from_secs(5))
            .await;

        assert_eq!(result.status, TaskStatus::Completed);
        assert_eq!(result.answer(), "2 + 3 = 5");
        assert_eq!(result.final_agent.as_deref(), Some("Assistant"));
        assert_eq!(result.log.len(), 2);
        let call = &result.log.steps()[0].tool_calls[0];
        assert_eq!(call.name, "calculate");
        assert_eq!(call.arguments, json!({"expression": "2+3"}));
        assert_eq!(call.result.as_deref(), Some("5"));
        assert_eq!(result.log.steps()[1].iteration, 2);
        assert!(result.error.is_none());
        assert_eq!(result.metrics.api_calls, 2);
        assert_eq!(result.metrics.tool_calls, 1);
        assert_eq!(client.requests()[0].tools, vec!["calculate".to_string()]);
    }

    #[tokio::test]
    async fn test_budget_exhausted_is_incomplete() {
        let (graph, assistant) = single_agent(ToolRegistry::demo_tools());
        let client = Arc::new(ScriptedCompletion::replies([
            CompletionResponse::tool_calls(vec![tool_call(
                "call_1",
                "get_weather",
                json!({"city": "Tokyo"}),
            )]),
            CompletionResponse::tool_calls(vec![tool_call(
                "call_2",
                "calculate",
                json!({"expression": "20*9/5+32"}),
            )]),
        ]));
        let team = AgentTeam::new(graph, client.clone());

        let result = team
            .run_agent_task(
                assistant,
                "Get the weather in Tokyo and convert it to Fahrenheit",
                1,
                Duration::from_secs(5),
            )
            .await;

        assert_eq!(result.status, TaskStatus::Incomplete);
        assert_eq!(result.log.len(), 1);
        assert!(result.final_answer.is_none());
        assert!(result.error.is_none());
        assert_eq!(client.request_count(), 1);
    }

    #[tokio::test]
    async fn test_iteration_bound() {
        for max_iterations in 1..=4 {
            let (graph, assistant) = single_agent(calculator_only());
            let replies = (0..10).map(|i| {
                CompletionResponse::tool_calls(vec![tool_call(
                    &format!("call_{}", i),
                    "calculate",
                    json!({"expression": "1+1"}),
                )])
            });
            let team = AgentTeam::new(graph, Arc::new(ScriptedCompletion::replies(replies)));

            let result = team
                .run_agent_task(assistant, "loop forever", max_iterations, Duration::from_secs(5))
                .await;

            assert_eq!(result.status, TaskStatus::Incomplete);
            assert_eq!(result.log.len(), max_iterations);
        }
    }

    #[tokio::test]
    async fn test_tool_messages_follow_call_order() {
        let (graph, assistant) = single_agent(ToolRegistry::demo_tools());
        let client = Arc::new(ScriptedCompletion::replies([
            CompletionResponse::tool_calls(vec![
                tool_call("c1", "calculate", json!({"expression": "6*7"})),
                tool_call("c2", "get_market_data", json!({"topic": "tech"})),
                tool_call("c3", "calculate", json!({"expression": "1/0"})),
                tool_call("c4", "save_note", json!({"content": "remember this"})),
            ]),
            CompletionResponse::text("done"),
        ]));
        let team = AgentTeam::new(graph, client.clone());

        let result = team
            .run_agent_task(assistant, "do several things", 5, Duration::from_secs(5))
            .await;
        assert_eq!(result.status, TaskStatus::Completed);

        let second = &client.requests()[1];
        let tool_ids: Vec<_> = second
            .messages
            .iter()
            .filter(|m| m.role == Role::Tool)
            .map(|m| m.tool_call_id.clone().unwrap())
            .collect();
        assert_eq!(tool_ids, vec!["c1", "c2", "c3", "c4"]);

        let traces = &result.log.steps()[0].tool_calls;
        assert_eq!(traces[0].result.as_deref(), Some("42"));
        assert!(traces[2].error.as_deref().unwrap().starts_with("invalid expression"));
        assert_eq!(result.metrics.tool_errors, 1);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_an_observation() {
        let (graph, assistant) = single_agent(ToolRegistry::demo_tools());
        let client = Arc::new(ScriptedCompletion::replies([
            CompletionResponse::tool_calls(vec![tool_call(
                "c1",
                "get_stock_price",
                json!({"symbol": "ACME"}),
            )]),
            CompletionResponse::text("I cannot look up stock prices."),
        ]));
        let team = AgentTeam::new(graph, client.clone());

        let result = team
            .run_agent_task(assistant, "ACME price?", 5, Duration::from_secs(5))
            .await;

        assert_eq!(result.status, TaskStatus::Completed);
        let tool_message = client.requests()[1].messages.last().cloned().unwrap();
        assert_eq!(tool_message.text(), "unknown tool: get_stock_price");
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_end_the_loop() {
        let registry = ToolRegistry::new()
            .with(FnTool::new(
                "fetch_report",
                "Fetches the quarterly report",
                json!({
                    "type": "object",
                    "properties": {"quarter": {"type": "string"}},
                    "required": ["quarter"]
                }),
                |_| Err(ToolError::execution_failed("report service unavailable")),
            ))
            .unwrap();
        let (graph, assistant) = single_agent(registry);
        let client = Arc::new(ScriptedCompletion::replies([
            CompletionResponse::tool_calls(vec![tool_call(
                "c1",
                "fetch_report",
                json!({"quarter": "Q3"}),
            )]),
            CompletionResponse::text("The report service is down."),
        ]));
        let team = AgentTeam::new(graph, client);

        let result = team
            .run_agent_task(assistant, "summarise Q3", 5, Duration::from_secs(5))
            .await;

        assert_eq!(result.status, TaskStatus::Completed);
        assert_eq!(result.log.len(), 2);
        assert_eq!(
            result.log.steps()[0].tool_calls[0].error.as_deref(),
            Some("execution failed: report service unavailable")
        );
    }

    #[tokio::test]
    async fn test_invalid_arguments_skip_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let registry = ToolRegistry::new()
            .with(FnTool::new(
                "set_level",
                "Sets the level",
                json!({
                    "type": "object",
                    "properties": {"level": {"type": "string", "enum": ["low", "high"]}},
                    "required": ["level"],
                    "additionalProperties": false
                }),
                move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok("ok".into())
                },
            ))
            .unwrap();
        let (graph, assistant) = single_agent(registry);
        let client = Arc::new(ScriptedCompletion::replies([
            CompletionResponse::tool_calls(vec![
                tool_call("c1", "set_level", json!({"level": "extreme"})),
                tool_call("c2", "set_level", json!("not json")),
                tool_call("c3", "set_level", json!({"level": "low", "force": true})),
            ]),
            CompletionResponse::text("done"),
        ]));
        let team = AgentTeam::new(graph, client);

        let result = team
            .run_agent_task(assistant, "set it", 5, Duration::from_secs(5))
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(
            result.log.steps()[0]
                .tool_calls
                .iter()
                .all(|t| t.error.as_deref().unwrap().starts_with("invalid arguments"))
        );
    }

    #[tokio::test]
    async fn test_completion_failure_fails_the_task() {
        let (graph, assistant) = single_agent(calculator_only());
        let client = Arc::new(ScriptedCompletion::new([ScriptStep::Fail(
            CompletionError::api(401, "Incorrect API key provided"),
        )]));
        let team = AgentTeam::new(graph, client.clone());

        let result = team
            .run_agent_task(assistant, "hello", 5, Duration::from_secs(5))
            .await;

        assert_eq!(result.status, TaskStatus::Failed);
        assert_eq!(result.log.len(), 1);
        let error = result.error.unwrap();
        assert_eq!(error.kind, ErrorKind::CompletionService);
        assert!(error.message.contains("Incorrect API key"));
        assert_eq!(client.request_count(), 1);
    }
}

// =============================================================================
// Delegation
// =============================================================================

mod delegation_tests {
    use super::*;

    fn handoff(id: &str, target: &str) -> CompletionResponse {
        CompletionResponse::tool_calls(vec![tool_call(
            id,
            &format!("transfer_to_{}", target),
            json!({}),
        )])
    }

    /// Coordinator -> Research Specialist -> Analysis Agent.
    fn research_team() -> (Arc<AgentGraph>, AgentId) {
        let mut builder = AgentGraph::builder();
        let analysis = builder.add(
            AgentDefinition::new(
                "Analysis Agent",
                "You analyse data and produce insights.",
            )
            .with_tools(ToolRegistry::demo_tools().subset(["analyze_data", "calculate"]).unwrap())
            .with_handoff_description("Use for data analysis and calculations."),
        );
        let research = builder.add(
            AgentDefinition::new("Research Specialist", "You research topics.")
                .with_tools(ToolRegistry::demo_tools().subset(["search_web"]).unwrap())
                .with_handoffs([analysis]),
        );
        let coordinator = builder.add(
            AgentDefinition::new("Coordinator", "You route requests to specialists.")
                .with_handoffs([research, analysis]),
        );
        (Arc::new(builder.build().unwrap()), coordinator)
    }

    #[tokio::test]
    async fn test_three_agent_chain() {
        init_tracing();
        let (graph, coordinator) = research_team();
        let client = Arc::new(ScriptedCompletion::replies([
            handoff("h1", "research_specialist"),
            CompletionResponse::tool_calls(vec![tool_call(
                "s1",
                "search_web",
                json!({"query": "AI market trends"}),
            )]),
            handoff("h2", "analysis_agent"),
            CompletionResponse::text("AI adoption is accelerating."),
        ]));
        let team = AgentTeam::new(graph, client.clone());

        let result = team
            .run_agent_task(coordinator, "Analyse AI market trends", 5, Duration::from_secs(5))
            .await;

        assert_eq!(result.status, TaskStatus::Completed);
        assert_eq!(result.final_agent.as_deref(), Some("Analysis Agent"));
        assert_eq!(
            result.log.agents(),
            vec!["Coordinator", "Research Specialist", "Analysis Agent"]
        );
        assert_eq!(result.metrics.handoffs, 2);
        assert_eq!(
            result.log.steps()[0].handoff.as_deref(),
            Some("Research Specialist")
        );

        let requests = client.requests();
        assert_eq!(
            requests[0].tools,
            vec!["transfer_to_research_specialist", "transfer_to_analysis_agent"]
        );
        let last = requests.last().unwrap();
        assert_eq!(last.system_prompt(), Some("You analyse data and produce insights."));
        assert_eq!(last.tools, vec!["analyze_data", "calculate"]);
        assert!(
            last.messages
                .iter()
                .any(|m| m.role == Role::Tool && m.text().contains("AI"))
        );
    }

    #[tokio::test]
    async fn test_handoff_limit_fails_with_partial_log() {
        let (graph, coordinator) = research_team();
        let client = Arc::new(ScriptedCompletion::replies([
            handoff("h1", "research_specialist"),
            handoff("h2", "analysis_agent"),
            CompletionResponse::text("unreachable"),
        ]));
        let team = AgentTeam::new(graph, client.clone())
            .with_config(ExecutionConfig::default().with_max_handoffs(1));

        let result = team
            .run_agent_task(coordinator, "Analyse", 5, Duration::from_secs(5))
            .await;

        assert_eq!(result.status, TaskStatus::Failed);
        assert_eq!(result.error.as_ref().unwrap().kind, ErrorKind::TooManyHandoffs);
        assert_eq!(result.log.len(), 2);
        let last = result.log.last().unwrap();
        assert_eq!(last.agent_name, "Research Specialist");
        assert_eq!(last.error.as_ref().unwrap().kind, ErrorKind::TooManyHandoffs);
        assert_eq!(client.request_count(), 2);
    }

    #[tokio::test]
    async fn test_handoff_back_is_rejected() {
        let mut builder = AgentGraph::builder();
        let billing = builder.add(AgentDefinition::new("Billing", "You handle billing."));
        let triage = builder.add(
            AgentDefinition::new("Triage", "You route.").with_handoffs([billing]),
        );
        builder.add_handoff(billing, triage).unwrap();
        let graph = Arc::new(builder.build().unwrap());

        let client = Arc::new(ScriptedCompletion::replies([
            handoff("h1", "billing"),
            handoff("h2", "triage"),
            CompletionResponse::text("Your refund is on its way."),
        ]));
        let team = AgentTeam::new(graph, client);

        let result = team
            .run_agent_task(triage, "refund please", 5, Duration::from_secs(5))
            .await;

        assert_eq!(result.status, TaskStatus::Completed);
        assert_eq!(result.final_agent.as_deref(), Some("Billing"));
        let rejected = &result.log.steps()[1].tool_calls[0];
        assert!(rejected.error.as_deref().unwrap().starts_with("handoff rejected"));
    }

    #[tokio::test]
    async fn test_observer_sees_handoffs() {
        let (graph, coordinator) = research_team();
        let client = Arc::new(ScriptedCompletion::replies([
            handoff("h1", "analysis_agent"),
            CompletionResponse::text("done"),
        ]));
        let team = AgentTeam::new(graph, client);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let result = team
            .run_observed(coordinator, "Analyse", TaskContext::new(), Some(tx))
            .await;
        assert_eq!(result.status, TaskStatus::Completed);

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(events.iter().any(|e| matches!(
            e,
            StepEvent::HandoffTaken { from, to, hop: 1 }
                if from == "Coordinator" && to == "Analysis Agent"
        )));
        let recorded = events
            .iter()
            .filter(|e| matches!(e, StepEvent::StepRecorded(_)))
            .count();
        assert_eq!(recorded, result.log.len());
    }
}

// =============================================================================
// Isolation and timeouts
// =============================================================================

mod isolation_tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[tokio::test]
    async fn test_hang_times_out_and_tears_down() {
        init_tracing();
        let ticks = Arc::new(AtomicUsize::new(0));
        let (graph, assistant) = single_agent(calculator_only());
        let team = AgentTeam::new(
            graph,
            Arc::new(Ticker {
                ticks: ticks.clone(),
            }),
        );

        let started = Instant::now();
        let result = team
            .run_agent_task(assistant, "never ends", 5, Duration::from_millis(100))
            .await;
        let elapsed = started.elapsed();

        assert_eq!(result.status, TaskStatus::TimedOut);
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed <= Duration::from_millis(150), "took {:?}", elapsed);
        assert_eq!(result.error.as_ref().unwrap().kind, ErrorKind::Timeout);

        // The in-flight iteration is in the log.
        assert_eq!(result.log.len(), 1);
        assert_eq!(
            result.log.steps()[0].error.as_ref().unwrap().kind,
            ErrorKind::Timeout
        );

        let seen = ticks.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
    }

    #[tokio::test]
    async fn test_timeout_keeps_completed_steps() {
        let (graph, assistant) = single_agent(calculator_only());
        let client = Arc::new(ScriptedCompletion::new([
            ScriptStep::Reply(CompletionResponse::tool_calls(vec![tool_call(
                "c1",
                "calculate",
                json!({"expression": "2^10"}),
            )])),
            ScriptStep::Hang,
        ]));
        let team = AgentTeam::new(graph, client);

        let result = team
            .run_agent_task(assistant, "2^10?", 5, Duration::from_millis(100))
            .await;

        assert_eq!(result.status, TaskStatus::TimedOut);
        assert_eq!(result.log.len(), 2);
        assert_eq!(
            result.log.steps()[0].tool_calls[0].result.as_deref(),
            Some("1024")
        );
        assert!(result.log.steps()[0].error.is_none());
        assert_eq!(result.log.steps()[1].iteration, 2);
        assert_eq!(
            result.log.steps()[1].error.as_ref().unwrap().kind,
            ErrorKind::Timeout
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_handler_is_joined() {
        let finished = Arc::new(AtomicUsize::new(0));
        let done = finished.clone();
        let registry = ToolRegistry::new()
            .with(FnTool::new(
                "slow_export",
                "Blocks its thread",
                json!({"type": "object", "properties": {}}),
                move |_| {
                    std::thread::sleep(Duration::from_millis(150));
                    done.fetch_add(1, Ordering::SeqCst);
                    Ok("exported".into())
                },
            ))
            .unwrap();
        let (graph, assistant) = single_agent(registry);
        let client = Arc::new(ScriptedCompletion::replies([
            CompletionResponse::tool_calls(vec![tool_call("c1", "slow_export", json!({}))]),
            CompletionResponse::text("exported"),
        ]));
        let team = AgentTeam::new(graph, client);

        let result = team
            .run_agent_task(assistant, "export", 5, Duration::from_millis(50))
            .await;

        assert_eq!(result.status, TaskStatus::TimedOut);
        // The handler could not be interrupted, but it has finished by the time we return.
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    /// Records the credential each request carried.
    struct KeyRecorder {
        seen: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl CompletionService for KeyRecorder {
        fn name(&self) -> &str {
            "key-recorder"
        }

        async fn complete(
            &self,
            request: CompletionRequest<'_>,
        ) -> Result<CompletionResponse, CompletionError> {
            let key = request.api_key.map(|k| k.expose_secret().to_string());
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.seen.lock().unwrap().push(key.clone());
            Ok(CompletionResponse::text(key.unwrap_or_default()))
        }
    }

    #[tokio::test]
    async fn test_concurrent_tasks_keep_their_credentials() {
        let (graph, assistant) = single_agent(calculator_only());
        let recorder = Arc::new(KeyRecorder {
            seen: Mutex::new(Vec::new()),
        });
        let team = AgentTeam::new(graph, recorder.clone());

        let (alice, bob, anonymous) = tokio::join!(
            team.run(assistant, "hi", TaskContext::new().with_api_key("sk-alice")),
            team.run(assistant, "hi", TaskContext::new().with_api_key("sk-bob")),
            team.run(assistant, "hi", TaskContext::new()),
        );

        assert_eq!(alice.answer(), "sk-alice");
        assert_eq!(bob.answer(), "sk-bob");
        assert_eq!(anonymous.answer(), "");
        assert_ne!(alice.task_id, bob.task_id);
        assert_eq!(recorder.seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_invalid_setup_is_reported_not_raised() {
        let (graph, assistant) = single_agent(calculator_only());
        let client = Arc::new(ScriptedCompletion::default());
        let team = AgentTeam::new(graph, client.clone());

        let result = team
            .run_agent_task(assistant, "hi", 0, Duration::from_secs(1))
            .await;

        assert_eq!(result.status, TaskStatus::Failed);
        assert_eq!(result.error.unwrap().kind, ErrorKind::Fatal);
        assert!(result.log.is_empty());
        assert_eq!(client.request_count(), 0);
    }
}

// =============================================================================
// Cost telemetry
// =============================================================================

mod cost_tests {
    use super::*;
    use agent_relay::{CostEstimate, PricingTable};
    use rust_decimal_macros::dec;

    fn two_step_script() -> Arc<ScriptedCompletion> {
        Arc::new(ScriptedCompletion::replies([
            CompletionResponse::tool_calls(vec![tool_call(
                "c1",
                "calculate",
                json!({"expression": "2+3"}),
            )]),
            CompletionResponse::text("5"),
        ]))
    }

    #[tokio::test]
    async fn test_known_model_has_total_cost() {
        let (graph, assistant) = single_agent(calculator_only());
        let team = AgentTeam::new(graph, two_step_script());

        let result = team
            .run(
                assistant,
                "what is 2+3?",
                TaskContext::new().with_model("gpt-4o-mini"),
            )
            .await;

        let total = result.total_cost.unwrap();
        assert_eq!(total.estimated_steps, 2);
        assert!(!total.partial);
        assert!(total.total_usd > dec!(0));
        assert!(result.log.iter().all(|s| s
            .cost_estimate
            .as_ref()
            .is_some_and(CostEstimate::is_available)));
    }

    #[tokio::test]
    async fn test_unknown_model_has_no_total() {
        let (graph, assistant) = single_agent(calculator_only());
        let team = AgentTeam::new(graph, two_step_script());

        let result = team
            .run(assistant, "what is 2+3?", TaskContext::new().with_model("local-llama"))
            .await;

        assert_eq!(result.status, TaskStatus::Completed);
        assert!(result.total_cost.is_none());
        assert!(
            result
                .log
                .iter()
                .all(|s| s.cost_estimate == Some(CostEstimate::Unavailable))
        );
    }

    #[tokio::test]
    async fn test_custom_pricing_table() {
        let (graph, assistant) = single_agent(calculator_only());
        let pricing = PricingTable::builder()
            .model("local-llama", dec!(1.00), dec!(2.00))
            .build();
        let team = AgentTeam::new(graph, two_step_script()).with_pricing(pricing);

        let result = team
            .run(assistant, "what is 2+3?", TaskContext::new().with_model("local-llama"))
            .await;

        assert_eq!(result.total_cost.unwrap().estimated_steps, 2);
    }
}
