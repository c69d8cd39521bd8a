//! Navigation Agent Loop (C8, spec.md §4.8): the per-turn state machine
//! that wires the distiller, masker, model client, resolver chain, replay
//! store, and executor together into one task run.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use nav_domain::chat::{AssistantMessage, ChatMessage, ToolCall};
use nav_domain::config::Config;
use nav_domain::error::{Error, Result};
use nav_domain::llm::{LlmResponse, StepExecution};
use nav_domain::locator::LocatorIndex;
use nav_domain::page_driver::PageDriver;
use nav_domain::recording::{task_hash, Recording};
use nav_domain::task::Task;
use nav_domain::trace::NavEvent;
use nav_domain::usage::TokenUsage;
use nav_masker::Masker;
use nav_providers::{ChatRequest, LlmProvider};
use nav_replay::{ReplayCursor, LOCATOR_RETRY_ATTEMPTS, LOCATOR_RETRY_SLEEP};
use nav_resolver::{resolve_missing_values, SecretSource};

use crate::context::AgentContext;
use crate::prompts::{navigation_system_prompt, navigation_user_message};
use crate::review::{review_delegation, review_success, ReviewVerdict};
use crate::tabs::TabSet;

/// The result of one `run_task` call, success or not. A task that is
/// delegated to a human and times out still returns a populated answer
/// rather than an error (spec.md §7 "User-visible failure").
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub success: bool,
    pub answer: String,
    pub turns: u32,
}

/// One decoded model turn, whichever shape it took: a navigation step (or
/// sequence of steps, or a page-level directive) or a batch of tool calls
/// (spec.md §4.5: "Result is either parsed JSON text or `{tool_calls:[...]}`").
enum TurnPayload {
    Steps(LlmResponse),
    Tools(Vec<ToolCall>),
}

/// Decodes an already-recorded-or-just-received assistant message into a
/// [`TurnPayload`] without re-deriving it from scratch, so replay and live
/// turns share one dispatch path.
fn payload_from_assistant(msg: &ChatMessage) -> TurnPayload {
    match msg {
        ChatMessage::Assistant(AssistantMessage::ToolCalls { tool_calls }) => {
            TurnPayload::Tools(tool_calls.clone())
        }
        ChatMessage::Assistant(AssistantMessage::Text { text }) => {
            TurnPayload::Steps(serde_json::from_str(text).unwrap_or_default())
        }
        _ => TurnPayload::Steps(LlmResponse::default()),
    }
}

fn token_usage_from(resp: &nav_providers::ChatResponse, vendor: &str) -> TokenUsage {
    let usage = resp.usage.as_ref();
    TokenUsage {
        vendor: vendor.to_string(),
        model: resp.model.clone(),
        prompt: usage.map(|u| u.prompt_tokens as u64).unwrap_or(0),
        cached_prompt: 0,
        completion: usage.map(|u| u.completion_tokens as u64).unwrap_or(0),
    }
}

fn site_folder(site_name: &str) -> String {
    site_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Injected once per hand-off; a real control bar asset is a UI concern
/// outside this crate's scope, so this is the minimal script the polling
/// loop below needs: a flag the user (or a human-in-the-loop tool running
/// in the page) can clear to signal "resume".
const CONTROL_BAR_SCRIPT: &str = r#"
(() => {
  if (window.surfariMode === undefined) {
    window.surfariMode = true;
  }
  if (!document.getElementById('nav-agent-control-bar')) {
    const bar = document.createElement('div');
    bar.id = 'nav-agent-control-bar';
    bar.style.cssText = 'position:fixed;top:0;left:0;right:0;z-index:2147483647;background:#222;color:#fff;padding:8px;font-family:sans-serif;';
    bar.textContent = 'Navigation agent is waiting for you. Click Resume when done.';
    const btn = document.createElement('button');
    btn.textContent = 'Resume';
    btn.style.marginLeft = '12px';
    btn.onclick = () => { window.surfariMode = false; bar.remove(); };
    bar.appendChild(btn);
    document.body.appendChild(bar);
  }
})();
"#;

/// Polls `window.surfariMode` once a second for up to `polling_times`
/// seconds (spec.md §4.8 "Hand-off to human"). Returns `true` if the user
/// resumed (flag cleared, or the page navigated away), `false` on timeout.
async fn human_handoff(driver: &dyn PageDriver, polling_times: u64) -> Result<bool> {
    let start_url = driver.current_url().await.unwrap_or_default();
    driver.evaluate(CONTROL_BAR_SCRIPT).await?;

    for _ in 0..polling_times {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let resumed = driver
            .evaluate("window.surfariMode === false")
            .await
            .ok()
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if resumed {
            return Ok(true);
        }
        if let Ok(url) = driver.current_url().await {
            if url != start_url {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Runs one task to completion: loads replay (if configured), drives the
/// turn loop up to `config.max_turns`, records the run, flushes token
/// usage, and tears down every tab it opened.
pub async fn run_task(ctx: std::sync::Arc<AgentContext>, task: Task) -> Result<TaskOutcome> {
    let config: &Config = &ctx.config;
    let masker = Masker::for_task(&config.masking, &task.goal);

    let page = ctx.browser.open_new_tab().await?;
    let mut tabs = TabSet::new(Box::new(page));

    if let Some(url) = &task.url {
        let validated = nav_browser::validate_url(url)?;
        tabs.current().navigate(&validated, Duration::from_secs(30)).await?;
    }

    let hash = task_hash(&task.goal);
    let mut cursor = ReplayCursor::disarmed();
    let mut parameterized_hash: Option<String> = None;
    let mut parameterized_text: Option<String> = None;
    let mut variables: HashMap<String, String> = HashMap::new();

    if task.options.record_and_replay {
        match ctx.replay_store.find(task.site_id, &hash) {
            Ok(Some(rec)) => {
                cursor = ReplayCursor::arm(&rec.chat_history);
                NavEvent::ReplayHit { task_hash: hash.clone(), parameterized: false }.emit();
            }
            Ok(None) if task.options.parameterize_replay => {
                if let Some(provider) = ctx.providers.get(&ctx.default_provider_id) {
                    match nav_replay::parameterize(provider.as_ref(), &task.goal, None).await {
                        Ok(templ) => {
                            variables = templ.variables.clone();
                            parameterized_hash = Some(templ.hash.clone());
                            parameterized_text = Some(templ.template_text.clone());
                            match ctx.replay_store.find_parameterized(task.site_id, &templ.hash) {
                                Ok(Some(rec)) => {
                                    let mut history = rec.chat_history.clone();
                                    if let Some(recorded_vars) = &rec.variables {
                                        nav_replay::substitute_variables(&mut history, recorded_vars, &variables);
                                    }
                                    cursor = ReplayCursor::arm(&history);
                                    NavEvent::ReplayHit { task_hash: templ.hash, parameterized: true }.emit();
                                }
                                Ok(None) => NavEvent::ReplayMiss { task_hash: hash.clone() }.emit(),
                                Err(e) => tracing::warn!(error = %e, "replay store lookup failed"),
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "task parameterization failed, proceeding without replay");
                            NavEvent::ReplayMiss { task_hash: hash.clone() }.emit();
                        }
                    }
                }
            }
            Ok(None) => NavEvent::ReplayMiss { task_hash: hash.clone() }.emit(),
            Err(e) => tracing::warn!(error = %e, "replay store lookup failed"),
        }
    }

    let mut history: Vec<ChatMessage> = vec![ChatMessage::user(task.goal.clone())];
    let has_tools = !ctx.tools.definitions().is_empty();
    let system_prompt = navigation_system_prompt(&config.delegation, has_tools);

    let mut last_known_tab_id = tabs.current_id().to_string();
    let mut turns: u32 = 0;
    let mut final_answer = String::new();
    let mut success = false;

    'turns: for turn in 1..=config.max_turns {
        turns = turn;
        NavEvent::TurnStarted { site_name: task.site_name.clone(), turn }.emit();

        let events = tabs.current().poll_events();
        for event in &events {
            if let nav_domain::page_driver::PageEvent::Popup { page_id } = event {
                if let Ok(popup) = ctx.browser.attach_to_target(page_id).await {
                    tabs.push_and_focus(Box::new(popup));
                }
            }
        }

        if let Some(notice) = tabs.switch_notice(&last_known_tab_id).await.ok().flatten() {
            history.push(ChatMessage::user(notice));
        }
        last_known_tab_id = tabs.current_id().to_string();

        let _ = tabs
            .current()
            .wait_for_state(nav_domain::page_driver::WaitState::NetworkIdle, Duration::from_secs(5))
            .await;

        let pdf_path = crate::pdf::detect_and_save(&events, &config.downloads_root, &site_folder(&task.site_name))
            .await
            .unwrap_or(None);
        let pdf_hint = pdf_path.is_some();

        let distilled = nav_distiller::distill(tabs.current(), pdf_hint).await?;
        let mut index: LocatorIndex = distilled.locator_index;
        let (masked_text, mask_map) = if task.options.mask_data {
            masker.mask(&distilled.text)
        } else {
            (distilled.text.clone(), nav_masker::MaskMap::default())
        };
        history.push(ChatMessage::user(navigation_user_message(&masked_text)));

        let via_replay = cursor.is_armed();
        let (assistant_msg, mut payload) = if via_replay {
            let msg = cursor.next_message().expect("is_armed implies a message");
            let payload = payload_from_assistant(&msg);
            (msg, payload)
        } else {
            let provider = ctx
                .providers
                .get(&ctx.default_provider_id)
                .ok_or_else(|| Error::Config(format!("unknown provider id {:?}", ctx.default_provider_id)))?;
            let req = ChatRequest {
                system: system_prompt.clone(),
                messages: history.clone(),
                tools: ctx.tools.definitions(),
                temperature: Some(0.0),
                max_tokens: None,
                json_mode: true,
                model: None,
                image: None,
                purpose: "navigation".to_string(),
                site_id: Some(task.site_id),
            };
            let started = std::time::Instant::now();
            let resp = provider.chat(req).await?;
            ctx.record_usage("navigation", &token_usage_from(&resp, provider.provider_id()));
            NavEvent::ModelCalled {
                purpose: "navigation".into(),
                model: resp.model.clone(),
                prompt_tokens: resp.usage.as_ref().map(|u| u.prompt_tokens as u64),
                completion_tokens: resp.usage.as_ref().map(|u| u.completion_tokens as u64),
                duration_ms: started.elapsed().as_millis() as u64,
            }
            .emit();

            let msg = if !resp.tool_calls.is_empty() {
                ChatMessage::assistant_tool_calls(resp.tool_calls.clone())
            } else {
                ChatMessage::assistant_text(resp.content.clone())
            };
            let payload = payload_from_assistant(&msg);
            (msg, payload)
        };
        history.push(assistant_msg);

        if let TurnPayload::Tools(tool_calls) = payload {
            let results = ctx
                .tools
                .execute(&tool_calls, Duration::from_secs(config.tool_call_timeout_s), tool_calls.len() > 1, false)
                .await;
            for r in results {
                let payload_text = r
                    .result
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| r.error.unwrap_or_else(|| "{}".to_string()));
                history.push(ChatMessage::tool_result(r.name, r.id, payload_text));
            }
            continue 'turns;
        }

        let TurnPayload::Steps(mut response) = payload else { unreachable!() };

        if via_replay && matches!(response.step_execution, Some(StepExecution::Success)) {
            // A recorded SUCCESS always gets a live review on replay; queued
            // recorded turns past this point would only apply if the claim
            // is rejected, which the original task never needed to do.
            cursor.disarm();
        }

        if matches!(response.step_execution, Some(StepExecution::Single) | Some(StepExecution::Sequence)) {
            let current_url = tabs.current().current_url().await.unwrap_or_default();
            let secret = SecretSource { store: &ctx.credentials, site_name: &task.site_name };
            let configured = ctx.configured_resolver.as_deref();
            let resolved =
                resolve_missing_values(&mut response, &current_url, Some(&secret), configured, &task.goal, task.site_id).await?;
            if !resolved {
                NavEvent::DelegatedToUser { reason: response.reasoning.clone() }.emit();
            }
        }

        match response.step_execution {
            Some(StepExecution::Success) => {
                let review_provider = ctx.providers.get(&ctx.default_provider_id);
                let verdict = match &review_provider {
                    Some(p) => review_success(p.as_ref(), &history, task.site_id).await.unwrap_or_else(|_| ReviewVerdict {
                        review_decision: "Goal Not Met".into(),
                        review_feedback: String::new(),
                    }),
                    None => ReviewVerdict { review_decision: "Goal Not Met".into(), review_feedback: "no review provider configured".into() },
                };

                if verdict.goal_met() {
                    let raw = response.answer.clone().unwrap_or_default();
                    final_answer = mask_map.unmask(&raw);
                    success = true;
                    NavEvent::TaskCompleted { site_name: task.site_name.clone(), turns, answer: final_answer.clone() }.emit();
                    break 'turns;
                }
                history.push(ChatMessage::user(format!("Error: {}", verdict.review_feedback)));
            }
            Some(StepExecution::Wait) => {
                tokio::time::sleep(Duration::from_millis(800)).await;
            }
            Some(StepExecution::Back) => {
                let _ = tabs.current().evaluate("window.history.back()").await;
            }
            Some(StepExecution::DismissModal) => {
                let _ = tabs
                    .current()
                    .evaluate("document.dispatchEvent(new KeyboardEvent('keydown', {key: 'Escape', bubbles: true}))")
                    .await;
            }
            Some(StepExecution::CloseCurrentTab) => {
                if let Err(e) = tabs.close_current().await {
                    history.push(ChatMessage::user(format!("Error: {e}")));
                }
            }
            Some(StepExecution::DelegateToUser) => {
                let provider = ctx.providers.get(&ctx.default_provider_id);
                let verdict = match &provider {
                    Some(p) => review_delegation(p.as_ref(), &history, task.site_id).await.unwrap_or_else(|_| ReviewVerdict {
                        review_decision: "Delegate to User".into(),
                        review_feedback: String::new(),
                    }),
                    None => ReviewVerdict { review_decision: "Delegate to User".into(), review_feedback: String::new() },
                };

                if verdict.is_suggestion() {
                    history.push(ChatMessage::user(format!("Wait: {}", verdict.review_feedback)));
                } else {
                    let resumed = human_handoff(tabs.current(), config.browser.hil_polling_times).await.unwrap_or(false);
                    if resumed {
                        history.push(ChatMessage::user("The user has taken over and resumed the task.".to_string()));
                    } else {
                        final_answer = "Task timed out waiting for the user to take over.".to_string();
                        success = false;
                        NavEvent::TaskFailed { site_name: task.site_name.clone(), reason: "human handoff timed out".into() }.emit();
                        break 'turns;
                    }
                }
            }
            Some(StepExecution::DelegateToAgent) => {
                let first = response.steps().first().map(|s| (s.target.clone(), s.value.clone().unwrap_or_default()));
                match first {
                    Some((target, sub_goal)) => match config.delegation.find(&target) {
                        Some(site_name) => {
                            let site_name = site_name.to_string();
                            NavEvent::DelegatedToAgent { target_site: site_name.clone(), spawned: true }.emit();
                            let sub_task = Task {
                                goal: sub_goal,
                                site_id: task.site_id,
                                site_name: site_name.clone(),
                                url: None,
                                options: task.options.clone(),
                            };
                            // `DELEGATE_TO_AGENT` does not inherit the parent's
                            // chat history (SPEC_FULL.md §D.2).
                            match Box::pin(run_task(ctx.clone(), sub_task)).await {
                                Ok(sub_outcome) => {
                                    history.push(ChatMessage::user(format!(
                                        "Delegated sub-task to {site_name} finished: {}",
                                        sub_outcome.answer
                                    )));
                                }
                                Err(e) => {
                                    history.push(ChatMessage::user(format!("Error: delegated sub-task to {site_name} failed: {e}")));
                                }
                            }
                        }
                        None => {
                            NavEvent::DelegatedToAgent { target_site: target.clone(), spawned: false }.emit();
                            let allowed = config
                                .delegation
                                .sites
                                .iter()
                                .map(|s| s.to_lowercase())
                                .collect::<Vec<_>>()
                                .join(", ");
                            history.push(ChatMessage::user(format!(
                                "Site not found for delegation: {target}. It must match one of the provided sites: {allowed}"
                            )));
                        }
                    },
                    None => history.push(ChatMessage::user("Error: DELEGATE_TO_AGENT carried no target".to_string())),
                }
            }
            Some(StepExecution::Single) | Some(StepExecution::Sequence) => {
                let mut steps = response.into_steps();

                if steps.iter().any(|s| s.value.as_deref() == Some("OTP") || s.value.as_deref() == Some("*")) {
                    match &ctx.otp_fetcher {
                        Some(fetcher) => match fetcher.fetch().await {
                            Ok(code) => {
                                let applied = nav_resolver::otp::apply_otp(&mut steps, &code);
                                NavEvent::OtpApplied { per_digit: steps.len() > 1, digits: applied }.emit();
                            }
                            Err(e) => {
                                history.push(ChatMessage::user(format!("Error: could not fetch OTP: {e}")));
                                continue 'turns;
                            }
                        },
                        None => {
                            history.push(ChatMessage::user("Error: OTP requested but no OTP fetcher is configured".to_string()));
                            continue 'turns;
                        }
                    }
                }

                for step in steps.iter_mut() {
                    if let Some(v) = &step.value {
                        step.value = Some(mask_map.unmask(v));
                    }
                    step.orig_target = Some(step.target.clone());
                    step.target = mask_map.unmask(&step.target);
                }

                for step in steps.iter_mut() {
                    step.locator = nav_distiller::resolve::resolve(&index, &step.target);
                }

                if via_replay && steps.first().map(|s| s.locator.is_none()).unwrap_or(false) {
                    let mut resolved_after_retry = false;
                    for _ in 0..LOCATOR_RETRY_ATTEMPTS {
                        tokio::time::sleep(LOCATOR_RETRY_SLEEP).await;
                        if let Ok(fresh) = nav_distiller::distill(tabs.current(), false).await {
                            index = fresh.locator_index;
                            steps[0].locator = nav_distiller::resolve::resolve(&index, &steps[0].target);
                            if steps[0].locator.is_some() {
                                resolved_after_retry = true;
                                break;
                            }
                        }
                    }
                    if !resolved_after_retry {
                        cursor.disarm();
                    }
                }

                if let Some(first) = steps.first() {
                    if first.locator.is_none() {
                        NavEvent::StepResolved { action: format!("{:?}", first.action), target: first.target.clone(), resolved: false }
                            .emit();
                        history.push(ChatMessage::user(format!("Error: could not locate \"{}\" on the page", first.target)));
                        continue 'turns;
                    }
                }

                let outcome = nav_executor::execute_steps(tabs.current(), &mut steps, &index).await?;
                for step in &steps {
                    NavEvent::ActionExecuted {
                        action: format!("{:?}", step.action),
                        target: step.target.clone(),
                        result: step.result.clone().unwrap_or_default(),
                    }
                    .emit();
                }
                if outcome.error_count > 0 {
                    let failures: Vec<String> = steps
                        .iter()
                        .filter_map(|s| s.result.as_ref().map(|r| format!("{}: {r}", s.target)))
                        .collect();
                    history.push(ChatMessage::user(format!("Error: {}", failures.join("; "))));
                }
            }
            None => {
                history.push(ChatMessage::user("Error: response did not specify a recognized step_execution".to_string()));
            }
        }
    }

    if turns >= config.max_turns && !success && final_answer.is_empty() {
        let last_user_text = history.iter().rev().find_map(|m| m.text()).unwrap_or("");
        final_answer = format!("Task did not complete within {} turns. Last note: {}", config.max_turns, last_user_text);
    }

    if task.options.record_and_replay {
        let recording = Recording {
            task_id: 0,
            site_id: task.site_id,
            site_name: task.site_name.clone(),
            task_hash: hash,
            task_text: task.goal.clone(),
            parameterized_hash,
            parameterized_text,
            chat_history: history.clone(),
            variables: if variables.is_empty() { None } else { Some(variables) },
            created_at: Utc::now(),
        };
        if let Err(e) = ctx.replay_store.save(&recording, success, config.replay.save_successful_task_only) {
            tracing::warn!(error = %e, "failed to save replay recording");
        }
    }

    if let Err(e) = ctx.flush_usage_to_stats() {
        tracing::warn!(error = %e, "failed to flush token usage to stats store");
    }

    tabs.close_all().await;

    if !success {
        NavEvent::TaskFailed { site_name: task.site_name.clone(), reason: final_answer.clone() }.emit();
    }

    Ok(TaskOutcome { success, answer: final_answer, turns })
}
