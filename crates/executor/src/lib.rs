//! Page Action Executor (C10, spec.md §4.10): takes the locator-resolved
//! steps for one turn and drives them against a live [`PageDriver`],
//! returning how many failed and whether the turn was cut short.
//!
//! Element selection, scroll-into-view, and the expansion watch live here;
//! the native-vs-synthetic click/check fallback does not — `nav-browser`'s
//! `CdpPageDriver` already performs that inside `click`/`set_checked`
//! (spec.md §4.10 step 4 describes it as a property of the driver, not the
//! executor), so this crate calls the driver trait directly and never
//! reimplements it.

pub mod expansion;

use std::time::Duration;

use nav_domain::error::{Error, Result};
use nav_domain::llm::{LlmStep, StepAction};
use nav_domain::locator::LocatorIndex;
use nav_domain::page_driver::{ElementHandle, PageDriver, QueriedElement, ScrollTarget};

const NATIVE_TIMEOUT: Duration = Duration::from_secs(10);
const PER_KEY_DELAY_MS: u64 = 20;
const RESULT_TRUNCATE_LEN: usize = 200;

/// Summary of one turn's worth of step execution (spec.md §4.10 "Results").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub error_count: u32,
    /// True when an expansion was detected and the remaining steps in the
    /// turn were skipped (spec.md §4.10 step 4).
    pub stopped_early: bool,
}

/// A step's outcome, expressed as the driver-facing taxonomy (spec.md
/// §4.10 "Failure taxonomy"). All variants are recoverable within the
/// outer loop — they are written back into `step.result`, never
/// propagated as a hard error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    NoLocator,
    NotInteractable,
    Disabled,
    Timeout,
    Unsupported,
    Generic,
}

impl Failure {
    fn label(self) -> &'static str {
        match self {
            Failure::NoLocator => "NoLocator",
            Failure::NotInteractable => "NotInteractable",
            Failure::Disabled => "Disabled",
            Failure::Timeout => "Timeout",
            Failure::Unsupported => "Unsupported",
            Failure::Generic => "Generic",
        }
    }
}

fn truncate_result(s: &str) -> String {
    if s.chars().count() > RESULT_TRUNCATE_LEN {
        let head: String = s.chars().take(RESULT_TRUNCATE_LEN).collect();
        format!("{head}...")
    } else {
        s.to_string()
    }
}

fn classify_driver_error(err: &Error) -> Failure {
    match err {
        Error::Timeout(_) => Failure::Timeout,
        _ => Failure::Generic,
    }
}

/// "First visible, else first" (spec.md §4.10 step 1).
fn pick_element(candidates: &[QueriedElement]) -> Option<&QueriedElement> {
    candidates
        .iter()
        .find(|c| c.visible)
        .or_else(|| candidates.first())
}

async fn query_candidates(driver: &dyn PageDriver, index: &LocatorIndex, step: &LlmStep) -> Result<Vec<QueriedElement>> {
    let Some(handle) = step.locator else {
        return Ok(Vec::new());
    };
    let Some(entry) = index.get(handle) else {
        return Ok(Vec::new());
    };

    if !entry.locator_string.is_empty() {
        let found = driver.query_by_role(&entry.locator_string).await?;
        if !found.is_empty() {
            return Ok(found);
        }
    }
    driver.query_by_xpath(&entry.xpath).await
}

async fn scroll_into_view(driver: &dyn PageDriver, el: &ElementHandle) -> Result<()> {
    let script = format!(
        "(() => {{ const el = document.querySelector('[data-nav-locator=\"{}\"]'); \
         if (el) el.scrollIntoView({{block: 'center', inline: 'center'}}); }})()",
        el.0
    );
    driver.evaluate(&script).await.map(|_| ())
}

/// Runs every step of one turn in order, stopping early if an expansion is
/// detected around a `fill` (spec.md §4.10 step 4) or if a whole-turn
/// `scroll(target="page")` is encountered (spec.md §4.10 step 5, which is
/// the only step in the turn in that case).
pub async fn execute_steps(driver: &dyn PageDriver, steps: &mut [LlmStep], index: &LocatorIndex) -> Result<ExecutionOutcome> {
    let mut outcome = ExecutionOutcome::default();

    for step in steps.iter_mut() {
        if step.action == StepAction::Scroll && step.target.trim().eq_ignore_ascii_case("page") {
            let result = match driver.scroll(None, ScrollTarget::Bottom).await {
                Ok(()) => "scrolled page".to_string(),
                Err(e) => {
                    outcome.error_count += 1;
                    format!("{}: {e}", classify_driver_error(&e).label())
                }
            };
            step.result = Some(truncate_result(&result));
            outcome.stopped_early = true;
            break;
        }

        if step.action == StepAction::Run {
            let script = step.value.as_deref().unwrap_or_default();
            let result = match driver.evaluate(script).await {
                Ok(v) => v.to_string(),
                Err(e) => {
                    outcome.error_count += 1;
                    format!("{}: {e}", classify_driver_error(&e).label())
                }
            };
            step.result = Some(truncate_result(&result));
            continue;
        }

        let candidates = match query_candidates(driver, index, step).await {
            Ok(c) => c,
            Err(e) => {
                outcome.error_count += 1;
                step.result = Some(truncate_result(&format!("{}: {e}", classify_driver_error(&e).label())));
                continue;
            }
        };

        let Some(target) = pick_element(&candidates) else {
            outcome.error_count += 1;
            step.result = Some(truncate_result(&format!("{}: no matching element", Failure::NoLocator.label())));
            continue;
        };

        if target.disabled {
            outcome.error_count += 1;
            step.result = Some(truncate_result(&format!("{}: element is disabled", Failure::Disabled.label())));
            continue;
        }

        let el = target.handle.clone();
        let _ = scroll_into_view(driver, &el).await;

        let (result, failed, watch_fill) = run_action(driver, step, &el).await;
        if failed {
            outcome.error_count += 1;
        }
        step.result = Some(truncate_result(&result));

        if let Some(before) = watch_fill {
            match expansion::changed_significantly(driver, &el.0, &before).await {
                Ok(true) => {
                    outcome.stopped_early = true;
                    break;
                }
                Ok(false) => {}
                Err(_) => {}
            }
        }
    }

    Ok(outcome)
}

/// Dispatches one non-scroll, non-run step and runs it, returning the
/// result string, whether it failed, and (for `fill`) the pre-action
/// expansion-watch snapshot to compare against afterwards.
async fn run_action(
    driver: &dyn PageDriver,
    step: &LlmStep,
    el: &ElementHandle,
) -> (String, bool, Option<expansion::WatchSnapshot>) {
    match step.action {
        StepAction::Click => match driver.click(el, NATIVE_TIMEOUT).await {
            Ok(()) => ("clicked".to_string(), false, None),
            Err(e) => (format!("{}: {e}", classify_driver_error(&e).label()), true, None),
        },
        StepAction::Fill => {
            let value = step.value.clone().unwrap_or_default();
            let before = expansion::before(driver, &el.0).await.ok();
            match driver.fill(el, &value, PER_KEY_DELAY_MS).await {
                Ok(()) => ("filled".to_string(), false, before),
                Err(e) => (format!("{}: {e}", classify_driver_error(&e).label()), true, None),
            }
        }
        StepAction::Select => {
            let value = step.value.clone().unwrap_or_default();
            match driver.select(el, &value).await {
                Ok(()) => ("selected".to_string(), false, None),
                Err(e) => (format!("{}: {e}", classify_driver_error(&e).label()), true, None),
            }
        }
        StepAction::Check => match driver.set_checked(el, true).await {
            Ok(()) => ("checked".to_string(), false, None),
            Err(e) => (format!("{}: {e}", classify_driver_error(&e).label()), true, None),
        },
        StepAction::Uncheck => match driver.set_checked(el, false).await {
            Ok(()) => ("unchecked".to_string(), false, None),
            Err(e) => (format!("{}: {e}", classify_driver_error(&e).label()), true, None),
        },
        StepAction::Scroll | StepAction::Run => {
            (format!("{}: handled earlier in the dispatch loop", Failure::Unsupported.label()), true, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nav_domain::locator::{BoundingBox, LocatorEntry};
    use nav_domain::page_driver::{PageEvent, WaitState};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeDriver {
        eval_calls: AtomicUsize,
        eval_responses: Mutex<Vec<serde_json::Value>>,
        query_results: Mutex<Vec<QueriedElement>>,
    }

    impl FakeDriver {
        fn new() -> Self {
            FakeDriver {
                eval_calls: AtomicUsize::new(0),
                eval_responses: Mutex::new(Vec::new()),
                query_results: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PageDriver for FakeDriver {
        fn id(&self) -> &str {
            "fake"
        }
        async fn current_url(&self) -> Result<String> {
            Ok("https://acme.test".into())
        }
        async fn navigate(&self, _url: &str, _timeout: Duration) -> Result<()> {
            Ok(())
        }
        async fn evaluate(&self, _script: &str) -> Result<serde_json::Value> {
            let i = self.eval_calls.fetch_add(1, Ordering::SeqCst);
            let responses = self.eval_responses.lock().unwrap();
            Ok(responses
                .get(i)
                .cloned()
                .unwrap_or_else(|| serde_json::json!({"count": 10, "hasPopup": false, "ariaExpanded": null})))
        }
        async fn query_by_role(&self, _q: &str) -> Result<Vec<QueriedElement>> {
            Ok(self.query_results.lock().unwrap().clone())
        }
        async fn query_by_xpath(&self, _xpath: &str) -> Result<Vec<QueriedElement>> {
            Ok(self.query_results.lock().unwrap().clone())
        }
        async fn click(&self, _el: &ElementHandle, _timeout: Duration) -> Result<()> {
            Ok(())
        }
        async fn fill(&self, _el: &ElementHandle, _value: &str, _delay: u64) -> Result<()> {
            Ok(())
        }
        async fn select(&self, _el: &ElementHandle, _value: &str) -> Result<()> {
            Ok(())
        }
        async fn set_checked(&self, _el: &ElementHandle, _checked: bool) -> Result<()> {
            Ok(())
        }
        async fn scroll(&self, _el: Option<&ElementHandle>, _to: ScrollTarget) -> Result<()> {
            Ok(())
        }
        async fn screenshot(&self) -> Result<Vec<u8>> {
            Ok(vec![])
        }
        async fn wait_for_state(&self, _state: WaitState, _timeout: Duration) -> Result<()> {
            Ok(())
        }
        fn poll_events(&self) -> Vec<PageEvent> {
            vec![]
        }
        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn indexed_click_step(index: &mut LocatorIndex) -> LlmStep {
        let handle = index.insert(
            "Login".into(),
            LocatorEntry {
                display_token: "[Login]".into(),
                frame_id: "main".into(),
                bounding_box: BoundingBox::default(),
                xpath: "/html/body/button".into(),
                locator_string: "role=button[name=Login]".into(),
                label_text: None,
            },
        );
        LlmStep {
            action: StepAction::Click,
            target: "[Login]".into(),
            value: None,
            resolve_value: None,
            locator: Some(handle),
            is_expandable: None,
            result: None,
            orig_value: None,
            orig_target: None,
        }
    }

    fn visible_element() -> QueriedElement {
        QueriedElement {
            handle: ElementHandle("el-1".into()),
            bounding_box: BoundingBox { x: 0.0, y: 0.0, w: 10.0, h: 10.0 },
            visible: true,
            disabled: false,
        }
    }

    #[tokio::test]
    async fn clicks_resolved_step_successfully() {
        let mut index = LocatorIndex::new();
        let mut steps = vec![indexed_click_step(&mut index)];
        let driver = FakeDriver::new();
        *driver.query_results.lock().unwrap() = vec![visible_element()];

        let outcome = execute_steps(&driver, &mut steps, &index).await.unwrap();
        assert_eq!(outcome.error_count, 0);
        assert!(!outcome.stopped_early);
        assert_eq!(steps[0].result.as_deref(), Some("clicked"));
    }

    #[tokio::test]
    async fn no_candidates_reports_no_locator() {
        let mut index = LocatorIndex::new();
        let mut steps = vec![indexed_click_step(&mut index)];
        let driver = FakeDriver::new();

        let outcome = execute_steps(&driver, &mut steps, &index).await.unwrap();
        assert_eq!(outcome.error_count, 1);
        assert!(steps[0].result.as_deref().unwrap().starts_with("NoLocator"));
    }

    #[tokio::test]
    async fn disabled_element_reports_disabled_and_continues() {
        let mut index = LocatorIndex::new();
        let mut steps = vec![indexed_click_step(&mut index)];
        let driver = FakeDriver::new();
        *driver.query_results.lock().unwrap() = vec![QueriedElement { disabled: true, ..visible_element() }];

        let outcome = execute_steps(&driver, &mut steps, &index).await.unwrap();
        assert_eq!(outcome.error_count, 1);
        assert!(steps[0].result.as_deref().unwrap().starts_with("Disabled"));
    }

    #[tokio::test]
    async fn fill_expansion_stops_remaining_steps() {
        let mut index = LocatorIndex::new();
        let fill_handle = index.insert(
            "Search".into(),
            LocatorEntry {
                display_token: "[Search]".into(),
                frame_id: "main".into(),
                bounding_box: BoundingBox::default(),
                xpath: "/html/body/input".into(),
                locator_string: "role=textbox".into(),
                label_text: None,
            },
        );
        let fill_step = LlmStep {
            action: StepAction::Fill,
            target: "[Search]".into(),
            value: Some("macbook".into()),
            resolve_value: None,
            locator: Some(fill_handle),
            is_expandable: None,
            result: None,
            orig_value: None,
            orig_target: None,
        };
        let mut next_step = indexed_click_step(&mut index);
        next_step.target = "[Next]".into();
        let mut steps = vec![fill_step, next_step];

        let driver = FakeDriver::new();
        *driver.query_results.lock().unwrap() = vec![visible_element()];
        *driver.eval_responses.lock().unwrap() = vec![
            serde_json::json!({"count": 100, "hasPopup": false, "ariaExpanded": null}),
            serde_json::json!({"count": 160, "hasPopup": true, "ariaExpanded": null}),
        ];

        let outcome = execute_steps(&driver, &mut steps, &index).await.unwrap();
        assert!(outcome.stopped_early);
        assert_eq!(steps[0].result.as_deref(), Some("filled"));
        assert!(steps[1].result.is_none());
    }

    #[tokio::test]
    async fn page_scroll_is_a_whole_turn_action() {
        let mut index = LocatorIndex::new();
        let scroll_step = LlmStep {
            action: StepAction::Scroll,
            target: "page".into(),
            value: None,
            resolve_value: None,
            locator: None,
            is_expandable: None,
            result: None,
            orig_value: None,
            orig_target: None,
        };
        let mut trailing = indexed_click_step(&mut index);
        trailing.target = "[Ignored]".into();
        let mut steps = vec![scroll_step, trailing];
        let driver = FakeDriver::new();

        let outcome = execute_steps(&driver, &mut steps, &index).await.unwrap();
        assert!(outcome.stopped_early);
        assert_eq!(steps[0].result.as_deref(), Some("scrolled page"));
        assert!(steps[1].result.is_none());
    }

    #[test]
    fn truncates_long_results_with_ellipsis() {
        let long = "x".repeat(250);
        let truncated = truncate_result(&long);
        assert_eq!(truncated.len(), RESULT_TRUNCATE_LEN + 3);
        assert!(truncated.ends_with("..."));
    }
}
