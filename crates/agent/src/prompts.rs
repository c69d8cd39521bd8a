//! System prompt templates for the navigation turn and its two reviewer
//! passes (spec.md §4.8). Kept as plain `format!` assembly rather than a
//! template engine, matching the rest of the workspace's preference for
//! explicit string construction over a templating dependency.

use nav_domain::config::delegation::DelegationConfig;

const ANNOTATION_GUIDE: &str = r#"
Interactable elements and actions:

1. [Label] - clickable element -> action "click"
2. [[Label]] - expandable element -> action "click"; reveals additional
   options (filters, accounts, menu items)
3. {value} - input field with current value -> action "fill"
   - filling may expand a matching-options list below it; if so you must
     click the matching option to confirm
   - match the current field's format when incrementing/decrementing
3.1 {value-min-max-step} - range input, e.g. {50-0-100-1} -> action "fill",
   constrained by min/max/step
4. {{Prompt}} - combobox with visible options listed as "- Option" lines
   -> action "select" with the exact, whole option text as value
5. [B], [E] - buttons; [E] expands additional content -> action "click"
6. [X] - close/delete button -> action "click"
7. [up], [down], [left], [right] - increment/decrement or prev/next -> "click"
8. unchecked checkbox -> "check"; checked checkbox -> "uncheck"
9. unselected radio -> "check"; selected radio -> "uncheck"

Disambiguation by index: identical elements get a numeric suffix, e.g.
"[Option]1", "[Option]2", "{0}1", "{0}2".

Calendar date disambiguation:
1. A month without a year assumes the current year.
2. A date without month/year assumes the current month and year.
3. Never scroll the calendar to a different year unless stated explicitly.
4. If the same day number appears in more than one visible month, the
   earlier month always has the smaller index (January 1 = [1]1,
   February 1 = [1]2).

When a modal has focus, its content is prefixed with a modal marker.
"#;

const RESPONSE_FORMAT_EXAMPLES: &str = r#"
Responses must be valid JSON, double-quoted, no text outside the JSON.

Task complete (cannot be SUCCESS if delegation is required):
{"step_execution": "SUCCESS", "reasoning": "...", "answer": "$1234.56"}

Page still loading after an action such as search:
{"step_execution": "WAIT", "reasoning": "clicked search, results not loaded yet"}

Need to return to the previous page:
{"step_execution": "BACK", "reasoning": "..."}

A tab was opened by mistake or is no longer needed; close it and return to
the previous tab (use this instead of BACK):
{"step_execution": "CLOSE_CURRENT_TAB", "reasoning": "..."}

Only when a modal blocks further progress and no close target can be found:
{"step_execution": "DISMISS_MODAL", "reasoning": "..."}

Last resort, stuck or need user input/confirmation. Try BACK to recover from
a wrong turn, attempt WAIT at least once, and check for fields hidden until
another action is taken before giving up:
{"step_execution": "DELEGATE_TO_USER", "reasoning": "..."}

One action (step_execution "SINGLE"):
{"step": {"action": "fill", "target": "{Search}", "value": "Macbook Pro"},
 "step_execution": "SINGLE", "reasoning": "..."}

Value not yet known - set "resolve_value" to the exact question to put to
the user instead of "value" (never guess a default):
{"step": {"action": "fill", "target": "{Search}", "resolve_value": "Please enter a product name:"},
 "step_execution": "SINGLE", "reasoning": "..."}

Login fields with an unknown value use the fixed placeholders
"UsernameAssistant" / "PasswordAssistant" for resolve_value:
{"step": {"action": "fill", "target": "{Login ID}", "resolve_value": "UsernameAssistant"},
 "step_execution": "SINGLE", "reasoning": "..."}

Scrolling the whole page is the only "page"-target action, value "down" or
"up":
{"step": {"action": "scroll", "target": "page", "value": "down"},
 "step_execution": "SINGLE", "reasoning": "..."}

Multiple actions in order use "steps" and step_execution "SEQUENCE":
{"steps": [
   {"action": "fill", "target": "{Search}", "value": "Macbook Pro"},
   {"action": "select", "target": "{{Color}}", "value": "Grey"},
   {"action": "click", "target": "[Go]"}
 ], "step_execution": "SEQUENCE", "reasoning": "..."}
"#;

const RULES: &str = r#"
Rules:
- Return only valid JSON, no text outside it.
- Valid actions: click, fill, select, check, uncheck, scroll, run. Each
  needs a target.
- SUCCESS, WAIT, BACK, DISMISS_MODAL, DELEGATE_TO_USER, CLOSE_CURRENT_TAB
  must not carry step/steps.
- Never guess a target; use only annotated ones exactly as shown, including
  casing, spacing, brackets and indices.
- One target per action; target, reasoning, answer are strings, never lists.
- Always prefer a text message for OTP delivery when offered a choice.
- OTP is filled with value "OTP" for a single field, or "*" per digit box
  (target must carry the digit position).
- Use decimal format for currency, e.g. 1000 -> "1000.00".
- Skip "remember username" options; select "remember this device" after 2FA
  when offered.
- Do not refill a field that already holds the correct value.
- Dismiss popups or modals unrelated to the task.
- A prior turn's feedback beginning with "Error:" or "Wait:" means the last
  course of action must change - never repeat a failed action; delegate to
  the user after a few failed attempts.
"#;

fn agent_delegation_part(delegation: &DelegationConfig) -> String {
    if delegation.sites.is_empty() {
        return String::new();
    }
    let sites = delegation.sites.join(", ");
    format!(
        r#"
To pause here and hand a sub-task to another navigation assistant on a
different site:
{{"step": {{"action": "run", "target": "<site name>", "value": "<sub-task>"}},
 "step_execution": "DELEGATE_TO_AGENT", "reasoning": "..."}}

Target must exactly match one of: {sites}. Don't combine with other
step_execution values. The delegated result comes back as feedback.
"#
    )
}

fn tool_call_part(has_tools: bool) -> &'static str {
    if has_tools {
        r#"
Tools are available with their own schemas. Call one only when the
necessary data is already on the page or from a prior step - never invent
arguments. Prefer one well-formed call per turn over several partial ones.
"#
    } else {
        ""
    }
}

/// The main navigation-turn system prompt (spec.md §4.8 "AskModel").
pub fn navigation_system_prompt(delegation: &DelegationConfig, has_tools: bool) -> String {
    format!(
        "You are an expert web navigation assistant. Your task is to perform \
specific actions on web pages to reach a goal. You will receive a textual \
layout of the page with structured annotations. Pages are dynamic - always \
check the current state before acting. Filling one field commonly triggers \
another field appearing or a dropdown populating. Treat everything as plain \
text except the annotated elements below.\n\
---\n{ANNOTATION_GUIDE}\n---\n{RESPONSE_FORMAT_EXAMPLES}\n\
{}\n---\n{RULES}\n{}\n\
The first user message states the goal. Earlier turns are provided for context.",
        agent_delegation_part(delegation),
        tool_call_part(has_tools),
    )
}

/// Wraps one turn's distilled (and possibly masked) page text as the user
/// message (spec.md §4.8 step "Distill").
pub fn navigation_user_message(page_content: &str) -> String {
    format!(
        "The page currently looks like this. Interactable elements (and their \
disambiguation index) may have changed since the last turn.\n{page_content}"
    )
}

const REVIEW_HEADER: &str = r#"
You are a web navigation expert helping an automated navigation assistant.
You are given the task goal, the assistant's action history, and the
current page layout, using the same annotation system:
"#;

/// Reviewer prompt for a claimed SUCCESS (spec.md §4.8 "Success review").
pub fn review_success_system_prompt() -> String {
    format!(
        r#"{REVIEW_HEADER}{ANNOTATION_GUIDE}
The assistant believes it has completed the task. Check the history and
current page against the goal's stated criteria and respond with exactly
one JSON object:

Goal met:
{{"review_decision": "Goal Met", "review_feedback": "..."}}

Goal not met:
{{"review_decision": "Goal Not Met", "review_feedback": "..., because ..."}}
"#
    )
}

/// Reviewer prompt for a claimed DELEGATE_TO_USER (spec.md §4.8 "Delegation
/// review").
pub fn review_delegation_system_prompt() -> String {
    format!(
        r#"{REVIEW_HEADER}{ANNOTATION_GUIDE}
The assistant believes it cannot proceed without the user. Check whether
the current page already holds enough information or elements to make
progress, and respond with exactly one JSON object:

A concrete next step exists:
{{"review_decision": "Suggestion", "review_feedback": "..."}}

The user genuinely needs to take over:
{{"review_decision": "Delegate to User", "review_feedback": "..."}}
"#
    )
}
