//! Value Resolver Chain (C6, spec.md §4.6): resolves `resolve_value`
//! placeholders on a model response's steps, stopping as soon as every
//! step has a concrete `value`. Stages run in order — sentinels, secret
//! resolver, configured resolver, delegation fallback — and the chain
//! only ever tightens the response; it never introduces a placeholder
//! that wasn't already there.

use async_trait::async_trait;
use nav_domain::credential::base_domains_match;
use nav_domain::error::Result;
use nav_domain::llm::{LlmResponse, StepExecution};

use crate::credential_store::CredentialStore;

/// Context passed to a [`ConfiguredResolver`] alongside the raw
/// placeholder text (spec.md §4.6 stage 3).
#[derive(Debug, Clone)]
pub struct ResolveContext {
    pub site_id: i64,
    pub site_name: String,
    pub task_goal: String,
    pub current_url: String,
}

#[derive(Debug, Clone)]
pub struct ResolveInput {
    pub text: String,
    pub context: ResolveContext,
}

#[derive(Debug, Clone, Default)]
pub struct ResolveOutput {
    pub value: Option<String>,
}

/// An externally-configured resolver plugged in ahead of the delegation
/// fallback (spec.md §4.6 stage 3). Instantiated from `{target, params}`
/// by the caller; this crate only defines the trait seam.
#[async_trait]
pub trait ConfiguredResolver: Send + Sync {
    async fn resolve(&self, input: ResolveInput) -> Result<ResolveOutput>;
}

/// Site credentials available to the secret resolver stage, already
/// matched against the current page's registrable domain by the caller
/// (spec.md §4.6 stage 2: "if the current page host matches the
/// credential's stored URL").
pub struct SecretSource<'a> {
    pub store: &'a CredentialStore,
    pub site_name: &'a str,
}

/// Exact literals the sentinel stage passes through unchanged (spec.md
/// §4.6 stage 1): `"OTP"` verbatim, or any string containing `"**"`
/// (redacted user confirmations).
fn is_sentinel(text: &str) -> bool {
    text == "OTP" || text.contains("**")
}

/// Runs the resolver chain in place. Returns `true` if the response still
/// carries a live step list (`step`/`steps` untouched by a delegation
/// rewrite), `false` if it was rewritten to `DELEGATE_TO_USER`.
pub async fn resolve_missing_values(
    response: &mut LlmResponse,
    current_url: &str,
    secret: Option<&SecretSource<'_>>,
    configured: Option<&dyn ConfiguredResolver>,
    ctx_goal: &str,
    site_id: i64,
) -> Result<bool> {
    let mut unresolved = Vec::new();

    for step in response.steps_mut() {
        let Some(placeholder) = step.resolve_value.clone() else {
            continue;
        };

        if is_sentinel(&placeholder) {
            step.orig_value = Some(placeholder.clone());
            step.value = Some(placeholder);
            step.resolve_value = None;
            continue;
        }

        if let Some(secret) = secret {
            if let Some(resolved) = try_secret_resolver(&placeholder, secret, current_url)? {
                step.orig_value = Some(placeholder.clone());
                step.value = Some(resolved);
                step.resolve_value = None;
                continue;
            }
        }

        if let Some(configured) = configured {
            let input = ResolveInput {
                text: placeholder.clone(),
                context: ResolveContext {
                    site_id,
                    site_name: secret.map(|s| s.site_name.to_string()).unwrap_or_default(),
                    task_goal: ctx_goal.to_string(),
                    current_url: current_url.to_string(),
                },
            };
            let output = configured.resolve(input).await?;
            if let Some(resolved) = output.value {
                step.orig_value = Some(placeholder.clone());
                step.value = Some(resolved);
                step.resolve_value = None;
                continue;
            }
        }

        unresolved.push(placeholder);
    }

    if unresolved.is_empty() {
        return Ok(true);
    }

    let reason = unresolved.join(", ");
    response.step_execution = Some(StepExecution::DelegateToUser);
    response.reasoning = format!("Delegated to user for input: {reason}");
    response.clear_steps();
    Ok(false)
}

fn try_secret_resolver(placeholder: &str, secret: &SecretSource<'_>, current_url: &str) -> Result<Option<String>> {
    if !matches!(placeholder, "UsernameAssistant" | "PasswordAssistant") {
        return Ok(None);
    }
    let Some(cred) = secret.store.find_by_site_name(secret.site_name)? else {
        return Ok(None);
    };
    if !base_domains_match(&cred.url, current_url) {
        return Ok(None);
    }
    let (username, password) = secret.store.decrypt_credential(&cred)?;
    Ok(Some(if placeholder == "UsernameAssistant" { username } else { password }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nav_domain::llm::{LlmStep, StepAction, StepOrSteps};

    fn response_with(placeholder: &str) -> LlmResponse {
        LlmResponse {
            step_execution: Some(StepExecution::Single),
            step: Some(StepOrSteps::One(LlmStep {
                action: StepAction::Fill,
                target: "{Username}".into(),
                value: None,
                resolve_value: Some(placeholder.to_string()),
                locator: None,
                is_expandable: None,
                result: None,
                orig_value: None,
                orig_target: None,
            })),
            steps: None,
            reasoning: String::new(),
            answer: None,
            tool_calls: None,
        }
    }

    #[tokio::test]
    async fn sentinel_otp_passes_through_unchanged() {
        let mut resp = response_with("OTP");
        let resolved = resolve_missing_values(&mut resp, "https://acme.test", None, None, "", 1).await.unwrap();
        assert!(resolved);
        assert_eq!(resp.steps()[0].value.as_deref(), Some("OTP"));
        assert!(resp.steps()[0].resolve_value.is_none());
    }

    #[tokio::test]
    async fn masked_confirmation_sentinel_passes_through() {
        let mut resp = response_with("last 4 digits **1234");
        resolve_missing_values(&mut resp, "https://acme.test", None, None, "", 1).await.unwrap();
        assert_eq!(resp.steps()[0].value.as_deref(), Some("last 4 digits **1234"));
    }

    #[tokio::test]
    async fn unresolved_placeholder_delegates_to_user() {
        let mut resp = response_with("SomeUnknownThing");
        let resolved = resolve_missing_values(&mut resp, "https://acme.test", None, None, "", 1).await.unwrap();
        assert!(!resolved);
        assert_eq!(resp.step_execution, Some(StepExecution::DelegateToUser));
        assert!(resp.reasoning.starts_with("Delegated to user for input:"));
        assert!(resp.step.is_none() && resp.steps.is_none());
    }
}
