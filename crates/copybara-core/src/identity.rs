use crate::error::CoreError;
use crate::hash::Fingerprint;
use crate::serialize::fingerprint;
use serde::Serialize;
use tracing::warn;

const TAG_IDENTITY: &str = "migration_identity";
const TAG_CUSTOM_IDENTITY: &str = "custom_migration_identity";

/// Kind used for identities of migrated changes.
pub const CHANGE_IDENTITY: &str = "ChangeIdentity";

#[derive(Serialize)]
struct IdentityFields<'a> {
    kind: &'a str,
    config_path: &'a str,
    workflow_name: &'a str,
    context_ref: &'a str,
    user: &'a str,
}

/// Deterministic identity for a logical migration unit. Identical inputs
/// give the same value across runs and machines.
pub fn compute_identity(
    kind: &str,
    reference: &str,
    workflow_name: &str,
    config_path: &str,
    identity_user: &str,
) -> Result<Fingerprint, CoreError> {
    fingerprint(
        TAG_IDENTITY,
        &IdentityFields {
            kind,
            config_path,
            workflow_name,
            context_ref: reference,
            user: identity_user,
        },
    )
}

/// Default identity user: the `USER` of the current process.
pub fn default_identity_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    ConfigPath,
    WorkflowName,
    Reference,
    Label(String),
}

/// Values available to a custom identity template.
pub struct IdentityContext<'a> {
    pub config_path: &'a str,
    pub workflow_name: &'a str,
    pub reference: &'a str,
    pub identity_user: &'a str,
}

/// A user supplied identity made of literal text and `${...}` variables:
/// `copybara_config_path`, `copybara_workflow_name`, `copybara_reference` and
/// `label:<name>`. The config path variable is mandatory so identities never
/// collide across config files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityTemplate {
    template: String,
    tokens: Vec<Token>,
}

impl IdentityTemplate {
    pub fn parse(template: &str) -> Result<Self, CoreError> {
        let invalid = |reason: String| CoreError::InvalidIdentityTemplate {
            template: template.to_string(),
            reason,
        };
        let mut tokens = Vec::new();
        let mut rest = template;
        while let Some(start) = rest.find("${") {
            if start > 0 {
                tokens.push(Token::Literal(rest[..start].to_string()));
            }
            let after = &rest[start + 2..];
            let end = after
                .find('}')
                .ok_or_else(|| invalid("unterminated variable".to_string()))?;
            let var = &after[..end];
            let token = match var {
                "copybara_config_path" => Token::ConfigPath,
                "copybara_workflow_name" => Token::WorkflowName,
                "copybara_reference" => Token::Reference,
                _ => match var.strip_prefix("label:") {
                    Some(label) if !label.is_empty() => Token::Label(label.to_string()),
                    _ => return Err(invalid(format!("Unrecognized variable: {}", var))),
                },
            };
            tokens.push(token);
            rest = &after[end + 1..];
        }
        if !rest.is_empty() {
            tokens.push(Token::Literal(rest.to_string()));
        }
        if !tokens.contains(&Token::ConfigPath) {
            return Err(invalid(
                "${copybara_config_path} has to be present".to_string(),
            ));
        }
        Ok(Self {
            template: template.to_string(),
            tokens,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Expand the template, or `None` when a referenced label is missing.
    pub fn render<F>(&self, ctx: &IdentityContext<'_>, label: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut out = String::new();
        for token in &self.tokens {
            match token {
                Token::Literal(s) => out.push_str(s),
                Token::ConfigPath => out.push_str(ctx.config_path),
                Token::WorkflowName => out.push_str(ctx.workflow_name),
                Token::Reference => out.push_str(ctx.reference),
                Token::Label(name) => out.push_str(&label(name)?),
            }
        }
        Some(out)
    }

    /// Identity from the template, falling back to [`compute_identity`] when
    /// a label cannot be found. The identity user is always hashed in.
    pub fn identity<F>(
        &self,
        kind: &str,
        ctx: &IdentityContext<'_>,
        label: F,
    ) -> Result<Fingerprint, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        match self.render(ctx, label) {
            Some(rendered) => fingerprint(
                TAG_CUSTOM_IDENTITY,
                &serde_json::json!({ "identity": rendered, "user": ctx.identity_user }),
            ),
            None => {
                warn!(
                    template = %self.template,
                    "Couldn't find a label for the custom identity, using default identity"
                );
                compute_identity(
                    kind,
                    ctx.reference,
                    ctx.workflow_name,
                    ctx.config_path,
                    ctx.identity_user,
                )
            }
        }
    }
}
