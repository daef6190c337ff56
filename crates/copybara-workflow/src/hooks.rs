use crate::destination::{DestinationEffect, EffectType};
use crate::error::Result;
use copybara_core::Revision;
use std::fmt;
use tracing::warn;

/// Action run after a migration with the effects it produced.
pub trait MigrationHook: fmt::Debug {
    /// Extra effects to record, if any.
    fn run(&self, effects: &[DestinationEffect], resolved: &Revision) -> Result<Vec<DestinationEffect>>;

    fn describe(&self) -> String;
}

/// Run `hooks` in order. Each one sees the effects accumulated so far. A
/// failing hook is recorded as an error effect and does not stop the rest.
pub fn run_hooks(
    mut effects: Vec<DestinationEffect>,
    hooks: &[Box<dyn MigrationHook>],
    resolved: &Revision,
) -> Vec<DestinationEffect> {
    for hook in hooks {
        match hook.run(&effects, resolved) {
            Ok(extra) => effects.extend(extra),
            Err(e) => {
                warn!("Error running hook {}: {}", hook.describe(), e);
                effects.push(
                    DestinationEffect::new(
                        EffectType::Error,
                        format!("Error while running hook {}", hook.describe()),
                        &[],
                    )
                    .with_errors(vec![e.to_string()]),
                );
            }
        }
    }
    effects
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkflowError;

    #[derive(Debug)]
    struct Summarize;

    impl MigrationHook for Summarize {
        fn run(&self, effects: &[DestinationEffect], _: &Revision) -> Result<Vec<DestinationEffect>> {
            Ok(vec![DestinationEffect::new(
                EffectType::Started,
                format!("{} effect(s)", effects.len()),
                &[],
            )])
        }

        fn describe(&self) -> String {
            "summarize".into()
        }
    }

    #[derive(Debug)]
    struct Failing;

    impl MigrationHook for Failing {
        fn run(&self, _: &[DestinationEffect], _: &Revision) -> Result<Vec<DestinationEffect>> {
            Err(WorkflowError::Repo("endpoint down".into()))
        }

        fn describe(&self) -> String {
            "failing".into()
        }
    }

    #[test]
    fn hooks_see_previous_effects_and_failures_are_recorded() {
        let hooks: Vec<Box<dyn MigrationHook>> = vec![Box::new(Failing), Box::new(Summarize)];
        let start = vec![DestinationEffect::new(EffectType::Created, "done", &[])];
        let effects = run_hooks(start, &hooks, &Revision::new("1"));
        assert_eq!(effects.len(), 3);
        assert_eq!(effects[1].kind, EffectType::Error);
        assert_eq!(effects[1].errors, vec!["endpoint down".to_string()]);
        assert_eq!(effects[2].summary, "2 effect(s)");
    }
}
