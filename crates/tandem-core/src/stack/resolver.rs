use super::manager::ScopedAutomation;

/// Strategy for combining automations contributed by different bundles.
///
/// Bundles may declare automations on the same trigger. How those should be
/// ordered, prioritized or merged is left to the resolver installed on the
/// [`StackManager`](super::StackManager).
pub trait AutomationResolver: Send + Sync {
    fn name(&self) -> &str;

    /// Receives automations flattened in stack order.
    fn resolve(&self, automations: Vec<ScopedAutomation>) -> Vec<ScopedAutomation>;
}

/// Returns automations unchanged, in stack order.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughResolver;

impl AutomationResolver for PassthroughResolver {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn resolve(&self, automations: Vec<ScopedAutomation>) -> Vec<ScopedAutomation> {
        automations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::AutomationSpec;

    #[test]
    fn passthrough_keeps_order_and_duplicates() {
        let input = vec![
            ScopedAutomation {
                bundle_id: "a".into(),
                automation: AutomationSpec::new("source.added"),
            },
            ScopedAutomation {
                bundle_id: "b".into(),
                automation: AutomationSpec::new("source.added"),
            },
        ];
        let out = PassthroughResolver.resolve(input.clone());
        assert_eq!(out, input);
        assert_eq!(PassthroughResolver.name(), "passthrough");
    }
}
