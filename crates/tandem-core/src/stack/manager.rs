use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tandem_config::StackConfig;
use tracing::{debug, info};

use super::resolver::{AutomationResolver, PassthroughResolver};
use crate::bundle::{AgentSpec, AutomationSpec, Bundle};
use crate::error::StackError;
use crate::memory::SharedMemoryStore;

/// An agent together with the active bundle that declares it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopedAgent {
    pub bundle_id: String,
    pub agent: AgentSpec,
}

/// An automation together with the active bundle that declares it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopedAutomation {
    pub bundle_id: String,
    pub automation: AutomationSpec,
}

/// Counts describing the composed stack, for the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackSummary {
    pub bundles: usize,
    pub agents: usize,
    pub skills: usize,
    pub automations: usize,
    pub memory_categories: Vec<String>,
}

struct StackState {
    /// Active bundle ids in insertion order.
    order: Vec<String>,
    bundles: HashMap<String, Bundle>,
    shared_memory_enabled: bool,
    cross_bundle_automations_enabled: bool,
}

impl StackState {
    fn active(&self) -> impl Iterator<Item = &Bundle> {
        self.order.iter().filter_map(|id| self.bundles.get(id))
    }

    /// First active bundle (in stack order) declaring `role`.
    fn role_owner(&self, role: &str) -> Option<&str> {
        self.active()
            .find(|b| b.roles().any(|r| r == role))
            .map(|b| b.id.as_str())
    }
}

/// Owns the set of simultaneously active bundles.
///
/// No two active bundles may declare the same agent role; this is checked
/// when a bundle is added. While shared memory is enabled, each active
/// bundle's memory categories are registered as owned by it in the attached
/// [`SharedMemoryStore`].
pub struct StackManager {
    state: Mutex<StackState>,
    memory: Arc<SharedMemoryStore>,
    resolver: Box<dyn AutomationResolver>,
}

impl StackManager {
    pub fn new(memory: Arc<SharedMemoryStore>) -> Self {
        Self::from_config(&StackConfig::default(), memory)
    }

    pub fn from_config(config: &StackConfig, memory: Arc<SharedMemoryStore>) -> Self {
        Self {
            state: Mutex::new(StackState {
                order: Vec::new(),
                bundles: HashMap::new(),
                shared_memory_enabled: config.shared_memory_enabled,
                cross_bundle_automations_enabled: config.cross_bundle_automations_enabled,
            }),
            memory,
            resolver: Box::new(PassthroughResolver),
        }
    }

    /// Replace the automation resolver.
    pub fn with_resolver(mut self, resolver: impl AutomationResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    fn lock_state(&self) -> MutexGuard<'_, StackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn memory(&self) -> Arc<SharedMemoryStore> {
        Arc::clone(&self.memory)
    }

    /// Activate a bundle. On error the stack is left untouched.
    pub fn add_to_stack(&self, bundle: Bundle) -> Result<(), StackError> {
        let mut state = self.lock_state();

        if state.bundles.contains_key(&bundle.id) {
            return Err(StackError::Duplicate(bundle.id));
        }

        for role in bundle.roles() {
            if let Some(existing) = state.role_owner(role) {
                return Err(StackError::RoleConflict {
                    role: role.to_string(),
                    existing: existing.to_string(),
                    incoming: bundle.id.clone(),
                });
            }
        }

        if state.shared_memory_enabled {
            for category in &bundle.memory_categories {
                self.memory.register_category(category, &bundle.id);
            }
        }

        info!(
            "Added bundle '{}' to stack ({} agents, {} memory categories)",
            bundle.id,
            bundle.agents.len(),
            bundle.memory_categories.len()
        );
        state.order.push(bundle.id.clone());
        state.bundles.insert(bundle.id.clone(), bundle);
        Ok(())
    }

    /// Deactivate a bundle. Its memory entries are kept; only its category
    /// ownership is released.
    pub fn remove_from_stack(&self, id: &str) -> Result<(), StackError> {
        let mut state = self.lock_state();

        let Some(bundle) = state.bundles.remove(id) else {
            return Err(StackError::NotFound(id.to_string()));
        };

        if state.shared_memory_enabled {
            for category in &bundle.memory_categories {
                self.memory.unregister_category(category, id);
            }
        }
        state.order.retain(|b| b != id);

        info!("Removed bundle '{id}' from stack");
        Ok(())
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.lock_state().bundles.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock_state().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_state().order.is_empty()
    }

    /// Active bundles in stack order.
    pub fn get_active_bundles(&self) -> Vec<Bundle> {
        self.lock_state().active().cloned().collect()
    }

    pub fn get_all_agents(&self) -> Vec<ScopedAgent> {
        let state = self.lock_state();
        state
            .active()
            .flat_map(|b| {
                b.agents.iter().map(move |agent| ScopedAgent {
                    bundle_id: b.id.clone(),
                    agent: agent.clone(),
                })
            })
            .collect()
    }

    pub fn get_all_skills(&self) -> BTreeSet<String> {
        let state = self.lock_state();
        state.active().flat_map(|b| b.skills.iter().cloned()).collect()
    }

    /// Automations of all active bundles in stack order. Automations sharing
    /// a trigger are all returned; see [`Self::resolved_automations`].
    pub fn get_all_automations(&self) -> Vec<ScopedAutomation> {
        let state = self.lock_state();
        state
            .active()
            .flat_map(|b| {
                b.automations.iter().map(move |automation| ScopedAutomation {
                    bundle_id: b.id.clone(),
                    automation: automation.clone(),
                })
            })
            .collect()
    }

    /// Automations after the resolver has combined them. Without cross-bundle
    /// automations enabled this is the same as [`Self::get_all_automations`].
    pub fn resolved_automations(&self) -> Vec<ScopedAutomation> {
        let automations = self.get_all_automations();
        if self.cross_bundle_automations_enabled() {
            debug!("Resolving automations with '{}'", self.resolver.name());
            self.resolver.resolve(automations)
        } else {
            automations
        }
    }

    pub fn find_agent_by_role(&self, role: &str) -> Option<ScopedAgent> {
        let state = self.lock_state();
        let found = state.active().find_map(|b| {
            b.agents
                .iter()
                .find(|a| a.role == role)
                .map(|agent| ScopedAgent {
                    bundle_id: b.id.clone(),
                    agent: agent.clone(),
                })
        });
        found
    }

    /// Ids of active bundles that provide `skill_id`, in stack order.
    pub fn get_bundles_with_skill(&self, skill_id: &str) -> Vec<String> {
        let state = self.lock_state();
        state
            .active()
            .filter(|b| b.has_skill(skill_id))
            .map(|b| b.id.clone())
            .collect()
    }

    /// Applies to future adds and removes only.
    pub fn set_shared_memory_enabled(&self, enabled: bool) {
        self.lock_state().shared_memory_enabled = enabled;
    }

    pub fn shared_memory_enabled(&self) -> bool {
        self.lock_state().shared_memory_enabled
    }

    pub fn set_cross_bundle_automations_enabled(&self, enabled: bool) {
        self.lock_state().cross_bundle_automations_enabled = enabled;
    }

    pub fn cross_bundle_automations_enabled(&self) -> bool {
        self.lock_state().cross_bundle_automations_enabled
    }

    /// Deactivate every bundle and wipe the whole shared memory store,
    /// including entries and registrations not made by this stack.
    pub fn clear_stack(&self) {
        let mut state = self.lock_state();
        state.order.clear();
        state.bundles.clear();
        self.memory.clear();
        info!("Cleared stack");
    }

    pub fn summary(&self) -> StackSummary {
        let state = self.lock_state();
        let mut skills = BTreeSet::new();
        let mut categories = BTreeSet::new();
        let mut summary = StackSummary::default();

        for bundle in state.active() {
            summary.bundles += 1;
            summary.agents += bundle.agents.len();
            summary.automations += bundle.automations.len();
            skills.extend(bundle.skills.iter().cloned());
            categories.extend(bundle.memory_categories.iter().cloned());
        }
        summary.skills = skills.len();
        summary.memory_categories = categories.into_iter().collect();
        summary
    }
}
