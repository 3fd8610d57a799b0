use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Where a bundle comes from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BundleType {
    Official,
    Community,
    Custom,
}

impl BundleType {
    pub fn as_str(&self) -> &str {
        match self {
            BundleType::Official => "official",
            BundleType::Community => "community",
            BundleType::Custom => "custom",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "official" => Some(Self::Official),
            "community" => Some(Self::Community),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

impl std::fmt::Display for BundleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// An agent declared by a bundle. `role` must be unique across the active stack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentSpec {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Any other descriptor keys, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AgentSpec {
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            name: None,
            description: None,
            model: None,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AutomationSpec {
    pub trigger: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AutomationSpec {
    pub fn new(trigger: impl Into<String>) -> Self {
        Self {
            trigger: trigger.into(),
            action: None,
            description: None,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WidgetSpec {
    #[serde(rename = "type", default)]
    pub widget_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A named collection of agents, skills, automations, widgets and memory
/// categories that is activated as a unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub bundle_type: BundleType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub agents: Vec<AgentSpec>,
    /// Capability ids.
    pub skills: Vec<String>,
    pub automations: Vec<AutomationSpec>,
    pub dashboard_widgets: Vec<WidgetSpec>,
    pub memory_categories: Vec<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Bundle {
    /// An empty custom bundle, mostly useful for programmatic registration.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            bundle_type: BundleType::Custom,
            description: String::new(),
            tags: Vec::new(),
            author: None,
            agents: Vec::new(),
            skills: Vec::new(),
            automations: Vec::new(),
            dashboard_widgets: Vec::new(),
            memory_categories: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.agents.iter().map(|a| a.role.as_str())
    }

    pub fn has_skill(&self, skill_id: &str) -> bool {
        self.skills.iter().any(|s| s == skill_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_type_from_str() {
        assert_eq!(BundleType::from_str("official"), Some(BundleType::Official));
        assert_eq!(BundleType::from_str("Community"), Some(BundleType::Community));
        assert_eq!(BundleType::from_str("custom"), Some(BundleType::Custom));
        assert_eq!(BundleType::from_str("vendor"), None);
    }

    #[test]
    fn agent_spec_keeps_unknown_fields() {
        let agent: AgentSpec = serde_json::from_value(serde_json::json!({
            "role": "researcher",
            "model": "fast",
            "temperature": 0.2
        }))
        .unwrap();
        assert_eq!(agent.role, "researcher");
        assert_eq!(agent.model.as_deref(), Some("fast"));
        assert_eq!(agent.extra.get("temperature"), Some(&serde_json::json!(0.2)));

        let back = serde_json::to_value(&agent).unwrap();
        assert_eq!(back["temperature"], serde_json::json!(0.2));
    }

    #[test]
    fn serializes_with_descriptor_keys() {
        let mut bundle = Bundle::new("b1", "Bundle One");
        bundle.dashboard_widgets.push(WidgetSpec {
            widget_type: "chart".into(),
            title: None,
            extra: Map::new(),
        });
        let value = serde_json::to_value(&bundle).unwrap();
        assert_eq!(value["type"], "custom");
        assert!(value["dashboardWidgets"].is_array());
        assert!(value["memoryCategories"].is_array());
        assert_eq!(value["dashboardWidgets"][0]["type"], "chart");
        assert!(value.get("author").is_none());
    }
}
