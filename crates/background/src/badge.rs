use serde::Serialize;
use tokio::sync::RwLock;
use tracing::info;

/// Badge background color while redirection is switched off.
pub const DISABLED_COLOR: &str = "#6b7280";

/// Text and color shown on the toolbar badge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Badge {
    /// Empty badge when enabled; grey `OFF` when disabled.
    pub fn for_enabled(enabled: bool) -> Self {
        if enabled {
            Self::default()
        } else {
            Self {
                text: "OFF".to_string(),
                color: Some(DISABLED_COLOR.to_string()),
            }
        }
    }
}

/// Current badge, updated at startup and whenever the global flag changes.
#[derive(Debug, Default)]
pub struct BadgeIndicator {
    current: RwLock<Badge>,
}

impl BadgeIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn update(&self, enabled: bool) {
        let badge = Badge::for_enabled(enabled);
        info!(enabled, text = %badge.text, "badge updated");
        *self.current.write().await = badge;
    }

    pub async fn current(&self) -> Badge {
        self.current.read().await.clone()
    }
}
