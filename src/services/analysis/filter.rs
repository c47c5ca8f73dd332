// Filter decision for a scored text; rendering is left to the caller

use crate::models::Settings;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterAction {
    None,
    Collapse,
    Hide,
}

impl FilterAction {
    pub fn decide(settings: &Settings, score: u8) -> Self {
        if !settings.enabled || score < settings.threshold {
            return FilterAction::None;
        }
        if settings.collapse_enabled {
            FilterAction::Collapse
        } else if settings.filter_enabled {
            FilterAction::Hide
        } else {
            FilterAction::None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterAction::None => "none",
            FilterAction::Collapse => "collapse",
            FilterAction::Hide => "hide",
        }
    }
}
