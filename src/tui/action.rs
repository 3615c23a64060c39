use serde::{Deserialize, Serialize};
use std::fmt;
use strum::Display;

/// All possible actions on the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Action {
    // Navigation; in edit mode these move the focused widget
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    FocusNext,
    FocusPrevious,

    // Layout (edit mode only)
    GrowWidth,
    ShrinkWidth,
    GrowHeight,
    ShrinkHeight,
    ToggleEditMode,

    // Widgets
    Refresh,
    RefreshAll,
    DeleteWidget,
    PanLeft,
    PanRight,

    // View
    ToggleHelp,

    // Application
    Quit,
    Cancel,
}

impl Action {
    /// Get human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Action::MoveUp => "Focus widget above / move up",
            Action::MoveDown => "Focus widget below / move down",
            Action::MoveLeft => "Focus widget to the left / move left",
            Action::MoveRight => "Focus widget to the right / move right",
            Action::FocusNext => "Focus next widget",
            Action::FocusPrevious => "Focus previous widget",
            Action::GrowWidth => "Widen widget",
            Action::ShrinkWidth => "Narrow widget",
            Action::GrowHeight => "Make widget taller",
            Action::ShrinkHeight => "Make widget shorter",
            Action::ToggleEditMode => "Toggle layout edit mode",
            Action::Refresh => "Refresh focused widget",
            Action::RefreshAll => "Refresh all widgets",
            Action::DeleteWidget => "Delete focused widget",
            Action::PanLeft => "Pan line chart left",
            Action::PanRight => "Pan line chart right",
            Action::ToggleHelp => "Toggle help",
            Action::Quit => "Quit application",
            Action::Cancel => "Cancel / leave edit mode",
        }
    }

    /// Get category for grouping in help screen
    pub fn category(&self) -> ActionCategory {
        match self {
            Action::MoveUp
            | Action::MoveDown
            | Action::MoveLeft
            | Action::MoveRight
            | Action::FocusNext
            | Action::FocusPrevious => ActionCategory::Navigation,

            Action::GrowWidth
            | Action::ShrinkWidth
            | Action::GrowHeight
            | Action::ShrinkHeight
            | Action::ToggleEditMode => ActionCategory::Layout,

            Action::Refresh
            | Action::RefreshAll
            | Action::DeleteWidget
            | Action::PanLeft
            | Action::PanRight => ActionCategory::Widgets,

            Action::ToggleHelp => ActionCategory::View,

            Action::Quit | Action::Cancel => ActionCategory::Application,
        }
    }

    /// Get all possible actions (for validation)
    pub fn all() -> Vec<Action> {
        vec![
            Action::MoveUp,
            Action::MoveDown,
            Action::MoveLeft,
            Action::MoveRight,
            Action::FocusNext,
            Action::FocusPrevious,
            Action::GrowWidth,
            Action::ShrinkWidth,
            Action::GrowHeight,
            Action::ShrinkHeight,
            Action::ToggleEditMode,
            Action::Refresh,
            Action::RefreshAll,
            Action::DeleteWidget,
            Action::PanLeft,
            Action::PanRight,
            Action::ToggleHelp,
            Action::Quit,
            Action::Cancel,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionCategory {
    Navigation,
    Layout,
    Widgets,
    View,
    Application,
}

impl fmt::Display for ActionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionCategory::Navigation => write!(f, "Navigation"),
            ActionCategory::Layout => write!(f, "Layout"),
            ActionCategory::Widgets => write!(f, "Widgets"),
            ActionCategory::View => write!(f, "View"),
            ActionCategory::Application => write!(f, "Application"),
        }
    }
}
