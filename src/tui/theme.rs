use std::str::FromStr;

use ratatui::style::{Color, Modifier, Style};

/// Colors used when a widget does not pick its own
const SERIES_PALETTE: [Color; 8] = [
    Color::Rgb(59, 130, 246),
    Color::Rgb(16, 185, 129),
    Color::Rgb(245, 158, 11),
    Color::Rgb(239, 68, 68),
    Color::Rgb(139, 92, 246),
    Color::Rgb(236, 72, 153),
    Color::Rgb(20, 184, 166),
    Color::Rgb(132, 204, 22),
];

/// A theme defines the color scheme for the dashboard
#[derive(Debug, Clone)]
pub struct Theme {
    pub name: String,

    // General UI colors
    pub background: Color,
    pub foreground: Color,
    pub muted: Color,
    pub border: Color,
    pub border_focused: Color,
    pub border_editing: Color,

    // Table colors
    pub header_fg: Color,
    pub header_bg: Color,

    // Status/feedback colors
    pub success: Color,
    pub error: Color,
    pub warning: Color,
    pub info: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

impl Theme {
    /// Default dark theme
    pub fn dark() -> Self {
        Self {
            name: "Default Dark".to_string(),
            background: Color::Reset,
            foreground: Color::Gray,
            muted: Color::DarkGray,
            border: Color::DarkGray,
            border_focused: Color::Cyan,
            border_editing: Color::Magenta,
            header_fg: Color::Cyan,
            header_bg: Color::Reset,
            success: Color::Green,
            error: Color::Red,
            warning: Color::Yellow,
            info: Color::Blue,
        }
    }

    /// Light theme
    pub fn light() -> Self {
        Self {
            name: "Light".to_string(),
            background: Color::White,
            foreground: Color::Black,
            muted: Color::Gray,
            border: Color::Gray,
            border_focused: Color::Blue,
            border_editing: Color::Magenta,
            header_fg: Color::Blue,
            header_bg: Color::Rgb(240, 240, 240),
            success: Color::Green,
            error: Color::Red,
            warning: Color::Rgb(200, 150, 0), // Darker yellow for light bg
            info: Color::Blue,
        }
    }

    pub fn header_style(&self) -> Style {
        Style::default()
            .fg(self.header_fg)
            .bg(self.header_bg)
            .add_modifier(Modifier::BOLD)
    }

    pub fn normal_style(&self) -> Style {
        Style::default().fg(self.foreground).bg(self.background)
    }

    pub fn muted_style(&self) -> Style {
        Style::default().fg(self.muted)
    }

    pub fn border_style(&self) -> Style {
        Style::default().fg(self.border)
    }

    pub fn focused_border_style(&self) -> Style {
        Style::default().fg(self.border_focused)
    }

    pub fn editing_border_style(&self) -> Style {
        Style::default()
            .fg(self.border_editing)
            .add_modifier(Modifier::BOLD)
    }

    pub fn error_style(&self) -> Style {
        Style::default().fg(self.error)
    }

    pub fn warning_style(&self) -> Style {
        Style::default().fg(self.warning)
    }

    pub fn info_style(&self) -> Style {
        Style::default().fg(self.info)
    }

    /// Color for the `i`th series or slice
    pub fn series_color(&self, i: usize) -> Color {
        SERIES_PALETTE[i % SERIES_PALETTE.len()]
    }

    /// A widget's configured color (`#rrggbb` or a color name), else `fallback`
    pub fn widget_color(&self, configured: Option<&str>, fallback: Color) -> Color {
        configured.and_then(parse_color).unwrap_or(fallback)
    }
}

pub fn parse_color(s: &str) -> Option<Color> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    Color::from_str(&s.replace("grey", "gray")).ok()
}
