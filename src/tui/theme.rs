//! Theme definitions for the TUI.

use ratatui::style::Color;

/// A color theme for the TUI.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Theme name
    pub name: &'static str,

    // Base colors
    /// Background color
    pub bg: Color,
    /// Foreground (text) color
    pub fg: Color,

    // Lamp colors
    /// Asserted line, loopback match
    pub lamp_on: Color,
    /// Loopback mismatch
    pub lamp_warn: Color,
    /// Deasserted line, nothing received
    pub lamp_off: Color,
    /// Output lines the operator drives
    pub lamp_output: Color,

    // UI element colors
    /// Color for error messages
    pub error_color: Color,
    /// Border color
    pub border: Color,
    /// Selection/highlight color
    pub selection: Color,
    /// Inactive element color
    pub inactive: Color,
    /// Accent color for highlights
    pub accent: Color,
}

impl Theme {
    /// Dark theme (default)
    pub const fn dark() -> Self {
        Self {
            name: "dark",
            bg: Color::Rgb(30, 30, 46),
            fg: Color::Rgb(205, 214, 244),
            lamp_on: Color::Rgb(166, 227, 161),
            lamp_warn: Color::Rgb(249, 226, 175),
            lamp_off: Color::Rgb(69, 71, 90),
            lamp_output: Color::Rgb(137, 180, 250),
            error_color: Color::Rgb(243, 139, 168),
            border: Color::Rgb(88, 91, 112),
            selection: Color::Rgb(69, 71, 90),
            inactive: Color::Rgb(108, 112, 134),
            accent: Color::Rgb(203, 166, 247),
        }
    }

    /// Light theme
    pub const fn light() -> Self {
        Self {
            name: "light",
            bg: Color::Rgb(239, 241, 245),
            fg: Color::Rgb(76, 79, 105),
            lamp_on: Color::Rgb(64, 160, 43),
            lamp_warn: Color::Rgb(223, 142, 29),
            lamp_off: Color::Rgb(204, 208, 218),
            lamp_output: Color::Rgb(30, 102, 245),
            error_color: Color::Rgb(210, 15, 57),
            border: Color::Rgb(172, 176, 190),
            selection: Color::Rgb(204, 208, 218),
            inactive: Color::Rgb(140, 143, 161),
            accent: Color::Rgb(136, 57, 239),
        }
    }

    /// Nord theme
    pub const fn nord() -> Self {
        Self {
            name: "nord",
            bg: Color::Rgb(46, 52, 64),
            fg: Color::Rgb(216, 222, 233),
            lamp_on: Color::Rgb(163, 190, 140),
            lamp_warn: Color::Rgb(235, 203, 139),
            lamp_off: Color::Rgb(67, 76, 94),
            lamp_output: Color::Rgb(129, 161, 193),
            error_color: Color::Rgb(191, 97, 106),
            border: Color::Rgb(76, 86, 106),
            selection: Color::Rgb(67, 76, 94),
            inactive: Color::Rgb(107, 112, 137),
            accent: Color::Rgb(180, 142, 173),
        }
    }

    /// Get theme by name
    pub fn by_name(name: &str) -> Option<&'static Theme> {
        THEMES.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

/// Available themes
pub static THEMES: &[Theme] = &[Theme::dark(), Theme::light(), Theme::nord()];
