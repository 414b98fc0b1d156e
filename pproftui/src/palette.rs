//! Terminal styling.

use crate::format::format_delta;

/// ANSI styling settings, built once from the CLI flags and shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Palette {
    no_color: bool,
}

impl Palette {
    pub fn new(no_color: bool) -> Self {
        Self { no_color }
    }

    pub fn no_color(&self) -> bool {
        self.no_color
    }

    pub fn style(&self, text: &str, ansi: &str) -> String {
        if self.no_color {
            return text.to_string();
        }
        format!("\x1b[{ansi}m{text}\x1b[0m")
    }

    pub fn bold(&self, text: &str) -> String {
        self.style(text, "1")
    }

    pub fn dim(&self, text: &str) -> String {
        self.style(text, "2")
    }

    pub fn good(&self, text: &str) -> String {
        self.style(text, "32")
    }

    pub fn bad(&self, text: &str) -> String {
        self.style(text, "31")
    }

    pub fn warn(&self, text: &str) -> String {
        self.style(text, "33")
    }

    /// Function name with the project-code marker.
    pub fn function_name(&self, name: &str, is_project_code: bool) -> String {
        if is_project_code {
            self.style(&format!("★ {}", name), "1;33")
        } else {
            name.to_string()
        }
    }

    /// Signed delta: green when it grew, red when it shrank.
    pub fn delta(&self, value: i64, unit: &str) -> String {
        let text = format_delta(value, unit);
        match value.signum() {
            1 => self.good(&text),
            -1 => self.bad(&text),
            _ => text,
        }
    }

    /// Flame bar in its heat colour, optionally highlighted.
    pub fn flame_bar(&self, text: &str, percentage: f64, selected: bool, hovered: bool) -> String {
        let mut ansi = format!("48;5;{};38;5;232", heat_color(percentage));
        if selected {
            ansi.push_str(";7");
        }
        if hovered {
            ansi.push_str(";4");
        }
        self.style(text, &ansi)
    }
}

/// 256-colour code for a share of the total: red when hot, green when cool.
pub fn heat_color(percentage: f64) -> u8 {
    match percentage {
        p if p >= 10.0 => 196,
        p if p >= 5.0 => 202,
        p if p >= 2.0 => 208,
        p if p >= 1.0 => 220,
        p if p >= 0.5 => 154,
        _ => 82,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heat_thresholds() {
        assert_eq!(heat_color(50.0), 196);
        assert_eq!(heat_color(10.0), 196);
        assert_eq!(heat_color(7.5), 202);
        assert_eq!(heat_color(2.0), 208);
        assert_eq!(heat_color(1.5), 220);
        assert_eq!(heat_color(0.5), 154);
        assert_eq!(heat_color(0.1), 82);
    }

    #[test]
    fn no_color_is_plain() {
        let palette = Palette::new(true);
        assert_eq!(palette.bold("x"), "x");
        assert_eq!(palette.flame_bar("main", 50.0, true, true), "main");
        assert_eq!(palette.delta(1_000, "nanoseconds"), "+1µs");
        assert_eq!(palette.function_name("main.main", true), "★ main.main");
    }

    #[test]
    fn colored_output() {
        let palette = Palette::new(false);
        assert_eq!(palette.bad("-1"), "\x1b[31m-1\x1b[0m");
        assert_eq!(
            palette.flame_bar("w", 12.0, true, false),
            "\x1b[48;5;196;38;5;232;7mw\x1b[0m"
        );
        assert_eq!(palette.delta(0, "count"), "0");
    }
}
