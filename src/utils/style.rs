//! ANSI styling helpers

/// Wraps text in ANSI escapes when enabled
#[derive(Clone, Copy, Debug)]
pub struct Style {
    enabled: bool,
}

impl Style {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn paint(&self, code: &str, text: impl AsRef<str>) -> String {
        if self.enabled {
            format!("\x1b[{code}m{}\x1b[0m", text.as_ref())
        } else {
            text.as_ref().to_string()
        }
    }

    pub fn bold(&self, text: impl AsRef<str>) -> String {
        self.paint("1", text)
    }

    pub fn dim(&self, text: impl AsRef<str>) -> String {
        self.paint("2", text)
    }

    pub fn red(&self, text: impl AsRef<str>) -> String {
        self.paint("31", text)
    }

    pub fn yellow(&self, text: impl AsRef<str>) -> String {
        self.paint("33", text)
    }

    pub fn green(&self, text: impl AsRef<str>) -> String {
        self.paint("32", text)
    }

    pub fn gray(&self, text: impl AsRef<str>) -> String {
        self.paint("90", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_style_is_plain() {
        assert_eq!(Style::new(false).red("x"), "x");
        assert_eq!(Style::new(true).red("x"), "\x1b[31mx\x1b[0m");
    }
}
