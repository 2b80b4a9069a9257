//! Source context rendering
//!
//! Renders a numbered window of original source around a target line.

use crate::utils::Style;

/// Marker placed before the target line
pub const TARGET_MARKER: &str = ">";

/// Render lines `[target - radius, target + radius]` of `source`, clamped to
/// the text. Returns `None` when `target` (1-based) is outside the text.
pub fn render_window(source: &str, target: u32, radius: usize, style: Style) -> Option<String> {
    let lines: Vec<&str> = source.lines().collect();
    let target = (target as usize).checked_sub(1)?;
    if target >= lines.len() {
        return None;
    }

    let start = target.saturating_sub(radius);
    let end = target.saturating_add(radius).min(lines.len() - 1);
    let width = (end + 1).to_string().len().max(2);

    let window = (start..=end)
        .map(|i| {
            let number = format!("{:>width$}", i + 1);
            if i == target {
                format!(
                    "{} {}|  {}",
                    style.red(TARGET_MARKER),
                    style.gray(number),
                    style.bold(lines[i])
                )
            } else {
                format!("  {}|  {}", style.gray(number), style.dim(lines[i]))
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    Some(window)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "l1\nl2\nl3\nl4\nl5\nl6\nl7\nl8";

    #[test]
    fn test_window_is_clamped_at_start() {
        let window = render_window(SOURCE, 3, 3, Style::new(false)).unwrap();
        let lines: Vec<_> = window.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "   1|  l1");
        assert_eq!(lines[2], ">  3|  l3");
        assert_eq!(lines[5], "   6|  l6");
    }

    #[test]
    fn test_window_is_clamped_at_end() {
        let window = render_window(SOURCE, 8, 2, Style::new(false)).unwrap();
        let lines: Vec<_> = window.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], ">  8|  l8");
    }

    #[test]
    fn test_target_outside_text() {
        assert!(render_window(SOURCE, 9, 3, Style::new(false)).is_none());
        assert!(render_window(SOURCE, 0, 3, Style::new(false)).is_none());
    }

    #[test]
    fn test_huge_radius_covers_whole_text() {
        let window = render_window(SOURCE, 4, usize::MAX, Style::new(false)).unwrap();
        assert_eq!(window.lines().count(), 8);
        assert!(window.contains(">  4|  l4"));
    }

    #[test]
    fn test_zero_radius_renders_only_target() {
        let window = render_window(SOURCE, 5, 0, Style::new(false)).unwrap();
        assert_eq!(window, ">  5|  l5");
    }
}
