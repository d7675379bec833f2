use std::time::Duration;

use ansi_term::Colour;

const BAR_WIDTH: usize = 50;

/// Moves to the start of the line and clears it, so every tick overwrites the previous one.
const REDRAW: &str = "\r\x1b[2K";

pub const BELL: &str = "\x07";

fn ratio(current: Duration, total: Duration) -> f64 {
    if total.is_zero() {
        return 1.;
    }
    (current.as_secs_f64() / total.as_secs_f64()).clamp(0., 1.)
}

/// Remaining time as `MM:SS`.
pub fn remaining_text(total: Duration, elapsed: Duration) -> String {
    let remaining = total.saturating_sub(elapsed).as_secs();
    format!("{:02}:{:02}", remaining / 60, remaining % 60)
}

pub fn progress_bar(current: Duration, total: Duration, width: usize) -> String {
    let filled = (ratio(current, total) * width as f64) as usize;
    format!("[{}{}]", "█".repeat(filled), " ".repeat(width - filled))
}

/// Single line shown during a focus session: colored countdown, bar and percentage.
pub fn focus_line(total: Duration, elapsed: Duration) -> String {
    let text = remaining_text(total, elapsed);
    let (minutes, seconds) = text.split_at(2);
    format!(
        "{REDRAW}{}{} {} {:3.0}%",
        Colour::Green.bold().paint(minutes),
        Colour::Red.bold().paint(seconds),
        progress_bar(elapsed, total, BAR_WIDTH),
        ratio(elapsed, total) * 100.
    )
}

/// Break progress: bar, percentage, seconds and minutes out of the total.
pub fn break_line(total: Duration, elapsed: Duration) -> String {
    let elapsed = elapsed.min(total);
    format!(
        "{REDRAW}{} {:.2}% {}/{} {:.2}/{:.0}",
        progress_bar(elapsed, total, BAR_WIDTH),
        ratio(elapsed, total) * 100.,
        elapsed.as_secs(),
        total.as_secs(),
        elapsed.as_secs_f64() / 60.,
        total.as_secs_f64() / 60.
    )
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{break_line, focus_line, progress_bar, remaining_text};

    #[test]
    fn remaining_time() {
        let total = Duration::from_secs(25 * 60);
        assert_eq!(remaining_text(total, Duration::ZERO), "25:00");
        assert_eq!(remaining_text(total, Duration::from_secs(61)), "23:59");
        assert_eq!(remaining_text(total, total * 2), "00:00");
    }

    #[test]
    fn bar_fills_proportionally() {
        let total = Duration::from_secs(100);
        assert_eq!(progress_bar(Duration::from_secs(40), total, 10), "[████      ]");
        assert_eq!(progress_bar(total * 3, total, 4), "[████]");
        assert_eq!(progress_bar(Duration::ZERO, Duration::ZERO, 2), "[██]");
    }

    #[test]
    fn lines_redraw_in_place() {
        let total = Duration::from_secs(300);
        let line = break_line(total, Duration::from_secs(30));
        assert!(line.starts_with('\r'));
        assert!(line.ends_with("10.00% 30/300 0.50/5"));

        let focus = focus_line(total, Duration::from_secs(150));
        assert!(focus.contains("02"));
        assert!(focus.ends_with(" 50%"));
    }
}
