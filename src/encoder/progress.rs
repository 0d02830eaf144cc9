//! Encoder progress events and percentage tracking.

/// A progress event from the encoder's `-progress` stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodeProgress {
    /// Output time encoded so far, in seconds.
    pub elapsed_seconds: f64,
    /// Whether the encoder signalled the final block.
    pub is_complete: bool,
}

/// Converts elapsed encoder time into a whole percentage of the input duration.
///
/// Returns 0 for unknown (zero or negative) durations.
pub fn percent_complete(elapsed_seconds: f64, total_duration_seconds: f64) -> u8 {
    if total_duration_seconds <= 0.0 || !total_duration_seconds.is_finite() {
        return 0;
    }
    if !elapsed_seconds.is_finite() || elapsed_seconds <= 0.0 {
        return 0;
    }

    let percent = (elapsed_seconds / total_duration_seconds * 100.0).min(100.0);
    percent.round() as u8
}

/// Tracks reported percentages for one transcode, never moving backwards.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total_duration_seconds: f64,
    last_percent: u8,
}

impl ProgressTracker {
    /// Creates a tracker for an input of the given duration.
    pub fn new(total_duration_seconds: f64) -> Self {
        Self {
            total_duration_seconds,
            last_percent: 0,
        }
    }

    /// Folds an event into the tracker and returns the percentage to report.
    ///
    /// The final block counts as 100% whenever the duration is known.
    pub fn observe(&mut self, progress: &EncodeProgress) -> u8 {
        let known_duration =
            self.total_duration_seconds > 0.0 && self.total_duration_seconds.is_finite();
        let percent = if progress.is_complete && known_duration {
            100
        } else {
            percent_complete(progress.elapsed_seconds, self.total_duration_seconds)
        };
        self.last_percent = self.last_percent.max(percent);
        self.last_percent
    }
}

/// Parses one `key=value` line of ffmpeg's `-progress` output.
///
/// Values accumulate in `current`; an event is emitted on each `progress=` line.
pub fn parse_progress_line(line: &str, current: &mut EncodeProgress) -> Option<EncodeProgress> {
    let (key, value) = line.trim().split_once('=')?;

    match key {
        // ffmpeg reports both keys in microseconds
        "out_time_us" | "out_time_ms" => {
            if let Ok(us) = value.parse::<i64>() {
                current.elapsed_seconds = us as f64 / 1_000_000.0;
            }
        }
        "out_time" => {
            if let Some(seconds) = parse_timestamp(value) {
                current.elapsed_seconds = seconds;
            }
        }
        "progress" => {
            current.is_complete = value == "end";
            return Some(current.clone());
        }
        _ => {}
    }

    None
}

/// Parses an `HH:MM:SS.micros` timestamp into seconds.
fn parse_timestamp(value: &str) -> Option<f64> {
    let mut parts = value.trim().splitn(3, ':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;

    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}
