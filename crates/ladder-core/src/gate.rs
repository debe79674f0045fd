//! The cache-expiry gate.
//!
//! The upstream reports how long its snapshot stays cached. Fetching again
//! before that window closes would only return the same data, so a run is
//! permitted only once the previous run's `cached_until` has passed.

use chrono::{DateTime, TimeDelta, Utc};

/// Outcome of [`should_proceed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
  Proceed,
  /// The previous snapshot is still cached for this long.
  Wait(TimeDelta),
}

impl Gate {
  pub fn is_proceed(&self) -> bool { matches!(self, Self::Proceed) }

  /// The remaining wait rounded up to whole seconds, if any.
  pub fn wait_secs(&self) -> Option<i64> {
    match self {
      Self::Proceed => None,
      Self::Wait(wait) => Some(ceil_secs(wait)),
    }
  }
}

/// Decide whether a fetch may run at `now`, given the `cached_until` epoch
/// millis of the most recent fetch run (`None` when there is no prior run or
/// it recorded no cache window).
pub fn should_proceed(now: DateTime<Utc>, last_cached_until: Option<i64>) -> Gate {
  let Some(millis) = last_cached_until else {
    return Gate::Proceed;
  };
  // Timestamps chrono cannot represent are treated as already expired.
  let Some(valid_until) = DateTime::<Utc>::from_timestamp_millis(millis) else {
    return Gate::Proceed;
  };

  if now >= valid_until {
    Gate::Proceed
  } else {
    Gate::Wait(valid_until - now)
  }
}

/// Round a positive duration up to whole seconds.
pub fn ceil_secs(wait: &TimeDelta) -> i64 {
  let secs = wait.num_seconds();
  if wait.subsec_nanos() > 0 { secs + 1 } else { secs }
}

/// Render a wait as `[D day(s), ]H:MM:SS[.ffffff]`.
pub fn format_wait(wait: &TimeDelta) -> String {
  let micros = wait.num_microseconds().unwrap_or(i64::MAX).max(0);
  let days = micros / 86_400_000_000;
  let rem = micros % 86_400_000_000;
  let hours = rem / 3_600_000_000;
  let minutes = rem % 3_600_000_000 / 60_000_000;
  let seconds = rem % 60_000_000 / 1_000_000;
  let fraction = rem % 1_000_000;

  let mut out = match days {
    0 => String::new(),
    1 => "1 day, ".to_owned(),
    n => format!("{n} days, "),
  };
  out.push_str(&format!("{hours}:{minutes:02}:{seconds:02}"));
  if fraction > 0 {
    out.push_str(&format!(".{fraction:06}"));
  }
  out
}
