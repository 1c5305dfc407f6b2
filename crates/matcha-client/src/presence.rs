use std::time::Duration;

use chrono::{DateTime, Utc};

use matcha_types::models::UserStatus;

/// How a peer's online status is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Online,
    /// Flagged online, but no activity for longer than the threshold.
    Away { idle: Duration },
    Offline { last_seen: Option<DateTime<Utc>> },
}

/// Classify a status report as of `now`.
///
/// An online user with no recorded last activity counts as online.
pub fn classify(status: &UserStatus, now: DateTime<Utc>, threshold: Duration) -> Presence {
    if !status.is_online {
        return Presence::Offline { last_seen: status.last_connection };
    }
    let Some(last) = status.last_connection else {
        return Presence::Online;
    };
    // A clock slightly ahead of ours reads as zero idle time.
    let idle = (now - last).to_std().unwrap_or(Duration::ZERO);
    if idle > threshold { Presence::Away { idle } } else { Presence::Online }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    fn status(is_online: bool, last: Option<DateTime<Utc>>) -> UserStatus {
        UserStatus { is_online, last_connection: last, last_connection_formatted: None }
    }

    #[test]
    fn classifies_against_threshold() {
        let now = Utc::now();
        let threshold = Duration::from_secs(300);

        assert_eq!(classify(&status(true, Some(now - TimeDelta::seconds(30))), now, threshold), Presence::Online);
        assert_eq!(classify(&status(true, None), now, threshold), Presence::Online);
        assert_eq!(
            classify(&status(true, Some(now - TimeDelta::seconds(600))), now, threshold),
            Presence::Away { idle: Duration::from_secs(600) }
        );

        let seen = now - TimeDelta::hours(2);
        assert_eq!(
            classify(&status(false, Some(seen)), now, threshold),
            Presence::Offline { last_seen: Some(seen) }
        );
    }

    #[test]
    fn future_timestamps_count_as_fresh() {
        let now = Utc::now();
        let ahead = now + TimeDelta::seconds(5);
        assert_eq!(classify(&status(true, Some(ahead)), now, Duration::from_secs(1)), Presence::Online);
    }
}
