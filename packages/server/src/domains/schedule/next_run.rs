//! Next-run policy.
//!
//! Three modes:
//! - fixed: a set number of days ahead, at the website's preferred time.
//! - window: a random gap of hours, snapped forward onto a preferred
//!   weekday (bounded at 7 attempts), with the hour drawn from the posting
//!   window and the previous posting hour excluded when possible.
//! - random: a random gap with the hour drawn uniformly from 6..=22.

use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveTime, TimeZone, Utc};
use rand::Rng;

use crate::domains::store::types::{ScheduleMode, Website};

const SNAP_ATTEMPTS: usize = 7;
const RANDOM_HOUR_MIN: u32 = 6;
const RANDOM_HOUR_MAX: u32 = 22;

/// Compute when this website should run next.
pub fn next_run_at<R: Rng + ?Sized>(
    website: &Website,
    now: DateTime<Utc>,
    rng: &mut R,
) -> DateTime<Utc> {
    match website.schedule_mode {
        ScheduleMode::Fixed => fixed_next_run(website, now),
        ScheduleMode::Window => window_next_run(website, now, rng),
        ScheduleMode::Random => random_next_run(website, now, rng),
    }
}

fn fixed_next_run(website: &Website, now: DateTime<Utc>) -> DateTime<Utc> {
    let days = website.days_between_posts.max(1);
    let date = (now + ChronoDuration::days(days)).date_naive();
    let time = parse_preferred_time(&website.preferred_time);
    Utc.from_utc_datetime(&date.and_time(time))
}

fn window_next_run<R: Rng + ?Sized>(
    website: &Website,
    now: DateTime<Utc>,
    rng: &mut R,
) -> DateTime<Utc> {
    let (min_hours, max_hours) = hour_bounds(website);
    let mut candidate = now + ChronoDuration::hours(rng.gen_range(min_hours..=max_hours));

    // Snap forward to a preferred weekday; after 7 steps we fall through
    // with whatever day we landed on.
    if !website.preferred_days.is_empty() {
        for _ in 0..SNAP_ATTEMPTS {
            let weekday = candidate.weekday().num_days_from_monday();
            if website.preferred_days.contains(&weekday) {
                break;
            }
            candidate += ChronoDuration::days(1);
        }
    }

    let hour = pick_window_hour(website, rng);
    let minute = rng.gen_range(0..60);
    let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN);
    Utc.from_utc_datetime(&candidate.date_naive().and_time(time))
}

fn random_next_run<R: Rng + ?Sized>(
    website: &Website,
    now: DateTime<Utc>,
    rng: &mut R,
) -> DateTime<Utc> {
    let (min_hours, max_hours) = hour_bounds(website);
    let candidate = now + ChronoDuration::hours(rng.gen_range(min_hours..=max_hours));

    let hour = rng.gen_range(RANDOM_HOUR_MIN..=RANDOM_HOUR_MAX);
    let minute = rng.gen_range(0..60);
    let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN);
    Utc.from_utc_datetime(&candidate.date_naive().and_time(time))
}

fn hour_bounds(website: &Website) -> (i64, i64) {
    let min = website.min_hours_between_posts.max(1);
    let max = website.max_hours_between_posts.max(min);
    (min, max)
}

/// Draw an hour from the posting window, excluding the last posting hour
/// when more than one candidate remains.
fn pick_window_hour<R: Rng + ?Sized>(website: &Website, rng: &mut R) -> u32 {
    let start = website.posting_window_start.min(23);
    let end = website.posting_window_end.min(23);
    let (start, end) = if start <= end { (start, end) } else { (end, start) };

    let mut candidates: Vec<u32> = (start..=end).collect();
    if candidates.len() > 1 {
        if let Some(last) = website.last_posting_hour {
            candidates.retain(|&h| h != last);
        }
    }
    candidates[rng.gen_range(0..candidates.len())]
}

fn parse_preferred_time(value: &str) -> NaiveTime {
    let mut parts = value.split(':');
    let hour: u32 = parts.next().and_then(|p| p.trim().parse().ok()).unwrap_or(9);
    let minute: u32 = parts.next().and_then(|p| p.trim().parse().ok()).unwrap_or(0);
    NaiveTime::from_hms_opt(hour.min(23), minute.min(59), 0).unwrap_or(NaiveTime::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn website(mode: &str) -> Website {
        serde_json::from_value(serde_json::json!({
            "id": "w1",
            "name": "W",
            "domain": "w.example.com",
            "is_active": true,
            "schedule_mode": mode
        }))
        .unwrap()
    }

    #[test]
    fn test_fixed_mode_lands_on_preferred_time() {
        let mut site = website("fixed");
        site.days_between_posts = 3;
        site.preferred_time = "09:00".to_string();
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 9, 0, 0).unwrap();
        let mut rng = StdRng::seed_from_u64(42);

        let next = next_run_at(&site, now, &mut rng);
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 6, 13, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_fixed_mode_parses_odd_times() {
        let mut site = website("fixed");
        site.days_between_posts = 1;
        site.preferred_time = "14:30".to_string();
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 8, 0, 0).unwrap();
        let mut rng = StdRng::seed_from_u64(42);

        let next = next_run_at(&site, now, &mut rng);
        assert_eq!(next.hour(), 14);
        assert_eq!(next.minute(), 30);

        site.preferred_time = "garbage".to_string();
        let next = next_run_at(&site, now, &mut rng);
        assert_eq!(next.hour(), 9);
    }

    #[test]
    fn test_window_mode_respects_preferred_days() {
        let mut site = website("window");
        site.min_hours_between_posts = 24;
        site.max_hours_between_posts = 72;
        site.preferred_days = vec![0, 2]; // Monday, Wednesday
        site.posting_window_start = 9;
        site.posting_window_end = 17;
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap();

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let next = next_run_at(&site, now, &mut rng);
            let weekday = next.weekday().num_days_from_monday();
            assert!(site.preferred_days.contains(&weekday), "weekday {}", weekday);
            assert!((9..=17).contains(&next.hour()));
        }
    }

    #[test]
    fn test_window_mode_excludes_last_posting_hour() {
        let mut site = website("window");
        site.posting_window_start = 9;
        site.posting_window_end = 11;
        site.last_posting_hour = Some(10);
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap();

        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let next = next_run_at(&site, now, &mut rng);
            assert_ne!(next.hour(), 10);
        }
    }

    #[test]
    fn test_window_single_hour_window_allows_repeat() {
        let mut site = website("window");
        site.posting_window_start = 9;
        site.posting_window_end = 9;
        site.last_posting_hour = Some(9);
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap();

        let mut rng = StdRng::seed_from_u64(3);
        let next = next_run_at(&site, now, &mut rng);
        assert_eq!(next.hour(), 9);
    }

    #[test]
    fn test_random_mode_hour_bounds() {
        let mut site = website("random");
        site.min_hours_between_posts = 12;
        site.max_hours_between_posts = 48;
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap();

        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let next = next_run_at(&site, now, &mut rng);
            assert!((6..=22).contains(&next.hour()), "hour {}", next.hour());
            assert!(next > now);
        }
    }

    #[test]
    fn test_window_gap_is_in_range() {
        let mut site = website("window");
        site.min_hours_between_posts = 24;
        site.max_hours_between_posts = 48;
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap();

        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..50 {
            let next = next_run_at(&site, now, &mut rng);
            // Gap before day snapping and hour adjustment stays within a
            // day of the configured bounds.
            let gap = next - now;
            assert!(gap >= ChronoDuration::hours(0));
            assert!(gap <= ChronoDuration::hours(48 + 24));
        }
    }
}
