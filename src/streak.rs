use crate::models::History;
use chrono::NaiveDate;

/// Length of the unbroken run of completed days ending at `today` or the day
/// before. A run whose latest day is older than yesterday counts as zero.
pub fn calculate_streak(history: &History, today: NaiveDate) -> u32 {
    let Some(latest) = history.latest() else {
        return 0;
    };

    let alive = latest == today || today.pred_opt() == Some(latest);
    if !alive {
        return 0;
    }

    let mut expected = Some(latest);
    let mut streak = 0;
    for date in history.iter_desc() {
        if Some(date) != expected {
            break;
        }
        streak += 1;
        expected = date.pred_opt();
    }

    streak
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()
    }

    fn days_ago(offsets: &[i64]) -> History {
        offsets
            .iter()
            .map(|offset| today() - Duration::days(*offset))
            .collect()
    }

    #[test]
    fn empty_history_has_no_streak() {
        assert_eq!(calculate_streak(&History::new(), today()), 0);
    }

    #[test]
    fn today_alone_counts_one() {
        assert_eq!(calculate_streak(&days_ago(&[0]), today()), 1);
    }

    #[test]
    fn yesterday_alone_keeps_streak_alive() {
        assert_eq!(calculate_streak(&days_ago(&[1]), today()), 1);
    }

    #[test]
    fn streak_breaks_after_a_missed_day() {
        let history = days_ago(&[1]);
        let tomorrow = today() + Duration::days(1);
        assert_eq!(calculate_streak(&history, tomorrow), 0);
    }

    #[test]
    fn consecutive_run_is_counted() {
        assert_eq!(calculate_streak(&days_ago(&[0, 1, 2]), today()), 3);
        assert_eq!(calculate_streak(&days_ago(&[0, 1, 2, 4, 5]), today()), 3);
    }

    #[test]
    fn gap_after_today_stops_the_count() {
        assert_eq!(calculate_streak(&days_ago(&[0, 2]), today()), 1);
    }

    #[test]
    fn long_cold_run_counts_zero() {
        let history = days_ago(&[2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(calculate_streak(&history, today()), 0);
    }

    #[test]
    fn future_latest_date_counts_zero() {
        assert_eq!(calculate_streak(&days_ago(&[-1, 0, 1]), today()), 0);
    }

    #[test]
    fn run_crosses_month_and_year_boundaries() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
        let history: History = (0..5).map(|offset| today - Duration::days(offset)).collect();
        assert_eq!(calculate_streak(&history, today), 5);
    }

    #[test]
    fn result_depends_only_on_history_and_today() {
        let history = days_ago(&[0, 1, 3]);
        let first = calculate_streak(&history, today());
        let second = calculate_streak(&history.clone(), today());
        assert_eq!(first, second);
        assert_eq!(first, 2);
    }
}
