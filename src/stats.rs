//! Read-only projections over habit histories. Nothing here is cached or
//! persisted; every view is recomputed from the habits passed in.

use crate::models::{
    CalendarDay, CalendarResponse, Category, CategoryShare, DashboardResponse, Habit, HeatmapPoint,
    History, StreakTier,
};
use crate::streak::calculate_streak;
use chrono::{Datelike, Duration, Local, NaiveDate};

pub const DEFAULT_HEATMAP_DAYS: u32 = 100;
pub const MAX_HEATMAP_DAYS: u32 = 366;

const TIERS: [(&str, &str, u32); 5] = [
    ("hatchling", "Hatchling", 1),
    ("spark", "Spark", 3),
    ("flame", "Flame", 7),
    ("momentum", "Momentum", 21),
    ("master", "Master", 66),
];

/// Share of habits active on `date` that were completed that day. Habits
/// created after `date` are not counted; no active habits gives `0.0`.
pub fn completion_ratio(habits: &[Habit], date: NaiveDate) -> f64 {
    let (completed, total) = completion_counts(habits, date);
    ratio(completed, total)
}

fn ratio(completed: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        completed as f64 / total as f64
    }
}

fn completion_counts(habits: &[Habit], date: NaiveDate) -> (usize, usize) {
    habits
        .iter()
        .filter(|habit| habit.created_on() <= date)
        .fold((0, 0), |(completed, total), habit| {
            (completed + usize::from(habit.history.contains(date)), total + 1)
        })
}

/// One cell per day of the month. `None` for an invalid year/month.
pub fn month_calendar(habits: &[Habit], year: i32, month: u32) -> Option<CalendarResponse> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;

    let days = first
        .iter_days()
        .take_while(|date| date.month() == month)
        .map(|date| {
            let (completed, total) = completion_counts(habits, date);
            CalendarDay {
                day: date.day(),
                date,
                completed,
                total,
                intensity: ratio(completed, total),
            }
        })
        .collect();

    Some(CalendarResponse {
        month: format!("{year:04}-{month:02}"),
        days,
    })
}

/// Parses `YYYY-MM` into a year and month.
pub fn parse_month(value: &str) -> Option<(i32, u32)> {
    let (year, month) = value.trim().split_once('-')?;
    let year = year.parse().ok()?;
    let month = month.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1).map(|_| (year, month))
}

/// The last `days` days ending at `today`, oldest first.
pub fn habit_heatmap(history: &History, today: NaiveDate, days: u32) -> Vec<HeatmapPoint> {
    (0..i64::from(days))
        .rev()
        .map(|offset| {
            let date = today - Duration::days(offset);
            HeatmapPoint {
                date,
                completed: history.contains(date),
                weekday: date.weekday().to_string(),
            }
        })
        .collect()
}

pub fn build_dashboard(habits: &[Habit]) -> DashboardResponse {
    build_dashboard_at(Local::now().date_naive(), habits)
}

/// Streaks are recomputed against `today` so a run that went cold since the
/// last toggle no longer counts.
pub fn build_dashboard_at(today: NaiveDate, habits: &[Habit]) -> DashboardResponse {
    let best_streak = habits
        .iter()
        .map(|habit| calculate_streak(&habit.history, today))
        .max()
        .unwrap_or(0);

    DashboardResponse {
        date: today,
        completed_today: habits
            .iter()
            .filter(|habit| habit.history.contains(today))
            .count(),
        total_habits: habits.len(),
        best_streak,
        categories: category_breakdown(habits),
        tiers: streak_tiers(best_streak),
    }
}

/// Habit count per category, in order of first appearance.
pub fn category_breakdown(habits: &[Habit]) -> Vec<CategoryShare> {
    let mut counts: Vec<(Category, usize)> = Vec::new();
    for habit in habits {
        match counts.iter_mut().find(|(category, _)| *category == habit.category) {
            Some((_, count)) => *count += 1,
            None => counts.push((habit.category, 1)),
        }
    }

    let total = habits.len();
    counts
        .into_iter()
        .map(|(category, count)| CategoryShare {
            category,
            count,
            percentage: (count as f64 * 100.0 / total as f64).round() as u32,
        })
        .collect()
}

pub fn streak_tiers(best_streak: u32) -> Vec<StreakTier> {
    TIERS
        .iter()
        .map(|&(id, name, threshold)| StreakTier {
            id,
            name,
            threshold,
            unlocked: best_streak >= threshold,
        })
        .collect()
}
