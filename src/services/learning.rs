//! Estimate calibration (C8, §4.8). `LearningData` is the only state this
//! crate asks a host to persist between runs; everything here is a pure
//! function over that blob plus one new `CompletionRecord`.

use crate::models::learning::{CompletionRecord, EstimateAdjustment, LearningData, GLOBAL_WINDOW, MAX_COMPLETION_RECORDS};
use crate::models::task::Task;
use tracing::debug;

const GLOBAL_MULTIPLIER_BOUNDS: (f64, f64) = (0.5, 2.0);
const CATEGORY_MULTIPLIER_BOUNDS: (f64, f64) = (0.5, 2.5);
const CATEGORY_EMA_ALPHA: f64 = 0.2;
const PRODUCTIVITY_EMA_ALPHA: f64 = 0.1;
const MIN_SAMPLES_FOR_SPECIFIC_MULTIPLIER: usize = 3;

/// Appends `record` (FIFO, capped at `MAX_COMPLETION_RECORDS`) and
/// recomputes every derived field in `learning` in place.
pub fn record_completion(learning: &mut LearningData, record: CompletionRecord) {
    debug!(task_id = %record.task_id, "recording completion for learning");

    learning.records.push(record.clone());
    if learning.records.len() > MAX_COMPLETION_RECORDS {
        let overflow = learning.records.len() - MAX_COMPLETION_RECORDS;
        learning.records.drain(0..overflow);
    }

    learning.global_multiplier = recompute_global_multiplier(&learning.records);

    if let Some(project_id) = &record.project_id {
        update_category_multiplier(&mut learning.project_multipliers, project_id, &record);
    }
    for tag in &record.tags {
        update_category_multiplier(&mut learning.category_multipliers, tag, &record);
    }

    update_productivity(learning, &record);
    learning.last_updated = Some(record.completed_date);
}

/// Weighted average of `actual/estimated` over the most recent
/// `GLOBAL_WINDOW` records, weight `1 / (1 + 0.1 * i)` with `i = 0` the
/// most recent record, clamped to `GLOBAL_MULTIPLIER_BOUNDS`.
fn recompute_global_multiplier(records: &[CompletionRecord]) -> f64 {
    let window: Vec<&CompletionRecord> = records.iter().rev().take(GLOBAL_WINDOW).collect();
    if window.is_empty() {
        return 1.0;
    }
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for (i, record) in window.iter().enumerate() {
        let weight = 1.0 / (1.0 + 0.1 * i as f64);
        weighted_sum += weight * accuracy_ratio(record);
        weight_total += weight;
    }
    let average = if weight_total > 0.0 {
        weighted_sum / weight_total
    } else {
        1.0
    };
    average.clamp(GLOBAL_MULTIPLIER_BOUNDS.0, GLOBAL_MULTIPLIER_BOUNDS.1)
}

fn update_category_multiplier(
    multipliers: &mut std::collections::HashMap<String, f64>,
    key: &str,
    record: &CompletionRecord,
) {
    let previous = multipliers.get(key).copied().unwrap_or(1.0);
    let updated = (1.0 - CATEGORY_EMA_ALPHA) * previous + CATEGORY_EMA_ALPHA * accuracy_ratio(record);
    multipliers.insert(
        key.to_string(),
        updated.clamp(CATEGORY_MULTIPLIER_BOUNDS.0, CATEGORY_MULTIPLIER_BOUNDS.1),
    );
}

fn accuracy_ratio(record: &CompletionRecord) -> f64 {
    if record.estimated_minutes <= 0 {
        return 1.0;
    }
    record.actual_minutes as f64 / record.estimated_minutes as f64
}

/// A sample > 1.0 means the task finished faster than estimated at that
/// hour/weekday; < 1.0 means slower. Fed into an EMA and then used to pick
/// the top-3 `peak_hours`.
fn productivity_sample(record: &CompletionRecord) -> f64 {
    if record.actual_minutes <= 0 {
        return 1.0;
    }
    (record.estimated_minutes as f64 / record.actual_minutes as f64).clamp(0.0, 2.0)
}

fn update_productivity(learning: &mut LearningData, record: &CompletionRecord) {
    let sample = productivity_sample(record);
    let hour = record.completion_hour.min(23) as usize;
    let weekday = weekday_index_from_date(record.completed_date);

    learning.productivity_by_hour[hour] =
        (1.0 - PRODUCTIVITY_EMA_ALPHA) * learning.productivity_by_hour[hour] + PRODUCTIVITY_EMA_ALPHA * sample;
    learning.productivity_by_day[weekday] =
        (1.0 - PRODUCTIVITY_EMA_ALPHA) * learning.productivity_by_day[weekday] + PRODUCTIVITY_EMA_ALPHA * sample;

    learning.peak_hours = top_peak_hours(&learning.productivity_by_hour);
}

fn weekday_index_from_date(date: chrono::NaiveDate) -> usize {
    use chrono::Datelike;
    date.weekday().num_days_from_sunday() as usize
}

/// Hours whose productivity is within 70% of the day's max, top 3.
fn top_peak_hours(productivity_by_hour: &[f64; 24]) -> Vec<u32> {
    let max = productivity_by_hour.iter().cloned().fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return Vec::new();
    }
    let threshold = 0.7 * max;
    let mut candidates: Vec<(usize, f64)> = productivity_by_hour
        .iter()
        .enumerate()
        .filter(|(_, v)| **v >= threshold)
        .map(|(h, v)| (h, *v))
        .collect();
    candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    candidates.truncate(3);
    candidates.into_iter().map(|(h, _)| h as u32).collect()
}

/// Blends global -> tag (>= 3 matching records) -> project (>= 3 matching
/// records) multipliers, most specific wins, then clamps the adjusted
/// estimate to `[15, 3 * estimated]` minutes.
pub fn adjust_estimate(task: &Task, learning: &LearningData) -> EstimateAdjustment {
    let estimated = task.estimated_minutes.max(1);

    let mut multiplier = learning.global_multiplier;
    let mut sample_count = learning.records.len().min(GLOBAL_WINDOW);
    let mut reason = "overall history".to_string();

    let mut best_tag: Option<(&str, usize)> = None;
    for tag in &task.tags {
        let count = learning
            .records
            .iter()
            .filter(|r| r.tags.iter().any(|t| t == tag))
            .count();
        if count >= MIN_SAMPLES_FOR_SPECIFIC_MULTIPLIER
            && count > best_tag.map(|(_, c)| c).unwrap_or(0)
        {
            best_tag = Some((tag.as_str(), count));
        }
    }
    if let Some((tag, count)) = best_tag {
        if let Some(m) = learning.category_multipliers.get(tag) {
            multiplier = *m;
            sample_count = count;
            reason = format!("blended in '{tag}' history ({count} completions)");
        }
    }

    if let Some(project_id) = &task.project_id {
        let count = learning
            .records
            .iter()
            .filter(|r| r.project_id.as_deref() == Some(project_id.as_str()))
            .count();
        if count >= MIN_SAMPLES_FOR_SPECIFIC_MULTIPLIER {
            if let Some(m) = learning.project_multipliers.get(project_id) {
                multiplier = *m;
                sample_count = count;
                reason = format!("blended in project '{project_id}' history ({count} completions)");
            }
        }
    }

    let raw_adjusted = (estimated as f64 * multiplier).round() as i64;
    let adjusted = raw_adjusted.clamp(15, estimated * 3);

    EstimateAdjustment {
        adjusted_minutes: adjusted,
        confidence: confidence_for_sample_count(sample_count),
        reason,
    }
}

fn confidence_for_sample_count(count: usize) -> u32 {
    if count < 3 {
        20
    } else if count < 5 {
        40
    } else if count < 10 {
        60
    } else if count < 20 {
        80
    } else {
        95
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::Priority;
    use chrono::NaiveDate;

    fn record(estimated: i64, actual: i64, hour: u32) -> CompletionRecord {
        CompletionRecord {
            task_id: "t1".to_string(),
            estimated_minutes: estimated,
            actual_minutes: actual,
            completed_date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            priority: Priority::Medium,
            project_id: Some("p1".to_string()),
            tags: vec!["writing".to_string()],
            completion_hour: hour,
        }
    }

    #[test]
    fn consistently_slower_completions_raise_global_multiplier() {
        let mut learning = LearningData::default();
        for _ in 0..5 {
            record_completion(&mut learning, record(60, 90, 10));
        }
        assert!(learning.global_multiplier > 1.0);
    }

    #[test]
    fn fifo_cap_keeps_only_most_recent_records() {
        let mut learning = LearningData::default();
        for i in 0..(MAX_COMPLETION_RECORDS + 10) {
            record_completion(&mut learning, record(30, 30, (i % 24) as u32));
        }
        assert_eq!(learning.records.len(), MAX_COMPLETION_RECORDS);
    }

    #[test]
    fn project_multiplier_requires_minimum_sample_count() {
        let mut learning = LearningData::default();
        let mut task = Task {
            id: "x".to_string(),
            title: "x".to_string(),
            status: Default::default(),
            priority: Priority::Medium,
            estimated_minutes: 60,
            due_date: None,
            scheduled_start: None,
            project_id: Some("p1".to_string()),
            milestone_id: None,
            tags: Default::default(),
            blocked_by: Vec::new(),
            blocking: Vec::new(),
            actual_duration_minutes: None,
        };
        task.tags.insert("writing".to_string());

        record_completion(&mut learning, record(60, 120, 10));
        record_completion(&mut learning, record(60, 120, 10));
        let adjustment_before = adjust_estimate(&task, &learning);

        record_completion(&mut learning, record(60, 120, 10));
        let adjustment_after = adjust_estimate(&task, &learning);

        assert!(adjustment_after.adjusted_minutes >= adjustment_before.adjusted_minutes);
        assert!(adjustment_after.confidence >= adjustment_before.confidence);
    }

    #[test]
    fn adjusted_estimate_is_clamped() {
        let mut learning = LearningData::default();
        learning.global_multiplier = 2.0;
        let task = Task {
            id: "x".to_string(),
            title: "x".to_string(),
            status: Default::default(),
            priority: Priority::Medium,
            estimated_minutes: 5,
            due_date: None,
            scheduled_start: None,
            project_id: None,
            milestone_id: None,
            tags: Default::default(),
            blocked_by: Vec::new(),
            blocking: Vec::new(),
            actual_duration_minutes: None,
        };
        let adjustment = adjust_estimate(&task, &learning);
        assert_eq!(adjustment.adjusted_minutes, 15); // clamped up from 10
    }
}
