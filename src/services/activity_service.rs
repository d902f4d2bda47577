//! Activity service - the ActivityAggregator
//!
//! Buckets a user's live reflections by day for the dashboard heatmap.
//! Days without reflections are absent; the view fills the calendar.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::auth::Caller;
use crate::db::{activity, JournalDb};
use crate::error::JournalError;

/// Highest heatmap level; counts above it share the top palette entry
pub const MAX_ACTIVITY_LEVEL: u8 = 4;

/// Heatmap intensity, 0 through 4
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ActivityLevel(u8);

impl ActivityLevel {
    pub fn from_count(count: u32) -> Self {
        Self(count.min(MAX_ACTIVITY_LEVEL as u32) as u8)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

/// One heatmap cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayActivity {
    pub date: NaiveDate,
    pub count: u32,
    pub level: ActivityLevel,
}

/// Activity payload for the dashboard, most recent day first
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub activities: Vec<DayActivity>,
}

pub struct ActivityService {
    db: Arc<JournalDb>,
}

impl ActivityService {
    pub fn new(db: Arc<JournalDb>) -> Self {
        Self { db }
    }

    /// Reflection count per day across the caller's live goals
    pub fn daily_counts(&self, caller: &Caller) -> Result<BTreeMap<NaiveDate, u32>, JournalError> {
        let session = caller.require()?;
        let days = self
            .db
            .with_conn(|conn| activity::live_reflection_days(conn, &session.user_id))?;

        let mut counts = BTreeMap::new();
        for day in days {
            *counts.entry(day).or_insert(0) += 1;
        }

        debug!(user_id = %session.user_id, days = counts.len(), "Aggregated activity");
        Ok(counts)
    }

    pub fn dashboard_stats(&self, caller: &Caller) -> Result<DashboardStats, JournalError> {
        let counts = self.daily_counts(caller)?;
        let mut activities = to_heatmap(&counts);
        activities.reverse();
        Ok(DashboardStats { activities })
    }
}

/// Map each counted day to its heatmap level, in ascending date order
pub fn to_heatmap(counts: &BTreeMap<NaiveDate, u32>) -> Vec<DayActivity> {
    counts
        .iter()
        .map(|(date, count)| DayActivity {
            date: *date,
            count: *count,
            level: ActivityLevel::from_count(*count),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SessionContext;
    use crate::services::{EventBus, GoalService, ReflectionContentInput, ReflectionService};

    #[test]
    fn test_level_is_capped_count() {
        assert_eq!(ActivityLevel::from_count(0).value(), 0);
        assert_eq!(ActivityLevel::from_count(3).value(), 3);
        assert_eq!(ActivityLevel::from_count(4).value(), 4);
        assert_eq!(ActivityLevel::from_count(7).value(), 4);
    }

    #[test]
    fn test_to_heatmap_keeps_counts() {
        let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let counts = BTreeMap::from([(day, 9)]);
        let cells = to_heatmap(&counts);
        assert_eq!(cells, vec![DayActivity { date: day, count: 9, level: ActivityLevel(4) }]);
    }

    #[test]
    fn test_dashboard_stats_counts_across_goals() {
        let db = Arc::new(JournalDb::open_in_memory().unwrap());
        let events = Arc::new(EventBus::new());
        let goals = GoalService::new(db.clone(), events.clone());
        let reflections = ReflectionService::new(db.clone(), events);
        let activity = ActivityService::new(db);
        let me = Caller::from_session(SessionContext::new("u1"));

        let d1 = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 6, 2).unwrap();
        for title in ["a", "b", "c"] {
            let goal = goals.create(&me, title, None).unwrap();
            reflections
                .record_daily(&me, &goal.id, d1.and_hms_opt(0, 0, 0), ReflectionContentInput::good("x"))
                .unwrap();
        }
        let last = goals.list(&me).unwrap()[0].goal.id.clone();
        reflections
            .record_daily(&me, &last, d2.and_hms_opt(0, 0, 0), ReflectionContentInput::good("y"))
            .unwrap();

        let stats = activity.dashboard_stats(&me).unwrap();
        let dates: Vec<_> = stats.activities.iter().map(|a| a.date).collect();
        assert_eq!(dates, vec![d2, d1]);
        assert_eq!(stats.activities[1].count, 3);
        assert_eq!(stats.activities[1].level.value(), 3);
    }

    #[test]
    fn test_anonymous_has_no_activity() {
        let activity = ActivityService::new(Arc::new(JournalDb::open_in_memory().unwrap()));
        assert!(matches!(
            activity.daily_counts(&Caller::Anonymous),
            Err(JournalError::Unauthorized(_))
        ));
    }
}
