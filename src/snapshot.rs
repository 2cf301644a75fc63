//! Input adapters for the member store and funnel store exports.

use std::io::Read;
use std::path::Path;

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::models::{ContactEvent, FunnelCounts, Member, MemberStatus, MonthlyMetrics};

/// Everything the engine needs for one gym, materialized in memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GymSnapshot {
    pub gym: String,
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub contacts: Vec<ContactEvent>,
    #[serde(default)]
    pub metrics: Vec<MonthlyMetrics>,
    #[serde(default)]
    pub funnel: Option<FunnelCounts>,
}

pub fn load(path: &Path) -> Result<GymSnapshot> {
    let source = std::fs::read_to_string(path)?;
    let snapshot: GymSnapshot = serde_json::from_str(&source)?;
    check_metrics_sequence(&snapshot.metrics)?;
    Ok(snapshot)
}

pub fn save(path: &Path, snapshot: &GymSnapshot) -> Result<()> {
    std::fs::write(path, serde_json::to_string_pretty(snapshot)?)?;
    Ok(())
}

/// Monthly metrics must be chronological with no missing months and carry
/// finite readings. Gaps are reported, never interpolated.
pub fn check_metrics_sequence(metrics: &[MonthlyMetrics]) -> Result<()> {
    for m in metrics {
        if m.month.day() != 1 {
            return Err(EngineError::invalid(format!(
                "metrics month {} is not the first day of a month",
                m.month
            )));
        }
        if !(m.mrr.is_finite() && m.churn_rate.is_finite() && m.rsi.is_finite()) {
            return Err(EngineError::invalid(format!(
                "metrics for {} have a non-numeric mrr, churn rate or rsi",
                m.month
            )));
        }
    }
    for pair in metrics.windows(2) {
        let expected = pair[0].month.checked_add_months(Months::new(1));
        if expected != Some(pair[1].month) {
            return Err(EngineError::invalid(format!(
                "metrics jump from {} to {}; months must be consecutive",
                pair[0].month, pair[1].month
            )));
        }
    }
    Ok(())
}

#[derive(Deserialize)]
struct CsvRow {
    id: Option<Uuid>,
    name: String,
    join_date: NaiveDate,
    cancel_date: Option<NaiveDate>,
    monthly_rate: f64,
    status: MemberStatus,
    last_attended_date: Option<NaiveDate>,
    last_contacted_at: Option<NaiveDate>,
}

pub fn read_members_csv<R: Read>(reader: R) -> Result<Vec<Member>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut members = Vec::new();

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        members.push(Member {
            id: row.id.unwrap_or_else(Uuid::new_v4),
            name: row.name,
            join_date: row.join_date,
            cancel_date: row.cancel_date,
            monthly_rate: row.monthly_rate,
            status: row.status,
            last_attended_date: row.last_attended_date,
            last_contacted_at: row.last_contacted_at,
        });
    }

    Ok(members)
}

pub fn import_members_csv(csv_path: &Path) -> Result<Vec<Member>> {
    read_members_csv(std::fs::File::open(csv_path)?)
}

/// Replaces members with a matching id and appends the rest. Returns how many
/// were new.
pub fn merge_members(snapshot: &mut GymSnapshot, members: Vec<Member>) -> usize {
    let mut inserted = 0usize;
    for member in members {
        match snapshot.members.iter_mut().find(|m| m.id == member.id) {
            Some(existing) => *existing = member,
            None => {
                snapshot.members.push(member);
                inserted += 1;
            }
        }
    }
    inserted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(y: i32, m: u32) -> MonthlyMetrics {
        MonthlyMetrics {
            month: NaiveDate::from_ymd_opt(y, m, 1).unwrap(),
            mrr: 1_000.0,
            active_members: 10,
            new_members: 1,
            cancels: 1,
            churn_rate: 10.0,
            rsi: 70.0,
        }
    }

    #[test]
    fn consecutive_months_pass() {
        let metrics = vec![month(2025, 11), month(2025, 12), month(2026, 1)];
        assert!(check_metrics_sequence(&metrics).is_ok());
        assert!(check_metrics_sequence(&[]).is_ok());
    }

    #[test]
    fn gaps_and_disorder_are_flagged() {
        let gap = vec![month(2026, 1), month(2026, 3)];
        assert!(matches!(
            check_metrics_sequence(&gap),
            Err(EngineError::InvalidInput(_))
        ));
        let backwards = vec![month(2026, 2), month(2026, 1)];
        assert!(check_metrics_sequence(&backwards).is_err());
    }

    #[test]
    fn non_numeric_readings_are_flagged() {
        let mut bad = month(2026, 2);
        bad.churn_rate = f64::NAN;
        let metrics = vec![month(2026, 1), bad];
        assert!(matches!(
            check_metrics_sequence(&metrics),
            Err(EngineError::InvalidInput(msg)) if msg.contains("2026-02-01")
        ));
    }

    #[test]
    fn reads_roster_csv() {
        let data = "\
id,name,join_date,cancel_date,monthly_rate,status,last_attended_date,last_contacted_at
3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2,Avery Lee,2026-01-05,,89.0,active,2026-05-20,2026-05-01
,Jules Moreno,2025-11-12,2026-04-30,120.0,cancelled,,
";
        let members = read_members_csv(data.as_bytes()).unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(
            members[0].id,
            Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2").unwrap()
        );
        assert_eq!(members[0].cancel_date, None);
        assert_eq!(members[1].status, MemberStatus::Cancelled);
        assert_eq!(members[1].last_attended_date, None);
        assert!(!members[1].id.is_nil());
    }

    #[test]
    fn merge_replaces_by_id() {
        let data = "\
id,name,join_date,cancel_date,monthly_rate,status,last_attended_date,last_contacted_at
3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2,Avery Lee,2026-01-05,,89.0,active,,
";
        let mut snapshot = GymSnapshot {
            gym: "Eastside".to_string(),
            members: read_members_csv(data.as_bytes()).unwrap(),
            ..GymSnapshot::default()
        };
        let mut updated = read_members_csv(data.as_bytes()).unwrap();
        updated[0].monthly_rate = 99.0;

        assert_eq!(merge_members(&mut snapshot, updated), 0);
        assert_eq!(snapshot.members.len(), 1);
        assert_eq!(snapshot.members[0].monthly_rate, 99.0);
    }

    #[test]
    fn load_rejects_gapped_metrics() {
        let snapshot = GymSnapshot {
            gym: "Eastside".to_string(),
            metrics: vec![month(2026, 1), month(2026, 4)],
            ..GymSnapshot::default()
        };
        let file = tempfile::NamedTempFile::new().unwrap();
        save(file.path(), &snapshot).unwrap();
        assert!(load(file.path()).is_err());
    }
}
