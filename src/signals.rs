use chrono::NaiveDate;

use crate::config::ChurnConfig;
use crate::error::{EngineError, Result};
use crate::models::{ContactEvent, Features, Member};

/// Whole days from `from` to `now`; dates after `now` count as zero.
pub fn days_between(from: NaiveDate, now: NaiveDate) -> i64 {
    (now - from).num_days().max(0)
}

/// Latest contact from either the member record or the contact log.
/// Events logged for other members are ignored.
pub fn last_contact(member: &Member, contacts: &[ContactEvent]) -> Option<NaiveDate> {
    contacts
        .iter()
        .filter(|event| event.member_id == member.id)
        .map(|event| event.contacted_at)
        .chain(member.last_contacted_at)
        .max()
}

pub fn extract_features(
    member: &Member,
    contacts: &[ContactEvent],
    now: NaiveDate,
    config: &ChurnConfig,
) -> Result<Features> {
    validate_member(member, now)?;

    let last_contacted = last_contact(member, contacts);

    Ok(Features {
        member_id: member.id,
        status: member.status,
        tenure_days: member.tenure_days(now),
        tenure_months: member.tenure_months(now),
        days_since_attendance: member.last_attended_date.map(|d| days_between(d, now)),
        days_since_contact: last_contacted.map(|d| days_between(d, now)),
        never_contacted: last_contacted.is_none(),
        monthly_rate: member.monthly_rate,
        total_revenue: member.total_revenue(now),
        is_high_value: member.monthly_rate >= config.high_value_monthly_rate,
    })
}

fn validate_member(member: &Member, now: NaiveDate) -> Result<()> {
    if !member.monthly_rate.is_finite() || member.monthly_rate < 0.0 {
        return Err(EngineError::invalid(format!(
            "member {} has invalid monthly rate {}",
            member.id, member.monthly_rate
        )));
    }
    if member.join_date > now {
        return Err(EngineError::invalid(format!(
            "member {} joined {} which is after {}",
            member.id, member.join_date, now
        )));
    }
    if let Some(cancelled) = member.cancel_date {
        if cancelled < member.join_date {
            return Err(EngineError::invalid(format!(
                "member {} cancelled {} before joining {}",
                member.id, cancelled, member.join_date
            )));
        }
    }
    if let Some(attended) = member.last_attended_date {
        if attended < member.join_date {
            return Err(EngineError::invalid(format!(
                "member {} last attended {} before joining {}",
                member.id, attended, member.join_date
            )));
        }
    }
    Ok(())
}
