//! # Retention Rules
//!
//! Base retention (days, cycles, archiver days, job count), the three extended
//! retention slots, and media refresh settings, applied to a staged
//! [`CopyProperties`].

use std::str::FromStr;

use crate::error::ValidationError;
use crate::properties::{
    CopyProperties, ExtendedRetentionRule, MediaRefreshProperties, MonthCount, RetentionRules,
};
use crate::wire::{bit, is_set};

/// Passed for days, cycles or archiver days to keep the value the service has.
pub const RETAIN_UNCHANGED: i64 = -1;

// ============================================================================
// BASE RETENTION
// ============================================================================

/// A retention change. Negative values for `days`, `cycles` and
/// `archive_days` leave the current value in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionUpdate {
    pub days: i64,
    pub cycles: i64,
    pub archive_days: i64,
    /// Job-count retention. Positive turns on job-based retention, zero or
    /// negative turns it off. `None` leaves both untouched.
    pub jobs: Option<i64>,
    /// Retain forever. Forces `days` to -1 on the wire, overriding `days`.
    pub infinite: bool,
}

impl RetentionUpdate {
    pub fn new(days: i64, cycles: i64, archive_days: i64) -> Self {
        RetentionUpdate {
            days,
            cycles,
            archive_days,
            jobs: None,
            infinite: false,
        }
    }

    /// Changes nothing until combined with the builder methods below.
    pub fn unchanged() -> Self {
        Self::new(RETAIN_UNCHANGED, RETAIN_UNCHANGED, RETAIN_UNCHANGED)
    }

    #[must_use]
    pub fn with_jobs(mut self, jobs: i64) -> Self {
        self.jobs = Some(jobs);
        self
    }

    #[must_use]
    pub fn with_infinite(mut self, infinite: bool) -> Self {
        self.infinite = infinite;
        self
    }

    pub fn apply(&self, rules: &mut RetentionRules) {
        if self.days >= 0 {
            rules.retain_backup_data_for_days = Some(self.days);
        }
        if self.cycles >= 0 {
            rules.retain_backup_data_for_cycles = Some(self.cycles);
        }
        if self.archive_days >= 0 {
            rules.retain_archiver_data_for_days = Some(self.archive_days);
        }
        if let Some(jobs) = self.jobs {
            rules.jobs = Some(jobs);
            rules.retention_flags.job_based_retention = Some(bit(jobs > 0));
        }
        if self.infinite {
            rules.retain_backup_data_for_days = Some(RETAIN_UNCHANGED);
        }
    }
}

// ============================================================================
// EXTENDED RETENTION
// ============================================================================

/// Extended retention rule types with their wire bit values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtendedRetentionKind {
    AllFull,
    Week,
    Month,
    Quarter,
    HalfYear,
    Year,
    ManuallyPin,
    GraceWeek,
    GraceMonth,
    GraceQuarter,
    GraceHalfYear,
    GraceYear,
    CandidateWeek,
    CandidateMonth,
    CandidateQuarter,
    CandidateHalfYear,
    CandidateYear,
    Hour,
    Day,
    CandidateHour,
    CandidateDay,
    GraceHour,
    GraceDay,
    LastJob,
    First,
}

impl ExtendedRetentionKind {
    pub const ALL: [ExtendedRetentionKind; 25] = [
        ExtendedRetentionKind::AllFull,
        ExtendedRetentionKind::Week,
        ExtendedRetentionKind::Month,
        ExtendedRetentionKind::Quarter,
        ExtendedRetentionKind::HalfYear,
        ExtendedRetentionKind::Year,
        ExtendedRetentionKind::ManuallyPin,
        ExtendedRetentionKind::GraceWeek,
        ExtendedRetentionKind::GraceMonth,
        ExtendedRetentionKind::GraceQuarter,
        ExtendedRetentionKind::GraceHalfYear,
        ExtendedRetentionKind::GraceYear,
        ExtendedRetentionKind::CandidateWeek,
        ExtendedRetentionKind::CandidateMonth,
        ExtendedRetentionKind::CandidateQuarter,
        ExtendedRetentionKind::CandidateHalfYear,
        ExtendedRetentionKind::CandidateYear,
        ExtendedRetentionKind::Hour,
        ExtendedRetentionKind::Day,
        ExtendedRetentionKind::CandidateHour,
        ExtendedRetentionKind::CandidateDay,
        ExtendedRetentionKind::GraceHour,
        ExtendedRetentionKind::GraceDay,
        ExtendedRetentionKind::LastJob,
        ExtendedRetentionKind::First,
    ];

    pub fn bits(self) -> u32 {
        match self {
            ExtendedRetentionKind::AllFull => 2,
            ExtendedRetentionKind::Week => 4,
            ExtendedRetentionKind::Month => 8,
            ExtendedRetentionKind::Quarter => 16,
            ExtendedRetentionKind::HalfYear => 32,
            ExtendedRetentionKind::Year => 64,
            ExtendedRetentionKind::ManuallyPin => 128,
            ExtendedRetentionKind::GraceWeek => 256,
            ExtendedRetentionKind::GraceMonth => 512,
            ExtendedRetentionKind::GraceQuarter => 1024,
            ExtendedRetentionKind::GraceHalfYear => 2048,
            ExtendedRetentionKind::GraceYear => 4096,
            ExtendedRetentionKind::CandidateWeek => 8192,
            ExtendedRetentionKind::CandidateMonth => 16384,
            ExtendedRetentionKind::CandidateQuarter => 32768,
            ExtendedRetentionKind::CandidateHalfYear => 65536,
            ExtendedRetentionKind::CandidateYear => 131072,
            ExtendedRetentionKind::Hour => 262144,
            ExtendedRetentionKind::Day => 524288,
            ExtendedRetentionKind::CandidateHour => 1048576,
            ExtendedRetentionKind::CandidateDay => 2097152,
            ExtendedRetentionKind::GraceHour => 4194304,
            ExtendedRetentionKind::GraceDay => 8388608,
            ExtendedRetentionKind::LastJob => 16777216,
            ExtendedRetentionKind::First => 33554432,
        }
    }

    pub fn from_bits(bits: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.bits() == bits)
    }

    /// Symbolic name used by the service's tooling, e.g. `EXTENDED_MONTH`.
    pub fn symbol(self) -> &'static str {
        match self {
            ExtendedRetentionKind::AllFull => "EXTENDED_ALLFULL",
            ExtendedRetentionKind::Week => "EXTENDED_WEEK",
            ExtendedRetentionKind::Month => "EXTENDED_MONTH",
            ExtendedRetentionKind::Quarter => "EXTENDED_QUARTER",
            ExtendedRetentionKind::HalfYear => "EXTENDED_HALFYEAR",
            ExtendedRetentionKind::Year => "EXTENDED_YEAR",
            ExtendedRetentionKind::ManuallyPin => "MANUALLY_PIN",
            ExtendedRetentionKind::GraceWeek => "EXTENDED_GRACE_WEEK",
            ExtendedRetentionKind::GraceMonth => "EXTENDED_GRACE_MONTH",
            ExtendedRetentionKind::GraceQuarter => "EXTENDED_GRACE_QUARTER",
            ExtendedRetentionKind::GraceHalfYear => "EXTENDED_GRACE_HALFYEAR",
            ExtendedRetentionKind::GraceYear => "EXTENDED_GRACE_YEAR",
            ExtendedRetentionKind::CandidateWeek => "EXTENDED_CANDIDATE_WEEK",
            ExtendedRetentionKind::CandidateMonth => "EXTENDED_CANDIDATE_MONTH",
            ExtendedRetentionKind::CandidateQuarter => "EXTENDED_CANDIDATE_QUARTER",
            ExtendedRetentionKind::CandidateHalfYear => "EXTENDED_CANDIDATE_HALFYEAR",
            ExtendedRetentionKind::CandidateYear => "EXTENDED_CANDIDATE_YEAR",
            ExtendedRetentionKind::Hour => "EXTENDED_HOUR",
            ExtendedRetentionKind::Day => "EXTENDED_DAY",
            ExtendedRetentionKind::CandidateHour => "EXTENDED_CANDIDATE_HOUR",
            ExtendedRetentionKind::CandidateDay => "EXTENDED_CANDIDATE_DAY",
            ExtendedRetentionKind::GraceHour => "EXTENDED_GRACE_HOUR",
            ExtendedRetentionKind::GraceDay => "EXTENDED_GRACE_DAY",
            ExtendedRetentionKind::LastJob => "EXTENDED_LAST_JOB",
            ExtendedRetentionKind::First => "EXTENDED_FIRST",
        }
    }
}

impl std::fmt::Display for ExtendedRetentionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for ExtendedRetentionKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.symbol().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ValidationError::UnknownRetentionRule(wanted.to_string()))
    }
}

/// One of the three fixed extended retention slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetentionSlot {
    One,
    Two,
    Three,
}

impl RetentionSlot {
    pub const ALL: [RetentionSlot; 3] = [RetentionSlot::One, RetentionSlot::Two, RetentionSlot::Three];

    pub fn from_index(index: u8) -> Result<Self, ValidationError> {
        match index {
            1 => Ok(RetentionSlot::One),
            2 => Ok(RetentionSlot::Two),
            3 => Ok(RetentionSlot::Three),
            other => Err(ValidationError::InvalidRetentionSlot(other)),
        }
    }

    pub fn index(self) -> u8 {
        match self {
            RetentionSlot::One => 1,
            RetentionSlot::Two => 2,
            RetentionSlot::Three => 3,
        }
    }

    /// Field name of the slot inside `retentionRules`.
    pub fn field_name(self) -> &'static str {
        match self {
            RetentionSlot::One => "extendedRetentionRuleOne",
            RetentionSlot::Two => "extendedRetentionRuleTwo",
            RetentionSlot::Three => "extendedRetentionRuleThree",
        }
    }

    fn slot(self, rules: &RetentionRules) -> Option<&ExtendedRetentionRule> {
        match self {
            RetentionSlot::One => rules.extended_retention_rule_one.as_ref(),
            RetentionSlot::Two => rules.extended_retention_rule_two.as_ref(),
            RetentionSlot::Three => rules.extended_retention_rule_three.as_ref(),
        }
    }

    fn slot_mut(self, rules: &mut RetentionRules) -> &mut Option<ExtendedRetentionRule> {
        match self {
            RetentionSlot::One => &mut rules.extended_retention_rule_one,
            RetentionSlot::Two => &mut rules.extended_retention_rule_two,
            RetentionSlot::Three => &mut rules.extended_retention_rule_three,
        }
    }
}

/// Decoded extended retention slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendedRetention {
    pub enabled: bool,
    /// Raw wire value; see [`ExtendedRetention::rule`].
    pub rule_bits: u32,
    pub end_days: i64,
    pub grace_days: i64,
}

impl ExtendedRetention {
    /// `None` when the service reports a bit value outside the known table.
    pub fn rule(&self) -> Option<ExtendedRetentionKind> {
        ExtendedRetentionKind::from_bits(self.rule_bits)
    }
}

impl CopyProperties {
    pub fn apply_retention(&mut self, update: &RetentionUpdate) {
        update.apply(&mut self.retention_rules);
    }

    /// Writes one extended retention slot. `slot` must be 1, 2 or 3.
    pub fn set_extended_retention(
        &mut self,
        slot: u8,
        enabled: bool,
        rule: ExtendedRetentionKind,
        end_days: i64,
        grace_days: i64,
    ) -> Result<(), ValidationError> {
        let slot = RetentionSlot::from_index(slot)?;
        let entry = slot
            .slot_mut(&mut self.retention_rules)
            .get_or_insert_with(ExtendedRetentionRule::default);
        entry.is_enabled = bit(enabled);
        entry.rule = rule.bits();
        entry.end_days = end_days;
        entry.grace_days = grace_days;
        Ok(())
    }

    /// All three slots in order. A slot the service did not send is `None`.
    pub fn extended_retention_rules(&self) -> [Option<ExtendedRetention>; 3] {
        RetentionSlot::ALL.map(|slot| {
            slot.slot(&self.retention_rules).map(|r| ExtendedRetention {
                enabled: r.is_enabled != 0,
                rule_bits: r.rule,
                end_days: r.end_days,
                grace_days: r.grace_days,
            })
        })
    }

    pub fn retention_days(&self) -> Option<i64> {
        self.retention_rules.retain_backup_data_for_days
    }

    pub fn retention_cycles(&self) -> Option<i64> {
        self.retention_rules.retain_backup_data_for_cycles
    }

    pub fn archive_retention_days(&self) -> Option<i64> {
        self.retention_rules.retain_archiver_data_for_days
    }

    pub fn retention_jobs(&self) -> Option<i64> {
        self.retention_rules.jobs
    }

    pub fn is_job_based_retention(&self) -> bool {
        is_set(self.retention_rules.retention_flags.job_based_retention)
    }

    pub fn managed_disk_space(&self) -> bool {
        is_set(self.retention_rules.retention_flags.enable_managed_disk_space)
    }

    pub fn set_managed_disk_space(&mut self, enabled: bool) {
        self.retention_rules.retention_flags.enable_managed_disk_space = Some(bit(enabled));
    }

    pub fn is_media_refresh_enabled(&self) -> bool {
        is_set(self.copy_flags.enable_media_refresh)
    }

    pub fn apply_media_refresh(&mut self, settings: &MediaRefreshSettings) {
        self.copy_flags.enable_media_refresh = Some(bit(settings.enabled));
        if settings.enabled {
            self.media_properties.media_refresh_properties = Some(MediaRefreshProperties {
                percentage: settings.percentage,
                months_before_media_aged: MonthCount {
                    months: settings.months_before_aged,
                },
                months_after_media_written: MonthCount {
                    months: settings.months_after_written,
                },
                extra: Default::default(),
            });
        }
    }
}

// ============================================================================
// MEDIA REFRESH
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaRefreshSettings {
    pub enabled: bool,
    pub months_before_aged: u32,
    pub months_after_written: u32,
    pub percentage: u32,
}

impl Default for MediaRefreshSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            months_before_aged: 3,
            months_after_written: 12,
            percentage: 51,
        }
    }
}

impl MediaRefreshSettings {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}
