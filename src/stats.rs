//! Descriptive statistics over vigilance periods.
//!
//! Periods are named sets of inclusive `[start, end]` ranges in seconds
//! (`eveil`, `sommeil`, …).  Events falling outside every period are left
//! out of the per-period tables.
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use anyhow::{anyhow, Context, Result};

use crate::annotation::AnnotationEvent;
use crate::morphology::MorphologyRecord;

/// Period name → inclusive `[start, end]` ranges (s).
pub type Periods = BTreeMap<String, Vec<[f64; 2]>>;

/// Period → electrode → value.
pub type PeriodTable<T> = BTreeMap<String, BTreeMap<String, T>>;

/// Upper-cased name of the first period containing `t_sec`.
///
/// Periods are tried in name order.
pub fn label_period(t_sec: f64, periods: &Periods) -> Option<String> {
    periods
        .iter()
        .find(|(_, ranges)| ranges.iter().any(|[s, e]| *s <= t_sec && t_sec <= *e))
        .map(|(name, _)| name.to_uppercase())
}

/// Events per period and electrode.  Timestamps are in seconds.
pub fn counts_by_period(events: &[AnnotationEvent], periods: &Periods) -> PeriodTable<usize> {
    let mut table = PeriodTable::new();
    for e in events {
        if let Some(period) = label_period(e.timestamp, periods) {
            *table
                .entry(period)
                .or_default()
                .entry(e.electrode.clone())
                .or_default() += 1;
        }
    }
    table
}

/// Counts divided by the duration of their period.
///
/// `durations` keys are matched case-insensitively.
pub fn normalized_rates(
    counts: &PeriodTable<usize>,
    durations: &BTreeMap<String, f64>,
) -> Result<PeriodTable<f64>> {
    counts
        .iter()
        .map(|(period, per_electrode)| {
            let duration = durations
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(period))
                .map(|(_, d)| *d)
                .ok_or_else(|| anyhow!("no duration configured for period '{period}'"))?;
            let rates = per_electrode
                .iter()
                .map(|(elec, &n)| (elec.clone(), n as f64 / duration))
                .collect();
            Ok((period.clone(), rates))
        })
        .collect()
}

/// Per-electrode `rate[numerator] / rate[denominator]`.
///
/// `None` when the electrode is missing from either period or the
/// denominator rate is zero.
pub fn period_ratio(
    rates: &PeriodTable<f64>,
    numerator: &str,
    denominator: &str,
) -> BTreeMap<String, Option<f64>> {
    let empty = BTreeMap::new();
    let num = rates.get(&numerator.to_uppercase()).unwrap_or(&empty);
    let den = rates.get(&denominator.to_uppercase()).unwrap_or(&empty);
    num.keys()
        .chain(den.keys())
        .map(|elec| {
            let ratio = match (num.get(elec), den.get(elec)) {
                (Some(&a), Some(&b)) if b != 0.0 => Some(a / b),
                _ => None,
            };
            (elec.clone(), ratio)
        })
        .collect()
}

/// Quantile with linear interpolation between order statistics
/// (pandas' default).  Non-finite values are ignored.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    let mut v: Vec<f64> = values.iter().copied().filter(|x| x.is_finite()).collect();
    if v.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    v.sort_by(f64::total_cmp);
    let pos = q * (v.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(v[lo] + (v[hi] - v[lo]) * (pos - lo as f64))
}

/// Tukey fences `Q1 − 1.5·IQR`, `Q3 + 1.5·IQR`.
pub fn iqr_fences(values: &[f64]) -> Option<(f64, f64)> {
    let q1 = quantile(values, 0.25)?;
    let q3 = quantile(values, 0.75)?;
    let iqr = q3 - q1;
    Some((q1 - 1.5 * iqr, q3 + 1.5 * iqr))
}

/// Morphology columns analysed for outliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MorphologyVariable {
    Amplitude,
    HalfWidth,
    NegativeSlope,
    PositiveSlope,
}

impl MorphologyVariable {
    pub const ALL: [MorphologyVariable; 4] = [
        MorphologyVariable::Amplitude,
        MorphologyVariable::HalfWidth,
        MorphologyVariable::NegativeSlope,
        MorphologyVariable::PositiveSlope,
    ];

    pub fn value(self, r: &MorphologyRecord) -> Option<f64> {
        match self {
            MorphologyVariable::Amplitude => Some(r.amplitude),
            MorphologyVariable::HalfWidth => r.half_width,
            MorphologyVariable::NegativeSlope => Some(r.negative_slope),
            MorphologyVariable::PositiveSlope => Some(r.positive_slope),
        }
    }
}

impl fmt::Display for MorphologyVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MorphologyVariable::Amplitude => "Amplitude",
            MorphologyVariable::HalfWidth => "Half_Width",
            MorphologyVariable::NegativeSlope => "Negative_Slope",
            MorphologyVariable::PositiveSlope => "Positive_Slope",
        };
        f.write_str(name)
    }
}

/// A record outside the Tukey fences of its (electrode, period) group.
#[derive(Debug, Clone, PartialEq)]
pub struct Outlier {
    pub variable: MorphologyVariable,
    pub period: String,
    pub value: f64,
    pub record: MorphologyRecord,
}

/// Outliers of `variable`, grouped by electrode and period.
///
/// Records outside every period and records without a value for
/// `variable` are ignored.
pub fn morphology_outliers(
    records: &[MorphologyRecord],
    periods: &Periods,
    variable: MorphologyVariable,
) -> Vec<Outlier> {
    let mut groups: BTreeMap<(String, String), Vec<(&MorphologyRecord, f64)>> = BTreeMap::new();
    for r in records {
        let (Some(period), Some(value)) = (label_period(r.timestamp, periods), variable.value(r)) else {
            continue;
        };
        groups.entry((r.electrode.clone(), period)).or_default().push((r, value));
    }

    let mut outliers = Vec::new();
    for ((_, period), members) in groups {
        let values: Vec<f64> = members.iter().map(|(_, v)| *v).collect();
        let Some((lower, upper)) = iqr_fences(&values) else {
            continue;
        };
        for (r, value) in members {
            if value < lower || value > upper {
                outliers.push(Outlier {
                    variable,
                    period: period.clone(),
                    value,
                    record: r.clone(),
                });
            }
        }
    }
    outliers
}

/// Write outliers as `Variable,Period,Tmu,Electrode,Channel,Value`.
pub fn write_outliers(path: &Path, outliers: &[Outlier]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["Variable", "Period", "Tmu", "Electrode", "Channel", "Value"])?;
    for o in outliers {
        writer.write_record([
            o.variable.to_string(),
            o.period.clone(),
            o.record.timestamp.to_string(),
            o.record.electrode.clone(),
            o.record.channel.clone(),
            o.value.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
