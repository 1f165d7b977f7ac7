//! Report Content Generator
//!
//! Builds report payloads for a report type and date range. Volumes are
//! randomized base magnitudes scaled by the date-range multiplier; sentiment
//! breakdowns are sampled inside fixed bands and always sum to 100.

use chrono::{Days, Months, NaiveDate, Utc};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::{
    DateRange, PlatformBreakdown, PlatformStats, ReportData, ReportPayload, ReportType,
    SentimentSummary, TrendInterval, TrendPoint, TrendSeries,
};

/// Positive share band, in percent
pub const POSITIVE_RANGE: (u32, u32) = (60, 80);
/// Negative share band, in percent
pub const NEGATIVE_RANGE: (u32, u32) = (10, 25);
/// Neutral share band, in percent
pub const NEUTRAL_RANGE: (u32, u32) = (10, 20);

/// Base range for summary mentions over a 30 day window
const SUMMARY_MENTIONS_BASE: (u32, u32) = (12_000, 18_000);

/// Keywords surfaced per list
const KEYWORD_COUNT: usize = 5;

const TOP_KEYWORD_POOL: [&str; 10] = [
    "excellent",
    "quality",
    "fast delivery",
    "helpful",
    "satisfied",
    "friendly staff",
    "reliable",
    "great value",
    "easy to use",
    "responsive support",
];

const BOTTOM_KEYWORD_POOL: [&str; 10] = [
    "slow",
    "expensive",
    "confusing",
    "delayed",
    "poor",
    "buggy",
    "rude",
    "crashes",
    "overpriced",
    "hard to reach",
];

/// Platforms and their 30 day base mention ranges
const PLATFORMS: [(&str, (u32, u32)); 4] = [
    ("Twitter", (4_500, 6_500)),
    ("Instagram", (3_500, 5_000)),
    ("Facebook", (3_000, 4_500)),
    ("Reviews", (1_800, 2_600)),
];

/// A positive/negative/neutral split expressed in `unit`ths of a percent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Breakdown {
    positive: u32,
    negative: u32,
    neutral: u32,
}

/// Sample a breakdown inside the fixed bands that sums to exactly `100 * unit`
fn sample_breakdown<R: Rng + ?Sized>(rng: &mut R, unit: u32) -> Breakdown {
    let total = 100 * unit;
    let positive = rng.gen_range(POSITIVE_RANGE.0 * unit..=POSITIVE_RANGE.1 * unit);

    // Neutral is constrained so the remainder lands inside the negative band
    let neutral_min =
        (NEUTRAL_RANGE.0 * unit).max((total - NEGATIVE_RANGE.1 * unit).saturating_sub(positive));
    let neutral_max = (NEUTRAL_RANGE.1 * unit).min(total - NEGATIVE_RANGE.0 * unit - positive);
    let neutral = rng.gen_range(neutral_min..=neutral_max);

    Breakdown {
        positive,
        negative: total - positive - neutral,
        neutral,
    }
}

fn scaled_volume<R: Rng + ?Sized>(rng: &mut R, base: (u32, u32), range: DateRange) -> u64 {
    let base = rng.gen_range(base.0..=base.1) as f64;
    (base * range.multiplier()).round() as u64
}

fn pick_keywords<R: Rng + ?Sized>(rng: &mut R, pool: &[&str]) -> Vec<String> {
    pool.choose_multiple(rng, KEYWORD_COUNT)
        .map(|k| k.to_string())
        .collect()
}

fn summary<R: Rng + ?Sized>(rng: &mut R, range: DateRange) -> SentimentSummary {
    let split = sample_breakdown(rng, 10);

    SentimentSummary {
        total_mentions: scaled_volume(rng, SUMMARY_MENTIONS_BASE, range),
        positive_rate: split.positive as f64 / 10.0,
        negative_rate: split.negative as f64 / 10.0,
        neutral_rate: split.neutral as f64 / 10.0,
        average_score: rng.gen_range(60..=90) as f64 / 10.0,
        top_keywords: pick_keywords(rng, &TOP_KEYWORD_POOL),
        bottom_keywords: pick_keywords(rng, &BOTTOM_KEYWORD_POOL),
    }
}

fn platforms<R: Rng + ?Sized>(rng: &mut R, range: DateRange) -> PlatformBreakdown {
    let platforms = PLATFORMS
        .iter()
        .map(|(name, base)| {
            let split = sample_breakdown(rng, 1);
            PlatformStats {
                name: name.to_string(),
                mentions: scaled_volume(rng, *base, range),
                positive: split.positive,
                negative: split.negative,
                neutral: split.neutral,
            }
        })
        .collect();

    PlatformBreakdown { platforms }
}

/// Dates for a trend series, oldest first, ending on `today`
pub fn trend_dates(range: DateRange, today: NaiveDate) -> Vec<NaiveDate> {
    let (count, interval) = range.trend_points();

    (0..count as u32)
        .rev()
        .filter_map(|steps_back| match interval {
            TrendInterval::Daily => today.checked_sub_days(Days::new(steps_back as u64)),
            TrendInterval::Weekly => today.checked_sub_days(Days::new(7 * steps_back as u64)),
            TrendInterval::Monthly => today.checked_sub_months(Months::new(steps_back)),
        })
        .collect()
}

fn trends<R: Rng + ?Sized>(rng: &mut R, range: DateRange, today: NaiveDate) -> TrendSeries {
    let trends = trend_dates(range, today)
        .into_iter()
        .map(|date| {
            let split = sample_breakdown(rng, 1);
            TrendPoint {
                date: date.format("%Y-%m-%d").to_string(),
                positive: split.positive,
                negative: split.negative,
                neutral: split.neutral,
            }
        })
        .collect();

    TrendSeries { trends }
}

/// Build a payload for the given report selector
pub fn generate<R: Rng + ?Sized>(
    report_type: ReportType,
    range: DateRange,
    today: NaiveDate,
    rng: &mut R,
) -> ReportPayload {
    let data = match report_type {
        ReportType::SentimentSummary => ReportData::Summary(summary(rng, range)),
        ReportType::PlatformAnalysis => ReportData::Platforms(platforms(rng, range)),
        ReportType::TrendAnalysis => ReportData::Trends(trends(rng, range, today)),
    };

    ReportPayload {
        title: report_type.title().to_string(),
        description: report_type.description().to_string(),
        data,
    }
}

/// Build a payload dated today using the thread-local RNG
pub fn generate_now(report_type: ReportType, range: DateRange) -> ReportPayload {
    let today = Utc::now().date_naive();
    generate(report_type, range, today, &mut rand::thread_rng())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn assert_in_band(value: u32, band: (u32, u32), unit: u32) {
        assert!(
            value >= band.0 * unit && value <= band.1 * unit,
            "{value} outside {band:?} x{unit}"
        );
    }

    #[test]
    fn test_trend_lengths_follow_interval_rule() {
        let today = date("2024-06-15");
        let expected = [
            (DateRange::SevenDays, 7),
            (DateRange::ThirtyDays, 30),
            (DateRange::NinetyDays, 13),
            (DateRange::OneYear, 12),
        ];

        for (range, len) in expected {
            assert_eq!(trend_dates(range, today).len(), len, "range {range}");
        }
    }

    #[test]
    fn test_trend_dates_end_today_oldest_first() {
        let today = date("2024-06-15");

        let daily = trend_dates(DateRange::SevenDays, today);
        assert_eq!(daily.first(), Some(&date("2024-06-09")));
        assert_eq!(daily.last(), Some(&today));

        let weekly = trend_dates(DateRange::NinetyDays, today);
        assert_eq!(weekly[weekly.len() - 2], date("2024-06-08"));
        assert_eq!(weekly.first(), Some(&date("2024-03-23")));

        let monthly = trend_dates(DateRange::OneYear, today);
        assert_eq!(monthly.first(), Some(&date("2023-07-15")));
        assert_eq!(monthly.last(), Some(&today));
    }

    #[test]
    fn test_monthly_dates_clamp_to_month_end() {
        let monthly = trend_dates(DateRange::OneYear, date("2024-03-31"));
        assert!(monthly.contains(&date("2024-02-29")));
        assert!(monthly.contains(&date("2023-11-30")));
    }

    #[test]
    fn test_payload_variant_matches_report_type() {
        let mut rng = StdRng::seed_from_u64(7);
        let today = date("2024-01-31");

        for report_type in ReportType::ALL {
            let payload = generate(report_type, DateRange::ThirtyDays, today, &mut rng);
            assert_eq!(payload.title, report_type.title());
            let matches = matches!(
                (report_type, &payload.data),
                (ReportType::SentimentSummary, ReportData::Summary(_))
                    | (ReportType::PlatformAnalysis, ReportData::Platforms(_))
                    | (ReportType::TrendAnalysis, ReportData::Trends(_))
            );
            assert!(matches, "{report_type} produced {:?}", payload.data);
        }
    }

    #[test]
    fn test_platform_list_is_fixed() {
        let mut rng = StdRng::seed_from_u64(11);
        let payload = generate(
            ReportType::PlatformAnalysis,
            DateRange::SevenDays,
            date("2024-01-31"),
            &mut rng,
        );
        let ReportData::Platforms(breakdown) = payload.data else {
            panic!("expected platforms");
        };
        let names: Vec<&str> = breakdown.platforms.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Twitter", "Instagram", "Facebook", "Reviews"]);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn range_strategy() -> impl Strategy<Value = DateRange> {
            prop::sample::select(DateRange::ALL.to_vec())
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(50))]

            #[test]
            fn breakdown_stays_in_bands_and_sums_to_total(seed in any::<u64>(), unit in prop::sample::select(vec![1u32, 10])) {
                let mut rng = StdRng::seed_from_u64(seed);
                let split = sample_breakdown(&mut rng, unit);

                assert_in_band(split.positive, POSITIVE_RANGE, unit);
                assert_in_band(split.negative, NEGATIVE_RANGE, unit);
                assert_in_band(split.neutral, NEUTRAL_RANGE, unit);
                prop_assert_eq!(split.positive + split.negative + split.neutral, 100 * unit);
            }

            #[test]
            fn summary_shape_scales_with_range(seed in any::<u64>(), range in range_strategy()) {
                let mut rng = StdRng::seed_from_u64(seed);
                let payload = generate(ReportType::SentimentSummary, range, date("2024-05-01"), &mut rng);
                let ReportData::Summary(summary) = payload.data else {
                    panic!("expected summary");
                };

                let min = (SUMMARY_MENTIONS_BASE.0 as f64 * range.multiplier()).round() as u64;
                let max = (SUMMARY_MENTIONS_BASE.1 as f64 * range.multiplier()).round() as u64;
                prop_assert!(summary.total_mentions >= min && summary.total_mentions <= max);

                let sum = summary.positive_rate + summary.negative_rate + summary.neutral_rate;
                prop_assert!((sum - 100.0).abs() < 1e-6);
                prop_assert!(summary.average_score >= 6.0 && summary.average_score <= 9.0);
                prop_assert_eq!(summary.top_keywords.len(), KEYWORD_COUNT);
                prop_assert_eq!(summary.bottom_keywords.len(), KEYWORD_COUNT);

                let mut unique = summary.top_keywords.clone();
                unique.sort();
                unique.dedup();
                prop_assert_eq!(unique.len(), KEYWORD_COUNT);
            }

            #[test]
            fn trend_series_length_matches_range(seed in any::<u64>(), range in range_strategy()) {
                let mut rng = StdRng::seed_from_u64(seed);
                let payload = generate(ReportType::TrendAnalysis, range, date("2024-05-01"), &mut rng);
                let ReportData::Trends(series) = payload.data else {
                    panic!("expected trends");
                };

                prop_assert_eq!(series.trends.len(), range.trend_points().0);
                prop_assert_eq!(series.trends.last().map(|p| p.date.as_str()), Some("2024-05-01"));
                for point in &series.trends {
                    prop_assert_eq!(point.positive + point.negative + point.neutral, 100);
                }
            }
        }
    }
}
