use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};

use super::aggregate::{DeviceBucketAverage, MeanAcc};

/// Subtree-level totals for one bucket, combined across every device that
/// reported in it.
#[derive(Debug, Clone)]
pub struct SubtreeBucketTotal {
    pub bucket: DateTime<Utc>,
    pub total_gfr: f64,
    pub total_gor: f64,
    pub total_ofr: f64,
    pub total_wfr: f64,
    /// Gas volume fraction (%), recomputed from the summed flows.
    pub total_gvf: f64,
    /// Water-liquid ratio (%), recomputed from the summed flows.
    pub total_wlr: f64,
    pub avg_pressure: Option<f64>,
    pub avg_temp: Option<f64>,
    /// Distinct devices with an entry (of any quantity) in this bucket.
    pub device_count: i64,
}

#[derive(Default)]
struct BucketAcc {
    gfr: f64,
    gor: f64,
    ofr: f64,
    wfr: f64,
    pressure: MeanAcc,
    temperature: MeanAcc,
    devices: HashSet<i32>,
}

/// Collapses per-device bucket averages into per-bucket subtree totals.
///
/// Flow rates are extensive and are summed across devices; a device whose
/// average for a flow is null contributes 0 to the sum. That differs from
/// the per-device stage, where nulls are excluded from the mean — the
/// zero-substitution here mirrors the stored procedure this replaces
/// (`COALESCE(SUM(..), 0)`) and keeps a device with no valid reading from
/// knocking the whole bucket out. Pressure and temperature are intensive
/// and are averaged over the devices that reported them. GVF and WLR are
/// recomputed from the summed flows because a ratio of sums, not a sum of
/// ratios, is what is physically meaningful for the subtree.
pub fn combine(averages: &[DeviceBucketAverage]) -> Vec<SubtreeBucketTotal> {
    let mut buckets: BTreeMap<DateTime<Utc>, BucketAcc> = BTreeMap::new();
    for avg in averages {
        let acc = buckets.entry(avg.bucket).or_default();
        acc.gfr += avg.values.gfr.unwrap_or(0.0);
        acc.gor += avg.values.gor.unwrap_or(0.0);
        acc.ofr += avg.values.ofr.unwrap_or(0.0);
        acc.wfr += avg.values.wfr.unwrap_or(0.0);
        acc.pressure.observe(avg.values.pressure);
        acc.temperature.observe(avg.values.temperature);
        acc.devices.insert(avg.device_id);
    }

    buckets
        .into_iter()
        .map(|(bucket, acc)| {
            let three_phase = acc.gfr + acc.ofr + acc.wfr;
            let liquid = acc.ofr + acc.wfr;
            SubtreeBucketTotal {
                bucket,
                total_gfr: acc.gfr,
                total_gor: acc.gor,
                total_ofr: acc.ofr,
                total_wfr: acc.wfr,
                total_gvf: if three_phase > 0.0 {
                    acc.gfr * 100.0 / three_phase
                } else {
                    0.0
                },
                total_wlr: if liquid > 0.0 {
                    acc.wfr * 100.0 / liquid
                } else {
                    0.0
                },
                avg_pressure: acc.pressure.mean(),
                avg_temp: acc.temperature.mean(),
                device_count: acc.devices.len() as i64,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::charts::source::QuantityValues;
    use chrono::TimeZone;

    fn bucket_at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 14, 9, minute, 0)
            .single()
            .expect("bucket")
    }

    fn avg(device_id: i32, bucket: DateTime<Utc>, values: QuantityValues) -> DeviceBucketAverage {
        DeviceBucketAverage {
            device_id,
            bucket,
            values,
            samples: 1,
        }
    }

    #[test]
    fn sums_flows_with_null_as_zero_and_recomputes_ratios() {
        let bucket = bucket_at(5);
        let averages = vec![
            avg(
                1,
                bucket,
                QuantityValues {
                    gfr: Some(10.0),
                    gor: Some(3.0),
                    ..Default::default()
                },
            ),
            avg(
                2,
                bucket,
                QuantityValues {
                    ofr: Some(5.0),
                    wfr: Some(5.0),
                    ..Default::default()
                },
            ),
        ];

        let out = combine(&averages);
        assert_eq!(out.len(), 1);
        let total = &out[0];
        assert_eq!(total.total_gfr, 10.0);
        // Device 2 never reported GOR; it contributes 0 to the sum.
        assert_eq!(total.total_gor, 3.0);
        assert_eq!(total.total_ofr, 5.0);
        assert_eq!(total.total_wfr, 5.0);
        // gvf = 10 * 100 / 20, wlr = 5 * 100 / 10
        assert_eq!(total.total_gvf, 50.0);
        assert_eq!(total.total_wlr, 50.0);
        assert_eq!(total.device_count, 2);
    }

    #[test]
    fn zero_denominators_yield_zero_ratios_not_nan() {
        let bucket = bucket_at(5);
        let averages = vec![avg(1, bucket, QuantityValues::default())];

        let out = combine(&averages);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].total_gvf, 0.0);
        assert_eq!(out[0].total_wlr, 0.0);
        assert_eq!(out[0].device_count, 1);
    }

    #[test]
    fn pressure_and_temperature_are_averaged_not_summed() {
        let bucket = bucket_at(5);
        let averages = vec![
            avg(
                1,
                bucket,
                QuantityValues {
                    pressure: Some(200.0),
                    temperature: Some(60.0),
                    ..Default::default()
                },
            ),
            avg(
                2,
                bucket,
                QuantityValues {
                    pressure: Some(100.0),
                    ..Default::default()
                },
            ),
        ];

        let out = combine(&averages);
        assert_eq!(out[0].avg_pressure, Some(150.0));
        // Only device 1 reported temperature; its value is the mean.
        assert_eq!(out[0].avg_temp, Some(60.0));
    }

    #[test]
    fn all_null_pressure_stays_null() {
        let bucket = bucket_at(5);
        let out = combine(&[avg(1, bucket, QuantityValues::default())]);
        assert_eq!(out[0].avg_pressure, None);
        assert_eq!(out[0].avg_temp, None);
    }

    #[test]
    fn device_counted_once_per_bucket_across_quantities() {
        let bucket = bucket_at(5);
        let other = bucket_at(6);
        let averages = vec![
            avg(
                1,
                bucket,
                QuantityValues {
                    gfr: Some(1.0),
                    ..Default::default()
                },
            ),
            avg(
                1,
                other,
                QuantityValues {
                    gfr: Some(2.0),
                    ..Default::default()
                },
            ),
        ];

        let out = combine(&averages);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|total| total.device_count == 1));
    }

    #[test]
    fn buckets_come_out_unique_and_ordered() {
        let averages = vec![
            avg(
                2,
                bucket_at(7),
                QuantityValues {
                    gfr: Some(1.0),
                    ..Default::default()
                },
            ),
            avg(
                1,
                bucket_at(5),
                QuantityValues {
                    gfr: Some(1.0),
                    ..Default::default()
                },
            ),
            avg(
                1,
                bucket_at(7),
                QuantityValues {
                    gfr: Some(1.0),
                    ..Default::default()
                },
            ),
        ];

        let out = combine(&averages);
        let buckets: Vec<_> = out.iter().map(|total| total.bucket).collect();
        assert_eq!(buckets, vec![bucket_at(5), bucket_at(7)]);
        assert_eq!(out[1].device_count, 2);
    }
}
