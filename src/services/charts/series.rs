use chrono::{DateTime, Utc};

use super::aggregate::DeviceBucketAverage;
use super::combine::SubtreeBucketTotal;

/// Anything the formatter can order into a chart series.
pub trait SeriesPoint {
    fn bucket(&self) -> DateTime<Utc>;
    fn contributing_devices(&self) -> i64;
}

impl SeriesPoint for DeviceBucketAverage {
    fn bucket(&self) -> DateTime<Utc> {
        self.bucket
    }

    fn contributing_devices(&self) -> i64 {
        1
    }
}

impl SeriesPoint for SubtreeBucketTotal {
    fn bucket(&self) -> DateTime<Utc> {
        self.bucket
    }

    fn contributing_devices(&self) -> i64 {
        self.device_count
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SeriesSummary {
    pub points: i64,
    pub earliest: DateTime<Utc>,
    pub latest: DateTime<Utc>,
    pub avg_device_count: f64,
}

/// Chronologically ordered chart series. `summary` is absent for an empty
/// series; zero devices, samples or buckets is a valid result, not an error.
#[derive(Debug, Clone)]
pub struct OrderedSeries<P> {
    pub points: Vec<P>,
    pub summary: Option<SeriesSummary>,
}

/// Orders points by bucket ascending and derives the series summary.
pub fn format<P: SeriesPoint>(mut points: Vec<P>) -> OrderedSeries<P> {
    points.sort_by_key(SeriesPoint::bucket);

    let summary = if points.is_empty() {
        None
    } else {
        let devices: f64 = points
            .iter()
            .map(|point| point.contributing_devices() as f64)
            .sum();
        Some(SeriesSummary {
            points: points.len() as i64,
            earliest: points[0].bucket(),
            latest: points[points.len() - 1].bucket(),
            avg_device_count: devices / points.len() as f64,
        })
    };

    OrderedSeries { points, summary }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn total(minute: u32, device_count: i64) -> SubtreeBucketTotal {
        SubtreeBucketTotal {
            bucket: Utc
                .with_ymd_and_hms(2026, 5, 14, 9, minute, 0)
                .single()
                .expect("bucket"),
            total_gfr: 0.0,
            total_gor: 0.0,
            total_ofr: 0.0,
            total_wfr: 0.0,
            total_gvf: 0.0,
            total_wlr: 0.0,
            avg_pressure: None,
            avg_temp: None,
            device_count,
        }
    }

    #[test]
    fn empty_input_yields_empty_series_without_summary() {
        let series = format(Vec::<SubtreeBucketTotal>::new());
        assert!(series.points.is_empty());
        assert!(series.summary.is_none());
    }

    #[test]
    fn orders_points_chronologically() {
        let series = format(vec![total(9, 1), total(3, 3), total(6, 2)]);
        let minutes: Vec<u32> = series
            .points
            .iter()
            .map(|point| chrono::Timelike::minute(&point.bucket))
            .collect();
        assert_eq!(minutes, vec![3, 6, 9]);

        let summary = series.summary.expect("summary");
        assert_eq!(summary.points, 3);
        assert_eq!(summary.earliest, series.points[0].bucket);
        assert_eq!(summary.latest, series.points[2].bucket);
        assert_eq!(summary.avg_device_count, 2.0);
    }
}
