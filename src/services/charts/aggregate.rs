use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use super::source::{QuantityValues, RawSample};
use crate::time::{bucket_start, Granularity};

/// Running arithmetic mean over the non-null observations of one quantity.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct MeanAcc {
    sum: f64,
    count: u32,
}

impl MeanAcc {
    pub(crate) fn observe(&mut self, value: Option<f64>) {
        if let Some(value) = value {
            self.sum += value;
            self.count += 1;
        }
    }

    /// `None` when nothing was observed — a quantity with zero non-null
    /// samples stays null, it does not become zero.
    pub(crate) fn mean(self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / f64::from(self.count))
    }
}

#[derive(Debug, Default)]
struct GroupAcc {
    gfr: MeanAcc,
    gor: MeanAcc,
    gvf: MeanAcc,
    ofr: MeanAcc,
    wfr: MeanAcc,
    wlr: MeanAcc,
    pressure: MeanAcc,
    temperature: MeanAcc,
    samples: i64,
}

impl GroupAcc {
    fn observe(&mut self, values: &QuantityValues) {
        self.gfr.observe(values.gfr);
        self.gor.observe(values.gor);
        self.gvf.observe(values.gvf);
        self.ofr.observe(values.ofr);
        self.wfr.observe(values.wfr);
        self.wlr.observe(values.wlr);
        self.pressure.observe(values.pressure);
        self.temperature.observe(values.temperature);
        self.samples += 1;
    }

    fn means(&self) -> QuantityValues {
        QuantityValues {
            gfr: self.gfr.mean(),
            gor: self.gor.mean(),
            gvf: self.gvf.mean(),
            ofr: self.ofr.mean(),
            wfr: self.wfr.mean(),
            wlr: self.wlr.mean(),
            pressure: self.pressure.mean(),
            temperature: self.temperature.mean(),
        }
    }
}

/// Per-(device, bucket) averages of each tracked quantity.
#[derive(Debug, Clone, Copy)]
pub struct DeviceBucketAverage {
    pub device_id: i32,
    pub bucket: DateTime<Utc>,
    pub values: QuantityValues,
    /// Raw samples that fell into this bucket, null or not.
    pub samples: i64,
}

/// Groups samples by (device id, bucket start) and averages each quantity
/// over its non-null observations. Devices without samples in the input do
/// not appear.
///
/// Grouping is map-based, so bucket membership is independent of input
/// order; only the floating-point summation order inside a group follows
/// the input, which can move the least-significant bits of a mean.
pub fn aggregate_by_device(
    samples: &[RawSample],
    granularity: Granularity,
    tz: Tz,
) -> Vec<DeviceBucketAverage> {
    let mut groups: BTreeMap<(i32, DateTime<Utc>), GroupAcc> = BTreeMap::new();
    for sample in samples {
        let bucket = bucket_start(sample.ts, granularity, tz);
        groups
            .entry((sample.device_id, bucket))
            .or_default()
            .observe(&sample.values);
    }

    groups
        .into_iter()
        .map(|((device_id, bucket), acc)| DeviceBucketAverage {
            device_id,
            bucket,
            values: acc.means(),
            samples: acc.samples,
        })
        .collect()
}
