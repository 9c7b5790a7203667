use std::ops::Sub;

use chrono::{DateTime, Utc};

const NANODEGREES_PER_DEGREE: f64 = 1e9;

/// Fixed point coordinate in units of `granularity` nanodegrees.
pub fn quantize_coordinate(degrees: f64, granularity: i32) -> i64 {
    (degrees * NANODEGREES_PER_DEGREE / granularity as f64).round() as i64
}

/// Milliseconds since the epoch, floored to units of `date_granularity`.
pub fn quantize_timestamp(timestamp: &DateTime<Utc>, date_granularity: i32) -> i64 {
    timestamp.timestamp_millis().div_euclid(date_granularity as i64)
}

/// Running difference of one field. Starts from a baseline of zero.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeltaCoder<T> {
    last: T,
}

impl<T: Copy + Default + Sub<Output = T>> DeltaCoder<T> {
    pub fn new() -> Self {
        DeltaCoder { last: T::default() }
    }

    pub fn encode(&mut self, value: T) -> T {
        let delta = value - self.last;
        self.last = value;
        delta
    }
}

pub fn delta_encode<I>(values: I) -> Vec<i64>
where
    I: IntoIterator<Item = i64>,
{
    let mut coder = DeltaCoder::new();
    values.into_iter().map(|value| coder.encode(value)).collect()
}

#[cfg(test)]
pub(crate) fn prefix_sum<T>(deltas: &[T]) -> Vec<T>
where
    T: Copy + Default + std::ops::Add<Output = T>,
{
    let mut acc = T::default();
    deltas.iter().map(|delta| {
        acc = acc + *delta;
        acc
    }).collect()
}
