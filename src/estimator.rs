// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Position estimation capability.
//!
//! The real triangulation/filtering math is out of scope for this crate.
//! What matters here is the *shape* of the boundary: a
//! [`PositionEstimator`] that a completed slot is fed into, and an
//! [`AxisFilter`] that smooths its output over time. [`GeometricEstimator`]
//! is a real but modest implementation of that boundary so the pipeline runs
//! end to end; it is not a claim of positioning accuracy.

use std::fmt;

use crate::config::LocatorConfig;

/// A single measurement kind an estimator can be fed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MeasurementKind {
    Azimuth,
    Elevation,
    Distance,
    Rssi,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EstimatorError(pub String);

impl fmt::Display for EstimatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for EstimatorError {}

/// Capability boundary around the actual position math.
pub trait PositionEstimator {
    fn create(locators: &[LocatorConfig]) -> Result<Self, EstimatorError>
    where
        Self: Sized;

    fn submit(&mut self, locator_idx: usize, kind: MeasurementKind, value: f32) -> Result<(), EstimatorError>;

    fn step(&mut self, time_step_secs: f32) -> Result<(f32, f32, f32), EstimatorError>;

    fn clear(&mut self) -> Result<(), EstimatorError>;
}

/// Per-axis smoothing capability. The shipped implementation
/// is the exponential moving average `sl_rtl_util_filter` documents in
/// `app_config.h`: `out = amount * new + (1 - amount) * prev`.
pub trait AxisFilter {
    fn filter(&mut self, value: f32) -> f32;
}

/// Exponential moving-average filter, one instance per axis.
pub struct EmaFilter {
    amount: f32,
    previous: Option<f32>,
}

impl EmaFilter {
    pub fn new(amount: f32) -> Self {
        Self { amount, previous: None }
    }
}

impl AxisFilter for EmaFilter {
    fn filter(&mut self, value: f32) -> f32 {
        let out = match self.previous {
            Some(prev) => self.amount * value + (1.0 - self.amount) * prev,
            None => value,
        };
        self.previous = Some(out);
        out
    }
}

/// A single per-locator measurement bundle collected so far this slot.
#[derive(Debug, Clone, Copy, Default)]
struct LocatorMeasurement {
    azimuth: Option<f32>,
    elevation: Option<f32>,
    distance: Option<f32>,
    rssi: Option<f32>,
}

/// Reference geometric estimator: intersects locator bearing rays, weighted
/// by RSSI-implied confidence, falling back to the submitted distance when
/// there is only one reporting locator.
pub struct GeometricEstimator {
    locators: Vec<LocatorConfig>,
    measurements: Vec<LocatorMeasurement>,
}

impl PositionEstimator for GeometricEstimator {
    fn create(locators: &[LocatorConfig]) -> Result<Self, EstimatorError> {
        if locators.is_empty() {
            return Err(EstimatorError("at least one locator is required".into()));
        }
        Ok(Self {
            locators: locators.to_vec(),
            measurements: vec![LocatorMeasurement::default(); locators.len()],
        })
    }

    fn submit(&mut self, locator_idx: usize, kind: MeasurementKind, value: f32) -> Result<(), EstimatorError> {
        let m = self
            .measurements
            .get_mut(locator_idx)
            .ok_or_else(|| EstimatorError(format!("locator index {locator_idx} out of range")))?;
        match kind {
            MeasurementKind::Azimuth => m.azimuth = Some(value),
            MeasurementKind::Elevation => m.elevation = Some(value),
            MeasurementKind::Distance => m.distance = Some(value),
            MeasurementKind::Rssi => m.rssi = Some(value),
        }
        Ok(())
    }

    fn step(&mut self, _time_step_secs: f32) -> Result<(f32, f32, f32), EstimatorError> {
        let reporting: Vec<usize> = self
            .measurements
            .iter()
            .enumerate()
            .filter(|(_, m)| m.azimuth.is_some() && m.elevation.is_some())
            .map(|(i, _)| i)
            .collect();

        if reporting.is_empty() {
            return Err(EstimatorError("no locator reported a bearing this step".into()));
        }

        if reporting.len() == 1 {
            // L == 1: fall back to ray-plus-distance instead of triangulation.
            let idx = reporting[0];
            let loc = &self.locators[idx];
            let m = &self.measurements[idx];
            let distance = m.distance.unwrap_or(1.0).max(0.01);
            let az = m.azimuth.unwrap().to_radians();
            let el = m.elevation.unwrap().to_radians();
            let x = loc.coordinate[0] + distance * el.cos() * az.cos();
            let y = loc.coordinate[1] + distance * el.cos() * az.sin();
            let z = loc.coordinate[2] + distance * el.sin();
            return Ok((x, y, z));
        }

        let mut wx = 0.0f32;
        let mut wy = 0.0f32;
        let mut wz = 0.0f32;
        let mut total_weight = 0.0f32;

        for &idx in &reporting {
            let loc = &self.locators[idx];
            let m = &self.measurements[idx];
            let az = m.azimuth.unwrap().to_radians();
            let el = m.elevation.unwrap().to_radians();
            // RSSI-implied confidence: stronger (less negative) signal weighs more.
            let rssi = m.rssi.unwrap_or(-70.0);
            let weight = (rssi + 100.0).max(1.0);
            let reach = m.distance.unwrap_or(5.0).max(0.01);

            let x = loc.coordinate[0] + reach * el.cos() * az.cos();
            let y = loc.coordinate[1] + reach * el.cos() * az.sin();
            let z = loc.coordinate[2] + reach * el.sin();

            wx += weight * x;
            wy += weight * y;
            wz += weight * z;
            total_weight += weight;
        }

        Ok((wx / total_weight, wy / total_weight, wz / total_weight))
    }

    fn clear(&mut self) -> Result<(), EstimatorError> {
        for m in &mut self.measurements {
            *m = LocatorMeasurement::default();
        }
        Ok(())
    }
}

#[cfg(test)]
pub struct MockEstimator {
    pub submitted: Vec<(usize, MeasurementKind, f32)>,
    pub scripted_position: (f32, f32, f32),
    pub clear_calls: u32,
}

#[cfg(test)]
impl MockEstimator {
    pub fn with_position(position: (f32, f32, f32)) -> Self {
        Self {
            submitted: Vec::new(),
            scripted_position: position,
            clear_calls: 0,
        }
    }
}

#[cfg(test)]
impl PositionEstimator for MockEstimator {
    fn create(_locators: &[LocatorConfig]) -> Result<Self, EstimatorError> {
        Ok(Self::with_position((0.0, 0.0, 0.0)))
    }

    fn submit(&mut self, locator_idx: usize, kind: MeasurementKind, value: f32) -> Result<(), EstimatorError> {
        self.submitted.push((locator_idx, kind, value));
        Ok(())
    }

    fn step(&mut self, _time_step_secs: f32) -> Result<(f32, f32, f32), EstimatorError> {
        Ok(self.scripted_position)
    }

    fn clear(&mut self) -> Result<(), EstimatorError> {
        self.clear_calls += 1;
        self.submitted.clear();
        Ok(())
    }
}
