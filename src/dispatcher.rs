// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Ties locator lookup, the per-tag correlation window, the estimator and
//! the publisher together.
//!
//! [`Dispatcher::handle_angle`] is the full per-message pipeline: decode,
//! find-or-create the tag, run the TagWindow pipeline in the mandated
//! `evict_stale -> locate_slot -> insert_or_merge -> flush_ripe` order, then
//! run the estimator and publish for every slot that became ripe.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::{error, warn};

use crate::config::{LocatorConfig, MultilocatorConfig};
use crate::error::IngressError;
use crate::estimator::{EmaFilter, EstimatorError, MeasurementKind, PositionEstimator};
use crate::publisher::Position;
use crate::registry::{Lookup, Registry};
use crate::schedule;
use crate::sequence;
use crate::window::Angle;

/// Raw angle payload as published on the wire.
#[derive(Debug, Deserialize)]
struct AngleReport {
    sequence: u16,
    azimuth: f32,
    elevation: f32,
    distance: f32,
    rssi: i32,
}

/// A position ready to hand to the transport layer for publication.
pub struct PublishedPosition {
    pub tag_id: String,
    pub position: Position,
}

/// Per-tag estimator + filter state, kept alongside the correlation window
/// but addressed separately since the estimator is swappable.
struct EstimationState<E> {
    estimator: E,
    filter_x: EmaFilter,
    filter_y: EmaFilter,
    filter_z: EmaFilter,
    last_fired_sequence: Option<u16>,
}

pub struct Dispatcher<E: PositionEstimator> {
    registry: Registry,
    locators: Vec<LocatorConfig>,
    locator_index: HashMap<String, usize>,
    expected: Vec<u32>,
    max_sequence_diff: i32,
    filtering_amount: f32,
    estimation_interval_secs: f32,
    estimation: HashMap<String, EstimationState<E>>,
}

impl<E: PositionEstimator> Dispatcher<E> {
    pub fn new(config: &MultilocatorConfig) -> Self {
        let locator_index = config
            .locators
            .iter()
            .enumerate()
            .map(|(i, l)| (l.id.clone(), i))
            .collect();

        Self {
            registry: Registry::new(
                config.max_tags,
                config.locators.len(),
                config.max_sequence_ids,
                config.max_sequence_diff,
            ),
            locators: config.locators.clone(),
            locator_index,
            expected: schedule::compute(config.locators.len() as u32, config.max_sequence_ids),
            max_sequence_diff: config.max_sequence_diff,
            filtering_amount: config.filtering_amount,
            estimation_interval_secs: config.estimation_interval_secs,
            estimation: HashMap::new(),
        }
    }

    /// Process one decoded angle report, returning any positions that
    /// became ready to publish.
    pub fn handle_angle(
        &mut self,
        locator_id: &str,
        tag_id: &str,
        payload: &[u8],
    ) -> Result<Vec<PublishedPosition>, IngressError> {
        let loc_idx = *self
            .locator_index
            .get(locator_id)
            .ok_or_else(|| IngressError::UnknownLocator(locator_id.to_string()))?;

        let report: AngleReport =
            serde_json::from_slice(payload).map_err(|e| IngressError::MalformedPayload(e.to_string()))?;

        let window = match self.registry.get_or_create(tag_id) {
            Lookup::Existing(w) | Lookup::Created(w) => w,
            Lookup::Saturated => {
                warn!(tag = tag_id, "tag capacity exceeded, dropping report");
                return Err(IngressError::TagCapacityExceeded(tag_id.to_string()));
            }
        };

        let angle = Angle {
            sequence: report.sequence,
            azimuth: report.azimuth,
            elevation: report.elevation,
            distance: report.distance,
            rssi: report.rssi,
        };

        window.evict_stale(angle.sequence);
        let slot_idx = window.locate_slot(angle.sequence);
        window.insert_or_merge(angle, slot_idx, loc_idx);
        let ripe = window.flush_ripe(slot_idx, &self.expected);

        if ripe.is_empty() {
            return Ok(Vec::new());
        }

        let state = self.estimation.entry(tag_id.to_string()).or_insert_with(|| EstimationState {
            estimator: E::create(&self.locators).expect("locator list validated at startup"),
            filter_x: EmaFilter::new(self.filtering_amount),
            filter_y: EmaFilter::new(self.filtering_amount),
            filter_z: EmaFilter::new(self.filtering_amount),
            last_fired_sequence: None,
        });

        let mut results = Vec::with_capacity(ripe.len());
        for ripe_slot in ripe {
            let angles = window.slots()[ripe_slot.slot_index].angles_slice().to_vec();
            match Self::run_estimation(
                state,
                &angles,
                ripe_slot.sequence,
                self.locators.len(),
                self.max_sequence_diff,
                self.estimation_interval_secs,
            ) {
                Ok(position) => results.push(PublishedPosition {
                    tag_id: tag_id.to_string(),
                    position,
                }),
                Err(e) => {
                    error!(tag = tag_id, error = %e, "estimator declined this slot");
                }
            }
        }

        Ok(results)
    }

    /// Submit azimuth and elevation for every present angle, plus distance
    /// when exactly one locator reported this slot, then step, filter each
    /// axis, and advance the time base from the sequence delta (falling
    /// back to the configured interval when the gap is stale).
    fn run_estimation(
        state: &mut EstimationState<E>,
        angles: &[Option<Angle>],
        sequence: u16,
        locator_count: usize,
        max_sequence_diff: i32,
        estimation_interval_secs: f32,
    ) -> Result<Position, EstimatorError> {
        state.estimator.clear()?;

        for (idx, angle) in angles.iter().enumerate() {
            if let Some(angle) = angle {
                state.estimator.submit(idx, MeasurementKind::Azimuth, angle.azimuth)?;
                state.estimator.submit(idx, MeasurementKind::Elevation, angle.elevation)?;
                if locator_count == 1 {
                    state.estimator.submit(idx, MeasurementKind::Distance, angle.distance)?;
                }
            }
        }

        let time_step = match state.last_fired_sequence {
            Some(prev) => {
                let diff = sequence::diff(prev, sequence, max_sequence_diff);
                if diff == sequence::STALE || diff <= 0 {
                    estimation_interval_secs
                } else {
                    diff as f32 * estimation_interval_secs
                }
            }
            None => estimation_interval_secs,
        };

        let (x, y, z) = state.estimator.step(time_step)?;
        state.last_fired_sequence = Some(sequence);

        Ok(Position {
            x: state.filter_x.filter(x),
            y: state.filter_y.filter(y),
            z: state.filter_z.filter(z),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::MockEstimator;

    fn config() -> MultilocatorConfig {
        MultilocatorConfig {
            multilocator_id: "ml1".into(),
            locators: vec![
                LocatorConfig {
                    id: "loc0".into(),
                    coordinate: [0.0, 0.0, 0.0],
                    orientation: [0.0, 0.0, 0.0],
                },
                LocatorConfig {
                    id: "loc1".into(),
                    coordinate: [1.0, 0.0, 0.0],
                    orientation: [0.0, 0.0, 0.0],
                },
            ],
            max_locators: 6,
            max_tags: 2,
            max_sequence_ids: 6,
            max_sequence_diff: 20,
            estimation_interval_secs: 0.1,
            filtering_amount: 0.5,
            angle_topic_prefix: "aoa/angle".into(),
            position_topic_prefix: "aoa/position".into(),
        }
    }

    fn payload(sequence: u16) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "sequence": sequence,
            "azimuth": 1.0,
            "elevation": 2.0,
            "distance": 3.0,
            "rssi": -40,
        }))
        .unwrap()
    }

    #[test]
    fn unknown_locator_is_rejected() {
        let mut d: Dispatcher<MockEstimator> = Dispatcher::new(&config());
        let err = d.handle_angle("ghost", "tagA", &payload(1)).unwrap_err();
        assert_eq!(err, IngressError::UnknownLocator("ghost".to_string()));
    }

    #[test]
    fn malformed_payload_is_rejected() {
        let mut d: Dispatcher<MockEstimator> = Dispatcher::new(&config());
        let err = d.handle_angle("loc0", "tagA", b"not json").unwrap_err();
        assert!(matches!(err, IngressError::MalformedPayload(_)));
    }

    #[test]
    fn complete_slot_publishes_a_position() {
        let mut d: Dispatcher<MockEstimator> = Dispatcher::new(&config());
        assert!(d.handle_angle("loc0", "tagA", &payload(1)).unwrap().is_empty());
        let positions = d.handle_angle("loc1", "tagA", &payload(1)).unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].tag_id, "tagA");
    }

    #[test]
    fn tag_capacity_exceeded_drops_new_tags() {
        let mut d: Dispatcher<MockEstimator> = Dispatcher::new(&config());
        d.handle_angle("loc0", "tag1", &payload(1)).unwrap();
        d.handle_angle("loc0", "tag2", &payload(1)).unwrap();
        let err = d.handle_angle("loc0", "tag3", &payload(1)).unwrap_err();
        assert_eq!(err, IngressError::TagCapacityExceeded("tag3".to_string()));
    }
}
