//! Orbit camera rig
//!
//! Rotate and pan input is accumulated and bled into the pose a fraction at a
//! time on every [`CameraRig::update`], giving the damped orbit feel. Dolly
//! and directional nudges apply immediately. The distance to the target is
//! clamped after every operation.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

use crate::config::CameraConfig;

/// Keeps the polar angle off the poles so the up vector stays defined
const POLAR_EPSILON: f32 = 1e-4;

/// Pending input below this is dropped
const SETTLE_THRESHOLD: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NudgeDirection {
    Up,
    Down,
    Left,
    Right,
}

/// Snapshot of the camera handed to the renderer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub position: Vec3,
    pub target: Vec3,
    pub fov_degrees: f32,
}

impl CameraPose {
    pub fn distance(&self) -> f32 {
        self.position.distance(self.target)
    }
}

#[derive(Debug, Clone)]
pub struct CameraRig {
    settings: CameraConfig,
    position: Vec3,
    target: Vec3,
    pending_azimuth: f32,
    pending_polar: f32,
    pending_pan: Vec3,
}

impl CameraRig {
    pub fn new(settings: CameraConfig) -> Self {
        let mut rig = Self {
            position: Vec3::from_array(settings.position),
            target: Vec3::from_array(settings.target),
            settings,
            pending_azimuth: 0.0,
            pending_polar: 0.0,
            pending_pan: Vec3::ZERO,
        };
        rig.enforce_bounds();
        rig
    }

    pub fn settings(&self) -> &CameraConfig {
        &self.settings
    }

    /// Back to the configured default pose, dropping any pending input
    pub fn reset(&mut self) {
        self.position = Vec3::from_array(self.settings.position);
        self.target = Vec3::from_array(self.settings.target);
        self.clear_pending();
        self.enforce_bounds();
    }

    /// Translate position and target along the camera's screen axes by a
    /// step proportional to the current distance
    pub fn nudge(&mut self, direction: NudgeDirection) {
        let offset = self.target - self.position;
        let step = offset.length() * self.settings.nudge_fraction;
        let forward = offset.try_normalize().unwrap_or(Vec3::NEG_Z);
        let right = forward.cross(Vec3::Y).try_normalize().unwrap_or(Vec3::X);
        let up = right.cross(forward).try_normalize().unwrap_or(Vec3::Y);

        let delta = match direction {
            NudgeDirection::Left => right * step,
            NudgeDirection::Right => -right * step,
            NudgeDirection::Up => -up * step,
            NudgeDirection::Down => up * step,
        };
        self.position += delta;
        self.target += delta;
        self.enforce_bounds();
    }

    /// Orbit around the target by azimuth/polar deltas in radians
    pub fn rotate(&mut self, delta_azimuth: f32, delta_polar: f32) {
        self.pending_azimuth += delta_azimuth * self.settings.rotate_speed;
        self.pending_polar += delta_polar * self.settings.rotate_speed;
        if !self.settings.enable_damping {
            self.step(1.0);
        }
    }

    /// Pan in screen space. Deltas are fractions of the current distance.
    pub fn pan(&mut self, delta_x: f32, delta_y: f32) {
        let forward = (self.target - self.position)
            .try_normalize()
            .unwrap_or(Vec3::NEG_Z);
        let right = forward.cross(Vec3::Y).try_normalize().unwrap_or(Vec3::X);
        let up = right.cross(forward).try_normalize().unwrap_or(Vec3::Y);
        let scale = self.distance() * self.settings.pan_speed;

        self.pending_pan += (-right * delta_x + up * delta_y) * scale;
        if !self.settings.enable_damping {
            self.step(1.0);
        }
    }

    /// Multiply the distance to the target. Factors below 1 move closer.
    pub fn dolly(&mut self, factor: f32) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let factor = factor.powf(self.settings.zoom_speed);
        self.position = self.target + (self.position - self.target) * factor;
        self.enforce_bounds();
    }

    /// Advance damping by one tick. Returns true while input is still
    /// settling.
    pub fn update(&mut self) -> bool {
        if !self.settings.enable_damping {
            return false;
        }
        self.step(self.settings.damping_factor.clamp(0.0, 1.0));
        self.is_settling()
    }

    pub fn is_settling(&self) -> bool {
        self.pending_azimuth != 0.0 || self.pending_polar != 0.0 || self.pending_pan != Vec3::ZERO
    }

    pub fn distance(&self) -> f32 {
        self.position.distance(self.target)
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn pose(&self) -> CameraPose {
        CameraPose {
            position: self.position,
            target: self.target,
            fov_degrees: self.settings.fov_degrees,
        }
    }

    fn step(&mut self, fraction: f32) {
        let azimuth = self.pending_azimuth * fraction;
        let polar = self.pending_polar * fraction;
        let pan = self.pending_pan * fraction;

        let offset = self.position - self.target;
        let radius = offset.length();
        if radius > 0.0 {
            let theta = offset.x.atan2(offset.z) + azimuth;
            let phi = ((offset.y / radius).clamp(-1.0, 1.0).acos() + polar)
                .clamp(POLAR_EPSILON, PI - POLAR_EPSILON);
            let rotated = Vec3::new(
                radius * phi.sin() * theta.sin(),
                radius * phi.cos(),
                radius * phi.sin() * theta.cos(),
            );
            self.position = self.target + rotated;
        }
        self.target += pan;
        self.position += pan;

        let keep = 1.0 - fraction;
        self.pending_azimuth = settle(self.pending_azimuth * keep);
        self.pending_polar = settle(self.pending_polar * keep);
        self.pending_pan = Vec3::new(
            settle(self.pending_pan.x * keep),
            settle(self.pending_pan.y * keep),
            settle(self.pending_pan.z * keep),
        );
        self.enforce_bounds();
    }

    fn clear_pending(&mut self) {
        self.pending_azimuth = 0.0;
        self.pending_polar = 0.0;
        self.pending_pan = Vec3::ZERO;
    }

    fn enforce_bounds(&mut self) {
        let min = self.settings.min_distance;
        let max = self.settings.max_distance.max(min);
        let offset = self.position - self.target;
        let distance = offset.length();
        if !(min..=max).contains(&distance) {
            let direction = offset.try_normalize().unwrap_or(Vec3::Z);
            self.position = self.target + direction * distance.clamp(min, max);
        }
    }
}

fn settle(value: f32) -> f32 {
    if value.abs() < SETTLE_THRESHOLD {
        0.0
    } else {
        value
    }
}
