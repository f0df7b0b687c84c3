//! Fallback visual shown when a model cannot be loaded
//!
//! A stylised heart built from primitives, so the viewport is never blank.

use glam::Vec3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PlaceholderShape {
    Sphere { radius: f32 },
    Cone { radius: f32, height: f32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceholderPrimitive {
    pub shape: PlaceholderShape,
    pub translation: Vec3,
    /// Rotation about Z in radians
    pub rotation_z: f32,
    /// sRGB hex colour
    pub color: String,
}

impl PlaceholderPrimitive {
    fn sphere(radius: f32, translation: Vec3, color: &str) -> Self {
        Self {
            shape: PlaceholderShape::Sphere { radius },
            translation,
            rotation_z: 0.0,
            color: color.to_string(),
        }
    }
}

/// Primitives of the placeholder heart
pub fn placeholder_heart() -> Vec<PlaceholderPrimitive> {
    vec![
        PlaceholderPrimitive::sphere(0.5, Vec3::new(-0.6, 0.8, 0.0), "#e74c3c"),
        PlaceholderPrimitive::sphere(0.5, Vec3::new(0.6, 0.8, 0.0), "#e74c3c"),
        PlaceholderPrimitive {
            shape: PlaceholderShape::Cone {
                radius: 0.8,
                height: 1.5,
            },
            translation: Vec3::new(0.0, -0.2, 0.0),
            rotation_z: std::f32::consts::PI,
            color: "#c0392b".to_string(),
        },
        PlaceholderPrimitive::sphere(0.1, Vec3::new(0.0, 2.5, 0.0), "#f39c12"),
    ]
}

/// Parse `#rrggbb` into sRGB components in `0..=1`
pub fn parse_hex_color(hex: &str) -> Option<[f32; 3]> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 {
        return None;
    }
    let channel = |i: usize| {
        u8::from_str_radix(digits.get(i..i + 2)?, 16)
            .ok()
            .map(|v| v as f32 / 255.0)
    };
    Some([channel(0)?, channel(2)?, channel(4)?])
}
