//! Effect parameters edited by the "Depth of Field" panel.
//!
//! `EffectParams` is the flat record the panel mutates. Each key knows its
//! camelCase name and which panel control edits it; keys that feed the
//! bokeh shader are listed in `postfx::BINDINGS`.

use std::fmt;

/// Every effect parameter, in panel order followed by the advanced flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EffectKey {
    Enabled,
    FocalDepth,
    Fstop,
    Maxblur,
    Vignetting,
    Depthblur,
    Threshold,
    Gain,
    Bias,
    Fringe,
    FocalLength,
    Noise,
    Dithering,
    ShaderFocus,
    ShowFocus,
    Manualdof,
    Pentagon,
}

impl EffectKey {
    pub const ALL: [EffectKey; 17] = [
        EffectKey::Enabled,
        EffectKey::FocalDepth,
        EffectKey::Fstop,
        EffectKey::Maxblur,
        EffectKey::Vignetting,
        EffectKey::Depthblur,
        EffectKey::Threshold,
        EffectKey::Gain,
        EffectKey::Bias,
        EffectKey::Fringe,
        EffectKey::FocalLength,
        EffectKey::Noise,
        EffectKey::Dithering,
        EffectKey::ShaderFocus,
        EffectKey::ShowFocus,
        EffectKey::Manualdof,
        EffectKey::Pentagon,
    ];

    /// Parameter name as shown in the panel.
    pub fn name(self) -> &'static str {
        match self {
            EffectKey::Enabled => "enabled",
            EffectKey::FocalDepth => "focalDepth",
            EffectKey::Fstop => "fstop",
            EffectKey::Maxblur => "maxblur",
            EffectKey::Vignetting => "vignetting",
            EffectKey::Depthblur => "depthblur",
            EffectKey::Threshold => "threshold",
            EffectKey::Gain => "gain",
            EffectKey::Bias => "bias",
            EffectKey::Fringe => "fringe",
            EffectKey::FocalLength => "focalLength",
            EffectKey::Noise => "noise",
            EffectKey::Dithering => "dithering",
            EffectKey::ShaderFocus => "shaderFocus",
            EffectKey::ShowFocus => "showFocus",
            EffectKey::Manualdof => "manualdof",
            EffectKey::Pentagon => "pentagon",
        }
    }

    pub fn is_toggle(self) -> bool {
        matches!(
            self,
            EffectKey::Enabled
                | EffectKey::Vignetting
                | EffectKey::Depthblur
                | EffectKey::Noise
                | EffectKey::ShaderFocus
                | EffectKey::ShowFocus
                | EffectKey::Manualdof
                | EffectKey::Pentagon
        )
    }
}

impl fmt::Display for EffectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A parameter value. Toggles are booleans, everything else a float.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamValue {
    Float(f32),
    Bool(bool),
}

impl ParamValue {
    /// Value as a shader scalar (booleans become 0.0 / 1.0).
    pub fn as_f32(self) -> f32 {
        match self {
            ParamValue::Float(v) => v,
            ParamValue::Bool(b) => {
                if b {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    pub fn as_bool(self) -> bool {
        match self {
            ParamValue::Float(v) => v != 0.0,
            ParamValue::Bool(b) => b,
        }
    }
}

/// Effect parameter record.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectParams {
    pub enabled: bool,
    /// Focus distance in scene units
    pub focal_depth: f32,
    pub fstop: f32,
    pub maxblur: f32,
    pub vignetting: bool,
    pub depthblur: bool,
    pub threshold: f32,
    pub gain: f32,
    pub bias: f32,
    pub fringe: f32,
    /// Lens focal length in mm
    pub focal_length: f32,
    pub noise: bool,
    pub dithering: f32,
    pub shader_focus: bool,
    pub show_focus: bool,
    pub manualdof: bool,
    pub pentagon: bool,
}

impl Default for EffectParams {
    fn default() -> Self {
        Self {
            enabled: true,
            focal_depth: 3.9,
            fstop: 17.85,
            maxblur: 1.45,
            vignetting: true,
            depthblur: false,
            threshold: 0.5,
            gain: 6.0,
            bias: 0.5,
            fringe: 0.7,
            focal_length: 35.0,
            noise: true,
            dithering: 0.0001,
            shader_focus: false,
            show_focus: false,
            manualdof: false,
            pentagon: false,
        }
    }
}

impl EffectParams {
    pub fn get(&self, key: EffectKey) -> ParamValue {
        use ParamValue::{Bool, Float};
        match key {
            EffectKey::Enabled => Bool(self.enabled),
            EffectKey::FocalDepth => Float(self.focal_depth),
            EffectKey::Fstop => Float(self.fstop),
            EffectKey::Maxblur => Float(self.maxblur),
            EffectKey::Vignetting => Bool(self.vignetting),
            EffectKey::Depthblur => Bool(self.depthblur),
            EffectKey::Threshold => Float(self.threshold),
            EffectKey::Gain => Float(self.gain),
            EffectKey::Bias => Float(self.bias),
            EffectKey::Fringe => Float(self.fringe),
            EffectKey::FocalLength => Float(self.focal_length),
            EffectKey::Noise => Bool(self.noise),
            EffectKey::Dithering => Float(self.dithering),
            EffectKey::ShaderFocus => Bool(self.shader_focus),
            EffectKey::ShowFocus => Bool(self.show_focus),
            EffectKey::Manualdof => Bool(self.manualdof),
            EffectKey::Pentagon => Bool(self.pentagon),
        }
    }

    /// Set a parameter. Floats written to toggles are nonzero-is-true,
    /// booleans written to floats become 0.0 / 1.0.
    pub fn set(&mut self, key: EffectKey, value: ParamValue) {
        let f = value.as_f32();
        let b = value.as_bool();
        match key {
            EffectKey::Enabled => self.enabled = b,
            EffectKey::FocalDepth => self.focal_depth = f,
            EffectKey::Fstop => self.fstop = f,
            EffectKey::Maxblur => self.maxblur = f,
            EffectKey::Vignetting => self.vignetting = b,
            EffectKey::Depthblur => self.depthblur = b,
            EffectKey::Threshold => self.threshold = f,
            EffectKey::Gain => self.gain = f,
            EffectKey::Bias => self.bias = f,
            EffectKey::Fringe => self.fringe = f,
            EffectKey::FocalLength => self.focal_length = f,
            EffectKey::Noise => self.noise = b,
            EffectKey::Dithering => self.dithering = f,
            EffectKey::ShaderFocus => self.shader_focus = b,
            EffectKey::ShowFocus => self.show_focus = b,
            EffectKey::Manualdof => self.manualdof = b,
            EffectKey::Pentagon => self.pentagon = b,
        }
    }

    /// Mutable handle for a float parameter (panel sliders edit in place).
    pub fn float_mut(&mut self, key: EffectKey) -> Option<&mut f32> {
        match key {
            EffectKey::FocalDepth => Some(&mut self.focal_depth),
            EffectKey::Fstop => Some(&mut self.fstop),
            EffectKey::Maxblur => Some(&mut self.maxblur),
            EffectKey::Threshold => Some(&mut self.threshold),
            EffectKey::Gain => Some(&mut self.gain),
            EffectKey::Bias => Some(&mut self.bias),
            EffectKey::Fringe => Some(&mut self.fringe),
            EffectKey::FocalLength => Some(&mut self.focal_length),
            EffectKey::Dithering => Some(&mut self.dithering),
            _ => None,
        }
    }

    /// Mutable handle for a toggle parameter.
    pub fn bool_mut(&mut self, key: EffectKey) -> Option<&mut bool> {
        match key {
            EffectKey::Enabled => Some(&mut self.enabled),
            EffectKey::Vignetting => Some(&mut self.vignetting),
            EffectKey::Depthblur => Some(&mut self.depthblur),
            EffectKey::Noise => Some(&mut self.noise),
            EffectKey::ShaderFocus => Some(&mut self.shader_focus),
            EffectKey::ShowFocus => Some(&mut self.show_focus),
            EffectKey::Manualdof => Some(&mut self.manualdof),
            EffectKey::Pentagon => Some(&mut self.pentagon),
            _ => None,
        }
    }
}

/// How the panel edits a parameter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ControlKind {
    Toggle,
    /// Slider over `min..=max`; `step: None` means continuous
    Slider {
        min: f32,
        max: f32,
        step: Option<f32>,
    },
}

/// Panel controls for effect parameters, in display order.
pub const PANEL_CONTROLS: &[(EffectKey, ControlKind)] = &[
    (EffectKey::Enabled, ControlKind::Toggle),
    (
        EffectKey::FocalDepth,
        ControlKind::Slider { min: 0.0, max: 200.0, step: None },
    ),
    (
        EffectKey::Fstop,
        ControlKind::Slider { min: 0.1, max: 22.0, step: Some(0.001) },
    ),
    (
        EffectKey::Maxblur,
        ControlKind::Slider { min: 0.0, max: 5.0, step: Some(0.025) },
    ),
    (EffectKey::Vignetting, ControlKind::Toggle),
    (EffectKey::Depthblur, ControlKind::Toggle),
    (
        EffectKey::Threshold,
        ControlKind::Slider { min: 0.0, max: 1.0, step: Some(0.001) },
    ),
    (
        EffectKey::Gain,
        ControlKind::Slider { min: 0.0, max: 100.0, step: Some(0.001) },
    ),
    (
        EffectKey::Bias,
        ControlKind::Slider { min: 0.0, max: 3.0, step: Some(0.001) },
    ),
    (
        EffectKey::Fringe,
        ControlKind::Slider { min: 0.0, max: 5.0, step: Some(0.001) },
    ),
    (
        EffectKey::FocalLength,
        ControlKind::Slider { min: 16.0, max: 80.0, step: Some(0.001) },
    ),
    (EffectKey::Noise, ControlKind::Toggle),
    (
        EffectKey::Dithering,
        ControlKind::Slider { min: 0.0, max: 0.001, step: Some(0.0001) },
    ),
];

/// Compile-time shape of the bokeh kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShaderQuality {
    pub rings: u32,
    pub samples: u32,
}

impl ShaderQuality {
    pub const RINGS_RANGE: std::ops::RangeInclusive<u32> = 1..=8;
    pub const SAMPLES_RANGE: std::ops::RangeInclusive<u32> = 1..=13;

    /// Build a quality setting, clamping both values into their panel ranges.
    pub fn new(rings: u32, samples: u32) -> Self {
        Self {
            rings: rings.clamp(*Self::RINGS_RANGE.start(), *Self::RINGS_RANGE.end()),
            samples: samples.clamp(*Self::SAMPLES_RANGE.start(), *Self::SAMPLES_RANGE.end()),
        }
    }
}

impl Default for ShaderQuality {
    fn default() -> Self {
        Self { rings: 4, samples: 5 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let p = EffectParams::default();
        assert!(p.enabled);
        assert_eq!(p.focal_depth, 3.9);
        assert_eq!(p.fstop, 17.85);
        assert_eq!(p.maxblur, 1.45);
        assert!(p.vignetting);
        assert!(!p.depthblur);
        assert_eq!(p.gain, 6.0);
        assert_eq!(p.focal_length, 35.0);
        assert!(p.noise);
        assert_eq!(p.dithering, 0.0001);
        assert!(!p.shader_focus && !p.show_focus && !p.manualdof && !p.pentagon);
    }

    #[test]
    fn test_get_set_every_key() {
        let mut p = EffectParams::default();
        for key in EffectKey::ALL {
            if key.is_toggle() {
                let flipped = !p.get(key).as_bool();
                p.set(key, ParamValue::Bool(flipped));
                assert_eq!(p.get(key), ParamValue::Bool(flipped), "{key}");
            } else {
                p.set(key, ParamValue::Float(0.25));
                assert_eq!(p.get(key), ParamValue::Float(0.25), "{key}");
            }
        }
    }

    #[test]
    fn test_mut_handles_match_kind() {
        let mut p = EffectParams::default();
        for key in EffectKey::ALL {
            assert_eq!(p.bool_mut(key).is_some(), key.is_toggle(), "{key}");
            assert_eq!(p.float_mut(key).is_some(), !key.is_toggle(), "{key}");
        }
    }

    #[test]
    fn test_panel_controls_cover_editable_keys() {
        assert_eq!(PANEL_CONTROLS.len(), 13);
        for (key, kind) in PANEL_CONTROLS {
            match kind {
                ControlKind::Toggle => assert!(key.is_toggle()),
                ControlKind::Slider { min, max, .. } => {
                    assert!(!key.is_toggle());
                    assert!(min < max);
                }
            }
        }
        // Advanced flags are not on the panel
        assert!(!PANEL_CONTROLS.iter().any(|(k, _)| *k == EffectKey::Pentagon));
    }

    #[test]
    fn test_defaults_within_panel_ranges() {
        let p = EffectParams::default();
        for (key, kind) in PANEL_CONTROLS {
            if let ControlKind::Slider { min, max, .. } = kind {
                let v = p.get(*key).as_f32();
                assert!(v >= *min && v <= *max, "{key} = {v}");
            }
        }
    }

    #[test]
    fn test_quality_clamps() {
        assert_eq!(ShaderQuality::default(), ShaderQuality::new(4, 5));
        assert_eq!(ShaderQuality::new(0, 99), ShaderQuality { rings: 1, samples: 13 });
        assert_eq!(ShaderQuality::new(8, 13), ShaderQuality { rings: 8, samples: 13 });
    }
}
