//! Named pure value transforms

use std::fmt;

/// A named, pure numeric conversion applied to a raw field value.
///
/// Transforms are plain function pointers so a schema stays `Send + Sync`
/// and cheap to clone. The name is what YAML schema files refer to.
#[derive(Clone, Copy)]
pub struct Transform {
    name: &'static str,
    apply: fn(f64) -> f64,
}

const WATTS_PER_HORSEPOWER: f64 = 745.699872;
const PSI_PER_BAR: f64 = 14.504;

fn watts_to_horsepower(watts: f64) -> f64 {
    watts / WATTS_PER_HORSEPOWER
}

fn psi_to_bar(psi: f64) -> f64 {
    psi / PSI_PER_BAR
}

fn mps_to_kph(mps: f64) -> f64 {
    mps * 3.6
}

fn mps_to_mph(mps: f64) -> f64 {
    mps * 2.236_936_292
}

impl Transform {
    /// Power in watts to mechanical horsepower
    pub const WATTS_TO_HORSEPOWER: Transform =
        Transform::new("watts_to_horsepower", watts_to_horsepower);
    /// Pressure in PSI to bar
    pub const PSI_TO_BAR: Transform = Transform::new("psi_to_bar", psi_to_bar);
    /// Metres per second to kilometres per hour
    pub const MPS_TO_KPH: Transform = Transform::new("mps_to_kph", mps_to_kph);
    /// Metres per second to miles per hour
    pub const MPS_TO_MPH: Transform = Transform::new("mps_to_mph", mps_to_mph);

    /// Transforms addressable by name from schema files.
    pub const BUILTINS: [Transform; 4] = [
        Transform::WATTS_TO_HORSEPOWER,
        Transform::PSI_TO_BAR,
        Transform::MPS_TO_KPH,
        Transform::MPS_TO_MPH,
    ];

    pub const fn new(name: &'static str, apply: fn(f64) -> f64) -> Self {
        Self { name, apply }
    }

    /// Look up a built-in transform by name.
    pub fn builtin(name: &str) -> Option<Transform> {
        Self::BUILTINS.iter().copied().find(|t| t.name == name)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn apply(&self, raw: f64) -> f64 {
        (self.apply)(raw)
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Transform").field(&self.name).finish()
    }
}
