use super::AttrValue;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Source,
    Marker,
    Stripper,
    Tmatrix,
    Orbtrim,
    Drift,
    Solenoid,
    Quadrupole,
    Sextupole,
    Equad,
    Sbend,
    Edipole,
    Rfcavity,
}

impl ElementKind {
    /// Attributes an element of this kind must define before the engine
    /// accepts it.
    pub fn required_attributes(self) -> &'static [&'static str] {
        match self {
            ElementKind::Source | ElementKind::Marker | ElementKind::Orbtrim => &[],
            ElementKind::Stripper => &["IonChargeStates", "charge_model", "NCharge"],
            ElementKind::Tmatrix => &["matrix"],
            ElementKind::Drift => &["L"],
            ElementKind::Solenoid => &["L", "B"],
            ElementKind::Quadrupole => &["L", "B2"],
            ElementKind::Sextupole => &["L", "B3"],
            ElementKind::Equad => &["L", "V", "radius"],
            ElementKind::Sbend => &["L", "phi"],
            ElementKind::Edipole => &["L", "phi", "ver", "spher"],
            ElementKind::Rfcavity => &["L", "f", "phi", "scl_fac", "cavtype"],
        }
    }

    pub fn default_attributes(self) -> Vec<(&'static str, AttrValue)> {
        match self {
            ElementKind::Sbend => vec![("phi", AttrValue::Number(1.0))],
            ElementKind::Equad => vec![("radius", AttrValue::Number(1.0))],
            ElementKind::Rfcavity => vec![
                ("L", AttrValue::Number(0.24)),
                ("f", AttrValue::Number(80.5e6)),
                ("cavtype", AttrValue::Text("0.041QWR".to_string())),
            ],
            _ => Vec::new(),
        }
    }
}

pub fn attribute_unit(attribute: &str) -> &'static str {
    match attribute {
        "L" | "dx" | "dy" => "m",
        "Stripper_IonMass" => "amu",
        "Stripper_E1Para" => "MeV/u",
        "Stripper_upara" => "mrad",
        "Stripper_E0Para" => "eV/u, None, None",
        "Stripper_Para" => "um, %, eV/u",
        "theta_x" | "theta_y" | "pitch" | "yaw" | "roll" => "rad",
        "tm_xkick" | "tm_ykick" => "T*m",
        "xyrotate" | "phi" | "phi1" | "phi2" => "deg",
        "B" => "T",
        "B2" => "T/m",
        "B3" => "T/m^2",
        "V" => "V",
        "fringe_x" | "fringe_y" => "rad/mm",
        "f" => "Hz",
        "Rm" => "mm",
        _ => "",
    }
}
