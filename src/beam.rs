use crate::error::{BeamForgeError, BfResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

/// Reference-particle and bunch-average quantities carried by a beam state.
///
/// The string form of each variant is the name the simulation engine uses,
/// so `"ref_IonEk".parse::<BeamField>()` round-trips with `to_string()`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum BeamField {
    // === Reference particle ===
    #[strum(serialize = "ref_beta")]
    RefBeta,
    #[strum(serialize = "ref_bg")]
    RefBetaGamma,
    #[strum(serialize = "ref_gamma")]
    RefGamma,
    #[strum(serialize = "ref_IonEk")]
    RefIonEk,
    #[strum(serialize = "ref_IonEs")]
    RefIonEs,
    #[strum(serialize = "ref_IonQ")]
    RefIonQ,
    #[strum(serialize = "ref_IonW")]
    RefIonW,
    #[strum(serialize = "ref_IonZ")]
    RefIonZ,
    #[strum(serialize = "ref_phis")]
    RefPhis,
    #[strum(serialize = "ref_SampleIonK")]
    RefSampleIonK,
    #[strum(serialize = "ref_Brho")]
    RefBrho,

    // === Centroid ===
    #[strum(serialize = "xcen")]
    XCen,
    #[strum(serialize = "ycen")]
    YCen,
    #[strum(serialize = "zcen")]
    ZCen,
    #[strum(serialize = "xpcen")]
    XpCen,
    #[strum(serialize = "ypcen")]
    YpCen,
    #[strum(serialize = "zpcen")]
    ZpCen,

    // === RMS envelope ===
    #[strum(serialize = "xrms")]
    XRms,
    #[strum(serialize = "yrms")]
    YRms,
    #[strum(serialize = "zrms")]
    ZRms,
    #[strum(serialize = "xprms")]
    XpRms,
    #[strum(serialize = "yprms")]
    YpRms,
    #[strum(serialize = "zprms")]
    ZpRms,

    // === Emittance ===
    #[strum(serialize = "xemittance")]
    XEmittance,
    #[strum(serialize = "yemittance")]
    YEmittance,
    #[strum(serialize = "zemittance")]
    ZEmittance,
    #[strum(serialize = "xnemittance")]
    XNEmittance,
    #[strum(serialize = "ynemittance")]
    YNEmittance,
    #[strum(serialize = "znemittance")]
    ZNEmittance,

    // === Twiss ===
    #[strum(serialize = "xtwiss_alpha")]
    XTwissAlpha,
    #[strum(serialize = "xtwiss_beta")]
    XTwissBeta,
    #[strum(serialize = "xtwiss_gamma")]
    XTwissGamma,
    #[strum(serialize = "ytwiss_alpha")]
    YTwissAlpha,
    #[strum(serialize = "ytwiss_beta")]
    YTwissBeta,
    #[strum(serialize = "ytwiss_gamma")]
    YTwissGamma,
    #[strum(serialize = "ztwiss_alpha")]
    ZTwissAlpha,
    #[strum(serialize = "ztwiss_beta")]
    ZTwissBeta,
    #[strum(serialize = "ztwiss_gamma")]
    ZTwissGamma,

    // === Coupling ===
    #[strum(serialize = "couple_xy")]
    CoupleXY,
    #[strum(serialize = "couple_xpy")]
    CoupleXpY,
    #[strum(serialize = "couple_xyp")]
    CoupleXYp,
    #[strum(serialize = "couple_xpyp")]
    CoupleXpYp,

    #[strum(serialize = "last_caviphi0")]
    LastCaviPhi0,
}

impl BeamField {
    pub fn unit(self) -> &'static str {
        use BeamField::*;
        match self {
            RefIonEk | RefIonEs | RefIonW => "eV/u",
            RefPhis | RefSampleIonK => "rad",
            RefBrho => "Tm",
            XCen | YCen | XRms | YRms => "mm",
            ZCen | ZRms | XpCen | YpCen | XpRms | YpRms => "rad",
            ZpCen | ZpRms => "MeV/u",
            XEmittance | YEmittance | XNEmittance | YNEmittance => "mm-mrad",
            ZEmittance | ZNEmittance => "rad-MeV/u",
            XTwissBeta | YTwissBeta => "m/rad",
            XTwissGamma | YTwissGamma => "rad/m",
            ZTwissBeta => "rad/MeV/u",
            ZTwissGamma => "MeV/u/rad",
            LastCaviPhi0 => "deg",
            _ => "",
        }
    }

    pub fn description(self) -> &'static str {
        use BeamField::*;
        match self {
            RefBeta => "Reference velocity (v/c)",
            RefBetaGamma => "Reference beta * gamma",
            RefGamma => "Reference Lorentz factor",
            RefIonEk => "Kinetic energy",
            RefIonEs => "Rest energy",
            RefIonQ => "Macro-particle charge",
            RefIonW => "Total energy",
            RefIonZ => "Charge to mass ratio",
            RefPhis => "Absolute synchrotron phase",
            RefSampleIonK => "Wave vector in cavities",
            RefBrho => "Magnetic rigidity",
            XCen | YCen | ZCen => "Centroid position",
            XpCen | YpCen | ZpCen => "Centroid momentum",
            XRms | YRms | ZRms => "RMS beam size",
            XpRms | YpRms | ZpRms => "RMS momentum spread",
            XEmittance | YEmittance | ZEmittance => "Geometrical emittance",
            XNEmittance | YNEmittance | ZNEmittance => "Normalized emittance",
            XTwissAlpha | YTwissAlpha | ZTwissAlpha => "Twiss alpha",
            XTwissBeta | YTwissBeta | ZTwissBeta => "Twiss beta",
            XTwissGamma | YTwissGamma | ZTwissGamma => "Twiss gamma",
            CoupleXY | CoupleXpY | CoupleXYp | CoupleXpYp => "Transverse coupling",
            LastCaviPhi0 => "Last RF cavity phase",
        }
    }

    /// Resolves either an engine name (`"xcen"`) or one of the operator
    /// labels offered for beam-state knobs (`"x-position"`, `"energy"`).
    pub fn from_label(label: &str) -> BfResult<Self> {
        if let Ok(field) = BeamField::from_str(label) {
            return Ok(field);
        }

        let field = match label.trim().to_ascii_lowercase().as_str() {
            "q/a" => BeamField::RefIonZ,
            "energy" => BeamField::RefIonEk,
            "magnetic rigidity" => BeamField::RefBrho,
            "x-position" => BeamField::XCen,
            "y-position" => BeamField::YCen,
            "z-position" => BeamField::ZCen,
            "x-momentum" => BeamField::XpCen,
            "y-momentum" => BeamField::YpCen,
            "z-momentum" => BeamField::ZpCen,
            "beam size [mm]" | "beam size" => BeamField::XRms,
            "twiss beta [m/rad]" | "twiss beta" => BeamField::XTwissBeta,
            "alpha" => BeamField::XTwissAlpha,
            "geom. emittance [mm-mrad]" | "geom. emittance" => BeamField::XEmittance,
            "norm. emittance [mm-mrad]" | "norm. emittance" => BeamField::XNEmittance,
            _ => return Err(BeamForgeError::UnknownParameter(label.to_string())),
        };
        Ok(field)
    }
}

impl TryFrom<String> for BeamField {
    type Error = BeamForgeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        BeamField::from_str(&value).map_err(|_| BeamForgeError::UnknownParameter(value))
    }
}

impl From<BeamField> for String {
    fn from(field: BeamField) -> Self {
        field.to_string()
    }
}

/// A beam-state record: the initial state fed into propagation, or the
/// snapshot the simulation reports at some lattice position.
///
/// Fields that were never written read as `0.0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BeamState {
    values: BTreeMap<BeamField, f64>,
}

impl BeamState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The start-up beam of an empty workspace: 1 MeV/u reference ions at
    /// charge-to-mass 0.5.
    pub fn reference() -> Self {
        let ion_ek = 1.0e6;
        let ion_es = 931_494_320.0;
        Self::new()
            .with(BeamField::RefIonEk, ion_ek)
            .with(BeamField::RefIonEs, ion_es)
            .with(BeamField::RefIonW, ion_es + ion_ek)
            .with(BeamField::RefIonZ, 0.5)
    }

    #[inline]
    pub fn get(&self, field: BeamField) -> f64 {
        self.values.get(&field).copied().unwrap_or(0.0)
    }

    #[inline]
    pub fn set(&mut self, field: BeamField, value: f64) {
        self.values.insert(field, value);
    }

    pub fn with(mut self, field: BeamField, value: f64) -> Self {
        self.set(field, value);
        self
    }

    pub fn add(&mut self, field: BeamField, delta: f64) {
        *self.values.entry(field).or_insert(0.0) += delta;
    }

    /// Looks a field up by its engine name or operator label.
    pub fn lookup(&self, name: &str) -> BfResult<f64> {
        Ok(self.get(BeamField::from_label(name)?))
    }

    pub fn iter(&self) -> impl Iterator<Item = (BeamField, f64)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_engine_names_round_trip() {
        for field in BeamField::iter() {
            assert_eq!(BeamField::from_str(&field.to_string()).unwrap(), field);
            assert!(!field.description().is_empty());
        }
    }

    #[test]
    fn test_operator_labels() {
        assert_eq!(BeamField::from_label("Energy").unwrap(), BeamField::RefIonEk);
        assert_eq!(BeamField::from_label("x-position").unwrap(), BeamField::XCen);
        assert_eq!(BeamField::from_label("ref_IonEk").unwrap(), BeamField::RefIonEk);
        assert!(matches!(
            BeamField::from_label("warp factor"),
            Err(BeamForgeError::UnknownParameter(_))
        ));
    }

    #[test]
    fn test_state_serializes_by_engine_name() {
        let state = BeamState::new().with(BeamField::RefIonEk, 2.0e6);
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, r#"{"ref_IonEk":2000000.0}"#);
        let back: BeamState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
        assert_eq!(back.get(BeamField::XCen), 0.0);
    }
}
