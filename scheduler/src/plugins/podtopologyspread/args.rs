use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::framework::PluginError;

/// Scale applied before dividing by `max_skew`, keeps integer precision.
pub const SKEW_WEIGHT_SCALE: i64 = 1000;

/// How per-constraint matching counts combine into a raw score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Weighting {
    /// Every constraint weighs the same: `-count`
    #[default]
    Uniform,
    /// Constraints tolerating a larger skew weigh less: `-count * 1000 / max_skew`
    InverseMaxSkew,
}

impl Weighting {
    /// Contribution of one constraint to a node's raw score.
    pub fn contribution(self, matching: i64, max_skew: i32) -> i64 {
        match self {
            Weighting::Uniform => -matching,
            Weighting::InverseMaxSkew => {
                -(matching * SKEW_WEIGHT_SCALE / i64::from(max_skew.max(1)))
            }
        }
    }
}

impl fmt::Display for Weighting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Weighting::Uniform => write!(f, "uniform"),
            Weighting::InverseMaxSkew => write!(f, "inverse-max-skew"),
        }
    }
}

impl FromStr for Weighting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "uniform" => Ok(Weighting::Uniform),
            "inverse-max-skew" => Ok(Weighting::InverseMaxSkew),
            other => Err(format!("unknown spread weighting {other:?}")),
        }
    }
}

/// Plugin arguments, received as an opaque JSON value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct PodTopologySpreadArgs {
    pub weighting: Weighting,
}

impl PodTopologySpreadArgs {
    pub fn from_value(args: Option<&Value>) -> Result<Self, PluginError> {
        match args {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(value) => Self::deserialize(value).map_err(|e| {
                PluginError::Configuration(format!("decoding PodTopologySpread args: {e}"))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn args_default_to_uniform() {
        assert_eq!(
            PodTopologySpreadArgs::from_value(None).unwrap().weighting,
            Weighting::Uniform
        );
        assert_eq!(
            PodTopologySpreadArgs::from_value(Some(&json!({}))).unwrap().weighting,
            Weighting::Uniform
        );
    }

    #[test]
    fn args_decode_weighting() {
        let value = json!({"weighting": "inverse-max-skew"});
        let args = PodTopologySpreadArgs::from_value(Some(&value)).unwrap();
        assert_eq!(args.weighting, Weighting::InverseMaxSkew);
    }

    #[test]
    fn bad_args_are_configuration_errors() {
        let cubic = json!({"weighting": "cubic"});
        let err = PodTopologySpreadArgs::from_value(Some(&cubic)).unwrap_err();
        assert!(matches!(err, PluginError::Configuration(_)));

        let err = PodTopologySpreadArgs::from_value(Some(&json!({"skew": 1}))).unwrap_err();
        assert!(matches!(err, PluginError::Configuration(_)));
    }

    #[test]
    fn weighting_contributions() {
        assert_eq!(Weighting::Uniform.contribution(3, 2), -3);
        assert_eq!(Weighting::InverseMaxSkew.contribution(3, 1), -3000);
        assert_eq!(Weighting::InverseMaxSkew.contribution(3, 2), -1500);
        assert_eq!(Weighting::InverseMaxSkew.contribution(0, 5), 0);
    }

    #[test]
    fn weighting_parses_from_env_form() {
        assert_eq!("Uniform".parse::<Weighting>(), Ok(Weighting::Uniform));
        assert_eq!(
            " inverse-max-skew ".parse::<Weighting>(),
            Ok(Weighting::InverseMaxSkew)
        );
        assert!("linear".parse::<Weighting>().is_err());
        assert_eq!(Weighting::InverseMaxSkew.to_string(), "inverse-max-skew");
    }
}
