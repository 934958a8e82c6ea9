//! Expected hashrate from the ASIC model and clock frequency.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AsicModel {
    /// Bitaxe Gamma
    BM1370,
    /// Bitaxe Supra
    BM1368,
    /// Bitaxe Ultra
    BM1366,
    /// Bitaxe Max
    BM1397,
}

const ALL_MODELS: [AsicModel; 4] = [
    AsicModel::BM1370,
    AsicModel::BM1368,
    AsicModel::BM1366,
    AsicModel::BM1397,
];

impl AsicModel {
    /// Reference clock (MHz) and the hashrate (GH/s) the chip does at it.
    pub fn reference(&self) -> (f64, f64) {
        match self {
            AsicModel::BM1370 => (600.0, 1200.0),
            AsicModel::BM1368 => (650.0, 700.0),
            AsicModel::BM1366 => (525.0, 500.0),
            AsicModel::BM1397 => (450.0, 400.0),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AsicModel::BM1370 => "BM1370",
            AsicModel::BM1368 => "BM1368",
            AsicModel::BM1366 => "BM1366",
            AsicModel::BM1397 => "BM1397",
        }
    }

    /// Find a known model name inside a firmware-reported string such as "bm1370 rev2".
    pub fn detect(reported: &str) -> Option<Self> {
        let reported = reported.to_uppercase();
        ALL_MODELS
            .into_iter()
            .find(|model| reported.contains(model.as_str()))
    }

    pub fn expected_hashrate_gh(&self, frequency_mhz: f64) -> f64 {
        let (base_freq, base_gh) = self.reference();
        (base_gh * frequency_mhz / base_freq).max(0.0)
    }
}

/// Expected hashrate in GH/s, scaled linearly with frequency.
///
/// Unknown models are guessed from the frequency band. Without a model or a
/// positive frequency there is no baseline and 0 is returned.
pub fn expected_hashrate_gh(asic_model: &str, frequency_mhz: f64) -> f64 {
    if asic_model.trim().is_empty() || !(frequency_mhz > 0.0) {
        return 0.0;
    }

    match AsicModel::detect(asic_model) {
        Some(model) => model.expected_hashrate_gh(frequency_mhz),
        None => estimate_from_frequency(frequency_mhz),
    }
}

fn estimate_from_frequency(frequency_mhz: f64) -> f64 {
    if frequency_mhz >= 580.0 {
        1200.0 * frequency_mhz / 600.0
    } else if frequency_mhz >= 500.0 {
        600.0 * frequency_mhz / 550.0
    } else {
        400.0 * frequency_mhz / 450.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_models_at_reference_clock() {
        assert_eq!(expected_hashrate_gh("BM1370", 600.0), 1200.0);
        assert_eq!(expected_hashrate_gh("BM1368", 650.0), 700.0);
        assert_eq!(expected_hashrate_gh("BM1366", 525.0), 500.0);
        assert_eq!(expected_hashrate_gh("BM1397", 450.0), 400.0);
    }

    #[test]
    fn test_linear_scaling() {
        assert_eq!(expected_hashrate_gh("BM1370", 525.0), 1050.0);
        assert_eq!(expected_hashrate_gh("BM1370", 650.0), 1300.0);
    }

    #[test]
    fn test_detect_is_case_insensitive_substring() {
        assert_eq!(AsicModel::detect("bm1366AG"), Some(AsicModel::BM1366));
        assert_eq!(AsicModel::detect("Gamma BM1370"), Some(AsicModel::BM1370));
        assert_eq!(AsicModel::detect("BM9999"), None);
    }

    #[test]
    fn test_unknown_model_uses_frequency_band() {
        assert_eq!(expected_hashrate_gh("mystery", 600.0), 1200.0);
        assert_eq!(expected_hashrate_gh("mystery", 550.0), 600.0);
        assert_eq!(expected_hashrate_gh("mystery", 450.0), 400.0);
    }

    #[test]
    fn test_no_baseline_without_model_or_clock() {
        assert_eq!(expected_hashrate_gh("", 600.0), 0.0);
        assert_eq!(expected_hashrate_gh("BM1370", 0.0), 0.0);
        assert_eq!(expected_hashrate_gh("BM1370", -5.0), 0.0);
    }
}
