//! Typed view of the AxeOS `GET /api/system/info` response.
//!
//! Firmware versions disagree on which keys exist and whether difficulties
//! are numbers or suffixed strings ("4.29G"), so every field defaults and the
//! difficulty fields accept both shapes.

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemInfo {
    /// GH/s
    #[serde(rename = "hashRate")]
    pub hash_rate: f64,

    /// W
    pub power: f64,

    /// ASIC temperature, °C
    pub temp: f64,

    #[serde(rename = "vrTemp")]
    pub vr_temp: f64,

    #[serde(rename = "fanrpm")]
    pub fan_rpm: f64,

    /// mV
    #[serde(rename = "coreVoltageActual")]
    pub core_voltage_actual_mv: f64,

    /// Configured core voltage, mV
    #[serde(rename = "coreVoltage")]
    pub core_voltage_mv: f64,

    /// Input voltage, mV
    #[serde(rename = "voltage")]
    pub input_voltage_mv: f64,

    /// MHz
    pub frequency: f64,

    #[serde(rename = "bestNonceDiff", deserialize_with = "difficulty")]
    pub best_diff: f64,

    #[serde(rename = "bestSessionNonceDiff", deserialize_with = "difficulty")]
    pub best_session_diff: f64,

    #[serde(rename = "sharesAccepted")]
    pub shares_accepted: u64,

    #[serde(rename = "sharesRejected")]
    pub shares_rejected: u64,

    #[serde(rename = "uptimeSeconds")]
    pub uptime_seconds: u64,

    #[serde(rename = "wifiRSSI")]
    pub wifi_rssi: i32,

    #[serde(rename = "stratumURL")]
    pub stratum_url: String,

    #[serde(rename = "stratumUser")]
    pub stratum_user: String,

    #[serde(rename = "ASICModel")]
    pub asic_model: String,

    #[serde(rename = "boardVersion")]
    pub board_version: String,

    #[serde(rename = "version")]
    pub firmware_version: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDifficulty {
    Number(f64),
    Text(String),
    Null(()),
}

fn difficulty<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawDifficulty::deserialize(deserializer)? {
        RawDifficulty::Number(n) => n,
        RawDifficulty::Text(s) => parse_difficulty(&s).unwrap_or(0.0),
        RawDifficulty::Null(()) => 0.0,
    })
}

/// Parse "4.29G", "812M", "1,234" or plain numbers. `None` if unparseable.
pub fn parse_difficulty(text: &str) -> Option<f64> {
    let text = text.trim().replace(',', "");
    let (number, multiplier) = match text.chars().last()? {
        'k' | 'K' => (&text[..text.len() - 1], 1e3),
        'M' => (&text[..text.len() - 1], 1e6),
        'G' => (&text[..text.len() - 1], 1e9),
        'T' => (&text[..text.len() - 1], 1e12),
        'P' => (&text[..text.len() - 1], 1e15),
        _ => (text.as_str(), 1.0),
    };
    number.trim().parse::<f64>().ok().map(|n| n * multiplier)
}
