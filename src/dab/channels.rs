//! Band III DAB channel table.

use crate::error::{Result, Si46xxError};
use crate::protocol::opcodes::DAB_MAX_FREQUENCIES;

/// Channel label and centre frequency in kHz
pub const BAND_III: &[(&str, u32)] = &[
    ("5A", 174_928),
    ("5B", 176_640),
    ("5C", 178_352),
    ("5D", 180_064),
    ("6A", 181_936),
    ("6B", 183_648),
    ("6C", 185_360),
    ("6D", 187_072),
    ("7A", 188_928),
    ("7B", 190_640),
    ("7C", 192_352),
    ("7D", 194_064),
    ("8A", 195_936),
    ("8B", 197_648),
    ("8C", 199_360),
    ("8D", 201_072),
    ("9A", 202_928),
    ("9B", 204_640),
    ("9C", 206_352),
    ("9D", 208_064),
    ("10A", 209_936),
    ("10N", 210_096),
    ("10B", 211_648),
    ("10C", 213_360),
    ("10D", 215_072),
    ("11A", 216_928),
    ("11N", 217_088),
    ("11B", 218_640),
    ("11C", 220_352),
    ("11D", 222_064),
    ("12A", 223_936),
    ("12N", 224_096),
    ("12B", 225_648),
    ("12C", 227_360),
    ("12D", 229_072),
    ("13A", 230_784),
    ("13B", 232_496),
    ("13C", 234_208),
    ("13D", 235_776),
    ("13E", 237_488),
    ("13F", 239_200),
];

/// Regional multiplex presets: region code and its channel labels
pub const REGIONS: &[(&str, &[&str])] = &[
    ("bw", &["5C", "8D", "9D", "11B"]),
    ("by", &["5C", "12D", "11D", "9C", "10C", "11A", "11C", "12A", "6A"]),
    ("bb", &["5C", "7B", "7D"]),
    ("hb", &["5C", "7B", "12A"]),
    ("hh", &["5C", "7A"]),
    ("he", &["5C", "7B", "11C"]),
    ("mv", &["5C", "12B"]),
    ("ni", &["5C", "6A", "6D", "11B", "12A"]),
    ("nrw", &["5C", "11D"]),
    ("rp", &["5C", "11A"]),
    ("sl", &["5C", "9A"]),
    ("sn", &["5C", "6C", "8D", "9A", "12A"]),
    ("st", &["5C", "11C", "12C"]),
    ("sh", &["5C", "9C"]),
    ("th", &["5C", "7B", "9C", "12B"]),
    ("it-sue", &["10B", "10C", "10D", "12A", "12B", "12C"]),
    ("ch", &["12A", "12C", "12D", "7D", "7A", "9D", "8B"]),
];

/// Channel labels of a regional preset (code match ignores case)
pub fn region_channels(code: &str) -> Option<&'static [&'static str]> {
    REGIONS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(code.trim()))
        .map(|&(_, labels)| labels)
}

/// Look up a channel's frequency (label match ignores case)
pub fn frequency_khz(label: &str) -> Option<u32> {
    BAND_III
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(label.trim()))
        .map(|&(_, khz)| khz)
}

/// Look up the channel label for a frequency
pub fn channel_label(khz: u32) -> Option<&'static str> {
    BAND_III
        .iter()
        .find(|&&(_, freq)| freq == khz)
        .map(|&(name, _)| name)
}

/// Resolve channel labels into a frequency list
///
/// # Errors
///
/// Returns `InvalidArgument` for an unknown label, an empty list or more
/// than 48 channels
pub fn frequency_list<S: AsRef<str>>(labels: &[S]) -> Result<Vec<u32>> {
    if labels.is_empty() || labels.len() > DAB_MAX_FREQUENCIES {
        return Err(Si46xxError::InvalidArgument(format!(
            "channel list must hold 1 to {} entries, got {}",
            DAB_MAX_FREQUENCIES,
            labels.len()
        )));
    }

    labels
        .iter()
        .map(|label| {
            let label = label.as_ref();
            frequency_khz(label).ok_or_else(|| {
                Si46xxError::InvalidArgument(format!("unknown DAB channel '{}'", label))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_sorted_and_complete() {
        assert_eq!(BAND_III.len(), 41);
        assert!(BAND_III.len() <= DAB_MAX_FREQUENCIES);
        for pair in BAND_III.windows(2) {
            assert!(pair[0].1 < pair[1].1, "{} should precede {}", pair[0].0, pair[1].0);
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(frequency_khz("5C"), Some(178_352));
        assert_eq!(frequency_khz("11d"), Some(222_064));
        assert_eq!(frequency_khz(" 12B "), Some(225_648));
        assert_eq!(frequency_khz("14A"), None);

        assert_eq!(channel_label(239_200), Some("13F"));
        assert_eq!(channel_label(100_000), None);
    }

    #[test]
    fn test_frequency_list() {
        assert_eq!(frequency_list(&["5C", "11D"]).unwrap(), vec![178_352, 222_064]);

        let err = frequency_list(&["5C", "99Z"]).unwrap_err();
        assert!(err.to_string().contains("99Z"));

        let empty: [&str; 0] = [];
        assert!(frequency_list(&empty).is_err());

        let all: Vec<&str> = BAND_III.iter().map(|(name, _)| *name).collect();
        assert_eq!(frequency_list(&all).unwrap().len(), 41);
    }

    #[test]
    fn test_regions_resolve() {
        for (code, labels) in REGIONS {
            let freqs = frequency_list(*labels).unwrap();
            assert_eq!(freqs.len(), labels.len(), "region {}", code);
        }

        assert_eq!(region_channels("NRW"), Some(&["5C", "11D"][..]));
        assert_eq!(
            frequency_list(region_channels("hh").unwrap()).unwrap(),
            vec![178_352, 188_928]
        );
        assert_eq!(region_channels("xx"), None);
    }
}
