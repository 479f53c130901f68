//! Byte-count formatting for console output.

const UNITS: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

/// Render a byte count in binary units with two decimals, e.g. `5.50 KiB`.
pub fn to_display_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}

/// Machine-readable form: the raw integer, no unit.
pub fn to_machine_size(bytes: u64) -> String {
    bytes.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_binary_units() {
        assert_eq!(to_display_size(0), "0.00 B");
        assert_eq!(to_display_size(1023), "1023.00 B");
        assert_eq!(to_display_size(5632), "5.50 KiB");
        assert_eq!(to_display_size(134_217_728_000), "125.00 GiB");
        assert_eq!(to_display_size(1_152_921_504_606_846_976), "1.00 EiB");
    }

    #[test]
    fn machine_mode_is_raw() {
        assert_eq!(to_machine_size(5632), "5632");
        assert_eq!(to_machine_size(0), "0");
    }
}
