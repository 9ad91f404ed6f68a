//! Canonical object names
//!
//! Interlocking tables refer to objects by short local tokens (`21`, `1RA`, `12L`).
//! Objects are stored under plant-prefixed names; these helpers build the stored name
//! a token stands for.

/// Pseudo-plant holding the track circuits of the block sections between stations
pub const BLOCK_SECTION_PLANT: &str = "閉そく";

const UP_TRACK_PREFIX: &str = "上り";
const DOWN_TRACK_PREFIX: &str = "下り";

/// Switching machine `{plant}_W{number}`
pub fn switching_machine_name(plant: &str, number: &str) -> String {
    format!("{}_W{}", plant, number)
}

/// Lever named by a route start such as `1R` or `12LZ` (the side letter is dropped)
pub fn lever_name(plant: &str, start: &str) -> String {
    let number: String = start.chars().filter(|c| *c != 'R' && *c != 'L').collect();
    format!("{}_{}", plant, number)
}

pub fn direction_route_name(plant: &str, start: &str) -> String {
    format!("{}_{}F", plant, start)
}

pub fn button_name(plant: &str, end: &str) -> String {
    let end: String = end.chars().filter(|c| *c != '(' && *c != ')').collect();
    format!("{}_{}P", plant, end)
}

/// Route `{plant}_{start}{end}`; a parenthesised end is not part of the name
pub fn route_name(plant: &str, start: &str, end: &str) -> String {
    if end.starts_with('(') {
        format!("{}_{}", plant, start)
    } else {
        format!("{}_{}{}", plant, start, end)
    }
}

/// Replace the half-width katakana used in some tables with their full-width forms
pub fn to_full_width(name: &str) -> String {
    name.replace('ｲ', "イ").replace('ﾛ', "ロ")
}

/// Block-section track circuit: even numbers are on the up track, odd on the down track
pub fn block_track_circuit_name(number: u32) -> String {
    let prefix = if number % 2 == 0 {
        UP_TRACK_PREFIX
    } else {
        DOWN_TRACK_PREFIX
    };
    format!("{}{}T", prefix, number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lever_and_machine_names() {
        assert_eq!(switching_machine_name("TH71", "21"), "TH71_W21");
        assert_eq!(lever_name("TH71", "1R"), "TH71_1");
        assert_eq!(lever_name("TH71", "12LZ"), "TH71_12Z");
    }

    #[test]
    fn test_route_and_button_names() {
        assert_eq!(route_name("TH71", "1R", "A"), "TH71_1RA");
        assert_eq!(route_name("TH71", "1R", "(51)"), "TH71_1R");
        assert_eq!(button_name("TH71", "(51)"), "TH71_51P");
        assert_eq!(direction_route_name("TH75", "51"), "TH75_51F");
    }

    #[test]
    fn test_width_normalisation() {
        assert_eq!(to_full_width("TH58_2Rｲ"), "TH58_2Rイ");
        assert_eq!(to_full_width("TH58_2Rﾛ"), "TH58_2Rロ");
    }

    #[test]
    fn test_block_track_circuit_parity() {
        assert_eq!(block_track_circuit_name(12), "上り12T");
        assert_eq!(block_track_circuit_name(7), "下り7T");
    }
}
