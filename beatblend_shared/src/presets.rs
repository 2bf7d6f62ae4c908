use crate::pattern::{CornerSet, Pattern};

pub const FOUR_ON_THE_FLOOR: Pattern = Pattern::from_rows(
    b"x...x...x...x...",
    b"....x.......x...",
    b"..x...x...x...x.",
);

pub const BUSY_HATS: Pattern = Pattern::from_rows(
    b"x.......x.......",
    b"....x.......x...",
    b"xxxxxxxxxxxxxxxx",
);

pub const MINIMAL: Pattern = Pattern::from_rows(
    b"x.........x.....",
    b"............x...",
    b"....x.......x...",
);

pub const FUNK: Pattern = Pattern::from_rows(
    b"x..x..x...x..x..",
    b"....x..x.x..x..x",
    b"x.x.x.x.x.x.x.x.",
);

pub const BACKBEAT: Pattern = Pattern::from_rows(
    b"x.......x.x.....",
    b"....x.......x...",
    b"x.x.x.x.x.x.x.x.",
);

pub const BREAKBEAT: Pattern = Pattern::from_rows(
    b"x.x.......x.....",
    b"....x..x.x..x...",
    b"x.x.x.x.x.x.xxx.",
);

const PRESETS: [(&str, Pattern); 6] = [
    ("Four on the floor", FOUR_ON_THE_FLOOR),
    ("Busy Hats", BUSY_HATS),
    ("Minimal", MINIMAL),
    ("Funk", FUNK),
    ("Backbeat", BACKBEAT),
    ("Breakbeat", BREAKBEAT),
];

pub fn preset_names() -> impl Iterator<Item = &'static str> {
    PRESETS.iter().map(|(name, _)| *name)
}

/// Case-insensitive lookup.
pub fn preset(name: &str) -> Option<Pattern> {
    PRESETS
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name.trim()))
        .map(|(_, p)| *p)
}

pub fn default_corners() -> CornerSet {
    CornerSet::new(FOUR_ON_THE_FLOOR, BUSY_HATS, MINIMAL, FUNK)
}

pub fn default_pattern() -> Pattern {
    FOUR_ON_THE_FLOOR
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{Corner, DrumTrack};

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(preset("busy hats"), Some(BUSY_HATS));
        assert_eq!(preset("  Funk "), Some(FUNK));
        assert_eq!(preset("polka"), None);
    }

    #[test]
    fn default_corners_follow_the_pad_layout() {
        let corners = default_corners();
        assert_eq!(corners.get(Corner::A), &FOUR_ON_THE_FLOOR);
        assert_eq!(corners.get(Corner::D), &FUNK);
    }

    #[test]
    fn every_preset_has_a_kick() {
        for name in preset_names() {
            let p = preset(name).unwrap();
            assert!(p.active_steps(DrumTrack::Kick).next().is_some(), "{name}");
        }
    }
}
