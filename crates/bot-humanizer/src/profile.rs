/// Pacing parameters for one humanizer run. Fields mirror the
/// spec's ENUMERATED profile exactly so config can select between them by
/// name without any code change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HumanizerProfile {
    pub base_char_delay_ms: u64,
    pub char_delay_variance_ms: u64,
    pub punctuation_pause_chance: f64,
    pub punctuation_pause_min_ms: u64,
    pub punctuation_pause_max_ms: u64,
    pub words_per_break: u32,
    pub words_break_variance: u32,
    pub thinking_pause_chance: f64,
    pub thinking_pause_min_ms: u64,
    pub thinking_pause_max_ms: u64,
}

impl HumanizerProfile {
    /// 12±8 ms/char, 40% pause on strong punctuation 150-350ms, break every
    /// ~20 words, 25% thinking pause 200-500ms.
    pub const fn default_profile() -> Self {
        Self {
            base_char_delay_ms: 12,
            char_delay_variance_ms: 8,
            punctuation_pause_chance: 0.40,
            punctuation_pause_min_ms: 150,
            punctuation_pause_max_ms: 350,
            words_per_break: 20,
            words_break_variance: 6,
            thinking_pause_chance: 0.25,
            thinking_pause_min_ms: 200,
            thinking_pause_max_ms: 500,
        }
    }

    /// Quicker, less hesitant cadence.
    pub const fn fast() -> Self {
        Self {
            base_char_delay_ms: 6,
            char_delay_variance_ms: 4,
            punctuation_pause_chance: 0.20,
            punctuation_pause_min_ms: 80,
            punctuation_pause_max_ms: 180,
            words_per_break: 30,
            words_break_variance: 8,
            thinking_pause_chance: 0.10,
            thinking_pause_min_ms: 100,
            thinking_pause_max_ms: 250,
        }
    }

    /// Chattier, more hesitant cadence.
    pub const fn casual() -> Self {
        Self {
            base_char_delay_ms: 18,
            char_delay_variance_ms: 14,
            punctuation_pause_chance: 0.55,
            punctuation_pause_min_ms: 200,
            punctuation_pause_max_ms: 450,
            words_per_break: 14,
            words_break_variance: 5,
            thinking_pause_chance: 0.40,
            thinking_pause_min_ms: 250,
            thinking_pause_max_ms: 650,
        }
    }

    /// Resolve a profile by the config-selectable name, falling back to the
    /// default profile for anything unrecognized.
    pub fn by_name(name: &str) -> Self {
        match name {
            "fast" => Self::fast(),
            "casual" => Self::casual(),
            _ => Self::default_profile(),
        }
    }
}

impl Default for HumanizerProfile {
    fn default() -> Self {
        Self::default_profile()
    }
}
