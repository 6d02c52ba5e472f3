use serde::{Deserialize, Serialize};

/// Generates a lowercase-labelled enum with `as_str` and a total `from_label`.
///
/// Unrecognized labels map to the fallback variant.
macro_rules! label_enum {
    ($name:ident, fallback = $fallback:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }

            pub fn from_label(s: &str) -> Self {
                match s.trim().to_lowercase().as_str() {
                    $($s => Self::$variant),+,
                    _ => Self::$fallback,
                }
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::from_label(&s)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.as_str().to_string()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

label_enum!(Gender, fallback = Unspecified {
    Male => "male",
    Female => "female",
    Diverse => "diverse",
    Unspecified => "unspecified",
});

label_enum!(TriageCategory, fallback = Unknown {
    Red => "red",
    Orange => "orange",
    Yellow => "yellow",
    Green => "green",
    Blue => "blue",
    Unknown => "unknown",
});

label_enum!(SymptomDuration, fallback = Unknown {
    UnderSixHours => "under_6_hours",
    SixToTwentyFourHours => "6_24_hours",
    OneToThreeDays => "1_3_days",
    ThreeToSevenDays => "3_7_days",
    OverOneWeek => "over_1_week",
    Unknown => "unknown",
});

label_enum!(ResultStatus, fallback = Normal {
    Normal => "normal",
    Low => "low",
    High => "high",
    Critical => "critical",
});

impl TriageCategory {
    /// Ordinal urgency: red = 5 down to blue = 1, unknown = 0.
    pub fn severity(&self) -> u8 {
        match self {
            Self::Red => 5,
            Self::Orange => 4,
            Self::Yellow => 3,
            Self::Green => 2,
            Self::Blue => 1,
            Self::Unknown => 0,
        }
    }
}

impl SymptomDuration {
    /// Human-readable bucket used in case descriptions.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::UnderSixHours => "less than 6 hours",
            Self::SixToTwentyFourHours => "6-24 hours",
            Self::OneToThreeDays => "1-3 days",
            Self::ThreeToSevenDays => "3-7 days",
            Self::OverOneWeek => "more than 1 week",
            Self::Unknown => "unknown",
        }
    }
}
