use log::warn;
use strum_macros::{Display, EnumIter};

/// The model variants this engine can drive.
///
/// `SmplX` parameterizes every hand joint explicitly; `SmplXPca` replaces the
/// 30 hand joints with a small number of PCA coefficients per hand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum SmplVariant {
    Smpl,
    SmplH,
    SmplX,
    SmplXPca,
}

/// Gender tag of a model or sequence. Informational only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, Default)]
pub enum Gender {
    #[default]
    Unknown,
    Neutral,
    Male,
    Female,
}

impl Gender {
    /// Uppercase token used in the official model file names.
    pub fn file_tag(self) -> &'static str {
        match self {
            Gender::Neutral => "NEUTRAL",
            Gender::Male => "MALE",
            Gender::Female => "FEMALE",
            Gender::Unknown => "UNKNOWN",
        }
    }

    /// Parses a gender string, case-insensitively. Unparseable input logs a
    /// warning and maps to `Unknown`.
    pub fn parse(text: &str) -> Gender {
        match text.to_ascii_uppercase().as_str() {
            "NEUTRAL" => Gender::Neutral,
            "MALE" => Gender::Male,
            "FEMALE" => Gender::Female,
            other => {
                warn!("gender '{other}' could not be parsed");
                Gender::Unknown
            }
        }
    }

    /// Maps the single-character gender tag of an AMASS archive.
    pub fn from_amass_char(c: char) -> Gender {
        match c {
            'f' => Gender::Female,
            'm' => Gender::Male,
            'n' => Gender::Neutral,
            _ => Gender::Unknown,
        }
    }
}

/// Options for the forward pass of a body.
#[derive(Clone)]
pub struct UpdateOptions {
    /// Disabling the pose blend shapes skips the dominant matrix product of
    /// the update at a small accuracy cost; useful for interactive
    /// manipulation.
    pub enable_pose_blendshapes: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            enable_pose_blendshapes: true,
        }
    }
}

impl UpdateOptions {
    pub fn new(enable_pose_blendshapes: bool) -> Self {
        Self {
            enable_pose_blendshapes,
        }
    }
}
