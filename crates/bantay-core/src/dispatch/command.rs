// ── Command catalogue ──
//
// Every action the boards understand, with the wire name each board
// expects and the board it is routed to.

use bantay_api::BoardRole;
use serde::Serialize;
use serde_json::{Value, json};

use crate::error::CoreError;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Command {
    // Audio
    PlayAudio,
    StopAudio,
    NextTrack,
    PrevTrack,
    SetVolume,
    SetTrack,
    // Motor
    RotateHead,
    RotateLeft,
    RotateRight,
    RotateCenter,
    StopMovement,
    // Servo
    MoveServo,
    OscillateArms,
    StopOscillate,
    ArmsRest,
    ArmsAlert,
    ArmsWave,
    // Camera
    SetBrightness,
    SetContrast,
    SetResolution,
    ToggleGrayscale,
    // Detection
    EnableDetection,
    DisableDetection,
    SetSensitivity,
    // System
    Restart,
    TriggerAlarm,
    TestBuzzer,
    ResetSystem,
    CalibrateSensors,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CommandCategory {
    Audio,
    Motor,
    Servo,
    Camera,
    Detection,
    System,
}

impl Command {
    /// Look up a command by wire name.
    pub fn parse(name: &str) -> Result<Self, CoreError> {
        name.parse().map_err(|_| CoreError::UnknownCommand {
            name: name.to_owned(),
        })
    }

    /// The wire name, e.g. `play_audio`.
    pub fn name(self) -> &'static str {
        self.into()
    }

    pub fn category(self) -> CommandCategory {
        match self {
            Self::PlayAudio
            | Self::StopAudio
            | Self::NextTrack
            | Self::PrevTrack
            | Self::SetVolume
            | Self::SetTrack => CommandCategory::Audio,
            Self::RotateHead
            | Self::RotateLeft
            | Self::RotateRight
            | Self::RotateCenter
            | Self::StopMovement => CommandCategory::Motor,
            Self::MoveServo
            | Self::OscillateArms
            | Self::StopOscillate
            | Self::ArmsRest
            | Self::ArmsAlert
            | Self::ArmsWave => CommandCategory::Servo,
            Self::SetBrightness | Self::SetContrast | Self::SetResolution | Self::ToggleGrayscale => {
                CommandCategory::Camera
            }
            Self::EnableDetection | Self::DisableDetection | Self::SetSensitivity => {
                CommandCategory::Detection
            }
            Self::Restart
            | Self::TriggerAlarm
            | Self::TestBuzzer
            | Self::ResetSystem
            | Self::CalibrateSensors => CommandCategory::System,
        }
    }

    /// Board that executes this command.
    pub fn target(self) -> BoardRole {
        match self.category() {
            CommandCategory::Camera | CommandCategory::Detection => BoardRole::Camera,
            _ => BoardRole::Main,
        }
    }

    /// Local wire frame: `{"action": name, "params": {...}}`.
    pub fn frame(self, params: &Value) -> Value {
        json!({ "action": self.name(), "params": params })
    }
}
