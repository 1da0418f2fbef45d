//! Volume unit conversion between the app scale (0–100) and the audio
//! module's hardware scale (0–30). Inputs are clamped; results round half up.

pub const APP_MAX: u8 = 100;
pub const HARDWARE_MAX: u8 = 30;

pub fn app_to_hardware(app: u8) -> u8 {
    rescale(app.min(APP_MAX), APP_MAX, HARDWARE_MAX)
}

pub fn hardware_to_app(hardware: u8) -> u8 {
    rescale(hardware.min(HARDWARE_MAX), HARDWARE_MAX, APP_MAX)
}

fn rescale(value: u8, from_max: u8, to_max: u8) -> u8 {
    let (value, from_max, to_max) = (u32::from(value), u32::from(from_max), u32::from(to_max));
    let scaled = (value * to_max * 2 + from_max) / (from_max * 2);
    u8::try_from(scaled).unwrap_or(u8::MAX)
}
