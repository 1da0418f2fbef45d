//! `bantay volume`: one-shot volume change through the debounced control.

use std::sync::Arc;

use serde::Serialize;

use bantay_core::dispatch::app_to_hardware;
use bantay_core::{CommandDispatcher, VolumeControl};

use crate::cli::{GlobalOpts, VolumeArgs};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Debug, Serialize)]
struct VolumeResult {
    volume: u8,
    hardware: u8,
}

pub async fn handle(cfg: &Config, args: VolumeArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let sup = config::build_supervisor(cfg)?;
    util::connect(&sup, global).await;

    let control = VolumeControl::new(
        cfg.volume_config(),
        Arc::new(CommandDispatcher::new(sup.clone())),
    );
    let following = control.follow(&sup);
    let volume = control.set_value(i32::from(args.value));
    let result = control.commit().await;
    sup.unsubscribe(&following);
    sup.disconnect_all().await;
    result?;

    let data = VolumeResult {
        volume,
        hardware: app_to_hardware(volume),
    };
    let out = output::render_single(&global.output, &data, |r| {
        format!("Volume set to {} (hardware {})", r.volume, r.hardware)
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
