use std::sync::{Arc, Mutex};

use aosd::{Aosd, AosdError, FlashOptions, ReadyPredicate, TextRenderer, Transparency};
use aosd_cat::input::{self, ReaderOptions};
use aosd_cat::{Config, Mailbox, logging};
use clap::Parser;
use tracing::{debug, error, warn};

fn main() -> Result<(), String> {
    let config = Config::parse();
    logging::init();

    run(&config).map_err(|e| {
        error!(error = %e, "aosd_cat failed");
        e
    })
}

fn run(config: &Config) -> Result<(), String> {
    let style = config.text_style().map_err(|e| e.to_string())?;

    let osd = Aosd::new().map_err(|e| e.to_string())?;
    osd.set_name("aosd_cat", "Aosd_cat")
        .map_err(|e| e.to_string())?;

    let mode = config.transparency_mode();
    match osd.set_transparency(mode) {
        Ok(()) => {}
        Err(AosdError::UnsupportedMode(_)) => {
            warn!(?mode, "transparency mode unavailable, using fake transparency");
            osd.set_transparency(Transparency::Fake)
                .map_err(|e| e.to_string())?;
        }
        Err(e) => return Err(e.to_string()),
    }

    let text = Arc::new(Mutex::new(TextRenderer::new(style)));
    osd.set_renderer(TextRenderer::into_renderer(Arc::clone(&text)))
        .map_err(|e| e.to_string())?;

    let mailbox = Arc::new(Mailbox::new());
    let reader = input::spawn_reader(
        ReaderOptions {
            path: config.input_path(),
            keep_reading: config.keep_reading,
            timeout: config.input_timeout(),
            max_lines: config.lines,
            max_age: config.max_age(),
        },
        Arc::clone(&mailbox),
    )
    .map_err(|e| format!("unable to open input '{}': {e}", config.input))?;

    let output = config.output_index();
    let anchor = config.anchor();
    let options = FlashOptions {
        timing: config.timing(),
        wait: true,
    };

    while let Some(joined) = mailbox.take() {
        let (width, height) = {
            let mut text = text.lock().unwrap_or_else(|e| e.into_inner());
            text.set_text(&joined);
            let wrap = match config.wrap_width() {
                Some(width) => Some(width),
                None => text
                    .screen_wrap_width(osd.screen(), output, anchor, config.x_offset)
                    .map_err(|e| e.to_string())?,
            };
            text.set_wrap_width(wrap);
            text.size()
        };
        debug!(width, height, lines = joined.lines().count(), "showing text");

        osd.set_position(output, anchor, width, height, config.x_offset, config.y_offset)
            .map_err(|e| e.to_string())?;

        // Without --wait, new input cuts the current display short.
        let ready: Option<ReadyPredicate> = if config.wait {
            None
        } else {
            let mailbox = Arc::clone(&mailbox);
            Some(Box::new(move || mailbox.has_pending()))
        };
        osd.flash(options, ready).map_err(|e| e.to_string())?;
    }

    if reader.join().is_err() {
        warn!("input reader panicked");
    }
    osd.destroy();
    Ok(())
}
