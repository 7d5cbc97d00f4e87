use std::{path::PathBuf, thread, time::Duration};

use anyhow::Context;
use handsign::config::Config;
use handsign::gui::{self, Event};
use handsign::image::Image;
use handsign::pipeline::Pipeline;
use handsign::render::{MAIN_WINDOW, MASK_WINDOW};
use handsign::timer::FpsCounter;
use handsign::video::webcam::{Webcam, WebcamOptions};
use handsign::video::{FrameSource, Stills};

fn main() {
    handsign::init_logger!();
    handsign::run(app);
}

/// Opens the image files named on the command line, or the webcam if there are none.
fn open_source(config: &Config) -> anyhow::Result<Box<dyn FrameSource>> {
    let paths = std::env::args_os().skip(1).map(PathBuf::from).collect::<Vec<_>>();
    if !paths.is_empty() {
        let stills = Stills::load(&paths)?;
        log::info!("recognizing {} still images", stills.remaining());
        return Ok(Box::new(stills));
    }

    let mut options = WebcamOptions::default().jpeg_backend(config.jpeg_backend());
    if let Some(name) = config.webcam_name() {
        options = options.name(name);
    }
    Ok(Box::new(Webcam::open(options)?))
}

/// Handles pending window events, returning `true` when the user asked to quit.
fn quit_requested() -> bool {
    while let Some(event) = gui::poll_event() {
        match event {
            Event::KeyPressed('q') => return true,
            Event::WindowClosed(title) if title == MAIN_WINDOW => return true,
            _ => {}
        }
    }
    false
}

fn app() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    log::debug!("{:?}", config);

    let mut pipeline = Pipeline::from_config(&config)?;
    let mut source = open_source(&config)?;

    let mut fps = FpsCounter::new("handsign");
    loop {
        let Some(mut frame) = source.read_frame().context("failed to capture frame")? else {
            break;
        };
        let signs = pipeline.process_frame(&mut frame)?;

        for sign in &signs {
            gui::show_image(MASK_WINDOW, &Image::from_luma8(&sign.mask))?;
        }
        gui::show_image(MAIN_WINDOW, &frame)?;

        if quit_requested() {
            return Ok(());
        }

        fps.tick_with(source.timers().into_iter().chain(pipeline.timers()));
    }

    // Keep the last result on screen until the user closes it.
    log::info!("no more frames, press q to quit");
    while !quit_requested() {
        thread::sleep(Duration::from_millis(20));
    }
    Ok(())
}
