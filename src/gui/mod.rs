//! A simple, high-level GUI for displaying images.
//!
//! The windowing system needs to run on the main thread, so applications are started with
//! [`run`], which moves the application code to a separate thread. The application then calls
//! [`show_image`] to display images and [`poll_event`] to learn about key presses and closed
//! windows.

mod renderer;

use std::{
    collections::{hash_map::Entry, HashMap, HashSet, VecDeque},
    panic::{catch_unwind, AssertUnwindSafe},
    process,
    rc::Rc,
    sync::{Mutex, OnceLock},
};

use anyhow::anyhow;
use winit::{
    event::{Event as WinitEvent, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopBuilder, EventLoopProxy, EventLoopWindowTarget},
    window::WindowId,
};

use crate::{
    image::{Image, Resolution},
    termination::Termination,
};

use self::renderer::{Gpu, Renderer, Window};

/// User input reported by the GUI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A character was typed while one of the windows was focused.
    KeyPressed(char),
    /// The window with the given title was closed by the user.
    WindowClosed(String),
}

struct Gui {
    gpu: Rc<Gpu>,
    windows: HashMap<String, Renderer>,
    win_id_to_key: HashMap<WindowId, String>,
    closed: HashSet<String>,
}

impl Gui {
    fn new() -> anyhow::Result<Self> {
        Ok(Self {
            gpu: Rc::new(pollster::block_on(Gpu::open())?),
            windows: HashMap::new(),
            win_id_to_key: HashMap::new(),
            closed: HashSet::new(),
        })
    }

    fn show(
        &mut self,
        target: &EventLoopWindowTarget<Msg>,
        key: String,
        res: Resolution,
        data: &[u8],
    ) -> anyhow::Result<()> {
        if self.closed.contains(&key) {
            return Ok(());
        }

        let renderer = match self.windows.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let key = entry.key();
                log::debug!("creating window for image '{key}' at {res}");
                let win = Window::open(target, key, res)?;
                self.win_id_to_key.insert(win.win.id(), key.clone());
                entry.insert(Renderer::new(win, self.gpu.clone())?)
            }
        };

        renderer.update_texture(res, data);
        renderer.window().request_redraw();
        Ok(())
    }

    fn close(&mut self, win: WindowId) {
        if let Some(key) = self.win_id_to_key.remove(&win) {
            log::debug!("window '{key}' closed");
            self.windows.remove(&key);
            self.closed.insert(key.clone());
            push_event(Event::WindowClosed(key));
        }
    }

    fn run(mut self, event_loop: EventLoop<Msg>) -> ! {
        event_loop.run(move |event, target, flow| {
            *flow = ControlFlow::Wait;
            let result = match event {
                WinitEvent::UserEvent(Msg::Image { key, res, data }) => {
                    self.show(target, key, res, &data)
                }
                WinitEvent::RedrawRequested(win) => {
                    match self
                        .win_id_to_key
                        .get(&win)
                        .and_then(|key| self.windows.get_mut(key))
                    {
                        Some(renderer) => renderer.redraw(),
                        None => Ok(()),
                    }
                }
                WinitEvent::WindowEvent { window_id, event } => {
                    match event {
                        WindowEvent::ReceivedCharacter(c) => push_event(Event::KeyPressed(c)),
                        WindowEvent::CloseRequested => self.close(window_id),
                        _ => {}
                    }
                    Ok(())
                }
                _ => Ok(()),
            };

            if let Err(e) = result {
                log::error!("GUI error: {e:#}");
                *flow = ControlFlow::ExitWithCode(1);
            }
        });
    }
}

#[derive(Debug)]
enum Msg {
    Image {
        key: String,
        res: Resolution,
        data: Vec<u8>,
    },
}

struct Display {
    proxy: Mutex<EventLoopProxy<Msg>>,
    events: Mutex<VecDeque<Event>>,
}

static DISPLAY: OnceLock<Display> = OnceLock::new();

fn display() -> anyhow::Result<&'static Display> {
    DISPLAY
        .get()
        .ok_or_else(|| anyhow!("GUI not initialized (application must be started with `gui::run`)"))
}

fn push_event(event: Event) {
    if let Some(display) = DISPLAY.get() {
        display
            .events
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .push_back(event);
    }
}

/// Starts the GUI on the calling thread and runs `cb` on a new thread.
///
/// This must be called from the main thread and never returns. Once `cb` returns, the process
/// exits with its [`Termination::exit_code`], or with 101 if it panicked.
pub fn run<F, R>(cb: F) -> !
where
    F: FnOnce() -> R + Send + 'static,
    R: Termination + Send,
{
    let event_loop = EventLoopBuilder::with_user_event().build();
    let display = Display {
        proxy: Mutex::new(event_loop.create_proxy()),
        events: Mutex::new(VecDeque::new()),
    };
    if DISPLAY.set(display).is_err() {
        panic!("`gui::run` called twice");
    }

    let gui = match Gui::new() {
        Ok(gui) => gui,
        Err(e) => {
            log::error!("failed to initialize GUI: {e:#}");
            process::exit(1);
        }
    };

    std::thread::spawn(move || {
        let code = match catch_unwind(AssertUnwindSafe(cb)) {
            Ok(result) => result.exit_code(),
            // The panic hook has already printed the message.
            Err(_) => 101,
        };
        process::exit(code);
    });

    gui.run(event_loop);
}

/// Displays an image in the window titled `key`, creating the window if needed.
///
/// Images sent to a window the user has closed are discarded.
pub fn show_image(key: impl Into<String>, image: &Image) -> anyhow::Result<()> {
    // Image data is RGBA8 internally, so it can be uploaded without conversion.
    let msg = Msg::Image {
        key: key.into(),
        res: image.resolution(),
        data: image.data().to_vec(),
    };
    display()?
        .proxy
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
        .send_event(msg)
        .map_err(|_closed| anyhow!("GUI event loop has exited"))
}

/// Returns the oldest unprocessed GUI [`Event`], if any.
pub fn poll_event() -> Option<Event> {
    DISPLAY
        .get()?
        .events
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
        .pop_front()
}
