//! Native windows for displaying annotated frames and reading key presses.
//!
//! Windowing has to happen on the main thread, so [`run`] takes over the main thread for the
//! window event loop and runs the application on a background thread. The application talks to
//! the event loop through a [`GuiScreen`].

mod renderer;

use std::{
    collections::{hash_map::Entry, HashMap},
    panic::{catch_unwind, AssertUnwindSafe},
    process,
    rc::Rc,
    sync::{
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
        Mutex,
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context};
use once_cell::sync::OnceCell;
use winit::{
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopBuilder, EventLoopProxy, EventLoopWindowTarget},
    window::WindowId,
};

use crate::{
    image::{Image, Resolution},
    termination::Termination,
};

use self::renderer::{Gpu, Renderer, Window};

/// Something frames can be presented on and key presses read from.
pub trait Screen {
    /// Displays `image` in the window titled `title`, opening the window if necessary.
    fn show(&mut self, title: &str, image: &Image) -> anyhow::Result<()>;

    /// Waits up to `timeout` for a key press.
    fn wait_key(&mut self, timeout: Duration) -> Option<char>;

    /// Closes every open window.
    fn close_all(&mut self);
}

impl<S: Screen + ?Sized> Screen for &mut S {
    fn show(&mut self, title: &str, image: &Image) -> anyhow::Result<()> {
        (**self).show(title, image)
    }

    fn wait_key(&mut self, timeout: Duration) -> Option<char> {
        (**self).wait_key(timeout)
    }

    fn close_all(&mut self) {
        (**self).close_all()
    }
}

struct Gui {
    gpu: Rc<Gpu>,
    windows: HashMap<String, Renderer>,
    win_id_to_key: HashMap<WindowId, String>,
    keys: Sender<KeyPress>,
    /// Number of `CloseAll` messages handled so far.
    generation: u64,
}

impl Gui {
    fn new(keys: Sender<KeyPress>) -> anyhow::Result<Self> {
        Ok(Self {
            gpu: Rc::new(pollster::block_on(Gpu::open())?),
            windows: HashMap::new(),
            win_id_to_key: HashMap::new(),
            keys,
            generation: 0,
        })
    }

    fn renderer_mut(&mut self, win: WindowId) -> Option<&mut Renderer> {
        let key = self.win_id_to_key.get(&win)?;
        self.windows.get_mut(key)
    }

    fn show(
        &mut self,
        target: &EventLoopWindowTarget<Msg>,
        key: String,
        res: Resolution,
        data: &[u8],
    ) -> anyhow::Result<()> {
        let renderer = match self.windows.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                log::debug!("creating window '{}' at {res}", entry.key());

                let win = Window::open(target, entry.key(), res)?;
                let win_id = win.win.id();
                let renderer = Renderer::new(win, self.gpu.clone())?;
                self.win_id_to_key.insert(win_id, entry.key().clone());
                entry.insert(renderer)
            }
        };

        renderer.update_texture(res, data);
        renderer.window().request_redraw();
        Ok(())
    }

    fn run(mut self, event_loop: EventLoop<Msg>) -> ! {
        event_loop.run(move |event, target, flow| {
            *flow = ControlFlow::Wait;
            match event {
                Event::UserEvent(Msg::Image { key, res, data }) => {
                    if let Err(e) = self.show(target, key, res, &data) {
                        log::error!("failed to display image: {e:#}");
                    }
                }
                Event::UserEvent(Msg::CloseAll) => {
                    log::debug!("closing {} window(s)", self.windows.len());
                    self.windows.clear();
                    self.win_id_to_key.clear();
                    self.generation += 1;
                }
                Event::WindowEvent {
                    window_id,
                    event: WindowEvent::ReceivedCharacter(ch),
                } => {
                    if self.win_id_to_key.contains_key(&window_id) {
                        let press = KeyPress {
                            generation: self.generation,
                            ch,
                        };
                        // Nobody might be listening anymore.
                        self.keys.send(press).ok();
                    }
                }
                Event::RedrawRequested(window) => {
                    if let Some(renderer) = self.renderer_mut(window) {
                        if let Err(e) = renderer.redraw() {
                            log::error!("failed to redraw window: {e:#}");
                        }
                    }
                }
                _ => {}
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
    CloseAll,
}

/// A key typed into one of the windows.
#[derive(Debug, Clone, Copy)]
struct KeyPress {
    /// Generation of the window set the key was typed into.
    generation: u64,
    ch: char,
}

/// Receiving end of the key presses sent by the event loop.
///
/// Both sides count the windows closed with [`Msg::CloseAll`], so presses typed into windows that
/// have since been closed can be told apart from fresh ones and are dropped.
struct KeyQueue {
    rx: Receiver<KeyPress>,
    generation: u64,
}

impl KeyQueue {
    fn new(rx: Receiver<KeyPress>) -> Self {
        Self { rx, generation: 0 }
    }

    fn recv_timeout(&mut self, timeout: Duration) -> Result<char, RecvTimeoutError> {
        let deadline = Instant::now() + timeout;
        loop {
            let press = self
                .rx
                .recv_timeout(deadline.saturating_duration_since(Instant::now()))?;
            if press.generation == self.generation {
                return Ok(press.ch);
            }
            log::trace!("dropping {:?} typed into a closed window", press.ch);
        }
    }

    /// Must be called whenever a [`Msg::CloseAll`] is sent.
    fn windows_closed(&mut self) {
        self.generation += 1;
        while self.rx.try_recv().is_ok() {}
    }
}

/// The application side of the window event loop.
struct Display {
    proxy: Mutex<EventLoopProxy<Msg>>,
    keys: Mutex<KeyQueue>,
}

static DISPLAY: OnceCell<Display> = OnceCell::new();

fn display() -> anyhow::Result<&'static Display> {
    DISPLAY
        .get()
        .ok_or_else(|| anyhow!("GUI is not running (not called from within `gui::run`)"))
}

fn send(msg: Msg) -> anyhow::Result<()> {
    display()?
        .proxy
        .lock()
        .map_err(|_| anyhow!("display connection poisoned"))?
        .send_event(msg)
        .map_err(|_closed| anyhow!("GUI event loop has exited"))
}

/// Runs the window event loop on the calling thread and `cb` on a background thread.
///
/// Must be called from the main thread. The process exits when `cb` returns, with a status
/// derived from its return value (or 101 if it panics).
pub fn run<F, R>(cb: F) -> !
where
    F: FnOnce() -> R + Send + 'static,
    R: Termination + Send,
{
    let event_loop = EventLoopBuilder::with_user_event().build();
    let (key_tx, key_rx) = mpsc::channel();
    let display = Display {
        proxy: Mutex::new(event_loop.create_proxy()),
        keys: Mutex::new(KeyQueue::new(key_rx)),
    };
    if DISPLAY.set(display).is_err() {
        eprintln!("`gui::run` called more than once");
        process::exit(1);
    }

    thread::spawn(move || {
        let result = catch_unwind(AssertUnwindSafe(cb));
        match result {
            Ok(r) => {
                if r.is_success() {
                    process::exit(0);
                } else {
                    r.report(); // may print the error message
                    process::exit(1);
                }
            }
            Err(_payload) => {
                // The panic hook has already printed the message; exit like libstd does.
                process::exit(101);
            }
        }
    });

    match Gui::new(key_tx) {
        Ok(gui) => gui.run(event_loop),
        Err(e) => {
            log::error!("failed to initialize GUI: {e:#}");
            process::exit(1);
        }
    }
}

/// A [`Screen`] backed by the windows of the event loop started by [`run`].
pub struct GuiScreen {
    display: &'static Display,
}

impl GuiScreen {
    /// Connects to the running event loop.
    ///
    /// Fails when called outside of [`run`].
    pub fn connect() -> anyhow::Result<Self> {
        Ok(Self { display: display()? })
    }
}

impl Screen for GuiScreen {
    fn show(&mut self, title: &str, image: &Image) -> anyhow::Result<()> {
        // Image data is RGBA8 internally, so it can be uploaded as-is.
        send(Msg::Image {
            key: title.to_string(),
            res: image.resolution(),
            data: image.data().to_vec(),
        })
        .with_context(|| format!("failed to show window '{title}'"))
    }

    fn wait_key(&mut self, timeout: Duration) -> Option<char> {
        let mut keys = self.display.keys.lock().ok()?;
        match keys.recv_timeout(timeout) {
            Ok(ch) => Some(ch),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                thread::sleep(timeout);
                None
            }
        }
    }

    fn close_all(&mut self) {
        if let Err(e) = send(Msg::CloseAll) {
            log::warn!("failed to close windows: {e:#}");
        }
        match self.display.keys.lock() {
            Ok(mut keys) => keys.windows_closed(),
            Err(_) => log::warn!("key queue poisoned"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(tx: &Sender<KeyPress>, generation: u64, ch: char) {
        tx.send(KeyPress { generation, ch }).unwrap();
    }

    #[test]
    fn keys_are_delivered_in_order() {
        let (tx, rx) = mpsc::channel();
        let mut keys = KeyQueue::new(rx);
        press(&tx, 0, 'x');
        press(&tx, 0, 'q');
        assert_eq!(keys.recv_timeout(Duration::ZERO), Ok('x'));
        assert_eq!(keys.recv_timeout(Duration::ZERO), Ok('q'));
        assert_eq!(
            keys.recv_timeout(Duration::from_millis(1)),
            Err(RecvTimeoutError::Timeout)
        );
    }

    #[test]
    fn pending_keys_do_not_outlive_their_windows() {
        let (tx, rx) = mpsc::channel();
        let mut keys = KeyQueue::new(rx);

        // Typed into the calibration window but never read.
        press(&tx, 0, 'q');
        press(&tx, 0, 'c');
        keys.windows_closed();
        assert_eq!(
            keys.recv_timeout(Duration::ZERO),
            Err(RecvTimeoutError::Timeout)
        );

        // The event loop may still send presses from before it handled the close.
        press(&tx, 0, 'q');
        press(&tx, 1, 'x');
        assert_eq!(keys.recv_timeout(Duration::ZERO), Ok('x'));
    }

    #[test]
    fn disconnect_is_reported() {
        let (tx, rx) = mpsc::channel();
        let mut keys = KeyQueue::new(rx);
        press(&tx, 0, 'c');
        drop(tx);
        keys.windows_closed();
        assert_eq!(
            keys.recv_timeout(Duration::ZERO),
            Err(RecvTimeoutError::Disconnected)
        );
    }
}
