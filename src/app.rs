use log::*;
use sdl3::EventPump;
use sdl3::event::{Event, WindowEvent};
use sdl3::keyboard::Keycode;

use crate::renderer::{Renderer, RendererError};

/// Host-side flags driven by window events
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AppState {
    pub quit: bool,
    pub minimized: bool,
    /// set on size changes, cleared once handed to the renderer
    pub resized: bool,
}

impl AppState {
    pub fn handle_event(&mut self, event: &Event) {
        match event {
            Event::Quit { .. }
            | Event::KeyDown {
                keycode: Some(Keycode::Escape),
                ..
            } => {
                self.quit = true;
            }

            Event::Window { win_event, .. } => match win_event {
                WindowEvent::Resized(..) | WindowEvent::PixelSizeChanged(..) => {
                    self.resized = true;
                }
                WindowEvent::Minimized => {
                    debug!("minimized");
                    self.minimized = true;
                }
                WindowEvent::Restored | WindowEvent::Maximized => {
                    if self.minimized {
                        debug!("restored");
                        self.resized = true;
                    }
                    self.minimized = false;
                }
                _ => {}
            },

            _ => {}
        }
    }
}

pub struct App {
    pub state: AppState,
    pub renderer: Renderer,
}

impl App {
    pub fn new(renderer: Renderer) -> Self {
        Self {
            state: AppState::default(),
            renderer,
        }
    }

    pub fn handle_events(&mut self, event_pump: &mut EventPump) {
        for event in event_pump.poll_iter() {
            self.state.handle_event(&event);
            if self.state.quit {
                return;
            }
        }
    }

    /// Forwards a pending resize, then draws unless minimized
    pub fn frame(&mut self) -> Result<(), RendererError> {
        if std::mem::take(&mut self.state.resized) {
            self.renderer.flag_resize();
        }

        if self.state.minimized {
            return Ok(());
        }

        self.renderer.draw_frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_event(win_event: WindowEvent) -> Event {
        Event::Window {
            timestamp: 0,
            window_id: 1,
            win_event,
        }
    }

    #[test]
    fn quit_and_escape_stop_the_loop() {
        let mut state = AppState::default();
        state.handle_event(&Event::Quit { timestamp: 0 });
        assert!(state.quit);
    }

    #[test]
    fn size_changes_request_a_resize() {
        let mut state = AppState::default();
        state.handle_event(&window_event(WindowEvent::PixelSizeChanged(1024, 768)));
        assert!(state.resized);
        assert!(!state.minimized);
    }

    #[test]
    fn minimize_then_restore_requests_a_resize() {
        let mut state = AppState::default();

        state.handle_event(&window_event(WindowEvent::Minimized));
        assert!(state.minimized);
        assert!(!state.resized);

        state.handle_event(&window_event(WindowEvent::Restored));
        assert!(!state.minimized);
        assert!(state.resized);
    }

    #[test]
    fn unrelated_events_change_nothing() {
        let mut state = AppState::default();
        state.handle_event(&window_event(WindowEvent::FocusGained));
        assert_eq!(state, AppState::default());
    }
}
