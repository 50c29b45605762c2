//! The window: one active tab plus an optional popup pane, and the top of
//! the event-bubbling chain.
//!
//! While a popup is open it sees every event first and the tab none; the
//! window's own bindings (popup toggles, pane cycling, splits) get a shot
//! at whatever the focused child declines.

use std::sync::Arc;

use tracing::debug;

use pat_events::Event;
use pat_keymap::{Consumed, KeyActor, KeyTree};
use pat_render::{Area, FrameBuffer, Position};

use crate::finder::{FilesFinder, LiveGrepFinder};
use crate::{EventHandler, FindPane, Overlay, Pane, PaneCtx, SplitAxis, Tab, UiCommand};

/// Window-level actions, queued by name from the key tree and applied after
/// dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WindowAction {
    OpenFilesFinder,
    OpenGrepFinder,
    ClosePopup,
    NextPane,
    SplitVertical,
    SplitHorizontal,
    ClosePane,
    Quit,
}

/// The window's key-actor half, separated so the cursor can borrow it while
/// the window owns both.
struct WindowState {
    pending: Vec<WindowAction>,
}

impl KeyActor for WindowState {
    fn actor_class(&self) -> &'static str {
        "window"
    }

    fn mode(&self) -> &str {
        "*"
    }

    fn invoke(&mut self, action: &str) -> bool {
        let action = match action {
            "finder.files" => WindowAction::OpenFilesFinder,
            "finder.grep" => WindowAction::OpenGrepFinder,
            "popup.close" => WindowAction::ClosePopup,
            "pane.next" => WindowAction::NextPane,
            "split.vertical" => WindowAction::SplitVertical,
            "split.horizontal" => WindowAction::SplitHorizontal,
            "pane.close" => WindowAction::ClosePane,
            "editor.quit" => WindowAction::Quit,
            unknown => {
                debug!(target: "ui.window", action = unknown, "unknown window action");
                return false;
            }
        };
        self.pending.push(action);
        true
    }
}

pub struct Window {
    keytree: Arc<KeyTree>,
    handler: EventHandler,
    state: WindowState,
    tab: Tab,
    popup: Option<Box<dyn Pane>>,
    commands: Vec<UiCommand>,
}

impl Window {
    pub fn new(keytree: Arc<KeyTree>, initial: Box<dyn Pane>) -> Self {
        Self {
            handler: EventHandler::new(keytree.clone()),
            keytree,
            state: WindowState {
                pending: Vec::new(),
            },
            tab: Tab::new(initial),
            popup: None,
            commands: Vec::new(),
        }
    }

    pub fn tab(&self) -> &Tab {
        &self.tab
    }

    pub fn tab_mut(&mut self) -> &mut Tab {
        &mut self.tab
    }

    pub fn has_popup(&self) -> bool {
        self.popup.is_some()
    }

    pub fn close_popup(&mut self) {
        self.popup = None;
    }

    /// Replace the active pane's content; used when the editor opens a file
    /// into the current view.
    pub fn replace_active_pane(&mut self, pane: Box<dyn Pane>) {
        self.tab.replace_active(pane);
    }

    /// Full event dispatch: popup first, else the active tab pane, then the
    /// window's own bindings, then the abort-combo swallow.
    pub fn handle_event(&mut self, event: &Event, ctx: &PaneCtx) -> bool {
        let consumed = if let Some(popup) = &mut self.popup {
            if popup.handle_event(event, ctx) {
                self.handler.reset();
                self.apply_pending(ctx);
                return true;
            }
            false
        } else {
            let child = self.tab.handle_event(event, ctx);
            if child {
                self.handler.reset();
            }
            child
        };
        if consumed {
            self.apply_pending(ctx);
            return true;
        }

        let outcome = self.handler.consume_event(&mut self.state, event);
        self.apply_pending(ctx);
        match outcome {
            Consumed::Pass => {
                if self.handler.is_mid_combination() {
                    self.handler.reset();
                    true
                } else {
                    false
                }
            }
            _ => true,
        }
    }

    /// Whether any live handler is waiting out a disambiguation window.
    pub fn has_held_binding(&self) -> bool {
        if self.handler.is_held() {
            return true;
        }
        if let Some(popup) = &self.popup {
            return popup.has_held_binding();
        }
        // The active tab pane; immutable traversal is not available on the
        // split tree, so consult it through the tab.
        self.tab.active_pane_held()
    }

    /// Held-binding disambiguation tick for every live handler.
    pub fn on_key_timeout(&mut self, ctx: &PaneCtx) -> bool {
        let mut fired = self.handler.on_timeout(&mut self.state);
        if let Some(popup) = &mut self.popup {
            fired |= popup.on_key_timeout();
        } else if let Some(pane) = self.tab.active_pane_mut() {
            fired |= pane.on_key_timeout();
        }
        self.apply_pending(ctx);
        fired
    }

    pub fn update(&mut self, ctx: &PaneCtx) -> bool {
        let mut redraw = self.tab.update(&PaneCtx {
            focused: self.popup.is_none(),
            ..*ctx
        });
        if let Some(popup) = &mut self.popup {
            redraw |= popup.update(ctx);
        }
        redraw
    }

    pub fn take_commands(&mut self) -> Vec<UiCommand> {
        let mut commands = std::mem::take(&mut self.commands);
        commands.extend(self.tab.take_commands());
        if let Some(popup) = &mut self.popup {
            commands.extend(popup.take_commands());
        }
        commands
    }

    fn apply_pending(&mut self, _ctx: &PaneCtx) {
        let pending = std::mem::take(&mut self.state.pending);
        for action in pending {
            match action {
                WindowAction::OpenFilesFinder => {
                    self.popup = Some(Box::new(FindPane::new(
                        self.keytree.clone(),
                        Box::new(FilesFinder::new()),
                    )));
                }
                WindowAction::OpenGrepFinder => {
                    self.popup = Some(Box::new(FindPane::new(
                        self.keytree.clone(),
                        Box::new(LiveGrepFinder::new()),
                    )));
                }
                WindowAction::ClosePopup => {
                    self.popup = None;
                }
                WindowAction::NextPane => {
                    self.tab.next_pane();
                }
                WindowAction::SplitVertical | WindowAction::SplitHorizontal => {
                    let axis = if action == WindowAction::SplitVertical {
                        SplitAxis::Vertical
                    } else {
                        SplitAxis::Horizontal
                    };
                    if let Some(pane) = self.tab.active_pane_mut()
                        && let Some(copy) = pane.duplicate()
                    {
                        self.tab.split_active(axis, copy);
                    }
                }
                WindowAction::ClosePane => {
                    self.tab.close_active();
                }
                WindowAction::Quit => {
                    self.commands.push(UiCommand::Quit);
                }
            }
        }
    }

    /// Compose the frame: tab, then popup, then any overlays the panes
    /// pushed (completion menus float above everything).
    pub fn draw(&mut self, buff: &mut FrameBuffer, ctx: &PaneCtx) {
        let area = Area::new(buff.width(), buff.height());
        buff.fill(&ctx.theme.get("ui.text"));

        let separator = ctx.theme.get("ui.separator");
        let mut overlays: Vec<Overlay> = Vec::new();
        self.tab.draw(
            buff,
            Position::new(0, 0),
            area,
            &PaneCtx {
                focused: self.popup.is_none(),
                ..*ctx
            },
            &separator,
            &mut overlays,
        );

        if let Some(popup) = &mut self.popup {
            let width = area.width.saturating_sub(8).min(90).max(20);
            let height = area.height.saturating_sub(4).min(24).max(5);
            let pos = Position::new(
                ((area.width.saturating_sub(width)) / 2) as i32,
                ((area.height.saturating_sub(height)) / 2) as i32,
            );
            popup.draw(
                buff,
                pos,
                Area::new(width, height),
                &PaneCtx { focused: true, ..*ctx },
                &mut overlays,
            );
        }

        for overlay in overlays {
            buff.compose(&overlay.buffer, overlay.at);
        }
    }
}
