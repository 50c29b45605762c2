//! The finder popup pane: a query line over a result list.

use std::sync::Arc;

use pat_events::Event;
use pat_keymap::{Consumed, KeyActor, KeyTree};
use pat_render::{
    Area, FrameBuffer, Position, draw_rectangle_line, draw_text_line,
};

use crate::{EventHandler, Finder, FinderBackend, Overlay, Pane, PaneCtx, PaneId, UiCommand};

struct FindState {
    finder: Finder,
    input: String,
    cursor: usize,
    selected: usize,
    view_start: usize,
    commands: Vec<UiCommand>,
}

impl FindState {
    fn item_count(&self) -> usize {
        self.finder
            .with_items(!self.input.is_empty(), |items| items.len())
    }

    fn requery(&mut self) {
        let query = self.input.clone();
        self.finder.set_query(&query);
        self.selected = 0;
        self.view_start = 0;
    }

    fn clamp_selection(&mut self) {
        let count = self.item_count();
        if count == 0 {
            self.selected = 0;
        } else if self.selected >= count {
            self.selected = count - 1;
        }
    }
}

impl KeyActor for FindState {
    fn actor_class(&self) -> &'static str {
        "finder"
    }

    fn mode(&self) -> &str {
        "*"
    }

    fn invoke(&mut self, action: &str) -> bool {
        match action {
            "finder.next" => {
                let count = self.item_count();
                if count > 0 {
                    self.selected = (self.selected + 1) % count;
                }
            }
            "finder.prev" => {
                let count = self.item_count();
                if count > 0 {
                    self.selected = (self.selected + count - 1) % count;
                }
            }
            "finder.accept" => {
                let line = self.finder.with_items(!self.input.is_empty(), |items| {
                    items.get(self.selected).cloned()
                });
                if let Some(line) = line
                    && let Some(command) = self.finder.select(&line)
                {
                    self.commands.push(command);
                }
            }
            "finder.backspace" => {
                if self.cursor > 0 {
                    let prev = self.input[..self.cursor]
                        .char_indices()
                        .next_back()
                        .map(|(i, _)| i)
                        .unwrap_or(0);
                    self.input.remove(prev);
                    self.cursor = prev;
                    self.requery();
                }
            }
            "finder.left" => {
                self.cursor = self.input[..self.cursor]
                    .char_indices()
                    .next_back()
                    .map(|(i, _)| i)
                    .unwrap_or(0);
            }
            "finder.right" => {
                self.cursor = self.input[self.cursor..]
                    .chars()
                    .next()
                    .map(|c| self.cursor + c.len_utf8())
                    .unwrap_or(self.cursor);
            }
            _ => return false,
        }
        true
    }
}

pub struct FindPane {
    id: PaneId,
    handler: EventHandler,
    state: FindState,
}

impl FindPane {
    pub fn new(keytree: Arc<KeyTree>, backend: Box<dyn FinderBackend>) -> Self {
        Self {
            id: PaneId::next(),
            handler: EventHandler::new(keytree),
            state: FindState {
                finder: Finder::new(backend),
                input: String::new(),
                cursor: 0,
                selected: 0,
                view_start: 0,
                commands: Vec::new(),
            },
        }
    }
}

impl KeyActor for FindPane {
    fn actor_class(&self) -> &'static str {
        self.state.actor_class()
    }

    fn mode(&self) -> &str {
        self.state.mode()
    }

    fn invoke(&mut self, action: &str) -> bool {
        self.state.invoke(action)
    }
}

impl Pane for FindPane {
    fn id(&self) -> PaneId {
        self.id
    }

    fn handle_event(&mut self, event: &Event, _ctx: &PaneCtx) -> bool {
        let Event::Key(key) = event else {
            return false;
        };
        match self.handler.consume(&mut self.state, *key) {
            Consumed::Pass => {}
            _ => return true,
        }
        // Default: printable characters extend the query at the cursor.
        if key.is_text()
            && let Some(ch) = char::from_u32(key.unicode)
            && !ch.is_control()
        {
            self.state.input.insert(self.state.cursor, ch);
            self.state.cursor += ch.len_utf8();
            self.state.requery();
            return true;
        }
        false
    }

    fn update(&mut self, _ctx: &PaneCtx) -> bool {
        if self.state.finder.take_changed() {
            self.state.clamp_selection();
            return true;
        }
        false
    }

    fn take_commands(&mut self) -> Vec<UiCommand> {
        std::mem::take(&mut self.state.commands)
    }

    fn on_key_timeout(&mut self) -> bool {
        self.handler.on_timeout(&mut self.state)
    }

    fn has_held_binding(&self) -> bool {
        self.handler.is_held()
    }

    fn draw(
        &mut self,
        buff: &mut FrameBuffer,
        pos: Position,
        area: Area,
        ctx: &PaneCtx,
        _overlays: &mut Vec<Overlay>,
    ) {
        if area.width < 4 || area.height < 3 {
            return;
        }
        let style = ctx.theme.get("ui.popup");
        let style_selected = style.apply(&ctx.theme.get("ui.popup.selected"));

        draw_rectangle_line(buff, pos, area, &style, ctx.icons, true);

        let inner_width = area.width - 2;
        let title = format!(" {} ", self.state.finder.title());
        draw_text_line(
            buff,
            &title,
            Position::new(pos.x + 2, pos.y),
            inner_width.saturating_sub(2),
            &style,
            ctx.icons,
            false,
            false,
        );

        // Query line with a visible caret; long queries show their tail.
        let prompt = format!("> {}", self.state.input);
        draw_text_line(
            buff,
            &prompt,
            Position::new(pos.x + 1, pos.y + 1),
            inner_width,
            &style,
            ctx.icons,
            true,
            true,
        );

        // Result list below the query; keep the selection in view.
        let list_height = area.height - 3;
        if self.state.selected < self.state.view_start {
            self.state.view_start = self.state.selected;
        } else if self.state.selected >= self.state.view_start + list_height {
            self.state.view_start = self.state.selected + 1 - list_height;
        }

        let selected = self.state.selected;
        let view_start = self.state.view_start;
        let query_active = !self.state.input.is_empty();
        let error = self.state.finder.error();

        self.state.finder.with_items(query_active, |items| {
            if let Some(error) = &error {
                draw_text_line(
                    buff,
                    error,
                    Position::new(pos.x + 1, pos.y + 2),
                    inner_width,
                    &ctx.theme.get("diagnostic.error"),
                    ctx.icons,
                    true,
                    false,
                );
                return;
            }
            for row in 0..list_height {
                let Some(item) = items.get(view_start + row) else {
                    break;
                };
                let chosen = if view_start + row == selected {
                    style_selected
                } else {
                    style
                };
                draw_text_line(
                    buff,
                    &format!(" {item}"),
                    Position::new(pos.x + 1, pos.y + 2 + row as i32),
                    inner_width,
                    &chosen,
                    ctx.icons,
                    true,
                    false,
                );
            }
        });
    }
}
