//! A tab: one split tree plus the notion of an active pane.

use pat_events::Event;
use pat_render::{Area, FrameBuffer, Position, Style};

use crate::{Overlay, Pane, PaneCtx, PaneId, Split, SplitAxis, UiCommand};

pub struct Tab {
    root: Split,
    active: PaneId,
}

impl Tab {
    pub fn new(pane: Box<dyn Pane>) -> Self {
        let active = pane.id();
        Self {
            root: Split::leaf(pane),
            active,
        }
    }

    pub fn active_pane_id(&self) -> PaneId {
        self.active
    }

    pub fn active_pane_mut(&mut self) -> Option<&mut Box<dyn Pane>> {
        self.root.find_pane_mut(self.active)
    }

    pub fn active_pane_held(&self) -> bool {
        self.root
            .find_pane(self.active)
            .is_some_and(|pane| pane.has_held_binding())
    }

    /// Cycle focus to the next leaf in left-to-right, top-to-bottom order.
    pub fn next_pane(&mut self) {
        let mut ids = Vec::new();
        self.root.leaf_ids(&mut ids);
        if ids.is_empty() {
            return;
        }
        let current = ids.iter().position(|id| *id == self.active).unwrap_or(0);
        self.active = ids[(current + 1) % ids.len()];
    }

    /// Swap the active leaf's pane for a new one.
    pub fn replace_active(&mut self, pane: Box<dyn Pane>) {
        let new_id = pane.id();
        if self.root.replace_pane(self.active, pane).is_some() {
            self.active = new_id;
        }
    }

    /// Split the active pane; the new pane becomes active.
    pub fn split_active(&mut self, axis: SplitAxis, pane: Box<dyn Pane>) {
        let new_id = pane.id();
        if self.root.split_pane(self.active, axis, pane) {
            self.active = new_id;
        }
    }

    /// Close the active pane unless it is the last one. Focus falls back to
    /// the first remaining leaf.
    pub fn close_active(&mut self) -> bool {
        let mut ids = Vec::new();
        self.root.leaf_ids(&mut ids);
        if ids.len() <= 1 {
            return false;
        }
        if self.root.close_pane(self.active) {
            let mut remaining = Vec::new();
            self.root.leaf_ids(&mut remaining);
            self.active = remaining.first().copied().unwrap_or(self.active);
            true
        } else {
            false
        }
    }

    /// Route an event to the active pane.
    pub fn handle_event(&mut self, event: &Event, ctx: &PaneCtx) -> bool {
        match self.active_pane_mut() {
            Some(pane) => pane.handle_event(event, ctx),
            None => false,
        }
    }

    pub fn update(&mut self, ctx: &PaneCtx) -> bool {
        let mut redraw = false;
        let mut ids = Vec::new();
        self.root.leaf_ids(&mut ids);
        for id in ids {
            if let Some(pane) = self.root.find_pane_mut(id) {
                let ctx = PaneCtx {
                    focused: ctx.focused && id == self.active,
                    ..*ctx
                };
                redraw |= pane.update(&ctx);
            }
        }
        redraw
    }

    pub fn take_commands(&mut self) -> Vec<UiCommand> {
        let mut commands = Vec::new();
        let mut ids = Vec::new();
        self.root.leaf_ids(&mut ids);
        for id in ids {
            if let Some(pane) = self.root.find_pane_mut(id) {
                commands.extend(pane.take_commands());
            }
        }
        commands
    }

    pub fn draw(
        &mut self,
        buff: &mut FrameBuffer,
        pos: Position,
        area: Area,
        ctx: &PaneCtx,
        separator: &Style,
        overlays: &mut Vec<Overlay>,
    ) {
        let active = self.active;
        self.root
            .draw(buff, pos, area, ctx, active, separator, overlays);
    }
}
