//! The recursive split tree.
//!
//! A leaf holds exactly one pane; an inner node holds children whose axis
//! alternates with its parent's. Splitting a leaf whose parent already runs
//! along the requested axis inserts a sibling; otherwise the leaf itself
//! becomes an inner node with two leaves. Same-axis nesting therefore never
//! occurs.
//!
//! Layout partitions an area equally among children, with the last child
//! absorbing the remainder; the one-cell separators between children belong
//! to neither side.

use pat_render::{Area, FrameBuffer, Position, Style, draw_horizontal_line, draw_vertical_line};

use crate::{Overlay, Pane, PaneCtx, PaneId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitAxis {
    Vertical,
    Horizontal,
}

pub enum Split {
    Leaf(Box<dyn Pane>),
    /// Children side by side, separated by vertical lines.
    Vertical(Vec<Split>),
    /// Children stacked, separated by horizontal lines.
    Horizontal(Vec<Split>),
}

impl Split {
    pub fn leaf(pane: Box<dyn Pane>) -> Self {
        Split::Leaf(pane)
    }

    /// Leaf pane ids in left-to-right, top-to-bottom order.
    pub fn leaf_ids(&self, out: &mut Vec<PaneId>) {
        match self {
            Split::Leaf(pane) => out.push(pane.id()),
            Split::Vertical(children) | Split::Horizontal(children) => {
                for child in children {
                    child.leaf_ids(out);
                }
            }
        }
    }

    pub fn find_pane(&self, id: PaneId) -> Option<&dyn Pane> {
        match self {
            Split::Leaf(pane) => (pane.id() == id).then_some(pane.as_ref()),
            Split::Vertical(children) | Split::Horizontal(children) => {
                children.iter().find_map(|child| child.find_pane(id))
            }
        }
    }

    pub fn find_pane_mut(&mut self, id: PaneId) -> Option<&mut Box<dyn Pane>> {
        match self {
            Split::Leaf(pane) => (pane.id() == id).then_some(pane),
            Split::Vertical(children) | Split::Horizontal(children) => {
                children.iter_mut().find_map(|child| child.find_pane_mut(id))
            }
        }
    }

    /// Swap the pane at `id` for another one, keeping the tree shape.
    /// Returns the replaced pane when found.
    pub fn replace_pane(&mut self, id: PaneId, new_pane: Box<dyn Pane>) -> Option<Box<dyn Pane>> {
        self.replace_inner(id, new_pane).ok()
    }

    // Ok(old pane) on success; Err carries the new pane back out when the
    // target is not in this subtree.
    fn replace_inner(
        &mut self,
        id: PaneId,
        new_pane: Box<dyn Pane>,
    ) -> Result<Box<dyn Pane>, Box<dyn Pane>> {
        match self {
            Split::Leaf(pane) => {
                if pane.id() == id {
                    Ok(std::mem::replace(pane, new_pane))
                } else {
                    Err(new_pane)
                }
            }
            Split::Vertical(children) | Split::Horizontal(children) => {
                let mut pending = new_pane;
                for child in children {
                    match child.replace_inner(id, pending) {
                        Ok(old) => return Ok(old),
                        Err(back) => pending = back,
                    }
                }
                Err(pending)
            }
        }
    }

    /// Split the leaf holding `id` along `axis`, inserting `new_pane` after
    /// it. A leaf whose parent already runs along `axis` gains a sibling
    /// (flattening); otherwise the leaf becomes an inner node. Returns true
    /// when the leaf was found.
    pub fn split_pane(&mut self, id: PaneId, axis: SplitAxis, new_pane: Box<dyn Pane>) -> bool {
        self.split_inner(id, axis, new_pane).is_none()
    }

    // Turn this leaf into an inner node along `axis` with the new pane as
    // its second child.
    fn grow_inner_node(&mut self, axis: SplitAxis, new_pane: Box<dyn Pane>) {
        let old = std::mem::replace(self, Split::Vertical(Vec::new()));
        let Split::Leaf(old_pane) = old else {
            unreachable!("grow_inner_node is only called on leaves");
        };
        let children = vec![Split::Leaf(old_pane), Split::Leaf(new_pane)];
        *self = match axis {
            SplitAxis::Vertical => Split::Vertical(children),
            SplitAxis::Horizontal => Split::Horizontal(children),
        };
    }

    // Carries the new pane down the tree; hands it back when the target
    // leaf is not in this subtree.
    fn split_inner(
        &mut self,
        id: PaneId,
        axis: SplitAxis,
        new_pane: Box<dyn Pane>,
    ) -> Option<Box<dyn Pane>> {
        let (own_axis, children) = match self {
            Split::Leaf(pane) => {
                if pane.id() == id {
                    // A root-level leaf has no parent to flatten into.
                    self.grow_inner_node(axis, new_pane);
                    return None;
                }
                return Some(new_pane);
            }
            Split::Vertical(children) => (SplitAxis::Vertical, children),
            Split::Horizontal(children) => (SplitAxis::Horizontal, children),
        };

        let mut pending = new_pane;
        for i in 0..children.len() {
            let is_target_leaf = matches!(&children[i], Split::Leaf(pane) if pane.id() == id);
            if is_target_leaf {
                if own_axis == axis {
                    // Same-axis split flattens into a sibling.
                    children.insert(i + 1, Split::Leaf(pending));
                } else {
                    children[i].grow_inner_node(axis, pending);
                }
                return None;
            }
            match children[i].split_inner(id, axis, pending) {
                None => return None,
                Some(back) => pending = back,
            }
        }
        Some(pending)
    }

    /// Remove the leaf holding `id`, collapsing single-child inner nodes.
    /// Refuses to remove the last remaining leaf.
    pub fn close_pane(&mut self, id: PaneId) -> bool {
        match self {
            Split::Leaf(_) => false,
            Split::Vertical(children) | Split::Horizontal(children) => {
                let before = children.len();
                children.retain(|child| !matches!(child, Split::Leaf(pane) if pane.id() == id));
                let mut removed = children.len() != before;
                if !removed {
                    for child in children.iter_mut() {
                        if child.close_pane(id) {
                            removed = true;
                            break;
                        }
                    }
                }
                children.retain(|child| {
                    !matches!(child, Split::Vertical(c) | Split::Horizontal(c) if c.is_empty())
                });
                if children.len() == 1 {
                    let only = children.pop().expect("one child");
                    *self = only;
                }
                removed
            }
        }
    }

    /// Recursive draw: partition the area among children and draw one-cell
    /// separators between them.
    pub fn draw(
        &mut self,
        buff: &mut FrameBuffer,
        pos: Position,
        area: Area,
        ctx: &PaneCtx,
        active: PaneId,
        separator: &Style,
        overlays: &mut Vec<Overlay>,
    ) {
        match self {
            Split::Leaf(pane) => {
                let ctx = PaneCtx {
                    focused: ctx.focused && pane.id() == active,
                    ..*ctx
                };
                pane.draw(buff, pos, area, &ctx, overlays);
            }
            Split::Vertical(children) => {
                let count = children.len();
                if count == 0 {
                    return;
                }
                let avail = area.width.saturating_sub(count - 1);
                let each = avail / count;
                let mut x = pos.x;
                for (i, child) in children.iter_mut().enumerate() {
                    let width = if i == count - 1 {
                        avail - each * (count - 1)
                    } else {
                        each
                    };
                    child.draw(
                        buff,
                        Position::new(x, pos.y),
                        Area::new(width, area.height),
                        ctx,
                        active,
                        separator,
                        overlays,
                    );
                    x += width as i32;
                    if i != count - 1 {
                        draw_vertical_line(
                            buff,
                            Position::new(x, pos.y),
                            area.height,
                            separator,
                            &pat_render::Icons::default(),
                        );
                        x += 1;
                    }
                }
            }
            Split::Horizontal(children) => {
                let count = children.len();
                if count == 0 {
                    return;
                }
                let avail = area.height.saturating_sub(count - 1);
                let each = avail / count;
                let mut y = pos.y;
                for (i, child) in children.iter_mut().enumerate() {
                    let height = if i == count - 1 {
                        avail - each * (count - 1)
                    } else {
                        each
                    };
                    child.draw(
                        buff,
                        Position::new(pos.x, y),
                        Area::new(area.width, height),
                        ctx,
                        active,
                        separator,
                        overlays,
                    );
                    y += height as i32;
                    if i != count - 1 {
                        draw_horizontal_line(
                            buff,
                            Position::new(pos.x, y),
                            area.width,
                            separator,
                            &pat_render::Icons::default(),
                        );
                        y += 1;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Overlay, UiCommand};
    use pat_events::Event;
    use pat_keymap::KeyActor;

    type PaintLog = std::rc::Rc<std::cell::RefCell<Vec<(PaneId, Position, Area)>>>;

    struct MockPane {
        id: PaneId,
        log: Option<PaintLog>,
    }

    impl MockPane {
        fn boxed() -> Box<dyn Pane> {
            Box::new(Self {
                id: PaneId::next(),
                log: None,
            })
        }

        fn logged(log: &PaintLog) -> Box<dyn Pane> {
            Box::new(Self {
                id: PaneId::next(),
                log: Some(log.clone()),
            })
        }
    }

    impl KeyActor for MockPane {
        fn actor_class(&self) -> &'static str {
            "mock"
        }
        fn mode(&self) -> &str {
            "*"
        }
        fn invoke(&mut self, _action: &str) -> bool {
            false
        }
    }

    impl Pane for MockPane {
        fn id(&self) -> PaneId {
            self.id
        }
        fn handle_event(&mut self, _event: &Event, _ctx: &PaneCtx) -> bool {
            false
        }
        fn draw(
            &mut self,
            _buff: &mut FrameBuffer,
            pos: Position,
            area: Area,
            _ctx: &PaneCtx,
            _overlays: &mut Vec<Overlay>,
        ) {
            if let Some(log) = &self.log {
                log.borrow_mut().push((self.id, pos, area));
            }
        }
        fn take_commands(&mut self) -> Vec<UiCommand> {
            Vec::new()
        }
    }

    fn leaf_count(split: &Split) -> usize {
        let mut ids = Vec::new();
        split.leaf_ids(&mut ids);
        ids.len()
    }

    #[test]
    fn same_axis_split_flattens() {
        let first = MockPane::boxed();
        let first_id = first.id();
        let mut root = Split::leaf(first);

        let second = MockPane::boxed();
        let second_id = second.id();
        assert!(root.split_pane(first_id, SplitAxis::Vertical, second));
        // Splitting again along the same axis inserts a sibling instead of
        // nesting another vertical inside a vertical.
        let third = MockPane::boxed();
        assert!(root.split_pane(second_id, SplitAxis::Vertical, third));

        match &root {
            Split::Vertical(children) => {
                assert_eq!(children.len(), 3);
                assert!(children.iter().all(|c| matches!(c, Split::Leaf(_))));
            }
            _ => panic!("expected a flat vertical split"),
        }
    }

    #[test]
    fn cross_axis_split_nests() {
        let first = MockPane::boxed();
        let first_id = first.id();
        let mut root = Split::leaf(first);

        assert!(root.split_pane(first_id, SplitAxis::Vertical, MockPane::boxed()));
        assert!(root.split_pane(first_id, SplitAxis::Horizontal, MockPane::boxed()));

        match &root {
            Split::Vertical(children) => {
                assert!(matches!(children[0], Split::Horizontal(_)));
                assert!(matches!(children[1], Split::Leaf(_)));
            }
            _ => panic!("expected vertical root"),
        }
        assert_eq!(leaf_count(&root), 3);
    }

    #[test]
    fn close_collapses_single_child_nodes() {
        let first = MockPane::boxed();
        let first_id = first.id();
        let mut root = Split::leaf(first);
        let second = MockPane::boxed();
        let second_id = second.id();
        assert!(root.split_pane(first_id, SplitAxis::Vertical, second));

        assert!(root.close_pane(second_id));
        assert!(matches!(root, Split::Leaf(_)));
        assert_eq!(leaf_count(&root), 1);
    }

    #[test]
    fn layout_partitions_equally_with_separators() {
        let log: PaintLog = Default::default();
        let first = MockPane::logged(&log);
        let first_id = first.id();
        let mut root = Split::leaf(first);
        let second = MockPane::logged(&log);
        let second_id = second.id();
        let third = MockPane::logged(&log);
        assert!(root.split_pane(first_id, SplitAxis::Vertical, second));
        assert!(root.split_pane(second_id, SplitAxis::Vertical, third));

        let theme = pat_render::Theme::default_dark();
        let config = pat_config::Config::default();
        let icons = pat_render::Icons::default();
        let ctx = PaneCtx {
            theme: &theme,
            config: &config,
            icons: &icons,
            focused: true,
            now_ms: 0,
        };
        let mut fb = FrameBuffer::new(80, 24);
        let mut overlays = Vec::new();
        root.draw(
            &mut fb,
            Position::new(0, 0),
            Area::new(80, 24),
            &ctx,
            first_id,
            &Style::default(),
            &mut overlays,
        );

        // 80 columns minus two one-cell separators leaves 78: 26 each, with
        // the children starting one past each separator.
        let recorded = log.borrow();
        let geometry: Vec<(Position, Area)> =
            recorded.iter().map(|(_, pos, area)| (*pos, *area)).collect();
        assert_eq!(
            geometry,
            vec![
                (Position::new(0, 0), Area::new(26, 24)),
                (Position::new(27, 0), Area::new(26, 24)),
                (Position::new(54, 0), Area::new(26, 24)),
            ]
        );
    }
}
