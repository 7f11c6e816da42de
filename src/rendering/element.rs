/// Frame-scoped list elements and the arenas that own them
///
/// Every list the core produces (tile lists, candidate lists, camera lists)
/// is a chain of `Element`s addressed by `ElemRef`. Each worker allocates
/// from its own `FrameArena`; one extra arena belongs to the scene for the
/// single-threaded steps. Links may cross arenas, which is how the tile grid
/// reuses the per-surface tile elements without copying them.
use super::order::Order;
use crate::scene::{DescriptorId, GroupTag, NodeId};

/// Address of an element: arena id plus slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElemRef {
    pub arena: u16,
    pub index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub row: u16,
    pub col: u16,
}

/// Where a group's members live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupLink {
    /// Members form a separate list (while building)
    Nested { head: Option<ElemRef> },
    /// Members follow the group element inline up to and including `last`
    Span { last: ElemRef },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    Surface {
        node: NodeId,
        descriptor: DescriptorId,
    },
    Light {
        node: NodeId,
        descriptor: DescriptorId,
        /// Shadow candidates for this light, relative to the list's requester
        shadows: Option<ElemRef>,
    },
    Group {
        node: NodeId,
        tag: GroupTag,
        link: GroupLink,
    },
}

impl Payload {
    pub fn node(&self) -> NodeId {
        match *self {
            Payload::Surface { node, .. } | Payload::Light { node, .. } | Payload::Group { node, .. } => node,
        }
    }

    pub fn descriptor(&self) -> Option<DescriptorId> {
        match *self {
            Payload::Surface { descriptor, .. } | Payload::Light { descriptor, .. } => Some(descriptor),
            Payload::Group { .. } => None,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Payload::Group { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Element {
    pub next: Option<ElemRef>,
    pub(crate) prev: Option<ElemRef>,
    pub payload: Payload,
    /// Cached relation to `next`, only meaningful while a list is built
    pub order: Option<Order>,
    /// Set on tile-membership elements until they are merged into the grid
    pub tile: Option<TileCoord>,
}

impl Element {
    pub fn new(payload: Payload) -> Self {
        Self {
            next: None,
            prev: None,
            payload,
            order: None,
            tile: None,
        }
    }

    pub fn prev(&self) -> Option<ElemRef> {
        self.prev
    }
}

/// Bulk allocator for one frame's elements, reset wholesale at frame end
#[derive(Debug)]
pub struct FrameArena {
    id: u16,
    elems: Vec<Element>,
    capacity: usize,
    overrun_logged: bool,
}

impl FrameArena {
    pub fn new(id: u16, capacity: usize) -> Self {
        Self {
            id,
            elems: Vec::with_capacity(capacity),
            capacity,
            overrun_logged: false,
        }
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    pub fn alloc(&mut self, elem: Element) -> ElemRef {
        if self.elems.len() == self.capacity && !self.overrun_logged {
            log::warn!(
                "arena {} exceeded its reserved {} elements; raise arena_capacity",
                self.id,
                self.capacity
            );
            self.overrun_logged = true;
        }
        let index = self.elems.len() as u32;
        self.elems.push(elem);
        ElemRef { arena: self.id, index }
    }

    /// Drop every element; capacity is kept for the next frame
    pub fn reset(&mut self) {
        self.elems.clear();
        self.overrun_logged = false;
    }
}

/// Read access to elements
pub trait ElementSource {
    fn element(&self, r: ElemRef) -> &Element;

    fn iter_list(&self, head: Option<ElemRef>) -> ListIter<'_, Self>
    where
        Self: Sized,
    {
        ListIter { source: self, cur: head }
    }
}

/// Write access plus allocation
pub trait ElementStore: ElementSource {
    fn element_mut(&mut self, r: ElemRef) -> &mut Element;
    fn alloc(&mut self, elem: Element) -> ElemRef;
}

impl ElementSource for FrameArena {
    #[inline]
    fn element(&self, r: ElemRef) -> &Element {
        debug_assert_eq!(r.arena, self.id, "element from a foreign arena");
        &self.elems[r.index as usize]
    }
}

impl ElementStore for FrameArena {
    #[inline]
    fn element_mut(&mut self, r: ElemRef) -> &mut Element {
        debug_assert_eq!(r.arena, self.id, "element from a foreign arena");
        &mut self.elems[r.index as usize]
    }

    fn alloc(&mut self, elem: Element) -> ElemRef {
        FrameArena::alloc(self, elem)
    }
}

/// Shared view over all arenas of a scene, indexed by arena id
pub struct ArenaView<'a> {
    arenas: Vec<&'a FrameArena>,
}

impl<'a> ArenaView<'a> {
    pub fn new(arenas: impl IntoIterator<Item = &'a FrameArena>) -> Self {
        let mut arenas: Vec<_> = arenas.into_iter().collect();
        arenas.sort_by_key(|a| a.id());
        Self { arenas }
    }
}

impl ElementSource for ArenaView<'_> {
    #[inline]
    fn element(&self, r: ElemRef) -> &Element {
        self.arenas[r.arena as usize].element(r)
    }
}

/// Mutable view over all arenas; allocations go to the `home` arena
pub struct ArenaSet<'a> {
    arenas: Vec<&'a mut FrameArena>,
    home: u16,
}

impl<'a> ArenaSet<'a> {
    pub fn new(arenas: impl IntoIterator<Item = &'a mut FrameArena>, home: u16) -> Self {
        let mut arenas: Vec<_> = arenas.into_iter().collect();
        arenas.sort_by_key(|a| a.id());
        Self { arenas, home }
    }
}

impl ElementSource for ArenaSet<'_> {
    #[inline]
    fn element(&self, r: ElemRef) -> &Element {
        self.arenas[r.arena as usize].element(r)
    }
}

impl ElementStore for ArenaSet<'_> {
    #[inline]
    fn element_mut(&mut self, r: ElemRef) -> &mut Element {
        self.arenas[r.arena as usize].element_mut(r)
    }

    fn alloc(&mut self, elem: Element) -> ElemRef {
        self.arenas[self.home as usize].alloc(elem)
    }
}

/// Walks `next` links
pub struct ListIter<'a, S: ElementSource> {
    source: &'a S,
    cur: Option<ElemRef>,
}

impl<'a, S: ElementSource> Iterator for ListIter<'a, S> {
    type Item = (ElemRef, &'a Element);

    fn next(&mut self) -> Option<Self::Item> {
        let r = self.cur?;
        let elem = self.source.element(r);
        self.cur = elem.next;
        Some((r, elem))
    }
}
