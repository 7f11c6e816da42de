/// Tile grid assembly
///
/// The grid holds one list head per tile, row-major. Its lists are views over
/// the per-surface tile elements produced by `stile`: assembly relinks those
/// elements rather than copying them. Surfaces sharing a transform group are
/// gathered under one synthetic group element per tile so the backend looks
/// up that transform once per tile.
use super::element::{ElemRef, Element, ElementStore, GroupLink, Payload};
use super::list_builder::filter;
use crate::count_call;
use crate::perf::FUNCTION_COUNTERS;
use crate::scene::{GroupTag, NodeId, Registry};

#[derive(Debug, Clone)]
pub struct TileGrid {
    rows: usize,
    cols: usize,
    heads: Vec<Option<ElemRef>>,
    leaves: Vec<NodeId>,
}

impl TileGrid {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            heads: vec![None; rows * cols],
            leaves: Vec::new(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn clear(&mut self) {
        self.heads.fill(None);
    }

    #[inline]
    pub fn head(&self, row: usize, col: usize) -> Option<ElemRef> {
        self.heads[row * self.cols + col]
    }

    /// All tile heads of one row
    pub fn row(&self, row: usize) -> &[Option<ElemRef>] {
        &self.heads[row * self.cols..(row + 1) * self.cols]
    }

    /// Point every tile at the same list (tiling disabled)
    pub fn fill(&mut self, head: Option<ElemRef>) {
        self.heads.fill(head);
    }

    /// Merge each surface's tile elements into the grid.
    ///
    /// `camera_surfaces` is the flattened, ordered camera list; tiles end up in
    /// the same relative order. `tiles_of` returns a surface's tile list.
    pub fn assemble<S, F>(
        &mut self,
        store: &mut S,
        registry: &Registry,
        camera_surfaces: Option<ElemRef>,
        tiles_of: F,
    ) where
        S: ElementStore,
        F: Fn(NodeId) -> Option<ElemRef>,
    {
        count_call!(FUNCTION_COUNTERS.grid_assemblies);
        self.clear();

        self.leaves.clear();
        self.leaves.extend(store.iter_list(camera_surfaces).filter_map(|(_, e)| match e.payload {
            Payload::Surface { node, .. } => Some(node),
            _ => None,
        }));

        // Head insertion reverses, so walk the surfaces back to front
        for i in (0..self.leaves.len()).rev() {
            let surface = self.leaves[i];
            let group = registry[surface].transform_group;
            let mut cur = tiles_of(surface);

            while let Some(r) = cur {
                let (next, coord) = {
                    let elem = store.element_mut(r);
                    (elem.next, elem.tile.take())
                };
                cur = next;
                let Some(coord) = coord else {
                    continue;
                };
                let idx = coord.row as usize * self.cols + coord.col as usize;

                match group {
                    None => {
                        store.element_mut(r).next = self.heads[idx];
                        self.heads[idx] = Some(r);
                    }
                    Some(g) => {
                        let holder = self.group_holder(store, idx, g);
                        let inner = match store.element(holder).payload {
                            Payload::Group {
                                link: GroupLink::Nested { head },
                                ..
                            } => head,
                            _ => None,
                        };
                        store.element_mut(r).next = inner;
                        if let Payload::Group { link, .. } = &mut store.element_mut(holder).payload {
                            *link = GroupLink::Nested { head: Some(r) };
                        }
                    }
                }
            }
        }

        for idx in 0..self.heads.len() {
            filter(store, self.heads[idx]);
        }
    }

    /// Transform-group element at the head of tile `idx`, created if the head
    /// belongs to something else
    fn group_holder<S: ElementStore>(&mut self, store: &mut S, idx: usize, group: NodeId) -> ElemRef {
        if let Some(h) = self.heads[idx] {
            if matches!(
                store.element(h).payload,
                Payload::Group { node, tag: GroupTag::Transform, link: GroupLink::Nested { .. } } if node == group
            ) {
                return h;
            }
        }
        let mut elem = Element::new(Payload::Group {
            node: group,
            tag: GroupTag::Transform,
            link: GroupLink::Nested { head: None },
        });
        elem.next = self.heads[idx];
        let h = store.alloc(elem);
        self.heads[idx] = Some(h);
        h
    }
}
