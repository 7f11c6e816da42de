/// Visibility list builder
///
/// Builds per-requester candidate lists that honor the grouping tree: a
/// candidate inside a transform or bounding-volume group is inserted into the
/// nested list of that group's element, creating the element on first use.
/// Every level is kept ordered by the resolver. `filter` then flattens the
/// nesting into one chain per slot before the lists are handed out.
use super::element::{ElemRef, Element, ElementStore, GroupLink, Payload};
use super::order::{OrderPredicate, Requester, Side, SidePredicate};
use super::resolver::{push_front, settle, SettleStats};
use crate::error::SceneError;
use crate::perf::FUNCTION_COUNTERS;
use crate::scene::{NodeId, NodeKind, Registry};
use crate::{count_add, count_call};

/// Candidate list slots carried by every surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListSlot {
    OuterLights = 0,
    OuterSurfaces = 1,
    InnerLights = 2,
    InnerSurfaces = 3,
}

impl ListSlot {
    pub const ALL: [ListSlot; 4] = [
        ListSlot::OuterLights,
        ListSlot::OuterSurfaces,
        ListSlot::InnerLights,
        ListSlot::InnerSurfaces,
    ];
}

/// Heads of a surface's four candidate lists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CandidateLists {
    heads: [Option<ElemRef>; 4],
}

impl CandidateLists {
    #[inline]
    pub fn get(&self, slot: ListSlot) -> Option<ElemRef> {
        self.heads[slot as usize]
    }

    #[inline]
    pub fn head_mut(&mut self, slot: ListSlot) -> &mut Option<ElemRef> {
        &mut self.heads[slot as usize]
    }
}

/// Leaf payload for a surface or light node
pub fn leaf_payload(registry: &Registry, node: NodeId) -> Option<Payload> {
    match &registry[node].kind {
        NodeKind::Surface(s) => Some(Payload::Surface {
            node,
            descriptor: s.descriptor,
        }),
        NodeKind::Light(l) => Some(Payload::Light {
            node,
            descriptor: l.descriptor,
            shadows: None,
        }),
        NodeKind::Group(_) => None,
    }
}

/// List construction over one element store
pub struct ListBuilder<'a, S: ElementStore> {
    store: &'a mut S,
    registry: &'a Registry,
    order: &'a dyn OrderPredicate,
    sides: Vec<Side>,
    stats: SettleStats,
}

impl<'a, S: ElementStore> ListBuilder<'a, S> {
    pub fn new(store: &'a mut S, registry: &'a Registry, order: &'a dyn OrderPredicate) -> Self {
        Self {
            store,
            registry,
            order,
            sides: Vec::new(),
            stats: SettleStats::default(),
        }
    }

    pub fn stats(&self) -> SettleStats {
        self.stats
    }

    fn level_head(&self, owner: Option<ElemRef>, root: &Option<ElemRef>) -> Option<ElemRef> {
        match owner {
            None => *root,
            Some(g) => match self.store.element(g).payload {
                Payload::Group {
                    link: GroupLink::Nested { head },
                    ..
                } => head,
                _ => None,
            },
        }
    }

    fn set_level_head(&mut self, owner: Option<ElemRef>, root: &mut Option<ElemRef>, level: Option<ElemRef>) {
        match owner {
            None => *root = level,
            Some(g) => {
                if let Payload::Group { link, .. } = &mut self.store.element_mut(g).payload {
                    *link = GroupLink::Nested { head: level };
                }
            }
        }
    }

    /// Link `r` at the head of a level and let the resolver place it
    fn place(&mut self, requester: &Requester, level: &mut Option<ElemRef>, r: ElemRef) {
        push_front(self.store, level, r);
        let (registry, order) = (self.registry, self.order);
        let stats = settle(self.store, level, r, |a, b| order.compare(registry, requester, a, b));

        count_add!(FUNCTION_COUNTERS.order_comparisons, stats.comparisons);
        count_add!(FUNCTION_COUNTERS.order_swaps, stats.swaps);
        count_add!(FUNCTION_COUNTERS.order_splices, stats.splices);
        self.stats += stats;
    }

    /// Insert a leaf into the list at `head`, descending through the
    /// candidate's group elements outer-most first.
    pub fn insert(
        &mut self,
        requester: &Requester,
        head: &mut Option<ElemRef>,
        payload: Payload,
    ) -> Result<ElemRef, SceneError> {
        count_call!(FUNCTION_COUNTERS.insert_calls);
        let path = self.registry.group_path(payload.node(), requester.node)?;

        let mut owner: Option<ElemRef> = None;
        for &(tag, group) in path.as_slice() {
            let mut level = self.level_head(owner, head);
            let existing = self
                .store
                .iter_list(level)
                .find(|(_, e)| {
                    matches!(e.payload, Payload::Group { node, tag: t, .. } if node == group && t == tag)
                })
                .map(|(r, _)| r);

            let g = match existing {
                Some(g) => g,
                None => {
                    count_call!(FUNCTION_COUNTERS.groups_created);
                    let g = self.store.alloc(Element::new(Payload::Group {
                        node: group,
                        tag,
                        link: GroupLink::Nested { head: None },
                    }));
                    self.place(requester, &mut level, g);
                    self.set_level_head(owner, head, level);
                    g
                }
            };
            owner = Some(g);
        }

        let leaf = self.store.alloc(Element::new(payload));
        let mut level = self.level_head(owner, head);
        self.place(requester, &mut level, leaf);
        self.set_level_head(owner, head, level);
        Ok(leaf)
    }

    pub fn insert_node(
        &mut self,
        requester: &Requester,
        head: &mut Option<ElemRef>,
        node: NodeId,
    ) -> Result<ElemRef, SceneError> {
        let payload = leaf_payload(self.registry, node).ok_or(SceneError::NotALeaf(node))?;
        self.insert(requester, head, payload)
    }

    /// Fill the four candidate slots of `surface` and flatten them
    pub fn build_surface_lists(
        &mut self,
        side_predicate: &dyn SidePredicate,
        surface: NodeId,
    ) -> Result<CandidateLists, SceneError> {
        let registry = self.registry;
        let node = &registry[surface];
        let mut lists = CandidateLists::default();
        let Some(desc) = node.surface() else {
            return Ok(lists);
        };
        let two_sided = desc.two_sided;
        let planar = desc.facing.is_some();

        let aabb = node.aabb();
        let eye = if aabb.is_unbounded() || aabb.is_empty() {
            node.position()
        } else {
            aabb.center()
        };
        let requester = Requester {
            node: Some(surface),
            eye,
        };

        self.sides.clear();
        self.sides.extend(
            registry
                .surfaces()
                .iter()
                .map(|&c| side_predicate.side(registry, surface, c)),
        );

        for (i, &c) in registry.surfaces().iter().enumerate() {
            let side = self.sides[i];
            if c == surface {
                // A closed shape can see itself from inside
                if two_sided && !planar {
                    self.insert_node(&requester, lists.head_mut(ListSlot::InnerSurfaces), c)?;
                }
                continue;
            }
            if side.has_outer() {
                self.insert_node(&requester, lists.head_mut(ListSlot::OuterSurfaces), c)?;
            }
            if two_sided && side.has_inner() {
                self.insert_node(&requester, lists.head_mut(ListSlot::InnerSurfaces), c)?;
            }
        }

        for &light in registry.lights() {
            let side = side_predicate.side(registry, surface, light);
            let wanted = [
                (ListSlot::OuterLights, side.has_outer(), false),
                (ListSlot::InnerLights, two_sided && side.has_inner(), true),
            ];
            for (slot, include, inner) in wanted {
                if !include {
                    continue;
                }
                let NodeKind::Light(desc) = &registry[light].kind else {
                    continue;
                };
                let shadows = self.build_shadow_list(surface, planar, light, inner)?;
                let payload = Payload::Light {
                    node: light,
                    descriptor: desc.descriptor,
                    shadows,
                };
                self.insert(&requester, lists.head_mut(slot), payload)?;
            }
        }

        for slot in ListSlot::ALL {
            filter(self.store, lists.get(slot));
        }
        Ok(lists)
    }

    /// Surfaces that may shadow `surface` from `light`, ordered from the light
    fn build_shadow_list(
        &mut self,
        surface: NodeId,
        planar: bool,
        light: NodeId,
        inner: bool,
    ) -> Result<Option<ElemRef>, SceneError> {
        let registry = self.registry;
        let requester = Requester {
            node: Some(surface),
            eye: registry[light].position(),
        };

        let mut head = None;
        for (i, &c) in registry.surfaces().iter().enumerate() {
            let include = if c == surface {
                !planar
            } else if inner {
                self.sides[i].has_inner()
            } else {
                self.sides[i].has_outer()
            };
            if include {
                self.insert_node(&requester, &mut head, c)?;
            }
        }
        Ok(head)
    }

    /// Global surface and light lists as seen from the camera, flattened
    pub fn build_camera_lists(
        &mut self,
        eye: glam::Vec3,
    ) -> Result<(Option<ElemRef>, Option<ElemRef>), SceneError> {
        let registry = self.registry;
        let requester = Requester::camera(eye);

        let mut surfaces = None;
        for &s in registry.surfaces() {
            self.insert_node(&requester, &mut surfaces, s)?;
        }
        let mut lights = None;
        for &l in registry.lights() {
            self.insert_node(&requester, &mut lights, l)?;
        }

        filter(self.store, surfaces);
        filter(self.store, lights);
        Ok((surfaces, lights))
    }
}

/// Flatten nested group lists into one chain and clear resolver state.
///
/// Each `Nested` group element is followed inline by its members and becomes
/// a `Span` ending at its last member. Returns the last element of the
/// flattened chain. Flattening a flat list changes nothing.
pub fn filter<S: ElementStore>(store: &mut S, head: Option<ElemRef>) -> Option<ElemRef> {
    count_call!(FUNCTION_COUNTERS.filter_calls);
    let mut cur = head;
    let mut last = None;

    while let Some(r) = cur {
        let (next, payload) = {
            let elem = store.element_mut(r);
            elem.order = None;
            elem.prev = None;
            (elem.next, elem.payload)
        };

        match payload {
            Payload::Group {
                node,
                tag,
                link: GroupLink::Nested { head: inner },
            } => {
                let tail = match inner {
                    Some(inner) => {
                        store.element_mut(r).next = Some(inner);
                        let tail = filter(store, Some(inner)).unwrap_or(inner);
                        store.element_mut(tail).next = next;
                        tail
                    }
                    None => r,
                };
                store.element_mut(r).payload = Payload::Group {
                    node,
                    tag,
                    link: GroupLink::Span { last: tail },
                };
                last = Some(tail);
            }
            Payload::Light {
                shadows: Some(shadows),
                ..
            } => {
                filter(store, Some(shadows));
                last = Some(r);
            }
            _ => last = Some(r),
        }
        cur = next;
    }
    last
}
