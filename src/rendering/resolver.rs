/// Incremental order resolver
///
/// Keeps one level of a candidate list in a consistent partial order as
/// elements arrive. A new element is linked at the head of its level and then
/// settled:
///
/// 1. advance: it moves past successors it is not strictly ordered with
/// 2. tail search: cached strict links from it form a chain that stays put
/// 3. comb: each later strict run is compared with the new element through
///    its last member only; runs that are not ordered after it are spliced
///    in front of it as a whole, keeping their cached internal orders
/// 4. the chain tail's cached order is repaired if a splice left it stale
///
/// Each element caches its relation to its successor in `order`. Those values
/// are only valid for the requester the list is being built for.
use super::element::{ElemRef, ElementStore};
use super::order::Order;
use crate::scene::NodeId;

/// Work done by one `settle` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettleStats {
    pub comparisons: u32,
    pub swaps: u32,
    pub splices: u32,
}

impl std::ops::AddAssign for SettleStats {
    fn add_assign(&mut self, rhs: Self) {
        self.comparisons += rhs.comparisons;
        self.swaps += rhs.swaps;
        self.splices += rhs.splices;
    }
}

/// Link `r` as the new head of a level
pub fn push_front<S: ElementStore>(store: &mut S, head: &mut Option<ElemRef>, r: ElemRef) {
    let old = head.replace(r);
    let elem = store.element_mut(r);
    elem.next = old;
    elem.prev = None;
    if let Some(old) = old {
        store.element_mut(old).prev = Some(r);
    }
}

/// Move the freshly pushed head element `e` to its place in the level.
///
/// Ordering holds across runs joined by strict results. An `Unorderable`
/// neighbour stops the comb, so two elements on either side of it are never
/// compared and may stay in `Swap` order.
pub fn settle<S, F>(store: &mut S, head: &mut Option<ElemRef>, e: ElemRef, compare: F) -> SettleStats
where
    S: ElementStore,
    F: FnMut(NodeId, NodeId) -> Order,
{
    let mut resolver = Resolver {
        store,
        head,
        compare,
        stats: SettleStats::default(),
    };
    resolver.run(e);
    resolver.stats
}

struct Resolver<'a, S, F> {
    store: &'a mut S,
    head: &'a mut Option<ElemRef>,
    compare: F,
    stats: SettleStats,
}

impl<S, F> Resolver<'_, S, F>
where
    S: ElementStore,
    F: FnMut(NodeId, NodeId) -> Order,
{
    #[inline]
    fn next(&self, r: ElemRef) -> Option<ElemRef> {
        self.store.element(r).next
    }

    #[inline]
    fn prev(&self, r: ElemRef) -> Option<ElemRef> {
        self.store.element(r).prev
    }

    #[inline]
    fn order(&self, r: ElemRef) -> Option<Order> {
        self.store.element(r).order
    }

    #[inline]
    fn set_order(&mut self, r: ElemRef, order: Option<Order>) {
        self.store.element_mut(r).order = order;
    }

    #[inline]
    fn set_next(&mut self, r: ElemRef, next: Option<ElemRef>) {
        self.store.element_mut(r).next = next;
    }

    #[inline]
    fn set_prev(&mut self, r: ElemRef, prev: Option<ElemRef>) {
        self.store.element_mut(r).prev = prev;
    }

    fn cmp(&mut self, a: ElemRef, b: ElemRef) -> Order {
        self.stats.comparisons += 1;
        let na = self.store.element(a).payload.node();
        let nb = self.store.element(b).payload.node();
        (self.compare)(na, nb)
    }

    /// Point `p`'s forward link (or the level head) at `r`
    fn relink_from(&mut self, p: Option<ElemRef>, r: Option<ElemRef>) {
        match p {
            Some(p) => self.set_next(p, r),
            None => *self.head = r,
        }
    }

    /// Last element of the strict run starting at `r`
    fn run_end(&self, mut r: ElemRef) -> ElemRef {
        while let (Some(order), Some(next)) = (self.order(r), self.next(r)) {
            if !order.is_strict() {
                break;
            }
            r = next;
        }
        r
    }

    fn run(&mut self, e: ElemRef) {
        self.advance(e);

        let mut tail = self.run_end(e);
        let mut stale = false;

        while let Some(first) = self.next(tail) {
            let last = self.run_end(first);
            let result = self.cmp(e, last);

            if result.is_strict() || self.run_has_strict(e, first, last) {
                if stale {
                    self.repair(tail);
                    stale = false;
                }
                tail = last;
            } else {
                self.splice_before(first, last, e);
                self.set_order(last, Some(result.inverse()));
                if let Some(p) = self.prev(first) {
                    let fresh = self.cmp(p, first);
                    self.set_order(p, Some(fresh));
                }
                stale = true;
                self.stats.splices += 1;
            }
        }

        if stale {
            self.repair(tail);
        }
    }

    /// Move `e` forward past every successor it is not strictly ordered with
    fn advance(&mut self, e: ElemRef) {
        // Relation of e's current predecessor to e's current successor
        let mut pending: Option<Order> = None;

        loop {
            let Some(n) = self.next(e) else {
                self.set_order(e, None);
                return;
            };
            let result = self.cmp(e, n);
            if result.is_strict() {
                self.set_order(e, Some(result));
                return;
            }

            let p = self.prev(e);
            if let Some(p) = p {
                self.set_order(p, pending);
            }
            pending = self.order(n);

            // p -> e -> n -> x  becomes  p -> n -> e -> x
            let x = self.next(n);
            self.relink_from(p, Some(n));
            self.set_prev(n, p);
            self.set_next(n, Some(e));
            self.set_prev(e, Some(n));
            self.set_next(e, x);
            if let Some(x) = x {
                self.set_prev(x, Some(e));
            }
            self.set_order(n, Some(result.inverse()));
            self.stats.swaps += 1;
        }
    }

    /// Backward rescan of a run whose last member may precede `e`
    fn run_has_strict(&mut self, e: ElemRef, first: ElemRef, last: ElemRef) -> bool {
        let mut x = last;
        while x != first {
            let Some(p) = self.prev(x) else {
                break;
            };
            x = p;
            if self.cmp(e, x).is_strict() {
                return true;
            }
        }
        false
    }

    /// Detach `first..=last` and relink it directly in front of `e`
    fn splice_before(&mut self, first: ElemRef, last: ElemRef, e: ElemRef) {
        let before = self.prev(first);
        let after = self.next(last);
        self.relink_from(before, after);
        if let Some(a) = after {
            self.set_prev(a, before);
        }

        let p = self.prev(e);
        self.relink_from(p, Some(first));
        self.set_prev(first, p);
        self.set_next(last, Some(e));
        self.set_prev(e, Some(last));
    }

    fn repair(&mut self, r: ElemRef) {
        let order = match self.next(r) {
            Some(n) => Some(self.cmp(r, n)),
            None => None,
        };
        self.set_order(r, order);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::element::{Element, ElementSource, FrameArena, Payload};
    use crate::scene::DescriptorId;

    fn leaf(arena: &mut FrameArena, n: u32) -> ElemRef {
        arena.alloc(Element::new(Payload::Surface {
            node: NodeId(n),
            descriptor: DescriptorId(n),
        }))
    }

    fn nodes(arena: &FrameArena, head: Option<ElemRef>) -> Vec<u32> {
        arena.iter_list(head).map(|(_, e)| e.payload.node().0).collect()
    }

    fn insert_all(arrivals: &[u32], mut compare: impl FnMut(NodeId, NodeId) -> Order) -> (Vec<u32>, SettleStats) {
        let mut arena = FrameArena::new(0, 64);
        let mut head = None;
        let mut stats = SettleStats::default();
        for &n in arrivals {
            let r = leaf(&mut arena, n);
            push_front(&mut arena, &mut head, r);
            stats += settle(&mut arena, &mut head, r, &mut compare);
        }
        (nodes(&arena, head), stats)
    }

    fn by_value(a: NodeId, b: NodeId) -> Order {
        if a.0 < b.0 {
            Order::Before
        } else {
            Order::Swap
        }
    }

    #[test]
    fn test_total_order_sorts() {
        let (order, _) = insert_all(&[3, 1, 4, 0, 2], by_value);
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_neutral_keeps_arrival_order() {
        let (order, stats) = insert_all(&[5, 2, 9, 1], |_, _| Order::Neutral);
        assert_eq!(order, vec![5, 2, 9, 1]);
        assert_eq!(stats.splices, 0);
    }

    #[test]
    fn test_layers_stable_within_layer() {
        // Tens digit is the layer; same layer compares neutral
        let layered = |a: NodeId, b: NodeId| match (a.0 / 10).cmp(&(b.0 / 10)) {
            std::cmp::Ordering::Less => Order::Before,
            std::cmp::Ordering::Greater => Order::Swap,
            std::cmp::Ordering::Equal => Order::Neutral,
        };
        let (order, _) = insert_all(&[11, 1, 12, 2], layered);
        assert_eq!(order, vec![1, 2, 11, 12]);
    }

    #[test]
    fn test_front_arrivals_cost_one_comparison() {
        let arrivals: Vec<u32> = (0..32).rev().collect();
        let (order, stats) = insert_all(&arrivals, by_value);
        assert_eq!(order, (0..32).collect::<Vec<_>>());
        assert_eq!(stats.comparisons, 31);
        assert_eq!(stats.swaps, 0);
    }

    #[test]
    fn test_comb_splices_unordered_run() {
        // List [e, a, b]: e before a, a/b neutral, b belongs in front of e
        let mut arena = FrameArena::new(0, 8);
        let (e, a, b) = (leaf(&mut arena, 0), leaf(&mut arena, 1), leaf(&mut arena, 2));
        let mut head = None;
        push_front(&mut arena, &mut head, b);
        push_front(&mut arena, &mut head, a);
        arena.element_mut(a).order = Some(Order::Neutral);
        push_front(&mut arena, &mut head, e);

        let stats = settle(&mut arena, &mut head, e, |x, y| match (x.0, y.0) {
            (0, 1) => Order::Before,
            (0, 2) => Order::Swap,
            _ => Order::Neutral,
        });

        assert_eq!(nodes(&arena, head), vec![2, 0, 1]);
        assert_eq!(stats.splices, 1);
        assert_eq!(arena.element(b).order, Some(Order::Before));
        assert_eq!(arena.element(e).order, Some(Order::Before));
        assert_eq!(arena.element(a).order, None);
        assert_eq!(arena.element(e).prev(), Some(b));
    }

    #[test]
    fn test_strict_member_keeps_run_behind() {
        // Run [a, b] with a before b; e before a, so b stays behind too
        let mut arena = FrameArena::new(0, 8);
        let (e, c, a, b) = (
            leaf(&mut arena, 0),
            leaf(&mut arena, 3),
            leaf(&mut arena, 1),
            leaf(&mut arena, 2),
        );
        let mut head = None;
        push_front(&mut arena, &mut head, b);
        push_front(&mut arena, &mut head, a);
        arena.element_mut(a).order = Some(Order::Before);
        push_front(&mut arena, &mut head, c);
        arena.element_mut(c).order = Some(Order::Neutral);
        push_front(&mut arena, &mut head, e);

        let stats = settle(&mut arena, &mut head, e, |x, y| match (x.0, y.0) {
            (0, 3) => Order::Before,
            (0, 1) => Order::Before,
            _ => Order::Neutral,
        });

        assert_eq!(nodes(&arena, head), vec![0, 3, 1, 2]);
        assert_eq!(stats.splices, 0);
    }
}
