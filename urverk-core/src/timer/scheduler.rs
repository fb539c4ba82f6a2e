//! Multi-domain timer scheduler.
//!
//! Entries live in an id table; each domain has an [`IndexedMinHeap`] of ids
//! keyed by due time. Group and tag indices map names to id sets. An entry is
//! either scheduled (in its heap), paused (out of the heap, countdown frozen)
//! or gone from every structure.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{debug, trace, warn};

use super::entry::{TimerEntry, TimerHandle, TimerId, TimerLabels, TimerState};
use super::registry::CallbackRegistry;
use crate::domain::{DomainKind, Domains};
use crate::error::TimerError;
use crate::heap::IndexedMinHeap;

/// Execution budget per domain per tick.
pub const DEFAULT_MAX_EXEC_PER_TICK: usize = 50;

/// Next due time of a repeating timer, strictly after `now_ms`.
///
/// `due + k * interval` with `k = floor((now - due) / interval) + 1`, so any
/// number of missed periods collapses into one execution.
pub fn catch_up_due(due_ms: i64, interval_ms: i64, now_ms: i64) -> i64 {
    debug_assert!(interval_ms > 0);
    let behind = i128::from(now_ms) - i128::from(due_ms);
    let periods = behind.div_euclid(i128::from(interval_ms)) + 1;
    let next = i128::from(due_ms) + periods * i128::from(interval_ms);
    next.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

/// Outcome of one or more tick passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Entries that fired (callbacks that canceled their own entry excluded).
    pub executed: usize,
    /// Fired entries whose callback id was not registered.
    pub unresolved: usize,
    /// The budget ran out while due entries were still queued.
    pub deferred: bool,
}

impl TickReport {
    pub fn merge(&mut self, other: TickReport) {
        self.executed += other.executed;
        self.unresolved += other.unresolved;
        self.deferred |= other.deferred;
    }
}

#[derive(Debug)]
pub struct TimerScheduler {
    domains: Domains,
    entries: HashMap<TimerId, TimerEntry>,
    heaps: [IndexedMinHeap<TimerId>; 3],
    by_group: HashMap<String, HashSet<TimerId>>,
    by_tag: HashMap<String, HashSet<TimerId>>,
    next_id: TimerId,
    callbacks: CallbackRegistry,
}

#[inline]
fn heap_slot(domain: DomainKind) -> usize {
    match domain {
        DomainKind::Real => 0,
        DomainKind::App => 1,
        DomainKind::Gameplay => 2,
    }
}

impl TimerScheduler {
    pub fn new(domains: Domains) -> Self {
        Self::with_callbacks(domains, CallbackRegistry::new())
    }

    pub fn with_callbacks(domains: Domains, callbacks: CallbackRegistry) -> Self {
        Self {
            domains,
            entries: HashMap::new(),
            heaps: Default::default(),
            by_group: HashMap::new(),
            by_tag: HashMap::new(),
            next_id: 1,
            callbacks,
        }
    }

    // ─── Scheduling ─────────────────────────────────────────────────────────

    /// One-shot timer due `delay_ms` after the domain's current time.
    pub fn schedule_after(
        &mut self,
        domain: DomainKind,
        delay_ms: i64,
        callback_id: impl Into<String>,
        labels: TimerLabels,
    ) -> TimerHandle {
        let due_ms = self.domains.now_ms(domain).saturating_add(delay_ms);
        self.add(domain, due_ms, 0, callback_id.into(), labels)
    }

    /// Repeating timer, first due one interval from now.
    pub fn schedule_every(
        &mut self,
        domain: DomainKind,
        interval_ms: i64,
        callback_id: impl Into<String>,
        labels: TimerLabels,
    ) -> Result<TimerHandle, TimerError> {
        if interval_ms <= 0 {
            return Err(TimerError::NonPositiveInterval(interval_ms));
        }
        let due_ms = self.domains.now_ms(domain).saturating_add(interval_ms);
        Ok(self.add(domain, due_ms, interval_ms, callback_id.into(), labels))
    }

    /// One-shot Real-domain timer due at trusted epoch `epoch_ms`.
    pub fn schedule_at_absolute(
        &mut self,
        epoch_ms: i64,
        callback_id: impl Into<String>,
        labels: TimerLabels,
    ) -> TimerHandle {
        self.add(DomainKind::Real, epoch_ms, 0, callback_id.into(), labels)
    }

    fn add(
        &mut self,
        domain: DomainKind,
        due_ms: i64,
        interval_ms: i64,
        callback_id: String,
        labels: TimerLabels,
    ) -> TimerHandle {
        let id = self.next_id;
        self.next_id += 1;

        let entry = TimerEntry {
            id,
            domain,
            due_ms,
            interval_ms,
            state: TimerState::Scheduled,
            callback_id,
            group: labels.group,
            tags: labels.tags,
        };
        debug!(
            id,
            %domain,
            due_ms,
            interval_ms,
            callback = %entry.callback_id,
            "Timer scheduled"
        );

        self.index(&entry);
        self.heaps[heap_slot(domain)].push(id, due_ms);
        self.entries.insert(id, entry);
        TimerHandle::from_id(id)
    }

    // ─── Single-entry control ───────────────────────────────────────────────

    /// Removes the timer from every structure. Returns `false` for unknown or
    /// already-canceled handles.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        if !handle.is_valid() {
            return false;
        }
        match self.remove_entry(handle.id()) {
            Some(entry) => {
                debug!(id = entry.id, "Timer canceled");
                true
            }
            None => false,
        }
    }

    /// Freezes the countdown. No-op unless the timer is scheduled.
    pub fn pause(&mut self, handle: TimerHandle) -> bool {
        let id = handle.id();
        let domain = match self.entries.get(&id) {
            Some(entry) if !entry.is_paused() => entry.domain,
            _ => return false,
        };
        let now = self.domains.now_ms(domain);
        self.heaps[heap_slot(domain)].remove(id);

        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };
        let remaining_ms = entry.due_ms.saturating_sub(now).max(0);
        entry.state = TimerState::Paused { remaining_ms };
        debug!(id, remaining_ms, "Timer paused");
        true
    }

    /// Restarts a paused countdown from the domain's current time.
    pub fn resume(&mut self, handle: TimerHandle) -> bool {
        let id = handle.id();
        let (domain, remaining_ms) = match self.entries.get(&id) {
            Some(entry) => match entry.state {
                TimerState::Paused { remaining_ms } => (entry.domain, remaining_ms),
                TimerState::Scheduled => return false,
            },
            None => return false,
        };
        let due_ms = self.domains.now_ms(domain).saturating_add(remaining_ms);

        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };
        entry.due_ms = due_ms;
        entry.state = TimerState::Scheduled;
        self.heaps[heap_slot(domain)].push(id, due_ms);
        debug!(id, due_ms, "Timer resumed");
        true
    }

    // ─── Bulk operations ────────────────────────────────────────────────────

    pub fn cancel_group(&mut self, group: &str) -> usize {
        self.for_each_member(Self::group_members, group, Self::cancel)
    }

    pub fn pause_group(&mut self, group: &str) -> usize {
        self.for_each_member(Self::group_members, group, Self::pause)
    }

    pub fn resume_group(&mut self, group: &str) -> usize {
        self.for_each_member(Self::group_members, group, Self::resume)
    }

    pub fn cancel_tag(&mut self, tag: &str) -> usize {
        self.for_each_member(Self::tag_members, tag, Self::cancel)
    }

    pub fn pause_tag(&mut self, tag: &str) -> usize {
        self.for_each_member(Self::tag_members, tag, Self::pause)
    }

    pub fn resume_tag(&mut self, tag: &str) -> usize {
        self.for_each_member(Self::tag_members, tag, Self::resume)
    }

    /// Ids in `group`, ascending.
    pub fn group_members(&self, group: &str) -> Vec<TimerId> {
        Self::sorted_members(self.by_group.get(group))
    }

    /// Ids carrying `tag`, ascending.
    pub fn tag_members(&self, tag: &str) -> Vec<TimerId> {
        Self::sorted_members(self.by_tag.get(tag))
    }

    fn sorted_members(set: Option<&HashSet<TimerId>>) -> Vec<TimerId> {
        let mut ids: Vec<TimerId> = set.map(|s| s.iter().copied().collect()).unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    /// Applies `op` over a snapshot of the membership so the index may change
    /// underneath.
    fn for_each_member(
        &mut self,
        members: fn(&Self, &str) -> Vec<TimerId>,
        name: &str,
        op: fn(&mut Self, TimerHandle) -> bool,
    ) -> usize {
        if name.is_empty() {
            return 0;
        }
        members(self, name)
            .into_iter()
            .filter(|&id| op(self, TimerHandle::from_id(id)))
            .count()
    }

    // ─── Execution ──────────────────────────────────────────────────────────

    /// Fires due entries of `domain` in due-time order, at most
    /// `max_exec_per_tick` of them. Remaining due entries wait for the next
    /// call.
    pub fn tick(&mut self, domain: DomainKind, max_exec_per_tick: usize) -> TickReport {
        let slot = heap_slot(domain);
        let now = self.domains.now_ms(domain);
        let mut report = TickReport::default();

        while report.executed < max_exec_per_tick {
            match self.heaps[slot].peek() {
                Some((_, due)) if due <= now => {}
                _ => break,
            }
            let Some((id, _)) = self.heaps[slot].pop() else {
                break;
            };

            let (callback_id, due_ms) = match self.entries.get(&id) {
                Some(entry) if entry.is_paused() => {
                    trace!(id, "Skipping paused entry found in heap");
                    continue;
                }
                Some(entry) => (entry.callback_id.clone(), entry.due_ms),
                None => continue,
            };

            let handle = TimerHandle::from_id(id);
            match self.callbacks.take(&callback_id) {
                Some(mut callback) => {
                    trace!(id, callback = %callback_id, "Firing timer");
                    callback(self, handle);
                    self.callbacks.give_back(&callback_id, callback);
                }
                None => {
                    report.unresolved += 1;
                    warn!(id, %domain, callback = %callback_id, "No callback registered for timer");
                }
            }

            // The callback may have canceled its own entry.
            let Some(entry) = self.entries.get_mut(&id) else {
                continue;
            };
            report.executed += 1;

            if !entry.is_repeating() {
                self.remove_entry(id);
                continue;
            }

            let next_due = catch_up_due(due_ms, entry.interval_ms, now);
            match entry.state {
                TimerState::Paused { .. } => {
                    entry.state = TimerState::Paused {
                        remaining_ms: next_due - now,
                    };
                }
                TimerState::Scheduled => {
                    entry.due_ms = next_due;
                    let heap = &mut self.heaps[slot];
                    if !heap.update_key(id, next_due) {
                        heap.push(id, next_due);
                    }
                }
            }
        }

        report.deferred = report.executed >= max_exec_per_tick && self.heaps[slot].peek_due() <= now;
        if report.deferred {
            debug!(%domain, executed = report.executed, "Tick budget exhausted, deferring due timers");
        }
        report
    }

    /// Ticks every domain in frame order.
    pub fn tick_all(&mut self, max_exec_per_tick: usize) -> TickReport {
        let mut report = TickReport::default();
        for domain in DomainKind::TICK_ORDER {
            report.merge(self.tick(domain, max_exec_per_tick));
        }
        report
    }

    // ─── Queries ────────────────────────────────────────────────────────────

    pub fn entry(&self, handle: TimerHandle) -> Option<&TimerEntry> {
        self.entries.get(&handle.id())
    }

    pub fn state(&self, handle: TimerHandle) -> Option<TimerState> {
        self.entry(handle).map(|e| e.state)
    }

    /// Time left until the timer fires, frozen while paused.
    pub fn remaining_ms(&mut self, handle: TimerHandle) -> Option<i64> {
        let (domain, due_ms, state) = {
            let entry = self.entry(handle)?;
            (entry.domain, entry.due_ms, entry.state)
        };
        Some(match state {
            TimerState::Paused { remaining_ms } => remaining_ms,
            TimerState::Scheduled => due_ms.saturating_sub(self.domains.now_ms(domain)).max(0),
        })
    }

    /// All live entries (scheduled and paused), in no particular order.
    pub fn entries(&self) -> impl Iterator<Item = &TimerEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Scheduled (heap-resident) entries of `domain`.
    pub fn pending_in(&self, domain: DomainKind) -> usize {
        self.heaps[heap_slot(domain)].len()
    }

    pub fn next_due(&self, domain: DomainKind) -> Option<i64> {
        self.heaps[heap_slot(domain)].peek().map(|(_, due)| due)
    }

    /// Id the next scheduled timer will receive.
    pub fn next_id(&self) -> TimerId {
        self.next_id
    }

    pub fn domains(&self) -> &Domains {
        &self.domains
    }

    pub fn domains_mut(&mut self) -> &mut Domains {
        &mut self.domains
    }

    pub fn now_ms(&mut self, domain: DomainKind) -> i64 {
        self.domains.now_ms(domain)
    }

    pub fn callbacks(&self) -> &CallbackRegistry {
        &self.callbacks
    }

    pub fn callbacks_mut(&mut self) -> &mut CallbackRegistry {
        &mut self.callbacks
    }

    // ─── Restore ────────────────────────────────────────────────────────────

    /// Reinstates a persisted entry with its id, indices and (unless paused)
    /// heap position.
    pub fn restore_entry(&mut self, entry: TimerEntry) -> Result<TimerHandle, TimerError> {
        if entry.id == 0 {
            return Err(TimerError::ReservedId);
        }
        if entry.interval_ms < 0 {
            return Err(TimerError::NegativeInterval(entry.interval_ms));
        }
        if self.entries.contains_key(&entry.id) {
            return Err(TimerError::DuplicateId(entry.id));
        }

        let id = entry.id;
        self.next_id = self.next_id.max(id + 1);
        self.index(&entry);
        if !entry.is_paused() {
            self.heaps[heap_slot(entry.domain)].push(id, entry.due_ms);
        }
        self.entries.insert(id, entry);
        Ok(TimerHandle::from_id(id))
    }

    /// Raises the id counter so ids handed out before a restart stay retired.
    pub fn reserve_ids_below(&mut self, next_id: TimerId) {
        self.next_id = self.next_id.max(next_id);
    }

    // ─── Internals ──────────────────────────────────────────────────────────

    fn index(&mut self, entry: &TimerEntry) {
        if let Some(group) = entry.indexed_group() {
            self.by_group
                .entry(group.to_string())
                .or_default()
                .insert(entry.id);
        }
        for tag in entry.indexed_tags() {
            self.by_tag.entry(tag.to_string()).or_default().insert(entry.id);
        }
    }

    fn deindex(&mut self, entry: &TimerEntry) {
        if let Some(group) = entry.indexed_group() {
            Self::drop_member(&mut self.by_group, group, entry.id);
        }
        for tag in entry.indexed_tags() {
            Self::drop_member(&mut self.by_tag, tag, entry.id);
        }
    }

    fn drop_member(index: &mut HashMap<String, HashSet<TimerId>>, name: &str, id: TimerId) {
        if let Some(set) = index.get_mut(name) {
            set.remove(&id);
            if set.is_empty() {
                index.remove(name);
            }
        }
    }

    fn remove_entry(&mut self, id: TimerId) -> Option<TimerEntry> {
        let entry = self.entries.remove(&id)?;
        self.heaps[heap_slot(entry.domain)].remove(id);
        self.deindex(&entry);
        Some(entry)
    }

    /// Group names currently indexed, sorted.
    pub fn groups(&self) -> BTreeSet<&str> {
        self.by_group.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ClockSettings, TrustedClock, VirtualMonotonic, VirtualWallClock};
    use crate::storage::MemoryStore;
    use proptest::prelude::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use tracing_test::traced_test;

    const T0: i64 = 1_700_000_000_000;

    struct Rig {
        mono: VirtualMonotonic,
        scheduler: TimerScheduler,
    }

    fn rig() -> Rig {
        let mono = VirtualMonotonic::millis();
        let clock = TrustedClock::open(
            ClockSettings::default(),
            mono.clone(),
            VirtualWallClock::new(T0),
            MemoryStore::shared(),
        );
        Rig {
            mono,
            scheduler: TimerScheduler::new(Domains::new(clock)),
        }
    }

    fn counter(scheduler: &mut TimerScheduler, id: &str) -> Rc<Cell<u32>> {
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        scheduler
            .callbacks_mut()
            .register_fn(id, move || c.set(c.get() + 1));
        count
    }

    fn advance_app(scheduler: &mut TimerScheduler, ms: i64) {
        scheduler.domains_mut().app.advance_ms(ms);
    }

    #[test]
    fn test_catch_up_example() {
        assert_eq!(catch_up_due(1_000, 1_000, 5_400), 6_000);
        assert_eq!(catch_up_due(1_000, 1_000, 1_000), 2_000);
        assert_eq!(catch_up_due(1_000, 300, 1_299), 1_300);
    }

    proptest! {
        #[test]
        fn prop_catch_up_is_strictly_future_and_aligned(
            due in -1_000_000i64..1_000_000,
            interval in 1i64..100_000,
            behind in 0i64..10_000_000,
        ) {
            let now = due + behind;
            let next = catch_up_due(due, interval, now);
            prop_assert!(next > now);
            prop_assert!(next - interval <= now);
            prop_assert_eq!((next - due) % interval, 0);
        }
    }

    #[test]
    fn test_one_shot_fires_after_third_advance() {
        let Rig { mut scheduler, .. } = rig();
        let fired = counter(&mut scheduler, "app-once");
        scheduler.schedule_after(DomainKind::App, 3_000, "app-once", TimerLabels::none());

        for expected in [0, 0, 1] {
            scheduler.domains_mut().app.advance(1.0);
            scheduler.tick(DomainKind::App, DEFAULT_MAX_EXEC_PER_TICK);
            assert_eq!(fired.get(), expected);
        }
        scheduler.domains_mut().app.advance(5.0);
        scheduler.tick(DomainKind::App, DEFAULT_MAX_EXEC_PER_TICK);
        assert_eq!(fired.get(), 1);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_repeating_catch_up_counts_once() {
        let Rig { mut scheduler, .. } = rig();
        let fired = counter(&mut scheduler, "every");
        let handle = scheduler
            .schedule_every(DomainKind::Gameplay, 1_000, "every", TimerLabels::none())
            .unwrap();
        assert_eq!(scheduler.entry(handle).unwrap().due_ms, 1_000);

        scheduler.domains_mut().gameplay.advance_ms(5_400);
        let report = scheduler.tick(DomainKind::Gameplay, DEFAULT_MAX_EXEC_PER_TICK);
        assert_eq!(report.executed, 1);
        assert_eq!(fired.get(), 1);
        assert_eq!(scheduler.entry(handle).unwrap().due_ms, 6_000);
        assert_eq!(scheduler.next_due(DomainKind::Gameplay), Some(6_000));
    }

    #[test]
    fn test_schedule_every_rejects_non_positive_interval() {
        let Rig { mut scheduler, .. } = rig();
        assert_eq!(
            scheduler.schedule_every(DomainKind::App, 0, "x", TimerLabels::none()),
            Err(TimerError::NonPositiveInterval(0))
        );
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_absolute_timer_uses_real_domain() {
        let Rig { mono, mut scheduler } = rig();
        let fired = counter(&mut scheduler, "abs");
        let handle = scheduler.schedule_at_absolute(T0 + 10_000, "abs", TimerLabels::none());
        assert_eq!(scheduler.entry(handle).unwrap().domain, DomainKind::Real);

        mono.advance_ms(9_999);
        scheduler.tick(DomainKind::Real, 10);
        assert_eq!(fired.get(), 0);
        mono.advance_ms(1);
        scheduler.tick(DomainKind::Real, 10);
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_ticks_in_due_order() {
        let Rig { mut scheduler, .. } = rig();
        let order = Rc::new(RefCell::new(Vec::new()));
        for (name, delay) in [("c", 300), ("a", 100), ("b", 200)] {
            let log = order.clone();
            scheduler
                .callbacks_mut()
                .register_fn(name, move || log.borrow_mut().push(name));
            scheduler.schedule_after(DomainKind::App, delay, name, TimerLabels::none());
        }
        advance_app(&mut scheduler, 1_000);
        scheduler.tick(DomainKind::App, 10);
        assert_eq!(*order.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_budget_defers_remaining_due_entries() {
        let Rig { mut scheduler, .. } = rig();
        let fired = counter(&mut scheduler, "burst");
        for _ in 0..5 {
            scheduler.schedule_after(DomainKind::App, 10, "burst", TimerLabels::none());
        }
        advance_app(&mut scheduler, 10);

        let first = scheduler.tick(DomainKind::App, 3);
        assert_eq!(first.executed, 3);
        assert!(first.deferred);
        let second = scheduler.tick(DomainKind::App, 3);
        assert_eq!(second.executed, 2);
        assert!(!second.deferred);
        assert_eq!(fired.get(), 5);
    }

    #[test]
    fn test_cancel_is_idempotent_and_immediate() {
        let Rig { mut scheduler, .. } = rig();
        let fired = counter(&mut scheduler, "cb");
        let handle = scheduler.schedule_after(DomainKind::App, 10, "cb", TimerLabels::none().group("g"));
        assert!(scheduler.cancel(handle));
        assert!(!scheduler.cancel(handle));
        assert!(!scheduler.cancel(TimerHandle::INVALID));
        assert!(scheduler.group_members("g").is_empty());
        assert_eq!(scheduler.pending_in(DomainKind::App), 0);

        advance_app(&mut scheduler, 100);
        scheduler.tick(DomainKind::App, 10);
        assert_eq!(fired.get(), 0);
    }

    #[test]
    fn test_cancel_paused_entry() {
        let Rig { mut scheduler, .. } = rig();
        let handle = scheduler.schedule_after(DomainKind::App, 10, "cb", TimerLabels::none().tag("t"));
        assert!(scheduler.pause(handle));
        assert!(scheduler.cancel(handle));
        assert!(scheduler.is_empty());
        assert!(scheduler.tag_members("t").is_empty());
        assert!(!scheduler.resume(handle));
    }

    #[test]
    fn test_pause_resume_round_trip_keeps_due() {
        let Rig { mut scheduler, .. } = rig();
        advance_app(&mut scheduler, 250);
        let handle = scheduler.schedule_after(DomainKind::App, 1_000, "cb", TimerLabels::none());
        let due = scheduler.entry(handle).unwrap().due_ms;

        assert!(scheduler.pause(handle));
        assert!(!scheduler.pause(handle));
        assert_eq!(scheduler.state(handle), Some(TimerState::Paused { remaining_ms: 1_000 }));
        assert_eq!(scheduler.pending_in(DomainKind::App), 0);

        assert!(scheduler.resume(handle));
        assert!(!scheduler.resume(handle));
        assert_eq!(scheduler.entry(handle).unwrap().due_ms, due);
        assert_eq!(scheduler.pending_in(DomainKind::App), 1);
    }

    #[test]
    fn test_paused_timer_does_not_fire_and_resumes_with_remaining() {
        let Rig { mut scheduler, .. } = rig();
        let fired = counter(&mut scheduler, "cb");
        let handle = scheduler.schedule_after(DomainKind::App, 1_000, "cb", TimerLabels::none());

        advance_app(&mut scheduler, 400);
        scheduler.pause(handle);
        advance_app(&mut scheduler, 10_000);
        scheduler.tick(DomainKind::App, 10);
        assert_eq!(fired.get(), 0);
        assert_eq!(scheduler.remaining_ms(handle), Some(600));

        scheduler.resume(handle);
        advance_app(&mut scheduler, 599);
        scheduler.tick(DomainKind::App, 10);
        assert_eq!(fired.get(), 0);
        advance_app(&mut scheduler, 1);
        scheduler.tick(DomainKind::App, 10);
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_cancel_group_spans_domains() {
        let Rig { mono, mut scheduler } = rig();
        let fired = counter(&mut scheduler, "cb");
        let tests = TimerLabels::none().group("Tests");
        scheduler.schedule_after(DomainKind::App, 100, "cb", tests.clone());
        scheduler
            .schedule_every(DomainKind::Gameplay, 100, "cb", tests.clone())
            .unwrap();
        scheduler.schedule_at_absolute(T0 + 100, "cb", tests);
        let keep = scheduler.schedule_after(DomainKind::App, 100, "cb", TimerLabels::none().group("Other"));

        assert_eq!(scheduler.cancel_group("Tests"), 3);
        assert_eq!(scheduler.len(), 1);
        assert!(scheduler.group_members("Tests").is_empty());
        assert!(!scheduler.groups().contains("Tests"));

        advance_app(&mut scheduler, 1_000);
        scheduler.domains_mut().gameplay.advance_ms(1_000);
        mono.advance_ms(1_000);
        scheduler.tick_all(10);
        assert_eq!(fired.get(), 1);
        assert!(scheduler.entry(keep).is_none());
    }

    #[test]
    fn test_pause_and_resume_by_tag() {
        let Rig { mut scheduler, .. } = rig();
        let fired = counter(&mut scheduler, "cb");
        let a = scheduler.schedule_after(DomainKind::App, 100, "cb", TimerLabels::none().tags(["UI", "Gameplay"]));
        let b = scheduler.schedule_after(DomainKind::App, 100, "cb", TimerLabels::none().tag("UI"));
        let c = scheduler.schedule_after(DomainKind::App, 100, "cb", TimerLabels::none());

        assert_eq!(scheduler.pause_tag("UI"), 2);
        assert_eq!(scheduler.pause_tag("UI"), 0);
        advance_app(&mut scheduler, 500);
        scheduler.tick(DomainKind::App, 10);
        assert_eq!(fired.get(), 1);
        assert!(scheduler.entry(c).is_none());

        assert_eq!(scheduler.resume_tag("Gameplay"), 1);
        assert!(!scheduler.entry(a).unwrap().is_paused());
        assert!(scheduler.entry(b).unwrap().is_paused());
        assert_eq!(scheduler.pause_tag(""), 0);
    }

    #[test]
    fn test_callback_cancels_itself() {
        let Rig { mut scheduler, .. } = rig();
        let fired = Rc::new(Cell::new(0));
        let f = fired.clone();
        scheduler
            .callbacks_mut()
            .register("self-cancel", move |s: &mut TimerScheduler, h: TimerHandle| {
                f.set(f.get() + 1);
                s.cancel(h);
            });
        let handle = scheduler
            .schedule_every(DomainKind::App, 100, "self-cancel", TimerLabels::none().group("g"))
            .unwrap();

        advance_app(&mut scheduler, 100);
        let report = scheduler.tick(DomainKind::App, 10);
        assert_eq!(report.executed, 0);
        assert_eq!(fired.get(), 1);
        assert!(scheduler.entry(handle).is_none());
        assert!(scheduler.group_members("g").is_empty());

        advance_app(&mut scheduler, 1_000);
        scheduler.tick(DomainKind::App, 10);
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_callback_unregistering_itself_stays_unregistered() {
        let Rig { mut scheduler, .. } = rig();
        let fired = Rc::new(Cell::new(0));
        let f = fired.clone();
        scheduler
            .callbacks_mut()
            .register("once-only", move |s: &mut TimerScheduler, _: TimerHandle| {
                f.set(f.get() + 1);
                s.callbacks_mut().unregister("once-only");
            });
        scheduler
            .schedule_every(DomainKind::App, 100, "once-only", TimerLabels::none())
            .unwrap();

        advance_app(&mut scheduler, 100);
        let first = scheduler.tick(DomainKind::App, 10);
        assert_eq!((first.executed, first.unresolved), (1, 0));
        assert!(!scheduler.callbacks().contains("once-only"));

        advance_app(&mut scheduler, 100);
        let second = scheduler.tick(DomainKind::App, 10);
        assert_eq!((second.executed, second.unresolved), (1, 1));
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_callback_pauses_repeating_self() {
        let Rig { mut scheduler, .. } = rig();
        scheduler
            .callbacks_mut()
            .register("pause-self", |s: &mut TimerScheduler, h: TimerHandle| {
                s.pause(h);
            });
        let handle = scheduler
            .schedule_every(DomainKind::App, 1_000, "pause-self", TimerLabels::none())
            .unwrap();
        advance_app(&mut scheduler, 1_200);
        scheduler.tick(DomainKind::App, 10);
        assert_eq!(
            scheduler.state(handle),
            Some(TimerState::Paused { remaining_ms: 800 })
        );
        assert_eq!(scheduler.pending_in(DomainKind::App), 0);
    }

    #[test]
    fn test_callback_schedules_follow_up() {
        let Rig { mut scheduler, .. } = rig();
        let fired = counter(&mut scheduler, "second");
        scheduler
            .callbacks_mut()
            .register("first", |s: &mut TimerScheduler, _: TimerHandle| {
                s.schedule_after(DomainKind::App, 50, "second", TimerLabels::none());
            });
        scheduler.schedule_after(DomainKind::App, 50, "first", TimerLabels::none());

        advance_app(&mut scheduler, 50);
        scheduler.tick(DomainKind::App, 10);
        assert_eq!(fired.get(), 0);
        advance_app(&mut scheduler, 50);
        scheduler.tick(DomainKind::App, 10);
        assert_eq!(fired.get(), 1);
    }

    #[traced_test]
    #[test]
    fn test_unresolved_callback_is_reported() {
        let Rig { mut scheduler, .. } = rig();
        scheduler.schedule_after(DomainKind::App, 0, "missing", TimerLabels::none());
        let report = scheduler.tick(DomainKind::App, 10);
        assert_eq!(report.executed, 1);
        assert_eq!(report.unresolved, 1);
        assert!(scheduler.is_empty());
        assert!(logs_contain("No callback registered for timer"));
    }

    #[test]
    fn test_ids_are_never_reused() {
        let Rig { mut scheduler, .. } = rig();
        let a = scheduler.schedule_after(DomainKind::App, 0, "cb", TimerLabels::none());
        scheduler.cancel(a);
        let b = scheduler.schedule_after(DomainKind::App, 0, "cb", TimerLabels::none());
        assert!(b.id() > a.id());
    }

    #[test]
    fn test_restore_entry_rebuilds_indices() {
        let Rig { mut scheduler, .. } = rig();
        let paused = TimerEntry {
            id: 7,
            domain: DomainKind::Gameplay,
            due_ms: 0,
            interval_ms: 0,
            state: TimerState::Paused { remaining_ms: 300 },
            callback_id: "cb".into(),
            group: Some("Tests".into()),
            tags: ["UI".to_string()].into_iter().collect(),
        };
        let scheduled = TimerEntry {
            id: 3,
            state: TimerState::Scheduled,
            due_ms: 900,
            ..paused.clone()
        };

        scheduler.restore_entry(paused.clone()).unwrap();
        scheduler.restore_entry(scheduled).unwrap();
        assert_eq!(
            scheduler.restore_entry(paused),
            Err(TimerError::DuplicateId(7))
        );
        assert_eq!(scheduler.next_id(), 8);
        assert_eq!(scheduler.group_members("Tests"), vec![3, 7]);
        assert_eq!(scheduler.tag_members("UI"), vec![3, 7]);
        assert_eq!(scheduler.pending_in(DomainKind::Gameplay), 1);
        assert_eq!(scheduler.next_due(DomainKind::Gameplay), Some(900));
    }

    #[test]
    fn test_restore_rejects_invalid_records() {
        let Rig { mut scheduler, .. } = rig();
        let entry = TimerEntry {
            id: 0,
            domain: DomainKind::App,
            due_ms: 0,
            interval_ms: 0,
            state: TimerState::Scheduled,
            callback_id: "cb".into(),
            group: None,
            tags: BTreeSet::new(),
        };
        assert_eq!(scheduler.restore_entry(entry.clone()), Err(TimerError::ReservedId));
        assert_eq!(
            scheduler.restore_entry(TimerEntry {
                id: 1,
                interval_ms: -5,
                ..entry
            }),
            Err(TimerError::NegativeInterval(-5))
        );
    }
}
