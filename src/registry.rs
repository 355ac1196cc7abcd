//! Identity mapping from native CPU-state handles to their owning wrappers.
//!
//! The engine invokes trampolines with nothing but a [`CoreId`] and an
//! address, so the bridge needs a way back to the wrapper that owns the
//! hooks. Every live wrapper is recorded here exactly once, immediately
//! after construction and before any callback can fire for its handle, and
//! unregistered when it is dropped.
//!
//! The mapping is weak on both sides: slots hold `Weak` references and are
//! generation-checked, so a stale id can never resolve to a recycled slot.
//! Storage is thread-local, matching the single-threaded cooperative model
//! of the host environment.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::mpu::{Mpu, MpuInner};

/// Handle identity of one native CPU-state object. This is the only thing
/// the engine carries into a trampoline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreId {
    slot: u32,
    generation: u32,
}

impl CoreId {
    /// Sentinel for a core that has not been recorded yet. Resolving it is
    /// an invariant violation, which is exactly what should happen if a
    /// callback fires before registration.
    pub(crate) const UNBOUND: CoreId = CoreId {
        slot: u32::MAX,
        generation: 0,
    };
}

struct Slot {
    generation: u32,
    wrapper: Option<Weak<MpuInner>>,
}

#[derive(Default)]
struct RegistryState {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

thread_local! {
    static REGISTRY: RefCell<RegistryState> = RefCell::new(RegistryState::default());
}

/// Records a freshly built wrapper and returns the id its engine core will
/// hand to trampolines. Must run exactly once per wrapper.
pub(crate) fn record(wrapper: &Rc<MpuInner>) -> CoreId {
    REGISTRY.with(|registry| {
        let mut registry = registry.borrow_mut();
        let weak = Rc::downgrade(wrapper);
        if let Some(slot) = registry.free.pop() {
            let entry = &mut registry.slots[slot as usize];
            entry.wrapper = Some(weak);
            CoreId {
                slot,
                generation: entry.generation,
            }
        } else {
            let slot = registry.slots.len() as u32;
            registry.slots.push(Slot {
                generation: 0,
                wrapper: Some(weak),
            });
            CoreId { slot, generation: 0 }
        }
    })
}

/// Resolves a handle back to its owning wrapper.
///
/// Panics if the handle was never recorded or its wrapper is gone: the
/// engine only dispatches for cores it was handed by a live wrapper, so a
/// failed resolution means the bijection was broken somewhere.
pub(crate) fn resolve(id: CoreId) -> Mpu {
    REGISTRY.with(|registry| {
        let registry = registry.borrow();
        let entry = registry
            .slots
            .get(id.slot as usize)
            .filter(|entry| entry.generation == id.generation);
        let inner = entry
            .and_then(|entry| entry.wrapper.as_ref())
            .and_then(Weak::upgrade)
            .unwrap_or_else(|| panic!("dispatch fired for unrecorded MPU handle {id:?}"));
        Mpu::from_inner(inner)
    })
}

/// Removes a wrapper's entry and retires its generation so stale ids can
/// never alias a recycled slot.
pub(crate) fn unregister(id: CoreId) {
    if id == CoreId::UNBOUND {
        return;
    }
    REGISTRY.with(|registry| {
        let mut registry = registry.borrow_mut();
        if let Some(entry) = registry.slots.get_mut(id.slot as usize) {
            if entry.generation == id.generation {
                entry.wrapper = None;
                entry.generation = entry.generation.wrapping_add(1);
                registry.free.push(id.slot);
            }
        }
    })
}
