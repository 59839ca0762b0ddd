/// Current context - opt-in thread-local engine slot
///
/// Hosts that want the classic "one global engine" usage can park their
/// engine here and reach it from anywhere on the same thread. Nothing in
/// the core reads this; code that owns its `Engine` value never needs it,
/// and tests freely run several engines side by side.
use std::cell::RefCell;

use crate::engine::Engine;

thread_local! {
    static CURRENT: RefCell<Option<Engine>> = const { RefCell::new(None) };
}

/// Installs the engine as the thread's current context, returning the
/// previously installed one, if any.
pub fn make_current(engine: Engine) -> Option<Engine> {
    CURRENT.with(|slot| slot.borrow_mut().replace(engine))
}

/// Runs a closure against the current context. Returns None when no
/// engine is installed.
pub fn with_current<R>(f: impl FnOnce(&mut Engine) -> R) -> Option<R> {
    CURRENT.with(|slot| slot.borrow_mut().as_mut().map(f))
}

/// Removes and returns the current context
pub fn take_current() -> Option<Engine> {
    CURRENT.with(|slot| slot.borrow_mut().take())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_roundtrip() {
        assert!(take_current().is_none());
        assert!(with_current(|_| ()).is_none());

        make_current(Engine::new(16, 16, 1, 1));
        let width = with_current(|engine| engine.width());
        assert_eq!(width, Some(16));

        let previous = make_current(Engine::new(32, 32, 1, 1));
        assert_eq!(previous.map(|e| e.width()), Some(16));

        let engine = take_current().unwrap();
        assert_eq!(engine.width(), 32);
        assert!(take_current().is_none());
    }
}
