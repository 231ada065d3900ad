//! Session registry: singleton reuse and recursion guards
//!
//! A process typically wants one enhanced session reused across repeated
//! break requests, not a fresh nested session per breakpoint hit. The
//! registry is that one slot, plus the two guards that keep re-entrancy
//! safe: a construction guard that degrades to a plain debugger instead of
//! recursing forever, and a completion flag that suppresses state teardown
//! while completion-time evaluation is in flight.
//!
//! The registry is an explicit, constructor-injectable object; embedders
//! create one and pass it to the entry points.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::plain::PlainSession;
use super::{Session, SessionBuilder, SessionRef};

/// What `acquire` handed back
pub enum Acquired {
    /// A full session (new or reused)
    Enhanced(SessionRef),
    /// Bare fallback used when construction re-entered itself
    Plain(PlainSession),
}

/// Reuse-relevant facts about the registered global session
///
/// Kept beside the session handle (in shared cells) so reuse decisions
/// never need to borrow a session that may be mid-interaction.
#[derive(Clone)]
pub struct GlobalSlot {
    pub session: SessionRef,
    pub in_interaction: Rc<Cell<bool>>,
    pub started: Rc<Cell<bool>>,
    pub disabled: Rc<Cell<bool>>,
    pub profile: String,
    /// Extra profile the slot accepts (set for nested `debug` sessions)
    pub reuse_alias: Rc<RefCell<Option<String>>>,
    /// Home-directory fingerprint taken at registration
    pub env_home: Option<String>,
    /// Registered with an explicit opt-in; reused regardless of profile
    pub force_global: bool,
}

struct RegistryInner {
    global: RefCell<Option<GlobalSlot>>,
    constructing: Cell<bool>,
    completing: Rc<Cell<bool>>,
    enabled: Cell<bool>,
}

/// Cloneable handle to the process-wide session slot
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Rc<RegistryInner>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped construction guard; cleared on every exit path
struct ConstructGuard {
    inner: Rc<RegistryInner>,
}

impl ConstructGuard {
    fn new(inner: Rc<RegistryInner>) -> Self {
        inner.constructing.set(true);
        Self { inner }
    }
}

impl Drop for ConstructGuard {
    fn drop(&mut self) {
        self.inner.constructing.set(false);
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RegistryInner {
                global: RefCell::new(None),
                constructing: Cell::new(false),
                completing: Rc::new(Cell::new(false)),
                enabled: Cell::new(true),
            }),
        }
    }

    /// Resolve a construction request into a session
    ///
    /// Reuses the registered global session when policy allows; otherwise
    /// builds a new one. If construction is already in progress on this
    /// logical thread, a bare [`PlainSession`] is returned instead, which
    /// breaks the recursion when session construction itself hits a
    /// breakpoint.
    pub fn acquire(&self, mut builder: SessionBuilder) -> Acquired {
        if self.inner.constructing.get() {
            tracing::debug!("session construction re-entered; degrading to plain debugger");
            return Acquired::Plain(PlainSession::from_builder(&mut builder));
        }
        let _guard = ConstructGuard::new(self.inner.clone());
        let profile = builder.profile_name();

        let reuse_env_ok = std::env::var("DEBUG_SHELL_REUSE_GLOBAL")
            .map(|v| v.trim() != "0")
            .unwrap_or(true);

        let slot = self.inner.global.borrow().clone();
        let use_global = match &slot {
            Some(slot) => builder
                .use_global
                .unwrap_or(!slot.in_interaction.get() && reuse_env_ok),
            None => builder.use_global.unwrap_or(true),
        };
        // Only break requests with a captured origin reuse the global
        // session; post-mortem entries always get their own.
        let for_break = builder.origin.is_some();

        if let Some(slot) = slot {
            let profile_ok = slot.force_global
                || slot.profile == profile
                || slot.reuse_alias.borrow().as_deref() == Some(profile.as_str());
            let env_ok = slot.env_home == std::env::var("HOME").ok();
            if use_global && for_break && !slot.in_interaction.get() && profile_ok && env_ok {
                tracing::debug!(profile = %profile, "reusing global session");
                let mut session = slot.session.borrow_mut();
                if slot.started.get() {
                    // Stop the active trace callback and arm a single step
                    // so the reused session stops right after the request.
                    if let Some(tracer) = session.tracer() {
                        let mut tracer = tracer.borrow_mut();
                        tracer.suspend();
                        tracer.arm_step();
                    }
                }
                if let Some(out) = builder.output.take() {
                    session.set_output(out);
                }
                drop(session);
                return Acquired::Enhanced(slot.session);
            }
            tracing::debug!(
                use_global,
                for_break,
                profile_ok,
                env_ok,
                "not reusing global session"
            );
        }

        let set_global = builder.set_global.unwrap_or(use_global);
        let force_global = builder.set_global == Some(true);
        let session = Session::from_builder(builder, self.clone());
        let slot_fields = session.slot_fields();
        let session = Rc::new(RefCell::new(session));
        if set_global {
            let (in_interaction, started, disabled, profile, reuse_alias) = slot_fields;
            *self.inner.global.borrow_mut() = Some(GlobalSlot {
                session: session.clone(),
                in_interaction,
                started,
                disabled,
                profile,
                reuse_alias,
                env_home: std::env::var("HOME").ok(),
                force_global,
            });
        }
        Acquired::Enhanced(session)
    }

    /// The registered global session, if any
    pub fn global(&self) -> Option<SessionRef> {
        self.inner.global.borrow().as_ref().map(|s| s.session.clone())
    }

    /// Swap the global slot (nested `debug` sessions save and restore it)
    pub(crate) fn swap_global(&self, slot: Option<GlobalSlot>) -> Option<GlobalSlot> {
        std::mem::replace(&mut *self.inner.global.borrow_mut(), slot)
    }

    pub(crate) fn take_global_slot(&self) -> Option<GlobalSlot> {
        self.inner.global.borrow_mut().take()
    }

    /// Shared "completion in flight" flag
    pub(crate) fn completing_flag(&self) -> Rc<Cell<bool>> {
        self.inner.completing.clone()
    }

    pub fn is_completing(&self) -> bool {
        self.inner.completing.get()
    }

    /// Whether break requests are honored at all
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.get()
    }

    /// Ignore break requests until `enable` is called
    pub fn disable(&self) {
        self.inner.enabled.set(false);
        if let Some(slot) = self.inner.global.borrow().as_ref() {
            slot.disabled.set(true);
        }
    }

    /// Honor break requests again
    pub fn enable(&self) {
        self.inner.enabled.set(true);
        if let Some(slot) = self.inner.global.borrow().as_ref() {
            slot.disabled.set(false);
        }
    }

    /// Drop the global session and clear all guards
    pub fn cleanup(&self) {
        *self.inner.global.borrow_mut() = None;
        self.inner.completing.set(false);
        self.inner.constructing.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{value, ScriptedReader, ScriptedTracer, SharedBuffer, TestFrame};
    use crate::tracer::{Resume, StopEvent, StopKind};
    use crate::Config;

    fn builder(lines: &[&str], buffer: &SharedBuffer) -> SessionBuilder {
        let config = Config {
            highlight: false,
            ..Config::default()
        };
        SessionBuilder::new()
            .config(config)
            .output(Rc::new(RefCell::new(buffer.clone())))
            .reader(Rc::new(RefCell::new(ScriptedReader::new(lines))))
    }

    fn enhanced(acquired: Acquired) -> SessionRef {
        match acquired {
            Acquired::Enhanced(session) => session,
            Acquired::Plain(_) => panic!("expected enhanced session"),
        }
    }

    fn entry_stop(kind: StopKind) -> StopEvent {
        StopEvent::new(vec![TestFrame::named("main").entry()], kind)
    }

    #[test]
    fn test_reuse_returns_same_session() {
        let registry = SessionRegistry::new();
        let buffer = SharedBuffer::new();
        let a = enhanced(registry.acquire(builder(&[], &buffer).origin("app.rs", 3)));
        let b = enhanced(registry.acquire(builder(&[], &buffer).origin("app.rs", 9)));
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_reuse_disabled_returns_distinct_sessions() {
        let registry = SessionRegistry::new();
        let buffer = SharedBuffer::new();
        let a = enhanced(registry.acquire(builder(&[], &buffer).origin("app.rs", 3)));
        let b = enhanced(
            registry.acquire(builder(&[], &buffer).origin("app.rs", 9).use_global(false)),
        );
        assert!(!Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_profile_mismatch_is_not_reused() {
        let registry = SessionRegistry::new();
        let buffer = SharedBuffer::new();
        let a = enhanced(registry.acquire(builder(&[], &buffer).origin("app.rs", 3)));
        let b = enhanced(
            registry.acquire(builder(&[], &buffer).origin("app.rs", 9).profile("pytest")),
        );
        assert!(!Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_forced_global_is_reused_across_profiles() {
        let registry = SessionRegistry::new();
        let buffer = SharedBuffer::new();
        let a = enhanced(
            registry.acquire(builder(&[], &buffer).origin("app.rs", 3).set_global(true)),
        );
        let b = enhanced(
            registry.acquire(builder(&[], &buffer).origin("app.rs", 9).profile("pytest")),
        );
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_post_mortem_requests_are_not_reused() {
        // No origin means no break request; such sessions get their own
        // instance even with a reusable global around.
        let registry = SessionRegistry::new();
        let buffer = SharedBuffer::new();
        let a = enhanced(registry.acquire(builder(&[], &buffer).origin("app.rs", 3)));
        let b = enhanced(registry.acquire(builder(&[], &buffer)));
        assert!(!Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_mid_interaction_global_is_not_reused() {
        let registry = SessionRegistry::new();
        let buffer = SharedBuffer::new();
        let a = enhanced(registry.acquire(builder(&[], &buffer).origin("app.rs", 3)));
        let (in_interaction, ..) = a.borrow().slot_fields();
        in_interaction.set(true);
        let b = enhanced(registry.acquire(builder(&[], &buffer).origin("app.rs", 9)));
        assert!(!Rc::ptr_eq(&a, &b));
        in_interaction.set(false);
    }

    #[test]
    fn test_construction_reentry_degrades_to_plain() {
        let registry = SessionRegistry::new();
        registry.inner.constructing.set(true);
        let buffer = SharedBuffer::new();
        match registry.acquire(builder(&["c"], &buffer)) {
            Acquired::Plain(_) => {}
            Acquired::Enhanced(_) => panic!("expected plain fallback"),
        }
        registry.inner.constructing.set(false);
    }

    #[test]
    fn test_plain_fallback_runs_basic_commands() {
        let registry = SessionRegistry::new();
        registry.inner.constructing.set(true);
        let buffer = SharedBuffer::new();
        let mut plain = match registry.acquire(builder(&["w", "p x", "c"], &buffer)) {
            Acquired::Plain(plain) => plain,
            Acquired::Enhanced(_) => panic!("expected plain fallback"),
        };
        registry.inner.constructing.set(false);

        let stop = StopEvent::new(
            vec![TestFrame::named("main").with_local("x", value("5")).entry()],
            StopKind::Entry,
        );
        let resume = plain.interaction(stop).unwrap();
        assert_eq!(resume, Resume::Continue);
        let output = buffer.contents();
        assert!(output.contains("plain debugger"));
        assert!(output.contains("app.rs(3)main"));
        assert!(output.contains('5'));
    }

    #[test]
    fn test_reuse_suspends_tracer_and_arms_step() {
        let registry = SessionRegistry::new();
        let buffer = SharedBuffer::new();
        let tracer = Rc::new(RefCell::new(ScriptedTracer::new(Vec::new())));
        let tracer_ref: crate::tracer::TracerRef = tracer.clone();

        let a = enhanced(registry.acquire(
            builder(&["q"], &buffer).origin("app.rs", 3).tracer(tracer_ref),
        ));
        // The session must have been active once before reuse re-arms it.
        Session::interaction(&a, entry_stop(StopKind::Entry)).unwrap();
        assert!(!tracer.borrow().suspended.get());

        let b = enhanced(registry.acquire(builder(&[], &buffer).origin("app.rs", 9)));
        assert!(Rc::ptr_eq(&a, &b));
        assert!(tracer.borrow().suspended.get());
        assert!(tracer.borrow().step_armed.get());
    }

    #[test]
    fn test_reuse_rebinds_output_stream() {
        let registry = SessionRegistry::new();
        let first = SharedBuffer::new();
        let a = enhanced(registry.acquire(builder(&["q"], &first).origin("app.rs", 3)));

        let second = SharedBuffer::new();
        let b = enhanced(registry.acquire(builder(&["q"], &second).origin("app.rs", 9)));
        assert!(Rc::ptr_eq(&a, &b));

        Session::interaction(&b, entry_stop(StopKind::Entry)).unwrap();
        assert!(first.contents().is_empty());
        assert!(second.contents().contains("app.rs(3)main"));
    }

    #[test]
    fn test_cleanup_clears_global() {
        let registry = SessionRegistry::new();
        let buffer = SharedBuffer::new();
        let _ = enhanced(registry.acquire(builder(&[], &buffer).origin("app.rs", 3)));
        assert!(registry.global().is_some());
        registry.cleanup();
        assert!(registry.global().is_none());
    }

    #[test]
    fn test_disable_blocks_break_requests() {
        let registry = SessionRegistry::new();
        let buffer = SharedBuffer::new();
        registry.disable();
        let resume = crate::session::break_here(
            &registry,
            builder(&["q"], &buffer),
            entry_stop(StopKind::Entry),
        )
        .unwrap();
        assert_eq!(resume, Resume::Continue);
        assert!(buffer.contents().is_empty());
        registry.enable();
    }

    #[test]
    fn test_second_reuse_does_not_suspend_before_first_interaction() {
        let registry = SessionRegistry::new();
        let buffer = SharedBuffer::new();
        let tracer = Rc::new(RefCell::new(ScriptedTracer::new(Vec::new())));
        let tracer_ref: crate::tracer::TracerRef = tracer.clone();
        let _ = enhanced(registry.acquire(
            builder(&[], &buffer).origin("app.rs", 3).tracer(tracer_ref),
        ));
        let _ = enhanced(registry.acquire(builder(&[], &buffer).origin("app.rs", 9)));
        // Never started, so reuse must not have touched the tracer.
        assert!(!tracer.borrow().suspended.get());
        assert!(!tracer.borrow().step_armed.get());
    }
}
