//! Lifetime Synchronization Tests
//!
//! Native-driven changes applied through the value cache callbacks:
//! - Deletion cleanup (through the library and by firing the callback directly)
//! - Replacement continuity and wrapper reuse
//! - Protocol violations are swallowed at the boundary
//! - Context disposal releases every pin
//!
//! # Running Tests
//! ```bash
//! cargo test -p irbind --test lifecycle_tests
//! ```

use std::sync::Arc;

use irbind::sys::{NativeLibrary, ValueCacheRef, ValueKind, NO_TOKEN};
use irbind::{Context, ContextCache, InteropError, ValueClass};
use irbind_sim::SimLibrary;

fn setup() -> (Arc<SimLibrary>, Arc<Context>) {
    let sim = Arc::new(SimLibrary::new());
    let context = Context::create(sim.clone()).unwrap();
    (sim, context)
}

fn native_cache(context: &Context) -> ValueCacheRef {
    context.values().native_handle().unwrap()
}

// ===== Deletion =====

#[test]
fn test_delete_value_releases_entry_and_pin() {
    let (sim, context) = setup();
    let keep = sim.add_value(context.handle(), ValueKind::Argument);
    let doomed = sim.add_value(context.handle(), ValueKind::Alloca);

    context.value_for(keep).unwrap();
    let held = context.value_for(doomed).unwrap();
    assert_eq!(context.values().len(), 2);
    assert_eq!(Arc::strong_count(&held), 2);

    context.delete_value(&held).unwrap();

    assert_eq!(context.values().len(), 1);
    assert!(!context.values().contains(doomed));
    assert_eq!(Arc::strong_count(&held), 1);
    assert_eq!(held.class(), ValueClass::Alloca);
    assert_eq!(sim.value_cache_lookup(native_cache(&context), doomed), NO_TOKEN);
    assert!(!sim.value_exists(doomed));
    assert_eq!(context.values().stats().released, 1);

    context.dispose();
}

#[test]
fn test_deletion_callback_scenario() {
    let (sim, context) = setup();
    let handle = sim.add_value(context.handle(), ValueKind::Load);
    let other = sim.add_value(context.handle(), ValueKind::Store);

    let before = context.value_for(handle).unwrap();
    context.value_for(other).unwrap();
    let token = context.values().token_of(handle).unwrap();
    let live = context.values().len();

    sim.fire_item_deleted(native_cache(&context), handle, token);
    assert_eq!(context.values().len(), live - 1);
    assert!(context.values().lookup(handle).is_none());

    // A second notification for the now-unknown handle changes nothing
    sim.fire_item_deleted(native_cache(&context), handle, token);
    assert_eq!(context.values().len(), live - 1);

    // The handle no longer resolves to the previous wrapper
    let after = context.value_for(handle).unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_ne!(context.values().token_of(handle), Some(token));

    context.dispose();
}

#[test]
fn test_deletion_with_mismatched_token_still_releases() {
    let (sim, context) = setup();
    let handle = sim.add_value(context.handle(), ValueKind::Load);
    let held = context.value_for(handle).unwrap();
    let token = context.values().token_of(handle).unwrap();

    sim.fire_item_deleted(native_cache(&context), handle, token + 1000);

    assert!(!context.values().contains(handle));
    assert!(context.values().is_empty());
    assert_eq!(Arc::strong_count(&held), 1);
    assert_eq!(context.values().stats().released, 1);

    context.dispose();
}

#[test]
fn test_native_deletion_with_stale_native_token() {
    let (sim, context) = setup();
    let handle = sim.add_value(context.handle(), ValueKind::Store);
    let held = context.value_for(handle).unwrap();
    let token = context.values().token_of(handle).unwrap();

    // Native side holds a token the managed side never issued for this handle
    sim.value_cache_add(native_cache(&context), handle, token + 1000);
    sim.delete_value(handle);

    assert!(!context.values().contains(handle));
    assert_eq!(Arc::strong_count(&held), 1);
    assert!(!sim.value_exists(handle));

    context.dispose();
}

// ===== Replacement =====

#[test]
fn test_replace_all_uses_with_continuity() {
    let (sim, context) = setup();
    let h1 = sim.add_value(context.handle(), ValueKind::Load);
    let h2 = sim.add_value(context.handle(), ValueKind::Call);
    let user = sim.add_value(context.handle(), ValueKind::Ret);
    sim.add_operand(user, h1);

    let old = context.value_for(h1).unwrap();
    let new = context.value_for(h2).unwrap();

    context.replace_all_uses_with(&old, &new).unwrap();

    // The old wrapper stays a valid object
    assert_eq!(old.handle(), h1);
    assert_eq!(old.class(), ValueClass::Load);

    // Fresh resolution of the old handle surfaces the new wrapper
    let resolved = context.value_for(h1).unwrap();
    assert!(Arc::ptr_eq(&resolved, &new));

    // Managed and native tables agree on the re-registered token
    let token = context.values().token_of(h1).unwrap();
    assert_eq!(sim.value_cache_lookup(native_cache(&context), h1), token);
    assert_eq!(context.values().stats().replaced, 1);

    // The user now refers to the new value
    let user = context.value_for(user).unwrap();
    let operands: Vec<_> = context
        .operands_of(&user)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(operands.len(), 1);
    assert!(Arc::ptr_eq(&operands[0], &new));

    context.dispose();
}

#[test]
fn test_replacement_callback_with_unseen_target_scenario() {
    let (sim, context) = setup();
    let h1 = sim.add_value(context.handle(), ValueKind::Load);
    let h2 = sim.add_value(context.handle(), ValueKind::Select);

    let old = context.value_for(h1).unwrap();
    let token = context.values().token_of(h1).unwrap();
    let constructed = context.values().stats().constructed;

    let new_token = sim.fire_item_replaced(native_cache(&context), h1, token, h2);
    assert_ne!(new_token, NO_TOKEN);
    assert_ne!(new_token, token);
    assert_eq!(context.values().stats().constructed, constructed + 1);

    let for_h2 = context.value_for(h2).unwrap();
    let for_h1 = context.value_for(h1).unwrap();
    assert!(Arc::ptr_eq(&for_h1, &for_h2));
    assert_eq!(for_h2.class(), ValueClass::SelectInstruction);
    assert_eq!(old.class(), ValueClass::Load);

    // A well-formed repeat with the current token builds nothing
    let repeat = sim.fire_item_replaced(native_cache(&context), h1, new_token, h2);
    assert_ne!(repeat, NO_TOKEN);
    assert_eq!(context.values().stats().constructed, constructed + 1);
    assert!(Arc::ptr_eq(&context.value_for(h1).unwrap(), &for_h2));

    // Neither does the identical notification with its stale token, which
    // leaves `h1` forgotten and `h2` untouched
    assert_eq!(
        sim.fire_item_replaced(native_cache(&context), h1, token, h2),
        NO_TOKEN
    );
    assert_eq!(context.values().stats().constructed, constructed + 1);
    assert!(!context.values().contains(h1));
    assert!(Arc::ptr_eq(&context.value_for(h2).unwrap(), &for_h2));

    context.dispose();
}

#[test]
fn test_native_rauw_twice_reuses_target_wrapper() {
    let (sim, context) = setup();
    let h1 = sim.add_value(context.handle(), ValueKind::Add);
    let h2 = sim.add_value(context.handle(), ValueKind::Sub);
    context.value_for(h1).unwrap();

    // Native code rewires on its own, without going through the context
    sim.replace_all_uses_with(h1, h2);
    let first = context.value_for(h2).unwrap();
    let constructed = context.values().stats().constructed;

    sim.replace_all_uses_with(h1, h2);
    assert_eq!(context.values().stats().constructed, constructed);
    assert_eq!(context.values().stats().replaced, 2);
    assert!(Arc::ptr_eq(&context.value_for(h1).unwrap(), &first));
    assert!(Arc::ptr_eq(&context.value_for(h2).unwrap(), &first));

    context.dispose();
}

#[test]
fn test_replacement_with_foreign_target_drops_entry() {
    let sim = Arc::new(SimLibrary::new());
    let a = Context::create(sim.clone()).unwrap();
    let b = Context::create(sim.clone()).unwrap();
    let h1 = sim.add_value(a.handle(), ValueKind::Load);
    let foreign = sim.add_value(b.handle(), ValueKind::Load);

    let held = a.value_for(h1).unwrap();
    let foreign_value = b.value_for(foreign).unwrap();

    // Rejected before reaching native code
    assert!(matches!(
        a.replace_all_uses_with(&held, &foreign_value),
        Err(InteropError::WrongScope { .. })
    ));
    assert!(a.values().contains(h1));

    // Native code doing it anyway: the callback fails, returns no token and
    // the entry goes away on both sides
    sim.replace_all_uses_with(h1, foreign);
    assert!(!a.values().contains(h1));
    assert_eq!(sim.value_cache_lookup(native_cache(&a), h1), NO_TOKEN);
    assert_eq!(Arc::strong_count(&held), 1);

    a.dispose();
    b.dispose();
}

#[test]
fn test_replacement_with_stale_token_forgets_old_on_both_sides() {
    let (sim, context) = setup();
    let h1 = sim.add_value(context.handle(), ValueKind::Load);
    let h2 = sim.add_value(context.handle(), ValueKind::Call);

    let held = context.value_for(h1).unwrap();
    let token = context.values().token_of(h1).unwrap();
    let native = native_cache(&context);
    sim.value_cache_add(native, h1, token + 1000);

    sim.replace_all_uses_with(h1, h2);

    assert!(!context.values().contains(h1));
    assert_eq!(sim.value_cache_lookup(native, h1), NO_TOKEN);
    assert_eq!(Arc::strong_count(&held), 1);
    assert_eq!(context.values().stats().replaced, 0);
    assert_eq!(context.values().stats().released, 1);

    // A later deletion of the old handle has nothing left to notify
    sim.delete_value(h1);
    assert!(context.values().is_empty());

    context.dispose();
}

// ===== Disposal =====

#[test]
fn test_dispose_releases_every_pin() {
    let (sim, context) = setup();
    let held: Vec<_> = (0..10)
        .map(|_| {
            let handle = sim.add_value(context.handle(), ValueKind::Phi);
            context.value_for(handle).unwrap()
        })
        .collect();
    let caches = sim.cache_count();

    context.dispose();

    assert!(held.iter().all(|v| Arc::strong_count(v) == 1));
    assert!(context.values().is_empty());
    assert_eq!(sim.cache_count(), caches - 1);
    assert!(!sim.context_exists(context.handle()));
    assert!(ContextCache::global().try_get_value(context.handle()).is_none());
    assert_eq!(
        context.value_for(held[0].handle()).unwrap_err(),
        InteropError::Disposed("context")
    );

    // Idempotent
    context.dispose();
    assert!(context.is_disposed());
}

#[test]
fn test_dispose_unowned_context_keeps_native_context() {
    let sim = Arc::new(SimLibrary::new());
    let handle = sim.create_context();
    let value = sim.add_value(handle, ValueKind::Argument);

    let context = Context::from_handle(sim.clone(), handle).unwrap();
    assert!(!context.is_owned());
    context.value_for(value).unwrap();

    context.dispose();

    assert!(sim.context_exists(handle));
    assert!(sim.value_exists(value));
    assert_eq!(sim.cache_count(), 0);
}
