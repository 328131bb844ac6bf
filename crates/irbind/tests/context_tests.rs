//! Context and Registry Tests
//!
//! - Global registry lookup and duplicate rejection
//! - Resolution through a bare value handle
//! - Concurrency policies
//! - Def-use and operand traversal
//!
//! # Running Tests
//! ```bash
//! cargo test -p irbind --test context_tests
//! ```

use std::sync::Arc;

use irbind::sys::{ContextRef, NativeLibrary, ValueKind};
use irbind::views::{BasicBlock, Function};
use irbind::{resolve, Context, ContextCache, ContextOptions, InteropError, ValueType};
use irbind_sim::SimLibrary;

// ===== Registry =====

#[test]
fn test_created_context_is_registered() {
    let sim = Arc::new(SimLibrary::new());
    let context = Context::create(sim.clone()).unwrap();

    let found = ContextCache::global().try_get_value(context.handle()).unwrap();
    assert!(Arc::ptr_eq(&found, &context));
    assert!(context.is_owned());
    assert!(sim.context_exists(context.handle()));

    context.dispose();
    assert!(ContextCache::global().try_get_value(context.handle()).is_none());
}

#[test]
fn test_duplicate_registration_rejected() {
    let sim = Arc::new(SimLibrary::new());
    let context = Context::create(sim).unwrap();

    assert_eq!(
        ContextCache::global().add(context.clone()),
        Err(InteropError::DuplicateContext(context.handle()))
    );

    context.dispose();
}

#[test]
fn test_from_handle_returns_registered_context() {
    let sim = Arc::new(SimLibrary::new());
    let context = Context::create(sim.clone()).unwrap();

    let same = Context::from_handle(sim.clone(), context.handle()).unwrap();
    assert!(Arc::ptr_eq(&same, &context));

    assert_eq!(
        Context::from_handle(sim, ContextRef::NULL).unwrap_err(),
        InteropError::NativeNull("context")
    );

    context.dispose();
}

#[test]
fn test_standalone_registry_dispose_all() {
    let sim = Arc::new(SimLibrary::new());
    let registry = ContextCache::new();
    let contexts: Vec<_> = (0..3)
        .map(|_| Context::create(sim.clone()).unwrap())
        .collect();
    for context in &contexts {
        registry.add(context.clone()).unwrap();
    }
    assert_eq!(registry.len(), 3);

    registry.dispose_all();

    assert!(registry.is_empty());
    for context in &contexts {
        assert!(context.is_disposed());
        assert!(!sim.context_exists(context.handle()));
    }
}

// ===== Global Resolution =====

#[test]
fn test_resolve_through_owning_context() {
    let sim = Arc::new(SimLibrary::new());
    let library: Arc<dyn NativeLibrary> = sim.clone();
    let context = Context::create(library.clone()).unwrap();
    let f = sim.add_value(context.handle(), ValueKind::Function);

    let view: Function = resolve(&library, f).unwrap();
    let direct = context.value_for(f).unwrap();
    assert!(Arc::ptr_eq(view.as_value(), &direct));

    assert!(matches!(
        resolve::<BasicBlock>(&library, f),
        Err(InteropError::InvalidCast { .. })
    ));

    context.dispose();
}

#[test]
fn test_resolve_registers_unowned_context() {
    let sim = Arc::new(SimLibrary::new());
    let library: Arc<dyn NativeLibrary> = sim.clone();
    let handle = library.create_context();
    let block = sim.add_value(handle, ValueKind::BasicBlock);

    let view: BasicBlock = resolve(&library, block).unwrap();

    let context = ContextCache::global().try_get_value(handle).unwrap();
    assert!(!context.is_owned());
    assert!(Arc::ptr_eq(
        view.as_value(),
        &context.value_for(block).unwrap()
    ));

    context.dispose();
    assert!(sim.context_exists(handle));
}

#[test]
fn test_resolve_unknown_handle() {
    let sim = Arc::new(SimLibrary::new());
    let library: Arc<dyn NativeLibrary> = sim;

    assert_eq!(
        resolve::<Arc<irbind::Value>>(&library, irbind::sys::ValueRef::NULL).unwrap_err(),
        InteropError::NativeNull("value handle")
    );
}

// ===== Concurrency Policy =====

#[test]
fn test_owner_thread_rejects_foreign_callers() {
    let sim = Arc::new(SimLibrary::new());
    let context = Context::with_options(sim.clone(), ContextOptions::owner_thread()).unwrap();
    let handle = sim.add_value(context.handle(), ValueKind::Argument);

    context.value_for(handle).unwrap();

    let remote = context.clone();
    let result = std::thread::spawn(move || {
        let resolved = remote.value_for(handle).map(|_| ());
        let deleted = remote.delete_value(&remote.values().lookup(handle).unwrap());
        (resolved, deleted)
    })
    .join()
    .unwrap();
    assert_eq!(
        result,
        (
            Err(InteropError::WrongThread("get_or_create_item")),
            Err(InteropError::WrongThread("delete_value"))
        )
    );
    assert!(context.values().contains(handle));

    context.dispose();
}

#[test]
fn test_owner_thread_accepts_callbacks_from_any_thread() {
    let sim = Arc::new(SimLibrary::new());
    let context = Context::with_options(sim.clone(), ContextOptions::owner_thread()).unwrap();
    let handle = sim.add_value(context.handle(), ValueKind::Alloca);
    context.value_for(handle).unwrap();

    // Native code deleting the value from a thread it owns
    let native = sim.clone();
    std::thread::spawn(move || native.delete_value(handle))
        .join()
        .unwrap();

    assert!(!context.values().contains(handle));

    context.dispose();
}

#[test]
fn test_shared_resolution_while_native_deletes() {
    let sim = Arc::new(SimLibrary::new());
    let context = Context::create(sim.clone()).unwrap();
    let stable: Vec<_> = (0..32)
        .map(|_| sim.add_value(context.handle(), ValueKind::Load))
        .collect();
    let doomed: Vec<_> = (0..32)
        .map(|_| sim.add_value(context.handle(), ValueKind::Store))
        .collect();
    for handle in &doomed {
        context.value_for(*handle).unwrap();
    }

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let context = context.clone();
            let stable = stable.clone();
            std::thread::spawn(move || {
                for _ in 0..10 {
                    for handle in &stable {
                        context.value_for(*handle).unwrap();
                    }
                }
            })
        })
        .collect();

    for handle in &doomed {
        sim.delete_value(*handle);
    }
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(context.values().len(), stable.len());
    assert!(doomed.iter().all(|h| !context.values().contains(*h)));

    context.dispose();
}

// ===== Traversal =====

#[test]
fn test_uses_of_yields_interned_users() {
    let sim = Arc::new(SimLibrary::new());
    let context = Context::create(sim.clone()).unwrap();
    let ctx = context.handle();
    let arg = sim.add_value(ctx, ValueKind::Argument);
    let add = sim.add_value(ctx, ValueKind::Add);
    let call = sim.add_value(ctx, ValueKind::Call);
    sim.add_operand(add, arg);
    sim.add_operand(call, arg);
    sim.add_operand(call, add);

    let arg_value = context.value_for(arg).unwrap();
    let add_value = context.value_for(add).unwrap();

    let uses: Vec<_> = context
        .uses_of(&arg_value)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(uses.len(), 2);
    assert!(Arc::ptr_eq(uses[0].user(), &add_value));
    assert_eq!(uses[1].user().handle(), call);
    assert!(uses.iter().all(|u| Arc::ptr_eq(u.value(), &arg_value)));
    assert!(uses.iter().all(|u| !u.handle().is_null()));

    // Users met during the walk are interned
    let call_value = context.value_for(call).unwrap();
    assert!(Arc::ptr_eq(uses[1].user(), &call_value));

    context.dispose();
}

#[test]
fn test_uses_of_unused_value_is_empty() {
    let sim = Arc::new(SimLibrary::new());
    let context = Context::create(sim.clone()).unwrap();
    let lonely = sim.add_value(context.handle(), ValueKind::Argument);
    let lonely = context.value_for(lonely).unwrap();

    let mut uses = context.uses_of(&lonely).unwrap();
    assert!(uses.next().is_none());
    assert!(uses.next().is_none());

    context.dispose();
}

#[test]
fn test_operands_in_slot_order() {
    let sim = Arc::new(SimLibrary::new());
    let context = Context::create(sim.clone()).unwrap();
    let ctx = context.handle();
    let a = sim.add_value(ctx, ValueKind::Argument);
    let b = sim.add_value(ctx, ValueKind::ConstantInt);
    let mul = sim.add_value(ctx, ValueKind::Mul);
    sim.add_operand(mul, a);
    sim.add_operand(mul, b);

    let mul = context.value_for(mul).unwrap();
    let operands = context.operands_of(&mul).unwrap();
    assert_eq!(operands.len(), 2);

    let handles: Vec<_> = operands.map(|op| op.unwrap().handle()).collect();
    assert_eq!(handles, vec![a, b]);

    context.dispose();
}

#[test]
fn test_traversal_rejects_foreign_values() {
    let sim = Arc::new(SimLibrary::new());
    let a = Context::create(sim.clone()).unwrap();
    let b = Context::create(sim.clone()).unwrap();
    let foreign = sim.add_value(b.handle(), ValueKind::Argument);
    let foreign = b.value_for(foreign).unwrap();

    assert!(matches!(
        a.uses_of(&foreign),
        Err(InteropError::WrongScope { .. })
    ));
    assert!(matches!(
        a.operands_of(&foreign),
        Err(InteropError::WrongScope { .. })
    ));

    a.dispose();
    b.dispose();
}
