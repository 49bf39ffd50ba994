// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::any::Any;
use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;

type Slot = Box<dyn Any + Send>;

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Named stacks belonging to one logical thread of control.
#[derive(Default)]
struct Locals {
    stacks: HashMap<String, Vec<Slot>>,
}

impl Locals {
    fn push(&mut self, key: &str, slot: Slot) -> usize {
        let stack = self.stacks.entry(key.to_string()).or_default();
        stack.push(slot);
        stack.len()
    }

    fn top(&self, key: &str) -> Option<&Slot> {
        self.stacks.get(key).and_then(|stack| stack.last())
    }

    fn depth(&self, key: &str) -> usize {
        self.stacks.get(key).map_or(0, Vec::len)
    }

    /// Pop the top of `key` only if the stack is exactly `depth` deep.
    /// On mismatch the actual depth is returned.
    fn pop_at(&mut self, key: &str, depth: usize) -> Result<Slot, usize> {
        let Some(stack) = self.stacks.get_mut(key) else {
            return Err(0);
        };
        if stack.len() != depth {
            return Err(stack.len());
        }
        stack.pop().ok_or(0)
    }

    fn truncate(&mut self, key: &str, len: usize) -> Vec<Slot> {
        match self.stacks.get_mut(key) {
            Some(stack) if stack.len() > len => stack.split_off(len),
            _ => Vec::new(),
        }
    }

    fn remove(&mut self, key: &str) -> Vec<Slot> {
        self.stacks.remove(key).unwrap_or_default()
    }
}

tokio::task_local! {
    static TASK_LOCALS: RefCell<Locals>;
}

thread_local! {
    static THREAD_LOCALS: RefCell<Locals> = RefCell::new(Locals::default());
}

/// Where the caller's values live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Storage {
    /// Inside [`scope`] or [`sync_scope`].
    Task,
    /// Plain OS thread, no tokio runtime.
    Thread,
    /// Unscoped code on a tokio runtime. Worker threads are shared by
    /// unrelated tasks, so no storage is available.
    Detached,
}

fn storage() -> Storage {
    if in_scope() {
        Storage::Task
    } else if tokio::runtime::Handle::try_current().is_ok() {
        Storage::Detached
    } else {
        Storage::Thread
    }
}

// Slots removed from a stack are handed back to the caller so their
// destructors run after the RefCell borrow is released.
fn try_with_locals<R>(f: impl FnOnce(&mut Locals) -> R) -> Option<R> {
    match storage() {
        Storage::Task => TASK_LOCALS.try_with(|cell| f(&mut cell.borrow_mut())).ok(),
        Storage::Thread => THREAD_LOCALS.try_with(|cell| f(&mut cell.borrow_mut())).ok(),
        Storage::Detached => None,
    }
}

/// Read access. Detached callers see empty stacks.
fn read_locals<R>(default: R, f: impl FnOnce(&mut Locals) -> R) -> R {
    try_with_locals(f).unwrap_or(default)
}

/// Write access.
///
/// # Panics
///
/// When called from unscoped code on a tokio runtime.
fn write_locals<R>(key: &str, f: impl FnOnce(&mut Locals) -> R) -> R {
    if storage() == Storage::Detached {
        panic!(
            "local `{}` written outside a logical scope on a tokio runtime; \
             wrap the task in spire_local::scope",
            key
        );
    }
    try_with_locals(f).expect("logical locals accessed during thread teardown")
}

/// Whether values can be stored here.
///
/// False only for unscoped code running on a tokio runtime, where every
/// [`LocalStack`] reads empty and pushes panic.
pub fn has_context() -> bool {
    storage() != Storage::Detached
}

/// Whether the caller runs inside a [`scope`] or [`sync_scope`].
pub fn in_scope() -> bool {
    TASK_LOCALS.try_with(|_| ()).is_ok()
}

/// Run `future` as a fresh logical thread of control.
///
/// Everything pushed while the future runs is discarded when it completes.
pub async fn scope<F: Future>(future: F) -> F::Output {
    TASK_LOCALS.scope(RefCell::new(Locals::default()), future).await
}

/// Like [`scope`], but reuses the surrounding scope when there is one.
pub async fn scope_if_absent<F: Future>(future: F) -> F::Output {
    if in_scope() {
        future.await
    } else {
        scope(future).await
    }
}

/// Synchronous counterpart of [`scope`].
pub fn sync_scope<R>(f: impl FnOnce() -> R) -> R {
    TASK_LOCALS.sync_scope(RefCell::new(Locals::default()), f)
}

/// Drop every value held by the current OS thread outside of any scope.
///
/// Returns the number of values discarded.
pub fn clear_thread() -> usize {
    let taken = THREAD_LOCALS
        .try_with(|cell| std::mem::take(&mut cell.borrow_mut().stacks))
        .unwrap_or_default();
    taken.values().map(Vec::len).sum()
}

// ---------------------------------------------------------------------------
// LocalStack
// ---------------------------------------------------------------------------

/// A typed, named stack scoped to the current logical thread of control.
///
/// Two `LocalStack`s declared with the same key share storage, so a key
/// must always be used with the same value type.
pub struct LocalStack<T> {
    key: Cow<'static, str>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> LocalStack<T> {
    /// Declare a stack under a static key.
    pub const fn new(key: &'static str) -> Self {
        Self {
            key: Cow::Borrowed(key),
            _marker: PhantomData,
        }
    }

    /// Declare a stack under `"{prefix}.{name}"`.
    pub fn prefixed(prefix: &str, name: &str) -> Self {
        Self {
            key: Cow::Owned(format!("{}.{}", prefix, name)),
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl<T: Send + 'static> LocalStack<T> {
    /// Make `value` the current value. The returned guard pops it again.
    ///
    /// # Panics
    ///
    /// When called from a tokio task outside [`scope`].
    pub fn push(&self, value: T) -> LocalGuard<T> {
        let depth = write_locals(&self.key, |locals| locals.push(&self.key, Box::new(value)));
        LocalGuard {
            key: self.key.clone(),
            depth,
            active: true,
            _marker: PhantomData,
        }
    }

    /// Number of values currently stacked under this key.
    pub fn depth(&self) -> usize {
        read_locals(0, |locals| locals.depth(&self.key))
    }

    pub fn is_empty(&self) -> bool {
        self.depth() == 0
    }

    /// Discard every value stacked under this key. Returns how many were dropped.
    pub fn purge(&self) -> usize {
        let removed = read_locals(Vec::new(), |locals| locals.remove(&self.key));
        removed.len()
    }
}

impl<T: Clone + Send + 'static> LocalStack<T> {
    /// The current value, if any.
    pub fn get(&self) -> Option<T> {
        read_locals(None, |locals| {
            locals
                .top(&self.key)
                .and_then(|slot| slot.downcast_ref::<T>())
                .cloned()
        })
    }

    /// Push `value` for the remainder of the logical thread of control.
    ///
    /// The value is released when the enclosing scope ends (or, outside a
    /// scope, by [`clear_thread`] / [`LocalStack::purge`]).
    pub fn push_retained(&self, value: T) -> T {
        let current = value.clone();
        write_locals(&self.key, |locals| locals.push(&self.key, Box::new(value)));
        current
    }
}

impl<T> Clone for LocalStack<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for LocalStack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalStack").field("key", &self.key).finish()
    }
}

// ---------------------------------------------------------------------------
// LocalGuard
// ---------------------------------------------------------------------------

/// Handle for exactly one pop of a value pushed on a [`LocalStack`].
///
/// Popping out of order is a programming error and panics. A guard that is
/// dropped without [`LocalGuard::pop`] restores the stack to the depth it
/// had before the push.
#[must_use = "dropping the guard pops the value immediately"]
pub struct LocalGuard<T> {
    key: Cow<'static, str>,
    depth: usize,
    active: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> LocalGuard<T> {
    /// Stack depth right after the matching push.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Pop the value this guard pushed and return it.
    ///
    /// # Panics
    ///
    /// If the value is no longer on top of its stack.
    pub fn pop(mut self) -> T {
        self.active = false;
        match read_locals(Err(0), |locals| locals.pop_at(&self.key, self.depth)) {
            Ok(slot) => match slot.downcast::<T>() {
                Ok(value) => *value,
                Err(_) => panic!("local `{}` holds a value of another type", self.key),
            },
            Err(found) => panic!(
                "local `{}` popped out of order: expected depth {}, found {}",
                self.key, self.depth, found
            ),
        }
    }
}

impl<T> Drop for LocalGuard<T> {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        let Some(removed) = try_with_locals(|locals| locals.truncate(&self.key, self.depth - 1))
        else {
            return;
        };
        if removed.len() != 1 {
            tracing::error!(
                "local `{}` unbalanced on release: expected depth {}, discarded {} value(s)",
                self.key,
                self.depth,
                removed.len()
            );
        }
    }
}

impl<T> fmt::Debug for LocalGuard<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalGuard")
            .field("key", &self.key)
            .field("depth", &self.depth)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
