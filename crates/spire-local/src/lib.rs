// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Values scoped to a logical thread of control.
//!
//! A *logical thread of control* is everything that runs on behalf of one
//! inbound request. Inside a tokio task that entered [`scope`] (or a closure
//! passed to [`sync_scope`]) that is the scope itself. On a plain OS thread
//! with no tokio runtime it is the thread.
//!
//! Unscoped code on a tokio runtime has no logical thread of control: worker
//! threads run unrelated tasks, so stacks read empty there and pushing
//! panics. Wrap spawned tasks in [`scope`] and `spawn_blocking` closures in
//! [`sync_scope`].
//!
//! Values live in named, typed stacks ([`LocalStack`]). Pushing returns a
//! [`LocalGuard`] that pops the value again, either explicitly or on drop.
//!
//! ```text
//! scope(async {
//!     let _ctx = CONTEXT.push(ctx);   // visible to everything awaited below
//!     handler().await                 // CONTEXT.get() == Some(ctx)
//! })                                  // guard dropped, scope discarded
//! ```

mod stack;

pub use stack::{
    clear_thread, has_context, in_scope, scope, scope_if_absent, sync_scope, LocalGuard, LocalStack,
};
