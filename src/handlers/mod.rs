// handlers/mod.rs - Dispatchable resources
//
// Each resource is a `dispatch::Resource`; its actions are reached through
// /{resource}/{action}/{args...}. Adding a resource means adding it here.

pub mod register; // /register/* - login, verify, logout, userinfo, status

pub use register::Register;

use crate::dispatch::Registry;

/// Registry of every resource the server exposes
pub fn registry() -> Registry {
    Registry::builder().resource::<Register>().build()
}

/*
RESOLUTION RULES (see dispatch::resolve):

  POST /register/login/alice   → Register.login      params ["alice"]
  GET  /register/userinfo      → Register.userinfo   (login required)
  GET  /register               → Register.handler    params []
  GET  /register/whatever      → Register.handler    params ["whatever"]
  GET  /nothing/here           → not dispatched, falls through to static files

Resources have no route table of their own; an action is any entry in
`Resource::actions()`, and "handler" is the catch-all when present.
*/
