//! End-to-end tests for typemeta using explicit contexts only.
//!
//! These tests exercise registration, resolution and the reflective
//! operations together, the way an embedding application would use them.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use typemeta::prelude::*;

const NAME: Id = Id::from_name("name");
const HEALTH: Id = Id::from_name("health");
const HEAL: Id = Id::from_name("heal");
const DESCRIBE: Id = Id::from_name("describe");
const SPAWN: Id = Id::from_name("spawn");
const MAX_HEALTH: Id = Id::from_name("max_health");
const LEVEL: Id = Id::from_name("level");

#[derive(Clone, Default, Debug, PartialEq)]
struct Entity {
    name: String,
}

#[derive(Clone, Default, Debug, PartialEq)]
struct Actor {
    entity: Entity,
    health: i32,
}

#[derive(Clone, Default, Debug, PartialEq)]
struct Player {
    actor: Actor,
    level: u32,
}

impl AsRef<Entity> for Actor {
    fn as_ref(&self) -> &Entity {
        &self.entity
    }
}

impl AsMut<Entity> for Actor {
    fn as_mut(&mut self) -> &mut Entity {
        &mut self.entity
    }
}

impl AsRef<Actor> for Player {
    fn as_ref(&self) -> &Actor {
        &self.actor
    }
}

impl AsMut<Actor> for Player {
    fn as_mut(&mut self) -> &mut Actor {
        &mut self.actor
    }
}

/// Percentage points, converted to whole health points.
#[derive(Clone, Copy)]
struct Percent(u8);

/// Register a small entity hierarchy into `ctx`.
fn register_hierarchy(ctx: &MetaCtx) {
    meta_in::<Entity>(ctx)
        .name(Id::from_name("Entity"))
        .data(NAME, |e: &Entity| e.name.clone(), |e: &mut Entity, v: String| e.name = v)
        .func_const(DESCRIBE, |e: &Entity| format!("entity {}", e.name));

    meta_in::<Actor>(ctx)
        .name(Id::from_name("Actor"))
        .base::<Entity>()
        .default_ctor()
        .data(HEALTH, |a: &Actor| a.health, |a: &mut Actor, v: i32| a.health = v)
        .data_const(MAX_HEALTH, 100)
        .func(HEAL, |a: &mut Actor, amount: i32| {
            a.health = (a.health + amount).min(100);
            a.health
        });

    meta_in::<Player>(ctx)
        .name(Id::from_name("Player"))
        .base::<Actor>()
        .default_ctor()
        .ctor(|name: String, level: u32| Player {
            actor: Actor {
                entity: Entity { name },
                health: 100,
            },
            level,
        })
        .data(LEVEL, |p: &Player| p.level, |p: &mut Player, v: u32| p.level = v)
        .func_static(SPAWN, |name: String| Player {
            actor: Actor {
                entity: Entity { name },
                health: 50,
            },
            level: 1,
        });

    meta_in::<Percent>(ctx).conv(|p: &Percent| p.0 as i32);
}

// =============================================================================
// Registration and resolution
// =============================================================================

#[test]
fn test_resolve_by_name_and_type() {
    let ctx = create_context();
    register_hierarchy(&ctx);

    let player = resolve_id_in(&ctx, Id::from_name("Player")).unwrap();
    assert_eq!(player.info(), type_id::<Player>());
    assert_eq!(Some(player), resolve_in::<Player>(&ctx));
    assert_eq!(resolve_all_in(&ctx).len(), 4);
}

#[test]
fn test_registration_is_visible_immediately() {
    let ctx = create_context();
    let factory = meta_in::<Entity>(&ctx);
    assert!(resolve_in::<Entity>(&ctx).is_some());

    factory.name(Id::from_name("late"));
    assert!(resolve_id_in(&ctx, Id::from_name("late")).is_some());
}

#[test]
fn test_members_inherited_through_bases() {
    let ctx = create_context();
    register_hierarchy(&ctx);
    let player_type = resolve_in::<Player>(&ctx).unwrap();

    let mut player = Player {
        actor: Actor {
            entity: Entity {
                name: "ada".into(),
            },
            health: 40,
        },
        level: 3,
    };

    let name = player_type.data(NAME).unwrap();
    assert_eq!(name.owner().info(), type_id::<Entity>());
    let value = name.get(as_handle(&ctx, &mut player)).unwrap();
    assert_eq!(value.cast::<String>().unwrap(), "ada");

    let heal = player_type.func(HEAL).unwrap();
    let healed = heal
        .invoke(as_handle(&ctx, &mut player), vec![wrap(&ctx, 25)])
        .unwrap();
    assert_eq!(healed.cast::<i32>(), Ok(65));
    assert_eq!(player.actor.health, 65);

    let describe = player_type.func(DESCRIBE).unwrap();
    let text = describe
        .invoke(MetaHandle::new_const_in(&ctx, &player), vec![])
        .unwrap();
    assert_eq!(text.cast::<String>().unwrap(), "entity ada");
}

#[test]
fn test_transitive_upcast() {
    let ctx = create_context();
    register_hierarchy(&ctx);

    let mut any = wrap(&ctx, Player::default());
    assert!(any.allow_cast::<Entity>());
    if let Some(entity) = any.try_cast_mut::<Entity>() {
        entity.name = "renamed".into();
    }
    assert_eq!(
        any.take::<Player>().map(|p| p.actor.entity.name).ok(),
        Some("renamed".to_string())
    );

    let player = resolve_in::<Player>(&ctx).unwrap();
    let entity = resolve_in::<Entity>(&ctx).unwrap();
    assert!(player.can_cast(&entity));
    assert!(!entity.can_cast(&player));
}

// =============================================================================
// Construction
// =============================================================================

#[test]
fn test_construct_overloads() {
    let ctx = create_context();
    register_hierarchy(&ctx);
    let player_type = resolve_in::<Player>(&ctx).unwrap();
    assert_eq!(player_type.ctor_count(), 2);

    let default = player_type.construct(vec![]).unwrap();
    assert_eq!(default.try_cast::<Player>(), Some(&Player::default()));

    let named = player_type
        .construct(vec![wrap(&ctx, String::from("bo")), wrap(&ctx, 7u32)])
        .unwrap();
    let named = named.try_cast::<Player>().unwrap();
    assert_eq!(named.level, 7);
    assert_eq!(named.actor.health, 100);

    assert!(matches!(
        player_type.try_construct(vec![wrap(&ctx, 7u32), wrap(&ctx, String::from("bo"))]),
        Err(MetaError::TypeMismatch { .. })
    ));
    assert!(matches!(
        player_type.try_construct(vec![wrap(&ctx, 1u32)]),
        Err(MetaError::ArityMismatch { .. })
    ));
}

#[test]
fn test_construct_converts_arguments() {
    let ctx = create_context();
    register_hierarchy(&ctx);
    meta_in::<Actor>(&ctx).ctor(|health: i32| Actor {
        entity: Entity::default(),
        health,
    });

    let actor = resolve_in::<Actor>(&ctx)
        .unwrap()
        .construct(vec![wrap(&ctx, Percent(30))])
        .unwrap();
    assert_eq!(actor.try_cast::<Actor>().map(|a| a.health), Some(30));
}

#[test]
fn test_static_function() {
    let ctx = create_context();
    register_hierarchy(&ctx);

    let spawn = resolve_in::<Player>(&ctx).unwrap().func(SPAWN).unwrap();
    assert!(spawn.is_static());
    assert_eq!(spawn.ret().map(|ty| ty.info()), Some(type_id::<Player>()));

    let spawned = spawn
        .invoke(MetaHandle::empty_in(&ctx), vec![wrap(&ctx, String::from("eve"))])
        .unwrap();
    let player = spawned.take::<Player>().unwrap();
    assert_eq!(player.actor.entity.name, "eve");
    assert_eq!(player.actor.health, 50);
}

// =============================================================================
// Data members
// =============================================================================

#[test]
fn test_set_through_conversion() {
    let ctx = create_context();
    register_hierarchy(&ctx);
    let health = resolve_in::<Actor>(&ctx).unwrap().data(HEALTH).unwrap();

    let mut actor = Actor::default();
    assert!(health.set(as_handle(&ctx, &mut actor), wrap(&ctx, Percent(80))));
    assert_eq!(actor.health, 80);

    assert!(!health.set(as_handle(&ctx, &mut actor), wrap(&ctx, 1.5f32)));
    assert_eq!(actor.health, 80);
}

#[test]
fn test_static_constant() {
    let ctx = create_context();
    register_hierarchy(&ctx);

    let max = resolve_in::<Actor>(&ctx).unwrap().data(MAX_HEALTH).unwrap();
    assert!(max.is_static());
    assert!(max.is_const());
    assert_eq!(max.get(MetaHandle::empty_in(&ctx)).unwrap().cast::<i32>(), Ok(100));

    let mut actor = Actor::default();
    assert_eq!(
        max.try_set(as_handle(&ctx, &mut actor), wrap(&ctx, 1)),
        Err(MetaError::ConstViolation {
            member: "data member"
        })
    );
}

#[test]
fn test_enumerate_members() {
    let ctx = create_context();
    register_hierarchy(&ctx);
    let actor = resolve_in::<Actor>(&ctx).unwrap();

    let mut data: Vec<Id> = actor.data_all().iter().map(|d| d.id()).collect();
    data.sort();
    let mut expected = vec![HEALTH, MAX_HEALTH];
    expected.sort();
    assert_eq!(data, expected);

    let funcs: Vec<Id> = actor.func_all().iter().map(|f| f.id()).collect();
    assert_eq!(funcs, vec![HEAL]);
}

#[test]
fn test_aliased_data_member() {
    let ctx = create_context();
    let alias = Id::from_name("hp");
    meta_in::<Actor>(&ctx)
        .data(HEALTH, |a: &Actor| a.health, |a: &mut Actor, v: i32| a.health = v)
        .data(alias, |a: &Actor| a.health, |a: &mut Actor, v: i32| a.health = v);

    let ty = resolve_in::<Actor>(&ctx).unwrap();
    let health = ty.data(HEALTH).unwrap();
    let hp = ty.data(alias).unwrap();
    assert_ne!(health, hp);

    let mut actor = Actor::default();
    assert!(hp.set(as_handle(&ctx, &mut actor), wrap(&ctx, 12)));
    assert_eq!(
        health.get(as_handle(&ctx, &mut actor)).unwrap().cast::<i32>(),
        Ok(12)
    );
}

#[test]
fn test_function_reregistration_replaces() {
    let ctx = create_context();
    meta_in::<Actor>(&ctx).func_const(DESCRIBE, |_: &Actor| 1);
    meta_in::<Actor>(&ctx).func_const(DESCRIBE, |_: &Actor, extra: i32| extra);

    let describe = resolve_in::<Actor>(&ctx).unwrap().func(DESCRIBE).unwrap();
    assert_eq!(describe.arity(), 1);

    let actor = Actor::default();
    let out = describe
        .invoke(MetaHandle::new_const_in(&ctx, &actor), vec![wrap(&ctx, 9)])
        .unwrap();
    assert_eq!(out.cast::<i32>(), Ok(9));
}

#[test]
fn test_custom_hasher_ids() {
    let ctx = create_context();
    let id = Id::with_hasher("Entity", |bytes| bytes.len() as u64);
    assert_eq!(id, Id::from_raw(6));

    meta_in::<Entity>(&ctx).name(id);
    assert!(resolve_id_in(&ctx, Id::from_raw(6)).is_some());
    assert!(resolve_id_in(&ctx, Id::from_name("Entity")).is_none());
}

#[test]
fn test_per_type_reset() {
    let ctx = create_context();
    register_hierarchy(&ctx);
    let actor = resolve_in::<Actor>(&ctx).unwrap();
    let heal = actor.func(HEAL).unwrap();

    assert!(ctx.reset_type::<Actor>());
    assert!(!actor.is_valid());
    assert!(resolve_in::<Actor>(&ctx).is_none());
    assert!(resolve_in::<Player>(&ctx).is_some());

    let mut target = Actor::default();
    assert!(matches!(
        heal.invoke(as_handle(&ctx, &mut target), vec![wrap(&ctx, 1)]),
        Err(MetaError::InvalidType { .. })
    ));

    assert!(ctx.reset_id(Id::from_name("Player")));
    assert!(!ctx.reset_id(Id::from_name("Player")));
    assert_eq!(resolve_all_in(&ctx).len(), 2);
}

// =============================================================================
// Values and destruction
// =============================================================================

#[test]
fn test_dtor_runs_once_per_value() {
    let ctx = create_context();
    let destroyed = Arc::new(AtomicUsize::new(0));
    let counter = destroyed.clone();
    meta_in::<Entity>(&ctx)
        .default_ctor()
        .dtor(move |_: &mut Entity| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

    let ty = resolve_in::<Entity>(&ctx).unwrap();
    {
        let _a = ty.construct(vec![]).unwrap();
        let mut b = ty.construct(vec![]).unwrap();
        b.reset();
        b.reset();
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }
    assert_eq!(destroyed.load(Ordering::SeqCst), 2);

    let kept = ty.construct(vec![]).unwrap().take::<Entity>();
    assert!(kept.is_ok());
    assert_eq!(destroyed.load(Ordering::SeqCst), 2);
}

#[test]
fn test_callable_may_use_registry() {
    let ctx = create_context();
    let inner = ctx.clone();
    meta_in::<Entity>(&ctx).func_const(DESCRIBE, move |_: &Entity| resolve_all_in(&inner).len());
    meta_in::<Actor>(&ctx);

    let count = resolve_in::<Entity>(&ctx)
        .unwrap()
        .func(DESCRIBE)
        .unwrap()
        .invoke(MetaHandle::new_const_in(&ctx, &Entity::default()), vec![])
        .unwrap();
    assert_eq!(count.cast::<usize>(), Ok(2));
}

#[test]
fn test_error_messages() {
    let ctx = create_context();
    register_hierarchy(&ctx);
    let heal = resolve_in::<Actor>(&ctx).unwrap().func(HEAL).unwrap();

    let mut actor = Actor::default();
    let err = heal
        .invoke(as_handle(&ctx, &mut actor), vec![])
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "arity mismatch: expected 1 argument(s), got 0"
    );
}
