//! End-to-end tests for entigraph-orm
//!
//! Tests cover relation assignment, fill/get-or-create flows, duplicate
//! saves, attribute policies, subtypes and delete hooks.

use crate::error::{ModelError, ModelResult};
use crate::events::EntityEvent;
use crate::field::Field;
use crate::model::{DeleteOptions, Entity, ModelRegistry};
use crate::relationships::Direction;
use crate::schema::{ModelDef, RelationDef, Schema};
use entigraph_core::StoreConfig;
use serde_json::{json, Value};

fn blog() -> ModelRegistry {
    Schema::new()
        .model(
            ModelDef::new("User")
                .field("name", Field::string())
                .has_many("posts", "Post")
                .has_one("profile", "Profile")
                .belongs_to_many("roles", "Role")
                .cascades(["posts"]),
        )
        .model(
            ModelDef::new("Post")
                .field("title", Field::string())
                .belongs_to("user", "User"),
        )
        .model(
            ModelDef::new("Profile")
                .field("bio", Field::string())
                .belongs_to("user", "User"),
        )
        .model(
            ModelDef::new("Role")
                .field("label", Field::string())
                .belongs_to_many("users", "User"),
        )
        .boot()
        .unwrap()
}

fn ids(entities: &[Entity]) -> Vec<Value> {
    entities.iter().filter_map(|e| e.get("id")).collect()
}

#[test]
fn test_create_with_nested_has_many() {
    let mut registry = blog();
    let user = registry
        .create(
            "User",
            json!({
                "id": "u1",
                "name": "Ada",
                "posts": [
                    { "id": "p1", "title": "First" },
                    { "id": "p2", "title": "Second" }
                ]
            }),
        )
        .unwrap();

    let posts = registry.related_many(&user, "posts").unwrap();
    assert_eq!(ids(&posts), vec![json!("p1"), json!("p2")]);
    assert_eq!(posts[0].get("userId"), Some(json!("u1")));
}

#[test]
fn test_fill_replaces_loaded_has_many() {
    let mut registry = blog();
    let user = registry
        .create(
            "User",
            json!({ "id": "u1", "posts": [{ "id": "p1" }, { "id": "p2" }] }),
        )
        .unwrap();
    assert_eq!(registry.related_many(&user, "posts").unwrap().len(), 2);

    registry
        .fill(&user, json!({ "posts": [{ "id": "p3", "title": "Only" }] }))
        .unwrap();

    let posts = registry.related_many(&user, "posts").unwrap();
    assert_eq!(ids(&posts), vec![json!("p3")]);
    assert_eq!(registry.count("Post").unwrap(), 1);
}

#[test]
fn test_has_one_assignment() {
    let mut registry = blog();
    let user = registry.create("User", json!({ "id": "u1" })).unwrap();
    registry
        .assign_relation(&user, "profile", json!({ "id": "pr1", "bio": "hi" }))
        .unwrap();

    let profile = registry.related_one(&user, "profile").unwrap().unwrap();
    assert_eq!(profile.get("bio"), Some(json!("hi")));
    assert_eq!(registry.related_one(&profile, "user").unwrap(), Some(user.clone()));

    registry
        .assign_relation(&user, "profile", json!({ "id": "pr2", "bio": "new" }))
        .unwrap();
    let profile = registry.related_one(&user, "profile").unwrap().unwrap();
    assert_eq!(profile.get("id"), Some(json!("pr2")));
    assert!(registry.get("Profile", "pr1").unwrap().is_none());
}

#[test]
fn test_has_one_keeps_newer_profile_when_older_moves() {
    let mut registry = blog();
    let ada = registry.create("User", json!({ "id": "u1" })).unwrap();
    let bob = registry.create("User", json!({ "id": "u2" })).unwrap();
    let first = registry
        .create("Profile", json!({ "id": "pr1", "userId": "u1" }))
        .unwrap();
    assert_eq!(registry.related_one(&ada, "profile").unwrap(), Some(first.clone()));
    assert!(registry.related_one(&bob, "profile").unwrap().is_none());

    let second = registry
        .create("Profile", json!({ "id": "pr2", "userId": "u1" }))
        .unwrap();
    assert_eq!(registry.related_one(&ada, "profile").unwrap(), Some(second.clone()));

    // Moving the older profile away must not clear the newer link.
    registry.set(&first, "userId", json!("u2")).unwrap();
    assert_eq!(registry.related_one(&ada, "profile").unwrap(), Some(second));
    assert_eq!(registry.related_one(&bob, "profile").unwrap(), Some(first));
}

#[test]
fn test_belongs_to_assignment_and_clear() {
    let mut registry = blog();
    let post = registry
        .create(
            "Post",
            json!({ "id": "p1", "title": "x", "user": { "id": "u2", "name": "Bob" } }),
        )
        .unwrap();

    let user = registry.get("User", "u2").unwrap().unwrap();
    assert_eq!(post.get("userId"), Some(json!("u2")));
    assert_eq!(registry.related_one(&post, "user").unwrap(), Some(user.clone()));
    assert_eq!(registry.related_many(&user, "posts").unwrap(), vec![post.clone()]);

    registry.fill(&post, json!({ "user": null })).unwrap();
    assert_eq!(post.get("userId"), Some(Value::Null));
    assert!(registry.related_one(&post, "user").unwrap().is_none());
    assert!(registry.related_many(&user, "posts").unwrap().is_empty());
}

#[test]
fn test_has_many_by_appends_without_duplicates() {
    let mut registry = Schema::new()
        .model(ModelDef::new("Playlist").has_many_by("songs", "Song"))
        .model(ModelDef::new("Song").field("title", Field::string()))
        .boot()
        .unwrap();

    let playlist = registry
        .create(
            "Playlist",
            json!({ "id": "l1", "songs": [{ "id": "s1" }, { "id": "s2" }, { "id": "s1" }] }),
        )
        .unwrap();
    assert_eq!(playlist.get("songIds"), Some(json!(["s1", "s2"])));

    registry
        .assign_relation(&playlist, "songs", json!({ "id": "s3" }))
        .unwrap();
    let songs = registry.related_many(&playlist, "songs").unwrap();
    assert_eq!(ids(&songs), vec![json!("s1"), json!("s2"), json!("s3")]);
}

#[test]
fn test_belongs_to_many_assignment_replaces_linked_records() {
    let mut registry = blog();
    let user = registry
        .create(
            "User",
            json!({ "id": "u1", "roles": [{ "id": "r1" }, { "id": "r2" }] }),
        )
        .unwrap();
    let pivot = registry.pivot("User", "Role").unwrap();
    assert_eq!(pivot, "Role_User");
    assert_eq!(registry.count(&pivot).unwrap(), 2);

    let roles = registry.related_many(&user, "roles").unwrap();
    assert_eq!(ids(&roles), vec![json!("r1"), json!("r2")]);

    let r1 = registry.get("Role", "r1").unwrap().unwrap();
    assert_eq!(registry.related_many(&r1, "users").unwrap(), vec![user.clone()]);

    // Old roles and their join rows go; the same link twice creates one row.
    registry.assign_relation(&user, "roles", json!([{ "id": "r3" }, { "id": "r3" }])).unwrap();
    assert_eq!(registry.count(&pivot).unwrap(), 1);
    assert_eq!(registry.count("Role").unwrap(), 1);
    assert!(!registry.is_stored(&r1));
    assert!(registry.get("Role", "r2").unwrap().is_none());
    assert_eq!(ids(&registry.related_many(&user, "roles").unwrap()), vec![json!("r3")]);
}

#[test]
fn test_cascade_over_belongs_to_many_deletes_far_records() {
    let mut registry = Schema::new()
        .model(ModelDef::new("User").belongs_to_many("roles", "Role").cascades(["roles"]))
        .model(ModelDef::new("Role").belongs_to_many("users", "User"))
        .boot()
        .unwrap();

    let user = registry
        .create(
            "User",
            json!({ "id": "u1", "roles": [{ "id": "r1" }, { "id": "r2" }] }),
        )
        .unwrap();
    let other = registry.create("User", json!({ "id": "u2" })).unwrap();
    registry.assign_relation(&other, "roles", json!({ "id": "r9" })).unwrap();
    let pivot = registry.pivot("User", "Role").unwrap();
    assert_eq!(registry.count(&pivot).unwrap(), 3);

    assert!(registry.delete(&user).unwrap());
    assert_eq!(ids(&registry.all("Role").unwrap()), vec![json!("r9")]);
    assert_eq!(registry.count(&pivot).unwrap(), 1);
    assert_eq!(ids(&registry.related_many(&other, "roles").unwrap()), vec![json!("r9")]);
}

#[test]
fn test_get_or_create_and_fill_or_create() {
    let mut registry = blog();
    let user = registry.create("User", json!({ "id": "u1", "name": "Ada" })).unwrap();

    let same = registry
        .get_or_create("User", json!({ "id": "u1", "name": "Other" }))
        .unwrap();
    assert!(same.is(&user));
    assert_eq!(user.get("name"), Some(json!("Ada")));

    let same = registry
        .fill_or_create("User", json!({ "id": "u1", "name": "Grace" }))
        .unwrap();
    assert!(same.is(&user));
    assert_eq!(user.get("name"), Some(json!("Grace")));

    let created = registry
        .fill_or_create_all("User", vec![json!({ "id": "u1" }), json!({ "id": "u2" })])
        .unwrap();
    assert_eq!(ids(&created), vec![json!("u1"), json!("u2")]);
    assert_eq!(registry.count("User").unwrap(), 2);
}

#[test]
fn test_duplicate_save_merges_and_moves_child() {
    let mut registry = blog();
    let u1 = registry.create("User", json!({ "id": "u1" })).unwrap();
    let u2 = registry.create("User", json!({ "id": "u2" })).unwrap();
    let post = registry
        .create("Post", json!({ "id": "p1", "title": "old", "userId": "u1" }))
        .unwrap();
    assert_eq!(registry.related_many(&u1, "posts").unwrap().len(), 1);
    assert!(registry.related_many(&u2, "posts").unwrap().is_empty());

    let copy = registry
        .make("Post", json!({ "id": "p1", "title": "new", "userId": "u2" }))
        .unwrap();
    let saved = registry.save(&copy).unwrap();

    assert!(saved.is(&post));
    assert!(!saved.is(&copy));
    assert_eq!(post.get("title"), Some(json!("new")));
    assert!(registry.related_many(&u1, "posts").unwrap().is_empty());
    assert_eq!(registry.related_many(&u2, "posts").unwrap(), vec![post]);
}

#[test]
fn test_primary_key_is_immutable_once_stored() {
    let mut registry = blog();
    let draft = registry.make("User", json!({ "id": "u1" })).unwrap();
    registry.set(&draft, "id", json!("u9")).unwrap();
    assert_eq!(draft.get("id"), Some(json!("u9")));

    let user = registry.save(&draft).unwrap();
    let err = registry.set(&user, "id", json!("u10")).unwrap_err();
    assert!(matches!(err, ModelError::ImmutableKey { .. }));
    assert!(registry.get("User", "u9").unwrap().is_some());
}

#[test]
fn test_unknown_attributes() {
    let mut registry = blog();
    let user = registry.create("User", json!({ "id": "u1", "nickname": "x" })).unwrap();
    assert_eq!(user.get("nickname"), None);

    let mut strict = Schema::with_config(StoreConfig::testing())
        .model(ModelDef::new("User").field("name", Field::string()))
        .boot()
        .unwrap();
    let err = strict
        .create("User", json!({ "id": "u1", "nickname": "x" }))
        .unwrap_err();
    assert_eq!(
        err,
        ModelError::UnknownField {
            model: "User".into(),
            field: "nickname".into()
        }
    );
    assert_eq!(strict.count("User").unwrap(), 0);
}

#[test]
fn test_nullability_and_sanitizing() {
    let mut registry = Schema::new()
        .model(
            ModelDef::new("Item")
                .field("name", Field::string())
                .field("qty", Field::number())
                .field("note", Field::string().nullable())
                .field("tag", Field::string().default("misc")),
        )
        .boot()
        .unwrap();

    let item = registry.create("Item", json!({ "id": 7, "qty": "3" })).unwrap();
    assert_eq!(item.get("id"), Some(json!("7")));
    assert_eq!(item.get("qty"), Some(json!(3)));
    assert_eq!(item.get("name"), Some(json!("")));
    assert_eq!(item.get("note"), Some(Value::Null));
    assert_eq!(item.get("tag"), Some(json!("misc")));

    let err = registry.set(&item, "name", Value::Null).unwrap_err();
    assert!(matches!(err, ModelError::NotNullable { .. }));
    registry.set(&item, "tag", Value::Null).unwrap();
    assert_eq!(item.get("tag"), Some(json!("misc")));

    let err = registry.set(&item, "qty", json!("many")).unwrap_err();
    assert!(matches!(err, ModelError::InvalidValue { .. }));
    assert!(!err.is_configuration());
}

#[test]
fn test_subtypes_share_store_and_relations() {
    let mut registry = Schema::new()
        .model(ModelDef::new("User").field("name", Field::string()).has_many("posts", "Post"))
        .model(ModelDef::new("Admin").extends("User").field("level", Field::number()))
        .model(ModelDef::new("Post").belongs_to("user", "User"))
        .boot()
        .unwrap();

    let admin = registry.create("Admin", json!({ "id": "a1", "level": 2 })).unwrap();
    let as_user = registry.get("User", "a1").unwrap().unwrap();
    assert!(as_user.is(&admin));
    assert_eq!(as_user.model_name(), "Admin");

    assert!(registry.related_many(&admin, "posts").unwrap().is_empty());
    let post = registry.create("Post", json!({ "id": "p1", "userId": "a1" })).unwrap();
    assert_eq!(registry.related_many(&admin, "posts").unwrap(), vec![post.clone()]);
    assert_eq!(registry.related_one(&post, "user").unwrap(), Some(admin));
}

#[test]
fn test_relation_ordering() {
    let mut registry = Schema::new()
        .model(
            ModelDef::new("User")
                .relation(RelationDef::has_many("posts", "Post").order_by("rank", Direction::Desc))
                .relation(
                    RelationDef::has_many("byTitle", "Post").order_with(|a: &Entity, b: &Entity| {
                        let title = |e: &Entity| e.get("title").unwrap_or(Value::Null).to_string();
                        title(a).cmp(&title(b))
                    }),
                ),
        )
        .model(
            ModelDef::new("Post")
                .field("rank", Field::number())
                .field("title", Field::string()),
        )
        .boot()
        .unwrap();

    let user = registry.create("User", json!({ "id": "u1" })).unwrap();
    registry
        .create_all(
            "Post",
            vec![
                json!({ "id": "p1", "rank": 1, "title": "b", "userId": "u1" }),
                json!({ "id": "p2", "rank": 3, "title": "c", "userId": "u1" }),
                json!({ "id": "p3", "rank": 2, "title": "a", "userId": "u1" }),
            ],
        )
        .unwrap();

    let ranked = registry.related_many(&user, "posts").unwrap();
    assert_eq!(ids(&ranked), vec![json!("p2"), json!("p3"), json!("p1")]);
    let titled = registry.related_many(&user, "byTitle").unwrap();
    assert_eq!(ids(&titled), vec![json!("p3"), json!("p1"), json!("p2")]);
}

#[test]
fn test_delete_hook_sees_cascade_order() {
    let mut registry = blog();
    let user = registry
        .create("User", json!({ "id": "u1", "posts": [{ "id": "p1" }, { "id": "p2" }] }))
        .unwrap();

    let mut seen = Vec::new();
    let mut hook = |_: &mut ModelRegistry, entity: &Entity| -> ModelResult<()> {
        seen.push(entity.get("id").unwrap_or(Value::Null));
        Ok(())
    };
    let deleted = registry
        .delete_with(&user, DeleteOptions::new().before_delete(&mut hook))
        .unwrap();

    assert!(deleted);
    assert_eq!(seen, vec![json!("u1"), json!("p1"), json!("p2")]);
    assert_eq!(registry.count("Post").unwrap(), 0);
    assert_eq!(registry.count("User").unwrap(), 0);
}

#[test]
fn test_delete_hook_failure_leaves_partial_cascade() {
    let mut registry = blog();
    let user = registry
        .create("User", json!({ "id": "u1", "posts": [{ "id": "p1" }, { "id": "p2" }] }))
        .unwrap();

    let mut hook = |_: &mut ModelRegistry, entity: &Entity| -> ModelResult<()> {
        if entity.get("id") == Some(json!("p2")) {
            return Err(ModelError::Hook("p2 is locked".into()));
        }
        Ok(())
    };
    let err = registry
        .delete_with(&user, DeleteOptions::new().before_delete(&mut hook))
        .unwrap_err();

    assert_eq!(err, ModelError::Hook("p2 is locked".into()));
    assert!(registry.get("Post", "p1").unwrap().is_none());
    assert!(registry.get("Post", "p2").unwrap().is_some());
    assert!(registry.is_stored(&user));
}

#[test]
fn test_delete_without_cascade_keeps_children() {
    let mut registry = blog();
    let user = registry
        .create("User", json!({ "id": "u1", "posts": [{ "id": "p1" }] }))
        .unwrap();

    assert!(registry.delete_with(&user, DeleteOptions::new().without_cascade()).unwrap());
    let post = registry.get("Post", "p1").unwrap().unwrap();
    assert!(registry.related_one(&post, "user").unwrap().is_none());
}

#[test]
fn test_cascade_cycle_terminates() {
    let mut registry = Schema::new()
        .model(ModelDef::new("User").has_many("posts", "Post").cascades(["posts"]))
        .model(ModelDef::new("Post").belongs_to("user", "User").cascades(["user"]))
        .boot()
        .unwrap();

    let user = registry
        .create("User", json!({ "id": "u1", "posts": [{ "id": "p1" }] }))
        .unwrap();
    let post = registry.get("Post", "p1").unwrap().unwrap();

    assert!(registry.delete(&post).unwrap());
    assert!(!registry.is_stored(&user));
    assert_eq!(registry.count("Post").unwrap(), 0);
}

#[test]
fn test_delete_veto_and_unstored() {
    let mut registry = blog();
    let user = registry.create("User", json!({ "id": "u1" })).unwrap();
    let id = user.on(EntityEvent::Delete, |_| false);

    assert!(!registry.delete(&user).unwrap());
    assert!(registry.is_stored(&user));

    assert!(user.off(EntityEvent::Delete, id));
    assert!(registry.delete(&user).unwrap());
    assert!(!registry.delete(&user).unwrap());

    let draft = registry.make("User", json!({ "id": "u2" })).unwrap();
    assert!(!registry.delete(&draft).unwrap());
}

#[test]
fn test_get_many_drops_missing_keys() {
    let mut registry = blog();
    registry
        .create_all("User", vec![json!({ "id": "u1" }), json!({ "id": "u2" })])
        .unwrap();

    let found = registry.get_many("User", ["u2", "nope", "u1"]).unwrap();
    assert_eq!(ids(&found), vec![json!("u2"), json!("u1")]);
}
