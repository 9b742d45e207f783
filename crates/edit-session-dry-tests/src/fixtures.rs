// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Record and actor fixtures shared by edit-session tests.

use edit_session_core::auth::{Actor, Role};
use edit_session_core::catalog;
use edit_session_core::schema::EntitySchema;
use edit_session_core::settings::SessionConfig;
use serde_json::{json, Value};
use std::sync::Arc;

/// Id of [`project_record`].
pub const PROJECT_ID: i64 = 42;
/// Id of [`blog_record`].
pub const BLOG_ID: i64 = 5;
/// Owner of both fixture records.
pub const OWNER_ID: i64 = 7;

/// Admin actor (id 1).
pub fn admin() -> Actor {
    Actor::new(1, Role::Admin)
}

/// Editor who owns the fixture records.
pub fn owner() -> Actor {
    Actor::new(OWNER_ID, Role::Editor)
}

/// Editor who owns nothing in the fixtures.
pub fn stranger() -> Actor {
    Actor::new(99, Role::Editor)
}

/// Read-only actor.
pub fn viewer() -> Actor {
    Actor::new(3, Role::Viewer)
}

/// Project schema with default limits.
#[allow(clippy::expect_used)]
pub fn project_schema() -> Arc<EntitySchema> {
    Arc::new(catalog::project(&SessionConfig::default()).expect("project catalog schema"))
}

/// Blog schema with default limits.
#[allow(clippy::expect_used)]
pub fn blog_schema() -> Arc<EntitySchema> {
    Arc::new(catalog::blog(&SessionConfig::default()).expect("blog catalog schema"))
}

/// A saved project as the server returns it: numeric strings, object-list
/// skills and no stored slug.
pub fn project_record() -> Value {
    json!({
        "id": PROJECT_ID,
        "client_id": OWNER_ID,
        "project_title": "Demo",
        "description": "Short promo cut for a product launch.",
        "categories": [{"id": 2, "category_name": "Commercial"}],
        "skills": [
            {"skill_id": 11, "skill_name": "Editing"},
            {"skill_id": 12, "skill_name": "Color"}
        ],
        "thumbnail": "https://cdn.example/thumb.png",
        "gallery": ["https://cdn.example/g1.png"],
        "budget": "1500"
    })
}

/// A saved blog post with tags as a JSON-encoded string.
pub fn blog_record() -> Value {
    json!({
        "id": BLOG_ID,
        "author_id": OWNER_ID,
        "title": "Hello World",
        "slug": "hello-world",
        "content": "<p>First post on the new blog.</p>",
        "tags": "[\"video\",\"audio\"]",
        "cover_image": {"url": "https://cdn.example/cover.png"}
    })
}
