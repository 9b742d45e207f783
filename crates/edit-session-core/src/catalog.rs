// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Schemas for the marketplace editor screens.

use crate::error::SchemaError;
use crate::schema::{CollectionSpec, EntitySchema, FieldSpec, Transform};
use crate::settings::SessionConfig;

fn slug(cfg: &SessionConfig) -> Transform {
    Transform::Slugify {
        max_len: cfg.slug_max_len,
    }
}

fn seo_title(cfg: &SessionConfig) -> Transform {
    Transform::Truncate {
        max_chars: cfg.seo_title_max,
    }
}

fn seo_description(cfg: &SessionConfig) -> Transform {
    Transform::Excerpt {
        max_chars: cfg.seo_description_max,
    }
}

fn skills() -> CollectionSpec {
    CollectionSpec::object_list("skill_name").with_id_key("skill_id")
}

/// Project editor. Owned by the client who posted it.
pub fn project(cfg: &SessionConfig) -> Result<EntitySchema, SchemaError> {
    EntitySchema::new(
        "project",
        vec![
            FieldSpec::text("project_title").required(),
            FieldSpec::derived("url", ["project_title"], slug(cfg)),
            FieldSpec::text("description"),
            FieldSpec::derived("seo_title", ["project_title"], seo_title(cfg)),
            FieldSpec::derived("seo_description", ["description"], seo_description(cfg)),
            FieldSpec::tags("categories", CollectionSpec::array().with_label_key("category_name")),
            FieldSpec::tags("skills", skills()),
            FieldSpec::upload("thumbnail"),
            FieldSpec::uploads("gallery"),
            FieldSpec::number("budget"),
        ],
    )
    .map(|s| s.with_owner_key("client_id"))
}

/// Client profile editor.
pub fn client(_cfg: &SessionConfig) -> Result<EntitySchema, SchemaError> {
    EntitySchema::new(
        "client",
        vec![
            FieldSpec::text("name").required(),
            FieldSpec::text("email").required(),
            FieldSpec::text("company"),
            FieldSpec::upload("avatar"),
            FieldSpec::tags("tags", CollectionSpec::array()),
        ],
    )
    .map(|s| s.with_owner_key("user_id"))
}

/// Freelancer (editor) profile editor.
pub fn freelancer(cfg: &SessionConfig) -> Result<EntitySchema, SchemaError> {
    EntitySchema::new(
        "freelancer",
        vec![
            FieldSpec::text("full_name").required(),
            FieldSpec::derived("profile_url", ["full_name"], slug(cfg)),
            FieldSpec::text("headline"),
            FieldSpec::text("bio"),
            FieldSpec::tags("skills", skills()),
            FieldSpec::number("hourly_rate"),
            FieldSpec::uploads("portfolio"),
            FieldSpec::upload("avatar"),
        ],
    )
    .map(|s| s.with_owner_key("user_id"))
}

/// Blog post editor. Owned by its author.
pub fn blog(cfg: &SessionConfig) -> Result<EntitySchema, SchemaError> {
    EntitySchema::new(
        "blog",
        vec![
            FieldSpec::text("title").required(),
            FieldSpec::derived("slug", ["title"], slug(cfg)),
            FieldSpec::text("content").required(),
            FieldSpec::tags("tags", CollectionSpec::json_string()),
            FieldSpec::upload("cover_image"),
            FieldSpec::derived("meta_title", ["title"], seo_title(cfg)),
            FieldSpec::derived("meta_description", ["content"], seo_description(cfg)),
        ],
    )
    .map(|s| s.with_owner_key("author_id"))
}
