// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Host-agnostic edit sessions for entity editor screens.
//!
//! An [`EditSession`] owns one entity's form state and tracks it against the
//! last loaded or saved [`Snapshot`]: tag-like fields are canonicalized on the
//! way in and serialized on the way out, derived fields (slugs, SEO text)
//! follow their sources until edited directly, upload slots feed the dirty
//! flag, and leave requests go through a save/discard/cancel guard.
//!
//! The host supplies transport and dialogs through [`EntityPort`] and
//! [`ConfirmPort`]; everything else runs synchronously.

pub mod auth;
pub mod canon;
pub mod catalog;
pub mod config;
pub mod derive;
pub mod error;
pub mod guard;
pub mod notice;
pub mod ports;
pub mod record;
pub mod schema;
pub mod session;
pub mod settings;
pub mod snapshot;
pub mod upload;
pub mod value;

pub use auth::{AccessPolicy, Actor, Ownership, Role, RolePolicy};
pub use canon::{canonicalize, normalize_entry, serialize, Canonical};
pub use config::{ConfigError, ConfigService, ConfigStore, SESSION_CONFIG_KEY};
pub use derive::TouchedSet;
pub use error::{FieldIssue, IssueKind, SchemaError, SessionError};
pub use guard::{
    DeleteOutcome, DeletePrompt, GuardState, LeaveChoice, LeavePrompt, NavigationOutcome,
    Resolution,
};
pub use notice::{Notice, NoticeKind, NoticeTopic};
pub use ports::{ConfirmPort, EntityPort, LookupOption, SaveReceipt};
pub use schema::{
    CollectionSpec, EntitySchema, FieldKind, FieldSpec, ScalarType, Transform, UploadArity,
    WireShape,
};
pub use session::{EditSession, LoadTicket};
pub use settings::SessionConfig;
pub use snapshot::Snapshot;
pub use upload::SlotOutcome;
pub use value::{
    FieldValue, FormState, RecordId, SlotStatus, TagCollection, TagEntry, TagKey, UploadSlot,
    UploadValue,
};
