/*!
 * Raw Records
 * Record shapes as delivered by the external query collaborator
 */

use crate::core::types::{EntityId, EntityKind, FieldFlags, PrincipalId, ResourceFlags};
use serde::{Deserialize, Serialize};

/// One direct assignment: principal -> bundle-or-group
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AssignmentRecord {
    pub principal_id: PrincipalId,
    pub entity_id: EntityId,
}

/// One grant-bearing entity (bundle or group)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GrantEntityRecord {
    pub id: EntityId,
    pub name: String,
    pub kind: EntityKind,
    pub active: bool,
}

impl GrantEntityRecord {
    /// Active bundle row
    pub fn bundle(id: impl Into<EntityId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: EntityKind::Bundle,
            active: true,
        }
    }

    /// Group row with an explicit active flag
    pub fn group(id: impl Into<EntityId>, name: impl Into<String>, active: bool) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: EntityKind::Group,
            active,
        }
    }
}

/// One membership edge: group -> member bundle (or nested group)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MembershipRecord {
    pub group_id: EntityId,
    pub member_id: EntityId,
}

/// A granted permission, owned by exactly one entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PermissionRecord {
    pub owner_id: EntityId,
    #[serde(flatten)]
    pub grant: PermissionGrant,
}

impl PermissionRecord {
    pub fn new(owner_id: impl Into<EntityId>, grant: PermissionGrant) -> Self {
        Self {
            owner_id: owner_id.into(),
            grant,
        }
    }
}

/// Permission categories as a closed, exhaustively-matchable union
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "category")]
pub enum PermissionGrant {
    /// Object-type CRUD flags
    Resource {
        resource: String,
        flags: ResourceFlags,
    },
    /// Fully-qualified field read/edit flags
    Field { field: String, flags: FieldFlags },
    /// Opaque capability (code unit, document, automation, custom flag)
    Capability { capability: String, enabled: bool },
}

impl PermissionGrant {
    /// Resource grant
    pub fn resource(resource: impl Into<String>, flags: ResourceFlags) -> Self {
        Self::Resource {
            resource: resource.into(),
            flags,
        }
    }

    /// Field grant
    pub fn field(field: impl Into<String>, flags: FieldFlags) -> Self {
        Self::Field {
            field: field.into(),
            flags,
        }
    }

    /// Capability grant
    pub fn capability(capability: impl Into<String>, enabled: bool) -> Self {
        Self::Capability {
            capability: capability.into(),
            enabled,
        }
    }

    /// True if the grant confers no access at all
    pub fn is_empty(&self) -> bool {
        match self {
            PermissionGrant::Resource { flags, .. } => !flags.any(),
            PermissionGrant::Field { flags, .. } => !flags.any(),
            PermissionGrant::Capability { enabled, .. } => !enabled,
        }
    }
}
