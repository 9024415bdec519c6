/*!
 * Core Types
 * Common types used across the engine
 */

use serde::{Deserialize, Serialize};

/// Principal (user) identifier as issued by the directory service
pub type PrincipalId = String;

/// Grant entity (bundle or group) identifier
pub type EntityId = String;

/// Snapshot identifier for a frozen graph
pub type SnapshotId = uuid::Uuid;

/// Kind of grant-bearing entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Standalone permission bundle, directly assignable
    Bundle,
    /// Named collection of bundles (or nested groups), directly assignable
    Group,
}

impl EntityKind {
    pub fn is_group(self) -> bool {
        matches!(self, EntityKind::Group)
    }
}

/// CRUD-style flags on a resource (object type)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResourceFlags {
    pub create: bool,
    pub read: bool,
    pub edit: bool,
    pub delete: bool,
    pub view_all: bool,
    pub modify_all: bool,
}

impl ResourceFlags {
    /// OR-merge another flag set into this one (idempotent, commutative)
    pub fn merge(&mut self, other: ResourceFlags) {
        self.create |= other.create;
        self.read |= other.read;
        self.edit |= other.edit;
        self.delete |= other.delete;
        self.view_all |= other.view_all;
        self.modify_all |= other.modify_all;
    }

    /// True if at least one flag is set
    pub fn any(&self) -> bool {
        self.create || self.read || self.edit || self.delete || self.view_all || self.modify_all
    }

    /// Check a single access flag
    pub fn has(&self, access: ResourceAccess) -> bool {
        match access {
            ResourceAccess::Create => self.create,
            ResourceAccess::Read => self.read,
            ResourceAccess::Edit => self.edit,
            ResourceAccess::Delete => self.delete,
            ResourceAccess::ViewAll => self.view_all,
            ResourceAccess::ModifyAll => self.modify_all,
        }
    }
}

/// Read/edit flags on a single field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FieldFlags {
    pub readable: bool,
    pub editable: bool,
}

impl FieldFlags {
    /// OR-merge another flag set into this one (idempotent, commutative)
    pub fn merge(&mut self, other: FieldFlags) {
        self.readable |= other.readable;
        self.editable |= other.editable;
    }

    /// True if at least one flag is set
    pub fn any(&self) -> bool {
        self.readable || self.editable
    }

    /// Check a single access flag
    pub fn has(&self, access: FieldAccess) -> bool {
        match access {
            FieldAccess::Read => self.readable,
            FieldAccess::Edit => self.editable,
        }
    }
}

/// A single resource-level access flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceAccess {
    Create,
    Read,
    Edit,
    Delete,
    ViewAll,
    ModifyAll,
}

/// A single field-level access flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldAccess {
    Read,
    Edit,
}

/// Reverse-query predicate: a single (key, required-flag) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PermissionPredicate {
    /// Resource-level access, e.g. "delete on Account"
    Resource {
        resource: String,
        access: ResourceAccess,
    },
    /// Field-level access, e.g. "edit on Account.AnnualRevenue"
    Field { field: String, access: FieldAccess },
    /// An enabled opaque capability (code unit, document, automation, flag)
    Capability { capability: String },
}

impl PermissionPredicate {
    /// Resource predicate
    pub fn resource(resource: impl Into<String>, access: ResourceAccess) -> Self {
        Self::Resource {
            resource: resource.into(),
            access,
        }
    }

    /// Field predicate
    pub fn field(field: impl Into<String>, access: FieldAccess) -> Self {
        Self::Field {
            field: field.into(),
            access,
        }
    }

    /// Capability predicate
    pub fn capability(capability: impl Into<String>) -> Self {
        Self::Capability {
            capability: capability.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_flags_merge() {
        let mut a = ResourceFlags {
            read: true,
            ..Default::default()
        };
        let b = ResourceFlags {
            delete: true,
            ..Default::default()
        };
        a.merge(b);
        assert!(a.read);
        assert!(a.delete);
        assert!(!a.create);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut a = ResourceFlags {
            edit: true,
            ..Default::default()
        };
        let before = a;
        a.merge(before);
        assert_eq!(a, before);
    }

    #[test]
    fn test_flag_lookup() {
        let flags = ResourceFlags {
            view_all: true,
            ..Default::default()
        };
        assert!(flags.has(ResourceAccess::ViewAll));
        assert!(!flags.has(ResourceAccess::ModifyAll));

        let fields = FieldFlags {
            editable: true,
            ..Default::default()
        };
        assert!(fields.has(FieldAccess::Edit));
        assert!(!fields.has(FieldAccess::Read));
    }

    #[test]
    fn test_predicate_serialization() {
        let pred = PermissionPredicate::resource("Account", ResourceAccess::Delete);
        let json = serde_json::to_string(&pred).unwrap();
        let back: PermissionPredicate = serde_json::from_str(&json).unwrap();
        assert_eq!(pred, back);
    }
}
