/// Bitmask permission model
///
/// Every role stores its grants as a single integer. Bit `i` corresponds to
/// the `i`-th [`Permission`] in declaration order, so the numeric values are
/// part of the persisted format and must never be reordered.
///
/// # Example
///
/// ```
/// use saaskit_shared::auth::permissions::{Permission, PermissionSet};
///
/// let set = PermissionSet::from_names(["ITEMS_READ", "ITEMS_CREATE"]).unwrap();
/// assert!(set.contains(Permission::ItemsRead));
/// assert!(!set.contains(Permission::ItemsDelete));
/// assert!(PermissionSet::TENANT_ADMIN.contains(Permission::ItemsDelete));
/// ```

use serde::Serialize;

/// A single grantable capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Permission {
    UsersRead = 0,
    UsersInvite,
    UsersUpdateRole,
    UsersDelete,
    RolesRead,
    RolesCreate,
    RolesUpdate,
    RolesDelete,
    ItemsRead,
    ItemsCreate,
    ItemsUpdate,
    ItemsDelete,
    CustomObjectsCreate,
    CustomObjectsRead,
    CustomObjectsUpdate,
    CustomObjectsDelete,
    RecordsCreate,
    RecordsRead,
    RecordsUpdate,
    RecordsDelete,
    CustomersCreate,
    CustomersRead,
    CustomersUpdate,
    CustomersDelete,
}

impl Permission {
    /// All permissions in bit order
    pub const ALL: [Permission; 24] = [
        Permission::UsersRead,
        Permission::UsersInvite,
        Permission::UsersUpdateRole,
        Permission::UsersDelete,
        Permission::RolesRead,
        Permission::RolesCreate,
        Permission::RolesUpdate,
        Permission::RolesDelete,
        Permission::ItemsRead,
        Permission::ItemsCreate,
        Permission::ItemsUpdate,
        Permission::ItemsDelete,
        Permission::CustomObjectsCreate,
        Permission::CustomObjectsRead,
        Permission::CustomObjectsUpdate,
        Permission::CustomObjectsDelete,
        Permission::RecordsCreate,
        Permission::RecordsRead,
        Permission::RecordsUpdate,
        Permission::RecordsDelete,
        Permission::CustomersCreate,
        Permission::CustomersRead,
        Permission::CustomersUpdate,
        Permission::CustomersDelete,
    ];

    /// Bit value of this permission
    pub const fn bit(self) -> i32 {
        1 << (self as u8)
    }

    /// Canonical upper-snake name, as used in API payloads
    pub fn name(self) -> &'static str {
        match self {
            Permission::UsersRead => "USERS_READ",
            Permission::UsersInvite => "USERS_INVITE",
            Permission::UsersUpdateRole => "USERS_UPDATE_ROLE",
            Permission::UsersDelete => "USERS_DELETE",
            Permission::RolesRead => "ROLES_READ",
            Permission::RolesCreate => "ROLES_CREATE",
            Permission::RolesUpdate => "ROLES_UPDATE",
            Permission::RolesDelete => "ROLES_DELETE",
            Permission::ItemsRead => "ITEMS_READ",
            Permission::ItemsCreate => "ITEMS_CREATE",
            Permission::ItemsUpdate => "ITEMS_UPDATE",
            Permission::ItemsDelete => "ITEMS_DELETE",
            Permission::CustomObjectsCreate => "CUSTOM_OBJECTS_CREATE",
            Permission::CustomObjectsRead => "CUSTOM_OBJECTS_READ",
            Permission::CustomObjectsUpdate => "CUSTOM_OBJECTS_UPDATE",
            Permission::CustomObjectsDelete => "CUSTOM_OBJECTS_DELETE",
            Permission::RecordsCreate => "RECORDS_CREATE",
            Permission::RecordsRead => "RECORDS_READ",
            Permission::RecordsUpdate => "RECORDS_UPDATE",
            Permission::RecordsDelete => "RECORDS_DELETE",
            Permission::CustomersCreate => "CUSTOMERS_CREATE",
            Permission::CustomersRead => "CUSTOMERS_READ",
            Permission::CustomersUpdate => "CUSTOMERS_UPDATE",
            Permission::CustomersDelete => "CUSTOMERS_DELETE",
        }
    }

    /// Looks a permission up by its canonical name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.name() == name)
    }

    /// Human-readable description shown in the permissions catalogue
    pub fn description(self) -> &'static str {
        match self {
            Permission::UsersRead => "View users in the tenant",
            Permission::UsersInvite => "Invite new users to the tenant",
            Permission::UsersUpdateRole => "Change the role of a user",
            Permission::UsersDelete => "Remove users from the tenant",
            Permission::RolesRead => "View roles and their permissions",
            Permission::RolesCreate => "Create new roles",
            Permission::RolesUpdate => "Modify existing roles",
            Permission::RolesDelete => "Delete roles",
            Permission::ItemsRead => "View items",
            Permission::ItemsCreate => "Create items",
            Permission::ItemsUpdate => "Modify items",
            Permission::ItemsDelete => "Delete items",
            Permission::CustomObjectsCreate => "Define custom objects and fields",
            Permission::CustomObjectsRead => "View custom object definitions",
            Permission::CustomObjectsUpdate => "Modify custom object definitions",
            Permission::CustomObjectsDelete => "Delete custom object definitions",
            Permission::RecordsCreate => "Create records of custom objects",
            Permission::RecordsRead => "View records of custom objects",
            Permission::RecordsUpdate => "Modify records of custom objects",
            Permission::RecordsDelete => "Delete records of custom objects",
            Permission::CustomersCreate => "Create customers",
            Permission::CustomersRead => "View customers",
            Permission::CustomersUpdate => "Modify customers",
            Permission::CustomersDelete => "Delete customers",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a payload names a permission that doesn't exist
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid permission: {0}")]
pub struct UnknownPermission(pub String);

/// A set of permissions stored as an integer bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PermissionSet(pub i32);

impl PermissionSet {
    /// No permissions
    pub const EMPTY: PermissionSet = PermissionSet(0);

    /// Every permission; granted to the built-in Admin role
    pub const TENANT_ADMIN: PermissionSet = PermissionSet((1 << Permission::ALL.len()) - 1);

    /// Returns the raw mask
    pub fn bits(self) -> i32 {
        self.0
    }

    /// Checks that every bit of `permission` is present
    pub fn contains(self, permission: Permission) -> bool {
        let required = permission.bit();
        self.0 & required == required
    }

    /// Checks that all bits of `other` are present
    pub fn contains_all(self, other: PermissionSet) -> bool {
        self.0 & other.0 == other.0
    }

    /// Adds a permission
    pub fn insert(&mut self, permission: Permission) {
        self.0 |= permission.bit();
    }

    /// Builds a set from canonical names
    ///
    /// # Errors
    ///
    /// Returns the first name that is not a known permission.
    pub fn from_names<I, S>(names: I) -> Result<Self, UnknownPermission>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = PermissionSet::EMPTY;
        for name in names {
            let name = name.as_ref();
            let permission =
                Permission::from_name(name).ok_or_else(|| UnknownPermission(name.to_string()))?;
            set.insert(permission);
        }
        Ok(set)
    }

    /// Individual permissions present in the mask, in bit order
    pub fn permissions(self) -> Vec<Permission> {
        Permission::ALL.iter().copied().filter(|p| self.contains(*p)).collect()
    }

    /// Names of the individual permissions present in the mask
    ///
    /// Composite sets such as [`PermissionSet::TENANT_ADMIN`] are decoded
    /// into their members, never reported by their own name.
    pub fn names(self) -> Vec<String> {
        self.permissions().into_iter().map(|p| p.name().to_string()).collect()
    }
}

impl From<Permission> for PermissionSet {
    fn from(permission: Permission) -> Self {
        PermissionSet(permission.bit())
    }
}

/// One entry of the permissions catalogue
#[derive(Debug, Clone, Serialize)]
pub struct PermissionInfo {
    pub name: &'static str,
    pub description: &'static str,
}

/// Permissions grouped by resource for display
#[derive(Debug, Clone, Serialize)]
pub struct PermissionGroup {
    pub group_name: String,
    pub permissions: Vec<PermissionInfo>,
}

/// Groups all permissions by the first segment of their name
///
/// `CUSTOM_OBJECTS_READ` lands in "Custom", `USERS_INVITE` in "Users".
/// Groups appear in the order their first permission is declared.
pub fn permission_groups() -> Vec<PermissionGroup> {
    let mut groups: Vec<PermissionGroup> = Vec::new();

    for permission in Permission::ALL {
        let group_name = title_case(permission.name().split('_').next().unwrap_or_default());
        let info = PermissionInfo {
            name: permission.name(),
            description: permission.description(),
        };

        match groups.iter_mut().find(|g| g.group_name == group_name) {
            Some(group) => group.permissions.push(info),
            None => groups.push(PermissionGroup {
                group_name,
                permissions: vec![info],
            }),
        }
    }

    groups
}

fn title_case(word: &str) -> String {
    let lower = word.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
