//! Permissions known to the example API.

use crate::security::permission::Permission;

pub const VIEW_USERS: Permission = Permission::new(1);
pub const EDIT_USERS: Permission = Permission::new(2);
pub const DELETE_USERS: Permission = Permission::new(3);
pub const ADMIN: Permission = Permission::new(10);

/// Granted to every authenticated user without an explicit grant entry.
pub const DEFAULT_GRANTS: [Permission; 3] = [VIEW_USERS, EDIT_USERS, ADMIN];
