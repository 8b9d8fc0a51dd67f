//! Role and permission table.
//!
//! The vocabulary is fixed. Built-in roles carry a default permission set;
//! custom roles stored in the database may only reference members of the
//! vocabulary.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Editor,
    Client,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::SuperAdmin, Role::Admin, Role::Editor, Role::Client];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Admin => "admin",
            Role::Editor => "editor",
            Role::Client => "client",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(value.trim()))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "Super Admin",
            Role::Admin => "Admin",
            Role::Editor => "Editor",
            Role::Client => "Client",
        }
    }

    /// Staff roles show up in the admin user list; clients are listed separately.
    pub fn is_staff(&self) -> bool {
        !matches!(self, Role::Client)
    }

    pub fn default_permissions(&self) -> Vec<Permission> {
        use Permission::*;
        match self {
            Role::SuperAdmin => Permission::ALL.to_vec(),
            Role::Admin => vec![
                ContentRead,
                ContentWrite,
                ContentPublish,
                ContentDelete,
                MediaRead,
                MediaUpload,
                MediaEdit,
                MediaDelete,
                UsersRead,
                UsersCreate,
                UsersEdit,
                UsersDelete,
                ApplicationsRead,
                ApplicationsEdit,
                ApplicationsDelete,
                ContactsRead,
                ContactsEdit,
                ContactsDelete,
                SettingsRead,
                SettingsWrite,
                AnalyticsRead,
            ],
            Role::Editor => vec![
                ContentRead,
                ContentWrite,
                ContentPublish,
                NewsRead,
                NewsWrite,
                NewsPublish,
                NewsDelete,
                MediaRead,
                MediaUse,
                AnalyticsRead,
            ],
            Role::Client => vec![ContentRead, ApplicationsRead],
        }
    }

    pub fn has(&self, permission: Permission) -> bool {
        self.default_permissions().contains(&permission)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    SuperAdminAll,
    UsersManageAll,
    RolesAssign,
    VisitorsView,
    ContentRead,
    ContentWrite,
    ContentPublish,
    ContentDelete,
    NewsRead,
    NewsWrite,
    NewsPublish,
    NewsDelete,
    MediaRead,
    MediaUpload,
    MediaUse,
    MediaEdit,
    MediaDelete,
    UsersRead,
    UsersCreate,
    UsersEdit,
    UsersDelete,
    ApplicationsRead,
    ApplicationsEdit,
    ApplicationsDelete,
    ContactsRead,
    ContactsEdit,
    ContactsDelete,
    SettingsRead,
    SettingsWrite,
    AnalyticsRead,
}

impl Permission {
    pub const ALL: [Permission; 30] = [
        Permission::SuperAdminAll,
        Permission::UsersManageAll,
        Permission::RolesAssign,
        Permission::VisitorsView,
        Permission::ContentRead,
        Permission::ContentWrite,
        Permission::ContentPublish,
        Permission::ContentDelete,
        Permission::NewsRead,
        Permission::NewsWrite,
        Permission::NewsPublish,
        Permission::NewsDelete,
        Permission::MediaRead,
        Permission::MediaUpload,
        Permission::MediaUse,
        Permission::MediaEdit,
        Permission::MediaDelete,
        Permission::UsersRead,
        Permission::UsersCreate,
        Permission::UsersEdit,
        Permission::UsersDelete,
        Permission::ApplicationsRead,
        Permission::ApplicationsEdit,
        Permission::ApplicationsDelete,
        Permission::ContactsRead,
        Permission::ContactsEdit,
        Permission::ContactsDelete,
        Permission::SettingsRead,
        Permission::SettingsWrite,
        Permission::AnalyticsRead,
    ];

    pub fn as_str(&self) -> &'static str {
        self.describe().0
    }

    pub fn parse(value: &str) -> Option<Permission> {
        Permission::ALL.into_iter().find(|p| p.as_str() == value)
    }

    pub fn name(&self) -> &'static str {
        self.describe().1
    }

    pub fn description(&self) -> &'static str {
        self.describe().2
    }

    /// (key, display name, description)
    fn describe(&self) -> (&'static str, &'static str, &'static str) {
        use Permission::*;
        match self {
            SuperAdminAll => ("super_admin.all", "Super Admin Access", "Full system control"),
            UsersManageAll => (
                "users.manage_all",
                "Manage All Users",
                "Add, remove, and assign roles to all users",
            ),
            RolesAssign => (
                "roles.assign",
                "Assign Roles",
                "Assign and change user roles and permissions",
            ),
            VisitorsView => (
                "visitors.view",
                "View Visitors",
                "See visitor analytics and tracking data",
            ),
            ContentRead => ("content.read", "Read Content", "View pages, services, divisions"),
            ContentWrite => ("content.write", "Write Content", "Create and edit content"),
            ContentPublish => ("content.publish", "Publish Content", "Publish content to live site"),
            ContentDelete => ("content.delete", "Delete Content", "Delete pages and content"),
            NewsRead => ("news.read", "Read News", "View news articles"),
            NewsWrite => ("news.write", "Write News", "Create and edit news articles"),
            NewsPublish => ("news.publish", "Publish News", "Publish news to public site"),
            NewsDelete => ("news.delete", "Delete News", "Remove news articles"),
            MediaRead => ("media.read", "Read Media", "View media library"),
            MediaUpload => ("media.upload", "Upload Media", "Upload new media files"),
            MediaUse => ("media.use", "Use Media", "Use existing media in content"),
            MediaEdit => ("media.edit", "Edit Media", "Edit media metadata"),
            MediaDelete => ("media.delete", "Delete Media", "Delete media files"),
            UsersRead => ("users.read", "Read Users", "View user accounts"),
            UsersCreate => ("users.create", "Create Users", "Create new user accounts"),
            UsersEdit => ("users.edit", "Edit Users", "Edit user information"),
            UsersDelete => ("users.delete", "Delete Users", "Delete user accounts"),
            ApplicationsRead => (
                "applications.read",
                "Read Applications",
                "View project applications",
            ),
            ApplicationsEdit => (
                "applications.edit",
                "Edit Applications",
                "Update application status",
            ),
            ApplicationsDelete => (
                "applications.delete",
                "Delete Applications",
                "Delete applications",
            ),
            ContactsRead => ("contacts.read", "Read Contacts", "View contact inquiries"),
            ContactsEdit => ("contacts.edit", "Edit Contacts", "Update contact status"),
            ContactsDelete => ("contacts.delete", "Delete Contacts", "Delete contact records"),
            SettingsRead => ("settings.read", "Read Settings", "View system settings"),
            SettingsWrite => ("settings.write", "Write Settings", "Update system settings"),
            AnalyticsRead => ("analytics.read", "Read Analytics", "View analytics and reports"),
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Permission {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Permission::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown permission '{}'", raw)))
    }
}

/// Returns the entries of `requested` that are not part of the vocabulary.
pub fn unknown_permissions(requested: &[String]) -> Vec<String> {
    requested
        .iter()
        .filter(|p| Permission::parse(p).is_none())
        .cloned()
        .collect()
}

/// Extra permission needed to hand out `role` to a user, beyond users.create/edit.
pub fn assignment_permission(role: Role) -> Option<Permission> {
    match role {
        Role::SuperAdmin | Role::Admin => Some(Permission::RolesAssign),
        Role::Editor | Role::Client => None,
    }
}
