//! Typed records for the site schema.
//!
//! Each record's `COLUMNS` is the select list its `FIELDS` mapping expects,
//! so `format!("SELECT {} FROM blogs WHERE id = ?", Blog::COLUMNS)` decodes
//! cleanly through [`Session::fetch_one_as`](crate::Session::fetch_one_as).

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::codec::{FieldKind, FieldSpec, FromRecord, FromValue, Record};
use crate::error::Result;
use crate::types::SqlValue;

/// The only authorization concept: admin or member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Member,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Role> for SqlValue {
    fn from(role: Role) -> Self {
        SqlValue::Text(role.as_str().to_string())
    }
}

impl FromValue for Role {
    fn from_value(value: &SqlValue) -> std::result::Result<Self, String> {
        match value {
            SqlValue::Text(s) if s == "admin" => Ok(Role::Admin),
            SqlValue::Text(s) if s == "member" => Ok(Role::Member),
            SqlValue::Text(s) => Err(format!("unknown role `{}`", s)),
            other => Err(format!("cannot read {} as role", other.kind_name())),
        }
    }
}

/// An email permitted to create an account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllowedEmail {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub created_at: Option<NaiveDateTime>,
}

impl AllowedEmail {
    pub const COLUMNS: &'static str = "id, email, name, role, created_at";
}

impl FromRecord for AllowedEmail {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("id", 0, FieldKind::Integer),
        FieldSpec::required("email", 1, FieldKind::Text),
        FieldSpec::required("name", 2, FieldKind::Text),
        FieldSpec::optional("role", 3, FieldKind::Text),
        FieldSpec::optional("created_at", 4, FieldKind::Timestamp),
    ];

    fn from_record(r: &Record) -> Result<Self> {
        Ok(Self {
            id: r.get("id")?,
            email: r.get("email")?,
            name: r.get("name")?,
            role: r.get::<Option<Role>>("role")?.unwrap_or_default(),
            created_at: r.get("created_at")?,
        })
    }
}

/// A member account. Passwords are stored as given.
#[derive(Clone, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub name: String,
    pub role: Role,
    pub created_at: Option<NaiveDateTime>,
}

impl User {
    pub const COLUMNS: &'static str = "id, email, password, name, role, created_at";

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("name", &self.name)
            .field("role", &self.role)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl FromRecord for User {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("id", 0, FieldKind::Integer),
        FieldSpec::required("email", 1, FieldKind::Text),
        FieldSpec::required("password", 2, FieldKind::Text),
        FieldSpec::required("name", 3, FieldKind::Text),
        FieldSpec::optional("role", 4, FieldKind::Text),
        FieldSpec::optional("created_at", 5, FieldKind::Timestamp),
    ];

    fn from_record(r: &Record) -> Result<Self> {
        Ok(Self {
            id: r.get("id")?,
            email: r.get("email")?,
            password: r.get("password")?,
            name: r.get("name")?,
            role: r.get::<Option<Role>>("role")?.unwrap_or_default(),
            created_at: r.get("created_at")?,
        })
    }
}

/// A competition report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Blog {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author_id: i64,
    pub competition_date: Option<NaiveDate>,
    pub image1_path: Option<String>,
    pub image2_path: Option<String>,
    pub published: bool,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl Blog {
    pub const COLUMNS: &'static str = "id, title, content, author_id, competition_date, \
        image1_path, image2_path, published, created_at, updated_at";
}

impl FromRecord for Blog {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("id", 0, FieldKind::Integer),
        FieldSpec::required("title", 1, FieldKind::Text),
        FieldSpec::required("content", 2, FieldKind::Text),
        FieldSpec::required("author_id", 3, FieldKind::Integer),
        FieldSpec::optional("competition_date", 4, FieldKind::Date),
        FieldSpec::optional("image1_path", 5, FieldKind::Text),
        FieldSpec::optional("image2_path", 6, FieldKind::Text),
        FieldSpec::optional("published", 7, FieldKind::Bool),
        FieldSpec::optional("created_at", 8, FieldKind::Timestamp),
        FieldSpec::optional("updated_at", 9, FieldKind::Timestamp),
    ];

    fn from_record(r: &Record) -> Result<Self> {
        Ok(Self {
            id: r.get("id")?,
            title: r.get("title")?,
            content: r.get("content")?,
            author_id: r.get("author_id")?,
            competition_date: r.get("competition_date")?,
            image1_path: r.get("image1_path")?,
            image2_path: r.get("image2_path")?,
            published: r.get::<Option<bool>>("published")?.unwrap_or(true),
            created_at: r.get("created_at")?,
            updated_at: r.get("updated_at")?,
        })
    }
}

/// Metadata for an uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub filename: String,
    pub original_filename: String,
    pub file_path: String,
    pub file_size: i64,
    pub file_type: String,
    pub mime_type: String,
    pub created_at: Option<NaiveDateTime>,
    pub last_modified: Option<NaiveDateTime>,
    pub uploaded_by: i64,
    pub download_count: i64,
    pub is_active: bool,
}

impl Resource {
    pub const COLUMNS: &'static str = "id, title, description, filename, original_filename, \
        file_path, file_size, file_type, mime_type, created_at, last_modified, uploaded_by, \
        download_count, is_active";
}

impl FromRecord for Resource {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("id", 0, FieldKind::Integer),
        FieldSpec::required("title", 1, FieldKind::Text),
        FieldSpec::optional("description", 2, FieldKind::Text),
        FieldSpec::required("filename", 3, FieldKind::Text),
        FieldSpec::required("original_filename", 4, FieldKind::Text),
        FieldSpec::required("file_path", 5, FieldKind::Text),
        FieldSpec::required("file_size", 6, FieldKind::Integer),
        FieldSpec::required("file_type", 7, FieldKind::Text),
        FieldSpec::required("mime_type", 8, FieldKind::Text),
        FieldSpec::optional("created_at", 9, FieldKind::Timestamp),
        FieldSpec::optional("last_modified", 10, FieldKind::Timestamp),
        FieldSpec::required("uploaded_by", 11, FieldKind::Integer),
        FieldSpec::optional("download_count", 12, FieldKind::Integer),
        FieldSpec::optional("is_active", 13, FieldKind::Bool),
    ];

    fn from_record(r: &Record) -> Result<Self> {
        Ok(Self {
            id: r.get("id")?,
            title: r.get("title")?,
            description: r.get("description")?,
            filename: r.get("filename")?,
            original_filename: r.get("original_filename")?,
            file_path: r.get("file_path")?,
            file_size: r.get("file_size")?,
            file_type: r.get("file_type")?,
            mime_type: r.get("mime_type")?,
            created_at: r.get("created_at")?,
            last_modified: r.get("last_modified")?,
            uploaded_by: r.get("uploaded_by")?,
            download_count: r.get::<Option<i64>>("download_count")?.unwrap_or(0),
            is_active: r.get::<Option<bool>>("is_active")?.unwrap_or(true),
        })
    }
}

/// The blog-authoring profile of a user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Author {
    pub id: i64,
    pub username: String,
    pub user_id: i64,
    pub bio: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

impl Author {
    pub const COLUMNS: &'static str = "id, username, user_id, bio, created_at";
}

impl FromRecord for Author {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("id", 0, FieldKind::Integer),
        FieldSpec::required("username", 1, FieldKind::Text),
        FieldSpec::required("user_id", 2, FieldKind::Integer),
        FieldSpec::optional("bio", 3, FieldKind::Text),
        FieldSpec::optional("created_at", 4, FieldKind::Timestamp),
    ];

    fn from_record(r: &Record) -> Result<Self> {
        Ok(Self {
            id: r.get("id")?,
            username: r.get("username")?,
            user_id: r.get("user_id")?,
            bio: r.get("bio")?,
            created_at: r.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CarouselImage {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub image_path: String,
    pub display_order: i64,
    pub active: bool,
    pub created_at: Option<NaiveDateTime>,
}

impl CarouselImage {
    pub const COLUMNS: &'static str =
        "id, title, description, image_path, display_order, active, created_at";
}

impl FromRecord for CarouselImage {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("id", 0, FieldKind::Integer),
        FieldSpec::required("title", 1, FieldKind::Text),
        FieldSpec::optional("description", 2, FieldKind::Text),
        FieldSpec::required("image_path", 3, FieldKind::Text),
        FieldSpec::optional("display_order", 4, FieldKind::Integer),
        FieldSpec::optional("active", 5, FieldKind::Bool),
        FieldSpec::optional("created_at", 6, FieldKind::Timestamp),
    ];

    fn from_record(r: &Record) -> Result<Self> {
        Ok(Self {
            id: r.get("id")?,
            title: r.get("title")?,
            description: r.get("description")?,
            image_path: r.get("image_path")?,
            display_order: r.get::<Option<i64>>("display_order")?.unwrap_or(0),
            active: r.get::<Option<bool>>("active")?.unwrap_or(true),
            created_at: r.get("created_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::types::RowSet;

    fn row(values: Vec<SqlValue>) -> crate::types::Row {
        RowSet::new(Vec::new(), vec![values]).first().unwrap()
    }

    #[test]
    fn test_blog_decodes_wire_values() {
        let blog = Blog::decode(
            0,
            &row(vec![
                SqlValue::Integer(1),
                SqlValue::Text("Harvard MUN".into()),
                SqlValue::Text("Report".into()),
                SqlValue::Integer(2),
                SqlValue::Text("2025-12-25".into()),
                SqlValue::Null,
                SqlValue::Null,
                SqlValue::Integer(0),
                SqlValue::Text("2025-12-26 09:00:00".into()),
                SqlValue::Null,
            ]),
        )
        .unwrap();

        assert_eq!(blog.competition_date, NaiveDate::from_ymd_opt(2025, 12, 25));
        assert!(!blog.published);
        assert!(blog.created_at.is_some());
        assert_eq!(blog.updated_at, None);
    }

    #[test]
    fn test_unknown_role_is_decode_error() {
        let err = AllowedEmail::decode(
            3,
            &row(vec![
                SqlValue::Integer(1),
                SqlValue::Text("a@kiit.ac.in".into()),
                SqlValue::Text("A".into()),
                SqlValue::Text("superuser".into()),
                SqlValue::Null,
            ]),
        )
        .unwrap_err();

        match err {
            StoreError::Decode { field, row, .. } => {
                assert_eq!(field, "role");
                assert_eq!(row, 3);
            }
            other => panic!("Expected Decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_null_defaults() {
        let image = CarouselImage::decode(
            0,
            &row(vec![
                SqlValue::Integer(1),
                SqlValue::Text("Opening ceremony".into()),
                SqlValue::Null,
                SqlValue::Text("uploads/carousel/1.jpg".into()),
                SqlValue::Null,
                SqlValue::Null,
                SqlValue::Null,
            ]),
        )
        .unwrap();
        assert_eq!(image.display_order, 0);
        assert!(image.active);
    }

    #[test]
    fn test_user_debug_hides_password() {
        let user = User {
            id: 1,
            email: "admin@munsociety.edu".into(),
            password: "admin123".into(),
            name: "MUN Admin".into(),
            role: Role::Admin,
            created_at: None,
        };
        assert!(user.is_admin());
        assert!(!format!("{:?}", user).contains("admin123"));
    }
}
