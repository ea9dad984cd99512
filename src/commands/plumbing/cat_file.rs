use crate::areas::repository::Repository;
use crate::artifacts::objects::object::ObjectBox;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::RepositoryError;
use bytes::Bytes;

/// Shortest abbreviated hash `cat-file` accepts
pub const MIN_CAT_FILE_PREFIX: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatFileMode {
    /// Raw payload, which must be of this type
    Typed(ObjectType),
    Size,
    Type,
    Pretty,
}

impl Repository {
    /// Bytes to print for `cat-file`; the object may be named by a unique prefix
    pub fn cat_file(&self, mode: CatFileMode, object: &str) -> anyhow::Result<Bytes> {
        let oid = self.database().find_object(object, MIN_CAT_FILE_PREFIX)?;
        let (object_type, payload) = self.database().load_payload(&oid)?;

        let output = match mode {
            CatFileMode::Typed(expected) if expected != object_type => {
                return Err(RepositoryError::UnexpectedObjectType {
                    oid,
                    expected,
                    found: object_type,
                }
                .into());
            }
            CatFileMode::Typed(_) => payload,
            CatFileMode::Size => Bytes::from(format!("{}\n", payload.len())),
            CatFileMode::Type => Bytes::from(format!("{object_type}\n")),
            CatFileMode::Pretty => match self.database().parse_object(&oid)? {
                ObjectBox::Blob(blob) => blob.into_content(),
                other => {
                    let mut text = other.display();
                    if !text.is_empty() && !text.ends_with('\n') {
                        text.push('\n');
                    }
                    Bytes::from(text)
                }
            },
        };

        Ok(output)
    }
}
