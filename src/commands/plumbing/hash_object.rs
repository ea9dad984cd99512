use crate::areas::repository::Repository;
use crate::artifacts::objects::object::{ObjectBox, frame};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;
use bytes::Bytes;

impl Repository {
    /// Hash `data` as an object of the given type, storing it when `write` is set
    ///
    /// Trees and commits must parse before they are hashed.
    pub fn hash_object(
        &self,
        data: Bytes,
        object_type: ObjectType,
        write: bool,
    ) -> anyhow::Result<ObjectId> {
        if object_type != ObjectType::Blob {
            ObjectBox::deserialize_as(object_type, data.as_ref())
                .with_context(|| format!("input is not a valid {object_type} object"))?;
        }

        let object_content = frame(object_type, &data);

        if write {
            self.database().store_serialized(object_content)
        } else {
            Ok(ObjectId::digest(&object_content))
        }
    }
}
