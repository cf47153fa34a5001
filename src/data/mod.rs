pub mod class;
pub mod notification;
pub mod submission;
pub mod task;

pub static SUBMISSION_COLLECTION_NAME: &str = "submissions";
pub static TASK_COLLECTION_NAME: &str = "tasks";
pub static CLASS_COLLECTION_NAME: &str = "classes";
pub static SCHOOL_COLLECTION_NAME: &str = "schools";
pub static NOTIFICATION_COLLECTION_NAME: &str = "notifications";

pub mod filter {
    use bson::{doc, Bson, Document};
    use uuid::Uuid;

    #[inline]
    pub fn uuid(id: Uuid) -> Bson {
        Bson::from(bson::Uuid::from(id))
    }

    #[inline]
    pub fn uuids(ids: &[Uuid]) -> Bson {
        Bson::Array(ids.iter().copied().map(uuid).collect())
    }

    #[inline]
    pub fn by_id(id: Uuid) -> Document {
        doc! { "_id": uuid(id) }
    }

    #[inline]
    pub fn by_ids(ids: &[Uuid]) -> Document {
        doc! { "_id": { "$in": uuids(ids) } }
    }
}

/// Lenient number decoding for documents written by other clients, which
/// store numbers as doubles, 32 or 64 bit integers, or even strings.
pub mod lenient {
    use bson::Bson;
    use serde::{Deserialize, Deserializer};

    fn number(value: &Bson) -> Option<f64> {
        let number = match value {
            Bson::Int32(it) => f64::from(*it),
            Bson::Int64(it) => *it as f64,
            Bson::Double(it) => *it,
            Bson::String(it) => it.trim().parse().ok()?,
            _ => return None,
        };
        Some(number).filter(|it| it.is_finite() && *it >= 0.0)
    }

    /// Non-negative whole number. Fractions are dropped; anything that isn't
    /// a non-negative number reads as `0`.
    pub fn whole_number<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
        let value = Bson::deserialize(d)?;
        Ok(number(&value)
            .map(|it| it.min(f64::from(u32::MAX)) as u32)
            .unwrap_or(0))
    }

    /// `null` stays absent; a value that isn't a non-negative number reads
    /// as `0.0`.
    pub fn optional_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        match Bson::deserialize(d)? {
            Bson::Null | Bson::Undefined => Ok(None),
            value => Ok(Some(number(&value).unwrap_or(0.0))),
        }
    }
}

/// Serde helpers for UUID containers stored as BSON binary (subtype 4).
///
/// `bson::serde_helpers::uuid_1_as_binary` only covers a bare `Uuid`.
pub mod uuid_binary {
    pub mod option {
        use serde::{Deserialize, Deserializer, Serialize, Serializer};
        use uuid::Uuid;

        pub fn serialize<S: Serializer>(value: &Option<Uuid>, s: S) -> Result<S::Ok, S::Error> {
            value.map(bson::Uuid::from).serialize(s)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Uuid>, D::Error> {
            Ok(Option::<bson::Uuid>::deserialize(d)?.map(|it| it.to_uuid_1()))
        }
    }

    pub mod vec {
        use serde::{Deserialize, Deserializer, Serialize, Serializer};
        use uuid::Uuid;

        pub fn serialize<S: Serializer>(value: &[Uuid], s: S) -> Result<S::Ok, S::Error> {
            value
                .iter()
                .copied()
                .map(bson::Uuid::from)
                .collect::<Vec<_>>()
                .serialize(s)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Uuid>, D::Error> {
            Ok(Vec::<bson::Uuid>::deserialize(d)?
                .into_iter()
                .map(|it| it.to_uuid_1())
                .collect())
        }
    }
}
